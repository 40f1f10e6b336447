// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-card answer countdowns.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio::time::interval;

use crate::exercise::card::ExerciseCardId;

const TICK: Duration = Duration::from_secs(1);

/// The running countdown tasks, one per card at most. Dropping this aborts
/// them all.
#[derive(Default)]
pub struct Countdowns {
    tasks: HashMap<ExerciseCardId, JoinHandle<()>>,
}

impl Countdowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a countdown that calls `tick` once a second until it returns
    /// `false`. Must be called from within a Tokio runtime.
    pub fn start<F>(&mut self, id: ExerciseCardId, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.cancel(id);
        log::debug!("Starting countdown for card {id}.");
        let handle = tokio::spawn(async move {
            let mut ticker = interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !tick() {
                    break;
                }
            }
        });
        self.tasks.insert(id, handle);
    }

    pub fn is_running(&self, id: ExerciseCardId) -> bool {
        self.tasks
            .get(&id)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn cancel(&mut self, id: ExerciseCardId) {
        if let Some(handle) = self.tasks.remove(&id) {
            if !handle.is_finished() {
                log::debug!("Cancelling countdown for card {id}.");
            }
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn running_count(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for Countdowns {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use tokio::time::sleep;

    use super::*;

    fn counter(limit: u32) -> (Arc<AtomicU32>, impl FnMut() -> bool + Send + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let tick = move || c.fetch_add(1, Ordering::SeqCst) + 1 < limit;
        (count, tick)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_done() {
        let mut countdowns = Countdowns::new();
        let (count, tick) = counter(3);
        countdowns.start(ExerciseCardId(1), tick);
        assert!(countdowns.is_running(ExerciseCardId(1)));
        sleep(Duration::from_millis(10_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!countdowns.is_running(ExerciseCardId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let mut countdowns = Countdowns::new();
        let (count, tick) = counter(100);
        countdowns.start(ExerciseCardId(1), tick);
        sleep(Duration::from_millis(2_500)).await;
        countdowns.cancel(ExerciseCardId(1));
        sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(countdowns.running_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts() {
        let (count, tick) = counter(100);
        {
            let mut countdowns = Countdowns::new();
            countdowns.start(ExerciseCardId(1), tick);
            sleep(Duration::from_millis(1_500)).await;
        }
        sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

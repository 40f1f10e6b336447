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

use crate::cmd::select_decks;
use crate::collection::Collection;
use crate::collection::Library;
use crate::error::Fallible;
use crate::scheduler::earliest_availability;
use crate::types::timestamp::Timestamp;

pub fn print_due(directory: Option<String>, decks: Vec<i64>) -> Fallible<()> {
    let library = Library::open(directory)?;
    println!("{}", due_message(&library.collection, &decks, Timestamp::now()));
    Ok(())
}

fn due_message(collection: &Collection, decks: &[i64], now: Timestamp) -> String {
    let deck_ids = select_decks(collection, decks);
    match earliest_availability(collection, &deck_ids, now) {
        Some(due) if due <= now => "Cards are ready to study now.".to_string(),
        Some(due) => format!("Next card available at {due}."),
        None => "No cards left to study.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::types::card::Card;
    use crate::types::card::CardId;
    use crate::types::deck::Deck;
    use crate::types::deck::DeckId;
    use crate::types::interval::Interval;
    use crate::types::interval::IntervalScheme;

    fn collection(now: Timestamp) -> Collection {
        let mut tested = Card::new(CardId(1), "France", "Paris");
        tested.last_tested_at = Some(now);
        let mut scheduled = Deck::new(DeckId(1), "Scheduled", vec![tested]);
        scheduled.exercise_preference.interval_scheme =
            Some(IntervalScheme::new([Interval::new(0, Duration::hours(2))]));
        let mut learned = Card::new(CardId(1), "uno", "one");
        learned.is_learned = true;
        let done = Deck::new(DeckId(2), "Done", vec![learned]);
        let fresh = Deck::new(DeckId(3), "Fresh", vec![Card::new(CardId(1), "a", "b")]);
        Collection::new(vec![scheduled, done, fresh])
    }

    #[test]
    fn test_due_message() {
        let now = Timestamp::now();
        let collection = collection(now);
        assert_eq!(
            due_message(&collection, &[1], now),
            format!("Next card available at {}.", now.checked_add(Duration::hours(2)).unwrap())
        );
        assert_eq!(
            due_message(&collection, &[2], now),
            "No cards left to study."
        );
        assert_eq!(
            due_message(&collection, &[], now),
            "Cards are ready to study now."
        );
    }
}

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

//! The session orchestrator: owns the decks and the composed session, and
//! applies every input to them one at a time.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rand::Rng;

use crate::collection::Collection;
use crate::db::Storage;
use crate::error::Fallible;
use crate::exercise::card::ExerciseCard;
use crate::exercise::card::ExerciseCardId;
use crate::exercise::composer::NoCardReadyForExercise;
use crate::exercise::composer::SessionComposer;
use crate::exercise::hint;
use crate::exercise::notify::FieldSelector;
use crate::exercise::notify::Notifier;
use crate::exercise::notify::Projection;
use crate::exercise::notify::Subscription;
use crate::exercise::snapshot::SessionSnapshot;
use crate::exercise::state::ExerciseState;
use crate::exercise::timer::Countdowns;
use crate::types::deck::CardRef;
use crate::types::deck::DeckId;
use crate::types::timestamp::Timestamp;

/// A change to a card that storage has not seen yet.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingWrite {
    Review {
        card: CardRef,
        lap: u32,
        grade: u32,
        last_tested_at: Option<Timestamp>,
    },
    Learned {
        card: CardRef,
        is_learned: bool,
    },
}

pub struct Exercise {
    collection: Collection,
    state: ExerciseState,
    notifier: Notifier,
    countdowns: Countdowns,
    pending: Vec<PendingWrite>,
    current_position: usize,
}

impl Exercise {
    pub fn new(collection: Collection, state: ExerciseState) -> Self {
        let mut exercise = Self {
            collection,
            state,
            notifier: Notifier::new(),
            countdowns: Countdowns::new(),
            pending: Vec::new(),
            current_position: 0,
        };
        exercise.publish_all();
        exercise
    }

    /// Composes a session over `deck_ids` and starts it.
    pub fn start<R: Rng>(
        collection: Collection,
        composer: &mut SessionComposer<R>,
        deck_ids: &[DeckId],
    ) -> Result<Self, NoCardReadyForExercise> {
        let state = composer.create(&collection, deck_ids, Timestamp::now())?;
        Ok(Self::new(collection, state))
    }

    /// Replaces the session with a freshly composed one. On failure the
    /// current session is kept.
    pub fn replace_state<R: Rng>(
        &mut self,
        composer: &mut SessionComposer<R>,
        deck_ids: &[DeckId],
    ) -> Result<(), NoCardReadyForExercise> {
        let state = composer.create(&self.collection, deck_ids, Timestamp::now())?;
        self.countdowns.cancel_all();
        self.notifier.reset();
        self.state = state;
        self.current_position = 0;
        self.publish_all();
        Ok(())
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn state(&self) -> &ExerciseState {
        &self.state
    }

    pub fn current_position(&self) -> usize {
        self.current_position
    }

    pub fn subscribe(&mut self, selector: FieldSelector) -> Subscription {
        self.notifier.subscribe(selector)
    }

    pub fn projection(&self, id: ExerciseCardId) -> Option<Projection> {
        let position = self.state.position(id)?;
        let card = self.state.get(position)?;
        Projection::of(card, &self.collection)
    }

    /// Takes effect the next time a session is composed.
    pub fn set_walking_mode(&mut self, is_walking_mode: bool) {
        self.collection.is_walking_mode = is_walking_mode;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::of(&self.state, self.current_position)
    }

    pub fn pending_writes(&self) -> &[PendingWrite] {
        &self.pending
    }

    /// Hands the buffered card changes to storage. Writes that fail stay
    /// buffered.
    pub fn persist(&mut self, storage: &dyn Storage) -> Fallible<()> {
        while let Some(write) = self.pending.first() {
            match write {
                PendingWrite::Review {
                    card,
                    lap,
                    grade,
                    last_tested_at,
                } => storage.persist_card_review(*card, *lap, *grade, *last_tested_at)?,
                PendingWrite::Learned { card, is_learned } => {
                    storage.persist_learned_flag(*card, *is_learned)?
                }
            }
            self.pending.remove(0);
        }
        Ok(())
    }

    /// Ends the session, stopping every countdown, and gives the decks back.
    pub fn end(self) -> Collection {
        let Exercise {
            collection,
            mut countdowns,
            ..
        } = self;
        countdowns.cancel_all();
        log::debug!("Session ended.");
        collection
    }

    pub fn show_question(&mut self, id: ExerciseCardId) {
        let Some(position) = self.input_position(id) else {
            return;
        };
        if let Some(card) = self.state.get_mut(position) {
            card.base_mut().is_question_displayed = true;
        }
        self.publish(position);
    }

    /// Reveals the answer of an ungraded card, which completes its review.
    pub fn show_answer(&mut self, id: ExerciseCardId) {
        let Some(position) = self.input_position(id) else {
            return;
        };
        match self.state.get(position) {
            Some(ExerciseCard::Off(base)) if !base.is_answered() => {
                self.complete_review(position, true, false);
            }
            _ => {}
        }
    }

    /// Records a self-graded answer. The user may change their mind; only
    /// the first answer counts as a new lap.
    pub fn answer(&mut self, id: ExerciseCardId, remembered: bool) {
        let Some(position) = self.input_position(id) else {
            return;
        };
        match self.state.get(position) {
            Some(ExerciseCard::Manual(base)) if base.is_answer_correct != Some(remembered) => {
                self.complete_review(position, remembered, true);
            }
            _ => {}
        }
    }

    /// Picks one of a quiz card's variants. Only the first pick counts.
    pub fn answer_quiz(&mut self, id: ExerciseCardId, variant: usize) {
        let Some(position) = self.input_position(id) else {
            return;
        };
        let is_correct = match self.state.get_mut(position) {
            Some(ExerciseCard::Quiz(quiz)) if !quiz.base.is_answered() => {
                match quiz.variants.get(variant) {
                    Some(Some(card)) => {
                        let is_correct = *card == quiz.base.card;
                        quiz.selected_variant = Some(variant);
                        is_correct
                    }
                    _ => return,
                }
            }
            _ => return,
        };
        self.complete_review(position, is_correct, true);
    }

    /// Checks a typed answer. Only the first entry counts.
    pub fn answer_entry(&mut self, id: ExerciseCardId, text: &str) {
        let Some(position) = self.input_position(id) else {
            return;
        };
        let Some(expected) = self.expected_answer(position) else {
            return;
        };
        let is_correct = match self.state.get_mut(position) {
            Some(ExerciseCard::Entry(entry)) if !entry.base.is_answered() => {
                entry.user_input = Some(text.to_string());
                text.trim().to_lowercase() == expected.trim().to_lowercase()
            }
            _ => return,
        };
        self.complete_review(position, is_correct, true);
    }

    /// Shows a masked hint, or unmasks one more character of it.
    pub fn show_hint(&mut self, id: ExerciseCardId) {
        let Some(position) = self.input_position(id) else {
            return;
        };
        let Some(expected) = self.expected_answer(position) else {
            return;
        };
        let Some(card) = self.state.get_mut(position) else {
            return;
        };
        let base = card.base_mut();
        if base.is_answered() {
            return;
        }
        let next = match &base.hint {
            None => hint::mask(&expected),
            Some(current) => hint::unmask_next(current, &expected),
        };
        base.hint = Some(next);
        self.publish(position);
    }

    /// Unmasks the chars `start..end` of the current hint.
    pub fn unmask_hint(&mut self, id: ExerciseCardId, start: usize, end: usize) {
        let Some(position) = self.input_position(id) else {
            return;
        };
        let Some(expected) = self.expected_answer(position) else {
            return;
        };
        let Some(card) = self.state.get_mut(position) else {
            return;
        };
        let base = card.base_mut();
        if base.is_answered() {
            return;
        }
        let Some(current) = &base.hint else {
            return;
        };
        let next = hint::unmask_range(current, &expected, start, end);
        base.hint = Some(next);
        self.publish(position);
    }

    /// Overrides the grade that answering would assign.
    pub fn set_grade(&mut self, id: ExerciseCardId, grade: u32) {
        let Some(position) = self.input_position(id) else {
            return;
        };
        let Some(exercise_card) = self.state.get_mut(position) else {
            return;
        };
        let base = exercise_card.base_mut();
        base.is_grade_edited_manually = true;
        let card_ref = base.card;
        let Some(card) = self.collection.card_mut(card_ref.deck_id, card_ref.card_id) else {
            return;
        };
        card.grade = grade;
        self.pending.push(PendingWrite::Review {
            card: card_ref,
            lap: card.lap,
            grade: card.grade,
            last_tested_at: card.last_tested_at,
        });
        self.publish(position);
    }

    /// Marks the card learned, or not. Learned cards accept no other input.
    pub fn set_is_learned(&mut self, id: ExerciseCardId, is_learned: bool) {
        let Some(position) = self.state.position(id) else {
            return;
        };
        let Some(card_ref) = self.state.get(position).map(|card| card.base().card) else {
            return;
        };
        let Some(card) = self.collection.card_mut(card_ref.deck_id, card_ref.card_id) else {
            return;
        };
        if card.is_learned == is_learned {
            return;
        }
        card.is_learned = is_learned;
        self.pending.push(PendingWrite::Learned {
            card: card_ref,
            is_learned,
        });
        if is_learned {
            self.countdowns.cancel(id);
        }
        self.publish(position);
    }

    /// Advances a card's countdown by one second. Returns whether the
    /// countdown should keep going.
    pub fn tick(&mut self, id: ExerciseCardId) -> bool {
        // A tick that was waiting on the lock when its countdown got cancelled.
        if !self.countdowns.is_running(id) {
            return false;
        }
        let Some(position) = self.input_position(id) else {
            return false;
        };
        let Some(card) = self.state.get_mut(position) else {
            return false;
        };
        let base = card.base_mut();
        if base.is_answered() || base.time_left == 0 {
            return false;
        }
        base.time_left -= 1;
        if base.time_left == 0 {
            base.is_expired = true;
            log::debug!("Card {id} expired.");
        }
        let keep_going = base.time_left > 0;
        self.publish(position);
        keep_going
    }

    pub fn stop_countdowns(&mut self) {
        self.countdowns.cancel_all();
    }

    pub fn is_counting_down(&self, id: ExerciseCardId) -> bool {
        self.countdowns.is_running(id)
    }

    /// The single transition that records a review: bumps the lap on the
    /// first answer only, stamps the review time, and updates the grade
    /// unless it was set by hand.
    fn complete_review(&mut self, position: usize, is_correct: bool, derives_grade: bool) {
        let now = Timestamp::now();
        let Some(exercise_card) = self.state.get_mut(position) else {
            return;
        };
        let id = exercise_card.id();
        let base = exercise_card.base_mut();
        let is_first = !base.is_answered();
        base.is_answer_correct = Some(is_correct);
        let card_ref = base.card;
        let derived_grade = derive_grade(base.initial_grade, is_correct);
        let keep_grade = base.is_grade_edited_manually || !derives_grade;
        let Some(card) = self.collection.card_mut(card_ref.deck_id, card_ref.card_id) else {
            return;
        };
        if is_first {
            card.lap += 1;
        }
        card.last_tested_at = Some(now);
        if !keep_grade {
            card.grade = derived_grade;
        }
        log::debug!(
            "Reviewed card {} of deck {}: correct={is_correct} lap={} grade={}",
            card_ref.card_id,
            card_ref.deck_id,
            card.lap,
            card.grade
        );
        self.pending.push(PendingWrite::Review {
            card: card_ref,
            lap: card.lap,
            grade: card.grade,
            last_tested_at: card.last_tested_at,
        });
        self.countdowns.cancel(id);
        self.publish(position);
    }

    /// The position of a card that accepts input: it exists and its
    /// underlying card is not learned.
    fn input_position(&self, id: ExerciseCardId) -> Option<usize> {
        let position = self.state.position(id)?;
        let card_ref = self.state.get(position)?.base().card;
        let card = self.collection.resolve(card_ref)?;
        if card.is_learned {
            None
        } else {
            Some(position)
        }
    }

    fn expected_answer(&self, position: usize) -> Option<String> {
        let base = self.state.get(position)?.base();
        let card = self.collection.resolve(base.card)?;
        Some(card.answer_side(base.is_inverted).to_string())
    }

    fn publish(&mut self, position: usize) {
        let Some(card) = self.state.get(position) else {
            return;
        };
        if let Some(projection) = Projection::of(card, &self.collection) {
            self.notifier.publish(card.id(), projection);
        }
    }

    fn publish_all(&mut self) {
        for position in 0..self.state.len() {
            self.publish(position);
        }
    }

    fn should_count_down(&self, position: usize) -> bool {
        let Some(card) = self.state.get(position) else {
            return false;
        };
        let base = card.base();
        base.time_left > 0
            && !base.is_answered()
            && self.input_position(base.id).is_some()
            && !self.countdowns.is_running(base.id)
    }
}

/// A correct answer moves the card up one grade; a wrong one moves it down
/// one, but never below zero.
pub fn derive_grade(initial_grade: u32, is_correct: bool) -> u32 {
    if is_correct {
        initial_grade + 1
    } else {
        initial_grade.saturating_sub(1)
    }
}

/// Shares an [`Exercise`] between the input side and its countdown tasks.
/// The mutex is the one place mutations are serialized.
#[derive(Clone)]
pub struct ExerciseHandle {
    inner: Arc<Mutex<Exercise>>,
}

impl ExerciseHandle {
    pub fn new(exercise: Exercise) -> Self {
        Self {
            inner: Arc::new(Mutex::new(exercise)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Exercise> {
        self.inner.lock().unwrap()
    }

    /// Runs `f` against the exercise while holding the lock.
    pub fn with<T>(&self, f: impl FnOnce(&mut Exercise) -> T) -> T {
        let mut exercise = self.lock();
        f(&mut exercise)
    }

    /// Moves to the card at `position`: stops the previous card's countdown
    /// and starts this one's if it has a timer. Must be called from within a
    /// Tokio runtime.
    pub fn set_current_position(&self, position: usize) {
        let mut exercise = self.lock();
        if position >= exercise.state.len() {
            return;
        }
        let previous = exercise.current_position;
        if previous != position {
            if let Some(card) = exercise.state.get(previous) {
                let id = card.id();
                exercise.countdowns.cancel(id);
            }
        }
        exercise.current_position = position;
        if !exercise.should_count_down(position) {
            return;
        }
        let Some(id) = exercise.state.get(position).map(|card| card.id()) else {
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        exercise.countdowns.start(id, move || match weak.upgrade() {
            Some(inner) => match inner.lock() {
                Ok(mut exercise) => exercise.tick(id),
                Err(_) => false,
            },
            None => false,
        });
    }

    /// Takes the exercise back, if no other handle is alive.
    pub fn into_inner(self) -> Option<Exercise> {
        Arc::try_unwrap(self.inner)
            .ok()
            .and_then(|mutex| mutex.into_inner().ok())
    }
}

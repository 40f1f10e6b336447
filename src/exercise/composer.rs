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

//! Builds study sessions out of the cards that are due.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::collection::Collection;
use crate::exercise::card::Base;
use crate::exercise::card::EntryTest;
use crate::exercise::card::ExerciseCard;
use crate::exercise::card::ExerciseCardId;
use crate::exercise::card::QuizTest;
use crate::exercise::quiz::QuizComposer;
use crate::exercise::state::ExerciseState;
use crate::scheduler::is_available;
use crate::types::card::Card;
use crate::types::deck::CardInversion;
use crate::types::deck::CardRef;
use crate::types::deck::Deck;
use crate::types::deck::DeckId;
use crate::types::deck::TestingMethod;
use crate::types::timestamp::Timestamp;

/// Nothing in the requested decks is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoCardReadyForExercise;

impl Display for NoCardReadyForExercise {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "No card is ready for exercise")
    }
}

impl Error for NoCardReadyForExercise {}

pub struct SessionComposer<R: Rng = StdRng> {
    rng: R,
    quiz: QuizComposer,
    next_id: u64,
}

impl SessionComposer<StdRng> {
    pub fn from_entropy(quiz_variant_count: usize) -> Self {
        Self::new(StdRng::from_entropy(), quiz_variant_count)
    }
}

impl<R: Rng> SessionComposer<R> {
    pub fn new(rng: R, quiz_variant_count: usize) -> Self {
        Self {
            rng,
            quiz: QuizComposer::new(quiz_variant_count),
            next_id: 1,
        }
    }

    /// Composes a session over the given decks.
    ///
    /// Each deck's due cards are shuffled (if the deck asks for it), then
    /// stably sorted so that cards with fewer reviews come first. The decks
    /// are then interleaved at random, keeping each deck's own order.
    pub fn create(
        &mut self,
        collection: &Collection,
        deck_ids: &[DeckId],
        now: Timestamp,
    ) -> Result<ExerciseState, NoCardReadyForExercise> {
        self.quiz.clear_cache();

        let mut per_deck: Vec<Vec<(&Deck, &Card)>> = Vec::new();
        for deck in &collection.decks {
            if !deck_ids.contains(&deck.id) {
                continue;
            }
            let preference = &deck.exercise_preference;
            let mut cards: Vec<&Card> = deck
                .cards
                .iter()
                .filter(|card| is_available(card, preference.interval_scheme.as_ref(), now))
                .collect();
            if preference.random_order {
                cards.shuffle(&mut self.rng);
            }
            cards.sort_by_key(|card| card.lap);
            per_deck.push(cards.into_iter().map(|card| (deck, card)).collect());
        }

        let selected = flatten_with_shallow_shuffling(per_deck, &mut self.rng);
        let cards: Vec<ExerciseCard> = selected
            .into_iter()
            .map(|(deck, card)| {
                self.card_to_exercise_card(card, deck, collection.is_walking_mode, collection)
            })
            .collect();

        if cards.is_empty() {
            log::debug!("No card is ready for exercise in decks {deck_ids:?}.");
            return Err(NoCardReadyForExercise);
        }
        log::debug!(
            "Composed a session of {} cards from {} decks.",
            cards.len(),
            deck_ids.len()
        );
        Ok(ExerciseState::new(cards))
    }

    fn card_to_exercise_card(
        &mut self,
        card: &Card,
        deck: &Deck,
        is_walking_mode: bool,
        collection: &Collection,
    ) -> ExerciseCard {
        let preference = &deck.exercise_preference;
        let is_inverted = match preference.card_inversion {
            CardInversion::Off => false,
            CardInversion::On => true,
            CardInversion::EveryOtherLap => card.lap % 2 == 1,
            CardInversion::Randomly => self.rng.gen_bool(0.5),
        };
        let base = Base {
            id: self.generate_id(),
            card: CardRef::new(deck.id, card.id),
            is_inverted,
            is_question_displayed: preference.is_question_displayed,
            is_answer_correct: None,
            hint: None,
            time_left: if is_walking_mode {
                0
            } else {
                preference.time_for_answer
            },
            is_expired: false,
            initial_grade: card.grade,
            is_grade_edited_manually: false,
        };
        match preference.testing_method {
            TestingMethod::Off => ExerciseCard::Off(base),
            TestingMethod::Manual => ExerciseCard::Manual(base),
            TestingMethod::Quiz => {
                if is_walking_mode {
                    ExerciseCard::Manual(base)
                } else {
                    let variants = self.quiz.compose(
                        card,
                        deck,
                        is_inverted,
                        true,
                        &collection.decks,
                        &mut self.rng,
                    );
                    ExerciseCard::Quiz(QuizTest {
                        base,
                        variants,
                        selected_variant: None,
                    })
                }
            }
            TestingMethod::Entry => {
                if is_walking_mode {
                    ExerciseCard::Manual(base)
                } else {
                    ExerciseCard::Entry(EntryTest {
                        base,
                        user_input: None,
                    })
                }
            }
        }
    }

    fn generate_id(&mut self) -> ExerciseCardId {
        let id = ExerciseCardId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Merges the lists into one, choosing at each step a random list with
/// probability proportional to how many items it has left. Every list's own
/// order is preserved.
pub fn flatten_with_shallow_shuffling<T, R: Rng + ?Sized>(
    lists: Vec<Vec<T>>,
    rng: &mut R,
) -> Vec<T> {
    let mut queues: Vec<VecDeque<T>> = lists
        .into_iter()
        .filter(|list| !list.is_empty())
        .map(VecDeque::from)
        .collect();
    let mut remaining: usize = queues.iter().map(|queue| queue.len()).sum();
    let mut result = Vec::with_capacity(remaining);
    while remaining > 0 {
        let mut pick = rng.gen_range(0..remaining);
        for queue in queues.iter_mut() {
            if pick < queue.len() {
                if let Some(item) = queue.pop_front() {
                    result.push(item);
                }
                break;
            }
            pick -= queue.len();
        }
        remaining -= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;

    use super::*;
    use crate::types::card::CardId;
    use crate::types::interval::Interval;
    use crate::types::interval::IntervalScheme;

    fn card(id: i64, lap: u32) -> Card {
        let mut card = Card::new(CardId(id), format!("q{id}"), format!("a{id}"));
        card.lap = lap;
        card
    }

    fn deck(id: i64, cards: Vec<Card>) -> Deck {
        let mut deck = Deck::new(DeckId(id), format!("deck {id}"), cards);
        deck.exercise_preference.random_order = false;
        deck
    }

    fn composer(seed: u64) -> SessionComposer<StdRng> {
        SessionComposer::new(StdRng::seed_from_u64(seed), 4)
    }

    fn refs(state: &ExerciseState) -> Vec<CardRef> {
        state.cards().iter().map(|c| c.base().card).collect()
    }

    #[test]
    fn test_empty_request_fails() {
        let collection = Collection::new(vec![deck(1, vec![card(1, 0)])]);
        let result = composer(1).create(&collection, &[], Timestamp::now());
        assert_eq!(result, Err(NoCardReadyForExercise));
    }

    #[test]
    fn test_nothing_due_fails() {
        let mut learned = card(1, 0);
        learned.is_learned = true;
        let mut recent = card(2, 0);
        recent.last_tested_at = Some(Timestamp::now());
        let mut d = deck(1, vec![learned, recent]);
        d.exercise_preference.interval_scheme =
            Some(IntervalScheme::new([Interval::new(0, Duration::days(1))]));
        let collection = Collection::new(vec![d]);
        let result = composer(1).create(&collection, &[DeckId(1)], Timestamp::now());
        assert_eq!(result, Err(NoCardReadyForExercise));
    }

    #[test]
    fn test_stored_order_then_stable_sort_by_lap() {
        let collection = Collection::new(vec![deck(
            1,
            vec![card(1, 2), card(2, 0), card(3, 1), card(4, 0), card(5, 2)],
        )]);
        let state = composer(1)
            .create(&collection, &[DeckId(1)], Timestamp::now())
            .unwrap();
        let ids: Vec<i64> = refs(&state).iter().map(|r| r.card_id.0).collect();
        assert_eq!(ids, vec![2, 4, 3, 1, 5]);
    }

    #[test]
    fn test_random_order_still_sorted_by_lap() {
        let mut d = deck(1, (1..=20).map(|i| card(i, (i % 3) as u32)).collect());
        d.exercise_preference.random_order = true;
        let collection = Collection::new(vec![d]);
        let mut orders = HashSet::new();
        for seed in 0..10 {
            let state = composer(seed)
                .create(&collection, &[DeckId(1)], Timestamp::now())
                .unwrap();
            let laps: Vec<u32> = refs(&state)
                .iter()
                .map(|r| collection.resolve(*r).unwrap().lap)
                .collect();
            let mut sorted = laps.clone();
            sorted.sort();
            assert_eq!(laps, sorted);
            assert_eq!(laps.len(), 20);
            let ids: Vec<CardId> = refs(&state).iter().map(|r| r.card_id).collect();
            orders.insert(ids);
        }
        // Cards sharing a lap are shuffled, not left in deck order.
        assert!(orders.len() > 1);
    }

    #[test]
    fn test_intra_deck_order_preserved() {
        let collection = Collection::new(vec![
            deck(1, (1..=6).map(|i| card(i, 0)).collect()),
            deck(2, (1..=4).map(|i| card(i, i as u32)).collect()),
            deck(3, (1..=5).map(|i| card(i, 5 - i as u32)).collect()),
        ]);
        let ids = [DeckId(1), DeckId(2), DeckId(3)];
        let mut interleavings = std::collections::HashSet::new();
        for seed in 0..50 {
            let state = composer(seed)
                .create(&collection, &ids, Timestamp::now())
                .unwrap();
            let refs = refs(&state);
            assert_eq!(refs.len(), 15);
            let of = |deck: i64| -> Vec<i64> {
                refs.iter()
                    .filter(|r| r.deck_id == DeckId(deck))
                    .map(|r| r.card_id.0)
                    .collect()
            };
            assert_eq!(of(1), vec![1, 2, 3, 4, 5, 6]);
            assert_eq!(of(2), vec![1, 2, 3, 4]);
            assert_eq!(of(3), vec![5, 4, 3, 2, 1]);
            interleavings.insert(refs.iter().map(|r| r.deck_id.0).collect::<Vec<_>>());
        }
        assert!(interleavings.len() > 1);
    }

    #[test]
    fn test_flatten_keeps_every_item() {
        let mut rng = StdRng::seed_from_u64(3);
        let flat = flatten_with_shallow_shuffling(vec![vec![1, 2], vec![], vec![3]], &mut rng);
        let mut sorted = flat.clone();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2, 3]);
        assert!(flat.iter().position(|&x| x == 1) < flat.iter().position(|&x| x == 2));
    }

    #[test]
    fn test_only_requested_decks() {
        let collection = Collection::new(vec![
            deck(1, vec![card(1, 0)]),
            deck(2, vec![card(1, 0)]),
        ]);
        let state = composer(1)
            .create(&collection, &[DeckId(2)], Timestamp::now())
            .unwrap();
        assert_eq!(refs(&state), vec![CardRef::new(DeckId(2), CardId(1))]);
    }

    #[test]
    fn test_every_other_lap_inversion() {
        let mut d = deck(1, (0..4).map(|lap| card(lap as i64 + 1, lap)).collect());
        d.exercise_preference.card_inversion = CardInversion::EveryOtherLap;
        let collection = Collection::new(vec![d]);
        let state = composer(1)
            .create(&collection, &[DeckId(1)], Timestamp::now())
            .unwrap();
        let inverted: Vec<bool> = state.cards().iter().map(|c| c.base().is_inverted).collect();
        assert_eq!(inverted, vec![false, true, false, true]);
    }

    #[test]
    fn test_fixed_inversion() {
        for (inversion, expected) in [(CardInversion::Off, false), (CardInversion::On, true)] {
            let mut d = deck(1, vec![card(1, 0), card(2, 1)]);
            d.exercise_preference.card_inversion = inversion;
            let collection = Collection::new(vec![d]);
            let state = composer(1)
                .create(&collection, &[DeckId(1)], Timestamp::now())
                .unwrap();
            assert!(state.cards().iter().all(|c| c.base().is_inverted == expected));
        }
    }

    #[test]
    fn test_random_inversion_varies() {
        let mut d = deck(1, (1..=40).map(|i| card(i, 0)).collect());
        d.exercise_preference.card_inversion = CardInversion::Randomly;
        let collection = Collection::new(vec![d]);
        let state = composer(7)
            .create(&collection, &[DeckId(1)], Timestamp::now())
            .unwrap();
        let inverted = state
            .cards()
            .iter()
            .filter(|c| c.base().is_inverted)
            .count();
        assert!(inverted > 0 && inverted < 40);
    }

    #[test]
    fn test_base_fields() {
        let mut c = card(1, 0);
        c.grade = 3;
        let mut d = deck(1, vec![c]);
        d.exercise_preference.time_for_answer = 10;
        d.exercise_preference.is_question_displayed = false;
        let collection = Collection::new(vec![d]);
        let state = composer(1)
            .create(&collection, &[DeckId(1)], Timestamp::now())
            .unwrap();
        let base = state.cards()[0].base();
        assert_eq!(base.time_left, 10);
        assert_eq!(base.initial_grade, 3);
        assert!(!base.is_question_displayed);
        assert!(!base.is_grade_edited_manually);
        assert_eq!(base.is_answer_correct, None);
    }

    #[test]
    fn test_ids_are_unique() {
        let collection = Collection::new(vec![
            deck(1, (1..=5).map(|i| card(i, 0)).collect()),
            deck(2, (1..=5).map(|i| card(i, 0)).collect()),
        ]);
        let mut composer = composer(1);
        let first = composer
            .create(&collection, &[DeckId(1), DeckId(2)], Timestamp::now())
            .unwrap();
        let mut ids: Vec<ExerciseCardId> = first.cards().iter().map(|c| c.id()).collect();
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    fn method_deck(method: TestingMethod) -> Collection {
        let mut d = deck(1, (1..=5).map(|i| card(i, 0)).collect());
        d.exercise_preference.testing_method = method;
        d.exercise_preference.time_for_answer = 15;
        Collection::new(vec![d])
    }

    #[test]
    fn test_variant_per_testing_method() {
        for method in [
            TestingMethod::Off,
            TestingMethod::Manual,
            TestingMethod::Quiz,
            TestingMethod::Entry,
        ] {
            let collection = method_deck(method);
            let state = composer(1)
                .create(&collection, &[DeckId(1)], Timestamp::now())
                .unwrap();
            for card in state.cards() {
                assert_eq!(card.testing_method(), method);
                assert_eq!(card.base().time_left, 15);
            }
        }
    }

    #[test]
    fn test_walking_mode_overrides() {
        let expected = [
            (TestingMethod::Off, TestingMethod::Off),
            (TestingMethod::Manual, TestingMethod::Manual),
            (TestingMethod::Quiz, TestingMethod::Manual),
            (TestingMethod::Entry, TestingMethod::Manual),
        ];
        for (method, variant) in expected {
            let mut collection = method_deck(method);
            collection.is_walking_mode = true;
            let state = composer(1)
                .create(&collection, &[DeckId(1)], Timestamp::now())
                .unwrap();
            for card in state.cards() {
                assert_eq!(card.testing_method(), variant);
                assert_eq!(card.base().time_left, 0);
            }
        }
    }

    #[test]
    fn test_quiz_variants_contain_card() {
        let collection = method_deck(TestingMethod::Quiz);
        let state = composer(1)
            .create(&collection, &[DeckId(1)], Timestamp::now())
            .unwrap();
        for card in state.cards() {
            match card {
                ExerciseCard::Quiz(quiz) => {
                    assert_eq!(quiz.variants.len(), 4);
                    assert!(quiz.variants.contains(&Some(quiz.base.card)));
                }
                _ => panic!("Expected quiz card"),
            }
        }
    }

    #[test]
    fn test_quiz_cache_cleared_between_sessions() {
        let mut collection = method_deck(TestingMethod::Quiz);
        let mut other = deck(2, (1..=3).map(|i| card(i, 0)).collect());
        other.exercise_preference.testing_method = TestingMethod::Quiz;
        collection.decks.push(other);
        let mut composer = composer(1);
        composer
            .create(&collection, &[DeckId(1)], Timestamp::now())
            .unwrap();
        assert_eq!(composer.quiz.cache_len(), 5);
        composer
            .create(&collection, &[DeckId(2)], Timestamp::now())
            .unwrap();
        assert_eq!(composer.quiz.cache_len(), 3);
    }
}

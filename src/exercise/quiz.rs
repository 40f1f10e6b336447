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

//! Multiple-choice variants for quiz cards.

use std::collections::HashMap;
use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::types::card::Card;
use crate::types::deck::CardRef;
use crate::types::deck::Deck;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct QuizKey {
    card: CardRef,
    is_inverted: bool,
}

/// Builds the answer slots of quiz cards. Within a session, the same card
/// always gets the same slots, so re-rendering a card never reshuffles it.
pub struct QuizComposer {
    /// Total number of slots, including the correct answer.
    variant_count: usize,
    cache: HashMap<QuizKey, Vec<Option<CardRef>>>,
}

impl QuizComposer {
    pub fn new(variant_count: usize) -> Self {
        Self {
            variant_count,
            cache: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Forgets every composed quiz. Called once at the start of a session.
    pub fn clear_cache(&mut self) {
        log::debug!("Clearing quiz cache ({} entries).", self.cache.len());
        self.cache.clear();
    }

    /// Composes the slots for `card`: the card itself plus distractors whose
    /// answers differ from it and from each other. Distractors come from the
    /// card's own deck first, then from the other decks in `pool`. Filled
    /// slots are shuffled; slots that could not be filled are `None` and
    /// trail the list.
    pub fn compose<R: Rng + ?Sized>(
        &mut self,
        card: &Card,
        deck: &Deck,
        is_inverted: bool,
        with_caching: bool,
        pool: &[Deck],
        rng: &mut R,
    ) -> Vec<Option<CardRef>> {
        let key = QuizKey {
            card: CardRef::new(deck.id, card.id),
            is_inverted,
        };
        if with_caching {
            if let Some(variants) = self.cache.get(&key) {
                return variants.clone();
            }
        }
        let variants = self.compose_uncached(card, deck, is_inverted, pool, rng);
        if with_caching {
            self.cache.insert(key, variants.clone());
        }
        variants
    }

    fn compose_uncached<R: Rng + ?Sized>(
        &self,
        card: &Card,
        deck: &Deck,
        is_inverted: bool,
        pool: &[Deck],
        rng: &mut R,
    ) -> Vec<Option<CardRef>> {
        let wanted = self.variant_count.saturating_sub(1);
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(normalize(card.answer_side(is_inverted)));

        let correct = CardRef::new(deck.id, card.id);
        let mut distractors: Vec<CardRef> = Vec::new();
        take_distractors(
            deck,
            correct,
            is_inverted,
            wanted,
            &mut seen,
            &mut distractors,
            rng,
        );
        if distractors.len() < wanted {
            let mut others: Vec<&Deck> = pool.iter().filter(|d| d.id != deck.id).collect();
            others.shuffle(rng);
            for other in others {
                if distractors.len() >= wanted {
                    break;
                }
                take_distractors(
                    other,
                    correct,
                    is_inverted,
                    wanted,
                    &mut seen,
                    &mut distractors,
                    rng,
                );
            }
        }
        if distractors.len() < wanted {
            log::debug!(
                "Only {} of {wanted} distractors available for card {}.",
                distractors.len(),
                card.id
            );
        }

        let mut filled: Vec<CardRef> = Vec::with_capacity(distractors.len() + 1);
        filled.push(correct);
        filled.extend(distractors);
        filled.shuffle(rng);

        let mut variants: Vec<Option<CardRef>> = filled.into_iter().map(Some).collect();
        variants.resize(self.variant_count.max(1), None);
        variants
    }
}

fn take_distractors<R: Rng + ?Sized>(
    deck: &Deck,
    correct: CardRef,
    is_inverted: bool,
    wanted: usize,
    seen: &mut HashSet<String>,
    out: &mut Vec<CardRef>,
    rng: &mut R,
) {
    let mut candidates: Vec<&Card> = deck
        .cards
        .iter()
        .filter(|c| CardRef::new(deck.id, c.id) != correct)
        .collect();
    candidates.shuffle(rng);
    for candidate in candidates {
        if out.len() >= wanted {
            break;
        }
        let text = normalize(candidate.answer_side(is_inverted));
        if text.is_empty() || !seen.insert(text) {
            continue;
        }
        out.push(CardRef::new(deck.id, candidate.id));
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::types::card::CardId;
    use crate::types::deck::DeckId;

    fn deck(id: i64, answers: &[&str]) -> Deck {
        let cards = answers
            .iter()
            .enumerate()
            .map(|(i, a)| Card::new(CardId(i as i64 + 1), format!("q{i}"), *a))
            .collect();
        Deck::new(DeckId(id), format!("deck {id}"), cards)
    }

    fn filled(variants: &[Option<CardRef>]) -> Vec<CardRef> {
        variants.iter().flatten().copied().collect()
    }

    #[test]
    fn test_full_quiz_from_own_deck() {
        let deck = deck(1, &["a", "b", "c", "d", "e"]);
        let mut quiz = QuizComposer::new(4);
        let mut rng = StdRng::seed_from_u64(1);
        let variants = quiz.compose(&deck.cards[0], &deck, false, false, &[], &mut rng);
        assert_eq!(variants.len(), 4);
        let filled = filled(&variants);
        assert_eq!(filled.len(), 4);
        assert!(filled.contains(&CardRef::new(DeckId(1), CardId(1))));
        assert!(filled.iter().all(|r| r.deck_id == DeckId(1)));
    }

    #[test]
    fn test_scarcity_leaves_empty_slots() {
        let deck = deck(1, &["a", "b"]);
        let mut quiz = QuizComposer::new(4);
        let mut rng = StdRng::seed_from_u64(2);
        let variants = quiz.compose(&deck.cards[0], &deck, false, false, &[], &mut rng);
        assert_eq!(variants.len(), 4);
        assert_eq!(filled(&variants).len(), 2);
        assert_eq!(variants[2], None);
        assert_eq!(variants[3], None);
    }

    #[test]
    fn test_single_card_deck() {
        let deck = deck(1, &["a"]);
        let mut quiz = QuizComposer::new(3);
        let mut rng = StdRng::seed_from_u64(3);
        let variants = quiz.compose(&deck.cards[0], &deck, false, false, &[], &mut rng);
        assert_eq!(
            variants,
            vec![Some(CardRef::new(DeckId(1), CardId(1))), None, None]
        );
    }

    #[test]
    fn test_duplicate_answers_skipped() {
        let deck = deck(1, &["Paris", "paris ", "Rome", "Rome"]);
        let mut quiz = QuizComposer::new(4);
        let mut rng = StdRng::seed_from_u64(4);
        let variants = quiz.compose(&deck.cards[0], &deck, false, false, &[], &mut rng);
        // Only "Rome" is a usable distractor.
        assert_eq!(filled(&variants).len(), 2);
    }

    #[test]
    fn test_wider_pool_fills_missing_slots() {
        let home = deck(1, &["a", "b"]);
        let other = deck(2, &["x", "y", "z"]);
        let pool = vec![home.clone(), other];
        let mut quiz = QuizComposer::new(4);
        let mut rng = StdRng::seed_from_u64(5);
        let variants = quiz.compose(&home.cards[0], &home, false, false, &pool, &mut rng);
        let filled = filled(&variants);
        assert_eq!(filled.len(), 4);
        assert!(filled.contains(&CardRef::new(DeckId(1), CardId(2))));
        assert_eq!(filled.iter().filter(|r| r.deck_id == DeckId(2)).count(), 2);
    }

    #[test]
    fn test_inverted_uses_questions() {
        let mut home = deck(1, &["same", "same", "same"]);
        home.cards[1].question = "other".to_string();
        let mut quiz = QuizComposer::new(3);
        let mut rng = StdRng::seed_from_u64(6);
        let plain = quiz.compose(&home.cards[0], &home, false, false, &[], &mut rng);
        assert_eq!(filled(&plain).len(), 1);
        let inverted = quiz.compose(&home.cards[0], &home, true, false, &[], &mut rng);
        assert_eq!(filled(&inverted).len(), 3);
    }

    #[test]
    fn test_caching_is_stable() {
        let deck = deck(1, &["a", "b", "c", "d", "e", "f", "g", "h"]);
        let mut quiz = QuizComposer::new(4);
        let mut rng = StdRng::seed_from_u64(7);
        let first = quiz.compose(&deck.cards[0], &deck, false, true, &[], &mut rng);
        for _ in 0..20 {
            let again = quiz.compose(&deck.cards[0], &deck, false, true, &[], &mut rng);
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_cache_keyed_by_inversion() {
        let deck = deck(1, &["a", "b", "c", "d"]);
        let mut quiz = QuizComposer::new(4);
        let mut rng = StdRng::seed_from_u64(8);
        quiz.compose(&deck.cards[0], &deck, false, true, &[], &mut rng);
        quiz.compose(&deck.cards[0], &deck, true, true, &[], &mut rng);
        assert_eq!(quiz.cache.len(), 2);
    }

    #[test]
    fn test_clear_cache() {
        let deck = deck(1, &["a", "b", "c", "d", "e", "f", "g", "h"]);
        let mut quiz = QuizComposer::new(4);
        let mut rng = StdRng::seed_from_u64(9);
        quiz.compose(&deck.cards[0], &deck, false, true, &[], &mut rng);
        assert_eq!(quiz.cache.len(), 1);
        quiz.clear_cache();
        assert!(quiz.cache.is_empty());
    }
}

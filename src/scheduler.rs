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

//! Decides when cards become due again.

use crate::collection::Collection;
use crate::types::card::Card;
use crate::types::deck::DeckId;
use crate::types::interval::IntervalScheme;
use crate::types::timestamp::Timestamp;

enum Due {
    /// Due regardless of time: no scheme, an empty scheme, or never tested.
    Always,
    At(Timestamp),
    /// The interval reaches past the representable range.
    Never,
}

/// When a card becomes due. Learned cards are the caller's concern.
fn due_at(card: &Card, scheme: Option<&IntervalScheme>) -> Due {
    let Some(last_tested_at) = card.last_tested_at else {
        return Due::Always;
    };
    let Some(interval) = scheme.and_then(|scheme| scheme.interval_for(card.grade)) else {
        return Due::Always;
    };
    match last_tested_at.checked_add(interval.value) {
        Some(due) => Due::At(due),
        None => Due::Never,
    }
}

/// Whether a card may be selected for a session at `now`.
pub fn is_available(card: &Card, scheme: Option<&IntervalScheme>, now: Timestamp) -> bool {
    if card.is_learned {
        return false;
    }
    match due_at(card, scheme) {
        Due::Always => true,
        Due::At(due) => now >= due,
        Due::Never => false,
    }
}

/// The earliest instant at which any unlearned card in the given decks is
/// due. Returns `now` if some card is due unconditionally, and `None` if
/// every card in scope is learned.
pub fn earliest_availability(
    collection: &Collection,
    deck_ids: &[DeckId],
    now: Timestamp,
) -> Option<Timestamp> {
    let mut earliest: Option<Timestamp> = None;
    for deck in &collection.decks {
        if !deck_ids.contains(&deck.id) {
            continue;
        }
        let scheme = deck.exercise_preference.interval_scheme.as_ref();
        for card in deck.cards.iter().filter(|card| !card.is_learned) {
            match due_at(card, scheme) {
                Due::Always => return Some(now),
                Due::At(due) => {
                    if earliest.is_none_or(|e| due < e) {
                        earliest = Some(due);
                    }
                }
                Due::Never => {}
            }
        }
    }
    earliest
}

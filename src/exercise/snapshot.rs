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

//! A serializable copy of a session, so it can be resumed later.

use serde::Deserialize;
use serde::Serialize;

use crate::collection::Collection;
use crate::exercise::card::Base;
use crate::exercise::card::EntryTest;
use crate::exercise::card::ExerciseCard;
use crate::exercise::card::QuizTest;
use crate::exercise::state::ExerciseState;
use crate::types::deck::CardRef;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub cards: Vec<SnapshotCard>,
    pub current_position: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCard {
    #[serde(flatten)]
    pub base: Base,
    #[serde(flatten)]
    pub variant: SnapshotVariant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "testingMethod",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SnapshotVariant {
    Off,
    Manual,
    Quiz {
        variants: Vec<Option<CardRef>>,
        selected_variant: Option<usize>,
    },
    Entry {
        user_input: Option<String>,
    },
}

impl SessionSnapshot {
    pub fn of(state: &ExerciseState, current_position: usize) -> Self {
        let cards = state
            .cards()
            .iter()
            .map(|card| {
                let variant = match card {
                    ExerciseCard::Off(_) => SnapshotVariant::Off,
                    ExerciseCard::Manual(_) => SnapshotVariant::Manual,
                    ExerciseCard::Quiz(quiz) => SnapshotVariant::Quiz {
                        variants: quiz.variants.clone(),
                        selected_variant: quiz.selected_variant,
                    },
                    ExerciseCard::Entry(entry) => SnapshotVariant::Entry {
                        user_input: entry.user_input.clone(),
                    },
                };
                SnapshotCard {
                    base: card.base().clone(),
                    variant,
                }
            })
            .collect();
        Self {
            cards,
            current_position,
        }
    }

    /// Rebuilds the session against the current decks. Cards that no longer
    /// exist are dropped, as are quiz variants pointing at them. Returns
    /// `None` if nothing is left.
    pub fn restore(&self, collection: &Collection) -> Option<ExerciseState> {
        let mut cards = Vec::with_capacity(self.cards.len());
        for snapshot_card in &self.cards {
            let base = snapshot_card.base.clone();
            if collection.resolve(base.card).is_none() {
                log::warn!(
                    "Dropping card {} of deck {} from the snapshot: it no longer exists.",
                    base.card.card_id,
                    base.card.deck_id
                );
                continue;
            }
            let card = match &snapshot_card.variant {
                SnapshotVariant::Off => ExerciseCard::Off(base),
                SnapshotVariant::Manual => ExerciseCard::Manual(base),
                SnapshotVariant::Quiz {
                    variants,
                    selected_variant,
                } => ExerciseCard::Quiz(QuizTest {
                    base,
                    variants: variants
                        .iter()
                        .map(|slot| slot.filter(|card| collection.resolve(*card).is_some()))
                        .collect(),
                    selected_variant: *selected_variant,
                }),
                SnapshotVariant::Entry { user_input } => ExerciseCard::Entry(EntryTest {
                    base,
                    user_input: user_input.clone(),
                }),
            };
            cards.push(card);
        }
        if cards.is_empty() {
            None
        } else {
            log::debug!("Restored a session of {} cards.", cards.len());
            Some(ExerciseState::new(cards))
        }
    }
}

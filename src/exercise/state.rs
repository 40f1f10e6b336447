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

use crate::exercise::card::ExerciseCard;
use crate::exercise::card::ExerciseCardId;

/// The ordered cards of one session. The sequence is fixed once composed;
/// only the cards themselves change.
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseState {
    cards: Vec<ExerciseCard>,
}

impl ExerciseState {
    pub(crate) fn new(cards: Vec<ExerciseCard>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[ExerciseCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&ExerciseCard> {
        self.cards.get(position)
    }

    pub fn position(&self, id: ExerciseCardId) -> Option<usize> {
        self.cards.iter().position(|card| card.id() == id)
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut ExerciseCard> {
        self.cards.get_mut(position)
    }

    /// The number of cards with an answer.
    pub fn answered_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|card| card.base().is_answered())
            .count()
    }
}

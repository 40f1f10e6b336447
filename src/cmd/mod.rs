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

pub mod drill;
pub mod due;
pub mod stats;

use crate::collection::Collection;
use crate::types::deck::DeckId;

/// The decks named on the command line, or every deck if none were named.
fn select_decks(collection: &Collection, decks: &[i64]) -> Vec<DeckId> {
    if decks.is_empty() {
        collection.deck_ids()
    } else {
        decks.iter().copied().map(DeckId).collect()
    }
}

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

use serde::Serialize;

use crate::collection::Library;
use crate::error::Fallible;
use crate::scheduler::is_available;
use crate::types::timestamp::Timestamp;

pub fn print_stats(directory: Option<String>) -> Fallible<()> {
    let library = Library::open(directory)?;
    let stats = collect_stats(&library, Timestamp::now())?;
    let stats_json = serde_json::to_string_pretty(&stats)?;
    println!("{}", stats_json);
    Ok(())
}

fn collect_stats(library: &Library, now: Timestamp) -> Fallible<Stats> {
    let due_card_count = library
        .collection
        .decks
        .iter()
        .map(|deck| {
            let scheme = deck.exercise_preference.interval_scheme.as_ref();
            deck.cards
                .iter()
                .filter(|card| is_available(card, scheme, now))
                .count()
        })
        .sum();
    Ok(Stats {
        deck_count: library.db.deck_count()?,
        card_count: library.db.card_count()?,
        learned_card_count: library.db.learned_card_count()?,
        due_card_count,
        saved_session: library.db.latest_snapshot()?.map(|token| token.0),
    })
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    deck_count: usize,
    card_count: usize,
    learned_card_count: usize,
    due_card_count: usize,
    saved_session: Option<i64>,
}

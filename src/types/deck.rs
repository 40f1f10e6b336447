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

use std::fmt::Display;
use std::fmt::Formatter;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::error::fail;
use crate::types::card::Card;
use crate::types::card::CardId;
use crate::types::interval::IntervalScheme;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckId(pub i64);

impl Display for DeckId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for DeckId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for DeckId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(DeckId)
    }
}

/// Points at a card through its deck, since card ids are only unique within
/// a deck.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CardRef {
    pub deck_id: DeckId,
    pub card_id: CardId,
}

impl CardRef {
    pub fn new(deck_id: DeckId, card_id: CardId) -> Self {
        Self { deck_id, card_id }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub cards: Vec<Card>,
    pub exercise_preference: ExercisePreference,
}

impl Deck {
    pub fn new(id: DeckId, name: impl Into<String>, cards: Vec<Card>) -> Self {
        Self {
            id,
            name: name.into(),
            cards,
            exercise_preference: ExercisePreference::default(),
        }
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|card| card.id == id)
    }

    pub fn card_mut(&mut self, id: CardId) -> Option<&mut Card> {
        self.cards.iter_mut().find(|card| card.id == id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExercisePreference {
    pub testing_method: TestingMethod,
    pub interval_scheme: Option<IntervalScheme>,
    pub random_order: bool,
    pub card_inversion: CardInversion,
    /// Whether the question starts out visible.
    pub is_question_displayed: bool,
    /// Seconds allowed per answer. Zero disables the timer.
    pub time_for_answer: u32,
}

impl Default for ExercisePreference {
    fn default() -> Self {
        Self {
            testing_method: TestingMethod::Manual,
            interval_scheme: None,
            random_order: true,
            card_inversion: CardInversion::Off,
            is_question_displayed: true,
            time_for_answer: 0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TestingMethod {
    Off,
    Manual,
    Quiz,
    Entry,
}

impl TestingMethod {
    fn as_str(&self) -> &str {
        match self {
            TestingMethod::Off => "off",
            TestingMethod::Manual => "manual",
            TestingMethod::Quiz => "quiz",
            TestingMethod::Entry => "entry",
        }
    }
}

impl TryFrom<String> for TestingMethod {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "off" => Ok(TestingMethod::Off),
            "manual" => Ok(TestingMethod::Manual),
            "quiz" => Ok(TestingMethod::Quiz),
            "entry" => Ok(TestingMethod::Entry),
            _ => fail(format!("Invalid testing method: {}", value)),
        }
    }
}

impl ToSql for TestingMethod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TestingMethod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        TestingMethod::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CardInversion {
    Off,
    On,
    EveryOtherLap,
    Randomly,
}

impl CardInversion {
    fn as_str(&self) -> &str {
        match self {
            CardInversion::Off => "off",
            CardInversion::On => "on",
            CardInversion::EveryOtherLap => "every_other_lap",
            CardInversion::Randomly => "randomly",
        }
    }
}

impl TryFrom<String> for CardInversion {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "off" => Ok(CardInversion::Off),
            "on" => Ok(CardInversion::On),
            "every_other_lap" => Ok(CardInversion::EveryOtherLap),
            "randomly" => Ok(CardInversion::Randomly),
            _ => fail(format!("Invalid card inversion: {}", value)),
        }
    }
}

impl ToSql for CardInversion {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CardInversion {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        CardInversion::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

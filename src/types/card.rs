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
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::types::timestamp::Timestamp;

/// Identifies a card within its deck.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub i64);

impl Display for CardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for CardId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for CardId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(CardId)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub ordinal: u32,
    pub question: String,
    pub answer: String,
    /// The number of completed review events.
    pub lap: u32,
    /// The difficulty bucket assigned by the most recent review.
    pub grade: u32,
    /// Learned cards are never selected for study again.
    pub is_learned: bool,
    pub last_tested_at: Option<Timestamp>,
}

impl Card {
    pub fn new(id: CardId, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id,
            ordinal: 0,
            question: question.into().trim().to_string(),
            answer: answer.into().trim().to_string(),
            lap: 0,
            grade: 0,
            is_learned: false,
            last_tested_at: None,
        }
    }

    /// The text shown as the prompt, swapping sides for inverted cards.
    pub fn question_side(&self, is_inverted: bool) -> &str {
        if is_inverted {
            &self.answer
        } else {
            &self.question
        }
    }

    /// The text expected as the response, swapping sides for inverted cards.
    pub fn answer_side(&self, is_inverted: bool) -> &str {
        if is_inverted {
            &self.question
        } else {
            &self.answer
        }
    }
}

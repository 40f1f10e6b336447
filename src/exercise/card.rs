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

use serde::Deserialize;
use serde::Serialize;

use crate::types::deck::CardRef;
use crate::types::deck::TestingMethod;

/// Identifies an exercise card within a session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExerciseCardId(pub u64);

impl Display for ExerciseCardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The state every exercise card carries, whatever its testing method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    pub id: ExerciseCardId,
    /// The underlying card. The session never owns it.
    pub card: CardRef,
    /// Whether question and answer are swapped. Fixed at creation.
    pub is_inverted: bool,
    pub is_question_displayed: bool,
    /// `None` until the card is answered.
    pub is_answer_correct: Option<bool>,
    pub hint: Option<String>,
    /// Seconds left on the answer timer.
    pub time_left: u32,
    pub is_expired: bool,
    /// The card's grade when the session was composed.
    pub initial_grade: u32,
    pub is_grade_edited_manually: bool,
}

impl Base {
    pub fn is_answered(&self) -> bool {
        self.is_answer_correct.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuizTest {
    pub base: Base,
    /// The answer slots. Empty slots mean there were not enough distinct
    /// distractors.
    pub variants: Vec<Option<CardRef>>,
    pub selected_variant: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntryTest {
    pub base: Base,
    pub user_input: Option<String>,
}

/// A card as it is being studied in a session.
#[derive(Clone, Debug, PartialEq)]
pub enum ExerciseCard {
    /// No grading: revealing the answer completes the review.
    Off(Base),
    /// The user reports whether they remembered.
    Manual(Base),
    /// The user picks the answer from several variants.
    Quiz(QuizTest),
    /// The user types the answer.
    Entry(EntryTest),
}

impl ExerciseCard {
    pub fn base(&self) -> &Base {
        match self {
            ExerciseCard::Off(base) | ExerciseCard::Manual(base) => base,
            ExerciseCard::Quiz(quiz) => &quiz.base,
            ExerciseCard::Entry(entry) => &entry.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut Base {
        match self {
            ExerciseCard::Off(base) | ExerciseCard::Manual(base) => base,
            ExerciseCard::Quiz(quiz) => &mut quiz.base,
            ExerciseCard::Entry(entry) => &mut entry.base,
        }
    }

    pub fn id(&self) -> ExerciseCardId {
        self.base().id
    }

    /// The testing method this card is actually run with, which differs from
    /// the deck's in walking mode.
    pub fn testing_method(&self) -> TestingMethod {
        match self {
            ExerciseCard::Off(_) => TestingMethod::Off,
            ExerciseCard::Manual(_) => TestingMethod::Manual,
            ExerciseCard::Quiz(_) => TestingMethod::Quiz,
            ExerciseCard::Entry(_) => TestingMethod::Entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::card::CardId;
    use crate::types::deck::DeckId;

    fn base(id: u64) -> Base {
        Base {
            id: ExerciseCardId(id),
            card: CardRef::new(DeckId(1), CardId(id as i64)),
            is_inverted: false,
            is_question_displayed: true,
            is_answer_correct: None,
            hint: None,
            time_left: 0,
            is_expired: false,
            initial_grade: 0,
            is_grade_edited_manually: false,
        }
    }

    #[test]
    fn test_base_access() {
        let mut cards = vec![
            ExerciseCard::Off(base(1)),
            ExerciseCard::Manual(base(2)),
            ExerciseCard::Quiz(QuizTest {
                base: base(3),
                variants: vec![],
                selected_variant: None,
            }),
            ExerciseCard::Entry(EntryTest {
                base: base(4),
                user_input: None,
            }),
        ];
        for (i, card) in cards.iter_mut().enumerate() {
            assert_eq!(card.id(), ExerciseCardId(i as u64 + 1));
            card.base_mut().is_answer_correct = Some(true);
            assert!(card.base().is_answered());
        }
        let methods: Vec<TestingMethod> = cards.iter().map(|c| c.testing_method()).collect();
        assert_eq!(
            methods,
            vec![
                TestingMethod::Off,
                TestingMethod::Manual,
                TestingMethod::Quiz,
                TestingMethod::Entry
            ]
        );
    }
}

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

//! Field-level change notifications for whatever displays exercise cards.
//!
//! After every mutation the session recomputes the [`Projection`] of the
//! card it touched and hands it to the [`Notifier`], which compares it with
//! the last projection it saw and pushes one [`FieldChange`] per field that
//! differs.

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

use crate::collection::Collection;
use crate::exercise::card::ExerciseCard;
use crate::exercise::card::ExerciseCardId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    QuestionDisplayed,
    Question,
    Answer,
    Hint,
    AnswerStatus,
    TimeLeft,
    Expired,
    Vibrate,
    Learned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerStatus {
    Unanswered,
    UnansweredWithHint,
    Correct,
    Wrong,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    QuestionDisplayed(bool),
    Question(String),
    Answer(String),
    Hint(Option<String>),
    AnswerStatus(AnswerStatus),
    TimeLeft(u32),
    Expired(bool),
    /// Fired once, when an unanswered card runs out of time.
    Vibrate,
    /// Learned cards accept no input.
    Learned(bool),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            FieldValue::QuestionDisplayed(_) => Field::QuestionDisplayed,
            FieldValue::Question(_) => Field::Question,
            FieldValue::Answer(_) => Field::Answer,
            FieldValue::Hint(_) => Field::Hint,
            FieldValue::AnswerStatus(_) => Field::AnswerStatus,
            FieldValue::TimeLeft(_) => Field::TimeLeft,
            FieldValue::Expired(_) => Field::Expired,
            FieldValue::Vibrate => Field::Vibrate,
            FieldValue::Learned(_) => Field::Learned,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldChange {
    pub exercise_card_id: ExerciseCardId,
    pub value: FieldValue,
}

/// What a display needs to know about one exercise card.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub is_question_displayed: bool,
    pub question: String,
    pub answer: String,
    pub hint: Option<String>,
    pub answer_status: AnswerStatus,
    pub time_left: u32,
    /// Expired and not answered correctly.
    pub is_expired: bool,
    pub is_learned: bool,
    /// The raw flag, used to detect the expiry edge.
    raw_expired: bool,
}

impl Projection {
    /// Projects a card. Returns `None` if the underlying card is gone from
    /// the collection.
    pub fn of(exercise_card: &ExerciseCard, collection: &Collection) -> Option<Self> {
        let base = exercise_card.base();
        let card = collection.resolve(base.card)?;
        let answer_status = match base.is_answer_correct {
            Some(true) => AnswerStatus::Correct,
            Some(false) => AnswerStatus::Wrong,
            None if base.hint.is_some() => AnswerStatus::UnansweredWithHint,
            None => AnswerStatus::Unanswered,
        };
        Some(Self {
            is_question_displayed: base.is_question_displayed,
            question: card.question_side(base.is_inverted).to_string(),
            answer: card.answer_side(base.is_inverted).to_string(),
            hint: base.hint.clone(),
            answer_status,
            time_left: base.time_left,
            is_expired: base.is_expired && base.is_answer_correct != Some(true),
            is_learned: card.is_learned,
            raw_expired: base.is_expired,
        })
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::QuestionDisplayed(self.is_question_displayed),
            FieldValue::Question(self.question.clone()),
            FieldValue::Answer(self.answer.clone()),
            FieldValue::Hint(self.hint.clone()),
            FieldValue::AnswerStatus(self.answer_status),
            FieldValue::TimeLeft(self.time_left),
            FieldValue::Expired(self.is_expired),
            FieldValue::Learned(self.is_learned),
        ]
    }

    fn diff(&self, next: &Projection) -> Vec<FieldValue> {
        let mut changes: Vec<FieldValue> = self
            .values()
            .into_iter()
            .zip(next.values())
            .filter(|(old, new)| old != new)
            .map(|(_, new)| new)
            .collect();
        if !self.raw_expired && next.raw_expired {
            changes.push(FieldValue::Vibrate);
        }
        changes
    }
}

/// Chooses which changes a subscriber receives.
#[derive(Clone, Debug, Default)]
pub struct FieldSelector {
    card: Option<ExerciseCardId>,
    fields: Option<Vec<Field>>,
}

impl FieldSelector {
    /// Every field of every card.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn card(mut self, id: ExerciseCardId) -> Self {
        self.card = Some(id);
        self
    }

    pub fn fields(mut self, fields: &[Field]) -> Self {
        self.fields = Some(fields.to_vec());
        self
    }

    fn matches(&self, change: &FieldChange) -> bool {
        let card_matches = self.card.is_none_or(|id| id == change.exercise_card_id);
        let field_matches = self
            .fields
            .as_ref()
            .is_none_or(|fields| fields.contains(&change.value.field()));
        card_matches && field_matches
    }
}

pub struct Subscription {
    rx: UnboundedReceiver<FieldChange>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<FieldChange> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<FieldChange> {
        self.rx.try_recv().ok()
    }

    /// Takes every change received so far.
    pub fn drain(&mut self) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        while let Some(change) = self.try_recv() {
            changes.push(change);
        }
        changes
    }
}

struct Subscriber {
    selector: FieldSelector,
    tx: UnboundedSender<FieldChange>,
}

#[derive(Default)]
pub struct Notifier {
    subscribers: Vec<Subscriber>,
    last: HashMap<ExerciseCardId, Projection>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to changes. The subscriber first receives the current
    /// value of every selected field it has not seen yet.
    pub fn subscribe(&mut self, selector: FieldSelector) -> Subscription {
        let (tx, rx) = unbounded_channel();
        let mut ids: Vec<&ExerciseCardId> = self.last.keys().collect();
        ids.sort_by_key(|id| id.0);
        for id in ids {
            for value in self.last[id].values() {
                let change = FieldChange {
                    exercise_card_id: *id,
                    value,
                };
                if selector.matches(&change) {
                    let _ = tx.send(change);
                }
            }
        }
        self.subscribers.push(Subscriber { selector, tx });
        Subscription { rx }
    }

    /// Records the latest projection of a card and notifies subscribers of
    /// what changed.
    pub fn publish(&mut self, id: ExerciseCardId, projection: Projection) {
        let changes = match self.last.get(&id) {
            Some(previous) => previous.diff(&projection),
            None => projection.values(),
        };
        self.last.insert(id, projection);
        if changes.is_empty() {
            return;
        }
        self.subscribers.retain(|subscriber| !subscriber.tx.is_closed());
        for value in changes {
            let change = FieldChange {
                exercise_card_id: id,
                value,
            };
            for subscriber in &self.subscribers {
                if subscriber.selector.matches(&change) {
                    let _ = subscriber.tx.send(change.clone());
                }
            }
        }
    }

    /// Forgets every card, e.g. when a new session replaces the old one.
    pub fn reset(&mut self) {
        self.last.clear();
    }
}

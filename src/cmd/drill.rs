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

//! Drills a session in the terminal.

use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::io::stdin;

use crate::cmd::select_decks;
use crate::collection::Library;
use crate::db::Database;
use crate::db::SnapshotToken;
use crate::error::Fallible;
use crate::error::fail;
use crate::exercise::card::ExerciseCard;
use crate::exercise::card::ExerciseCardId;
use crate::exercise::composer::SessionComposer;
use crate::exercise::notify::AnswerStatus;
use crate::exercise::notify::Field;
use crate::exercise::notify::FieldSelector;
use crate::exercise::session::Exercise;
use crate::exercise::session::ExerciseHandle;

const HELP: &str = "Commands: :h hint, :g <n> set grade, :l mark learned, :s skip, :q quit.";

pub async fn drill(directory: Option<String>, decks: Vec<i64>, resume: bool) -> Fallible<()> {
    let Library {
        config,
        db,
        collection,
        ..
    } = Library::open(directory)?;

    let (exercise, start, resumed_from): (Exercise, usize, Option<SnapshotToken>) = if resume {
        let Some(token) = db.latest_snapshot()? else {
            return fail("no saved session to resume.");
        };
        let Some(snapshot) = db.load_snapshot(token)? else {
            return fail("saved session is missing.");
        };
        let Some(state) = snapshot.restore(&collection) else {
            db.delete_snapshot(token)?;
            return fail("saved session has no cards left.");
        };
        let start = snapshot.current_position.min(state.len() - 1);
        (Exercise::new(collection, state), start, Some(token))
    } else {
        let deck_ids = select_decks(&collection, &decks);
        let mut composer = SessionComposer::from_entropy(config.quiz_variant_count);
        let exercise = Exercise::start(collection, &mut composer, &deck_ids)?;
        (exercise, 0, None)
    };
    println!("Drilling {} cards. {HELP}", exercise.state().len());

    let handle = ExerciseHandle::new(exercise);
    let mut expiry = handle.with(|e| e.subscribe(FieldSelector::all().fields(&[Field::Vibrate])));
    let notices = tokio::spawn(async move {
        while let Some(change) = expiry.recv().await {
            println!("Time is up for card {}!", change.exercise_card_id);
        }
    });

    let mut lines = BufReader::new(stdin()).lines();
    let outcome = study(&handle, &mut lines, start).await;
    notices.abort();

    let summary = finish(&handle, &db, resumed_from);
    let stopped_at = outcome?;
    let summary = summary?;
    if stopped_at < summary.len {
        let token = handle.with(|e| db.save_snapshot(&e.snapshot()))?;
        println!("Session {token} saved. Run with --resume to continue.");
    }
    println!(
        "Answered {} of {} cards, {} correctly.",
        summary.answered, summary.len, summary.correct
    );
    match handle.into_inner() {
        Some(exercise) => {
            exercise.end();
        }
        None => log::debug!("Session still referenced at exit."),
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
struct Summary {
    len: usize,
    answered: usize,
    correct: usize,
}

/// Stops every countdown and writes the session's changes to the database.
fn finish(
    handle: &ExerciseHandle,
    db: &Database,
    resumed_from: Option<SnapshotToken>,
) -> Fallible<Summary> {
    handle.with(|e| {
        e.stop_countdowns();
        e.persist(db)
    })?;
    if let Some(token) = resumed_from {
        db.delete_snapshot(token)?;
    }
    Ok(handle.with(|e| {
        let state = e.state();
        Summary {
            len: state.len(),
            answered: state.answered_count(),
            correct: state
                .cards()
                .iter()
                .filter(|card| card.base().is_answer_correct == Some(true))
                .count(),
        }
    }))
}

#[derive(Debug, PartialEq)]
enum Input {
    Hint,
    Grade(u32),
    Learned,
    Skip,
    Quit,
    Text(String),
}

fn parse_input(line: &str) -> Input {
    match line.trim().strip_prefix(':') {
        Some("h") => Input::Hint,
        Some("l") => Input::Learned,
        Some("s") => Input::Skip,
        Some("q") => Input::Quit,
        Some(rest) => match rest.strip_prefix("g ").and_then(|g| g.trim().parse().ok()) {
            Some(grade) => Input::Grade(grade),
            None => Input::Text(line.to_string()),
        },
        None => Input::Text(line.to_string()),
    }
}

/// Walks the session from `start` until it ends or the user quits. Returns
/// the position it stopped at.
async fn study<R>(handle: &ExerciseHandle, lines: &mut Lines<R>, start: usize) -> Fallible<usize>
where
    R: AsyncBufRead + Unpin,
{
    let len = handle.with(|e| e.state().len());
    let mut position = start;
    while position < len {
        handle.set_current_position(position);
        let Some(id) = handle.with(|e| e.state().get(position).map(|card| card.id())) else {
            break;
        };
        if handle.with(|e| is_done(e, id)) {
            position += 1;
            continue;
        }
        println!("{}", handle.with(|e| render(e, position, len)));
        loop {
            let Some(line) = lines.next_line().await? else {
                return Ok(position);
            };
            match parse_input(&line) {
                Input::Quit => return Ok(position),
                Input::Skip => break,
                Input::Hint => {
                    handle.with(|e| e.show_hint(id));
                    if let Some(hint) = handle.with(|e| e.projection(id).and_then(|p| p.hint)) {
                        println!("Hint: {hint}");
                    }
                }
                Input::Grade(grade) => {
                    handle.with(|e| e.set_grade(id, grade));
                    println!("Grade set to {grade}.");
                }
                Input::Learned => {
                    handle.with(|e| e.set_is_learned(id, true));
                    println!("Marked as learned.");
                    break;
                }
                Input::Text(text) => {
                    if let Some(message) = handle.with(|e| respond(e, id, &text)) {
                        println!("{message}");
                    }
                }
            }
            if handle.with(|e| is_done(e, id)) {
                break;
            }
        }
        position += 1;
    }
    Ok(position)
}

/// Whether the card needs no more input.
fn is_done(exercise: &Exercise, id: ExerciseCardId) -> bool {
    match exercise.projection(id) {
        Some(projection) => {
            projection.is_learned
                || matches!(
                    projection.answer_status,
                    AnswerStatus::Correct | AnswerStatus::Wrong
                )
        }
        None => true,
    }
}

fn render(exercise: &Exercise, position: usize, len: usize) -> String {
    let Some(card) = exercise.state().get(position) else {
        return String::new();
    };
    let Some(projection) = exercise.projection(card.id()) else {
        return String::new();
    };
    let deck_name = exercise
        .collection()
        .deck(card.base().card.deck_id)
        .map(|deck| deck.name.as_str())
        .unwrap_or_default();
    let mut lines = vec![format!("[{}/{len}] {deck_name}", position + 1)];
    if projection.is_question_displayed {
        lines.push(format!("Q: {}", projection.question));
    } else {
        lines.push("Press Enter to show the question.".to_string());
    }
    if projection.time_left > 0 {
        lines.push(format!("You have {} seconds.", projection.time_left));
    }
    match card {
        ExerciseCard::Off(_) => lines.push("Press Enter to reveal the answer.".to_string()),
        ExerciseCard::Manual(_) => {
            lines.push("Press Enter to reveal, then answer y or n.".to_string())
        }
        ExerciseCard::Quiz(quiz) => {
            for (i, variant) in quiz.variants.iter().enumerate() {
                let text = variant
                    .and_then(|card_ref| exercise.collection().resolve(card_ref))
                    .map(|c| c.answer_side(quiz.base.is_inverted))
                    .unwrap_or("-");
                lines.push(format!("  {}. {text}", i + 1));
            }
        }
        ExerciseCard::Entry(_) => lines.push("Type your answer.".to_string()),
    }
    lines.join("\n")
}

/// Applies a line of text to the card. Returns what to tell the user.
fn respond(exercise: &mut Exercise, id: ExerciseCardId, text: &str) -> Option<String> {
    let position = exercise.state().position(id)?;
    let projection = exercise.projection(id)?;
    let text = text.trim();
    if !projection.is_question_displayed {
        exercise.show_question(id);
        return Some(format!("Q: {}", projection.question));
    }
    let card = exercise.state().get(position)?;
    match card {
        ExerciseCard::Off(_) => {
            exercise.show_answer(id);
            return Some(format!("A: {}", projection.answer));
        }
        ExerciseCard::Manual(_) => match text {
            "" => return Some(format!("A: {}", projection.answer)),
            "y" | "yes" => exercise.answer(id, true),
            "n" | "no" => exercise.answer(id, false),
            _ => return Some("Answer y or n.".to_string()),
        },
        ExerciseCard::Quiz(quiz) => {
            let choice = text
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=quiz.variants.len()).contains(n));
            match choice {
                Some(n) => exercise.answer_quiz(id, n - 1),
                None => return Some("Pick one of the numbered answers.".to_string()),
            }
        }
        ExerciseCard::Entry(_) => {
            if text.is_empty() {
                return Some("Type your answer.".to_string());
            }
            exercise.answer_entry(id, text);
        }
    }
    let status = exercise.projection(id)?.answer_status;
    match status {
        AnswerStatus::Correct => Some(format!("Correct! A: {}", projection.answer)),
        AnswerStatus::Wrong => Some(format!("Wrong. A: {}", projection.answer)),
        _ => None,
    }
}

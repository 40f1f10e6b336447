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
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use chrono::Duration;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::config::DbConfig;

use crate::error::Fallible;
use crate::exercise::snapshot::SessionSnapshot;
use crate::types::card::Card;
use crate::types::card::CardId;
use crate::types::deck::CardInversion;
use crate::types::deck::CardRef;
use crate::types::deck::Deck;
use crate::types::deck::DeckId;
use crate::types::deck::ExercisePreference;
use crate::types::deck::TestingMethod;
use crate::types::interval::Interval;
use crate::types::interval::IntervalScheme;
use crate::types::timestamp::Timestamp;

/// Where decks come from and where review results go.
pub trait Storage {
    /// Every deck, with its preference, interval scheme, and cards in
    /// ordinal order.
    fn load_all_decks(&self) -> Fallible<Vec<Deck>>;

    fn persist_card_review(
        &self,
        card: CardRef,
        lap: u32,
        grade: u32,
        last_tested_at: Option<Timestamp>,
    ) -> Fallible<()>;

    fn persist_learned_flag(&self, card: CardRef, is_learned: bool) -> Fallible<()>;
}

/// Identifies a saved session snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SnapshotToken(pub i64);

impl Display for SnapshotToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(database_path: &str) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn })
    }

    /// Add a deck, its interval scheme, and its cards.
    pub fn add_deck(&self, deck: &Deck) -> Fallible<()> {
        log::debug!("Adding deck {} ({} cards).", deck.id, deck.cards.len());
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        insert_deck(&tx, deck)?;
        if let Some(scheme) = &deck.exercise_preference.interval_scheme {
            for interval in scheme.intervals() {
                insert_interval(&tx, deck.id, interval)?;
            }
        }
        for card in &deck.cards {
            insert_card(&tx, deck.id, card)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn deck_count(&self) -> Fallible<usize> {
        self.count("select count(*) from decks;")
    }

    pub fn card_count(&self) -> Fallible<usize> {
        self.count("select count(*) from cards;")
    }

    pub fn learned_card_count(&self) -> Fallible<usize> {
        self.count("select count(*) from cards where is_learned = 1;")
    }

    /// Save a session snapshot, returning the token to load it with.
    pub fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Fallible<SnapshotToken> {
        let content = serde_json::to_string(snapshot)?;
        let conn = self.acquire();
        let sql = "insert into session_snapshots (saved_at, content) values (?, ?) returning snapshot_id;";
        let snapshot_id: i64 =
            conn.query_row(sql, (Timestamp::now(), content), |row| row.get(0))?;
        let token = SnapshotToken(snapshot_id);
        log::debug!("Saved snapshot {token} ({} cards).", snapshot.cards.len());
        Ok(token)
    }

    pub fn load_snapshot(&self, token: SnapshotToken) -> Fallible<Option<SessionSnapshot>> {
        let conn = self.acquire();
        let sql = "select content from session_snapshots where snapshot_id = ?;";
        let content: Option<String> = conn
            .query_row(sql, [token.0], |row| row.get(0))
            .optional()?;
        match content {
            Some(content) => {
                log::debug!("Loaded snapshot {token}.");
                Ok(Some(serde_json::from_str(&content)?))
            }
            None => Ok(None),
        }
    }

    /// The most recently saved snapshot, if any.
    pub fn latest_snapshot(&self) -> Fallible<Option<SnapshotToken>> {
        let conn = self.acquire();
        let sql = "select snapshot_id from session_snapshots order by snapshot_id desc limit 1;";
        let snapshot_id: Option<i64> = conn.query_row(sql, [], |row| row.get(0)).optional()?;
        Ok(snapshot_id.map(SnapshotToken))
    }

    pub fn delete_snapshot(&self, token: SnapshotToken) -> Fallible<()> {
        let conn = self.acquire();
        conn.execute(
            "delete from session_snapshots where snapshot_id = ?;",
            [token.0],
        )?;
        Ok(())
    }

    fn count(&self, sql: &str) -> Fallible<usize> {
        let conn = self.acquire();
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

impl Storage for Database {
    fn load_all_decks(&self) -> Fallible<Vec<Deck>> {
        let conn = self.acquire();
        let mut decks = Vec::new();
        let sql = "select deck_id, name, testing_method, random_order, card_inversion, is_question_displayed, time_for_answer, has_interval_scheme from decks order by deck_id;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let deck_id: DeckId = row.get(0)?;
            let name: String = row.get(1)?;
            let testing_method: TestingMethod = row.get(2)?;
            let random_order: bool = row.get(3)?;
            let card_inversion: CardInversion = row.get(4)?;
            let is_question_displayed: bool = row.get(5)?;
            let time_for_answer: u32 = row.get(6)?;
            let has_interval_scheme: bool = row.get(7)?;
            let interval_scheme = if has_interval_scheme {
                Some(load_intervals(&conn, deck_id)?)
            } else {
                None
            };
            decks.push(Deck {
                id: deck_id,
                name,
                cards: load_cards(&conn, deck_id)?,
                exercise_preference: ExercisePreference {
                    testing_method,
                    interval_scheme,
                    random_order,
                    card_inversion,
                    is_question_displayed,
                    time_for_answer,
                },
            });
        }
        Ok(decks)
    }

    fn persist_card_review(
        &self,
        card: CardRef,
        lap: u32,
        grade: u32,
        last_tested_at: Option<Timestamp>,
    ) -> Fallible<()> {
        let conn = self.acquire();
        let sql = "update cards set lap = ?, grade = ?, last_tested_at = ? where deck_id = ? and card_id = ?;";
        conn.execute(
            sql,
            (lap, grade, last_tested_at, card.deck_id, card.card_id),
        )?;
        Ok(())
    }

    fn persist_learned_flag(&self, card: CardRef, is_learned: bool) -> Fallible<()> {
        let conn = self.acquire();
        let sql = "update cards set is_learned = ? where deck_id = ? and card_id = ?;";
        conn.execute(sql, (is_learned, card.deck_id, card.card_id))?;
        Ok(())
    }
}

fn insert_deck(tx: &Transaction, deck: &Deck) -> Fallible<()> {
    let preference = &deck.exercise_preference;
    let sql = "insert into decks (deck_id, name, testing_method, random_order, card_inversion, is_question_displayed, time_for_answer, has_interval_scheme) values (?, ?, ?, ?, ?, ?, ?, ?);";
    tx.execute(
        sql,
        (
            deck.id,
            &deck.name,
            preference.testing_method,
            preference.random_order,
            preference.card_inversion,
            preference.is_question_displayed,
            preference.time_for_answer,
            preference.interval_scheme.is_some(),
        ),
    )?;
    Ok(())
}

fn insert_interval(tx: &Transaction, deck_id: DeckId, interval: &Interval) -> Fallible<()> {
    let sql = "insert into intervals (deck_id, grade, seconds) values (?, ?, ?);";
    tx.execute(
        sql,
        (deck_id, interval.grade, interval.value.num_seconds()),
    )?;
    Ok(())
}

fn insert_card(tx: &Transaction, deck_id: DeckId, card: &Card) -> Fallible<()> {
    let sql = "insert into cards (deck_id, card_id, ordinal, question, answer, lap, grade, is_learned, last_tested_at) values (?, ?, ?, ?, ?, ?, ?, ?, ?);";
    tx.execute(
        sql,
        (
            deck_id,
            card.id,
            card.ordinal,
            &card.question,
            &card.answer,
            card.lap,
            card.grade,
            card.is_learned,
            card.last_tested_at,
        ),
    )?;
    Ok(())
}

fn load_intervals(conn: &Connection, deck_id: DeckId) -> Fallible<IntervalScheme> {
    let sql = "select grade, seconds from intervals where deck_id = ? order by grade;";
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([deck_id])?;
    let mut intervals = Vec::new();
    while let Some(row) = rows.next()? {
        let grade: u32 = row.get(0)?;
        let seconds: i64 = row.get(1)?;
        intervals.push(Interval::new(grade, Duration::seconds(seconds)));
    }
    Ok(IntervalScheme::new(intervals))
}

fn load_cards(conn: &Connection, deck_id: DeckId) -> Fallible<Vec<Card>> {
    let sql = "select card_id, ordinal, question, answer, lap, grade, is_learned, last_tested_at from cards where deck_id = ? order by ordinal, card_id;";
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([deck_id])?;
    let mut cards = Vec::new();
    while let Some(row) = rows.next()? {
        let id: CardId = row.get(0)?;
        cards.push(Card {
            id,
            ordinal: row.get(1)?,
            question: row.get(2)?,
            answer: row.get(3)?,
            lap: row.get(4)?,
            grade: row.get(5)?,
            is_learned: row.get(6)?,
            last_tested_at: row.get(7)?,
        });
    }
    Ok(cards)
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    use super::*;
    use crate::collection::Collection;
    use crate::exercise::composer::SessionComposer;

    fn open(dir: &tempfile::TempDir) -> Fallible<Database> {
        Database::new(dir.path().join("test.db").to_str().unwrap())
    }

    fn capitals() -> Deck {
        let mut cards = vec![
            Card::new(CardId(2), "Germany", "Berlin"),
            Card::new(CardId(1), "France", "Paris"),
        ];
        cards[0].ordinal = 1;
        let mut deck = Deck::new(DeckId(1), "Capitals", cards);
        deck.exercise_preference.testing_method = TestingMethod::Quiz;
        deck.exercise_preference.card_inversion = CardInversion::EveryOtherLap;
        deck.exercise_preference.time_for_answer = 15;
        deck.exercise_preference.interval_scheme = Some(IntervalScheme::new([
            Interval::new(0, Duration::hours(8)),
            Interval::new(1, Duration::days(2)),
        ]));
        deck
    }

    #[test]
    fn test_empty_database() -> Fallible<()> {
        let dir = tempdir()?;
        let db = open(&dir)?;
        assert!(db.load_all_decks()?.is_empty());
        assert_eq!(db.deck_count()?, 0);
        assert_eq!(db.card_count()?, 0);
        assert_eq!(db.latest_snapshot()?, None);
        Ok(())
    }

    #[test]
    fn test_reopen_keeps_schema() -> Fallible<()> {
        let dir = tempdir()?;
        open(&dir)?.add_deck(&capitals())?;
        let db = open(&dir)?;
        assert_eq!(db.deck_count()?, 1);
        Ok(())
    }

    #[test]
    fn test_add_and_load_deck() -> Fallible<()> {
        let dir = tempdir()?;
        let db = open(&dir)?;
        db.add_deck(&capitals())?;
        db.add_deck(&Deck::new(DeckId(2), "Empty", vec![]))?;
        let decks = db.load_all_decks()?;
        assert_eq!(decks.len(), 2);
        let deck = &decks[0];
        assert_eq!(deck.name, "Capitals");
        // Ordered by ordinal.
        assert_eq!(deck.cards[0].id, CardId(1));
        assert_eq!(deck.cards[1].id, CardId(2));
        assert_eq!(deck.exercise_preference, capitals().exercise_preference);
        assert_eq!(decks[1].exercise_preference.interval_scheme, None);
        assert_eq!(db.card_count()?, 2);
        Ok(())
    }

    #[test]
    fn test_duplicate_deck_fails() -> Fallible<()> {
        let dir = tempdir()?;
        let db = open(&dir)?;
        db.add_deck(&capitals())?;
        assert!(db.add_deck(&capitals()).is_err());
        assert_eq!(db.card_count()?, 2);
        Ok(())
    }

    #[test]
    fn test_persist_review_and_learned() -> Fallible<()> {
        let dir = tempdir()?;
        let db = open(&dir)?;
        db.add_deck(&capitals())?;
        let now = Timestamp::now();
        let paris = CardRef::new(DeckId(1), CardId(1));
        db.persist_card_review(paris, 3, 2, Some(now))?;
        db.persist_learned_flag(paris, true)?;
        let decks = db.load_all_decks()?;
        let card = decks[0].card(CardId(1)).unwrap();
        assert_eq!((card.lap, card.grade, card.is_learned), (3, 2, true));
        assert_eq!(card.last_tested_at, Some(now));
        assert_eq!(db.learned_card_count()?, 1);
        Ok(())
    }

    #[test]
    fn test_snapshots() -> Fallible<()> {
        let dir = tempdir()?;
        let db = open(&dir)?;
        db.add_deck(&capitals())?;
        let collection = Collection::new(db.load_all_decks()?);
        let mut composer = SessionComposer::new(StdRng::seed_from_u64(1), 4);
        let state = composer.create(&collection, &[DeckId(1)], Timestamp::now())?;
        let snapshot = SessionSnapshot::of(&state, 1);

        let first = db.save_snapshot(&snapshot)?;
        let second = db.save_snapshot(&SessionSnapshot::of(&state, 0))?;
        assert_eq!(db.latest_snapshot()?, Some(second));
        assert_eq!(db.load_snapshot(first)?, Some(snapshot));
        assert_eq!(db.load_snapshot(SnapshotToken(99))?, None);

        db.delete_snapshot(second)?;
        assert_eq!(db.latest_snapshot()?, Some(first));
        Ok(())
    }
}

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

use std::env::current_dir;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::Config;
use crate::db::Database;
use crate::db::Storage;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::types::card::Card;
use crate::types::card::CardId;
use crate::types::deck::CardRef;
use crate::types::deck::Deck;
use crate::types::deck::DeckId;

/// The decks being studied, plus the session-wide toggles. This is loaded
/// once from storage and handed to the engine, which mutates it in place.
#[derive(Clone, Debug, Default)]
pub struct Collection {
    pub decks: Vec<Deck>,
    pub is_walking_mode: bool,
}

impl Collection {
    pub fn new(decks: Vec<Deck>) -> Self {
        Self {
            decks,
            is_walking_mode: false,
        }
    }

    pub fn deck(&self, id: DeckId) -> Option<&Deck> {
        self.decks.iter().find(|deck| deck.id == id)
    }

    pub fn card(&self, deck_id: DeckId, card_id: CardId) -> Option<&Card> {
        self.deck(deck_id).and_then(|deck| deck.card(card_id))
    }

    pub fn resolve(&self, card_ref: CardRef) -> Option<&Card> {
        self.card(card_ref.deck_id, card_ref.card_id)
    }

    pub fn card_mut(&mut self, deck_id: DeckId, card_id: CardId) -> Option<&mut Card> {
        self.decks
            .iter_mut()
            .find(|deck| deck.id == deck_id)
            .and_then(|deck| deck.card_mut(card_id))
    }

    pub fn deck_ids(&self) -> Vec<DeckId> {
        self.decks.iter().map(|deck| deck.id).collect()
    }
}

/// A collection directory on disk: its configuration, its database, and the
/// decks loaded from it.
pub struct Library {
    pub directory: PathBuf,
    pub config: Config,
    pub db: Database,
    pub collection: Collection,
}

impl Library {
    pub fn open(directory: Option<String>) -> Fallible<Self> {
        let directory: PathBuf = match directory {
            Some(dir) => PathBuf::from(dir),
            None => current_dir()?,
        };
        let directory = if directory.exists() {
            directory.canonicalize()?
        } else {
            return fail("directory does not exist.");
        };

        let config = Config::load(&directory)?;

        let db_path: PathBuf = directory.join(&config.database);
        let db_path: &str = db_path
            .to_str()
            .ok_or_else(|| ErrorReport::new("invalid path"))?;
        let db: Database = Database::new(db_path)?;

        let collection = {
            log::debug!("Loading decks...");
            let start = Instant::now();
            let decks = db.load_all_decks()?;
            let duration = start.elapsed().as_millis();
            log::debug!("Loaded {} decks in {duration}ms.", decks.len());
            let mut collection = Collection::new(decks);
            collection.is_walking_mode = config.walking_mode;
            collection
        };

        Ok(Self {
            directory,
            config,
            db,
            collection,
        })
    }
}

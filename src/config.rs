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

use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;

use crate::error::Fallible;
use crate::error::fail;

pub const CONFIG_FILE_NAME: &str = "lapcards.toml";

const DEFAULT_QUIZ_VARIANT_COUNT: usize = 4;

const DEFAULT_DATABASE: &str = "lapcards.db";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Start in walking mode: no timers, and quiz or entry decks fall back
    /// to self-graded cards.
    pub walking_mode: bool,
    /// Total number of quiz slots, including the correct answer.
    pub quiz_variant_count: usize,
    /// Path of the SQLite database, relative to the collection directory.
    pub database: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            walking_mode: false,
            quiz_variant_count: DEFAULT_QUIZ_VARIANT_COUNT,
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Fallible<Self> {
        let config: Config = toml::from_str(content)?;
        if config.quiz_variant_count < 2 {
            return fail("quiz_variant_count must be at least 2.");
        }
        Ok(config)
    }

    /// Reads `lapcards.toml` from the directory, or returns the defaults if
    /// there is no such file.
    pub fn load(directory: &Path) -> Fallible<Self> {
        let path = directory.join(CONFIG_FILE_NAME);
        if !path.exists() {
            log::debug!("No configuration file, using defaults.");
            return Ok(Self::default());
        }
        let content = read_to_string(path)?;
        Self::parse(&content)
    }
}

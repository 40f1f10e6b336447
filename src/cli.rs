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

use clap::Parser;

use crate::cmd::drill::drill;
use crate::cmd::due::print_due;
use crate::cmd::stats::print_stats;
use crate::error::Fallible;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Drill the cards that are due.
    Drill {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        /// Only drill cards from these decks. By default, every deck is drilled.
        #[arg(long = "deck")]
        decks: Vec<i64>,
        /// Resume the most recently saved session instead of starting a new one.
        #[arg(long)]
        resume: bool,
    },
    /// Print when the next card becomes available.
    Due {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        /// Only consider these decks. By default, every deck is considered.
        #[arg(long = "deck")]
        decks: Vec<i64>,
    },
    /// Print collection statistics as JSON.
    Stats {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Drill {
            directory,
            decks,
            resume,
        } => drill(directory, decks, resume).await,
        Command::Due { directory, decks } => print_due(directory, decks),
        Command::Stats { directory } => print_stats(directory),
    }
}

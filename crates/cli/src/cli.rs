// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tt_core::OpKind;

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Kind of write to stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Create,
    Update,
    Delete,
}

impl From<KindArg> for OpKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Create => OpKind::Create,
            KindArg::Update => OpKind::Update,
            KindArg::Delete => OpKind::Delete,
        }
    }
}

// Custom help template that groups commands into sections
const HELP_TEMPLATE: &str = "{about-with-newline}
{usage-heading} {usage}

{before-help}Options:
{options}{after-help}";

const COMMANDS_HELP: &str = "\
Writes:
  enqueue     Stage a write in the offline queue
  pending     List writes waiting to sync

Sync:
  run         Connect and sync until interrupted
  watch       Follow a remote collection live";

const QUICKSTART_HELP: &str = "\
Get started:
  tether enqueue create posts/p1 -p '{\"title\": \"hi\"}'   Stage a write
  tether pending                                        See what is queued
  tether run                                            Sync and report status
  tether watch leaderboard/event1                       Follow a collection";

#[derive(Parser)]
#[command(name = "tether", version)]
#[command(about = "Offline-first sync client for a remote document store")]
#[command(
    long_about = "Offline-first sync client for a remote document store.\n\n\
    Writes are queued durably while offline and replayed in order once the backend is reachable."
)]
#[command(help_template = HELP_TEMPLATE)]
#[command(before_help = COMMANDS_HELP)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file (default: ./tether.toml, then the user config directory)
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stage a write in the offline queue
    #[command(
        arg_required_else_help = true,
        after_help = "Examples:\n  \
        tether enqueue create posts/p1 -p '{\"title\": \"hi\"}'   Create a document\n  \
        tether enqueue update scores/alice -p '{\"points\": 3}'  Update a document\n  \
        tether enqueue delete posts/p1                         Delete a document"
    )]
    Enqueue {
        /// Kind of write
        #[arg(value_enum)]
        kind: KindArg,

        /// Target document path (e.g., posts/p1)
        path: String,

        /// JSON payload (required for create and update)
        #[arg(long, short)]
        payload: Option<String>,
    },

    /// List writes waiting to sync
    Pending {
        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Connect to the remote and sync until interrupted (Ctrl-C)
    Run,

    /// Follow a remote collection and print each snapshot
    #[command(
        arg_required_else_help = true,
        after_help = "Examples:\n  \
        tether watch feed                              Whole collection\n  \
        tether watch leaderboard/event1 --order-by score --desc -n 10   Top ten"
    )]
    Watch {
        /// Collection path
        collection: String,

        /// Maximum number of documents
        #[arg(long, short = 'n')]
        limit: Option<usize>,

        /// Field to order by
        #[arg(long, value_name = "FIELD")]
        order_by: Option<String>,

        /// Order descending
        #[arg(long, requires = "order_by")]
        desc: bool,
    },
}

#[cfg(test)]
#[path = "cli_tests/mod.rs"]
mod tests;

//! search-sync command-line library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (ingest, delete, drain, reindex, admin)

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli, Commands};
pub use commands::{
    handle_admin, http_client, init_tracing, load_settings, open_storage, print_change_summary,
    print_drain_report, print_reindex_report, read_entities, ChangeSummary, Pipeline,
};

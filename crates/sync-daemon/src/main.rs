//! search-sync
//!
//! Keeps an external search index in sync with the content store through
//! a transactional outbox.
//!
//! # Usage
//!
//! ```bash
//! search-sync ingest entities.json [--metadata-only]
//! search-sync delete ID...
//! search-sync drain [--limit N]
//! search-sync reindex --entity-type Publication [--index NAME]
//! search-sync admin stats
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/search-sync/config.toml)
//! 3. Environment variables (SEARCH_SYNC_*)
//! 4. CLI flags

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use sync_storage::Storage;
use sync_types::Settings;

use sync_daemon::{
    handle_admin, http_client, init_tracing, load_settings, open_storage, print_change_summary,
    print_drain_report, print_reindex_report, read_entities, Cli, Commands, Pipeline,
};

fn pipeline(settings: Settings, storage: Arc<Storage>) -> Result<Pipeline> {
    let client = http_client(&settings)?;
    Ok(Pipeline::new(settings, storage, client))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.db_path.as_deref(),
    )?;
    init_tracing(&settings)?;

    let storage = open_storage(&settings)?;

    match cli.command {
        Commands::Admin { command } => {
            handle_admin(&storage, command)?;
        }
        Commands::Ingest {
            file,
            metadata_only,
        } => {
            let entities = read_entities(Path::new(&file))?;
            let summary = pipeline(settings, storage)?.ingest(entities, metadata_only)?;
            print_change_summary("Stored", &summary);
        }
        Commands::Delete { ids } => {
            let summary = pipeline(settings, storage)?.delete(&ids)?;
            print_change_summary("Deleted", &summary);
        }
        Commands::Drain { limit } => {
            let report = pipeline(settings, storage)?.drain(limit).await?;
            print_drain_report(&report);
        }
        Commands::Reindex {
            entity_type,
            index,
            max_attempts,
        } => {
            let report = pipeline(settings, storage)?
                .reindex(&entity_type, index.as_deref(), max_attempts)
                .await?;
            print_reindex_report(&report);
        }
    }

    Ok(())
}

//! CLI argument parsing for search-sync.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Search index synchronisation
///
/// Queues content changes in an outbox and pushes them to an external
/// search index.
#[derive(Parser, Debug)]
#[command(name = "search-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/search-sync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store entities from a JSON file and queue them for indexing
    Ingest {
        /// JSON file holding an array of entities
        file: String,

        /// Report the changes as metadata-only modifications
        #[arg(long)]
        metadata_only: bool,
    },

    /// Delete entities and queue their removal from the index
    Delete {
        /// Entity ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Push every pending outbox record to the index
    Drain {
        /// Stop after this many records (0 = until empty)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Rebuild an index from scratch for one entity type
    Reindex {
        /// Entity type to reindex
        #[arg(short, long)]
        entity_type: String,

        /// Target index (default: {lowercase type}-{year})
        #[arg(short, long)]
        index: Option<String>,

        /// Push attempts per document
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

/// Admin subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Show database statistics
    Stats,

    /// Delete every pending outbox record (irreversible)
    ClearOutbox {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Trigger RocksDB compaction
    Compact,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_reindex() {
        let cli = Cli::parse_from([
            "search-sync",
            "reindex",
            "--entity-type",
            "Publication",
            "--max-attempts",
            "5",
        ]);
        match cli.command {
            Commands::Reindex {
                entity_type,
                index,
                max_attempts,
            } => {
                assert_eq!(entity_type, "Publication");
                assert!(index.is_none());
                assert_eq!(max_attempts, Some(5));
            }
            _ => panic!("Expected Reindex command"),
        }
    }

    #[test]
    fn test_cli_drain_with_limit() {
        let cli = Cli::parse_from(["search-sync", "drain", "--limit", "10"]);
        match cli.command {
            Commands::Drain { limit } => assert_eq!(limit, Some(10)),
            _ => panic!("Expected Drain command"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "search-sync",
            "drain",
            "--db-path",
            "/tmp/db",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.db_path.as_deref(), Some("/tmp/db"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_ingest_metadata_only() {
        let cli = Cli::parse_from(["search-sync", "ingest", "items.json", "--metadata-only"]);
        match cli.command {
            Commands::Ingest {
                file,
                metadata_only,
            } => {
                assert_eq!(file, "items.json");
                assert!(metadata_only);
            }
            _ => panic!("Expected Ingest command"),
        }
    }

    #[test]
    fn test_cli_delete_requires_ids() {
        assert!(Cli::try_parse_from(["search-sync", "delete"]).is_err());
        let cli = Cli::parse_from(["search-sync", "delete", "a", "b"]);
        match cli.command {
            Commands::Delete { ids } => assert_eq!(ids, vec!["a", "b"]),
            _ => panic!("Expected Delete command"),
        }
    }

    #[test]
    fn test_cli_admin_clear_outbox() {
        let cli = Cli::parse_from(["search-sync", "admin", "clear-outbox", "--yes"]);
        match cli.command {
            Commands::Admin {
                command: AdminCommands::ClearOutbox { yes },
            } => assert!(yes),
            _ => panic!("Expected Admin ClearOutbox command"),
        }
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chardid-node")]
#[command(about = "did:char node: replay sync, resolver, and authoring", long_about = None)]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override store data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Override authoring keys directory
    #[arg(short, long)]
    pub keys_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Directory for rolling log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay newly decided ballots into the local view
    Sync {
        /// Keep polling instead of exiting after one pass
        #[arg(long)]
        follow: bool,
    },

    /// Resolve a DID to its current document
    Resolve { did: String },

    /// Show the operation history of a DID
    History { did: String },

    /// Show store counters and the replay cursor
    Status,

    /// Create a new DID and submit its CREATE operation
    Create {
        /// Key algorithm for the commitment chains
        #[arg(long, default_value = "ed25519")]
        key_type: String,

        /// M-of-N threshold for both chains, e.g. "3-of-5"
        #[arg(long)]
        threshold: Option<String>,

        /// Initial service entries as id,type,endpoint
        #[arg(long = "service", value_name = "ID,TYPE,ENDPOINT")]
        services: Vec<String>,
    },

    /// Submit an UPDATE for a DID
    Update {
        did: String,

        /// Add a service: id,type,endpoint
        #[arg(long = "add-service", value_name = "ID,TYPE,ENDPOINT")]
        add_services: Vec<String>,

        /// Remove a service by id
        #[arg(long = "remove-service", value_name = "ID")]
        remove_services: Vec<String>,

        /// Add a verification key: id,type,hexkey,purposes
        #[arg(long = "add-key", value_name = "ID,TYPE,HEXKEY,PURPOSES")]
        add_keys: Vec<String>,

        /// Remove a verification key by id
        #[arg(long = "remove-key", value_name = "ID")]
        remove_keys: Vec<String>,
    },

    /// Submit a RECOVER for a DID (replaces the document, rotates both chains)
    Recover {
        did: String,

        /// New M-of-N threshold for both chains, e.g. "3-of-5"; omit to
        /// recover to single-key mode
        #[arg(long)]
        threshold: Option<String>,

        /// Service entries of the replacement document: id,type,endpoint
        #[arg(long = "service", value_name = "ID,TYPE,ENDPOINT")]
        services: Vec<String>,

        /// Verification keys of the replacement document: id,type,hexkey,purposes
        #[arg(long = "key", value_name = "ID,TYPE,HEXKEY,PURPOSES")]
        keys: Vec<String>,
    },

    /// Submit a DEACTIVATE for a DID (permanent)
    Deactivate { did: String },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod config;
pub mod init_config;
pub mod logging;
pub mod simulate;
pub mod state;
pub mod version;

use config::{default_config_path, GhostwireConfig};

/// Domain used when no config file exists
const FALLBACK_DOMAIN: &str = "example.org";

#[derive(Parser)]
#[command(name = "ghostwire")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for Ghostwire virtual user provisioning", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    InitConfig {
        /// Path to config file (default: ~/.local/share/ghostwire/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Homeserver domain virtual users are created on
        #[arg(long, default_value = FALLBACK_DOMAIN)]
        domain: String,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Provision a virtual user against an in-process homeserver and send a message
    Simulate {
        /// Path to config file (defaults are used if it does not exist)
        #[arg(long)]
        config: Option<String>,

        /// Localpart of the virtual user
        #[arg(long)]
        localpart: String,

        /// Room ID to send to
        #[arg(long)]
        room: String,

        /// Message text
        #[arg(long, default_value = "hello from ghostwire")]
        text: String,

        /// Do not configure the bot as invite fallback
        #[arg(long)]
        no_bot: bool,

        /// Make the room public instead of invite-only
        #[arg(long)]
        public: bool,

        /// Cache facts in this JSON state file across runs
        #[arg(long)]
        state_file: Option<String>,
    },

    /// Show cached registration and membership facts
    State {
        /// Path to config file (used to locate the state file)
        #[arg(long)]
        config: Option<String>,

        /// Path to the state file (overrides the config)
        #[arg(long)]
        state_file: Option<String>,
    },

    /// Display version information
    Version,
}

/// Load the config at `path` (or the default path), falling back to defaults
fn load_config(path: Option<String>) -> Result<GhostwireConfig, Box<dyn std::error::Error>> {
    match path.map(PathBuf::from) {
        Some(path) => GhostwireConfig::load(&path),
        None => {
            let path = default_config_path();
            if path.exists() {
                GhostwireConfig::load(&path)
            } else {
                Ok(GhostwireConfig::new(
                    FALLBACK_DOMAIN,
                    config::default_state_path(),
                ))
            }
        }
    }
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::InitConfig {
            config,
            domain,
            force,
        } => init_config::execute(config, domain, force).map(|_| ()),
        Commands::Simulate {
            config,
            localpart,
            room,
            text,
            no_bot,
            public,
            state_file,
        } => {
            let config = load_config(config)?;
            logging::init(&config.logging)?;
            let options = simulate::SimulateOptions {
                localpart,
                room,
                text,
                no_bot,
                public,
                state_file: state_file.map(PathBuf::from),
            };
            simulate::execute(&config, options).await.map(|_| ())
        }
        Commands::State { config, state_file } => {
            let state_path = match state_file {
                Some(path) => PathBuf::from(path),
                None => load_config(config)?.state.path,
            };
            state::execute(&state_path).await.map(|_| ())
        }
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

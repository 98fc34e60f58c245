pub mod commands;
pub mod console;
pub mod input;
pub mod render;

pub use commands::{Commands, Session};

use clap::Parser;
use eyre::{Context, Result};

use crate::config::{self, Configuration, load_configuration, lookup_config_path};

#[derive(Debug, Parser)]
#[command(
    version,
    about,
    long_about = r#"A terminal client for a RAG chat backend

Default configuration file location looks up in the following order:
    * $XDG_CONFIG_HOME/ragchat/config.toml
    * $HOME/.config/ragchat/config.toml
    * $HOME/.ragchat.toml
"#,
    disable_version_flag = true
)]
pub struct Command {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<String>,

    /// Show the version
    #[arg(short, long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Command {
    pub fn new() -> Command {
        Self::parse()
    }

    pub fn get_config(&self) -> Result<Configuration> {
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(|| lookup_config_path().unwrap_or_default());

        if config_path.is_empty() {
            // No config path is specified just use the default config
            return Ok(Configuration::default());
        }
        load_configuration(config_path.as_str()).wrap_err("loading configuration")
    }

    pub fn version(&self) -> bool {
        self.version
    }

    pub fn print_version(&self) {
        println!("{}", config::version())
    }

    /// The subcommand to run. Defaults to an interactive chat.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }
}

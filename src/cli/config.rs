use clap::{Parser, Subcommand};

use crate::recorder::config::RecorderConfig;
use crate::recorder::error::RecorderError;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "dom-recorder",
    version,
    about = "Record user interactions on a page model as replayable steps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: dom-recorder.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a page from a scenario file, run its script through a recorder
    /// and print the recorded steps as JSON
    Replay {
        /// Path to the scenario JSON file
        #[arg(long)]
        scenario: String,

        /// Override max_steps from the config file
        #[arg(long)]
        max_steps: Option<usize>,

        /// Also print each step's description to stderr
        #[arg(long, default_value_t = false)]
        describe: bool,

        /// Append the final session to this JSONL file
        #[arg(long)]
        save: Option<String>,
    },
}

// ============================================================================
// Config File Loading
// ============================================================================

pub const DEFAULT_CONFIG_PATH: &str = "dom-recorder.yaml";

/// Load the recorder config from YAML. A missing file yields defaults; a
/// file that exists but does not parse is an error.
pub fn load_config(path: Option<&str>) -> Result<RecorderConfig, RecorderError> {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    let content = match std::fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = config_path, "no config file, using defaults");
            return Ok(RecorderConfig::default());
        }
        Err(source) => {
            return Err(RecorderError::ConfigRead {
                path: config_path.to_string(),
                source,
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(RecorderConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|source| RecorderError::ConfigParse {
        path: config_path.to_string(),
        source,
    })
}

/// Map `-v` counts to a default tracing filter; `RUST_LOG` wins when set.
pub fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vizproxy", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Run as worker process (internal use)
    #[arg(long, hide = true)]
    pub worker: bool,

    /// Backend served by the worker (used with --worker)
    #[arg(long, value_name = "NAME", hide = true)]
    pub backend: Option<String>,

    /// Worker ID (used with --worker)
    #[arg(long, value_name = "ID", hide = true)]
    pub worker_id: Option<String>,

    /// Tick rate override in Hz (used with --worker)
    #[arg(long, value_name = "HZ", hide = true)]
    pub tick_rate: Option<f64>,

    /// Address the worker listens on (used with --worker)
    #[arg(long, value_name = "ADDR", hide = true)]
    pub bind: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive a backend end to end through a worker process
    Demo {
        #[command(subcommand)]
        demo_cmd: DemoCommands,
    },

    /// List the available backends
    Backends,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Plot a few series in subplots and save the figure
    Plot {
        /// Use the interactive backend and animate the first axes
        #[arg(long)]
        interactive: bool,

        /// Output image path
        #[arg(long, value_name = "PNG", default_value = "vizproxy-plot.png")]
        output: PathBuf,
    },

    /// Show a mesh and a rotating point cloud and capture the view
    Scene {
        /// Output image path
        #[arg(long, value_name = "PNG", default_value = "vizproxy-scene.png")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path; prints to stdout when omitted
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration in use
    Show {
        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}

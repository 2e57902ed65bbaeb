use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use vizproxy_backends::{create_backend, BACKENDS};
use vizproxy_config::{ConfigLoader, VizProxyConfig};
use vizproxy_logging::{init_logging_from_config, init_simple_tracing, init_worker_tracing};
use vizproxy_service::{run_worker, WorkerExit, WorkerOptions};

mod cli;
mod demo;

use cli::{Cli, Commands, ConfigCommands, DemoCommands};

/// Load configuration from a file, or from defaults plus environment
fn load_config(config_path: Option<&Path>) -> Result<VizProxyConfig> {
    let loader = ConfigLoader::new();
    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            loader
                .from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?
        }
        None => loader
            .from_env()
            .context("Failed to load configuration from environment")?,
    };
    Ok(config)
}

/// Run as worker process: serve one backend to the host that spawned us
fn run_worker_mode(cli: &Cli) -> Result<()> {
    // Worker logs go to stderr; stdout carries the readiness report
    init_worker_tracing(cli.log_level.as_deref().unwrap_or("info"))?;

    let config = load_config(cli.config.as_deref())?;
    let backend = cli
        .backend
        .clone()
        .unwrap_or_else(|| config.host.backend.clone());

    let mut options = WorkerOptions::from(&config.service);
    if let Some(worker_id) = &cli.worker_id {
        options.worker_id = worker_id.clone();
    }
    if let Some(rate) = cli.tick_rate {
        options.tick_rate = Some(rate);
    }
    if let Some(bind) = &cli.bind {
        options.bind_address = bind.clone();
    }
    info!(worker_id = %options.worker_id, backend = %backend, "starting worker");

    match run_worker(options, || create_backend(&backend)) {
        Ok(WorkerExit::AcceptTimeout) => {
            anyhow::bail!("no host connected to the worker")
        }
        Ok(exit) => {
            info!(exit = ?exit, "worker finished");
            Ok(())
        }
        Err(e) => {
            error!("Worker failed: {}", e);
            Err(e).context(format!("worker for backend '{}' failed", backend))
        }
    }
}

fn handle_backends() -> Result<()> {
    for backend in BACKENDS {
        let rate = backend
            .tick_rate
            .map_or_else(|| "request driven".to_string(), |hz| format!("{} Hz", hz));
        println!("{:<18} {} ({})", backend.name, backend.description, rate);
    }
    Ok(())
}

/// Handle configuration validation
fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match load_config(Some(config_file)) {
        Ok(_config) => {
            println!("Configuration file is valid");
            Ok(())
        }
        Err(e) => {
            println!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
fn handle_config_generate(output: Option<&PathBuf>, force: bool) -> Result<()> {
    let sample = VizProxyConfig::generate_sample();
    let Some(output) = output else {
        print!("{}", sample);
        return Ok(());
    };

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, sample).context("Failed to write configuration file")?;

    println!("Configuration generated at: {:?}", output);
    println!(
        "Validate with: vizproxy config validate --config-file {:?}",
        output
    );
    Ok(())
}

/// Handle configuration display
fn handle_config_show(config: &VizProxyConfig, format: &str) -> Result<()> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => {
            let yaml = serde_yaml::to_string(config).context("Failed to serialize to YAML")?;
            print!("{}", yaml);
        }
        "json" => {
            let json =
                serde_json::to_string_pretty(config).context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown output format: {}. Valid formats: yaml, json",
                format
            ));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Worker mode builds its own single-threaded runtime
    if cli.worker {
        return run_worker_mode(&cli);
    }

    if let Some(Commands::Config {
        config_cmd: ConfigCommands::Generate { output, force },
    }) = &cli.command
    {
        return handle_config_generate(output.as_ref(), *force);
    }
    if let Some(Commands::Config {
        config_cmd: ConfigCommands::Validate { config_file },
    }) = &cli.command
    {
        init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
        return handle_config_validate(config_file);
    }

    let config = load_config(cli.config.as_deref())?;
    match cli.log_level.as_deref() {
        Some(level) => init_simple_tracing(level)?,
        None => init_logging_from_config(&config.logging)?,
    }

    match &cli.command {
        Some(Commands::Backends) => handle_backends(),
        Some(Commands::Config { config_cmd }) => match config_cmd {
            ConfigCommands::Show { format } => handle_config_show(&config, format),
            ConfigCommands::Validate { .. } | ConfigCommands::Generate { .. } => Ok(()),
        },
        Some(Commands::Demo { demo_cmd }) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to build async runtime")?;
            let mut host_config = config.host.clone();
            if host_config.log_level.is_none() {
                host_config.log_level = cli.log_level.as_deref().and_then(|l| l.parse().ok());
            }
            match demo_cmd {
                DemoCommands::Plot {
                    interactive,
                    output,
                } => runtime.block_on(demo::run_plot(host_config, *interactive, output.clone())),
                DemoCommands::Scene { output } => {
                    runtime.block_on(demo::run_scene(host_config, output.clone()))
                }
            }
        }
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}

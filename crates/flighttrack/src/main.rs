//! `flighttrack` - CLI for the flight-status proxy and polling client
//!
//! This binary runs the proxy endpoint, watches a flight through it, or
//! performs one-off lookups.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use flighttrack::cli::{CheckCommand, Cli, Command, ConfigCommand, ServeCommand, WatchCommand};
use flighttrack::flight::FlightRecord;
use flighttrack::proxy::{self, FlightParams, FlightProxy};
use flighttrack::{init_logging, poller, render, watch, Config, Error, ProxyClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = match Config::load_from(cli.config.clone()) {
        Ok(config) => config,
        Err(e) if e.is_config_error() => {
            let path = cli.config.unwrap_or_else(Config::default_config_path);
            bail!("{e}\nCheck the configuration file at {}", path.display())
        }
        Err(e) => return Err(e.into()),
    };

    // Execute the command
    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, &serve_cmd).await,
        Command::Watch(watch_cmd) => handle_watch(config, &watch_cmd).await,
        Command::Check(check_cmd) => handle_check(&config, check_cmd).await,
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_serve(mut config: Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = &cmd.bind {
        config.server.bind.clone_from(bind);
    }
    config.validate()?;

    let addr = config.bind_addr()?;
    let proxy = FlightProxy::from_config(&config)?;
    if proxy.access_key().is_err() {
        warn!(
            "{} is not set; every request will fail until it is",
            config.provider.access_key_env
        );
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    proxy::serve(listener, Arc::new(proxy), proxy::shutdown_signal()).await?;
    Ok(())
}

async fn handle_watch(mut config: Config, cmd: &WatchCommand) -> anyhow::Result<()> {
    cmd.apply(&mut config);
    config.validate()?;

    let client = ProxyClient::from_config(&config)?;
    let flight_code = client.query().flight_code.clone();
    info!(
        flight = %flight_code,
        proxy = %config.client.proxy_url,
        "Watching flight; press Enter to refresh, Ctrl+C to quit"
    );

    let input = watch::stdin_lines().context("failed to start stdin reader")?;
    let handle = poller::spawn(Arc::new(client), config.refresh_interval());
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping");
        } else {
            std::future::pending::<()>().await;
        }
    };

    watch::run(handle, input, shutdown, |state| {
        println!("{}", "-".repeat(40));
        print!("{}", render::render_state(state, &flight_code, Utc::now()));
    })
    .await;
    Ok(())
}

async fn handle_check(config: &Config, cmd: CheckCommand) -> anyhow::Result<()> {
    let proxy = FlightProxy::from_config(config)?;
    let result = proxy.lookup(FlightParams::new(cmd.flight, cmd.date)).await;

    match result {
        Ok(envelope) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            } else {
                let record: FlightRecord = serde_json::from_value(envelope.flight)
                    .context("provider record has an unexpected shape")?;
                print!("{}", render::render_flight(&record, Utc::now()));
                let retrieved = envelope.timestamp.format("%Y-%m-%d %H:%M:%S UTC");
                println!("Retrieved: {retrieved}");
            }
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&e.envelope())?);
            }
            bail!("{e} (HTTP {})", e.status_code().as_u16())
        }
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!();
                println!("[Provider]");
                println!("  Base URL:           {}", config.provider.base_url);
                println!("  Access key env:     {}", config.provider.access_key_env);
                println!("  Timeout (secs):     {}", config.provider.timeout_secs);
                println!("  User agent:         {}", config.provider.user_agent);
                println!();
                println!("[Client]");
                println!("  Proxy URL:          {}", config.client.proxy_url);
                println!("  Flight:             {}", config.client.flight);
                println!(
                    "  Date:               {}",
                    config
                        .client
                        .date
                        .map_or_else(|| "latest".to_string(), |d| d.to_string())
                );
                println!(
                    "  Refresh (secs):     {}",
                    config.client.refresh_interval_secs
                );
                println!(
                    "  Timeout (secs):     {}",
                    config.client.request_timeout_secs
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());

            if !path.exists() {
                println!("Configuration file does not exist (using defaults)");
                return Ok(());
            }

            Config::load_from(Some(path))?;
            println!("Configuration is valid");
        }
    }
    Ok(())
}

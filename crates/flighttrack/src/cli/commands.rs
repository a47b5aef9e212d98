//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};

use crate::config::Config;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Base URL of the proxy (overrides `client.proxy_url`)
    #[arg(short, long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Flight code to track (overrides `client.flight`)
    #[arg(short, long, value_name = "CODE")]
    pub flight: Option<String>,

    /// Flight date, YYYY-MM-DD (overrides `client.date`)
    #[arg(short, long, value_name = "DATE")]
    pub date: Option<NaiveDate>,

    /// Seconds between automatic refreshes (overrides `client.refresh_interval_secs`)
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,
}

impl WatchCommand {
    /// Apply the flags on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(proxy) = &self.proxy {
            config.client.proxy_url.clone_from(proxy);
        }
        if let Some(flight) = &self.flight {
            config.client.flight.clone_from(flight);
        }
        if self.date.is_some() {
            config.client.date = self.date;
        }
        if let Some(interval) = self.interval {
            config.client.refresh_interval_secs = interval;
        }
    }
}

/// Check command arguments.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Flight code to look up (defaults to IX322)
    pub flight: Option<String>,

    /// Flight date, YYYY-MM-DD
    #[arg(short, long, value_name = "DATE")]
    pub date: Option<String>,

    /// Output the raw response envelope as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

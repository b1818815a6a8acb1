// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;

use chrono::Local;
use clap::Parser;
use cli::{Cli, Commands, ListArgs, PathArgs, StateArgs, WatchArgs};
use storage_registry::common::config::EnvConfig;
use storage_registry::utils::{format_bytes, usage_percent};
use storage_registry::{Result, StorageConfig, StorageId, StorageManager};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvConfig::log_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Some(Commands::List(args)) => run_list(&args, cli.verbose),
        Some(Commands::State(args)) => run_state(&args),
        Some(Commands::Path(args)) => run_path(&args),
        Some(Commands::Watch(args)) => run_watch(&args, cli.verbose).await,
        None => run_list(&ListArgs::default(), cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_list(args: &ListArgs, verbose: bool) -> Result<()> {
    let manager = StorageManager::with_config(StorageConfig::new().verbose(verbose))?;
    let infos = manager.get_storage_info()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    if infos.is_empty() {
        println!("No storage devices detected.");
        return Ok(());
    }

    println!(
        "{:<4} {:<18} {:<20} {:>12} {:>12} {:>7}  PATH",
        "ID", "AREA", "STATE", "TOTAL", "AVAILABLE", "USED"
    );
    for info in &infos {
        let state = info
            .state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let (available, used) = match info.available_bytes {
            Some(available) => (
                format_bytes(available),
                format!("{:.1}%", usage_percent(info.total_bytes, available)),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:<4} {:<18} {:<20} {:>12} {:>12} {:>7}  {}",
            info.id,
            info.area.to_string(),
            state,
            format_bytes(info.total_bytes),
            available,
            used,
            info.root_directory
        );
    }
    Ok(())
}

fn run_state(args: &StateArgs) -> Result<()> {
    let manager = StorageManager::new()?;
    println!("{}", manager.get_state(StorageId(args.id))?);
    Ok(())
}

fn run_path(args: &PathArgs) -> Result<()> {
    let manager = StorageManager::new()?;
    let path = manager.get_absolute_path(StorageId(args.id), args.kind)?;
    println!("{}", path.display());
    Ok(())
}

async fn run_watch(args: &WatchArgs, verbose: bool) -> Result<()> {
    let config = StorageConfig::new()
        .poll_interval(args.interval.saturating_mul(1000))
        .verbose(verbose);
    let manager = StorageManager::with_config(config)?;

    let ids: Vec<StorageId> = if args.ids.is_empty() {
        manager.all()?.map(|device| device.id()).collect()
    } else {
        args.ids.iter().copied().map(StorageId).collect()
    };

    let mut listeners = Vec::with_capacity(ids.len());
    for id in ids {
        let device = manager.get(id)?;
        let root = device.root_directory().display().to_string();
        let label = root.clone();
        let listener = manager.add_listener(id, move |change| {
            println!(
                "[{}] storage {} ({label}): {} -> {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                change.id,
                change.previous,
                change.state
            );
            Ok(())
        })?;
        println!("Watching storage {id} ({root}): {}", manager.get_state(id)?);
        listeners.push((id, listener));
    }

    if listeners.is_empty() {
        println!("No storage devices to watch.");
        return Ok(());
    }

    signal::ctrl_c().await?;
    info!("Stopping storage watch");

    for (id, listener) in listeners {
        if !manager.remove_listener(id, listener)? {
            warn!("Listener for storage {id} was already removed");
        }
    }
    Ok(())
}

//! `mapbridge` – runs the bridge behind its WebSocket gateway.
//!
//! 1. Loads `~/.mapbridge/bridge.toml`, writing the defaults on first run.
//! 2. Starts a [`Bridge`] around a [`RemoteEngine`], loading engine
//!    parameters from the configured file.
//! 3. Serves the gateway until **Ctrl-C**, then saves parameters and exits.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::Notify;
use tracing::warn;

use mapbridge_params::MemoryParamStore;
use mapbridge_runtime::{Bridge, Gateway, RemoteEngine, init_tracing};
use mapbridge_types::BridgeError;

use crate::config::Settings;

fn main() {
    let _guard = init_tracing("mapbridge");

    print_banner();

    let settings = load_settings();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: failed to start runtime: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(settings)) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
}

fn load_settings() -> Settings {
    match config::load() {
        Ok(Some(settings)) => {
            println!(
                "  Settings loaded from {}",
                config::settings_path().display().to_string().bold()
            );
            settings
        }
        Ok(None) => {
            let mut settings = Settings::default();
            match config::save(&settings) {
                Ok(()) => println!(
                    "  Default settings written to {}",
                    config::settings_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving settings".red(), e),
            }
            config::apply_env_overrides(&mut settings);
            settings
        }
        Err(e) => {
            println!("{}: {}", "Settings error".red(), e);
            println!("  Using default settings.");
            let mut settings = Settings::default();
            config::apply_env_overrides(&mut settings);
            settings
        }
    }
}

async fn run(settings: Settings) -> Result<(), BridgeError> {
    let shutdown = Arc::new(Notify::new());
    let notify = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – saving parameters …".yellow().bold());
        notify.notify_one();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; parameters will not be saved on Ctrl-C");
    }

    let engine = Arc::new(RemoteEngine::new(settings.event_capacity));
    let bridge = Arc::new(Bridge::start(
        engine.clone(),
        Arc::new(MemoryParamStore::new()),
        settings.bridge_config(),
    )?);
    println!(
        "  Parameters from {}",
        settings.parameters_file.display().to_string().dimmed()
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.gateway_port));
    let gateway = Gateway::new(bridge.clone(), engine.channel().clone());
    println!("  Gateway listening on {}\n", format!("ws://{addr}").bold().cyan());

    tokio::select! {
        result = gateway.run(addr) => result?,
        _ = shutdown.notified() => {}
    }

    let saved = bridge.shutdown()?;
    println!(
        "{}",
        format!(
            "  ✓ {} parameters saved to {}",
            saved.len(),
            settings.parameters_file.display()
        )
        .green()
    );
    Ok(())
}

fn print_banner() {
    println!();
    println!("{}", r#"   __  ___          ___       _    __         "#.bold().cyan());
    println!("{}", r#"  /  |/  /__ ____  / _ )____(_)__/ /__ ____ "#.bold().cyan());
    println!("{}", r#" / /|_/ / _ `/ _ \/ _  / __/ / _  / _ `/ -_)"#.bold().cyan());
    println!("{}", r#"/_/  /_/\_,_/ .__/____/_/ /_/\_,_/\_, /\__/ "#.bold().cyan());
    println!("{}", r#"           /_/                 /___/       "#.bold().cyan());
    println!();
    println!("  {} {}", "mapbridge".bold(), env!("CARGO_PKG_VERSION").dimmed());
    println!("  Event bridge for a mapping engine");
    println!();
}

mod analyzer;
mod collector;
mod config;
mod core;
mod rpc;
mod sources;

use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("txharbor=info".parse().unwrap()),
        )
        .init();

    // `txharbor analyze <day-directory>` runs the offline sourcelog report
    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        match (command.as_str(), args.next()) {
            ("analyze", Some(dir)) => {
                match analyzer::report_for_dir(Path::new(&dir)) {
                    Ok(report) => println!("{report}"),
                    Err(e) => {
                        tracing::error!("analyze failed for {dir}: {e}");
                        std::process::exit(1);
                    }
                }
                return;
            }
            ("analyze", None) => {
                eprintln!("usage: txharbor analyze <day-directory>");
                std::process::exit(2);
            }
            _ => {
                eprintln!("unknown command: {command}");
                std::process::exit(2);
            }
        }
    }

    tracing::info!("txharbor starting...");

    let config = Config::load("config.toml");
    tracing::info!("Config: {config:?}");
    if let Err(e) = config.validate() {
        tracing::error!("invalid config: {e}");
        std::process::exit(1);
    }

    std::fs::create_dir_all(&config.collector.out_dir)
        .expect("failed to create output directory");

    collector::start(&config).expect("failed to start collector");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    tracing::info!("shutting down");
}

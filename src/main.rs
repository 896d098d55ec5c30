//! segwatch - weather snapshots for monitored segments
//!
//! Prints a summary line every time the store publishes a snapshot. While
//! running, a segment id typed on stdin switches the selection and `refresh`
//! triggers an immediate background refresh.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use segwatch::cli::{Cli, StartupConfig};
use segwatch::data::{all_segments, get_segment_by_id, UvIndexClient, WeatherClient, WeatherSnapshot};
use segwatch::store::WeatherStore;
use segwatch::summary;

/// Log to stderr so stdout carries only snapshot output
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_segments() {
    for segment in all_segments() {
        println!(
            "{:<10} {} ({}) {:.4}, {:.4}",
            segment.id, segment.name, segment.location_label, segment.latitude, segment.longitude
        );
    }
}

/// Prints one published snapshot, fetching the UV index alongside it
async fn print_snapshot(
    uv: &UvIndexClient,
    snapshot: &WeatherSnapshot,
    json: bool,
) -> Result<(), serde_json::Error> {
    let Some(segment) = get_segment_by_id(snapshot.segment_id) else {
        return Ok(());
    };

    let uv_index = if snapshot.is_available() {
        Some(uv.fetch_uv_index(segment.latitude, segment.longitude).await)
    } else {
        None
    };

    if json {
        println!("{}", summary::json_line(segment, snapshot, uv_index)?);
    } else {
        println!("{}", summary::summary_line(segment, snapshot, uv_index));
    }
    Ok(())
}

/// Prints snapshots in publish order on its own task, so a slow UV lookup
/// never stalls stdin handling or Ctrl-C
async fn print_snapshots(
    uv: UvIndexClient,
    mut snapshots: mpsc::Receiver<Arc<WeatherSnapshot>>,
    json: bool,
) -> Result<(), serde_json::Error> {
    while let Some(snapshot) = snapshots.recv().await {
        print_snapshot(&uv, &snapshot, json).await?;
    }
    Ok(())
}

/// Handles one stdin line. In JSON mode stdout carries snapshot records only.
fn handle_command(store: &WeatherStore, command: &str, json: bool) {
    match command {
        "" => {}
        "refresh" => {
            store.request_refresh();
        }
        id => {
            if store.set_segment(id) && !json {
                println!("{}", summary::loading_line(store.selected_segment()));
            }
        }
    }
}

async fn run(config: StartupConfig) -> Result<(), Box<dyn std::error::Error>> {
    let http = config.provider.build_http_client()?;
    let weather = WeatherClient::with_client(http.clone(), config.provider.base_url.clone());
    let uv = UvIndexClient::with_client(http, config.provider.base_url.clone());

    let store = WeatherStore::start(weather, config.refresh.clone());
    let mut updates = store.subscribe();

    if !config.json {
        println!("{}", summary::loading_line(store.selected_segment()));
    }

    let (print_tx, print_rx) = mpsc::channel(8);
    let printer = tokio::spawn(print_snapshots(uv, print_rx, config.json));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = !config.once;
    let mut last_printed: Option<Arc<WeatherSnapshot>> = None;
    let mut interrupted = false;

    // Main event loop
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = updates.borrow_and_update().snapshot().cloned();
                let Some(snapshot) = latest else {
                    continue;
                };
                // Loading flag changes republish the same snapshot
                if last_printed.as_ref().is_some_and(|prev| Arc::ptr_eq(prev, &snapshot)) {
                    continue;
                }
                last_printed = Some(Arc::clone(&snapshot));
                if print_tx.send(snapshot).await.is_err() {
                    break;
                }
                if config.once {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => handle_command(&store, line.trim(), config.json),
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                interrupted = true;
                break;
            }
        }
    }

    drop(print_tx);
    store.shutdown().await;
    if interrupted {
        printer.abort();
    } else {
        // Let queued snapshots finish printing
        printer.await??;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            return ExitCode::from(2);
        }
    };

    if config.list_segments {
        print_segments();
        return ExitCode::SUCCESS;
    }

    init_tracing();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "segwatch stopped");
            ExitCode::FAILURE
        }
    }
}

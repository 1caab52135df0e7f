//! Subcommand implementations shared by the clap and interactive paths.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc;
use wildfire_map_fire_models::{Coordinates, Detection, FetchRequest, RequestId, legend};
use wildfire_map_source::DetectionBackend as _;
use wildfire_map_source::http::HttpBackend;
use wildfire_map_source::normalize::{NormalizeOptions, normalize_detections};
use wildfire_map_sync::overlay::popup_text;
use wildfire_map_sync::{ConfigError, MapSignal, SyncConfig, SyncController, SyncEvent};

use crate::command::{HELP, WatchCommand, parse_command};
use crate::surface::{INITIAL_VIEW, TerminalSurface};

/// Loads the config file if one was given, otherwise the defaults. The
/// backend URL environment override applies in both cases.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be loaded or fails
/// validation.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    match path {
        Some(path) => SyncConfig::load(path),
        None => {
            let config = SyncConfig::default().with_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

fn http_backend(config: &SyncConfig) -> Result<HttpBackend, Box<dyn std::error::Error>> {
    Ok(HttpBackend::new(&config.backend_url, config.request_timeout())?
        .with_date_range(config.date_range.clone()))
}

/// Fetches detections around `center` once and prints them.
///
/// # Errors
///
/// Returns an error if the arguments are out of range, the region is
/// unknown, or the backend call fails.
pub async fn fetch(
    config: &SyncConfig,
    center: Coordinates,
    radius_km: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    if !center.is_valid() {
        return Err(format!("invalid location ({}, {})", center.lat, center.lng).into());
    }
    if !(radius_km.is_finite() && radius_km > 0.0) {
        return Err(format!("radius must be a positive number of km, got {radius_km}").into());
    }

    let backend = http_backend(config)?;
    log::info!("Querying {} for detections", backend.url());

    let request = FetchRequest {
        center,
        radius_km,
        request_id: RequestId(1),
    };
    let response = backend.fetch_detections(&request).await?;

    let options = NormalizeOptions {
        region: config.region_filter()?,
    };
    let outcome = normalize_detections(&response.detections, &options);

    print!("{}", format_detections(&outcome.detections));
    if outcome.dropped_invalid + outcome.dropped_outside_region > 0 {
        println!(
            "({} invalid record(s) and {} outside the region skipped)",
            outcome.dropped_invalid, outcome.dropped_outside_region
        );
    }

    Ok(())
}

/// Prints the severity legend.
pub fn print_legend() {
    println!("{:<12} {:<9} CONFIDENCE", "SEVERITY", "COLOR");
    for entry in legend() {
        println!(
            "{:<12} {:<9} {}",
            entry.severity.label(),
            entry.color,
            entry.range
        );
    }
}

/// Runs an interactive session: stdin commands become map signals for a
/// [`SyncController`] drawing onto a [`TerminalSurface`].
///
/// # Errors
///
/// Returns an error if the backend client cannot be built, the controller
/// rejects the config, or stdin fails.
pub async fn watch(config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let backend = Arc::new(http_backend(config)?);
    log::info!("Watching with backend {}", backend.url());

    let (signals, signal_rx) = mpsc::channel(64);
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut controller = SyncController::new(config, backend, events_tx)?;
    let task = tokio::spawn(async move {
        controller.run(signal_rx).await;
    });

    println!("{HELP}");
    println!();
    signals
        .send(MapSignal::Created(TerminalSurface::new(INITIAL_VIEW)))
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(WatchCommand::Quit) => break,
                    Ok(command) => {
                        if let Some(signal) = command.into_signal() {
                            signals.send(signal).await?;
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            Some(event) = events.recv() => print_event(&event),
        }
    }

    drop(signals);
    task.await?;
    Ok(())
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::DetectionsUpdated(detections) => {
            println!();
            print!("{}", format_detections(detections));
        }
        SyncEvent::DetailRequested(detection) => {
            println!();
            println!("Detection {}", detection.id);
            println!("{}", popup_text(detection));
            for (key, value) in &detection.extra {
                println!("  {key}: {value}");
            }
        }
        SyncEvent::Error(message) => eprintln!("Fetch failed: {message}"),
    }
}

/// Renders detections as a fixed-width table followed by a count line.
fn format_detections(detections: &[Detection]) -> String {
    use std::fmt::Write as _;

    if detections.is_empty() {
        return "No fire detections in view.\n".to_string();
    }

    let mut out = format!(
        "{:<28} {:>9} {:>10} {:>5} {:<12} {:<8}\n",
        "ID", "LAT", "LNG", "CONF", "SEVERITY", "COLOR"
    );
    out.push_str(&"-".repeat(77));
    out.push('\n');

    for d in detections {
        let id = if d.id.chars().count() > 28 {
            format!("{}...", d.id.chars().take(25).collect::<String>())
        } else {
            d.id.clone()
        };
        let _ = writeln!(
            out,
            "{id:<28} {:>9.4} {:>10.4} {:>5.0} {:<12} {:<8}",
            d.lat,
            d.lng,
            d.confidence,
            d.severity.label(),
            d.color()
        );
    }

    let _ = writeln!(out, "\n{} detection(s)", detections.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wildfire_map_fire_models::classify;

    fn detection(id: &str, confidence: f64) -> Detection {
        Detection {
            id: id.to_string(),
            lat: 37.77,
            lng: -122.41,
            confidence,
            brightness: 330.0,
            frp: None,
            acquired_at: None,
            severity: classify(confidence).severity,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(format_detections(&[]), "No fire detections in view.\n");
    }

    #[test]
    fn table_lists_each_detection_with_severity() {
        let table = format_detections(&[detection("a", 85.0), detection("b", 15.0)]);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("ID"));
        assert!(lines[2].starts_with("a "));
        assert!(lines[2].contains("High"));
        assert!(lines[2].contains("#ff0000"));
        assert!(lines[3].contains("Low"));
        assert!(lines[3].contains("#ffff00"));
        assert_eq!(lines.last(), Some(&"2 detection(s)"));
    }

    #[test]
    fn long_ids_are_truncated() {
        let long = "x".repeat(40);
        let table = format_detections(&[detection(&long, 50.0)]);
        assert!(table.contains(&format!("{}...", "x".repeat(25))));
        assert!(!table.contains(&long));
    }

    #[test]
    fn missing_config_uses_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.debounce_ms, SyncConfig::default().debounce_ms);
    }
}

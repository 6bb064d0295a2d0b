#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the address locator.
//!
//! Runs the same search, details, and reverse paths the location-edit
//! screen uses, against the services configured in
//! `packages/geocoder/services/`. Set `RUST_LOG=debug` to watch the
//! waterfall and cache decisions.

use std::time::Instant;

use clap::{Parser, Subcommand};
use locator_engine::{AddressSearch, EngineConfig, ReverseResolver};
use locator_geocoder::service_registry::{ProviderSet, all_services};
use locator_geocoder_models::{Candidate, CandidateSource, Coordinates};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "locator", about = "Address search and reverse geocoding tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for addresses matching free text
    Search {
        /// Text as a citizen would type it (e.g., "Alameda 1500")
        text: String,
        /// Reference latitude for proximity ranking
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Reference longitude for proximity ranking
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Treat as an explicit search and fail when nothing is found
        #[arg(long)]
        submit: bool,
    },
    /// Resolve a primary provider place id to exact coordinates
    Details {
        /// Provider place identifier
        place_id: String,
    },
    /// Label the address at a coordinate
    Reverse {
        /// Latitude in degrees
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },
    /// List configured geocoding services
    Services,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    let cancel = cancel_on_ctrl_c();

    match cli.command {
        Commands::Services => print_services(),
        Commands::Search {
            text,
            lat,
            lon,
            submit,
        } => {
            let search = AddressSearch::new(load_providers(&config)?.forward, &config);
            let reference = lat.zip(lon).map(|(lat, lon)| Coordinates::new(lat, lon));

            let start = Instant::now();
            let candidates = if submit {
                search.submit(&text, reference, &cancel).await?
            } else {
                search.search(&text, reference, &cancel).await
            };
            log::info!(
                "{} candidate(s) for '{text}' in {:.2}s ({} cached list(s))",
                candidates.len(),
                start.elapsed().as_secs_f64(),
                search.cache().len()
            );
            print_candidates(&candidates);
        }
        Commands::Details { place_id } => {
            let search = AddressSearch::new(load_providers(&config)?.forward, &config);
            let candidate = Candidate::primary(place_id.clone(), place_id.clone());
            let result = search
                .details(&candidate, &cancel)
                .await
                .ok_or_else(|| format!("No details for place {place_id}"))?;
            println!("{}  {}", result.coordinates, result.formatted);
        }
        Commands::Reverse { lat, lon } => {
            let resolver = ReverseResolver::new(load_providers(&config)?.reverse, &config);
            let label = resolver
                .resolve(Coordinates::new(lat, lon), &cancel)
                .await;
            println!("{label}");
        }
    }

    Ok(())
}

fn load_providers(config: &EngineConfig) -> Result<ProviderSet, reqwest::Error> {
    let client = reqwest::Client::builder().build()?;
    Ok(ProviderSet::from_registry(&client, &config.default_locality))
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; cancelling outstanding requests");
            token.cancel();
        }
    });
    cancel
}

fn print_services() {
    println!("{:<16} {:<9} {:<8} {:<30} URL", "ID", "PRIORITY", "ENABLED", "NAME");
    println!("{}", "-".repeat(100));
    for service in &all_services() {
        println!(
            "{:<16} {:<9} {:<8} {:<30} {}",
            service.id,
            service.priority,
            service.enabled,
            service.name,
            service.base_url()
        );
    }
}

fn print_candidates(candidates: &[Candidate]) {
    if candidates.is_empty() {
        println!("No candidates.");
        return;
    }

    println!("{:<4} {:<9} {:>6}  {:<24} LABEL", "#", "SOURCE", "SCORE", "COORDINATES");
    println!("{}", "-".repeat(100));
    for (i, candidate) in candidates.iter().enumerate() {
        let score = candidate
            .score
            .map_or_else(|| "-".to_string(), |s| format!("{s:.2}"));
        let location = match (candidate.source, candidate.coordinates) {
            (_, Some(coordinates)) => coordinates.to_string(),
            (CandidateSource::Primary, None) => candidate
                .external_id
                .as_deref()
                .map_or_else(String::new, |id| format!("id:{id}")),
            (CandidateSource::Fallback, None) => String::new(),
        };
        println!(
            "{:<4} {:<9} {:>6}  {:<24} {}",
            i + 1,
            candidate.source.as_str(),
            score,
            location,
            candidate.label
        );
    }
}

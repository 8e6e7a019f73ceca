mod db;
mod fetch;
mod geocode;
mod parser;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use geocode::{GeocodeCache, GoogleGeocoder};
use settings::Settings;

#[derive(Parser)]
#[command(name = "food_prosecutions", about = "SA Health food prosecution register scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the register, geocode new prosecutions and store them
    Run {
        /// Store records without coordinates
        #[arg(long)]
        no_geocode: bool,
    },
    /// Extract prosecutions from a saved register page and print them as JSON
    Extract {
        /// Saved HTML of the register page
        #[arg(short, long)]
        file: PathBuf,
        /// Base URL used to build each record's link
        #[arg(long, default_value = settings::REGISTER_URL)]
        base_url: String,
    },
    /// Show store statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { no_geocode } => {
            let settings = Settings::load()?;
            run(&settings, !no_geocode).await
        }
        Commands::Extract { file, base_url } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let out = parser::process_page(&html, &base_url, &Default::default())?;
            println!("{}", serde_json::to_string_pretty(&out.records)?);
            for (id, reason) in &out.rejected {
                eprintln!("Rejected #{}: {}", id, reason);
            }
            Ok(())
        }
        Commands::Stats => {
            let settings = Settings::load()?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Prosecutions: {}", s.total);
            println!("Geocoded:     {}", s.geocoded);
            println!("Last scraped: {}", s.last_scraped.as_deref().unwrap_or("-"));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings, with_geocoding: bool) -> anyhow::Result<()> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let seen = db::existing_links(&conn)?;

    let client = fetch::build_client(settings)?;
    let html = fetch::fetch_page(&client, &settings.source_url, settings.max_retries).await?;

    let mut out = parser::process_page(&html, &settings.source_url, &seen)
        .context("Register page could not be segmented")?;
    if out.records.is_empty() {
        println!("No new prosecutions ({} found, {} already stored).", out.found, out.known);
        return Ok(());
    }

    if with_geocoding {
        let geocoder = GoogleGeocoder::new(client, settings.google_api_key.clone());
        let mut cache = GeocodeCache::new();
        let pb = ProgressBar::new(out.records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} geocoded")?
                .progress_chars("=> "),
        );
        geocode::geocode_all(&mut out.records, &geocoder, &mut cache, &pb).await;
        pb.finish_and_clear();
        info!(
            "Geocoded {} addresses ({} cache hits)",
            cache.addresses(),
            cache.hits()
        );
    }

    let inserted = db::insert_prosecutions(&conn, &out.records)?;
    println!(
        "Found {} prosecutions: {} already stored, {} rejected, {} saved.",
        out.found,
        out.known,
        out.rejected.len(),
        inserted
    );
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

//! Jikan client CLI application.
//!
//! Thin consumer of the access layer: each subcommand calls one endpoint
//! binding and prints what comes back.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jikan_client::types::{Anime, Page};
use jikan_client::{ClientOptions, Envelope, JikanClient};
use shared::Config;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search anime by free text
    Search {
        query: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Show full details for one anime
    Details { id: u32 },
    /// List works related to an anime
    Related { id: u32 },
    /// Show the top-ranked anime
    Top {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Show the anime of a season, e.g. 2024 spring
    Seasonal { year: u16, season: String },
    /// Pick a random anime
    Random,
    /// Show the broadcast schedule, optionally for one weekday
    Schedule { day: Option<String> },
}

fn client_options(config: &Config) -> ClientOptions {
    ClientOptions {
        requests_per_second: config.api.rate_limit.requests_per_second,
        requests_per_minute: config.api.rate_limit.requests_per_minute,
        cache_enabled: config.api.cache.enabled,
        cache_ttl: Duration::from_secs(config.api.cache.ttl_seconds),
        max_retries: config.api.retry.max_retries,
        retry_delay: Duration::from_millis(config.api.retry.retry_delay_ms),
        timeout: Duration::from_secs(config.api.timeout_seconds),
    }
}

fn print_anime_page(envelope: &Envelope<Page<Anime>>) {
    for anime in &envelope.data.data {
        let score = anime
            .score
            .map_or_else(|| "  -  ".to_string(), |s| format!("{s:5.2}"));
        println!("{:>6}  {}  {}", anime.mal_id, score, anime.title);
    }
    if let Some(pagination) = &envelope.data.pagination {
        println!(
            "-- page {} of {}",
            pagination.current_page.unwrap_or(1),
            pagination.last_visible_page
        );
    }
    if envelope.cached {
        println!("-- served from cache");
    }
}

fn print_anime_details(envelope: &Envelope<Anime>) {
    let anime = &envelope.data;
    println!("{} (#{})", anime.title, anime.mal_id);
    if let Some(english) = &anime.title_english {
        println!("English title: {english}");
    }
    if let Some(anime_type) = &anime.anime_type {
        let episodes = anime
            .episodes
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        println!("{anime_type}, {episodes} episodes");
    }
    if let Some(status) = &anime.status {
        println!("Status: {status}");
    }
    if let Some(score) = anime.score {
        println!("Score: {score}");
    }
    if !anime.genres.is_empty() {
        let names: Vec<&str> = anime.genres.iter().map(|g| g.name.as_str()).collect();
        println!("Genres: {}", names.join(", "));
    }
    if let Some(synopsis) = &anime.synopsis {
        println!("\n{synopsis}");
    }
    if envelope.cached {
        println!("-- served from cache");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        config
            .logging
            .default_level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    };

    shared::logging::init(shared::LogConfig {
        log_dir: config.logging.log_dir.clone(),
        component: "jikan-client".to_string(),
        default_level: log_level,
        console: config.logging.console,
        file: config.logging.file,
        json_format: config.logging.json_format,
    })?;

    info!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize API client
    let client = JikanClient::new(config.api.base_url.clone(), client_options(&config))
        .context("Failed to create Jikan client")?;

    match args.command {
        Command::Search { query, page } => {
            let envelope = client.search_anime(&query, page).await?;
            print_anime_page(&envelope);
        }
        Command::Details { id } => {
            let envelope = client.get_anime_details(id).await?;
            print_anime_details(&envelope);
        }
        Command::Related { id } => {
            let envelope = client.get_related_anime(id).await;
            if envelope.data.is_empty() {
                println!("No related works found");
            }
            for entry in &envelope.data {
                let title = entry.title.as_deref().unwrap_or("(untitled)");
                let kind = entry.entity_type.as_deref().unwrap_or("?");
                match entry.mal_id {
                    Some(id) => println!("{id:>6}  [{kind}] {title}"),
                    None => println!("     -  [{kind}] {title}"),
                }
            }
        }
        Command::Top { page } => {
            let envelope = client.get_top_anime(page).await?;
            print_anime_page(&envelope);
        }
        Command::Seasonal { year, season } => {
            let envelope = client.get_seasonal_anime(year, &season).await?;
            print_anime_page(&envelope);
        }
        Command::Random => {
            let envelope = client.get_random_anime().await?;
            print_anime_details(&envelope);
        }
        Command::Schedule { day } => {
            let envelope = client.get_schedules(day.as_deref()).await?;
            print_anime_page(&envelope);
        }
    }

    Ok(())
}

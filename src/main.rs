//! `sourcery` CLI - Resolve a media item into playable stream links

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use sourcery::{HttpTransport, MediaIdentity, SourceResolver};

#[derive(Parser)]
#[command(name = "sourcery")]
#[command(about = "Resolve a media item into playable stream URLs and subtitles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one media item
    Resolve {
        /// Media title
        title: String,

        /// Release year
        year: u16,

        /// Primary catalog id (e.g., TMDB id)
        id: String,

        /// External catalog id (e.g., tt1234567)
        #[arg(long)]
        imdb: Option<String>,

        /// Season number (marks the item as a show)
        #[arg(short, long)]
        season: Option<u32>,

        /// Episode number
        #[arg(short, long)]
        episode: Option<u32>,

        /// Overall deadline in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Return whatever was collected when the deadline hits
        #[arg(long)]
        best_effort: bool,
    },

    /// List the currently healthy providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = sourcery::config::load()?;
    let transport = Arc::new(HttpTransport::new()?);
    let resolver = SourceResolver::new(transport, config.backend.clone(), config.key.clone());

    match cli.command {
        Commands::Resolve {
            title,
            year,
            id,
            imdb,
            season,
            episode,
            timeout,
            best_effort,
        } => {
            if config.key.secret.is_empty() {
                println!("⚠️  No cipher key configured; encrypted backends will fail");
            }

            let mut identity = MediaIdentity::new(title, year, id);
            if let Some(imdb) = imdb {
                identity = identity.with_imdb_id(imdb);
            }

            println!("🔎 Resolving: {} ({})", identity.title, identity.release_year);

            let result = match timeout {
                Some(secs) => {
                    resolver
                        .resolve_within(
                            &identity,
                            season,
                            episode,
                            Duration::from_secs(secs),
                            best_effort,
                        )
                        .await?
                }
                None => resolver.resolve(&identity, season, episode).await?,
            };

            println!("\n📺 Streams ({}):", result.variants.len());
            for variant in &result.variants {
                println!("   {} -> {}", variant.label, variant.url);
            }

            println!("\n💬 Subtitles ({}):", result.subtitles.len());
            for subtitle in &result.subtitles {
                println!("   [{}] {}", subtitle.language, subtitle.url);
            }
        }

        Commands::Providers => {
            let providers = resolver.directory().list_providers().await?;
            println!("🛰  {} providers (fallback order):", providers.len());
            for (index, provider) in providers.iter().enumerate() {
                println!("   {}. {provider}", index + 1);
            }
        }
    }

    Ok(())
}

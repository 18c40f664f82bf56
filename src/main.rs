use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use listing_cards::{
    clean_cards, filter_cards, filter_many, CleanOptions, Config, HashingEmbedder, Settings,
};

#[derive(Parser)]
#[command(name = "listing_cards", about = "Extract product cards from listing pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the product cards of each page as JSON lines
    Filter {
        /// HTML files to read
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Max cards per page
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
        /// Free-text query that boosts matching cards
        #[arg(short, long)]
        query: Option<String>,
        /// Max characters of text in a card
        #[arg(long)]
        max_chars: Option<usize>,
        /// Min words for an element to be scored
        #[arg(long)]
        min_words: Option<usize>,
        /// Wrap each card in its ancestor path
        #[arg(long)]
        ancestry: bool,
        /// Drop cards whose text is this similar to an earlier card
        #[arg(long)]
        semantic: Option<f32>,
    },
    /// Product preset + LLM cleanup of one page, printed as text
    Clean {
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct PageCards<'a> {
    file: &'a str,
    fragments: &'a [String],
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Filter {
            files,
            top_n,
            query,
            max_chars,
            min_words,
            ancestry,
            semantic,
        } => {
            let mut config = Settings::from_env()
                .context("reading CARDS_* settings")?
                .into_config();
            if let Some(n) = top_n {
                config = config.with_keep_top_n(n);
            }
            if let Some(q) = query {
                config = config.with_query(&q);
            }
            if let Some(n) = max_chars {
                config = config.with_max_chars(n);
            }
            if let Some(n) = min_words {
                config = config.with_min_words(n);
            }
            if ancestry {
                config = config.with_ancestry(true);
            }
            if let Some(threshold) = semantic {
                config = config.with_semantic_dedup(Arc::new(HashingEmbedder::default()), threshold);
            }
            filter_files(&files, &config)
        }
        Commands::Clean { file } => {
            let markup = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let cards = filter_cards(&markup, &Config::product_preset())?;
            println!("{}", clean_cards(&cards, &CleanOptions::default()));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("done in {}", format_duration(elapsed));
    }

    result
}

fn filter_files(files: &[PathBuf], config: &Config) -> anyhow::Result<()> {
    let pb = if files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut cards = 0;
    for chunk in files.chunks(64) {
        let pages = chunk
            .iter()
            .map(|path| {
                std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let results = filter_many(&pages, config)?;

        for (path, fragments) in chunk.iter().zip(&results) {
            cards += fragments.len();
            let line = serde_json::to_string(&PageCards {
                file: &path.to_string_lossy(),
                fragments,
            })?;
            pb.suspend(|| println!("{line}"));
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    info!(files = files.len(), cards, "filtered");
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

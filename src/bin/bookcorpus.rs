//! `bookcorpus` command-line tool
//!
//! ```text
//! bookcorpus fetch --out-dir out_txts --manifest url_list.jsonl --filter-word-count
//! bookcorpus sentences out_txts > all.sentences.txt
//! bookcorpus tokenize < all.sentences.txt > all.tokens.txt
//! ```

use bookcorpus_dl::{
    Config, EpubTextConverter, Error, Harvester, HttpRetrieval, Result, run_until_signal,
    sentences, tokenize,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Build a plain-text book corpus from an ebook catalog manifest
#[derive(Parser, Debug)]
#[command(name = "bookcorpus", version, about)]
struct Args {
    /// JSON configuration file; command-line flags override its values
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download every manifest entry that is not already in the output directory
    Fetch {
        /// Directory receiving one .txt per book
        #[arg(long, visible_alias = "out", value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Newline-delimited JSON manifest
        #[arg(long, visible_aliases = ["list", "list-path"], value_name = "PATH")]
        manifest: Option<PathBuf>,

        /// Drop converted EPUBs whose word count is far from the declared one
        #[arg(long, alias = "trash-bad-count")]
        filter_word_count: bool,

        /// Items processed concurrently
        #[arg(long, alias = "num-processes", value_name = "N")]
        workers: Option<usize>,

        /// Attempts per URL, including the first
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,

        /// Seconds to wait for a connection, headers, or the next body chunk
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// Write the books in DIR to stdout, one sentence per line
    Sentences {
        /// Directory of .txt books
        dir: PathBuf,

        /// Files processed concurrently
        #[arg(long, alias = "num-processes", value_name = "N")]
        workers: Option<usize>,
    },

    /// Tokenize sentence lines from stdin to stdout
    Tokenize {
        /// Chunks processed concurrently
        #[arg(long, alias = "num-processes", value_name = "N")]
        workers: Option<usize>,

        /// Lines per chunk
        #[arg(long, value_name = "N")]
        chunk_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Interrupted) => ExitCode::from(130),
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Fetch {
            out_dir,
            manifest,
            filter_word_count,
            workers,
            max_attempts,
            timeout_secs,
        } => {
            if out_dir.is_some() {
                config.harvest.output_dir = out_dir;
            }
            if manifest.is_some() {
                config.harvest.manifest_path = manifest;
            }
            if filter_word_count {
                config.harvest.filter_word_count = true;
            }
            if let Some(workers) = workers {
                config.harvest.workers = workers;
            }
            if let Some(max_attempts) = max_attempts {
                config.retry.max_attempts = max_attempts;
            }
            if let Some(secs) = timeout_secs {
                config.http.timeout = Duration::from_secs(secs);
            }
            config.validate()?;

            let config = Arc::new(config);
            let retrieval = HttpRetrieval::new(&config.http, config.retry.clone())?;
            let harvester =
                Harvester::new(config, Arc::new(retrieval), Arc::new(EpubTextConverter));

            run_until_signal(harvester.run()).await?;
        }

        Commands::Sentences { dir, workers } => {
            if let Some(workers) = workers {
                config.harvest.workers = workers;
            }
            config.validate()?;

            let mut stdout = tokio::io::stdout();
            let mut stderr = tokio::io::stderr();
            let work = sentences::run(&dir, config.harvest.workers, &mut stdout, &mut stderr);
            run_until_signal(work).await?;
        }

        Commands::Tokenize {
            workers,
            chunk_size,
        } => {
            if let Some(workers) = workers {
                config.harvest.workers = workers;
            }
            if let Some(chunk_size) = chunk_size {
                config.corpus.chunk_size = chunk_size;
            }
            config.validate()?;

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            let work = tokenize::run(
                stdin,
                &mut stdout,
                config.harvest.workers,
                config.corpus.chunk_size,
            );
            run_until_signal(work).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

/// Logs go to stderr; stdout carries data for `sentences` and `tokenize`
fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

//! riv: build and query random-indexing lexica from the command line.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use riv::config::{SeedCase, SignScheme, SpaceConfig, DEFAULT_CACHE_CAPACITY};
use riv::core::algebra::{cos_to_sine, cosine};
use riv::memory::codec::{layout_for, Layout};
use riv::runtime::ingest::{clean_line, ingest_document, ingest_line};
use riv::runtime::space::VectorSpace;

/// Random-indexing lexicon tool.
#[derive(Parser, Debug)]
#[command(name = "riv", about = "Random-indexing word vectors on disk", version)]
struct Cli {
    /// Vector dimensionality D.
    #[arg(long, global = true, default_value_t = riv::config::DEFAULT_DIMENSIONS)]
    dimensions: usize,

    /// Nonzero entries per word barcode (even).
    #[arg(long, global = true, default_value_t = riv::config::DEFAULT_NONZEROS)]
    nonzeros: usize,

    /// Draw barcode signs at random instead of alternating.
    #[arg(long, global = true, default_value_t = false)]
    random_signs: bool,

    /// Fold letter case together when seeding barcodes.
    #[arg(long, global = true, default_value_t = false)]
    case_insensitive: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fold text files into a lexicon (one line per context by default).
    Ingest {
        /// Lexicon directory (created if missing).
        lexicon: PathBuf,

        /// Text files to read.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Cache slots (0 writes every vector straight to disk).
        #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
        cache: usize,

        /// Use each file as one context instead of each line.
        #[arg(long)]
        whole_file: bool,
    },
    /// Print the stored metadata of a word.
    Show { lexicon: PathBuf, word: String },
    /// Print the cosine and sine between two words.
    Compare {
        lexicon: PathBuf,
        first: String,
        second: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SpaceConfig {
        dimensions: cli.dimensions,
        nonzeros: cli.nonzeros,
        sign_scheme: if cli.random_signs {
            SignScheme::Random
        } else {
            SignScheme::Alternating
        },
        seed_case: if cli.case_insensitive {
            SeedCase::Insensitive
        } else {
            SeedCase::Sensitive
        },
    };
    let space = VectorSpace::new(config).context("invalid vector space configuration")?;

    match cli.command {
        Command::Ingest {
            lexicon,
            files,
            cache,
            whole_file,
        } => ingest(&space, lexicon, &files, cache, whole_file),
        Command::Show { lexicon, word } => show(&space, lexicon, &word),
        Command::Compare {
            lexicon,
            first,
            second,
        } => compare(&space, lexicon, &first, &second),
    }
}

fn ingest(
    space: &VectorSpace,
    root: PathBuf,
    files: &[PathBuf],
    cache: usize,
    whole_file: bool,
) -> anyhow::Result<()> {
    let mut lexicon = space
        .open(&root, "rw", cache)
        .with_context(|| format!("opening lexicon {}", root.display()))?;

    let mut contexts = 0usize;
    let mut words = 0usize;
    for path in files {
        if whole_file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let updated = ingest_document(space, &mut lexicon, &clean_line(&text))
                .with_context(|| format!("ingesting {}", path.display()))?;
            if updated > 0 {
                contexts += 1;
                words += updated;
            }
            tracing::info!("Ingested {}", path.display());
            space.checkpoint();
            continue;
        }
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            let cleaned = clean_line(&line);
            let updated = ingest_line(space, &mut lexicon, &cleaned)
                .with_context(|| format!("ingesting a line of {}", path.display()))?;
            if updated > 0 {
                contexts += 1;
                words += updated;
            }
        }
        tracing::info!("Ingested {}", path.display());
        space.checkpoint();
    }

    let stats = lexicon.stats().clone();
    let report = lexicon.close().context("closing lexicon")?;
    tracing::info!(
        "{} contexts, {} word updates; cache hit rate {:.1}%, {} evictions, {} flushed at close",
        contexts,
        words,
        stats.hit_rate() * 100.0,
        stats.evictions,
        report.written,
    );
    Ok(())
}

fn show(space: &VectorSpace, root: PathBuf, word: &str) -> anyhow::Result<()> {
    let mut lexicon = space
        .open(&root, "rx", 0)
        .with_context(|| format!("opening lexicon {}", root.display()))?;
    let Some(vector) = lexicon.pull(word)? else {
        bail!("'{}' is not in {}", word, root.display());
    };
    let layout = match layout_for(&vector) {
        Layout::Sparse(_) => "sparse",
        Layout::Dense => "dense",
    };
    println!("word:         {}", vector.name);
    println!("frequency:    {}", vector.frequency);
    println!("context size: {}", vector.context_size);
    println!("magnitude:    {:.3}", vector.magnitude);
    println!(
        "nonzeros:     {} of {} ({})",
        vector.nonzero_count(),
        vector.dimensions(),
        layout
    );
    Ok(())
}

fn compare(space: &VectorSpace, root: PathBuf, first: &str, second: &str) -> anyhow::Result<()> {
    let mut lexicon = space
        .open(&root, "rx", 0)
        .with_context(|| format!("opening lexicon {}", root.display()))?;
    let mut vectors = Vec::with_capacity(2);
    for word in [first, second] {
        match lexicon.pull(word)? {
            Some(mut vector) => {
                if vector.refresh_magnitude() == 0.0 {
                    bail!("'{}' has a zero vector", word);
                }
                vectors.push(vector);
            }
            None => bail!("'{}' is not in {}", word, root.display()),
        }
    }
    let cos = cosine(&vectors[0], &vectors[1])?;
    println!("cosine: {:.6}", cos);
    println!("sine:   {:.6}", cos_to_sine(cos));
    Ok(())
}

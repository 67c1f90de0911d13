//! Command implementations for the kwrank CLI.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use crate::bm25::{Bm25Config, Bm25Searcher, CancellationToken, KeywordQuery};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::Result;
use crate::ingest::{CorpusLoader, property_stats};
use crate::object::Projection;
use crate::storage::MemoryStore;

/// Execute a CLI command.
pub fn execute_command(args: KwrankArgs) -> Result<()> {
    match &args.command {
        Command::Search(search_args) => search_corpus(search_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &args),
    }
}

fn load_corpus(path: &Path) -> Result<CorpusLoader> {
    let mut loader = CorpusLoader::new(Arc::new(MemoryStore::new()));
    loader.load_jsonl_file(path)?;
    Ok(loader)
}

/// Build the search configuration from a config file and flags.
pub fn search_config(args: &SearchArgs) -> Result<Bm25Config> {
    let mut config = match &args.config {
        Some(path) => Bm25Config::from_json_file(path)?,
        None => Bm25Config::default(),
    };
    if args.parallel {
        config = config.with_parallel_terms(true);
    }
    Ok(config)
}

/// Build the query from the search flags.
pub fn build_query(args: &SearchArgs) -> KeywordQuery {
    let query = KeywordQuery::new(args.query.clone(), args.property.clone()).with_limit(args.limit);
    if args.fields.is_empty() {
        query
    } else {
        query.with_projection(Projection::only(args.fields.iter().cloned()))
    }
}

/// Load the corpus and search it.
fn search_corpus(args: &SearchArgs, cli_args: &KwrankArgs) -> Result<()> {
    if cli_args.verbosity() > 1 {
        println!("Corpus: {}", args.corpus.display());
        println!("Query: {} (property {})", args.query, args.property);
    }

    let config = search_config(args)?;
    let loader = load_corpus(&args.corpus)?;

    let mut searcher = Bm25Searcher::new(loader.store(), config)?;
    if args.length_normalization {
        searcher = searcher.with_length_provider(loader.lengths());
    }

    let cancel = match args.timeout_ms {
        Some(ms) => CancellationToken::with_timeout(Duration::from_millis(ms)),
        None => CancellationToken::new(),
    };

    let start_time = Instant::now();
    let results = searcher.search(&build_query(args), &cancel)?;
    let elapsed = start_time.elapsed();
    info!("search finished in {elapsed:?}");

    let output = SearchOutput::new(&args.query, &args.property, &results, elapsed);
    output_result(&output, cli_args)
}

/// Load the corpus and show index statistics of one property.
fn show_stats(args: &StatsArgs, cli_args: &KwrankArgs) -> Result<()> {
    let loader = load_corpus(&args.corpus)?;
    let stats = property_stats(&loader.store(), &args.property, args.top)?;

    let output = StatsOutput {
        property: args.property.clone(),
        stats,
    };
    output_result(&output, cli_args)
}

//! Output formatting for CLI commands.

use std::fmt::Write;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::bm25::SearchResults;
use crate::cli::args::{KwrankArgs, OutputFormat};
use crate::error::Result;
use crate::ingest::PropertyStats;

/// Types that have a human-readable rendering.
pub trait HumanOutput {
    fn to_human(&self) -> String;
}

/// Result structure for search operations.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub property: String,
    pub total_hits: u64,
    pub duration_ms: u64,
    pub hits: Vec<HitOutput>,
    pub term_checksums: Vec<TermChecksumOutput>,
}

/// One ranked hit.
#[derive(Debug, Serialize)]
pub struct HitOutput {
    pub rank: usize,
    pub id: String,
    pub doc_id: u64,
    pub score: f64,
    pub properties: Map<String, Value>,
}

/// A term's checksum, hex encoded.
#[derive(Debug, Serialize)]
pub struct TermChecksumOutput {
    pub term: String,
    pub checksum: String,
}

impl SearchOutput {
    /// Build the output of a finished search.
    pub fn new(query: &str, property: &str, results: &SearchResults, elapsed: Duration) -> Self {
        SearchOutput {
            query: query.to_string(),
            property: property.to_string(),
            total_hits: results.total_hits,
            duration_ms: elapsed.as_millis() as u64,
            hits: results
                .hits
                .iter()
                .enumerate()
                .map(|(i, hit)| HitOutput {
                    rank: i + 1,
                    id: hit.object.id.clone(),
                    doc_id: hit.object.doc_id,
                    score: hit.score,
                    properties: hit.object.properties.clone(),
                })
                .collect(),
            term_checksums: results
                .term_checksums
                .iter()
                .map(|c| TermChecksumOutput {
                    term: c.term.clone(),
                    checksum: to_hex(&c.checksum),
                })
                .collect(),
        }
    }
}

impl HumanOutput for SearchOutput {
    fn to_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Search Results:");
        let _ = writeln!(out, "═══════════════");

        if self.hits.is_empty() {
            let _ = writeln!(out, "No documents matched '{}'.", self.query);
        }
        for hit in &self.hits {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Result {}: {} (doc {}, Score: {:.4})",
                hit.rank, hit.id, hit.doc_id, hit.score
            );
            for (name, value) in &hit.properties {
                let _ = writeln!(out, "  {name}: {}", format_value(value));
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Showing {} of {} matches on '{}' ({} ms)",
            self.hits.len(),
            self.total_hits,
            self.property,
            self.duration_ms
        );
        for checksum in &self.term_checksums {
            let _ = writeln!(out, "  checksum {}: {}", checksum.term, checksum.checksum);
        }
        out
    }
}

/// Index statistics of one property.
#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub property: String,
    #[serde(flatten)]
    pub stats: PropertyStats,
}

impl HumanOutput for StatsOutput {
    fn to_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Index Statistics: {}", self.property);
        let _ = writeln!(out, "═════════════════");
        let _ = writeln!(out, "Documents: {}", self.stats.documents);
        let _ = writeln!(out, "Terms:     {}", self.stats.terms);
        let _ = writeln!(out, "Postings:  {}", self.stats.postings);
        if !self.stats.top_terms.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Most frequent terms:");
            for (term, postings) in &self.stats.top_terms {
                let _ = writeln!(out, "  {term:<20} {postings}");
            }
        }
        out
    }
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize + HumanOutput>(result: &T, args: &KwrankArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            print!("{}", result.to_human());
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &KwrankArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

// Stage 1: load both sources, reconcile traded players, join on name and
// persist the canonical table.

use std::path::PathBuf;

use fairshot_basketball::canonical::{self, CanonicalTable};
use fairshot_basketball::reconcile::reconcile;
use fairshot_basketball::salary::{load_salaries, SALARY_COLUMN};
use fairshot_basketball::stats::load_stats;
use fairshot_core::config::{Config, DedupPolicy};
use fairshot_core::table::SniffedSource;
use tracing::{info, warn};

use crate::discard_outputs;
use crate::error::IngestError;

/// Row counts observed while building the canonical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub stat_rows: usize,
    pub unique_players: usize,
    pub salary_rows: usize,
    pub joined: usize,
    pub dropped_missing_salary: usize,
    /// Feature columns absent from the statistics source.
    pub missing_features: Vec<String>,
    pub output: PathBuf,
}

/// Reconcile and join in memory. Fails when the join is empty.
pub fn build_canonical(
    stats_source: &SniffedSource,
    salary_source: &SniffedSource,
    policy: DedupPolicy,
) -> Result<(CanonicalTable, IngestSummary), IngestError> {
    let stat_table = load_stats(stats_source)?;
    let stat_rows = stat_table.lines.len();
    let lines = reconcile(stat_table.lines, policy);
    let unique_players = lines.len();

    let salaries = load_salaries(salary_source, SALARY_COLUMN)?;
    let salary_rows = salaries.len();

    let missing_features: Vec<String> = stat_table
        .schema
        .missing_features()
        .iter()
        .map(|c| c.label().to_string())
        .collect();
    if !missing_features.is_empty() {
        warn!(
            "{} lacks feature columns {}; the model stage will refuse this table",
            stats_source.display_path(),
            missing_features.join(", ")
        );
    }

    let (table, counts) = canonical::join(lines, stat_table.schema, &salaries);
    if counts.dropped_missing_salary > 0 {
        warn!(
            "dropped {} matched players with no parseable salary",
            counts.dropped_missing_salary
        );
    }
    if table.is_empty() {
        return Err(IngestError::NoMatches {
            stats: stats_source.path.clone(),
            salaries: salary_source.path.clone(),
        });
    }

    let summary = IngestSummary {
        stat_rows,
        unique_players,
        salary_rows,
        joined: table.len(),
        dropped_missing_salary: counts.dropped_missing_salary,
        missing_features,
        output: PathBuf::new(),
    };
    Ok((table, summary))
}

/// Run stage 1 against the configured sources and write `canonical.csv`.
///
/// On failure the canonical table and every artifact derived from it are
/// removed, so later stages cannot run on output from an earlier run.
pub fn prepare(config: &Config) -> Result<IngestSummary, IngestError> {
    let result = run_prepare(config);
    if result.is_err() {
        discard_outputs(&[
            config.paths.canonical_table(),
            config.paths.scored_table(),
            config.paths.model_artifact(),
        ]);
    }
    result
}

fn run_prepare(config: &Config) -> Result<IngestSummary, IngestError> {
    let stats_source = SniffedSource::open(&config.paths.stats)?;
    let salary_source = SniffedSource::open(&config.paths.salaries)?;
    info!(
        "loading {} (delimiter {:?}) and {} (delimiter {:?})",
        stats_source.display_path(),
        stats_source.delimiter as char,
        salary_source.display_path(),
        salary_source.delimiter as char
    );

    let (table, mut summary) = build_canonical(&stats_source, &salary_source, config.ingest.dedup_policy)?;

    let output = config.paths.canonical_table();
    table.write_canonical(&output)?;
    summary.output = output;

    info!(
        "ingest: {} stat rows, {} unique players, {} salary rows, {} joined, {} dropped for missing salary",
        summary.stat_rows,
        summary.unique_players,
        summary.salary_rows,
        summary.joined,
        summary.dropped_missing_salary
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

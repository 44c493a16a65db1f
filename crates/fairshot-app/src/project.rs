// Stage 3: enrich the scored table with next-season salaries and derive
// the comparative profile metrics.

use std::collections::HashMap;
use std::path::Path;

use fairshot_basketball::profile::{attach_next_season, FutureSalaries, Projection};
use fairshot_basketball::salary::{load_salaries, salary_lookup};
use fairshot_core::config::Config;
use fairshot_core::table::SniffedSource;
use tracing::{info, warn};

use crate::cache::ScoredCache;
use crate::error::PipelineError;

/// Load next-season salaries from `path`, reading the season `column`.
///
/// Never fails: a missing source, missing column or unreadable file yields
/// an empty lookup and an `Unavailable` status.
pub fn load_future_salaries(path: Option<&Path>, column: &str) -> (HashMap<String, f64>, Option<String>) {
    let Some(path) = path else {
        return (HashMap::new(), Some("no next-season salary source configured".into()));
    };
    if !path.exists() {
        let reason = format!("{} not found", path.display());
        warn!("next-season salaries unavailable: {}", reason);
        return (HashMap::new(), Some(reason));
    }
    let loaded = SniffedSource::open(path).and_then(|source| load_salaries(&source, column));
    match loaded {
        Ok(records) => (salary_lookup(&records), None),
        Err(e) => {
            warn!("next-season salaries unavailable: {}", e);
            (HashMap::new(), Some(e.to_string()))
        }
    }
}

/// Run stage 3 on the scored table held by `cache`.
pub fn project(config: &Config, cache: &mut ScoredCache) -> Result<Projection, PipelineError> {
    let scored_path = config.paths.scored_table();
    let table = cache.get_or_load(&scored_path)?;
    if !table.is_scored() {
        return Err(PipelineError::NotScored { path: scored_path });
    }
    let mut players = table.players.clone();

    let (lookup, unavailable) = load_future_salaries(
        config.paths.future_salaries.as_deref(),
        &config.projection.future_salary_column,
    );
    let future = match unavailable {
        Some(reason) => FutureSalaries::Unavailable { reason },
        None => {
            let matched = attach_next_season(&mut players, &lookup);
            info!(
                "matched next-season salaries for {} of {} players",
                matched,
                players.len()
            );
            FutureSalaries::Loaded { matched }
        }
    };

    Ok(Projection::build(players, future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_source_degrades() {
        let (lookup, reason) = load_future_salaries(None, "2025-26");
        assert!(lookup.is_empty());
        assert!(reason.is_some());
    }

    #[test]
    fn missing_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let (lookup, reason) = load_future_salaries(Some(&dir.path().join("none.csv")), "2025-26");
        assert!(lookup.is_empty());
        assert!(reason.unwrap().contains("not found"));
    }

    #[test]
    fn missing_column_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.csv");
        std::fs::write(&path, "Player,2024-25\nA,$1\n").unwrap();
        let (lookup, reason) = load_future_salaries(Some(&path), "2025-26");
        assert!(lookup.is_empty());
        assert!(reason.unwrap().contains("2025-26"));
    }

    #[test]
    fn reads_the_configured_season_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.csv");
        std::fs::write(&path, "Player;2025-26;2026-27\nA;\"$5,000,000\";$1\nB;$0;$2\n").unwrap();
        let (lookup, reason) = load_future_salaries(Some(&path), "2025-26");
        assert!(reason.is_none());
        assert_eq!(lookup.get("A"), Some(&5_000_000.0));
        assert_eq!(lookup.get("B"), Some(&0.0));
    }
}

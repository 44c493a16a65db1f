// Canonical per-player table: the inner join of reconciled statistics and
// salaries, plus the scored form that carries model output.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use fairshot_core::currency::parse_currency;
use fairshot_core::table::{write_table, SniffedSource, TableError};
use tracing::warn;

use crate::salary::{SalaryRecord, SALARY_COLUMN};
use crate::stats::{StatColumn, StatLine, StatSchema, StatValues};

pub const PREDICTED_COLUMN: &str = "Predicted_Salary";
pub const DIFFERENCE_COLUMN: &str = "Difference";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One player in the canonical table.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub player: String,
    pub pos: Option<String>,
    pub stats: StatValues,
    pub salary: f64,
    pub predicted_salary: Option<f64>,
    pub difference: Option<f64>,
    /// Realized salary for the following season. `None` is "unknown",
    /// which is not the same as a signed $0 contract.
    pub next_season_salary: Option<f64>,
}

impl PlayerRecord {
    /// Attach a model estimate. Negative predictions are kept as-is.
    pub fn attach_prediction(&mut self, predicted: f64) {
        self.predicted_salary = Some(predicted);
        self.difference = Some(predicted - self.salary);
    }

    /// `(predicted, difference)` once the record has been scored.
    pub fn scored(&self) -> Option<(f64, f64)> {
        Some((self.predicted_salary?, self.difference?))
    }

    pub fn age(&self) -> Option<f64> {
        self.stats.get(StatColumn::Age)
    }

    pub fn games(&self) -> Option<f64> {
        self.stats.get(StatColumn::G)
    }
}

/// Row counts from the join, reported after ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinCounts {
    pub stat_players: usize,
    pub salary_players: usize,
    pub matched: usize,
    pub dropped_missing_salary: usize,
}

/// The canonical table: unique player names, numeric salary.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    pub schema: StatSchema,
    pub players: Vec<PlayerRecord>,
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Inner-join reconciled statistics with salaries on player name.
///
/// Players missing from either side are dropped. A player whose salary
/// rows are all unparseable is matched but then dropped, since salary is
/// required for training. Duplicate salary rows keep the first parseable
/// value. Output follows the statistics order.
pub fn join(stats: Vec<StatLine>, schema: StatSchema, salaries: &[SalaryRecord]) -> (CanonicalTable, JoinCounts) {
    let salary_names: HashSet<&str> = salaries.iter().map(|r| r.player.as_str()).collect();
    let mut lookup: HashMap<&str, f64> = HashMap::new();
    for record in salaries {
        if let Some(value) = record.salary {
            lookup.entry(record.player.as_str()).or_insert(value);
        }
    }

    let mut counts = JoinCounts {
        stat_players: stats.len(),
        salary_players: salary_names.len(),
        ..JoinCounts::default()
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut players = Vec::new();
    for line in stats {
        if !salary_names.contains(line.player.as_str()) {
            continue;
        }
        if !seen.insert(line.player.clone()) {
            warn!("duplicate statistics row for '{}' reached the join; keeping the first", line.player);
            continue;
        }
        counts.matched += 1;
        let Some(&salary) = lookup.get(line.player.as_str()) else {
            counts.dropped_missing_salary += 1;
            continue;
        };
        players.push(PlayerRecord {
            player: line.player,
            pos: line.pos,
            stats: line.stats,
            salary,
            predicted_salary: None,
            difference: None,
            next_season_salary: None,
        });
    }

    (CanonicalTable { schema, players }, counts)
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// True when every player carries a prediction.
    pub fn is_scored(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.scored().is_some())
    }

    pub fn find(&self, player: &str) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.player == player)
    }

    fn headers(&self, scored: bool) -> Vec<String> {
        let mut headers = vec!["Player".to_string()];
        headers.extend(self.schema.labels().into_iter().map(str::to_string));
        headers.push(SALARY_COLUMN.to_string());
        if scored {
            headers.push(PREDICTED_COLUMN.to_string());
            headers.push(DIFFERENCE_COLUMN.to_string());
        }
        headers
    }

    fn rows(&self, scored: bool) -> Vec<Vec<String>> {
        let labels = self.schema.labels();
        self.players
            .iter()
            .map(|p| {
                let mut row = vec![p.player.clone()];
                for label in &labels {
                    let cell = match StatColumn::from_label(label) {
                        Some(column) => format_number(p.stats.get(column)),
                        None => p.pos.clone().unwrap_or_default(),
                    };
                    row.push(cell);
                }
                row.push(p.salary.to_string());
                if scored {
                    row.push(format_number(p.predicted_salary));
                    row.push(format_number(p.difference));
                }
                row
            })
            .collect()
    }

    /// Persist the canonical columns only (stage 1 output).
    pub fn write_canonical(&self, path: &Path) -> Result<(), TableError> {
        write_table(path, &self.headers(false), &self.rows(false))
    }

    /// Persist canonical columns plus `Predicted_Salary` and `Difference`
    /// (stage 2 output).
    pub fn write_scored(&self, path: &Path) -> Result<(), TableError> {
        write_table(path, &self.headers(true), &self.rows(true))
    }

    /// Read a persisted canonical or scored table.
    ///
    /// `Player` and `Salary` are required. Rows whose salary cannot be
    /// parsed are dropped with a warning. Prediction columns are read when
    /// present.
    pub fn read(source: &SniffedSource) -> Result<Self, TableError> {
        let headers = source.require_columns(&["Player", SALARY_COLUMN])?;
        let schema = StatSchema::from_headers(&headers);
        let index = |name: &str| headers.iter().position(|h| h == name);

        let player_idx = index("Player").unwrap_or(0);
        let salary_idx = index(SALARY_COLUMN).unwrap_or(0);
        let pos_idx = index("Pos");
        let predicted_idx = index(PREDICTED_COLUMN);
        let difference_idx = index(DIFFERENCE_COLUMN);
        let stat_idx: Vec<(StatColumn, usize)> = schema
            .columns
            .iter()
            .filter_map(|&c| index(c.label()).map(|i| (c, i)))
            .collect();

        let number = |row: &csv::StringRecord, idx: usize| -> Option<f64> {
            row.get(idx)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        let mut reader = source.reader();
        let mut players = Vec::new();
        let mut seen = HashSet::new();
        for result in reader.records() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!("skipping malformed row in {}: {}", source.display_path(), e);
                    continue;
                }
            };
            let player = row.get(player_idx).unwrap_or("").trim().to_string();
            if player.is_empty() {
                continue;
            }
            let Some(salary) = row.get(salary_idx).and_then(parse_currency) else {
                warn!("dropping '{}' from {}: unparseable salary", player, source.display_path());
                continue;
            };
            if !seen.insert(player.clone()) {
                warn!("duplicate player '{}' in {}; keeping the first", player, source.display_path());
                continue;
            }

            let mut stats = StatValues::default();
            for &(column, idx) in &stat_idx {
                stats.set(column, number(&row, idx));
            }
            let pos = pos_idx
                .and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            players.push(PlayerRecord {
                player,
                pos,
                stats,
                salary,
                predicted_salary: predicted_idx.and_then(|i| number(&row, i)),
                difference: difference_idx.and_then(|i| number(&row, i)),
                next_season_salary: None,
            });
        }

        Ok(Self { schema, players })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use crate::salary::load_salaries;
    use crate::stats::load_stats;
    use fairshot_core::config::DedupPolicy;

    fn stats_source(text: &str) -> SniffedSource {
        SniffedSource::from_bytes("stats.csv", text.as_bytes())
    }

    fn build(stats_csv: &str, salary_csv: &str) -> (CanonicalTable, JoinCounts) {
        let stats = load_stats(&stats_source(stats_csv)).unwrap();
        let salaries = load_salaries(
            &SniffedSource::from_bytes("salaries.csv", salary_csv.as_bytes()),
            SALARY_COLUMN,
        )
        .unwrap();
        let lines = reconcile(stats.lines, DedupPolicy::FirstOccurrence);
        join(lines, stats.schema, &salaries)
    }

    const SCENARIO_STATS: &str = "\
Player,Age,G,PTS,TRB,AST,STL,BLK,FG%,3P%
A,25,70,20,5,5,1,0.5,0.45,0.35";

    #[test]
    fn single_player_scenario() {
        let (table, counts) = build(SCENARIO_STATS, "Player,Salary\nA,\"$10,000,000\"");
        assert_eq!(table.len(), 1);
        assert_eq!(table.players[0].player, "A");
        assert_eq!(table.players[0].salary, 10_000_000.0);
        assert_eq!(counts.matched, 1);
        assert!(table.schema.missing_features().is_empty());
    }

    #[test]
    fn unmatched_players_are_dropped() {
        let (table, counts) = build(
            "Player,G\nA,70\nB,60\nC,50",
            "Player,Salary\nB,$2\nC,$3\nD,$4",
        );
        let names: Vec<_> = table.players.iter().map(|p| p.player.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(counts.stat_players, 3);
        assert_eq!(counts.salary_players, 3);
    }

    #[test]
    fn missing_salary_rows_are_dropped_after_join() {
        let (table, counts) = build("Player,G\nA,70\nB,60", "Player,Salary\nA,N/A\nB,$5");
        assert_eq!(table.len(), 1);
        assert_eq!(table.players[0].player, "B");
        assert_eq!(counts.matched, 2);
        assert_eq!(counts.dropped_missing_salary, 1);
    }

    #[test]
    fn join_cardinality_never_exceeds_either_source() {
        let (table, counts) = build(
            "Player,Team,G\nA,BOS,10\nA,MIA,20\nB,LAL,30\nC,NYK,40",
            "Player,Salary\nA,$1\nA,$2\nB,$3\nE,$4",
        );
        let unique_stats = 3;
        let unique_salaries = 3;
        assert!(table.len() <= unique_stats.min(unique_salaries));
        assert_eq!(table.len(), 2);
        assert_eq!(table.find("A").unwrap().salary, 1.0);
        assert_eq!(counts.salary_players, 3);
    }

    #[test]
    fn canonical_round_trip_keeps_schema_and_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("canonical.csv");
        let (table, _) = build(
            "Player,Age,Pos,G,3P%\nA,25,SG,70,\nB,31,C,60,.31",
            "Player,Salary\nA,\"$1,500\"\nB,$2",
        );
        table.write_canonical(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Player,Age,Pos,G,3P%,Salary\n"));

        let back = CanonicalTable::read(&SniffedSource::open(&path).unwrap()).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.players[0].stats.get(StatColumn::ThreePct), None);
        assert!(!back.is_scored());
    }

    #[test]
    fn scored_table_carries_prediction_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("predictions.csv");
        let (mut table, _) = build(SCENARIO_STATS, "Player,Salary\nA,\"$10,000,000\"");
        table.players[0].attach_prediction(15_000_000.0);
        table.write_scored(&path).unwrap();

        let back = CanonicalTable::read(&SniffedSource::open(&path).unwrap()).unwrap();
        assert!(back.is_scored());
        assert_eq!(back.players[0].scored(), Some((15_000_000.0, 5_000_000.0)));
    }

    #[test]
    fn difference_sign_convention() {
        let mut record = PlayerRecord {
            player: "A".into(),
            pos: None,
            stats: StatValues::default(),
            salary: 10_000_000.0,
            predicted_salary: None,
            difference: None,
            next_season_salary: None,
        };
        record.attach_prediction(15_000_000.0);
        assert_eq!(record.difference, Some(5_000_000.0));

        record.attach_prediction(-1_000_000.0);
        assert_eq!(record.predicted_salary, Some(-1_000_000.0));
        assert_eq!(record.difference, Some(-11_000_000.0));
    }

    #[test]
    fn read_requires_salary_column() {
        let source = stats_source("Player,G\nA,70");
        match CanonicalTable::read(&source).unwrap_err() {
            TableError::MissingColumn { column, .. } => assert_eq!(column, "Salary"),
            other => panic!("expected MissingColumn, got: {other}"),
        }
    }
}

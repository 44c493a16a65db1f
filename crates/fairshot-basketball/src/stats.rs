// Season statistics loading (Basketball-Reference style per-game tables).
//
// One row per (player, team stint). Only the allow-listed columns are read;
// any of them may be absent from a given export.

use fairshot_core::table::{SniffedSource, TableError};
use serde::Deserialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// A numeric statistics column carried into the canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatColumn {
    Age,
    G,
    MP,
    PTS,
    TRB,
    AST,
    STL,
    BLK,
    FgPct,
    ThreePct,
}

impl StatColumn {
    pub const ALL: [StatColumn; 10] = [
        StatColumn::Age,
        StatColumn::G,
        StatColumn::MP,
        StatColumn::PTS,
        StatColumn::TRB,
        StatColumn::AST,
        StatColumn::STL,
        StatColumn::BLK,
        StatColumn::FgPct,
        StatColumn::ThreePct,
    ];

    /// Header label as it appears in the source and persisted tables.
    pub fn label(self) -> &'static str {
        match self {
            StatColumn::Age => "Age",
            StatColumn::G => "G",
            StatColumn::MP => "MP",
            StatColumn::PTS => "PTS",
            StatColumn::TRB => "TRB",
            StatColumn::AST => "AST",
            StatColumn::STL => "STL",
            StatColumn::BLK => "BLK",
            StatColumn::FgPct => "FG%",
            StatColumn::ThreePct => "3P%",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Shooting percentages are stored as fractions (0.452).
    pub fn is_percentage(self) -> bool {
        matches!(self, StatColumn::FgPct | StatColumn::ThreePct)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// The fixed model input, in order. `MP` is deliberately not a feature.
pub const FEATURES: [StatColumn; 9] = [
    StatColumn::Age,
    StatColumn::G,
    StatColumn::PTS,
    StatColumn::TRB,
    StatColumn::AST,
    StatColumn::STL,
    StatColumn::BLK,
    StatColumn::FgPct,
    StatColumn::ThreePct,
];

/// Counting stats used for the normalized radar comparison.
pub const PROFILE_STATS: [StatColumn; 5] = [
    StatColumn::PTS,
    StatColumn::TRB,
    StatColumn::AST,
    StatColumn::STL,
    StatColumn::BLK,
];

/// Stats shown with their delta to the league mean on a player profile.
pub const KEY_STATS: [StatColumn; 5] = [
    StatColumn::PTS,
    StatColumn::TRB,
    StatColumn::AST,
    StatColumn::FgPct,
    StatColumn::ThreePct,
];

/// Full allow-list of source columns, in canonical output order.
pub const ALLOWED_COLUMNS: [&str; 12] = [
    "Player", "Age", "Pos", "G", "MP", "PTS", "TRB", "AST", "STL", "BLK", "FG%", "3P%",
];

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Per-player stat values; `None` means the cell was absent or unparseable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatValues([Option<f64>; 10]);

impl StatValues {
    pub fn get(&self, column: StatColumn) -> Option<f64> {
        self.0[column.index()]
    }

    pub fn set(&mut self, column: StatColumn, value: Option<f64>) {
        self.0[column.index()] = value;
    }

    /// The value with missing imputed as zero.
    pub fn get_or_zero(&self, column: StatColumn) -> f64 {
        self.get(column).unwrap_or(0.0)
    }

    /// The model feature vector with missing values imputed as zero.
    pub fn feature_vector(&self) -> Vec<f64> {
        FEATURES.iter().map(|&c| self.get_or_zero(c)).collect()
    }
}

/// One statistics row: a player's line for one team stint.
#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub player: String,
    pub team: Option<String>,
    pub pos: Option<String>,
    pub stats: StatValues,
}

/// Which allow-listed columns a source actually carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatSchema {
    pub has_pos: bool,
    pub columns: Vec<StatColumn>,
}

impl StatSchema {
    /// Everything on the allow-list.
    pub fn full() -> Self {
        Self {
            has_pos: true,
            columns: StatColumn::ALL.to_vec(),
        }
    }

    /// Derive the schema from a header row; unknown headers are ignored.
    pub fn from_headers(headers: &[String]) -> Self {
        let has_pos = headers.iter().any(|h| h == "Pos");
        let columns = StatColumn::ALL
            .into_iter()
            .filter(|c| headers.iter().any(|h| h == c.label()))
            .collect();
        Self { has_pos, columns }
    }

    pub fn contains(&self, column: StatColumn) -> bool {
        self.columns.contains(&column)
    }

    /// Feature columns the model needs that this schema lacks.
    pub fn missing_features(&self) -> Vec<StatColumn> {
        FEATURES
            .into_iter()
            .filter(|c| !self.contains(*c))
            .collect()
    }

    /// Header labels after `Player`, in allow-list order.
    pub fn labels(&self) -> Vec<&'static str> {
        ALLOWED_COLUMNS[1..]
            .iter()
            .copied()
            .filter(|label| match *label {
                "Pos" => self.has_pos,
                other => StatColumn::from_label(other).is_some_and(|c| self.contains(c)),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Raw CSV serde struct (private)
// ---------------------------------------------------------------------------

/// Statistics CSV row. Unparseable numeric cells become `None` rather than
/// rejecting the row; absent columns default to `None`.
#[derive(Debug, Deserialize)]
struct RawStatRow {
    #[serde(rename = "Player")]
    player: String,
    #[serde(rename = "Team", alias = "Tm", default)]
    team: Option<String>,
    #[serde(rename = "Pos", default)]
    pos: Option<String>,
    #[serde(rename = "Age", default, deserialize_with = "csv::invalid_option")]
    age: Option<f64>,
    #[serde(rename = "G", default, deserialize_with = "csv::invalid_option")]
    g: Option<f64>,
    #[serde(rename = "MP", default, deserialize_with = "csv::invalid_option")]
    mp: Option<f64>,
    #[serde(rename = "PTS", default, deserialize_with = "csv::invalid_option")]
    pts: Option<f64>,
    #[serde(rename = "TRB", default, deserialize_with = "csv::invalid_option")]
    trb: Option<f64>,
    #[serde(rename = "AST", default, deserialize_with = "csv::invalid_option")]
    ast: Option<f64>,
    #[serde(rename = "STL", default, deserialize_with = "csv::invalid_option")]
    stl: Option<f64>,
    #[serde(rename = "BLK", default, deserialize_with = "csv::invalid_option")]
    blk: Option<f64>,
    #[serde(rename = "FG%", default, deserialize_with = "csv::invalid_option")]
    fg_pct: Option<f64>,
    #[serde(rename = "3P%", default, deserialize_with = "csv::invalid_option")]
    three_pct: Option<f64>,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl RawStatRow {
    fn into_stat_line(self, schema: &StatSchema) -> StatLine {
        let mut stats = StatValues::default();
        let cells = [
            (StatColumn::Age, self.age),
            (StatColumn::G, self.g),
            (StatColumn::MP, self.mp),
            (StatColumn::PTS, self.pts),
            (StatColumn::TRB, self.trb),
            (StatColumn::AST, self.ast),
            (StatColumn::STL, self.stl),
            (StatColumn::BLK, self.blk),
            (StatColumn::FgPct, self.fg_pct),
            (StatColumn::ThreePct, self.three_pct),
        ];
        for (column, value) in cells {
            if schema.contains(column) {
                stats.set(column, finite(value));
            }
        }
        StatLine {
            player: self.player.trim().to_string(),
            team: non_empty(self.team),
            pos: if schema.has_pos { non_empty(self.pos) } else { None },
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Statistics rows plus the schema the source carried.
#[derive(Debug, Clone)]
pub struct StatTable {
    pub schema: StatSchema,
    pub lines: Vec<StatLine>,
}

/// Load every statistics row from a sniffed source, in file order.
///
/// A missing `Player` column is fatal. Rows that cannot be read at all or
/// that have an empty player name are skipped with a warning.
pub fn load_stats(source: &SniffedSource) -> Result<StatTable, TableError> {
    let headers = source.require_columns(&["Player"])?;
    let schema = StatSchema::from_headers(&headers);

    let mut reader = source.reader();
    let mut lines = Vec::new();
    for result in reader.deserialize::<RawStatRow>() {
        match result {
            Ok(raw) => {
                let line = raw.into_stat_line(&schema);
                if line.player.is_empty() {
                    warn!("skipping stats row with empty player name");
                    continue;
                }
                lines.push(line);
            }
            Err(e) => {
                warn!("skipping malformed stats row in {}: {}", source.display_path(), e);
            }
        }
    }

    Ok(StatTable { schema, lines })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

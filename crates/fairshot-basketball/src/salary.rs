// Salary source loading: `Player` plus one currency-formatted column.
//
// The same loader reads the current-season source (`Salary`) and the
// optional next-season source, whose column label is a season string.

use std::collections::HashMap;

use fairshot_core::currency::parse_currency;
use fairshot_core::table::{SniffedSource, TableError};
use tracing::{debug, warn};

/// Column label of the current-season salary.
pub const SALARY_COLUMN: &str = "Salary";

/// One salary row. `salary` is `None` when the cell could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryRecord {
    pub player: String,
    pub salary: Option<f64>,
}

/// Load `Player` and `column` from a sniffed source, in file order.
///
/// Both columns are required. Unparseable salary cells are kept as `None`
/// so callers decide whether the field is mandatory.
pub fn load_salaries(source: &SniffedSource, column: &str) -> Result<Vec<SalaryRecord>, TableError> {
    let headers = source.require_columns(&["Player", column])?;
    // require_columns guarantees both positions exist.
    let player_idx = headers.iter().position(|h| h == "Player").unwrap_or(0);
    let salary_idx = headers.iter().position(|h| h == column).unwrap_or(0);

    let mut reader = source.reader();
    let mut records = Vec::new();
    let mut unparseable = 0usize;
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("skipping malformed salary row in {}: {}", source.display_path(), e);
                continue;
            }
        };
        let player = row.get(player_idx).unwrap_or("").trim();
        if player.is_empty() {
            continue;
        }
        let salary = row.get(salary_idx).and_then(parse_currency);
        if salary.is_none() {
            unparseable += 1;
            debug!("unparseable {} cell for '{}'", column, player);
        }
        records.push(SalaryRecord {
            player: player.to_string(),
            salary,
        });
    }

    if unparseable > 0 {
        warn!(
            "{} of {} `{}` cells in {} could not be parsed",
            unparseable,
            records.len(),
            column,
            source.display_path()
        );
    }
    Ok(records)
}

/// Collapse salary rows to one value per player: the first parseable cell
/// wins. Players with no parseable cell are absent from the map.
pub fn salary_lookup(records: &[SalaryRecord]) -> HashMap<String, f64> {
    let mut map = HashMap::new();
    for record in records {
        let Some(salary) = record.salary else {
            continue;
        };
        if map.contains_key(&record.player) {
            warn!("duplicate salary entry for '{}', keeping the first", record.player);
            continue;
        }
        map.insert(record.player.clone(), salary);
    }
    map
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Duplicate player resolution for mid-season trades.
//
// A traded player appears once per team stint, sometimes with an extra
// multi-team aggregate row ("TOT" in older exports, "2TM"/"3TM" since
// 2024-25). Exactly one row per player name survives.

use std::collections::HashMap;

use fairshot_core::config::DedupPolicy;

use crate::stats::StatLine;

/// True for the team label of a multi-team aggregate row.
pub fn is_aggregate_team(team: &str) -> bool {
    let team = team.trim();
    if team.eq_ignore_ascii_case("TOT") {
        return true;
    }
    // "2TM", "3TM", ... "10TM"
    team.is_ascii()
        && team.len() >= 3
        && team[team.len() - 2..].eq_ignore_ascii_case("TM")
        && team[..team.len() - 2].chars().all(|c| c.is_ascii_digit())
}

/// Pick the surviving row index out of one player's rows (in file order).
fn pick(rows: &[usize], lines: &[StatLine], policy: DedupPolicy) -> usize {
    match policy {
        DedupPolicy::FirstOccurrence => rows[0],
        DedupPolicy::LastOccurrence => rows[rows.len() - 1],
        DedupPolicy::PreferAggregateRow => rows
            .iter()
            .copied()
            .find(|&i| lines[i].team.as_deref().is_some_and(is_aggregate_team))
            .unwrap_or(rows[rows.len() - 1]),
    }
}

/// Keep exactly one row per player name according to `policy`.
///
/// Output order is the order in which each name first appears in the input,
/// so running this on its own output is a no-op.
pub fn reconcile(lines: Vec<StatLine>, policy: DedupPolicy) -> Vec<StatLine> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        groups
            .entry(line.player.as_str())
            .or_insert_with(|| {
                order.push(line.player.as_str());
                Vec::new()
            })
            .push(i);
    }

    let keep: Vec<usize> = order
        .iter()
        .map(|name| pick(&groups[name], &lines, policy))
        .collect();

    let mut slots: Vec<Option<StatLine>> = lines.into_iter().map(Some).collect();
    keep.into_iter().filter_map(|i| slots[i].take()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

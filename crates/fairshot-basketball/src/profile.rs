// Derived metrics for comparative display: next-season enrichment and
// per-stat ratios against the league maximum.

use std::collections::HashMap;

use crate::canonical::PlayerRecord;
use crate::stats::{StatColumn, PROFILE_STATS};

// ---------------------------------------------------------------------------
// Profile ratios
// ---------------------------------------------------------------------------

/// A player's value for each profile stat divided by the league maximum,
/// in [`PROFILE_STATS`] order. Every ratio lies in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfileRatios(pub [f64; 5]);

impl ProfileRatios {
    pub fn get(&self, column: StatColumn) -> Option<f64> {
        PROFILE_STATS
            .iter()
            .position(|&c| c == column)
            .map(|i| self.0[i])
    }

    /// `(column, ratio)` pairs in profile order.
    pub fn iter(&self) -> impl Iterator<Item = (StatColumn, f64)> + '_ {
        PROFILE_STATS.iter().copied().zip(self.0.iter().copied())
    }
}

/// League maximum of each profile stat. Missing values count as zero and
/// negative maxima are clamped to zero.
fn profile_maxima(players: &[PlayerRecord]) -> [f64; 5] {
    let mut maxima = [0.0_f64; 5];
    for player in players {
        for (i, &column) in PROFILE_STATS.iter().enumerate() {
            maxima[i] = maxima[i].max(player.stats.get_or_zero(column));
        }
    }
    maxima
}

/// Ratio of each player's profile stats to the league maximum.
///
/// A stat whose maximum is zero yields 0 for every player instead of a
/// division by zero. Negative inputs clamp to 0.
pub fn normalize(players: &[PlayerRecord]) -> Vec<ProfileRatios> {
    let maxima = profile_maxima(players);
    players
        .iter()
        .map(|player| {
            let mut ratios = [0.0; 5];
            for (i, &column) in PROFILE_STATS.iter().enumerate() {
                if maxima[i] > 0.0 {
                    ratios[i] = (player.stats.get_or_zero(column) / maxima[i]).clamp(0.0, 1.0);
                }
            }
            ProfileRatios(ratios)
        })
        .collect()
}

/// Mean of each profile ratio across all players; zeros for an empty set.
pub fn league_average(ratios: &[ProfileRatios]) -> ProfileRatios {
    if ratios.is_empty() {
        return ProfileRatios::default();
    }
    let n = ratios.len() as f64;
    let mut sums = [0.0; 5];
    for r in ratios {
        for (sum, value) in sums.iter_mut().zip(r.0.iter()) {
            *sum += value;
        }
    }
    ProfileRatios(sums.map(|s| s / n))
}

// ---------------------------------------------------------------------------
// Next-season enrichment
// ---------------------------------------------------------------------------

/// Availability of the next-season salary source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FutureSalaries {
    /// The source was loaded; `matched` players got a value.
    Loaded { matched: usize },
    /// No usable source; every player's next-season salary is unknown.
    Unavailable { reason: String },
}

/// Left-join next-season salaries onto the players. Unmatched players keep
/// `None`; returns how many matched.
pub fn attach_next_season(players: &mut [PlayerRecord], lookup: &HashMap<String, f64>) -> usize {
    let mut matched = 0;
    for player in players.iter_mut() {
        player.next_season_salary = lookup.get(&player.player).copied();
        if player.next_season_salary.is_some() {
            matched += 1;
        }
    }
    matched
}

/// A scored player together with its display ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedPlayer {
    pub record: PlayerRecord,
    pub ratios: ProfileRatios,
}

/// The fully derived dataset handed to the presentation views.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub players: Vec<ProjectedPlayer>,
    pub league_average: ProfileRatios,
    pub future: FutureSalaries,
}

impl Projection {
    /// Normalize and average the given (already enriched) players.
    pub fn build(players: Vec<PlayerRecord>, future: FutureSalaries) -> Self {
        let ratios = normalize(&players);
        let league_average = league_average(&ratios);
        let players = players
            .into_iter()
            .zip(ratios)
            .map(|(record, ratios)| ProjectedPlayer { record, ratios })
            .collect();
        Self {
            players,
            league_average,
            future,
        }
    }

    pub fn find(&self, player: &str) -> Option<&ProjectedPlayer> {
        self.players.iter().find(|p| p.record.player == player)
    }

    /// Player names sorted alphabetically, for selection lists.
    pub fn player_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.players.iter().map(|p| p.record.player.as_str()).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

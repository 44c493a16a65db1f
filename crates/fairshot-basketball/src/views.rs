// Read-only views over a projection: market overview, player profile, and
// retrospective accuracy against realized next-season contracts.

use std::cmp::Ordering;

use crate::profile::{FutureSalaries, ProfileRatios, Projection};
use crate::stats::{StatColumn, KEY_STATS};

const MILLION: f64 = 1_000_000.0;

/// Gap between realized and predicted salary still counted as a hit.
pub const RETRO_TOLERANCE: f64 = 3.0 * MILLION;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Valuation verdict from the predicted-minus-actual difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// More than $10M underpaid.
    Steal,
    /// $2M to $10M underpaid.
    GoodValue,
    /// Within $2M either way.
    Fair,
    /// $2M to $10M overpaid.
    Overpaid,
    /// More than $10M overpaid.
    Bust,
}

impl Verdict {
    pub fn from_difference(difference: f64) -> Self {
        let millions = difference / MILLION;
        if millions > 10.0 {
            Verdict::Steal
        } else if millions > 2.0 {
            Verdict::GoodValue
        } else if millions < -10.0 {
            Verdict::Bust
        } else if millions < -2.0 {
            Verdict::Overpaid
        } else {
            Verdict::Fair
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Steal => "STEAL",
            Verdict::GoodValue => "GOOD VALUE",
            Verdict::Fair => "FAIR PRICE",
            Verdict::Overpaid => "OVERPAID",
            Verdict::Bust => "BUST",
        }
    }
}

// ---------------------------------------------------------------------------
// Market overview
// ---------------------------------------------------------------------------

/// One player's actual and estimated pay.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuedPlayer {
    pub player: String,
    pub pos: Option<String>,
    pub age: Option<f64>,
    pub points: Option<f64>,
    pub salary: f64,
    pub predicted_salary: f64,
    pub difference: f64,
}

/// Actual-vs-predicted scatter data plus the most under- and overvalued
/// veterans.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOverview {
    pub points: Vec<ValuedPlayer>,
    pub steals: Vec<ValuedPlayer>,
    pub busts: Vec<ValuedPlayer>,
}

fn by_difference(a: &ValuedPlayer, b: &ValuedPlayer) -> Ordering {
    a.difference.total_cmp(&b.difference)
}

/// Build the market overview. Steal and bust lists only consider players
/// strictly older than `min_age` and hold at most `top_n` entries each.
/// Players without a prediction are left out.
pub fn market_overview(projection: &Projection, min_age: f64, top_n: usize) -> MarketOverview {
    let points: Vec<ValuedPlayer> = projection
        .players
        .iter()
        .filter_map(|p| {
            let (predicted_salary, difference) = p.record.scored()?;
            Some(ValuedPlayer {
                player: p.record.player.clone(),
                pos: p.record.pos.clone(),
                age: p.record.age(),
                points: p.record.stats.get(StatColumn::PTS),
                salary: p.record.salary,
                predicted_salary,
                difference,
            })
        })
        .collect();

    let mut veterans: Vec<ValuedPlayer> = points
        .iter()
        .filter(|p| p.age.is_some_and(|age| age > min_age))
        .cloned()
        .collect();

    // Stable sorts keep file order among equal differences.
    veterans.sort_by(|a, b| by_difference(b, a));
    let steals = veterans.iter().take(top_n).cloned().collect();
    veterans.sort_by(by_difference);
    let busts = veterans.into_iter().take(top_n).collect();

    MarketOverview {
        points,
        steals,
        busts,
    }
}

// ---------------------------------------------------------------------------
// Player profile
// ---------------------------------------------------------------------------

/// A stat compared to the league mean of the players that have it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyStat {
    pub column: StatColumn,
    pub value: Option<f64>,
    pub league_mean: Option<f64>,
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProfile {
    pub player: String,
    pub pos: Option<String>,
    pub age: Option<f64>,
    pub games: Option<f64>,
    pub salary: f64,
    pub predicted_salary: f64,
    pub difference: f64,
    pub verdict: Verdict,
    pub ratios: ProfileRatios,
    pub league_average: ProfileRatios,
    pub key_stats: Vec<KeyStat>,
}

fn league_mean(projection: &Projection, column: StatColumn) -> Option<f64> {
    let values: Vec<f64> = projection
        .players
        .iter()
        .filter_map(|p| p.record.stats.get(column))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Profile for one player, or `None` if the player is unknown or unscored.
pub fn player_profile(projection: &Projection, player: &str) -> Option<PlayerProfile> {
    let p = projection.find(player)?;
    let (predicted_salary, difference) = p.record.scored()?;

    let key_stats = KEY_STATS
        .iter()
        .map(|&column| {
            let value = p.record.stats.get(column);
            let league_mean = league_mean(projection, column);
            let delta = value.zip(league_mean).map(|(v, m)| v - m);
            KeyStat {
                column,
                value,
                league_mean,
                delta,
            }
        })
        .collect();

    Some(PlayerProfile {
        player: p.record.player.clone(),
        pos: p.record.pos.clone(),
        age: p.record.age(),
        games: p.record.games(),
        salary: p.record.salary,
        predicted_salary,
        difference,
        verdict: Verdict::from_difference(difference),
        ratios: p.ratios,
        league_average: projection.league_average,
        key_stats,
    })
}

// ---------------------------------------------------------------------------
// Retrospective accuracy
// ---------------------------------------------------------------------------

/// How the realized contract compares to the model estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetroOutcome {
    /// Realized salary within [`RETRO_TOLERANCE`] of the estimate.
    Validated,
    /// Signed for more than the estimate.
    Outperformed,
    /// Signed for less than the estimate.
    Discounted,
}

impl RetroOutcome {
    pub fn from_gap(gap: f64) -> Self {
        if gap.abs() < RETRO_TOLERANCE {
            RetroOutcome::Validated
        } else if gap > 0.0 {
            RetroOutcome::Outperformed
        } else {
            RetroOutcome::Discounted
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RetroOutcome::Validated => "prediction validated",
            RetroOutcome::Outperformed => "signed above estimate",
            RetroOutcome::Discounted => "signed below estimate",
        }
    }
}

/// The three salary checkpoints for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct RetroEntry {
    pub player: String,
    pub current: f64,
    pub estimate: f64,
    pub realized: f64,
    /// `realized - estimate`.
    pub gap: f64,
    pub outcome: RetroOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Retrospective {
    /// No player has a known next-season salary.
    NoData { reason: String },
    Available {
        entries: Vec<RetroEntry>,
        mean_absolute_error: f64,
    },
}

/// Compare model estimates with realized next-season salaries.
///
/// Only players with a known next-season salary take part; a signed $0
/// counts, an unknown salary does not.
pub fn retrospective(projection: &Projection) -> Retrospective {
    let entries: Vec<RetroEntry> = projection
        .players
        .iter()
        .filter_map(|p| {
            let realized = p.record.next_season_salary?;
            let (estimate, _) = p.record.scored()?;
            let gap = realized - estimate;
            Some(RetroEntry {
                player: p.record.player.clone(),
                current: p.record.salary,
                estimate,
                realized,
                gap,
                outcome: RetroOutcome::from_gap(gap),
            })
        })
        .collect();

    if entries.is_empty() {
        let reason = match &projection.future {
            FutureSalaries::Unavailable { reason } => reason.clone(),
            FutureSalaries::Loaded { .. } => "no scored player has a next-season salary".into(),
        };
        return Retrospective::NoData { reason };
    }

    let mean_absolute_error =
        entries.iter().map(|e| e.gap.abs()).sum::<f64>() / entries.len() as f64;
    Retrospective::Available {
        entries,
        mean_absolute_error,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

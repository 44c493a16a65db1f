// Plain-text rendering of stage results and projection views.

use std::fmt::Write;

use chrono::Local;
use fairshot_app::{FitReport, IngestSummary, ScoreReport};
use fairshot_basketball::views::{MarketOverview, PlayerProfile, Retrospective, ValuedPlayer};
use fairshot_core::currency::format_millions;
use fairshot_model::Evaluation;

pub fn render_header() -> String {
    format!("fairshot report, {}\n\n", Local::now().format("%Y-%m-%d %H:%M"))
}

fn signed_millions(value: f64) -> String {
    if value > 0.0 {
        format!("+{}", format_millions(value))
    } else {
        format_millions(value)
    }
}

fn opt_number(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.decimals$}"))
}

// writeln! into a String cannot fail.
pub fn render_ingest(summary: &IngestSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ingestion");
    let _ = writeln!(out, "  stat rows:            {}", summary.stat_rows);
    let _ = writeln!(out, "  unique players:       {}", summary.unique_players);
    let _ = writeln!(out, "  salary rows:          {}", summary.salary_rows);
    let _ = writeln!(out, "  joined:               {}", summary.joined);
    let _ = writeln!(out, "  dropped (no salary):  {}", summary.dropped_missing_salary);
    if !summary.missing_features.is_empty() {
        let _ = writeln!(out, "  missing features:     {}", summary.missing_features.join(", "));
    }
    let _ = writeln!(out, "  written to {}\n", summary.output.display());
    out
}

fn render_evaluation(out: &mut String, label: &str, evaluation: &Option<Evaluation>) {
    if let Some(e) = evaluation {
        let _ = writeln!(
            out,
            "  {:<11} n={:<4} MAE {}  RMSE {}  R2 {}",
            label,
            e.n,
            format_millions(e.mae),
            format_millions(e.rmse),
            opt_number(e.r2, 3)
        );
    }
}

pub fn render_fit(report: &FitReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Model");
    let _ = writeln!(
        out,
        "  scored {} players ({} used for training)",
        report.players, report.training_rows
    );
    render_evaluation(&mut out, "training", &report.training);
    render_evaluation(&mut out, "validation", &report.validation);

    let mut importances = report.importances.clone();
    importances.sort_by(|a, b| b.1.total_cmp(&a.1));
    let _ = writeln!(out, "  feature importance:");
    for (column, weight) in importances {
        let _ = writeln!(out, "    {:<4} {:>5.1}%", column.label(), weight * 100.0);
    }
    let _ = writeln!(
        out,
        "  written to {} and {}\n",
        report.scored_table.display(),
        report.model_artifact.display()
    );
    out
}

pub fn render_score(report: &ScoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Scoring");
    let _ = writeln!(out, "  re-scored {} players with the saved model", report.players);
    render_evaluation(&mut out, "in-sample", &report.evaluation);
    let _ = writeln!(out, "  written to {}\n", report.scored_table.display());
    out
}

fn render_valued(out: &mut String, title: &str, players: &[ValuedPlayer]) {
    let _ = writeln!(out, "{title}");
    if players.is_empty() {
        let _ = writeln!(out, "  (none)");
        return;
    }
    for (rank, p) in players.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {:<26} {:<3} age {:>4}  paid {:>8}  worth {:>8}  {:>9}",
            rank + 1,
            p.player,
            p.pos.as_deref().unwrap_or("-"),
            opt_number(p.age, 0),
            format_millions(p.salary),
            format_millions(p.predicted_salary),
            signed_millions(p.difference)
        );
    }
}

pub fn render_overview(overview: &MarketOverview) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Market overview: {} scored players\n", overview.points.len());
    render_valued(&mut out, "Biggest steals", &overview.steals);
    let _ = writeln!(out);
    render_valued(&mut out, "Biggest busts", &overview.busts);
    let _ = writeln!(out);
    out
}

pub fn render_profile(profile: &PlayerProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}), age {}, {} games",
        profile.player,
        profile.pos.as_deref().unwrap_or("-"),
        opt_number(profile.age, 0),
        opt_number(profile.games, 0)
    );
    let _ = writeln!(
        out,
        "  paid {}  worth {}  difference {}  => {}",
        format_millions(profile.salary),
        format_millions(profile.predicted_salary),
        signed_millions(profile.difference),
        profile.verdict.label()
    );

    let _ = writeln!(out, "  profile vs league (share of league max):");
    for ((column, ratio), (_, average)) in profile.ratios.iter().zip(profile.league_average.iter()) {
        let _ = writeln!(
            out,
            "    {:<4} {:>5.1}%  league {:>5.1}%",
            column.label(),
            ratio * 100.0,
            average * 100.0
        );
    }

    let _ = writeln!(out, "  key stats:");
    for stat in &profile.key_stats {
        let decimals = if stat.column.is_percentage() { 3 } else { 1 };
        let delta = stat
            .delta
            .map_or_else(|| "-".to_string(), |d| format!("{d:+.decimals$}"));
        let _ = writeln!(
            out,
            "    {:<4} {:>7}  league {:>7}  ({})",
            stat.column.label(),
            opt_number(stat.value, decimals),
            opt_number(stat.league_mean, decimals),
            delta
        );
    }
    out
}

pub fn render_retrospective(retro: &Retrospective) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Retrospective");
    match retro {
        Retrospective::NoData { reason } => {
            let _ = writeln!(out, "  no next-season data: {reason}");
        }
        Retrospective::Available {
            entries,
            mean_absolute_error,
        } => {
            for e in entries {
                let _ = writeln!(
                    out,
                    "  {:<26} current {:>8}  estimate {:>8}  realized {:>8}  {}",
                    e.player,
                    format_millions(e.current),
                    format_millions(e.estimate),
                    format_millions(e.realized),
                    e.outcome.label()
                );
            }
            let _ = writeln!(
                out,
                "  mean absolute error over {} players: {}",
                entries.len(),
                format_millions(*mean_absolute_error)
            );
        }
    }
    out
}

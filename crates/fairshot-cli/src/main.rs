// fairshot entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Load config (copying defaults on first run)
// 3. Initialize tracing (log to file, stdout carries the reports)
// 4. Run the requested stage(s) and print the result

mod report;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use fairshot_app::{fit, prepare, project, run_all, score, ScoredCache};
use fairshot_basketball::views::{market_overview, player_profile, retrospective};
use fairshot_core::config::{self, Config, LoggingConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "fairshot", version, about = "Estimate fair NBA salaries from box-score statistics")]
struct Cli {
    /// Project root holding `config/` and `defaults/`.
    #[arg(long, global = true, default_value = ".")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile statistics and salaries into the canonical table.
    Prepare,
    /// Fit the salary model and score every player.
    Fit,
    /// Re-score the canonical table with the saved model.
    Score,
    /// Print the market overview, or one player's profile.
    Report {
        #[arg(long)]
        player: Option<String>,
    },
    /// Run prepare, fit and report in sequence.
    Run,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    init_tracing(&config.logging)?;
    info!("fairshot starting: {:?}", cli.command);

    let result = dispatch(&cli.command, &config);
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn dispatch(command: &Command, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Prepare => {
            let summary = prepare(config).context("ingestion failed")?;
            print!("{}", report::render_ingest(&summary));
        }
        Command::Fit => {
            let fitted = fit(config).context("model fitting failed")?;
            print!("{}", report::render_fit(&fitted));
        }
        Command::Score => {
            let scored = score(config).context("scoring failed")?;
            print!("{}", report::render_score(&scored));
        }
        Command::Report { player } => {
            let mut cache = ScoredCache::new();
            let projection = project(config, &mut cache).context("projection failed")?;
            match player {
                Some(name) => {
                    let Some(profile) = player_profile(&projection, name) else {
                        let needle = name.to_lowercase();
                        let similar: Vec<&str> = projection
                            .player_names()
                            .into_iter()
                            .filter(|n| n.to_lowercase().contains(&needle))
                            .take(5)
                            .collect();
                        if similar.is_empty() {
                            bail!("no scored player named '{}'", name);
                        }
                        bail!("no scored player named '{}'; did you mean: {}", name, similar.join(", "));
                    };
                    print!("{}", report::render_profile(&profile));
                }
                None => {
                    let overview =
                        market_overview(&projection, config.projection.min_age, config.projection.top_n);
                    print!("{}", report::render_header());
                    print!("{}", report::render_overview(&overview));
                    print!("{}", report::render_retrospective(&retrospective(&projection)));
                }
            }
        }
        Command::Run => {
            let run = run_all(config).context("pipeline run failed")?;
            let overview = market_overview(&run.projection, config.projection.min_age, config.projection.top_n);
            print!("{}", report::render_header());
            print!("{}", report::render_ingest(&run.ingest));
            print!("{}", report::render_fit(&run.fit));
            print!("{}", report::render_overview(&overview));
            print!("{}", report::render_retrospective(&retrospective(&run.projection)));
        }
    }
    Ok(())
}

/// Resolve the log directory: the configured one, else the platform data
/// directory, else `./logs`.
fn log_directory(logging: &LoggingConfig) -> anyhow::Result<PathBuf> {
    if let Some(dir) = &logging.directory {
        return Ok(dir.clone());
    }
    if let Some(dirs) = directories::ProjectDirs::from("", "", "fairshot") {
        return Ok(dirs.data_local_dir().join("logs"));
    }
    Ok(std::env::current_dir()?.join("logs"))
}

/// Initialize tracing to log to a file so stdout only carries reports.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = log_directory(logging)?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_file = std::fs::File::create(log_path(&log_dir))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

fn log_path(dir: &Path) -> PathBuf {
    dir.join("fairshot.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_report_with_player() {
        let cli = Cli::parse_from(["fairshot", "--config", "/tmp/x", "report", "--player", "Nikola Jokić"]);
        assert_eq!(cli.config, PathBuf::from("/tmp/x"));
        match cli.command {
            Command::Report { player } => assert_eq!(player.as_deref(), Some("Nikola Jokić")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["fairshot", "fit", "--config", "proj"]);
        assert!(matches!(cli.command, Command::Fit));
        assert_eq!(cli.config, PathBuf::from("proj"));
    }

    #[test]
    fn configured_log_directory_wins() {
        let logging = LoggingConfig {
            filter: "fairshot=debug".into(),
            directory: Some(PathBuf::from("/var/log/fairshot")),
        };
        assert_eq!(log_directory(&logging).unwrap(), PathBuf::from("/var/log/fairshot"));
        assert_eq!(log_path(Path::new("/l")), PathBuf::from("/l/fairshot.log"));
    }
}

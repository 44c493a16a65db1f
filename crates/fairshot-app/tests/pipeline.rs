// End-to-end runs of the pipeline stages against a temporary project
// directory.

use std::fs;
use std::path::Path;

use fairshot_app::{fit, prepare, project, run_all, score, PipelineError, ScoredCache};
use fairshot_basketball::canonical::CanonicalTable;
use fairshot_basketball::profile::FutureSalaries;
use fairshot_basketball::views::{retrospective, Retrospective};
use fairshot_core::config::{load_config_from, Config};
use fairshot_core::table::SniffedSource;

const STATS: &str = "\
Rk,Player,Age,Team,Pos,G,MP,PTS,TRB,AST,STL,BLK,FG%,3P%
1,Alpha,25,BOS,PG,70,34.0,27.0,5.0,7.0,1.5,0.4,.490,.380
2,Beta,29,2TM,SF,60,30.0,18.0,6.0,3.0,0.9,0.5,.460,.360
3,Beta,29,NYK,SF,30,29.0,17.0,6.0,3.0,0.8,0.5,.450,.350
4,Beta,29,LAL,SF,30,31.0,19.0,6.0,3.0,1.0,0.5,.470,.370
5,Gamma,31,MIA,C,50,25.0,11.0,11.0,1.5,0.6,2.1,.610,
6,Delta,21,DEN,SG,40,15.0,6.0,2.0,1.0,0.4,0.1,.410,.330
7,Epsilon,27,PHX,PF,75,32.0,22.0,8.0,4.0,1.1,0.9,.500,.340
8,Zeta,33,GSW,PG,66,26.0,12.0,3.0,8.0,1.3,0.2,.440,.390
9,Eta,24,SAC,C,58,20.0,8.0,7.0,1.0,0.5,1.4,.570,.250
10,Theta,35,LAC,SF,45,18.0,7.0,4.0,2.0,0.6,0.3,.430,.360
";

const SALARIES: &str = "\
Player,Salary
Alpha,\"$45,000,000\"
Beta,\"$20,000,000\"
Gamma,\"$25,000,000\"
Delta,\"$3,000,000\"
Epsilon,\"$30,000,000\"
Zeta,\"$15,000,000\"
Eta,\"$8,000,000\"
Theta,N/A
Iota,\"$9,000,000\"
";

const FUTURE: &str = "\
Player,2025-26
Alpha,\"$48,000,000\"
Gamma,$0
";

fn write_project(dir: &Path, future: Option<&str>, model_extra: &str) -> Config {
    fs::create_dir_all(dir.join("config")).unwrap();
    fs::create_dir_all(dir.join("data")).unwrap();
    fs::write(dir.join("data/stats.csv"), STATS).unwrap();
    fs::write(dir.join("data/salaries.csv"), SALARIES).unwrap();
    if let Some(future) = future {
        fs::write(dir.join("data/future.csv"), future).unwrap();
    }
    let toml = format!(
        r#"
[paths]
stats = "data/stats.csv"
salaries = "data/salaries.csv"
future_salaries = "data/future.csv"
output_dir = "output"

[model]
n_estimators = 25
{model_extra}
"#
    );
    fs::write(dir.join("config/pipeline.toml"), toml).unwrap();
    load_config_from(dir).unwrap()
}

fn read_table(path: &Path) -> CanonicalTable {
    CanonicalTable::read(&SniffedSource::open(path).unwrap()).unwrap()
}

#[test]
fn single_player_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    fs::write(
        dir.path().join("data/stats.csv"),
        "Player,Age,G,PTS,TRB,AST,STL,BLK,FG%,3P%\nA,25,70,20,5,5,1,0.5,0.45,0.35\n",
    )
    .unwrap();
    fs::write(dir.path().join("data/salaries.csv"), "Player,Salary\nA,\"$10,000,000\"\n").unwrap();

    let summary = prepare(&config).unwrap();
    assert_eq!(summary.joined, 1);
    let canonical = read_table(&config.paths.canonical_table());
    assert_eq!(canonical.players[0].player, "A");
    assert_eq!(canonical.players[0].salary, 10_000_000.0);

    fit(&config).unwrap();
    let scored = read_table(&config.paths.scored_table());
    let (predicted, difference) = scored.players[0].scored().unwrap();
    assert_eq!(predicted, 10_000_000.0);
    assert_eq!(difference, predicted - 10_000_000.0);
}

#[test]
fn full_run_produces_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), Some(FUTURE), "");

    let run = run_all(&config).unwrap();
    assert_eq!(run.ingest.stat_rows, 10);
    assert_eq!(run.ingest.unique_players, 8);
    assert_eq!(run.ingest.joined, 7);
    assert_eq!(run.ingest.dropped_missing_salary, 1);
    assert_eq!(run.fit.players, 7);
    assert!(run.fit.validation.is_none());
    assert!(config.paths.canonical_table().exists());
    assert!(config.paths.scored_table().exists());
    assert!(config.paths.model_artifact().exists());

    assert_eq!(run.projection.future, FutureSalaries::Loaded { matched: 2 });
    let gamma = run.projection.find("Gamma").unwrap();
    assert_eq!(gamma.record.next_season_salary, Some(0.0));
    assert_eq!(run.projection.find("Beta").unwrap().record.next_season_salary, None);

    match retrospective(&run.projection) {
        Retrospective::Available { entries, .. } => assert_eq!(entries.len(), 2),
        other => panic!("expected retrospective data, got {other:?}"),
    }
}

#[test]
fn fitting_twice_writes_identical_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "validation_fraction = 0.3");
    prepare(&config).unwrap();

    fit(&config).unwrap();
    let first = fs::read(config.paths.scored_table()).unwrap();
    fit(&config).unwrap();
    let second = fs::read(config.paths.scored_table()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn score_reuses_the_saved_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    prepare(&config).unwrap();
    fit(&config).unwrap();
    let fitted = fs::read(config.paths.scored_table()).unwrap();

    fs::remove_file(config.paths.scored_table()).unwrap();
    let report = score(&config).unwrap();
    assert_eq!(report.players, 7);
    assert_eq!(fs::read(config.paths.scored_table()).unwrap(), fitted);
}

#[test]
fn missing_inputs_fail_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    fs::remove_file(dir.path().join("data/salaries.csv")).unwrap();

    assert!(prepare(&config).is_err());
    assert!(!config.paths.canonical_table().exists());

    let err = fit(&config).unwrap_err();
    assert!(matches!(err, PipelineError::MissingArtifact { stage: "prepare", .. }));
    assert!(!config.paths.scored_table().exists());
    assert!(!config.paths.model_artifact().exists());
}

#[test]
fn failed_prepare_invalidates_earlier_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    prepare(&config).unwrap();
    fit(&config).unwrap();

    fs::write(dir.path().join("data/salaries.csv"), "Player,Pay\nAlpha,$1\n").unwrap();
    assert!(prepare(&config).is_err());
    assert!(!config.paths.canonical_table().exists());
    assert!(!config.paths.scored_table().exists());
    assert!(!config.paths.model_artifact().exists());

    let err = fit(&config).unwrap_err();
    assert!(matches!(err, PipelineError::MissingArtifact { stage: "prepare", .. }));
}

#[test]
fn failed_model_write_leaves_no_scored_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    prepare(&config).unwrap();
    fit(&config).unwrap();

    // A directory in the artifact's place makes the final rename fail.
    let model = config.paths.model_artifact();
    fs::remove_file(&model).unwrap();
    fs::create_dir_all(model.join("occupied")).unwrap();

    assert!(fit(&config).is_err());
    assert!(!config.paths.scored_table().exists());
}

#[test]
fn failed_score_removes_the_scored_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    prepare(&config).unwrap();
    fit(&config).unwrap();

    fs::write(config.paths.model_artifact(), "{\"trees\": []}").unwrap();
    assert!(score(&config).is_err());
    assert!(!config.paths.scored_table().exists());
}

#[test]
fn latin1_semicolon_sources_flow_through_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    let stats = "\
Player;Age;Team;Pos;G;PTS;TRB;AST;STL;BLK;FG%;3P%
José Calderón;31;TOR;PG;70;11.5;3.0;8.0;1.0;0.1;.457;.410
Manu Ginóbili;35;SAS;SG;60;12.0;3.4;4.5;1.3;0.2;.448;.353
Raúl López;26;MEM;PG;40;8.0;2.0;4.0;0.9;0.0;.430;.380
";
    // Latin-1: every char here is below U+0100.
    let latin1: Vec<u8> = stats.chars().map(|c| c as u8).collect();
    assert!(std::str::from_utf8(&latin1).is_err());
    fs::write(dir.path().join("data/stats.csv"), latin1).unwrap();
    fs::write(
        dir.path().join("data/salaries.csv"),
        "Player,Salary\nJosé Calderón,\"$10,551,500\"\nManu Ginóbili,\"$7,229,000\"\n",
    )
    .unwrap();

    let summary = prepare(&config).unwrap();
    assert_eq!(summary.stat_rows, 3);
    assert_eq!(summary.joined, 2);

    let canonical = read_table(&config.paths.canonical_table());
    let jose = canonical.find("José Calderón").unwrap();
    assert_eq!(jose.salary, 10_551_500.0);
    assert_eq!(jose.pos.as_deref(), Some("PG"));

    fit(&config).unwrap();
    assert!(read_table(&config.paths.scored_table()).is_scored());
}

#[test]
fn fit_refuses_a_partial_feature_set() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    fs::write(
        dir.path().join("data/stats.csv"),
        "Player,Age,G,PTS\nAlpha,25,70,27\nBeta,29,60,18\n",
    )
    .unwrap();
    prepare(&config).unwrap();

    match fit(&config).unwrap_err() {
        PipelineError::MissingFeatures { columns, .. } => {
            assert!(columns.contains(&"3P%".to_string()));
            assert!(!columns.contains(&"PTS".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!config.paths.scored_table().exists());
}

#[test]
fn projection_degrades_without_future_salaries() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    prepare(&config).unwrap();
    fit(&config).unwrap();

    let mut cache = ScoredCache::new();
    let projection = project(&config, &mut cache).unwrap();
    assert!(matches!(projection.future, FutureSalaries::Unavailable { .. }));
    assert!(projection.players.iter().all(|p| p.record.next_season_salary.is_none()));
    assert!(matches!(retrospective(&projection), Retrospective::NoData { .. }));
}

#[test]
fn projection_requires_a_scored_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_project(dir.path(), None, "");
    prepare(&config).unwrap();
    fs::create_dir_all(config.paths.output_dir.clone()).unwrap();
    fs::copy(config.paths.canonical_table(), config.paths.scored_table()).unwrap();

    let mut cache = ScoredCache::new();
    let err = project(&config, &mut cache).unwrap_err();
    assert!(matches!(err, PipelineError::NotScored { .. }));
}

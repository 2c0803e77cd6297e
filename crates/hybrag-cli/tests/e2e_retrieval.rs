//! E2E CLI tests covering:
//! - `hybrag search` across strategies, JSON contract, and `-n` validation
//! - `hybrag explain` breakdowns summing to the fused score
//! - `hybrag compare` running every strategy on one query
//! - `hybrag ask` falling back to a context answer without a model key
//!
//! Each test ingests a small medical corpus into an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn hybrag_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hybrag"));
    cmd.current_dir(dir);
    cmd.env("HYBRAG_LOG", "error");
    cmd.env_remove("OPENAI_API_KEY");
    cmd.env_remove("FORMAT");
    cmd.env_remove("HYBRAG_TOP_K");
    cmd.env_remove("HYBRAG_STRATEGY");
    cmd
}

const CORPUS: &str = r#"{"doc_id": "med-001", "title": "Hypertension", "text": "High blood pressure is managed with diet, exercise, and ACE inhibitors."}
{"doc_id": "med-002", "title": "Diabetes", "text": "Insulin regulates blood glucose; type 2 diabetes involves insulin resistance."}
{"doc_id": "med-003", "title": "Migraine", "text": "Migraine attacks respond to triptans; migraine prevention uses beta blockers."}
{"doc_id": "med-004", "title": "Asthma", "text": "Inhaled corticosteroids reduce airway inflammation in asthma."}
"#;

/// Initialized project with the corpus ingested and embedded.
fn seeded_project() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    hybrag_cmd(dir.path()).arg("init").assert().success();
    fs::write(dir.path().join("corpus.jsonl"), CORPUS).expect("write corpus");
    hybrag_cmd(dir.path())
        .args(["ingest", "corpus.jsonl"])
        .assert()
        .success();
    dir
}

fn json_of(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command should not crash");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

fn scores(results: &Value) -> Vec<f64> {
    results
        .as_array()
        .expect("results array")
        .iter()
        .map(|hit| hit["score"].as_f64().expect("score"))
        .collect()
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

#[test]
fn hybrid_search_json_contract() {
    let dir = seeded_project();
    let json = json_of(hybrag_cmd(dir.path()).args(["search", "migraine triptans", "-n", "3", "--json"]));

    assert_eq!(json["query"], "migraine triptans");
    assert_eq!(json["strategy"], "hybrid");
    assert_eq!(json["results"][0]["doc_id"], "med-003");
    assert_eq!(json["results"][0]["rank"], 1);
    assert_eq!(json["results"][0]["title"], "Migraine");

    let scores = scores(&json["results"]);
    assert!(scores.len() <= 3);
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]), "{scores:?}");
}

#[test]
fn every_strategy_returns_sorted_results() {
    let dir = seeded_project();
    for strategy in ["vector", "fulltext", "keyword", "semantic", "hybrid"] {
        let json = json_of(
            hybrag_cmd(dir.path()).args(["search", "insulin blood glucose", "-s", strategy, "--json"]),
        );
        let scores = scores(&json["results"]);
        assert!(
            scores.windows(2).all(|pair| pair[0] >= pair[1]),
            "{strategy}: {scores:?}"
        );
    }
}

#[test]
fn fulltext_search_single_match_scores_one() {
    let dir = seeded_project();
    let json = json_of(
        hybrag_cmd(dir.path()).args(["search", "corticosteroids", "--strategy", "fulltext", "--json"]),
    );

    assert_eq!(json["strategy"], "fulltext");
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["doc_id"], "med-004");
    assert_eq!(json["results"][0]["score"], 1.0);
    assert_eq!(json["results"][0]["breakdown"]["fulltext"]["weight"], 1.0);
}

#[test]
fn search_text_mode_is_tab_separated() {
    let dir = seeded_project();
    hybrag_cmd(dir.path())
        .args(["search", "asthma", "-s", "fulltext", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("1\tmed-004\t1.000000\tAsthma"));
}

#[test]
fn zero_limit_is_an_invalid_top_k() {
    let dir = seeded_project();
    hybrag_cmd(dir.path())
        .args(["search", "asthma", "-n", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn unknown_strategy_is_a_usage_error() {
    let dir = seeded_project();
    hybrag_cmd(dir.path())
        .args(["search", "asthma", "--strategy", "bm42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bm42"));
}

#[test]
fn strategy_env_override_applies() {
    let dir = seeded_project();
    let json = json_of(
        hybrag_cmd(dir.path())
            .env("HYBRAG_STRATEGY", "semantic")
            .args(["search", "asthma", "--json"]),
    );
    assert_eq!(json["strategy"], "semantic");
}

// ---------------------------------------------------------------------------
// explain / compare
// ---------------------------------------------------------------------------

#[test]
fn explain_contributions_sum_to_fused_score() {
    let dir = seeded_project();
    let json = json_of(hybrag_cmd(dir.path()).args(["explain", "migraine prevention", "-n", "2", "--json"]));

    assert_eq!(json["weights"]["vector"], 0.4);
    let results = json["results"].as_array().expect("results");
    assert!(!results.is_empty() && results.len() <= 2);

    for result in results {
        let fused = result["fused_score"].as_f64().expect("fused");
        let sum: f64 = ["vector", "fulltext", "semantic"]
            .iter()
            .map(|kind| result["breakdown"][kind]["contribution"].as_f64().expect("contribution"))
            .sum();
        assert!((fused - sum).abs() < 1e-9, "{fused} vs {sum}");
    }
    assert_eq!(json["sources"]["vector"]["count"], 4);
}

#[test]
fn compare_runs_all_strategies() {
    let dir = seeded_project();
    let json = json_of(hybrag_cmd(dir.path()).args(["compare", "blood pressure", "-n", "2", "--json"]));

    let runs = json["runs"].as_array().expect("runs");
    let names: Vec<&str> = runs.iter().map(|run| run["strategy"].as_str().expect("name")).collect();
    assert_eq!(names, ["vector", "fulltext", "semantic", "hybrid"]);
    assert!(runs.iter().all(|run| run.get("error").is_none()));

    let hybrid = &runs[3]["results"];
    assert_eq!(hybrid[0]["doc_id"], "med-001");
    for id in json["common"].as_array().expect("common") {
        assert!(
            hybrid.as_array().expect("hits").iter().any(|hit| &hit["doc_id"] == id),
            "{id} missing from hybrid"
        );
    }
}

// ---------------------------------------------------------------------------
// ask
// ---------------------------------------------------------------------------

#[test]
fn ask_without_model_echoes_context() {
    let dir = seeded_project();
    let json = json_of(hybrag_cmd(dir.path()).args(["ask", "How are migraines treated?", "-n", "2", "--json"]));

    assert_eq!(json["generated"], false);
    let response = json["response"].as_str().expect("response");
    assert!(response.contains("How are migraines treated?"));
    assert!(response.contains("fallback response"));
    assert!(json["context_length"].as_u64().expect("length") > 0);
    assert!(json.get("explanation").is_none());
}

#[test]
fn ask_explain_and_context_cap() {
    let dir = seeded_project();
    let json = json_of(hybrag_cmd(dir.path()).args([
        "ask",
        "insulin",
        "--explain",
        "--max-context",
        "40",
        "--json",
    ]));

    assert!(json["context_length"].as_u64().expect("length") <= 43);
    assert!(json["explanation"]["results"].is_array());
}

#[test]
fn ask_on_empty_store_still_answers() {
    let dir = TempDir::new().expect("tempdir");
    hybrag_cmd(dir.path()).arg("init").assert().success();

    let json = json_of(hybrag_cmd(dir.path()).args(["ask", "anything", "--json"]));
    assert_eq!(json["retrieved"].as_array().map(Vec::len), Some(0));
    assert_eq!(json["generated"], false);
}

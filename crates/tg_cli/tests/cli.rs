use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn tags() -> Command {
    Command::cargo_bin("tags").unwrap()
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, body).unwrap();
    p
}

#[test]
fn fingerprint_ignores_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(
        dir.path(),
        "a.json",
        r#"[{"member_id":"alice","finish_rank":1},{"member_id":"bob","finish_rank":2}]"#,
    );
    let b = write(
        dir.path(),
        "b.json",
        r#"[{"member_id":"bob","finish_rank":2},{"member_id":"alice","finish_rank":1}]"#,
    );

    let first = tags().args(["fingerprint", "--round"]).arg(&a).output().unwrap();
    assert!(first.status.success());
    let hex = String::from_utf8(first.stdout).unwrap();
    assert_eq!(hex.trim().len(), 64);

    tags()
        .args(["fingerprint", "--round"])
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::eq(hex.as_str()));
}

#[test]
fn malformed_round_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = write(dir.path(), "r.json", r#"[{"member_id":"alice"}]"#);
    tags().args(["fingerprint", "--round"]).arg(&p).assert().code(2);
}

#[test]
fn missing_file_exits_with_usage_code() {
    tags()
        .args(["fingerprint", "--round", "/definitely/not/here.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn params_fill_defaults_and_reject_bad_bands() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write(dir.path(), "ok.json", r#"{"max_tag": 72}"#);
    tags()
        .args(["params", "--params"])
        .arg(&ok)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""max_tag":72"#).and(predicate::str::contains(r#""base_win_points":100"#)));

    let bad = write(dir.path(), "bad.json", r#"{"gold_band_pct": 50, "silver_band_pct": 20}"#);
    tags().args(["params", "--params"]).arg(&bad).assert().code(2);

    let unknown = write(dir.path(), "unknown.json", r#"{"max_tags": 72}"#);
    tags().args(["params", "--params"]).arg(&unknown).assert().code(2);
}

const LOG: &str = r#"{"type":"season_start_requested","guild_id":"g1","season_id":"s1","name":"Spring"}
{"type":"round_finalized","guild_id":"g1","round_id":"q1","kind":"qualifying","results":[{"member_id":"alice","finish_rank":1},{"member_id":"bob","finish_rank":2}]}

{"type":"swap_requested","guild_id":"g1","member_id":"bob","target_tag":1,"requested_at":"2026-06-01T18:00:00Z"}
{"type":"swap_requested","guild_id":"g1","member_id":"alice","target_tag":2,"requested_at":"2026-06-01T18:01:00Z"}
"#;

#[test]
fn replay_prints_one_json_line_per_outbound_event() {
    let dir = tempfile::tempdir().unwrap();
    let events = write(dir.path(), "events.jsonl", LOG);
    let out = tags().args(["replay", "--events"]).arg(&events).output().unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let lines: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let types: Vec<&str> = lines.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["season_started", "leaderboard_updated", "points_awarded", "swap_pending", "swap_executed"]
    );
    assert_eq!(lines[4]["slots"][0]["member_id"], "bob");
}

#[test]
fn replay_keeps_intents_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let head: String = LOG.lines().take(4).map(|l| format!("{l}\n")).collect();
    let events = write(dir.path(), "events.jsonl", &head);
    let intents = dir.path().join("intents");

    tags()
        .args(["replay", "--events"])
        .arg(&events)
        .arg("--intents-dir")
        .arg(&intents)
        .assert()
        .success()
        .stdout(predicate::str::contains("swap_pending"));
    assert_eq!(fs::read_dir(&intents).unwrap().count(), 1);
}

#[test]
fn replay_stops_on_a_malformed_line() {
    let dir = tempfile::tempdir().unwrap();
    let events = write(dir.path(), "events.jsonl", "{\"type\":\"nope\"}\n");
    tags()
        .args(["replay", "--events"])
        .arg(&events)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("events.jsonl:1"));
}

#[test]
fn rejected_events_do_not_fail_the_replay() {
    let dir = tempfile::tempdir().unwrap();
    let events = write(
        dir.path(),
        "events.jsonl",
        r#"{"type":"recalculate_round","guild_id":"g1","round_id":"missing"}"#,
    );
    tags()
        .args(["replay", "--events"])
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""kind":"validation""#));
}

#[test]
fn slots_rebuilds_and_inserts() {
    let dir = tempfile::tempdir().unwrap();
    let board = write(
        dir.path(),
        "board.json",
        r#"[{"member_id":"alice","tag":1},{"member_id":"bob","tag":2},{"member_id":"carol","tag":3}]"#,
    );
    let pairs = write(dir.path(), "pairs.json", r#"["1:dave","2:bob","junk"]"#);

    tags()
        .args(["slots", "--board"])
        .arg(&board)
        .arg("--pairs")
        .arg(&pairs)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"member_id":"bob","tag":1}"#));

    tags()
        .args(["slots", "--board"])
        .arg(&board)
        .args(["--insert", "2:zed"])
        .assert()
        .success()
        .stdout(predicate::eq(
            "[{\"member_id\":\"alice\",\"tag\":1},{\"member_id\":\"zed\",\"tag\":2},{\"member_id\":\"bob\",\"tag\":3},{\"member_id\":\"carol\",\"tag\":4}]\n",
        ));

    tags().args(["slots", "--board"]).arg(&board).assert().code(2);
}

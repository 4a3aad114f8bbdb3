// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

use std::{
    fs,
    os::unix::fs::{symlink, PermissionsExt},
    path::{Path, PathBuf},
    process::{Command, Output},
    time::Duration,
};

use pta_bench::{
    engine::Engine,
    measurement::{Outcome, RunMeasurement},
    results::{load_records, TrialRecord},
    suite::Benchmark,
    timer::Timer,
    toolchain::Layout,
};

const TIMER: &str = env!("CARGO_BIN_EXE_bench-timer");
const PTA_BENCH: &str = env!("CARGO_BIN_EXE_pta-bench");

fn system_bin(name: &str) -> PathBuf {
    ["/usr/bin", "/bin"]
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|path| path.exists())
        .unwrap_or_else(|| panic!("{name} not found"))
}

fn timer_json(args: &[&str]) -> (Output, RunMeasurement) {
    let out = Command::new(TIMER)
        .arg("--json")
        .args(args)
        .output()
        .expect("could not run bench-timer");
    let stdout = String::from_utf8(out.stdout.clone()).unwrap();
    let measurement = RunMeasurement::from_json(stdout.trim())
        .unwrap_or_else(|err| panic!("bad output {stdout:?}: {err}"));
    (out, measurement)
}

#[test]
fn timer_measures_successful_run() {
    let (out, m) = timer_json(&["--", "true"]);
    assert!(out.status.success());
    assert_eq!(m.outcome(), Outcome::Ok);
    assert!(m.finished_at >= m.started_at);
}

#[test]
fn timer_passes_through_exit_status() {
    let (out, m) = timer_json(&["--", "sh", "-c", "exit 3"]);
    assert_eq!(out.status.code(), Some(3));
    assert_eq!(m.exit_code, Some(3));
    assert_eq!(m.outcome(), Outcome::Fail);
}

#[test]
fn timer_kills_after_time_limit() {
    let (out, m) = timer_json(&["--time-limit", "300ms", "--", "sleep", "20"]);
    assert_eq!(out.status.code(), Some(124));
    assert!(m.timed_out);
    assert_eq!(m.outcome(), Outcome::Timeout);
    assert!(m.real_time < Duration::from_secs(10), "{:?}", m.real_time);
}

#[test]
fn timer_captures_output() {
    let dir = tempfile::tempdir().unwrap();
    let stdout = dir.path().join("out");
    let stderr = dir.path().join("err");
    let mut timer = Timer::new("sh");
    timer
        .args(["-c", "echo facts; echo oops >&2"])
        .stdout(&stdout)
        .stderr(&stderr)
        .helper(TIMER);
    let m = timer.run().unwrap();
    assert_eq!(m.outcome(), Outcome::Ok);
    assert_eq!(fs::read_to_string(stdout).unwrap(), "facts\n");
    assert_eq!(fs::read_to_string(stderr).unwrap(), "oops\n");
}

/// A workspace with fake engines and the facts of `coreutils/cat`.
fn fake_workspace(egglog: &str) -> (tempfile::TempDir, Layout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout {
        root: dir.path().to_owned(),
        ..Layout::default()
    };
    let egglog_bin = layout.egglog_bin();
    fs::create_dir_all(egglog_bin.parent().unwrap()).unwrap();
    symlink(system_bin(egglog), &egglog_bin).unwrap();
    add_facts(&layout, "cat");
    (dir, layout)
}

fn add_facts(layout: &Layout, file: &str) {
    let input = Benchmark::new("coreutils", file).input_dir(layout);
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("func_decl.csv"), "main\n").unwrap();
}

/// Install an executable shell script at `path`.
fn script(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn pta_bench(root: &Path, args: &[&str]) -> Output {
    pta_bench_on(root, "coreutils/cat", args)
}

fn pta_bench_on(root: &Path, filter: &str, args: &[&str]) -> Output {
    Command::new(PTA_BENCH)
        .arg("run")
        .arg("--root")
        .arg(root)
        .arg("--souffle")
        .arg(system_bin("true"))
        .arg("--results")
        .arg(root.join("results.csv"))
        .arg("--plot")
        .arg(root.join("results.svg"))
        .args(["-F", filter, "--time-limit", "30s"])
        .args(args)
        .output()
        .expect("could not run pta-bench")
}

#[test]
fn run_records_every_trial_once() {
    let (dir, _layout) = fake_workspace("true");
    let out = pta_bench(dir.path(), &["-R", "2"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "{stdout}\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(stdout.contains("egglog vs souffle"), "{stdout}");
    assert!(dir.path().join("results.svg").exists());

    let records = load_records(&dir.path().join("results.csv")).unwrap();
    assert_eq!(records.len(), 6);
    assert!(records.iter().all(|r| r.outcome == Outcome::Ok));
    assert!(Engine::ALL
        .iter()
        .all(|e| records.iter().filter(|r| r.engine == *e).count() == 2));

    // a second session finds everything cached
    let out = pta_bench(dir.path(), &["-R", "2", "--no-plot"]);
    assert!(out.status.success());
    let again = load_records(&dir.path().join("results.csv")).unwrap();
    assert_eq!(again, records);
}

#[test]
fn engine_failure_stops_the_run() {
    let (dir, _layout) = fake_workspace("false");
    let out = pta_bench(dir.path(), &["--engines", "egglog,souffle"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("egglog failed on coreutils/cat"));
    let records = load_records(&dir.path().join("results.csv")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, Outcome::Fail);

    let out = pta_bench(
        dir.path(),
        &["--engines", "egglog,souffle", "--keep-going", "--json", "--no-plot"],
    );
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let cells = &json["rows"][0]["cells"];
    assert_eq!(cells["egglog"]["outcome"], "fail");
    assert_eq!(cells["souffle"]["outcome"], "ok");
}

#[test]
fn missing_facts_suggest_generation() {
    let (dir, _layout) = fake_workspace("true");
    let out = Command::new(PTA_BENCH)
        .args(["run", "-F", "postgresql/psql", "--root"])
        .arg(dir.path())
        .arg("--results")
        .arg(dir.path().join("results.csv"))
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--gen-facts"));
}

#[test]
fn list_shows_inputs() {
    let (dir, _layout) = fake_workspace("true");
    let out = Command::new(PTA_BENCH)
        .args(["list", "-F", "coreutils/*", "--root"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("coreutils/cat"), "{stdout}");
    assert!(!stdout.contains("postgresql"), "{stdout}");
}

fn records_for<'a>(records: &'a [TrialRecord], file: &str) -> Vec<&'a TrialRecord> {
    records.iter().filter(|r| r.file == file).collect()
}

#[test]
fn fresh_replaces_only_selected_trials() {
    let (dir, layout) = fake_workspace("true");
    add_facts(&layout, "wc");
    let results = dir.path().join("results.csv");
    let souffle_only = ["--engines", "souffle", "--no-plot"];

    assert!(pta_bench_on(dir.path(), "coreutils/wc", &souffle_only).status.success());
    assert!(pta_bench_on(dir.path(), "coreutils/cat", &souffle_only).status.success());
    let before = load_records(&results).unwrap();
    assert_eq!(before.len(), 2);

    let out = pta_bench_on(
        dir.path(),
        "coreutils/cat",
        &["--engines", "souffle", "--no-plot", "--fresh"],
    );
    assert!(out.status.success());
    let after = load_records(&results).unwrap();
    assert_eq!(after.len(), 2);
    // the other benchmark is untouched, the selected one was run again
    assert_eq!(records_for(&after, "wc"), records_for(&before, "wc"));
    let (old, new) = (records_for(&before, "cat"), records_for(&after, "cat"));
    assert_eq!(new.len(), 1);
    assert_ne!(new[0].started_at, old[0].started_at);
}

#[test]
fn report_reads_the_cache() {
    let (dir, layout) = fake_workspace("true");
    add_facts(&layout, "wc");
    for filter in ["coreutils/cat", "coreutils/wc"] {
        assert!(pta_bench_on(dir.path(), filter, &["--no-plot"]).status.success());
    }

    let chart = dir.path().join("wc.svg");
    let out = Command::new(PTA_BENCH)
        .args(["report", "-F", "coreutils/wc", "--results"])
        .arg(dir.path().join("results.csv"))
        .arg("--plot")
        .arg(&chart)
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout.contains("wc"), "{stdout}");
    assert!(!stdout.contains("cat"), "{stdout}");
    assert!(stdout.contains("souffle (s)"), "{stdout}");
    assert!(stdout.contains("egglog vs souffle"), "{stdout}");
    let svg = fs::read_to_string(&chart).unwrap();
    assert!(svg.contains("wc"));
}

#[test]
fn gen_facts_regenerates_inputs() {
    let (dir, layout) = fake_workspace("true");
    let bench = Benchmark::new("coreutils", "cat");
    let bitcode = bench.bitcode(&layout);
    fs::create_dir_all(bitcode.parent().unwrap()).unwrap();
    fs::write(&bitcode, "BC").unwrap();
    let bc_facts = bench.bc_facts_dir(&layout);
    let input = bench.input_dir(&layout);
    fs::create_dir_all(&bc_facts).unwrap();
    fs::write(bc_facts.join("stale.facts"), "").unwrap();
    fs::write(input.join("stale.csv"), "").unwrap();

    let calls = dir.path().join("calls");
    script(
        &layout.factgen_bin(),
        &format!(
            "echo \"factgen $*\" >> {calls}\ntouch \"$2/call_instruction.facts\"",
            calls = calls.display()
        ),
    );
    let souffle = dir.path().join("bin/souffle");
    script(
        &souffle,
        &format!(
            "echo \"souffle $*\" >> {calls}\n\
             if [ \"$1\" = --fact-dir ]; then touch \"$4/func_decl.csv\"; fi",
            calls = calls.display()
        ),
    );

    let out = Command::new(PTA_BENCH)
        .args(["run", "--gen-facts", "--engines", "souffle", "--no-plot"])
        .args(["-F", "coreutils/cat", "--root"])
        .arg(dir.path())
        .arg("--souffle")
        .arg(&souffle)
        .arg("--results")
        .arg(dir.path().join("results.csv"))
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let calls = fs::read_to_string(calls).unwrap();
    let calls = calls.lines().collect::<Vec<_>>();
    assert_eq!(calls.len(), 3, "{calls:?}");
    assert_eq!(
        calls[0],
        format!(
            "factgen --out-dir {} --context-sensitivity insensitive {}",
            bc_facts.display(),
            bitcode.display()
        )
    );
    assert_eq!(
        calls[1],
        format!(
            "souffle --fact-dir {} --output-dir {} {}",
            bc_facts.display(),
            input.display(),
            dir.path().join("datalog/benchmark_setup.project").display()
        )
    );
    assert!(
        calls[2].starts_with(&format!("souffle --jobs=1 --fact-dir {}", input.display())),
        "{}",
        calls[2]
    );

    // both directories were recreated from scratch
    assert!(!bc_facts.join("stale.facts").exists());
    assert!(!input.join("stale.csv").exists());
    assert!(bc_facts.join("call_instruction.facts").exists());
    assert!(input.join("func_decl.csv").exists());
}

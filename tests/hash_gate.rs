// tests/hash_gate.rs

use std::error::Error;
use std::path::Path;

use pipdag::fs::mock::MockFileSystem;
use pipdag::fs::{FileSystem, RealFileSystem};
use pipdag::task::gate::{CompletionMarker, compute_fingerprint, job_is_active};
use pipdag::task::{GateDecision, HashGate, PollOutcome};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

const DIR: &str = "/out/3_CLAS/NN_FIT_SIM";

fn committed_gate(fs: &MockFileSystem, fingerprint: &str) -> anyhow::Result<HashGate> {
    let gate = HashGate::new(DIR);
    let fresh = gate.prepare_output_dir(fs)?;
    fresh.write_script("#!/bin/bash\necho hi\n")?;
    fresh.commit(fingerprint)?;
    Ok(gate)
}

#[test]
fn fingerprint_ignores_dependency_order() {
    let a = compute_fingerprint("script", ["x", "y"]);
    let b = compute_fingerprint("script", ["y", "x"]);
    assert_eq!(a, b);
    assert_ne!(a, compute_fingerprint("script", ["x"]));
    assert_ne!(a, compute_fingerprint("script2", ["x", "y"]));
}

#[test]
fn no_recorded_hash_means_run() -> TestResult {
    let fs = MockFileSystem::new();
    let gate = HashGate::new(DIR);
    assert_eq!(gate.decide(&fs, "abc", false, Some(false))?, GateDecision::Run);
    Ok(())
}

#[test]
fn matching_hash_with_success_marker_skips() -> TestResult {
    let fs = MockFileSystem::new();
    let gate = committed_gate(&fs, "abc")?;
    fs.add_file(gate.done_file(), "SUCCESS\n");

    assert_eq!(gate.decide(&fs, "abc", false, Some(false))?, GateDecision::Skip);
    // A forced refresh always runs.
    assert_eq!(gate.decide(&fs, "abc", true, Some(false))?, GateDecision::Run);
    Ok(())
}

#[test]
fn changed_hash_runs_even_after_success() -> TestResult {
    let fs = MockFileSystem::new();
    let gate = committed_gate(&fs, "abc")?;
    fs.add_file(gate.done_file(), "SUCCESS\n");

    assert_eq!(gate.decide(&fs, "def", false, Some(false))?, GateDecision::Run);
    Ok(())
}

#[test]
fn failure_marker_runs_again() -> TestResult {
    let fs = MockFileSystem::new();
    let gate = committed_gate(&fs, "abc")?;
    fs.add_file(gate.done_file(), "failure: exit 3\n");

    assert_eq!(gate.decide(&fs, "abc", false, Some(false))?, GateDecision::Run);
    Ok(())
}

#[test]
fn matching_hash_without_marker_resumes_active_job() -> TestResult {
    let fs = MockFileSystem::new();
    let gate = committed_gate(&fs, "abc")?;

    assert_eq!(gate.decide(&fs, "abc", false, Some(true))?, GateDecision::Resume);
    // Unknown queue state: do not risk a duplicate submission.
    assert_eq!(gate.decide(&fs, "abc", false, None)?, GateDecision::Resume);
    // Job gone and no marker: submit again.
    assert_eq!(gate.decide(&fs, "abc", false, Some(false))?, GateDecision::Run);
    Ok(())
}

#[test]
fn prepare_output_dir_wipes_stale_artifacts() -> TestResult {
    let fs = MockFileSystem::new();
    let gate = committed_gate(&fs, "abc")?;
    fs.add_file(Path::new(DIR).join("predictions.csv"), "id,prob\n");
    fs.add_file(Path::new(DIR).join("sub/partial.txt"), "x");
    fs.add_file("/out/3_CLAS/OTHER/keep.txt", "keep");

    let fresh = gate.prepare_output_dir(&fs)?;

    assert!(fs.is_dir(Path::new(DIR)));
    assert!(fs.files_under(DIR).is_empty());
    assert!(fs.is_file(Path::new("/out/3_CLAS/OTHER/keep.txt")));

    // Nothing is recorded until the caller commits.
    fresh.write_script("#!/bin/bash\n")?;
    assert_eq!(gate.persisted(&fs)?, None);
    fresh.commit("new")?;
    assert_eq!(gate.persisted(&fs)?.as_deref(), Some("new"));
    Ok(())
}

#[test]
fn poll_reads_marker_before_queue() -> TestResult {
    let fs = MockFileSystem::new();
    let gate = HashGate::new(DIR);
    let queue = vec!["out__NN_FIT_SIM".to_string()];
    let empty: Vec<String> = Vec::new();

    assert_eq!(gate.poll(&fs, "out__NN_FIT_SIM", Some(queue.as_slice()))?, PollOutcome::Pending);
    assert_eq!(gate.poll(&fs, "out__NN_FIT_SIM", None)?, PollOutcome::Pending);
    assert_eq!(gate.poll(&fs, "out__NN_FIT_SIM", Some(empty.as_slice()))?, PollOutcome::Vanished);

    fs.add_file(gate.done_file(), "FAILURE\n");
    assert_eq!(
        gate.poll(&fs, "out__NN_FIT_SIM", Some(queue.as_slice()))?,
        PollOutcome::Failure("FAILURE".to_string())
    );

    fs.add_file(gate.done_file(), "SUCCESS\n");
    assert_eq!(gate.poll(&fs, "out__NN_FIT_SIM", Some(empty.as_slice()))?, PollOutcome::Success);
    Ok(())
}

#[test]
fn marker_parsing_is_case_insensitive() {
    assert_eq!(CompletionMarker::parse("SUCCESS"), CompletionMarker::Success);
    assert_eq!(CompletionMarker::parse(""), CompletionMarker::Success);
    assert!(matches!(CompletionMarker::parse("Failure"), CompletionMarker::Failure(_)));
}

#[test]
fn queue_lookup_needs_exact_job_name() {
    let queue = vec!["out__SNN_S2".to_string(), "out__NN_FIT_SIM".to_string()];
    assert_eq!(job_is_active("out__NN_FIT_SIM", Some(queue.as_slice())), Some(true));
    assert_eq!(job_is_active("out__SNN_S", Some(queue.as_slice())), Some(false));
    assert_eq!(job_is_active("out__NN_FIT_SIM", None), None);
}

#[test]
fn job_with_longer_named_sibling_in_queue_has_vanished() -> TestResult {
    let fs = MockFileSystem::new();
    let gate = HashGate::new("/out/3_CLAS/SNN_S");
    let queue = vec!["out__SNN_S2".to_string()];

    assert_eq!(gate.poll(&fs, "out__SNN_S", Some(queue.as_slice()))?, PollOutcome::Vanished);

    // After a crash the sibling does not make this job look resumable.
    let fresh = gate.prepare_output_dir(&fs)?;
    fresh.commit("abc")?;
    let active = job_is_active("out__SNN_S", Some(queue.as_slice()));
    assert_eq!(gate.decide(&fs, "abc", false, active)?, GateDecision::Run);
    Ok(())
}

#[test]
fn real_filesystem_round_trip() -> TestResult {
    let tmp = TempDir::new()?;
    let fs = RealFileSystem;
    let dir = tmp.path().join("2_LCFIT").join("FIT_SIM");
    let gate = HashGate::new(&dir);

    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("stale.fitres"), "old")?;

    let fresh = gate.prepare_output_dir(&fs)?;
    assert!(!dir.join("stale.fitres").exists());
    let script = fresh.write_script("#!/bin/bash\n")?;
    fresh.commit("cafe")?;

    assert!(script.is_file());
    assert_eq!(gate.persisted(&fs)?.as_deref(), Some("cafe"));
    assert_eq!(gate.decide(&fs, "cafe", false, Some(false))?, GateDecision::Run);

    std::fs::write(gate.done_file(), "SUCCESS\n")?;
    assert_eq!(gate.decide(&fs, "cafe", false, Some(false))?, GateDecision::Skip);
    Ok(())
}

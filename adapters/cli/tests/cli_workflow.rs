use std::{fs, path::PathBuf, process::Command};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("strata-cli-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch directory");
    dir
}

fn strata(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .args(args)
        .output()
        .expect("failed to run strata binary")
}

#[test]
fn new_set_and_info_round_trip_through_a_world_file() {
    let dir = scratch_dir("round-trip");
    let world = dir.join("world.strata");
    let world_arg = world.to_str().expect("utf-8 path");

    let created = strata(&["new", world_arg, "--columns", "10", "--rows", "10", "--fill", "grass"]);
    assert!(created.status.success(), "new failed: {created:?}");

    let placed = strata(&["set", world_arg, "5", "5", "stone"]);
    assert!(placed.status.success(), "set failed: {placed:?}");

    let info = strata(&["info", world_arg]);
    assert!(info.status.success(), "info failed: {info:?}");
    let stdout = String::from_utf8_lossy(&info.stdout);
    assert!(stdout.contains("10x10"), "unexpected info output: {stdout}");
    assert!(stdout.contains("stone"), "unexpected info output: {stdout}");
    assert!(stdout.contains("99"), "grass count missing: {stdout}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn protected_tiles_reject_standard_placement() {
    let dir = scratch_dir("protected");
    let world = dir.join("world.strata");
    let world_arg = world.to_str().expect("utf-8 path");

    let created = strata(&["new", world_arg, "--columns", "4", "--rows", "4", "--fill", "bedrock"]);
    assert!(created.status.success(), "new failed: {created:?}");

    let rejected = strata(&["set", world_arg, "1", "1", "stone"]);
    assert!(!rejected.status.success(), "bedrock must refuse replacement");

    let removed = strata(&["remove", world_arg, "1", "1"]);
    assert!(removed.status.success(), "removal is privileged: {removed:?}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn report_failures_do_not_fail_the_command() {
    let dir = scratch_dir("report");
    let world = dir.join("world.strata");
    let report = dir.join("missing").join("report.toml");

    let created = strata(&[
        "new",
        world.to_str().expect("utf-8 path"),
        "--size",
        "small",
        "--report",
        report.to_str().expect("utf-8 path"),
    ]);

    assert!(created.status.success(), "report is best effort: {created:?}");
    assert!(world.exists());
    assert!(!report.exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn reports_are_written_when_the_destination_exists() {
    let dir = scratch_dir("report-ok");
    let world = dir.join("world.strata");
    let report = dir.join("report.toml");

    let created = strata(&[
        "new",
        world.to_str().expect("utf-8 path"),
        "--columns",
        "3",
        "--rows",
        "2",
        "--report",
        report.to_str().expect("utf-8 path"),
    ]);

    assert!(created.status.success(), "new failed: {created:?}");
    let contents = fs::read_to_string(&report).expect("report written");
    assert!(contents.contains("air = 6"), "unexpected report: {contents}");

    let _ = fs::remove_dir_all(&dir);
}

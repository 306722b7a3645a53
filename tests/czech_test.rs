//! Runs the CZECH compliance story when it is available
//!
//! The story is not shipped with the crate. Put it at `tests/data/czech.z5`
//! or point `ZWALKER_CZECH` at a copy; without it the test only logs.

use std::path::PathBuf;

use log::{info, warn};
use test_log::test;
use zwalker::{Interpreter, InterpreterConfig, RunState};

fn czech_path() -> Option<PathBuf> {
    let path = std::env::var_os("ZWALKER_CZECH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/czech.z5"));
    path.exists().then_some(path)
}

#[test]
fn czech_reports_no_failures() {
    let Some(path) = czech_path() else {
        warn!("CZECH story not found, skipping");
        return;
    };
    let story = std::fs::read(&path).unwrap();
    let config = InterpreterConfig {
        instruction_limit: Some(50_000_000),
        ..InterpreterConfig::seeded(1)
    };
    let mut zm = Interpreter::new(story, config).unwrap();

    let mut output = String::new();
    let mut state = zm.run().unwrap();
    // CZECH may pause for a key between sections
    while let RunState::NeedChar(_) | RunState::NeedLine(_) = state {
        output.push_str(&zm.take_output());
        state = match state {
            RunState::NeedChar(_) => zm.provide_char(' ').unwrap(),
            _ => zm.provide_line("").unwrap(),
        };
    }
    output.push_str(&zm.take_output());
    assert_eq!(state, RunState::Quit, "CZECH did not finish");
    info!("CZECH output:\n{}", output);

    // Summary line: "Passed: 411, Failed: 0, Print tests: 14"
    let failed = output
        .lines()
        .find_map(|line| line.split_once("Failed:"))
        .and_then(|(_, rest)| rest.split(',').next())
        .map(|n| n.trim().parse::<u32>().unwrap_or(u32::MAX));
    assert_eq!(failed, Some(0), "CZECH reported failures:\n{output}");
}

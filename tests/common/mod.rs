//! Shared helpers for the integration tests

#![allow(dead_code)]

use zwalker::test_utils::StoryBuilder;
use zwalker::{Interpreter, InterpreterConfig, LineRequest, RunState};

pub fn load(story: &StoryBuilder) -> Interpreter {
    Interpreter::new(story.build(), InterpreterConfig::seeded(7)).expect("story loads")
}

/// Run a story that must finish without asking for input
pub fn run_to_quit(story: &StoryBuilder) -> Interpreter {
    let mut zm = load(story);
    assert_eq!(zm.run().expect("story runs"), RunState::Quit);
    zm
}

pub fn expect_line(state: RunState) -> LineRequest {
    match state {
        RunState::NeedLine(request) => request,
        other => panic!("expected a line request, got {:?}", other),
    }
}

/// Big-endian bytes of a 16-bit operand
pub fn be(value: u32) -> [u8; 2] {
    (value as u16).to_be_bytes()
}

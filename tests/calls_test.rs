//! Routine calls, argument counts and stack discipline

mod common;

use common::{be, load, run_to_quit};
use test_log::test;
use zwalker::instruction::Instruction;
use zwalker::test_utils::{StoryBuilder, HIGH_BASE};
use zwalker::{ErrorCategory, Interpreter, InterpreterConfig, ZError};

#[test]
fn check_arg_count_ignores_declared_locals() {
    let mut story = StoryBuilder::new(5);
    // Five locals; g(n) counts whether argument n was supplied
    let mut body = Vec::new();
    for n in 1..=5u8 {
        body.extend([0xFF, 0x7F, n, 0x44]); // check_arg_count n ?~(skip 2)
        body.extend([0x95, 0x10 + n]); // inc g(n)
    }
    body.push(0xB0);
    let routine = story.routine(5, &body);
    let p = be(story.packed(routine) as u32);
    // call_vn routine 11 22
    story.main(&[0xF9, 0x17, p[0], p[1], 11, 22, 0xBA]);
    let zm = run_to_quit(&story);
    let supplied: Vec<u16> = (1..=5).map(|n| zm.vm.read_global(0x10 + n).unwrap()).collect();
    assert_eq!(supplied, vec![1, 1, 0, 0, 0]);
}

#[test]
fn call_vs2_passes_seven_arguments() {
    let mut story = StoryBuilder::new(5);
    // add L01..L07 into g00 via the stack
    let mut body = vec![0x74, 0x01, 0x02, 0x00]; // add L01 L02 -> sp
    for local in 3..=7u8 {
        body.extend([0x74, 0x00, local, 0x00]); // add sp Lnn -> sp
    }
    body.push(0xB8); // ret_popped
    let routine = story.routine(7, &body);
    let p = be(story.packed(routine) as u32);
    story.main(&[
        0xEC, 0x15, 0x55, p[0], p[1], 1, 2, 3, 4, 5, 6, 7, 0x10, // call_vs2 -> g00
        0x0D, 0x11, 0x2A, // store g01 42
        0xBA,
    ]);
    let zm = run_to_quit(&story);
    assert_eq!(zm.vm.read_global(0x10).unwrap(), 28);
    assert_eq!(zm.vm.read_global(0x11).unwrap(), 42);
}

#[test]
fn call_vn2_with_few_operands_keeps_alignment() {
    let mut story = StoryBuilder::new(5);
    let routine = story.routine(0, &[0xB0]);
    let p = be(story.packed(routine) as u32);
    let main = story.main(&[
        0xFA, 0x3F, 0xFF, p[0], p[1], // call_vn2 routine
        0x0D, 0x10, 0x05, // store g00 5
        0xBA,
    ]);
    let zm = run_to_quit(&story);
    assert_eq!(zm.vm.read_global(0x10).unwrap(), 5);

    let inst = Instruction::decode(&zm.vm.game.memory, main as usize, 5).unwrap();
    assert_eq!(inst.size, 5);
    assert_eq!(inst.operands.len(), 1);
}

#[test]
fn stack_underflow_is_fatal() {
    let mut story = StoryBuilder::new(5);
    story.main(&[0xB8]); // ret_popped with an empty stack
    let mut zm = load(&story);
    let err = zm.run().unwrap_err();
    assert!(matches!(err.source, ZError::StackUnderflow | ZError::ReturnFromMain));
    assert_eq!(err.source.category(), ErrorCategory::Memory);
}

#[test]
fn runaway_recursion_hits_depth_limit() {
    let mut story = StoryBuilder::new(5);
    // A routine that calls itself forever
    let addr = HIGH_BASE + 0x100;
    let p = be(addr as u32 / 4);
    story.poke(addr, &[0x00, 0xF9, 0x3F, p[0], p[1], 0xB0]);
    story.main(&[0xF9, 0x3F, p[0], p[1], 0xBA]);
    let config = InterpreterConfig {
        max_call_depth: 64,
        ..InterpreterConfig::seeded(1)
    };
    let mut zm = Interpreter::new(story.build(), config).unwrap();
    let err = zm.run().unwrap_err();
    assert!(matches!(err.source, ZError::CallDepthExceeded { limit: 64 }));
}

#[test]
fn locals_beyond_declared_count_are_rejected() {
    let mut story = StoryBuilder::new(3);
    // One local, then write L03
    let routine = story.routine(1, &[0x0D, 0x03, 0x01, 0xB0]);
    let p = be(story.packed(routine) as u32);
    story.main(&[0xE0, 0x3F, p[0], p[1], 0x00, 0xBA]);
    let mut zm = load(&story);
    let err = zm.run().unwrap_err();
    assert!(matches!(err.source, ZError::InvalidLocal { var: 3, num_locals: 1 }));
}

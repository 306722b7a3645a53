//! Suspend/resume input and timed interrupts

mod common;

use common::{be, expect_line, load};
use test_log::test;
use zwalker::test_utils::StoryBuilder;
use zwalker::{Interpreter, InterpreterConfig, RunState, ZError};

fn timed_read(routine_body: &[u8]) -> (StoryBuilder, u32) {
    let mut story = StoryBuilder::new(5);
    story.word("wait");
    let routine = story.routine(0, routine_body);
    let r = be(story.packed(routine) as u32);
    let text = story.table(&[16; 18]);
    let parse = story.table(&[2; 10]);
    let (t, p) = (be(text), be(parse));
    // aread text parse 5 routine -> g00; quit
    story.main(&[
        0xE4, 0x00, t[0], t[1], p[0], p[1], 0x00, 0x05, r[0], r[1], 0x10, 0xBA,
    ]);
    (story, text)
}

#[test]
fn interrupt_returning_false_keeps_reading() {
    let mut body = vec![0xB2];
    body.extend(StoryBuilder::new(5).encode("tick"));
    body.push(0xB1); // rfalse
    let (story, text) = timed_read(&body);
    let mut zm = load(&story);
    let request = expect_line(zm.run().unwrap());

    for _ in 0..3 {
        assert_eq!(zm.input_timeout().unwrap(), RunState::NeedLine(request));
    }
    assert_eq!(zm.take_output(), "tick".repeat(3));
    assert_eq!(zm.provide_line("wait").unwrap(), RunState::Quit);
    assert_eq!(zm.vm.read_byte(text + 1).unwrap(), 4);
    assert_eq!(zm.vm.read_global(0x10).unwrap(), 13);
}

#[test]
fn runaway_interrupt_is_abandoned() {
    let (story, _) = timed_read(&[0x8C, 0xFF, 0xFF]); // jump to itself
    let config = InterpreterConfig {
        timer_instruction_limit: 500,
        ..InterpreterConfig::seeded(2)
    };
    let mut zm = Interpreter::new(story.build(), config).unwrap();
    let request = expect_line(zm.run().unwrap());
    let frames = zm.vm.call_stack.len();
    let pc = zm.vm.pc;

    assert_eq!(zm.input_timeout().unwrap(), RunState::NeedLine(request));
    assert_eq!(zm.vm.call_stack.len(), frames);
    assert_eq!(zm.vm.pc, pc);
    assert_eq!(zm.provide_line("wait").unwrap(), RunState::Quit);
}

#[test]
fn untimed_read_ignores_timeouts() {
    let mut story = StoryBuilder::new(5);
    let text = story.table(&[16; 18]);
    let t = be(text);
    story.main(&[0xE4, 0x1F, t[0], t[1], 0x00, 0x10, 0xBA]);
    let mut zm = load(&story);
    let request = expect_line(zm.run().unwrap());
    assert_eq!(request.routine, 0);
    assert_eq!(zm.input_timeout().unwrap(), RunState::NeedLine(request));
    assert_eq!(zm.run().unwrap(), RunState::NeedLine(request));
}

#[test]
fn read_char_timeout_stores_zero() {
    let mut story = StoryBuilder::new(5);
    let routine = story.routine(0, &[0xB0]);
    let r = be(story.packed(routine) as u32);
    story.global(0x10, 77);
    // read_char 1 3 routine -> g00; quit
    story.main(&[0xF6, 0x53, 0x01, 0x03, r[0], r[1], 0x10, 0xBA]);
    let mut zm = load(&story);
    match zm.run().unwrap() {
        RunState::NeedChar(request) => {
            assert_eq!(request.timeout_tenths, 3);
            assert_ne!(request.routine, 0);
        }
        other => panic!("expected a key request, got {:?}", other),
    }
    assert_eq!(zm.input_timeout().unwrap(), RunState::Quit);
    assert_eq!(zm.vm.read_global(0x10).unwrap(), 0);
}

#[test]
fn char_input_maps_host_characters() {
    let mut story = StoryBuilder::new(4);
    story.main(&[0xF6, 0x7F, 0x01, 0x10, 0xBA]);
    let mut zm = load(&story);
    assert!(matches!(zm.run().unwrap(), RunState::NeedChar(_)));
    assert_eq!(zm.provide_char('ü').unwrap(), RunState::Quit);
    assert_eq!(zm.vm.read_global(0x10).unwrap(), 157);
}

#[test]
fn providing_the_wrong_kind_of_input_fails() {
    let mut story = StoryBuilder::new(4);
    story.main(&[0xF6, 0x7F, 0x01, 0x10, 0xBA]);
    let mut zm = load(&story);
    zm.run().unwrap();
    let err = zm.provide_line("look").unwrap_err();
    assert!(matches!(err.source, ZError::InvalidInput(_)));
    // The key request is still outstanding
    assert!(matches!(zm.run().unwrap(), RunState::NeedChar(_)));
}

//! Story loading, header validation and capability declarations

mod common;

use test_log::test;
use zwalker::header::{INTERPRETER_NUMBER, SCREEN_WIDTH_CHARS, STANDARD_REVISION};
use zwalker::test_utils::StoryBuilder;
use zwalker::{ErrorCategory, Interpreter, InterpreterConfig, ZError};

#[test]
fn short_image_is_malformed() {
    let err = Interpreter::new(vec![3; 20], InterpreterConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, ZError::MalformedImage(_)));
    assert_eq!(err.category(), ErrorCategory::MalformedImage);
}

#[test]
fn unsupported_version_is_malformed() {
    let mut image = StoryBuilder::new(5).build();
    image[0] = 9;
    let err = Interpreter::new(image, InterpreterConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, ZError::MalformedImage(_)));
}

#[test]
fn strict_checksum_rejects_corruption() {
    let mut image = StoryBuilder::new(3).build();
    let last = image.len() - 1;
    image[last] ^= 0xFF;

    let lenient = Interpreter::new(image.clone(), InterpreterConfig::default());
    assert!(lenient.is_ok());

    let strict = InterpreterConfig {
        strict_checksum: true,
        ..Default::default()
    };
    let err = Interpreter::new(image, strict).err().unwrap();
    assert!(matches!(err, ZError::ChecksumMismatch { .. }));
}

#[test]
fn capabilities_are_declared_for_later_versions() {
    let config = InterpreterConfig {
        screen_width: 100,
        ..Default::default()
    };
    let zm = Interpreter::new(StoryBuilder::new(5).build(), config).unwrap();
    let memory = &zm.vm.game.memory;
    assert_eq!(memory[INTERPRETER_NUMBER], 6);
    assert_eq!(memory[SCREEN_WIDTH_CHARS], 100);
    assert_eq!(&memory[STANDARD_REVISION..STANDARD_REVISION + 2], &[1, 1]);
    // The pristine copy is untouched
    assert_eq!(zm.vm.game.original_memory[SCREEN_WIDTH_CHARS], 0);
}

#[test]
fn config_loads_from_toml() {
    let config = InterpreterConfig::from_toml_str(
        "undo_slots = 2\nrandom_seed = 99\ninstruction_limit = 1000\n",
    )
    .unwrap();
    assert_eq!(config.undo_slots, 2);
    assert_eq!(config.random_seed, Some(99));
    assert_eq!(config.max_call_depth, InterpreterConfig::default().max_call_depth);

    let err = InterpreterConfig::from_toml_str("max_call_depth = 0").unwrap_err();
    assert!(matches!(err, ZError::Config(_)));
}

#[test]
fn every_version_loads_and_runs() {
    for version in [1u8, 2, 3, 4, 5, 6, 7, 8] {
        let mut story = StoryBuilder::new(version);
        let mut code = vec![0xB2];
        code.extend(story.encode("ok"));
        code.push(0xBA);
        story.main(&code);
        let mut zm = common::run_to_quit(&story);
        assert_eq!(zm.take_output(), "ok", "version {version}");
    }
}

//! Dictionary encoding laws and the tokeniser seen from bytecode

mod common;

use common::{be, expect_line, load, run_to_quit};
use proptest::prelude::*;
use zwalker::dictionary::Dictionary;
use zwalker::test_utils::StoryBuilder;

proptest! {
    #[test]
    fn entries_reencode_to_themselves(
        version in prop::sample::select(vec![1u8, 3, 4, 5, 8]),
        words in prop::collection::btree_set("[a-z]{1,12}", 1..25),
    ) {
        let mut story = StoryBuilder::new(version);
        for word in &words {
            story.word(word);
        }
        let zm = load(&story);
        let memory = &zm.vm.game.memory;
        let dictionary = Dictionary::load(&zm.vm, zm.vm.game.header.dictionary as u32).unwrap();
        let width = zm.vm.profile.dictionary_word_bytes;
        let zchars = zm.vm.profile.dictionary_zchars;

        for (i, text) in dictionary.words(memory, &zm.codec).unwrap().iter().enumerate() {
            let codes: Vec<u16> = text.bytes().map(u16::from).collect();
            let encoded = zm.codec.encode_word(&codes, zchars);
            prop_assert_eq!(encoded.len(), width);
            let entry = dictionary.entry_addr(i) as usize;
            prop_assert_eq!(&encoded[..], &memory[entry..entry + width]);
        }
        for word in &words {
            let codes: Vec<u16> = word.bytes().map(u16::from).collect();
            prop_assert!(dictionary.lookup_text(memory, &zm.codec, &codes).is_some());
        }
    }
}

#[test_log::test]
fn long_words_match_on_their_prefix() {
    let mut story = StoryBuilder::new(3);
    story.word("lantern");
    let zm = load(&story);
    let dictionary = Dictionary::load(&zm.vm, zm.vm.game.header.dictionary as u32).unwrap();
    let lookup = |w: &str| {
        let codes: Vec<u16> = w.bytes().map(u16::from).collect();
        dictionary.lookup_text(&zm.vm.game.memory, &zm.codec, &codes)
    };
    assert!(lookup("lanter").is_some());
    assert!(lookup("lanterns").is_some());
    assert!(lookup("lante").is_none());
    assert_eq!(dictionary.words(&zm.vm.game.memory, &zm.codec).unwrap(), vec!["lanter"]);
}

#[test_log::test]
fn tokenise_opcode_with_separators_and_skip_flag() {
    let mut story = StoryBuilder::new(5);
    story.word("take");
    story.word("lamp");
    story.word(",");
    // v5 text buffer: capacity, count, then characters
    let mut text = vec![30, 15];
    text.extend(b"take lamp,xyzzy");
    text.resize(32, 0);
    let text = story.table(&text);
    let mut parse = vec![8, 0];
    parse.resize(2 + 8 * 4, 0xEE);
    let parse = story.table(&parse);
    let (t, p) = (be(text), be(parse));
    story.main(&[
        0xFB, 0x0F, t[0], t[1], p[0], p[1], // tokenise text parse
        0xBA,
    ]);
    let zm = run_to_quit(&story);
    let vm = &zm.vm;
    assert_eq!(vm.read_byte(parse + 1).unwrap(), 4);
    // "lamp" starts at offset 5 of the typed text, so byte 7 of the buffer
    assert_eq!(vm.read_byte(parse + 2 + 4 + 2).unwrap(), 4);
    assert_eq!(vm.read_byte(parse + 2 + 4 + 3).unwrap(), 7);
    // The comma is a word of its own and is in the dictionary
    assert_ne!(vm.read_word(parse + 2 + 8).unwrap(), 0);
    // xyzzy is unknown
    assert_eq!(vm.read_word(parse + 2 + 12).unwrap(), 0);
    assert_eq!(vm.read_byte(parse + 2 + 12 + 2).unwrap(), 5);
}

#[test_log::test]
fn read_leaves_unknown_words_unmatched() {
    let mut story = StoryBuilder::new(5);
    story.word("open");
    let text = story.table(&[20; 24]);
    let parse = story.table(&[4; 20]);
    let (t, p) = (be(text), be(parse));
    story.main(&[
        0xE4, 0x0F, t[0], t[1], p[0], p[1], 0x10, // aread text parse -> g00
        0xBA,
    ]);
    let mut zm = load(&story);
    expect_line(zm.run().unwrap());
    assert!(zm.provide_line("open sesame").is_ok());
    assert_eq!(zm.vm.read_byte(parse + 1).unwrap(), 2);
    assert_ne!(zm.vm.read_word(parse + 2).unwrap(), 0);
    assert_eq!(zm.vm.read_word(parse + 6).unwrap(), 0);
}

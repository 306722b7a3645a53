//! Object forest invariants under arbitrary moves

mod common;

use proptest::prelude::*;
use zwalker::test_utils::StoryBuilder;
use zwalker::{Interpreter, ObjectTree};

const OBJECTS: u16 = 8;

fn forest(version: u8) -> Interpreter {
    let mut story = StoryBuilder::new(version);
    let room = story.object("room", 0);
    for i in 2..=OBJECTS {
        let parent = if i <= 4 { room } else { 0 };
        story.object(&format!("thing {i}"), parent);
    }
    common::load(&story)
}

/// True when `obj` is `dest` or one of its ancestors
fn encloses(zm: &Interpreter, obj: u16, dest: u16) -> bool {
    let mut cursor = dest;
    while cursor != 0 {
        if cursor == obj {
            return true;
        }
        cursor = zm.vm.get_parent(cursor).unwrap();
    }
    false
}

fn check_invariants(zm: &Interpreter) -> Result<(), TestCaseError> {
    let mut linked = 0;
    for obj in 1..=OBJECTS {
        let children = zm.vm.children_of(obj).unwrap();
        for &child in &children {
            prop_assert_eq!(zm.vm.get_parent(child).unwrap(), obj);
        }
        linked += children.len();

        let parent = zm.vm.get_parent(obj).unwrap();
        if parent != 0 {
            let siblings = zm.vm.children_of(parent).unwrap();
            prop_assert_eq!(siblings.iter().filter(|&&c| c == obj).count(), 1);
        }
    }
    let roots = (1..=OBJECTS)
        .filter(|&o| zm.vm.get_parent(o).unwrap() == 0)
        .count();
    prop_assert_eq!(linked + roots, OBJECTS as usize);
    Ok(())
}

proptest! {
    #[test]
    fn moves_preserve_forest(
        version in prop::sample::select(vec![3u8, 5]),
        moves in prop::collection::vec((1..=OBJECTS, 0..=OBJECTS), 1..40),
    ) {
        let mut zm = forest(version);
        for (obj, dest) in moves {
            if dest == 0 {
                zm.vm.remove_object(obj).unwrap();
            } else if encloses(&zm, obj, dest) {
                // Refused: the object stays where it was
                let parent = zm.vm.get_parent(obj).unwrap();
                zm.vm.insert_object(obj, dest).unwrap();
                prop_assert_eq!(zm.vm.get_parent(obj).unwrap(), parent);
            } else {
                zm.vm.insert_object(obj, dest).unwrap();
                prop_assert_eq!(zm.vm.get_child(dest).unwrap(), obj);
            }
            check_invariants(&zm)?;
        }
    }

    #[test]
    fn insert_then_remove_leaves_others_alone(obj in 5..=OBJECTS) {
        let mut zm = forest(3);
        let before = zm.vm.children_of(1).unwrap();
        zm.vm.insert_object(obj, 1).unwrap();
        zm.vm.remove_object(obj).unwrap();
        prop_assert_eq!(zm.vm.get_parent(obj).unwrap(), 0);
        prop_assert_eq!(zm.vm.get_sibling(obj).unwrap(), 0);
        prop_assert_eq!(zm.vm.children_of(1).unwrap(), before);
    }
}

#[test_log::test]
fn removing_middle_child_relinks_siblings() {
    let mut zm = forest(5);
    let children = zm.vm.children_of(1).unwrap();
    assert_eq!(children.len(), 3);
    zm.vm.remove_object(children[1]).unwrap();
    assert_eq!(zm.vm.children_of(1).unwrap(), vec![children[0], children[2]]);
    assert_eq!(zm.vm.get_sibling(children[0]).unwrap(), children[2]);
}

#[test_log::test]
fn object_zero_is_tolerated_for_tree_reads() {
    let mut zm = forest(3);
    assert_eq!(zm.vm.get_parent(0).unwrap(), 0);
    assert_eq!(zm.vm.get_child(0).unwrap(), 0);
    zm.vm.insert_object(0, 1).unwrap();
    zm.vm.remove_object(0).unwrap();
    check_invariants(&zm).unwrap();
}

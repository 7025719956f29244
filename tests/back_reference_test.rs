mod helpers;

use helpers::{apply, engine_with_traits, inputs, n, test_engine};
use keepsake::{ErrorKind, Resources, TraitDefinition, TraitKind};
use serde_json::json;

#[test]
fn back_reference_sees_the_same_note_reference() {
    let (_dir, mut engine) = test_engine(10);
    let (a, b) = (n(2), n(1));
    apply(&mut engine, b, &[("text", b, json!("target"))]);

    let updates = apply(&mut engine, a, &[("reference", a, json!("1"))]);

    assert_eq!(updates["referees"][&b].new, Some(json!(["2"])));
    assert_eq!(engine.item(b, None).unwrap()["referees"], json!(["2"]));
    assert_eq!(engine.item(a, None).unwrap()["reference"], json!("1"));
}

#[test]
fn moving_a_child_updates_both_parents() {
    let (_dir, mut engine) = test_engine(10);
    let (first, second, child) = (n(1), n(2), n(3));
    apply(&mut engine, n(3), &[("parent", child, json!("1"))]);
    assert_eq!(engine.item(first, None).unwrap()["children"], json!(["3"]));

    apply(&mut engine, n(4), &[("parent", child, json!("2"))]);
    assert!(!engine.item(first, None).unwrap().contains_key("children"));
    assert_eq!(engine.item(second, None).unwrap()["children"], json!(["3"]));

    // Time travel sees the old parent/child layout.
    assert_eq!(engine.item(first, Some(n(3))).unwrap()["children"], json!(["3"]));
    assert!(!engine.item(second, Some(n(3))).unwrap().contains_key("children"));
}

#[test]
fn several_children_in_one_note_accumulate() {
    let (_dir, mut engine) = test_engine(10);
    apply(
        &mut engine,
        n(10),
        &[
            ("parent", n(7), json!("1")),
            ("parent", n(8), json!("1")),
            ("parent", n(9), json!("1")),
        ],
    );
    assert_eq!(engine.item(n(1), None).unwrap()["children"], json!(["7", "8", "9"]));

    apply(&mut engine, n(11), &[("parent", n(8), json!(null))]);
    assert_eq!(engine.item(n(1), None).unwrap()["children"], json!(["7", "9"]));
}

#[test]
fn reference_pairs_are_independent() {
    let (_dir, mut engine) = test_engine(10);
    apply(&mut engine, n(5), &[("parent", n(5), json!("1")), ("reference", n(5), json!("2"))]);

    let first = engine.item(n(1), None).unwrap();
    let second = engine.item(n(2), None).unwrap();
    assert_eq!(first["children"], json!(["5"]));
    assert!(!first.contains_key("referees"));
    assert_eq!(second["referees"], json!(["5"]));
    assert!(!second.contains_key("children"));
}

#[test]
fn forward_references_are_validation_errors() {
    let (_dir, mut engine) = test_engine(10);
    let err = engine
        .update(n(5), inputs(&[("parent", n(5), json!("6"))]), Resources::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(engine.item(n(6), None).unwrap().is_empty());
}

#[test]
fn back_references_cannot_be_written_directly() {
    let (_dir, mut engine) = test_engine(10);
    let err = engine
        .update(n(5), inputs(&[("children", n(1), json!(["5"]))]), Resources::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn back_references_across_chunks_survive_eviction() {
    let (_dir, mut engine) = engine_with_traits(
        vec![
            TraitDefinition::new("link", TraitKind::Reference),
            TraitDefinition::new("linked_from", TraitKind::BackReference { reference: "link".into() }),
        ],
        1,
    );
    let day = 86_400;
    for step in 1..=4 {
        let item = n(step * day);
        apply(&mut engine, item, &[("link", item, json!("1"))]);
    }

    assert_eq!(
        engine.item(n(1), None).unwrap()["linked_from"],
        json!(["86400", "172800", "259200", "345600"])
    );
}

mod helpers;

use helpers::{apply, inputs, n, reopen, test_engine};
use keepsake::{Change, Chunk, Error, ErrorKind, Note, Resources};
use serde_json::json;
use std::collections::BTreeMap;

fn day_one() -> Chunk {
    "1970-01-01".parse().unwrap()
}

#[test]
fn text_edit_is_visible_now_and_time_travel_sees_the_original() {
    let (_dir, mut engine) = test_engine(10);
    let item = n(1);

    apply(&mut engine, n(1), &[("text", item, json!("hello"))]);
    let chunk = engine.context().chunk(item).unwrap();
    assert_eq!(chunk, day_one());
    assert_eq!(
        engine.query(chunk, None).unwrap(),
        BTreeMap::from([(item, BTreeMap::from([("text".to_string(), json!("hello"))]))])
    );

    apply(&mut engine, n(2), &[("text", item, json!("world"))]);
    assert_eq!(engine.query(chunk, Some(n(1))).unwrap()[&item]["text"], json!("hello"));
    assert_eq!(engine.query(chunk, None).unwrap()[&item]["text"], json!("world"));
}

#[test]
fn update_reports_old_and_new_values_per_trait() {
    let (_dir, mut engine) = test_engine(10);
    apply(&mut engine, n(5), &[("text", n(5), json!("a")), ("open", n(5), json!(true))]);

    let updates = apply(&mut engine, n(6), &[("text", n(5), json!("b"))]);
    assert_eq!(
        updates,
        BTreeMap::from([(
            "text".to_string(),
            BTreeMap::from([(n(5), Change { old: Some(json!("a")), new: Some(json!("b")) })])
        )])
    );
}

#[test]
fn writes_at_or_before_the_current_note_fail_without_side_effects() {
    let (_dir, mut engine) = test_engine(10);
    apply(&mut engine, n(10), &[("text", n(10), json!("kept"))]);
    engine.save().unwrap();

    for stale in [n(10), Note::new(9, 5), n(0)] {
        let err = engine
            .update(stale, inputs(&[("text", n(10), json!("lost"))]), Resources::new())
            .unwrap_err();
        assert!(matches!(err, Error::NoteNotAfterCurrent { .. }), "{stale}");
        assert_eq!(err.kind(), ErrorKind::Ordering);
    }

    assert_eq!(engine.note(), n(10));
    assert!(!engine.has_unsaved_changes());
    assert_eq!(engine.item(n(10), None).unwrap()["text"], json!("kept"));
    assert_eq!(engine.history(n(10)).unwrap()["text"].len(), 1);
}

#[test]
fn same_second_notes_use_the_increment() {
    let (_dir, mut engine) = test_engine(10);
    apply(&mut engine, n(7), &[("text", n(7), json!("first"))]);
    apply(&mut engine, Note::new(7, 1), &[("text", n(7), json!("second"))]);

    assert_eq!(engine.item(n(7), Some(n(7))).unwrap()["text"], json!("first"));
    assert_eq!(engine.item(n(7), None).unwrap()["text"], json!("second"));
    assert_eq!(engine.note_at(7).unwrap(), Note::new(7, 2));
}

#[test]
fn queries_of_the_future_are_rejected() {
    let (_dir, mut engine) = test_engine(10);
    apply(&mut engine, n(3), &[("text", n(3), json!("x"))]);

    let err = engine.query(day_one(), Some(n(4))).unwrap_err();
    assert!(matches!(err, Error::NoteInFuture { .. }));
    let err = engine.item(n(3), Some(Note::new(3, 1))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ordering);

    assert!(engine.query(day_one(), Some(n(3))).is_ok());
}

#[test]
fn removing_a_value_hides_the_item_but_keeps_its_history() {
    let (_dir, mut engine) = test_engine(10);
    apply(&mut engine, n(1), &[("text", n(1), json!("draft"))]);
    apply(&mut engine, n(2), &[("text", n(1), json!(null))]);

    assert!(engine.query(day_one(), None).unwrap().is_empty());
    assert_eq!(engine.query(day_one(), Some(n(1))).unwrap()[&n(1)]["text"], json!("draft"));
    assert_eq!(
        engine.history(n(1)).unwrap()["text"],
        vec![(n(1), Some(json!("draft"))), (n(2), None)]
    );
}

#[test]
fn invalid_value_rejects_the_whole_note() {
    let (_dir, mut engine) = test_engine(10);
    let err = engine
        .update(
            n(4),
            inputs(&[("text", n(4), json!("fine")), ("open", n(4), json!("not a bool"))]),
            Resources::new(),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(engine.note(), Note::default());
    assert!(engine.history(n(4)).unwrap().is_empty());

    // The same note can be resubmitted once corrected.
    apply(&mut engine, n(4), &[("text", n(4), json!("fine")), ("open", n(4), json!(false))]);
    assert_eq!(engine.item(n(4), None).unwrap()["open"], json!(false));
}

#[test]
fn save_is_idempotent_and_survives_reload() {
    let (dir, mut engine) = test_engine(10);
    apply(&mut engine, n(100), &[("text", n(100), json!("persisted")), ("section", n(100), json!(true))]);

    assert!(engine.save().unwrap());
    let files = [
        dir.path().join("metadata.json"),
        dir.path().join("chunks/1970/01/01/text.json"),
        dir.path().join("chunks/1970/01/01/section.json"),
    ];
    let modified = |path: &std::path::Path| std::fs::metadata(path).unwrap().modified().unwrap();
    let before: Vec<_> = files.iter().map(|path| modified(path)).collect();

    std::thread::sleep(std::time::Duration::from_millis(20));
    assert!(!engine.save().unwrap());
    let after: Vec<_> = files.iter().map(|path| modified(path)).collect();
    assert_eq!(before, after, "a save with nothing to flush must not touch disk");
    drop(engine);

    let mut reloaded = reopen(&dir, 10);
    assert_eq!(reloaded.note(), n(100));
    assert_eq!(reloaded.context().epoch_offset(), 0);
    assert_eq!(
        reloaded.item(n(100), None).unwrap(),
        BTreeMap::from([
            ("section".to_string(), json!(true)),
            ("text".to_string(), json!("persisted")),
        ])
    );

    // The restored note still guards against stale writes.
    assert!(reloaded
        .update(n(100), inputs(&[]), Resources::new())
        .is_err());
}

#[test]
fn unsaved_notes_are_not_persisted() {
    let (dir, mut engine) = test_engine(10);
    apply(&mut engine, n(1), &[("text", n(1), json!("saved"))]);
    engine.save().unwrap();
    apply(&mut engine, n(2), &[("text", n(1), json!("unsaved"))]);
    drop(engine);

    let mut reloaded = reopen(&dir, 10);
    assert_eq!(reloaded.note(), n(1));
    assert_eq!(reloaded.item(n(1), None).unwrap()["text"], json!("saved"));
}

#[test]
fn items_live_in_their_creation_chunk() {
    let (_dir, mut engine) = test_engine(10);
    let item = n(86_399);
    let next_day = n(86_400 * 3);
    apply(&mut engine, item, &[("text", item, json!("late on day one"))]);
    apply(&mut engine, next_day, &[("text", item, json!("edited days later"))]);

    assert_eq!(engine.query(day_one(), None).unwrap()[&item]["text"], json!("edited days later"));
    let later: Chunk = "1970-01-04".parse().unwrap();
    assert!(engine.query(later, None).unwrap().is_empty());
}

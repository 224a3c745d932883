use ely::mapper::mapped_fields;
use ely::{default_selection, instrument, instrument_detached, Error, Mode, Pattern, Record, Selection};
use serde_json::json;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

fn sample() -> Record {
    Record::from_json(json!({
        "a": "value of a",
        "b": "value of b",
    }))
    .unwrap()
}

/// Writes `b` then `a` and returns the fields the wildcard reported.
fn wildcard_hits(selection: &Selection) -> Vec<String> {
    let mut record = sample();
    let source = instrument(&mut record, Mode::Detached, Some(selection)).unwrap();

    let hits = Rc::new(RefCell::new(Vec::new()));
    let sink = hits.clone();
    source.on_any(move |_, _, field| {
        sink.borrow_mut().push(field.to_string());
        Ok(())
    });

    record.set("b", json!("new value of b")).unwrap();
    record.set("a", json!("new value of a")).unwrap();
    let seen = hits.borrow().clone();
    seen
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_single_accept_pattern() {
    let selection = Selection::new(Pattern::one("^[a]+$").unwrap(), Pattern::Any, true);
    assert_eq!(wildcard_hits(&selection), vec!["a"]);
}

#[test]
fn test_accept_with_single_skip() {
    let selection = Selection::new(
        Pattern::one("^[a-z]+$").unwrap(),
        Pattern::one("^[b]+$").unwrap(),
        true,
    );
    assert_eq!(wildcard_hits(&selection), vec!["a"]);
}

#[test]
fn test_accept_set_is_or() {
    let selection = Selection::new(Pattern::set(["^[a]+$", "^[b]+$"]).unwrap(), Pattern::Any, true);
    assert_eq!(wildcard_hits(&selection), vec!["b", "a"]);
}

#[test]
fn test_skip_wins_over_accept_set() {
    let selection = Selection::new(
        Pattern::set(["^[a]+$", "^[b]+$"]).unwrap(),
        Pattern::one("^[b]+$").unwrap(),
        true,
    );
    assert_eq!(wildcard_hits(&selection), vec!["a"]);
}

#[test]
fn test_pattern_precedence() {
    // 1. Accept and skip target different prefixes: both "a" names pass
    let mut record = Record::from_json(json!({ "aa": 1, "ab": 2, "ba": 3 })).unwrap();
    let selection = Selection::new(
        Pattern::set(["^a.*"]).unwrap(),
        Pattern::set(["^b.*"]).unwrap(),
        true,
    );
    instrument_detached(&mut record, Some(&selection)).unwrap();
    assert_eq!(mapped_fields(&record), names(&["aa", "ab"]));

    // 2. A name matching both is excluded
    let mut record = Record::from_json(json!({ "aa": 1, "ab": 2, "ba": 3 })).unwrap();
    let selection = Selection::new(
        Pattern::set(["^a.*"]).unwrap(),
        Pattern::set(["^a.*"]).unwrap(),
        true,
    );
    instrument_detached(&mut record, Some(&selection)).unwrap();
    assert!(mapped_fields(&record).is_empty());
}

#[test]
fn test_default_skips_private_prefix() {
    let mut record = Record::from_json(json!({ "a": 1, "_hidden": 2, "__more": 3 })).unwrap();

    instrument_detached(&mut record, None).unwrap();

    assert_eq!(mapped_fields(&record), names(&["a"]));
}

#[test]
fn test_default_selection_shape() {
    let selection = default_selection();
    assert!(selection.accept().is_any());
    assert!(selection.emit_all());
    assert!(selection.admits("name"));
    assert!(!selection.admits("_name"));
}

#[test]
fn test_empty_sets() {
    let accept_nothing = Selection::new(Pattern::Set(vec![]), Pattern::Any, true);
    assert!(!accept_nothing.admits("a"));

    let skip_nothing = Selection::new(Pattern::Any, Pattern::Set(vec![]), true);
    assert!(skip_nothing.admits("_a"));
}

#[test]
fn test_builder_style_setters() {
    let selection = Selection::all()
        .with_accept(Pattern::one("^x").unwrap())
        .with_emit_all(false);

    assert!(selection.admits("x1"));
    assert!(!selection.admits("y1"));
    assert!(!selection.emit_all());
    assert!(selection.skip().is_any());
}

#[test]
fn test_invalid_pattern() {
    let err = Pattern::one("(").unwrap_err();
    assert!(matches!(err, Error::Pattern(_)));
    assert!(Pattern::set(["^ok$", "["]).is_err());
}

#[test]
fn test_selection_from_config_value() {
    let selection: Selection = serde_json::from_value(json!({
        "accept": ["^a", "^b"],
        "skip": null,
        "emit_all": false,
    }))
    .unwrap();
    assert!(selection.admits("a1"));
    assert!(!selection.admits("_b"));
    assert!(selection.admits("b_"));
    assert!(!selection.admits("c"));
    assert!(!selection.emit_all());

    // Missing keys fall back to the defaults.
    let defaulted: Selection = serde_json::from_value(json!({})).unwrap();
    assert!(!defaulted.admits("_private"));
    assert!(defaulted.emit_all());

    let bad = serde_json::from_value::<Selection>(json!({ "accept": "(" }));
    assert!(bad.is_err());
}

#[test]
fn test_selection_serializes_sources() {
    let selection = Selection::new(Pattern::one("^a$").unwrap(), Pattern::Any, true);
    let value = serde_json::to_value(&selection).unwrap();
    assert_eq!(value, json!({ "accept": "^a$", "skip": null, "emit_all": true }));
}

//! Testable property 3: for a valid document split `E = E1 . E2`, firing the
//! whole stream gives the same result as firing `E1`, cloning, then firing
//! `E2` on the clone. Exercises the O(depth) `GrammarWalker::clone` that
//! makes incremental re-validation after an edit cheap.

use relaxng_model::name_class::NameClass;
use relaxng_model::pattern::{Grammar, PatternNode as PN};
use relaxng_validator::{Event, FireResult, GrammarWalker};
use std::collections::HashMap;
use std::rc::Rc;

fn empty_element(name: &str) -> Rc<relaxng_model::pattern::PatternNode> {
    PN::element(NameClass::name("", name), PN::empty("empty"), "el")
}

fn interleave_abc() -> Rc<relaxng_model::pattern::PatternNode> {
    // interleave { a, b, c }
    let ab = PN::interleave(empty_element("a"), empty_element("b"), "ab");
    let abc = PN::interleave(ab, empty_element("c"), "abc");
    PN::element(NameClass::name("", "root"), abc, "root")
}

fn single_grammar(start: Rc<relaxng_model::pattern::PatternNode>) -> Rc<Grammar> {
    Rc::new(Grammar::new(start, HashMap::new()))
}

fn events() -> Vec<Event> {
    vec![
        Event::enter_start_tag("", "root"),
        Event::LeaveStartTag,
        Event::enter_start_tag("", "b"),
        Event::LeaveStartTag,
        Event::end_tag("", "b"),
        Event::enter_start_tag("", "a"),
        Event::LeaveStartTag,
        Event::end_tag("", "a"),
        Event::enter_start_tag("", "c"),
        Event::LeaveStartTag,
        Event::end_tag("", "c"),
        Event::end_tag("", "root"),
    ]
}

fn fire_all(gw: &mut GrammarWalker, evs: &[Event]) -> Vec<relaxng_validator::ValidationError> {
    let mut out = Vec::new();
    for ev in evs {
        match gw.fire_event(ev.clone()) {
            FireResult::Matched(e) => out.extend(e),
            FireResult::NoMatch => panic!("{ev:?} unexpectedly rejected"),
        }
    }
    out
}

#[test]
fn clone_then_resume_matches_firing_straight_through() {
    let evs = events();

    let mut straight = GrammarWalker::new(single_grammar(interleave_abc()));
    let straight_errs = fire_all(&mut straight, &evs);
    assert!(straight.end().is_empty());

    let split = evs.len() / 2;
    let mut head = GrammarWalker::new(single_grammar(interleave_abc()));
    let mut errs = fire_all(&mut head, &evs[..split]);
    let mut tail = head.clone();
    errs.extend(fire_all(&mut tail, &evs[split..]));

    assert_eq!(straight_errs, errs);
    assert!(tail.end().is_empty());
    // The original clone source is untouched by firing events on the clone.
    assert!(!head.possible().is_empty());
}

#[test]
fn clone_is_independent_after_divergent_events() {
    // element root { element a {} | element b {} }
    let choice = PN::choice(empty_element("a"), empty_element("b"), "choice");
    let root = PN::element(NameClass::name("", "root"), choice, "root");
    let mut gw = GrammarWalker::new(single_grammar(root));
    gw.fire_event(Event::enter_start_tag("", "root"));
    gw.fire_event(Event::LeaveStartTag);

    let mut branch_a = gw.clone();
    let mut branch_b = gw.clone();

    assert!(matches!(branch_a.fire_event(Event::enter_start_tag("", "a")), FireResult::Matched(_)));
    assert!(matches!(branch_b.fire_event(Event::enter_start_tag("", "b")), FireResult::Matched(_)));

    // The un-advanced original still offers both names.
    let offered: Vec<_> = gw
        .possible()
        .into_iter()
        .filter_map(|ev| match ev {
            Event::EnterStartTag { local, .. } => Some(local),
            _ => None,
        })
        .collect();
    assert_eq!(offered.len(), 2);
}

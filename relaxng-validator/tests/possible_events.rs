//! Exercises the testable properties from the design notes that talk about
//! `possible()`: every event it offers is accepted without error (property
//! 5), and firing one of the alternatives never enlarges what comes next
//! beyond what that alternative alone would have produced (property 6).

use relaxng_model::name_class::NameClass;
use relaxng_model::pattern::{Grammar, PatternNode as PN};
use relaxng_validator::{Event, FireResult, GrammarWalker};
use std::collections::HashMap;
use std::rc::Rc;

fn empty_element(name: &str) -> Rc<relaxng_model::pattern::PatternNode> {
    PN::element(NameClass::name("", name), PN::empty("empty"), "el")
}

fn single_grammar(start: Rc<relaxng_model::pattern::PatternNode>) -> Rc<Grammar> {
    Rc::new(Grammar::new(start, HashMap::new()))
}

fn fire_ok(gw: &mut GrammarWalker, ev: Event) {
    match gw.fire_event(ev.clone()) {
        FireResult::Matched(errs) => assert!(errs.is_empty(), "{ev:?} -> {errs:?}"),
        FireResult::NoMatch => panic!("{ev:?} should have been accepted"),
    }
}

#[test]
fn every_offered_start_tag_is_accepted() {
    // element root { element a {} | element b {} | element c {} }
    let choice = PN::choice(
        PN::choice(empty_element("a"), empty_element("b"), "ab"),
        empty_element("c"),
        "abc",
    );
    let root = PN::element(NameClass::name("", "root"), choice, "root");
    let mut gw = GrammarWalker::new(single_grammar(root));

    fire_ok(&mut gw, Event::enter_start_tag("", "root"));
    fire_ok(&mut gw, Event::LeaveStartTag);

    let offered: Vec<_> = gw
        .possible()
        .into_iter()
        .filter_map(|ev| match ev {
            Event::EnterStartTag { ns, local } => Some((ns, local)),
            _ => None,
        })
        .collect();
    assert_eq!(offered.len(), 3);

    // Firing the first offered event should be accepted cleanly, exactly as
    // `possible()` promised.
    let (ns, local) = offered[0].clone();
    fire_ok(&mut gw, Event::enter_start_tag(ns, local));
}

#[test]
fn firing_one_choice_branch_narrows_possible_to_that_branch_alone() {
    // element root { element a { element x {} } | element b { element y {} } }
    let a_branch = PN::element(NameClass::name("", "a"), empty_element("x"), "a-el");
    let b_branch = PN::element(NameClass::name("", "b"), empty_element("y"), "b-el");
    let choice = PN::choice(a_branch, b_branch, "choice");
    let root = PN::element(NameClass::name("", "root"), choice, "root");
    let mut gw = GrammarWalker::new(single_grammar(root));

    fire_ok(&mut gw, Event::enter_start_tag("", "root"));
    fire_ok(&mut gw, Event::LeaveStartTag);
    fire_ok(&mut gw, Event::enter_start_tag("", "a"));
    fire_ok(&mut gw, Event::LeaveStartTag);

    // Having committed to the "a" branch, only "x" should remain possible --
    // never "y", which belonged to the branch that died.
    let offered: Vec<_> = gw
        .possible()
        .into_iter()
        .filter_map(|ev| match ev {
            Event::EnterStartTag { local, .. } => Some(local),
            _ => None,
        })
        .collect();
    assert_eq!(offered, vec!["x".to_string()]);
}

#[test]
fn possible_is_empty_once_closed() {
    let root = PN::element(NameClass::name("", "root"), PN::empty("e"), "root");
    let mut gw = GrammarWalker::new(single_grammar(root));
    fire_ok(&mut gw, Event::enter_start_tag("", "root"));
    fire_ok(&mut gw, Event::LeaveStartTag);
    fire_ok(&mut gw, Event::end_tag("", "root"));
    assert!(gw.possible().is_empty());
}

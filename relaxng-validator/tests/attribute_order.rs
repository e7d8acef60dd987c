//! S6 from the design notes: a `group` of three attributes validates no
//! matter which order the producer fires them in, and `possible_attributes`
//! at each step names exactly the remaining ones.

use relaxng_model::name_class::NameClass;
use relaxng_model::pattern::{Grammar, PatternNode as PN};
use relaxng_validator::{Event, FireResult, GrammarWalker};
use std::collections::HashMap;
use std::rc::Rc;

fn schema() -> Rc<Grammar> {
    let a = PN::attribute(NameClass::name("", "a"), PN::text("t"), "attr-a");
    let b = PN::attribute(NameClass::name("", "b"), PN::text("t"), "attr-b");
    let c = PN::attribute(NameClass::name("", "c"), PN::text("t"), "attr-c");
    let ab = PN::group(a, b, "ab");
    let abc = PN::group(ab, c, "abc");
    let root = PN::element(NameClass::name("", "root"), abc, "root");
    Rc::new(Grammar::new(root, HashMap::new()))
}

fn permutations() -> Vec<[&'static str; 3]> {
    vec![
        ["a", "b", "c"],
        ["a", "c", "b"],
        ["b", "a", "c"],
        ["b", "c", "a"],
        ["c", "a", "b"],
        ["c", "b", "a"],
    ]
}

#[test]
fn every_attribute_order_validates_cleanly() {
    for perm in permutations() {
        let mut gw = GrammarWalker::new(schema());
        gw.fire_event(Event::enter_start_tag("", "root"));
        for name in perm {
            let r = gw.fire_event(Event::AttributeNameAndValue {
                ns: String::new(),
                local: name.to_string(),
                value: "v".to_string(),
            });
            assert!(matches!(r, FireResult::Matched(e) if e.is_empty()), "{perm:?}: {name} should be accepted");
        }
        let r = gw.fire_event(Event::LeaveStartTag);
        assert!(matches!(r, FireResult::Matched(e) if e.is_empty()), "{perm:?}: leaveStartTag should be clean");
        gw.fire_event(Event::end_tag("", "root"));
        assert!(gw.end().is_empty(), "{perm:?}: document should end cleanly");
    }
}

#[test]
fn possible_attributes_narrows_as_names_are_consumed() {
    let mut gw = GrammarWalker::new(schema());
    gw.fire_event(Event::enter_start_tag("", "root"));

    let remaining = |gw: &GrammarWalker| -> Vec<String> {
        let mut names: Vec<String> = gw
            .possible()
            .into_iter()
            .filter_map(|ev| match ev {
                Event::AttributeName { local, .. } => Some(local),
                _ => None,
            })
            .collect();
        names.sort();
        names
    };

    assert_eq!(remaining(&gw), vec!["a", "b", "c"]);
    gw.fire_event(Event::AttributeNameAndValue {
        ns: String::new(),
        local: "b".to_string(),
        value: "v".to_string(),
    });
    assert_eq!(remaining(&gw), vec!["a", "c"]);
}

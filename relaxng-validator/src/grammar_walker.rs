//! The top-level driver: dispatches a document's event stream against a
//! `Grammar`, owning the name resolver, misplaced-element recovery, the
//! attribute-value swallow flag, and the suspended-whitespace slot.
//!
//! The content model itself is already fully recursive inside `Walker` --
//! an `Element`'s own child walker nests arbitrarily deep, so this driver
//! only ever holds *one* live walker for the document (`top`) plus however
//! many recovery walkers are validating misplaced subtrees on the side.
//! `Grammar::new_walker()` from the design notes becomes `GrammarWalker::new`
//! here, since the grammar type lives in a crate that can't know about this
//! one's walker types.

use crate::error::{Name, ValidationError};
use crate::event::Event;
use crate::walker::{FireResult, Walker};
use relaxng_model::Grammar;
use std::rc::Rc;

pub type EndResult = Vec<ValidationError>;

#[derive(Debug, Clone)]
enum RecoveryFrame {
    /// An unexpected element for which exactly one production exists
    /// elsewhere in the grammar -- validated normally against that
    /// production's own content model. `depth` counts re-entrant
    /// occurrences of the same name inside the recovered subtree, so a
    /// recursive element doesn't pop this frame on its own nested closing
    /// tag.
    Define {
        walker: Walker,
        name: (String, String),
        depth: i32,
    },
    /// No production exists, or more than one does and there's no way to
    /// disambiguate -- every event until the matching end tag is swallowed
    /// unvalidated.
    Dumb { depth: i32 },
}

#[derive(Debug, Clone)]
pub struct GrammarWalker {
    grammar: Rc<Grammar>,
    resolver: crate::name_resolver::NameResolver,
    top: Walker,
    recovery: Vec<RecoveryFrame>,
    swallow_attribute_value: bool,
    suspended_whitespace: Option<String>,
}

fn start_tag_name(event: &Event) -> Option<(&str, &str)> {
    match event {
        Event::EnterStartTag { ns, local } | Event::StartTagAndAttributes { ns, local, .. } => {
            Some((ns, local))
        }
        _ => None,
    }
}

/// True iff `walker`'s own `possible()` set includes entering an element
/// named `(ns, local)` -- either directly or via a wildcard name class
/// (surfaced as the `"*"` sentinel namespace by `walker::name_class_to_event`).
fn walker_accepts_start(walker: &Walker, ns: &str, local: &str) -> bool {
    walker.possible().iter().any(|ev| match ev {
        Event::EnterStartTag { ns: ens, local: elocal } => ens == "*" || (ens == ns && elocal == local),
        _ => false,
    })
}

impl GrammarWalker {
    pub fn new(grammar: Rc<Grammar>) -> GrammarWalker {
        let top = Walker::new(grammar.start.clone());
        GrammarWalker {
            grammar,
            resolver: crate::name_resolver::NameResolver::new(),
            top,
            recovery: Vec::new(),
            swallow_attribute_value: false,
            suspended_whitespace: None,
        }
    }

    pub fn fire_event(&mut self, event: Event) -> FireResult {
        if matches!(&event, Event::Text { value } if value.is_empty()) {
            debug_assert!(
                false,
                "producer fired an empty text event; treating it as a zero-length buffer"
            );
        }
        if event.is_whitespace_text() {
            let mut errs = Vec::new();
            if let Some(pending) = self.suspended_whitespace.take() {
                errs.extend(self.dispatch(Event::text(pending)));
            }
            let value = match &event {
                Event::Text { value } => value.clone(),
                _ => unreachable!(),
            };
            self.suspended_whitespace = Some(value);
            return FireResult::Matched(errs);
        }

        let mut errs = Vec::new();
        if let Some(pending) = self.suspended_whitespace.take() {
            if matches!(event, Event::EndTag { .. }) {
                // Fire it on a clone first to see whether it's accepted;
                // an element-only content model rejects it, and a rejected
                // whitespace-only text is ignorable, not an error.
                let mut probe = self.clone();
                match probe.dispatch_raw(Event::text(pending.clone())) {
                    FireResult::Matched(e) => {
                        *self = probe;
                        errs.extend(e);
                    }
                    FireResult::NoMatch => {}
                }
            } else {
                errs.extend(self.dispatch(Event::text(pending)));
            }
        }

        errs.extend(self.dispatch(event));
        FireResult::Matched(errs)
    }

    fn dispatch(&mut self, event: Event) -> EndResult {
        match self.dispatch_raw(event) {
            FireResult::Matched(e) => e,
            FireResult::NoMatch => vec![],
        }
    }

    fn dispatch_raw(&mut self, event: Event) -> FireResult {
        match &event {
            Event::EnterContext => {
                self.resolver.enter_context();
                return FireResult::Matched(vec![]);
            }
            Event::LeaveContext => {
                self.resolver.leave_context();
                return FireResult::Matched(vec![]);
            }
            Event::DefinePrefix { prefix, uri } => {
                self.resolver.define_prefix(prefix.clone(), uri.clone());
                return FireResult::Matched(vec![]);
            }
            Event::AttributeValue { .. } if self.swallow_attribute_value => {
                self.swallow_attribute_value = false;
                return FireResult::Matched(vec![]);
            }
            _ => {}
        }

        if self.recovery.is_empty() {
            self.dispatch_main(event)
        } else {
            self.dispatch_recovery(event)
        }
    }

    fn dispatch_main(&mut self, event: Event) -> FireResult {
        if let Some((ns, local)) = start_tag_name(&event) {
            if walker_accepts_start(&self.top, ns, local) {
                return self.top.fire_event(&event);
            }
            let (ns, local) = (ns.to_string(), local.to_string());
            return self.begin_recovery(ns, local, &event);
        }
        if let Event::AttributeName { ns, local } = &event {
            return match self.top.fire_event(&event) {
                FireResult::NoMatch => {
                    self.swallow_attribute_value = true;
                    FireResult::Matched(vec![ValidationError::attribute_name(
                        "attribute not allowed here",
                        vec![Name::new(ns.clone(), local.clone())],
                    )])
                }
                matched => matched,
            };
        }
        self.top.fire_event(&event)
    }

    fn begin_recovery(&mut self, ns: String, local: String, event: &Event) -> FireResult {
        match self.grammar.element_definitions.get(&(ns.clone(), local.clone())) {
            Some(defs) if defs.len() == 1 => {
                log::debug!("misplaced element {{{ns}}}{local}: recovering via its single definition");
                let define = defs[0].clone();
                let mut walker = Walker::new(define.content());
                let errs = match walker.fire_event(event) {
                    FireResult::Matched(e) => e,
                    FireResult::NoMatch => Vec::new(),
                };
                self.recovery.push(RecoveryFrame::Define {
                    walker,
                    name: (ns, local),
                    depth: 1,
                });
                FireResult::Matched(errs)
            }
            _ => {
                log::debug!("misplaced element {{{ns}}}{local}: no unambiguous definition, entering dumb recovery");
                self.recovery.push(RecoveryFrame::Dumb { depth: 1 });
                FireResult::Matched(vec![ValidationError::element_name(
                    "tag not allowed here",
                    vec![Name::new(ns, local)],
                )])
            }
        }
    }

    fn dispatch_recovery(&mut self, event: Event) -> FireResult {
        if matches!(self.recovery.last(), Some(RecoveryFrame::Dumb { .. })) {
            if let Some(RecoveryFrame::Dumb { depth }) = self.recovery.last_mut() {
                match &event {
                    Event::EnterStartTag { .. } | Event::StartTagAndAttributes { .. } => *depth += 1,
                    Event::EndTag { .. } => {
                        *depth -= 1;
                        if *depth == 0 {
                            log::trace!("dumb recovery frame balanced, resuming structural validation");
                            self.recovery.pop();
                        }
                    }
                    _ => {}
                }
            }
            return FireResult::Matched(vec![]);
        }

        if let Some((ns, local)) = start_tag_name(&event) {
            let (ns, local) = (ns.to_string(), local.to_string());
            let accepts = match self.recovery.last() {
                Some(RecoveryFrame::Define { walker, .. }) => walker_accepts_start(walker, &ns, &local),
                _ => false,
            };
            if accepts {
                let mut errs = Vec::new();
                if let Some(RecoveryFrame::Define { walker, name, depth }) = self.recovery.last_mut() {
                    if let FireResult::Matched(e) = walker.fire_event(&event) {
                        errs.extend(e);
                    }
                    if *name == (ns, local) {
                        *depth += 1;
                    }
                }
                return FireResult::Matched(errs);
            }
            return self.begin_recovery(ns, local, &event);
        }

        if let Event::EndTag { ns, local } = &event {
            let (ns, local) = (ns.clone(), local.clone());
            let mut errs = Vec::new();
            let mut should_pop = false;
            if let Some(RecoveryFrame::Define { walker, name, depth }) = self.recovery.last_mut() {
                if let FireResult::Matched(e) = walker.fire_event(&event) {
                    errs.extend(e);
                }
                if *name == (ns, local) {
                    *depth -= 1;
                    if *depth == 0 {
                        should_pop = true;
                    }
                }
            }
            if should_pop {
                log::trace!("recovery frame for {{{ns}}}{local} closed, resuming structural validation");
                self.recovery.pop();
            }
            return FireResult::Matched(errs);
        }

        let mut errs = Vec::new();
        if let Some(RecoveryFrame::Define { walker, .. }) = self.recovery.last_mut() {
            if let FireResult::Matched(e) = walker.fire_event(&event) {
                errs.extend(e);
            }
        }
        FireResult::Matched(errs)
    }

    /// Union of `possible()` of the currently active walker -- the
    /// document's top-level walker, or the innermost recovery walker when
    /// recovery is active. A dumb recovery frame offers nothing, since
    /// it has abandoned structural validation of its subtree entirely.
    pub fn possible(&self) -> Vec<Event> {
        match self.recovery.last() {
            Some(RecoveryFrame::Define { walker, .. }) => walker.possible(),
            Some(RecoveryFrame::Dumb { .. }) => vec![],
            None => self.top.possible(),
        }
    }

    pub fn end(&self) -> EndResult {
        let mut errs = self.top.end();
        for frame in &self.recovery {
            match frame {
                RecoveryFrame::Define { walker, name, .. } => {
                    errs.extend(walker.end());
                    errs.push(ValidationError::element_name(
                        "tag not closed",
                        vec![Name::new(name.0.clone(), name.1.clone())],
                    ));
                }
                RecoveryFrame::Dumb { .. } => {
                    errs.push(ValidationError::element_name("tag not closed", vec![]));
                }
            }
        }
        errs
    }

    pub fn resolve_name(&self, qname: &str, is_attribute: bool) -> Option<(String, String)> {
        self.resolver.resolve_name(qname, is_attribute)
    }

    pub fn unresolve_name(&self, namespace_uri: &str, local_name: &str) -> String {
        self.resolver.unresolve_name(namespace_uri, local_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaxng_model::name_class::NameClass;
    use relaxng_model::pattern::{Define, PatternNode as PN};
    use std::collections::HashMap;

    fn empty_element(name: &str) -> Rc<relaxng_model::pattern::PatternNode> {
        PN::element(NameClass::name("", name), PN::empty("empty"), "el")
    }

    fn single_grammar(start: Rc<relaxng_model::pattern::PatternNode>) -> Rc<Grammar> {
        Rc::new(Grammar::new(start, HashMap::new()))
    }

    #[test]
    fn s1_minimal_document_validates_clean() {
        let head = empty_element("head");
        let html = PN::element(NameClass::name("", "html"), head, "html");
        let mut gw = GrammarWalker::new(single_grammar(html));

        let events = [
            Event::EnterContext,
            Event::enter_start_tag("", "html"),
            Event::LeaveStartTag,
            Event::enter_start_tag("", "head"),
            Event::LeaveStartTag,
            Event::end_tag("", "head"),
            Event::end_tag("", "html"),
            Event::LeaveContext,
        ];
        for ev in events {
            match gw.fire_event(ev.clone()) {
                FireResult::Matched(errs) => assert!(errs.is_empty(), "{ev:?} -> {errs:?}"),
                FireResult::NoMatch => panic!("{ev:?} should be accepted"),
            }
        }
        assert!(gw.end().is_empty());
    }

    #[test]
    fn whitespace_between_siblings_is_dropped() {
        let a = empty_element("a");
        let b = empty_element("b");
        let pattern = PN::group(a, b, "ab");
        let root = PN::element(NameClass::name("", "root"), pattern, "root");
        let mut gw = GrammarWalker::new(single_grammar(root));

        gw.fire_event(Event::enter_start_tag("", "root"));
        gw.fire_event(Event::LeaveStartTag);
        gw.fire_event(Event::enter_start_tag("", "a"));
        gw.fire_event(Event::LeaveStartTag);
        gw.fire_event(Event::end_tag("", "a"));
        // whitespace between <a/> and <b/>, element-only content, should vanish
        let r = gw.fire_event(Event::text("   \n  "));
        assert!(matches!(r, FireResult::Matched(e) if e.is_empty()));
        gw.fire_event(Event::enter_start_tag("", "b"));
        gw.fire_event(Event::LeaveStartTag);
        gw.fire_event(Event::end_tag("", "b"));
        let r = gw.fire_event(Event::end_tag("", "root"));
        assert!(matches!(r, FireResult::Matched(e) if e.is_empty()));
        assert!(gw.end().is_empty());
    }

    #[test]
    fn unknown_element_with_no_definition_triggers_dumb_recovery() {
        // element em { element bar {} | element baz {} }
        let choice = PN::choice(empty_element("bar"), empty_element("baz"), "choice");
        let em = PN::element(NameClass::name("", "em"), choice, "em");
        let mut gw = GrammarWalker::new(single_grammar(em));

        gw.fire_event(Event::enter_start_tag("", "em"));
        gw.fire_event(Event::LeaveStartTag);
        match gw.fire_event(Event::enter_start_tag("", "foo")) {
            FireResult::Matched(errs) => {
                assert_eq!(errs.len(), 1);
                assert!(matches!(&errs[0], ValidationError::ElementName { message, .. } if message == "tag not allowed here"));
            }
            FireResult::NoMatch => panic!("misplaced element should be reported, not rejected outright"),
        }
        // still inside dumb recovery until </foo>
        assert!(gw.possible().is_empty());
        let r = gw.fire_event(Event::end_tag("", "foo"));
        assert!(matches!(r, FireResult::Matched(e) if e.is_empty()));
        // recovery popped: em's choice should now accept bar or baz again
        assert!(!gw.possible().is_empty());
    }

    #[test]
    fn misplaced_element_with_single_definition_is_validated_structurally() {
        // define "aside" = element aside { attribute id { text } }
        // start = element doc { element intro {} }
        let define = Define::new("aside");
        let attr = PN::attribute(NameClass::name("", "id"), PN::text("t"), "attr");
        let aside = PN::element(NameClass::name("", "aside"), attr, "aside-el");
        define.set_content(aside);

        let intro = empty_element("intro");
        let doc = PN::element(NameClass::name("", "doc"), intro, "doc");

        let mut defines = HashMap::new();
        defines.insert("aside".to_string(), define);
        let grammar = Rc::new(Grammar::new(doc, defines));
        let mut gw = GrammarWalker::new(grammar);

        gw.fire_event(Event::enter_start_tag("", "doc"));
        gw.fire_event(Event::LeaveStartTag);
        // <aside> turns up where <intro> was expected, but "aside" has
        // exactly one production elsewhere in the grammar.
        match gw.fire_event(Event::enter_start_tag("", "aside")) {
            FireResult::Matched(errs) => assert!(errs.is_empty()),
            FireResult::NoMatch => panic!("single-definition recovery should accept the element"),
        }
        // its own content model still applies: the required "id" attribute
        // is missing.
        match gw.fire_event(Event::LeaveStartTag) {
            FireResult::Matched(errs) => assert!(!errs.is_empty(), "missing id attribute should be reported"),
            FireResult::NoMatch => panic!("leaveStartTag should be accepted"),
        }
        gw.fire_event(Event::end_tag("", "aside"));
        // em's own content still needs <intro>
        assert!(!gw.possible().is_empty());
    }

    #[test]
    fn rejected_attribute_name_swallows_its_value() {
        let root = PN::element(NameClass::name("", "root"), PN::empty("e"), "root");
        let mut gw = GrammarWalker::new(single_grammar(root));

        gw.fire_event(Event::enter_start_tag("", "root"));
        match gw.fire_event(Event::attribute_name("", "bogus")) {
            FireResult::Matched(errs) => assert_eq!(errs.len(), 1),
            FireResult::NoMatch => panic!("rejected attribute name should still be handled"),
        }
        let r = gw.fire_event(Event::AttributeValue { value: "whatever".into() });
        assert!(matches!(r, FireResult::Matched(e) if e.is_empty()));
    }

    #[test]
    fn name_resolver_round_trips_through_grammar_walker() {
        let root = PN::element(NameClass::name("", "root"), PN::empty("e"), "root");
        let mut gw = GrammarWalker::new(single_grammar(root));
        gw.fire_event(Event::EnterContext);
        gw.fire_event(Event::DefinePrefix {
            prefix: "f".into(),
            uri: "urn:foo".into(),
        });
        let (ns, local) = gw.resolve_name("f:bar", false).unwrap();
        assert_eq!(gw.unresolve_name(&ns, &local), "f:bar");
    }
}

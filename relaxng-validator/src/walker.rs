//! One walker per pattern kind. A single `Walker` type with a `State` enum
//! mirroring `PatternKind` is used rather than a `Walker` trait with one
//! implementor per kind -- a sum type with match/switch on the variant
//! beats virtual dispatch here, since the set of kinds is closed.

use crate::error::{Name, ValidationError};
use crate::event::Event;
use relaxng_model::datatype::{Datatype, Namespaces};
use relaxng_model::name_class::ExpandedName;
use relaxng_model::pattern::{Define, PatternKind, PatternNode};
use relaxng_model::NameClass;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireResult {
    Matched(Vec<ValidationError>),
    NoMatch,
}

pub type EndResult = Vec<ValidationError>;

/// Resolves a `Value` pattern's own lexical QName content against the
/// namespace in scope *at the point the `<value>` was written in the
/// schema* -- not the document's live resolver.
struct SchemaNamespace<'a>(&'a str);

impl Namespaces for SchemaNamespace<'_> {
    fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix.is_empty() {
            Some(self.0)
        } else {
            None
        }
    }
}

fn name_class_names(nc: &NameClass, out: &mut Vec<Name>) {
    match nc {
        NameClass::Name {
            namespace_uri,
            local_name,
        } => out.push(Name::new(namespace_uri.clone(), local_name.clone())),
        NameClass::NameChoice { a, b } => {
            name_class_names(a, out);
            name_class_names(b, out);
        }
        NameClass::NsName { .. } | NameClass::AnyName { .. } => {}
    }
}

fn name_class_to_event(nc: &NameClass) -> Event {
    match nc {
        NameClass::Name {
            namespace_uri,
            local_name,
        } => Event::enter_start_tag(namespace_uri.clone(), local_name.clone()),
        other => Event::enter_start_tag("*", other.describe()),
    }
}

fn name_class_to_attribute_event(nc: &NameClass) -> Event {
    match nc {
        NameClass::Name {
            namespace_uri,
            local_name,
        } => Event::attribute_name(namespace_uri.clone(), local_name.clone()),
        other => Event::attribute_name("*", other.describe()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Neither,
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementPhase {
    AwaitingName,
    InAttributes,
    InContent,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributePhase {
    AwaitingName,
    AwaitingValue,
    Done,
    Inert,
}

#[derive(Debug, Clone)]
enum State {
    Empty,
    NotAllowed,
    Text,
    Value,
    Data {
        seen_text: bool,
    },
    List {
        done: bool,
        fresh_can_end: bool,
    },
    Attribute {
        phase: AttributePhase,
    },
    Group {
        a: Box<Walker>,
        b: Box<Walker>,
    },
    /// The `choice(empty, x)` shortcut form. `engaged` tracks whether
    /// `inner` has ever matched anything, since a fresh
    /// `inner`'s own `can_end()` can't distinguish "not started, free to
    /// skip" from "started and mid-pattern" on its own.
    Optional {
        inner: Box<Walker>,
        engaged: bool,
    },
    Choice {
        a: Option<Box<Walker>>,
        b: Option<Box<Walker>>,
        dead: bool,
    },
    Interleave {
        a: Box<Walker>,
        b: Box<Walker>,
        in_progress: Side,
        a_depth: i32,
        b_depth: i32,
    },
    OneOrMore {
        content: Rc<PatternNode>,
        current: Box<Walker>,
    },
    Element {
        phase: ElementPhase,
        bound: Option<(String, String)>,
        content: Rc<PatternNode>,
        child: Option<Box<Walker>>,
    },
    Ref {
        define: Rc<Define>,
        child: Option<Box<Walker>>,
    },
}

#[derive(Debug, Clone)]
pub struct Walker {
    pattern: Rc<PatternNode>,
    state: State,
}

impl Walker {
    pub fn new(pattern: Rc<PatternNode>) -> Walker {
        let state = match &pattern.kind {
            PatternKind::Empty => State::Empty,
            PatternKind::NotAllowed => State::NotAllowed,
            PatternKind::Text => State::Text,
            PatternKind::Value { .. } => State::Value,
            PatternKind::Data { .. } => State::Data { seen_text: false },
            PatternKind::List(content) => {
                let fresh_can_end = Walker::new(content.clone()).can_end();
                State::List {
                    done: false,
                    fresh_can_end,
                }
            }
            PatternKind::Attribute { .. } => State::Attribute {
                phase: AttributePhase::AwaitingName,
            },
            PatternKind::Element { content, .. } => State::Element {
                phase: ElementPhase::AwaitingName,
                bound: None,
                content: content.clone(),
                child: None,
            },
            PatternKind::Ref(define) => State::Ref {
                define: define.clone(),
                child: None,
            },
            PatternKind::Group(a, b) => State::Group {
                a: Box::new(Walker::new(a.clone())),
                b: Box::new(Walker::new(b.clone())),
            },
            PatternKind::Choice(a, b) => {
                if matches!(a.kind, PatternKind::Empty) {
                    State::Optional {
                        inner: Box::new(Walker::new(b.clone())),
                        engaged: false,
                    }
                } else {
                    State::Choice {
                        a: Some(Box::new(Walker::new(a.clone()))),
                        b: Some(Box::new(Walker::new(b.clone()))),
                        dead: false,
                    }
                }
            }
            PatternKind::Interleave(a, b) => State::Interleave {
                a: Box::new(Walker::new(a.clone())),
                b: Box::new(Walker::new(b.clone())),
                in_progress: Side::Neither,
                a_depth: 0,
                b_depth: 0,
            },
            PatternKind::OneOrMore(content) => State::OneOrMore {
                content: content.clone(),
                current: Box::new(Walker::new(content.clone())),
            },
        };
        Walker { pattern, state }
    }

    fn name_class(&self) -> &NameClass {
        match &self.pattern.kind {
            PatternKind::Attribute { name, .. } | PatternKind::Element { name, .. } => name,
            _ => unreachable!("name_class called on a pattern without a name class"),
        }
    }

    pub fn fire_event(&mut self, event: &Event) -> FireResult {
        match &mut self.state {
            State::Empty => {
                if event.is_whitespace_text() {
                    FireResult::Matched(vec![])
                } else {
                    FireResult::NoMatch
                }
            }
            State::NotAllowed => FireResult::NoMatch,
            State::Text => match event {
                Event::Text { .. } => FireResult::Matched(vec![]),
                _ => FireResult::NoMatch,
            },
            State::Value => match event {
                Event::Text { value } => {
                    let (datatype, stored, ns) = match &self.pattern.kind {
                        PatternKind::Value { datatype, value, ns } => (datatype.clone(), value.clone(), ns.clone()),
                        _ => unreachable!(),
                    };
                    if datatype.equal(&stored, value, &SchemaNamespace(&ns)) {
                        FireResult::Matched(vec![])
                    } else {
                        FireResult::NoMatch
                    }
                }
                _ => FireResult::NoMatch,
            },
            State::Data { seen_text } => match event {
                Event::Text { value } => {
                    let (datatype, except) = match &self.pattern.kind {
                        PatternKind::Data { datatype, except } => (datatype.clone(), except.clone()),
                        _ => unreachable!(),
                    };
                    if datatype.disallows(value) {
                        return FireResult::NoMatch;
                    }
                    if let Some(except) = except {
                        let mut except_walker = Walker::new(except);
                        if let FireResult::Matched(_) = except_walker.fire_event(&Event::text(value.clone())) {
                            return FireResult::NoMatch;
                        }
                    }
                    *seen_text = true;
                    FireResult::Matched(vec![])
                }
                _ => FireResult::NoMatch,
            },
            State::List { done, .. } => match event {
                Event::Text { value } => {
                    let content = match &self.pattern.kind {
                        PatternKind::List(content) => content.clone(),
                        _ => unreachable!(),
                    };
                    let mut child = Walker::new(content);
                    let child_fresh_can_end = child.can_end();
                    let mut errs = Vec::new();
                    let mut saw_token = false;
                    for token in value.split_whitespace() {
                        saw_token = true;
                        match child.fire_event(&Event::text(token)) {
                            FireResult::Matched(e) => errs.extend(e),
                            FireResult::NoMatch => errs.push(ValidationError::validation(format!(
                                "value {token:?} not allowed in list"
                            ))),
                        }
                    }
                    if !saw_token && !child_fresh_can_end {
                        errs.push(ValidationError::validation("list requires at least one value"));
                    }
                    errs.extend(child.end());
                    *done = true;
                    FireResult::Matched(errs)
                }
                _ => FireResult::NoMatch,
            },
            State::Attribute { phase } => {
                let (name_class, content) = match &self.pattern.kind {
                    PatternKind::Attribute { name, content } => (name, content),
                    _ => unreachable!(),
                };
                fire_attribute(name_class, content, phase, event)
            }
            State::Group { a, b } => fire_group(a, b, event),
            State::Optional { inner, engaged } => match inner.fire_event(event) {
                FireResult::Matched(errs) => {
                    *engaged = true;
                    FireResult::Matched(errs)
                }
                FireResult::NoMatch => FireResult::NoMatch,
            },
            State::Choice { a, b, dead } => fire_choice(a, b, dead, event),
            State::Interleave {
                a,
                b,
                in_progress,
                a_depth,
                b_depth,
            } => fire_interleave(a, b, in_progress, a_depth, b_depth, event),
            State::OneOrMore { content, current } => fire_one_or_more(content, current, event),
            State::Element {
                phase,
                bound,
                content,
                child,
            } => {
                let name_class = match &self.pattern.kind {
                    PatternKind::Element { name, .. } => name,
                    _ => unreachable!(),
                };
                fire_element(name_class, phase, bound, content, child, event)
            }
            State::Ref { define, child } => fire_ref(define, child, event),
        }
    }

    pub fn possible(&self) -> Vec<Event> {
        match &self.state {
            State::Empty | State::NotAllowed => vec![],
            State::Text => vec![Event::text("")],
            State::Value => {
                let value = match &self.pattern.kind {
                    PatternKind::Value { value, .. } => value.clone(),
                    _ => unreachable!(),
                };
                vec![Event::text(value)]
            }
            State::Data { .. } => vec![Event::text("")],
            State::List { done, .. } => {
                if *done {
                    vec![]
                } else {
                    vec![Event::text("")]
                }
            }
            State::Attribute { .. } => vec![],
            State::Group { a, b } => {
                let mut out = a.possible();
                if a.can_end() {
                    out.extend(b.possible());
                }
                out
            }
            State::Optional { inner, .. } => inner.possible(),
            State::Choice { a, b, dead } => {
                if *dead {
                    vec![]
                } else {
                    let mut out = a.as_ref().map(|w| w.possible()).unwrap_or_default();
                    out.extend(b.as_ref().map(|w| w.possible()).unwrap_or_default());
                    out
                }
            }
            State::Interleave {
                a,
                b,
                in_progress,
                a_depth,
                b_depth,
            } => match in_progress {
                Side::Neither => {
                    let mut out = a.possible();
                    out.extend(b.possible());
                    out
                }
                Side::A => {
                    let mut out = a.possible();
                    if *a_depth == 0 {
                        out.extend(b.possible());
                    }
                    out
                }
                Side::B => {
                    let mut out = b.possible();
                    if *b_depth == 0 {
                        out.extend(a.possible());
                    }
                    out
                }
            },
            State::OneOrMore { content, current } => {
                let mut out = current.possible();
                if current.can_end() {
                    out.extend(Walker::new(content.clone()).possible());
                }
                out
            }
            State::Element { phase, bound, child, .. } => match phase {
                ElementPhase::AwaitingName => vec![name_class_to_event(self.name_class())],
                ElementPhase::InAttributes => {
                    let child = child.as_ref().unwrap();
                    let mut out = child.possible_attributes();
                    if child.can_end_attribute() {
                        out.push(Event::LeaveStartTag);
                    }
                    out
                }
                ElementPhase::InContent => {
                    let child = child.as_ref().unwrap();
                    let mut out = child.possible();
                    if child.can_end() {
                        if let Some((ns, local)) = bound {
                            out.push(Event::end_tag(ns.clone(), local.clone()));
                        }
                    }
                    out
                }
                ElementPhase::Closed => vec![],
            },
            State::Ref { define, child } => match child {
                Some(c) => c.possible(),
                None => {
                    let element = define.content();
                    let event = match &element.kind {
                        PatternKind::Element { name, .. } => name_class_to_event(name),
                        _ => unreachable!("Define content is always an Element"),
                    };
                    vec![event]
                }
            },
        }
    }

    pub fn possible_attributes(&self) -> Vec<Event> {
        match &self.state {
            State::Attribute { phase } => match phase {
                AttributePhase::AwaitingName => vec![name_class_to_attribute_event(self.name_class())],
                AttributePhase::AwaitingValue => vec![Event::AttributeValue { value: String::new() }],
                AttributePhase::Done | AttributePhase::Inert => vec![],
            },
            State::Group { a, b } | State::Interleave { a, b, .. } => {
                let mut out = a.possible_attributes();
                out.extend(b.possible_attributes());
                out
            }
            State::Optional { inner, .. } => inner.possible_attributes(),
            State::Choice { a, b, dead } => {
                if *dead {
                    vec![]
                } else {
                    let mut out = a.as_ref().map(|w| w.possible_attributes()).unwrap_or_default();
                    out.extend(b.as_ref().map(|w| w.possible_attributes()).unwrap_or_default());
                    out
                }
            }
            State::OneOrMore { content, current } => {
                let mut out = current.possible_attributes();
                if current.can_end() {
                    out.extend(Walker::new(content.clone()).possible_attributes());
                }
                out
            }
            State::Element { phase, child, .. } => {
                if *phase == ElementPhase::InAttributes {
                    child.as_ref().unwrap().possible_attributes()
                } else {
                    vec![]
                }
            }
            State::Ref { child, .. } => child.as_ref().map(|c| c.possible_attributes()).unwrap_or_default(),
            _ => vec![],
        }
    }

    pub fn can_end(&self) -> bool {
        match &self.state {
            State::Empty | State::Text => true,
            State::NotAllowed => false,
            State::Value => false,
            State::Data { seen_text } => {
                if *seen_text {
                    true
                } else {
                    let (datatype, except) = match &self.pattern.kind {
                        PatternKind::Data { datatype, except } => (datatype.clone(), except.clone()),
                        _ => unreachable!(),
                    };
                    let except_rejects_empty = except
                        .map(|e| {
                            let mut w = Walker::new(e);
                            !matches!(w.fire_event(&Event::text("")), FireResult::Matched(_))
                        })
                        .unwrap_or(true);
                    datatype.allows_empty() && except_rejects_empty
                }
            }
            State::List { done, fresh_can_end } => *done || *fresh_can_end,
            State::Attribute { phase } => matches!(phase, AttributePhase::Done | AttributePhase::Inert),
            State::Group { a, b } => a.can_end() && b.can_end(),
            State::Optional { inner, engaged } => !*engaged || inner.can_end(),
            State::Choice { a, b, dead } => {
                *dead
                    || a.as_ref().map(|w| w.can_end()).unwrap_or(false)
                    || b.as_ref().map(|w| w.can_end()).unwrap_or(false)
            }
            State::Interleave { a, b, .. } => a.can_end() && b.can_end(),
            State::OneOrMore { current, .. } => current.can_end(),
            State::Element { phase, .. } => *phase == ElementPhase::Closed,
            State::Ref { child, .. } => child.as_ref().map(|c| c.can_end()).unwrap_or(false),
        }
    }

    pub fn can_end_attribute(&self) -> bool {
        match &self.state {
            State::Attribute { phase } => matches!(phase, AttributePhase::Done | AttributePhase::Inert),
            State::Group { a, b } | State::Interleave { a, b, .. } => a.can_end_attribute() && b.can_end_attribute(),
            State::Optional { inner, engaged } => !*engaged || inner.can_end_attribute(),
            State::Choice { a, b, dead } => {
                *dead
                    || (a.as_ref().map(|w| w.can_end_attribute()).unwrap_or(true)
                        && b.as_ref().map(|w| w.can_end_attribute()).unwrap_or(true))
            }
            State::Element { phase, child, .. } => match phase {
                ElementPhase::InAttributes => child.as_ref().map(|c| c.can_end_attribute()).unwrap_or(false),
                _ => true,
            },
            State::Ref { child, .. } => child.as_ref().map(|c| c.can_end_attribute()).unwrap_or(true),
            _ => true,
        }
    }

    pub fn end(&self) -> EndResult {
        match &self.state {
            State::Empty | State::Text => vec![],
            State::NotAllowed => vec![ValidationError::validation("not allowed here")],
            State::Value => vec![ValidationError::validation("value required")],
            State::Data { .. } => {
                if self.can_end() {
                    vec![]
                } else {
                    vec![ValidationError::validation("value required")]
                }
            }
            State::List { .. } => {
                if self.can_end() {
                    vec![]
                } else {
                    vec![ValidationError::validation("value required")]
                }
            }
            State::Attribute { phase } => match phase {
                AttributePhase::AwaitingName => {
                    let mut names = Vec::new();
                    name_class_names(self.name_class(), &mut names);
                    vec![ValidationError::attribute_name("attribute missing", names)]
                }
                AttributePhase::AwaitingValue => {
                    let mut names = Vec::new();
                    name_class_names(self.name_class(), &mut names);
                    vec![ValidationError::attribute_value("attribute value missing", names)]
                }
                AttributePhase::Done | AttributePhase::Inert => vec![],
            },
            State::Group { a, b } | State::Interleave { a, b, .. } => {
                let mut e = a.end();
                e.extend(b.end());
                e
            }
            State::Optional { inner, engaged } => {
                if *engaged {
                    inner.end()
                } else {
                    vec![]
                }
            }
            State::Choice { a, b, dead } => {
                if *dead {
                    vec![]
                } else if a.as_ref().map(|w| w.can_end()).unwrap_or(false)
                    || b.as_ref().map(|w| w.can_end()).unwrap_or(false)
                {
                    vec![]
                } else {
                    let mut errs = Vec::new();
                    if let Some(a) = a {
                        errs.extend(a.end());
                    }
                    if let Some(b) = b {
                        errs.extend(b.end());
                    }
                    errs
                }
            }
            State::OneOrMore { current, .. } => current.end(),
            State::Element { phase, bound, child, .. } => match phase {
                ElementPhase::AwaitingName => {
                    let mut names = Vec::new();
                    name_class_names(self.name_class(), &mut names);
                    vec![ValidationError::element_name("tag required", names)]
                }
                ElementPhase::InAttributes => {
                    let names = bound
                        .as_ref()
                        .map(|(ns, local)| vec![Name::new(ns.clone(), local.clone())])
                        .unwrap_or_default();
                    let mut e = vec![ValidationError::element_name("start tag not terminated", names)];
                    if let Some(child) = child {
                        e.extend(child.end());
                    }
                    e
                }
                ElementPhase::InContent => {
                    let names = bound
                        .as_ref()
                        .map(|(ns, local)| vec![Name::new(ns.clone(), local.clone())])
                        .unwrap_or_default();
                    let mut e = vec![ValidationError::element_name("tag not closed", names)];
                    if let Some(child) = child {
                        e.extend(child.end());
                    }
                    e
                }
                ElementPhase::Closed => vec![],
            },
            State::Ref { define, child } => match child {
                Some(c) => c.end(),
                None => {
                    let mut names = Vec::new();
                    if let PatternKind::Element { name, .. } = &define.content().kind {
                        name_class_names(name, &mut names);
                    }
                    vec![ValidationError::element_name("tag required", names)]
                }
            },
        }
    }

    pub fn end_attributes(&mut self) -> EndResult {
        let pattern = self.pattern.clone();
        match &mut self.state {
            State::Attribute { phase } => {
                let name_class = match &pattern.kind {
                    PatternKind::Attribute { name, .. } => name,
                    _ => unreachable!(),
                };
                let errs = match *phase {
                    AttributePhase::AwaitingName => {
                        let mut names = Vec::new();
                        name_class_names(name_class, &mut names);
                        vec![ValidationError::attribute_name("attribute missing", names)]
                    }
                    AttributePhase::AwaitingValue => {
                        let mut names = Vec::new();
                        name_class_names(name_class, &mut names);
                        vec![ValidationError::attribute_value("attribute value missing", names)]
                    }
                    AttributePhase::Done | AttributePhase::Inert => vec![],
                };
                *phase = AttributePhase::Inert;
                errs
            }
            State::Group { a, b } | State::Interleave { a, b, .. } => {
                let mut e = a.end_attributes();
                e.extend(b.end_attributes());
                e
            }
            State::Optional { inner, engaged } => {
                if *engaged {
                    inner.end_attributes()
                } else {
                    vec![]
                }
            }
            State::Choice { a, b, dead } => {
                if *dead {
                    vec![]
                } else {
                    let a_can_end = a.as_ref().map(|w| w.can_end_attribute()).unwrap_or(false);
                    let b_can_end = b.as_ref().map(|w| w.can_end_attribute()).unwrap_or(false);
                    let mut errs = Vec::new();
                    if let Some(a) = a.as_mut() {
                        errs.extend(a.end_attributes());
                    }
                    if let Some(b) = b.as_mut() {
                        errs.extend(b.end_attributes());
                    }
                    if a_can_end || b_can_end {
                        vec![]
                    } else {
                        errs
                    }
                }
            }
            State::OneOrMore { current, .. } => current.end_attributes(),
            State::Element { phase, child, .. } if *phase == ElementPhase::InAttributes => {
                child.as_mut().map(|c| c.end_attributes()).unwrap_or_default()
            }
            State::Ref { child, .. } => child.as_mut().map(|c| c.end_attributes()).unwrap_or_default(),
            _ => vec![],
        }
    }
}

fn fire_attribute(
    name_class: &NameClass,
    content: &Rc<PatternNode>,
    phase: &mut AttributePhase,
    event: &Event,
) -> FireResult {
    match *phase {
        AttributePhase::AwaitingName => match event {
            Event::AttributeName { ns, local } => {
                if name_class.matches(ExpandedName::new(ns, local)) {
                    *phase = AttributePhase::AwaitingValue;
                    FireResult::Matched(vec![])
                } else {
                    FireResult::NoMatch
                }
            }
            Event::AttributeNameAndValue { ns, local, value } => {
                if name_class.matches(ExpandedName::new(ns, local)) {
                    let mut child = Walker::new(content.clone());
                    let errs = match child.fire_event(&Event::text(value.clone())) {
                        FireResult::Matched(e) => e,
                        FireResult::NoMatch => {
                            let mut names = Vec::new();
                            name_class_names(name_class, &mut names);
                            vec![ValidationError::attribute_value("invalid attribute value", names)]
                        }
                    };
                    *phase = AttributePhase::Done;
                    FireResult::Matched(errs)
                } else {
                    FireResult::NoMatch
                }
            }
            _ => FireResult::NoMatch,
        },
        AttributePhase::AwaitingValue => match event {
            Event::AttributeValue { value } => {
                let mut child = Walker::new(content.clone());
                let errs = match child.fire_event(&Event::text(value.clone())) {
                    FireResult::Matched(e) => e,
                    FireResult::NoMatch => {
                        let mut names = Vec::new();
                        name_class_names(name_class, &mut names);
                        vec![ValidationError::attribute_value("invalid attribute value", names)]
                    }
                };
                *phase = AttributePhase::Done;
                FireResult::Matched(errs)
            }
            _ => FireResult::NoMatch,
        },
        AttributePhase::Done | AttributePhase::Inert => FireResult::NoMatch,
    }
}

fn fire_group(a: &mut Box<Walker>, b: &mut Box<Walker>, event: &Event) -> FireResult {
    if event.is_attribute_phase_event() {
        return match a.fire_event(event) {
            FireResult::Matched(e) => FireResult::Matched(e),
            FireResult::NoMatch => b.fire_event(event),
        };
    }
    match a.fire_event(event) {
        FireResult::Matched(e) => FireResult::Matched(e),
        FireResult::NoMatch => {
            if a.can_end() {
                let mut errs = a.end();
                match b.fire_event(event) {
                    FireResult::Matched(e) => {
                        errs.extend(e);
                        FireResult::Matched(errs)
                    }
                    FireResult::NoMatch => FireResult::NoMatch,
                }
            } else {
                FireResult::NoMatch
            }
        }
    }
}

fn fire_choice(
    a: &mut Option<Box<Walker>>,
    b: &mut Option<Box<Walker>>,
    dead: &mut bool,
    event: &Event,
) -> FireResult {
    if *dead {
        return FireResult::Matched(vec![]);
    }
    let mut matched_errs: Option<Vec<ValidationError>> = None;
    let mut names_a = Vec::new();
    let mut names_b = Vec::new();

    if let Some(aw) = a.as_mut() {
        for ev in aw.possible() {
            if let Event::EnterStartTag { ns, local } = ev {
                names_a.push(Name::new(ns, local));
            }
        }
        match aw.fire_event(event) {
            FireResult::Matched(e) => matched_errs = Some(e),
            FireResult::NoMatch => {
                log::trace!("choice: branch a pruned by {event:?}");
                *a = None;
            }
        }
    }
    if let Some(bw) = b.as_mut() {
        for ev in bw.possible() {
            if let Event::EnterStartTag { ns, local } = ev {
                names_b.push(Name::new(ns, local));
            }
        }
        match bw.fire_event(event) {
            FireResult::Matched(e) => {
                if let Some(existing) = matched_errs.as_mut() {
                    existing.extend(e);
                } else {
                    matched_errs = Some(e);
                }
            }
            FireResult::NoMatch => {
                log::trace!("choice: branch b pruned by {event:?}");
                *b = None;
            }
        }
    }

    if let Some(errs) = matched_errs {
        return FireResult::Matched(errs);
    }
    if a.is_none() && b.is_none() {
        *dead = true;
        log::debug!("choice: no live alternative left for {event:?}");
        return FireResult::Matched(vec![ValidationError::Choice { names_a, names_b }]);
    }
    FireResult::NoMatch
}

fn fire_interleave(
    a: &mut Box<Walker>,
    b: &mut Box<Walker>,
    in_progress: &mut Side,
    a_depth: &mut i32,
    b_depth: &mut i32,
    event: &Event,
) -> FireResult {
    if event.is_attribute_phase_event() {
        return match a.fire_event(event) {
            FireResult::Matched(e) => FireResult::Matched(e),
            FireResult::NoMatch => b.fire_event(event),
        };
    }

    fn adjust(depth: &mut i32, event: &Event) {
        match event {
            Event::EnterStartTag { .. } | Event::StartTagAndAttributes { .. } => *depth += 1,
            Event::EndTag { .. } => *depth -= 1,
            _ => {}
        }
    }

    // At a switch point (not yet committed to either side, or the
    // committed side just returned to depth 0) both alternatives are
    // tried on clones first. The Relax NG interleave restriction (checked
    // upstream by the simplifier) guarantees at most one can match; both
    // matching is a broken upstream invariant, not a case to paper over
    // by picking one arbitrarily.
    fn try_both(a: &Walker, b: &Walker, event: &Event) -> (FireResult, FireResult) {
        let mut a_clone = a.clone();
        let mut b_clone = b.clone();
        (a_clone.fire_event(event), b_clone.fire_event(event))
    }

    match *in_progress {
        Side::Neither => {
            let (ar, br) = try_both(a, b, event);
            match (ar, br) {
                (FireResult::Matched(_), FireResult::Matched(_)) => {
                    panic!("interleave: event matched both branches")
                }
                (FireResult::Matched(e), FireResult::NoMatch) => {
                    let mut committed = a.clone();
                    committed.fire_event(event);
                    **a = *committed;
                    *in_progress = Side::A;
                    adjust(a_depth, event);
                    FireResult::Matched(e)
                }
                (FireResult::NoMatch, FireResult::Matched(e)) => {
                    let mut committed = b.clone();
                    committed.fire_event(event);
                    **b = *committed;
                    *in_progress = Side::B;
                    adjust(b_depth, event);
                    FireResult::Matched(e)
                }
                (FireResult::NoMatch, FireResult::NoMatch) => FireResult::NoMatch,
            }
        }
        Side::A if *a_depth == 0 => {
            log::trace!("interleave: side a balanced, checking for a switch to b");
            let (ar, br) = try_both(a, b, event);
            match (ar, br) {
                (FireResult::Matched(_), FireResult::Matched(_)) => {
                    panic!("interleave: event matched both branches")
                }
                (FireResult::Matched(e), FireResult::NoMatch) => {
                    a.fire_event(event);
                    adjust(a_depth, event);
                    FireResult::Matched(e)
                }
                (FireResult::NoMatch, FireResult::Matched(e)) => {
                    log::debug!("interleave: switching from side a to side b");
                    let mut committed = b.clone();
                    committed.fire_event(event);
                    **b = *committed;
                    *in_progress = Side::B;
                    adjust(b_depth, event);
                    FireResult::Matched(e)
                }
                (FireResult::NoMatch, FireResult::NoMatch) => FireResult::NoMatch,
            }
        }
        Side::A => match a.fire_event(event) {
            FireResult::Matched(e) => {
                adjust(a_depth, event);
                FireResult::Matched(e)
            }
            FireResult::NoMatch => FireResult::NoMatch,
        },
        Side::B if *b_depth == 0 => {
            log::trace!("interleave: side b balanced, checking for a switch to a");
            let (ar, br) = try_both(a, b, event);
            match (ar, br) {
                (FireResult::Matched(_), FireResult::Matched(_)) => {
                    panic!("interleave: event matched both branches")
                }
                (FireResult::Matched(e), FireResult::NoMatch) => {
                    log::debug!("interleave: switching from side b to side a");
                    a.fire_event(event);
                    *in_progress = Side::A;
                    adjust(a_depth, event);
                    FireResult::Matched(e)
                }
                (FireResult::NoMatch, FireResult::Matched(e)) => {
                    b.fire_event(event);
                    adjust(b_depth, event);
                    FireResult::Matched(e)
                }
                (FireResult::NoMatch, FireResult::NoMatch) => FireResult::NoMatch,
            }
        }
        Side::B => match b.fire_event(event) {
            FireResult::Matched(e) => {
                adjust(b_depth, event);
                FireResult::Matched(e)
            }
            FireResult::NoMatch => FireResult::NoMatch,
        },
    }
}

fn fire_one_or_more(content: &mut Rc<PatternNode>, current: &mut Box<Walker>, event: &Event) -> FireResult {
    match current.fire_event(event) {
        FireResult::Matched(e) => FireResult::Matched(e),
        FireResult::NoMatch => {
            if current.can_end() {
                let mut fresh = Walker::new(content.clone());
                match fresh.fire_event(event) {
                    FireResult::Matched(e) => {
                        let mut errs = current.end();
                        errs.extend(e);
                        **current = fresh;
                        FireResult::Matched(errs)
                    }
                    FireResult::NoMatch => FireResult::NoMatch,
                }
            } else {
                FireResult::NoMatch
            }
        }
    }
}

fn fire_element(
    name_class: &NameClass,
    phase: &mut ElementPhase,
    bound: &mut Option<(String, String)>,
    content: &mut Rc<PatternNode>,
    child: &mut Option<Box<Walker>>,
    event: &Event,
) -> FireResult {
    match *phase {
        ElementPhase::AwaitingName => match event {
            Event::EnterStartTag { ns, local } => {
                if !name_class.matches(ExpandedName::new(ns, local)) {
                    return FireResult::NoMatch;
                }
                *bound = Some((ns.clone(), local.clone()));
                *child = Some(Box::new(Walker::new(content.clone())));
                *phase = ElementPhase::InAttributes;
                FireResult::Matched(vec![])
            }
            Event::StartTagAndAttributes { ns, local, attributes } => {
                if !name_class.matches(ExpandedName::new(ns, local)) {
                    return FireResult::NoMatch;
                }
                *bound = Some((ns.clone(), local.clone()));
                let mut c = Walker::new(content.clone());
                let mut errs = Vec::new();
                for (ans, alocal, avalue) in attributes {
                    match c.fire_event(&Event::AttributeNameAndValue {
                        ns: ans.clone(),
                        local: alocal.clone(),
                        value: avalue.clone(),
                    }) {
                        FireResult::Matched(e) => errs.extend(e),
                        FireResult::NoMatch => errs.push(ValidationError::attribute_name(
                            "attribute not allowed here",
                            vec![Name::new(ans.clone(), alocal.clone())],
                        )),
                    }
                }
                errs.extend(c.end_attributes());
                *child = Some(Box::new(c));
                *phase = ElementPhase::InContent;
                FireResult::Matched(errs)
            }
            _ => FireResult::NoMatch,
        },
        ElementPhase::InAttributes => match event {
            Event::AttributeName { .. } | Event::AttributeValue { .. } | Event::AttributeNameAndValue { .. } => {
                child.as_mut().unwrap().fire_event(event)
            }
            Event::LeaveStartTag => {
                let errs = child.as_mut().unwrap().end_attributes();
                *phase = ElementPhase::InContent;
                FireResult::Matched(errs)
            }
            _ => FireResult::NoMatch,
        },
        ElementPhase::InContent => match event {
            Event::EndTag { ns, local } => {
                if bound.as_ref().is_some_and(|(bns, blocal)| bns == ns && blocal == local) {
                    let errs = child.as_ref().unwrap().end();
                    *phase = ElementPhase::Closed;
                    FireResult::Matched(errs)
                } else {
                    FireResult::NoMatch
                }
            }
            _ => child.as_mut().unwrap().fire_event(event),
        },
        ElementPhase::Closed => FireResult::NoMatch,
    }
}

fn fire_ref(define: &mut Rc<Define>, child: &mut Option<Box<Walker>>, event: &Event) -> FireResult {
    match child {
        Some(c) => c.fire_event(event),
        None => match event {
            Event::EnterStartTag { .. } | Event::StartTagAndAttributes { .. } => {
                let element_pattern = define.content();
                let mut w = Walker::new(element_pattern);
                match w.fire_event(event) {
                    FireResult::Matched(e) => {
                        *child = Some(Box::new(w));
                        FireResult::Matched(e)
                    }
                    FireResult::NoMatch => FireResult::NoMatch,
                }
            }
            _ => FireResult::NoMatch,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use relaxng_model::datatype::relax::RelaxDatatype;
    use relaxng_model::pattern::PatternNode as PN;

    fn empty_element(name: &str) -> Rc<PatternNode> {
        PN::element(NameClass::name("", name), PN::empty("empty"), "el")
    }

    #[test]
    fn text_walker_accepts_any_text() {
        let mut w = Walker::new(PN::text("t"));
        assert!(matches!(w.fire_event(&Event::text("anything")), FireResult::Matched(_)));
        assert!(w.can_end());
    }

    #[test]
    fn value_walker_requires_exact_match() {
        let mut w = Walker::new(PN::value(Rc::new(RelaxDatatype::String), "a".into(), String::new(), "v"));
        assert_eq!(w.fire_event(&Event::text("b")), FireResult::NoMatch);
        assert!(matches!(w.fire_event(&Event::text("a")), FireResult::Matched(_)));
    }

    #[test]
    fn element_walker_s1_minimal_document() {
        // <html><head/></html>
        let head = empty_element("head");
        let html = PN::element(NameClass::name("", "html"), head, "html");
        let mut w = Walker::new(html);

        assert!(matches!(w.fire_event(&Event::enter_start_tag("", "html")), FireResult::Matched(_)));
        assert!(matches!(w.fire_event(&Event::LeaveStartTag), FireResult::Matched(_)));
        assert!(matches!(w.fire_event(&Event::enter_start_tag("", "head")), FireResult::Matched(_)));
        assert!(matches!(w.fire_event(&Event::LeaveStartTag), FireResult::Matched(_)));
        assert!(matches!(w.fire_event(&Event::end_tag("", "head")), FireResult::Matched(_)));
        assert!(matches!(w.fire_event(&Event::end_tag("", "html")), FireResult::Matched(_)));
        assert!(w.can_end());
        assert!(w.end().is_empty());
    }

    #[test]
    fn attribute_missing_is_reported_on_leave_start_tag() {
        // element html { attribute style { text } }
        let attr = PN::attribute(NameClass::name("", "style"), PN::text("t"), "attr");
        let html = PN::element(NameClass::name("", "html"), attr, "html");
        let mut w = Walker::new(html);
        w.fire_event(&Event::enter_start_tag("", "html"));
        match w.fire_event(&Event::LeaveStartTag) {
            FireResult::Matched(errs) => assert!(!errs.is_empty()),
            FireResult::NoMatch => panic!("leaveStartTag should be accepted"),
        }
    }

    #[test]
    fn one_or_more_premature_end_reports_tag_required() {
        // oneOrMore { element x {} }
        let x = empty_element("x");
        let pattern = PN::one_or_more(x, "oom");
        let w = Walker::new(pattern);
        assert!(!w.can_end());
        let errs = w.end();
        assert_eq!(errs.len(), 1);
        match &errs[0] {
            ValidationError::ElementName { message, names } => {
                assert_eq!(message, "tag required");
                assert_eq!(names, &vec![Name::new("", "x")]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn choice_error_reports_both_alternatives() {
        // element bar {} | element baz {}
        let choice = PN::choice(empty_element("bar"), empty_element("baz"), "choice");
        let mut w = Walker::new(choice);
        match w.fire_event(&Event::enter_start_tag("", "foo")) {
            FireResult::Matched(errs) => {
                assert_eq!(errs.len(), 1);
                assert_matches!(&errs[0], ValidationError::Choice { .. });
            }
            FireResult::NoMatch => panic!("choice with no live alternatives should synthesize an error"),
        }
    }

    #[test]
    fn interleave_accepts_every_permutation() {
        // interleave { A, B, C }
        let pattern = PN::interleave(
            PN::interleave(empty_element("a"), empty_element("b"), "ab"),
            empty_element("c"),
            "abc",
        );

        for perm in [
            ["a", "b", "c"],
            ["a", "c", "b"],
            ["b", "a", "c"],
            ["b", "c", "a"],
            ["c", "a", "b"],
            ["c", "b", "a"],
        ] {
            let mut w = Walker::new(pattern.clone());
            for name in perm {
                assert!(
                    matches!(w.fire_event(&Event::enter_start_tag("", name)), FireResult::Matched(_)),
                    "{name} enter"
                );
                assert!(matches!(w.fire_event(&Event::LeaveStartTag), FireResult::Matched(_)));
                assert!(matches!(w.fire_event(&Event::end_tag("", name)), FireResult::Matched(_)), "{name} end");
            }
            assert!(w.can_end(), "permutation {perm:?} should be able to end");
            assert!(w.end().is_empty());
        }
    }

    #[test]
    fn list_splits_on_whitespace() {
        let token: Rc<dyn Datatype> = Rc::new(RelaxDatatype::Token);
        let pattern = PN::list(PN::data(token, None, "d"), "list");
        let mut w = Walker::new(pattern);
        match w.fire_event(&Event::text("one two three")) {
            FireResult::Matched(errs) => assert!(errs.is_empty()),
            FireResult::NoMatch => panic!("list should consume the whole text event"),
        }
    }
}

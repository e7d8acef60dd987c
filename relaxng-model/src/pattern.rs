//! The immutable pattern tree.
//!
//! A `Grammar` is built once, bottom-up, by the schema loader in
//! [`crate::schema`] and never mutated again except to patch `Define`
//! placeholders while the Ref/Define cycle is still being wired up. Every
//! other crate in the workspace only ever reads through `Rc<PatternNode>`.

use crate::datatype::Datatype;
use crate::name_class::NameClass;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A named, possibly-recursive grammar production. `Ref` patterns hold an
/// `Rc<Define>` whose `content` starts empty and is patched in once the
/// referenced production has been built -- this is how the loader
/// constructs a cyclic pattern graph (`element -> ... -> ref -> define ->
/// element -> ...`) out of an otherwise strictly-owned `Rc` tree, without
/// an arena of integer ids.
pub struct Define {
    pub name: String,
    content: RefCell<Option<Rc<PatternNode>>>,
}

impl Define {
    pub fn new(name: impl Into<String>) -> Rc<Define> {
        Rc::new(Define {
            name: name.into(),
            content: RefCell::new(None),
        })
    }

    /// Patches this define's content. Panics if called twice -- each
    /// `Define` is filled in exactly once by the loader.
    pub fn set_content(&self, content: Rc<PatternNode>) {
        let mut slot = self.content.borrow_mut();
        assert!(slot.is_none(), "define {:?} patched twice", self.name);
        *slot = Some(content);
    }

    /// The production's body. Panics if the loader never patched this
    /// define -- an internal-invariant violation, since `schema::load`
    /// only returns `Ok` after every define referenced from the start
    /// pattern has been resolved.
    pub fn content(&self) -> Rc<PatternNode> {
        self.content
            .borrow()
            .clone()
            .unwrap_or_else(|| panic!("define {:?} used before its content was patched", self.name))
    }

    pub fn is_resolved(&self) -> bool {
        self.content.borrow().is_some()
    }
}

impl fmt::Debug for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Define({:?})", self.name)
    }
}

#[derive(Debug)]
pub enum PatternKind {
    Empty,
    NotAllowed,
    Text,
    Value {
        datatype: Rc<dyn Datatype>,
        value: String,
        /// The default namespace in scope where this `<value>` was
        /// written in the schema, used to resolve QName-typed literals.
        ns: String,
    },
    Data {
        datatype: Rc<dyn Datatype>,
        except: Option<Rc<PatternNode>>,
    },
    List(Rc<PatternNode>),
    Attribute {
        name: NameClass,
        content: Rc<PatternNode>,
    },
    Element {
        name: NameClass,
        content: Rc<PatternNode>,
    },
    Group(Rc<PatternNode>, Rc<PatternNode>),
    Choice(Rc<PatternNode>, Rc<PatternNode>),
    Interleave(Rc<PatternNode>, Rc<PatternNode>),
    OneOrMore(Rc<PatternNode>),
    Ref(Rc<Define>),
}

/// A pattern tree node, carrying its two non-crossing derived caches
/// alongside its kind. Caches are computed once at
/// construction time from already-built children -- `Ref` never needs to
/// look inside its `Define` to compute them, since every `Ref` resolves
/// (eventually) to an `Element`, and an `Element` unconditionally
/// contributes `has_attrs = false` / `has_empty_pattern = false` to its
/// enclosing scope. That lets a `Ref` node hard-code its own cache values
/// without recursing through the cycle.
#[derive(Debug)]
pub struct PatternNode {
    pub kind: PatternKind,
    /// True iff this pattern can directly produce an `attribute` pattern
    /// in the current (non-element) scope -- used to decide whether a
    /// `GrammarWalker` needs to consider attribute events here at all.
    pub has_attrs: bool,
    /// True iff this pattern accepts the empty sequence of events (no
    /// text, no children, no attributes) -- used by `Group`/`Interleave`
    /// nullability and by `OneOrMore`'s "can this repetition stop here"
    /// check.
    pub has_empty_pattern: bool,
    /// A debug-only breadcrumb ("element(foo)/group/choice[1]") used in
    /// diagnostics; never parsed, only displayed.
    pub xml_path: String,
}

impl PatternNode {
    fn leaf(kind: PatternKind, has_attrs: bool, has_empty_pattern: bool, xml_path: String) -> Rc<Self> {
        Rc::new(PatternNode {
            kind,
            has_attrs,
            has_empty_pattern,
            xml_path,
        })
    }

    pub fn empty(xml_path: impl Into<String>) -> Rc<Self> {
        Self::leaf(PatternKind::Empty, false, true, xml_path.into())
    }

    pub fn not_allowed(xml_path: impl Into<String>) -> Rc<Self> {
        Self::leaf(PatternKind::NotAllowed, false, false, xml_path.into())
    }

    pub fn text(xml_path: impl Into<String>) -> Rc<Self> {
        Self::leaf(PatternKind::Text, false, true, xml_path.into())
    }

    pub fn value(
        datatype: Rc<dyn Datatype>,
        value: String,
        ns: String,
        xml_path: impl Into<String>,
    ) -> Rc<Self> {
        Self::leaf(
            PatternKind::Value { datatype, value, ns },
            false,
            false,
            xml_path.into(),
        )
    }

    pub fn data(
        datatype: Rc<dyn Datatype>,
        except: Option<Rc<PatternNode>>,
        xml_path: impl Into<String>,
    ) -> Rc<Self> {
        Self::leaf(PatternKind::Data { datatype, except }, false, false, xml_path.into())
    }

    pub fn list(content: Rc<PatternNode>, xml_path: impl Into<String>) -> Rc<Self> {
        // `list` is not a Ref/Define boundary: its content lives entirely
        // inside the list's own text node, so it's safe to inherit.
        let has_empty_pattern = content.has_empty_pattern;
        Self::leaf(PatternKind::List(content), false, has_empty_pattern, xml_path.into())
    }

    pub fn attribute(name: NameClass, content: Rc<PatternNode>, xml_path: impl Into<String>) -> Rc<Self> {
        Self::leaf(
            PatternKind::Attribute { name, content },
            true,
            false,
            xml_path.into(),
        )
    }

    pub fn element(name: NameClass, content: Rc<PatternNode>, xml_path: impl Into<String>) -> Rc<Self> {
        // An element is opaque to its enclosing scope: attributes and
        // emptiness of its *content* have no bearing on whether the
        // *element* itself is an attribute or nullable from the outside.
        Self::leaf(
            PatternKind::Element { name, content },
            false,
            false,
            xml_path.into(),
        )
    }

    pub fn group(a: Rc<PatternNode>, b: Rc<PatternNode>, xml_path: impl Into<String>) -> Rc<Self> {
        let has_attrs = a.has_attrs || b.has_attrs;
        let has_empty_pattern = a.has_empty_pattern && b.has_empty_pattern;
        Self::leaf(PatternKind::Group(a, b), has_attrs, has_empty_pattern, xml_path.into())
    }

    pub fn choice(a: Rc<PatternNode>, b: Rc<PatternNode>, xml_path: impl Into<String>) -> Rc<Self> {
        let has_attrs = a.has_attrs || b.has_attrs;
        let has_empty_pattern = a.has_empty_pattern || b.has_empty_pattern;
        Self::leaf(PatternKind::Choice(a, b), has_attrs, has_empty_pattern, xml_path.into())
    }

    pub fn interleave(a: Rc<PatternNode>, b: Rc<PatternNode>, xml_path: impl Into<String>) -> Rc<Self> {
        let has_attrs = a.has_attrs || b.has_attrs;
        let has_empty_pattern = a.has_empty_pattern && b.has_empty_pattern;
        Self::leaf(
            PatternKind::Interleave(a, b),
            has_attrs,
            has_empty_pattern,
            xml_path.into(),
        )
    }

    pub fn one_or_more(content: Rc<PatternNode>, xml_path: impl Into<String>) -> Rc<Self> {
        let has_attrs = content.has_attrs;
        let has_empty_pattern = content.has_empty_pattern;
        Self::leaf(
            PatternKind::OneOrMore(content),
            has_attrs,
            has_empty_pattern,
            xml_path.into(),
        )
    }

    pub fn reference(define: Rc<Define>, xml_path: impl Into<String>) -> Rc<Self> {
        // Opaque boundary: see the struct doc comment. Every `Ref`
        // eventually bottoms out at an `Element`, whose own cache values
        // are always `(false, false)`, so short-circuiting here without
        // recursing into `define` is sound, not just convenient.
        Self::leaf(PatternKind::Ref(define), false, false, xml_path.into())
    }
}

/// The whole schema: a start pattern plus every named production reachable
/// from it, keyed by name.
#[derive(Debug)]
pub struct Grammar {
    pub start: Rc<PatternNode>,
    pub defines: HashMap<String, Rc<Define>>,
    /// Multimap from an element's expanded name to every `Define` whose
    /// body is (or contains, at the top level of a choice) an `Element`
    /// matching that name. Used by `GrammarWalker`'s single-definition
    /// recovery to guess which production an unexpected element was
    /// probably meant to satisfy.
    pub element_definitions: HashMap<(String, String), Vec<Rc<Define>>>,
    /// The schema's `"o"` flags field, round-tripped opaquely -- no flag
    /// bit has a defined meaning yet.
    pub options: i64,
}

impl Grammar {
    pub fn new(start: Rc<PatternNode>, defines: HashMap<String, Rc<Define>>) -> Self {
        let element_definitions = build_element_definitions(&defines);
        Grammar {
            start,
            defines,
            element_definitions,
            options: 0,
        }
    }
}

/// Walks every define looking for direct (or choice-nested) element names,
/// so the recovery machinery can map "an unexpected `<foo>` turned up" back
/// to a candidate production without searching the whole grammar.
fn build_element_definitions(
    defines: &HashMap<String, Rc<Define>>,
) -> HashMap<(String, String), Vec<Rc<Define>>> {
    let mut out: HashMap<(String, String), Vec<Rc<Define>>> = HashMap::new();
    for define in defines.values() {
        if !define.is_resolved() {
            continue;
        }
        let mut names = Vec::new();
        collect_simple_element_names(&define.content(), &mut names);
        for name in names {
            out.entry(name).or_default().push(define.clone());
        }
    }
    out
}

fn collect_simple_element_names(node: &PatternNode, out: &mut Vec<(String, String)>) {
    match &node.kind {
        PatternKind::Element { name, .. } => {
            if let NameClass::Name {
                namespace_uri,
                local_name,
            } = name
            {
                out.push((namespace_uri.clone(), local_name.clone()));
            }
        }
        PatternKind::Choice(a, b) | PatternKind::Group(a, b) | PatternKind::Interleave(a, b) => {
            collect_simple_element_names(a, out);
            collect_simple_element_names(b, out);
        }
        PatternKind::OneOrMore(content) => collect_simple_element_names(content, out),
        // Refs are not followed: a ref's own define is visited in its own
        // right by `build_element_definitions`'s outer loop, and following
        // it here would double-count (and could cycle through defines
        // that never bottom out at a plain element name).
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::relax::RelaxDatatype;

    #[test]
    fn group_empty_pattern_is_conjunction() {
        let a = PatternNode::text("a");
        let b = PatternNode::empty("b");
        let g = PatternNode::group(a, b, "g");
        assert!(g.has_empty_pattern);

        let c = PatternNode::not_allowed("c");
        let g2 = PatternNode::group(PatternNode::empty("e"), c, "g2");
        assert!(!g2.has_empty_pattern);
    }

    #[test]
    fn choice_empty_pattern_is_disjunction() {
        let a = PatternNode::not_allowed("a");
        let b = PatternNode::empty("b");
        let c = PatternNode::choice(a, b, "c");
        assert!(c.has_empty_pattern);
    }

    #[test]
    fn element_is_opaque_to_enclosing_scope() {
        let attr = PatternNode::attribute(NameClass::name("", "id"), PatternNode::text("t"), "attr");
        assert!(attr.has_attrs);
        let el = PatternNode::element(NameClass::name("", "foo"), attr, "el");
        assert!(!el.has_attrs);
        assert!(!el.has_empty_pattern);
    }

    #[test]
    fn ref_short_circuits_without_touching_define() {
        let define = Define::new("unresolved");
        // content is never patched -- if `reference` recursed into it,
        // this would panic.
        let r = PatternNode::reference(define, "r");
        assert!(!r.has_attrs);
        assert!(!r.has_empty_pattern);
    }

    #[test]
    fn cyclic_grammar_builds_via_placeholder_patching() {
        // <define name="x"><element name="x"><ref name="x"/></element></define>
        let define = Define::new("x");
        let inner_ref = PatternNode::reference(define.clone(), "ref");
        let element = PatternNode::element(NameClass::name("", "x"), inner_ref, "element");
        define.set_content(element.clone());

        assert!(Rc::ptr_eq(&define.content(), &element));
    }

    #[test]
    fn element_definitions_indexes_simple_names() {
        let mut defines = HashMap::new();
        let define = Define::new("x");
        let el = PatternNode::element(
            NameClass::name("urn:foo", "bar"),
            PatternNode::value(Rc::new(RelaxDatatype::String), "v".into(), String::new(), "value"),
            "element",
        );
        define.set_content(el);
        defines.insert("x".to_string(), define);

        let grammar = Grammar::new(PatternNode::not_allowed("start"), defines);
        assert!(grammar
            .element_definitions
            .contains_key(&("urn:foo".to_string(), "bar".to_string())));
    }
}

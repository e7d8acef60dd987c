//! Name classes: the set-of-expanded-names half of the pattern language.
//!
//! A name class is a (possibly unbounded) set of expanded names. The engine
//! never needs to enumerate a name class -- only to test membership and to
//! record which namespaces it references, for diagnostics and for the
//! `attribute with infinite name class must be inside oneOrMore` restriction
//! enforced upstream by the simplifier.

use std::collections::HashSet;

/// An expanded name: a namespace URI (empty string for "no namespace") paired
/// with a local name.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy)]
pub struct ExpandedName<'a> {
    pub namespace_uri: &'a str,
    pub local_name: &'a str,
}

impl<'a> ExpandedName<'a> {
    pub fn new(namespace_uri: &'a str, local_name: &'a str) -> Self {
        ExpandedName {
            namespace_uri,
            local_name,
        }
    }
}

/// Sentinel inserted into `record_namespaces` output when a name class
/// contains an unbounded wildcard.
pub const NS_WILDCARD: &str = "*";
/// Sentinel inserted when a name class contains an `except` clause.
pub const NS_EXCEPT: &str = "::except";

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum NameClass {
    Name {
        namespace_uri: String,
        local_name: String,
    },
    NsName {
        namespace_uri: String,
        except: Option<Box<NameClass>>,
    },
    AnyName {
        except: Option<Box<NameClass>>,
    },
    NameChoice {
        a: Box<NameClass>,
        b: Box<NameClass>,
    },
}

impl NameClass {
    pub fn name(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> NameClass {
        NameClass::Name {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
        }
    }

    /// True iff `self` is a `Name`, or a `NameChoice` of two simple name
    /// classes. Mirrors the simplifier's "simple name class" restriction
    /// (section 7.3 in the full Relax NG spec): only simple name classes are
    /// permitted outside `oneOrMore` for attributes.
    pub fn is_simple(&self) -> bool {
        match self {
            NameClass::Name { .. } => true,
            NameClass::NameChoice { a, b } => a.is_simple() && b.is_simple(),
            NameClass::NsName { .. } | NameClass::AnyName { .. } => false,
        }
    }

    /// True iff `name` is a member of this name class.
    pub fn matches(&self, name: ExpandedName<'_>) -> bool {
        match self {
            NameClass::Name {
                namespace_uri,
                local_name,
            } => namespace_uri == name.namespace_uri && local_name == name.local_name,
            NameClass::NsName {
                namespace_uri,
                except,
            } => {
                namespace_uri == name.namespace_uri
                    && !except.as_ref().is_some_and(|e| e.matches(name))
            }
            NameClass::AnyName { except } => !except.as_ref().is_some_and(|e| e.matches(name)),
            NameClass::NameChoice { a, b } => a.matches(name) || b.matches(name),
        }
    }

    /// Collects the namespace URIs this name class can match into `out`,
    /// for diagnostics such as "expected one of these namespaces".
    pub fn record_namespaces(&self, out: &mut HashSet<String>, is_element: bool) {
        match self {
            NameClass::Name { namespace_uri, .. } => {
                if !namespace_uri.is_empty() || is_element {
                    out.insert(namespace_uri.clone());
                }
            }
            NameClass::NsName {
                namespace_uri,
                except,
            } => {
                out.insert(namespace_uri.clone());
                if let Some(except) = except {
                    out.insert(NS_EXCEPT.to_string());
                    except.record_namespaces(out, is_element);
                }
            }
            NameClass::AnyName { except } => {
                out.insert(NS_WILDCARD.to_string());
                if let Some(except) = except {
                    out.insert(NS_EXCEPT.to_string());
                    except.record_namespaces(out, is_element);
                }
            }
            NameClass::NameChoice { a, b } => {
                a.record_namespaces(out, is_element);
                b.record_namespaces(out, is_element);
            }
        }
    }

    /// True if this name class can match infinitely many expanded names
    /// (used only by the simplifier's section 7.3 check; kept here because
    /// it's a pure property of the name class, not of the simplifier).
    pub fn is_infinite(&self) -> bool {
        match self {
            NameClass::Name { .. } => false,
            NameClass::NsName { .. } | NameClass::AnyName { .. } => true,
            NameClass::NameChoice { a, b } => a.is_infinite() || b.is_infinite(),
        }
    }

    /// A human-readable rendering, used by diagnostics and by
    /// `possible()` formatting in the validator crate.
    pub fn describe(&self) -> String {
        let mut s = String::new();
        self.describe_into(&mut s);
        s
    }

    fn describe_into(&self, out: &mut String) {
        match self {
            NameClass::Name { local_name, .. } => out.push_str(local_name),
            NameClass::NsName {
                namespace_uri,
                except,
            } => {
                out.push_str(namespace_uri);
                out.push_str(":*");
                if let Some(except) = except {
                    out.push('-');
                    except.describe_into(out);
                }
            }
            NameClass::AnyName { except } => {
                out.push('*');
                if let Some(except) = except {
                    out.push('-');
                    except.describe_into(out);
                }
            }
            NameClass::NameChoice { a, b } => {
                a.describe_into(out);
                out.push('|');
                b.describe_into(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name_matches_exact() {
        let nc = NameClass::name("", "html");
        assert!(nc.matches(ExpandedName::new("", "html")));
        assert!(!nc.matches(ExpandedName::new("", "head")));
        assert!(!nc.matches(ExpandedName::new("urn:x", "html")));
    }

    #[test]
    fn ns_name_except() {
        let nc = NameClass::NsName {
            namespace_uri: "urn:foo".to_string(),
            except: Some(Box::new(NameClass::name("urn:foo", "bar"))),
        };
        assert!(nc.matches(ExpandedName::new("urn:foo", "baz")));
        assert!(!nc.matches(ExpandedName::new("urn:foo", "bar")));
        assert!(!nc.matches(ExpandedName::new("urn:other", "baz")));
    }

    #[test]
    fn any_name_except() {
        let nc = NameClass::AnyName {
            except: Some(Box::new(NameClass::name("urn:foo", "bar"))),
        };
        assert!(nc.matches(ExpandedName::new("urn:anything", "x")));
        assert!(!nc.matches(ExpandedName::new("urn:foo", "bar")));
    }

    #[test]
    fn record_namespaces_sentinels() {
        let mut out = HashSet::new();
        NameClass::AnyName {
            except: Some(Box::new(NameClass::name("urn:foo", "bar"))),
        }
        .record_namespaces(&mut out, true);
        assert!(out.contains(NS_WILDCARD));
        assert!(out.contains(NS_EXCEPT));
        assert!(out.contains("urn:foo"));
    }

    #[test]
    fn simple_name_choice() {
        let nc = NameClass::NameChoice {
            a: Box::new(NameClass::name("", "a")),
            b: Box::new(NameClass::name("", "b")),
        };
        assert!(nc.is_simple());
        let not_simple = NameClass::NameChoice {
            a: Box::new(NameClass::name("", "a")),
            b: Box::new(NameClass::AnyName { except: None }),
        };
        assert!(!not_simple.is_simple());
    }
}

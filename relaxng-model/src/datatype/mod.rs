//! The datatype façade.
//!
//! The engine only ever calls through the `Datatype` trait: `disallows` for
//! `data` patterns, `equal` for `value` patterns, `allows_empty` for `Data`'s
//! `end()` with no text seen yet. A concrete library (here: the RELAX NG
//! builtin library plus a trimmed XSD library) is provided so the engine is
//! testable end to end, but callers may plug in any other implementation of
//! `Datatype` behind a `Registry`.

pub mod relax;
pub mod xsd;

use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Resolves namespace prefixes for datatypes (QName, NOTATION) that need
/// context to validate or compare a lexical value. Implemented by the name
/// resolver in `relaxng-validator`.
pub trait Namespaces {
    fn resolve(&self, prefix: &str) -> Option<&str>;
}

/// A datatype library identifier: the empty string denotes the RELAX NG
/// builtin library (`string`, `token`); any other string is a datatype
/// library URI, in practice always `xsd::NAMESPACE_URI`.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct DatatypeId {
    pub library: String,
    pub local_name: String,
}

impl DatatypeId {
    pub fn new(library: impl Into<String>, local_name: impl Into<String>) -> Self {
        DatatypeId {
            library: library.into(),
            local_name: local_name.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DatatypeError {
    #[error("unknown datatype library {0:?}")]
    UnknownLibrary(String),
    #[error("unknown datatype {0:?}")]
    UnknownDatatype(String),
    #[error("invalid parameter {name:?}={value:?} for datatype {datatype:?}: {reason}")]
    InvalidParameter {
        datatype: String,
        name: String,
        value: String,
        reason: String,
    },
}

/// The façade every pattern-tree `Data`/`Value` node calls through.
pub trait Datatype: fmt::Debug {
    /// True iff `value` is *not* an acceptable lexical value for this
    /// (possibly facet-constrained) datatype.
    fn disallows(&self, value: &str) -> bool;

    /// True iff `value` and `other` denote the same datatype value. The
    /// default compares canonical forms after checking both lex. Datatypes
    /// whose equality needs namespace context (QName) override this.
    fn equal(&self, value: &str, other: &str, _ctx: &dyn Namespaces) -> bool {
        !self.disallows(value) && !self.disallows(other) && self.canonical(value) == self.canonical(other)
    }

    /// Canonical form used by the default `equal`. Datatypes for which
    /// lexical equality already implies value equality (most string-derived
    /// types) can leave this as the identity after whitespace handling.
    fn canonical(&self, value: &str) -> String {
        value.to_string()
    }

    /// True iff the empty string is an acceptable value (used when a
    /// `data` pattern's content ends with no text event having been seen).
    fn allows_empty(&self) -> bool {
        !self.disallows("")
    }
}

/// Builds concrete `Datatype` implementations from a library+local name and
/// RELAX NG `<param>` elements (name/value pairs), the "parameter parsing"
/// responsibility of the L1 façade.
#[derive(Default)]
pub struct Registry;

impl Registry {
    pub fn build(
        &self,
        id: &DatatypeId,
        params: &[(String, String)],
    ) -> Result<Rc<dyn Datatype>, DatatypeError> {
        match id.library.as_str() {
            "" => relax::build(&id.local_name, params),
            xsd::NAMESPACE_URI => xsd::build(&id.local_name, params),
            other => Err(DatatypeError::UnknownLibrary(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoNamespaces;
    impl Namespaces for NoNamespaces {
        fn resolve(&self, _prefix: &str) -> Option<&str> {
            None
        }
    }

    #[test]
    fn registry_builds_builtin_string() {
        let reg = Registry::default();
        let dt = reg
            .build(&DatatypeId::new("", "string"), &[])
            .expect("string datatype");
        assert!(!dt.disallows("anything at all"));
        assert!(dt.equal("a", "a", &NoNamespaces));
        assert!(!dt.equal("a", "b", &NoNamespaces));
    }

    #[test]
    fn registry_rejects_unknown_library() {
        let reg = Registry::default();
        assert!(reg.build(&DatatypeId::new("urn:nonsense", "x"), &[]).is_err());
    }
}

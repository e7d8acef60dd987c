//! The RELAX NG builtin datatype library: `string` and `token`.
//!
//! Both builtin datatypes accept any lexical value; they differ only in
//! how two values compare equal.

use super::{Datatype, DatatypeError, Namespaces};
use std::rc::Rc;

/// Collapse runs of XML whitespace to single spaces and trim the ends, per
/// the `token` builtin datatype's whitespace facet (`collapse`).
pub fn normalize_whitespace(value: &str) -> String {
    value.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxDatatype {
    String,
    Token,
}

impl Datatype for RelaxDatatype {
    fn disallows(&self, _value: &str) -> bool {
        false
    }

    fn equal(&self, value: &str, other: &str, _ctx: &dyn Namespaces) -> bool {
        match self {
            RelaxDatatype::String => value == other,
            RelaxDatatype::Token => normalize_whitespace(value) == normalize_whitespace(other),
        }
    }

    fn canonical(&self, value: &str) -> String {
        match self {
            RelaxDatatype::String => value.to_string(),
            RelaxDatatype::Token => normalize_whitespace(value),
        }
    }
}

pub fn build(local_name: &str, _params: &[(String, String)]) -> Result<Rc<dyn Datatype>, DatatypeError> {
    match local_name {
        "string" => Ok(Rc::new(RelaxDatatype::String)),
        "token" => Ok(Rc::new(RelaxDatatype::Token)),
        other => Err(DatatypeError::UnknownDatatype(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoNs;
    impl Namespaces for NoNs {
        fn resolve(&self, _prefix: &str) -> Option<&str> {
            None
        }
    }

    #[test]
    fn token_normalizes_whitespace_for_equality() {
        let t = RelaxDatatype::Token;
        assert!(t.equal("  a   b ", "a b", &NoNs));
        assert!(!RelaxDatatype::String.equal("  a   b ", "a b", &NoNs));
    }
}

//! The validator's error taxonomy.
//!
//! Every variant carries the expanded names involved, so a caller can
//! format the error with or without namespace substitutions (swap in
//! prefixes via `GrammarWalker::unresolve_name`) without the engine itself
//! knowing about display concerns.

use relaxng_model::ExpandedName;
use thiserror::Error;

/// An expanded name detached from its borrow, for carrying inside an owned
/// error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub namespace_uri: String,
    pub local_name: String,
}

impl Name {
    pub fn new(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Name {
        Name {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
        }
    }
}

impl From<ExpandedName<'_>> for Name {
    fn from(n: ExpandedName<'_>) -> Self {
        Name::new(n.namespace_uri, n.local_name)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace_uri.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

fn join_names(names: &[Name]) -> String {
    names
        .iter()
        .map(Name::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{message}: {}", join_names(.names))]
    ElementName { message: String, names: Vec<Name> },

    #[error("{message}: {}", join_names(.names))]
    AttributeName { message: String, names: Vec<Name> },

    #[error("{message}: {}", join_names(.names))]
    AttributeValue { message: String, names: Vec<Name> },

    #[error("must choose either {} or {}", join_names(.names_a), join_names(.names_b))]
    Choice { names_a: Vec<Name>, names_b: Vec<Name> },

    #[error("{0}")]
    Validation(String),
}

impl ValidationError {
    pub fn element_name(message: impl Into<String>, names: Vec<Name>) -> ValidationError {
        ValidationError::ElementName {
            message: message.into(),
            names,
        }
    }

    pub fn attribute_name(message: impl Into<String>, names: Vec<Name>) -> ValidationError {
        ValidationError::AttributeName {
            message: message.into(),
            names,
        }
    }

    pub fn attribute_value(message: impl Into<String>, names: Vec<Name>) -> ValidationError {
        ValidationError::AttributeValue {
            message: message.into(),
            names,
        }
    }

    pub fn validation(message: impl Into<String>) -> ValidationError {
        ValidationError::Validation(message.into())
    }
}

//! Errors raised while building a `Grammar` from a compact schema.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unsupported schema version {0} (only version 3 is understood)")]
    UnsupportedVersion(i64),

    #[error("malformed schema: {0}")]
    Malformed(String),

    #[error("unresolved references: {0:?}")]
    UnresolvedReference(Vec<String>),

    #[error(transparent)]
    Datatype(#[from] crate::datatype::DatatypeError),
}

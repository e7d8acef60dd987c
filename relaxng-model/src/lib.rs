//! `relaxng-model`: the L1/L2 layers of the incremental validation engine --
//! name classes and the datatype façade (L1), and the immutable pattern
//! tree plus the compact schema loader (L2). See `relaxng-validator` for
//! the mutable, event-driven walker layers (L3/L4) that traverse the
//! `Grammar` this crate builds.

pub mod datatype;
pub mod error;
pub mod name_class;
pub mod pattern;
pub mod schema;

pub use error::SchemaError;
pub use name_class::{ExpandedName, NameClass};
pub use pattern::{Define, Grammar, PatternKind, PatternNode};
pub use schema::load;

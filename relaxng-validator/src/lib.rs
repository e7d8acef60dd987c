//! `relaxng-validator`: the L3/L4 layers of the incremental validation
//! engine -- one walker per pattern kind (`walker`), and the top-level
//! driver that threads a document's event stream through the grammar while
//! owning namespace resolution, misplaced-element recovery and whitespace
//! suspension (`grammar_walker`). Builds on the immutable `Grammar` from
//! `relaxng-model`.

pub mod error;
pub mod event;
pub mod grammar_walker;
pub mod name_resolver;
pub mod walker;

pub use error::{Name, ValidationError};
pub use event::Event;
pub use grammar_walker::GrammarWalker;
pub use name_resolver::NameResolver;
pub use walker::{EndResult, FireResult, Walker};

//! Pipeline data model
//!
//! The context threaded between plan steps is an explicit tagged union;
//! each library function declares which variants it accepts and produces.

pub mod context;
pub mod table;

pub use context::{Context, ContextKind, Envelope, Rendered};
pub use table::{Row, Table};

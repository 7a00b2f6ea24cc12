//! Streaming parser for indentation-structured object files
//!
//! ```text
//! E-List
//!   Employee
//!     id: 1
//!     name: Ann
//!     Department
//!       id: 10
//!       name: Sales
//! ```
//!
//! [`line`] classifies single lines, [`ObjectFileParser`] turns the line
//! stream from a [`LineSource`] into [`CompositeNode`]s and hands each one to
//! a [`NodeHandler`] when its block closes.

pub mod line;
pub mod node;
pub mod parser;
pub mod source;

pub use line::{classify, Classified, LineKind};
pub use node::CompositeNode;
pub use parser::{parse_str, NodeHandler, ObjectFileParser, ParseSummary, TreeCollector, DEFAULT_INDENT_UNIT};
pub use source::{LineSource, SuspendGate, DEFAULT_READ_AHEAD};

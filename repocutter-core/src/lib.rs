//! Repocutter Core Library
//!
//! Stream surgery on Subversion dumpfiles:
//! - Byte-accurate line/blob source and header-section type
//! - Property block codec and mergeinfo range algebra
//! - One-pass dump engine with pluggable command hooks
//! - The transformation commands built on those hooks

pub mod commands;
pub mod engine;
pub mod error;
pub mod logmsg;
pub mod mergeinfo;
pub mod properties;
pub mod range;
pub mod section;
pub mod source;
pub mod state;

pub use engine::{Context, DumpEngine, Node, PassThrough, PropVerdict, Surgeon};
pub use error::{DumpError, Result};
pub use mergeinfo::{MergeRange, MergeRanges};
pub use properties::Properties;
pub use range::SelectionRange;
pub use section::{NodeAction, NodeKind, Section};
pub use source::LineSource;
pub use state::{DirTracker, EmittedRevisions, WildcardTable};

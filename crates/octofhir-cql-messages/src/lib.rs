//! CQL execution messages
//!
//! The evaluation engine reports trace output, `Message()` operator calls,
//! warnings and errors through a [`MessageListener`]. This crate defines that
//! listener contract and [`MessageSink`], a listener that keeps every message
//! it receives so callers can inspect them after evaluation.

mod message;
mod severity;
mod sink;

pub use message::*;
pub use severity::*;
pub use sink::*;

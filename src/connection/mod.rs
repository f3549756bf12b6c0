// src/connection/mod.rs

//! Per-connection plumbing: a reader task that feeds the hub, a writer task
//! that drains the connection's outbox, and the guard that reports closure.

// Declare the private sub-modules of the `connection` module.
mod guard;
mod reader;
mod writer;

pub use guard::ConnectionGuard;
pub use reader::{ReaderContext, run as run_reader};
pub use writer::run as run_writer;

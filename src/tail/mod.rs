// src/tail/mod.rs

//! Tail reading: startup seeding and line reassembly.
//!
//! - [`seed`] computes the byte offset from which "last N lines" replay
//!   starts, for seekable files and for pipe-like sources.
//! - [`lines`] reassembles raw reads into complete, newline-terminated
//!   records regardless of where the read boundaries fell.

pub mod lines;
pub mod seed;

pub use lines::LineSplitter;
pub use seed::{DEFAULT_LINE_GUESS, PipeTail, pipe_tail, seek_start_offset};

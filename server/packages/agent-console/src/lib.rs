//! Process orchestration for browser-driven coding-assistant CLI sessions.
//!
//! One invocation spawns a provider CLI in print mode, demultiplexes its
//! newline-delimited JSON stdout into canonical browser events, discovers the
//! provider session id mid-stream, and tears the process down from either a
//! natural exit or an abort.

pub mod cli;
pub mod command;
pub mod images;
pub mod launcher;
pub mod registry;
pub mod request;
pub mod runner;
pub mod session;
pub mod stream;
pub mod transport;

//! CLI module
//!
//! - `args`: command-line definitions
//! - `console`: line input behind a trait so the loop can be scripted
//! - `repl`: the task/confirm/execute loop

pub mod args;
pub mod console;
pub mod repl;

pub use args::Cli;
pub use console::{Console, StdinConsole};
pub use repl::{Assistant, LoopState, Repl, TurnOutcome};

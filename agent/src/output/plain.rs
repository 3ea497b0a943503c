//! Plain text output for pipes and CI environments
//!
//! No colors or special formatting - just clean text output.

use std::io::{self, Write};

use super::{format_args, truncate, OutputEvent, OutputWriter};

/// Plain text output writer (no colors)
#[derive(Default)]
pub struct PlainOutput {
    /// Whether to show verbose output
    verbose: bool,
}

impl PlainOutput {
    /// Create a new plain output writer
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl OutputWriter for PlainOutput {
    fn write(&self, event: OutputEvent) {
        match event {
            OutputEvent::Text(text) => {
                println!("{}", text);
            }

            OutputEvent::Reply(text) => {
                println!("Assistant: {}", text);
            }

            OutputEvent::ToolStart { name, arguments } => {
                let args_str = format_args(&arguments);
                if args_str.is_empty() {
                    eprintln!("  -> {}", name);
                } else {
                    eprintln!("  -> {} {}", name, args_str);
                }
            }

            OutputEvent::ToolComplete {
                name,
                result,
                duration,
                is_error,
            } => {
                let status = if is_error { "FAIL" } else { "OK" };
                let time = format!("({}ms)", duration.as_millis());

                if self.verbose || is_error {
                    eprintln!("  {} {} {} {}", status, name, time, truncate(&result, 100));
                } else {
                    eprintln!("  {} {} {}", status, name, time);
                }
            }

            OutputEvent::Status(msg) => {
                eprintln!("  {}", msg);
            }

            OutputEvent::Error(msg) => {
                eprintln!("Error: {}", msg);
            }

            OutputEvent::System(msg) => {
                eprintln!("{}", msg);
            }

            OutputEvent::NewLine => {
                println!();
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_creation() {
        let output = PlainOutput::new();
        assert!(!output.verbose);

        let output = PlainOutput::new().with_verbose(true);
        assert!(output.verbose);
        assert!(!output.supports_colors());
    }
}

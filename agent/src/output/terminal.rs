//! Terminal output with ANSI colors

use std::io::{self, Write};

use super::{format_args, truncate, OutputEvent, OutputWriter};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";

/// Terminal output writer with colors
pub struct TerminalOutput {
    use_colors: bool,
    verbose: bool,
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
        }
    }

    pub fn without_colors() -> Self {
        Self {
            use_colors: false,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn styled(&self, codes: &[&str], text: &str) -> String {
        if self.use_colors {
            let prefix: String = codes.iter().copied().collect();
            format!("{}{}{}", prefix, text, RESET)
        } else {
            text.to_string()
        }
    }

    /// Render an event as `(to_stderr, line)`
    fn render(&self, event: OutputEvent) -> (bool, String) {
        match event {
            OutputEvent::Text(text) => (false, text),

            OutputEvent::Reply(text) => (
                false,
                format!("{} {}", self.styled(&[BOLD, GREEN], "Assistant:"), text),
            ),

            OutputEvent::ToolStart { name, arguments } => {
                let tool_name = self.styled(&[BOLD, CYAN], &name);
                let args_str = format_args(&arguments);
                let arrow = self.color(GRAY, "→");
                if args_str.is_empty() {
                    (true, format!("  {} {}", arrow, tool_name))
                } else {
                    (
                        true,
                        format!("  {} {} {}", arrow, tool_name, self.color(GRAY, &args_str)),
                    )
                }
            }

            OutputEvent::ToolComplete {
                name,
                result,
                duration,
                is_error,
            } => {
                let status = if is_error {
                    self.color(RED, "✗")
                } else {
                    self.color(GREEN, "✓")
                };
                let time = self.color(GRAY, &format!("({}ms)", duration.as_millis()));

                if self.verbose || is_error {
                    let preview = truncate(&result, 100);
                    let preview = self.color(if is_error { RED } else { GRAY }, &preview);
                    (true, format!("  {} {} {} {}", status, name, time, preview))
                } else {
                    (true, format!("  {} {} {}", status, name, time))
                }
            }

            OutputEvent::Status(msg) => (true, self.color(GRAY, &format!("  {}", msg))),

            OutputEvent::Error(msg) => (
                true,
                format!(
                    "{} {}",
                    self.styled(&[BOLD, RED], "Error:"),
                    self.color(RED, &msg)
                ),
            ),

            OutputEvent::System(msg) => (true, self.color(GRAY, &msg)),

            OutputEvent::NewLine => (false, String::new()),
        }
    }
}

impl OutputWriter for TerminalOutput {
    fn write(&self, event: OutputEvent) {
        match self.render(event) {
            (true, line) => eprintln!("{}", line),
            (false, line) => println!("{}", line),
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }

    fn supports_colors(&self) -> bool {
        self.use_colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_color_formatting() {
        let output = TerminalOutput::new();
        let colored = output.color(RED, "test");
        assert!(colored.starts_with("\x1b[31m"));
        assert!(colored.ends_with("\x1b[0m"));

        let output = TerminalOutput::without_colors();
        assert_eq!(output.color(RED, "test"), "test");
        assert!(!output.supports_colors());
    }

    #[test]
    fn test_reply_goes_to_stdout() {
        let output = TerminalOutput::without_colors();
        let (stderr, line) = output.render(OutputEvent::Reply("3 tables".to_string()));
        assert!(!stderr);
        assert_eq!(line, "Assistant: 3 tables");
    }

    #[test]
    fn test_tool_lines_go_to_stderr() {
        let output = TerminalOutput::without_colors();
        let (stderr, line) = output.render(OutputEvent::ToolStart {
            name: "run_sql".to_string(),
            arguments: serde_json::json!({"sql_query": "SELECT 1"}),
        });
        assert!(stderr);
        assert!(line.contains("run_sql"));
        assert!(line.contains("SELECT 1"));

        let (_, line) = output.render(OutputEvent::ToolComplete {
            name: "run_sql".to_string(),
            result: "no such table".to_string(),
            duration: Duration::from_millis(12),
            is_error: true,
        });
        assert!(line.contains("(12ms)"));
        assert!(line.contains("no such table"));
    }

    #[test]
    fn test_result_preview_hidden_unless_verbose() {
        let event = OutputEvent::ToolComplete {
            name: "list_tables".to_string(),
            result: "{\"tableList\":[]}".to_string(),
            duration: Duration::from_millis(1),
            is_error: false,
        };

        let (_, quiet) = TerminalOutput::without_colors().render(event.clone());
        assert!(!quiet.contains("tableList"));

        let (_, verbose) = TerminalOutput::without_colors()
            .with_verbose(true)
            .render(event);
        assert!(verbose.contains("tableList"));
    }
}

//! REPL (Read-Eval-Print Loop) for interactive use
//!
//! Free-form lines go straight to the agent. The `task` command runs a
//! small state machine instead: the description is turned into a
//! [`TaskRequest`], shown to the user, and only executed after an explicit
//! `y`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::console::Console;
use crate::agent::Agent;
use crate::error::AgentResult;
use crate::output::{OutputEvent, OutputWriter};
use crate::task::TaskRequest;

const RETRY_HINT: &str = "Please try again or type 'exit' to quit.";
const CONFIRM_PROMPT: &str = "Do you want to proceed with this task? (y/n) ";

/// What the loop needs from the agent
#[async_trait]
pub trait Assistant: Send {
    /// One agent call with tools
    async fn chat(&mut self, message: &str) -> AgentResult<String>;

    /// Structured extraction of a task from a description
    async fn extract_task(&mut self, description: &str) -> AgentResult<TaskRequest>;
}

#[async_trait]
impl Assistant for Agent {
    async fn chat(&mut self, message: &str) -> AgentResult<String> {
        Agent::chat(self, message).await
    }

    async fn extract_task(&mut self, description: &str) -> AgentResult<TaskRequest> {
        Agent::extract_task(self, description).await
    }
}

#[async_trait]
impl<T: Assistant + ?Sized> Assistant for &mut T {
    async fn chat(&mut self, message: &str) -> AgentResult<String> {
        (**self).chat(message).await
    }

    async fn extract_task(&mut self, description: &str) -> AgentResult<TaskRequest> {
        (**self).extract_task(description).await
    }
}

/// Loop states
///
/// `original` is the description the user typed; it is executed when the
/// extracted task carries none.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Idle,
    ExtractingTask(String),
    AwaitingConfirmation { task: TaskRequest, original: String },
    ExecutingTask { task: TaskRequest, original: String },
    FreeForm(String),
    Terminating,
}

/// How one pass from `Idle` back to `Idle` ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing was entered
    Empty,
    /// The agent answered
    Answered,
    /// The user declined the extracted task
    Discarded,
    /// An agent error was shown to the user
    Failed,
    /// Exit requested or input closed
    Exit,
}

/// Interactive loop over a [`Console`] and an [`Assistant`]
pub struct Repl<A, C> {
    assistant: A,
    console: C,
    output: Arc<dyn OutputWriter>,
}

impl<A: Assistant, C: Console> Repl<A, C> {
    pub fn new(assistant: A, console: C, output: Arc<dyn OutputWriter>) -> Self {
        Self {
            assistant,
            console,
            output,
        }
    }

    pub fn assistant(&self) -> &A {
        &self.assistant
    }

    /// Run until exit or end of input
    ///
    /// Agent failures are shown and the loop continues; console errors are
    /// returned.
    pub async fn run(&mut self) -> Result<()> {
        self.output.write(OutputEvent::System(
            "Database agent. Chat naturally, type 'task' for a structured task, 'exit' to quit."
                .to_string(),
        ));

        while self.turn().await? != TurnOutcome::Exit {}

        self.output.write(OutputEvent::Text("Goodbye!".to_string()));
        Ok(())
    }

    /// Drive the state machine from `Idle` until it returns to `Idle` or
    /// terminates
    pub async fn turn(&mut self) -> Result<TurnOutcome> {
        let mut state = LoopState::Idle;
        let mut outcome = TurnOutcome::Empty;
        let mut started = false;

        loop {
            state = match state {
                LoopState::Idle if started => return Ok(outcome),
                LoopState::Idle => {
                    started = true;
                    match self.read_command().await? {
                        Some(next) => next,
                        None => return Ok(TurnOutcome::Empty),
                    }
                }
                LoopState::Terminating => return Ok(TurnOutcome::Exit),
                LoopState::ExtractingTask(description) => {
                    match self.assistant.extract_task(&description).await {
                        Ok(task) => LoopState::AwaitingConfirmation {
                            task,
                            original: description,
                        },
                        Err(e) => {
                            self.report(&e.to_string());
                            outcome = TurnOutcome::Failed;
                            LoopState::Idle
                        }
                    }
                }
                LoopState::AwaitingConfirmation { task, original } => {
                    self.output.write(OutputEvent::NewLine);
                    self.output
                        .write(OutputEvent::Text("Task Analysis:".to_string()));
                    for line in task.summary() {
                        self.output.write(OutputEvent::Text(line));
                    }
                    self.output.flush();

                    match self.console.read_line(CONFIRM_PROMPT).await? {
                        None => LoopState::Terminating,
                        Some(answer) if is_confirmation(&answer) => {
                            LoopState::ExecutingTask { task, original }
                        }
                        Some(_) => {
                            tracing::info!("Task discarded by user");
                            self.output
                                .write(OutputEvent::Status("Task discarded.".to_string()));
                            outcome = TurnOutcome::Discarded;
                            LoopState::Idle
                        }
                    }
                }
                LoopState::ExecutingTask { task, original } => {
                    let description = task.description.unwrap_or(original);
                    let message = format!("Execute the following task: {}", description);
                    outcome = self.ask(&message).await;
                    LoopState::Idle
                }
                LoopState::FreeForm(input) => {
                    outcome = self.ask(&input).await;
                    LoopState::Idle
                }
            };
        }
    }

    /// Read one line in `Idle`; `None` for a blank line
    async fn read_command(&mut self) -> Result<Option<LoopState>> {
        self.output.write(OutputEvent::NewLine);
        self.output.flush();
        let Some(line) = self.console.read_line("You: ").await? else {
            return Ok(Some(LoopState::Terminating));
        };

        let input = line.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let command = input.to_lowercase();
        if command == "exit" || command == "quit" {
            return Ok(Some(LoopState::Terminating));
        }

        if command == "task" {
            self.output
                .write(OutputEvent::Status("Creating structured task...".to_string()));
            self.output.flush();
            return Ok(Some(match self.console.read_line("Describe your task: ").await? {
                Some(description) => LoopState::ExtractingTask(description.trim().to_string()),
                None => LoopState::Terminating,
            }));
        }

        Ok(Some(LoopState::FreeForm(input.to_string())))
    }

    async fn ask(&mut self, message: &str) -> TurnOutcome {
        match self.assistant.chat(message).await {
            Ok(response) => {
                self.output.write(OutputEvent::Reply(response));
                TurnOutcome::Answered
            }
            Err(e) => {
                self.report(&e.to_string());
                TurnOutcome::Failed
            }
        }
    }

    fn report(&self, message: &str) {
        tracing::warn!("Turn failed: {}", message);
        self.output.write(OutputEvent::Error(message.to_string()));
        self.output.write(OutputEvent::Text(RETRY_HINT.to_string()));
    }
}

/// Only a lone `y` (any case, surrounding whitespace ignored) confirms
pub fn is_confirmation(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::output::tests::RecordingOutput;
    use std::collections::VecDeque;

    /// Console replaying fixed lines, then end of input
    #[derive(Default)]
    struct ScriptedConsole {
        lines: VecDeque<String>,
        prompts: Vec<String>,
    }

    impl ScriptedConsole {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                prompts: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Console for ScriptedConsole {
        async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
            self.prompts.push(prompt.to_string());
            Ok(self.lines.pop_front())
        }
    }

    /// Assistant recording every agent call
    #[derive(Default)]
    struct FakeAssistant {
        chats: Vec<String>,
        extractions: Vec<String>,
        fail_extraction: bool,
        drop_description: bool,
    }

    #[async_trait]
    impl Assistant for FakeAssistant {
        async fn chat(&mut self, message: &str) -> AgentResult<String> {
            self.chats.push(message.to_string());
            Ok(format!("done: {}", message))
        }

        async fn extract_task(&mut self, description: &str) -> AgentResult<TaskRequest> {
            self.extractions.push(description.to_string());
            if self.fail_extraction {
                return Err(AgentError::Extraction("expected value at line 1".into()));
            }
            Ok(TaskRequest {
                task_type: Some("report".into()),
                description: (!self.drop_description).then(|| description.to_string()),
                priority: None,
            })
        }
    }

    fn harness(
        assistant: FakeAssistant,
        lines: &[&str],
    ) -> (Repl<FakeAssistant, ScriptedConsole>, RecordingOutput) {
        let output = RecordingOutput::default();
        let repl = Repl::new(
            assistant,
            ScriptedConsole::new(lines),
            Arc::new(output.clone()),
        );
        (repl, output)
    }

    #[tokio::test]
    async fn declined_task_is_never_executed() {
        let (mut repl, output) = harness(FakeAssistant::default(), &["task", "send weekly report", "n"]);

        assert_eq!(repl.turn().await.unwrap(), TurnOutcome::Discarded);
        assert_eq!(repl.assistant().extractions, vec!["send weekly report"]);
        assert!(repl.assistant().chats.is_empty());

        let texts = output.texts();
        assert!(texts.contains(&"• Priority: low".to_string()));
        assert!(texts.contains(&"• Type: report".to_string()));
        assert!(repl.console.prompts.contains(&"Describe your task: ".to_string()));
        assert!(repl.console.prompts.contains(&CONFIRM_PROMPT.to_string()));
    }

    #[tokio::test]
    async fn confirmed_task_executes_once() {
        let (mut repl, output) = harness(FakeAssistant::default(), &["TASK", "count orders", " Y "]);

        assert_eq!(repl.turn().await.unwrap(), TurnOutcome::Answered);
        assert_eq!(
            repl.assistant().chats,
            vec!["Execute the following task: count orders"]
        );
        assert!(output
            .events()
            .contains(&OutputEvent::Reply("done: Execute the following task: count orders".into())));
    }

    #[tokio::test]
    async fn only_a_lone_y_confirms() {
        for answer in ["yes", "", "n", "yy", "ok"] {
            let (mut repl, _) = harness(FakeAssistant::default(), &["task", "x", answer]);
            assert_eq!(repl.turn().await.unwrap(), TurnOutcome::Discarded, "{answer:?}");
            assert!(repl.assistant().chats.is_empty());
        }
        assert!(is_confirmation("y"));
        assert!(is_confirmation("\tY\n"));
    }

    #[tokio::test]
    async fn missing_description_falls_back_to_input() {
        let assistant = FakeAssistant {
            drop_description: true,
            ..Default::default()
        };
        let (mut repl, _) = harness(assistant, &["task", "archive old orders", "y"]);

        repl.turn().await.unwrap();
        assert_eq!(
            repl.assistant().chats,
            vec!["Execute the following task: archive old orders"]
        );
    }

    #[tokio::test]
    async fn extraction_error_returns_to_idle() {
        let assistant = FakeAssistant {
            fail_extraction: true,
            ..Default::default()
        };
        let (mut repl, output) = harness(assistant, &["task", "???", "how many orders?"]);

        assert_eq!(repl.turn().await.unwrap(), TurnOutcome::Failed);
        assert!(output.texts().contains(&RETRY_HINT.to_string()));
        assert!(output
            .events()
            .iter()
            .any(|e| matches!(e, OutputEvent::Error(msg) if msg.contains("expected value"))));

        // the loop is usable again
        assert_eq!(repl.turn().await.unwrap(), TurnOutcome::Answered);
        assert_eq!(repl.assistant().chats, vec!["how many orders?"]);
    }

    #[tokio::test]
    async fn free_form_and_exit() {
        let (mut repl, _) = harness(FakeAssistant::default(), &["  list the tables ", "", "Quit"]);

        repl.run().await.unwrap();
        assert_eq!(repl.assistant().chats, vec!["list the tables"]);
    }

    #[tokio::test]
    async fn end_of_input_terminates() {
        let (mut repl, _) = harness(FakeAssistant::default(), &[]);
        assert_eq!(repl.turn().await.unwrap(), TurnOutcome::Exit);

        let (mut repl, _) = harness(FakeAssistant::default(), &["task", "x"]);
        assert_eq!(repl.turn().await.unwrap(), TurnOutcome::Exit);
        assert!(repl.assistant().chats.is_empty());
    }
}

//! Command-name dispatch for one entrypoint.
//!
//! A router owns an ordered list of [`CommandSpec`]s. The first argument
//! selects a command (the configured fallback when absent); the rest are
//! handed to its handler. Unknown names print the usage block to stderr and
//! fail with `UnknownCommand`.

use crate::error::{Result, SeedError};
use crate::probe::ToolAvailability;
use crate::session::Session;
use crate::workflow::{Workflow, WorkflowState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type HandlerFn = Box<dyn Fn(&Session, &[String]) -> Result<StepReport>>;

// ---------------------------------------------------------------------------
// StepReport / Warning
// ---------------------------------------------------------------------------

/// A non-fatal condition surfaced by a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: String,
    pub tool: String,
    pub reason: String,
}

impl Warning {
    pub const UNAVAILABLE: &'static str = "collaborator_unavailable";

    pub fn unavailable(tool: &ToolAvailability) -> Self {
        Self {
            kind: Self::UNAVAILABLE.to_string(),
            tool: tool.tool.clone(),
            reason: tool.reason(),
        }
    }
}

/// What a successful handler produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub artifacts: Vec<PathBuf>,
    pub warnings: Vec<Warning>,
}

impl StepReport {
    pub fn artifact(path: PathBuf) -> Self {
        Self {
            artifacts: vec![path],
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: Warning) -> Self {
        self.warnings.push(warning);
        self
    }
}

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

enum Action {
    Handler(HandlerFn),
    Workflow(Vec<String>),
    Usage,
}

pub struct CommandSpec {
    pub name: String,
    pub help: String,
    action: Action,
}

impl CommandSpec {
    /// Step names when this command is a workflow.
    pub fn steps(&self) -> Option<&[String]> {
        match &self.action {
            Action::Workflow(steps) => Some(steps),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRouter
// ---------------------------------------------------------------------------

pub struct CommandRouter {
    program: String,
    fallback: String,
    commands: Vec<CommandSpec>,
}

impl CommandRouter {
    /// `program` is shown in usage text; `fallback` runs when no command
    /// name is given.
    pub fn new(program: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            fallback: fallback.into(),
            commands: Vec::new(),
        }
    }

    pub fn command(
        self,
        name: &str,
        help: &str,
        handler: impl Fn(&Session, &[String]) -> Result<StepReport> + 'static,
    ) -> Self {
        self.register(name, help, Action::Handler(Box::new(handler)))
    }

    /// Register `name` as a fixed sequence of already-registered commands.
    pub fn workflow(self, name: &str, help: &str, steps: &[&str]) -> Self {
        for step in steps {
            assert!(
                self.find(step).is_some(),
                "workflow '{name}' references unregistered command '{step}'"
            );
        }
        let steps = steps.iter().map(|s| s.to_string()).collect();
        self.register(name, help, Action::Workflow(steps))
    }

    /// Register the built-in `help` command.
    pub fn with_help(self) -> Self {
        self.register("help", "Show this command list", Action::Usage)
    }

    fn register(mut self, name: &str, help: &str, action: Action) -> Self {
        assert!(
            self.find(name).is_none(),
            "command '{name}' registered twice for '{}'",
            self.program
        );
        self.commands.push(CommandSpec {
            name: name.to_string(),
            help: help.to_string(),
            action,
        });
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.name.as_str())
    }

    /// Usage block listing every registered command.
    pub fn usage(&self) -> String {
        let width = self.commands.iter().map(|c| c.name.len()).max().unwrap_or(0);
        let names: Vec<&str> = self.names().collect();
        let mut out = format!("Usage: {} <{}>\n\nCommands:\n", self.program, names.join("|"));
        for c in &self.commands {
            out.push_str(&format!("  {:<width$}  {}\n", c.name, c.help));
        }
        out.push_str(&format!("\nDefault command: {}\n", self.fallback));
        out
    }

    /// Route `args` (command name first) to a handler.
    pub fn dispatch(&self, session: &Session, args: &[String]) -> Result<StepReport> {
        let (name, rest) = match args.split_first() {
            Some((name, rest)) => (name.as_str(), rest),
            None => (self.fallback.as_str(), &[][..]),
        };
        if self.find(name).is_none() {
            eprint!("{}", self.usage());
            return Err(SeedError::UnknownCommand(name.to_string()));
        }
        self.invoke(name, session, rest)
    }

    /// Run a registered command by name.
    pub fn invoke(&self, name: &str, session: &Session, args: &[String]) -> Result<StepReport> {
        let spec = self
            .find(name)
            .ok_or_else(|| SeedError::UnknownCommand(name.to_string()))?;
        tracing::debug!(program = %self.program, command = name, "dispatch");

        match &spec.action {
            Action::Handler(handler) => handler(session, args),
            Action::Usage => {
                print!("{}", self.usage());
                Ok(StepReport::default())
            }
            Action::Workflow(steps) => {
                let workflow = Workflow::new(&spec.name, steps.clone());
                let report = workflow.run(self, session)?;
                if session.json {
                    let json = serde_json::to_string_pretty(&report)
                        .map_err(|e| SeedError::Serialization(e.to_string()))?;
                    println!("{json}");
                } else {
                    println!("{}", report.summary());
                }

                if let WorkflowState::Aborted {
                    step,
                    name,
                    cause,
                    exit_code,
                    ..
                } = &report.state
                {
                    return Err(SeedError::WorkflowAborted {
                        workflow: format!("{} {}", self.program, spec.name),
                        index: *step,
                        step: name.clone(),
                        cause: cause.clone(),
                        exit_code: *exit_code,
                    });
                }
                Ok(StepReport {
                    artifacts: vec![report.artifact.clone()],
                    warnings: report.warnings.clone(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

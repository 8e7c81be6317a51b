use crate::builtin::builtin_factories;
use crate::command::{CommandFactory, ExecutionResult};
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::error::{SchemaError, ShellError};
use crate::execution::{ExecutionBuilder, Invocation};
use crate::runner::{ExecutionRunner, Interrupt};
use log::{debug, info};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Read, Write};

/// A shell-like interpreter over a registry of schema-described commands.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`]
/// objects that lines are resolved against. A line may chain commands with
/// `;`, `&&`, `||` and `|`, and redirect with `<`, `>` and `>>`.
///
/// Example
/// ```
/// use aesh::Interpreter;
/// use aesh::command::ExecutionResult;
///
/// let mut sh = Interpreter::with_builtins().unwrap();
/// let mut out = Vec::new();
/// let result = sh
///     .execute_line("echo hello world | wc", &mut std::io::empty(), &mut out)
///     .unwrap();
/// assert_eq!(result, Some(ExecutionResult::Success));
/// assert_eq!(String::from_utf8(out).unwrap(), "1 2 12\n");
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    config: ShellConfig,
    interrupt: Interrupt,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
            config: ShellConfig::default(),
            interrupt: Interrupt::new(),
        }
    }

    /// Interpreter with `pwd`, `cd`, `exit`, `echo`, `cat`, `wc` and `grep`.
    pub fn with_builtins() -> Result<Self, SchemaError> {
        Ok(Self::new(builtin_factories()?))
    }

    pub fn with_config(mut self, config: ShellConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Add a command. It shadows any earlier command with the same name.
    pub fn register(&mut self, factory: Box<dyn CommandFactory>) {
        self.commands.push(factory);
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Handle that abandons the rest of the running line when triggered,
    /// e.g. from a signal handler thread.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Run one line with the given terminal streams.
    ///
    /// Line-level problems (syntax errors, unknown commands, parser errors
    /// when `abort_on_parse_errors` is set, interrupts) are written to `stdout`
    /// and returned as `Err`. Otherwise the result of the last command that
    /// ran is returned, `None` when nothing ran.
    pub fn execute_line(
        &mut self,
        line: &str,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
    ) -> Result<Option<ExecutionResult>, ShellError> {
        self.interrupt.reset();

        let executions = match ExecutionBuilder::new(&self.commands, &self.env).build(line) {
            Ok(executions) => executions,
            Err(err) => {
                writeln!(stdout, "{err}")?;
                return Err(err);
            }
        };

        if self.config.settings.abort_on_parse_errors
            && executions.iter().any(|e| e.is_rejected())
        {
            let mut first = None;
            for execution in executions {
                if let Invocation::Rejected(err) = execution.invocation {
                    writeln!(stdout, "{err}")?;
                    first.get_or_insert(err);
                }
            }
            debug!("line rejected before running anything");
            return match first {
                Some(err) => Err(err),
                None => Ok(None),
            };
        }

        ExecutionRunner::new(&mut self.env, stdin, stdout, self.interrupt.clone()).run(executions)
    }

    /// Run one line against the process's standard input and output.
    pub fn run_line(&mut self, line: &str) -> Result<Option<ExecutionResult>, ShellError> {
        let mut stdin = io::stdin().lock();
        let mut stdout = io::stdout().lock();
        self.execute_line(line, &mut stdin, &mut stdout)
    }

    /// Read-Eval-Print Loop until `exit`, Ctrl-D or a terminal error.
    ///
    /// Ctrl-C at the prompt discards the current line.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        while !self.env.should_exit {
            match rl.readline(&self.config.settings.prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    if let Err(err) = self.run_line(&line) {
                        debug!("line failed: {err}");
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        info!("leaving interactive loop");
        Ok(())
    }
}

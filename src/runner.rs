//! Runs the executions of one line in order.
//!
//! `&&` and `||` are decided against the result of the last command that
//! actually ran in this line; skipped commands leave it untouched. Pipes are
//! buffered: a producer runs to completion before its consumer starts.

use crate::clause::ChainOperator;
use crate::command::ExecutionResult;
use crate::env::Environment;
use crate::error::ShellError;
use crate::execution::{Execution, InputSource, Invocation, OutputSink};
use crate::io_adapters::{open_input, open_output};
use log::debug;
use std::fmt::Display;
use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable flag that abandons the rest of the running line once triggered.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ExecutionRunner<'a> {
    env: &'a mut Environment,
    terminal_in: &'a mut dyn Read,
    terminal_out: &'a mut dyn Write,
    interrupt: Interrupt,
    last_result: Option<ExecutionResult>,
    pipe: Option<Vec<u8>>,
}

impl<'a> ExecutionRunner<'a> {
    pub fn new(
        env: &'a mut Environment,
        terminal_in: &'a mut dyn Read,
        terminal_out: &'a mut dyn Write,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            env,
            terminal_in,
            terminal_out,
            interrupt,
            last_result: None,
            pipe: None,
        }
    }

    /// Run `executions` and return the result of the last command that ran,
    /// or `None` when nothing ran.
    ///
    /// Command failures are reported on the terminal output and do not stop the
    /// line. An interrupt does: the rest is abandoned and
    /// [`ShellError::Interrupted`] is returned.
    pub fn run(
        mut self,
        executions: Vec<Execution>,
    ) -> Result<Option<ExecutionResult>, ShellError> {
        for execution in executions {
            if self.interrupt.is_triggered() {
                return self.abandon();
            }
            if self.env.should_exit {
                debug!("exit requested, dropping the rest of the line");
                break;
            }
            if !self.gate_allows(execution.gate) {
                debug!(
                    "skipping {:?}: gate {:?}, last result {:?}",
                    execution.name, execution.gate, self.last_result
                );
                // a skipped command neither consumes nor forwards pipe data
                self.pipe = None;
                continue;
            }
            match self.run_one(execution)? {
                Some(result) => self.last_result = Some(result),
                None => return self.abandon(),
            }
        }
        Ok(self.last_result)
    }

    fn gate_allows(&self, gate: Option<ChainOperator>) -> bool {
        match gate {
            None | Some(ChainOperator::Sequence) | Some(ChainOperator::Pipe) => true,
            Some(ChainOperator::And) => self.last_result == Some(ExecutionResult::Success),
            Some(ChainOperator::Or) => self.last_result == Some(ExecutionResult::Failure),
        }
    }

    /// `Ok(None)` means the command was interrupted.
    fn run_one(&mut self, execution: Execution) -> Result<Option<ExecutionResult>, ShellError> {
        let Execution {
            name,
            invocation,
            input,
            output,
            ..
        } = execution;
        let piped = self.pipe.take();

        let command = match invocation {
            Invocation::Ready(command) => command,
            Invocation::Rejected(err) => {
                report(&mut *self.terminal_out, &err)?;
                return Ok(Some(ExecutionResult::Failure));
            }
        };

        let mut stdin = match open_input(&input, self.env, &mut *self.terminal_in, piped) {
            Ok(stdin) => stdin,
            Err(err) => {
                let target = match &input {
                    InputSource::File(path) => path.display().to_string(),
                    _ => "stdin".to_string(),
                };
                let error = execution_error(&name, format!("{target}: {err}"));
                report(&mut *self.terminal_out, &error)?;
                return Ok(Some(ExecutionResult::Failure));
            }
        };
        let mut stdout = match open_output(&output, self.env, &mut *self.terminal_out) {
            Ok(stdout) => stdout,
            Err(err) => {
                drop(stdin);
                let target = match &output {
                    OutputSink::File { path, .. } => path.display().to_string(),
                    _ => "stdout".to_string(),
                };
                let error = execution_error(&name, format!("{target}: {err}"));
                report(&mut *self.terminal_out, &error)?;
                return Ok(Some(ExecutionResult::Failure));
            }
        };

        debug!("running {name:?}");
        let outcome = command.execute(&mut stdin, &mut stdout, self.env);
        drop(stdin);
        let flushed = stdout.finish();

        let interrupted = outcome
            .as_ref()
            .err()
            .and_then(|err| err.downcast_ref::<ShellError>())
            .is_some_and(|err| matches!(err, ShellError::Interrupted));
        if interrupted || self.interrupt.is_triggered() {
            debug!("{name:?} interrupted");
            return Ok(None);
        }

        let mut result = match outcome {
            Ok(result) => result,
            Err(err) => {
                report(&mut *self.terminal_out, &execution_error(&name, format!("{err:#}")))?;
                ExecutionResult::Failure
            }
        };
        match flushed {
            Ok(Some(buf)) => self.pipe = Some(buf),
            Ok(None) => {}
            Err(err) => {
                report(&mut *self.terminal_out, &execution_error(&name, err.to_string()))?;
                result = ExecutionResult::Failure;
            }
        }

        debug!("{name:?} finished with {result:?}");
        Ok(Some(result))
    }

    fn abandon(&mut self) -> Result<Option<ExecutionResult>, ShellError> {
        report(&mut *self.terminal_out, &ShellError::Interrupted)?;
        Err(ShellError::Interrupted)
    }
}

fn execution_error(command: &str, message: String) -> ShellError {
    ShellError::CommandExecution {
        command: command.to_string(),
        message,
    }
}

fn report(out: &mut dyn Write, err: &dyn Display) -> Result<(), ShellError> {
    writeln!(out, "{err}")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandFactory, ExecutableCommand};
    use crate::error::BindError;
    use crate::execution::ExecutionBuilder;
    use crate::parsed::ParsedCommand;
    use crate::schema::{CommandSchema, OptionSpec};
    use std::io::Cursor;
    use std::rc::Rc;

    type Outcome = anyhow::Result<ExecutionResult>;
    type Body = Rc<dyn Fn(&mut dyn Read, &mut dyn Write, &mut Environment) -> Outcome>;

    struct FnCommand(Body);

    impl ExecutableCommand for FnCommand {
        fn execute(
            self: Box<Self>,
            stdin: &mut dyn Read,
            stdout: &mut dyn Write,
            env: &mut Environment,
        ) -> anyhow::Result<ExecutionResult> {
            (self.0)(stdin, stdout, env)
        }
    }

    struct FnFactory {
        schema: CommandSchema,
        body: Body,
    }

    impl CommandFactory for FnFactory {
        fn schema(&self) -> &CommandSchema {
            &self.schema
        }

        fn create(&self, _parsed: &ParsedCommand) -> Result<Box<dyn ExecutableCommand>, BindError> {
            Ok(Box::new(FnCommand(self.body.clone())))
        }
    }

    fn factory(
        name: &str,
        body: impl Fn(&mut dyn Read, &mut dyn Write, &mut Environment) -> Outcome + 'static,
    ) -> Box<dyn CommandFactory> {
        factory_with(CommandSchema::builder(name).build().unwrap(), body)
    }

    fn factory_with(
        schema: CommandSchema,
        body: impl Fn(&mut dyn Read, &mut dyn Write, &mut Environment) -> Outcome + 'static,
    ) -> Box<dyn CommandFactory> {
        Box::new(FnFactory {
            schema,
            body: Rc::new(body),
        })
    }

    fn registry(interrupt: &Interrupt) -> Vec<Box<dyn CommandFactory>> {
        let stopper = interrupt.clone();
        vec![
            factory("emit", |_, out, _| {
                writeln!(out, "data")?;
                Ok(ExecutionResult::Success)
            }),
            factory("upper", |input, out, _| {
                let mut text = String::new();
                input.read_to_string(&mut text)?;
                write!(out, "{}", text.to_uppercase())?;
                Ok(ExecutionResult::Success)
            }),
            factory("fail", |_, _, _| Ok(ExecutionResult::Failure)),
            factory("boom", |_, _, _| Err(anyhow::anyhow!("exploded"))),
            factory("stop", move |_, _, _| {
                stopper.trigger();
                Ok(ExecutionResult::Success)
            }),
            factory("quit", |_, _, env| {
                env.should_exit = true;
                Ok(ExecutionResult::Success)
            }),
            factory_with(
                CommandSchema::builder("strict")
                    .option(OptionSpec::single().long("n").required())
                    .build()
                    .unwrap(),
                |_, _, _| Ok(ExecutionResult::Success),
            ),
        ]
    }

    fn run_in(
        dir: &std::path::Path,
        line: &str,
    ) -> (Result<Option<ExecutionResult>, ShellError>, String) {
        let interrupt = Interrupt::new();
        let registry = registry(&interrupt);
        let mut env = Environment::empty(dir);
        let executions = ExecutionBuilder::new(&registry, &env).build(line).unwrap();
        let mut stdin = Cursor::new(b"typed\n".to_vec());
        let mut out = Vec::new();
        let result =
            ExecutionRunner::new(&mut env, &mut stdin, &mut out, interrupt).run(executions);
        (result, String::from_utf8(out).unwrap())
    }

    fn run(line: &str) -> (Result<Option<ExecutionResult>, ShellError>, String) {
        run_in(std::path::Path::new("/"), line)
    }

    #[test]
    fn pipe_feeds_next_command() {
        let (result, out) = run("emit | upper");
        assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
        assert_eq!(out, "DATA\n");
    }

    #[test]
    fn terminal_input_without_pipe() {
        let (_, out) = run("upper");
        assert_eq!(out, "TYPED\n");
    }

    #[test]
    fn skipped_producer_leaves_consumer_empty_input() {
        let (result, out) = run("fail && emit | upper");
        assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
        assert_eq!(out, "");
    }

    #[test]
    fn command_error_is_reported_and_counts_as_failure() {
        let (result, out) = run("boom || emit");
        assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
        assert_eq!(out, "boom: exploded\ndata\n");

        let (result, out) = run("boom && emit");
        assert_eq!(result.unwrap(), Some(ExecutionResult::Failure));
        assert_eq!(out, "boom: exploded\n");
    }

    #[test]
    fn rejected_execution_fails_at_run_time() {
        let (result, out) = run("strict || emit");
        assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
        assert_eq!(out, "strict: option '--n' is required\ndata\n");
    }

    #[test]
    fn interrupt_abandons_rest_of_line() {
        let (result, out) = run("emit ; stop ; emit");
        assert!(matches!(result, Err(ShellError::Interrupted)));
        assert_eq!(out, "data\naesh: interrupted\n");
    }

    #[test]
    fn exit_stops_the_line() {
        let (result, out) = run("quit ; emit");
        assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
        assert_eq!(out, "");
    }

    #[test]
    fn missing_input_file_fails_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let (result, out) = run_in(dir.path(), "upper < missing.txt || emit");
        assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
        assert!(out.starts_with("upper: missing.txt: "), "{out}");
        assert!(out.ends_with("data\n"));
    }

    #[test]
    fn output_file_receives_command_output() {
        let dir = tempfile::tempdir().unwrap();
        let (result, out) = run_in(
            dir.path(),
            "emit > out.txt ; emit >> out.txt ; upper < out.txt",
        );
        assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
        assert_eq!(out, "DATA\nDATA\n");
    }

    #[test]
    fn nothing_runs_nothing_reported() {
        let (result, out) = run("fail && emit && emit");
        assert_eq!(result.unwrap(), Some(ExecutionResult::Failure));
        assert_eq!(out, "");
    }
}

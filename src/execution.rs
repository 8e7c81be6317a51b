//! Turns a raw line into ready-to-run [`Execution`]s.

use crate::clause::{ChainOperator, Clause, WriteMode, split_clauses};
use crate::command::{CommandRegistry, ExecutableCommand};
use crate::env::Environment;
use crate::error::{LexError, ShellError};
use crate::lexer::{Lexed, Word, lex};
use crate::matcher::OptionMatcher;
use crate::parsed::ParsedCommand;
use crate::schema::CommandSchema;
use log::debug;
use std::fmt;
use std::path::PathBuf;

/// Where a command reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Terminal,
    /// Relative paths resolve against the current directory at run time.
    File(PathBuf),
    PipeFromPrevious,
}

/// Where a command writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    Terminal,
    File { path: PathBuf, mode: WriteMode },
    PipeToNext,
}

/// The command to run, or the reason it cannot run.
pub enum Invocation {
    Ready(Box<dyn ExecutableCommand>),
    Rejected(ShellError),
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Ready(_) => f.write_str("Ready"),
            Invocation::Rejected(err) => f.debug_tuple("Rejected").field(err).finish(),
        }
    }
}

/// One resolved, wired command of a line. Consumed once by the runner.
#[derive(Debug)]
pub struct Execution {
    /// Command path as typed, e.g. `remote add`.
    pub name: String,
    pub parsed: ParsedCommand,
    pub invocation: Invocation,
    /// Operator that ended the previous clause; decides whether this one runs.
    pub gate: Option<ChainOperator>,
    /// Operator that ends this clause.
    pub operator: Option<ChainOperator>,
    pub input: InputSource,
    pub output: OutputSink,
}

impl Execution {
    pub fn is_rejected(&self) -> bool {
        matches!(self.invocation, Invocation::Rejected(_))
    }
}

/// Resolves clauses against a registry and wires their I/O.
pub struct ExecutionBuilder<'a> {
    registry: &'a dyn CommandRegistry,
    env: &'a Environment,
}

impl<'a> ExecutionBuilder<'a> {
    pub fn new(registry: &'a dyn CommandRegistry, env: &'a Environment) -> Self {
        Self { registry, env }
    }

    /// Lex, split and resolve `line`.
    ///
    /// Syntax errors and unknown commands stop building and are returned as
    /// `Err`. Parser and bind errors are kept on the affected execution as
    /// [`Invocation::Rejected`] so the caller can decide what to do.
    pub fn build(&self, line: &str) -> Result<Vec<Execution>, ShellError> {
        let Lexed { words, error } = lex(line);
        let clauses = split_clauses(words)?;
        if clauses.is_empty() {
            return match error {
                Some(err) => Err(ShellError::Lex(err)),
                None => Ok(Vec::new()),
            };
        }

        let last = clauses.len() - 1;
        let mut executions = Vec::with_capacity(clauses.len());
        let mut gate = None;
        for (idx, clause) in clauses.into_iter().enumerate() {
            let lex_error = if idx == last { error.clone() } else { None };
            let execution = self.build_clause(clause, gate, lex_error)?;
            gate = execution.operator;
            executions.push(execution);
        }

        debug!("built {} execution(s) for {:?}", executions.len(), line);
        Ok(executions)
    }

    fn build_clause(
        &self,
        clause: Clause,
        gate: Option<ChainOperator>,
        lex_error: Option<LexError>,
    ) -> Result<Execution, ShellError> {
        let Clause {
            words,
            operator,
            input,
            output,
        } = clause;

        let Some((name_word, rest)) = words.split_first() else {
            let token = operator.map_or("newline", ChainOperator::as_str);
            return Err(ShellError::Syntax(token.to_string()));
        };
        let factory = self
            .registry
            .resolve(&name_word.value)
            .ok_or_else(|| ShellError::CommandNotFound(name_word.value.clone()))?;

        let (schema, path, rest) = descend(factory.schema(), &name_word.value, rest);
        let mut parsed = OptionMatcher::new(schema, self.env).parse(rest);
        parsed.set_path(path);
        if let Some(err) = lex_error {
            parsed.push_error(err);
        }

        let name = parsed.path().join(" ");
        let invocation = if parsed.has_errors() {
            Invocation::Rejected(ShellError::Parse {
                command: name.clone(),
                errors: parsed.errors().to_vec(),
            })
        } else {
            match factory.create(&parsed) {
                Ok(command) => Invocation::Ready(command),
                Err(source) => Invocation::Rejected(ShellError::Bind {
                    command: name.clone(),
                    source,
                }),
            }
        };

        let input = match input {
            Some(file) => InputSource::File(PathBuf::from(file)),
            None if gate == Some(ChainOperator::Pipe) => InputSource::PipeFromPrevious,
            None => InputSource::Terminal,
        };
        let output = match output {
            Some((file, mode)) => OutputSink::File {
                path: PathBuf::from(file),
                mode,
            },
            None if operator == Some(ChainOperator::Pipe) => OutputSink::PipeToNext,
            None => OutputSink::Terminal,
        };

        debug!(
            "execution {:?}: gate {:?}, operator {:?}, input {:?}, output {:?}, rejected {}",
            name,
            gate,
            operator,
            input,
            output,
            matches!(invocation, Invocation::Rejected(_))
        );
        Ok(Execution {
            name,
            parsed,
            invocation,
            gate,
            operator,
            input,
            output,
        })
    }
}

/// Follow leading words that name child schemas.
fn descend<'s, 'w>(
    root: &'s CommandSchema,
    typed: &str,
    mut rest: &'w [Word],
) -> (&'s CommandSchema, Vec<String>, &'w [Word]) {
    let mut schema = root;
    let mut path = vec![typed.to_string()];
    while let Some((first, tail)) = rest.split_first() {
        if first.quoted {
            break;
        }
        match schema.child(&first.value) {
            Some(child) => {
                schema = child;
                path.push(child.name().to_string());
                rest = tail;
            }
            None => break,
        }
    }
    (schema, path, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandFactory, ExecutionResult};
    use crate::error::{BindError, ParseError};
    use crate::schema::{ArgumentSpec, OptionSpec};
    use std::io::{Read, Write};

    struct Noop;

    impl ExecutableCommand for Noop {
        fn execute(
            self: Box<Self>,
            _stdin: &mut dyn Read,
            _stdout: &mut dyn Write,
            _env: &mut Environment,
        ) -> anyhow::Result<ExecutionResult> {
            Ok(ExecutionResult::Success)
        }
    }

    struct TestFactory {
        schema: CommandSchema,
    }

    impl CommandFactory for TestFactory {
        fn schema(&self) -> &CommandSchema {
            &self.schema
        }

        fn create(&self, parsed: &ParsedCommand) -> Result<Box<dyn ExecutableCommand>, BindError> {
            parsed.parse_value::<u32>("count")?;
            Ok(Box::new(Noop))
        }
    }

    fn registry() -> Vec<Box<dyn CommandFactory>> {
        let cmd = CommandSchema::builder("cmd")
            .alias("c")
            .option(OptionSpec::single().long("count"))
            .option(OptionSpec::boolean().short('v').inherited())
            .argument(ArgumentSpec::new("args"))
            .child(
                CommandSchema::builder("sub")
                    .option(OptionSpec::single().long("name").required())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        vec![Box::new(TestFactory { schema: cmd })]
    }

    fn build(line: &str) -> Result<Vec<Execution>, ShellError> {
        let registry = registry();
        let env = Environment::empty("/");
        ExecutionBuilder::new(&registry, &env).build(line)
    }

    #[test]
    fn empty_line_builds_nothing() {
        assert!(build("  ").unwrap().is_empty());
    }

    #[test]
    fn unknown_command_stops_building() {
        assert!(matches!(
            build("cmd && nope --x"),
            Err(ShellError::CommandNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn gates_and_pipe_wiring() {
        let executions = build("cmd a | c b && cmd > out.txt || cmd < in.txt").unwrap();
        assert_eq!(executions.len(), 4);

        assert_eq!(executions[0].gate, None);
        assert_eq!(executions[0].output, OutputSink::PipeToNext);
        assert_eq!(executions[1].gate, Some(ChainOperator::Pipe));
        assert_eq!(executions[1].input, InputSource::PipeFromPrevious);
        assert_eq!(executions[1].output, OutputSink::Terminal);
        assert_eq!(executions[2].gate, Some(ChainOperator::And));
        assert_eq!(
            executions[2].output,
            OutputSink::File {
                path: PathBuf::from("out.txt"),
                mode: WriteMode::Truncate
            }
        );
        assert_eq!(executions[3].gate, Some(ChainOperator::Or));
        assert_eq!(executions[3].input, InputSource::File(PathBuf::from("in.txt")));
        assert!(executions.iter().all(|e| !e.is_rejected()));
    }

    #[test]
    fn redirections_override_pipes() {
        let executions = build("cmd > a.txt | cmd < b.txt").unwrap();
        assert_eq!(
            executions[0].output,
            OutputSink::File {
                path: PathBuf::from("a.txt"),
                mode: WriteMode::Truncate
            }
        );
        assert_eq!(executions[1].input, InputSource::File(PathBuf::from("b.txt")));
    }

    #[test]
    fn parser_errors_reject_only_their_execution() {
        let executions = build("cmd --bogus ; cmd ok").unwrap();
        assert!(executions[0].is_rejected());
        assert!(!executions[1].is_rejected());
        match &executions[0].invocation {
            Invocation::Rejected(err) => {
                assert_eq!(err.to_string(), "cmd: unknown option '--bogus'")
            }
            Invocation::Ready(_) => unreachable!(),
        }
    }

    #[test]
    fn bind_errors_reject() {
        let executions = build("cmd --count many").unwrap();
        assert!(matches!(
            &executions[0].invocation,
            Invocation::Rejected(ShellError::Bind { command, .. }) if command == "cmd"
        ));
    }

    #[test]
    fn lex_error_lands_on_last_clause() {
        let executions = build("cmd a ; cmd \"open").unwrap();
        assert!(!executions[0].is_rejected());
        assert_eq!(
            executions[1].parsed.errors(),
            [ParseError::Lex(LexError::UnterminatedQuote('"'))]
        );
    }

    #[test]
    fn descends_into_child_schema_with_inherited_options() {
        let executions = build("c sub -v --name x").unwrap();
        let parsed = &executions[0].parsed;
        assert!(!executions[0].is_rejected(), "{:?}", executions[0].invocation);
        assert_eq!(parsed.path(), ["c", "sub"]);
        assert_eq!(executions[0].name, "c sub");
        assert!(parsed.flag("v"));
        assert_eq!(parsed.value("name"), Some("x"));
    }

    #[test]
    fn quoted_child_name_is_an_argument() {
        let executions = build("cmd \"sub\"").unwrap();
        assert_eq!(executions[0].parsed.path(), ["cmd"]);
        assert_eq!(executions[0].parsed.arguments(), ["sub"]);
    }

    #[test]
    fn syntax_error_is_returned() {
        assert!(matches!(build("cmd ||"), Err(ShellError::Syntax(t)) if t == "||"));
    }
}

use aesh::Interpreter;
use aesh::command::{Binder, CommandFactory, ExecutableCommand, ExecutionResult};
use aesh::env::Environment;
use aesh::error::{BindError, ParseError, ShellError};
use aesh::parsed::ParsedCommand;
use aesh::schema::{ArgumentSpec, CommandSchema, OptionSpec};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::rc::Rc;

/// Prints `success<n>` or `failure<n>`, `n` counting runs within one test.
struct Counted {
    counter: Rc<Cell<usize>>,
    succeed: bool,
}

impl ExecutableCommand for Counted {
    fn execute(
        self: Box<Self>,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> anyhow::Result<ExecutionResult> {
        let n = self.counter.get();
        self.counter.set(n + 1);
        let label = if self.succeed { "success" } else { "failure" };
        write!(stdout, "{label}{n}")?;
        Ok(ExecutionResult::from_success(self.succeed))
    }
}

struct CountedFactory {
    schema: CommandSchema,
    counter: Rc<Cell<usize>>,
    succeed: bool,
}

impl CommandFactory for CountedFactory {
    fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    fn create(&self, _parsed: &ParsedCommand) -> Result<Box<dyn ExecutableCommand>, BindError> {
        Ok(Box::new(Counted {
            counter: self.counter.clone(),
            succeed: self.succeed,
        }))
    }
}

fn counting_shell() -> Interpreter {
    let counter = Rc::new(Cell::new(0));
    let mut sh = Interpreter::new(Vec::new()).with_env(Environment::empty("/"));
    for (name, succeed) in [("success", true), ("failure", false)] {
        sh.register(Box::new(CountedFactory {
            schema: CommandSchema::builder(name).build().unwrap(),
            counter: counter.clone(),
            succeed,
        }));
    }
    sh
}

fn run(sh: &mut Interpreter, line: &str) -> (Result<Option<ExecutionResult>, ShellError>, String) {
    let mut out = Vec::new();
    let result = sh.execute_line(line, &mut std::io::empty(), &mut out);
    (result, String::from_utf8(out).unwrap())
}

macro_rules! short_circuit_tests {
    ($($name:ident: $line:expr => $expected:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let mut sh = counting_shell();
                let (result, out) = run(&mut sh, $line);
                assert!(result.is_ok(), "{result:?}");
                assert_eq!(out, $expected);
            }
        )*
    };
}

short_circuit_tests! {
    or_stops_after_first_success:
        "success || success || failure" => "success0",
    or_runs_until_success:
        "failure || success || failure" => "failure0success1",
    and_stops_after_failure:
        "success && failure && success" => "success0failure1",
    and_skips_everything_after_failure:
        "failure && success && success" => "failure0",
    mixed_chain_recovers_through_or:
        "success && success && failure || failure || success"
            => "success0success1failure2failure3success4",
    gates_use_last_executed_result:
        "success || failure && success && success && failure && success || failure || success"
            => "success0success1success2failure3failure4success5",
}

#[test]
fn sequence_always_runs() {
    let mut sh = counting_shell();
    let (result, out) = run(&mut sh, "failure ; success ; failure");
    assert_eq!(result.unwrap(), Some(ExecutionResult::Failure));
    assert_eq!(out, "failure0success1failure2");
}

#[test]
fn chain_result_is_last_executed_command() {
    let mut sh = counting_shell();
    let (result, _) = run(&mut sh, "failure || success && failure || success");
    assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
    let (result, _) = run(&mut sh, "success || failure");
    assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
}

/// Records what the binder received, for inspection by the test.
#[derive(Debug, Clone, PartialEq)]
struct TestOptions {
    f: bool,
    x: bool,
    e: String,
    d: BTreeMap<String, String>,
    files: Vec<String>,
}

impl Binder for TestOptions {
    fn bind(parsed: &ParsedCommand) -> Result<Self, BindError> {
        Ok(TestOptions {
            f: parsed.flag("f"),
            x: parsed.flag("X"),
            e: parsed
                .value("e")
                .ok_or_else(|| BindError::Invalid("missing -e".into()))?
                .to_string(),
            d: parsed.map("D").clone(),
            files: parsed.arguments().to_vec(),
        })
    }
}

struct Recorder(TestOptions, Rc<RefCell<Option<TestOptions>>>);

impl ExecutableCommand for Recorder {
    fn execute(
        self: Box<Self>,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> anyhow::Result<ExecutionResult> {
        *self.1.borrow_mut() = Some(self.0);
        Ok(ExecutionResult::Success)
    }
}

struct TestFactory {
    schema: CommandSchema,
    seen: Rc<RefCell<Option<TestOptions>>>,
}

impl CommandFactory for TestFactory {
    fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    fn create(&self, parsed: &ParsedCommand) -> Result<Box<dyn ExecutableCommand>, BindError> {
        Ok(Box::new(Recorder(TestOptions::bind(parsed)?, self.seen.clone())))
    }
}

fn test_shell() -> (Interpreter, Rc<RefCell<Option<TestOptions>>>) {
    let seen = Rc::new(RefCell::new(None));
    let schema = CommandSchema::builder("test")
        .option(OptionSpec::boolean().short('f'))
        .option(OptionSpec::boolean().short('X'))
        .option(OptionSpec::single().short('e').required())
        .option(OptionSpec::map().short('D'))
        .argument(ArgumentSpec::new("files"))
        .build()
        .unwrap();
    let mut sh = Interpreter::new(Vec::new()).with_env(Environment::empty("/"));
    sh.register(Box::new(TestFactory {
        schema,
        seen: seen.clone(),
    }));
    (sh, seen)
}

#[test]
fn options_reach_the_binder() {
    let (mut sh, seen) = test_shell();
    let (result, _) = run(&mut sh, "test -fX -e bar -Df=g /tmp/file.txt\\ ");
    assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
    assert_eq!(
        seen.borrow().clone(),
        Some(TestOptions {
            f: true,
            x: true,
            e: "bar".into(),
            d: BTreeMap::from([("f".to_string(), "g".to_string())]),
            files: vec!["/tmp/file.txt ".into()],
        })
    );
}

#[test]
fn missing_required_option_never_reaches_binder() {
    let (mut sh, seen) = test_shell();
    let (result, out) = run(&mut sh, "test -f file");
    match result {
        Err(ShellError::Parse { command, errors }) => {
            assert_eq!(command, "test");
            assert_eq!(errors, [ParseError::RequiredOptionMissing("-e".into())]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(out, "test: option '-e' is required\n");
    assert!(seen.borrow().is_none());
}

#[test]
fn syntax_error_message() {
    let (mut sh, _) = test_shell();
    let (result, out) = run(&mut sh, "test -e a | | test -e b");
    assert!(matches!(result, Err(ShellError::Syntax(token)) if token == "|"));
    assert_eq!(out, "aesh: syntax error near unexpected token '|'\n");
}

#[test]
fn unterminated_quote_is_reported_for_the_command() {
    let (mut sh, seen) = test_shell();
    let (result, out) = run(&mut sh, "test -e \"open");
    assert!(matches!(result, Err(ShellError::Parse { .. })));
    assert_eq!(out, "test: unterminated quote (\")\n");
    assert!(seen.borrow().is_none());
}

#[test]
fn builtin_pipes_and_redirections() {
    let dir = tempfile::tempdir().unwrap();
    let mut sh = Interpreter::with_builtins()
        .unwrap()
        .with_env(Environment::empty(dir.path()));

    let (result, out) = run(
        &mut sh,
        "echo one two > words.txt && cat words.txt | wc && grep -w three < words.txt || echo none",
    );

    assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
    assert_eq!(out, "1 2 8\nnone\n");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("words.txt")).unwrap(),
        "one two\n"
    );
}

#[test]
fn interrupt_handle_is_reset_per_line() {
    let mut sh = counting_shell();
    sh.interrupt_handle().trigger();
    let (result, out) = run(&mut sh, "success");
    assert_eq!(result.unwrap(), Some(ExecutionResult::Success));
    assert_eq!(out, "success0");
}

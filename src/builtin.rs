use crate::command::{Binder, CommandFactory, ExecutableCommand, ExecutionResult};
use crate::env::Environment;
use crate::error::{BindError, SchemaError};
use crate::parsed::ParsedCommand;
use crate::schema::{ArgumentSpec, CommandSchema, OptionSpec, Validator};
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Each builtin describes itself with a [`CommandSchema`] and is built from the
/// matched values through [`Binder`], then executed in-process.
pub(crate) trait BuiltinCommand: Binder + 'static {
    fn schema() -> Result<CommandSchema, SchemaError>;

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult> {
        match <T as BuiltinCommand>::execute(*self, stdin, stdout, env) {
            Ok(result) => Ok(result),
            Err(e) => {
                writeln!(stdout, "{e:#}")?;
                Ok(ExecutionResult::Failure)
            }
        }
    }
}

/// Factory allows creating instances of a builtin from a matched command line.
pub(crate) struct Factory<T> {
    schema: CommandSchema,
    _phantom: PhantomData<T>,
}

impl<T: BuiltinCommand> Factory<T> {
    pub(crate) fn new() -> Result<Self, SchemaError> {
        Ok(Self {
            schema: T::schema()?,
            _phantom: PhantomData,
        })
    }
}

impl<T: BuiltinCommand> CommandFactory for Factory<T> {
    fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    fn create(&self, parsed: &ParsedCommand) -> Result<Box<dyn ExecutableCommand>, BindError> {
        Ok(Box::new(T::bind(parsed)?))
    }
}

/// Factories for `pwd`, `cd`, `exit`, `echo`, `cat`, `wc` and `grep`.
pub(crate) fn builtin_factories() -> Result<Vec<Box<dyn CommandFactory>>, SchemaError> {
    let factories: Vec<Box<dyn CommandFactory>> = vec![
        Box::new(Factory::<Pwd>::new()?),
        Box::new(Factory::<Cd>::new()?),
        Box::new(Factory::<Exit>::new()?),
        Box::new(Factory::<Echo>::new()?),
        Box::new(Factory::<Cat>::new()?),
        Box::new(Factory::<Wc>::new()?),
        Box::new(Factory::<Grep>::new()?),
    ];
    Ok(factories)
}

fn open_file(env: &Environment, command: &str, name: &str) -> Result<fs::File> {
    fs::File::open(env.resolve_path(name)).with_context(|| format!("{command}: {name}"))
}

/// Print the current working directory to standard output.
pub struct Pwd;

impl Binder for Pwd {
    fn bind(_parsed: &ParsedCommand) -> Result<Self, BindError> {
        Ok(Pwd)
    }
}

impl BuiltinCommand for Pwd {
    fn schema() -> Result<CommandSchema, SchemaError> {
        CommandSchema::builder("pwd")
            .description("print the current working directory")
            .build()
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(ExecutionResult::Success)
    }
}

/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME variable.
pub struct Cd {
    pub target: Option<String>,
}

impl Binder for Cd {
    fn bind(parsed: &ParsedCommand) -> Result<Self, BindError> {
        match parsed.arguments() {
            [] => Ok(Cd { target: None }),
            [target] => Ok(Cd {
                target: Some(target.clone()),
            }),
            _ => Err(BindError::Invalid("too many arguments".into())),
        }
    }
}

impl BuiltinCommand for Cd {
    fn schema() -> Result<CommandSchema, SchemaError> {
        CommandSchema::builder("cd")
            .description("change the current working directory")
            .argument(ArgumentSpec::new("dir").description("defaults to $HOME"))
            .build()
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult> {
        let target = match self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => anyhow::bail!("cd: no target and HOME not set"),
            },
        };

        let new_dir = env.resolve_path(target);
        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;
        if !canonical.is_dir() {
            anyhow::bail!("cd: {}: not a directory", canonical.display());
        }
        env.current_dir = canonical;
        Ok(ExecutionResult::Success)
    }
}

/// Ask the interactive loop to stop.
pub struct Exit;

impl Binder for Exit {
    fn bind(_parsed: &ParsedCommand) -> Result<Self, BindError> {
        Ok(Exit)
    }
}

impl BuiltinCommand for Exit {
    fn schema() -> Result<CommandSchema, SchemaError> {
        CommandSchema::builder("exit")
            .description("leave the shell")
            .build()
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult> {
        env.should_exit = true;
        Ok(ExecutionResult::Success)
    }
}

/// Write the arguments to standard output, separated by spaces.
/// By default, a trailing newline is printed.
pub struct Echo {
    pub no_newline: bool,
    pub args: Vec<String>,
}

impl Binder for Echo {
    fn bind(parsed: &ParsedCommand) -> Result<Self, BindError> {
        Ok(Echo {
            no_newline: parsed.flag("no-newline"),
            args: parsed.arguments().to_vec(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn schema() -> Result<CommandSchema, SchemaError> {
        CommandSchema::builder("echo")
            .description("write arguments to standard output")
            .option(
                OptionSpec::boolean()
                    .short('n')
                    .long("no-newline")
                    .description("do not output the trailing newline"),
            )
            .argument(ArgumentSpec::new("args"))
            .build()
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExecutionResult> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(ExecutionResult::Success)
    }
}

/// Count lines, words and bytes.
pub struct Wc {
    pub files: Vec<String>,
}

impl Binder for Wc {
    fn bind(parsed: &ParsedCommand) -> Result<Self, BindError> {
        Ok(Wc {
            files: parsed.arguments().to_vec(),
        })
    }
}

fn count(text: &str) -> (usize, usize, usize) {
    (text.lines().count(), text.split_whitespace().count(), text.len())
}

impl BuiltinCommand for Wc {
    fn schema() -> Result<CommandSchema, SchemaError> {
        CommandSchema::builder("wc")
            .description("count lines, words and bytes")
            .argument(ArgumentSpec::new("files"))
            .build()
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult> {
        if self.files.is_empty() {
            let mut buf = String::new();
            stdin.read_to_string(&mut buf)?;
            let (lines, words, bytes) = count(&buf);
            writeln!(stdout, "{} {} {}", lines, words, bytes)?;
            return Ok(ExecutionResult::Success);
        }
        for name in &self.files {
            let mut s = String::new();
            open_file(env, "wc", name)?.read_to_string(&mut s)?;
            let (lines, words, bytes) = count(&s);
            writeln!(stdout, "{} {} {} {}", lines, words, bytes, name)?;
        }
        Ok(ExecutionResult::Success)
    }
}

/// Print file(s) to stdout, or standard input when none are given.
pub struct Cat {
    pub files: Vec<String>,
}

impl Binder for Cat {
    fn bind(parsed: &ParsedCommand) -> Result<Self, BindError> {
        Ok(Cat {
            files: parsed.arguments().to_vec(),
        })
    }
}

impl BuiltinCommand for Cat {
    fn schema() -> Result<CommandSchema, SchemaError> {
        CommandSchema::builder("cat")
            .description("print files to standard output")
            .argument(ArgumentSpec::new("files"))
            .build()
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult> {
        if self.files.is_empty() {
            std::io::copy(stdin, stdout)?;
            return Ok(ExecutionResult::Success);
        }
        for name in &self.files {
            let mut f = open_file(env, "cat", name)?;
            std::io::copy(&mut f, stdout)?;
        }
        Ok(ExecutionResult::Success)
    }
}

/// Print lines matching a pattern.
///
/// Succeeds when at least one line matched, like the classic tool.
pub struct Grep {
    pub pattern: String,
    pub files: Vec<String>,
    pub word_regexp: bool,
    pub ignore_case: bool,
    pub after_context: usize,
}

impl Binder for Grep {
    fn bind(parsed: &ParsedCommand) -> Result<Self, BindError> {
        let Some((pattern, files)) = parsed.arguments().split_first() else {
            return Err(BindError::Invalid("missing pattern".into()));
        };
        Ok(Grep {
            pattern: pattern.clone(),
            files: files.to_vec(),
            word_regexp: parsed.flag("word-regexp"),
            ignore_case: parsed.flag("ignore-case"),
            after_context: parsed.parse_value("after-context")?.unwrap_or(0),
        })
    }
}

impl Grep {
    fn regex(&self) -> Result<Regex> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };
        RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("grep: invalid regex pattern: {}", pattern))
    }

    /// Returns whether any line matched.
    fn process_source(
        &self,
        reader: &mut dyn Read,
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &Regex,
    ) -> Result<bool> {
        let lines = BufReader::new(reader)
            .lines()
            .collect::<std::io::Result<Vec<String>>>()?;

        let mut to_print = vec![false; lines.len()];
        let mut matched = false;
        for (idx, line) in lines.iter().enumerate() {
            if re.is_match(line) {
                matched = true;
                let end = (idx + self.after_context + 1).min(lines.len());
                to_print[idx..end].iter_mut().for_each(|p| *p = true);
            }
        }

        let prefix = file_name.map(|name| format!("{name}:")).unwrap_or_default();
        let mut last_printed: Option<usize> = None;
        for (idx, line) in lines.iter().enumerate().filter(|(idx, _)| to_print[*idx]) {
            if self.after_context > 0 && last_printed.is_some_and(|last| idx > last + 1) {
                writeln!(stdout, "--")?;
            }
            writeln!(stdout, "{prefix}{line}")?;
            last_printed = Some(idx);
        }

        Ok(matched)
    }
}

impl BuiltinCommand for Grep {
    fn schema() -> Result<CommandSchema, SchemaError> {
        CommandSchema::builder("grep")
            .description("print lines matching a pattern")
            .option(
                OptionSpec::boolean()
                    .short('i')
                    .long("ignore-case")
                    .description("ignore case distinctions"),
            )
            .option(
                OptionSpec::boolean()
                    .short('w')
                    .long("word-regexp")
                    .description("match only whole words"),
            )
            .option(
                OptionSpec::single()
                    .short('A')
                    .long("after-context")
                    .description("print NUM lines of trailing context after matching lines")
                    .default_value("0")
                    .validator(Validator::range(0, i64::from(u32::MAX))),
            )
            .argument(
                ArgumentSpec::new("pattern")
                    .description("regular expression followed by files to search")
                    .required(),
            )
            .build()
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExecutionResult> {
        let re = self.regex()?;

        if self.files.is_empty() {
            let matched = self.process_source(stdin, stdout, None, &re)?;
            return Ok(ExecutionResult::from_success(matched));
        }

        let prefix_names = self.files.len() > 1;
        let mut matched = false;
        let mut failed = false;
        for name in &self.files {
            let shown = prefix_names.then_some(name.as_str());
            let outcome = open_file(env, "grep", name)
                .and_then(|mut f| self.process_source(&mut f, stdout, shown, &re));
            match outcome {
                Ok(found) => matched |= found,
                Err(e) => {
                    writeln!(stdout, "{e:#}")?;
                    failed = true;
                }
            }
        }
        Ok(ExecutionResult::from_success(matched && !failed))
    }
}

//! Error taxonomy for every stage of turning a line into running commands.
//!
//! Parser-level errors ([`ParseError`] and friends) are accumulated on a
//! [`ParsedCommand`](crate::parsed::ParsedCommand) and never abort matching.
//! Line-level errors ([`ShellError`]) stop building or running the rest of a line.

use thiserror::Error;

/// Problems found while splitting a raw line into words.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A quote character was opened and never closed.
    #[error("unterminated quote ({0})")]
    UnterminatedQuote(char),
}

/// Problems found while matching words against an option schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionParserError {
    /// The token looks like an option but no option of the schema matches it.
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    /// A value-taking option was the last word of the clause.
    #[error("option '{0}' requires a value")]
    MissingValue(String),
    /// A single-valued option was supplied more than once.
    #[error("option '{0}' given more than once")]
    DuplicateOption(String),
    /// The option exists but its activation predicate rejected it.
    #[error("option '{0}' is not available here")]
    InactiveOption(String),
    /// A map option received an entry without a `key=value` shape.
    #[error("option '{option}': malformed entry '{entry}', expected key=value")]
    MalformedMapEntry { option: String, entry: String },
    /// A residual word was found but the command takes no arguments.
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

/// A value rejected by the validator declared on its option or argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("option '{option}': invalid value '{value}': {reason}")]
pub struct OptionValidationError {
    pub option: String,
    pub value: String,
    pub reason: String,
}

/// Any error accumulated while populating a [`ParsedCommand`](crate::parsed::ParsedCommand).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Option(#[from] OptionParserError),
    #[error("option '{0}' is required")]
    RequiredOptionMissing(String),
    #[error("argument '{0}' is required")]
    RequiredArgumentMissing(String),
    #[error(transparent)]
    Validation(#[from] OptionValidationError),
}

/// Failure to turn a parsed command into a typed command instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("option '{option}': cannot convert '{value}': {reason}")]
    Conversion {
        option: String,
        value: String,
        reason: String,
    },
    #[error("{0}")]
    Invalid(String),
}

/// A command schema that violates its construction rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("command '{command}': option name '{name}' declared twice")]
    DuplicateName { command: String, name: String },
    #[error("command '{0}': option declared without a short or long name")]
    UnnamedOption(String),
    #[error("command '{command}': options '-{name}' and '--{name}' would share one value")]
    SharedIdentity { command: String, name: String },
}

/// Errors that stop building or running (part of) a line.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("aesh: {0}")]
    Lex(LexError),
    #[error("aesh: syntax error near unexpected token '{0}'")]
    Syntax(String),
    #[error("aesh: command not found: {0}")]
    CommandNotFound(String),
    #[error("{command}: {}", join_errors(.errors))]
    Parse {
        command: String,
        errors: Vec<ParseError>,
    },
    #[error("{command}: {source}")]
    Bind {
        command: String,
        #[source]
        source: BindError,
    },
    #[error("{command}: {message}")]
    CommandExecution { command: String, message: String },
    #[error("aesh: interrupted")]
    Interrupted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

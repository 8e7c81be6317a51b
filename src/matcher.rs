//! Option matching: turns one clause's words into a [`ParsedCommand`].
//!
//! Words are consumed left to right against a [`CommandSchema`]. Long options
//! (`--name`, `--name=value`, `--Dkey=value` for maps), clustered short options
//! (`-fX`, `-ebar`, `-Dkey=value`), `--` and residual arguments are handled
//! here. Nothing is thrown: every problem is recorded on the result and the
//! remaining words are still matched.

use crate::env::Environment;
use crate::error::{OptionParserError, OptionValidationError, ParseError};
use crate::lexer::Word;
use crate::parsed::ParsedCommand;
use crate::schema::{Arity, CommandSchema, OptionSpec, Validator};
use log::{trace, warn};

/// Matches words against one schema.
///
/// ```
/// use aesh::env::Environment;
/// use aesh::lexer::lex;
/// use aesh::matcher::OptionMatcher;
/// use aesh::schema::{ArgumentSpec, CommandSchema, OptionSpec};
///
/// let schema = CommandSchema::builder("greet")
///     .option(OptionSpec::single().short('n').long("name"))
///     .argument(ArgumentSpec::new("rest"))
///     .build()
///     .unwrap();
/// let env = Environment::empty("/");
/// let words = lex("--name=world extra").words;
/// let parsed = OptionMatcher::new(&schema, &env).parse(&words);
/// assert_eq!(parsed.value("name"), Some("world"));
/// assert_eq!(parsed.arguments(), ["extra"]);
/// ```
#[derive(Debug)]
pub struct OptionMatcher<'a> {
    schema: &'a CommandSchema,
    env: &'a Environment,
}

impl<'a> OptionMatcher<'a> {
    pub fn new(schema: &'a CommandSchema, env: &'a Environment) -> Self {
        Self { schema, env }
    }

    /// Match `words` (the command name already stripped) into a fresh result.
    pub fn parse(&self, words: &[Word]) -> ParsedCommand {
        let mut parsed = ParsedCommand::new();
        self.populate(words, &mut parsed);
        parsed
    }

    /// Match `words` into `parsed`, clearing whatever it held before.
    pub fn populate(&self, words: &[Word], parsed: &mut ParsedCommand) {
        parsed.clear();
        parsed.set_path(vec![self.schema.name().to_string()]);

        let mut words = words.iter();
        if self.schema.parsing_disabled() {
            for word in words {
                self.add_argument(&word.value, parsed);
            }
        } else {
            while let Some(word) = words.next() {
                if word.is_end_of_options() {
                    for rest in words.by_ref() {
                        self.add_argument(&rest.value, parsed);
                    }
                    break;
                }

                let pending = match word.value.strip_prefix("--") {
                    Some(body) if !body.is_empty() => self.match_long(body, parsed),
                    // A quoted "--" lands here as a plain word.
                    _ if word.value.len() > 1
                        && word.value.starts_with('-')
                        && word.value != "--" =>
                    {
                        self.match_short(&word.value[1..], parsed)
                    }
                    _ => {
                        self.add_argument(&word.value, parsed);
                        None
                    }
                };

                // The next word is the value, even when it looks like an option.
                if let Some(pending) = pending {
                    match (pending, words.next()) {
                        (Pending::Value(option), Some(value)) => {
                            self.accept_value(option, &value.value, parsed)
                        }
                        (Pending::Value(option), None) => {
                            parsed.mark_supplied(&option.name());
                            parsed.push_error(OptionParserError::MissingValue(
                                option.display_name(),
                            ));
                        }
                        (Pending::Discard, _) => {}
                    }
                }
            }
        }

        self.apply_defaults(parsed);
        trace!(
            "matched {:?}: {} argument(s), {} error(s)",
            self.schema.name(),
            parsed.arguments().len(),
            parsed.errors().len()
        );
    }

    fn match_long(&self, body: &str, parsed: &mut ParsedCommand) -> Option<Pending<'a>> {
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };

        if let Some(option) = self.schema.find_long(name) {
            if !self.check_active(option, parsed) {
                return (option.arity() != Arity::Boolean && inline.is_none())
                    .then_some(Pending::Discard);
            }
            return match (option.arity(), inline) {
                (Arity::Boolean, value) => {
                    self.set_flag(option, value.unwrap_or("true"), parsed);
                    None
                }
                (_, Some(value)) => {
                    self.accept_value(option, value, parsed);
                    None
                }
                (_, None) => Some(Pending::Value(option)),
            };
        }

        if let Some(option) = self.schema.find_map_prefix(name) {
            if !self.check_active(option, parsed) {
                return None;
            }
            let key = &name[option.long_name().map_or(0, str::len)..];
            match inline {
                Some(value) => self.accept_entry(option, key, value, parsed),
                None => parsed.push_error(OptionParserError::MalformedMapEntry {
                    option: option.display_name(),
                    entry: key.to_string(),
                }),
            }
            return None;
        }

        parsed.push_error(OptionParserError::UnknownOption(format!("--{name}")));
        None
    }

    fn match_short(&self, cluster: &str, parsed: &mut ParsedCommand) -> Option<Pending<'a>> {
        for (idx, c) in cluster.char_indices() {
            let Some(option) = self.schema.find_short(c) else {
                parsed.push_error(OptionParserError::UnknownOption(format!("-{c}")));
                return None;
            };
            let rest = &cluster[idx + c.len_utf8()..];
            if !self.check_active(option, parsed) {
                return (option.arity() != Arity::Boolean && rest.is_empty())
                    .then_some(Pending::Discard);
            }

            match option.arity() {
                Arity::Boolean => self.set_flag(option, "true", parsed),
                _ if rest.is_empty() => return Some(Pending::Value(option)),
                Arity::Map => {
                    self.accept_value(option, rest, parsed);
                    return None;
                }
                _ => {
                    self.accept_value(option, rest.strip_prefix('=').unwrap_or(rest), parsed);
                    return None;
                }
            }
        }
        None
    }

    fn check_active(&self, option: &OptionSpec, parsed: &mut ParsedCommand) -> bool {
        if option.is_active(parsed) {
            true
        } else {
            parsed.push_error(OptionParserError::InactiveOption(option.display_name()));
            false
        }
    }

    fn set_flag(&self, option: &OptionSpec, raw: &str, parsed: &mut ParsedCommand) {
        let name = option.name();
        if parsed.is_supplied(&name) {
            parsed.push_error(OptionParserError::DuplicateOption(option.display_name()));
            return;
        }
        parsed.mark_supplied(&name);
        parsed.set_single(&name, raw.to_string());
    }

    fn accept_value(&self, option: &OptionSpec, raw: &str, parsed: &mut ParsedCommand) {
        let name = option.name();
        match option.arity() {
            Arity::Boolean => self.set_flag(option, raw, parsed),
            Arity::Single => {
                if parsed.is_supplied(&name) {
                    parsed.push_error(OptionParserError::DuplicateOption(option.display_name()));
                    return;
                }
                parsed.mark_supplied(&name);
                if self.validate(&option.display_name(), option.value_validator(), raw, parsed) {
                    parsed.set_single(&name, raw.to_string());
                }
            }
            Arity::List => {
                parsed.mark_supplied(&name);
                parsed.ensure_list(&name);
                for piece in split_values(raw, option.value_separator()) {
                    let label = option.display_name();
                    if self.validate(&label, option.value_validator(), piece, parsed) {
                        parsed.push_list(&name, piece.to_string());
                    }
                }
            }
            Arity::Map => {
                parsed.mark_supplied(&name);
                parsed.ensure_map(&name);
                for piece in split_values(raw, option.value_separator()) {
                    match piece.split_once('=') {
                        Some((key, value)) => {
                            self.accept_entry(option, key.trim(), value.trim(), parsed)
                        }
                        None => parsed.push_error(OptionParserError::MalformedMapEntry {
                            option: option.display_name(),
                            entry: piece.to_string(),
                        }),
                    }
                }
            }
        }
    }

    fn accept_entry(
        &self,
        option: &OptionSpec,
        key: &str,
        value: &str,
        parsed: &mut ParsedCommand,
    ) {
        if key.is_empty() {
            parsed.push_error(OptionParserError::MalformedMapEntry {
                option: option.display_name(),
                entry: format!("={value}"),
            });
            return;
        }
        let name = option.name();
        parsed.mark_supplied(&name);
        if self.validate(&option.display_name(), option.value_validator(), value, parsed) {
            parsed.insert_entry(&name, key.to_string(), value.to_string());
        }
    }

    fn add_argument(&self, value: &str, parsed: &mut ParsedCommand) {
        match self.schema.argument() {
            Some(argument) => {
                if self.validate(argument.name(), argument.value_validator(), value, parsed) {
                    parsed.push_argument(value.to_string());
                }
            }
            None => parsed.push_error(OptionParserError::UnexpectedArgument(value.to_string())),
        }
    }

    fn validate(
        &self,
        label: &str,
        validator: Option<&Validator>,
        value: &str,
        parsed: &mut ParsedCommand,
    ) -> bool {
        match validator.map(|v| v.check(value)) {
            Some(Err(reason)) => {
                parsed.push_error(OptionValidationError {
                    option: label.to_string(),
                    value: value.to_string(),
                    reason,
                });
                false
            }
            _ => true,
        }
    }

    fn apply_defaults(&self, parsed: &mut ParsedCommand) {
        for option in self.schema.options() {
            let name = option.name();
            if !parsed.is_supplied(&name) && option.is_active(parsed) {
                self.apply_option_defaults(option, parsed);
            }
            match option.arity() {
                Arity::List => parsed.ensure_list(&name),
                Arity::Map => parsed.ensure_map(&name),
                Arity::Boolean | Arity::Single => {}
            }
        }

        if let Some(argument) = self.schema.argument() {
            if parsed.arguments().is_empty() {
                let (values, usable) = self.expand_defaults(argument.defaults());
                if argument.is_required() && !usable {
                    parsed.push_error(ParseError::RequiredArgumentMissing(
                        argument.name().to_string(),
                    ));
                } else {
                    for value in values {
                        parsed.push_argument(value);
                    }
                }
            }
        }
    }

    fn apply_option_defaults(&self, option: &OptionSpec, parsed: &mut ParsedCommand) {
        let (values, usable) = self.expand_defaults(option.defaults());
        if !usable && option.is_required() {
            parsed.push_error(ParseError::RequiredOptionMissing(option.display_name()));
            return;
        }

        let name = option.name();
        match option.arity() {
            Arity::Boolean | Arity::Single => {
                if let Some(first) = values.into_iter().next() {
                    parsed.set_single(&name, first);
                }
            }
            Arity::List => {
                for value in &values {
                    for piece in split_values(value, option.value_separator()) {
                        parsed.push_list(&name, piece.to_string());
                    }
                }
            }
            Arity::Map => {
                for value in &values {
                    for piece in split_values(value, option.value_separator()) {
                        match piece.split_once('=') {
                            Some((key, value)) => parsed.insert_entry(
                                &name,
                                key.trim().to_string(),
                                value.trim().to_string(),
                            ),
                            None => warn!(
                                "ignoring malformed default {:?} for {}",
                                piece,
                                option.display_name()
                            ),
                        }
                    }
                }
            }
        }
    }

    /// Expand `$(NAME)` placeholders. Unset variables keep the placeholder text;
    /// the flag reports whether at least one value was literal or resolved.
    fn expand_defaults(&self, defaults: &[String]) -> (Vec<String>, bool) {
        let mut usable = false;
        let values = defaults
            .iter()
            .map(|raw| match self.env.expand_placeholder(raw) {
                Some(value) => {
                    usable = true;
                    value
                }
                None => raw.clone(),
            })
            .collect();
        (values, usable)
    }
}

/// What the word after an option token is for.
enum Pending<'a> {
    Value(&'a OptionSpec),
    /// Value of a rejected option, dropped without further errors.
    Discard,
}

fn split_values(raw: &str, separator: char) -> impl Iterator<Item = &str> {
    raw.split(separator)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
}

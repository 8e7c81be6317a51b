//! Declarative description of the options and arguments a command accepts.
//!
//! Schemas are built once when a command is registered and are read-only
//! afterwards. The option matcher consumes them; nothing here inspects user input.

use crate::error::SchemaError;
use crate::parsed::ParsedCommand;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Default separator for list and map values.
pub const DEFAULT_SEPARATOR: char = ',';

/// How many values an option takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Presence alone sets the option to `true`.
    Boolean,
    /// Exactly one value.
    Single,
    /// Any number of values, split on the separator and accumulated.
    List,
    /// `key=value` entries, split on the separator and accumulated.
    Map,
}

/// Per-value validation rule.
#[derive(Clone)]
pub enum Validator {
    /// The whole value must match the expression.
    Pattern(Regex),
    /// The value must be an integer within `min..=max`.
    Range { min: i64, max: i64 },
    Custom(Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>),
}

impl Validator {
    /// Anchored regular expression validator.
    pub fn pattern(expr: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{expr})$")).map(Validator::Pattern)
    }

    pub fn range(min: i64, max: i64) -> Self {
        Validator::Range { min, max }
    }

    pub fn custom(check: impl Fn(&str) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Validator::Custom(Arc::new(check))
    }

    /// Check a single value, returning a human readable reason on rejection.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match self {
            Validator::Pattern(re) => {
                if re.is_match(value) {
                    Ok(())
                } else {
                    Err(format!("does not match {}", re.as_str()))
                }
            }
            Validator::Range { min, max } => match value.parse::<i64>() {
                Ok(n) if (*min..=*max).contains(&n) => Ok(()),
                Ok(_) => Err(format!("must be between {min} and {max}")),
                Err(_) => Err("not an integer".to_string()),
            },
            Validator::Custom(check) => check(value),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Validator::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Validator::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Predicate deciding whether an option may be used given the values bound so far.
#[derive(Clone)]
pub struct Activator(Arc<dyn Fn(&ParsedCommand) -> bool + Send + Sync>);

impl Activator {
    pub fn new(predicate: impl Fn(&ParsedCommand) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn is_active(&self, parsed: &ParsedCommand) -> bool {
        (self.0)(parsed)
    }
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Activator")
    }
}

/// One declared option.
///
/// Built with a small chained API:
///
/// ```
/// use aesh::schema::{OptionSpec, Validator};
/// let depth = OptionSpec::single()
///     .short('d')
///     .long("depth")
///     .default_value("1")
///     .validator(Validator::range(0, 16));
/// assert_eq!(depth.name(), "depth");
/// ```
#[derive(Debug, Clone)]
pub struct OptionSpec {
    short: Option<char>,
    long: Option<String>,
    description: String,
    arity: Arity,
    required: bool,
    separator: char,
    defaults: Vec<String>,
    validator: Option<Validator>,
    activator: Option<Activator>,
    inherited: bool,
}

impl OptionSpec {
    pub fn new(arity: Arity) -> Self {
        Self {
            short: None,
            long: None,
            description: String::new(),
            arity,
            required: false,
            separator: DEFAULT_SEPARATOR,
            defaults: Vec::new(),
            validator: None,
            activator: None,
            inherited: false,
        }
    }

    pub fn boolean() -> Self {
        Self::new(Arity::Boolean)
    }

    pub fn single() -> Self {
        Self::new(Arity::Single)
    }

    pub fn list() -> Self {
        Self::new(Arity::List)
    }

    pub fn map() -> Self {
        Self::new(Arity::Map)
    }

    pub fn short(mut self, name: char) -> Self {
        self.short = Some(name);
        self
    }

    pub fn long(mut self, name: impl Into<String>) -> Self {
        self.long = Some(name.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Add a default value. `$(NAME)` is looked up in the environment when applied.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.defaults.push(value.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn activator(
        mut self,
        predicate: impl Fn(&ParsedCommand) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.activator = Some(Activator::new(predicate));
        self
    }

    /// Copy this option into every child of the group command that declares it.
    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    /// Identity of the option: the long name, or the short name when there is none.
    pub fn name(&self) -> String {
        match (&self.long, self.short) {
            (Some(long), _) => long.clone(),
            (None, Some(short)) => short.to_string(),
            (None, None) => String::new(),
        }
    }

    /// The option as a user would type it, used in error messages.
    pub fn display_name(&self) -> String {
        match (&self.long, self.short) {
            (Some(long), _) => format!("--{long}"),
            (None, Some(short)) => format!("-{short}"),
            (None, None) => String::new(),
        }
    }

    pub fn short_name(&self) -> Option<char> {
        self.short
    }

    pub fn long_name(&self) -> Option<&str> {
        self.long.as_deref()
    }

    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn value_separator(&self) -> char {
        self.separator
    }

    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    pub fn value_validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn is_inherited(&self) -> bool {
        self.inherited
    }

    /// Evaluate the activation predicate; options without one are always active.
    pub fn is_active(&self, parsed: &ParsedCommand) -> bool {
        self.activator
            .as_ref()
            .is_none_or(|activator| activator.is_active(parsed))
    }

    fn collides_with(&self, other: &OptionSpec) -> bool {
        (self.short.is_some() && self.short == other.short)
            || (self.long.is_some() && self.long == other.long)
            || self.name() == other.name()
    }
}

/// The unnamed, positional part of a command: every residual word.
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    name: String,
    description: String,
    required: bool,
    defaults: Vec<String>,
    validator: Option<Validator>,
}

impl ArgumentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            defaults: Vec::new(),
            validator: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.defaults.push(value.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    pub fn value_validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }
}

/// Everything the shell knows about the shape of one command.
#[derive(Debug, Clone)]
pub struct CommandSchema {
    name: String,
    aliases: Vec<String>,
    description: String,
    options: Vec<OptionSpec>,
    argument: Option<ArgumentSpec>,
    disable_parsing: bool,
    children: Vec<CommandSchema>,
}

impl CommandSchema {
    pub fn builder(name: impl Into<String>) -> CommandSchemaBuilder {
        CommandSchemaBuilder {
            schema: CommandSchema {
                name: name.into(),
                aliases: Vec::new(),
                description: String::new(),
                options: Vec::new(),
                argument: None,
                disable_parsing: false,
                children: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn argument(&self) -> Option<&ArgumentSpec> {
        self.argument.as_ref()
    }

    /// When set, every word is an argument and nothing is treated as an option.
    pub fn parsing_disabled(&self) -> bool {
        self.disable_parsing
    }

    pub fn children(&self) -> &[CommandSchema] {
        &self.children
    }

    /// True for the command's own name or one of its aliases.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    pub fn child(&self, name: &str) -> Option<&CommandSchema> {
        self.children.iter().find(|c| c.matches_name(name))
    }

    pub fn find_long(&self, name: &str) -> Option<&OptionSpec> {
        self.options
            .iter()
            .find(|o| o.long.as_deref() == Some(name))
    }

    pub fn find_short(&self, name: char) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.short == Some(name))
    }

    /// Longest map option whose long name is a strict prefix of `token`,
    /// as in `--Dkey` for a map option named `D`.
    pub fn find_map_prefix(&self, token: &str) -> Option<&OptionSpec> {
        self.options
            .iter()
            .filter(|o| o.arity == Arity::Map)
            .filter(|o| {
                o.long
                    .as_deref()
                    .is_some_and(|long| token.len() > long.len() && token.starts_with(long))
            })
            .max_by_key(|o| o.long.as_deref().map_or(0, str::len))
    }
}

/// Builder returned by [`CommandSchema::builder`].
#[derive(Debug)]
pub struct CommandSchemaBuilder {
    schema: CommandSchema,
}

impl CommandSchemaBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.schema.aliases.push(alias.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.schema.description = text.into();
        self
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.schema.options.push(option);
        self
    }

    pub fn argument(mut self, argument: ArgumentSpec) -> Self {
        self.schema.argument = Some(argument);
        self
    }

    pub fn disable_parsing(mut self) -> Self {
        self.schema.disable_parsing = true;
        self
    }

    /// Add a sub-command. Inherited options of this schema are merged into it on `build`.
    pub fn child(mut self, child: CommandSchema) -> Self {
        self.schema.children.push(child);
        self
    }

    pub fn build(mut self) -> Result<CommandSchema, SchemaError> {
        check_unique_names(&self.schema)?;
        let inherited: Vec<OptionSpec> = self
            .schema
            .options
            .iter()
            .filter(|o| o.is_inherited())
            .cloned()
            .collect();
        if !inherited.is_empty() {
            for child in &mut self.schema.children {
                inherit_options(child, &inherited);
            }
        }
        Ok(self.schema)
    }
}

fn check_unique_names(schema: &CommandSchema) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    let mut identities = HashSet::new();
    for option in &schema.options {
        if option.short.is_none() && option.long.is_none() {
            return Err(SchemaError::UnnamedOption(schema.name.clone()));
        }
        let names = option
            .short
            .map(|c| format!("-{c}"))
            .into_iter()
            .chain(option.long.as_ref().map(|l| format!("--{l}")));
        for name in names {
            if !seen.insert(name.clone()) {
                return Err(SchemaError::DuplicateName {
                    command: schema.name.clone(),
                    name,
                });
            }
        }
        // `-f` and `--f` are distinct on the command line but not in ParsedCommand.
        if !identities.insert(option.name()) {
            return Err(SchemaError::SharedIdentity {
                command: schema.name.clone(),
                name: option.name(),
            });
        }
    }
    Ok(())
}

fn inherit_options(child: &mut CommandSchema, inherited: &[OptionSpec]) {
    for option in inherited {
        if !child.options.iter().any(|own| own.collides_with(option)) {
            child.options.push(option.clone());
        }
    }
    for grandchild in &mut child.children {
        inherit_options(grandchild, inherited);
    }
}

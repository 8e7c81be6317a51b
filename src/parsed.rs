//! The result of matching one clause's words against a
//! [`CommandSchema`](crate::schema::CommandSchema).

use crate::error::{BindError, ParseError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::str::FromStr;

static EMPTY_MAP: BTreeMap<String, String> = BTreeMap::new();

/// Accumulated value(s) of one option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Single(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

/// Values matched for one command invocation, before any binding.
///
/// Options are keyed by their identity (see [`OptionSpec::name`](crate::schema::OptionSpec::name)).
/// Errors accumulate instead of aborting; callers inspect [`errors`](Self::errors)
/// before binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    path: Vec<String>,
    values: BTreeMap<String, OptionValue>,
    supplied: BTreeSet<String>,
    arguments: Vec<String>,
    errors: Vec<ParseError>,
}

impl ParsedCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command path as resolved, e.g. `["remote", "add"]` for a group command.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The innermost command name.
    pub fn command(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    /// Single value of an option, or the first value of a list option.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            OptionValue::Single(v) => Some(v),
            OptionValue::List(v) => v.first().map(String::as_str),
            OptionValue::Map(_) => None,
        }
    }

    /// `true` when a boolean option was given (or defaulted) with a truthy value.
    pub fn flag(&self, name: &str) -> bool {
        self.value(name)
            .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
    }

    /// All values of an option; empty when the option has none.
    pub fn values(&self, name: &str) -> &[String] {
        match self.values.get(name) {
            Some(OptionValue::Single(v)) => std::slice::from_ref(v),
            Some(OptionValue::List(v)) => v,
            _ => &[],
        }
    }

    /// Entries of a map option; empty when the option has none.
    pub fn map(&self, name: &str) -> &BTreeMap<String, String> {
        match self.values.get(name) {
            Some(OptionValue::Map(m)) => m,
            _ => &EMPTY_MAP,
        }
    }

    /// Convert an option's value with `FromStr`.
    pub fn parse_value<T>(&self, name: &str) -> Result<Option<T>, BindError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.value(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| BindError::Conversion {
                    option: name.to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Residual words, in encounter order.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Whether the user typed the option (defaults do not count).
    pub fn is_supplied(&self, name: &str) -> bool {
        self.supplied.contains(name)
    }

    /// Whether the option holds any value, typed or defaulted.
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Forget everything so the instance can be reused for another parse.
    pub fn clear(&mut self) {
        self.path.clear();
        self.values.clear();
        self.supplied.clear();
        self.arguments.clear();
        self.errors.clear();
    }

    pub(crate) fn set_path(&mut self, path: Vec<String>) {
        self.path = path;
    }

    pub(crate) fn mark_supplied(&mut self, name: &str) {
        self.supplied.insert(name.to_string());
    }

    pub(crate) fn set_single(&mut self, name: &str, value: String) {
        self.values
            .insert(name.to_string(), OptionValue::Single(value));
    }

    pub(crate) fn push_list(&mut self, name: &str, value: String) {
        match self
            .values
            .entry(name.to_string())
            .or_insert_with(|| OptionValue::List(Vec::new()))
        {
            OptionValue::List(list) => list.push(value),
            other => *other = OptionValue::List(vec![value]),
        }
    }

    pub(crate) fn insert_entry(&mut self, name: &str, key: String, value: String) {
        match self
            .values
            .entry(name.to_string())
            .or_insert_with(|| OptionValue::Map(BTreeMap::new()))
        {
            OptionValue::Map(map) => {
                map.insert(key, value);
            }
            other => *other = OptionValue::Map(BTreeMap::from([(key, value)])),
        }
    }

    pub(crate) fn ensure_list(&mut self, name: &str) {
        self.values
            .entry(name.to_string())
            .or_insert_with(|| OptionValue::List(Vec::new()));
    }

    pub(crate) fn ensure_map(&mut self, name: &str) {
        self.values
            .entry(name.to_string())
            .or_insert_with(|| OptionValue::Map(BTreeMap::new()));
    }

    pub(crate) fn push_argument(&mut self, value: String) {
        self.arguments.push(value);
    }

    pub(crate) fn push_error(&mut self, error: impl Into<ParseError>) {
        self.errors.push(error.into());
    }
}

//! Splits a lexed line into [`Clause`]s, one per command.
//!
//! Chain operators (`;`, `&&`, `||`, `|`) end a clause. Redirections (`<`, `>`,
//! `>>`) take the next word as a file name and leave the clause open.

use crate::error::ShellError;
use crate::lexer::{Operator, Word};
use log::debug;
use std::fmt;

/// Operator that ends a clause and relates it to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOperator {
    /// `;`
    Sequence,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `|`
    Pipe,
}

impl ChainOperator {
    /// `None` for redirection operators.
    pub fn from_operator(op: Operator) -> Option<Self> {
        match op {
            Operator::Semicolon => Some(ChainOperator::Sequence),
            Operator::And => Some(ChainOperator::And),
            Operator::Or => Some(ChainOperator::Or),
            Operator::Pipe => Some(ChainOperator::Pipe),
            Operator::RedirectIn | Operator::RedirectOut | Operator::Append => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChainOperator::Sequence => ";",
            ChainOperator::And => "&&",
            ChainOperator::Or => "||",
            ChainOperator::Pipe => "|",
        }
    }
}

impl fmt::Display for ChainOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an output file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Truncate,
    Append,
}

/// The words of one command plus the operator that ends it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clause {
    /// Command name first, then its words. Redirection words are not included.
    pub words: Vec<Word>,
    /// `None` for the last clause of a line.
    pub operator: Option<ChainOperator>,
    /// File named by `<`.
    pub input: Option<String>,
    /// File named by `>` or `>>`.
    pub output: Option<(String, WriteMode)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    NeedCommand,
    NeedOperator,
    NeedArgument(Operator),
}

/// Group `words` into clauses.
///
/// An empty line gives no clauses. A trailing `;` is accepted; a trailing `&&`,
/// `||` or `|`, an operator in command position, or a redirection without a
/// file name is a [`ShellError::Syntax`].
///
/// Each clause keeps one input and one output target. A later `<`, `>` or `>>`
/// replaces an earlier one of the same direction, so only the last file named
/// is opened.
pub fn split_clauses(words: Vec<Word>) -> Result<Vec<Clause>, ShellError> {
    let mut clauses = Vec::new();
    let mut current = Clause::default();
    let mut state = ScanState::NeedCommand;

    for word in words {
        state = match (state, word.operator) {
            (ScanState::NeedCommand, Some(op)) | (ScanState::NeedArgument(_), Some(op)) => {
                return Err(ShellError::Syntax(op.as_str().to_string()));
            }
            (ScanState::NeedCommand, None) | (ScanState::NeedOperator, None) => {
                current.words.push(word);
                ScanState::NeedOperator
            }
            (ScanState::NeedOperator, Some(op)) => match ChainOperator::from_operator(op) {
                Some(chain) => {
                    current.operator = Some(chain);
                    clauses.push(std::mem::take(&mut current));
                    ScanState::NeedCommand
                }
                None => ScanState::NeedArgument(op),
            },
            (ScanState::NeedArgument(redirect), None) => {
                attach_redirect(&mut current, redirect, word.value);
                ScanState::NeedOperator
            }
        };
    }

    match state {
        ScanState::NeedOperator => clauses.push(current),
        ScanState::NeedArgument(op) => return Err(ShellError::Syntax(op.as_str().to_string())),
        ScanState::NeedCommand => {
            if let Some(op) = clauses.last().and_then(|c| c.operator) {
                if op != ChainOperator::Sequence {
                    return Err(ShellError::Syntax(op.as_str().to_string()));
                }
            }
        }
    }

    debug!("split line into {} clause(s)", clauses.len());
    Ok(clauses)
}

fn attach_redirect(clause: &mut Clause, redirect: Operator, target: String) {
    match redirect {
        Operator::RedirectIn => clause.input = Some(target),
        Operator::Append => clause.output = Some((target, WriteMode::Append)),
        _ => clause.output = Some((target, WriteMode::Truncate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn split(line: &str) -> Result<Vec<Clause>, ShellError> {
        split_clauses(lex(line).words)
    }

    fn names(clauses: &[Clause]) -> Vec<&str> {
        clauses.iter().map(|c| c.words[0].value.as_str()).collect()
    }

    fn syntax_token(line: &str) -> String {
        match split(line) {
            Err(ShellError::Syntax(token)) => token,
            other => panic!("expected syntax error for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn empty_line_has_no_clauses() {
        assert!(split("").unwrap().is_empty());
        assert!(split("   ").unwrap().is_empty());
    }

    #[test]
    fn chain_operators_end_clauses() {
        let clauses = split("a 1 && b || c | d ; e").unwrap();
        assert_eq!(names(&clauses), ["a", "b", "c", "d", "e"]);
        let ops: Vec<_> = clauses.iter().map(|c| c.operator).collect();
        assert_eq!(
            ops,
            [
                Some(ChainOperator::And),
                Some(ChainOperator::Or),
                Some(ChainOperator::Pipe),
                Some(ChainOperator::Sequence),
                None
            ]
        );
        assert_eq!(clauses[0].words.len(), 2);
    }

    #[test]
    fn redirections_stay_on_the_clause() {
        let clauses = split("sort < in.txt -r > out.txt && cat >> log").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].input.as_deref(), Some("in.txt"));
        assert_eq!(
            clauses[0].output,
            Some(("out.txt".to_string(), WriteMode::Truncate))
        );
        // words after a redirect target still belong to the command
        let words: Vec<_> = clauses[0].words.iter().map(|w| w.value.as_str()).collect();
        assert_eq!(words, ["sort", "-r"]);
        assert_eq!(clauses[1].output, Some(("log".to_string(), WriteMode::Append)));
    }

    #[test]
    fn last_redirection_wins() {
        let clauses = split("cmd > a >> b < x < y").unwrap();
        assert_eq!(clauses[0].output, Some(("b".to_string(), WriteMode::Append)));
        assert_eq!(clauses[0].input.as_deref(), Some("y"));
    }

    #[test]
    fn trailing_semicolon_is_accepted() {
        let clauses = split("a ;").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].operator, Some(ChainOperator::Sequence));
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(syntax_token("&& a"), "&&");
        assert_eq!(syntax_token("a ; ; b"), ";");
        assert_eq!(syntax_token("a &&"), "&&");
        assert_eq!(syntax_token("a |"), "|");
        assert_eq!(syntax_token("a >"), ">");
        assert_eq!(syntax_token("a > && b"), "&&");
        assert_eq!(syntax_token("a < | b"), "|");
    }

    #[test]
    fn quoted_operator_is_a_plain_word() {
        let clauses = split("echo '&&' \"|\"").unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].words.len(), 3);
    }
}

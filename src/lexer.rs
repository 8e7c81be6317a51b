//! Lexical analysis: splits a raw input line into [`Word`]s.
//!
//! Quoting, backslash-escaped spaces and the control operators
//! `;`, `&&`, `||`, `|`, `<`, `>`, `>>` are handled here. Operators are only
//! recognised outside quotes and when not escaped; the longest operator wins
//! (`>>` over `>`, `||` over `|`).

use crate::error::LexError;
use log::debug;
use std::fmt;

/// A control operator recognised by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `;`
    Semicolon,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `|`
    Pipe,
    /// `<`
    RedirectIn,
    /// `>`
    RedirectOut,
    /// `>>`
    Append,
}

impl Operator {
    /// The operator's shell syntax.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Semicolon => ";",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Pipe => "|",
            Operator::RedirectIn => "<",
            Operator::RedirectOut => ">",
            Operator::Append => ">>",
        }
    }

    /// Configuration operators attach a file to the current clause instead of ending it.
    pub fn is_redirection(self) -> bool {
        matches!(
            self,
            Operator::RedirectIn | Operator::RedirectOut | Operator::Append
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single token of the input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Unescaped, unquoted text.
    pub value: String,
    /// Whether any part of the word was quoted.
    pub quoted: bool,
    /// Set when the word is itself a control operator.
    pub operator: Option<Operator>,
}

impl Word {
    fn from_operator(op: Operator) -> Self {
        Self {
            value: op.as_str().to_string(),
            quoted: false,
            operator: Some(op),
        }
    }

    /// `--` on its own stops option interpretation for the rest of the clause.
    pub fn is_end_of_options(&self) -> bool {
        !self.quoted && self.operator.is_none() && self.value == "--"
    }
}

/// Output of [`lex`]: the words plus an error that belongs to the last clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexed {
    pub words: Vec<Word>,
    pub error: Option<LexError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
    quoted: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
            quoted: false,
        }
    }

    fn make_words(mut self) -> Lexed {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_unquoted(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        let error = match self.state {
            LexingState::ReadingSingleQuote => Some(LexError::UnterminatedQuote('\'')),
            LexingState::ReadingDoubleQuote => Some(LexError::UnterminatedQuote('"')),
            _ => None,
        };
        // An unterminated quote still yields the text read so far as a word.
        self.finish_word(&mut out);

        Lexed { words: out, error }
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<Word>) {
        match ch {
            ' ' | '\t' => self.finish_word(out),
            '\\' => {
                match self.peek_char() {
                    Some(next) if is_escapable(next) => {
                        self.read_char();
                        self.buffer.push(next);
                    }
                    _ => self.buffer.push('\\'),
                }
                self.state = LexingState::ReadingWord;
            }
            '"' => {
                self.quoted = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\'' => {
                self.quoted = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            ';' | '|' | '<' | '>' => {
                let op = self.read_operator(ch);
                self.finish_word(out);
                out.push(Word::from_operator(op));
            }
            '&' if self.peek_char() == Some('&') => {
                self.read_char();
                self.finish_word(out);
                out.push(Word::from_operator(Operator::And));
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' if matches!(self.peek_char(), Some('"') | Some('\\')) => {
                if let Some(next) = self.read_char() {
                    self.buffer.push(next);
                }
            }
            c => self.buffer.push(c),
        }
    }

    fn read_operator(&mut self, first: char) -> Operator {
        match (first, self.peek_char()) {
            ('|', Some('|')) => {
                self.read_char();
                Operator::Or
            }
            ('>', Some('>')) => {
                self.read_char();
                Operator::Append
            }
            ('|', _) => Operator::Pipe,
            ('>', _) => Operator::RedirectOut,
            ('<', _) => Operator::RedirectIn,
            _ => Operator::Semicolon,
        }
    }

    fn finish_word(&mut self, out: &mut Vec<Word>) {
        if self.state != LexingState::Start {
            out.push(Word {
                value: std::mem::take(&mut self.buffer),
                quoted: std::mem::take(&mut self.quoted),
                operator: None,
            });
            self.state = LexingState::Start;
        }
    }
}

fn is_escapable(ch: char) -> bool {
    matches!(
        ch,
        ' ' | '\t' | '\\' | '"' | '\'' | ';' | '|' | '&' | '<' | '>'
    )
}

/// Split a raw line into words.
///
/// Never fails: an unterminated quote is reported in [`Lexed::error`] and the
/// unfinished text is kept as the final word.
pub fn lex(line: &str) -> Lexed {
    let lexed = LexingFSM::new(line).make_words();
    debug!(
        "lexed {:?} into {} word(s), error: {:?}",
        line,
        lexed.words.len(),
        lexed.error
    );
    lexed
}

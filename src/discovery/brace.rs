//! Generic parser for brace-delimited configuration text.
//!
//! Understands the statement shape shared by nginx-like formats:
//!
//! ```text
//! name arg arg;
//! name arg {
//!     nested statements
//! }
//! ```
//!
//! Arguments may be bare words or single/double quoted strings, `#` starts a
//! comment that runs to the end of the line. The result is a tree of
//! [`Node`]s with no knowledge of what any directive means.

use std::ops::Range;

use logos::Logos;
use thiserror::Error;

#[derive(Logos, Debug, Clone, PartialEq)]
pub(crate) enum Token {
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    #[regex(r"#[^\n]*", logos::skip)]
    Comment,

    #[token("{")]
    BlockOpen,

    #[token("}")]
    BlockClose,

    #[token(";")]
    Semicolon,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unquote(lex.slice()))]
    Quoted(String),

    /// Anything up to whitespace, a brace or a semicolon. Must not start
    /// with a quote or a comment marker.
    #[regex(r#"[^ \t\r\n\f{};"'#][^ \t\r\n\f{};]*"#, |lex| lex.slice().to_string())]
    Word(String),
}

/// A token with its 1-based line and byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub token: Token,
    pub line: usize,
    pub span: Range<usize>,
}

/// A single statement, optionally owning a nested block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub args: Vec<String>,
    /// `Some` for `name args { ... }` statements, even when the block is empty
    pub block: Option<Vec<Node>>,
    /// 1-based line of the statement name
    pub line: usize,
}

impl Node {
    /// Arguments joined by single spaces.
    pub fn value(&self) -> String {
        self.args.join(" ")
    }

    pub fn children(&self) -> &[Node] {
        self.block.as_deref().unwrap_or(&[])
    }
}

/// Parse failure. `line` is 1-based and relative to the parsed text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BraceError {
    #[error("unrecognized input")]
    Lex { line: usize },

    #[error("block is never closed")]
    UnclosedBlock { line: usize },

    #[error("unexpected '}}'")]
    UnexpectedClose { line: usize },

    #[error("expected a directive name")]
    MissingName { line: usize },

    #[error("statement is not terminated by ';'")]
    UnterminatedStatement { line: usize },
}

impl BraceError {
    pub fn line(&self) -> usize {
        match self {
            BraceError::Lex { line }
            | BraceError::UnclosedBlock { line }
            | BraceError::UnexpectedClose { line }
            | BraceError::MissingName { line }
            | BraceError::UnterminatedStatement { line } => *line,
        }
    }
}

/// Parses configuration text into a statement tree.
pub fn parse(source: &str) -> Result<Vec<Node>, BraceError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: tokens.into_iter(),
    };
    parser.statements(None)
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Lexeme>, BraceError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut counted = 0;
    for (token, span) in Token::lexer(source).spanned() {
        line += source[counted..span.start].matches('\n').count();
        counted = span.start;
        match token {
            Ok(token) => tokens.push(Lexeme { token, line, span }),
            Err(()) => return Err(BraceError::Lex { line }),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: std::vec::IntoIter<Lexeme>,
}

impl Parser {
    /// Reads statements until end of input (top level) or the `}` matching
    /// the block opened at `opened_at`.
    fn statements(&mut self, opened_at: Option<usize>) -> Result<Vec<Node>, BraceError> {
        let mut nodes = Vec::new();
        loop {
            match self.tokens.next().map(|lexeme| (lexeme.token, lexeme.line)) {
                None => {
                    return match opened_at {
                        Some(line) => Err(BraceError::UnclosedBlock { line }),
                        None => Ok(nodes),
                    }
                }
                Some((Token::BlockClose, line)) => {
                    return match opened_at {
                        Some(_) => Ok(nodes),
                        None => Err(BraceError::UnexpectedClose { line }),
                    }
                }
                Some((Token::Word(name), line)) | Some((Token::Quoted(name), line)) => {
                    nodes.push(self.statement(name, line)?);
                }
                Some((_, line)) => return Err(BraceError::MissingName { line }),
            }
        }
    }

    fn statement(&mut self, name: String, line: usize) -> Result<Node, BraceError> {
        let mut args = Vec::new();
        loop {
            match self.tokens.next().map(|lexeme| (lexeme.token, lexeme.line)) {
                Some((Token::Word(arg), _)) | Some((Token::Quoted(arg), _)) => args.push(arg),
                Some((Token::Semicolon, _)) => {
                    return Ok(Node {
                        name,
                        args,
                        block: None,
                        line,
                    })
                }
                Some((Token::BlockOpen, open_line)) => {
                    let block = self.statements(Some(open_line))?;
                    return Ok(Node {
                        name,
                        args,
                        block: Some(block),
                        line,
                    });
                }
                Some((_, _)) | None => return Err(BraceError::UnterminatedStatement { line }),
            }
        }
    }
}

/// Strips the surrounding quotes and resolves backslash escapes.
fn unquote(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(c @ ('\\' | '"' | '\'')) => result.push(c),
            Some(c) => {
                result.push('\\');
                result.push(c);
            }
            None => result.push('\\'),
        }
    }

    result
}

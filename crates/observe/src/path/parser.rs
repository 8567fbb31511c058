//! Property-path lexer.
//!
//! A table-driven state machine over character classes. Each step maps
//! `(state, class)` to a next state and an action; a missing entry is a
//! parse error.
//!
//! Accepted forms: `a.b.c`, `a[0]`, `a["x y"]`, `['it\'s']`, surrounding
//! whitespace, and the empty string (zero keys). Inside quotes a backslash
//! escapes only the quote character that opened the segment.

use super::Key;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    BeforePath,
    InPath,
    BeforeIdent,
    InIdent,
    BeforeElement,
    AfterZero,
    InIndex,
    InSingleQuote,
    InDoubleQuote,
    AfterElement,
    AfterPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// `[A-Za-z_$]`
    Ident,
    /// `0`
    Zero,
    /// `1-9`
    Number,
    Whitespace,
    SingleQuote,
    DoubleQuote,
    OpenBracket,
    CloseBracket,
    Dot,
    Eof,
    Else,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    #[error("unexpected {class:?} character {ch:?} at offset {offset} ({state:?})")]
    UnexpectedChar {
        ch: char,
        class: CharClass,
        offset: usize,
        state: ParseState,
    },
    #[error("unexpected end of path ({state:?})")]
    UnexpectedEnd { state: ParseState },
}

#[derive(Clone, Copy)]
enum Action {
    Skip,
    Append,
    /// Append nothing, but mark the key as started so that `""` yields an
    /// empty key.
    Open,
    Push,
}

pub fn classify(ch: Option<char>) -> CharClass {
    let Some(ch) = ch else {
        return CharClass::Eof;
    };
    match ch {
        '[' => CharClass::OpenBracket,
        ']' => CharClass::CloseBracket,
        '.' => CharClass::Dot,
        '"' => CharClass::DoubleQuote,
        '\'' => CharClass::SingleQuote,
        '0' => CharClass::Zero,
        '_' | '$' => CharClass::Ident,
        ' ' | '\t' | '\n' | '\r' | '\u{a0}' | '\u{feff}' | '\u{2028}' | '\u{2029}' => {
            CharClass::Whitespace
        }
        'a'..='z' | 'A'..='Z' => CharClass::Ident,
        '1'..='9' => CharClass::Number,
        _ => CharClass::Else,
    }
}

fn transition(state: ParseState, class: CharClass) -> Option<(ParseState, Action)> {
    use Action::*;
    use CharClass as C;
    use ParseState as S;

    let step = match (state, class) {
        (S::BeforePath, C::Whitespace) => (S::BeforePath, Skip),
        (S::BeforePath, C::Ident) => (S::InIdent, Append),
        (S::BeforePath, C::OpenBracket) => (S::BeforeElement, Skip),
        (S::BeforePath, C::Eof) => (S::AfterPath, Skip),

        (S::InPath, C::Whitespace) => (S::InPath, Skip),
        (S::InPath, C::Dot) => (S::BeforeIdent, Skip),
        (S::InPath, C::OpenBracket) => (S::BeforeElement, Skip),
        (S::InPath, C::Eof) => (S::AfterPath, Skip),

        (S::BeforeIdent, C::Whitespace) => (S::BeforeIdent, Skip),
        (S::BeforeIdent, C::Ident) => (S::InIdent, Append),

        (S::InIdent, C::Ident | C::Zero | C::Number) => (S::InIdent, Append),
        (S::InIdent, C::Whitespace) => (S::InPath, Push),
        (S::InIdent, C::Dot) => (S::BeforeIdent, Push),
        (S::InIdent, C::OpenBracket) => (S::BeforeElement, Push),
        (S::InIdent, C::Eof) => (S::AfterPath, Push),

        (S::BeforeElement, C::Whitespace) => (S::BeforeElement, Skip),
        (S::BeforeElement, C::Zero) => (S::AfterZero, Append),
        (S::BeforeElement, C::Number) => (S::InIndex, Append),
        (S::BeforeElement, C::SingleQuote) => (S::InSingleQuote, Open),
        (S::BeforeElement, C::DoubleQuote) => (S::InDoubleQuote, Open),

        (S::AfterZero, C::Whitespace) => (S::AfterElement, Push),
        (S::AfterZero, C::CloseBracket) => (S::InPath, Push),

        (S::InIndex, C::Zero | C::Number) => (S::InIndex, Append),
        (S::InIndex, C::Whitespace) => (S::AfterElement, Skip),
        (S::InIndex, C::CloseBracket) => (S::InPath, Push),

        (S::InSingleQuote, C::SingleQuote) => (S::AfterElement, Skip),
        (S::InSingleQuote, C::Eof) => return None,
        (S::InSingleQuote, _) => (S::InSingleQuote, Append),

        (S::InDoubleQuote, C::DoubleQuote) => (S::AfterElement, Skip),
        (S::InDoubleQuote, C::Eof) => return None,
        (S::InDoubleQuote, _) => (S::InDoubleQuote, Append),

        (S::AfterElement, C::Whitespace) => (S::AfterElement, Skip),
        (S::AfterElement, C::CloseBracket) => (S::InPath, Push),

        _ => return None,
    };
    Some(step)
}

fn closing_quote(state: ParseState) -> Option<char> {
    match state {
        ParseState::InSingleQuote => Some('\''),
        ParseState::InDoubleQuote => Some('"'),
        _ => None,
    }
}

/// Parses `text` into its key sequence.
///
/// ```
/// use observe::path::{parse_path, Key};
///
/// let keys = parse_path(r#"a.b[0]["c d"]"#).unwrap();
/// assert_eq!(
///     keys,
///     vec![Key::from("a"), Key::from("b"), Key::Index(0), Key::from("c d")]
/// );
/// assert!(parse_path("a..b").is_err());
/// ```
pub fn parse_path(text: &str) -> Result<Vec<Key>, PathParseError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut keys = Vec::new();
    let mut key: Option<String> = None;
    let mut state = ParseState::BeforePath;
    let mut i = 0;

    loop {
        let current = chars.get(i).copied();

        if let (Some((_, '\\')), Some(quote)) = (current, closing_quote(state)) {
            if chars.get(i + 1).is_some_and(|&(_, next)| next == quote) {
                key.get_or_insert_with(String::new).push(quote);
                i += 2;
                continue;
            }
        }

        let class = classify(current.map(|(_, ch)| ch));
        let Some((next, action)) = transition(state, class) else {
            return Err(match current {
                Some((offset, ch)) => PathParseError::UnexpectedChar {
                    ch,
                    class,
                    offset,
                    state,
                },
                None => PathParseError::UnexpectedEnd { state },
            });
        };
        state = next;

        match action {
            Action::Skip => {}
            Action::Open => {
                key.get_or_insert_with(String::new);
            }
            Action::Append => {
                let buffer = key.get_or_insert_with(String::new);
                if let Some((_, ch)) = current {
                    buffer.push(ch);
                }
            }
            Action::Push => {
                if let Some(done) = key.take() {
                    keys.push(Key::from(done));
                }
            }
        }

        if state == ParseState::AfterPath {
            return Ok(keys);
        }
        i += 1;
    }
}

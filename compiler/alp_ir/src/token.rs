//! Tokens as produced by an external lexer.

use std::fmt;

use crate::{Span, Vocabulary};

/// Channel the parser reads from.
pub const DEFAULT_CHANNEL: u16 = 0;

/// Conventional channel for whitespace and comments.
pub const HIDDEN_CHANNEL: u16 = 1;

/// Numeric token type.
///
/// User-defined types start at [`TokenType::MIN_USER`]. Two negative values
/// are reserved: [`TokenType::EOF`] terminates every stream and
/// [`TokenType::EPSILON`] only ever appears in lookahead analysis results
/// ("the end of the rule was reached without consuming").
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TokenType(i32);

impl TokenType {
    pub const EOF: TokenType = TokenType(-1);
    pub const EPSILON: TokenType = TokenType(-2);
    pub const INVALID: TokenType = TokenType(0);
    pub const MIN_USER: TokenType = TokenType(1);

    #[inline]
    pub const fn new(raw: i32) -> Self {
        TokenType(raw)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn is_eof(self) -> bool {
        self.0 == Self::EOF.0
    }

    /// True for types a lexer may legitimately emit (including EOF).
    #[inline]
    pub const fn is_real(self) -> bool {
        self.0 == Self::EOF.0 || self.0 >= Self::MIN_USER.0
    }
}

impl fmt::Debug for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TokenType::EOF => f.write_str("EOF"),
            TokenType::EPSILON => f.write_str("EPSILON"),
            TokenType(raw) => write!(f, "T{raw}"),
        }
    }
}

impl From<i32> for TokenType {
    fn from(raw: i32) -> Self {
        TokenType(raw)
    }
}

/// A single token.
///
/// `index` is the position in the token stream; it is `None` for tokens
/// conjured by error recovery, which never existed in the input.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub kind: TokenType,
    pub text: Option<Box<str>>,
    pub span: Span,
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
    pub channel: u16,
    pub index: Option<usize>,
}

impl Token {
    pub fn new(kind: TokenType) -> Self {
        Token {
            kind,
            text: None,
            span: Span::DUMMY,
            line: 1,
            column: 0,
            channel: DEFAULT_CHANNEL,
            index: None,
        }
    }

    /// End-of-input marker.
    pub fn eof() -> Self {
        Self::new(TokenType::EOF).with_text("<EOF>")
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<Box<str>>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    #[must_use]
    pub fn on_channel(mut self, channel: u16) -> Self {
        self.channel = channel;
        self
    }

    /// A token invented by single-token insertion, positioned at `near`.
    pub fn conjured(kind: TokenType, text: impl Into<Box<str>>, near: &Token) -> Self {
        Token {
            kind,
            text: Some(text.into()),
            span: Span::point(near.span.start),
            line: near.line,
            column: near.column,
            channel: DEFAULT_CHANNEL,
            index: None,
        }
    }

    #[inline]
    pub fn is_conjured(&self) -> bool {
        self.index.is_none()
    }

    /// Text as written in the source, or the vocabulary name when the lexer
    /// did not keep the text.
    pub fn display_text(&self, vocabulary: &Vocabulary) -> String {
        match &self.text {
            Some(text) => text.to_string(),
            None => vocabulary.display_name(self.kind),
        }
    }

    /// Quoted, escaped form used in error messages: `'foo'`, `'<EOF>'`.
    pub fn error_display(&self, vocabulary: &Vocabulary) -> String {
        let raw = match &self.text {
            Some(text) => text.to_string(),
            None if self.kind.is_eof() => "<EOF>".to_string(),
            None => format!("<{}>", vocabulary.display_name(self.kind)),
        };
        format!("'{}'", escape_whitespace(&raw))
    }
}

/// Make line breaks and tabs visible in single-line messages.
pub(crate) fn escape_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_types() {
        assert!(TokenType::EOF.is_eof());
        assert!(TokenType::EOF.is_real());
        assert!(!TokenType::EPSILON.is_real());
        assert!(!TokenType::INVALID.is_real());
        assert!(TokenType::new(7).is_real());
        assert!(TokenType::EPSILON < TokenType::EOF);
    }

    #[test]
    fn test_conjured_token_position() {
        let near = Token::new(TokenType::new(3))
            .with_text("x")
            .with_span(Span::new(10, 11))
            .at(2, 4);
        let missing = Token::conjured(TokenType::new(5), "<missing ';'>", &near);

        assert!(missing.is_conjured());
        assert_eq!(missing.span, Span::point(10));
        assert_eq!((missing.line, missing.column), (2, 4));
    }

    #[test]
    fn test_error_display_escapes() {
        let vocab = Vocabulary::default();
        let tok = Token::new(TokenType::new(1)).with_text("a\nb");
        assert_eq!(tok.error_display(&vocab), "'a\\nb'");
        assert_eq!(Token::new(TokenType::EOF).error_display(&vocab), "'<EOF>'");
    }
}

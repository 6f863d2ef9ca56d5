//! Seekable token access for the parser.
//!
//! The parser only ever looks at tokens through [`TokenStream`]. Speculative
//! lookahead consumes tokens and then seeks back; `mark`/`release` bracket
//! such regions so unbuffered implementations know what must stay
//! addressable. [`CommonTokenStream`] keeps every token in memory, so marks
//! are bookkeeping only.

use crate::{Token, TokenType, DEFAULT_CHANNEL};

/// Marker returned by [`TokenStream::mark`]; hand it back to
/// [`TokenStream::release`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Mark(u32);

impl Mark {
    pub const fn new(id: u32) -> Self {
        Mark(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

/// Random-access view of the token sequence the parser consumes.
///
/// Lookahead offsets are 1-based: `lt(1)` is the current token, `lt(2)` the
/// one after it, `lt(-1)` the previously consumed token. Offset 0 is
/// undefined and yields `None`. Past the end every lookahead is EOF.
pub trait TokenStream {
    /// Token `k` positions from the current one.
    fn lt(&mut self, k: isize) -> Option<&Token>;

    /// Type of [`lt(k)`](Self::lt); [`TokenType::INVALID`] when undefined.
    fn la(&mut self, k: isize) -> TokenType {
        self.lt(k).map_or(TokenType::INVALID, |t| t.kind)
    }

    /// Stream index of the current token.
    fn index(&self) -> usize;

    /// Number of tokens in the stream, EOF included.
    fn size(&self) -> usize;

    /// Token at an absolute stream index, regardless of channel.
    fn get(&self, index: usize) -> Option<&Token>;

    /// Advance past the current token. Consuming EOF is a no-op.
    fn consume(&mut self);

    fn mark(&mut self) -> Mark;

    fn release(&mut self, mark: Mark);

    /// Move to absolute index `index` (snapped forward to the next token on
    /// the parser's channel).
    fn seek(&mut self, index: usize);

    /// Concatenated source text of tokens `start..=stop`, all channels.
    fn text(&self, start: usize, stop: usize) -> String {
        let mut out = String::new();
        for i in start..=stop {
            match self.get(i) {
                Some(tok) if !tok.kind.is_eof() => {
                    if let Some(text) = &tok.text {
                        out.push_str(text);
                    }
                }
                _ => break,
            }
        }
        out
    }
}

/// Fully buffered token stream that hides tokens off the parser's channel.
#[derive(Clone, Debug)]
pub struct CommonTokenStream {
    tokens: Vec<Token>,
    /// Index of the current token; always on-channel or EOF.
    p: usize,
    channel: u16,
    open_marks: u32,
}

impl CommonTokenStream {
    /// Buffer `tokens`, numbering them and appending EOF if missing.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_channel(tokens, DEFAULT_CHANNEL)
    }

    pub fn with_channel(mut tokens: Vec<Token>, channel: u16) -> Self {
        if tokens.last().map_or(true, |t| !t.kind.is_eof()) {
            let end = tokens.last().map_or(crate::Span::DUMMY, |t| {
                crate::Span::point(t.span.end)
            });
            let (line, column) = tokens.last().map_or((1, 0), |t| (t.line, t.column));
            tokens.push(Token::eof().with_span(end).at(line, column));
        }
        for (i, tok) in tokens.iter_mut().enumerate() {
            tok.index = Some(i);
        }
        let mut stream = CommonTokenStream {
            tokens,
            p: 0,
            channel,
            open_marks: 0,
        };
        stream.p = stream.next_on_channel(0);
        stream
    }

    /// Every buffered token, hidden ones included.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// Number of `mark` calls not yet released.
    pub fn open_marks(&self) -> u32 {
        self.open_marks
    }

    fn is_visible(&self, tok: &Token) -> bool {
        tok.channel == self.channel || tok.kind.is_eof()
    }

    /// First visible index at or after `i`.
    fn next_on_channel(&self, mut i: usize) -> usize {
        let last = self.tokens.len().saturating_sub(1);
        while i < last && !self.is_visible(&self.tokens[i]) {
            i += 1;
        }
        i.min(last)
    }

    /// Last visible index at or before `i`.
    fn prev_on_channel(&self, i: usize) -> Option<usize> {
        let mut i = i;
        loop {
            if self.is_visible(self.tokens.get(i)?) {
                return Some(i);
            }
            i = i.checked_sub(1)?;
        }
    }
}

impl TokenStream for CommonTokenStream {
    fn lt(&mut self, k: isize) -> Option<&Token> {
        match k {
            0 => None,
            k if k > 0 => {
                let mut i = self.p;
                for _ in 1..k {
                    if self.tokens[i].kind.is_eof() {
                        break;
                    }
                    i = self.next_on_channel(i + 1);
                }
                self.tokens.get(i)
            }
            k => {
                let mut i = self.p;
                for _ in 0..k.unsigned_abs() {
                    i = self.prev_on_channel(i.checked_sub(1)?)?;
                }
                self.tokens.get(i)
            }
        }
    }

    fn index(&self) -> usize {
        self.p
    }

    fn size(&self) -> usize {
        self.tokens.len()
    }

    fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    fn consume(&mut self) {
        if !self.tokens[self.p].kind.is_eof() {
            self.p = self.next_on_channel(self.p + 1);
        }
    }

    fn mark(&mut self) -> Mark {
        self.open_marks += 1;
        Mark(self.open_marks)
    }

    fn release(&mut self, _mark: Mark) {
        debug_assert!(self.open_marks > 0, "release without matching mark");
        self.open_marks = self.open_marks.saturating_sub(1);
    }

    fn seek(&mut self, index: usize) {
        self.p = self.next_on_channel(index);
    }
}

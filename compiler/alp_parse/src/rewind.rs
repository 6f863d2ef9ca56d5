//! Scoped stream rewind for speculative lookahead.

use std::ops::{Deref, DerefMut};

use alp_ir::{Mark, TokenStream};

/// Marks the stream on creation; on drop seeks back to where it was and
/// releases the mark.
///
/// Every exit from a speculative region, early return and unwinding
/// included, leaves the committed position untouched.
pub struct StreamRewind<'s, S: TokenStream + ?Sized> {
    stream: &'s mut S,
    index: usize,
    mark: Mark,
}

impl<'s, S: TokenStream + ?Sized> StreamRewind<'s, S> {
    pub fn new(stream: &'s mut S) -> Self {
        let index = stream.index();
        let mark = stream.mark();
        StreamRewind { stream, index, mark }
    }

    /// Committed position the stream returns to.
    pub fn origin(&self) -> usize {
        self.index
    }
}

impl<S: TokenStream + ?Sized> Deref for StreamRewind<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stream
    }
}

impl<S: TokenStream + ?Sized> DerefMut for StreamRewind<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stream
    }
}

impl<S: TokenStream + ?Sized> Drop for StreamRewind<'_, S> {
    fn drop(&mut self) {
        self.stream.seek(self.index);
        self.stream.release(self.mark);
    }
}

#[cfg(test)]
mod tests {
    use alp_ir::{CommonTokenStream, Token, TokenType};

    use super::*;

    fn stream() -> CommonTokenStream {
        CommonTokenStream::new((1..=3).map(|t| Token::new(TokenType::new(t))).collect())
    }

    #[test]
    fn test_rewinds_on_drop() {
        let mut s = stream();
        {
            let mut guard = StreamRewind::new(&mut s);
            guard.consume();
            guard.consume();
            assert_eq!(guard.index(), 2);
            assert_eq!(guard.open_marks(), 1);
        }
        assert_eq!(s.index(), 0);
        assert_eq!(s.open_marks(), 0);
    }

    #[test]
    fn test_rewinds_on_panic() {
        let mut s = stream();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut guard = StreamRewind::new(&mut s);
            guard.consume();
            panic!("speculation failed");
        }));
        assert!(result.is_err());
        assert_eq!(s.index(), 0);
        assert_eq!(s.open_marks(), 0);
    }
}

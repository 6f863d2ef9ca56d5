//! Shared primitives for the adaptive lookahead parser.
//!
//! This crate holds the types every other crate in the workspace speaks:
//!
//! - [`Span`]: byte range of a token in its source
//! - [`TokenType`], [`Token`]: what the external lexer hands over
//! - [`TokenSet`]: bitset of token types used for lookahead and recovery sets
//! - [`Vocabulary`]: display names for token types
//! - [`TokenStream`], [`CommonTokenStream`]: buffered, seekable token access
//!
//! Lexing itself is out of scope; any lexer that can produce a `Vec<Token>`
//! (or implement [`TokenStream`] directly) plugs in here.

mod span;
pub mod stream;
mod token;
mod token_set;
mod vocabulary;

pub use span::Span;
pub use stream::{CommonTokenStream, Mark, TokenStream};
pub use token::{Token, TokenType, DEFAULT_CHANNEL, HIDDEN_CHANNEL};
pub use token_set::{TokenSet, TokenSetIter};
pub use vocabulary::Vocabulary;

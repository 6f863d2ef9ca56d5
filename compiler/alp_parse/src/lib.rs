//! Adaptive lookahead parsing runtime.
//!
//! Drives a parse over an [`alp_atn::Atn`]: decisions are made by simulating
//! the ATN ahead of the input (SLL first, full LL on conflicts), and each
//! decision's outcomes are cached in a DFA shared by every parser of the
//! same [`Engine`].
//!
//! - [`Engine`]: grammar plus shared caches; clone it freely across threads
//! - [`Parser`]: rule lifecycle, token matching, error reporting; the base
//!   for hand-written or generated rule functions
//! - [`ParserInterpreter`]: parses any rule straight from the ATN
//! - [`ErrorStrategy`]: [`DefaultErrorStrategy`] recovers,
//!   [`BailErrorStrategy`] stops at the first error
//! - [`CodeCompletionCore`]: completion candidates at a caret position
//!
//! Parse trees live in a [`ContextArena`] and are addressed by
//! [`ContextId`].

mod completion;
mod config;
mod context;
pub mod dfa;
mod engine;
mod error;
mod hooks;
mod interpreter;
mod listener;
mod parser;
pub mod prediction;
mod rewind;
mod strategy;

pub use completion::{
    CandidateRule, CandidatesCollection, CodeCompletionCore, CompletionOptions, FollowSetWithPath,
    FollowSets,
};
pub use config::{ParserConfig, PredictionMode};
pub use context::{ContextArena, ContextId, ParseChild, RuleNode};
pub use dfa::{Dfa, DfaCache, DfaState, DfaStateId, DfaStats, Edge};
pub use engine::Engine;
pub use error::{ParseError, ParseFailure, RecognitionError, RecognitionErrorKind};
pub use hooks::{NoHooks, SemanticHooks};
pub use interpreter::ParserInterpreter;
pub use listener::{CollectingListener, ErrorListener, TracingListener};
pub use parser::{ParseResult, Parser, Recognizer};
pub use rewind::StreamRewind;
pub use strategy::{BailErrorStrategy, DefaultErrorStrategy, ErrorStrategy};

//! Augmented transition network (ATN) for the adaptive lookahead parser.
//!
//! A grammar is compiled to a graph of [`AtnState`]s joined by
//! [`Transition`]s: one start and one stop state per rule, consuming edges
//! for tokens, epsilon edges for structure, and call edges for rule
//! references. States with several outgoing edges are *decisions*; the
//! parser picks among their alternatives by simulating the graph ahead of
//! the input.
//!
//! # Building
//!
//! - [`GrammarBuilder`]: rules as [`Element`] trees and left-recursive
//!   alternative lists; the usual way in.
//! - [`AtnBuilder`]: raw states and transitions, for compilers that already
//!   produce an ATN.
//!
//! Both finish in [`AtnBuilder::build`], which validates the graph, numbers
//! decisions, and precomputes per-state LL(1) sets and rule follow links.

mod atn;
mod builder;
mod grammar;
mod ids;
mod ll1;
mod state;
mod transition;

pub use atn::{Atn, RuleInfo};
pub use builder::{AtnBuilder, AtnError};
pub use grammar::{Assoc, CompiledGrammar, Element, GrammarBuilder, RecursiveAlt};
pub use ids::{DecisionId, RuleId, StateId};
pub use state::{AtnState, StateKind};
pub use transition::{Transition, TransitionKind};

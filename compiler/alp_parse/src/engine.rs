//! Shared, grammar-scoped parsing state.

use std::sync::Arc;

use alp_atn::{Atn, CompiledGrammar, RuleId};
use alp_ir::{TokenStream, Vocabulary};
use dashmap::DashMap;

use crate::completion::{CodeCompletionCore, FollowSets};
use crate::dfa::DfaCache;
use crate::{Parser, ParserConfig, ParserInterpreter};

struct EngineInner {
    atn: Atn,
    vocabulary: Vocabulary,
    dfa: DfaCache,
    follow_sets: DashMap<RuleId, Arc<FollowSets>>,
}

/// A grammar ready for parsing: the ATN, its vocabulary, and the caches
/// built on top of them.
///
/// Cloning is cheap and every clone shares the same caches, so parsers on
/// any number of threads warm up one another's DFAs. Create one per grammar
/// when the grammar is loaded.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(atn: Atn, vocabulary: Vocabulary) -> Self {
        let dfa = DfaCache::new(&atn);
        Engine {
            inner: Arc::new(EngineInner {
                atn,
                vocabulary,
                dfa,
                follow_sets: DashMap::new(),
            }),
        }
    }

    #[inline]
    pub fn atn(&self) -> &Atn {
        &self.inner.atn
    }

    #[inline]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.inner.vocabulary
    }

    #[inline]
    pub fn dfa(&self) -> &DfaCache {
        &self.inner.dfa
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.inner.atn.rule_names()
    }

    /// Drop every cached prediction.
    pub fn reset_dfa(&self) {
        self.inner.dfa.clear();
    }

    pub fn parser<S: TokenStream>(&self, input: S) -> Parser<S> {
        Parser::new(self.clone(), input)
    }

    pub fn parser_with_config<S: TokenStream>(&self, input: S, config: ParserConfig) -> Parser<S> {
        Parser::with_config(self.clone(), input, config)
    }

    pub fn interpreter<S: TokenStream>(&self, input: S) -> ParserInterpreter<S> {
        ParserInterpreter::new(self.parser(input))
    }

    pub fn completion(&self) -> CodeCompletionCore {
        CodeCompletionCore::new(self.clone())
    }

    /// Follow sets of `rule`, computed on first use.
    pub(crate) fn follow_sets(&self, rule: RuleId) -> Arc<FollowSets> {
        if let Some(sets) = self.inner.follow_sets.get(&rule) {
            return Arc::clone(&sets);
        }
        let computed = Arc::new(FollowSets::determine(self.atn(), rule));
        Arc::clone(
            &self
                .inner
                .follow_sets
                .entry(rule)
                .or_insert(computed),
        )
    }
}

impl From<CompiledGrammar> for Engine {
    fn from(grammar: CompiledGrammar) -> Self {
        Engine::new(grammar.atn, grammar.vocabulary)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rules", &self.inner.atn.num_rules())
            .field("decisions", &self.inner.atn.num_decisions())
            .field("dfa_states", &self.inner.dfa.num_states())
            .finish_non_exhaustive()
    }
}

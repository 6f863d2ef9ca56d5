//! Per-decision DFA cache.
//!
//! Each decision gets a [`Dfa`] whose states are the configuration sets
//! prediction has seen, deduplicated by [`ConfigSignature`], and whose edges
//! record which state one more token of lookahead leads to. Everything is
//! append-only and a pure function of the ATN, so parsers on any number of
//! threads may populate the same cache; two threads racing on the same
//! insertion converge on one state.
//!
//! Clearing a DFA starts a new generation. State ids carry the generation
//! they were issued in, so edges held by a prediction that was in flight
//! during the clear no longer resolve.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use alp_atn::{Atn, DecisionId};
use alp_ir::TokenType;
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::prediction::{ConfigSet, ConfigSignature};

/// Index of a state within one generation of a [`Dfa`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DfaStateId {
    generation: u32,
    index: u32,
}

impl DfaStateId {
    pub const fn index(self) -> usize {
        self.index as usize
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// Where a token leads from a DFA state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Edge {
    Target(DfaStateId),
    /// No alternative can take the token.
    Error,
}

/// A configuration set prediction has reached, plus its verdict.
#[derive(Debug)]
pub struct DfaState {
    /// `None` for transient states that were never added to a DFA.
    pub id: Option<DfaStateId>,
    pub configs: ConfigSet,
    /// Alternative predicted once this state is reached.
    pub prediction: Option<u32>,
    /// SLL conflict; full-context prediction should decide instead.
    pub requires_full_context: bool,
    edges: RwLock<FxHashMap<TokenType, Edge>>,
}

impl DfaState {
    /// A state used for one prediction only.
    pub fn transient(configs: ConfigSet, prediction: Option<u32>, requires_full_context: bool) -> Self {
        DfaState {
            id: None,
            configs,
            prediction,
            requires_full_context,
            edges: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn is_accept(&self) -> bool {
        self.prediction.is_some()
    }

    /// Number of recorded outgoing edges.
    pub fn num_edges(&self) -> usize {
        self.edges.read().len()
    }
}

/// Cache hit and miss counts.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DfaStats {
    /// Lookahead steps answered from the table.
    pub hits: u64,
    /// Lookahead steps that had to simulate the ATN.
    pub misses: u64,
}

impl std::ops::Add for DfaStats {
    type Output = DfaStats;

    fn add(self, rhs: DfaStats) -> DfaStats {
        DfaStats {
            hits: self.hits + rhs.hits,
            misses: self.misses + rhs.misses,
        }
    }
}

/// The DFA of one decision.
#[derive(Debug)]
pub struct Dfa {
    decision: DecisionId,
    states: RwLock<Vec<Arc<DfaState>>>,
    /// Bumped by [`clear`](Self::clear), only while `states` is write-locked.
    generation: AtomicU32,
    by_signature: DashMap<ConfigSignature, DfaStateId>,
    /// Start states, keyed by the precedence floor they were computed for.
    starts: DashMap<i32, DfaStateId>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Dfa {
    pub fn new(decision: DecisionId) -> Self {
        Dfa {
            decision,
            states: RwLock::new(Vec::new()),
            generation: AtomicU32::new(0),
            by_signature: DashMap::new(),
            starts: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn decision(&self) -> DecisionId {
        self.decision
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    /// Times this DFA has been cleared.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// The state `id` names, unless it was issued before the last clear.
    pub fn state(&self, id: DfaStateId) -> Option<Arc<DfaState>> {
        let states = self.states.read();
        if id.generation != self.generation.load(Ordering::Acquire) {
            return None;
        }
        states.get(id.index()).cloned()
    }

    /// Snapshot of every state added so far, in id order.
    pub fn states(&self) -> Vec<Arc<DfaState>> {
        self.states.read().clone()
    }

    pub fn start_state(&self, precedence: i32) -> Option<Arc<DfaState>> {
        let id = self.starts.get(&precedence).map(|r| *r)?;
        self.state(id)
    }

    /// Record the start state for `precedence`. The first one recorded in
    /// the current generation wins.
    pub fn set_start_state(&self, precedence: i32, state: &DfaState) {
        let Some(id) = state.id else {
            return;
        };
        let current = self.generation();
        self.starts
            .entry(precedence)
            .and_modify(|start| {
                if start.generation != current {
                    *start = id;
                }
            })
            .or_insert(id);
    }

    /// The state for `configs`' signature, adding it if new. A state that
    /// is already present keeps its original verdict.
    pub fn add_state(&self, configs: ConfigSet, prediction: Option<u32>, requires_full_context: bool) -> Arc<DfaState> {
        let signature = configs.signature();
        if let Some(known) = self.by_signature.get(&signature).map(|r| *r) {
            match self.state(known) {
                Some(existing) => return existing,
                // Inserted by a caller that raced a clear.
                None => {
                    self.by_signature.remove_if(&signature, |_, id| *id == known);
                }
            }
        }
        let mut configs = Some(configs);
        let mut created = None;
        let id = *self.by_signature.entry(signature).or_insert_with(|| {
            let mut states = self.states.write();
            let id = DfaStateId {
                generation: self.generation.load(Ordering::Acquire),
                index: states.len() as u32,
            };
            let state = Arc::new(DfaState {
                id: Some(id),
                configs: configs.take().unwrap_or_default(),
                prediction,
                requires_full_context,
                edges: RwLock::new(FxHashMap::default()),
            });
            states.push(Arc::clone(&state));
            created = Some(state);
            id
        });
        // `state` misses only if `clear` ran concurrently.
        self.state(id).or(created).unwrap_or_else(|| {
            Arc::new(DfaState::transient(
                configs.unwrap_or_default(),
                prediction,
                requires_full_context,
            ))
        })
    }

    pub fn edge(&self, from: &DfaState, t: TokenType) -> Option<Edge> {
        from.edges.read().get(&t).copied()
    }

    /// Record an edge out of `from`. Transient states take no edges.
    pub fn add_edge(&self, from: &DfaState, t: TokenType, edge: Edge) {
        if from.id.is_some() {
            from.edges.write().insert(t, edge);
        }
    }

    /// Cached verdict for a configuration set, if this DFA has seen it.
    pub fn lookup(&self, configs: &ConfigSet) -> Option<u32> {
        let id = self.by_signature.get(&configs.signature()).map(|r| *r)?;
        self.state(id)?.prediction
    }

    pub fn stats(&self) -> DfaStats {
        DfaStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        {
            let mut states = self.states.write();
            self.generation.fetch_add(1, Ordering::AcqRel);
            states.clear();
        }
        self.starts.clear();
        self.by_signature.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// One [`Dfa`] per decision of an ATN.
#[derive(Debug)]
pub struct DfaCache {
    dfas: Vec<Dfa>,
}

impl DfaCache {
    pub fn new(atn: &Atn) -> Self {
        DfaCache {
            dfas: (0..atn.num_decisions())
                .map(|d| Dfa::new(DecisionId::new(d as u32)))
                .collect(),
        }
    }

    pub fn get(&self, decision: DecisionId) -> Option<&Dfa> {
        self.dfas.get(decision.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dfa> {
        self.dfas.iter()
    }

    pub fn lookup(&self, decision: DecisionId, configs: &ConfigSet) -> Option<u32> {
        self.get(decision)?.lookup(configs)
    }

    /// Record a verdict for `configs`; returns the verdict now cached,
    /// which is the earlier one if the set was already known.
    pub fn insert(&self, decision: DecisionId, configs: ConfigSet, prediction: Option<u32>) -> Option<u32> {
        let dfa = self.get(decision)?;
        dfa.add_state(configs, prediction, false).prediction
    }

    pub fn len(&self) -> usize {
        self.dfas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dfas.is_empty()
    }

    /// States across all decisions.
    pub fn num_states(&self) -> usize {
        self.dfas.iter().map(Dfa::len).sum()
    }

    pub fn stats(&self) -> DfaStats {
        self.dfas
            .iter()
            .map(Dfa::stats)
            .fold(DfaStats::default(), |acc, s| acc + s)
    }

    /// Forget everything. Predictions afterwards are identical, only slower
    /// until the cache warms up again.
    pub fn clear(&self) {
        for dfa in &self.dfas {
            dfa.clear();
        }
        debug!(decisions = self.dfas.len(), "cleared DFA cache");
    }
}

//! Simulation configurations and sets of them.

use std::sync::Arc;

use alp_atn::{Atn, StateId};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ContextId;

/// A simulated return frame: where to continue once the called rule ends,
/// and the precedence floor the caller had.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Frame {
    pub return_state: StateId,
    pub precedence: i32,
}

/// Return frames pushed by the simulation itself; top is last.
pub type PredictionStack = SmallVec<[Frame; 4]>;

/// Where a configuration stands relative to the rule the decision is in,
/// once its own frames have run out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum OuterContext {
    /// Still inside the decision rule.
    Local,
    /// Returned into some caller through the global follow links; the
    /// actual caller is unknown.
    Follow,
    /// As `Follow`, through a precedence-0 call of a left-recursive rule.
    /// Exempt from the precedence filter.
    OutermostFollow,
    /// Returned into the live invocation `ContextId`.
    Invocation(ContextId),
    /// Left the outermost invocation.
    Root,
}

/// Identity of a configuration minus its alternative.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    pub state: StateId,
    /// Lowest operator level a precedence predicate may pass with.
    pub precedence: i32,
    pub stack: PredictionStack,
    pub outer: OuterContext,
}

impl ConfigKey {
    pub fn new(state: StateId, precedence: i32) -> Self {
        ConfigKey {
            state,
            precedence,
            stack: PredictionStack::new(),
            outer: OuterContext::Local,
        }
    }

    /// Same context, different state.
    #[must_use]
    pub fn moved(&self, state: StateId) -> Self {
        ConfigKey {
            state,
            ..self.clone()
        }
    }

    /// True once the simulation has returned out of the decision rule.
    pub fn left_decision_rule(&self) -> bool {
        self.outer != OuterContext::Local
    }

    /// Predicates that inspect rule context can only be evaluated here.
    pub fn in_decision_invocation(&self) -> bool {
        self.stack.is_empty() && self.outer == OuterContext::Local
    }
}

/// A configuration: a key and the alternative it descends from.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AtnConfig {
    pub key: ConfigKey,
    pub alt: u32,
}

/// Set of alternative numbers (1-based).
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AltSet(SmallVec<[u64; 1]>);

impl AltSet {
    pub fn single(alt: u32) -> Self {
        let mut set = AltSet::default();
        set.insert(alt);
        set
    }

    pub fn insert(&mut self, alt: u32) -> bool {
        let (word, bit) = ((alt / 64) as usize, 1u64 << (alt % 64));
        if self.0.len() <= word {
            self.0.resize(word + 1, 0);
        }
        let fresh = self.0[word] & bit == 0;
        self.0[word] |= bit;
        fresh
    }

    pub fn contains(&self, alt: u32) -> bool {
        self.0
            .get((alt / 64) as usize)
            .is_some_and(|w| w & (1u64 << (alt % 64)) != 0)
    }

    pub fn union_with(&mut self, other: &AltSet) {
        if self.0.len() < other.0.len() {
            self.0.resize(other.0.len(), 0);
        }
        for (w, o) in self.0.iter_mut().zip(other.0.iter()) {
            *w |= o;
        }
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }

    pub fn min_alt(&self) -> Option<u32> {
        self.0
            .iter()
            .enumerate()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i as u32 * 64 + w.trailing_zeros())
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().enumerate().flat_map(|(i, &w)| {
            (0..64u32)
                .filter(move |b| w & (1u64 << b) != 0)
                .map(move |b| i as u32 * 64 + b)
        })
    }
}

impl FromIterator<u32> for AltSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = AltSet::default();
        for alt in iter {
            set.insert(alt);
        }
        set
    }
}

/// Configurations reached after some number of lookahead tokens.
///
/// Keyed by [`ConfigKey`], so two configurations with the same state and
/// context share one entry and only their alternatives are merged.
#[derive(Clone, Debug, Default)]
pub struct ConfigSet {
    entries: Vec<(ConfigKey, AltSet)>,
    index: FxHashMap<ConfigKey, usize>,
    predicated: bool,
}

impl ConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `alt` for `key`. Returns false if it was already present.
    pub fn add(&mut self, key: ConfigKey, alt: u32) -> bool {
        if let Some(&i) = self.index.get(&key) {
            return self.entries[i].1.insert(alt);
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, AltSet::single(alt)));
        true
    }

    /// Number of distinct (state, context) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ConfigKey, &AltSet)> {
        self.entries.iter().map(|(k, a)| (k, a))
    }

    /// Every (key, alt) pair.
    pub fn configs(&self) -> impl Iterator<Item = (&ConfigKey, u32)> {
        self.entries
            .iter()
            .flat_map(|(k, alts)| alts.iter().map(move |a| (k, a)))
    }

    /// Keep only entries whose state satisfies `keep`.
    pub fn retain_states(&mut self, mut keep: impl FnMut(StateId) -> bool) {
        if self.entries.iter().all(|(k, _)| keep(k.state)) {
            return;
        }
        let entries = std::mem::take(&mut self.entries);
        self.index.clear();
        for (key, alts) in entries {
            if keep(key.state) {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, alts));
            }
        }
    }

    /// A semantic predicate was evaluated while building this set, so it
    /// depends on more than the ATN and must not be cached.
    pub fn is_predicated(&self) -> bool {
        self.predicated
    }

    pub fn mark_predicated(&mut self) {
        self.predicated = true;
    }

    /// Union of all alternatives.
    pub fn alts(&self) -> AltSet {
        let mut all = AltSet::default();
        for (_, alts) in &self.entries {
            all.union_with(alts);
        }
        all
    }

    pub fn unique_alt(&self) -> Option<u32> {
        let alts = self.alts();
        if alts.len() == 1 {
            alts.min_alt()
        } else {
            None
        }
    }

    pub fn all_in_rule_stop(&self, atn: &Atn) -> bool {
        self.entries
            .iter()
            .all(|(k, _)| atn.state(k.state).is_rule_stop())
    }

    /// Can context-free simulation stop here with a conflict?
    ///
    /// Yes when every configuration has run off the end of the rules, or
    /// when some (state, context) carries several alternatives and no state
    /// is associated with just one alternative (more lookahead could not
    /// separate them).
    pub fn has_sll_conflict_terminating(&self, atn: &Atn) -> bool {
        if self.all_in_rule_stop(atn) {
            return true;
        }
        if !self.entries.iter().any(|(_, alts)| alts.len() > 1) {
            return false;
        }
        let mut by_state: FxHashMap<StateId, AltSet> = FxHashMap::default();
        for (key, alts) in &self.entries {
            by_state.entry(key.state).or_default().union_with(alts);
        }
        !by_state.values().any(|alts| alts.len() == 1)
    }

    /// The alternative every (state, context) group agrees on as its
    /// minimum, if they all agree.
    pub fn single_viable_alt(&self) -> Option<u32> {
        let mut viable = None;
        for (_, alts) in &self.entries {
            let min = alts.min_alt()?;
            match viable {
                None => viable = Some(min),
                Some(v) if v != min => return None,
                Some(_) => {}
            }
        }
        viable
    }

    /// Lowest alternative among configurations that already finished the
    /// decision rule (or the outermost rule).
    pub fn min_finished_alt(&self, atn: &Atn) -> Option<u32> {
        self.entries
            .iter()
            .filter(|(k, _)| k.left_decision_rule() || atn.state(k.state).is_rule_stop())
            .filter_map(|(_, alts)| alts.min_alt())
            .min()
    }

    /// Start-state filter for the loop decision of a left-recursive rule:
    /// drop every other alternative wherever alternative 1 (another loop
    /// iteration) already reaches the same state with the same stack.
    pub fn precedence_filter(&self) -> ConfigSet {
        let from_alt1: FxHashSet<(StateId, &PredictionStack)> = self
            .entries
            .iter()
            .filter(|(_, alts)| alts.contains(1))
            .map(|(k, _)| (k.state, &k.stack))
            .collect();
        let mut out = ConfigSet {
            predicated: self.predicated,
            ..ConfigSet::default()
        };
        for (key, alts) in &self.entries {
            let shadowed = key.outer != OuterContext::OutermostFollow
                && from_alt1.contains(&(key.state, &key.stack));
            for alt in alts.iter() {
                if alt == 1 || !shadowed {
                    out.add(key.clone(), alt);
                }
            }
        }
        out
    }

    /// Canonical, order-independent identity of the set.
    pub fn signature(&self) -> ConfigSignature {
        let mut entries = self.entries.clone();
        entries.sort_unstable();
        ConfigSignature(entries.into())
    }
}

/// Sorted entry list of a [`ConfigSet`]; equal signatures mean equal sets.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConfigSignature(Arc<[(ConfigKey, AltSet)]>);

impl ConfigSignature {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(state: u32) -> ConfigKey {
        ConfigKey::new(StateId::new(state), 0)
    }

    #[test]
    fn test_alt_set_basics() {
        let set: AltSet = [3, 1, 70].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert_eq!(set.min_alt(), Some(1));
        assert!(set.contains(70));
        assert!(!set.contains(2));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3, 70]);
    }

    #[test]
    fn test_add_merges_alternatives() {
        let mut set = ConfigSet::new();
        assert!(set.add(key(4), 1));
        assert!(set.add(key(4), 2));
        assert!(!set.add(key(4), 2));
        assert!(set.add(key(5), 2));
        assert_eq!(set.len(), 2);
        assert_eq!(set.configs().count(), 3);
        assert_eq!(set.unique_alt(), None);
    }

    #[test]
    fn test_signature_ignores_insertion_order() {
        let mut a = ConfigSet::new();
        a.add(key(4), 1);
        a.add(key(7), 2);
        let mut b = ConfigSet::new();
        b.add(key(7), 2);
        b.add(key(4), 1);
        assert_eq!(a.signature(), b.signature());

        b.add(key(7), 3);
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_unique_alt_from_owned_union() {
        let mut set = ConfigSet::new();
        set.add(key(4), 2);
        set.add(key(5), 2);
        assert_eq!(set.alts().min_alt(), Some(2));
        assert_eq!(set.unique_alt(), Some(2));
        assert_eq!(ConfigSet::new().alts().min_alt(), None);
    }

    #[test]
    fn test_single_viable_alt() {
        let mut set = ConfigSet::new();
        set.add(key(4), 1);
        set.add(key(4), 2);
        set.add(key(5), 1);
        assert_eq!(set.single_viable_alt(), Some(1));
        set.add(key(6), 2);
        assert_eq!(set.single_viable_alt(), None);
    }

    #[test]
    fn test_precedence_filter_drops_shadowed_alternatives() {
        let mut set = ConfigSet::new();
        set.add(key(4), 1);
        let mut returned = key(4);
        returned.outer = OuterContext::Follow;
        set.add(returned.clone(), 2);
        let mut outermost = key(4);
        outermost.outer = OuterContext::OutermostFollow;
        set.add(outermost.clone(), 2);
        set.add(key(9), 2);

        let filtered = set.precedence_filter();
        let kept: Vec<_> = filtered.configs().map(|(k, a)| (k.clone(), a)).collect();
        assert_eq!(kept, vec![(key(4), 1), (outermost, 2), (key(9), 2)]);
    }

    #[test]
    fn test_retain_states_reindexes() {
        let mut set = ConfigSet::new();
        set.add(key(4), 1);
        set.add(key(5), 2);
        set.retain_states(|s| s == StateId::new(5));
        assert_eq!(set.len(), 1);
        assert!(!set.add(key(5), 2));
        assert!(set.add(key(4), 1));
    }
}

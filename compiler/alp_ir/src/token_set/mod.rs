//! Sets of token types.
//!
//! Used everywhere lookahead is summarized: LL(1) next-token sets of ATN
//! states, "expected" sets in error messages, and resynchronization sets in
//! error recovery. Grammars can have any number of token types, so unlike a
//! fixed-width mask the set grows in 64-bit words; the two reserved negative
//! types are kept as flags.

use std::fmt;

use smallvec::SmallVec;

use crate::{TokenType, Vocabulary};

const WORD_BITS: usize = 64;

/// A set of token types with O(1) membership testing.
///
/// # Example
/// ```text
/// let mut follow = TokenSet::of([SEMI, RBRACE]);
/// follow.insert(TokenType::EOF);
/// assert!(follow.contains(SEMI));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenSet {
    /// Bit `t` is set for user type `t`. No trailing zero words.
    words: SmallVec<[u64; 2]>,
    eof: bool,
    epsilon: bool,
}

impl TokenSet {
    /// Create an empty token set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(t: TokenType) -> Self {
        let mut set = Self::new();
        set.insert(t);
        set
    }

    pub fn of(types: impl IntoIterator<Item = TokenType>) -> Self {
        types.into_iter().collect()
    }

    /// All user types in `lo..=hi`.
    pub fn range(lo: TokenType, hi: TokenType) -> Self {
        let mut set = Self::new();
        set.insert_range(lo, hi);
        set
    }

    pub fn insert(&mut self, t: TokenType) {
        match t {
            TokenType::EOF => self.eof = true,
            TokenType::EPSILON => self.epsilon = true,
            _ if t.raw() < 0 => {}
            _ => {
                let (word, bit) = Self::slot(t);
                if self.words.len() <= word {
                    self.words.resize(word + 1, 0);
                }
                self.words[word] |= bit;
            }
        }
    }

    pub fn insert_range(&mut self, lo: TokenType, hi: TokenType) {
        for raw in lo.raw()..=hi.raw() {
            self.insert(TokenType::new(raw));
        }
    }

    pub fn remove(&mut self, t: TokenType) {
        match t {
            TokenType::EOF => self.eof = false,
            TokenType::EPSILON => self.epsilon = false,
            _ if t.raw() < 0 => {}
            _ => {
                let (word, bit) = Self::slot(t);
                if let Some(w) = self.words.get_mut(word) {
                    *w &= !bit;
                }
                self.trim();
            }
        }
    }

    #[inline]
    pub fn contains(&self, t: TokenType) -> bool {
        match t {
            TokenType::EOF => self.eof,
            TokenType::EPSILON => self.epsilon,
            _ if t.raw() < 0 => false,
            _ => {
                let (word, bit) = Self::slot(t);
                self.words.get(word).is_some_and(|w| w & bit != 0)
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.eof && !self.epsilon && self.words.is_empty()
    }

    /// Number of token types in the set (EOF and EPSILON included).
    pub fn len(&self) -> usize {
        let user: u32 = self.words.iter().map(|w| w.count_ones()).sum();
        user as usize + usize::from(self.eof) + usize::from(self.epsilon)
    }

    pub fn union_with(&mut self, other: &TokenSet) {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= *o;
        }
        self.eof |= other.eof;
        self.epsilon |= other.epsilon;
    }

    #[must_use]
    pub fn union(&self, other: &TokenSet) -> TokenSet {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    /// Elements of `self` not in `other`.
    #[must_use]
    pub fn subtract(&self, other: &TokenSet) -> TokenSet {
        let mut out = self.clone();
        for (w, o) in out.words.iter_mut().zip(other.words.iter()) {
            *w &= !*o;
        }
        out.eof &= !other.eof;
        out.epsilon &= !other.epsilon;
        out.trim();
        out
    }

    /// User types in `min..=max` that are not in `self`.
    #[must_use]
    pub fn complement(&self, min: TokenType, max: TokenType) -> TokenSet {
        let mut out = TokenSet::new();
        for raw in min.raw().max(TokenType::MIN_USER.raw())..=max.raw() {
            let t = TokenType::new(raw);
            if !self.contains(t) {
                out.insert(t);
            }
        }
        out
    }

    /// Smallest member, with EPSILON < EOF < user types.
    pub fn min_element(&self) -> Option<TokenType> {
        self.iter().next()
    }

    /// Iterate members in ascending numeric order.
    pub fn iter(&self) -> TokenSetIter<'_> {
        TokenSetIter {
            set: self,
            reserved: 0,
            word: 0,
            bits: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Render the set for an error message: `'x'` for a single member,
    /// `{ID, ';', <EOF>}` otherwise, `{}` when empty.
    pub fn format_expected(&self, vocabulary: &Vocabulary) -> String {
        let names: Vec<String> = self.iter().map(|t| vocabulary.display_name(t)).collect();
        match names.as_slice() {
            [single] => single.clone(),
            _ => format!("{{{}}}", names.join(", ")),
        }
    }

    #[inline]
    fn slot(t: TokenType) -> (usize, u64) {
        let raw = t.raw() as usize;
        (raw / WORD_BITS, 1u64 << (raw % WORD_BITS))
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl FromIterator<TokenType> for TokenSet {
    fn from_iter<I: IntoIterator<Item = TokenType>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for t in iter {
            set.insert(t);
        }
        set
    }
}

impl Extend<TokenType> for TokenSet {
    fn extend<I: IntoIterator<Item = TokenType>>(&mut self, iter: I) {
        for t in iter {
            self.insert(t);
        }
    }
}

impl<'a> IntoIterator for &'a TokenSet {
    type Item = TokenType;
    type IntoIter = TokenSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over the members of a [`TokenSet`].
pub struct TokenSetIter<'a> {
    set: &'a TokenSet,
    /// 0 = EPSILON pending, 1 = EOF pending, 2 = user words.
    reserved: u8,
    word: usize,
    bits: u64,
}

impl Iterator for TokenSetIter<'_> {
    type Item = TokenType;

    fn next(&mut self) -> Option<TokenType> {
        while self.reserved < 2 {
            self.reserved += 1;
            if self.reserved == 1 && self.set.epsilon {
                return Some(TokenType::EPSILON);
            }
            if self.reserved == 2 && self.set.eof {
                return Some(TokenType::EOF);
            }
        }
        loop {
            if self.bits != 0 {
                let bit = self.bits.trailing_zeros() as usize;
                self.bits &= self.bits - 1;
                return Some(TokenType::new((self.word * WORD_BITS + bit) as i32));
            }
            self.word += 1;
            self.bits = *self.set.words.get(self.word)?;
        }
    }
}

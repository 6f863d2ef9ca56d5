//! Declarative construction of an ATN from grammar rules.
//!
//! [`GrammarBuilder`] plays the part of a grammar compiler's ATN factory:
//! rules are written as [`Element`] trees and lowered to the standard state
//! shapes (blocks, star and plus loops, rule calls). Directly left-recursive
//! rules are declared as a list of [`RecursiveAlt`]s and rewritten into the
//! precedence-climbing loop
//!
//! ```text
//! e : primary ( {precpred(p1)}? suffix1 | {precpred(p2)}? suffix2 ... )* ;
//! ```
//!
//! where alternatives listed first bind tightest.

use alp_ir::{TokenSet, TokenType, Vocabulary};

use crate::{Atn, AtnBuilder, AtnError, RuleId, StateId, StateKind, Transition, TransitionKind};

/// A grammar fragment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Element {
    Token(TokenType),
    Set(Vec<TokenType>),
    NotSet(Vec<TokenType>),
    Wildcard,
    Rule(RuleId),
    Seq(Vec<Element>),
    Alt(Vec<Element>),
    Optional(Box<Element>),
    Star(Box<Element>),
    Plus(Box<Element>),
    /// Semantic predicate evaluated without looking at rule context.
    Predicate(u32),
    /// Semantic predicate that inspects the invoking rule context.
    ContextPredicate(u32),
    Action(u32),
    Epsilon,
}

impl Element {
    pub fn seq(items: impl IntoIterator<Item = Element>) -> Self {
        Element::Seq(items.into_iter().collect())
    }

    pub fn alt(alts: impl IntoIterator<Item = Element>) -> Self {
        Element::Alt(alts.into_iter().collect())
    }

    pub fn opt(e: Element) -> Self {
        Element::Optional(Box::new(e))
    }

    pub fn star(e: Element) -> Self {
        Element::Star(Box::new(e))
    }

    pub fn plus(e: Element) -> Self {
        Element::Plus(Box::new(e))
    }

    fn alternatives(&self) -> &[Element] {
        match self {
            Element::Alt(alts) => alts,
            other => std::slice::from_ref(other),
        }
    }
}

impl From<TokenType> for Element {
    fn from(t: TokenType) -> Self {
        Element::Token(t)
    }
}

impl From<RuleId> for Element {
    fn from(r: RuleId) -> Self {
        Element::Rule(r)
    }
}

/// Associativity of a binary operator alternative.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Assoc {
    Left,
    Right,
}

/// One alternative of a directly left-recursive rule `e`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecursiveAlt {
    /// `e operator e`
    Binary { operator: Vec<Element>, assoc: Assoc },
    /// `e suffix` (postfix operators, calls, indexing, ...)
    Suffix(Vec<Element>),
    /// `prefix e`
    Prefix(Vec<Element>),
    /// Anything not starting or ending with `e`.
    Primary(Vec<Element>),
}

#[derive(Clone, Debug)]
enum RuleDef {
    Plain(Element),
    Recursive(Vec<RecursiveAlt>),
}

/// Output of [`GrammarBuilder::build`].
#[derive(Clone, Debug)]
pub struct CompiledGrammar {
    pub atn: Atn,
    pub vocabulary: Vocabulary,
}

/// Collects token and rule declarations and lowers them to an [`Atn`].
///
/// # Example
/// ```text
/// let mut g = GrammarBuilder::new();
/// let num = g.token("NUM");
/// let plus = g.literal("+", Some("PLUS"));
/// let e = g.rule("e");
/// g.define_recursive(e, vec![
///     RecursiveAlt::Binary { operator: vec![plus.into()], assoc: Assoc::Left },
///     RecursiveAlt::Primary(vec![num.into()]),
/// ]);
/// let CompiledGrammar { atn, vocabulary } = g.build()?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct GrammarBuilder {
    vocabulary: Vocabulary,
    rules: Vec<(String, Option<RuleDef>)>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a token with only a symbolic name.
    pub fn token(&mut self, symbolic: &str) -> TokenType {
        self.vocabulary.define(None, Some(symbolic))
    }

    /// Declare a fixed-spelling token; `literal` is given unquoted.
    pub fn literal(&mut self, literal: &str, symbolic: Option<&str>) -> TokenType {
        let quoted = format!("'{literal}'");
        self.vocabulary.define(Some(&quoted), symbolic)
    }

    /// Declare a rule, or return the existing id for `name`.
    pub fn rule(&mut self, name: &str) -> RuleId {
        if let Some(i) = self.rules.iter().position(|(n, _)| n == name) {
            return RuleId::new(i as u32);
        }
        self.rules.push((name.to_owned(), None));
        RuleId::new((self.rules.len() - 1) as u32)
    }

    pub fn define(&mut self, rule: RuleId, body: Element) {
        self.rules[rule.index()].1 = Some(RuleDef::Plain(body));
    }

    pub fn define_recursive(&mut self, rule: RuleId, alts: Vec<RecursiveAlt>) {
        self.rules[rule.index()].1 = Some(RuleDef::Recursive(alts));
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn build(self) -> Result<CompiledGrammar, AtnError> {
        let mut builder = AtnBuilder::new(self.vocabulary.max_token_type());
        for (name, _) in &self.rules {
            builder.add_rule(name.as_str());
        }
        for (i, (name, def)) in self.rules.iter().enumerate() {
            let rule = RuleId::new(i as u32);
            let mut lower = Lowering {
                b: &mut builder,
                rule,
            };
            match def {
                Some(RuleDef::Plain(body)) => lower.plain_rule(body),
                Some(RuleDef::Recursive(alts)) => lower.recursive_rule(name, alts)?,
                None => {}
            }
        }
        Ok(CompiledGrammar {
            atn: builder.build()?,
            vocabulary: self.vocabulary,
        })
    }
}

/// Entry and exit state of a lowered fragment.
#[derive(Copy, Clone, Debug)]
struct Handle {
    left: StateId,
    right: StateId,
}

struct Lowering<'b> {
    b: &'b mut AtnBuilder,
    rule: RuleId,
}

impl Lowering<'_> {
    fn plain_rule(&mut self, body: &Element) {
        let h = self.element(body);
        let (start, stop) = (self.b.rule_start(self.rule), self.b.rule_stop(self.rule));
        self.b.epsilon(start, h.left);
        self.b.epsilon(h.right, stop);
    }

    fn recursive_rule(&mut self, name: &str, alts: &[RecursiveAlt]) -> Result<(), AtnError> {
        let n = alts.len() as i32;
        let mut primaries = Vec::new();
        let mut suffixes = Vec::new();
        for (i, alt) in alts.iter().enumerate() {
            let level = n - i as i32;
            match alt {
                RecursiveAlt::Primary(items) => primaries.push(self.sequence(items)),
                RecursiveAlt::Prefix(items) => {
                    let head = self.sequence(items);
                    let tail = self.call(self.rule, level);
                    self.b.epsilon(head.right, tail.left);
                    primaries.push(Handle {
                        left: head.left,
                        right: tail.right,
                    });
                }
                RecursiveAlt::Binary { operator, assoc } => {
                    let next = match assoc {
                        Assoc::Left => level + 1,
                        Assoc::Right => level,
                    };
                    suffixes.push((level, operator.as_slice(), Some(next)));
                }
                RecursiveAlt::Suffix(items) => suffixes.push((level, items.as_slice(), None)),
            }
        }
        if primaries.is_empty() {
            return Err(AtnError::NoPrimaryAlternative(name.to_owned()));
        }

        let primary = self.join_alternatives(StateKind::BlockStart, &primaries, false);
        let (start, stop) = (self.b.rule_start(self.rule), self.b.rule_stop(self.rule));
        self.b.epsilon(start, primary.left);

        if suffixes.is_empty() {
            self.b.epsilon(primary.right, stop);
            return Ok(());
        }
        self.b.set_left_recursive(self.rule);

        let mut loop_alts = Vec::with_capacity(suffixes.len());
        for (level, items, recurse) in suffixes {
            let guard = self.b.add_state(StateKind::Basic, self.rule);
            let body = self.sequence(items);
            self.b
                .add_transition(guard, Transition::new(body.left, TransitionKind::Precedence(level)));
            let right = match recurse {
                Some(next) => {
                    let call = self.call(self.rule, next);
                    self.b.epsilon(body.right, call.left);
                    call.right
                }
                None => body.right,
            };
            loop_alts.push(Handle { left: guard, right });
        }
        let tail = self.star_loop(&loop_alts);
        self.b.mark_precedence_decision(tail.left);
        self.b.epsilon(primary.right, tail.left);
        self.b.epsilon(tail.right, stop);
        Ok(())
    }

    fn element(&mut self, e: &Element) -> Handle {
        match e {
            Element::Token(t) => self.edge(TransitionKind::Atom(*t)),
            Element::Set(ts) => self.edge(TransitionKind::Set(TokenSet::of(ts.iter().copied()))),
            Element::NotSet(ts) => {
                self.edge(TransitionKind::NotSet(TokenSet::of(ts.iter().copied())))
            }
            Element::Wildcard => self.edge(TransitionKind::Wildcard),
            Element::Rule(r) => self.call(*r, 0),
            Element::Seq(items) => self.sequence(items),
            Element::Alt(alts) if alts.len() == 1 => self.element(&alts[0]),
            Element::Alt(alts) => {
                let handles: Vec<Handle> = alts.iter().map(|a| self.element(a)).collect();
                self.join_alternatives(StateKind::BlockStart, &handles, false)
            }
            Element::Optional(inner) => {
                let handles = self.lower_all(inner.alternatives());
                self.join_alternatives(StateKind::BlockStart, &handles, true)
            }
            Element::Star(inner) => {
                let handles = self.lower_all(inner.alternatives());
                self.star_loop(&handles)
            }
            Element::Plus(inner) => {
                let handles = self.lower_all(inner.alternatives());
                self.plus_loop(&handles)
            }
            Element::Predicate(index) => self.edge(TransitionKind::Predicate {
                rule: self.rule,
                index: *index,
                context_dependent: false,
            }),
            Element::ContextPredicate(index) => self.edge(TransitionKind::Predicate {
                rule: self.rule,
                index: *index,
                context_dependent: true,
            }),
            Element::Action(index) => self.edge(TransitionKind::Action {
                rule: self.rule,
                index: *index,
            }),
            Element::Epsilon => self.edge(TransitionKind::Epsilon),
        }
    }

    fn lower_all(&mut self, alts: &[Element]) -> Vec<Handle> {
        alts.iter().map(|a| self.element(a)).collect()
    }

    fn sequence(&mut self, items: &[Element]) -> Handle {
        let mut handles = items.iter().map(|e| self.element(e)).collect::<Vec<_>>().into_iter();
        let Some(first) = handles.next() else {
            return self.edge(TransitionKind::Epsilon);
        };
        let mut right = first.right;
        for h in handles {
            self.b.epsilon(right, h.left);
            right = h.right;
        }
        Handle {
            left: first.left,
            right,
        }
    }

    /// Two basic states joined by one edge of `kind`.
    fn edge(&mut self, kind: TransitionKind) -> Handle {
        let left = self.b.add_state(StateKind::Basic, self.rule);
        let right = self.b.add_state(StateKind::Basic, self.rule);
        self.b.add_transition(left, Transition::new(right, kind));
        Handle { left, right }
    }

    fn call(&mut self, callee: RuleId, precedence: i32) -> Handle {
        let left = self.b.add_state(StateKind::Basic, self.rule);
        let follow = self.b.add_state(StateKind::Basic, self.rule);
        let start = self.b.rule_start(callee);
        self.b
            .add_transition(left, Transition::rule(start, callee, follow, precedence));
        Handle {
            left,
            right: follow,
        }
    }

    /// `( a | b | ... )`, with an extra empty alternative when `bypass`.
    fn join_alternatives(&mut self, kind: StateKind, alts: &[Handle], bypass: bool) -> Handle {
        if let [only] = alts {
            if !bypass {
                return *only;
            }
        }
        let start = self.b.add_state(kind, self.rule);
        let end = self.b.add_state(StateKind::BlockEnd, self.rule);
        for h in alts {
            self.b.epsilon(start, h.left);
            self.b.epsilon(h.right, end);
        }
        if bypass {
            self.b.epsilon(start, end);
        }
        Handle {
            left: start,
            right: end,
        }
    }

    /// `( ... )*`: the entry decides between iterating (alt 1) and leaving
    /// (alt 2).
    fn star_loop(&mut self, alts: &[Handle]) -> Handle {
        let entry = self.b.add_state(StateKind::StarLoopEntry, self.rule);
        let block_start = self.b.add_state(StateKind::StarBlockStart, self.rule);
        let block_end = self.b.add_state(StateKind::BlockEnd, self.rule);
        let loop_back = self.b.add_state(StateKind::StarLoopBack, self.rule);
        let loop_end = self.b.add_state(StateKind::LoopEnd, self.rule);

        self.b.epsilon(entry, block_start);
        self.b.epsilon(entry, loop_end);
        for h in alts {
            self.b.epsilon(block_start, h.left);
            self.b.epsilon(h.right, block_end);
        }
        self.b.epsilon(block_end, loop_back);
        self.b.epsilon(loop_back, entry);
        Handle {
            left: entry,
            right: loop_end,
        }
    }

    /// `( ... )+`: the loop-back state decides between iterating (alt 1)
    /// and leaving (alt 2).
    fn plus_loop(&mut self, alts: &[Handle]) -> Handle {
        let block_start = self.b.add_state(StateKind::PlusBlockStart, self.rule);
        let block_end = self.b.add_state(StateKind::BlockEnd, self.rule);
        let loop_back = self.b.add_state(StateKind::PlusLoopBack, self.rule);
        let loop_end = self.b.add_state(StateKind::LoopEnd, self.rule);

        for h in alts {
            self.b.epsilon(block_start, h.left);
            self.b.epsilon(h.right, block_end);
        }
        self.b.epsilon(block_end, loop_back);
        self.b.epsilon(loop_back, block_start);
        self.b.epsilon(loop_back, loop_end);
        Handle {
            left: block_start,
            right: loop_end,
        }
    }
}

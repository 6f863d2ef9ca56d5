//! Rule invocation contexts.
//!
//! Every rule invocation gets a [`RuleNode`] in a [`ContextArena`]. Nodes
//! refer to their parent by [`ContextId`], so the spine of the parse tree
//! is a flat vector rather than a web of owning pointers, and prediction can
//! walk outwards through live invocations without borrowing the parser.

use std::fmt::Write as _;

use alp_atn::{RuleId, StateId};
use alp_ir::{Token, Vocabulary};
use alp_stack::ensure_sufficient_stack;

use crate::RecognitionError;

/// Index of a [`RuleNode`] in its [`ContextArena`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ContextId(u32);

impl ContextId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A child of a rule node, in input order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseChild {
    Rule(ContextId),
    Token(Token),
    /// A token consumed or conjured by error recovery.
    Error(Token),
}

/// One rule invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleNode {
    pub rule: RuleId,
    pub parent: Option<ContextId>,
    /// State that called this rule; `None` for the outermost invocation.
    pub invoking_state: Option<StateId>,
    /// Precedence the invocation was entered with (0 for ordinary rules).
    pub precedence: i32,
    pub children: Vec<ParseChild>,
    /// Stream index of the first token the rule saw.
    pub start: Option<usize>,
    /// Stream index of the last token the rule consumed.
    pub stop: Option<usize>,
    /// Error that ended this invocation early, if any.
    pub error: Option<RecognitionError>,
}

impl RuleNode {
    pub fn new(rule: RuleId, parent: Option<ContextId>, invoking_state: Option<StateId>) -> Self {
        RuleNode {
            rule,
            parent,
            invoking_state,
            precedence: 0,
            children: Vec::new(),
            start: None,
            stop: None,
            error: None,
        }
    }

    /// Sub-rule children.
    pub fn rule_children(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.children.iter().filter_map(|c| match c {
            ParseChild::Rule(id) => Some(*id),
            _ => None,
        })
    }
}

/// Owner of every rule node of one parse.
#[derive(Clone, Debug, Default)]
pub struct ContextArena {
    nodes: Vec<RuleNode>,
}

impl ContextArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alloc(&mut self, node: RuleNode) -> ContextId {
        let id = ContextId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    /// Every node id in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = ContextId> + '_ {
        (0..self.nodes.len()).map(|i| ContextId(i as u32))
    }

    #[inline]
    pub fn get(&self, id: ContextId) -> &RuleNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: ContextId) -> &mut RuleNode {
        &mut self.nodes[id.index()]
    }

    pub fn add_child(&mut self, parent: ContextId, child: ParseChild) {
        self.get_mut(parent).children.push(child);
    }

    /// `id` and every enclosing invocation, innermost first.
    pub fn ancestors(&self, id: ContextId) -> impl Iterator<Item = ContextId> + '_ {
        std::iter::successors(Some(id), |c| self.get(*c).parent)
    }

    /// Number of enclosing invocations.
    pub fn depth(&self, id: ContextId) -> usize {
        self.ancestors(id).count() - 1
    }

    /// Rule names from `id` outwards.
    pub fn rule_invocation_stack(&self, id: ContextId, rule_names: &[&str]) -> Vec<String> {
        self.ancestors(id)
            .map(|c| {
                let rule = self.get(c).rule;
                rule_names
                    .get(rule.index())
                    .map_or_else(|| rule.to_string(), |n| (*n).to_owned())
            })
            .collect()
    }

    /// Source text of every token below `id`, concatenated.
    pub fn text(&self, id: ContextId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: ContextId, out: &mut String) {
        for child in &self.get(id).children {
            match child {
                ParseChild::Rule(c) => ensure_sufficient_stack(|| self.collect_text(*c, out)),
                ParseChild::Token(t) | ParseChild::Error(t) => {
                    if !t.kind.is_eof() {
                        if let Some(text) = &t.text {
                            out.push_str(text);
                        }
                    }
                }
            }
        }
    }

    /// LISP-style rendering: `(rule child child ...)`, a bare rule name for
    /// an invocation without children.
    pub fn to_string_tree(&self, id: ContextId, rule_names: &[&str], vocabulary: &Vocabulary) -> String {
        let mut out = String::new();
        self.write_tree(id, rule_names, vocabulary, &mut out);
        out
    }

    fn write_tree(&self, id: ContextId, rule_names: &[&str], vocabulary: &Vocabulary, out: &mut String) {
        let node = self.get(id);
        let name = rule_names.get(node.rule.index()).copied().unwrap_or("?");
        if node.children.is_empty() {
            out.push_str(name);
            return;
        }
        let _ = write!(out, "({name}");
        for child in &node.children {
            out.push(' ');
            match child {
                ParseChild::Rule(c) => {
                    ensure_sufficient_stack(|| self.write_tree(*c, rule_names, vocabulary, out));
                }
                ParseChild::Token(t) | ParseChild::Error(t) => {
                    out.push_str(&leaf_text(t, vocabulary));
                }
            }
        }
        out.push(')');
    }
}

fn leaf_text(token: &Token, vocabulary: &Vocabulary) -> String {
    let text = token.display_text(vocabulary);
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests;

//! Table-driven parsing straight from the ATN.
//!
//! [`ParserInterpreter`] walks the ATN state by state: decision states ask
//! the prediction engine which edge to take, atom and set edges match
//! tokens, rule edges open invocations, and rule stops return to the
//! caller's follow state. One loop, no native recursion, so arbitrarily
//! deep input cannot overflow the stack; nesting is bounded by
//! [`ParserConfig::max_rule_depth`](crate::ParserConfig) instead.

use alp_atn::{RuleId, StateId, StateKind, TransitionKind};
use alp_ir::{TokenStream, TokenType};
use tracing::trace;

use crate::{ContextId, ParseFailure, ParseResult, Parser, SemanticHooks};

/// Runs any rule of the engine's grammar on a token stream.
pub struct ParserInterpreter<S: TokenStream> {
    parser: Parser<S>,
    /// Caller context and state of each open left-recursive invocation.
    parents: Vec<(Option<ContextId>, Option<StateId>)>,
}

impl<S: TokenStream> ParserInterpreter<S> {
    pub fn new(parser: Parser<S>) -> Self {
        ParserInterpreter {
            parser,
            parents: Vec::new(),
        }
    }

    pub fn parser(&self) -> &Parser<S> {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut Parser<S> {
        &mut self.parser
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl SemanticHooks + 'static) -> Self {
        self.parser.set_hooks(hooks);
        self
    }

    /// Parse `rule` and hand back the tree and the reported errors.
    pub fn parse(mut self, rule: RuleId) -> Result<ParseResult, ParseFailure> {
        let root = self.run(rule)?;
        Ok(self.parser.finish(root))
    }

    /// [`parse`](Self::parse) by rule name; `None` if there is no such rule.
    pub fn parse_rule(self, name: &str) -> Option<Result<ParseResult, ParseFailure>> {
        let rule = self.parser.atn().rule_by_name(name)?;
        Some(self.parse(rule))
    }

    /// Parse `rule` from the current position, leaving the parser open.
    /// Returns the invocation's context.
    pub fn run(&mut self, rule: RuleId) -> Result<ContextId, ParseFailure> {
        let engine = self.parser.engine().clone();
        let atn = engine.atn();
        let left_recursive = atn.rule(rule).left_recursive;
        let root = if left_recursive {
            self.enter_recursion_rule(rule, 0)?
        } else {
            self.parser.enter_rule(rule)?
        };

        loop {
            let Some(p) = self.parser.state() else {
                return Ok(root);
            };
            let state = atn.state(p);
            if state.kind == StateKind::RuleStop {
                let outermost = self
                    .parser
                    .context()
                    .map_or(true, |c| self.parser.arena().get(c).invoking_state.is_none());
                if outermost {
                    if left_recursive {
                        let (parent, _) = self.parents.pop().unwrap_or((None, None));
                        return Ok(self.parser.unroll_recursion_contexts(parent).unwrap_or(root));
                    }
                    self.parser.exit_rule();
                    return Ok(root);
                }
                self.visit_rule_stop(p);
                continue;
            }

            match self.visit_state(p) {
                Ok(()) => {}
                Err(ParseFailure::Recognition(e)) => {
                    self.parser.set_state(atn.rule_stop(state.rule));
                    self.parser.handle_failure(Err(e.into()))?;
                }
                Err(fatal) => return Err(fatal),
            }
        }
    }

    fn enter_recursion_rule(&mut self, rule: RuleId, precedence: i32) -> Result<ContextId, ParseFailure> {
        let caller = (self.parser.context(), self.parser.state());
        let ctx = self.parser.enter_recursion_rule(rule, precedence)?;
        self.parents.push(caller);
        Ok(ctx)
    }

    fn visit_state(&mut self, p: StateId) -> Result<(), ParseFailure> {
        let engine = self.parser.engine().clone();
        let atn = engine.atn();
        let state = atn.state(p);

        let alt = match state.decision {
            Some(decision) if state.transitions.len() > 1 => {
                self.parser.sync()?;
                self.parser.adaptive_predict(decision)?
            }
            _ => 1,
        };
        let Some(transition) = state.transitions.get(alt as usize - 1) else {
            return Err(self.parser.input_mismatch().into());
        };

        match &transition.kind {
            TransitionKind::Epsilon => {
                if state.precedence_decision && atn.state(transition.target).kind != StateKind::LoopEnd {
                    self.parser
                        .push_new_recursion_context(atn.rule_start(state.rule), state.rule);
                }
            }
            TransitionKind::Atom(t) => {
                self.parser.match_token(*t)?;
            }
            TransitionKind::Range(..) | TransitionKind::Set(_) | TransitionKind::NotSet(_) => {
                let max = atn.max_token_type();
                if let Some(label) = transition.label(TokenType::MIN_USER, max) {
                    self.parser.match_set(&label)?;
                }
            }
            TransitionKind::Wildcard => {
                self.parser.match_wildcard()?;
            }
            TransitionKind::Rule {
                rule, precedence, ..
            } => {
                if atn.rule(*rule).left_recursive {
                    self.enter_recursion_rule(*rule, *precedence)?;
                } else {
                    self.parser.enter_rule(*rule)?;
                }
            }
            TransitionKind::Predicate { rule, index, .. } => {
                if !self.parser.sempred(*rule, *index) {
                    let name = &atn.rule(*rule).name;
                    return Err(self.parser.failed_predicate(format!("{name}:{index}")).into());
                }
            }
            TransitionKind::Action { rule, index } => self.parser.action(*rule, *index),
            TransitionKind::Precedence(level) => {
                self.parser.check_precedence(*level)?;
            }
        }
        self.parser.set_state(transition.target);
        Ok(())
    }

    /// Leave the innermost invocation and continue after its call.
    fn visit_rule_stop(&mut self, p: StateId) {
        let engine = self.parser.engine().clone();
        let atn = engine.atn();
        let rule = atn.state(p).rule;
        if atn.rule(rule).left_recursive {
            let (parent, invoking) = self.parents.pop().unwrap_or((None, None));
            self.parser.unroll_recursion_contexts(parent);
            self.parser.state = invoking;
        } else {
            self.parser.exit_rule();
        }
        let resume = self.parser.state().and_then(|s| atn.follow_state_of(s));
        trace!(rule = %atn.rule(rule).name, ?resume, "return");
        self.parser.state = resume;
    }
}

//! Parser configuration.

use alp_stack::DepthLimit;

/// How hard prediction works before settling a conflict.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PredictionMode {
    /// Context-free simulation only. Conflicts resolve to the lowest
    /// alternative straight away; every result is cacheable.
    Sll,
    /// SLL first, re-simulating with the live rule context when SLL
    /// reports a conflict.
    #[default]
    Ll,
}

/// Knobs for one parse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ParserConfig {
    pub prediction_mode: PredictionMode,
    /// Rule invocations that may be live at once before the parse fails
    /// with a recursion-depth error.
    pub max_rule_depth: usize,
    /// Attach matched tokens to their rule contexts. Contexts themselves
    /// (and error nodes) are always kept.
    pub build_parse_trees: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            prediction_mode: PredictionMode::default(),
            max_rule_depth: DepthLimit::DEFAULT_LIMIT,
            build_parse_trees: true,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn with_prediction_mode(mut self, mode: PredictionMode) -> Self {
        self.prediction_mode = mode;
        self
    }

    #[must_use]
    pub fn with_max_rule_depth(mut self, depth: usize) -> Self {
        self.max_rule_depth = depth;
        self
    }

    #[must_use]
    pub fn with_parse_trees(mut self, build: bool) -> Self {
        self.build_parse_trees = build;
        self
    }
}

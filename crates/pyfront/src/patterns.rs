//! Structural pattern matching (`match`/`case`) patterns.

use crate::{
    diagnostic::SourceRange,
    expressions::{ExprLoc, Literal},
    intern::StringId,
};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Pattern {
    /// Literal or dotted-name value pattern, compared with `==`.
    MatchValue(ExprLoc),
    /// `None`, `True` or `False`, compared with `is`.
    MatchSingleton(Literal),
    MatchSequence(Vec<PatternLoc>),
    /// `rest` is the name bound by a trailing `**rest`.
    MatchMapping {
        keys: Vec<ExprLoc>,
        patterns: Vec<PatternLoc>,
        rest: Option<StringId>,
    },
    MatchClass {
        cls: ExprLoc,
        patterns: Vec<PatternLoc>,
        kwd_attrs: Vec<StringId>,
        kwd_patterns: Vec<PatternLoc>,
    },
    /// `*name` inside a sequence pattern; `None` for `*_`.
    MatchStar(Option<StringId>),
    /// Capture (`name`), wildcard (`_`: both fields `None`) or `pattern as name`.
    MatchAs {
        pattern: Option<Box<PatternLoc>>,
        name: Option<StringId>,
    },
    MatchOr(Vec<PatternLoc>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternLoc {
    pub position: SourceRange,
    pub pattern: Pattern,
}

impl PatternLoc {
    #[must_use]
    pub fn new(position: SourceRange, pattern: Pattern) -> Self {
        Self { position, pattern }
    }
}

//! Parsing of f-string replacement fields.
//!
//! The grammar engine finds the text of each `{...}` field itself and hands it to an
//! [`FExprParser`], which turns it into an expression positioned inside the enclosing
//! file. [`DefaultFExprParser`] re-enters the grammar engine on the field text; callers
//! with different needs (tests, tools that skip f-string bodies) can pass any closure
//! with the same signature.

use crate::{
    diagnostic::DiagnosticSink,
    expressions::ExprLoc,
    intern::InternerBuilder,
    options::ParseOptions,
    parse::Parser,
    tokenizer::SourceBase,
    tracer::NoopTracer,
};

/// Shared state a replacement field parse writes into.
#[derive(Debug)]
pub struct FExprContext<'a> {
    pub interner: &'a mut InternerBuilder,
    pub sink: &'a mut DiagnosticSink,
    pub options: &'a ParseOptions,
    /// Number of replacement fields enclosing this one, this one included.
    pub fstring_depth: u32,
    /// Nesting budget left where the field starts.
    pub depth_remaining: u16,
}

/// Parses the expression part of one replacement field.
pub trait FExprParser {
    /// Parses `fragment`, whose first byte sits at `base` in the enclosing file.
    ///
    /// Returns `None` after reporting a diagnostic into `cx.sink`.
    fn parse_fexpr(&self, fragment: &str, base: SourceBase, cx: &mut FExprContext<'_>) -> Option<ExprLoc>;
}

impl<F> FExprParser for F
where
    F: Fn(&str, SourceBase, &mut FExprContext<'_>) -> Option<ExprLoc>,
{
    fn parse_fexpr(&self, fragment: &str, base: SourceBase, cx: &mut FExprContext<'_>) -> Option<ExprLoc> {
        self(fragment, base, cx)
    }
}

/// Parses replacement fields with the grammar engine itself.
///
/// The field is wrapped in parentheses before parsing, so it may span lines and may be a
/// bare tuple, a `yield` or an assignment expression, exactly as in CPython 3.11.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFExprParser;

impl FExprParser for DefaultFExprParser {
    fn parse_fexpr(&self, fragment: &str, base: SourceBase, cx: &mut FExprContext<'_>) -> Option<ExprLoc> {
        let source = format!("({fragment})");
        // the opening parenthesis stands where the `{` is
        let base = SourceBase {
            offset: base.offset.saturating_sub(1),
            line: base.line,
            column: base.column.saturating_sub(1),
        };
        let mut tracer = NoopTracer;
        let mut parser = Parser::for_fragment(&source, base, cx, self, &mut tracer);
        parser.parse_fstring_expr()
    }
}

#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "offsets and ids are bounded by u32 source sizes")]

mod diagnostic;
mod expressions;
mod fstring;
mod intern;
mod options;
mod parse;
mod patterns;
mod printer;
pub mod scope;
mod tokenizer;
pub mod tracer;
mod unparse;
pub mod visitor;

pub use crate::{
    diagnostic::{CodeLoc, CompileError, Diagnostic, DiagnosticSink, ErrorKind, ErrorMessage, SourceRange},
    expressions::{
        Alias, Arg, Arguments, BoolOp, ClassDef, CmpOp, Comprehension, ConversionFlag, ExceptHandler, Expr,
        ExprContext, ExprLoc, FunctionDef, Keyword, Literal, MatchCase, Mod, Operator, Stmt, StmtLoc, TypeParam,
        TypeParamKind, UnaryOp, WithItem,
    },
    fstring::{DefaultFExprParser, FExprContext, FExprParser},
    intern::{BytesId, CodePointsId, InternerBuilder, Keyword as HardKeyword, LongIntId, StaticStrings, StringId},
    options::{InputKind, MAX_NESTING_DEPTH, ParseOptions},
    parse::{Parser, Rule},
    patterns::{Pattern, PatternLoc},
    printer::{dump_tree, repr_bytes, repr_code_points, repr_float, repr_str},
    scope::{BindingKind, ScopeId, ScopeKind, ScopeTree, analyze, analyze_with_tracer},
    tokenizer::{SourceBase, Token, TokenError, TokenFlags, TokenKind, Tokenizer, TokenizerState, tokenize},
    tracer::{NoopTracer, ParseTracer, RecordingTracer, StderrTracer, TraceEvent},
    unparse::{unparse, unparse_expr},
    visitor::{RangeViolation, Visitor, check_ranges},
};

/// Result of [`parse`]: the tree when parsing succeeded, and every diagnostic.
#[derive(Debug)]
pub struct ParseOutput {
    pub module: Option<Mod>,
    /// Owns every identifier and literal payload the tree refers to.
    pub interner: InternerBuilder,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses `source` in the mode selected by `options`.
///
/// `module` is `None` exactly when a diagnostic was reported.
#[must_use]
pub fn parse(source: &str, options: &ParseOptions) -> ParseOutput {
    parse_with_tracer(source, options, &mut NoopTracer)
}

/// Like [`parse`], reporting memo activity, pass restarts and diagnostics to `tracer`.
pub fn parse_with_tracer(source: &str, options: &ParseOptions, tracer: &mut dyn ParseTracer) -> ParseOutput {
    let mut interner = InternerBuilder::new(source);
    let mut sink = DiagnosticSink::new();
    let module = Parser::new(source, options, &mut interner, &mut sink, &DefaultFExprParser, tracer).parse();
    ParseOutput {
        module,
        interner,
        diagnostics: sink.into_vec(),
    }
}

/// Result of [`compile`]: parse tree, scope tree and every diagnostic from both stages.
///
/// The three outcomes are a tree with no diagnostics, no tree with the parse
/// diagnostics, or a tree with scope diagnostics. `scopes` is present whenever
/// `module` is.
#[derive(Debug)]
pub struct CompileOutput {
    pub module: Option<Mod>,
    pub scopes: Option<ScopeTree>,
    pub interner: InternerBuilder,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Splits into the trees on success, or all diagnostics on failure.
    pub fn into_result(self) -> Result<(Mod, ScopeTree, InternerBuilder), CompileError> {
        match (self.module, self.scopes, CompileError::from_diagnostics(self.diagnostics)) {
            (_, _, Some(error)) => Err(error),
            (Some(module), Some(scopes), None) => Ok((module, scopes, self.interner)),
            _ => unreachable!("a missing tree is always reported"),
        }
    }
}

/// Parses `source` and, when it parses, runs scope analysis on the tree.
#[must_use]
pub fn compile(source: &str, options: &ParseOptions) -> CompileOutput {
    compile_with_tracer(source, options, &mut NoopTracer)
}

/// Like [`compile`], reporting both stages to `tracer`.
pub fn compile_with_tracer(source: &str, options: &ParseOptions, tracer: &mut dyn ParseTracer) -> CompileOutput {
    let ParseOutput {
        module,
        interner,
        mut diagnostics,
    } = parse_with_tracer(source, options, tracer);
    let scopes = module.as_ref().map(|module| {
        let mut sink = DiagnosticSink::new();
        let scopes = analyze_with_tracer(module, &interner, &mut sink, tracer);
        diagnostics.extend(sink.into_vec());
        scopes
    });
    CompileOutput {
        module,
        scopes,
        interner,
        diagnostics,
    }
}

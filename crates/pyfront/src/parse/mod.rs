//! Packrat grammar engine.
//!
//! The engine is a hand-written PEG parser over a lazily filled token buffer. Rules are
//! methods returning `Option<T>`: `Some` is success with the cursor advanced past the
//! match, `None` is failure with the cursor back where the rule started. Rules that are
//! re-entered at the same position by competing alternatives are memoized in a table
//! keyed by `(Rule, token index)`, which bounds the cost of backtracking.
//!
//! Errors follow CPython's two-pass strategy. The first pass runs the plain grammar. If
//! it fails without having reported anything, the memo table is cleared and the same
//! input is parsed again with the `invalid_*` alternatives enabled; those alternatives
//! exist only to recognize common mistakes and report a targeted message. If the second
//! pass finds nothing specific either, a generic "invalid syntax" is reported at the
//! furthest token the first pass looked at.
//!
//! The first diagnostic is final: once reported, `error_indicator` makes every rule fail
//! immediately so the parse unwinds without cascading messages.

mod expressions;
mod numbers;
mod patterns;
mod statements;
mod strings;

use ahash::AHashMap;
use strum::IntoStaticStr;
use unicode_normalization::UnicodeNormalization;

use crate::{
    diagnostic::{Diagnostic, DiagnosticSink, ErrorKind, ErrorMessage, SourceRange},
    expressions::{ExprLoc, Keyword as KeywordArg, Mod, StmtLoc},
    fstring::{FExprContext, FExprParser},
    intern::{InternerBuilder, Keyword, StringId},
    options::{InputKind, ParseOptions},
    patterns::PatternLoc,
    tokenizer::{SourceBase, Token, TokenKind, Tokenizer},
    tracer::ParseTracer,
};

/// Memoized grammar rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum Rule {
    Expression,
    Disjunction,
    BitwiseOr,
    Primary,
    StarTarget,
    TargetWithStarAtom,
    DelTarget,
    Arguments,
    Strings,
    ClosedPattern,
    SimpleStmts,
    Block,
    InvalidNamedExpression,
}

#[derive(Debug, Clone)]
enum MemoNode {
    Expr(ExprLoc),
    Stmts(Vec<StmtLoc>),
    Args(Box<(Vec<ExprLoc>, Vec<KeywordArg>)>),
    Pattern(PatternLoc),
    Nothing,
}

#[derive(Debug, Clone)]
enum Memo {
    Success { node: MemoNode, end: usize },
    Fail,
}

/// Values that can be stored in the memo table.
trait Memoizable: Sized + Clone {
    fn into_node(self) -> MemoNode;
    fn from_node(node: &MemoNode) -> Option<Self>;
}

impl Memoizable for ExprLoc {
    fn into_node(self) -> MemoNode {
        MemoNode::Expr(self)
    }

    fn from_node(node: &MemoNode) -> Option<Self> {
        match node {
            MemoNode::Expr(e) => Some(e.clone()),
            _ => None,
        }
    }
}

impl Memoizable for Vec<StmtLoc> {
    fn into_node(self) -> MemoNode {
        MemoNode::Stmts(self)
    }

    fn from_node(node: &MemoNode) -> Option<Self> {
        match node {
            MemoNode::Stmts(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl Memoizable for (Vec<ExprLoc>, Vec<KeywordArg>) {
    fn into_node(self) -> MemoNode {
        MemoNode::Args(Box::new(self))
    }

    fn from_node(node: &MemoNode) -> Option<Self> {
        match node {
            MemoNode::Args(a) => Some((**a).clone()),
            _ => None,
        }
    }
}

impl Memoizable for PatternLoc {
    fn into_node(self) -> MemoNode {
        MemoNode::Pattern(self)
    }

    fn from_node(node: &MemoNode) -> Option<Self> {
        match node {
            MemoNode::Pattern(p) => Some(p.clone()),
            _ => None,
        }
    }
}

impl Memoizable for () {
    fn into_node(self) -> MemoNode {
        MemoNode::Nothing
    }

    fn from_node(node: &MemoNode) -> Option<Self> {
        matches!(node, MemoNode::Nothing).then_some(())
    }
}

/// Start rule for fragment parses (f-string replacement fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartRule {
    Input(InputKind),
    FString,
}

/// The grammar engine for one compilation unit (or one f-string fragment of it).
pub struct Parser<'src, 'a> {
    tokenizer: Tokenizer<'src>,
    tokens: Vec<Token<'src>>,
    pos: usize,
    memo: AHashMap<(Rule, usize), Memo>,
    pub(crate) interner: &'a mut InternerBuilder,
    sink: &'a mut DiagnosticSink,
    tracer: &'a mut dyn ParseTracer,
    fexpr: &'a dyn FExprParser,
    options: &'a ParseOptions,
    depth_remaining: u16,
    call_invalid_rules: bool,
    error_indicator: bool,
    /// How many f-string replacement fields enclose this parse.
    fstring_depth: u32,
}

impl std::fmt::Debug for Parser<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("pos", &self.pos)
            .field("tokens", &self.tokens.len())
            .field("call_invalid_rules", &self.call_invalid_rules)
            .field("error_indicator", &self.error_indicator)
            .finish_non_exhaustive()
    }
}

impl<'src, 'a> Parser<'src, 'a> {
    pub fn new(
        source: &'src str,
        options: &'a ParseOptions,
        interner: &'a mut InternerBuilder,
        sink: &'a mut DiagnosticSink,
        fexpr: &'a dyn FExprParser,
        tracer: &'a mut dyn ParseTracer,
    ) -> Self {
        let tokenizer = Tokenizer::new(source).tab_size(options.tab_size);
        Self::with_tokenizer(tokenizer, options, interner, sink, fexpr, tracer)
    }

    fn with_tokenizer(
        tokenizer: Tokenizer<'src>,
        options: &'a ParseOptions,
        interner: &'a mut InternerBuilder,
        sink: &'a mut DiagnosticSink,
        fexpr: &'a dyn FExprParser,
        tracer: &'a mut dyn ParseTracer,
    ) -> Self {
        Self {
            tokenizer,
            tokens: Vec::new(),
            pos: 0,
            memo: AHashMap::new(),
            interner,
            sink,
            tracer,
            fexpr,
            options,
            depth_remaining: options.max_nesting_depth,
            call_invalid_rules: false,
            error_indicator: false,
            fstring_depth: 0,
        }
    }

    /// Parser for a parenthesized f-string replacement field, positioned at `base`.
    pub(crate) fn for_fragment(
        source: &'src str,
        base: SourceBase,
        cx: &'a mut FExprContext<'_>,
        fexpr: &'a dyn FExprParser,
        tracer: &'a mut dyn ParseTracer,
    ) -> Self {
        let tokenizer = Tokenizer::with_base(source, base, 0).tab_size(cx.options.tab_size);
        let (fstring_depth, depth_remaining) = (cx.fstring_depth, cx.depth_remaining);
        let mut parser = Self::with_tokenizer(tokenizer, cx.options, cx.interner, cx.sink, fexpr, tracer);
        parser.fstring_depth = fstring_depth;
        parser.depth_remaining = depth_remaining;
        parser
    }

    /// Parses the whole input with the start rule selected by the options.
    ///
    /// Returns `None` when a diagnostic was reported; the diagnostic is in the sink.
    pub fn parse(&mut self) -> Option<Mod> {
        self.run_two_pass(StartRule::Input(self.options.mode)).and_then(|node| match node {
            Parsed::Mod(m) => Some(m),
            Parsed::Expr(_) => None,
        })
    }

    /// Parses an f-string replacement field (`star_expressions`).
    pub(crate) fn parse_fstring_expr(&mut self) -> Option<ExprLoc> {
        self.run_two_pass(StartRule::FString).and_then(|node| match node {
            Parsed::Expr(e) => Some(e),
            Parsed::Mod(_) => None,
        })
    }

    fn run_two_pass(&mut self, start: StartRule) -> Option<Parsed> {
        let result = self.run_start(start);
        if self.error_indicator {
            return None;
        }
        if result.is_some() {
            return result;
        }
        let last = self.tokens.len().saturating_sub(1);
        self.memo.clear();
        self.pos = 0;
        self.call_invalid_rules = true;
        self.tracer.on_invalid_pass();
        let _ = self.run_start(start);
        if !self.error_indicator {
            self.set_generic_syntax_error(last);
        }
        None
    }

    fn run_start(&mut self, start: StartRule) -> Option<Parsed> {
        let result = match start {
            StartRule::Input(InputKind::Module) => self.file().map(Parsed::Mod),
            StartRule::Input(InputKind::Single) => self.interactive().map(Parsed::Mod),
            StartRule::Input(InputKind::Eval) => self.eval().map(Parsed::Mod),
            StartRule::Input(InputKind::FunctionType) => self.func_type().map(Parsed::Mod),
            StartRule::FString => self.fstring().map(Parsed::Expr),
        };
        if self.error_indicator { None } else { result }
    }

    /// No targeted message was found: report the generic error at the furthest token the
    /// first pass fetched, unless the rest of the input holds a lexical error.
    fn set_generic_syntax_error(&mut self, last: usize) {
        let Some(token) = self.tokens.get(last) else {
            self.raise_syntax::<()>(SourceRange::default(), ErrorMessage::InvalidSyntax, &[]);
            return;
        };
        let range = token.range;
        match token.kind {
            TokenKind::Indent => {
                self.raise::<()>(ErrorKind::Indentation, range, ErrorMessage::UnexpectedIndent.format(&[]));
            }
            TokenKind::Dedent => {
                self.raise::<()>(ErrorKind::Indentation, range, ErrorMessage::UnexpectedUnindent.format(&[]));
            }
            _ => {
                while self.tokens.last().is_some_and(|t| t.kind != TokenKind::EndMarker) {
                    let pos = self.tokens.len();
                    self.pos = pos;
                    self.fill();
                    if self.error_indicator {
                        return;
                    }
                }
                self.raise_syntax::<()>(range, ErrorMessage::InvalidSyntax, &[]);
            }
        }
    }

    // ------------------------------------------------------------------------
    // start rules
    // ------------------------------------------------------------------------

    /// `file: [statements] ENDMARKER`
    fn file(&mut self) -> Option<Mod> {
        let body = self.statements().unwrap_or_default();
        self.expect(TokenKind::EndMarker)?;
        Some(Mod::Module(body))
    }

    /// `interactive: statement_newline`, then nothing but blank lines may follow.
    fn interactive(&mut self) -> Option<Mod> {
        let body = match self.peek_kind() {
            TokenKind::Newline => {
                let idx = self.advance();
                let range = self.tokens[idx].range;
                vec![StmtLoc::new(range, crate::expressions::Stmt::Pass)]
            }
            TokenKind::EndMarker => return None,
            _ => {
                let mark = self.mark();
                if let Some(stmt) = self.compound_stmt() {
                    self.eat(TokenKind::Newline);
                    vec![stmt]
                } else {
                    self.reset(mark);
                    self.simple_stmts()?
                }
            }
        };
        while self.eat(TokenKind::Newline).is_some() {}
        if self.peek_kind() != TokenKind::EndMarker {
            let range = self.current_range();
            return self.raise_syntax(range, ErrorMessage::MultipleStatements, &[]);
        }
        Some(Mod::Interactive(body))
    }

    /// `eval: expressions NEWLINE* ENDMARKER`
    fn eval(&mut self) -> Option<Mod> {
        let body = self.expressions()?;
        while self.eat(TokenKind::Newline).is_some() {}
        self.expect(TokenKind::EndMarker)?;
        Some(Mod::Expression(body))
    }

    /// `func_type: '(' [type_expressions] ')' '->' expression NEWLINE* ENDMARKER`
    fn func_type(&mut self) -> Option<Mod> {
        self.expect(TokenKind::Lpar)?;
        let mut argtypes = Vec::new();
        while self.peek_kind() != TokenKind::Rpar {
            let start = self.mark();
            let expr = if self.eat(TokenKind::Star).is_some() || self.eat(TokenKind::DoubleStar).is_some() {
                let value = self.expression()?;
                let range = self.range_from(start);
                ExprLoc::new(
                    range,
                    crate::expressions::Expr::Starred {
                        value: Box::new(value),
                        ctx: crate::expressions::ExprContext::Load,
                    },
                )
            } else {
                self.expression()?
            };
            argtypes.push(expr);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Rpar)?;
        self.expect(TokenKind::Rarrow)?;
        let returns = self.expression()?;
        while self.eat(TokenKind::Newline).is_some() {}
        self.expect(TokenKind::EndMarker)?;
        Some(Mod::FunctionType { argtypes, returns })
    }

    /// `fstring: star_expressions`, on the parenthesized fragment.
    fn fstring(&mut self) -> Option<ExprLoc> {
        let expr = self.star_expressions()?;
        while self.eat(TokenKind::Newline).is_some() {}
        self.expect(TokenKind::EndMarker)?;
        Some(expr)
    }

    // ------------------------------------------------------------------------
    // token buffer
    // ------------------------------------------------------------------------

    /// Makes sure `tokens[pos]` exists. Lexical errors are reported as soon as the
    /// offending token is fetched.
    fn fill(&mut self) {
        while self.tokens.len() <= self.pos {
            let token = self.tokenizer.next_token();
            if let Some(err) = &token.error {
                let (kind, range, message) = (err.kind, err.range, err.message.clone());
                self.raise::<()>(kind, range, message);
            }
            self.tokens.push(token);
        }
    }

    fn mark(&self) -> usize {
        self.pos
    }

    fn reset(&mut self, mark: usize) {
        self.pos = mark;
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.fill();
        self.tokens[self.pos].kind
    }

    /// Kind of the token `n` positions after the cursor.
    fn peek_nth(&mut self, n: usize) -> TokenKind {
        let saved = self.pos;
        self.pos += n;
        self.fill();
        let kind = self.tokens[self.pos].kind;
        self.pos = saved;
        kind
    }

    fn peek_token(&mut self) -> &Token<'src> {
        self.fill();
        &self.tokens[self.pos]
    }

    fn is_keyword(&mut self, keyword: Keyword) -> bool {
        self.peek_kind() == TokenKind::Keyword(keyword)
    }

    fn is_soft_keyword(&mut self, word: &str) -> bool {
        self.peek_token().is_soft_keyword(word)
    }

    /// Consumes the current token and returns its index.
    fn advance(&mut self) -> usize {
        self.fill();
        let idx = self.pos;
        if self.tokens[idx].kind != TokenKind::EndMarker {
            self.pos += 1;
        }
        idx
    }

    fn eat(&mut self, kind: TokenKind) -> Option<usize> {
        (self.peek_kind() == kind).then(|| self.advance())
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> Option<usize> {
        self.eat(TokenKind::Keyword(keyword))
    }

    fn eat_soft_keyword(&mut self, word: &str) -> Option<usize> {
        self.is_soft_keyword(word).then(|| self.advance())
    }

    fn expect(&mut self, kind: TokenKind) -> Option<usize> {
        if self.error_indicator {
            return None;
        }
        self.eat(kind)
    }

    /// A forced token (`&&'x'` in CPython's grammar): missing it is an immediate error.
    fn expect_forced(&mut self, kind: TokenKind, text: &str) -> Option<usize> {
        if let Some(idx) = self.eat(kind) {
            return Some(idx);
        }
        let range = self.current_range();
        if kind == TokenKind::Colon {
            self.raise_syntax(range, ErrorMessage::ExpectedColon, &[])
        } else {
            self.raise_syntax(range, ErrorMessage::ExpectedToken, &[text])
        }
    }

    fn tok(&self, idx: usize) -> &Token<'src> {
        &self.tokens[idx]
    }

    fn current_range(&mut self) -> SourceRange {
        self.fill();
        self.tokens[self.pos].range
    }

    /// Range of the token just before the cursor.
    fn last_range(&self) -> SourceRange {
        self.tokens[self.pos.saturating_sub(1)].range
    }

    /// Range from the token at `start` to the last consumed token.
    fn range_from(&self, start: usize) -> SourceRange {
        let first = self.tokens[start].range;
        if self.pos > start {
            first.to(self.last_range())
        } else {
            first.start_point()
        }
    }

    fn intern_token(&mut self, idx: usize) -> StringId {
        let text = self.tokens[idx].text;
        self.intern_identifier(text)
    }

    /// Interns an identifier in NFKC form, the spelling names are compared in.
    fn intern_identifier(&mut self, text: &str) -> StringId {
        if text.is_ascii() {
            return self.interner.intern(text);
        }
        let normalized: String = text.nfkc().collect();
        self.interner.intern(&normalized)
    }

    // ------------------------------------------------------------------------
    // memo and depth guard
    // ------------------------------------------------------------------------

    fn memoized<T: Memoizable>(&mut self, rule: Rule, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        if self.error_indicator {
            return None;
        }
        let start = self.pos;
        if let Some(entry) = self.memo.get(&(rule, start)) {
            let hit = match entry {
                Memo::Success { node, end } => T::from_node(node).map(|value| (value, *end)),
                Memo::Fail => None,
            };
            self.tracer.on_memo_hit(rule, start);
            return match hit {
                Some((value, end)) => {
                    self.pos = end;
                    Some(value)
                }
                None => None,
            };
        }
        let result = f(self);
        let entry = match &result {
            Some(value) => Memo::Success {
                node: value.clone().into_node(),
                end: self.pos,
            },
            None => {
                self.pos = start;
                Memo::Fail
            }
        };
        self.tracer.on_memo_store(rule, start, result.is_some());
        self.memo.insert((rule, start), entry);
        result
    }

    /// Runs `f` one nesting level deeper, failing with "too many nested parentheses"
    /// once the configured depth is exhausted.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        if self.error_indicator {
            return None;
        }
        if self.depth_remaining == 0 {
            let range = self.current_range();
            return self.raise_syntax(range, ErrorMessage::TooManyNestedParens, &[]);
        }
        self.depth_remaining -= 1;
        let result = f(self);
        self.depth_remaining += 1;
        result
    }

    /// Charges one nesting level for a link of a left-nested chain (`a + b + c`,
    /// `a.b.c`), whose tree grows one level per link although no rule recurses. The
    /// caller hands the charged levels back through [`Self::release_links`].
    fn charge_link(&mut self) -> Option<()> {
        if self.error_indicator {
            return None;
        }
        if self.depth_remaining == 0 {
            let range = self.current_range();
            return self.raise_syntax(range, ErrorMessage::TooManyNestedParens, &[]);
        }
        self.depth_remaining -= 1;
        Some(())
    }

    fn release_links(&mut self, links: u16) {
        self.depth_remaining += links;
    }

    /// Runs `f`, rewinding the cursor if it fails.
    fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let mark = self.pos;
        let result = f(self);
        if result.is_none() {
            self.pos = mark;
        }
        result
    }

    /// Positive lookahead: whether `f` would succeed here. Never moves the cursor.
    fn lookahead<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> bool {
        let mark = self.pos;
        let matched = f(self).is_some();
        self.pos = mark;
        matched
    }

    /// Runs `f` with the `invalid_*` alternatives switched off.
    fn without_invalid<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let saved = self.call_invalid_rules;
        self.call_invalid_rules = false;
        let result = f(self);
        self.call_invalid_rules = saved;
        result
    }

    // ------------------------------------------------------------------------
    // diagnostics
    // ------------------------------------------------------------------------

    fn raise<T>(&mut self, kind: ErrorKind, range: SourceRange, message: String) -> Option<T> {
        if !self.error_indicator {
            self.error_indicator = true;
            let diagnostic = Diagnostic::new(kind, range, message);
            self.tracer.on_diagnostic(&diagnostic);
            self.sink.push(diagnostic);
        }
        None
    }

    fn raise_syntax<T>(&mut self, range: SourceRange, message: ErrorMessage, args: &[&str]) -> Option<T> {
        self.raise(ErrorKind::Syntax, range, message.format(args))
    }

    fn raise_indentation<T>(&mut self, range: SourceRange, message: ErrorMessage, args: &[&str]) -> Option<T> {
        self.raise(ErrorKind::Indentation, range, message.format(args))
    }

    /// Range of the furthest token fetched so far, CPython's default error location.
    fn last_fetched_range(&self) -> SourceRange {
        self.tokens.last().map(|t| t.range).unwrap_or_default()
    }

    fn raise_syntax_here<T>(&mut self, message: ErrorMessage, args: &[&str]) -> Option<T> {
        let range = self.last_fetched_range();
        self.raise_syntax(range, message, args)
    }

    fn raise_indentation_here<T>(&mut self, message: ErrorMessage, args: &[&str]) -> Option<T> {
        let range = self.last_fetched_range();
        self.raise_indentation(range, message, args)
    }
}

enum Parsed {
    Mod(Mod),
    Expr(ExprLoc),
}

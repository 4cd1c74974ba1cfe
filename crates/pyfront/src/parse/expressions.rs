//! Expression rules, assignment targets and call arguments.

use smallvec::SmallVec;

use super::{Parser, Rule};
use crate::{
    diagnostic::{ErrorMessage, SourceRange},
    expressions::{
        BoolOp, CmpOp, Comprehension, Expr, ExprContext, ExprLoc, Keyword as KeywordArg, Literal, Operator, UnaryOp,
    },
    intern::{Keyword, StringId},
    tokenizer::TokenKind,
};

/// The target grammar an invalid target was found in; decides how starred and
/// comparison nodes are judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TargetsType {
    Star,
    Del,
    For,
}

/// The first sub-expression of `expr` that cannot appear as a target, if any.
pub(super) fn invalid_target(expr: &ExprLoc, targets: TargetsType) -> Option<&ExprLoc> {
    match &expr.expr {
        Expr::List { elts, .. } | Expr::Tuple { elts, .. } => elts.iter().find_map(|e| invalid_target(e, targets)),
        Expr::Starred { value, .. } => {
            if targets == TargetsType::Del {
                Some(expr)
            } else {
                invalid_target(value, targets)
            }
        }
        // `for x in y` parses as the comparison `x in y` when the target is bad
        Expr::Compare { left, ops, .. } => {
            if targets == TargetsType::For && ops.first() == Some(&CmpOp::In) {
                invalid_target(left, targets)
            } else {
                Some(expr)
            }
        }
        Expr::Name { .. } | Expr::Subscript { .. } | Expr::Attribute { .. } => None,
        _ => Some(expr),
    }
}

/// Names the grammar treats as keywords in some positions only.
pub(super) fn is_soft_keyword_text(text: &str) -> bool {
    matches!(text, "_" | "case" | "match" | "type")
}

enum Trailer {
    Attr(StringId),
    Call(Vec<ExprLoc>, Vec<KeywordArg>),
    Subscript(ExprLoc),
}

fn starred(range: SourceRange, value: ExprLoc, ctx: ExprContext) -> ExprLoc {
    ExprLoc::new(
        range,
        Expr::Starred {
            value: Box::new(value),
            ctx,
        },
    )
}

impl Parser<'_, '_> {
    // ------------------------------------------------------------------------
    // expression lists
    // ------------------------------------------------------------------------

    /// `expressions: expression (',' expression)* [',']`
    pub(super) fn expressions(&mut self) -> Option<ExprLoc> {
        self.expression_list(Self::expression)
    }

    /// `star_expressions: star_expression (',' star_expression)* [',']`
    pub(super) fn star_expressions(&mut self) -> Option<ExprLoc> {
        self.expression_list(Self::star_expression)
    }

    fn expression_list(&mut self, mut item: impl FnMut(&mut Self) -> Option<ExprLoc>) -> Option<ExprLoc> {
        let start = self.mark();
        let first = item(self)?;
        if self.peek_kind() != TokenKind::Comma {
            return Some(first);
        }
        let mut elts = vec![first];
        while self.eat(TokenKind::Comma).is_some() {
            let after_comma = self.mark();
            match item(self) {
                Some(e) => elts.push(e),
                None => {
                    self.reset(after_comma);
                    break;
                }
            }
        }
        Some(ExprLoc::new(
            self.range_from(start),
            Expr::Tuple {
                elts,
                ctx: ExprContext::Load,
            },
        ))
    }

    /// `star_expression: '*' bitwise_or | expression`
    pub(super) fn star_expression(&mut self) -> Option<ExprLoc> {
        if self.peek_kind() == TokenKind::Star {
            return self.starred_bitwise_or();
        }
        self.expression()
    }

    fn starred_bitwise_or(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.eat(TokenKind::Star)?;
            let value = p.bitwise_or()?;
            Some(starred(p.range_from(start), value, ExprContext::Load))
        })
    }

    /// `star_named_expressions: ','.star_named_expression+ [',']`
    pub(super) fn star_named_expressions(&mut self) -> Option<Vec<ExprLoc>> {
        let items = self.gather(TokenKind::Comma, Self::star_named_expression)?;
        self.eat(TokenKind::Comma);
        Some(items)
    }

    /// `star_named_expression: '*' bitwise_or | named_expression`
    pub(super) fn star_named_expression(&mut self) -> Option<ExprLoc> {
        if self.peek_kind() == TokenKind::Star {
            return self.starred_bitwise_or();
        }
        self.named_expression()
    }

    /// `starred_expression: '*' expression`
    pub(super) fn starred_expression(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.eat(TokenKind::Star)?;
            let value = p.expression()?;
            Some(starred(p.range_from(start), value, ExprContext::Load))
        })
    }

    /// `','.item+`: one or more items separated by `sep`, without a trailing separator.
    pub(super) fn gather<T>(&mut self, sep: TokenKind, mut item: impl FnMut(&mut Self) -> Option<T>) -> Option<Vec<T>> {
        let mut items = vec![item(self)?];
        loop {
            let mark = self.mark();
            if self.eat(sep).is_none() {
                break;
            }
            match item(self) {
                Some(value) => items.push(value),
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        Some(items)
    }

    // ------------------------------------------------------------------------
    // named and conditional expressions
    // ------------------------------------------------------------------------

    /// `named_expression: assignment_expression | invalid_named_expression | expression !':='`
    pub(super) fn named_expression(&mut self) -> Option<ExprLoc> {
        if self.peek_kind() == TokenKind::Name && self.peek_nth(1) == TokenKind::ColonEqual {
            return self.assignment_expression();
        }
        let start = self.mark();
        if self.call_invalid_rules {
            self.invalid_named_expression();
            if self.error_indicator {
                return None;
            }
            self.reset(start);
        }
        self.attempt(|p| {
            let expr = p.expression()?;
            (p.peek_kind() != TokenKind::ColonEqual).then_some(expr)
        })
    }

    /// `assignment_expression: NAME ':=' ~ expression`
    pub(super) fn assignment_expression(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.eat(TokenKind::Name)?;
            p.eat(TokenKind::ColonEqual)?;
            let id = p.intern_token(start);
            let target = ExprLoc::new(
                p.tok(start).range,
                Expr::Name {
                    id,
                    ctx: ExprContext::Store,
                },
            );
            let value = p.expression()?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::NamedExpr {
                    target: Box::new(target),
                    value: Box::new(value),
                },
            ))
        })
    }

    /// Recognizes `=` and `:=` used where neither is allowed. Never succeeds.
    fn invalid_named_expression(&mut self) -> Option<()> {
        self.memoized(Rule::InvalidNamedExpression, |p| {
            let start = p.mark();
            if let Some(a) = p.expression()
                && p.eat(TokenKind::ColonEqual).is_some()
                && p.expression().is_some()
            {
                return p.raise_syntax(a.position, ErrorMessage::NamedExprTarget, &[a.expr.describe()]);
            }
            p.reset(start);
            if p.peek_kind() == TokenKind::Name && p.peek_nth(1) == TokenKind::Equal {
                let name = p.advance();
                p.advance();
                if let Some(b) = p.bitwise_or()
                    && !matches!(p.peek_kind(), TokenKind::Equal | TokenKind::ColonEqual)
                {
                    let range = p.tok(name).range.to(b.position);
                    return p.raise_syntax(range, ErrorMessage::MaybeMeantEquality, &[]);
                }
            }
            p.reset(start);
            let excluded = matches!(
                p.peek_kind(),
                TokenKind::Keyword(Keyword::True | Keyword::False | Keyword::None)
            ) || p.lookahead(Self::list_display)
                || p.lookahead(Self::tuple_display)
                || p.lookahead(Self::genexp);
            if !excluded
                && let Some(a) = p.bitwise_or()
                && p.eat(TokenKind::Equal).is_some()
                && p.bitwise_or().is_some()
                && !matches!(p.peek_kind(), TokenKind::Equal | TokenKind::ColonEqual)
            {
                return p.raise_syntax(a.position, ErrorMessage::CannotAssignHere, &[a.expr.describe()]);
            }
            None
        })
    }

    /// `expression: invalid_expression | invalid_legacy_expression
    ///     | disjunction 'if' disjunction 'else' expression | disjunction | lambdef`
    pub(super) fn expression(&mut self) -> Option<ExprLoc> {
        self.memoized(Rule::Expression, |p| {
            p.nested(|p| {
                if p.call_invalid_rules {
                    let start = p.mark();
                    p.invalid_expression();
                    if p.error_indicator {
                        return None;
                    }
                    p.reset(start);
                    p.invalid_legacy_expression();
                    if p.error_indicator {
                        return None;
                    }
                    p.reset(start);
                }
                p.expression_plain()
            })
        })
    }

    fn expression_plain(&mut self) -> Option<ExprLoc> {
        if self.is_keyword(Keyword::Lambda) {
            return self.lambdef();
        }
        let start = self.mark();
        let body = self.disjunction()?;
        let after_body = self.mark();
        if self.eat_keyword(Keyword::If).is_some() {
            if let Some(test) = self.disjunction()
                && self.eat_keyword(Keyword::Else).is_some()
                && let Some(orelse) = self.expression()
            {
                return Some(ExprLoc::new(
                    self.range_from(start),
                    Expr::IfExp {
                        test: Box::new(test),
                        body: Box::new(body),
                        orelse: Box::new(orelse),
                    },
                ));
            }
            self.reset(after_body);
        }
        Some(body)
    }

    fn expression_without_invalid(&mut self) -> Option<ExprLoc> {
        self.without_invalid(|p| p.nested(|p| p.attempt(Self::expression_plain)))
    }

    /// Two adjacent expressions inside brackets (a forgotten comma) or a conditional
    /// expression without `else`. Never succeeds.
    fn invalid_expression(&mut self) -> Option<()> {
        let start = self.mark();
        let blocked = {
            let tok = self.peek_token();
            tok.kind == TokenKind::Name && is_soft_keyword_text(tok.text)
        } || (self.peek_kind() == TokenKind::Name && self.peek_nth(1) == TokenKind::String);
        if !blocked
            && let Some(a) = self.disjunction()
            && let Some(b) = self.expression_without_invalid()
        {
            let level = self.tokens[self.pos - 1].level;
            if !self.is_legacy_name(&a) && level != 0 {
                return self.raise_syntax(a.position.to(b.position), ErrorMessage::ForgotComma, &[]);
            }
        }
        self.reset(start);
        if let Some(a) = self.disjunction()
            && self.eat_keyword(Keyword::If).is_some()
            && let Some(b) = self.disjunction()
            && !matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Else) | TokenKind::Colon)
        {
            return self.raise_syntax(a.position.to(b.position), ErrorMessage::ExpectedElse, &[]);
        }
        self.reset(start);
        None
    }

    /// `print x` and `exec x` from Python 2. Never succeeds.
    fn invalid_legacy_expression(&mut self) -> Option<()> {
        let start = self.mark();
        let name = {
            let tok = self.peek_token();
            (tok.kind == TokenKind::Name && matches!(tok.text, "print" | "exec")).then_some(tok.text)
        };
        if let Some(name) = name
            && self.peek_nth(1) != TokenKind::Lpar
        {
            let name_idx = self.advance();
            if let Some(b) = self.star_expressions() {
                let range = self.tok(name_idx).range.to(b.position);
                return self.raise_syntax(range, ErrorMessage::MissingParens, &[name, name]);
            }
        }
        self.reset(start);
        None
    }

    fn is_legacy_name(&self, expr: &ExprLoc) -> bool {
        expr.name_id()
            .is_some_and(|id| matches!(self.interner.get_str(id), "print" | "exec"))
    }

    /// `lambdef: 'lambda' [lambda_params] ':' expression`
    fn lambdef(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.eat_keyword(Keyword::Lambda)?;
            let args = if p.peek_kind() == TokenKind::Colon {
                Default::default()
            } else {
                p.parameters(true)?
            };
            p.eat(TokenKind::Colon)?;
            let body = p.expression()?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::Lambda {
                    args: Box::new(args),
                    body: Box::new(body),
                },
            ))
        })
    }

    /// `yield_expr: 'yield' 'from' expression | 'yield' [star_expressions]`
    pub(super) fn yield_expr(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.eat_keyword(Keyword::Yield)?;
            if p.eat_keyword(Keyword::From).is_some() {
                let value = p.expression()?;
                return Some(ExprLoc::new(p.range_from(start), Expr::YieldFrom(Box::new(value))));
            }
            let value = p.star_expressions().map(Box::new);
            Some(ExprLoc::new(p.range_from(start), Expr::Yield(value)))
        })
    }

    // ------------------------------------------------------------------------
    // boolean operators and comparisons
    // ------------------------------------------------------------------------

    /// `disjunction: conjunction ('or' conjunction)+ | conjunction`
    pub(super) fn disjunction(&mut self) -> Option<ExprLoc> {
        self.memoized(Rule::Disjunction, |p| p.bool_chain(Keyword::Or, BoolOp::Or, Self::conjunction))
    }

    /// `conjunction: inversion ('and' inversion)+ | inversion`
    fn conjunction(&mut self) -> Option<ExprLoc> {
        self.bool_chain(Keyword::And, BoolOp::And, Self::inversion)
    }

    fn bool_chain(
        &mut self,
        keyword: Keyword,
        op: BoolOp,
        mut operand: impl FnMut(&mut Self) -> Option<ExprLoc>,
    ) -> Option<ExprLoc> {
        let start = self.mark();
        let first = operand(self)?;
        if !self.is_keyword(keyword) {
            return Some(first);
        }
        let mut values = vec![first];
        loop {
            let mark = self.mark();
            if self.eat_keyword(keyword).is_none() {
                break;
            }
            match operand(self) {
                Some(value) => values.push(value),
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        if values.len() == 1 {
            return values.pop();
        }
        Some(ExprLoc::new(self.range_from(start), Expr::BoolOp { op, values }))
    }

    /// `inversion: 'not' inversion | comparison`
    fn inversion(&mut self) -> Option<ExprLoc> {
        if self.is_keyword(Keyword::Not) {
            return self.attempt(|p| {
                let start = p.advance();
                let operand = p.nested(Self::inversion)?;
                Some(ExprLoc::new(
                    p.range_from(start),
                    Expr::UnaryOp {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                ))
            });
        }
        self.comparison()
    }

    /// `comparison: bitwise_or compare_op_bitwise_or_pair+ | bitwise_or`
    fn comparison(&mut self) -> Option<ExprLoc> {
        let start = self.mark();
        let left = self.bitwise_or()?;
        let mut ops: SmallVec<[CmpOp; 2]> = SmallVec::new();
        let mut comparators = Vec::new();
        loop {
            let mark = self.mark();
            let Some(op) = self.compare_op() else { break };
            match self.bitwise_or() {
                Some(right) => {
                    ops.push(op);
                    comparators.push(right);
                }
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        if ops.is_empty() {
            return Some(left);
        }
        Some(ExprLoc::new(
            self.range_from(start),
            Expr::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
        ))
    }

    fn compare_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek_kind() {
            TokenKind::EqEqual => CmpOp::Eq,
            TokenKind::NotEqual => CmpOp::NotEq,
            TokenKind::LessEqual => CmpOp::LtE,
            TokenKind::Less => CmpOp::Lt,
            TokenKind::GreaterEqual => CmpOp::GtE,
            TokenKind::Greater => CmpOp::Gt,
            TokenKind::Keyword(Keyword::In) => CmpOp::In,
            TokenKind::Keyword(Keyword::Not) => {
                if self.peek_nth(1) != TokenKind::Keyword(Keyword::In) {
                    return None;
                }
                self.advance();
                CmpOp::NotIn
            }
            TokenKind::Keyword(Keyword::Is) => {
                if self.peek_nth(1) == TokenKind::Keyword(Keyword::Not) {
                    self.advance();
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    // ------------------------------------------------------------------------
    // binary operators
    // ------------------------------------------------------------------------

    /// `bitwise_or: bitwise_or '|' bitwise_xor | bitwise_xor`
    pub(super) fn bitwise_or(&mut self) -> Option<ExprLoc> {
        self.memoized(Rule::BitwiseOr, |p| {
            p.binary_chain(
                |kind| (kind == TokenKind::Vbar).then_some(Operator::BitOr),
                Self::bitwise_xor,
            )
        })
    }

    fn bitwise_xor(&mut self) -> Option<ExprLoc> {
        self.binary_chain(
            |kind| (kind == TokenKind::Circumflex).then_some(Operator::BitXor),
            Self::bitwise_and,
        )
    }

    fn bitwise_and(&mut self) -> Option<ExprLoc> {
        self.binary_chain(
            |kind| (kind == TokenKind::Amper).then_some(Operator::BitAnd),
            Self::shift_expr,
        )
    }

    fn shift_expr(&mut self) -> Option<ExprLoc> {
        self.binary_chain(
            |kind| match kind {
                TokenKind::LeftShift => Some(Operator::LShift),
                TokenKind::RightShift => Some(Operator::RShift),
                _ => None,
            },
            Self::sum,
        )
    }

    pub(super) fn sum(&mut self) -> Option<ExprLoc> {
        self.binary_chain(
            |kind| match kind {
                TokenKind::Plus => Some(Operator::Add),
                TokenKind::Minus => Some(Operator::Sub),
                _ => None,
            },
            Self::term,
        )
    }

    fn term(&mut self) -> Option<ExprLoc> {
        self.binary_chain(
            |kind| match kind {
                TokenKind::Star => Some(Operator::Mult),
                TokenKind::Slash => Some(Operator::Div),
                TokenKind::DoubleSlash => Some(Operator::FloorDiv),
                TokenKind::Percent => Some(Operator::Mod),
                TokenKind::At => Some(Operator::MatMult),
                _ => None,
            },
            Self::factor,
        )
    }

    /// Left-associative chain `operand (op operand)*`.
    fn binary_chain(
        &mut self,
        op_for: impl Fn(TokenKind) -> Option<Operator>,
        mut operand: impl FnMut(&mut Self) -> Option<ExprLoc>,
    ) -> Option<ExprLoc> {
        let start = self.mark();
        let mut left = operand(self)?;
        let mut links = 0;
        loop {
            let mark = self.mark();
            let Some(op) = op_for(self.peek_kind()) else { break };
            if self.charge_link().is_none() {
                break;
            }
            links += 1;
            self.advance();
            match operand(self) {
                Some(right) => {
                    left = ExprLoc::new(
                        self.range_from(start),
                        Expr::BinOp {
                            left: Box::new(left),
                            op,
                            right: Box::new(right),
                        },
                    );
                }
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        self.release_links(links);
        (!self.error_indicator).then_some(left)
    }

    /// `factor: '+' factor | '-' factor | '~' factor | power`
    fn factor(&mut self) -> Option<ExprLoc> {
        let op = match self.peek_kind() {
            TokenKind::Plus => UnaryOp::UAdd,
            TokenKind::Minus => UnaryOp::USub,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.power(),
        };
        self.attempt(|p| {
            let start = p.advance();
            let operand = p.nested(Self::factor)?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::UnaryOp {
                    op,
                    operand: Box::new(operand),
                },
            ))
        })
    }

    /// `power: await_primary '**' factor | await_primary`
    fn power(&mut self) -> Option<ExprLoc> {
        let start = self.mark();
        let base = self.await_primary()?;
        let mark = self.mark();
        if self.eat(TokenKind::DoubleStar).is_some() {
            if let Some(exponent) = self.nested(Self::factor) {
                return Some(ExprLoc::new(
                    self.range_from(start),
                    Expr::BinOp {
                        left: Box::new(base),
                        op: Operator::Pow,
                        right: Box::new(exponent),
                    },
                ));
            }
            self.reset(mark);
        }
        Some(base)
    }

    /// `await_primary: AWAIT primary | primary`
    fn await_primary(&mut self) -> Option<ExprLoc> {
        if self.is_keyword(Keyword::Await) {
            return self.attempt(|p| {
                let start = p.advance();
                let value = p.primary()?;
                Some(ExprLoc::new(p.range_from(start), Expr::Await(Box::new(value))))
            });
        }
        self.primary()
    }

    // ------------------------------------------------------------------------
    // primaries
    // ------------------------------------------------------------------------

    /// `primary: primary '.' NAME | primary genexp | primary '(' [arguments] ')'
    ///     | primary '[' slices ']' | atom`
    pub(super) fn primary(&mut self) -> Option<ExprLoc> {
        self.memoized(Rule::Primary, |p| {
            let start = p.mark();
            let mut expr = p.atom()?;
            let mut links = 0;
            while p.at_t_lookahead() && p.charge_link().is_some() {
                links += 1;
                let Some(trailer) = p.trailer() else { break };
                expr = p.apply_trailer(start, expr, trailer, ExprContext::Load);
            }
            p.release_links(links);
            (!p.error_indicator).then_some(expr)
        })
    }

    fn trailer(&mut self) -> Option<Trailer> {
        self.attempt(|p| match p.peek_kind() {
            TokenKind::Dot => {
                p.advance();
                let name = p.eat(TokenKind::Name)?;
                Some(Trailer::Attr(p.intern_token(name)))
            }
            TokenKind::Lpar => {
                if let Some(genexp) = p.genexp() {
                    return Some(Trailer::Call(vec![genexp], Vec::new()));
                }
                if p.error_indicator {
                    return None;
                }
                p.advance();
                let (args, keywords) = if p.peek_kind() == TokenKind::Rpar {
                    (Vec::new(), Vec::new())
                } else {
                    p.arguments()?
                };
                p.expect(TokenKind::Rpar)?;
                Some(Trailer::Call(args, keywords))
            }
            TokenKind::Lsqb => {
                p.advance();
                let slice = p.slices()?;
                p.expect(TokenKind::Rsqb)?;
                Some(Trailer::Subscript(slice))
            }
            _ => None,
        })
    }

    fn apply_trailer(&self, start: usize, value: ExprLoc, trailer: Trailer, ctx: ExprContext) -> ExprLoc {
        let range = self.range_from(start);
        let value = Box::new(value);
        let expr = match trailer {
            Trailer::Attr(attr) => Expr::Attribute { value, attr, ctx },
            Trailer::Call(args, keywords) => Expr::Call {
                func: value,
                args,
                keywords,
            },
            Trailer::Subscript(slice) => Expr::Subscript {
                value,
                slice: Box::new(slice),
                ctx,
            },
        };
        ExprLoc::new(range, expr)
    }

    /// `slices: slice !',' | ','.(slice | starred_expression)+ [',']`
    fn slices(&mut self) -> Option<ExprLoc> {
        let start = self.mark();
        let first_is_starred = self.peek_kind() == TokenKind::Star;
        let first = self.slice_or_starred()?;
        if !first_is_starred && self.peek_kind() != TokenKind::Comma {
            return Some(first);
        }
        let mut elts = vec![first];
        while self.eat(TokenKind::Comma).is_some() {
            let after_comma = self.mark();
            match self.slice_or_starred() {
                Some(e) => elts.push(e),
                None => {
                    self.reset(after_comma);
                    break;
                }
            }
        }
        Some(ExprLoc::new(
            self.range_from(start),
            Expr::Tuple {
                elts,
                ctx: ExprContext::Load,
            },
        ))
    }

    fn slice_or_starred(&mut self) -> Option<ExprLoc> {
        if self.peek_kind() == TokenKind::Star {
            self.starred_expression()
        } else {
            self.slice()
        }
    }

    /// `slice: [expression] ':' [expression] [':' [expression]] | named_expression`
    fn slice(&mut self) -> Option<ExprLoc> {
        let start = self.mark();
        let lower = self.expression();
        if self.eat(TokenKind::Colon).is_some() {
            let upper = self.expression();
            let step = if self.eat(TokenKind::Colon).is_some() {
                self.expression()
            } else {
                None
            };
            return Some(ExprLoc::new(
                self.range_from(start),
                Expr::Slice {
                    lower: lower.map(Box::new),
                    upper: upper.map(Box::new),
                    step: step.map(Box::new),
                },
            ));
        }
        self.reset(start);
        self.named_expression()
    }

    // ------------------------------------------------------------------------
    // atoms and displays
    // ------------------------------------------------------------------------

    /// `atom: NAME | 'True' | 'False' | 'None' | strings | NUMBER
    ///     | (tuple | group | genexp) | (list | listcomp)
    ///     | (dict | set | dictcomp | setcomp) | '...'`
    pub(super) fn atom(&mut self) -> Option<ExprLoc> {
        match self.peek_kind() {
            TokenKind::Name => {
                let idx = self.advance();
                let id = self.intern_token(idx);
                Some(ExprLoc::new(
                    self.tok(idx).range,
                    Expr::Name {
                        id,
                        ctx: ExprContext::Load,
                    },
                ))
            }
            TokenKind::Keyword(Keyword::True) => Some(self.constant(Literal::Bool(true))),
            TokenKind::Keyword(Keyword::False) => Some(self.constant(Literal::Bool(false))),
            TokenKind::Keyword(Keyword::None) => Some(self.constant(Literal::None)),
            TokenKind::Ellipsis => Some(self.constant(Literal::Ellipsis)),
            TokenKind::String => self.strings(),
            TokenKind::Number => self.number(),
            TokenKind::Lpar => self.first_of(&[Self::tuple_display, Self::group, Self::genexp]),
            TokenKind::Lsqb => self.first_of(&[Self::list_display, Self::listcomp]),
            TokenKind::Lbrace => self.first_of(&[Self::dict_display, Self::set_display, Self::dictcomp, Self::setcomp]),
            _ => None,
        }
    }

    /// Ordered choice: the first alternative that succeeds.
    fn first_of(&mut self, alternatives: &[fn(&mut Self) -> Option<ExprLoc>]) -> Option<ExprLoc> {
        for alternative in alternatives {
            if let Some(expr) = alternative(self) {
                return Some(expr);
            }
            if self.error_indicator {
                return None;
            }
        }
        None
    }

    fn constant(&mut self, literal: Literal) -> ExprLoc {
        let idx = self.advance();
        ExprLoc::new(self.tok(idx).range, Expr::Constant(literal))
    }

    /// `tuple: '(' [star_named_expression ',' [star_named_expressions]] ')'`
    pub(super) fn tuple_display(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.eat(TokenKind::Lpar)?;
            let mut elts = Vec::new();
            if p.peek_kind() != TokenKind::Rpar {
                elts.push(p.star_named_expression()?);
                p.eat(TokenKind::Comma)?;
                if p.peek_kind() != TokenKind::Rpar
                    && let Some(rest) = p.star_named_expressions()
                {
                    elts.extend(rest);
                }
            }
            p.expect(TokenKind::Rpar)?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::Tuple {
                    elts,
                    ctx: ExprContext::Load,
                },
            ))
        })
    }

    /// `group: '(' (yield_expr | named_expression) ')' | invalid_group`
    fn group(&mut self) -> Option<ExprLoc> {
        let result = self.attempt(|p| {
            p.eat(TokenKind::Lpar)?;
            let inner = if p.is_keyword(Keyword::Yield) {
                p.yield_expr()?
            } else {
                p.named_expression()?
            };
            p.expect(TokenKind::Rpar)?;
            Some(inner)
        });
        if result.is_some() || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        self.invalid_group();
        None
    }

    fn invalid_group(&mut self) -> Option<()> {
        let start = self.mark();
        self.eat(TokenKind::Lpar)?;
        if let Some(a) = self.starred_expression()
            && self.eat(TokenKind::Rpar).is_some()
        {
            return self.raise_syntax(a.position, ErrorMessage::StarredHere, &[]);
        }
        self.reset(start + 1);
        if let Some(a) = self.eat(TokenKind::DoubleStar)
            && self.expression().is_some()
            && self.eat(TokenKind::Rpar).is_some()
        {
            let range = self.tok(a).range;
            return self.raise_syntax(range, ErrorMessage::DoubleStarredHere, &[]);
        }
        self.reset(start);
        None
    }

    /// `genexp: '(' (assignment_expression | expression !':=') for_if_clauses ')'`
    pub(super) fn genexp(&mut self) -> Option<ExprLoc> {
        let result = self.attempt(|p| {
            let start = p.eat(TokenKind::Lpar)?;
            let elt = p.genexp_element()?;
            let generators = p.for_if_clauses()?;
            p.expect(TokenKind::Rpar)?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::GeneratorExp {
                    elt: Box::new(elt),
                    generators,
                },
            ))
        });
        if result.is_some() || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        self.invalid_comprehension();
        None
    }

    pub(super) fn genexp_element(&mut self) -> Option<ExprLoc> {
        if self.peek_kind() == TokenKind::Name && self.peek_nth(1) == TokenKind::ColonEqual {
            return self.assignment_expression();
        }
        self.attempt(|p| {
            let expr = p.expression()?;
            (p.peek_kind() != TokenKind::ColonEqual).then_some(expr)
        })
    }

    /// `list: '[' [star_named_expressions] ']'`
    pub(super) fn list_display(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.eat(TokenKind::Lsqb)?;
            let elts = if p.peek_kind() == TokenKind::Rsqb {
                Vec::new()
            } else {
                p.star_named_expressions()?
            };
            p.expect(TokenKind::Rsqb)?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::List {
                    elts,
                    ctx: ExprContext::Load,
                },
            ))
        })
    }

    /// `listcomp: '[' named_expression for_if_clauses ']' | invalid_comprehension`
    fn listcomp(&mut self) -> Option<ExprLoc> {
        let result = self.attempt(|p| {
            let start = p.eat(TokenKind::Lsqb)?;
            let elt = p.named_expression()?;
            let generators = p.for_if_clauses()?;
            p.expect(TokenKind::Rsqb)?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::ListComp {
                    elt: Box::new(elt),
                    generators,
                },
            ))
        });
        if result.is_some() || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        self.invalid_comprehension();
        None
    }

    /// `set: '{' star_named_expressions '}'`
    fn set_display(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.eat(TokenKind::Lbrace)?;
            let elts = p.star_named_expressions()?;
            p.expect(TokenKind::Rbrace)?;
            Some(ExprLoc::new(p.range_from(start), Expr::Set(elts)))
        })
    }

    /// `setcomp: '{' named_expression for_if_clauses '}' | invalid_comprehension`
    fn setcomp(&mut self) -> Option<ExprLoc> {
        let result = self.attempt(|p| {
            let start = p.eat(TokenKind::Lbrace)?;
            let elt = p.named_expression()?;
            let generators = p.for_if_clauses()?;
            p.expect(TokenKind::Rbrace)?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::SetComp {
                    elt: Box::new(elt),
                    generators,
                },
            ))
        });
        if result.is_some() || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        self.invalid_comprehension();
        None
    }

    /// `dict: '{' [double_starred_kvpairs] '}' | '{' invalid_double_starred_kvpairs '}'`
    fn dict_display(&mut self) -> Option<ExprLoc> {
        let result = self.attempt(|p| {
            let start = p.eat(TokenKind::Lbrace)?;
            let (keys, values) = if p.peek_kind() == TokenKind::Rbrace {
                (Vec::new(), Vec::new())
            } else {
                p.double_starred_kvpairs()?
            };
            p.expect(TokenKind::Rbrace)?;
            Some(ExprLoc::new(p.range_from(start), Expr::Dict { keys, values }))
        });
        if result.is_some() || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        let start = self.mark();
        if self.eat(TokenKind::Lbrace).is_some() {
            self.invalid_double_starred_kvpairs();
        }
        self.reset(start);
        None
    }

    /// `dictcomp: '{' kvpair for_if_clauses '}' | invalid_dict_comprehension`
    fn dictcomp(&mut self) -> Option<ExprLoc> {
        let result = self.attempt(|p| {
            let start = p.eat(TokenKind::Lbrace)?;
            let (key, value) = p.kvpair()?;
            let generators = p.for_if_clauses()?;
            p.expect(TokenKind::Rbrace)?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::DictComp {
                    key: Box::new(key),
                    value: Box::new(value),
                    generators,
                },
            ))
        });
        if result.is_some() || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        // invalid_dict_comprehension: '{' '**' bitwise_or for_if_clauses '}'
        let start = self.mark();
        if self.eat(TokenKind::Lbrace).is_some()
            && let Some(a) = self.eat(TokenKind::DoubleStar)
            && self.bitwise_or().is_some()
            && self.for_if_clauses().is_some()
            && self.eat(TokenKind::Rbrace).is_some()
        {
            let range = self.tok(a).range;
            return self.raise_syntax(range, ErrorMessage::DictUnpackInComprehension, &[]);
        }
        self.reset(start);
        None
    }

    /// `double_starred_kvpairs: ','.double_starred_kvpair+ [',']`
    fn double_starred_kvpairs(&mut self) -> Option<(Vec<Option<ExprLoc>>, Vec<ExprLoc>)> {
        let pairs = self.gather(TokenKind::Comma, Self::double_starred_kvpair)?;
        self.eat(TokenKind::Comma);
        Some(pairs.into_iter().unzip())
    }

    /// `double_starred_kvpair: '**' bitwise_or | kvpair`
    fn double_starred_kvpair(&mut self) -> Option<(Option<ExprLoc>, ExprLoc)> {
        if self.peek_kind() == TokenKind::DoubleStar {
            return self.attempt(|p| {
                p.advance();
                Some((None, p.bitwise_or()?))
            });
        }
        self.kvpair().map(|(key, value)| (Some(key), value))
    }

    /// `kvpair: expression ':' expression`
    fn kvpair(&mut self) -> Option<(ExprLoc, ExprLoc)> {
        self.attempt(|p| {
            let key = p.expression()?;
            p.eat(TokenKind::Colon)?;
            let value = p.expression()?;
            Some((key, value))
        })
    }

    fn invalid_double_starred_kvpairs(&mut self) -> Option<()> {
        let start = self.mark();
        if self.gather(TokenKind::Comma, Self::double_starred_kvpair).is_some() && self.eat(TokenKind::Comma).is_some() {
            self.invalid_kvpair();
            if self.error_indicator {
                return None;
            }
        }
        self.reset(start);
        self.invalid_kvpair_value()
    }

    /// A key with no `:` or a `:` with no value.
    fn invalid_kvpair(&mut self) -> Option<()> {
        let start = self.mark();
        if let Some(a) = self.expression()
            && self.peek_kind() != TokenKind::Colon
        {
            let end = a.position.end_point();
            let range = SourceRange {
                start_offset: end.start_offset.saturating_sub(1),
                start_col: end.start_col.saturating_sub(1),
                ..end
            };
            return self.raise_syntax(range, ErrorMessage::DictColonExpected, &[]);
        }
        self.reset(start);
        self.invalid_kvpair_value()
    }

    fn invalid_kvpair_value(&mut self) -> Option<()> {
        let start = self.mark();
        if self.expression().is_some()
            && let Some(colon) = self.eat(TokenKind::Colon)
        {
            if let Some(star) = self.eat(TokenKind::Star)
                && self.bitwise_or().is_some()
            {
                let range = self.tok(star).range.to(self.last_range());
                return self.raise_syntax(range, ErrorMessage::StarredDictValue, &[]);
            }
            self.reset(colon + 1);
            if matches!(self.peek_kind(), TokenKind::Rbrace | TokenKind::Comma) {
                let range = self.tok(colon).range;
                return self.raise_syntax(range, ErrorMessage::DictValueExpected, &[]);
            }
        }
        self.reset(start);
        None
    }

    // ------------------------------------------------------------------------
    // comprehensions
    // ------------------------------------------------------------------------

    /// `for_if_clauses: for_if_clause+`
    pub(super) fn for_if_clauses(&mut self) -> Option<Vec<Comprehension>> {
        let mut clauses = vec![self.for_if_clause()?];
        while matches!(
            self.peek_kind(),
            TokenKind::Keyword(Keyword::For | Keyword::Async)
        ) {
            match self.for_if_clause() {
                Some(clause) => clauses.push(clause),
                None => break,
            }
        }
        Some(clauses)
    }

    /// `for_if_clause: [ASYNC] 'for' star_targets 'in' ~ disjunction ('if' disjunction)*
    ///     | invalid_for_target`
    fn for_if_clause(&mut self) -> Option<Comprehension> {
        let mut committed = false;
        let result = self.attempt(|p| {
            let start = p.mark();
            let is_async = p.eat_keyword(Keyword::Async).is_some();
            p.eat_keyword(Keyword::For)?;
            let target = p.star_targets()?;
            p.eat_keyword(Keyword::In)?;
            committed = true;
            let iter = p.disjunction()?;
            let mut ifs = Vec::new();
            loop {
                let mark = p.mark();
                if p.eat_keyword(Keyword::If).is_none() {
                    break;
                }
                match p.disjunction() {
                    Some(cond) => ifs.push(cond),
                    None => {
                        p.reset(mark);
                        break;
                    }
                }
            }
            Some(Comprehension {
                target,
                iter,
                ifs,
                is_async,
                position: p.range_from(start),
            })
        });
        if result.is_some() || committed || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        self.invalid_for_target();
        None
    }

    /// `invalid_for_target: [ASYNC] 'for' star_expressions`
    pub(super) fn invalid_for_target(&mut self) -> Option<()> {
        let start = self.mark();
        self.eat_keyword(Keyword::Async);
        if self.eat_keyword(Keyword::For).is_some()
            && let Some(a) = self.star_expressions()
        {
            return self.raise_invalid_target(TargetsType::For, &a);
        }
        self.reset(start);
        None
    }

    fn invalid_comprehension(&mut self) -> Option<()> {
        let start = self.mark();
        if matches!(self.peek_kind(), TokenKind::Lsqb | TokenKind::Lpar | TokenKind::Lbrace) {
            self.advance();
            if let Some(a) = self.starred_expression()
                && self.for_if_clauses().is_some()
            {
                return self.raise_syntax(a.position, ErrorMessage::UnpackInComprehension, &[]);
            }
        }
        self.reset(start);
        if matches!(self.peek_kind(), TokenKind::Lsqb | TokenKind::Lbrace) {
            self.advance();
            if let Some(a) = self.star_named_expression()
                && let Some(comma) = self.eat(TokenKind::Comma)
            {
                let after_comma = self.mark();
                if let Some(rest) = self.star_named_expressions()
                    && self.for_if_clauses().is_some()
                {
                    let last = rest.last().map_or(a.position, |e| e.position);
                    return self.raise_syntax(a.position.to(last), ErrorMessage::ComprehensionTargetParens, &[]);
                }
                self.reset(after_comma);
                if self.for_if_clauses().is_some() {
                    let range = a.position.to(self.tok(comma).range);
                    return self.raise_syntax(range, ErrorMessage::ComprehensionTargetParens, &[]);
                }
            }
        }
        self.reset(start);
        None
    }

    // ------------------------------------------------------------------------
    // call arguments
    // ------------------------------------------------------------------------

    /// `arguments: args [','] &')' | invalid_arguments`
    ///
    /// Positional and keyword arguments in source order; `**mapping` entries are
    /// keywords with no name.
    pub(super) fn arguments(&mut self) -> Option<(Vec<ExprLoc>, Vec<KeywordArg>)> {
        self.memoized(Rule::Arguments, |p| {
            let args = p.args_list()?;
            (p.peek_kind() == TokenKind::Rpar).then_some(args)
        })
    }

    /// Reports an argument-ordering problem on the second pass; fails quietly on the first.
    pub(super) fn argument_error<T>(&mut self, range: SourceRange, message: ErrorMessage, args: &[&str]) -> Option<T> {
        if self.call_invalid_rules {
            self.raise_syntax(range, message, args)
        } else {
            None
        }
    }

    fn args_list(&mut self) -> Option<(Vec<ExprLoc>, Vec<KeywordArg>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<KeywordArg> = Vec::new();
        loop {
            let item_start = self.mark();
            match self.peek_kind() {
                TokenKind::Star => {
                    self.advance();
                    let value = self.expression()?;
                    if keywords.iter().any(|k| k.arg.is_none()) {
                        let range = self.range_from(item_start);
                        return self.argument_error(range, ErrorMessage::IterableAfterKwUnpack, &[]);
                    }
                    args.push(starred(self.range_from(item_start), value, ExprContext::Load));
                }
                TokenKind::DoubleStar => {
                    self.advance();
                    let value = self.expression()?;
                    keywords.push(KeywordArg {
                        arg: None,
                        value,
                        position: self.range_from(item_start),
                    });
                }
                TokenKind::Name if self.peek_nth(1) == TokenKind::Equal => {
                    let name = self.advance();
                    let equal = self.advance();
                    let value = self.expression()?;
                    if self.call_invalid_rules && matches!(self.peek_kind(), TokenKind::Keyword(Keyword::For | Keyword::Async)) {
                        let range = self.tok(name).range.to(self.tok(equal).range);
                        return self.raise_syntax(range, ErrorMessage::MaybeMeantEquality, &[]);
                    }
                    let arg = self.intern_token(name);
                    keywords.push(KeywordArg {
                        arg: Some(arg),
                        value,
                        position: self.range_from(item_start),
                    });
                }
                TokenKind::Keyword(Keyword::True | Keyword::False | Keyword::None)
                    if self.peek_nth(1) == TokenKind::Equal =>
                {
                    let name = self.advance();
                    let equal = self.advance();
                    let text = self.tok(name).text;
                    let range = self.tok(name).range.to(self.tok(equal).range);
                    return self.argument_error(range, ErrorMessage::CannotAssignTo, &[text]);
                }
                _ => {
                    let value = self.genexp_element()?;
                    if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::For | Keyword::Async)) {
                        if !self.call_invalid_rules {
                            return None;
                        }
                        let generators = self.for_if_clauses()?;
                        let end = generators.last().map_or(value.position, |g| g.iter.position);
                        let end = generators
                            .last()
                            .and_then(|g| g.ifs.last())
                            .map_or(end, |cond| cond.position);
                        return self.raise_syntax(
                            value.position.to(end),
                            ErrorMessage::GeneratorNotParenthesized,
                            &[],
                        );
                    }
                    if let Some(equal) = self.eat(TokenKind::Equal) {
                        let range = value.position.to(self.tok(equal).range);
                        return self.argument_error(range, ErrorMessage::KeywordAssignment, &[]);
                    }
                    if !keywords.is_empty() {
                        let message = if keywords.iter().any(|k| k.arg.is_none()) {
                            ErrorMessage::PositionalAfterKwUnpack
                        } else {
                            ErrorMessage::PositionalAfterKeyword
                        };
                        let range = self.last_fetched_range();
                        return self.argument_error(range, message, &[]);
                    }
                    args.push(value);
                }
            }
            if self.eat(TokenKind::Comma).is_none() || self.peek_kind() == TokenKind::Rpar {
                break;
            }
        }
        Some((args, keywords))
    }

    // ------------------------------------------------------------------------
    // assignment targets
    // ------------------------------------------------------------------------

    /// Reports the first invalid sub-target of `expr`, or "invalid syntax" if there is none.
    pub(super) fn raise_invalid_target<T>(&mut self, targets: TargetsType, expr: &ExprLoc) -> Option<T> {
        match invalid_target(expr, targets) {
            Some(invalid) => {
                let message = if targets == TargetsType::Del {
                    ErrorMessage::CannotDelete
                } else {
                    ErrorMessage::CannotAssignTo
                };
                self.raise_syntax(invalid.position, message, &[invalid.expr.describe()])
            }
            None => self.raise_syntax_here(ErrorMessage::InvalidSyntax, &[]),
        }
    }

    /// `star_targets: star_target !',' | star_target (',' star_target)* [',']`
    pub(super) fn star_targets(&mut self) -> Option<ExprLoc> {
        let start = self.mark();
        let first = self.star_target()?;
        if self.peek_kind() != TokenKind::Comma {
            return Some(first);
        }
        let elts = self.target_sequence(first, Self::star_target);
        Some(ExprLoc::new(
            self.range_from(start),
            Expr::Tuple {
                elts,
                ctx: ExprContext::Store,
            },
        ))
    }

    /// Continues `first` with `(',' item)* [',']`.
    fn target_sequence(
        &mut self,
        first: ExprLoc,
        mut item: impl FnMut(&mut Self) -> Option<ExprLoc>,
    ) -> Vec<ExprLoc> {
        let mut elts = vec![first];
        while self.eat(TokenKind::Comma).is_some() {
            let after_comma = self.mark();
            match item(self) {
                Some(e) => elts.push(e),
                None => {
                    self.reset(after_comma);
                    break;
                }
            }
        }
        elts
    }

    /// `star_target: '*' (!'*' star_target) | target_with_star_atom`
    pub(super) fn star_target(&mut self) -> Option<ExprLoc> {
        self.memoized(Rule::StarTarget, |p| {
            if let Some(start) = p.eat(TokenKind::Star) {
                if p.peek_kind() == TokenKind::Star {
                    return None;
                }
                let value = p.star_target()?;
                return Some(starred(p.range_from(start), value, ExprContext::Store));
            }
            p.target_with_star_atom()
        })
    }

    /// `target_with_star_atom: t_primary '.' NAME !t_lookahead
    ///     | t_primary '[' slices ']' !t_lookahead | star_atom`
    fn target_with_star_atom(&mut self) -> Option<ExprLoc> {
        self.memoized(Rule::TargetWithStarAtom, |p| {
            if let Some(target) = p.subscript_attribute_target(ExprContext::Store) {
                return Some(target);
            }
            p.star_atom()
        })
    }

    /// `t_primary ('.' NAME | '[' slices ']') !t_lookahead`
    fn subscript_attribute_target(&mut self, ctx: ExprContext) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.mark();
            let value = p.t_primary()?;
            let trailer = match p.peek_kind() {
                TokenKind::Dot | TokenKind::Lsqb => p.trailer()?,
                _ => return None,
            };
            if p.at_t_lookahead() {
                return None;
            }
            Some(p.apply_trailer(start, value, trailer, ctx))
        })
    }

    fn at_t_lookahead(&mut self) -> bool {
        matches!(self.peek_kind(), TokenKind::Lpar | TokenKind::Lsqb | TokenKind::Dot)
    }

    /// The longest primary prefix in which every element is followed by `(`, `[` or `.`.
    fn t_primary(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.mark();
            let mut expr = p.atom()?;
            if !p.at_t_lookahead() {
                return None;
            }
            let mut links = 0;
            loop {
                let mark = p.mark();
                if p.charge_link().is_none() {
                    break;
                }
                links += 1;
                let Some(trailer) = p.trailer() else { break };
                if !p.at_t_lookahead() {
                    p.reset(mark);
                    break;
                }
                expr = p.apply_trailer(start, expr, trailer, ExprContext::Load);
            }
            p.release_links(links);
            (!p.error_indicator).then_some(expr)
        })
    }

    /// `star_atom: NAME | '(' target_with_star_atom ')' | '(' [star_targets_tuple_seq] ')'
    ///     | '[' [star_targets_list_seq] ']'`
    fn star_atom(&mut self) -> Option<ExprLoc> {
        match self.peek_kind() {
            TokenKind::Name => Some(self.name_target(ExprContext::Store)),
            TokenKind::Lpar => {
                let single = self.attempt(|p| {
                    p.advance();
                    let inner = p.target_with_star_atom()?;
                    p.eat(TokenKind::Rpar)?;
                    Some(inner)
                });
                if single.is_some() {
                    return single;
                }
                self.attempt(|p| {
                    let start = p.advance();
                    let elts = if p.peek_kind() == TokenKind::Rpar {
                        Vec::new()
                    } else {
                        let first = p.star_target()?;
                        if p.peek_kind() != TokenKind::Comma {
                            return None;
                        }
                        p.target_sequence(first, Self::star_target)
                    };
                    p.eat(TokenKind::Rpar)?;
                    Some(ExprLoc::new(
                        p.range_from(start),
                        Expr::Tuple {
                            elts,
                            ctx: ExprContext::Store,
                        },
                    ))
                })
            }
            TokenKind::Lsqb => self.attempt(|p| {
                let start = p.advance();
                let elts = if p.peek_kind() == TokenKind::Rsqb {
                    Vec::new()
                } else {
                    let first = p.star_target()?;
                    p.target_sequence(first, Self::star_target)
                };
                p.eat(TokenKind::Rsqb)?;
                Some(ExprLoc::new(
                    p.range_from(start),
                    Expr::List {
                        elts,
                        ctx: ExprContext::Store,
                    },
                ))
            }),
            _ => None,
        }
    }

    pub(super) fn name_target(&mut self, ctx: ExprContext) -> ExprLoc {
        let idx = self.advance();
        let id = self.intern_token(idx);
        ExprLoc::new(self.tok(idx).range, Expr::Name { id, ctx })
    }

    /// `single_target: single_subscript_attribute_target | NAME | '(' single_target ')'`
    pub(super) fn single_target(&mut self) -> Option<ExprLoc> {
        if let Some(target) = self.subscript_attribute_target(ExprContext::Store) {
            return Some(target);
        }
        match self.peek_kind() {
            TokenKind::Name => Some(self.name_target(ExprContext::Store)),
            TokenKind::Lpar => self.attempt(|p| {
                p.advance();
                let inner = p.single_target()?;
                p.eat(TokenKind::Rpar)?;
                Some(inner)
            }),
            _ => None,
        }
    }

    /// `single_subscript_attribute_target`
    pub(super) fn single_subscript_attribute_target(&mut self) -> Option<ExprLoc> {
        self.subscript_attribute_target(ExprContext::Store)
    }

    /// `del_targets: ','.del_target+ [',']`
    pub(super) fn del_targets(&mut self) -> Option<Vec<ExprLoc>> {
        let targets = self.gather(TokenKind::Comma, Self::del_target)?;
        self.eat(TokenKind::Comma);
        Some(targets)
    }

    /// `del_target: t_primary '.' NAME !t_lookahead | t_primary '[' slices ']' !t_lookahead
    ///     | del_t_atom`
    fn del_target(&mut self) -> Option<ExprLoc> {
        self.memoized(Rule::DelTarget, |p| {
            if let Some(target) = p.subscript_attribute_target(ExprContext::Del) {
                return Some(target);
            }
            match p.peek_kind() {
                TokenKind::Name => Some(p.name_target(ExprContext::Del)),
                TokenKind::Lpar => {
                    let single = p.attempt(|p| {
                        p.advance();
                        let inner = p.del_target()?;
                        p.eat(TokenKind::Rpar)?;
                        Some(inner)
                    });
                    if single.is_some() {
                        return single;
                    }
                    p.attempt(|p| {
                        let start = p.advance();
                        let elts = if p.peek_kind() == TokenKind::Rpar {
                            Vec::new()
                        } else {
                            p.del_targets()?
                        };
                        p.eat(TokenKind::Rpar)?;
                        Some(ExprLoc::new(
                            p.range_from(start),
                            Expr::Tuple {
                                elts,
                                ctx: ExprContext::Del,
                            },
                        ))
                    })
                }
                TokenKind::Lsqb => p.attempt(|p| {
                    let start = p.advance();
                    let elts = if p.peek_kind() == TokenKind::Rsqb {
                        Vec::new()
                    } else {
                        p.del_targets()?
                    };
                    p.eat(TokenKind::Rsqb)?;
                    Some(ExprLoc::new(
                        p.range_from(start),
                        Expr::List {
                            elts,
                            ctx: ExprContext::Del,
                        },
                    ))
                }),
                _ => None,
            }
        })
    }
}

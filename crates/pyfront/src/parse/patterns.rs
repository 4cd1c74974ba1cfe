//! `match` statements and the pattern sub-grammar.

use super::{Parser, Rule};
use crate::{
    diagnostic::ErrorMessage,
    expressions::{Expr, ExprContext, ExprLoc, Literal, MatchCase, Operator, Stmt, StmtLoc, UnaryOp},
    intern::{Keyword, StringId},
    patterns::{Pattern, PatternLoc},
    tokenizer::TokenKind,
};

impl Parser<'_, '_> {
    /// `match_stmt: "match" subject_expr ':' NEWLINE INDENT case_block+ DEDENT
    ///     | invalid_match_stmt`
    pub(super) fn match_stmt(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.eat_soft_keyword("match")?;
            let subject = p.subject_expr()?;
            if p.eat(TokenKind::Colon).is_none() {
                if p.call_invalid_rules && p.peek_kind() == TokenKind::Newline {
                    return p.raise_syntax_here(ErrorMessage::ExpectedColon, &[]);
                }
                return None;
            }
            p.eat(TokenKind::Newline)?;
            if p.eat(TokenKind::Indent).is_none() {
                if p.call_invalid_rules {
                    let line = p.tok(start).range.start_line.to_string();
                    return p.raise_indentation_here(ErrorMessage::ExpectedIndentedBlock, &["'match' statement", &line]);
                }
                return None;
            }
            let mut cases = Vec::new();
            while p.is_soft_keyword("case") {
                cases.push(p.case_block()?);
            }
            if cases.is_empty() {
                return None;
            }
            p.expect(TokenKind::Dedent)?;
            Some(StmtLoc::new(p.range_from(start), Stmt::Match { subject, cases }))
        })
    }

    /// `subject_expr: star_named_expression ',' star_named_expressions? | named_expression`
    fn subject_expr(&mut self) -> Option<ExprLoc> {
        let start = self.mark();
        let tuple = self.attempt(|p| {
            let first = p.star_named_expression()?;
            p.eat(TokenKind::Comma)?;
            let mut elts = vec![first];
            if !matches!(p.peek_kind(), TokenKind::Colon | TokenKind::Newline) {
                elts.extend(p.star_named_expressions()?);
            }
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::Tuple {
                    elts,
                    ctx: ExprContext::Load,
                },
            ))
        });
        if tuple.is_some() || self.error_indicator {
            return tuple;
        }
        self.named_expression()
    }

    /// `case_block: "case" patterns guard? ':' block | invalid_case_block`
    fn case_block(&mut self) -> Option<MatchCase> {
        let keyword = self.eat_soft_keyword("case")?;
        let pattern = self.patterns()?;
        let guard = if self.eat_keyword(Keyword::If).is_some() {
            Some(self.named_expression()?)
        } else {
            None
        };
        let body = self.suite("'case' statement", keyword, false)?;
        Some(MatchCase { pattern, guard, body })
    }

    /// `patterns: open_sequence_pattern | pattern`
    fn patterns(&mut self) -> Option<PatternLoc> {
        let start = self.mark();
        let sequence = self.attempt(|p| {
            let items = p.open_sequence_pattern()?;
            Some(PatternLoc::new(p.range_from(start), Pattern::MatchSequence(items)))
        });
        if sequence.is_some() || self.error_indicator {
            return sequence;
        }
        self.pattern()
    }

    /// `pattern: as_pattern | or_pattern`
    fn pattern(&mut self) -> Option<PatternLoc> {
        let start = self.mark();
        let or_pattern = self.or_pattern()?;
        let Some(as_idx) = self.eat_keyword(Keyword::As) else {
            return Some(or_pattern);
        };
        if let Some(name) = self.pattern_capture_target() {
            return Some(PatternLoc::new(
                self.range_from(start),
                Pattern::MatchAs {
                    pattern: Some(Box::new(or_pattern)),
                    name: Some(name),
                },
            ));
        }
        if self.call_invalid_rules {
            if self.is_soft_keyword("_") {
                let range = self.current_range();
                return self.raise_syntax(range, ErrorMessage::UnderscoreTarget, &[]);
            }
            if self.peek_kind() != TokenKind::Name
                && let Some(target) = self.expression()
            {
                return self.raise_syntax(target.position, ErrorMessage::InvalidPatternTarget, &[]);
            }
            if self.error_indicator {
                return None;
            }
        }
        self.reset(as_idx);
        Some(or_pattern)
    }

    /// `or_pattern: '|'.closed_pattern+`
    fn or_pattern(&mut self) -> Option<PatternLoc> {
        let start = self.mark();
        let mut alternatives = self.gather(TokenKind::Vbar, Self::closed_pattern)?;
        if alternatives.len() == 1 {
            return alternatives.pop();
        }
        Some(PatternLoc::new(self.range_from(start), Pattern::MatchOr(alternatives)))
    }

    /// `closed_pattern: literal_pattern | capture_pattern | wildcard_pattern | value_pattern
    ///     | group_pattern | sequence_pattern | mapping_pattern | class_pattern`
    fn closed_pattern(&mut self) -> Option<PatternLoc> {
        self.memoized(Rule::ClosedPattern, |p| {
            let start = p.mark();
            match p.peek_kind() {
                TokenKind::Name => p.name_pattern(),
                TokenKind::Lpar => p.nested(Self::paren_pattern),
                TokenKind::Lsqb => p.nested(|p| {
                    p.advance();
                    let items = if p.peek_kind() == TokenKind::Rsqb {
                        Vec::new()
                    } else {
                        p.maybe_sequence_pattern()?
                    };
                    p.eat(TokenKind::Rsqb)?;
                    Some(PatternLoc::new(p.range_from(start), Pattern::MatchSequence(items)))
                }),
                TokenKind::Lbrace => p.nested(Self::mapping_pattern),
                _ => {
                    let value = p.literal_expr()?;
                    let pattern = match value.expr {
                        Expr::Constant(literal @ (Literal::None | Literal::Bool(_))) => Pattern::MatchSingleton(literal),
                        _ => Pattern::MatchValue(value),
                    };
                    Some(PatternLoc::new(p.range_from(start), pattern))
                }
            }
        })
    }

    /// Capture, wildcard, value and class patterns: everything that starts with a NAME.
    fn name_pattern(&mut self) -> Option<PatternLoc> {
        let start = self.mark();
        if self.peek_nth(1) == TokenKind::Dot || self.peek_nth(1) == TokenKind::Lpar {
            let cls = self.name_or_attr()?;
            if self.peek_kind() == TokenKind::Lpar {
                return self.nested(|p| p.class_pattern(start, cls));
            }
            if matches!(self.peek_kind(), TokenKind::Dot | TokenKind::Equal) {
                self.reset(start);
                return None;
            }
            return Some(PatternLoc::new(self.range_from(start), Pattern::MatchValue(cls)));
        }
        if let Some(idx) = self.eat_soft_keyword("_") {
            return Some(PatternLoc::new(
                self.tok(idx).range,
                Pattern::MatchAs {
                    pattern: None,
                    name: None,
                },
            ));
        }
        let name = self.pattern_capture_target()?;
        Some(PatternLoc::new(
            self.range_from(start),
            Pattern::MatchAs {
                pattern: None,
                name: Some(name),
            },
        ))
    }

    /// `pattern_capture_target: !"_" NAME !('.' | '(' | '=')`
    fn pattern_capture_target(&mut self) -> Option<StringId> {
        if self.peek_kind() != TokenKind::Name || self.is_soft_keyword("_") {
            return None;
        }
        if matches!(self.peek_nth(1), TokenKind::Dot | TokenKind::Lpar | TokenKind::Equal) {
            return None;
        }
        let idx = self.advance();
        Some(self.intern_token(idx))
    }

    /// `name_or_attr: attr | NAME`, where `attr: name_or_attr '.' NAME`
    fn name_or_attr(&mut self) -> Option<ExprLoc> {
        let start = self.eat(TokenKind::Name)?;
        let id = self.intern_token(start);
        let mut value = ExprLoc::new(
            self.tok(start).range,
            Expr::Name {
                id,
                ctx: ExprContext::Load,
            },
        );
        while self.peek_kind() == TokenKind::Dot && self.peek_nth(1) == TokenKind::Name {
            self.advance();
            let idx = self.advance();
            let attr = self.intern_token(idx);
            value = ExprLoc::new(
                self.range_from(start),
                Expr::Attribute {
                    value: Box::new(value),
                    attr,
                    ctx: ExprContext::Load,
                },
            );
        }
        Some(value)
    }

    /// `group_pattern: '(' pattern ')'` and `sequence_pattern: '(' open_sequence_pattern? ')'`
    fn paren_pattern(&mut self) -> Option<PatternLoc> {
        self.attempt(|p| {
            let start = p.advance();
            if p.eat(TokenKind::Rpar).is_some() {
                return Some(PatternLoc::new(p.range_from(start), Pattern::MatchSequence(Vec::new())));
            }
            if let Some(items) = p.open_sequence_pattern() {
                p.eat(TokenKind::Rpar)?;
                return Some(PatternLoc::new(p.range_from(start), Pattern::MatchSequence(items)));
            }
            if p.error_indicator {
                return None;
            }
            let inner = p.pattern()?;
            p.eat(TokenKind::Rpar)?;
            Some(inner)
        })
    }

    /// `open_sequence_pattern: maybe_star_pattern ',' maybe_sequence_pattern?`
    fn open_sequence_pattern(&mut self) -> Option<Vec<PatternLoc>> {
        self.attempt(|p| {
            let first = p.maybe_star_pattern()?;
            p.eat(TokenKind::Comma)?;
            let mut items = vec![first];
            let mark = p.mark();
            match p.maybe_sequence_pattern() {
                Some(rest) => items.extend(rest),
                None if p.error_indicator => return None,
                None => p.reset(mark),
            }
            Some(items)
        })
    }

    /// `maybe_sequence_pattern: ','.maybe_star_pattern+ ','?`
    fn maybe_sequence_pattern(&mut self) -> Option<Vec<PatternLoc>> {
        let items = self.gather(TokenKind::Comma, Self::maybe_star_pattern)?;
        self.eat(TokenKind::Comma);
        Some(items)
    }

    /// `maybe_star_pattern: star_pattern | pattern`
    fn maybe_star_pattern(&mut self) -> Option<PatternLoc> {
        let Some(start) = self.eat(TokenKind::Star) else {
            return self.pattern();
        };
        let name = if self.eat_soft_keyword("_").is_some() {
            None
        } else {
            match self.pattern_capture_target() {
                Some(name) => Some(name),
                None => {
                    self.reset(start);
                    return None;
                }
            }
        };
        Some(PatternLoc::new(self.range_from(start), Pattern::MatchStar(name)))
    }

    /// `mapping_pattern: '{' [items_pattern ','] [double_star_pattern] ','? '}'`
    fn mapping_pattern(&mut self) -> Option<PatternLoc> {
        self.attempt(|p| {
            let start = p.advance();
            let mut keys = Vec::new();
            let mut patterns = Vec::new();
            let mut rest = None;
            while p.peek_kind() != TokenKind::Rbrace {
                if p.eat(TokenKind::DoubleStar).is_some() {
                    rest = Some(p.pattern_capture_target()?);
                    p.eat(TokenKind::Comma);
                    break;
                }
                let key = match p.peek_kind() {
                    TokenKind::Name => {
                        let key = p.name_or_attr()?;
                        if !matches!(key.expr, Expr::Attribute { .. }) {
                            return None;
                        }
                        key
                    }
                    _ => p.literal_expr()?,
                };
                p.eat(TokenKind::Colon)?;
                keys.push(key);
                patterns.push(p.pattern()?);
                if p.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            p.eat(TokenKind::Rbrace)?;
            Some(PatternLoc::new(
                p.range_from(start),
                Pattern::MatchMapping { keys, patterns, rest },
            ))
        })
    }

    /// `class_pattern: name_or_attr '(' [positional_patterns ','] [keyword_patterns ','] ')'
    ///     | invalid_class_pattern`
    fn class_pattern(&mut self, start: usize, cls: ExprLoc) -> Option<PatternLoc> {
        self.attempt(|p| {
            p.advance();
            let mut patterns = Vec::new();
            let mut kwd_attrs = Vec::new();
            let mut kwd_patterns = Vec::new();
            while p.peek_kind() != TokenKind::Rpar {
                if p.peek_kind() == TokenKind::Name && p.peek_nth(1) == TokenKind::Equal {
                    let idx = p.advance();
                    kwd_attrs.push(p.intern_token(idx));
                    p.advance();
                    kwd_patterns.push(p.pattern()?);
                } else if kwd_attrs.is_empty() {
                    patterns.push(p.pattern()?);
                } else {
                    return p.positional_after_keyword();
                }
                if p.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            p.eat(TokenKind::Rpar)?;
            Some(PatternLoc::new(
                p.range_from(start),
                Pattern::MatchClass {
                    cls,
                    patterns,
                    kwd_attrs,
                    kwd_patterns,
                },
            ))
        })
    }

    /// A run of positional patterns after a keyword pattern. Never succeeds.
    fn positional_after_keyword<T>(&mut self) -> Option<T> {
        if !self.call_invalid_rules {
            return None;
        }
        let first = self.pattern()?;
        let mut range = first.position;
        loop {
            let mark = self.mark();
            if self.eat(TokenKind::Comma).is_none()
                || (self.peek_kind() == TokenKind::Name && self.peek_nth(1) == TokenKind::Equal)
            {
                self.reset(mark);
                break;
            }
            match self.pattern() {
                Some(next) => range = range.to(next.position),
                None if self.error_indicator => return None,
                None => {
                    self.reset(mark);
                    break;
                }
            }
        }
        self.raise_syntax(range, ErrorMessage::PositionalPatternAfterKeyword, &[])
    }

    // ------------------------------------------------------------------------
    // literal patterns
    // ------------------------------------------------------------------------

    /// `literal_expr: signed_number !('+' | '-') | complex_number | strings | 'None'
    ///     | 'True' | 'False'`
    fn literal_expr(&mut self) -> Option<ExprLoc> {
        let literal = match self.peek_kind() {
            TokenKind::String => return self.strings(),
            TokenKind::Keyword(Keyword::None) => Literal::None,
            TokenKind::Keyword(Keyword::True) => Literal::Bool(true),
            TokenKind::Keyword(Keyword::False) => Literal::Bool(false),
            TokenKind::Number | TokenKind::Minus => return self.number_pattern(),
            _ => return None,
        };
        let idx = self.advance();
        Some(ExprLoc::new(self.tok(idx).range, Expr::Constant(literal)))
    }

    /// `signed_number !('+' | '-') | signed_real_number ('+' | '-') imaginary_number`
    fn number_pattern(&mut self) -> Option<ExprLoc> {
        self.attempt(|p| {
            let start = p.mark();
            let left = p.signed_number()?;
            let op = match p.peek_kind() {
                TokenKind::Plus => Operator::Add,
                TokenKind::Minus => Operator::Sub,
                _ => return Some(left),
            };
            p.ensure_real(&left)?;
            p.advance();
            let right = p.number()?;
            p.ensure_imaginary(&right)?;
            Some(ExprLoc::new(
                p.range_from(start),
                Expr::BinOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            ))
        })
    }

    /// `signed_number: NUMBER | '-' NUMBER`
    fn signed_number(&mut self) -> Option<ExprLoc> {
        let Some(start) = self.eat(TokenKind::Minus) else {
            return self.number();
        };
        let operand = self.number()?;
        Some(ExprLoc::new(
            self.range_from(start),
            Expr::UnaryOp {
                op: UnaryOp::USub,
                operand: Box::new(operand),
            },
        ))
    }

    fn ensure_real(&mut self, number: &ExprLoc) -> Option<()> {
        let literal: &ExprLoc = match &number.expr {
            Expr::UnaryOp { operand, .. } => operand,
            _ => number,
        };
        if matches!(literal.expr, Expr::Constant(Literal::Complex { .. })) {
            return self.raise_syntax(literal.position, ErrorMessage::RealRequired, &[]);
        }
        Some(())
    }

    fn ensure_imaginary(&mut self, number: &ExprLoc) -> Option<()> {
        if matches!(number.expr, Expr::Constant(Literal::Complex { .. })) {
            return Some(());
        }
        self.raise_syntax(number.position, ErrorMessage::ImaginaryRequired, &[])
    }
}

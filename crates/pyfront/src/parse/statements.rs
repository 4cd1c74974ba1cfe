//! Statement rules: simple and compound statements, blocks, parameter lists, imports
//! and PEP 695 type parameters.

use super::{Parser, Rule, expressions::TargetsType};
use crate::{
    diagnostic::{ErrorMessage, SourceRange},
    expressions::{
        Alias, Arg, Arguments, ClassDef, ExceptHandler, ExprContext, ExprLoc, FunctionDef, Operator, Stmt, StmtLoc,
        TypeParam, TypeParamKind, WithItem,
    },
    intern::{Keyword, StringId},
    tokenizer::TokenKind,
};

impl Parser<'_, '_> {
    // ------------------------------------------------------------------------
    // statement sequences and blocks
    // ------------------------------------------------------------------------

    /// `statements: statement+`
    pub(super) fn statements(&mut self) -> Option<Vec<StmtLoc>> {
        let mut body = Vec::new();
        while let Some(stmts) = self.statement() {
            body.extend(stmts);
        }
        if self.error_indicator || body.is_empty() {
            return None;
        }
        Some(body)
    }

    /// `statement: compound_stmt | simple_stmts`
    fn statement(&mut self) -> Option<Vec<StmtLoc>> {
        if let Some(stmt) = self.compound_stmt() {
            return Some(vec![stmt]);
        }
        if self.error_indicator {
            return None;
        }
        self.simple_stmts()
    }

    /// `simple_stmts: simple_stmt (';' simple_stmt)* [';'] NEWLINE`
    pub(super) fn simple_stmts(&mut self) -> Option<Vec<StmtLoc>> {
        self.memoized(Rule::SimpleStmts, |p| {
            let mut stmts = vec![p.simple_stmt()?];
            while p.eat(TokenKind::Semi).is_some() {
                if p.peek_kind() == TokenKind::Newline {
                    break;
                }
                stmts.push(p.simple_stmt()?);
            }
            p.expect(TokenKind::Newline)?;
            Some(stmts)
        })
    }

    /// `block: NEWLINE INDENT statements DEDENT | simple_stmts | invalid_block`
    fn block(&mut self) -> Option<Vec<StmtLoc>> {
        self.memoized(Rule::Block, |p| {
            if p.peek_kind() != TokenKind::Newline {
                return p.simple_stmts();
            }
            let body = p.attempt(|p| {
                p.advance();
                p.eat(TokenKind::Indent)?;
                let body = p.statements()?;
                p.expect(TokenKind::Dedent)?;
                Some(body)
            });
            if body.is_some() || !p.call_invalid_rules || p.error_indicator {
                return body;
            }
            if p.peek_nth(1) != TokenKind::Indent {
                return p.raise_indentation_here(ErrorMessage::ExpectedIndentedBlockPlain, &[]);
            }
            None
        })
    }

    /// The `':' block` tail of a compound statement introduced by the keyword at
    /// `keyword`.
    ///
    /// A forced colon reports "expected ':'" as soon as it is missing. Otherwise the
    /// second pass reports it when the header runs into the end of the line, and reports
    /// a colon followed by a line break and no indented block.
    pub(super) fn suite(&mut self, header: &str, keyword: usize, forced: bool) -> Option<Vec<StmtLoc>> {
        if forced {
            self.expect_forced(TokenKind::Colon, ":")?;
        } else {
            if self.call_invalid_rules && self.peek_kind() == TokenKind::Newline {
                return self.raise_syntax_here(ErrorMessage::ExpectedColon, &[]);
            }
            self.eat(TokenKind::Colon)?;
        }
        if self.call_invalid_rules
            && self.peek_kind() == TokenKind::Newline
            && self.peek_nth(1) != TokenKind::Indent
        {
            let line = self.tok(keyword).range.start_line.to_string();
            return self.raise_indentation_here(ErrorMessage::ExpectedIndentedBlock, &[header, &line]);
        }
        self.block()
    }

    // ------------------------------------------------------------------------
    // simple statements
    // ------------------------------------------------------------------------

    fn simple_stmt(&mut self) -> Option<StmtLoc> {
        let start = self.mark();
        if let Some(stmt) = self.assignment() {
            return Some(stmt);
        }
        if self.error_indicator {
            return None;
        }
        self.reset(start);
        if self.is_soft_keyword("type") && self.peek_nth(1) == TokenKind::Name {
            if let Some(stmt) = self.type_alias() {
                return Some(stmt);
            }
            if self.error_indicator {
                return None;
            }
        }
        if let Some(value) = self.star_expressions() {
            return Some(StmtLoc::new(value.position, Stmt::Expr(value)));
        }
        if self.error_indicator {
            return None;
        }
        match self.peek_kind() {
            TokenKind::Keyword(Keyword::Return) => self.return_stmt(),
            TokenKind::Keyword(Keyword::Import) => self.import_name(),
            TokenKind::Keyword(Keyword::From) => self.import_from(),
            TokenKind::Keyword(Keyword::Raise) => self.raise_stmt(),
            TokenKind::Keyword(Keyword::Pass) => Some(self.keyword_stmt(Stmt::Pass)),
            TokenKind::Keyword(Keyword::Del) => self.del_stmt(),
            TokenKind::Keyword(Keyword::Yield) => {
                let value = self.yield_expr()?;
                Some(StmtLoc::new(value.position, Stmt::Expr(value)))
            }
            TokenKind::Keyword(Keyword::Assert) => self.assert_stmt(),
            TokenKind::Keyword(Keyword::Break) => Some(self.keyword_stmt(Stmt::Break)),
            TokenKind::Keyword(Keyword::Continue) => Some(self.keyword_stmt(Stmt::Continue)),
            TokenKind::Keyword(Keyword::Global) => self.name_list_stmt(Stmt::Global),
            TokenKind::Keyword(Keyword::Nonlocal) => self.name_list_stmt(Stmt::Nonlocal),
            _ => None,
        }
    }

    fn keyword_stmt(&mut self, stmt: Stmt) -> StmtLoc {
        let idx = self.advance();
        StmtLoc::new(self.tok(idx).range, stmt)
    }

    /// `assignment: annotated | (star_targets '=')+ rhs !'=' | single_target augassign ~ rhs
    ///     | invalid_assignment`
    fn assignment(&mut self) -> Option<StmtLoc> {
        let start = self.mark();
        if let Some(stmt) = self.annotated_assignment(start) {
            return Some(stmt);
        }
        if self.error_indicator {
            return None;
        }
        if let Some(stmt) = self.chained_assignment(start) {
            return Some(stmt);
        }
        if self.error_indicator {
            return None;
        }
        let mut committed = false;
        let result = self.attempt(|p| {
            let target = p.single_target()?;
            let op = p.augassign()?;
            committed = true;
            let value = p.annotated_rhs()?;
            Some(StmtLoc::new(p.range_from(start), Stmt::AugAssign { target, op, value }))
        });
        if result.is_some() || committed || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        self.invalid_assignment();
        None
    }

    /// `NAME ':' expression ['=' annotated_rhs]`
    /// `| ('(' single_target ')' | single_subscript_attribute_target) ':' expression ['=' annotated_rhs]`
    fn annotated_assignment(&mut self, start: usize) -> Option<StmtLoc> {
        self.attempt(|p| {
            let (target, simple) = if p.peek_kind() == TokenKind::Name && p.peek_nth(1) == TokenKind::Colon {
                (p.name_target(ExprContext::Store), true)
            } else {
                let parenthesized = p.attempt(|p| {
                    p.eat(TokenKind::Lpar)?;
                    let target = p.single_target()?;
                    p.eat(TokenKind::Rpar)?;
                    Some(target)
                });
                let target = match parenthesized {
                    Some(target) => target,
                    None => p.single_subscript_attribute_target()?,
                };
                (target, false)
            };
            p.eat(TokenKind::Colon)?;
            let annotation = p.expression()?;
            let value = if p.eat(TokenKind::Equal).is_some() {
                Some(p.annotated_rhs()?)
            } else {
                None
            };
            Some(StmtLoc::new(
                p.range_from(start),
                Stmt::AnnAssign {
                    target,
                    annotation,
                    value,
                    simple,
                },
            ))
        })
    }

    fn chained_assignment(&mut self, start: usize) -> Option<StmtLoc> {
        self.attempt(|p| {
            let mut targets = Vec::new();
            loop {
                let mark = p.mark();
                let Some(target) = p.star_targets() else {
                    p.reset(mark);
                    break;
                };
                if p.eat(TokenKind::Equal).is_none() {
                    p.reset(mark);
                    break;
                }
                targets.push(target);
            }
            if targets.is_empty() {
                return None;
            }
            let value = p.annotated_rhs()?;
            if p.peek_kind() == TokenKind::Equal {
                return None;
            }
            Some(StmtLoc::new(p.range_from(start), Stmt::Assign { targets, value }))
        })
    }

    /// `annotated_rhs: yield_expr | star_expressions`
    fn annotated_rhs(&mut self) -> Option<ExprLoc> {
        if self.is_keyword(Keyword::Yield) {
            self.yield_expr()
        } else {
            self.star_expressions()
        }
    }

    fn augassign(&mut self) -> Option<Operator> {
        let op = match self.peek_kind() {
            TokenKind::PlusEqual => Operator::Add,
            TokenKind::MinEqual => Operator::Sub,
            TokenKind::StarEqual => Operator::Mult,
            TokenKind::AtEqual => Operator::MatMult,
            TokenKind::SlashEqual => Operator::Div,
            TokenKind::PercentEqual => Operator::Mod,
            TokenKind::AmperEqual => Operator::BitAnd,
            TokenKind::VbarEqual => Operator::BitOr,
            TokenKind::CircumflexEqual => Operator::BitXor,
            TokenKind::LeftShiftEqual => Operator::LShift,
            TokenKind::RightShiftEqual => Operator::RShift,
            TokenKind::DoubleStarEqual => Operator::Pow,
            TokenKind::DoubleSlashEqual => Operator::FloorDiv,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// Assignments to things that cannot be assigned to. Never succeeds.
    fn invalid_assignment(&mut self) -> Option<()> {
        let start = self.mark();
        if let Some(a) = self.invalid_ann_assign_target()
            && self.eat(TokenKind::Colon).is_some()
            && self.expression().is_some()
        {
            return self.raise_syntax(a.position, ErrorMessage::OnlySingleTargetAnnotated, &[a.expr.describe()]);
        }
        self.reset(start);
        if let Some(a) = self.star_named_expression()
            && self.eat(TokenKind::Comma).is_some()
        {
            let _ = self.star_named_expressions();
            if self.eat(TokenKind::Colon).is_some() && self.expression().is_some() {
                return self.raise_syntax(a.position, ErrorMessage::OnlySingleTargetAnnotated, &["tuple"]);
            }
        }
        if self.error_indicator {
            return None;
        }
        self.reset(start);
        if let Some(a) = self.expression()
            && self.eat(TokenKind::Colon).is_some()
            && self.expression().is_some()
        {
            return self.raise_syntax(a.position, ErrorMessage::IllegalAnnotationTarget, &[]);
        }
        self.reset(start);
        self.skip_assignment_targets();
        if let Some(a) = self.star_expressions()
            && self.eat(TokenKind::Equal).is_some()
        {
            return self.raise_invalid_target(TargetsType::Star, &a);
        }
        self.reset(start);
        self.skip_assignment_targets();
        if let Some(a) = self.yield_expr()
            && self.eat(TokenKind::Equal).is_some()
        {
            return self.raise_syntax(a.position, ErrorMessage::AssignToYield, &[]);
        }
        self.reset(start);
        if let Some(a) = self.star_expressions()
            && self.augassign().is_some()
            && self.annotated_rhs().is_some()
        {
            return self.raise_syntax(a.position, ErrorMessage::IllegalAugAssign, &[a.expr.describe()]);
        }
        self.reset(start);
        None
    }

    /// `invalid_ann_assign_target: list | tuple | '(' invalid_ann_assign_target ')'`
    fn invalid_ann_assign_target(&mut self) -> Option<ExprLoc> {
        match self.peek_kind() {
            TokenKind::Lsqb => self.list_display(),
            TokenKind::Lpar => {
                if let Some(tuple) = self.tuple_display() {
                    return Some(tuple);
                }
                self.attempt(|p| {
                    p.advance();
                    let inner = p.invalid_ann_assign_target()?;
                    p.eat(TokenKind::Rpar)?;
                    Some(inner)
                })
            }
            _ => None,
        }
    }

    /// `(star_targets '=')*`
    fn skip_assignment_targets(&mut self) {
        loop {
            let mark = self.mark();
            if self.star_targets().is_some() && self.eat(TokenKind::Equal).is_some() {
                continue;
            }
            self.reset(mark);
            break;
        }
    }

    /// `type_alias: "type" NAME [type_params] '=' expression`
    fn type_alias(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.eat_soft_keyword("type")?;
            if p.peek_kind() != TokenKind::Name {
                return None;
            }
            let name = p.name_target(ExprContext::Store);
            let type_params = p.optional_type_params()?;
            p.eat(TokenKind::Equal)?;
            let value = p.expression()?;
            Some(StmtLoc::new(
                p.range_from(start),
                Stmt::TypeAlias {
                    name,
                    type_params,
                    value,
                },
            ))
        })
    }

    /// `return_stmt: 'return' [star_expressions]`
    fn return_stmt(&mut self) -> Option<StmtLoc> {
        let start = self.advance();
        let value = self.star_expressions();
        if self.error_indicator {
            return None;
        }
        Some(StmtLoc::new(self.range_from(start), Stmt::Return(value)))
    }

    /// `raise_stmt: 'raise' expression ['from' expression] | 'raise'`
    fn raise_stmt(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.advance();
            let mut cause = None;
            let exc = p.expression();
            if p.error_indicator {
                return None;
            }
            if exc.is_some() && p.eat_keyword(Keyword::From).is_some() {
                cause = Some(p.expression()?);
            }
            Some(StmtLoc::new(p.range_from(start), Stmt::Raise { exc, cause }))
        })
    }

    /// `assert_stmt: 'assert' expression [',' expression]`
    fn assert_stmt(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.advance();
            let test = p.expression()?;
            let msg = if p.eat(TokenKind::Comma).is_some() {
                Some(p.expression()?)
            } else {
                None
            };
            Some(StmtLoc::new(p.range_from(start), Stmt::Assert { test, msg }))
        })
    }

    /// `global_stmt: 'global' ','.NAME+` and `nonlocal_stmt: 'nonlocal' ','.NAME+`
    fn name_list_stmt(&mut self, make: fn(Vec<StringId>) -> Stmt) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.advance();
            let names = p.gather(TokenKind::Comma, |p| {
                let idx = p.eat(TokenKind::Name)?;
                Some(p.intern_token(idx))
            })?;
            Some(StmtLoc::new(p.range_from(start), make(names)))
        })
    }

    /// `del_stmt: 'del' del_targets &(';' | NEWLINE) | invalid_del_stmt`
    fn del_stmt(&mut self) -> Option<StmtLoc> {
        let start = self.mark();
        let result = self.attempt(|p| {
            p.advance();
            let targets = p.del_targets()?;
            matches!(p.peek_kind(), TokenKind::Semi | TokenKind::Newline)
                .then(|| StmtLoc::new(p.range_from(start), Stmt::Delete(targets)))
        });
        if result.is_some() || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        self.advance();
        if let Some(a) = self.star_expressions() {
            return self.raise_invalid_target(TargetsType::Del, &a);
        }
        self.reset(start);
        None
    }

    // ------------------------------------------------------------------------
    // imports
    // ------------------------------------------------------------------------

    /// `import_name: 'import' ','.dotted_as_name+`
    fn import_name(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.advance();
            let names = p.gather(TokenKind::Comma, Self::dotted_as_name)?;
            Some(StmtLoc::new(p.range_from(start), Stmt::Import(names)))
        })
    }

    fn dotted_as_name(&mut self) -> Option<Alias> {
        let start = self.mark();
        let name = self.dotted_name()?;
        let asname = self.as_name()?;
        Some(Alias {
            name,
            asname,
            position: self.range_from(start),
        })
    }

    /// `['as' NAME]`; the outer `None` is failure.
    fn as_name(&mut self) -> Option<Option<StringId>> {
        if self.eat_keyword(Keyword::As).is_none() {
            return Some(None);
        }
        let idx = self.eat(TokenKind::Name)?;
        Some(Some(self.intern_token(idx)))
    }

    /// `dotted_name: dotted_name '.' NAME | NAME`, interned whole.
    fn dotted_name(&mut self) -> Option<StringId> {
        let first = self.eat(TokenKind::Name)?;
        let mut name = self.tok(first).text.to_owned();
        while self.peek_kind() == TokenKind::Dot && self.peek_nth(1) == TokenKind::Name {
            self.advance();
            let idx = self.advance();
            name.push('.');
            name.push_str(self.tok(idx).text);
        }
        Some(self.intern_identifier(&name))
    }

    /// `import_from: 'from' ('.' | '...')* dotted_name 'import' import_from_targets
    ///     | 'from' ('.' | '...')+ 'import' import_from_targets`
    fn import_from(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.advance();
            let mut level = 0;
            loop {
                match p.peek_kind() {
                    TokenKind::Dot => level += 1,
                    TokenKind::Ellipsis => level += 3,
                    _ => break,
                }
                p.advance();
            }
            let module = if p.peek_kind() == TokenKind::Name {
                Some(p.dotted_name()?)
            } else {
                None
            };
            if module.is_none() && level == 0 {
                return None;
            }
            p.eat_keyword(Keyword::Import)?;
            let names = p.import_from_targets()?;
            Some(StmtLoc::new(p.range_from(start), Stmt::ImportFrom { module, names, level }))
        })
    }

    /// `import_from_targets: '(' import_from_as_names [','] ')' | import_from_as_names !','
    ///     | '*' | invalid_import_from_targets`
    fn import_from_targets(&mut self) -> Option<Vec<Alias>> {
        match self.peek_kind() {
            TokenKind::Lpar => self.attempt(|p| {
                p.advance();
                let names = p.gather(TokenKind::Comma, Self::import_from_as_name)?;
                p.eat(TokenKind::Comma);
                p.expect(TokenKind::Rpar)?;
                Some(names)
            }),
            TokenKind::Star => {
                let idx = self.advance();
                let name = self.interner.intern("*");
                Some(vec![Alias {
                    name,
                    asname: None,
                    position: self.tok(idx).range,
                }])
            }
            _ => {
                let names = self.gather(TokenKind::Comma, Self::import_from_as_name)?;
                if self.peek_kind() != TokenKind::Comma {
                    return Some(names);
                }
                if self.call_invalid_rules && self.peek_nth(1) == TokenKind::Newline {
                    return self.raise_syntax_here(ErrorMessage::TrailingCommaImport, &[]);
                }
                None
            }
        }
    }

    /// `import_from_as_name: NAME ['as' NAME]`
    fn import_from_as_name(&mut self) -> Option<Alias> {
        let start = self.eat(TokenKind::Name)?;
        let name = self.intern_token(start);
        let asname = self.as_name()?;
        Some(Alias {
            name,
            asname,
            position: self.range_from(start),
        })
    }

    // ------------------------------------------------------------------------
    // compound statements
    // ------------------------------------------------------------------------

    /// `compound_stmt: function_def | if_stmt | class_def | with_stmt | for_stmt
    ///     | try_stmt | while_stmt | match_stmt`
    pub(super) fn compound_stmt(&mut self) -> Option<StmtLoc> {
        let start = self.mark();
        match self.peek_kind() {
            TokenKind::At => self.decorated(),
            TokenKind::Keyword(Keyword::Def) => self.function_def(start, Vec::new()),
            TokenKind::Keyword(Keyword::Class) => self.class_def(start, Vec::new()),
            TokenKind::Keyword(Keyword::If) => self.if_stmt(),
            TokenKind::Keyword(Keyword::While) => self.while_stmt(),
            TokenKind::Keyword(Keyword::For) => self.for_stmt(),
            TokenKind::Keyword(Keyword::With) => self.with_stmt(),
            TokenKind::Keyword(Keyword::Try) => self.try_stmt(),
            TokenKind::Keyword(Keyword::Async) => match self.peek_nth(1) {
                TokenKind::Keyword(Keyword::Def) => self.function_def(start, Vec::new()),
                TokenKind::Keyword(Keyword::With) => self.with_stmt(),
                TokenKind::Keyword(Keyword::For) => self.for_stmt(),
                _ => None,
            },
            TokenKind::Name if self.is_soft_keyword("match") => self.match_stmt(),
            _ => None,
        }
    }

    /// `decorators: ('@' named_expression NEWLINE)+`, then a function or class.
    ///
    /// The statement's range starts at the first decorator so it contains them.
    fn decorated(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.mark();
            let mut decorators = Vec::new();
            while p.eat(TokenKind::At).is_some() {
                decorators.push(p.named_expression()?);
                p.expect(TokenKind::Newline)?;
            }
            match (p.peek_kind(), p.peek_nth(1)) {
                (TokenKind::Keyword(Keyword::Def), _)
                | (TokenKind::Keyword(Keyword::Async), TokenKind::Keyword(Keyword::Def)) => {
                    p.function_def(start, decorators)
                }
                (TokenKind::Keyword(Keyword::Class), _) => p.class_def(start, decorators),
                _ => None,
            }
        })
    }

    /// `function_def_raw: [ASYNC] 'def' NAME [type_params] &&'(' [params] ')'
    ///     ['->' expression] &&':' block`
    fn function_def(&mut self, start: usize, decorator_list: Vec<ExprLoc>) -> Option<StmtLoc> {
        self.attempt(|p| {
            let is_async = p.eat_keyword(Keyword::Async).is_some();
            let keyword = p.eat_keyword(Keyword::Def)?;
            let name_idx = p.eat(TokenKind::Name)?;
            let name = p.intern_token(name_idx);
            let type_params = p.optional_type_params()?;
            p.expect_forced(TokenKind::Lpar, "(")?;
            let args = if p.peek_kind() == TokenKind::Rpar {
                Arguments::default()
            } else {
                p.parameters(false)?
            };
            p.expect(TokenKind::Rpar)?;
            let returns = if p.eat(TokenKind::Rarrow).is_some() {
                Some(p.expression()?)
            } else {
                None
            };
            let body = p.suite("function definition", keyword, true)?;
            Some(StmtLoc::new(
                p.range_from(start),
                Stmt::FunctionDef(Box::new(FunctionDef {
                    name,
                    type_params,
                    args,
                    body,
                    decorator_list,
                    returns,
                    is_async,
                })),
            ))
        })
    }

    /// `class_def_raw: 'class' NAME [type_params] ['(' [arguments] ')'] ':' block`
    fn class_def(&mut self, start: usize, decorator_list: Vec<ExprLoc>) -> Option<StmtLoc> {
        self.attempt(|p| {
            let keyword = p.eat_keyword(Keyword::Class)?;
            let name_idx = p.eat(TokenKind::Name)?;
            let name = p.intern_token(name_idx);
            let type_params = p.optional_type_params()?;
            let (bases, keywords) = if p.eat(TokenKind::Lpar).is_some() {
                let args = if p.peek_kind() == TokenKind::Rpar {
                    (Vec::new(), Vec::new())
                } else {
                    p.arguments()?
                };
                p.expect(TokenKind::Rpar)?;
                args
            } else {
                (Vec::new(), Vec::new())
            };
            let body = p.suite("class definition", keyword, false)?;
            Some(StmtLoc::new(
                p.range_from(start),
                Stmt::ClassDef(Box::new(ClassDef {
                    name,
                    type_params,
                    bases,
                    keywords,
                    body,
                    decorator_list,
                })),
            ))
        })
    }

    /// `if_stmt: 'if' named_expression ':' block (elif_stmt | [else_block])`; also parses
    /// `elif_stmt`, which nests as the sole statement of the `orelse` branch.
    ///
    /// The clauses are read in a loop and folded from the last one, so a long `elif`
    /// chain does not recurse.
    fn if_stmt(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let mut clauses = Vec::new();
            let mut orelse = loop {
                let start = p.advance();
                let header = if p.tok(start).is_keyword(Keyword::Elif) {
                    "'elif' statement"
                } else {
                    "'if' statement"
                };
                let test = p.named_expression()?;
                let body = p.suite(header, start, false)?;
                clauses.push((start, test, body));
                if !p.is_keyword(Keyword::Elif) {
                    break p.optional_else()?;
                }
            };
            while let Some((start, test, body)) = clauses.pop() {
                orelse = vec![StmtLoc::new(p.range_from(start), Stmt::If { test, body, orelse })];
            }
            orelse.pop()
        })
    }

    /// `[else_block]`, where `else_block: 'else' &&':' block`
    fn optional_else(&mut self) -> Option<Vec<StmtLoc>> {
        let Some(keyword) = self.eat_keyword(Keyword::Else) else {
            return Some(Vec::new());
        };
        self.suite("'else' statement", keyword, true)
    }

    /// `while_stmt: 'while' named_expression ':' block [else_block]`
    fn while_stmt(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.advance();
            let test = p.named_expression()?;
            let body = p.suite("'while' statement", start, false)?;
            let orelse = p.optional_else()?;
            Some(StmtLoc::new(p.range_from(start), Stmt::While { test, body, orelse }))
        })
    }

    /// `for_stmt: [ASYNC] 'for' star_targets 'in' ~ star_expressions ':' block [else_block]
    ///     | invalid_for_target`
    fn for_stmt(&mut self) -> Option<StmtLoc> {
        let start = self.mark();
        let mut committed = false;
        let result = self.attempt(|p| {
            let is_async = p.eat_keyword(Keyword::Async).is_some();
            let keyword = p.eat_keyword(Keyword::For)?;
            let target = p.star_targets()?;
            p.eat_keyword(Keyword::In)?;
            committed = true;
            let iter = p.star_expressions()?;
            let body = p.suite("'for' statement", keyword, false)?;
            let orelse = p.optional_else()?;
            Some(StmtLoc::new(
                p.range_from(start),
                Stmt::For {
                    target,
                    iter,
                    body,
                    orelse,
                    is_async,
                },
            ))
        });
        if result.is_some() || committed || !self.call_invalid_rules || self.error_indicator {
            return result;
        }
        self.invalid_for_target();
        None
    }

    /// `with_stmt: [ASYNC] 'with' '(' ','.with_item+ ','? ')' ':' block
    ///     | [ASYNC] 'with' ','.with_item+ ':' block`
    fn with_stmt(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.mark();
            let is_async = p.eat_keyword(Keyword::Async).is_some();
            let keyword = p.eat_keyword(Keyword::With)?;
            let items = match p.parenthesized_with_items() {
                Some(items) => items,
                None if p.error_indicator => return None,
                None => p.gather(TokenKind::Comma, Self::with_item)?,
            };
            let body = p.suite("'with' statement", keyword, false)?;
            Some(StmtLoc::new(p.range_from(start), Stmt::With { items, body, is_async }))
        })
    }

    fn parenthesized_with_items(&mut self) -> Option<Vec<WithItem>> {
        self.attempt(|p| {
            p.eat(TokenKind::Lpar)?;
            let items = p.gather(TokenKind::Comma, Self::with_item)?;
            p.eat(TokenKind::Comma);
            p.eat(TokenKind::Rpar)?;
            let at_colon = p.peek_kind() == TokenKind::Colon
                || (p.call_invalid_rules && p.peek_kind() == TokenKind::Newline);
            at_colon.then_some(items)
        })
    }

    /// `with_item: expression 'as' star_target &(',' | ')' | ':') | invalid_with_item
    ///     | expression`
    fn with_item(&mut self) -> Option<WithItem> {
        let context_expr = self.expression()?;
        let Some(as_idx) = self.eat_keyword(Keyword::As) else {
            return Some(WithItem {
                context_expr,
                optional_vars: None,
            });
        };
        let follows = |kind: TokenKind| matches!(kind, TokenKind::Comma | TokenKind::Rpar | TokenKind::Colon);
        if let Some(target) = self.star_target()
            && follows(self.peek_kind())
        {
            return Some(WithItem {
                context_expr,
                optional_vars: Some(target),
            });
        }
        if self.error_indicator {
            return None;
        }
        if self.call_invalid_rules {
            self.reset(as_idx + 1);
            if let Some(a) = self.expression()
                && follows(self.peek_kind())
            {
                return self.raise_invalid_target(TargetsType::Star, &a);
            }
        }
        self.reset(as_idx);
        Some(WithItem {
            context_expr,
            optional_vars: None,
        })
    }

    /// `try_stmt: 'try' &&':' block finally_block
    ///     | 'try' &&':' block except_block+ [else_block] [finally_block]
    ///     | 'try' &&':' block except_star_block+ [else_block] [finally_block]`
    fn try_stmt(&mut self) -> Option<StmtLoc> {
        self.attempt(|p| {
            let start = p.advance();
            let body = p.suite("'try' statement", start, true)?;
            let mut handlers = Vec::new();
            let mut star_kind: Option<bool> = None;
            while p.is_keyword(Keyword::Except) {
                let is_star = p.peek_nth(1) == TokenKind::Star;
                if let Some(previous) = star_kind
                    && previous != is_star
                {
                    return p.mixed_except_star(previous);
                }
                handlers.push(p.except_block(is_star)?);
                star_kind = Some(is_star);
            }
            let orelse = if handlers.is_empty() {
                Vec::new()
            } else {
                p.optional_else()?
            };
            let finalbody = match p.eat_keyword(Keyword::Finally) {
                Some(keyword) => p.suite("'finally' statement", keyword, true)?,
                None => Vec::new(),
            };
            if handlers.is_empty() && finalbody.is_empty() {
                if p.call_invalid_rules {
                    return p.raise_syntax_here(ErrorMessage::ExpectedExceptOrFinally, &[]);
                }
                return None;
            }
            Some(StmtLoc::new(
                p.range_from(start),
                Stmt::Try {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                    is_star: star_kind.unwrap_or(false),
                },
            ))
        })
    }

    /// `except` after `except*` handlers or the other way round.
    fn mixed_except_star<T>(&mut self, previous_star: bool) -> Option<T> {
        if !self.call_invalid_rules {
            return None;
        }
        let except = self.current_range();
        let range = if previous_star {
            except
        } else {
            let star = self.peek_nth_range(1);
            except.to(star)
        };
        self.raise_syntax(range, ErrorMessage::MixedExceptStar, &[])
    }

    fn peek_nth_range(&mut self, n: usize) -> SourceRange {
        let saved = self.mark();
        self.reset(saved + n);
        let range = self.current_range();
        self.reset(saved);
        range
    }

    /// `except_block: 'except' expression ['as' NAME] ':' block | 'except' ':' block`
    /// `except_star_block: 'except' '*' expression ['as' NAME] ':' block`
    fn except_block(&mut self, is_star: bool) -> Option<ExceptHandler> {
        let start = self.advance();
        if is_star {
            self.advance();
        }
        let header = if is_star {
            "'except*' statement"
        } else {
            "'except' statement"
        };
        let mut type_ = None;
        let mut name = None;
        match self.peek_kind() {
            TokenKind::Newline | TokenKind::Colon if is_star => {
                let range = self.tok(start).range;
                return self.argument_error(range, ErrorMessage::ExpectedExceptionTypes, &[]);
            }
            // a missing colon is reported by the suite
            TokenKind::Colon | TokenKind::Newline => {}
            _ => {
                let exc = self.expression()?;
                if self.call_invalid_rules
                    && self.peek_kind() == TokenKind::Comma
                    && let Some(end) = self.unparenthesized_except_types()
                {
                    return self.raise_syntax(exc.position.to(end), ErrorMessage::ExceptTypesParens, &[]);
                }
                name = self.as_name()?;
                type_ = Some(exc);
            }
        }
        let body = self.suite(header, start, false)?;
        Some(ExceptHandler {
            type_,
            name,
            body,
            position: self.range_from(start),
        })
    }

    /// `',' expressions ['as' NAME] ':'` after the first exception type. Returns the range
    /// of the last token before the colon; never moves the cursor.
    fn unparenthesized_except_types(&mut self) -> Option<SourceRange> {
        let mark = self.mark();
        let end = self.attempt(|p| {
            p.advance();
            p.expressions()?;
            p.as_name()?;
            let end = p.last_range();
            p.eat(TokenKind::Colon)?;
            Some(end)
        });
        self.reset(mark);
        end
    }

    // ------------------------------------------------------------------------
    // parameters
    // ------------------------------------------------------------------------

    /// `params` for `def` (closed by `)`) or `lambda_params` (closed by `:`).
    ///
    /// Parsed in one left-to-right scan rather than through the grammar's ordered
    /// alternatives. Ordering violations fail on the first pass and are reported with
    /// CPython's message on the second.
    pub(super) fn parameters(&mut self, lambda: bool) -> Option<Arguments> {
        let close = if lambda { TokenKind::Colon } else { TokenKind::Rpar };
        let mut args = Arguments::default();
        let mut positional: Vec<Arg> = Vec::new();
        let mut seen_slash = false;
        let mut seen_star = false;
        let mut seen_kwarg = false;
        loop {
            match self.peek_kind() {
                TokenKind::Slash => {
                    let range = self.current_range();
                    self.advance();
                    if seen_kwarg {
                        return self.argument_error(range, ErrorMessage::ArgsAfterVarKeyword, &[]);
                    }
                    if seen_slash {
                        return self.argument_error(range, ErrorMessage::SlashTwice, &[]);
                    }
                    if seen_star {
                        return self.argument_error(range, ErrorMessage::SlashAfterStar, &[]);
                    }
                    if positional.is_empty() {
                        return self.argument_error(range, ErrorMessage::SlashFirst, &[]);
                    }
                    if self.peek_kind() == TokenKind::Star {
                        let star = self.current_range();
                        return self.argument_error(star, ErrorMessage::SlashStarComma, &[]);
                    }
                    args.posonlyargs.append(&mut positional);
                    seen_slash = true;
                }
                TokenKind::Star => {
                    let range = self.current_range();
                    self.advance();
                    if seen_kwarg {
                        return self.argument_error(range, ErrorMessage::ArgsAfterVarKeyword, &[]);
                    }
                    if seen_star {
                        return self.argument_error(range, ErrorMessage::StarTwice, &[]);
                    }
                    seen_star = true;
                    let next = self.peek_kind();
                    if next == TokenKind::Comma {
                        let after = self.peek_nth(1);
                        if after == close || after == TokenKind::DoubleStar {
                            return self.argument_error(range, ErrorMessage::BareStar, &[]);
                        }
                    } else if next == close {
                        return self.argument_error(range, ErrorMessage::BareStar, &[]);
                    } else {
                        let arg = self.param(lambda, true)?;
                        if let Some(equal) = self.eat(TokenKind::Equal) {
                            let range = self.tok(equal).range;
                            return self.argument_error(range, ErrorMessage::VarPositionalDefault, &[]);
                        }
                        args.vararg = Some(arg);
                    }
                }
                TokenKind::DoubleStar => {
                    let range = self.current_range();
                    self.advance();
                    if seen_kwarg {
                        return self.argument_error(range, ErrorMessage::ArgsAfterVarKeyword, &[]);
                    }
                    let arg = self.param(lambda, false)?;
                    if let Some(equal) = self.eat(TokenKind::Equal) {
                        let range = self.tok(equal).range;
                        return self.argument_error(range, ErrorMessage::VarKeywordDefault, &[]);
                    }
                    args.kwarg = Some(arg);
                    seen_kwarg = true;
                }
                TokenKind::Lpar => return self.parenthesized_params(lambda),
                TokenKind::Name => {
                    let arg = self.param(lambda, false)?;
                    if seen_kwarg {
                        return self.argument_error(arg.position, ErrorMessage::ArgsAfterVarKeyword, &[]);
                    }
                    let default = self.param_default(close)?;
                    if seen_star {
                        args.kwonlyargs.push(arg);
                        args.kw_defaults.push(default);
                    } else {
                        match default {
                            Some(default) => args.defaults.push(default),
                            None if !args.defaults.is_empty() => {
                                return self.argument_error(arg.position, ErrorMessage::NonDefaultAfterDefault, &[]);
                            }
                            None => {}
                        }
                        positional.push(arg);
                    }
                }
                _ => return None,
            }
            if self.eat(TokenKind::Comma).is_none() || self.peek_kind() == close {
                break;
            }
        }
        if self.peek_kind() != close {
            return None;
        }
        args.args = positional;
        Some(args)
    }

    /// `param: NAME annotation?`; lambda parameters take no annotation, and `*args`
    /// may be annotated with a starred expression.
    fn param(&mut self, lambda: bool, star_annotation: bool) -> Option<Arg> {
        let start = self.eat(TokenKind::Name)?;
        let arg = self.intern_token(start);
        let annotation = if !lambda && self.eat(TokenKind::Colon).is_some() {
            let annotation = if star_annotation && self.peek_kind() == TokenKind::Star {
                self.star_expression()?
            } else {
                self.expression()?
            };
            Some(Box::new(annotation))
        } else {
            None
        };
        Some(Arg {
            arg,
            annotation,
            position: self.range_from(start),
        })
    }

    /// `default: '=' expression | invalid_default`; the outer `None` is failure.
    fn param_default(&mut self, close: TokenKind) -> Option<Option<ExprLoc>> {
        let Some(equal) = self.eat(TokenKind::Equal) else {
            return Some(None);
        };
        let next = self.peek_kind();
        if next == TokenKind::Comma || next == close {
            let range = self.tok(equal).range;
            return self.argument_error(range, ErrorMessage::ExpectedDefault, &[]);
        }
        self.expression().map(Some)
    }

    /// `'(' param_no_default+ ','? ')'` where parameters are expected. Never succeeds.
    fn parenthesized_params(&mut self, lambda: bool) -> Option<Arguments> {
        if !self.call_invalid_rules {
            return None;
        }
        let open = self.advance();
        self.gather(TokenKind::Comma, |p| p.param(lambda, false))?;
        self.eat(TokenKind::Comma);
        let close = self.eat(TokenKind::Rpar)?;
        let what = if lambda { "Lambda expression" } else { "Function" };
        let range = self.tok(open).range.to(self.tok(close).range);
        self.raise_syntax(range, ErrorMessage::ParamsParenthesized, &[what])
    }

    // ------------------------------------------------------------------------
    // type parameters
    // ------------------------------------------------------------------------

    /// `[type_params]`, where `type_params: '[' ','.type_param+ [','] ']'`
    fn optional_type_params(&mut self) -> Option<Vec<TypeParam>> {
        if self.peek_kind() != TokenKind::Lsqb {
            return Some(Vec::new());
        }
        self.attempt(|p| {
            p.advance();
            let params = p.gather(TokenKind::Comma, Self::type_param)?;
            p.eat(TokenKind::Comma);
            p.expect(TokenKind::Rsqb)?;
            Some(params)
        })
    }

    /// `type_param: NAME [':' expression] | '*' NAME | '**' NAME`
    fn type_param(&mut self) -> Option<TypeParam> {
        let start = self.mark();
        let stars = match self.peek_kind() {
            TokenKind::Star => 1,
            TokenKind::DoubleStar => 2,
            _ => 0,
        };
        if stars > 0 {
            self.advance();
        }
        let name_idx = self.eat(TokenKind::Name)?;
        let name = self.intern_token(name_idx);
        let bound = match self.eat(TokenKind::Colon) {
            Some(colon) => Some((colon, self.expression()?)),
            None => None,
        };
        let kind = match (stars, bound) {
            (0, bound) => TypeParamKind::TypeVar {
                bound: bound.map(|(_, b)| Box::new(b)),
            },
            (1, None) => TypeParamKind::TypeVarTuple,
            (_, None) => TypeParamKind::ParamSpec,
            (stars, Some((colon, _))) => {
                let message = if stars == 1 {
                    ErrorMessage::TypeVarTupleBound
                } else {
                    ErrorMessage::ParamSpecBound
                };
                let range = self.tok(colon).range.to(self.last_range());
                return self.raise_syntax(range, message, &[]);
            }
        };
        Some(TypeParam {
            name,
            kind,
            position: self.range_from(start),
        })
    }
}

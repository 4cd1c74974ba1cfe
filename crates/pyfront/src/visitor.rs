//! Read-only tree walking.
//!
//! Implement [`Visitor`] and override the hooks for the nodes of interest; call the
//! matching `walk_*` function from an override to keep descending. Children are visited
//! in source order.

use crate::{
    diagnostic::SourceRange,
    expressions::{
        Alias, Arg, Arguments, Comprehension, ExceptHandler, Expr, ExprLoc, Keyword, MatchCase, Mod, Stmt, StmtLoc,
        TypeParam, TypeParamKind, WithItem,
    },
    patterns::{Pattern, PatternLoc},
};

pub trait Visitor<'ast> {
    fn visit_mod(&mut self, module: &'ast Mod) {
        walk_mod(self, module);
    }

    fn visit_body(&mut self, body: &'ast [StmtLoc]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &'ast StmtLoc) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast ExprLoc) {
        walk_expr(self, expr);
    }

    fn visit_pattern(&mut self, pattern: &'ast PatternLoc) {
        walk_pattern(self, pattern);
    }

    fn visit_arguments(&mut self, arguments: &'ast Arguments) {
        walk_arguments(self, arguments);
    }

    fn visit_arg(&mut self, arg: &'ast Arg) {
        walk_arg(self, arg);
    }

    fn visit_keyword(&mut self, keyword: &'ast Keyword) {
        self.visit_expr(&keyword.value);
    }

    fn visit_alias(&mut self, _alias: &'ast Alias) {}

    fn visit_with_item(&mut self, item: &'ast WithItem) {
        self.visit_expr(&item.context_expr);
        if let Some(vars) = &item.optional_vars {
            self.visit_expr(vars);
        }
    }

    fn visit_except_handler(&mut self, handler: &'ast ExceptHandler) {
        walk_except_handler(self, handler);
    }

    fn visit_match_case(&mut self, case: &'ast MatchCase) {
        walk_match_case(self, case);
    }

    fn visit_comprehension(&mut self, comprehension: &'ast Comprehension) {
        walk_comprehension(self, comprehension);
    }

    fn visit_type_param(&mut self, param: &'ast TypeParam) {
        walk_type_param(self, param);
    }
}

pub fn walk_mod<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, module: &'ast Mod) {
    match module {
        Mod::Module(body) | Mod::Interactive(body) => visitor.visit_body(body),
        Mod::Expression(body) => visitor.visit_expr(body),
        Mod::FunctionType { argtypes, returns } => {
            for arg in argtypes {
                visitor.visit_expr(arg);
            }
            visitor.visit_expr(returns);
        }
    }
}

pub fn walk_stmt<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, stmt: &'ast StmtLoc) {
    match &stmt.stmt {
        Stmt::FunctionDef(def) => {
            for decorator in &def.decorator_list {
                visitor.visit_expr(decorator);
            }
            for param in &def.type_params {
                visitor.visit_type_param(param);
            }
            visitor.visit_arguments(&def.args);
            if let Some(returns) = &def.returns {
                visitor.visit_expr(returns);
            }
            visitor.visit_body(&def.body);
        }
        Stmt::ClassDef(def) => {
            for decorator in &def.decorator_list {
                visitor.visit_expr(decorator);
            }
            for param in &def.type_params {
                visitor.visit_type_param(param);
            }
            for base in &def.bases {
                visitor.visit_expr(base);
            }
            for keyword in &def.keywords {
                visitor.visit_keyword(keyword);
            }
            visitor.visit_body(&def.body);
        }
        Stmt::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        Stmt::Delete(targets) => {
            for target in targets {
                visitor.visit_expr(target);
            }
        }
        Stmt::Assign { targets, value } => {
            for target in targets {
                visitor.visit_expr(target);
            }
            visitor.visit_expr(value);
        }
        Stmt::TypeAlias {
            name,
            type_params,
            value,
        } => {
            visitor.visit_expr(name);
            for param in type_params {
                visitor.visit_type_param(param);
            }
            visitor.visit_expr(value);
        }
        Stmt::AugAssign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        Stmt::AnnAssign {
            target,
            annotation,
            value,
            ..
        } => {
            visitor.visit_expr(target);
            visitor.visit_expr(annotation);
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        Stmt::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            visitor.visit_expr(target);
            visitor.visit_expr(iter);
            visitor.visit_body(body);
            visitor.visit_body(orelse);
        }
        Stmt::While { test, body, orelse } | Stmt::If { test, body, orelse } => {
            visitor.visit_expr(test);
            visitor.visit_body(body);
            visitor.visit_body(orelse);
        }
        Stmt::With { items, body, .. } => {
            for item in items {
                visitor.visit_with_item(item);
            }
            visitor.visit_body(body);
        }
        Stmt::Match { subject, cases } => {
            visitor.visit_expr(subject);
            for case in cases {
                visitor.visit_match_case(case);
            }
        }
        Stmt::Raise { exc, cause } => {
            if let Some(exc) = exc {
                visitor.visit_expr(exc);
            }
            if let Some(cause) = cause {
                visitor.visit_expr(cause);
            }
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        } => {
            visitor.visit_body(body);
            for handler in handlers {
                visitor.visit_except_handler(handler);
            }
            visitor.visit_body(orelse);
            visitor.visit_body(finalbody);
        }
        Stmt::Assert { test, msg } => {
            visitor.visit_expr(test);
            if let Some(msg) = msg {
                visitor.visit_expr(msg);
            }
        }
        Stmt::Import(names) | Stmt::ImportFrom { names, .. } => {
            for alias in names {
                visitor.visit_alias(alias);
            }
        }
        Stmt::Expr(value) => visitor.visit_expr(value),
        Stmt::Global(_) | Stmt::Nonlocal(_) | Stmt::Pass | Stmt::Break | Stmt::Continue => {}
    }
}

pub fn walk_expr<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, expr: &'ast ExprLoc) {
    match &expr.expr {
        Expr::BoolOp { values, .. } => {
            for value in values {
                visitor.visit_expr(value);
            }
        }
        Expr::NamedExpr { target, value } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        Expr::BinOp { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::UnaryOp { operand, .. } => visitor.visit_expr(operand),
        Expr::Lambda { args, body } => {
            visitor.visit_arguments(args);
            visitor.visit_expr(body);
        }
        Expr::IfExp { test, body, orelse } => {
            visitor.visit_expr(body);
            visitor.visit_expr(test);
            visitor.visit_expr(orelse);
        }
        Expr::Dict { keys, values } => {
            for (key, value) in keys.iter().zip(values) {
                if let Some(key) = key {
                    visitor.visit_expr(key);
                }
                visitor.visit_expr(value);
            }
        }
        Expr::Set(elts) | Expr::JoinedStr(elts) => {
            for elt in elts {
                visitor.visit_expr(elt);
            }
        }
        Expr::List { elts, .. } | Expr::Tuple { elts, .. } => {
            for elt in elts {
                visitor.visit_expr(elt);
            }
        }
        Expr::ListComp { elt, generators } | Expr::SetComp { elt, generators } | Expr::GeneratorExp { elt, generators } => {
            visitor.visit_expr(elt);
            for comprehension in generators {
                visitor.visit_comprehension(comprehension);
            }
        }
        Expr::DictComp { key, value, generators } => {
            visitor.visit_expr(key);
            visitor.visit_expr(value);
            for comprehension in generators {
                visitor.visit_comprehension(comprehension);
            }
        }
        Expr::Await(value) | Expr::YieldFrom(value) => visitor.visit_expr(value),
        Expr::Yield(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        Expr::Compare { left, comparators, .. } => {
            visitor.visit_expr(left);
            for comparator in comparators {
                visitor.visit_expr(comparator);
            }
        }
        Expr::Call { func, args, keywords } => {
            visitor.visit_expr(func);
            for arg in args {
                visitor.visit_expr(arg);
            }
            for keyword in keywords {
                visitor.visit_keyword(keyword);
            }
        }
        Expr::FormattedValue { value, format_spec, .. } => {
            visitor.visit_expr(value);
            if let Some(spec) = format_spec {
                visitor.visit_expr(spec);
            }
        }
        Expr::Attribute { value, .. } | Expr::Starred { value, .. } => visitor.visit_expr(value),
        Expr::Subscript { value, slice, .. } => {
            visitor.visit_expr(value);
            visitor.visit_expr(slice);
        }
        Expr::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                visitor.visit_expr(part);
            }
        }
        Expr::Constant(_) | Expr::Name { .. } => {}
    }
}

pub fn walk_pattern<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, pattern: &'ast PatternLoc) {
    match &pattern.pattern {
        Pattern::MatchValue(value) => visitor.visit_expr(value),
        Pattern::MatchSingleton(_) | Pattern::MatchStar(_) => {}
        Pattern::MatchSequence(patterns) | Pattern::MatchOr(patterns) => {
            for pattern in patterns {
                visitor.visit_pattern(pattern);
            }
        }
        Pattern::MatchMapping { keys, patterns, .. } => {
            for (key, pattern) in keys.iter().zip(patterns) {
                visitor.visit_expr(key);
                visitor.visit_pattern(pattern);
            }
        }
        Pattern::MatchClass {
            cls,
            patterns,
            kwd_patterns,
            ..
        } => {
            visitor.visit_expr(cls);
            for pattern in patterns.iter().chain(kwd_patterns) {
                visitor.visit_pattern(pattern);
            }
        }
        Pattern::MatchAs { pattern, .. } => {
            if let Some(pattern) = pattern {
                visitor.visit_pattern(pattern);
            }
        }
    }
}

/// Visits parameters in declaration order, then the defaults.
pub fn walk_arguments<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, arguments: &'ast Arguments) {
    for arg in arguments.iter_args() {
        visitor.visit_arg(arg);
    }
    for default in &arguments.defaults {
        visitor.visit_expr(default);
    }
    for default in arguments.kw_defaults.iter().flatten() {
        visitor.visit_expr(default);
    }
}

pub fn walk_arg<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, arg: &'ast Arg) {
    if let Some(annotation) = &arg.annotation {
        visitor.visit_expr(annotation);
    }
}

pub fn walk_except_handler<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, handler: &'ast ExceptHandler) {
    if let Some(type_) = &handler.type_ {
        visitor.visit_expr(type_);
    }
    visitor.visit_body(&handler.body);
}

pub fn walk_match_case<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, case: &'ast MatchCase) {
    visitor.visit_pattern(&case.pattern);
    if let Some(guard) = &case.guard {
        visitor.visit_expr(guard);
    }
    visitor.visit_body(&case.body);
}

pub fn walk_comprehension<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, comprehension: &'ast Comprehension) {
    visitor.visit_expr(&comprehension.target);
    visitor.visit_expr(&comprehension.iter);
    for test in &comprehension.ifs {
        visitor.visit_expr(test);
    }
}

pub fn walk_type_param<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, param: &'ast TypeParam) {
    if let TypeParamKind::TypeVar { bound: Some(bound) } = &param.kind {
        visitor.visit_expr(bound);
    }
}

/// A node whose range is not contained in its parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeViolation {
    pub parent: SourceRange,
    pub child: SourceRange,
}

/// Checks that every located node lies within its nearest located ancestor.
#[must_use]
pub fn check_ranges(module: &Mod) -> Vec<RangeViolation> {
    let mut checker = RangeChecker::default();
    checker.visit_mod(module);
    checker.violations
}

#[derive(Default)]
struct RangeChecker {
    stack: Vec<SourceRange>,
    violations: Vec<RangeViolation>,
}

impl RangeChecker {
    fn within(&mut self, range: SourceRange, walk: impl FnOnce(&mut Self)) {
        if let Some(&parent) = self.stack.last()
            && !parent.contains(&range)
        {
            self.violations.push(RangeViolation { parent, child: range });
        }
        self.stack.push(range);
        walk(self);
        self.stack.pop();
    }
}

impl<'ast> Visitor<'ast> for RangeChecker {
    fn visit_stmt(&mut self, stmt: &'ast StmtLoc) {
        self.within(stmt.position, |v| walk_stmt(v, stmt));
    }

    fn visit_expr(&mut self, expr: &'ast ExprLoc) {
        self.within(expr.position, |v| walk_expr(v, expr));
    }

    fn visit_pattern(&mut self, pattern: &'ast PatternLoc) {
        self.within(pattern.position, |v| walk_pattern(v, pattern));
    }

    fn visit_arg(&mut self, arg: &'ast Arg) {
        self.within(arg.position, |v| walk_arg(v, arg));
    }

    fn visit_keyword(&mut self, keyword: &'ast Keyword) {
        self.within(keyword.position, |v| v.visit_expr(&keyword.value));
    }

    fn visit_alias(&mut self, alias: &'ast Alias) {
        self.within(alias.position, |_| {});
    }

    fn visit_except_handler(&mut self, handler: &'ast ExceptHandler) {
        self.within(handler.position, |v| walk_except_handler(v, handler));
    }

    fn visit_comprehension(&mut self, comprehension: &'ast Comprehension) {
        self.within(comprehension.position, |v| walk_comprehension(v, comprehension));
    }

    fn visit_type_param(&mut self, param: &'ast TypeParam) {
        self.within(param.position, |v| walk_type_param(v, param));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParseOptions, diagnostic::CodeLoc, intern::InternerBuilder};

    #[derive(Default)]
    struct NameCollector<'i> {
        interner: Option<&'i InternerBuilder>,
        names: Vec<String>,
    }

    impl<'ast> Visitor<'ast> for NameCollector<'_> {
        fn visit_expr(&mut self, expr: &'ast ExprLoc) {
            if let (Some(id), Some(interner)) = (expr.name_id(), self.interner) {
                self.names.push(interner.get_str(id).to_owned());
            }
            walk_expr(self, expr);
        }
    }

    #[test]
    fn names_in_source_order() {
        let output = crate::parse("x = f(a, b=c)\nfor i in y:\n    print(i)\n", &ParseOptions::default());
        let module = output.module.as_ref().expect("valid source");
        let mut collector = NameCollector {
            interner: Some(&output.interner),
            ..Default::default()
        };
        collector.visit_mod(module);
        assert_eq!(collector.names, ["x", "f", "a", "c", "i", "y", "print", "i"]);
    }

    #[test]
    fn parsed_ranges_nest() {
        let source = "@dec\ndef f(a: int = 1, *, b):\n    return [x for x in a if x]\nclass C(B, k=1):\n    import os.path as p\n";
        let output = crate::parse(source, &ParseOptions::default());
        let module = output.module.as_ref().expect("valid source");
        assert!(check_ranges(module).is_empty());
    }

    #[test]
    fn reports_escaping_child() {
        let inner = SourceRange::new(0, 10, CodeLoc::new(1, 0), CodeLoc::new(1, 10));
        let outer = SourceRange::new(0, 5, CodeLoc::new(1, 0), CodeLoc::new(1, 5));
        let name = ExprLoc::new(
            inner,
            Expr::Name {
                id: crate::intern::StaticStrings::Super.into(),
                ctx: crate::expressions::ExprContext::Load,
            },
        );
        let module = Mod::Module(vec![StmtLoc::new(outer, Stmt::Expr(name))]);
        assert_eq!(check_ranges(&module), [RangeViolation { parent: outer, child: inner }]);
    }
}

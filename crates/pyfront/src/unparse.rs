//! Source regeneration from the tree.
//!
//! The output is not the original text: parentheses are added only where precedence
//! requires them, string literals are re-quoted and comments are gone. Parsing the
//! output again yields a tree equal to the input apart from source ranges.

use std::fmt::Write;

use crate::{
    expressions::{
        Alias, Arg, Arguments, BoolOp, Comprehension, ExceptHandler, Expr, ExprLoc, Keyword, Literal, MatchCase, Mod,
        Operator, Stmt, StmtLoc, TypeParam, TypeParamKind, UnaryOp, WithItem,
    },
    intern::{InternerBuilder, StringId},
    patterns::{Pattern, PatternLoc},
    printer::{repr_bytes, repr_code_points, repr_float, repr_imag, repr_str},
};

/// Binding strength of an expression position, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    /// Bare `yield`, allowed only as a whole statement or assigned value.
    Yield,
    NamedExpr,
    Tuple,
    /// `if`-`else` and `lambda`.
    Test,
    Or,
    And,
    Not,
    Cmp,
    BitOr,
    BitXor,
    BitAnd,
    Shift,
    Arith,
    Term,
    Factor,
    Power,
    Await,
    Atom,
}

impl Prec {
    fn next(self) -> Self {
        match self {
            Self::Yield => Self::NamedExpr,
            Self::NamedExpr => Self::Tuple,
            Self::Tuple => Self::Test,
            Self::Test => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Not,
            Self::Not => Self::Cmp,
            Self::Cmp => Self::BitOr,
            Self::BitOr => Self::BitXor,
            Self::BitXor => Self::BitAnd,
            Self::BitAnd => Self::Shift,
            Self::Shift => Self::Arith,
            Self::Arith => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Power,
            Self::Power => Self::Await,
            Self::Await | Self::Atom => Self::Atom,
        }
    }

    fn of_operator(op: Operator) -> Self {
        match op {
            Operator::BitOr => Self::BitOr,
            Operator::BitXor => Self::BitXor,
            Operator::BitAnd => Self::BitAnd,
            Operator::LShift | Operator::RShift => Self::Shift,
            Operator::Add | Operator::Sub => Self::Arith,
            Operator::Mult | Operator::MatMult | Operator::Div | Operator::Mod | Operator::FloorDiv => Self::Term,
            Operator::Pow => Self::Power,
        }
    }
}

/// Regenerates source text for a whole parse root.
#[must_use]
pub fn unparse(module: &Mod, interner: &InternerBuilder) -> String {
    let mut unparser = Unparser::new(interner);
    match module {
        Mod::Module(body) | Mod::Interactive(body) => unparser.body(body),
        Mod::Expression(body) => unparser.expr(body, Prec::Tuple),
        Mod::FunctionType { argtypes, returns } => {
            unparser.out.push('(');
            unparser.comma_separated(argtypes, Prec::Test);
            unparser.out.push_str(") -> ");
            unparser.expr(returns, Prec::Test);
        }
    }
    unparser.out
}

/// Regenerates source text for one expression.
#[must_use]
pub fn unparse_expr(expr: &ExprLoc, interner: &InternerBuilder) -> String {
    let mut unparser = Unparser::new(interner);
    unparser.expr(expr, Prec::Tuple);
    unparser.out
}

struct Unparser<'a> {
    interner: &'a InternerBuilder,
    out: String,
    indent: usize,
}

impl<'a> Unparser<'a> {
    fn new(interner: &'a InternerBuilder) -> Self {
        Self {
            interner,
            out: String::new(),
            indent: 0,
        }
    }

    fn name(&self, id: StringId) -> &'a str {
        self.interner.get_str(id)
    }

    fn line(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn body(&mut self, body: &[StmtLoc]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    /// Writes `header:` followed by the indented block.
    fn block(&mut self, body: &[StmtLoc]) {
        self.out.push_str(":\n");
        self.indent += 1;
        self.body(body);
        self.indent -= 1;
    }

    fn else_block(&mut self, keyword: &str, body: &[StmtLoc]) {
        if !body.is_empty() {
            self.line();
            self.out.push_str(keyword);
            self.block(body);
        }
    }

    fn comma_separated(&mut self, exprs: &[ExprLoc], prec: Prec) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(expr, prec);
        }
    }

    fn stmt(&mut self, stmt: &StmtLoc) {
        match &stmt.stmt {
            Stmt::FunctionDef(def) => {
                for decorator in &def.decorator_list {
                    self.line();
                    self.out.push('@');
                    self.expr(decorator, Prec::Test);
                    self.out.push('\n');
                }
                self.line();
                if def.is_async {
                    self.out.push_str("async ");
                }
                let _ = write!(self.out, "def {}", self.name(def.name));
                self.type_params(&def.type_params);
                self.out.push('(');
                self.arguments(&def.args);
                self.out.push(')');
                if let Some(returns) = &def.returns {
                    self.out.push_str(" -> ");
                    self.expr(returns, Prec::Test);
                }
                self.block(&def.body);
            }
            Stmt::ClassDef(def) => {
                for decorator in &def.decorator_list {
                    self.line();
                    self.out.push('@');
                    self.expr(decorator, Prec::Test);
                    self.out.push('\n');
                }
                self.line();
                let _ = write!(self.out, "class {}", self.name(def.name));
                self.type_params(&def.type_params);
                if !def.bases.is_empty() || !def.keywords.is_empty() {
                    self.out.push('(');
                    self.comma_separated(&def.bases, Prec::Test);
                    for (i, keyword) in def.keywords.iter().enumerate() {
                        if i > 0 || !def.bases.is_empty() {
                            self.out.push_str(", ");
                        }
                        self.keyword(keyword);
                    }
                    self.out.push(')');
                }
                self.block(&def.body);
            }
            Stmt::If { test, body, orelse } => {
                self.line();
                self.out.push_str("if ");
                self.if_chain(test, body, orelse);
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                is_async,
            } => {
                self.line();
                if *is_async {
                    self.out.push_str("async ");
                }
                self.out.push_str("for ");
                self.expr(target, Prec::Tuple);
                self.out.push_str(" in ");
                self.expr(iter, Prec::Tuple);
                self.block(body);
                self.else_block("else", orelse);
            }
            Stmt::While { test, body, orelse } => {
                self.line();
                self.out.push_str("while ");
                self.expr(test, Prec::Test);
                self.block(body);
                self.else_block("else", orelse);
            }
            Stmt::With { items, body, is_async } => {
                self.line();
                if *is_async {
                    self.out.push_str("async ");
                }
                self.out.push_str("with ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.with_item(item);
                }
                self.block(body);
            }
            Stmt::Match { subject, cases } => {
                self.line();
                self.out.push_str("match ");
                self.expr(subject, Prec::Tuple);
                self.out.push_str(":\n");
                self.indent += 1;
                for case in cases {
                    self.match_case(case);
                }
                self.indent -= 1;
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                is_star,
            } => {
                self.line();
                self.out.push_str("try");
                self.block(body);
                for handler in handlers {
                    self.except_handler(handler, *is_star);
                }
                self.else_block("else", orelse);
                self.else_block("finally", finalbody);
            }
            _ => {
                self.line();
                self.simple_stmt(stmt);
                self.out.push('\n');
            }
        }
    }

    fn if_chain(&mut self, test: &ExprLoc, body: &[StmtLoc], orelse: &[StmtLoc]) {
        self.expr(test, Prec::Test);
        self.block(body);
        if let [
            StmtLoc {
                stmt: Stmt::If { test, body, orelse },
                ..
            },
        ] = orelse
        {
            self.line();
            self.out.push_str("elif ");
            self.if_chain(test, body, orelse);
        } else {
            self.else_block("else", orelse);
        }
    }

    fn simple_stmt(&mut self, stmt: &StmtLoc) {
        match &stmt.stmt {
            Stmt::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value, Prec::Tuple);
                }
            }
            Stmt::Delete(targets) => {
                self.out.push_str("del ");
                self.comma_separated(targets, Prec::Test);
            }
            Stmt::Assign { targets, value } => {
                for target in targets {
                    self.expr(target, Prec::Tuple);
                    self.out.push_str(" = ");
                }
                self.assigned_value(value);
            }
            Stmt::TypeAlias {
                name,
                type_params,
                value,
            } => {
                self.out.push_str("type ");
                self.expr(name, Prec::Atom);
                self.type_params(type_params);
                self.out.push_str(" = ");
                self.expr(value, Prec::Test);
            }
            Stmt::AugAssign { target, op, value } => {
                self.expr(target, Prec::Atom);
                let _ = write!(self.out, " {}= ", op.symbol());
                self.assigned_value(value);
            }
            Stmt::AnnAssign {
                target,
                annotation,
                value,
                simple,
            } => {
                let parenthesize = !simple && matches!(target.expr, Expr::Name { .. });
                if parenthesize {
                    self.out.push('(');
                }
                self.expr(target, Prec::Atom);
                if parenthesize {
                    self.out.push(')');
                }
                self.out.push_str(": ");
                self.expr(annotation, Prec::Test);
                if let Some(value) = value {
                    self.out.push_str(" = ");
                    self.assigned_value(value);
                }
            }
            Stmt::Raise { exc, cause } => {
                self.out.push_str("raise");
                if let Some(exc) = exc {
                    self.out.push(' ');
                    self.expr(exc, Prec::Test);
                }
                if let Some(cause) = cause {
                    self.out.push_str(" from ");
                    self.expr(cause, Prec::Test);
                }
            }
            Stmt::Assert { test, msg } => {
                self.out.push_str("assert ");
                self.expr(test, Prec::Test);
                if let Some(msg) = msg {
                    self.out.push_str(", ");
                    self.expr(msg, Prec::Test);
                }
            }
            Stmt::Import(names) => {
                self.out.push_str("import ");
                self.aliases(names);
            }
            Stmt::ImportFrom { module, names, level } => {
                self.out.push_str("from ");
                for _ in 0..*level {
                    self.out.push('.');
                }
                if let Some(module) = module {
                    self.out.push_str(self.name(*module));
                }
                self.out.push_str(" import ");
                self.aliases(names);
            }
            Stmt::Global(names) | Stmt::Nonlocal(names) => {
                let keyword = if matches!(stmt.stmt, Stmt::Global(_)) { "global " } else { "nonlocal " };
                self.out.push_str(keyword);
                let names: Vec<&str> = names.iter().map(|n| self.name(*n)).collect();
                self.out.push_str(&names.join(", "));
            }
            Stmt::Expr(value) => self.assigned_value(value),
            Stmt::Pass => self.out.push_str("pass"),
            Stmt::Break => self.out.push_str("break"),
            Stmt::Continue => self.out.push_str("continue"),
            Stmt::FunctionDef(_)
            | Stmt::ClassDef(_)
            | Stmt::If { .. }
            | Stmt::For { .. }
            | Stmt::While { .. }
            | Stmt::With { .. }
            | Stmt::Match { .. }
            | Stmt::Try { .. } => {}
        }
    }

    /// Writes an expression statement or the value of an assignment, the only places a
    /// `yield` may appear without parentheses.
    fn assigned_value(&mut self, value: &ExprLoc) {
        let prec = if matches!(value.expr, Expr::Yield(_) | Expr::YieldFrom(_)) {
            Prec::Yield
        } else {
            Prec::Tuple
        };
        self.expr(value, prec);
    }

    fn aliases(&mut self, names: &[Alias]) {
        for (i, alias) in names.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(self.name(alias.name));
            if let Some(asname) = alias.asname {
                let _ = write!(self.out, " as {}", self.name(asname));
            }
        }
    }

    fn with_item(&mut self, item: &WithItem) {
        self.expr(&item.context_expr, Prec::Test);
        if let Some(vars) = &item.optional_vars {
            self.out.push_str(" as ");
            self.expr(vars, Prec::Test);
        }
    }

    fn except_handler(&mut self, handler: &ExceptHandler, is_star: bool) {
        self.line();
        self.out.push_str(if is_star { "except*" } else { "except" });
        if let Some(type_) = &handler.type_ {
            self.out.push(' ');
            self.expr(type_, Prec::Test);
        }
        if let Some(name) = handler.name {
            let _ = write!(self.out, " as {}", self.name(name));
        }
        self.block(&handler.body);
    }

    fn match_case(&mut self, case: &MatchCase) {
        self.line();
        self.out.push_str("case ");
        self.pattern(&case.pattern, false);
        if let Some(guard) = &case.guard {
            self.out.push_str(" if ");
            self.expr(guard, Prec::Test);
        }
        self.block(&case.body);
    }

    fn type_params(&mut self, params: &[TypeParam]) {
        if params.is_empty() {
            return;
        }
        self.out.push('[');
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            let name = self.name(param.name);
            match &param.kind {
                TypeParamKind::TypeVar { bound } => {
                    self.out.push_str(name);
                    if let Some(bound) = bound {
                        self.out.push_str(": ");
                        self.expr(bound, Prec::Test);
                    }
                }
                TypeParamKind::TypeVarTuple => {
                    let _ = write!(self.out, "*{name}");
                }
                TypeParamKind::ParamSpec => {
                    let _ = write!(self.out, "**{name}");
                }
            }
        }
        self.out.push(']');
    }

    fn arguments(&mut self, args: &Arguments) {
        let mut first = true;
        let mut sep = |out: &mut String| {
            if !first {
                out.push_str(", ");
            }
            first = false;
        };

        let positional = args.posonlyargs.len() + args.args.len();
        let defaults_start = positional.saturating_sub(args.defaults.len());
        for (i, arg) in args.posonlyargs.iter().chain(args.args.iter()).enumerate() {
            sep(&mut self.out);
            self.arg(arg);
            if let Some(default) = i.checked_sub(defaults_start).and_then(|d| args.defaults.get(d)) {
                self.out.push_str(if arg.annotation.is_some() { " = " } else { "=" });
                self.expr(default, Prec::Test);
            }
            if i + 1 == args.posonlyargs.len() {
                sep(&mut self.out);
                self.out.push('/');
            }
        }

        if let Some(vararg) = &args.vararg {
            sep(&mut self.out);
            self.out.push('*');
            self.arg(vararg);
        } else if !args.kwonlyargs.is_empty() {
            sep(&mut self.out);
            self.out.push('*');
        }
        for (arg, default) in args.kwonlyargs.iter().zip(&args.kw_defaults) {
            sep(&mut self.out);
            self.arg(arg);
            if let Some(default) = default {
                self.out.push_str(if arg.annotation.is_some() { " = " } else { "=" });
                self.expr(default, Prec::Test);
            }
        }
        if let Some(kwarg) = &args.kwarg {
            sep(&mut self.out);
            self.out.push_str("**");
            self.arg(kwarg);
        }
    }

    fn arg(&mut self, arg: &Arg) {
        self.out.push_str(self.name(arg.arg));
        if let Some(annotation) = &arg.annotation {
            self.out.push_str(": ");
            self.expr(annotation, Prec::Test);
        }
    }

    fn keyword(&mut self, keyword: &Keyword) {
        match keyword.arg {
            Some(arg) => {
                let _ = write!(self.out, "{}=", self.name(arg));
                self.expr(&keyword.value, Prec::Test);
            }
            None => {
                self.out.push_str("**");
                self.expr(&keyword.value, Prec::BitOr);
            }
        }
    }

    fn open(&mut self, own: Prec, context: Prec) -> bool {
        let wrap = own < context;
        if wrap {
            self.out.push('(');
        }
        wrap
    }

    fn close(&mut self, wrapped: bool) {
        if wrapped {
            self.out.push(')');
        }
    }

    fn expr(&mut self, expr: &ExprLoc, prec: Prec) {
        match &expr.expr {
            Expr::BoolOp { op, values } => {
                let own = if *op == BoolOp::And { Prec::And } else { Prec::Or };
                let wrapped = self.open(own, prec);
                let keyword: &'static str = (*op).into();
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(self.out, " {keyword} ");
                    }
                    self.expr(value, own.next());
                }
                self.close(wrapped);
            }
            Expr::NamedExpr { target, value } => {
                let wrapped = self.open(Prec::NamedExpr, prec);
                self.expr(target, Prec::Atom);
                self.out.push_str(" := ");
                self.expr(value, Prec::Test);
                self.close(wrapped);
            }
            Expr::BinOp { left, op, right } => {
                let own = Prec::of_operator(*op);
                let (left_prec, right_prec) = if *op == Operator::Pow {
                    (own.next(), own)
                } else {
                    (own, own.next())
                };
                let wrapped = self.open(own, prec);
                self.expr(left, left_prec);
                let _ = write!(self.out, " {} ", op.symbol());
                self.expr(right, right_prec);
                self.close(wrapped);
            }
            Expr::UnaryOp { op, operand } => {
                let own = if *op == UnaryOp::Not { Prec::Not } else { Prec::Factor };
                let wrapped = self.open(own, prec);
                let symbol: &'static str = (*op).into();
                self.out.push_str(symbol);
                self.expr(operand, own);
                self.close(wrapped);
            }
            Expr::Lambda { args, body } => {
                let wrapped = self.open(Prec::Test, prec);
                self.out.push_str("lambda");
                if !args.is_empty() {
                    self.out.push(' ');
                    self.arguments(args);
                }
                self.out.push_str(": ");
                self.expr(body, Prec::Test);
                self.close(wrapped);
            }
            Expr::IfExp { test, body, orelse } => {
                let wrapped = self.open(Prec::Test, prec);
                self.expr(body, Prec::Or);
                self.out.push_str(" if ");
                self.expr(test, Prec::Or);
                self.out.push_str(" else ");
                self.expr(orelse, Prec::Test);
                self.close(wrapped);
            }
            Expr::Dict { keys, values } => {
                self.out.push('{');
                for (i, (key, value)) in keys.iter().zip(values).enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    match key {
                        Some(key) => {
                            self.expr(key, Prec::Test);
                            self.out.push_str(": ");
                            self.expr(value, Prec::Test);
                        }
                        None => {
                            self.out.push_str("**");
                            self.expr(value, Prec::BitOr);
                        }
                    }
                }
                self.out.push('}');
            }
            Expr::Set(elts) => {
                self.out.push('{');
                self.comma_separated(elts, Prec::Test);
                self.out.push('}');
            }
            Expr::ListComp { elt, generators } => {
                self.out.push('[');
                self.expr(elt, Prec::Test);
                self.generators(generators);
                self.out.push(']');
            }
            Expr::SetComp { elt, generators } => {
                self.out.push('{');
                self.expr(elt, Prec::Test);
                self.generators(generators);
                self.out.push('}');
            }
            Expr::GeneratorExp { elt, generators } => {
                self.out.push('(');
                self.expr(elt, Prec::Test);
                self.generators(generators);
                self.out.push(')');
            }
            Expr::DictComp { key, value, generators } => {
                self.out.push('{');
                self.expr(key, Prec::Test);
                self.out.push_str(": ");
                self.expr(value, Prec::Test);
                self.generators(generators);
                self.out.push('}');
            }
            Expr::Await(value) => {
                let wrapped = self.open(Prec::Await, prec);
                self.out.push_str("await ");
                self.expr(value, Prec::Atom);
                self.close(wrapped);
            }
            Expr::Yield(value) => {
                let wrapped = self.open(Prec::Yield, prec);
                self.out.push_str("yield");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value, Prec::Tuple);
                }
                self.close(wrapped);
            }
            Expr::YieldFrom(value) => {
                let wrapped = self.open(Prec::Yield, prec);
                self.out.push_str("yield from ");
                self.expr(value, Prec::Test);
                self.close(wrapped);
            }
            Expr::Compare { left, ops, comparators } => {
                let wrapped = self.open(Prec::Cmp, prec);
                self.expr(left, Prec::Cmp.next());
                for (op, comparator) in ops.iter().zip(comparators) {
                    let symbol: &'static str = (*op).into();
                    let _ = write!(self.out, " {symbol} ");
                    self.expr(comparator, Prec::Cmp.next());
                }
                self.close(wrapped);
            }
            Expr::Call { func, args, keywords } => {
                self.expr(func, Prec::Atom);
                self.out.push('(');
                self.comma_separated(args, Prec::Test);
                for (i, keyword) in keywords.iter().enumerate() {
                    if i > 0 || !args.is_empty() {
                        self.out.push_str(", ");
                    }
                    self.keyword(keyword);
                }
                self.out.push(')');
            }
            Expr::FormattedValue { .. } => self.fstring(std::slice::from_ref(expr)),
            Expr::JoinedStr(values) => self.fstring(values),
            Expr::Constant(literal) => self.literal(*literal),
            Expr::Attribute { value, attr, .. } => {
                self.expr(value, Prec::Atom);
                if matches!(value.expr, Expr::Constant(Literal::Int(_) | Literal::LongInt(_))) {
                    self.out.push(' ');
                }
                let _ = write!(self.out, ".{}", self.name(*attr));
            }
            Expr::Subscript { value, slice, .. } => {
                self.expr(value, Prec::Atom);
                self.out.push('[');
                match &slice.expr {
                    Expr::Tuple { elts, .. } if !elts.is_empty() => {
                        self.comma_separated(elts, Prec::Test);
                        if elts.len() == 1 {
                            self.out.push(',');
                        }
                    }
                    _ => self.expr(slice, Prec::Tuple),
                }
                self.out.push(']');
            }
            Expr::Starred { value, .. } => {
                self.out.push('*');
                self.expr(value, Prec::BitOr);
            }
            Expr::Name { id, .. } => self.out.push_str(self.name(*id)),
            Expr::List { elts, .. } => {
                self.out.push('[');
                self.comma_separated(elts, Prec::Test);
                self.out.push(']');
            }
            Expr::Tuple { elts, .. } => {
                let wrapped = elts.is_empty() || Prec::Tuple < prec;
                if wrapped {
                    self.out.push('(');
                }
                self.comma_separated(elts, Prec::Test);
                if elts.len() == 1 {
                    self.out.push(',');
                }
                self.close(wrapped);
            }
            Expr::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    self.expr(lower, Prec::Test);
                }
                self.out.push(':');
                if let Some(upper) = upper {
                    self.expr(upper, Prec::Test);
                }
                if let Some(step) = step {
                    self.out.push(':');
                    self.expr(step, Prec::Test);
                }
            }
        }
    }

    fn generators(&mut self, generators: &[Comprehension]) {
        for generator in generators {
            self.out.push_str(if generator.is_async { " async for " } else { " for " });
            self.expr(&generator.target, Prec::Tuple);
            self.out.push_str(" in ");
            self.expr(&generator.iter, Prec::Or);
            for test in &generator.ifs {
                self.out.push_str(" if ");
                self.expr(test, Prec::Or);
            }
        }
    }

    fn literal(&mut self, literal: Literal) {
        match literal {
            Literal::None => self.out.push_str("None"),
            Literal::Ellipsis => self.out.push_str("..."),
            Literal::Bool(true) => self.out.push_str("True"),
            Literal::Bool(false) => self.out.push_str("False"),
            Literal::Int(value) => {
                let _ = write!(self.out, "{value}");
            }
            Literal::LongInt(id) => {
                let _ = write!(self.out, "{}", self.interner.get_long_int(id));
            }
            // An overflowing literal is the only source spelling of infinity.
            Literal::Float(value) if value.is_infinite() => self.out.push_str("1e309"),
            Literal::Float(value) => self.out.push_str(&repr_float(value)),
            Literal::Complex { imag, .. } if imag.is_infinite() => self.out.push_str("1e309j"),
            Literal::Complex { real, imag } if real == 0.0 => self.out.push_str(&repr_imag(imag)),
            Literal::Complex { real, imag } => {
                let _ = write!(self.out, "({} + {})", repr_float(real), repr_imag(imag));
            }
            Literal::Str(id) => self.out.push_str(&repr_str(self.name(id))),
            Literal::CodePoints(id) => self.out.push_str(&repr_code_points(self.interner.get_code_points(id))),
            Literal::Bytes(id) => self.out.push_str(&repr_bytes(self.interner.get_bytes(id))),
        }
    }

    /// Writes an f-string, picking the first quote style that no replacement field uses.
    fn fstring(&mut self, values: &[ExprLoc]) {
        let mut fields = Vec::new();
        self.collect_fields(values, &mut fields);
        let quote = ["'", "\"", "'''", "\"\"\""]
            .into_iter()
            .find(|q| fields.iter().all(|field: &String| !field.contains(*q)))
            .unwrap_or("'");

        let mut body = String::new();
        let mut fields = fields.into_iter();
        self.fstring_body(values, quote, &mut fields, &mut body);
        let _ = write!(self.out, "f{quote}{body}{quote}");
    }

    /// Unparses every replacement-field expression up front, in source order.
    fn collect_fields(&self, values: &[ExprLoc], fields: &mut Vec<String>) {
        for value in values {
            match &value.expr {
                Expr::FormattedValue { value, format_spec, .. } => {
                    let mut inner = Unparser::new(self.interner);
                    inner.expr(value, Prec::Or);
                    fields.push(inner.out);
                    if let Some(spec) = format_spec
                        && let Expr::JoinedStr(parts) = &spec.expr
                    {
                        self.collect_fields(parts, fields);
                    }
                }
                Expr::JoinedStr(parts) => self.collect_fields(parts, fields),
                _ => {}
            }
        }
    }

    fn fstring_body(
        &self,
        values: &[ExprLoc],
        quote: &str,
        fields: &mut impl Iterator<Item = String>,
        body: &mut String,
    ) {
        for value in values {
            match &value.expr {
                Expr::Constant(Literal::Str(id)) => {
                    escape_fstring_text(self.name(*id).chars().map(u32::from), quote, body);
                }
                Expr::Constant(Literal::CodePoints(id)) => {
                    let points = self.interner.get_code_points(*id).iter().copied();
                    escape_fstring_text(points, quote, body);
                }
                Expr::FormattedValue {
                    conversion,
                    format_spec,
                    ..
                } => {
                    let field = fields.next().unwrap_or_default();
                    body.push('{');
                    if field.starts_with('{') {
                        body.push(' ');
                    }
                    body.push_str(&field);
                    if let Some(c) = conversion.as_char() {
                        body.push('!');
                        body.push(c);
                    }
                    if let Some(spec) = format_spec {
                        body.push(':');
                        if let Expr::JoinedStr(parts) = &spec.expr {
                            self.fstring_body(parts, quote, fields, body);
                        }
                    }
                    body.push('}');
                }
                Expr::JoinedStr(parts) => self.fstring_body(parts, quote, fields, body),
                _ => {}
            }
        }
    }

    fn pattern(&mut self, pattern: &PatternLoc, in_alternative: bool) {
        match &pattern.pattern {
            Pattern::MatchValue(value) => self.expr(value, Prec::BitOr),
            Pattern::MatchSingleton(literal) => self.literal(*literal),
            Pattern::MatchSequence(patterns) => {
                self.out.push('[');
                for (i, p) in patterns.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.pattern(p, false);
                }
                self.out.push(']');
            }
            Pattern::MatchMapping { keys, patterns, rest } => {
                self.out.push('{');
                for (i, (key, p)) in keys.iter().zip(patterns).enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(key, Prec::BitOr);
                    self.out.push_str(": ");
                    self.pattern(p, false);
                }
                if let Some(rest) = rest {
                    if !keys.is_empty() {
                        self.out.push_str(", ");
                    }
                    let _ = write!(self.out, "**{}", self.name(*rest));
                }
                self.out.push('}');
            }
            Pattern::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => {
                self.expr(cls, Prec::Atom);
                self.out.push('(');
                for (i, p) in patterns.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.pattern(p, false);
                }
                for (i, (attr, p)) in kwd_attrs.iter().zip(kwd_patterns).enumerate() {
                    if i > 0 || !patterns.is_empty() {
                        self.out.push_str(", ");
                    }
                    let _ = write!(self.out, "{}=", self.name(*attr));
                    self.pattern(p, false);
                }
                self.out.push(')');
            }
            Pattern::MatchStar(name) => {
                let name = name.map_or("_", |n| self.name(n));
                let _ = write!(self.out, "*{name}");
            }
            Pattern::MatchAs { pattern: None, name } => {
                let name = name.map_or("_", |n| self.name(n));
                self.out.push_str(name);
            }
            Pattern::MatchAs {
                pattern: Some(inner),
                name,
            } => {
                if in_alternative {
                    self.out.push('(');
                }
                self.pattern(inner, true);
                let name = name.map_or("_", |n| self.name(n));
                let _ = write!(self.out, " as {name}");
                if in_alternative {
                    self.out.push(')');
                }
            }
            Pattern::MatchOr(patterns) => {
                if in_alternative {
                    self.out.push('(');
                }
                for (i, p) in patterns.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(" | ");
                    }
                    self.pattern(p, true);
                }
                if in_alternative {
                    self.out.push(')');
                }
            }
        }
    }
}

/// Appends literal f-string text: braces doubled, the closing quote, control characters
/// and lone surrogates escaped.
fn escape_fstring_text(text: impl Iterator<Item = u32>, quote: &str, body: &mut String) {
    let quote_char = quote.chars().next().unwrap_or('\'');
    for point in text {
        let Some(c) = char::from_u32(point) else {
            let _ = write!(body, "\\u{point:04x}");
            continue;
        };
        match c {
            '{' => body.push_str("{{"),
            '}' => body.push_str("}}"),
            '\\' => body.push_str("\\\\"),
            '\n' => body.push_str("\\n"),
            '\r' => body.push_str("\\r"),
            '\t' => body.push_str("\\t"),
            c if c == quote_char => {
                body.push('\\');
                body.push(c);
            }
            c if u32::from(c) < 0x20 || c == '\x7f' => {
                let _ = write!(body, "\\x{:02x}", u32::from(c));
            }
            c => body.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_order() {
        assert!(Prec::Yield < Prec::Tuple);
        assert!(Prec::Tuple < Prec::Test);
        assert!(Prec::Or < Prec::And);
        assert!(Prec::Arith < Prec::Term);
        assert_eq!(Prec::Power.next(), Prec::Await);
        assert_eq!(Prec::Atom.next(), Prec::Atom);
    }

    #[test]
    fn fstring_text_escaping() {
        let mut body = String::new();
        escape_fstring_text("{a}\n'".chars().map(u32::from), "'", &mut body);
        assert_eq!(body, "{{a}}\\n\\'");
        body.clear();
        escape_fstring_text([0x78, 0xd800].into_iter(), "'", &mut body);
        assert_eq!(body, "x\\ud800");
    }
}

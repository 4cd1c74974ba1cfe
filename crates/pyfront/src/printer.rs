//! Deterministic, indented tree dump for golden-file tests and debugging.
//!
//! Each node prints on its own line as `Kind attr=value ... @range`. Child nodes follow
//! one level deeper, prefixed by their field name; list fields print the field name on
//! a line of its own with the elements below it. Absent optional children and empty
//! lists are omitted.
//!
//! ```text
//! Module
//!   body:
//!     Assign @1:0-1:5
//!       targets:
//!         Name id='x' ctx=Store @1:0-1:1
//!       value: Constant value=1 @1:4-1:5
//! ```

use std::fmt::{self, Write};

use crate::{
    diagnostic::SourceRange,
    expressions::{
        Alias, Arg, Arguments, Comprehension, ExceptHandler, Expr, ExprLoc, Keyword, Literal,
        MatchCase, Mod, Stmt, StmtLoc, TypeParam, TypeParamKind, WithItem,
    },
    intern::{InternerBuilder, StringId},
    patterns::{Pattern, PatternLoc},
};

/// Renders `module` as an indented tree; `with_ranges` appends `@start-end` to every
/// located node.
#[must_use]
pub fn dump_tree(module: &Mod, interner: &InternerBuilder, with_ranges: bool) -> String {
    let printer = Printer { interner, with_ranges };
    let root = match module {
        Mod::Module(body) => Node::new("Module", None).list("body", body.iter().map(|s| printer.stmt(s))),
        Mod::Interactive(body) => Node::new("Interactive", None).list("body", body.iter().map(|s| printer.stmt(s))),
        Mod::Expression(body) => Node::new("Expression", None).child("body", printer.expr(body)),
        Mod::FunctionType { argtypes, returns } => Node::new("FunctionType", None)
            .list("argtypes", argtypes.iter().map(|e| printer.expr(e)))
            .child("returns", printer.expr(returns)),
    };
    let mut out = String::new();
    root.render(None, 0, &mut out);
    out
}

/// Python `repr()` of a string: single quotes unless the text holds a `'` and no `"`.
#[must_use]
pub fn repr_str(value: &str) -> String {
    repr_code_point_iter(value.chars().map(u32::from))
}

/// Python `repr()` of a string given as code points; lone surrogates print as `\udXXX`.
#[must_use]
pub fn repr_code_points(points: &[u32]) -> String {
    repr_code_point_iter(points.iter().copied())
}

fn repr_code_point_iter(points: impl Iterator<Item = u32> + Clone) -> String {
    let holds = |c: char| points.clone().any(|p| p == u32::from(c));
    let quote = if holds('\'') && !holds('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(points.size_hint().0 + 2);
    out.push(quote);
    for point in points {
        let Some(c) = char::from_u32(point) else {
            let _ = write!(out, "\\u{point:04x}");
            continue;
        };
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if u32::from(c) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python `repr()` of a bytes value.
#[must_use]
pub fn repr_bytes(value: &[u8]) -> String {
    let quote = if value.contains(&b'\'') && !value.contains(&b'"') { b'"' } else { b'\'' };
    let mut out = String::with_capacity(value.len() + 3);
    out.push('b');
    out.push(char::from(quote));
    for &b in value {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(char::from(b));
            }
            0x20..0x7f => out.push(char::from(b)),
            b => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push(char::from(quote));
    out
}

/// Python `repr()` of a float: shortest round-trip digits, exponent form outside
/// `1e-4 <= |x| < 1e16`.
#[must_use]
pub fn repr_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let debug = format!("{value:?}");
    match debug.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent:0>2}"),
        Some((mantissa, exponent)) => format!("{mantissa}e-{:0>2}", &exponent[1..]),
        None => debug,
    }
}

/// Python `repr()` of an imaginary part: a float repr without a trailing `.0`, then `j`.
#[must_use]
pub fn repr_imag(value: f64) -> String {
    let repr = repr_float(value);
    let repr = repr.strip_suffix(".0").unwrap_or(&repr);
    format!("{repr}j")
}

pub(crate) fn repr_literal(literal: Literal, interner: &InternerBuilder) -> String {
    match literal {
        Literal::None => "None".to_owned(),
        Literal::Ellipsis => "Ellipsis".to_owned(),
        Literal::Bool(true) => "True".to_owned(),
        Literal::Bool(false) => "False".to_owned(),
        Literal::Int(value) => value.to_string(),
        Literal::LongInt(id) => interner.get_long_int(id).to_string(),
        Literal::Float(value) => repr_float(value),
        Literal::Complex { real, imag } if real == 0.0 => repr_imag(imag),
        Literal::Complex { real, imag } => format!("({}+{})", repr_float(real), repr_imag(imag)),
        Literal::Str(id) => repr_str(interner.get_str(id)),
        Literal::CodePoints(id) => repr_code_points(interner.get_code_points(id)),
        Literal::Bytes(id) => repr_bytes(interner.get_bytes(id)),
    }
}

struct Node {
    kind: &'static str,
    range: Option<SourceRange>,
    attrs: Vec<(&'static str, String)>,
    children: Vec<(&'static str, Child)>,
}

enum Child {
    One(Node),
    Many(Vec<Node>),
}

impl Node {
    fn new(kind: &'static str, range: Option<SourceRange>) -> Self {
        Self {
            kind,
            range,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn attr(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.attrs.push((name, value.to_string()));
        self
    }

    fn child(mut self, name: &'static str, node: Node) -> Self {
        self.children.push((name, Child::One(node)));
        self
    }

    fn opt(self, name: &'static str, node: Option<Node>) -> Self {
        match node {
            Some(node) => self.child(name, node),
            None => self,
        }
    }

    fn list(mut self, name: &'static str, nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes: Vec<Node> = nodes.into_iter().collect();
        if !nodes.is_empty() {
            self.children.push((name, Child::Many(nodes)));
        }
        self
    }

    fn render(&self, field: Option<&str>, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        out.push_str(&indent);
        if let Some(field) = field {
            let _ = write!(out, "{field}: ");
        }
        out.push_str(self.kind);
        for (name, value) in &self.attrs {
            let _ = write!(out, " {name}={value}");
        }
        if let Some(range) = self.range {
            let _ = write!(out, " @{range}");
        }
        out.push('\n');
        for (name, child) in &self.children {
            match child {
                Child::One(node) => node.render(Some(name), depth + 1, out),
                Child::Many(nodes) => {
                    let _ = writeln!(out, "{indent}  {name}:");
                    for node in nodes {
                        node.render(None, depth + 2, out);
                    }
                }
            }
        }
    }
}

struct Printer<'a> {
    interner: &'a InternerBuilder,
    with_ranges: bool,
}

impl Printer<'_> {
    fn node(&self, kind: &'static str, range: SourceRange) -> Node {
        Node::new(kind, self.with_ranges.then_some(range))
    }

    fn name(&self, id: StringId) -> String {
        repr_str(self.interner.get_str(id))
    }

    fn body(&self, node: Node, field: &'static str, body: &[StmtLoc]) -> Node {
        node.list(field, body.iter().map(|s| self.stmt(s)))
    }

    fn exprs<'e>(&self, exprs: impl IntoIterator<Item = &'e ExprLoc>) -> Vec<Node> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn opt_expr(&self, expr: Option<&ExprLoc>) -> Option<Node> {
        expr.map(|e| self.expr(e))
    }

    fn stmt(&self, stmt: &StmtLoc) -> Node {
        let range = stmt.position;
        match &stmt.stmt {
            Stmt::FunctionDef(def) => {
                let kind = if def.is_async { "AsyncFunctionDef" } else { "FunctionDef" };
                let node = self
                    .node(kind, range)
                    .attr("name", self.name(def.name))
                    .list("type_params", def.type_params.iter().map(|p| self.type_param(p)))
                    .child("args", self.arguments(&def.args));
                self.body(node, "body", &def.body)
                    .list("decorator_list", self.exprs(&def.decorator_list))
                    .opt("returns", self.opt_expr(def.returns.as_ref()))
            }
            Stmt::ClassDef(def) => {
                let node = self
                    .node("ClassDef", range)
                    .attr("name", self.name(def.name))
                    .list("type_params", def.type_params.iter().map(|p| self.type_param(p)))
                    .list("bases", self.exprs(&def.bases))
                    .list("keywords", def.keywords.iter().map(|k| self.keyword(k)));
                self.body(node, "body", &def.body)
                    .list("decorator_list", self.exprs(&def.decorator_list))
            }
            Stmt::Return(value) => self.node("Return", range).opt("value", self.opt_expr(value.as_ref())),
            Stmt::Delete(targets) => self.node("Delete", range).list("targets", self.exprs(targets)),
            Stmt::Assign { targets, value } => self
                .node("Assign", range)
                .list("targets", self.exprs(targets))
                .child("value", self.expr(value)),
            Stmt::TypeAlias {
                name,
                type_params,
                value,
            } => self
                .node("TypeAlias", range)
                .child("name", self.expr(name))
                .list("type_params", type_params.iter().map(|p| self.type_param(p)))
                .child("value", self.expr(value)),
            Stmt::AugAssign { target, op, value } => self
                .node("AugAssign", range)
                .attr("op", format!("{op:?}"))
                .child("target", self.expr(target))
                .child("value", self.expr(value)),
            Stmt::AnnAssign {
                target,
                annotation,
                value,
                simple,
            } => self
                .node("AnnAssign", range)
                .attr("simple", u8::from(*simple))
                .child("target", self.expr(target))
                .child("annotation", self.expr(annotation))
                .opt("value", self.opt_expr(value.as_ref())),
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                is_async,
            } => {
                let node = self
                    .node(if *is_async { "AsyncFor" } else { "For" }, range)
                    .child("target", self.expr(target))
                    .child("iter", self.expr(iter));
                let node = self.body(node, "body", body);
                self.body(node, "orelse", orelse)
            }
            Stmt::While { test, body, orelse } => {
                let node = self.node("While", range).child("test", self.expr(test));
                let node = self.body(node, "body", body);
                self.body(node, "orelse", orelse)
            }
            Stmt::If { test, body, orelse } => {
                let node = self.node("If", range).child("test", self.expr(test));
                let node = self.body(node, "body", body);
                self.body(node, "orelse", orelse)
            }
            Stmt::With { items, body, is_async } => {
                let node = self
                    .node(if *is_async { "AsyncWith" } else { "With" }, range)
                    .list("items", items.iter().map(|i| self.with_item(i)));
                self.body(node, "body", body)
            }
            Stmt::Match { subject, cases } => self
                .node("Match", range)
                .child("subject", self.expr(subject))
                .list("cases", cases.iter().map(|c| self.match_case(c))),
            Stmt::Raise { exc, cause } => self
                .node("Raise", range)
                .opt("exc", self.opt_expr(exc.as_ref()))
                .opt("cause", self.opt_expr(cause.as_ref())),
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                is_star,
            } => {
                let node = self.node(if *is_star { "TryStar" } else { "Try" }, range);
                let node = self
                    .body(node, "body", body)
                    .list("handlers", handlers.iter().map(|h| self.except_handler(h)));
                let node = self.body(node, "orelse", orelse);
                self.body(node, "finalbody", finalbody)
            }
            Stmt::Assert { test, msg } => self
                .node("Assert", range)
                .child("test", self.expr(test))
                .opt("msg", self.opt_expr(msg.as_ref())),
            Stmt::Import(names) => self
                .node("Import", range)
                .list("names", names.iter().map(|a| self.alias(a))),
            Stmt::ImportFrom { module, names, level } => {
                let mut node = self.node("ImportFrom", range);
                if let Some(module) = module {
                    node = node.attr("module", self.name(*module));
                }
                node.attr("level", level)
                    .list("names", names.iter().map(|a| self.alias(a)))
            }
            Stmt::Global(names) | Stmt::Nonlocal(names) => {
                let kind = if matches!(stmt.stmt, Stmt::Global(_)) { "Global" } else { "Nonlocal" };
                let names: Vec<String> = names.iter().map(|n| self.name(*n)).collect();
                self.node(kind, range).attr("names", format!("[{}]", names.join(", ")))
            }
            Stmt::Expr(value) => self.node("Expr", range).child("value", self.expr(value)),
            Stmt::Pass => self.node("Pass", range),
            Stmt::Break => self.node("Break", range),
            Stmt::Continue => self.node("Continue", range),
        }
    }

    fn expr(&self, expr: &ExprLoc) -> Node {
        let range = expr.position;
        match &expr.expr {
            Expr::BoolOp { op, values } => self
                .node("BoolOp", range)
                .attr("op", format!("{op:?}"))
                .list("values", self.exprs(values)),
            Expr::NamedExpr { target, value } => self
                .node("NamedExpr", range)
                .child("target", self.expr(target))
                .child("value", self.expr(value)),
            Expr::BinOp { left, op, right } => self
                .node("BinOp", range)
                .attr("op", format!("{op:?}"))
                .child("left", self.expr(left))
                .child("right", self.expr(right)),
            Expr::UnaryOp { op, operand } => self
                .node("UnaryOp", range)
                .attr("op", format!("{op:?}"))
                .child("operand", self.expr(operand)),
            Expr::Lambda { args, body } => self
                .node("Lambda", range)
                .child("args", self.arguments(args))
                .child("body", self.expr(body)),
            Expr::IfExp { test, body, orelse } => self
                .node("IfExp", range)
                .child("test", self.expr(test))
                .child("body", self.expr(body))
                .child("orelse", self.expr(orelse)),
            Expr::Dict { keys, values } => {
                let keys = keys.iter().map(|k| match k {
                    Some(key) => self.expr(key),
                    None => Node::new("None", None),
                });
                self.node("Dict", range)
                    .list("keys", keys)
                    .list("values", self.exprs(values))
            }
            Expr::Set(elts) => self.node("Set", range).list("elts", self.exprs(elts)),
            Expr::ListComp { elt, generators } => self.comp("ListComp", range, elt, generators),
            Expr::SetComp { elt, generators } => self.comp("SetComp", range, elt, generators),
            Expr::GeneratorExp { elt, generators } => self.comp("GeneratorExp", range, elt, generators),
            Expr::DictComp { key, value, generators } => self
                .node("DictComp", range)
                .child("key", self.expr(key))
                .child("value", self.expr(value))
                .list("generators", generators.iter().map(|c| self.comprehension(c))),
            Expr::Await(value) => self.node("Await", range).child("value", self.expr(value)),
            Expr::Yield(value) => self.node("Yield", range).opt("value", value.as_deref().map(|v| self.expr(v))),
            Expr::YieldFrom(value) => self.node("YieldFrom", range).child("value", self.expr(value)),
            Expr::Compare { left, ops, comparators } => {
                let ops: Vec<String> = ops.iter().map(|op| format!("{op:?}")).collect();
                self.node("Compare", range)
                    .attr("ops", format!("[{}]", ops.join(", ")))
                    .child("left", self.expr(left))
                    .list("comparators", self.exprs(comparators))
            }
            Expr::Call { func, args, keywords } => self
                .node("Call", range)
                .child("func", self.expr(func))
                .list("args", self.exprs(args))
                .list("keywords", keywords.iter().map(|k| self.keyword(k))),
            Expr::FormattedValue {
                value,
                conversion,
                format_spec,
            } => {
                let conversion = conversion.as_char().map_or(-1, |c| i64::from(u32::from(c)));
                self.node("FormattedValue", range)
                    .attr("conversion", conversion)
                    .child("value", self.expr(value))
                    .opt("format_spec", format_spec.as_deref().map(|s| self.expr(s)))
            }
            Expr::JoinedStr(values) => self.node("JoinedStr", range).list("values", self.exprs(values)),
            Expr::Constant(literal) => self
                .node("Constant", range)
                .attr("value", repr_literal(*literal, self.interner)),
            Expr::Attribute { value, attr, ctx } => self
                .node("Attribute", range)
                .attr("attr", self.name(*attr))
                .attr("ctx", format!("{ctx:?}"))
                .child("value", self.expr(value)),
            Expr::Subscript { value, slice, ctx } => self
                .node("Subscript", range)
                .attr("ctx", format!("{ctx:?}"))
                .child("value", self.expr(value))
                .child("slice", self.expr(slice)),
            Expr::Starred { value, ctx } => self
                .node("Starred", range)
                .attr("ctx", format!("{ctx:?}"))
                .child("value", self.expr(value)),
            Expr::Name { id, ctx } => self
                .node("Name", range)
                .attr("id", self.name(*id))
                .attr("ctx", format!("{ctx:?}")),
            Expr::List { elts, ctx } => self
                .node("List", range)
                .attr("ctx", format!("{ctx:?}"))
                .list("elts", self.exprs(elts)),
            Expr::Tuple { elts, ctx } => self
                .node("Tuple", range)
                .attr("ctx", format!("{ctx:?}"))
                .list("elts", self.exprs(elts)),
            Expr::Slice { lower, upper, step } => self
                .node("Slice", range)
                .opt("lower", lower.as_deref().map(|e| self.expr(e)))
                .opt("upper", upper.as_deref().map(|e| self.expr(e)))
                .opt("step", step.as_deref().map(|e| self.expr(e))),
        }
    }

    fn comp(&self, kind: &'static str, range: SourceRange, elt: &ExprLoc, generators: &[Comprehension]) -> Node {
        self.node(kind, range)
            .child("elt", self.expr(elt))
            .list("generators", generators.iter().map(|c| self.comprehension(c)))
    }

    fn comprehension(&self, comprehension: &Comprehension) -> Node {
        self.node("comprehension", comprehension.position)
            .attr("is_async", u8::from(comprehension.is_async))
            .child("target", self.expr(&comprehension.target))
            .child("iter", self.expr(&comprehension.iter))
            .list("ifs", self.exprs(&comprehension.ifs))
    }

    fn arguments(&self, arguments: &Arguments) -> Node {
        let kw_defaults = arguments.kw_defaults.iter().map(|d| match d {
            Some(default) => self.expr(default),
            None => Node::new("None", None),
        });
        Node::new("arguments", None)
            .list("posonlyargs", arguments.posonlyargs.iter().map(|a| self.arg(a)))
            .list("args", arguments.args.iter().map(|a| self.arg(a)))
            .opt("vararg", arguments.vararg.as_ref().map(|a| self.arg(a)))
            .list("kwonlyargs", arguments.kwonlyargs.iter().map(|a| self.arg(a)))
            .list("kw_defaults", kw_defaults)
            .opt("kwarg", arguments.kwarg.as_ref().map(|a| self.arg(a)))
            .list("defaults", self.exprs(&arguments.defaults))
    }

    fn arg(&self, arg: &Arg) -> Node {
        self.node("arg", arg.position)
            .attr("arg", self.name(arg.arg))
            .opt("annotation", arg.annotation.as_deref().map(|a| self.expr(a)))
    }

    fn keyword(&self, keyword: &Keyword) -> Node {
        let mut node = self.node("keyword", keyword.position);
        if let Some(arg) = keyword.arg {
            node = node.attr("arg", self.name(arg));
        }
        node.child("value", self.expr(&keyword.value))
    }

    fn alias(&self, alias: &Alias) -> Node {
        let mut node = self.node("alias", alias.position).attr("name", self.name(alias.name));
        if let Some(asname) = alias.asname {
            node = node.attr("asname", self.name(asname));
        }
        node
    }

    fn with_item(&self, item: &WithItem) -> Node {
        Node::new("withitem", None)
            .child("context_expr", self.expr(&item.context_expr))
            .opt("optional_vars", self.opt_expr(item.optional_vars.as_ref()))
    }

    fn except_handler(&self, handler: &ExceptHandler) -> Node {
        let mut node = self.node("ExceptHandler", handler.position);
        if let Some(name) = handler.name {
            node = node.attr("name", self.name(name));
        }
        let node = node.opt("type", self.opt_expr(handler.type_.as_ref()));
        self.body(node, "body", &handler.body)
    }

    fn match_case(&self, case: &MatchCase) -> Node {
        let node = Node::new("match_case", None)
            .child("pattern", self.pattern(&case.pattern))
            .opt("guard", self.opt_expr(case.guard.as_ref()));
        self.body(node, "body", &case.body)
    }

    fn type_param(&self, param: &TypeParam) -> Node {
        let (kind, bound) = match &param.kind {
            TypeParamKind::TypeVar { bound } => ("TypeVar", bound.as_deref()),
            TypeParamKind::ParamSpec => ("ParamSpec", None),
            TypeParamKind::TypeVarTuple => ("TypeVarTuple", None),
        };
        self.node(kind, param.position)
            .attr("name", self.name(param.name))
            .opt("bound", self.opt_expr(bound))
    }

    fn pattern(&self, pattern: &PatternLoc) -> Node {
        let range = pattern.position;
        match &pattern.pattern {
            Pattern::MatchValue(value) => self.node("MatchValue", range).child("value", self.expr(value)),
            Pattern::MatchSingleton(literal) => self
                .node("MatchSingleton", range)
                .attr("value", repr_literal(*literal, self.interner)),
            Pattern::MatchSequence(patterns) => self
                .node("MatchSequence", range)
                .list("patterns", patterns.iter().map(|p| self.pattern(p))),
            Pattern::MatchMapping { keys, patterns, rest } => {
                let mut node = self.node("MatchMapping", range);
                if let Some(rest) = rest {
                    node = node.attr("rest", self.name(*rest));
                }
                node.list("keys", self.exprs(keys))
                    .list("patterns", patterns.iter().map(|p| self.pattern(p)))
            }
            Pattern::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => {
                let mut node = self.node("MatchClass", range);
                if !kwd_attrs.is_empty() {
                    let attrs: Vec<String> = kwd_attrs.iter().map(|a| self.name(*a)).collect();
                    node = node.attr("kwd_attrs", format!("[{}]", attrs.join(", ")));
                }
                node.child("cls", self.expr(cls))
                    .list("patterns", patterns.iter().map(|p| self.pattern(p)))
                    .list("kwd_patterns", kwd_patterns.iter().map(|p| self.pattern(p)))
            }
            Pattern::MatchStar(name) => {
                let node = self.node("MatchStar", range);
                match name {
                    Some(name) => node.attr("name", self.name(*name)),
                    None => node,
                }
            }
            Pattern::MatchAs { pattern: inner, name } => {
                let mut node = self.node("MatchAs", range);
                if let Some(name) = name {
                    node = node.attr("name", self.name(*name));
                }
                node.opt("pattern", inner.as_deref().map(|p| self.pattern(p)))
            }
            Pattern::MatchOr(patterns) => self
                .node("MatchOr", range)
                .list("patterns", patterns.iter().map(|p| self.pattern(p))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_repr_picks_quotes() {
        assert_eq!(repr_str("abc"), "'abc'");
        assert_eq!(repr_str("it's"), "\"it's\"");
        assert_eq!(repr_str("'\""), "'\\'\"'");
        assert_eq!(repr_str("a\nb\\"), "'a\\nb\\\\'");
        assert_eq!(repr_str("\x01"), "'\\x01'");
    }

    #[test]
    fn code_point_repr_escapes_surrogates() {
        assert_eq!(repr_code_points(&[0x61, 0xd800, 0x27]), "\"a\\ud800'\"");
        assert_eq!(repr_code_points(&[0xdfff, 0xe9]), "'\\udfff\u{e9}'");
    }

    #[test]
    fn bytes_repr_escapes_non_printable() {
        assert_eq!(repr_bytes(b"ab\x00\xff"), "b'ab\\x00\\xff'");
        assert_eq!(repr_bytes(b"'"), "b\"'\"");
    }

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(repr_float(1.0), "1.0");
        assert_eq!(repr_float(0.1), "0.1");
        assert_eq!(repr_float(1e16), "1e+16");
        assert_eq!(repr_float(1.5e-7), "1.5e-07");
        assert_eq!(repr_float(f64::INFINITY), "inf");
        assert_eq!(repr_imag(2.0), "2j");
        assert_eq!(repr_imag(0.5), "0.5j");
    }
}

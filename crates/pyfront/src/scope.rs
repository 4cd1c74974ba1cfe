//! Scope analysis: classifies every name in a parsed module.
//!
//! Analysis runs in two phases. Collection walks the AST once, opening a [`Scope`] for
//! every module, function, class, lambda, comprehension and type-parameter list, and
//! records a [`SymbolRoles`] set per name. Resolution then walks the finished scope tree
//! top-down and commits one [`BindingKind`] per name.
//!
//! Because a name's binding depends on every declaration in its scope, no binding is
//! decided during collection: `x` used before a later `global x` still resolves to
//! [`BindingKind::GlobalExplicit`].

use std::fmt::Write;

use ahash::{AHashMap, AHashSet};
use bitflags::bitflags;
use indexmap::IndexMap;
use strum::IntoStaticStr;

use crate::{
    diagnostic::{Diagnostic, DiagnosticSink, ErrorKind, ErrorMessage, SourceRange},
    expressions::{
        Alias, Arguments, ClassDef, Comprehension, ExceptHandler, Expr, ExprContext, ExprLoc, FunctionDef, Mod,
        Stmt, StmtLoc, TypeParam,
    },
    intern::{InternerBuilder, StaticStrings, StringId},
    patterns::{Pattern, PatternLoc},
    tracer::{NoopTracer, ParseTracer},
    visitor::{self, Visitor},
};

/// Index of a scope inside its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, serde::Serialize, serde::Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum ScopeKind {
    Module,
    Function,
    Class,
    Lambda,
    Comprehension,
    /// PEP 695 type-parameter list, or the lazily evaluated value of a `type` alias.
    TypeParam,
}

impl ScopeKind {
    /// Function-like scopes own their locals and can enclose free variables.
    #[must_use]
    pub fn is_function_like(self) -> bool {
        !matches!(self, Self::Module | Self::Class)
    }
}

/// Final classification of a name within one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BindingKind {
    /// Bound in this scope and not captured by any nested scope.
    Local,
    /// Not bound anywhere visible; looked up in module globals then builtins at runtime.
    GlobalImplicit,
    /// Declared `global` in this scope.
    GlobalExplicit,
    /// Bound in an enclosing function scope and captured here.
    Free,
    /// Bound here and captured by a nested scope.
    Cell,
    /// A parameter of this scope that no nested scope captures.
    Parameter,
}

bitflags! {
    /// Syntactic roles a name plays within one scope.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SymbolRoles: u16 {
        const USE = 1 << 0;
        const DEF_LOCAL = 1 << 1;
        const DEF_PARAM = 1 << 2;
        const DEF_GLOBAL = 1 << 3;
        const DEF_NONLOCAL = 1 << 4;
        const DEF_IMPORT = 1 << 5;
        const DEF_ANNOT = 1 << 6;
        const DEF_COMP_ITER = 1 << 7;
        const DEF_TYPE_PARAM = 1 << 8;
        const DEF_DEL = 1 << 9;
        /// A class-level binding that a method also captures from an enclosing function.
        const DEF_FREE_CLASS = 1 << 10;

        const BOUND = Self::DEF_LOCAL.bits()
            | Self::DEF_PARAM.bits()
            | Self::DEF_IMPORT.bits()
            | Self::DEF_TYPE_PARAM.bits()
            | Self::DEF_DEL.bits();
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScopeFlags: u8 {
        /// Enclosed, directly or not, by a function-like scope.
        const IS_NESTED = 1 << 0;
        const HAS_FREE_VARS = 1 << 1;
        const HAS_CHILD_WITH_FREE_VARS = 1 << 2;
        const IS_GENERATOR = 1 << 3;
        const IS_COROUTINE = 1 << 4;
        const IS_COMPREHENSION = 1 << 5;
        /// A method refers to `__class__` or `super`, so the class body creates the cell.
        const NEEDS_CLASS_CLOSURE = 1 << 6;
    }
}

/// One entry in a scope's name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    roles: SymbolRoles,
    binding: Option<BindingKind>,
}

impl Symbol {
    fn new(name: String) -> Self {
        Self {
            name,
            roles: SymbolRoles::empty(),
            binding: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn roles(&self) -> SymbolRoles {
        self.roles
    }

    /// The committed binding. Every symbol of an analyzed tree has one.
    #[must_use]
    pub fn binding(&self) -> BindingKind {
        self.binding.unwrap_or(BindingKind::GlobalImplicit)
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: String,
    /// Range of the node that introduced the scope.
    pub position: SourceRange,
    pub parent: Option<ScopeId>,
    pub flags: ScopeFlags,
    children: Vec<ScopeId>,
    symbols: IndexMap<String, Symbol>,
    /// Parameter names in declaration order.
    varnames: Vec<String>,
    /// Where each `global`/`nonlocal` name was declared, for diagnostics.
    directives: AHashMap<String, SourceRange>,
    /// How `'yield' inside %s` describes this scope, for comprehensions.
    comprehension: Option<&'static str>,
    is_async_def: bool,
}

impl Scope {
    fn new(kind: ScopeKind, name: String, position: SourceRange, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            name,
            position,
            parent,
            flags: ScopeFlags::empty(),
            children: Vec::new(),
            symbols: IndexMap::new(),
            varnames: Vec::new(),
            directives: AHashMap::new(),
            comprehension: None,
            is_async_def: false,
        }
    }

    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Symbols in first-occurrence order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    #[must_use]
    pub fn varnames(&self) -> &[String] {
        &self.varnames
    }

    #[must_use]
    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    #[must_use]
    pub fn is_generator(&self) -> bool {
        self.flags.contains(ScopeFlags::IS_GENERATOR)
    }

    #[must_use]
    pub fn is_coroutine(&self) -> bool {
        self.flags.contains(ScopeFlags::IS_COROUTINE)
    }

    fn roles_of(&self, name: &str) -> SymbolRoles {
        self.symbols.get(name).map_or(SymbolRoles::empty(), |s| s.roles)
    }

    fn directive_range(&self, name: &str) -> SourceRange {
        self.directives.get(name).copied().unwrap_or(self.position)
    }
}

/// All scopes of one compilation unit; index 0 is the module.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    #[must_use]
    pub fn module(&self) -> ScopeId {
        ScopeId(0)
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    #[must_use]
    pub fn children(&self, id: ScopeId) -> &[ScopeId] {
        &self.scopes[id.index()].children
    }

    /// The scope introduced by the node of `kind` at `range`.
    ///
    /// A generic function or class has both a [`ScopeKind::TypeParam`] scope and its own
    /// scope at the same range; `kind` tells them apart.
    #[must_use]
    pub fn scope_for(&self, kind: ScopeKind, range: SourceRange) -> Option<ScopeId> {
        self.scopes
            .iter()
            .position(|s| s.kind == kind && s.position == range)
            .and_then(|i| u32::try_from(i).ok())
            .map(ScopeId)
    }

    #[must_use]
    pub fn binding(&self, scope: ScopeId, name: &str) -> Option<BindingKind> {
        self.scope(scope).symbol(name).map(Symbol::binding)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        (0u32..).map(ScopeId).zip(self.scopes.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Indented listing of every scope and its bindings, children after symbols.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if !self.scopes.is_empty() {
            self.dump_scope(self.module(), 0, &mut out);
        }
        out
    }

    fn dump_scope(&self, id: ScopeId, depth: usize, out: &mut String) {
        let scope = self.scope(id);
        let indent = "  ".repeat(depth);
        let kind: &'static str = scope.kind.into();
        let _ = write!(out, "{indent}{kind} {}", scope.name);
        if !scope.flags.is_empty() {
            let flags: Vec<&str> = scope.flags.iter_names().map(|(name, _)| name).collect();
            let _ = write!(out, " [{}]", flags.join(", "));
        }
        out.push('\n');
        for symbol in scope.symbols() {
            let _ = writeln!(out, "{indent}  {}: {:?}", symbol.name, symbol.binding());
        }
        for &child in &scope.children {
            self.dump_scope(child, depth + 1, out);
        }
    }
}

/// Builds and resolves the scope tree of `module`, reporting errors to `sink`.
///
/// Analysis never stops at the first error; the returned tree is complete but may hold
/// bindings derived from erroneous declarations.
pub fn analyze(module: &Mod, interner: &InternerBuilder, sink: &mut DiagnosticSink) -> ScopeTree {
    analyze_with_tracer(module, interner, sink, &mut NoopTracer)
}

/// Like [`analyze`], reporting scope entry, exit and every committed binding to `tracer`.
pub fn analyze_with_tracer(
    module: &Mod,
    interner: &InternerBuilder,
    sink: &mut DiagnosticSink,
    tracer: &mut dyn ParseTracer,
) -> ScopeTree {
    let mut collector = Collector {
        scopes: Vec::new(),
        stack: Vec::new(),
        class_name: None,
        interner,
        sink: &mut *sink,
        tracer: &mut *tracer,
        iter_target: false,
        comp_iter_depth: 0,
        loop_depth: 0,
    };
    collector.enter(ScopeKind::Module, StaticStrings::Module.as_str().to_owned(), module_range(module));
    collector.visit_mod(module);
    collector.exit();

    let mut resolver = Resolver {
        scopes: collector.scopes,
        sink,
        tracer,
    };
    resolver.analyze_block(ScopeId(0), None, None);
    ScopeTree {
        scopes: resolver.scopes,
    }
}

/// Private name mangling: `__spam` inside `class Ham` becomes `_Ham__spam`.
///
/// Returns `None` when `name` is not mangled: dunder names, dotted import names and
/// names in classes whose name is only underscores.
#[must_use]
pub fn mangle(class_name: &str, name: &str) -> Option<String> {
    if !name.starts_with("__") || name.ends_with("__") || name.contains('.') {
        return None;
    }
    let stripped = class_name.trim_start_matches('_');
    if stripped.is_empty() {
        return None;
    }
    Some(format!("_{stripped}{name}"))
}

fn module_range(module: &Mod) -> SourceRange {
    match module {
        Mod::Module(body) | Mod::Interactive(body) => match (body.first(), body.last()) {
            (Some(first), Some(last)) => first.position.to(last.position),
            _ => SourceRange::default(),
        },
        Mod::Expression(expr) => expr.position,
        Mod::FunctionType { argtypes, returns } => argtypes
            .first()
            .map_or(returns.position, |first| first.position.to(returns.position)),
    }
}

// ============================================================================
// Collection
// ============================================================================

struct Collector<'a> {
    scopes: Vec<Scope>,
    stack: Vec<ScopeId>,
    /// Innermost enclosing class, for mangling.
    class_name: Option<String>,
    interner: &'a InternerBuilder,
    sink: &'a mut DiagnosticSink,
    tracer: &'a mut dyn ParseTracer,
    /// Set while visiting a comprehension's `for` target.
    iter_target: bool,
    /// Greater than zero while visiting a comprehension's iterable.
    comp_iter_depth: u32,
    /// Loops enclosing the current statement within the current function or class body.
    loop_depth: u32,
}

impl<'a> Collector<'a> {
    fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ScopeId(0))
    }

    fn current_scope(&mut self) -> &mut Scope {
        let id = self.current();
        &mut self.scopes[id.index()]
    }

    fn current_kind(&self) -> ScopeKind {
        self.scopes[self.current().index()].kind
    }

    fn enter(&mut self, kind: ScopeKind, name: String, position: SourceRange) -> ScopeId {
        let parent = self.stack.last().copied();
        let id = ScopeId(u32::try_from(self.scopes.len()).unwrap_or(u32::MAX));
        let mut scope = Scope::new(kind, name, position, parent);
        if let Some(parent) = parent {
            let parent = &mut self.scopes[parent.index()];
            if parent.kind.is_function_like() || parent.flags.contains(ScopeFlags::IS_NESTED) {
                scope.flags |= ScopeFlags::IS_NESTED;
            }
            parent.children.push(id);
        }
        self.tracer.on_scope_enter(kind, &scope.name, self.stack.len() + 1);
        self.scopes.push(scope);
        self.stack.push(id);
        id
    }

    fn exit(&mut self) {
        self.stack.pop();
        self.tracer.on_scope_exit(self.stack.len());
    }

    fn str(&self, id: StringId) -> &'a str {
        self.interner.get_str(id)
    }

    fn error(&mut self, range: SourceRange, message: ErrorMessage, args: &[&str]) {
        let diagnostic = Diagnostic::new(ErrorKind::Syntax, range, message.format(args));
        self.tracer.on_diagnostic(&diagnostic);
        self.sink.push(diagnostic);
    }

    fn mangled(&self, name: &str) -> String {
        self.class_name
            .as_deref()
            .and_then(|class| mangle(class, name))
            .unwrap_or_else(|| name.to_owned())
    }

    fn add_def(&mut self, name: &str, role: SymbolRoles, range: SourceRange) {
        let current = self.current();
        self.add_def_in(current, name, role, range);
    }

    fn add_def_in(&mut self, scope: ScopeId, name: &str, role: SymbolRoles, range: SourceRange) {
        let mangled = self.mangled(name);
        let in_iter_target = self.iter_target && scope == self.current();
        let target = &mut self.scopes[scope.index()];
        let symbol = target
            .symbols
            .entry(mangled.clone())
            .or_insert_with(|| Symbol::new(mangled.clone()));
        let previous = symbol.roles;
        symbol.roles |= role;
        if in_iter_target {
            symbol.roles |= SymbolRoles::DEF_COMP_ITER;
        }
        if role.contains(SymbolRoles::DEF_PARAM) {
            target.varnames.push(mangled.clone());
        }

        if role.contains(SymbolRoles::DEF_PARAM) && previous.contains(SymbolRoles::DEF_PARAM) {
            self.error(range, ErrorMessage::DuplicateArgument, &[name]);
        }
        if in_iter_target && previous.intersects(SymbolRoles::DEF_GLOBAL | SymbolRoles::DEF_NONLOCAL) {
            self.error(range, ErrorMessage::IterRebindsNamedExpr, &[name]);
        }
        if role.contains(SymbolRoles::DEF_GLOBAL) && scope != ScopeId(0) {
            let module = &mut self.scopes[0];
            module
                .symbols
                .entry(mangled.clone())
                .or_insert_with(|| Symbol::new(mangled))
                .roles |= SymbolRoles::DEF_GLOBAL;
        }
    }

    fn record_directive(&mut self, scope: ScopeId, name: &str, range: SourceRange) {
        let mangled = self.mangled(name);
        self.scopes[scope.index()].directives.entry(mangled).or_insert(range);
    }

    fn check_in_function(&mut self, keyword: &str, range: SourceRange) {
        if matches!(self.current_kind(), ScopeKind::Module | ScopeKind::Class) {
            self.error(range, ErrorMessage::OutsideFunction, &[keyword]);
        }
    }

    fn visit_target(&mut self, target: &ExprLoc) {
        let saved = std::mem::replace(&mut self.iter_target, true);
        self.visit_expr(target);
        self.iter_target = saved;
    }

    fn visit_params(&mut self, args: &Arguments) {
        for arg in args.iter_args() {
            let name = self.str(arg.arg);
            self.add_def(name, SymbolRoles::DEF_PARAM, arg.position);
        }
    }

    fn visit_defaults(&mut self, args: &Arguments) {
        for default in &args.defaults {
            self.visit_expr(default);
        }
        for default in args.kw_defaults.iter().flatten() {
            self.visit_expr(default);
        }
    }

    fn enter_type_params(&mut self, name: &str, type_params: &[TypeParam], position: SourceRange) -> bool {
        if type_params.is_empty() {
            return false;
        }
        self.enter(
            ScopeKind::TypeParam,
            format!("<generic parameters of {name}>"),
            position,
        );
        for param in type_params {
            self.visit_type_param(param);
        }
        true
    }

    fn function_def(&mut self, def: &FunctionDef, position: SourceRange) {
        let name = self.str(def.name);
        self.add_def(name, SymbolRoles::DEF_LOCAL, position);
        for decorator in &def.decorator_list {
            self.visit_expr(decorator);
        }
        self.visit_defaults(&def.args);
        let generic = self.enter_type_params(name, &def.type_params, position);
        for arg in def.args.iter_args() {
            if let Some(annotation) = &arg.annotation {
                self.visit_expr(annotation);
            }
        }
        if let Some(returns) = &def.returns {
            self.visit_expr(returns);
        }

        self.enter(ScopeKind::Function, name.to_owned(), position);
        if def.is_async {
            let scope = self.current_scope();
            scope.is_async_def = true;
            scope.flags |= ScopeFlags::IS_COROUTINE;
        }
        self.visit_params(&def.args);
        let loops = std::mem::take(&mut self.loop_depth);
        self.visit_body(&def.body);
        self.loop_depth = loops;
        self.exit();
        if generic {
            self.exit();
        }
    }

    fn class_def(&mut self, def: &ClassDef, position: SourceRange) {
        let name = self.str(def.name);
        self.add_def(name, SymbolRoles::DEF_LOCAL, position);
        for decorator in &def.decorator_list {
            self.visit_expr(decorator);
        }
        let generic = self.enter_type_params(name, &def.type_params, position);
        for base in &def.bases {
            self.visit_expr(base);
        }
        for keyword in &def.keywords {
            self.visit_keyword(keyword);
        }

        self.enter(ScopeKind::Class, name.to_owned(), position);
        let saved = self.class_name.replace(name.to_owned());
        let loops = std::mem::take(&mut self.loop_depth);
        self.visit_body(&def.body);
        self.loop_depth = loops;
        self.class_name = saved;
        self.exit();
        if generic {
            self.exit();
        }
    }

    fn ann_assign(&mut self, stmt: &StmtLoc, target: &ExprLoc, annotation: &ExprLoc, value: Option<&ExprLoc>, simple: bool) {
        if let Expr::Name { id, .. } = &target.expr {
            let name = self.str(*id);
            let roles = self.scopes[self.current().index()].roles_of(&self.mangled(name));
            if simple && self.current() != ScopeId(0) {
                if roles.contains(SymbolRoles::DEF_GLOBAL) {
                    self.error(stmt.position, ErrorMessage::AnnotatedGlobal, &[name]);
                } else if roles.contains(SymbolRoles::DEF_NONLOCAL) {
                    self.error(stmt.position, ErrorMessage::AnnotatedNonlocal, &[name]);
                }
            }
            if simple {
                self.add_def(name, SymbolRoles::DEF_ANNOT | SymbolRoles::DEF_LOCAL, target.position);
            } else if value.is_some() {
                self.add_def(name, SymbolRoles::DEF_LOCAL, target.position);
            }
        } else {
            self.visit_expr(target);
        }
        self.visit_expr(annotation);
        if let Some(value) = value {
            self.visit_expr(value);
        }
    }

    fn declaration(&mut self, names: &[StringId], range: SourceRange, global: bool) {
        let current = self.current();
        for &id in names {
            let name = self.str(id);
            let roles = self.scopes[current.index()].roles_of(&self.mangled(name));
            if roles.contains(SymbolRoles::DEF_PARAM) {
                let message = if global {
                    ErrorMessage::ParameterAndGlobal
                } else {
                    ErrorMessage::ParameterAndNonlocal
                };
                self.error(range, message, &[name]);
            } else if roles.contains(SymbolRoles::DEF_ANNOT) {
                let message = if global {
                    ErrorMessage::AnnotatedGlobal
                } else {
                    ErrorMessage::AnnotatedNonlocal
                };
                self.error(range, message, &[name]);
            }
            let role = if global {
                SymbolRoles::DEF_GLOBAL
            } else {
                SymbolRoles::DEF_NONLOCAL
            };
            self.add_def(name, role, range);
            self.record_directive(current, name, range);
        }
    }

    fn comprehension(
        &mut self,
        expr: &ExprLoc,
        kind: StaticStrings,
        description: &'static str,
        generators: &[Comprehension],
        elt: &ExprLoc,
        value: Option<&ExprLoc>,
    ) {
        let Some((outermost, rest)) = generators.split_first() else {
            return;
        };
        self.comp_iter_depth += 1;
        self.visit_expr(&outermost.iter);
        self.comp_iter_depth -= 1;

        let is_generator = kind == StaticStrings::GenExpr;
        self.enter(ScopeKind::Comprehension, kind.as_str().to_owned(), expr.position);
        {
            let scope = self.current_scope();
            scope.comprehension = Some(description);
            scope.flags |= ScopeFlags::IS_COMPREHENSION;
            if outermost.is_async {
                scope.flags |= ScopeFlags::IS_COROUTINE;
            }
        }
        self.add_def(".0", SymbolRoles::DEF_PARAM, outermost.iter.position);
        self.visit_target(&outermost.target);
        for test in &outermost.ifs {
            self.visit_expr(test);
        }
        for generator in rest {
            self.visit_comprehension(generator);
        }
        self.visit_expr(elt);
        if let Some(value) = value {
            self.visit_expr(value);
        }

        let scope = self.current_scope();
        if is_generator {
            scope.flags |= ScopeFlags::IS_GENERATOR;
        }
        let is_async = scope.flags.contains(ScopeFlags::IS_COROUTINE) && !is_generator;
        self.exit();
        if is_async {
            let enclosing = &self.scopes[self.current().index()];
            if enclosing.kind != ScopeKind::Comprehension && !enclosing.is_async_def {
                self.error(expr.position, ErrorMessage::AsyncComprehensionOutsideAsync, &[]);
            }
            self.current_scope().flags |= ScopeFlags::IS_COROUTINE;
        }
    }

    /// PEP 572: inside a comprehension the target binds in the nearest enclosing
    /// function or module scope.
    fn named_expr(&mut self, expr: &ExprLoc, target: &ExprLoc, value: &ExprLoc) {
        if self.comp_iter_depth > 0 {
            self.error(expr.position, ErrorMessage::NamedExprInIterable, &[]);
        }
        let in_comprehension = self.scopes[self.current().index()]
            .flags
            .contains(ScopeFlags::IS_COMPREHENSION);
        if let (true, Some(id)) = (in_comprehension, target.name_id()) {
            let name = self.str(id);
            let mangled = self.mangled(name);
            let current = self.current();
            let enclosing: Vec<ScopeId> = self.stack.iter().rev().copied().collect();
            for scope_id in enclosing {
                let scope = &self.scopes[scope_id.index()];
                if scope.flags.contains(ScopeFlags::IS_COMPREHENSION) {
                    if scope.roles_of(&mangled).contains(SymbolRoles::DEF_COMP_ITER) {
                        self.error(target.position, ErrorMessage::NamedExprRebindsIter, &[name]);
                        break;
                    }
                    continue;
                }
                match scope.kind {
                    ScopeKind::Module => {
                        self.add_def(name, SymbolRoles::DEF_GLOBAL, target.position);
                        self.record_directive(current, name, target.position);
                        self.add_def_in(scope_id, name, SymbolRoles::DEF_GLOBAL, target.position);
                    }
                    ScopeKind::Class => {
                        self.error(expr.position, ErrorMessage::NamedExprInClassComprehension, &[]);
                    }
                    _ => {
                        let role = if scope.roles_of(&mangled).contains(SymbolRoles::DEF_GLOBAL) {
                            SymbolRoles::DEF_GLOBAL
                        } else {
                            SymbolRoles::DEF_NONLOCAL
                        };
                        self.add_def(name, role, target.position);
                        self.record_directive(current, name, target.position);
                        self.add_def_in(scope_id, name, SymbolRoles::DEF_LOCAL, target.position);
                    }
                }
                break;
            }
        }
        self.visit_expr(value);
        self.visit_expr(target);
    }

    fn yield_expr(&mut self, range: SourceRange) {
        self.check_in_function("yield", range);
        let scope = self.current_scope();
        if let Some(description) = scope.comprehension {
            self.error(range, ErrorMessage::YieldInComprehension, &[description]);
            return;
        }
        scope.flags |= ScopeFlags::IS_GENERATOR;
    }

    /// `await` belongs to the innermost scope. Inside a comprehension it makes the
    /// comprehension asynchronous, which [`Collector::comprehension`] checks against the
    /// scope the comprehension appears in.
    fn await_expr(&mut self, range: SourceRange) {
        let scope = &self.scopes[self.current().index()];
        let (kind, is_async_def) = (scope.kind, scope.is_async_def);
        match kind {
            ScopeKind::Module | ScopeKind::Class => self.error(range, ErrorMessage::OutsideFunction, &["await"]),
            ScopeKind::Comprehension => {}
            _ if !is_async_def => self.error(range, ErrorMessage::AwaitOutsideAsync, &[]),
            _ => {}
        }
        self.current_scope().flags |= ScopeFlags::IS_COROUTINE;
    }

    fn check_async_stmt(&mut self, keyword: &str, range: SourceRange) {
        if !self.scopes[self.current().index()].is_async_def {
            self.error(range, ErrorMessage::AsyncStmtOutsideAsync, &[keyword]);
        }
    }

    fn loop_body(&mut self, body: &[StmtLoc]) {
        self.loop_depth += 1;
        self.visit_body(body);
        self.loop_depth -= 1;
    }

    fn capture_name(&mut self, name: StringId, range: SourceRange) {
        let name = self.str(name);
        if name == "_" {
            self.error(range, ErrorMessage::UnderscoreTarget, &[]);
        } else {
            self.add_def(name, SymbolRoles::DEF_LOCAL, range);
        }
    }
}

impl<'ast> Visitor<'ast> for Collector<'_> {
    fn visit_stmt(&mut self, stmt: &'ast StmtLoc) {
        match &stmt.stmt {
            Stmt::FunctionDef(def) => self.function_def(def, stmt.position),
            Stmt::ClassDef(def) => self.class_def(def, stmt.position),
            Stmt::TypeAlias {
                name,
                type_params,
                value,
            } => {
                self.visit_expr(name);
                let alias = name.name_id().map_or("", |id| self.str(id));
                let generic = self.enter_type_params(alias, type_params, stmt.position);
                self.enter(ScopeKind::TypeParam, alias.to_owned(), value.position);
                self.visit_expr(value);
                self.exit();
                if generic {
                    self.exit();
                }
            }
            Stmt::Return(value) => {
                self.check_in_function("return", stmt.position);
                if let Some(value) = value {
                    self.visit_expr(value);
                }
            }
            Stmt::AnnAssign {
                target,
                annotation,
                value,
                simple,
            } => self.ann_assign(stmt, target, annotation, value.as_ref(), *simple),
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                is_async,
            } => {
                if *is_async {
                    self.check_async_stmt("async for", stmt.position);
                }
                self.visit_expr(target);
                self.visit_expr(iter);
                self.loop_body(body);
                self.visit_body(orelse);
            }
            Stmt::While { test, body, orelse } => {
                self.visit_expr(test);
                self.loop_body(body);
                self.visit_body(orelse);
            }
            Stmt::With { is_async: true, .. } => {
                self.check_async_stmt("async with", stmt.position);
                visitor::walk_stmt(self, stmt);
            }
            Stmt::Break if self.loop_depth == 0 => {
                self.error(stmt.position, ErrorMessage::BreakOutsideLoop, &[]);
            }
            Stmt::Continue if self.loop_depth == 0 => {
                self.error(stmt.position, ErrorMessage::ContinueOutsideLoop, &[]);
            }
            Stmt::Global(names) => self.declaration(names, stmt.position, true),
            Stmt::Nonlocal(names) => self.declaration(names, stmt.position, false),
            _ => visitor::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &'ast ExprLoc) {
        match &expr.expr {
            Expr::Name { id, ctx } => {
                let name = self.str(*id);
                let role = match ctx {
                    ExprContext::Load => SymbolRoles::USE,
                    ExprContext::Store => SymbolRoles::DEF_LOCAL,
                    ExprContext::Del => SymbolRoles::DEF_DEL,
                };
                self.add_def(name, role, expr.position);
                if *ctx == ExprContext::Load && *id == StaticStrings::Super && self.current_kind().is_function_like() {
                    self.add_def(StaticStrings::DunderClass.as_str(), SymbolRoles::USE, expr.position);
                }
            }
            Expr::NamedExpr { target, value } => self.named_expr(expr, target, value),
            Expr::Lambda { args, body } => {
                self.visit_defaults(args);
                self.enter(ScopeKind::Lambda, StaticStrings::Lambda.as_str().to_owned(), expr.position);
                self.visit_params(args);
                self.visit_expr(body);
                self.exit();
            }
            Expr::ListComp { elt, generators } => {
                self.comprehension(expr, StaticStrings::ListComp, "list comprehension", generators, elt, None);
            }
            Expr::SetComp { elt, generators } => {
                self.comprehension(expr, StaticStrings::SetComp, "set comprehension", generators, elt, None);
            }
            Expr::GeneratorExp { elt, generators } => {
                self.comprehension(expr, StaticStrings::GenExpr, "generator expression", generators, elt, None);
            }
            Expr::DictComp { key, value, generators } => {
                self.comprehension(
                    expr,
                    StaticStrings::DictComp,
                    "dict comprehension",
                    generators,
                    key,
                    Some(value),
                );
            }
            Expr::Yield(_) | Expr::YieldFrom(_) => {
                self.yield_expr(expr.position);
                visitor::walk_expr(self, expr);
            }
            Expr::Await(_) => {
                self.await_expr(expr.position);
                visitor::walk_expr(self, expr);
            }
            _ => visitor::walk_expr(self, expr),
        }
    }

    fn visit_pattern(&mut self, pattern: &'ast PatternLoc) {
        match &pattern.pattern {
            Pattern::MatchAs { pattern: inner, name } => {
                if let Some(inner) = inner {
                    self.visit_pattern(inner);
                }
                if let Some(name) = name {
                    self.capture_name(*name, pattern.position);
                }
            }
            Pattern::MatchStar(Some(name)) => self.capture_name(*name, pattern.position),
            Pattern::MatchMapping { rest, .. } => {
                visitor::walk_pattern(self, pattern);
                if let Some(rest) = rest {
                    let name = self.str(*rest);
                    self.add_def(name, SymbolRoles::DEF_LOCAL, pattern.position);
                }
            }
            _ => visitor::walk_pattern(self, pattern),
        }
    }

    fn visit_alias(&mut self, alias: &'ast Alias) {
        let name = self.str(alias.name);
        if name == "*" {
            if self.current_kind() != ScopeKind::Module {
                self.error(alias.position, ErrorMessage::ImportStarNotModule, &[]);
            }
            return;
        }
        let bound = match alias.asname {
            Some(asname) => self.str(asname),
            None => name.split('.').next().unwrap_or(name),
        };
        self.add_def(bound, SymbolRoles::DEF_IMPORT, alias.position);
    }

    fn visit_except_handler(&mut self, handler: &'ast ExceptHandler) {
        if let Some(type_) = &handler.type_ {
            self.visit_expr(type_);
        }
        if let Some(name) = handler.name {
            let name = self.str(name);
            self.add_def(name, SymbolRoles::DEF_LOCAL, handler.position);
        }
        self.visit_body(&handler.body);
    }

    /// Inner `for` clauses of a comprehension; the outermost is handled by
    /// [`Collector::comprehension`].
    fn visit_comprehension(&mut self, comprehension: &'ast Comprehension) {
        self.visit_target(&comprehension.target);
        self.comp_iter_depth += 1;
        self.visit_expr(&comprehension.iter);
        self.comp_iter_depth -= 1;
        for test in &comprehension.ifs {
            self.visit_expr(test);
        }
        if comprehension.is_async {
            self.current_scope().flags |= ScopeFlags::IS_COROUTINE;
        }
    }

    fn visit_type_param(&mut self, param: &'ast TypeParam) {
        let name = self.str(param.name);
        self.add_def(name, SymbolRoles::DEF_TYPE_PARAM, param.position);
        visitor::walk_type_param(self, param);
    }
}

// ============================================================================
// Resolution
// ============================================================================

type NameSet = AHashSet<String>;

/// Names one block binds itself and names it leaves free.
#[derive(Default)]
struct BlockSets {
    local: NameSet,
    free: NameSet,
}

struct Resolver<'a> {
    scopes: Vec<Scope>,
    sink: &'a mut DiagnosticSink,
    tracer: &'a mut dyn ParseTracer,
}

impl Resolver<'_> {
    /// Resolves `id` and its subtree and returns the names free in it.
    ///
    /// `bound` holds names bound by enclosing function scopes, `global` those declared
    /// global on the way down. The module is analyzed with neither.
    fn analyze_block(&mut self, id: ScopeId, mut bound: Option<NameSet>, mut global: Option<NameSet>) -> NameSet {
        let kind = self.scopes[id.index()].kind;
        let is_class = kind == ScopeKind::Class;
        let mut sets = BlockSets::default();

        let mut new_bound = NameSet::default();
        let mut new_global = NameSet::default();
        if is_class {
            // Class bindings are invisible to nested scopes: snapshot before the loop.
            new_global.extend(global.iter().flatten().cloned());
            new_bound.extend(bound.iter().flatten().cloned());
        }

        let names: Vec<(String, SymbolRoles)> = self.scopes[id.index()]
            .symbols
            .values()
            .map(|s| (s.name.clone(), s.roles))
            .collect();
        let mut bindings = Vec::with_capacity(names.len());
        for (name, roles) in names {
            let binding = self.analyze_name(id, &name, roles, bound.as_mut(), global.as_mut(), &mut sets);
            bindings.push((name, binding));
        }

        if is_class {
            new_bound.insert(StaticStrings::DunderClass.as_str().to_owned());
        } else {
            if kind.is_function_like() {
                new_bound.extend(sets.local.iter().cloned());
            }
            new_bound.extend(bound.iter().flatten().cloned());
            new_global.extend(global.iter().flatten().cloned());
        }

        let mut new_free = NameSet::default();
        let children = self.scopes[id.index()].children.clone();
        for child in children {
            let child_free = self.analyze_block(child, Some(new_bound.clone()), Some(new_global.clone()));
            new_free.extend(child_free);
            if self.scopes[child.index()]
                .flags
                .intersects(ScopeFlags::HAS_FREE_VARS | ScopeFlags::HAS_CHILD_WITH_FREE_VARS)
            {
                self.scopes[id.index()].flags |= ScopeFlags::HAS_CHILD_WITH_FREE_VARS;
            }
        }

        if kind.is_function_like() {
            for (name, binding) in &mut bindings {
                if matches!(binding, BindingKind::Local | BindingKind::Parameter) && new_free.remove(name.as_str()) {
                    *binding = BindingKind::Cell;
                }
            }
        } else if is_class && new_free.remove(StaticStrings::DunderClass.as_str()) {
            self.scopes[id.index()].flags |= ScopeFlags::NEEDS_CLASS_CLOSURE;
        }

        self.update_symbols(id, bindings, &new_free, bound.as_ref());
        sets.free.extend(new_free);
        sets.free
    }

    fn analyze_name(
        &mut self,
        id: ScopeId,
        name: &str,
        roles: SymbolRoles,
        bound: Option<&mut NameSet>,
        global: Option<&mut NameSet>,
        sets: &mut BlockSets,
    ) -> BindingKind {
        if roles.contains(SymbolRoles::DEF_GLOBAL) {
            if roles.contains(SymbolRoles::DEF_NONLOCAL) {
                let range = self.scopes[id.index()].directive_range(name);
                self.error(range, ErrorMessage::NonlocalAndGlobal, &[name]);
            }
            if let Some(global) = global {
                global.insert(name.to_owned());
            }
            if let Some(bound) = bound {
                bound.remove(name);
            }
            return BindingKind::GlobalExplicit;
        }
        if roles.contains(SymbolRoles::DEF_NONLOCAL) {
            let range = self.scopes[id.index()].directive_range(name);
            return match bound {
                None => {
                    self.error(range, ErrorMessage::NonlocalAtModule, &[]);
                    BindingKind::GlobalImplicit
                }
                Some(bound) if !bound.contains(name) => {
                    self.error(range, ErrorMessage::NonlocalNoBinding, &[name]);
                    BindingKind::GlobalImplicit
                }
                Some(_) => {
                    self.scopes[id.index()].flags |= ScopeFlags::HAS_FREE_VARS;
                    sets.free.insert(name.to_owned());
                    BindingKind::Free
                }
            };
        }
        if roles.intersects(SymbolRoles::BOUND) {
            sets.local.insert(name.to_owned());
            if let Some(global) = global {
                global.remove(name);
            }
            return if roles.contains(SymbolRoles::DEF_PARAM) {
                BindingKind::Parameter
            } else {
                BindingKind::Local
            };
        }
        if bound.is_some_and(|bound| bound.contains(name)) {
            self.scopes[id.index()].flags |= ScopeFlags::HAS_FREE_VARS;
            sets.free.insert(name.to_owned());
            return BindingKind::Free;
        }
        if global.is_some_and(|global| global.contains(name)) {
            return BindingKind::GlobalImplicit;
        }
        let scope = &mut self.scopes[id.index()];
        if scope.flags.contains(ScopeFlags::IS_NESTED) {
            scope.flags |= ScopeFlags::HAS_FREE_VARS;
        }
        BindingKind::GlobalImplicit
    }

    /// Commits `bindings` and records the names passing through this scope to reach a
    /// nested one.
    fn update_symbols(
        &mut self,
        id: ScopeId,
        bindings: Vec<(String, BindingKind)>,
        new_free: &NameSet,
        bound: Option<&NameSet>,
    ) {
        let scope = &mut self.scopes[id.index()];
        for (name, binding) in bindings {
            if let Some(symbol) = scope.symbols.get_mut(&name) {
                symbol.binding = Some(binding);
            }
        }

        let mut passing: Vec<&String> = new_free.iter().collect();
        passing.sort();
        for name in passing {
            match scope.symbols.get_mut(name) {
                Some(symbol) => {
                    if scope.kind == ScopeKind::Class
                        && symbol.roles.intersects(SymbolRoles::DEF_GLOBAL | SymbolRoles::BOUND)
                    {
                        symbol.roles |= SymbolRoles::DEF_FREE_CLASS;
                    }
                }
                None if bound.is_some_and(|bound| bound.contains(name.as_str())) => {
                    let mut symbol = Symbol::new(name.clone());
                    symbol.binding = Some(BindingKind::Free);
                    scope.symbols.insert(name.clone(), symbol);
                }
                None => {}
            }
        }

        for symbol in scope.symbols.values() {
            self.tracer.on_name_resolved(&scope.name, &symbol.name, symbol.binding());
        }
    }

    fn error(&mut self, range: SourceRange, message: ErrorMessage, args: &[&str]) {
        let diagnostic = Diagnostic::new(ErrorKind::Syntax, range, message.format(args));
        self.tracer.on_diagnostic(&diagnostic);
        self.sink.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangles_private_names() {
        assert_eq!(mangle("Ham", "__spam").as_deref(), Some("_Ham__spam"));
        assert_eq!(mangle("_Ham", "__spam").as_deref(), Some("_Ham__spam"));
        assert_eq!(mangle("__Ham", "__spam_").as_deref(), Some("_Ham__spam_"));
    }

    #[test]
    fn leaves_public_and_dunder_names() {
        assert_eq!(mangle("Ham", "spam"), None);
        assert_eq!(mangle("Ham", "_spam"), None);
        assert_eq!(mangle("Ham", "__init__"), None);
        assert_eq!(mangle("Ham", "__os.path"), None);
        assert_eq!(mangle("___", "__spam"), None);
    }

    #[test]
    fn bound_roles() {
        assert!(SymbolRoles::BOUND.contains(SymbolRoles::DEF_DEL));
        assert!(!SymbolRoles::BOUND.intersects(SymbolRoles::USE | SymbolRoles::DEF_GLOBAL));
    }
}

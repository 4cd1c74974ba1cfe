//! The typed syntax tree.
//!
//! Every node owns its children exclusively, so the tree has no sharing and no cycles.
//! Located nodes ([`ExprLoc`], [`StmtLoc`], [`PatternLoc`]) carry the [`SourceRange`]
//! they were parsed from; a child's range is always contained in its parent's.
//! Identifiers and literal payloads are interned, see [`crate::intern`].

use smallvec::SmallVec;
use strum::IntoStaticStr;

use crate::{
    diagnostic::SourceRange,
    intern::{BytesId, CodePointsId, LongIntId, StringId},
    patterns::PatternLoc,
};

/// Root of a parse, one variant per input kind.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Mod {
    Module(Vec<StmtLoc>),
    Interactive(Vec<StmtLoc>),
    Expression(ExprLoc),
    FunctionType { argtypes: Vec<ExprLoc>, returns: ExprLoc },
}

/// Constant values as they appear in source.
///
/// `Int` covers everything that fits in `i64`; larger literals are promoted to
/// `LongInt` with no truncation. Unary minus is never folded into a literal.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Literal {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    LongInt(LongIntId),
    Float(f64),
    /// Imaginary literal such as `2j`; `real` is always zero when parsed from source.
    Complex { real: f64, imag: f64 },
    Str(StringId),
    /// `str` value holding a lone surrogate such as `'\ud800'`.
    CodePoints(CodePointsId),
    Bytes(BytesId),
}

/// Load/store/delete context of a name, attribute, subscript, starred or sequence node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum ExprContext {
    #[default]
    Load,
    Store,
    Del,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum BoolOp {
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
}

/// Binary operators. The strum serialization is the operator's source symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum Operator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mult,
    #[strum(serialize = "@")]
    MatMult,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "**")]
    Pow,
    #[strum(serialize = "<<")]
    LShift,
    #[strum(serialize = ">>")]
    RShift,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "//")]
    FloorDiv,
}

impl Operator {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    #[strum(serialize = "~")]
    Invert,
    #[strum(serialize = "not ")]
    Not,
    #[strum(serialize = "+")]
    UAdd,
    #[strum(serialize = "-")]
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum CmpOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtE,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtE,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "is not")]
    IsNot,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "not in")]
    NotIn,
}

/// `!s`, `!r` or `!a` on an f-string replacement field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum ConversionFlag {
    #[default]
    None,
    Str,
    Repr,
    Ascii,
}

impl ConversionFlag {
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            's' => Some(Self::Str),
            'r' => Some(Self::Repr),
            'a' => Some(Self::Ascii),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_char(self) -> Option<char> {
        match self {
            Self::None => None,
            Self::Str => Some('s'),
            Self::Repr => Some('r'),
            Self::Ascii => Some('a'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    BoolOp {
        op: BoolOp,
        values: Vec<ExprLoc>,
    },
    /// Assignment expression `target := value`. The target is always a `Name`.
    NamedExpr {
        target: Box<ExprLoc>,
        value: Box<ExprLoc>,
    },
    BinOp {
        left: Box<ExprLoc>,
        op: Operator,
        right: Box<ExprLoc>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<ExprLoc>,
    },
    Lambda {
        args: Box<Arguments>,
        body: Box<ExprLoc>,
    },
    IfExp {
        test: Box<ExprLoc>,
        body: Box<ExprLoc>,
        orelse: Box<ExprLoc>,
    },
    /// `None` keys mark `**mapping` unpacking entries.
    Dict {
        keys: Vec<Option<ExprLoc>>,
        values: Vec<ExprLoc>,
    },
    Set(Vec<ExprLoc>),
    ListComp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<ExprLoc>,
        value: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    Await(Box<ExprLoc>),
    Yield(Option<Box<ExprLoc>>),
    YieldFrom(Box<ExprLoc>),
    /// Chained comparison `a < b <= c`: `ops.len() == comparators.len()`.
    Compare {
        left: Box<ExprLoc>,
        ops: SmallVec<[CmpOp; 2]>,
        comparators: Vec<ExprLoc>,
    },
    Call {
        func: Box<ExprLoc>,
        args: Vec<ExprLoc>,
        keywords: Vec<Keyword>,
    },
    FormattedValue {
        value: Box<ExprLoc>,
        conversion: ConversionFlag,
        format_spec: Option<Box<ExprLoc>>,
    },
    /// An f-string: constant string parts interleaved with `FormattedValue`s.
    JoinedStr(Vec<ExprLoc>),
    Constant(Literal),
    Attribute {
        value: Box<ExprLoc>,
        attr: StringId,
        ctx: ExprContext,
    },
    Subscript {
        value: Box<ExprLoc>,
        slice: Box<ExprLoc>,
        ctx: ExprContext,
    },
    Starred {
        value: Box<ExprLoc>,
        ctx: ExprContext,
    },
    Name {
        id: StringId,
        ctx: ExprContext,
    },
    List {
        elts: Vec<ExprLoc>,
        ctx: ExprContext,
    },
    Tuple {
        elts: Vec<ExprLoc>,
        ctx: ExprContext,
    },
    Slice {
        lower: Option<Box<ExprLoc>>,
        upper: Option<Box<ExprLoc>>,
        step: Option<Box<ExprLoc>>,
    },
}

impl Expr {
    /// CPython's description of an expression kind, as used in "cannot assign to %s".
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::BoolOp { .. } | Self::BinOp { .. } | Self::UnaryOp { .. } => "expression",
            Self::NamedExpr { .. } => "named expression",
            Self::Lambda { .. } => "lambda",
            Self::IfExp { .. } => "conditional expression",
            Self::Dict { .. } => "dict literal",
            Self::Set(_) => "set display",
            Self::ListComp { .. } => "list comprehension",
            Self::SetComp { .. } => "set comprehension",
            Self::DictComp { .. } => "dict comprehension",
            Self::GeneratorExp { .. } => "generator expression",
            Self::Await(_) => "await expression",
            Self::Yield(_) | Self::YieldFrom(_) => "yield expression",
            Self::Compare { .. } => "comparison",
            Self::Call { .. } => "function call",
            Self::FormattedValue { .. } | Self::JoinedStr(_) => "f-string expression",
            Self::Constant(Literal::None) => "None",
            Self::Constant(Literal::Bool(true)) => "True",
            Self::Constant(Literal::Bool(false)) => "False",
            Self::Constant(Literal::Ellipsis) => "ellipsis",
            Self::Constant(_) => "literal",
            Self::Attribute { .. } => "attribute",
            Self::Subscript { .. } => "subscript",
            Self::Starred { .. } => "starred",
            Self::Name { .. } => "name",
            Self::List { .. } => "list",
            Self::Tuple { .. } => "tuple",
            Self::Slice { .. } => "slice",
        }
    }
}

/// An expression with its source location.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExprLoc {
    pub position: SourceRange,
    pub expr: Expr,
}

impl ExprLoc {
    #[must_use]
    pub fn new(position: SourceRange, expr: Expr) -> Self {
        Self { position, expr }
    }

    /// The interned name if this is a plain `Name` node.
    #[must_use]
    pub fn name_id(&self) -> Option<StringId> {
        match self.expr {
            Expr::Name { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// One `for ... in ... if ...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Comprehension {
    pub target: ExprLoc,
    pub iter: ExprLoc,
    pub ifs: Vec<ExprLoc>,
    pub is_async: bool,
    pub position: SourceRange,
}

/// A single parameter: name plus optional annotation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Arg {
    pub arg: StringId,
    pub annotation: Option<Box<ExprLoc>>,
    pub position: SourceRange,
}

/// A full parameter list.
///
/// `defaults` align with the tail of `posonlyargs + args`; `kw_defaults` aligns one to
/// one with `kwonlyargs`, `None` meaning "no default".
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Arguments {
    pub posonlyargs: Vec<Arg>,
    pub args: Vec<Arg>,
    pub vararg: Option<Arg>,
    pub kwonlyargs: Vec<Arg>,
    pub kw_defaults: Vec<Option<ExprLoc>>,
    pub kwarg: Option<Arg>,
    pub defaults: Vec<ExprLoc>,
}

impl Arguments {
    /// All parameters in declaration order.
    pub fn iter_args(&self) -> impl Iterator<Item = &Arg> {
        self.posonlyargs
            .iter()
            .chain(self.args.iter())
            .chain(self.vararg.iter())
            .chain(self.kwonlyargs.iter())
            .chain(self.kwarg.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter_args().next().is_none()
    }
}

/// A keyword argument in a call or class definition; `arg == None` is `**mapping`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyword {
    pub arg: Option<StringId>,
    pub value: ExprLoc,
    pub position: SourceRange,
}

/// `name as asname` in an import. Dotted names are interned whole.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Alias {
    pub name: StringId,
    pub asname: Option<StringId>,
    pub position: SourceRange,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WithItem {
    pub context_expr: ExprLoc,
    pub optional_vars: Option<ExprLoc>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExceptHandler {
    pub type_: Option<ExprLoc>,
    pub name: Option<StringId>,
    pub body: Vec<StmtLoc>,
    pub position: SourceRange,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchCase {
    pub pattern: PatternLoc,
    pub guard: Option<ExprLoc>,
    pub body: Vec<StmtLoc>,
}

/// PEP 695 type parameter.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TypeParamKind {
    TypeVar { bound: Option<Box<ExprLoc>> },
    ParamSpec,
    TypeVarTuple,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TypeParam {
    pub name: StringId,
    pub kind: TypeParamKind,
    pub position: SourceRange,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionDef {
    pub name: StringId,
    pub type_params: Vec<TypeParam>,
    pub args: Arguments,
    pub body: Vec<StmtLoc>,
    pub decorator_list: Vec<ExprLoc>,
    pub returns: Option<ExprLoc>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassDef {
    pub name: StringId,
    pub type_params: Vec<TypeParam>,
    pub bases: Vec<ExprLoc>,
    pub keywords: Vec<Keyword>,
    pub body: Vec<StmtLoc>,
    pub decorator_list: Vec<ExprLoc>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Stmt {
    FunctionDef(Box<FunctionDef>),
    ClassDef(Box<ClassDef>),
    Return(Option<ExprLoc>),
    Delete(Vec<ExprLoc>),
    Assign {
        targets: Vec<ExprLoc>,
        value: ExprLoc,
    },
    TypeAlias {
        name: ExprLoc,
        type_params: Vec<TypeParam>,
        value: ExprLoc,
    },
    AugAssign {
        target: ExprLoc,
        op: Operator,
        value: ExprLoc,
    },
    /// `simple` is set when the target is a bare, unparenthesized name.
    AnnAssign {
        target: ExprLoc,
        annotation: ExprLoc,
        value: Option<ExprLoc>,
        simple: bool,
    },
    For {
        target: ExprLoc,
        iter: ExprLoc,
        body: Vec<StmtLoc>,
        orelse: Vec<StmtLoc>,
        is_async: bool,
    },
    While {
        test: ExprLoc,
        body: Vec<StmtLoc>,
        orelse: Vec<StmtLoc>,
    },
    If {
        test: ExprLoc,
        body: Vec<StmtLoc>,
        orelse: Vec<StmtLoc>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<StmtLoc>,
        is_async: bool,
    },
    Match {
        subject: ExprLoc,
        cases: Vec<MatchCase>,
    },
    Raise {
        exc: Option<ExprLoc>,
        cause: Option<ExprLoc>,
    },
    /// `is_star` marks `except*` handlers.
    Try {
        body: Vec<StmtLoc>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<StmtLoc>,
        finalbody: Vec<StmtLoc>,
        is_star: bool,
    },
    Assert {
        test: ExprLoc,
        msg: Option<ExprLoc>,
    },
    Import(Vec<Alias>),
    ImportFrom {
        module: Option<StringId>,
        names: Vec<Alias>,
        level: u32,
    },
    Global(Vec<StringId>),
    Nonlocal(Vec<StringId>),
    Expr(ExprLoc),
    Pass,
    Break,
    Continue,
}

/// A statement with its source location.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StmtLoc {
    pub position: SourceRange,
    pub stmt: Stmt,
}

impl StmtLoc {
    #[must_use]
    pub fn new(position: SourceRange, stmt: Stmt) -> Self {
        Self { position, stmt }
    }
}

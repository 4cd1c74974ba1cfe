//! Diagnostics produced by the tokenizer, the grammar engine and the scope builder.
//!
//! Every message text is part of the external compatibility surface: callers compare
//! them byte for byte against CPython. The texts therefore live in exactly one place,
//! the [`ErrorMessage`] table, and are only ever filled in by positional substitution.

use std::fmt;

use strum::{Display, IntoStaticStr};

/// Source location: 1-based line and 0-based column (UTF-8 byte offset within the line).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open span of source text.
///
/// Offsets are UTF-8 byte offsets into the compilation unit. The line/column pairs
/// describe the same span and are kept alongside so diagnostics never need the source
/// text to be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRange {
    pub start_offset: u32,
    pub end_offset: u32,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceRange {
    #[must_use]
    pub const fn new(start_offset: u32, end_offset: u32, start: CodeLoc, end: CodeLoc) -> Self {
        Self {
            start_offset,
            end_offset,
            start_line: start.line,
            start_col: start.column,
            end_line: end.line,
            end_col: end.column,
        }
    }

    /// Zero-width range positioned at the start of `self`.
    #[must_use]
    pub const fn start_point(self) -> Self {
        Self {
            start_offset: self.start_offset,
            end_offset: self.start_offset,
            start_line: self.start_line,
            start_col: self.start_col,
            end_line: self.start_line,
            end_col: self.start_col,
        }
    }

    /// Zero-width range positioned at the end of `self`.
    #[must_use]
    pub const fn end_point(self) -> Self {
        Self {
            start_offset: self.end_offset,
            end_offset: self.end_offset,
            start_line: self.end_line,
            start_col: self.end_col,
            end_line: self.end_line,
            end_col: self.end_col,
        }
    }

    /// Range spanning from the start of `self` to the end of `other`.
    #[must_use]
    pub const fn to(self, other: Self) -> Self {
        Self {
            start_offset: self.start_offset,
            end_offset: other.end_offset,
            start_line: self.start_line,
            start_col: self.start_col,
            end_line: other.end_line,
            end_col: other.end_col,
        }
    }

    #[must_use]
    pub const fn start(&self) -> CodeLoc {
        CodeLoc::new(self.start_line, self.start_col)
    }

    #[must_use]
    pub const fn end(&self) -> CodeLoc {
        CodeLoc::new(self.end_line, self.end_col)
    }

    /// Whether `inner` lies entirely within `self`.
    #[must_use]
    pub fn contains(&self, inner: &Self) -> bool {
        self.start_offset <= inner.start_offset && inner.end_offset <= self.end_offset
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start(), self.end())
    }
}

/// The two error classes the front-end reports.
///
/// `Indentation` is a strict refinement of `Syntax`, mirroring `IndentationError`
/// being a subclass of `SyntaxError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    #[strum(serialize = "SyntaxError")]
    Syntax,
    #[strum(serialize = "IndentationError")]
    Indentation,
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub source_range: SourceRange,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(kind: ErrorKind, source_range: SourceRange, message: impl Into<String>) -> Self {
        Self {
            kind,
            source_range,
            message: message.into(),
        }
    }

    /// Serializes the record in its external JSON shape.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind,
            "sourceRange": self.source_range,
            "message": self.message,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (line {}, column {})",
            self.kind,
            self.message,
            self.source_range.start_line,
            self.source_range.start_col + 1
        )
    }
}

/// Append-only collector of diagnostics for a single compilation unit.
///
/// The grammar engine and the scope builder write into the same sink so callers get
/// one ordered list. Nothing is ever removed: "report only the first error" is a
/// caller policy.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: ErrorKind, range: SourceRange, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, range, message));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Diagnostic> {
        self.diagnostics.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Error returned by [`crate::CompileOutput::into_result`] when any diagnostic was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    /// Returns `None` when `diagnostics` is empty.
    #[must_use]
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Option<Self> {
        if diagnostics.is_empty() {
            None
        } else {
            Some(Self { diagnostics })
        }
    }

    #[must_use]
    pub fn first(&self) -> &Diagnostic {
        &self.diagnostics[0]
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first())?;
        if self.diagnostics.len() > 1 {
            write!(f, " (and {} more)", self.diagnostics.len() - 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Every message the front-end can emit, keyed by kind.
///
/// `%s` marks a positional argument filled by [`ErrorMessage::format`]. The strings
/// match CPython byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum ErrorMessage {
    // tokenizer
    #[strum(serialize = "unterminated string literal (detected at line %s)")]
    UnterminatedString,
    #[strum(serialize = "unterminated triple-quoted string literal (detected at line %s)")]
    UnterminatedTripleQuotedString,
    #[strum(serialize = "invalid %s literal")]
    InvalidNumberLiteral,
    #[strum(serialize = "invalid digit '%s' in %s literal")]
    InvalidDigit,
    #[strum(serialize = "leading zeros in decimal integer literals are not permitted; use an 0o prefix for octal integers")]
    LeadingZeros,
    #[strum(serialize = "unmatched '%s'")]
    UnmatchedBracket,
    #[strum(serialize = "closing parenthesis '%s' does not match opening parenthesis '%s'")]
    MismatchedBracket,
    #[strum(serialize = "closing parenthesis '%s' does not match opening parenthesis '%s' on line %s")]
    MismatchedBracketOnLine,
    #[strum(serialize = "'%s' was never closed")]
    NeverClosed,
    #[strum(serialize = "unexpected character after line continuation character")]
    UnexpectedAfterContinuation,
    #[strum(serialize = "invalid character '%s' (U+%s)")]
    InvalidCharacter,
    #[strum(serialize = "unexpected EOF while parsing")]
    UnexpectedEof,
    #[strum(serialize = "too many nested parentheses")]
    TooManyNestedParens,
    #[strum(serialize = "unindent does not match any outer indentation level")]
    UnindentMismatch,
    #[strum(serialize = "inconsistent use of tabs and spaces in indentation")]
    InconsistentTabs,
    #[strum(serialize = "too many levels of indentation")]
    TooDeepIndentation,

    // grammar engine, generic
    #[strum(serialize = "invalid syntax")]
    InvalidSyntax,
    #[strum(serialize = "unexpected indent")]
    UnexpectedIndent,
    #[strum(serialize = "unexpected unindent")]
    UnexpectedUnindent,
    #[strum(serialize = "expected ':'")]
    ExpectedColon,
    #[strum(serialize = "expected '%s'")]
    ExpectedToken,
    #[strum(serialize = "expected an indented block after %s on line %s")]
    ExpectedIndentedBlock,
    #[strum(serialize = "expected an indented block")]
    ExpectedIndentedBlockPlain,
    #[strum(serialize = "multiple statements found while compiling a single statement")]
    MultipleStatements,
    #[strum(serialize = "invalid syntax. Perhaps you forgot a comma?")]
    ForgotComma,

    // targets
    #[strum(serialize = "cannot assign to %s")]
    CannotAssignTo,
    #[strum(serialize = "cannot assign to %s here. Maybe you meant '==' instead of '='?")]
    CannotAssignHere,
    #[strum(serialize = "cannot delete %s")]
    CannotDelete,
    #[strum(serialize = "'%s' is an illegal expression for augmented assignment")]
    IllegalAugAssign,
    #[strum(serialize = "only single target (not %s) can be annotated")]
    OnlySingleTargetAnnotated,
    #[strum(serialize = "illegal target for annotation")]
    IllegalAnnotationTarget,
    #[strum(serialize = "assignment to yield expression not possible")]
    AssignToYield,
    #[strum(serialize = "cannot use assignment expressions with %s")]
    NamedExprTarget,
    #[strum(serialize = "invalid syntax. Maybe you meant '==' or ':=' instead of '='?")]
    MaybeMeantEquality,
    #[strum(serialize = "expression cannot contain assignment, perhaps you meant \"==\"?")]
    KeywordAssignment,
    #[strum(serialize = "cannot use starred expression here")]
    StarredHere,
    #[strum(serialize = "cannot use double starred expression here")]
    DoubleStarredHere,
    #[strum(serialize = "trailing comma not allowed without surrounding parentheses")]
    TrailingCommaImport,

    // calls and comprehensions
    #[strum(serialize = "positional argument follows keyword argument")]
    PositionalAfterKeyword,
    #[strum(serialize = "positional argument follows keyword argument unpacking")]
    PositionalAfterKwUnpack,
    #[strum(serialize = "iterable argument unpacking follows keyword argument unpacking")]
    IterableAfterKwUnpack,
    #[strum(serialize = "Generator expression must be parenthesized")]
    GeneratorNotParenthesized,
    #[strum(serialize = "expected 'else' after 'if' expression")]
    ExpectedElse,
    #[strum(serialize = "Missing parentheses in call to '%s'. Did you mean %s(...)?")]
    MissingParens,
    #[strum(serialize = "iterable unpacking cannot be used in comprehension")]
    UnpackInComprehension,
    #[strum(serialize = "did you forget parentheses around the comprehension target?")]
    ComprehensionTargetParens,
    #[strum(serialize = "dict unpacking cannot be used in dict comprehension")]
    DictUnpackInComprehension,
    #[strum(serialize = "cannot use a starred expression in a dictionary value")]
    StarredDictValue,
    #[strum(serialize = "expression expected after dictionary key and ':'")]
    DictValueExpected,
    #[strum(serialize = "':' expected after dictionary key")]
    DictColonExpected,

    // statements
    #[strum(serialize = "multiple exception types must be parenthesized")]
    ExceptTypesParens,
    #[strum(serialize = "expected 'except' or 'finally' block")]
    ExpectedExceptOrFinally,
    #[strum(serialize = "non-default argument follows default argument")]
    NonDefaultAfterDefault,
    #[strum(serialize = "named arguments must follow bare *")]
    BareStar,
    #[strum(serialize = "at least one argument must precede /")]
    SlashFirst,
    #[strum(serialize = "/ may appear only once")]
    SlashTwice,
    #[strum(serialize = "* argument may appear only once")]
    StarTwice,
    #[strum(serialize = "/ must be ahead of *")]
    SlashAfterStar,
    #[strum(serialize = "'%s' outside function")]
    OutsideFunction,
    #[strum(serialize = "%s parameters cannot be parenthesized")]
    ParamsParenthesized,
    #[strum(serialize = "var-positional argument cannot have default value")]
    VarPositionalDefault,
    #[strum(serialize = "var-keyword argument cannot have default value")]
    VarKeywordDefault,
    #[strum(serialize = "arguments cannot follow var-keyword argument")]
    ArgsAfterVarKeyword,
    #[strum(serialize = "expected default value expression")]
    ExpectedDefault,
    #[strum(serialize = "cannot have both 'except' and 'except*' on the same 'try'")]
    MixedExceptStar,
    #[strum(serialize = "expected one or more exception types")]
    ExpectedExceptionTypes,
    #[strum(serialize = "expected comma between / and *")]
    SlashStarComma,
    #[strum(serialize = "cannot use bound with TypeVarTuple")]
    TypeVarTupleBound,
    #[strum(serialize = "cannot use bound with ParamSpec")]
    ParamSpecBound,

    // patterns
    #[strum(serialize = "cannot use '_' as a target")]
    UnderscoreTarget,
    #[strum(serialize = "invalid pattern target")]
    InvalidPatternTarget,
    #[strum(serialize = "real number required in complex literal")]
    RealRequired,
    #[strum(serialize = "imaginary number required in complex literal")]
    ImaginaryRequired,
    #[strum(serialize = "positional patterns follow keyword patterns")]
    PositionalPatternAfterKeyword,

    // strings
    #[strum(serialize = "bytes can only contain ASCII literal characters")]
    BytesNonAscii,
    #[strum(serialize = "(value error) invalid \\x escape at position %s")]
    BytesEscape,
    #[strum(serialize = "cannot mix bytes and nonbytes literals")]
    MixedBytes,
    #[strum(serialize = "(unicode error) 'unicodeescape' codec can't decode bytes in position %s-%s: %s")]
    UnicodeEscape,
    #[strum(serialize = "f-string: expecting '}'")]
    FStringExpectingBrace,
    #[strum(serialize = "f-string: single '}' is not allowed")]
    FStringSingleBrace,
    #[strum(serialize = "f-string: empty expression not allowed")]
    FStringEmpty,
    #[strum(serialize = "f-string: invalid conversion character %s: expected 's', 'r', or 'a'")]
    FStringConversion,
    #[strum(serialize = "f-string expression part cannot include a backslash")]
    FStringBackslash,
    #[strum(serialize = "f-string expression part cannot include '#'")]
    FStringComment,
    #[strum(serialize = "f-string: expressions nested too deeply")]
    FStringTooDeep,

    // scope analysis
    #[strum(serialize = "no binding for nonlocal '%s' found")]
    NonlocalNoBinding,
    #[strum(serialize = "nonlocal declaration not allowed at module level")]
    NonlocalAtModule,
    #[strum(serialize = "name '%s' is nonlocal and global")]
    NonlocalAndGlobal,
    #[strum(serialize = "name '%s' is parameter and global")]
    ParameterAndGlobal,
    #[strum(serialize = "name '%s' is parameter and nonlocal")]
    ParameterAndNonlocal,
    #[strum(serialize = "annotated name '%s' can't be global")]
    AnnotatedGlobal,
    #[strum(serialize = "annotated name '%s' can't be nonlocal")]
    AnnotatedNonlocal,
    #[strum(serialize = "duplicate argument '%s' in function definition")]
    DuplicateArgument,
    #[strum(serialize = "import * only allowed at module level")]
    ImportStarNotModule,
    #[strum(serialize = "'yield' inside %s")]
    YieldInComprehension,
    #[strum(serialize = "'await' outside async function")]
    AwaitOutsideAsync,
    #[strum(serialize = "'%s' outside async function")]
    AsyncStmtOutsideAsync,
    #[strum(serialize = "asynchronous comprehension outside of an asynchronous function")]
    AsyncComprehensionOutsideAsync,
    #[strum(serialize = "'break' outside loop")]
    BreakOutsideLoop,
    #[strum(serialize = "'continue' not properly in loop")]
    ContinueOutsideLoop,
    #[strum(serialize = "assignment expression within a comprehension cannot be used in a class body")]
    NamedExprInClassComprehension,
    #[strum(serialize = "assignment expression cannot rebind comprehension iteration variable '%s'")]
    NamedExprRebindsIter,
    #[strum(serialize = "comprehension inner loop cannot rebind assignment expression target '%s'")]
    IterRebindsNamedExpr,
    #[strum(serialize = "assignment expression cannot be used in a comprehension iterable expression")]
    NamedExprInIterable,
}

impl ErrorMessage {
    /// The raw template, `%s` placeholders included.
    #[must_use]
    pub fn template(self) -> &'static str {
        self.into()
    }

    /// Fills the `%s` placeholders left to right.
    ///
    /// Missing arguments leave the placeholder untouched; extra arguments are ignored.
    #[must_use]
    pub fn format(self, args: &[&str]) -> String {
        let template = self.template();
        let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
        let mut args = args.iter();
        let mut rest = template;
        while let Some(idx) = rest.find("%s") {
            out.push_str(&rest[..idx]);
            match args.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str("%s"),
            }
            rest = &rest[idx + 2..];
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_fills_placeholders_in_order() {
        assert_eq!(
            ErrorMessage::MismatchedBracketOnLine.format(&["]", "(", "3"]),
            "closing parenthesis ']' does not match opening parenthesis '(' on line 3"
        );
        assert_eq!(ErrorMessage::NonlocalNoBinding.format(&["x"]), "no binding for nonlocal 'x' found");
    }

    #[test]
    fn format_without_placeholders_is_identity() {
        assert_eq!(ErrorMessage::InvalidSyntax.format(&[]), "invalid syntax");
    }

    #[test]
    fn range_containment() {
        let outer = SourceRange::new(0, 10, CodeLoc::new(1, 0), CodeLoc::new(1, 10));
        let inner = SourceRange::new(2, 5, CodeLoc::new(1, 2), CodeLoc::new(1, 5));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains(&outer.end_point()));
    }

    #[test]
    fn diagnostic_json_shape() {
        let range = SourceRange::new(4, 5, CodeLoc::new(2, 0), CodeLoc::new(2, 1));
        let diag = Diagnostic::new(ErrorKind::Indentation, range, "unexpected indent");
        let json = diag.to_json();
        assert_eq!(json["kind"], "Indentation");
        assert_eq!(json["sourceRange"]["startLine"], 2);
        assert_eq!(json["sourceRange"]["endOffset"], 5);
        assert_eq!(json["message"], "unexpected indent");
    }
}

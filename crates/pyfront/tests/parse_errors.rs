use pretty_assertions::assert_eq;
use pyfront::{CodeLoc, Diagnostic, ErrorKind, InputKind, Mod, ParseOptions, dump_tree, parse};

/// Parses `source` as a module and returns the single reported diagnostic.
fn first_error(source: &str) -> Diagnostic {
    first_error_with(source, &ParseOptions::default())
}

fn first_error_with(source: &str, options: &ParseOptions) -> Diagnostic {
    let output = parse(source, options);
    assert!(output.module.is_none(), "expected a parse error for {source:?}");
    assert_eq!(output.diagnostics.len(), 1, "only the first error is reported: {:?}", output.diagnostics);
    output.diagnostics.into_iter().next().expect("one diagnostic")
}

fn assert_syntax_error(source: &str, message: &str) {
    let error = first_error(source);
    assert_eq!(error.kind, ErrorKind::Syntax, "source: {source:?}");
    assert_eq!(error.message, message, "source: {source:?}");
}

#[test]
fn valid_module_has_no_diagnostics() {
    let output = parse("x = 1\nif x:\n    pass\n", &ParseOptions::default());
    assert!(output.diagnostics.is_empty());
    assert!(matches!(output.module, Some(Mod::Module(ref body)) if body.len() == 2));
}

#[test]
fn empty_source_is_an_empty_module() {
    let output = parse("", &ParseOptions::default());
    assert!(matches!(output.module, Some(Mod::Module(ref body)) if body.is_empty()));
    let output = parse("# only a comment\n\n", &ParseOptions::default());
    assert!(matches!(output.module, Some(Mod::Module(ref body)) if body.is_empty()));
}

/// With no targeted message, the error points at the furthest token reached.
#[test]
fn generic_invalid_syntax_location() {
    let error = first_error("a b\n");
    assert_eq!(error.message, "invalid syntax");
    assert_eq!(error.source_range.start(), CodeLoc::new(1, 2));
}

#[test]
fn forgotten_comma_inside_brackets() {
    let error = first_error("[a b]\n");
    assert_eq!(error.message, "invalid syntax. Perhaps you forgot a comma?");
    assert_eq!(error.source_range.start(), CodeLoc::new(1, 1));
    assert_eq!(error.source_range.end(), CodeLoc::new(1, 4));
}

#[test]
fn assignment_target_errors() {
    assert_syntax_error("f() = 1\n", "cannot assign to function call here. Maybe you meant '==' instead of '='?");
    assert_syntax_error("del f()\n", "cannot delete function call");
    assert_syntax_error("x + 1 += 1\n", "'expression' is an illegal expression for augmented assignment");
    assert_syntax_error("a, b: int\n", "only single target (not tuple) can be annotated");
}

#[test]
fn missing_parentheses_in_print() {
    let error = first_error("print \"hello\"\n");
    assert_eq!(error.message, "Missing parentheses in call to 'print'. Did you mean print(...)?");
    assert_eq!(error.source_range.start(), CodeLoc::new(1, 0));
    assert_eq!(error.source_range.end(), CodeLoc::new(1, 13));
}

#[test]
fn conditional_expression_without_else() {
    assert_syntax_error("x = 1 if y\n", "expected 'else' after 'if' expression");
}

#[test]
fn missing_colon() {
    assert_syntax_error("if x\n    pass\n", "expected ':'");
    assert_syntax_error("def f()\n    pass\n", "expected ':'");
}

#[test]
fn missing_indented_block() {
    let error = first_error("def f():\npass\n");
    assert_eq!(error.kind, ErrorKind::Indentation);
    assert_eq!(error.message, "expected an indented block after function definition on line 1");
    assert_eq!(error.source_range.start_line, 2);

    let error = first_error("for x in y:\n\nz\n");
    assert_eq!(error.kind, ErrorKind::Indentation);
    assert_eq!(error.message, "expected an indented block after 'for' statement on line 1");
}

#[test]
fn unexpected_indent() {
    let error = first_error("x = 1\n    y = 2\n");
    assert_eq!(error.kind, ErrorKind::Indentation);
    assert_eq!(error.message, "unexpected indent");
}

#[test]
fn try_without_handlers() {
    assert_syntax_error("try:\n    pass\nx = 1\n", "expected 'except' or 'finally' block");
}

#[test]
fn parameter_ordering() {
    assert_syntax_error("def f(a=1, b): pass\n", "non-default argument follows default argument");
    assert_syntax_error("def f(*, **k): pass\n", "named arguments must follow bare *");
    assert_syntax_error("def f(/, a): pass\n", "at least one argument must precede /");
    assert_syntax_error("def f(**k, a): pass\n", "arguments cannot follow var-keyword argument");
    assert_syntax_error("def f(*a=1): pass\n", "var-positional argument cannot have default value");
    assert_syntax_error("lambda (a, b): a\n", "Lambda expression parameters cannot be parenthesized");
}

#[test]
fn call_argument_ordering() {
    assert_syntax_error("f(a=1, b)\n", "positional argument follows keyword argument");
    assert_syntax_error("f(**k, b)\n", "positional argument follows keyword argument unpacking");
    assert_syntax_error("f(x for x in y, 1)\n", "Generator expression must be parenthesized");
    assert_syntax_error("f(True=1)\n", "cannot assign to True");
}

/// Lexical errors surface as the parse diagnostic, with the tokenizer's message.
#[test]
fn lexical_errors_are_reported() {
    assert_syntax_error("x = 'abc\n", "unterminated string literal (detected at line 1)");
    assert_syntax_error("x = 0777\n", "leading zeros in decimal integer literals are not permitted; use an 0o prefix for octal integers");
    let error = first_error("x = (1,\n2\n");
    assert_eq!(error.message, "'(' was never closed");
    assert_eq!(error.source_range.start(), CodeLoc::new(1, 4));
}

#[test]
fn lexical_error_after_the_failure_wins() {
    // the generic message is replaced by the tokenizer error later in the file
    assert_syntax_error("a b\nc = 'oops\n", "unterminated string literal (detected at line 2)");
}

#[test]
fn fstring_errors() {
    assert_syntax_error("f'{}'\n", "f-string: empty expression not allowed");
    assert_syntax_error("f'{x!z}'\n", "f-string: invalid conversion character 'z': expected 's', 'r', or 'a'");
    assert_syntax_error("f'{x'\n", "f-string: expecting '}'");
    assert_syntax_error("f'}'\n", "f-string: single '}' is not allowed");
}

#[test]
fn string_literal_errors() {
    assert_syntax_error("b'é'\n", "bytes can only contain ASCII literal characters");
    assert_syntax_error("'a' b'b'\n", "cannot mix bytes and nonbytes literals");
}

#[test]
fn escape_errors() {
    assert_syntax_error(
        "x = '\\U00110000'\n",
        "(unicode error) 'unicodeescape' codec can't decode bytes in position 0-9: illegal Unicode character",
    );
    assert_syntax_error(
        "x = 'a\\N{NOT A NAME}'\n",
        "(unicode error) 'unicodeescape' codec can't decode bytes in position 1-14: unknown Unicode character name",
    );
    let output = parse("x = '\\ud800' '\\N{snowman}'\n", &ParseOptions::default());
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
}

/// Each diagnostic points where CPython puts its caret.
#[test]
fn error_columns() {
    let cases = [
        ("0b102\n", "invalid digit '2' in binary literal", 4),
        ("1__0\n", "invalid decimal literal", 1),
        ("x = 0x\n", "invalid hexadecimal literal", 5),
        ("x = 1 \\ 2\n", "unexpected character after line continuation character", 7),
        ("\"a\" b\"b\"\n", "cannot mix bytes and nonbytes literals", 8),
        ("f(**k, *a)\n", "iterable argument unpacking follows keyword argument unpacking", 7),
        ("f(a=1, b)\n", "positional argument follows keyword argument", 8),
        ("f'{}'\n", "f-string: empty expression not allowed", 3),
        ("f'}'\n", "f-string: single '}' is not allowed", 2),
        ("f'{x!z}'\n", "f-string: invalid conversion character 'z': expected 's', 'r', or 'a'", 5),
    ];
    for (source, message, column) in cases {
        let error = first_error(source);
        assert_eq!(error.message, message, "source: {source:?}");
        assert_eq!(error.source_range.start(), CodeLoc::new(1, column), "source: {source:?}");
    }
}

#[test]
fn match_pattern_errors() {
    assert_syntax_error("match x:\n    case _ as _:\n        pass\n", "cannot use '_' as a target");
    assert_syntax_error("match x:\n    case 1 as 1:\n        pass\n", "invalid pattern target");
    assert_syntax_error("match x:\n    case 1j + 2j:\n        pass\n", "real number required in complex literal");
    assert_syntax_error("match x:\n    case 1 + 1:\n        pass\n", "imaginary number required in complex literal");
}

#[test]
fn integer_literals_at_the_i32_and_i64_limits() {
    for value in ["2147483647", "2147483648", "9223372036854775807", "9223372036854775808"] {
        let source = format!("x = {value}\n");
        let output = parse(&source, &ParseOptions::default());
        assert!(output.diagnostics.is_empty(), "{source:?}: {:?}", output.diagnostics);
        let module = output.module.expect("module without diagnostics");
        let tree = dump_tree(&module, &output.interner, false);
        assert!(tree.contains(&format!("Constant value={value}\n")), "{tree}");
    }
}

/// Left-nested chains charge the nesting budget per link, so a huge chain fails with a
/// diagnostic instead of exhausting the stack.
#[test]
fn long_chains_hit_the_nesting_limit() {
    let sum = vec!["1"; 10_000].join(" + ");
    let error = first_error(&format!("x = {sum}\n"));
    assert_eq!(error.message, "too many nested parentheses");
    let attributes = format!("x = a{}\n", ".b".repeat(50_000));
    let error = first_error(&attributes);
    assert_eq!(error.message, "too many nested parentheses");
    let calls = format!("x = f{}\n", "()".repeat(50_000));
    let error = first_error(&calls);
    assert_eq!(error.message, "too many nested parentheses");

    let short = vec!["1"; 20].join(" + ");
    let output = parse(&format!("x = {short}\ny = a.b.c.d.e\n"), &ParseOptions::default());
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
}

#[test]
fn nesting_limit_is_configurable() {
    let options = ParseOptions::default().max_nesting_depth(5);
    let error = first_error_with("x = ((((((((1))))))))\n", &options);
    assert_eq!(error.message, "too many nested parentheses");
    let output = parse("x = ((1))\n", &options);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn eval_mode_accepts_one_expression() {
    let options = ParseOptions::new(InputKind::Eval);
    let output = parse("1 + 2\n", &options);
    assert!(matches!(output.module, Some(Mod::Expression(_))));
    let error = first_error_with("x = 1\n", &options);
    assert_eq!(error.message, "invalid syntax");
}

#[test]
fn single_mode_rejects_multiple_statements() {
    let options = ParseOptions::new(InputKind::Single);
    let output = parse("if x:\n    y\n\n", &options);
    assert!(matches!(output.module, Some(Mod::Interactive(ref body)) if body.len() == 1));
    let error = first_error_with("x = 1\ny = 2\n", &options);
    assert_eq!(error.message, "multiple statements found while compiling a single statement");
}

#[test]
fn function_type_mode() {
    let options = ParseOptions::new(InputKind::FunctionType);
    let output = parse("(int, *str) -> bool", &options);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let Some(Mod::FunctionType { argtypes, .. }) = output.module else {
        panic!("expected a function type");
    };
    assert_eq!(argtypes.len(), 2);
}

#[test]
fn diagnostic_display() {
    let error = first_error("x = (1,\n2\n");
    assert_eq!(error.to_string(), "SyntaxError: '(' was never closed (line 1, column 5)");
}

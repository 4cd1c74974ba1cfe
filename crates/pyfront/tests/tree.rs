use pretty_assertions::assert_eq;
use pyfront::{InputKind, Mod, ParseOptions, check_ranges, dump_tree, parse, unparse};

/// Parses `source`, failing the test on any diagnostic.
fn parse_ok(source: &str, options: &ParseOptions) -> (Mod, pyfront::InternerBuilder) {
    let output = parse(source, options);
    assert!(output.diagnostics.is_empty(), "{source:?}: {:?}", output.diagnostics);
    (output.module.expect("module without diagnostics"), output.interner)
}

fn dump(source: &str, with_ranges: bool) -> String {
    let (module, interner) = parse_ok(source, &ParseOptions::default());
    dump_tree(&module, &interner, with_ranges)
}

/// Unparses `source` and checks the regenerated text parses to the same tree.
fn assert_round_trip_with(source: &str, options: &ParseOptions) -> String {
    let (module, interner) = parse_ok(source, options);
    let text = unparse(&module, &interner);
    let (reparsed, reinterner) = parse_ok(&text, options);
    assert_eq!(
        dump_tree(&module, &interner, false),
        dump_tree(&reparsed, &reinterner, false),
        "round trip changed the tree; regenerated text:\n{text}"
    );
    text
}

fn assert_round_trip(source: &str) -> String {
    assert_round_trip_with(source, &ParseOptions::default())
}

#[test]
fn dump_with_ranges() {
    assert_eq!(
        dump("x = 1\n", true),
        "\
Module
  body:
    Assign @1:0-1:5
      targets:
        Name id='x' ctx=Store @1:0-1:1
      value: Constant value=1 @1:4-1:5
"
    );
}

#[test]
fn dump_function_arguments() {
    assert_eq!(
        dump("def f(a, *, b=1):\n    return a\n", false),
        "\
Module
  body:
    FunctionDef name='f'
      args: arguments
        args:
          arg arg='a'
        kwonlyargs:
          arg arg='b'
        kw_defaults:
          Constant value=1
      body:
        Return
          value: Name id='a' ctx=Load
"
    );
}

/// Unary minus is never folded into the literal, and big integers keep every digit.
#[test]
fn dump_numeric_literals() {
    assert_eq!(
        dump("-1\n123456789012345678901234567890\n", false),
        "\
Module
  body:
    Expr
      value: UnaryOp op=USub
        operand: Constant value=1
    Expr
      value: Constant value=123456789012345678901234567890
"
    );
}

#[test]
fn implicit_concatenation_is_one_constant() {
    assert_eq!(
        dump("'a' \"b\"\n", false),
        "\
Module
  body:
    Expr
      value: Constant value='ab'
"
    );
}

#[test]
fn unparse_adds_only_needed_parentheses() {
    assert_eq!(assert_round_trip("x = (1 + 2) * 3\n"), "x = (1 + 2) * 3\n");
    assert_eq!(assert_round_trip("x = 1 + (2 * 3)\n"), "x = 1 + 2 * 3\n");
    assert_eq!(assert_round_trip("y = (-x) ** 2\n"), "y = (-x) ** 2\n");
    assert_eq!(assert_round_trip("y = 2 ** (3 ** 4)\n"), "y = 2 ** 3 ** 4\n");
    assert_eq!(assert_round_trip("z = (a, b)\n"), "z = a, b\n");
}

#[test]
fn unparse_elif_chain() {
    let source = "if a:\n    pass\nelif b:\n    x = 1\nelse:\n    y = 2\n";
    assert_eq!(assert_round_trip(source), source);
}

/// `yield` stays bare only as a statement or an assigned value.
#[test]
fn unparse_parenthesizes_yield() {
    let source = "def f():\n    return (yield 1)\n";
    assert_eq!(assert_round_trip(source), source);
    let source = "def g():\n    for x in (yield from y):\n        pass\n";
    assert_eq!(assert_round_trip(source), source);
    let source = "def h():\n    x = yield 1\n    yield\n    x += yield\n    y: int = yield from z\n";
    assert_eq!(assert_round_trip(source), source);
}

#[test]
fn surrogate_escapes_are_kept() {
    let tree = dump("x = '\\ud800' 'a'\n", false);
    assert!(tree.contains("Constant value='\\ud800a'"), "{tree}");
    assert_eq!(assert_round_trip("x = '\\ud800a'\n"), "x = '\\ud800a'\n");
    assert_eq!(assert_round_trip("f'\\udfff{x}'\n"), "f'\\udfff{x}'\n");
    let tree = dump("'\\N{EM DASH}\\N{snowman}'\n", false);
    assert!(tree.contains("Constant value='\u{2014}\u{2603}'"), "{tree}");
}

#[test]
fn unparse_fstring_picks_quotes() {
    assert_eq!(assert_round_trip("f'{x!r:>10}'\n"), "f'{x!r:>10}'\n");
    assert_eq!(assert_round_trip("f\"{d['k']} {{}}\"\n"), "f\"{d['k']} {{}}\"\n");
}

#[test]
fn round_trip_statements() {
    let sources = [
        "import a.b as c, d\nfrom .. import e\nfrom .f import (g, h as i)\n",
        "@dec\n@dec2(1)\nclass C(B, metaclass=M):\n    '''doc'''\n    def m(self, /, a: int = 1, *args, k, **kw) -> None:\n        return\n",
        "async def f():\n    async with a as b, c:\n        await d\n    async for x in y:\n        pass\n",
        "try:\n    pass\nexcept (A, B) as e:\n    raise C from e\nelse:\n    pass\nfinally:\n    del x, y[0]\n",
        "try:\n    pass\nexcept* A:\n    pass\n",
        "while x:\n    break\nelse:\n    continue\n",
        "for i, j in enumerate(z):\n    global g\n    assert i, 'msg'\n",
        "x: int = 5\n(y): str\na.b: float\nc[0] += 1\nd = e = f\n",
        "def g():\n    x = yield\n    y = yield from z\n    nonlocal_free = lambda a, *b, c=1, **d: (a, b, c, d)\n",
        "type Alias[T: int, *Ts, **P] = list[T]\ndef h[T](x: T) -> T:\n    return x\n",
    ];
    for source in sources {
        assert_round_trip(source);
    }
}

#[test]
fn round_trip_expressions() {
    let sources = [
        "x = [i for i in range(10) if i % 2 if i > 3]\n",
        "x = {k: v for k, v in d.items()}\n",
        "x = {a, *b}\nx = {**a, 'b': 1}\nx = (i async for i in j)\n",
        "print(*args, sep='', **kw)\n",
        "x = a if b else c if d else e\n",
        "x = not a and (b or c)\n",
        "x = a < b <= c is not d not in e\n",
        "x = a[1:2, ::3]\nx = a[()]\nx = a[b, ]\n",
        "x = 1 .real\nx = 1.5e-07\nx = 3j\nx = 0xff\nx = 1_000\n",
        "if (n := len(a)) > 10:\n    pass\n",
        "x = b'\\x00\\n' + 'tab\\there'\n",
        "x = f'{a}{b!s}{c:{w}.{p}}'\n",
        "x = (yield)\n",
        "x = ~a | b ^ c & d << e >> f\n",
    ];
    for source in sources {
        assert_round_trip(source);
    }
}

#[test]
fn round_trip_match_statement() {
    let source = "\
match command.split():
    case [action]:
        pass
    case [action, obj] if obj:
        pass
    case Point(x=0, y=0) | Point(1, 2):
        pass
    case {'key': value, **rest}:
        pass
    case [1, *others] as whole:
        pass
    case None | True | -1 | 1 + 2j | 'text':
        pass
    case _:
        pass
";
    assert_round_trip(source);
}

#[test]
fn round_trip_other_modes() {
    assert_round_trip_with("a if b else c", &ParseOptions::new(InputKind::Eval));
    assert_round_trip_with("(int, *str) -> bool", &ParseOptions::new(InputKind::FunctionType));
}

/// Every node of a parsed tree lies within its parent's range.
#[test]
fn parsed_tree_ranges_nest() {
    let source = "\
@decorator
class C(Base, metaclass=Meta):
    def method(self, a: int = 1, *args, **kwargs) -> None:
        return [x * y for x in a if x for y in args]

with open(path) as f, lock:
    data = f'{f.read()!r:>{width}}'

match value:
    case Point(x=0) | [1, *rest] as p:
        pass
";
    let (module, _) = parse_ok(source, &ParseOptions::default());
    let violations = check_ranges(&module);
    assert!(violations.is_empty(), "{violations:?}");
}

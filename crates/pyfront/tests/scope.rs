use pretty_assertions::assert_eq;
use pyfront::{
    BindingKind, ErrorKind, ParseOptions, ScopeId, ScopeKind, ScopeTree, compile,
    scope::{ScopeFlags, mangle},
};

/// Compiles `source`, failing the test on any diagnostic.
fn scopes(source: &str) -> ScopeTree {
    let output = compile(source, &ParseOptions::default());
    assert!(output.diagnostics.is_empty(), "{source:?}: {:?}", output.diagnostics);
    output.scopes.expect("scopes for a parsed module")
}

/// Follows child indexes from the module scope.
fn scope_at(tree: &ScopeTree, path: &[usize]) -> ScopeId {
    path.iter().fold(tree.module(), |id, &i| tree.children(id)[i])
}

fn first_scope_error(source: &str) -> String {
    let output = compile(source, &ParseOptions::default());
    assert!(output.module.is_some(), "{source:?} should parse: {:?}", output.diagnostics);
    let error = output.diagnostics.first().unwrap_or_else(|| panic!("expected a scope error for {source:?}"));
    assert_eq!(error.kind, ErrorKind::Syntax);
    error.message.clone()
}

#[test]
fn module_bindings() {
    let tree = scopes("import os\nx = 1\nprint(x, os)\n");
    let module = tree.module();
    assert_eq!(tree.scope(module).kind, ScopeKind::Module);
    assert_eq!(tree.scope(module).name, "<module>");
    assert_eq!(tree.binding(module, "os"), Some(BindingKind::Local));
    assert_eq!(tree.binding(module, "x"), Some(BindingKind::Local));
    assert_eq!(tree.binding(module, "print"), Some(BindingKind::GlobalImplicit));
    assert_eq!(tree.binding(module, "missing"), None);
}

#[test]
fn closure_cells_and_free_variables() {
    let tree = scopes("def outer(a):\n    def inner():\n        return a + g\n    return inner\n");
    let outer = scope_at(&tree, &[0]);
    let inner = scope_at(&tree, &[0, 0]);
    assert_eq!(tree.binding(outer, "a"), Some(BindingKind::Cell));
    assert_eq!(tree.binding(outer, "inner"), Some(BindingKind::Local));
    assert_eq!(tree.binding(inner, "a"), Some(BindingKind::Free));
    assert_eq!(tree.binding(inner, "g"), Some(BindingKind::GlobalImplicit));
    assert!(tree.scope(inner).flags.contains(ScopeFlags::IS_NESTED | ScopeFlags::HAS_FREE_VARS));
    assert!(tree.scope(outer).flags.contains(ScopeFlags::HAS_CHILD_WITH_FREE_VARS));
    assert_eq!(tree.scope(outer).varnames(), ["a"]);
}

#[test]
fn global_declarations() {
    let tree = scopes("def f():\n    global counter\n    counter = 1\n    return total\n");
    let f = scope_at(&tree, &[0]);
    assert_eq!(tree.binding(f, "counter"), Some(BindingKind::GlobalExplicit));
    assert_eq!(tree.binding(f, "total"), Some(BindingKind::GlobalImplicit));
}

/// A name declared global stays global in nested functions that only read it.
#[test]
fn global_declaration_reaches_nested_scopes() {
    let tree = scopes("def f():\n    global x\n    def g():\n        return x\n");
    let g = scope_at(&tree, &[0, 0]);
    assert_eq!(tree.binding(g, "x"), Some(BindingKind::GlobalImplicit));
}

#[test]
fn nonlocal_rebinding() {
    let tree = scopes("def f():\n    n = 0\n    def g():\n        nonlocal n\n        n += 1\n");
    assert_eq!(tree.binding(scope_at(&tree, &[0]), "n"), Some(BindingKind::Cell));
    assert_eq!(tree.binding(scope_at(&tree, &[0, 0]), "n"), Some(BindingKind::Free));
}

/// Class bodies are skipped when methods resolve names.
#[test]
fn class_bindings_are_invisible_to_methods() {
    let tree = scopes("class C:\n    x = 1\n    def m(self):\n        return x\n");
    let class = scope_at(&tree, &[0]);
    let method = scope_at(&tree, &[0, 0]);
    assert_eq!(tree.scope(class).kind, ScopeKind::Class);
    assert_eq!(tree.binding(class, "x"), Some(BindingKind::Local));
    assert_eq!(tree.binding(method, "x"), Some(BindingKind::GlobalImplicit));
    assert_eq!(tree.binding(method, "self"), Some(BindingKind::Parameter));
}

#[test]
fn class_body_reads_enclosing_function() {
    let tree = scopes("def f():\n    x = 1\n    class C:\n        y = x\n");
    assert_eq!(tree.binding(scope_at(&tree, &[0]), "x"), Some(BindingKind::Cell));
    assert_eq!(tree.binding(scope_at(&tree, &[0, 0]), "x"), Some(BindingKind::Free));
}

#[test]
fn super_creates_class_cell() {
    let tree = scopes("class C(B):\n    def m(self):\n        return super().m()\n");
    let class = scope_at(&tree, &[0]);
    let method = scope_at(&tree, &[0, 0]);
    assert_eq!(tree.binding(method, "__class__"), Some(BindingKind::Free));
    assert_eq!(tree.binding(method, "super"), Some(BindingKind::GlobalImplicit));
    assert!(tree.scope(class).flags.contains(ScopeFlags::NEEDS_CLASS_CLOSURE));
}

#[test]
fn comprehension_scopes() {
    let tree = scopes("squares = [x * x for x in data]\nkeys = {k: 1 for k in data}\n");
    let listcomp = scope_at(&tree, &[0]);
    let dictcomp = scope_at(&tree, &[1]);
    assert_eq!(tree.scope(listcomp).kind, ScopeKind::Comprehension);
    assert_eq!(tree.scope(listcomp).name, "<listcomp>");
    assert_eq!(tree.scope(dictcomp).name, "<dictcomp>");
    assert_eq!(tree.binding(listcomp, ".0"), Some(BindingKind::Parameter));
    assert_eq!(tree.binding(listcomp, "x"), Some(BindingKind::Local));
    assert_eq!(tree.binding(listcomp, "data"), None, "the outermost iterable is evaluated outside");
    assert!(tree.scope(listcomp).flags.contains(ScopeFlags::IS_COMPREHENSION));
}

#[test]
fn generator_expression_and_lambda() {
    let tree = scopes("g = (i for i in r)\nf = lambda a: a\n");
    let genexpr = scope_at(&tree, &[0]);
    let lambda = scope_at(&tree, &[1]);
    assert_eq!(tree.scope(genexpr).name, "<genexpr>");
    assert!(tree.scope(genexpr).is_generator());
    assert_eq!(tree.scope(lambda).kind, ScopeKind::Lambda);
    assert_eq!(tree.scope(lambda).name, "<lambda>");
    assert_eq!(tree.binding(lambda, "a"), Some(BindingKind::Parameter));
}

#[test]
fn generator_and_coroutine_flags() {
    let tree = scopes("def gen():\n    yield 1\nasync def coro():\n    await x\n");
    assert!(tree.scope(scope_at(&tree, &[0])).is_generator());
    assert!(tree.scope(scope_at(&tree, &[1])).is_coroutine());
}

#[test]
fn loop_control_inside_loops() {
    let tree = scopes("for x in y:\n    try:\n        continue\n    finally:\n        break\nelse:\n    pass\n");
    assert_eq!(tree.binding(tree.module(), "x"), Some(BindingKind::Local));
    scopes("while a:\n    for b in c:\n        pass\n    else:\n        break\n");
    scopes("for a in b:\n    match a:\n        case 1:\n            continue\n");
}

/// `await` inside a generator expression makes the generator asynchronous; it needs no
/// enclosing `async def`.
#[test]
fn await_inside_generator_expression() {
    let tree = scopes("async def f():\n    def g():\n        return (i for i in y if await w(i))\n");
    let genexpr = scope_at(&tree, &[0, 0, 0]);
    assert_eq!(tree.scope(genexpr).name, "<genexpr>");
    assert!(tree.scope(genexpr).is_coroutine());
    assert!(!tree.scope(scope_at(&tree, &[0, 0])).is_coroutine());

    scopes("lazy = (await x for x in y)\n");
    scopes("async def f():\n    return [[await z for z in x] for x in y]\n");
}

/// Bindings are decided per scope, not per statement: a use before the declaration
/// still sees it.
#[test]
fn declarations_apply_to_the_whole_scope() {
    let tree = scopes("def f():\n    print(x)\n    global x\n");
    assert_eq!(tree.binding(scope_at(&tree, &[0]), "x"), Some(BindingKind::GlobalExplicit));
}

#[test]
fn assignment_expression_binds_locally() {
    let tree = scopes("(a := 10)\n");
    assert_eq!(tree.binding(tree.module(), "a"), Some(BindingKind::Local));
    let tree = scopes("def f():\n    if (n := len(x)) > 1:\n        return n\n");
    assert_eq!(tree.binding(scope_at(&tree, &[0]), "n"), Some(BindingKind::Local));
}

/// Identifiers are compared after NFKC normalization.
#[test]
fn normalized_identifiers_share_a_binding() {
    let tree = scopes("def f():\n    \u{2115} = 1\n    def g():\n        return N\n");
    assert_eq!(tree.binding(scope_at(&tree, &[0]), "N"), Some(BindingKind::Cell));
    assert_eq!(tree.binding(scope_at(&tree, &[0, 0]), "N"), Some(BindingKind::Free));
}

#[test]
fn decomposed_identifier_matches_composed_spelling() {
    let tree = scopes("cafe\u{301} = 1\nprint(caf\u{e9})\n");
    assert_eq!(tree.binding(tree.module(), "caf\u{e9}"), Some(BindingKind::Local));
    assert_eq!(tree.binding(tree.module(), "cafe\u{301}"), None);
}

/// An assignment expression in a comprehension binds in the enclosing function.
#[test]
fn named_expression_in_comprehension() {
    let tree = scopes("def f(data):\n    [last := x for x in data]\n    return last\n");
    let f = scope_at(&tree, &[0]);
    let listcomp = scope_at(&tree, &[0, 0]);
    assert_eq!(tree.binding(f, "last"), Some(BindingKind::Cell));
    assert_eq!(tree.binding(listcomp, "last"), Some(BindingKind::Free));

    let tree = scopes("[last := x for x in data]\n");
    let listcomp = scope_at(&tree, &[0]);
    assert_eq!(tree.binding(listcomp, "last"), Some(BindingKind::GlobalExplicit));
}

#[test]
fn private_names_are_mangled() {
    let tree = scopes("class Ham:\n    __spam = 1\n    __dunder__ = 2\n");
    let class = scope_at(&tree, &[0]);
    assert_eq!(tree.binding(class, "_Ham__spam"), Some(BindingKind::Local));
    assert_eq!(tree.binding(class, "__dunder__"), Some(BindingKind::Local));
    assert_eq!(tree.binding(class, "__spam"), None);

    assert_eq!(mangle("_Ham", "__spam").as_deref(), Some("_Ham__spam"));
    assert_eq!(mangle("Ham", "__init__"), None);
    assert_eq!(mangle("___", "__spam"), None);
}

#[test]
fn generic_function_has_type_param_scope() {
    let tree = scopes("def first[T](items: list[T]) -> T:\n    return items[0]\n");
    let params = scope_at(&tree, &[0]);
    let function = scope_at(&tree, &[0, 0]);
    assert_eq!(tree.scope(params).kind, ScopeKind::TypeParam);
    assert_eq!(tree.binding(params, "T"), Some(BindingKind::Local));
    assert_eq!(tree.scope(function).kind, ScopeKind::Function);
    assert_eq!(tree.binding(function, "items"), Some(BindingKind::Parameter));
}

#[test]
fn dump_lists_scopes_flags_and_bindings() {
    let tree = scopes("def f(a):\n    b = a\n    return lambda: b\n");
    assert_eq!(
        tree.dump(),
        "\
module <module> [HAS_CHILD_WITH_FREE_VARS]
  f: Local
  function f [HAS_CHILD_WITH_FREE_VARS]
    a: Parameter
    b: Cell
    lambda <lambda> [IS_NESTED, HAS_FREE_VARS]
      b: Free
"
    );
}

#[test]
fn declaration_errors() {
    let cases = [
        ("nonlocal x\n", "nonlocal declaration not allowed at module level"),
        ("def f():\n    nonlocal x\n", "no binding for nonlocal 'x' found"),
        ("def f(a):\n    global a\n", "name 'a' is parameter and global"),
        ("def f(a):\n    def g():\n        nonlocal a\n        global a\n", "name 'a' is nonlocal and global"),
        ("def f(a):\n    nonlocal a\n", "name 'a' is parameter and nonlocal"),
        ("def f():\n    x: int\n    global x\n", "annotated name 'x' can't be global"),
        ("def f():\n    global x\n    x: int = 1\n", "annotated name 'x' can't be global"),
        ("def f(a, b, a):\n    pass\n", "duplicate argument 'a' in function definition"),
        ("lambda x, x: x\n", "duplicate argument 'x' in function definition"),
    ];
    for (source, expected) in cases {
        assert_eq!(first_scope_error(source), expected, "source: {source:?}");
    }
}

#[test]
fn context_errors() {
    let cases = [
        ("return 1\n", "'return' outside function"),
        ("class C:\n    yield 1\n", "'yield' outside function"),
        ("await x\n", "'await' outside function"),
        ("def f():\n    await x\n", "'await' outside async function"),
        ("def f():\n    from m import *\n", "import * only allowed at module level"),
        ("def f():\n    return [(yield x) for x in y]\n", "'yield' inside list comprehension"),
        ("def f():\n    return {(yield x) for x in y}\n", "'yield' inside set comprehension"),
        ("break\n", "'break' outside loop"),
        ("for x in y:\n    def f():\n        break\n", "'break' outside loop"),
        ("while x:\n    pass\nelse:\n    continue\n", "'continue' not properly in loop"),
        ("for x in y:\n    class C:\n        continue\n", "'continue' not properly in loop"),
        ("def f():\n    async with a:\n        pass\n", "'async with' outside async function"),
        ("def f():\n    async for x in y:\n        pass\n", "'async for' outside async function"),
        ("def f():\n    return [x async for x in y]\n", "asynchronous comprehension outside of an asynchronous function"),
        ("def f():\n    return [await x for x in y]\n", "asynchronous comprehension outside of an asynchronous function"),
        ("f = lambda: await x\n", "'await' outside async function"),
    ];
    for (source, expected) in cases {
        assert_eq!(first_scope_error(source), expected, "source: {source:?}");
    }
}

#[test]
fn named_expression_errors() {
    let cases = [
        ("[i := 0 for i in x]\n", "assignment expression cannot rebind comprehension iteration variable 'i'"),
        ("[x for x in (y := z)]\n", "assignment expression cannot be used in a comprehension iterable expression"),
        ("class C:\n    [y := 1 for x in z]\n", "assignment expression within a comprehension cannot be used in a class body"),
    ];
    for (source, expected) in cases {
        assert_eq!(first_scope_error(source), expected, "source: {source:?}");
    }
}

/// Scope errors keep the tree: analysis reports every problem it finds.
#[test]
fn scope_errors_keep_the_tree() {
    let output = compile("return 1\nreturn 2\n", &ParseOptions::default());
    assert!(output.module.is_some());
    assert!(output.scopes.is_some());
    assert_eq!(output.diagnostics.len(), 2);
    assert_eq!(output.diagnostics[1].source_range.start_line, 2);
    let error = output.into_result().expect_err("compile errors");
    assert_eq!(error.to_string(), "SyntaxError: 'return' outside function (line 1, column 1) (and 1 more)");
}

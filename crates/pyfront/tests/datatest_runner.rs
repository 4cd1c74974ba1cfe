//! Runs every `test_cases/*.py` fixture through the full front-end.
//!
//! A fixture starting with `# error: <Kind>: <message>` must report exactly that first
//! diagnostic. Any other fixture must compile cleanly, keep child ranges inside their
//! parents and survive an unparse round trip.

use std::{fs, path::Path};

use pyfront::{ParseOptions, check_ranges, compile, dump_tree, parse, unparse};
use similar::TextDiff;

const ERROR_PREFIX: &str = "# error: ";

fn run_fixture(path: &Path) -> datatest_stable::Result<()> {
    let source = fs::read_to_string(path)?;
    let options = ParseOptions::default().filename(path.display().to_string());
    let output = compile(&source, &options);

    if let Some(expected) = source.lines().next().and_then(|line| line.strip_prefix(ERROR_PREFIX)) {
        let Some(first) = output.diagnostics.first() else {
            return Err(format!("expected `{expected}`, but the fixture compiled cleanly").into());
        };
        let actual = format!("{}: {}", first.kind, first.message);
        if actual != expected.trim_end() {
            return Err(format!("expected `{expected}`, got `{actual}` at {}", first.source_range).into());
        }
        return Ok(());
    }

    if let Some(first) = output.diagnostics.first() {
        return Err(format!("unexpected diagnostic: {first} [{}]", first.source_range).into());
    }
    let Some(module) = output.module else {
        return Err("no tree for a clean compile".into());
    };

    let violations = check_ranges(&module);
    if !violations.is_empty() {
        return Err(format!("range violations: {violations:?}").into());
    }

    let regenerated = unparse(&module, &output.interner);
    let reparsed = parse(&regenerated, &options);
    let Some(second) = reparsed.module else {
        return Err(format!(
            "unparsed text does not parse: {:?}\n{regenerated}",
            reparsed.diagnostics.first()
        )
        .into());
    };
    let before = dump_tree(&module, &output.interner, false);
    let after = dump_tree(&second, &reparsed.interner, false);
    if before != after {
        let diff = TextDiff::from_lines(&before, &after).unified_diff().header("parsed", "round trip").to_string();
        return Err(format!("round trip changed the tree:\n{diff}").into());
    }
    Ok(())
}

datatest_stable::harness!(run_fixture, "test_cases", r"^.*\.py$");

use pretty_assertions::assert_eq;
use pyfront::{
    CodeLoc, ErrorKind, HardKeyword, SourceBase, SourceRange, Token, TokenFlags, TokenKind, Tokenizer, tokenize,
};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source).map(|t| t.kind).collect()
}

/// Returns the error token the tokenizer stopped on.
fn error_token(source: &str) -> Token<'_> {
    let last = tokenize(source).last().expect("tokenizer yields at least one token");
    assert_eq!(last.kind, TokenKind::Error, "expected an error token for {source:?}");
    last
}

#[test]
fn block_structure_tokens() {
    assert_eq!(
        kinds("if x:\n    y\n"),
        vec![
            TokenKind::Keyword(HardKeyword::If),
            TokenKind::Name,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Name,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::EndMarker,
        ]
    );
}

#[test]
fn nested_blocks_close_together() {
    let tokens = kinds("if a:\n    if b:\n        c\nd\n");
    let dedents = tokens.iter().filter(|k| **k == TokenKind::Dedent).count();
    let indents = tokens.iter().filter(|k| **k == TokenKind::Indent).count();
    assert_eq!(indents, 2);
    assert_eq!(dedents, 2);
    assert_eq!(tokens.last(), Some(&TokenKind::EndMarker));
}

/// Blank and comment-only lines never produce NEWLINE or indentation tokens.
#[test]
fn comments_and_blank_lines_are_skipped() {
    assert_eq!(
        kinds("# header\n\n   # indented comment\nx  # trailing\n\n"),
        vec![TokenKind::Name, TokenKind::Newline, TokenKind::EndMarker]
    );
}

#[test]
fn explicit_line_continuation() {
    assert_eq!(
        kinds("x = 1 + \\\n    2\n"),
        vec![
            TokenKind::Name,
            TokenKind::Equal,
            TokenKind::Number,
            TokenKind::Plus,
            TokenKind::Number,
            TokenKind::Newline,
            TokenKind::EndMarker,
        ]
    );
}

#[test]
fn longest_operator_wins() {
    assert_eq!(
        kinds("a **= b // c -> ... := !="),
        vec![
            TokenKind::Name,
            TokenKind::DoubleStarEqual,
            TokenKind::Name,
            TokenKind::DoubleSlash,
            TokenKind::Name,
            TokenKind::Rarrow,
            TokenKind::Ellipsis,
            TokenKind::ColonEqual,
            TokenKind::NotEqual,
            TokenKind::Newline,
            TokenKind::EndMarker,
        ]
    );
}

/// `match`, `case`, `type` and `_` stay NAME tokens; the grammar decides their role.
#[test]
fn soft_keywords_are_names() {
    let tokens: Vec<_> = tokenize("match type case _ async").collect();
    assert!(tokens[0].is_soft_keyword("match"));
    assert!(tokens[1].is_soft_keyword("type"));
    assert!(tokens[2].is_soft_keyword("case"));
    assert!(tokens[3].is_soft_keyword("_"));
    assert!(tokens[4].is_keyword(HardKeyword::Async));
}

#[test]
fn number_flags() {
    let tokens: Vec<_> = tokenize("0x1F 0o17 0b1 1.5 2j 1e3 1_000").collect();
    let flags: Vec<_> = tokens.iter().take(7).map(|t| t.flags).collect();
    assert_eq!(
        flags,
        vec![
            TokenFlags::HEX,
            TokenFlags::OCTAL,
            TokenFlags::BINARY,
            TokenFlags::FLOAT,
            TokenFlags::IMAGINARY,
            TokenFlags::FLOAT,
            TokenFlags::empty(),
        ]
    );
    assert_eq!(tokens[6].text, "1_000");
}

#[test]
fn string_tokens_keep_prefix_and_quotes() {
    let tokens: Vec<_> = tokenize("rb'x' f\"{y}\" '''a\nb'''").collect();
    assert_eq!(tokens[0].text, "rb'x'");
    assert_eq!(tokens[0].flags, TokenFlags::RAW | TokenFlags::BYTES);
    assert_eq!(tokens[1].flags, TokenFlags::FORMATTED);
    assert_eq!(tokens[2].text, "'''a\nb'''");
    assert!(tokens[2].flags.contains(TokenFlags::TRIPLE_QUOTED));
    assert_eq!(tokens[2].range.end(), CodeLoc::new(2, 4));
}

#[test]
fn ranges_use_byte_columns() {
    let tokens: Vec<_> = tokenize("é = 1\n  ").collect();
    assert_eq!(tokens[0].range, SourceRange::new(0, 2, CodeLoc::new(1, 0), CodeLoc::new(1, 2)));
    assert_eq!(tokens[1].range.start(), CodeLoc::new(1, 3));
}

#[test]
fn bracket_level_is_tracked() {
    let levels: Vec<_> = tokenize("f([a])").map(|t| t.level).collect();
    assert_eq!(levels, vec![0, 1, 2, 2, 1, 0, 0, 0]);
}

/// Fragments tokenized out of a larger file report positions in that file.
#[test]
fn fragment_positions_are_offset() {
    let base = SourceBase {
        offset: 10,
        line: 3,
        column: 4,
    };
    let tokens: Vec<_> = Tokenizer::with_base("a +\nb", base, 1).collect();
    assert_eq!(tokens[0].range, SourceRange::new(10, 11, CodeLoc::new(3, 4), CodeLoc::new(3, 5)));
    assert_eq!(tokens[2].kind, TokenKind::Name, "newlines inside the fragment are insignificant");
    assert_eq!(tokens[2].range, SourceRange::new(14, 15, CodeLoc::new(4, 0), CodeLoc::new(4, 1)));
}

#[test]
fn unterminated_string() {
    let token = error_token("x = 'abc");
    let error = token.error.expect("error payload");
    assert_eq!(error.kind, ErrorKind::Syntax);
    assert_eq!(error.message, "unterminated string literal (detected at line 1)");
    assert_eq!(error.range.start(), CodeLoc::new(1, 4));
    assert!(token.flags.contains(TokenFlags::UNTERMINATED));
}

#[test]
fn unterminated_triple_quoted_string_reports_last_line() {
    let token = error_token("s = '''abc\n\ndef");
    assert_eq!(
        token.error.expect("error payload").message,
        "unterminated triple-quoted string literal (detected at line 3)"
    );
}

#[test]
fn unclosed_bracket_points_at_the_bracket() {
    let token = error_token("x = (1,\n2");
    let error = token.error.expect("error payload");
    assert_eq!(error.message, "'(' was never closed");
    assert_eq!(error.range, SourceRange::new(4, 5, CodeLoc::new(1, 4), CodeLoc::new(1, 5)));
}

#[test]
fn bracket_mismatches() {
    let cases = [
        ("(]", "closing parenthesis ']' does not match opening parenthesis '('"),
        ("(\n]", "closing parenthesis ']' does not match opening parenthesis '(' on line 1"),
        ("x)", "unmatched ')'"),
    ];
    for (source, expected) in cases {
        let token = error_token(source);
        assert_eq!(token.error.expect("error payload").message, expected, "source: {source:?}");
    }
}

#[test]
fn number_errors() {
    let cases = [
        ("0777", "leading zeros in decimal integer literals are not permitted; use an 0o prefix for octal integers"),
        ("0b102", "invalid digit '2' in binary literal"),
        ("0o8", "invalid digit '8' in octal literal"),
        ("0xg", "invalid hexadecimal literal"),
        ("1__0", "invalid decimal literal"),
        ("1abc", "invalid decimal literal"),
    ];
    for (source, expected) in cases {
        let token = error_token(source);
        assert_eq!(token.error.expect("error payload").message, expected, "source: {source:?}");
    }
}

/// `1if x else y` is still valid Python: a number may touch a few keywords.
#[test]
fn number_may_touch_tolerated_keywords() {
    assert_eq!(
        kinds("1if x else 2"),
        vec![
            TokenKind::Number,
            TokenKind::Keyword(HardKeyword::If),
            TokenKind::Name,
            TokenKind::Keyword(HardKeyword::Else),
            TokenKind::Number,
            TokenKind::Newline,
            TokenKind::EndMarker,
        ]
    );
}

#[test]
fn indentation_errors() {
    let cases = [
        ("if x:\n    a\n  b\n", "unindent does not match any outer indentation level"),
        ("if x:\n\ta\n        b\n", "inconsistent use of tabs and spaces in indentation"),
    ];
    for (source, expected) in cases {
        let error = error_token(source).error.expect("error payload");
        assert_eq!(error.kind, ErrorKind::Indentation, "source: {source:?}");
        assert_eq!(error.message, expected, "source: {source:?}");
    }
}

#[test]
fn tab_size_changes_indentation_columns() {
    let source = "if x:\n\ta\n b\n";
    let error = error_token(source).error.expect("error payload");
    assert_eq!(error.message, "unindent does not match any outer indentation level");
    let tokens: Vec<_> = Tokenizer::new(source).tab_size(1).map(|t| t.kind).collect();
    assert!(!tokens.contains(&TokenKind::Error), "a one-column tab lines up with one space");
}

#[test]
fn invalid_characters() {
    let error = error_token("a = b ? c").error.expect("error payload");
    assert_eq!(error.message, "invalid syntax");
    let error = error_token("a = €").error.expect("error payload");
    assert_eq!(error.message, "invalid character '€' (U+20AC)");
}

#[test]
fn byte_order_mark_is_skipped() {
    let tokens: Vec<_> = tokenize("\u{feff}x").collect();
    assert_eq!(tokens[0].text, "x");
}

#[test]
fn identifiers_use_xid_classes() {
    for source in ["cafe\u{301} = 1", "a\u{b7}b = 1", "x\u{e0100} = 1", "\u{2115} = 1"] {
        let tokens: Vec<_> = tokenize(source).collect();
        assert_eq!(tokens[0].kind, TokenKind::Name, "source: {source:?}");
        assert_eq!(tokens[0].text, source.trim_end_matches(" = 1"), "source: {source:?}");
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Error), "source: {source:?}");
    }
    // Alphabetic, but a pattern character rather than an identifier start.
    let error = error_token("\u{2e2f} = 1").error.expect("error payload");
    assert_eq!(error.message, "invalid character '\u{2e2f}' (U+2E2F)");
}

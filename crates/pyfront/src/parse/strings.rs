//! String literals: escape decoding, implicit concatenation and f-strings.
//!
//! f-strings use the pre-3.12 model: the whole literal is one STRING token, and its
//! replacement fields are located by scanning the literal text. Each field's expression
//! text is handed to the configured [`crate::fstring::FExprParser`].

use super::{Parser, Rule};
use crate::{
    diagnostic::{CodeLoc, ErrorMessage, SourceRange},
    expressions::{ConversionFlag, Expr, ExprLoc, Literal},
    fstring::FExprContext,
    tokenizer::{SourceBase, TokenFlags, TokenKind},
};

/// Maximum nesting of format specs inside format specs.
const MAX_FORMAT_SPEC_NESTING: u32 = 2;

/// A malformed escape sequence. Positions are byte indices into the literal body;
/// `end` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EscapeError {
    pub start: usize,
    pub end: usize,
    pub reason: &'static str,
}

/// A decoded `str` literal value.
///
/// Escapes such as `\ud800` produce lone surrogates, which a `String` cannot hold; text
/// holding one switches to raw code points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StrValue {
    Text(String),
    CodePoints(Vec<u32>),
}

impl Default for StrValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl StrValue {
    fn with_capacity(capacity: usize) -> Self {
        Self::Text(String::with_capacity(capacity))
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::CodePoints(points) => points.is_empty(),
        }
    }

    fn push_str(&mut self, s: &str) {
        match self {
            Self::Text(text) => text.push_str(s),
            Self::CodePoints(points) => points.extend(s.chars().map(u32::from)),
        }
    }

    fn push(&mut self, ch: char) {
        match self {
            Self::Text(text) => text.push(ch),
            Self::CodePoints(points) => points.push(u32::from(ch)),
        }
    }

    /// Appends any code point up to U+10FFFF, surrogates included.
    fn push_code_point(&mut self, code_point: u32) {
        match self {
            Self::Text(text) => match char::from_u32(code_point) {
                Some(ch) => text.push(ch),
                None => {
                    let mut points: Vec<u32> = text.chars().map(u32::from).collect();
                    points.push(code_point);
                    *self = Self::CodePoints(points);
                }
            },
            Self::CodePoints(points) => points.push(code_point),
        }
    }

    fn append(&mut self, other: Self) {
        match other {
            Self::Text(text) => self.push_str(&text),
            Self::CodePoints(points) => points.into_iter().for_each(|p| self.push_code_point(p)),
        }
    }
}

fn hex_value(digits: &[u8]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, &d| {
        let v = char::from(d).to_digit(16)?;
        Some(acc * 16 + v)
    })
}

/// Decodes the escape sequences of a `str` literal body.
///
/// Unknown escapes are kept verbatim, backslash included. `\N{...}` resolves names
/// through the Unicode character database, case-insensitively.
pub(crate) fn decode_str_escapes(body: &str) -> Result<StrValue, EscapeError> {
    let bytes = body.as_bytes();
    let mut out = StrValue::with_capacity(body.len());
    let mut i = 0;
    while i < bytes.len() {
        let Some(offset) = body[i..].find('\\') else {
            out.push_str(&body[i..]);
            break;
        };
        out.push_str(&body[i..i + offset]);
        let start = i + offset;
        i = start + 1;
        let Some(&c) = bytes.get(i) else {
            out.push('\\');
            break;
        };
        i += 1;
        match c {
            b'\n' => {}
            b'\r' => {
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\\' => out.push('\\'),
            b'\'' => out.push('\''),
            b'"' => out.push('"'),
            b'a' => out.push('\x07'),
            b'b' => out.push('\x08'),
            b'f' => out.push('\x0c'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'v' => out.push('\x0b'),
            b'0'..=b'7' => {
                let mut value = u32::from(c - b'0');
                for _ in 0..2 {
                    match bytes.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push_code_point(value);
            }
            b'x' | b'u' | b'U' => {
                let (len, reason) = match c {
                    b'x' => (2, "truncated \\xXX escape"),
                    b'u' => (4, "truncated \\uXXXX escape"),
                    _ => (8, "truncated \\UXXXXXXXX escape"),
                };
                let digits = bytes.get(i..i + len).filter(|d| d.iter().all(u8::is_ascii_hexdigit));
                let Some(value) = digits.and_then(hex_value) else {
                    let valid = bytes[i..].iter().take(len).take_while(|d| d.is_ascii_hexdigit()).count();
                    return Err(EscapeError {
                        start,
                        end: i + valid - 1,
                        reason,
                    });
                };
                if value > u32::from(char::MAX) {
                    return Err(EscapeError {
                        start,
                        end: i + len - 1,
                        reason: "illegal Unicode character",
                    });
                }
                out.push_code_point(value);
                i += len;
            }
            b'N' => {
                let close = (bytes.get(i) == Some(&b'{')).then(|| body[i..].find('}')).flatten();
                let Some(close) = close.filter(|&c| c > 1) else {
                    return Err(EscapeError {
                        start,
                        end: i - 1,
                        reason: "malformed \\N character escape",
                    });
                };
                let name = body[i + 1..i + close].to_ascii_uppercase();
                let Some(named) = unicode_names2::character(&name) else {
                    return Err(EscapeError {
                        start,
                        end: i + close,
                        reason: "unknown Unicode character name",
                    });
                };
                out.push(named);
                i += close + 1;
            }
            _ => {
                out.push('\\');
                i = start + 1;
            }
        }
    }
    Ok(out)
}

/// Decodes the escape sequences of a `bytes` literal body.
///
/// The error position is the index of the backslash of the first bad `\x` escape.
pub(crate) fn decode_bytes_escapes(body: &[u8]) -> Result<Vec<u8>, usize> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let c = body[i];
        if c != b'\\' {
            out.push(c);
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        let Some(&c) = body.get(i) else {
            out.push(b'\\');
            break;
        };
        i += 1;
        match c {
            b'\n' => {}
            b'\r' => {
                if body.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\\' => out.push(b'\\'),
            b'\'' => out.push(b'\''),
            b'"' => out.push(b'"'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'0'..=b'7' => {
                let mut value = u32::from(c - b'0');
                for _ in 0..2 {
                    match body.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            b'x' => {
                let value = body.get(i..i + 2).and_then(hex_value).ok_or(start)?;
                out.push((value & 0xff) as u8);
                i += 2;
            }
            _ => {
                out.push(b'\\');
                i = start + 1;
            }
        }
    }
    Ok(out)
}

/// The body of a string token: the text between the quotes, and its byte index in the
/// token text.
fn literal_body(text: &str, flags: TokenFlags) -> (&str, usize) {
    let prefix = text.bytes().take_while(u8::is_ascii_alphabetic).count();
    let quote = if flags.contains(TokenFlags::TRIPLE_QUOTED) { 3 } else { 1 };
    let start = (prefix + quote).min(text.len());
    let end = text.len().saturating_sub(quote).max(start);
    (&text[start..end], start)
}

/// Source position of byte `index` of a token's text.
fn locate(range: SourceRange, text: &str, index: usize) -> SourceBase {
    let mut line = range.start_line;
    let mut column = range.start_col;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < index {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {}
            b'\r' | b'\n' => {
                line += 1;
                column = 0;
            }
            _ => column += 1,
        }
        i += 1;
    }
    SourceBase {
        offset: range.start_offset + u32::try_from(index).unwrap_or(u32::MAX),
        line,
        column,
    }
}

/// Parts of a JoinedStr under construction.
#[derive(Debug, Default)]
struct JoinedParts {
    values: Vec<ExprLoc>,
    literal: StrValue,
}

/// One string token being scanned for replacement fields.
struct FStringToken<'t> {
    text: &'t str,
    range: SourceRange,
    body_start: usize,
    raw: bool,
}

impl FStringToken<'_> {
    /// Empty range at byte `index` of the literal body.
    fn point(&self, index: usize) -> SourceRange {
        let at = locate(self.range, self.text, self.body_start + index);
        let loc = CodeLoc::new(at.line, at.column);
        SourceRange::new(at.offset, at.offset, loc, loc)
    }
}

impl Parser<'_, '_> {
    /// `strings: STRING+`
    pub(super) fn strings(&mut self) -> Option<ExprLoc> {
        self.memoized(Rule::Strings, |p| {
            let start = p.mark();
            let mut indices = Vec::new();
            while let Some(idx) = p.eat(TokenKind::String) {
                indices.push(idx);
            }
            if indices.is_empty() {
                return None;
            }
            p.concatenate(start, &indices)
        })
    }

    fn concatenate(&mut self, start: usize, indices: &[usize]) -> Option<ExprLoc> {
        let range = self.range_from(start);
        let bytes_count = indices
            .iter()
            .filter(|&&idx| self.tok(idx).flags.contains(TokenFlags::BYTES))
            .count();
        if bytes_count != 0 && bytes_count != indices.len() {
            return self.raise_syntax_here(ErrorMessage::MixedBytes, &[]);
        }
        if bytes_count != 0 {
            let mut value = Vec::new();
            for &idx in indices {
                value.extend(self.bytes_token(idx)?);
            }
            let id = self.interner.intern_bytes(&value);
            return Some(ExprLoc::new(range, Expr::Constant(Literal::Bytes(id))));
        }
        let formatted = indices
            .iter()
            .any(|&idx| self.tok(idx).flags.contains(TokenFlags::FORMATTED));
        if !formatted {
            let mut value = StrValue::default();
            for &idx in indices {
                value.append(self.str_token(idx)?);
            }
            let literal = self.str_constant(&value);
            return Some(ExprLoc::new(range, Expr::Constant(literal)));
        }
        let mut parts = JoinedParts::default();
        for &idx in indices {
            if self.tok(idx).flags.contains(TokenFlags::FORMATTED) {
                let tok = self.tok(idx);
                let (text, flags, tok_range) = (tok.text, tok.flags, tok.range);
                let (body, body_start) = literal_body(text, flags);
                let token = FStringToken {
                    text,
                    range: tok_range,
                    body_start,
                    raw: flags.contains(TokenFlags::RAW),
                };
                self.fstring_parts(&token, body, 0, 0, range, &mut parts)?;
            } else {
                let decoded = self.str_token(idx)?;
                parts.literal.append(decoded);
            }
        }
        self.flush_literal(&mut parts, range);
        Some(ExprLoc::new(range, Expr::JoinedStr(parts.values)))
    }

    fn str_token(&mut self, idx: usize) -> Option<StrValue> {
        let tok = self.tok(idx);
        let (text, flags, range) = (tok.text, tok.flags, tok.range);
        let (body, _) = literal_body(text, flags);
        if flags.contains(TokenFlags::RAW) {
            return Some(StrValue::Text(body.to_owned()));
        }
        match decode_str_escapes(body) {
            Ok(value) => Some(value),
            Err(err) => self.raise_unicode_error(range, &err),
        }
    }

    fn bytes_token(&mut self, idx: usize) -> Option<Vec<u8>> {
        let tok = self.tok(idx);
        let (text, flags, range) = (tok.text, tok.flags, tok.range);
        let (body, _) = literal_body(text, flags);
        if !body.is_ascii() {
            return self.raise_syntax(range, ErrorMessage::BytesNonAscii, &[]);
        }
        if flags.contains(TokenFlags::RAW) {
            return Some(body.as_bytes().to_vec());
        }
        match decode_bytes_escapes(body.as_bytes()) {
            Ok(value) => Some(value),
            Err(position) => self.raise_syntax(range, ErrorMessage::BytesEscape, &[&position.to_string()]),
        }
    }

    fn raise_unicode_error<T>(&mut self, range: SourceRange, err: &EscapeError) -> Option<T> {
        let (start, end) = (err.start.to_string(), err.end.to_string());
        self.raise_syntax(range, ErrorMessage::UnicodeEscape, &[&start, &end, err.reason])
    }

    fn str_constant(&mut self, value: &StrValue) -> Literal {
        match value {
            StrValue::Text(text) => Literal::Str(self.interner.intern(text)),
            StrValue::CodePoints(points) => Literal::CodePoints(self.interner.intern_code_points(points)),
        }
    }

    fn flush_literal(&mut self, parts: &mut JoinedParts, range: SourceRange) {
        if parts.literal.is_empty() {
            return;
        }
        let literal = self.str_constant(&std::mem::take(&mut parts.literal));
        parts.values.push(ExprLoc::new(range, Expr::Constant(literal)));
    }

    /// Scans literal text and replacement fields of `body[pos..]` into `parts`.
    ///
    /// At the top level the scan runs to the end of the body. Inside a format spec
    /// (`spec_level > 0`) it stops at the `}` closing the enclosing field and returns
    /// that position.
    fn fstring_parts(
        &mut self,
        token: &FStringToken<'_>,
        body: &str,
        mut pos: usize,
        spec_level: u32,
        range: SourceRange,
        parts: &mut JoinedParts,
    ) -> Option<usize> {
        let bytes = body.as_bytes();
        loop {
            pos = self.fstring_literal(token, body, pos, spec_level, parts)?;
            if pos >= bytes.len() || bytes[pos] == b'}' {
                return Some(pos);
            }
            pos = self.fstring_field(token, body, pos, spec_level, range, parts)?;
        }
    }

    /// Scans literal text up to the next `{` (or, in a format spec, `}`), decoding it into
    /// `parts.literal`. Returns the position where the literal ends.
    fn fstring_literal(
        &mut self,
        token: &FStringToken<'_>,
        body: &str,
        start: usize,
        spec_level: u32,
        parts: &mut JoinedParts,
    ) -> Option<usize> {
        let bytes = body.as_bytes();
        let mut segment_start = start;
        let mut i = start;
        while i < bytes.len() {
            let c = bytes[i];
            if !token.raw && c == b'\\' && i + 1 < bytes.len() {
                if bytes[i + 1] == b'N' && bytes.get(i + 2) == Some(&b'{') {
                    i = body[i..].find('}').map_or(bytes.len(), |close| i + close + 1);
                } else if matches!(bytes[i + 1], b'{' | b'}') {
                    i += 1;
                } else {
                    i += 2;
                }
                continue;
            }
            if c == b'{' || c == b'}' {
                if spec_level == 0 && bytes.get(i + 1) == Some(&c) {
                    self.push_literal(token, &body[segment_start..=i], parts)?;
                    i += 2;
                    segment_start = i;
                    continue;
                }
                if c == b'}' && spec_level == 0 {
                    return self.raise_syntax(token.point(i), ErrorMessage::FStringSingleBrace, &[]);
                }
                break;
            }
            i += 1;
        }
        self.push_literal(token, &body[segment_start..i], parts)?;
        Some(i)
    }

    fn push_literal(&mut self, token: &FStringToken<'_>, segment: &str, parts: &mut JoinedParts) -> Option<()> {
        if token.raw {
            parts.literal.push_str(segment);
            return Some(());
        }
        match decode_str_escapes(segment) {
            Ok(decoded) => {
                parts.literal.append(decoded);
                Some(())
            }
            Err(err) => self.raise_unicode_error(token.range, &err),
        }
    }

    /// Parses one replacement field starting at the `{` at `body[start]`. Returns the
    /// position after its closing `}`.
    fn fstring_field(
        &mut self,
        token: &FStringToken<'_>,
        body: &str,
        start: usize,
        spec_level: u32,
        range: SourceRange,
        parts: &mut JoinedParts,
    ) -> Option<usize> {
        let bytes = body.as_bytes();
        if spec_level >= MAX_FORMAT_SPEC_NESTING {
            return self.raise_syntax(token.range, ErrorMessage::FStringTooDeep, &[]);
        }
        let expr_start = start + 1;
        let expr_end = self.fstring_expression_end(token, body, expr_start)?;
        let fragment = &body[expr_start..expr_end];
        if fragment.trim().is_empty() {
            return self.raise_syntax(token.point(expr_end), ErrorMessage::FStringEmpty, &[]);
        }
        let base = locate(token.range, token.text, token.body_start + expr_start);
        let value = self.parse_field_expression(fragment, base)?;

        let mut i = expr_end;
        let mut debug_text = None;
        if bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            debug_text = Some(&body[expr_start..i]);
        }
        let mut conversion = ConversionFlag::None;
        if i < bytes.len() && bytes[i] == b'!' {
            i += 1;
            let Some(c) = body[i..].chars().next() else {
                return self.raise_syntax(token.range, ErrorMessage::FStringExpectingBrace, &[]);
            };
            let at = i;
            i += c.len_utf8();
            conversion = match ConversionFlag::from_char(c) {
                Some(flag) => flag,
                None => {
                    let quoted = format!("'{c}'");
                    return self.raise_syntax(token.point(at), ErrorMessage::FStringConversion, &[&quoted]);
                }
            };
        }
        let mut format_spec = None;
        if i < bytes.len() && bytes[i] == b':' {
            let mut spec = JoinedParts::default();
            i = self.fstring_parts(token, body, i + 1, spec_level + 1, range, &mut spec)?;
            self.flush_literal(&mut spec, range);
            format_spec = Some(Box::new(ExprLoc::new(range, Expr::JoinedStr(spec.values))));
        }
        if i >= bytes.len() || bytes[i] != b'}' {
            return self.raise_syntax(token.range, ErrorMessage::FStringExpectingBrace, &[]);
        }
        i += 1;

        if let Some(text) = debug_text {
            parts.literal.push_str(text);
            if conversion == ConversionFlag::None && format_spec.is_none() {
                conversion = ConversionFlag::Repr;
            }
        }
        self.flush_literal(parts, range);
        parts.values.push(ExprLoc::new(
            range,
            Expr::FormattedValue {
                value: Box::new(value),
                conversion,
                format_spec,
            },
        ));
        Some(i)
    }

    /// Finds where the expression of a replacement field ends: the top-level `!`, `:`,
    /// `=` or `}` that is not part of a comparison operator.
    fn fstring_expression_end(&mut self, token: &FStringToken<'_>, body: &str, start: usize) -> Option<usize> {
        let bytes = body.as_bytes();
        let mut brackets: Vec<u8> = Vec::new();
        let mut quote: Option<(u8, bool)> = None;
        let mut i = start;
        while i < bytes.len() {
            let c = bytes[i];
            if c == b'\\' {
                return self.raise_syntax(token.point(i), ErrorMessage::FStringBackslash, &[]);
            }
            if let Some((q, triple)) = quote {
                if c == q {
                    if !triple {
                        quote = None;
                    } else if bytes.get(i + 1) == Some(&q) && bytes.get(i + 2) == Some(&q) {
                        quote = None;
                        i += 2;
                    }
                }
                i += 1;
                continue;
            }
            match c {
                b'\'' | b'"' => {
                    let triple = bytes.get(i + 1) == Some(&c) && bytes.get(i + 2) == Some(&c);
                    quote = Some((c, triple));
                    if triple {
                        i += 2;
                    }
                }
                b'[' | b'(' | b'{' => brackets.push(c),
                b'#' => return self.raise_syntax(token.point(i), ErrorMessage::FStringComment, &[]),
                b']' | b')' | b'}' if !brackets.is_empty() => {
                    let open = brackets.pop().unwrap_or(b'(');
                    let expected = match open {
                        b'[' => b']',
                        b'{' => b'}',
                        _ => b')',
                    };
                    if c != expected {
                        return self.raise_syntax(token.range, ErrorMessage::FStringExpectingBrace, &[]);
                    }
                }
                b']' | b')' => return self.raise_syntax(token.range, ErrorMessage::FStringExpectingBrace, &[]),
                b'!' | b':' | b'}' | b'=' | b'<' | b'>' if brackets.is_empty() => {
                    let next = bytes.get(i + 1).copied();
                    if next == Some(b'=') && matches!(c, b'!' | b'=' | b'<' | b'>') {
                        i += 2;
                        continue;
                    }
                    if matches!(c, b'<' | b'>') {
                        i += 1;
                        continue;
                    }
                    return Some(i);
                }
                _ => {}
            }
            i += 1;
        }
        self.raise_syntax(token.range, ErrorMessage::FStringExpectingBrace, &[])
    }

    fn parse_field_expression(&mut self, fragment: &str, base: SourceBase) -> Option<ExprLoc> {
        let fexpr = self.fexpr;
        let reported = self.sink.len();
        let mut cx = FExprContext {
            interner: &mut *self.interner,
            sink: &mut *self.sink,
            options: self.options,
            fstring_depth: self.fstring_depth + 1,
            depth_remaining: self.depth_remaining,
        };
        let value = fexpr.parse_fexpr(fragment, base, &mut cx);
        if value.is_none() {
            if self.sink.len() == reported {
                let at = CodeLoc::new(base.line, base.column);
                let range = SourceRange::new(base.offset, base.offset, at, at);
                return self.raise_syntax(range, ErrorMessage::InvalidSyntax, &[]);
            }
            // already reported by the nested parse
            self.error_indicator = true;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &str) -> String {
        match decode_str_escapes(body).unwrap() {
            StrValue::Text(text) => text,
            other @ StrValue::CodePoints(_) => panic!("expected plain text, got {other:?}"),
        }
    }

    #[test]
    fn str_escapes() {
        assert_eq!(text(r"a\tb\n"), "a\tb\n");
        assert_eq!(text(r"\x41é\U0001F600"), "A\u{e9}\u{1F600}");
        assert_eq!(text(r"\101\0"), "A\0");
        assert_eq!(text(r"\d\q"), r"\d\q");
        assert_eq!(text("line\\\ncontinued"), "linecontinued");
    }

    #[test]
    fn named_escapes() {
        assert_eq!(text(r"\N{EM DASH}"), "\u{2014}");
        assert_eq!(text(r"\N{bullet}!"), "\u{2022}!");
        assert_eq!(text(r"\N{LATIN SMALL LETTER SHARP S}"), "\u{df}");
        assert_eq!(text(r"\N{GREEK SMALL LETTER LAMDA}"), "\u{3bb}");
        let err = decode_str_escapes(r"ab\N{NOT A NAME}").unwrap_err();
        assert_eq!((err.start, err.end, err.reason), (2, 15, "unknown Unicode character name"));
        assert_eq!(decode_str_escapes(r"\N{}").unwrap_err().reason, "malformed \\N character escape");
    }

    #[test]
    fn surrogate_escapes() {
        assert_eq!(
            decode_str_escapes(r"a\ud800\U0000DFFFb").unwrap(),
            StrValue::CodePoints(vec![0x61, 0xd800, 0xdfff, 0x62])
        );
        let mut value = StrValue::Text("x".to_owned());
        value.append(decode_str_escapes(r"\udc00").unwrap());
        value.push_str("\u{e9}");
        assert_eq!(value, StrValue::CodePoints(vec![0x78, 0xdc00, 0xe9]));
        let err = decode_str_escapes(r"\U00110000").unwrap_err();
        assert_eq!((err.start, err.end, err.reason), (0, 9, "illegal Unicode character"));
    }

    #[test]
    fn truncated_hex_escape() {
        let err = decode_str_escapes(r"\x4").unwrap_err();
        assert_eq!(err.start, 0);
        assert_eq!(err.reason, "truncated \\xXX escape");
    }

    #[test]
    fn bytes_escapes() {
        assert_eq!(decode_bytes_escapes(br"\x00\xff\n").unwrap(), vec![0, 0xff, b'\n']);
        assert_eq!(decode_bytes_escapes(br"\u1234").unwrap(), br"\u1234".to_vec());
        assert_eq!(decode_bytes_escapes(br"ab\xZ1"), Err(2));
    }

    #[test]
    fn body_strips_prefix_and_quotes() {
        assert_eq!(literal_body("rb'x'", TokenFlags::RAW | TokenFlags::BYTES), ("x", 3));
        assert_eq!(literal_body("'''doc'''", TokenFlags::TRIPLE_QUOTED), ("doc", 3));
    }

    #[test]
    fn locate_counts_lines_inside_the_token() {
        let range = SourceRange::new(10, 20, CodeLoc::new(2, 4), CodeLoc::new(3, 3));
        let base = locate(range, "f'''a\nb{x}'''", 8);
        assert_eq!((base.offset, base.line, base.column), (18, 3, 2));
    }
}

//! Lazy tokenizer for Python source text.
//!
//! The tokenizer is purely mechanical: it never reports a diagnostic itself. A lexical
//! problem becomes a [`TokenKind::Error`] token carrying a [`TokenError`], and the
//! tokenizer stops after it. The grammar engine turns that token into a diagnostic
//! as soon as it fetches it.
//!
//! Indentation follows CPython: columns are computed twice, once with the configured
//! tab size and once with a tab size of one. If the two computations disagree about
//! the ordering of two indentation levels, the indentation is ambiguous and reported
//! as "inconsistent use of tabs and spaces in indentation".

use std::str::FromStr;

use bitflags::bitflags;

use crate::{
    diagnostic::{CodeLoc, ErrorKind, ErrorMessage, SourceRange},
    intern::Keyword,
};

/// Maximum depth of open brackets, matching CPython's `MAXLEVEL`.
pub const MAX_PAREN_LEVEL: usize = 200;
/// Maximum number of indentation levels, matching CPython's `MAXINDENT`.
pub const MAX_INDENT_LEVEL: usize = 100;
pub const DEFAULT_TAB_SIZE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Newline,
    Indent,
    Dedent,
    EndMarker,
    Keyword(Keyword),
    Lpar,
    Rpar,
    Lsqb,
    Rsqb,
    Lbrace,
    Rbrace,
    Colon,
    Comma,
    Semi,
    Plus,
    Minus,
    Star,
    Slash,
    Vbar,
    Amper,
    Less,
    Greater,
    Equal,
    Dot,
    Percent,
    EqEqual,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Tilde,
    Circumflex,
    LeftShift,
    RightShift,
    DoubleStar,
    PlusEqual,
    MinEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    AmperEqual,
    VbarEqual,
    CircumflexEqual,
    LeftShiftEqual,
    RightShiftEqual,
    DoubleStarEqual,
    DoubleSlash,
    DoubleSlashEqual,
    At,
    AtEqual,
    Rarrow,
    Ellipsis,
    ColonEqual,
    Exclamation,
    Error,
}

impl TokenKind {
    /// Operator lookup, longest match first.
    fn operator(text: &[u8]) -> Option<(Self, usize)> {
        let three = match text {
            [b'*', b'*', b'=', ..] => Some(Self::DoubleStarEqual),
            [b'/', b'/', b'=', ..] => Some(Self::DoubleSlashEqual),
            [b'>', b'>', b'=', ..] => Some(Self::RightShiftEqual),
            [b'<', b'<', b'=', ..] => Some(Self::LeftShiftEqual),
            [b'.', b'.', b'.', ..] => Some(Self::Ellipsis),
            _ => None,
        };
        if let Some(kind) = three {
            return Some((kind, 3));
        }
        let two = match text {
            [b'!', b'=', ..] => Some(Self::NotEqual),
            [b'%', b'=', ..] => Some(Self::PercentEqual),
            [b'&', b'=', ..] => Some(Self::AmperEqual),
            [b'*', b'*', ..] => Some(Self::DoubleStar),
            [b'*', b'=', ..] => Some(Self::StarEqual),
            [b'+', b'=', ..] => Some(Self::PlusEqual),
            [b'-', b'=', ..] => Some(Self::MinEqual),
            [b'-', b'>', ..] => Some(Self::Rarrow),
            [b'/', b'/', ..] => Some(Self::DoubleSlash),
            [b'/', b'=', ..] => Some(Self::SlashEqual),
            [b':', b'=', ..] => Some(Self::ColonEqual),
            [b'<', b'<', ..] => Some(Self::LeftShift),
            [b'<', b'=', ..] => Some(Self::LessEqual),
            [b'=', b'=', ..] => Some(Self::EqEqual),
            [b'>', b'=', ..] => Some(Self::GreaterEqual),
            [b'>', b'>', ..] => Some(Self::RightShift),
            [b'@', b'=', ..] => Some(Self::AtEqual),
            [b'^', b'=', ..] => Some(Self::CircumflexEqual),
            [b'|', b'=', ..] => Some(Self::VbarEqual),
            _ => None,
        };
        if let Some(kind) = two {
            return Some((kind, 2));
        }
        let one = match text.first()? {
            b'(' => Self::Lpar,
            b')' => Self::Rpar,
            b'[' => Self::Lsqb,
            b']' => Self::Rsqb,
            b'{' => Self::Lbrace,
            b'}' => Self::Rbrace,
            b':' => Self::Colon,
            b',' => Self::Comma,
            b';' => Self::Semi,
            b'+' => Self::Plus,
            b'-' => Self::Minus,
            b'*' => Self::Star,
            b'/' => Self::Slash,
            b'|' => Self::Vbar,
            b'&' => Self::Amper,
            b'<' => Self::Less,
            b'>' => Self::Greater,
            b'=' => Self::Equal,
            b'.' => Self::Dot,
            b'%' => Self::Percent,
            b'~' => Self::Tilde,
            b'^' => Self::Circumflex,
            b'@' => Self::At,
            b'!' => Self::Exclamation,
            _ => return None,
        };
        Some((one, 1))
    }
}

bitflags! {
    /// Literal shape information recorded by the tokenizer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TokenFlags: u16 {
        const RAW = 1 << 0;
        const BYTES = 1 << 1;
        const FORMATTED = 1 << 2;
        const UNICODE = 1 << 3;
        const TRIPLE_QUOTED = 1 << 4;
        const FLOAT = 1 << 5;
        const IMAGINARY = 1 << 6;
        const HEX = 1 << 7;
        const OCTAL = 1 << 8;
        const BINARY = 1 << 9;
        const UNTERMINATED = 1 << 10;
    }
}

/// Lexical problem attached to a [`TokenKind::Error`] token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenError {
    pub kind: ErrorKind,
    pub message: String,
    /// Where the diagnostic should point; may differ from the token's own range
    /// (an unclosed bracket points at the bracket, not at the end of input).
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub range: SourceRange,
    pub flags: TokenFlags,
    /// Bracket nesting depth after this token.
    pub level: u16,
    pub error: Option<Box<TokenError>>,
}

impl Token<'_> {
    #[must_use]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// Whether this is a NAME token spelled `word`, used for soft keywords.
    #[must_use]
    pub fn is_soft_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Name && self.text == word
    }
}

/// Position the tokenizer starts counting from.
///
/// Whole files start at offset 0, line 1, column 0. Fragments re-tokenized out of an
/// f-string start wherever the fragment sits in the enclosing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceBase {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl Default for SourceBase {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenBracket {
    ch: u8,
    line: u32,
    range: SourceRange,
}

/// Restartable cursor state.
///
/// Cloning the state is enough to resume tokenizing later from the same point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerState {
    pos: usize,
    line: u32,
    line_start: usize,
    at_bol: bool,
    indents: Vec<u32>,
    alt_indents: Vec<u32>,
    /// Positive: INDENTs still to emit. Negative: DEDENTs still to emit.
    pending: i32,
    pending_range: SourceRange,
    parens: Vec<OpenBracket>,
    line_has_tokens: bool,
    done: bool,
}

#[derive(Debug, Clone)]
pub struct Tokenizer<'src> {
    source: &'src str,
    base: SourceBase,
    tab_size: u32,
    /// Brackets assumed open around the whole input; newlines inside are insignificant.
    implicit_level: u16,
    state: TokenizerState,
}

/// Tokenizes a complete source text with default settings.
#[must_use]
pub fn tokenize(source: &str) -> Tokenizer<'_> {
    Tokenizer::new(source)
}

impl<'src> Tokenizer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self::with_base(source, SourceBase::default(), 0)
    }

    /// Tokenizer for a fragment of a larger file, positioned at `base` and treated as if
    /// `implicit_level` brackets were already open.
    #[must_use]
    pub fn with_base(source: &'src str, base: SourceBase, implicit_level: u16) -> Self {
        // a BOM is not part of the program text
        let skip = if source.starts_with('\u{feff}') { 3 } else { 0 };
        Self {
            source,
            base,
            tab_size: DEFAULT_TAB_SIZE,
            implicit_level,
            state: TokenizerState {
                pos: skip,
                line: base.line,
                line_start: skip,
                at_bol: implicit_level == 0,
                indents: vec![0],
                alt_indents: vec![0],
                pending: 0,
                pending_range: SourceRange::default(),
                parens: Vec::new(),
                line_has_tokens: false,
                done: false,
            },
        }
    }

    #[must_use]
    pub fn tab_size(mut self, tab_size: u32) -> Self {
        self.tab_size = tab_size.max(1);
        self
    }

    #[must_use]
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Snapshot of the cursor, for [`Tokenizer::reset`].
    #[must_use]
    pub fn state(&self) -> TokenizerState {
        self.state.clone()
    }

    pub fn reset(&mut self, state: TokenizerState) {
        self.state = state;
    }

    fn offset(&self, pos: usize) -> u32 {
        to_u32(pos) + self.base.offset
    }

    fn loc(&self, pos: usize) -> CodeLoc {
        let col = to_u32(pos - self.state.line_start);
        if self.state.line == self.base.line {
            CodeLoc::new(self.state.line, col + self.base.column)
        } else {
            CodeLoc::new(self.state.line, col)
        }
    }

    /// Range from `start` (captured earlier via [`Self::mark`]) up to the cursor.
    fn range_from(&self, start: (u32, CodeLoc)) -> SourceRange {
        SourceRange::new(start.0, self.offset(self.state.pos), start.1, self.loc(self.state.pos))
    }

    fn mark(&self) -> (u32, CodeLoc) {
        (self.offset(self.state.pos), self.loc(self.state.pos))
    }

    fn point(&self) -> SourceRange {
        let here = self.mark();
        SourceRange::new(here.0, here.0, here.1, here.1)
    }

    fn peek(&self, ahead: usize) -> u8 {
        self.source.as_bytes().get(self.state.pos + ahead).copied().unwrap_or(0)
    }

    fn at_eof(&self) -> bool {
        self.state.pos >= self.source.len()
    }

    fn level(&self) -> u16 {
        u16::try_from(self.state.parens.len()).unwrap_or(u16::MAX) + self.implicit_level
    }

    /// Consumes a line terminator at the cursor, if any, and moves to the next line.
    fn eat_newline(&mut self) -> bool {
        let len = match (self.peek(0), self.peek(1)) {
            (b'\r', b'\n') => 2,
            (b'\r' | b'\n', _) => 1,
            _ => return false,
        };
        self.state.pos += len;
        self.state.line += 1;
        self.state.line_start = self.state.pos;
        true
    }

    fn token(&mut self, kind: TokenKind, start_pos: usize, start: (u32, CodeLoc), flags: TokenFlags) -> Token<'src> {
        if !matches!(kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent) {
            self.state.line_has_tokens = true;
        }
        Token {
            kind,
            text: &self.source[start_pos..self.state.pos],
            range: self.range_from(start),
            flags,
            level: self.level(),
            error: None,
        }
    }

    fn error_token(
        &mut self,
        start_pos: usize,
        start: (u32, CodeLoc),
        kind: ErrorKind,
        message: String,
        error_range: Option<SourceRange>,
    ) -> Token<'src> {
        self.state.done = true;
        let range = self.range_from(start);
        Token {
            kind: TokenKind::Error,
            text: &self.source[start_pos..self.state.pos],
            range,
            flags: TokenFlags::empty(),
            level: self.level(),
            error: Some(Box::new(TokenError {
                kind,
                message,
                range: error_range.unwrap_or(range),
            })),
        }
    }

    fn syntax_error(&mut self, start_pos: usize, start: (u32, CodeLoc), message: String) -> Token<'src> {
        self.error_token(start_pos, start, ErrorKind::Syntax, message, None)
    }

    /// A syntax error reported at byte `at` of the current line rather than at the
    /// token start.
    fn syntax_error_at(&mut self, start_pos: usize, start: (u32, CodeLoc), message: String, at: usize) -> Token<'src> {
        let (offset, loc) = (self.offset(at), self.loc(at));
        let range = SourceRange::new(offset, offset, loc, loc);
        self.error_token(start_pos, start, ErrorKind::Syntax, message, Some(range))
    }

    fn end_marker(&mut self) -> Token<'src> {
        self.state.done = true;
        Token {
            kind: TokenKind::EndMarker,
            text: "",
            range: self.point(),
            flags: TokenFlags::empty(),
            level: self.level(),
            error: None,
        }
    }

    /// Produces the next token. After ENDMARKER or an error token, keeps returning
    /// ENDMARKER.
    pub fn next_token(&mut self) -> Token<'src> {
        loop {
            if let Some(tok) = self.scan() {
                return tok;
            }
        }
    }

    /// One scanning step; `None` means an insignificant line break was skipped.
    fn scan(&mut self) -> Option<Token<'src>> {
        if self.state.done {
            return Some(self.end_marker());
        }
        if self.state.at_bol {
            self.state.at_bol = false;
            if let Some(err) = self.indentation() {
                return Some(err);
            }
        }
        if let Some(tok) = self.pending_indent() {
            return Some(tok);
        }

        loop {
            match self.peek(0) {
                b' ' | b'\t' | b'\x0c' => self.state.pos += 1,
                b'#' => {
                    while !self.at_eof() && !matches!(self.peek(0), b'\n' | b'\r') {
                        self.state.pos += 1;
                    }
                }
                b'\\' => {
                    let start_pos = self.state.pos;
                    let start = self.mark();
                    self.state.pos += 1;
                    if self.eat_newline() {
                        if self.at_eof() {
                            return Some(self.syntax_error(start_pos, start, ErrorMessage::UnexpectedEof.format(&[])));
                        }
                    } else if self.at_eof() {
                        return Some(self.syntax_error(start_pos, start, ErrorMessage::UnexpectedEof.format(&[])));
                    } else {
                        let at = self.state.pos;
                        return Some(self.syntax_error_at(
                            start_pos,
                            start,
                            ErrorMessage::UnexpectedAfterContinuation.format(&[]),
                            at,
                        ));
                    }
                }
                _ => break,
            }
        }

        if self.at_eof() {
            return Some(self.eof_token());
        }

        let start_pos = self.state.pos;
        let start = self.mark();
        let c = self.peek(0);

        if matches!(c, b'\n' | b'\r') {
            let significant = self.state.parens.is_empty() && self.implicit_level == 0 && self.state.line_has_tokens;
            let len = if c == b'\r' && self.peek(1) == b'\n' { 2 } else { 1 };
            if significant {
                self.state.pos += len;
                let tok = self.token(TokenKind::Newline, start_pos, start, TokenFlags::empty());
                self.state.pos -= len;
                self.eat_newline();
                self.state.line_has_tokens = false;
                self.state.at_bol = true;
                return Some(tok);
            }
            self.eat_newline();
            if self.state.parens.is_empty() && self.implicit_level == 0 {
                self.state.at_bol = true;
            }
            return None;
        }

        if c.is_ascii_digit() || (c == b'.' && self.peek(1).is_ascii_digit()) {
            return Some(self.number(start_pos, start));
        }

        if c == b'"' || c == b'\'' {
            return Some(self.string(start_pos, start, TokenFlags::empty()));
        }

        if let Some(ch) = self.source[self.state.pos..].chars().next()
            && is_identifier_start(ch)
        {
            return Some(self.name(start_pos, start));
        }

        if let Some((kind, len)) = TokenKind::operator(&self.source.as_bytes()[self.state.pos..]) {
            self.state.pos += len;
            return Some(match kind {
                TokenKind::Lpar | TokenKind::Lsqb | TokenKind::Lbrace => self.open_bracket(kind, c, start_pos, start),
                TokenKind::Rpar | TokenKind::Rsqb | TokenKind::Rbrace => self.close_bracket(kind, c, start_pos, start),
                _ => self.token(kind, start_pos, start, TokenFlags::empty()),
            });
        }

        let ch = self.source[self.state.pos..].chars().next().unwrap_or('\0');
        self.state.pos += ch.len_utf8();
        let message = if ch.is_ascii() {
            ErrorMessage::InvalidSyntax.format(&[])
        } else {
            let code = format!("{:04X}", u32::from(ch));
            ErrorMessage::InvalidCharacter.format(&[&ch.to_string(), &code])
        };
        Some(self.syntax_error(start_pos, start, message))
    }

    fn pending_indent(&mut self) -> Option<Token<'src>> {
        let range = self.state.pending_range;
        let kind = match self.state.pending {
            0 => return None,
            n if n > 0 => {
                self.state.pending -= 1;
                TokenKind::Indent
            }
            _ => {
                self.state.pending += 1;
                TokenKind::Dedent
            }
        };
        let (range, text) = if kind == TokenKind::Indent {
            let start = (range.start_offset - self.base.offset) as usize;
            (range, &self.source[start..self.state.pos])
        } else {
            (range.end_point(), "")
        };
        Some(Token {
            kind,
            text,
            range,
            flags: TokenFlags::empty(),
            level: self.level(),
            error: None,
        })
    }

    /// Measures the indentation of the next non-blank line and queues INDENT/DEDENT tokens.
    fn indentation(&mut self) -> Option<Token<'src>> {
        loop {
            let line_begin = self.state.pos;
            let line_mark = self.mark();
            let mut col: u32 = 0;
            let mut alt_col: u32 = 0;
            loop {
                match self.peek(0) {
                    b' ' => {
                        col += 1;
                        alt_col += 1;
                    }
                    b'\t' => {
                        col = (col / self.tab_size + 1) * self.tab_size;
                        alt_col += 1;
                    }
                    b'\x0c' => {
                        col = 0;
                        alt_col = 0;
                    }
                    _ => break,
                }
                self.state.pos += 1;
            }
            if self.at_eof() {
                return None;
            }
            match self.peek(0) {
                b'#' => {
                    while !self.at_eof() && !matches!(self.peek(0), b'\n' | b'\r') {
                        self.state.pos += 1;
                    }
                    if !self.eat_newline() {
                        return None;
                    }
                    continue;
                }
                b'\n' | b'\r' => {
                    self.eat_newline();
                    continue;
                }
                _ => {}
            }

            let range = self.range_from(line_mark);
            self.state.pending_range = range;
            let top = self.state.indents.last().copied().unwrap_or(0);
            let alt_top = self.state.alt_indents.last().copied().unwrap_or(0);
            if col == top {
                if alt_col != alt_top {
                    return Some(self.indent_error(line_begin, line_mark, ErrorMessage::InconsistentTabs));
                }
            } else if col > top {
                if self.state.indents.len() >= MAX_INDENT_LEVEL {
                    return Some(self.indent_error(line_begin, line_mark, ErrorMessage::TooDeepIndentation));
                }
                if alt_col <= alt_top {
                    return Some(self.indent_error(line_begin, line_mark, ErrorMessage::InconsistentTabs));
                }
                self.state.indents.push(col);
                self.state.alt_indents.push(alt_col);
                self.state.pending += 1;
            } else {
                while self.state.indents.len() > 1 && col < self.state.indents.last().copied().unwrap_or(0) {
                    self.state.indents.pop();
                    self.state.alt_indents.pop();
                    self.state.pending -= 1;
                }
                if col != self.state.indents.last().copied().unwrap_or(0) {
                    return Some(self.indent_error(line_begin, line_mark, ErrorMessage::UnindentMismatch));
                }
                if alt_col != self.state.alt_indents.last().copied().unwrap_or(0) {
                    return Some(self.indent_error(line_begin, line_mark, ErrorMessage::InconsistentTabs));
                }
            }
            return None;
        }
    }

    fn indent_error(&mut self, start_pos: usize, start: (u32, CodeLoc), message: ErrorMessage) -> Token<'src> {
        self.error_token(start_pos, start, ErrorKind::Indentation, message.format(&[]), None)
    }

    fn eof_token(&mut self) -> Token<'src> {
        if self.implicit_level == 0
            && let Some(open) = self.state.parens.first().copied()
        {
            let start_pos = self.state.pos;
            let start = self.mark();
            let ch = char::from(open.ch).to_string();
            return self.error_token(
                start_pos,
                start,
                ErrorKind::Syntax,
                ErrorMessage::NeverClosed.format(&[&ch]),
                Some(open.range),
            );
        }
        if self.state.line_has_tokens && self.implicit_level == 0 {
            self.state.line_has_tokens = false;
            let point = self.point();
            return Token {
                kind: TokenKind::Newline,
                text: "",
                range: point,
                flags: TokenFlags::empty(),
                level: 0,
                error: None,
            };
        }
        if self.state.indents.len() > 1 {
            self.state.indents.pop();
            self.state.alt_indents.pop();
            let point = self.point();
            return Token {
                kind: TokenKind::Dedent,
                text: "",
                range: point,
                flags: TokenFlags::empty(),
                level: 0,
                error: None,
            };
        }
        self.end_marker()
    }

    fn open_bracket(&mut self, kind: TokenKind, ch: u8, start_pos: usize, start: (u32, CodeLoc)) -> Token<'src> {
        if self.state.parens.len() >= MAX_PAREN_LEVEL {
            return self.syntax_error(start_pos, start, ErrorMessage::TooManyNestedParens.format(&[]));
        }
        let range = self.range_from(start);
        self.state.parens.push(OpenBracket {
            ch,
            line: start.1.line,
            range,
        });
        self.token(kind, start_pos, start, TokenFlags::empty())
    }

    fn close_bracket(&mut self, kind: TokenKind, ch: u8, start_pos: usize, start: (u32, CodeLoc)) -> Token<'src> {
        let close = char::from(ch).to_string();
        let Some(open) = self.state.parens.pop() else {
            if self.implicit_level > 0 {
                return self.token(kind, start_pos, start, TokenFlags::empty());
            }
            return self.syntax_error(start_pos, start, ErrorMessage::UnmatchedBracket.format(&[&close]));
        };
        let expected = match open.ch {
            b'(' => b')',
            b'[' => b']',
            _ => b'}',
        };
        if expected != ch {
            let open_ch = char::from(open.ch).to_string();
            let message = if open.line == start.1.line {
                ErrorMessage::MismatchedBracket.format(&[&close, &open_ch])
            } else {
                ErrorMessage::MismatchedBracketOnLine.format(&[&close, &open_ch, &open.line.to_string()])
            };
            return self.syntax_error(start_pos, start, message);
        }
        self.token(kind, start_pos, start, TokenFlags::empty())
    }

    fn name(&mut self, start_pos: usize, start: (u32, CodeLoc)) -> Token<'src> {
        for ch in self.source[self.state.pos..].chars() {
            if is_identifier_continue(ch) {
                self.state.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        let text = &self.source[start_pos..self.state.pos];
        if matches!(self.peek(0), b'"' | b'\'')
            && let Some(flags) = string_prefix_flags(text)
        {
            return self.string(start_pos, start, flags);
        }
        match Keyword::from_str(text) {
            Ok(keyword) => self.token(TokenKind::Keyword(keyword), start_pos, start, TokenFlags::empty()),
            Err(_) => self.token(TokenKind::Name, start_pos, start, TokenFlags::empty()),
        }
    }

    /// Scans a string literal; the cursor sits on the opening quote.
    fn string(&mut self, start_pos: usize, start: (u32, CodeLoc), mut flags: TokenFlags) -> Token<'src> {
        let quote = self.peek(0);
        let triple = self.peek(1) == quote && self.peek(2) == quote;
        let start_line = start.1.line;
        if triple {
            flags |= TokenFlags::TRIPLE_QUOTED;
            self.state.pos += 3;
        } else {
            self.state.pos += 1;
        }
        loop {
            if self.at_eof() {
                let line = self.state.line.to_string();
                let message = if triple {
                    ErrorMessage::UnterminatedTripleQuotedString.format(&[&line])
                } else {
                    ErrorMessage::UnterminatedString.format(&[&line])
                };
                let error_range = Some(SourceRange::new(
                    start.0,
                    start.0 + 1,
                    start.1,
                    CodeLoc::new(start.1.line, start.1.column + 1),
                ));
                let mut tok = self.error_token(start_pos, start, ErrorKind::Syntax, message, error_range);
                tok.flags = flags | TokenFlags::UNTERMINATED;
                return tok;
            }
            let c = self.peek(0);
            if c == quote {
                if !triple {
                    self.state.pos += 1;
                    break;
                }
                if self.peek(1) == quote && self.peek(2) == quote {
                    self.state.pos += 3;
                    break;
                }
                self.state.pos += 1;
            } else if c == b'\\' {
                self.state.pos += 1;
                if !self.eat_newline() && !self.at_eof() {
                    let ch = self.source[self.state.pos..].chars().next().unwrap_or('\0');
                    self.state.pos += ch.len_utf8();
                }
            } else if matches!(c, b'\n' | b'\r') {
                if !triple {
                    let line = start_line.to_string();
                    let message = ErrorMessage::UnterminatedString.format(&[&line]);
                    let mut tok = self.error_token(start_pos, start, ErrorKind::Syntax, message, None);
                    tok.flags = flags | TokenFlags::UNTERMINATED;
                    return tok;
                }
                self.eat_newline();
            } else {
                let ch = self.source[self.state.pos..].chars().next().unwrap_or('\0');
                self.state.pos += ch.len_utf8();
            }
        }
        self.token(TokenKind::String, start_pos, start, flags)
    }

    /// Scans a numeric literal; the cursor sits on its first character.
    fn number(&mut self, start_pos: usize, start: (u32, CodeLoc)) -> Token<'src> {
        let mut flags = TokenFlags::empty();
        if self.peek(0) == b'0' && matches!(self.peek(1), b'x' | b'X' | b'o' | b'O' | b'b' | b'B') {
            let (flag, name, valid): (TokenFlags, &str, fn(u8) -> bool) = match self.peek(1) {
                b'x' | b'X' => (TokenFlags::HEX, "hexadecimal", |c: u8| c.is_ascii_hexdigit()),
                b'o' | b'O' => (TokenFlags::OCTAL, "octal", |c: u8| (b'0'..=b'7').contains(&c)),
                _ => (TokenFlags::BINARY, "binary", |c: u8| c == b'0' || c == b'1'),
            };
            flags |= flag;
            self.state.pos += 2;
            loop {
                if self.peek(0) == b'_' {
                    self.state.pos += 1;
                }
                if !valid(self.peek(0)) {
                    return self.bad_digit(start_pos, start, name);
                }
                while valid(self.peek(0)) {
                    self.state.pos += 1;
                }
                if self.peek(0) != b'_' {
                    break;
                }
            }
            if flag != TokenFlags::HEX && self.peek(0).is_ascii_digit() {
                return self.bad_digit(start_pos, start, name);
            }
            if let Some(err) = self.verify_end_of_number(start_pos, start, name) {
                return err;
            }
            return self.token(TokenKind::Number, start_pos, start, flags);
        }

        let leading_zero = self.peek(0) == b'0';
        if self.peek(0) != b'.' {
            if let Some(err) = self.decimal_tail(start_pos, start) {
                return err;
            }
        }
        let integer_part_nonzero = leading_zero
            && self.source[start_pos..self.state.pos]
                .bytes()
                .any(|c| c.is_ascii_digit() && c != b'0');

        if self.peek(0) == b'.' {
            flags |= TokenFlags::FLOAT;
            self.state.pos += 1;
            if self.peek(0).is_ascii_digit()
                && let Some(err) = self.decimal_tail(start_pos, start)
            {
                return err;
            }
        }
        if matches!(self.peek(0), b'e' | b'E') {
            let e_pos = self.state.pos;
            self.state.pos += 1;
            if matches!(self.peek(0), b'+' | b'-') {
                self.state.pos += 1;
                if !self.peek(0).is_ascii_digit() {
                    let message = ErrorMessage::InvalidNumberLiteral.format(&["decimal"]);
                    return self.syntax_error_at(start_pos, start, message, self.state.pos - 1);
                }
            } else if !self.peek(0).is_ascii_digit() {
                self.state.pos = e_pos;
                if let Some(err) = self.verify_end_of_number(start_pos, start, "decimal") {
                    return err;
                }
                return self.finish_decimal(start_pos, start, flags, integer_part_nonzero);
            }
            flags |= TokenFlags::FLOAT;
            if let Some(err) = self.decimal_tail(start_pos, start) {
                return err;
            }
        }
        if matches!(self.peek(0), b'j' | b'J') {
            flags |= TokenFlags::IMAGINARY;
            self.state.pos += 1;
        }
        if let Some(err) = self.verify_end_of_number(start_pos, start, "decimal") {
            return err;
        }
        self.finish_decimal(start_pos, start, flags, integer_part_nonzero)
    }

    fn finish_decimal(
        &mut self,
        start_pos: usize,
        start: (u32, CodeLoc),
        flags: TokenFlags,
        leading_zero_nonzero: bool,
    ) -> Token<'src> {
        if leading_zero_nonzero && !flags.intersects(TokenFlags::FLOAT | TokenFlags::IMAGINARY) {
            return self.syntax_error(start_pos, start, ErrorMessage::LeadingZeros.format(&[]));
        }
        self.token(TokenKind::Number, start_pos, start, flags)
    }

    /// Digits with single underscores between them.
    fn decimal_tail(&mut self, start_pos: usize, start: (u32, CodeLoc)) -> Option<Token<'src>> {
        loop {
            while self.peek(0).is_ascii_digit() {
                self.state.pos += 1;
            }
            if self.peek(0) != b'_' {
                return None;
            }
            self.state.pos += 1;
            if !self.peek(0).is_ascii_digit() {
                let message = ErrorMessage::InvalidNumberLiteral.format(&["decimal"]);
                return Some(self.syntax_error_at(start_pos, start, message, self.state.pos - 1));
            }
        }
    }

    /// The digit itself is reported for an out-of-range digit, otherwise the character
    /// before the one that cannot continue the literal.
    fn bad_digit(&mut self, start_pos: usize, start: (u32, CodeLoc), name: &str) -> Token<'src> {
        let c = self.peek(0);
        let at = self.state.pos;
        if c.is_ascii_digit() && name != "hexadecimal" {
            self.state.pos += 1;
            let digit = char::from(c).to_string();
            return self.syntax_error_at(start_pos, start, ErrorMessage::InvalidDigit.format(&[&digit, name]), at);
        }
        if c != 0 {
            self.state.pos += 1;
        }
        self.syntax_error_at(start_pos, start, ErrorMessage::InvalidNumberLiteral.format(&[name]), at - 1)
    }

    /// A number directly followed by an identifier character is an error, except for the
    /// handful of keywords CPython still tolerates there (`1if x else y`).
    fn verify_end_of_number(&mut self, start_pos: usize, start: (u32, CodeLoc), name: &str) -> Option<Token<'src>> {
        let rest = &self.source[self.state.pos..];
        let ch = rest.chars().next()?;
        if !is_identifier_continue(ch) {
            return None;
        }
        const TOLERATED: [&str; 8] = ["and", "else", "for", "if", "in", "is", "not", "or"];
        if TOLERATED.iter().any(|kw| rest.starts_with(kw)) {
            return None;
        }
        let at = self.state.pos - 1;
        self.state.pos += ch.len_utf8();
        Some(self.syntax_error_at(start_pos, start, ErrorMessage::InvalidNumberLiteral.format(&[name]), at))
    }
}

impl<'src> Iterator for Tokenizer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.done {
            None
        } else {
            Some(self.next_token())
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_' || unicode_ident::is_xid_start(ch)
}

fn is_identifier_continue(ch: char) -> bool {
    unicode_ident::is_xid_continue(ch)
}

/// Flags for a valid string prefix (`r`, `b`, `f`, `u` and their legal combinations,
/// in any case), or `None` if `text` is an ordinary name.
fn string_prefix_flags(text: &str) -> Option<TokenFlags> {
    if text.len() > 2 {
        return None;
    }
    let mut flags = TokenFlags::empty();
    for c in text.bytes() {
        let flag = match c.to_ascii_lowercase() {
            b'r' => TokenFlags::RAW,
            b'b' => TokenFlags::BYTES,
            b'f' => TokenFlags::FORMATTED,
            b'u' => TokenFlags::UNICODE,
            _ => return None,
        };
        if flags.contains(flag) {
            return None;
        }
        flags |= flag;
    }
    let legal = flags.bits().count_ones() == 1
        || flags == TokenFlags::RAW | TokenFlags::BYTES
        || flags == TokenFlags::RAW | TokenFlags::FORMATTED;
    legal.then_some(flags)
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).map(|t| t.kind).collect()
    }

    #[test]
    fn string_prefixes() {
        assert_eq!(string_prefix_flags("rb"), Some(TokenFlags::RAW | TokenFlags::BYTES));
        assert_eq!(string_prefix_flags("Fr"), Some(TokenFlags::RAW | TokenFlags::FORMATTED));
        assert_eq!(string_prefix_flags("U"), Some(TokenFlags::UNICODE));
        assert_eq!(string_prefix_flags("ub"), None);
        assert_eq!(string_prefix_flags("bf"), None);
        assert_eq!(string_prefix_flags("rr"), None);
    }

    #[test]
    fn implicit_newline_at_eof() {
        assert_eq!(
            kinds("x"),
            vec![TokenKind::Name, TokenKind::Newline, TokenKind::EndMarker]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        assert_eq!(
            kinds("(a,\n b)\n"),
            vec![
                TokenKind::Lpar,
                TokenKind::Name,
                TokenKind::Comma,
                TokenKind::Name,
                TokenKind::Rpar,
                TokenKind::Newline,
                TokenKind::EndMarker
            ]
        );
    }

    #[test]
    fn state_snapshot_restarts() {
        let mut tokenizer = tokenize("a b c");
        tokenizer.next_token();
        let saved = tokenizer.state();
        let first = tokenizer.next_token();
        tokenizer.next_token();
        tokenizer.reset(saved);
        assert_eq!(tokenizer.next_token(), first);
    }
}

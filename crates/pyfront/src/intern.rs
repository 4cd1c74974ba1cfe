//! Identifier, bytes and long integer interning, plus the keyword table.
//!
//! The parser stores identifiers and string literal values as [`StringId`]s, bytes
//! literals as [`BytesId`]s and integers that do not fit in `i64` as [`LongIntId`]s.
//! String literals holding lone surrogates are stored as code points, [`CodePointsId`].
//! The tree stays `Copy`-friendly and cheap to compare, and callers look the values up
//! in the [`InternerBuilder`] that travels with the parse result.
//!
//! StringIds are laid out as follows:
//! * 0 to 128 - single character strings for all 128 ASCII characters
//! * 1000 to count(StaticStrings) - strings StaticStrings
//! * 10_000+ - strings interned per compilation unit

use std::{str::FromStr, sync::LazyLock};

use ahash::AHashMap;
use num_bigint::BigInt;
use strum::{Display, EnumString, FromRepr, IntoStaticStr};

/// Index into the string interner's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the StringId for an ASCII byte.
    #[must_use]
    pub fn from_ascii(byte: u8) -> Self {
        Self(u32::from(byte))
    }
}

const STATIC_STRING_ID_OFFSET: u32 = 1000;
const INTERN_STRING_ID_OFFSET: usize = 10_000;

/// Single-character strings for the ASCII range, built once on first access.
static ASCII_STRS: LazyLock<[&'static str; 128]> = LazyLock::new(|| {
    std::array::from_fn(|i| {
        let s = char::from(u8::try_from(i).expect("index out of u8 range")).to_string();
        &*Box::leak(s.into_boxed_str())
    })
});

/// Names the scope builder and printer refer to without interning them first.
#[repr(u16)]
#[derive(Debug, Clone, Copy, FromRepr, EnumString, IntoStaticStr, PartialEq, Eq, Hash)]
pub enum StaticStrings {
    #[strum(serialize = "")]
    EmptyString,
    #[strum(serialize = "<module>")]
    Module,
    #[strum(serialize = "<lambda>")]
    Lambda,
    #[strum(serialize = "<listcomp>")]
    ListComp,
    #[strum(serialize = "<setcomp>")]
    SetComp,
    #[strum(serialize = "<dictcomp>")]
    DictComp,
    #[strum(serialize = "<genexpr>")]
    GenExpr,
    #[strum(serialize = "__class__")]
    DunderClass,
    #[strum(serialize = "super")]
    Super,
    #[strum(serialize = "print")]
    Print,
    #[strum(serialize = "exec")]
    Exec,
}

impl StaticStrings {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Attempts to convert a `StringId` back to a `StaticStrings` variant.
    #[must_use]
    pub fn from_string_id(id: StringId) -> Option<Self> {
        let index = id.0.checked_sub(STATIC_STRING_ID_OFFSET)?;
        u16::try_from(index).ok().and_then(Self::from_repr)
    }
}

impl From<StaticStrings> for StringId {
    fn from(s: StaticStrings) -> Self {
        Self(s as u32 + STATIC_STRING_ID_OFFSET)
    }
}

impl PartialEq<StaticStrings> for StringId {
    fn eq(&self, other: &StaticStrings) -> bool {
        *self == Self::from(*other)
    }
}

/// Index into the bytes literal storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BytesId(u32);

impl BytesId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the code point storage, for `str` literals holding lone surrogates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CodePointsId(u32);

impl CodePointsId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the long integer storage, for literals that overflow `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LongIntId(u32);

impl LongIntId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interner owned by a single parse.
///
/// Strings are deduplicated on insertion. Bytes, code points and long integers are not
/// (rare enough that it's not worth it).
#[derive(Debug, Default, Clone)]
pub struct InternerBuilder {
    /// Maps strings to their indices for deduplication during interning.
    string_map: AHashMap<String, StringId>,
    /// Storage for interned strings, indexed by `StringId`.
    strings: Vec<String>,
    bytes: Vec<Vec<u8>>,
    code_points: Vec<Vec<u32>>,
    long_ints: Vec<BigInt>,
}

impl InternerBuilder {
    /// Creates an interner sized from a rough guess at the identifier count of `code`.
    #[must_use]
    pub fn new(code: &str) -> Self {
        let capacity = code.len() >> 4;
        Self {
            string_map: AHashMap::with_capacity(capacity),
            strings: Vec::with_capacity(capacity),
            bytes: Vec::new(),
            code_points: Vec::new(),
            long_ints: Vec::new(),
        }
    }

    /// Interns a string, returning its `StringId`.
    ///
    /// * If the string is ascii, return the pre-interned string id
    /// * If the string is a known static string, return the pre-interned string id
    /// * If the string was already interned, returns the existing string id
    /// * Otherwise, stores the string and returns a new string id
    pub fn intern(&mut self, s: &str) -> StringId {
        if s.len() == 1 && s.is_ascii() {
            StringId::from_ascii(s.as_bytes()[0])
        } else if let Ok(ss) = StaticStrings::from_str(s) {
            ss.into()
        } else {
            *self.string_map.entry(s.to_owned()).or_insert_with(|| {
                let string_id = self.strings.len() + INTERN_STRING_ID_OFFSET;
                let id = StringId(string_id.try_into().expect("StringId overflow"));
                self.strings.push(s.to_owned());
                id
            })
        }
    }

    pub fn intern_bytes(&mut self, b: &[u8]) -> BytesId {
        let id = BytesId(self.bytes.len().try_into().expect("BytesId overflow"));
        self.bytes.push(b.to_vec());
        id
    }

    pub fn intern_code_points(&mut self, points: &[u32]) -> CodePointsId {
        let id = CodePointsId(self.code_points.len().try_into().expect("CodePointsId overflow"));
        self.code_points.push(points.to_vec());
        id
    }

    pub fn intern_long_int(&mut self, bi: BigInt) -> LongIntId {
        let id = LongIntId(self.long_ints.len().try_into().expect("LongIntId overflow"));
        self.long_ints.push(bi);
        id
    }

    /// Looks up a string by its `StringId`.
    #[inline]
    #[must_use]
    pub fn get_str(&self, id: StringId) -> &str {
        if let Ok(c) = u8::try_from(id.0)
            && c < 128
        {
            ASCII_STRS[c as usize]
        } else if let Some(ss) = StaticStrings::from_string_id(id) {
            ss.into()
        } else {
            &self.strings[id.index() - INTERN_STRING_ID_OFFSET]
        }
    }

    /// Looks up a `StringId` by its string value without interning it.
    #[must_use]
    pub fn try_get_str_id(&self, s: &str) -> Option<StringId> {
        if s.len() == 1 && s.is_ascii() {
            return Some(StringId::from_ascii(s.as_bytes()[0]));
        }
        if let Ok(ss) = StaticStrings::from_str(s) {
            return Some(ss.into());
        }
        self.string_map.get(s).copied()
    }

    #[must_use]
    pub fn get_bytes(&self, id: BytesId) -> &[u8] {
        &self.bytes[id.index()]
    }

    #[must_use]
    pub fn get_code_points(&self, id: CodePointsId) -> &[u32] {
        &self.code_points[id.index()]
    }

    #[must_use]
    pub fn get_long_int(&self, id: LongIntId) -> &BigInt {
        &self.long_ints[id.index()]
    }
}

/// Hard keywords. They are reserved everywhere and tokenized as [`crate::TokenKind::Keyword`].
///
/// Soft keywords (`match`, `case`, `type`, `_`) are ordinary names to the tokenizer and
/// only become keywords in the grammar positions that expect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display)]
pub enum Keyword {
    False,
    None,
    True,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "as")]
    As,
    #[strum(serialize = "assert")]
    Assert,
    #[strum(serialize = "async")]
    Async,
    #[strum(serialize = "await")]
    Await,
    #[strum(serialize = "break")]
    Break,
    #[strum(serialize = "class")]
    Class,
    #[strum(serialize = "continue")]
    Continue,
    #[strum(serialize = "def")]
    Def,
    #[strum(serialize = "del")]
    Del,
    #[strum(serialize = "elif")]
    Elif,
    #[strum(serialize = "else")]
    Else,
    #[strum(serialize = "except")]
    Except,
    #[strum(serialize = "finally")]
    Finally,
    #[strum(serialize = "for")]
    For,
    #[strum(serialize = "from")]
    From,
    #[strum(serialize = "global")]
    Global,
    #[strum(serialize = "if")]
    If,
    #[strum(serialize = "import")]
    Import,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "lambda")]
    Lambda,
    #[strum(serialize = "nonlocal")]
    Nonlocal,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "pass")]
    Pass,
    #[strum(serialize = "raise")]
    Raise,
    #[strum(serialize = "return")]
    Return,
    #[strum(serialize = "try")]
    Try,
    #[strum(serialize = "while")]
    While,
    #[strum(serialize = "with")]
    With,
    #[strum(serialize = "yield")]
    Yield,
}

impl Keyword {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates() {
        let mut interner = InternerBuilder::new("");
        let a = interner.intern("spam");
        let b = interner.intern("spam");
        assert_eq!(a, b);
        assert_eq!(interner.get_str(a), "spam");
        assert_eq!(interner.try_get_str_id("eggs"), None);
    }

    #[test]
    fn ascii_and_static_strings_resolve_without_storage() {
        let mut interner = InternerBuilder::new("");
        let x = interner.intern("x");
        assert_eq!(x, StringId::from_ascii(b'x'));
        assert_eq!(interner.get_str(x), "x");
        let class = interner.intern("__class__");
        assert_eq!(class, StaticStrings::DunderClass);
        assert_eq!(interner.get_str(class), "__class__");
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(Keyword::from_str("None"), Ok(Keyword::None));
        assert_eq!(Keyword::from_str("lambda"), Ok(Keyword::Lambda));
        assert!(Keyword::from_str("Lambda").is_err());
        assert!(Keyword::from_str("match").is_err());
    }
}

//! Per-compilation configuration.

use strum::{Display, EnumString, IntoStaticStr};

use crate::tokenizer::DEFAULT_TAB_SIZE;

/// Which start rule the grammar engine uses.
///
/// The strum names are the `mode` strings accepted by Python's `compile()`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize,
)]
pub enum InputKind {
    /// A whole module (`exec`).
    #[default]
    #[strum(serialize = "exec")]
    Module,
    /// A single interactive statement (`single`).
    #[strum(serialize = "single")]
    Single,
    /// A single expression (`eval`).
    #[strum(serialize = "eval")]
    Eval,
    /// A function type comment such as `(int, str) -> bool` (`func_type`).
    #[strum(serialize = "func_type")]
    FunctionType,
}

/// Maximum nesting depth of recursive grammar rules (brackets, unary chains, blocks).
/// Matches CPython's limit of ~200 nested parentheses.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: u16 = 200;
/// In debug builds stack frames are much larger (no inlining, debug info), so the limit
/// is set conservatively to fail with a diagnostic before the thread stack runs out.
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: u16 = 35;

/// Options for one call to [`crate::parse`] or [`crate::compile`].
///
/// Use `ParseOptions::default()` for a module parse of `<unknown>`, or build custom
/// options with the builder pattern.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParseOptions {
    pub mode: InputKind,
    /// Name reported alongside diagnostics; never opened.
    pub filename: String,
    pub max_nesting_depth: u16,
    /// Column width of a tab for indentation measurement.
    pub tab_size: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: InputKind::Module,
            filename: "<unknown>".to_owned(),
            max_nesting_depth: MAX_NESTING_DEPTH,
            tab_size: DEFAULT_TAB_SIZE,
        }
    }
}

impl ParseOptions {
    #[must_use]
    pub fn new(mode: InputKind) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: InputKind) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Sets the maximum nesting depth; deeper input fails with
    /// "too many nested parentheses".
    #[must_use]
    pub fn max_nesting_depth(mut self, depth: u16) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    #[must_use]
    pub fn tab_size(mut self, tab_size: u32) -> Self {
        self.tab_size = tab_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn input_kind_from_compile_mode() {
        assert_eq!(InputKind::from_str("exec"), Ok(InputKind::Module));
        assert_eq!(InputKind::from_str("single"), Ok(InputKind::Single));
        assert_eq!(InputKind::from_str("eval"), Ok(InputKind::Eval));
        assert_eq!(InputKind::from_str("func_type"), Ok(InputKind::FunctionType));
        assert!(InputKind::from_str("module").is_err());
    }

    #[test]
    fn builder_overrides_defaults() {
        let options = ParseOptions::new(InputKind::Eval).filename("<expr>").max_nesting_depth(10);
        assert_eq!(options.mode, InputKind::Eval);
        assert_eq!(options.filename, "<expr>");
        assert_eq!(options.max_nesting_depth, 10);
        assert_eq!(options.tab_size, DEFAULT_TAB_SIZE);
    }
}

//! Numeric literal conversion.
//!
//! The tokenizer has already validated the literal's shape, so conversion only has to
//! pick the right representation: `i64` when the value fits, an interned big integer
//! otherwise, `f64` for floats and a zero-real complex for imaginary literals.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::Parser;
use crate::{
    diagnostic::ErrorMessage,
    expressions::{Expr, ExprLoc, Literal},
    intern::InternerBuilder,
    tokenizer::{TokenFlags, TokenKind},
};

/// Converts the text of a NUMBER token into a literal. `None` means the text was not a
/// number after all.
pub(crate) fn parse_number(text: &str, flags: TokenFlags, interner: &mut InternerBuilder) -> Option<Literal> {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    if flags.contains(TokenFlags::IMAGINARY) {
        let imag = digits.strip_suffix(['j', 'J'])?.parse::<f64>().ok()?;
        return Some(Literal::Complex { real: 0.0, imag });
    }
    if flags.contains(TokenFlags::FLOAT) {
        return digits.parse::<f64>().ok().map(Literal::Float);
    }
    let (radix, body) = if flags.contains(TokenFlags::HEX) {
        (16, &digits[2..])
    } else if flags.contains(TokenFlags::OCTAL) {
        (8, &digits[2..])
    } else if flags.contains(TokenFlags::BINARY) {
        (2, &digits[2..])
    } else {
        (10, digits.as_str())
    };
    if let Ok(value) = i64::from_str_radix(body, radix) {
        return Some(Literal::Int(value));
    }
    let big = BigInt::parse_bytes(body.as_bytes(), radix)?;
    match big.to_i64() {
        Some(value) => Some(Literal::Int(value)),
        None => Some(Literal::LongInt(interner.intern_long_int(big))),
    }
}

impl Parser<'_, '_> {
    /// `NUMBER`
    pub(super) fn number(&mut self) -> Option<ExprLoc> {
        let idx = self.eat(TokenKind::Number)?;
        let (text, flags, range) = {
            let tok = self.tok(idx);
            (tok.text, tok.flags, tok.range)
        };
        match parse_number(text, flags, self.interner) {
            Some(literal) => Some(ExprLoc::new(range, Expr::Constant(literal))),
            None => self.raise_syntax(range, ErrorMessage::InvalidNumberLiteral, &["decimal"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(text: &str, flags: TokenFlags) -> (Option<Literal>, InternerBuilder) {
        let mut interner = InternerBuilder::new("");
        let literal = parse_number(text, flags, &mut interner);
        (literal, interner)
    }

    #[test]
    fn small_integers_stay_native() {
        assert_eq!(convert("1_000", TokenFlags::empty()).0, Some(Literal::Int(1000)));
        assert_eq!(convert("0x_ff", TokenFlags::HEX).0, Some(Literal::Int(255)));
        assert_eq!(convert("0o17", TokenFlags::OCTAL).0, Some(Literal::Int(15)));
        assert_eq!(convert("0b101", TokenFlags::BINARY).0, Some(Literal::Int(5)));
    }

    #[test]
    fn large_integers_are_promoted_without_truncation() {
        let (literal, interner) = convert("123456789012345678901234567890", TokenFlags::empty());
        let Some(Literal::LongInt(id)) = literal else {
            panic!("expected a long int, got {literal:?}");
        };
        assert_eq!(interner.get_long_int(id).to_string(), "123456789012345678901234567890");
    }

    #[test]
    fn floats_and_imaginary() {
        assert_eq!(convert("1.5e3", TokenFlags::FLOAT).0, Some(Literal::Float(1500.0)));
        assert_eq!(convert("5.", TokenFlags::FLOAT).0, Some(Literal::Float(5.0)));
        assert_eq!(
            convert("2j", TokenFlags::IMAGINARY).0,
            Some(Literal::Complex { real: 0.0, imag: 2.0 })
        );
    }
}

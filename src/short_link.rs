//! Reversible short-link tokens for recipes.
//!
//! A token is the URL-safe base64 (padded) encoding of the recipe id rendered
//! as base-10 ASCII. It is not a secret: anyone can recover the id from it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use thiserror::Error;

use crate::domain::RecipeId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Short link is not valid base64")]
    Base64,

    #[error("Short link payload is not a number")]
    NotNumeric,

    #[error("Short link payload is out of range")]
    OutOfRange,
}

#[must_use]
pub fn encode(id: RecipeId) -> String {
    URL_SAFE.encode(id.value().to_string())
}

pub fn decode(token: &str) -> Result<RecipeId, DecodeError> {
    let bytes = URL_SAFE.decode(token).map_err(|_| DecodeError::Base64)?;
    let digits = std::str::from_utf8(&bytes).map_err(|_| DecodeError::NotNumeric)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::NotNumeric);
    }

    let value: i32 = digits.parse().map_err(|_| DecodeError::OutOfRange)?;
    let id = RecipeId::new(value);
    if !id.is_valid() {
        return Err(DecodeError::OutOfRange);
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_decimal_digits() {
        assert_eq!(encode(RecipeId::new(1)), "MQ==");
        assert_eq!(encode(RecipeId::new(42)), "NDI=");
        assert_eq!(encode(RecipeId::new(123)), "MTIz");
    }

    #[test]
    fn decode_reverses_encode() {
        for n in [1, 2, 9, 10, 99, 100, 4_096, 65_535, 1_000_000, i32::MAX] {
            let id = RecipeId::new(n);
            assert_eq!(decode(&encode(id)), Ok(id), "id {n}");
        }
    }

    #[test]
    fn tokens_are_url_safe() {
        for n in (1..5_000).step_by(37) {
            let token = encode(RecipeId::new(n));
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=')),
                "{token}"
            );
        }
    }

    #[test]
    fn rejects_malformed_base64() {
        assert_eq!(decode("not base64!"), Err(DecodeError::Base64));
        assert_eq!(decode("MQ"), Err(DecodeError::Base64));
        assert_eq!(decode("M+=="), Err(DecodeError::Base64));
    }

    #[test]
    fn rejects_non_numeric_payload() {
        // "abc"
        assert_eq!(decode("YWJj"), Err(DecodeError::NotNumeric));
        // "-5"
        assert_eq!(decode("LTU="), Err(DecodeError::NotNumeric));
        assert_eq!(decode(""), Err(DecodeError::NotNumeric));
    }

    #[test]
    fn rejects_out_of_range_ids() {
        // "0"
        assert_eq!(decode("MA=="), Err(DecodeError::OutOfRange));
        let too_big = URL_SAFE.encode("99999999999");
        assert_eq!(decode(&too_big), Err(DecodeError::OutOfRange));
    }
}

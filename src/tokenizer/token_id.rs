use crate::error::{BoltError, Result};
use crate::models::{TokenKey, TokenOrigin};

const PRIME: u64 = 31;

/// Numeric id of an already-normalized word.
///
/// Positional weighted sum of code points (1-indexed, times 31), scaled by
/// the word's character count, plus the plain code point sum. Arithmetic
/// overflow on absurdly long input is reported as an invalid token.
pub fn token_id(word: &str) -> Result<u64> {
    if word.is_empty() {
        return Err(BoltError::InvalidToken("empty normalized word".to_string()));
    }
    let overflow = || BoltError::InvalidToken(format!("token id overflow for {:?}", word));

    let mut weighted: u64 = 0;
    let mut plain: u64 = 0;
    let mut len: u64 = 0;
    for (index, ch) in word.chars().enumerate() {
        let code = ch as u64;
        let position = index as u64 + 1;
        let term = code
            .checked_mul(position)
            .and_then(|v| v.checked_mul(PRIME))
            .ok_or_else(overflow)?;
        weighted = weighted.checked_add(term).ok_or_else(overflow)?;
        plain = plain.checked_add(code).ok_or_else(overflow)?;
        len += 1;
    }

    weighted
        .checked_mul(len)
        .and_then(|v| v.checked_add(plain))
        .ok_or_else(overflow)
}

/// Token key for a normalized word drawn from the given field
pub fn identify(word: &str, origin: TokenOrigin) -> Result<TokenKey> {
    Ok(TokenKey::new(token_id(word)?, origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // a: 97*1*31 = 3007; *1 + 97
        assert_eq!(token_id("a").unwrap(), 3104);
        // ai: (97*1*31 + 105*2*31) = 9517; *2 = 19034; + 202
        assert_eq!(token_id("ai").unwrap(), 19236);
    }

    #[test]
    fn test_deterministic() {
        for word in ["healthcare", "rust", "lemma", "ünïcode"] {
            assert_eq!(token_id(word).unwrap(), token_id(word).unwrap());
        }
    }

    #[test]
    fn test_origin_is_metadata_only() {
        let title = identify("learn", TokenOrigin::Title).unwrap();
        let tag = identify("learn", TokenOrigin::Tag).unwrap();
        assert_eq!(title.numeric_id, tag.numeric_id);
        assert!(title.marker);
        assert!(!tag.marker);
    }

    #[test]
    fn test_empty_word_rejected() {
        assert!(matches!(token_id(""), Err(BoltError::InvalidToken(_))));
        assert!(identify("", TokenOrigin::Title).is_err());
    }

    #[test]
    fn test_realistic_words_rarely_collide() {
        let words = [
            "python", "rust", "java", "learn", "deep", "machine", "network", "data", "model",
            "health", "healthcar", "trend", "introduct", "applic", "ai", "ml", "web", "server",
        ];
        let mut ids: Vec<u64> = words.iter().map(|w| token_id(w).unwrap()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), words.len());
    }
}

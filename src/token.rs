//! Command token allocation
//!
//! Tokens correlate an in-flight BlobDB command with its response. They are
//! short-lived: a fresh token is drawn for every send attempt, including each
//! retry of the same logical operation. Uniqueness is only required to be
//! plausible across concurrently in-flight commands, not across the process
//! lifetime.

use rand::Rng;

/// Draw a token uniformly from the full 16-bit range
pub fn next_token() -> u16 {
    rand::thread_rng().gen::<u16>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_not_constant() {
        // 32 draws of a uniform u16 collapsing to one value would mean a
        // broken RNG, not bad luck.
        let first = next_token();
        let all_same = (0..32).all(|_| next_token() == first);
        assert!(!all_same);
    }
}

//! Shareable invitation codes.
//!
//! A code is 40 random bits rendered as 8 Crockford base32 characters, which
//! leaves out the easily confused `I`, `L`, `O` and `U`.

use base32::Alphabet;

pub const INVITE_CODE_LEN: usize = 8;

pub fn generate_invite_code() -> String {
    let bytes: [u8; 5] = rand::random();
    base32::encode(Alphabet::Crockford, &bytes)
}

/// Canonical form of a code typed by a user: trimmed, upper-cased, and with
/// the look-alike letters mapped the way Crockford decoding does.
pub fn normalize_invite_code(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| match c.to_ascii_uppercase() {
            'O' => '0',
            'I' | 'L' => '1',
            other => other,
        })
        .collect()
}

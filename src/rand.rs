//! Random material for request signing and device fingerprints.
//!
//! Everything here draws from `rand`'s thread-local generator, which is a
//! CSPRNG: the WEAPI secret key is a real encryption key.

use rand::{distr::Alphanumeric, Rng};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Access the thread-local cryptographically secure random number generator.
pub fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut rand::rngs::ThreadRng) -> R,
{
    let mut rng = rand::rng();
    f(&mut rng)
}

/// Returns `len` characters drawn uniformly from `[a-zA-Z0-9]`.
#[must_use]
pub fn alphanumeric(len: usize) -> String {
    with_rng(|rng| {
        rng.sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    })
}

/// Returns `len` lowercase hexadecimal digits.
#[must_use]
pub fn hex_digits(len: usize) -> String {
    with_rng(|rng| {
        (0..len)
            .map(|_| char::from(HEX_DIGITS[rng.random_range(0..HEX_DIGITS.len())]))
            .collect()
    })
}

/// Returns `len` lowercase ASCII letters.
#[must_use]
pub fn lowercase(len: usize) -> String {
    with_rng(|rng| (0..len).map(|_| char::from(rng.random_range(b'a'..=b'z'))).collect())
}

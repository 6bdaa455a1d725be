//! Correlation id generation.
//!
//! Ids are 21-character strings drawn from a fixed 64-symbol alphabet using a
//! uniform, non-cryptographic random source. That gives 64^21 = 2^126
//! possible ids; by the birthday bound, the probability of a collision among
//! `n` simultaneously pending calls on one engine is about n^2 / 2^127.
//! Even at a million concurrent calls that is below 1e-25, so collisions are
//! treated as a documented, testable-but-negligible risk rather than an
//! impossibility. The correlation table still rejects a duplicate id
//! defensively.

use rand::Rng;

/// Length of a correlation id in characters.
pub const ID_LENGTH: usize = 21;

/// The 64-symbol id alphabet (url-safe).
pub const ID_ALPHABET: &[u8; 64] =
    b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

/// Generate a fresh correlation id.
///
/// Uses the thread-local generator; not suitable for security tokens.
pub fn correlation_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

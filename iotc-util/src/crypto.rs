use rand::Rng;

pub const ALPHA_NUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random string of `len` characters drawn from `charset`.
///
/// Not suitable for secrets, only for unique-enough temporary names.
pub fn pseudorandom_string(charset: &[u8], len: usize) -> String {
    assert!(!charset.is_empty(), "charset must not be empty");
    let mut rng = rand::rng();
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

//! Initial password generation.

use rand::Rng;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

pub const PASSWORD_LENGTH: usize = 12;

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!@#$%^&*";

/// Generate a random password holding at least one upper-case letter,
/// lower-case letter, digit and special character.
pub fn generate() -> String {
    let mut rng = OsRng;
    let mut pick = |set: &[u8]| set[rng.gen_range(0..set.len())];

    let mut bytes = vec![pick(UPPER), pick(LOWER), pick(DIGITS), pick(SPECIAL)];
    let all = [UPPER, LOWER, DIGITS, SPECIAL].concat();
    while bytes.len() < PASSWORD_LENGTH {
        bytes.push(pick(all.as_slice()));
    }

    bytes.shuffle(&mut OsRng);
    bytes.into_iter().map(char::from).collect()
}

/// Whether `password` satisfies the generated-password policy.
pub fn is_complex(password: &str) -> bool {
    let has = |set: &[u8]| password.bytes().any(|b| set.contains(&b));

    password.chars().count() >= PASSWORD_LENGTH
        && has(UPPER)
        && has(LOWER)
        && has(DIGITS)
        && has(SPECIAL)
}

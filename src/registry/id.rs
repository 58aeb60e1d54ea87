//! Short identifier generation

use std::iter;

/// URL-safe 64-symbol alphabet
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Identifier length; 8 symbols of 6 bits each give 48 bits of entropy.
pub const ID_LENGTH: usize = 8;

/// Generate a random short identifier.
pub fn generate() -> String {
    iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
        .take(ID_LENGTH)
        .collect()
}

/// Whether `id` could have been produced by [`generate`].
pub fn is_well_formed(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_well_formed() {
        for _ in 0..200 {
            let id = generate();
            assert!(is_well_formed(&id), "bad id {id}");
        }
    }

    #[test]
    fn generated_ids_do_not_repeat_in_practice() {
        let ids: HashSet<String> = (0..10_000).map(|_| generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn rejects_foreign_characters_and_lengths() {
        assert!(!is_well_formed("abc"));
        assert!(!is_well_formed("abcd/efg"));
        assert!(!is_well_formed("abcdefghi"));
        assert!(is_well_formed("aB3-_xYz"));
    }
}

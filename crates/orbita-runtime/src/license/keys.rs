//! License-key surface format: `ORB-XXXX-XXXX-XXXX`, SPEC_FULL.md §D.

const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generates a random key in `ORB-XXXX-XXXX-XXXX` form, drawing each
/// character from an alphabet that excludes `0`, `1`, `I`, `O`.
pub fn generate() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let group = |rng: &mut rand::rngs::ThreadRng| -> String {
        (0..4)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    };
    format!("ORB-{}-{}-{}", group(&mut rng), group(&mut rng), group(&mut rng))
}

/// Validates the `ORB-XXXX-XXXX-XXXX` shape and alphabet, without
/// checking whether the key corresponds to a real license.
pub fn is_well_formed(key: &str) -> bool {
    let parts: Vec<&str> = key.split('-').collect();
    if parts.len() != 4 || parts[0] != "ORB" {
        return false;
    }
    parts[1..]
        .iter()
        .all(|group| group.len() == 4 && group.bytes().all(|b| ALPHABET.contains(&b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_well_formed() {
        for _ in 0..50 {
            let key = generate();
            assert!(is_well_formed(&key), "{key} failed validation");
        }
    }

    #[test]
    fn rejects_ambiguous_characters() {
        assert!(!is_well_formed("ORB-0000-1111-IIII"));
        assert!(!is_well_formed("ORB-ABCD-EFGH"));
        assert!(!is_well_formed("XYZ-ABCD-EFGH-JKLM"));
    }
}

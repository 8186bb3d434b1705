//! Structural hashes identifying manifold types.
//!
//! Two manifolds with equal hashes are interchangeable for every operation.
//! Hashes are FNV-1a over the type name, so they are stable across runs and
//! can be computed in `const` context.

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Hash of a manifold type name refined by a variant name (e.g. its chart).
///
/// An empty `variant` gives the plain name hash.
pub const fn compute_hash(name: &str, variant: &str) -> u64 {
    let hash = fnv1a(FNV_OFFSET, name.as_bytes());
    if variant.is_empty() {
        hash
    } else {
        fnv1a(fnv1a(hash, b"/"), variant.as_bytes())
    }
}

/// Order-dependent combination of a running hash with another value.
pub const fn combine_hash(seed: u64, value: u64) -> u64 {
    fnv1a(seed, &value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SO3_MATRIX: u64 = compute_hash("SO3", "ExpMapMatrix");

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(SO3_MATRIX, compute_hash("SO3", "ExpMapMatrix"));
        assert_ne!(SO3_MATRIX, compute_hash("SO3", "ExpMapQuaternion"));
        assert_ne!(compute_hash("S2", ""), compute_hash("S2", "x"));
        // Known FNV-1a 64 value of the empty input.
        assert_eq!(compute_hash("", ""), FNV_OFFSET);
    }

    #[test]
    fn test_combination_is_order_dependent() {
        let a = compute_hash("R", "");
        let b = compute_hash("S2", "");
        assert_ne!(combine_hash(combine_hash(0, a), b), combine_hash(combine_hash(0, b), a));
        assert_ne!(combine_hash(a, 3), combine_hash(a, 4));
    }
}

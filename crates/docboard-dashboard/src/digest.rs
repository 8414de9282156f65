//! Stable chart identifiers.
//!
//! FNV-1a 64-bit over a canonical rendering of the series. Not a security
//! primitive; it only has to be deterministic across runs and platforms.

/// Prefix used in chart ids.
pub const CHART_ID_PREFIX: &str = "chart-";

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for b in bytes {
        hash ^= (*b) as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// `chart-<16 lowercase hex digits>`
pub fn chart_id(canonical: &str) -> String {
    format!("{CHART_ID_PREFIX}{:016x}", fnv1a64(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(fnv1a64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_chart_id_shape() {
        let id = chart_id("accuracy");
        assert!(id.starts_with(CHART_ID_PREFIX));
        assert_eq!(id.len(), CHART_ID_PREFIX.len() + 16);
        assert_eq!(id, chart_id("accuracy"));
    }
}

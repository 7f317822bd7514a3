//! Seeded random streams for every pipeline stage.
//!
//! Each consumer asks for a stream by `(stage, stream, index)`, for example
//! `("train", "random_forest", 3)`. The stream seed is a BLAKE3 digest of the
//! master seed and that key, so no stream depends on which other streams were
//! drawn before it or on which rayon worker draws it.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Stage names used as the first component of every derived stream.
pub mod stage {
    pub const SPLIT: &str = "split";
    pub const BALANCE: &str = "balance";
    pub const TRAIN: &str = "train";
}

/// Master seed plus stream derivation.
///
/// The master seed is expanded into per-(stage, stream, index) sub-seeds using
/// BLAKE3. Because derivation is hash-based (not order-dependent), the forest
/// trainer can grow tree 7 before tree 3 and still get the same trees.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Derive a deterministic sub-seed for a specific (stage, stream, index).
    pub fn sub_seed(&self, stage: &str, stream: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart.
        hasher.update(&(stage.len() as u64).to_le_bytes());
        hasher.update(stage.as_bytes());
        hasher.update(&(stream.len() as u64).to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// A fresh generator for one stream.
    pub fn rng_for(&self, stage: &str, stream: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stage, stream, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_seed() {
        let hierarchy = RngHierarchy::new(42);
        let s1 = hierarchy.sub_seed(stage::TRAIN, "random_forest", 0);
        let s2 = hierarchy.sub_seed(stage::TRAIN, "random_forest", 0);
        assert_eq!(s1, s2);
    }

    #[test]
    fn model_streams_are_independent() {
        let hierarchy = RngHierarchy::new(42);
        let rf = hierarchy.sub_seed(stage::TRAIN, "random_forest", 0);
        let gb = hierarchy.sub_seed(stage::TRAIN, "gradient_boosting", 0);
        assert_ne!(rf, gb);
    }

    #[test]
    fn fold_indices_are_independent() {
        let hierarchy = RngHierarchy::new(42);
        let i0 = hierarchy.sub_seed(stage::TRAIN, "random_forest", 0);
        let i1 = hierarchy.sub_seed(stage::TRAIN, "random_forest", 1);
        assert_ne!(i0, i1);
    }

    #[test]
    fn stage_and_stream_boundaries_are_distinct() {
        let hierarchy = RngHierarchy::new(42);
        assert_ne!(
            hierarchy.sub_seed("ab", "c", 0),
            hierarchy.sub_seed("a", "bc", 0)
        );
    }

    #[test]
    fn draw_order_does_not_matter() {
        let hierarchy = RngHierarchy::new(42);

        let split_first = hierarchy.sub_seed(stage::SPLIT, "", 0);
        let balance_second = hierarchy.sub_seed(stage::BALANCE, "", 0);

        let balance_first = hierarchy.sub_seed(stage::BALANCE, "", 0);
        let split_second = hierarchy.sub_seed(stage::SPLIT, "", 0);

        assert_eq!(split_first, split_second);
        assert_eq!(balance_first, balance_second);
    }

    #[test]
    fn master_seed_changes_every_stream() {
        let h1 = RngHierarchy::new(42);
        let h2 = RngHierarchy::new(43);
        assert_ne!(
            h1.sub_seed(stage::SPLIT, "", 0),
            h2.sub_seed(stage::SPLIT, "", 0)
        );
    }
}

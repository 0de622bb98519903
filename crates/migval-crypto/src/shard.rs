use sha2::{Digest, Sha256};

/// Derives fixed-depth, fixed-width directory prefixes from an identifier.
///
/// The prefix is taken from the SHA-256 of the identifier, so siblings are
/// spread evenly regardless of how the identifiers themselves are shaped.
/// With the default `3 x 3` layout there are 4096 directories per level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardHasher {
    depth: usize,
    width: usize,
}

impl ShardHasher {
    /// Three levels of three hex characters each.
    pub const DEFAULT: Self = Self { depth: 3, width: 3 };

    /// Create a layout. `depth * width` must not exceed the 64 hex characters
    /// of a SHA-256 digest; larger values are clamped.
    pub fn new(depth: usize, width: usize) -> Self {
        let width = width.clamp(1, 64);
        let depth = depth.min(64 / width);
        Self { depth, width }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Lowercase hex SHA-256 of the identifier.
    pub fn hash_hex(id: &str) -> String {
        hex::encode(Sha256::digest(id.as_bytes()))
    }

    /// The directory segments for `id`, outermost first.
    pub fn segments(&self, id: &str) -> Vec<String> {
        let hash = Self::hash_hex(id);
        (0..self.depth)
            .map(|i| hash[i * self.width..(i + 1) * self.width].to_string())
            .collect()
    }
}

impl Default for ShardHasher {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_layout_is_three_by_three() {
        let segs = ShardHasher::DEFAULT.segments("demo:1");
        assert_eq!(segs.len(), 3);
        assert!(segs.iter().all(|s| s.len() == 3));
    }

    #[test]
    fn segments_are_a_prefix_of_the_hash() {
        let id = "info:fedora/demo:42";
        let joined = ShardHasher::DEFAULT.segments(id).concat();
        assert!(ShardHasher::hash_hex(id).starts_with(&joined));
    }

    #[test]
    fn oversized_layout_is_clamped() {
        let h = ShardHasher::new(40, 4);
        assert_eq!(h.depth(), 16);
        assert_eq!(h.segments("x").len(), 16);
    }

    #[test]
    fn zero_depth_gives_no_segments() {
        assert!(ShardHasher::new(0, 3).segments("x").is_empty());
    }

    proptest! {
        #[test]
        fn segments_are_deterministic_hex(id in ".{0,64}", depth in 0usize..6, width in 1usize..5) {
            let h = ShardHasher::new(depth, width);
            let a = h.segments(&id);
            let b = h.segments(&id);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len(), depth);
            for seg in &a {
                prop_assert_eq!(seg.len(), width);
                prop_assert!(seg.chars().all(|c| c.is_ascii_hexdigit()));
            }
        }
    }
}

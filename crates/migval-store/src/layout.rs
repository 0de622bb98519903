use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use migval_crypto::ShardHasher;

use crate::error::{StoreError, StoreResult};

/// Extension of every result file.
pub const RESULT_EXTENSION: &str = "json";

/// Maps result identities onto paths under a store root.
#[derive(Clone, Debug)]
pub struct ResultLayout {
    root: PathBuf,
    shard: ShardHasher,
}

impl ResultLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_shard(root, ShardHasher::DEFAULT)
    }

    pub fn with_shard(root: impl Into<PathBuf>, shard: ShardHasher) -> Self {
        Self {
            root: root.into(),
            shard,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shard(&self) -> ShardHasher {
        self.shard
    }

    /// Leaf directory holding all results of one source object.
    pub fn object_dir(&self, source_object_id: &str) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in self.shard.segments(source_object_id) {
            dir.push(segment);
        }
        dir.push(encode_id(source_object_id));
        dir
    }

    /// Directory holding results of `source_object_id`, or the root for
    /// repository-level results.
    pub fn dir_for(&self, source_object_id: Option<&str>) -> PathBuf {
        match source_object_id {
            Some(id) => self.object_dir(id),
            None => self.root.clone(),
        }
    }

    /// Depth of object leaf directories below the root.
    pub fn leaf_depth(&self) -> usize {
        self.shard.depth() + 1
    }
}

/// File name for the result with `index`.
pub fn file_name(index: u64) -> String {
    format!("{index}.{RESULT_EXTENSION}")
}

/// Parse the index back out of a result file name.
pub fn parse_file_name(name: &str) -> Option<u64> {
    name.strip_suffix(RESULT_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// URL-safe, padding-free base64 of an object id, usable as a directory name.
pub fn encode_id(id: &str) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

/// Inverse of [`encode_id`].
pub fn decode_id(name: &str) -> StoreResult<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(name)
        .map_err(|_| StoreError::InvalidDirectory(name.to_string()))?;
    String::from_utf8(bytes).map_err(|_| StoreError::InvalidDirectory(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_dir_is_sharded_then_encoded() {
        let layout = ResultLayout::new("/results");
        let dir = layout.object_dir("demo:1");
        let parts: Vec<_> = dir
            .strip_prefix("/results")
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[..3], ShardHasher::DEFAULT.segments("demo:1")[..]);
        assert_eq!(decode_id(&parts[3]).unwrap(), "demo:1");
    }

    #[test]
    fn repository_results_live_at_root() {
        let layout = ResultLayout::new("/results");
        assert_eq!(layout.dir_for(None), PathBuf::from("/results"));
    }

    #[test]
    fn encoded_ids_are_path_safe() {
        let encoded = encode_id("info:fedora/a/b?c");
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
        assert_eq!(decode_id(&encoded).unwrap(), "info:fedora/a/b?c");
    }

    #[test]
    fn decode_rejects_non_base64() {
        assert!(decode_id("not base64!").is_err());
    }

    #[test]
    fn file_names_roundtrip() {
        assert_eq!(file_name(12), "12.json");
        assert_eq!(parse_file_name("12.json"), Some(12));
        assert_eq!(parse_file_name("12.txt"), None);
        assert_eq!(parse_file_name("abc.json"), None);
    }
}

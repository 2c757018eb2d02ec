//! Asset index: logical names to content-addressed objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsIndex {
    #[serde(default)]
    pub objects: BTreeMap<String, Asset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub hash: String,
    #[serde(default)]
    pub size: u64,
}

impl Asset {
    /// On-wire (and on-disk) location of the object under an asset root:
    /// the first two hex digits, then the full hash.
    pub fn object_path(&self) -> Option<String> {
        if self.hash.len() < 2 || !self.hash.is_ascii() {
            return None;
        }
        Some(format!("{}/{}", &self.hash[..2], self.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_shards_by_hash_prefix() {
        let asset = Asset {
            hash: "ab0ef125bcf2d5328e99d7991e111cd5d7b3ca49".to_string(),
            size: 9,
        };
        assert_eq!(
            asset.object_path().unwrap(),
            "ab/ab0ef125bcf2d5328e99d7991e111cd5d7b3ca49"
        );
    }

    #[test]
    fn malformed_hash_yields_no_path() {
        let asset = Asset {
            hash: "a".to_string(),
            size: 0,
        };
        assert!(asset.object_path().is_none());
    }

    #[test]
    fn index_parses_objects_map() {
        let raw = r#"{"objects": {"minecraft/sounds/ambient.ogg": {"hash": "ff6ea80253580624c6e17fc2d23f18dce05182f1", "size": 11}}}"#;
        let index: AssetsIndex = serde_json::from_str(raw).unwrap();
        assert_eq!(index.objects.len(), 1);
        assert_eq!(
            index.objects["minecraft/sounds/ambient.ogg"].size,
            11
        );
    }
}

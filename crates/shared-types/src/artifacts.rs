//! # PoC Artifacts
//!
//! The value types flowing between ML workers, the artifact store, and the
//! validation pipeline. An artifact is one `(nonce, vector)` pair produced
//! by one local node during a PoC stage; leaves are the wire encoding
//! appended to the stage's MMR.

use serde::{Deserialize, Serialize};

use crate::BlockHeight;

/// Dimensionality of an artifact vector.
pub const VECTOR_DIM: usize = 12;

/// Byte length of an artifact vector: `VECTOR_DIM` little-endian fp16 values.
pub const VECTOR_BYTES: usize = VECTOR_DIM * 2;

/// One PoC artifact produced by a local ML node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Nonce the worker evaluated.
    pub nonce: i32,
    /// `VECTOR_BYTES` bytes of little-endian fp16 values.
    #[serde(with = "crate::artifacts::base64_bytes")]
    pub vector: Vec<u8>,
    /// Local node that produced the artifact.
    pub node_id: String,
}

impl Artifact {
    /// Leaf encoding appended to the stage MMR: `nonce (LE32) || vector`.
    pub fn leaf_data(&self) -> Vec<u8> {
        let mut leaf = Vec::with_capacity(4 + self.vector.len());
        leaf.extend_from_slice(&self.nonce.to_le_bytes());
        leaf.extend_from_slice(&self.vector);
        leaf
    }
}

/// A sampled artifact whose MMR inclusion proof has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedArtifact {
    /// Index of the leaf inside the committed store.
    pub leaf_index: u32,
    /// Nonce claimed for the leaf.
    pub nonce: i32,
    /// Raw vector bytes (fp16 LE), already admission-checked.
    #[serde(with = "crate::artifacts::base64_bytes")]
    pub vector: Vec<u8>,
}

/// One participant's store commit as read back from the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCommitRecord {
    /// Committing participant address.
    pub participant: String,
    /// Participant account pubkey, hex encoded.
    pub hex_pubkey: String,
    /// Committed MMR root.
    #[serde(with = "crate::artifacts::base64_bytes")]
    pub root_hash: Vec<u8>,
    /// Committed leaf count.
    pub count: u32,
    /// Stage the commit belongs to.
    pub poc_stage_start_block_height: BlockHeight,
    /// Per-node artifact counts as committed; may be absent on older
    /// chain versions.
    #[serde(default)]
    pub per_node_distribution: NodeDistribution,
}

impl StoreCommitRecord {
    /// Worker count the participant committed with (at least one).
    pub fn node_count(&self) -> u32 {
        self.per_node_distribution.len().max(1) as u32
    }
}

/// Per-node artifact distribution of a stage store, sorted by node id.
pub type NodeDistribution = Vec<(String, u32)>;

/// Base64 (de)serialization for binary fields on JSON wire types.
///
/// The wire format uses the standard alphabet with padding everywhere a
/// binary field crosses HTTP or chain boundaries.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Standard-alphabet encode shared by all wire types.
    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    /// Decode counterpart of [`encode`].
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        STANDARD.decode(s).ok()
    }

    pub fn serialize<S: Serializer>(data: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        decode(&s).ok_or_else(|| serde::de::Error::custom("invalid base64"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_encoding_layout() {
        let artifact = Artifact {
            nonce: 0x0102_0304,
            vector: vec![0xAB; VECTOR_BYTES],
            node_id: "node1".to_string(),
        };
        let leaf = artifact.leaf_data();
        assert_eq!(leaf.len(), 4 + VECTOR_BYTES);
        // Nonce is little-endian.
        assert_eq!(&leaf[..4], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_artifact_json_uses_base64_vector() {
        let artifact = Artifact {
            nonce: 1,
            vector: vec![0u8; VECTOR_BYTES],
            node_id: "n".to_string(),
        };
        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("AAAA"));
        let back: Artifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_base64_known_value() {
        // Scenario vector from the validator fixtures.
        let decoded = base64_bytes::decode("JjsAfn85Zjp/NUgzrzNgOdYliTiIO7g4").unwrap();
        assert_eq!(decoded.len(), VECTOR_BYTES);
        assert_eq!(base64_bytes::encode(&decoded), "JjsAfn85Zjp/NUgzrzNgOdYliTiIO7g4");
    }
}

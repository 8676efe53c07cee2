use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// How many nonces a mining attempt tries between cancellation checks.
pub const CANCEL_CHECK_INTERVAL: u64 = 1000;

/// A single block in the chain carrying one opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix timestamp (UTC); advisory, never validated
    pub data: String,
    pub prev_hash: String,
    pub nonce: u64, // Proof-of-Work nonce
    pub hash: String, // Cached hash of the block
}

impl Block {
    /// Create a new block linked to the given predecessor hash. The
    /// timestamp is fixed here and does not change during mining.
    pub fn new(index: u64, data: String, prev_hash: String) -> Self {
        Self::with_timestamp(index, Utc::now().timestamp(), data, prev_hash)
    }

    pub fn with_timestamp(index: u64, timestamp: i64, data: String, prev_hash: String) -> Self {
        let mut block = Self {
            index,
            timestamp,
            data,
            prev_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Compute the SHA-256 hash of this block's fields (excluding the
    /// `hash` field itself).
    ///
    /// The pre-image is `index|timestamp|data_json|prev_hash|nonce`, where
    /// `data_json` is the JSON string literal of the payload. JSON escaping
    /// keeps the encoding injective even when the payload contains `|`; the
    /// remaining fields are decimal integers and fixed-form lowercase hex.
    pub fn compute_hash(&self) -> String {
        let data_json = serde_json::to_string(&self.data).expect("serialize payload");
        let preimage = format!(
            "{}|{}|{}|{}|{}",
            self.index, self.timestamp, data_json, self.prev_hash, self.nonce
        );
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Perform Proof-of-Work by searching nonces from zero until the hash
    /// starts with `difficulty` hex zeros. Uninterruptible; used for genesis
    /// and tests. Concurrent miners use [`Block::mine_cancelable`].
    pub fn mine(&mut self, difficulty: u32) {
        let target_prefix = "0".repeat(difficulty as usize);
        self.nonce = 0;
        loop {
            self.hash = self.compute_hash();
            if self.hash.starts_with(&target_prefix) {
                break;
            }
            self.nonce = self.nonce.wrapping_add(1);
        }
    }

    /// Like [`Block::mine`], but abandons the search once `tip_version` no
    /// longer matches `expected_version`. The flag is polled every
    /// [`CANCEL_CHECK_INTERVAL`] nonces to bound wasted work. Returns whether
    /// a valid nonce was found.
    pub fn mine_cancelable(
        &mut self,
        difficulty: u32,
        tip_version: &AtomicU64,
        expected_version: u64,
    ) -> bool {
        let target_prefix = "0".repeat(difficulty as usize);
        self.nonce = 0;
        loop {
            for _ in 0..CANCEL_CHECK_INTERVAL {
                self.hash = self.compute_hash();
                if self.hash.starts_with(&target_prefix) {
                    return true;
                }
                self.nonce = self.nonce.wrapping_add(1);
            }
            if tip_version.load(Ordering::SeqCst) != expected_version {
                return false;
            }
        }
    }

    /// Whether the cached hash starts with `difficulty` hex zeros.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.hash
            .chars()
            .take(difficulty as usize)
            .all(|c| c == '0')
    }

    /// Validate that the cached `hash` matches the block's content and
    /// satisfies the PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self, difficulty: u32) -> bool {
        self.hash == self.compute_hash() && self.meets_difficulty(difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let b = Block::with_timestamp(1, 1_700_000_000, "chapter one".into(), "0".repeat(64));
        assert_eq!(b.hash, b.compute_hash());
        assert_eq!(b.compute_hash(), b.compute_hash());
    }

    #[test]
    fn preimage_is_injective_across_field_boundaries() {
        // Without the JSON encoding of `data`, these two would concatenate
        // to the same pre-image.
        let a = Block::with_timestamp(1, 0, "a|b".into(), "c".into());
        let b = Block::with_timestamp(1, 0, "a".into(), "b|c".into());
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn mining_produces_leading_zeros() {
        let mut b = Block::with_timestamp(1, 1_700_000_000, "alpha".into(), "0".repeat(64));
        b.mine(2);
        assert!(b.hash.starts_with("00"));
        assert!(b.is_valid(2));
    }

    #[test]
    fn invalid_when_mutated() {
        let mut b = Block::with_timestamp(1, 1_700_000_000, "alpha".into(), "0".repeat(64));
        b.mine(2);
        b.data.push_str(" tampered");
        assert!(!b.is_valid(2));
    }

    #[test]
    fn mining_aborts_when_tip_version_moves() {
        let version = AtomicU64::new(7);
        let mut b = Block::with_timestamp(1, 1_700_000_000, "beta".into(), "0".repeat(64));
        // Expected version already out of date: the search must give up at
        // its first cancellation check instead of grinding out difficulty 6.
        assert!(!b.mine_cancelable(6, &version, 6));
    }

    #[test]
    fn cancelable_mining_finds_valid_nonce() {
        let version = AtomicU64::new(0);
        let mut b = Block::with_timestamp(1, 1_700_000_000, "gamma".into(), "0".repeat(64));
        assert!(b.mine_cancelable(2, &version, 0));
        assert!(b.is_valid(2));
    }
}

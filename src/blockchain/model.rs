use super::{Block, GENESIS_DATA, GENESIS_PREV_HASH, GENESIS_TIMESTAMP};
use crate::error::ChainError;

/// In-memory blockchain with fixed Proof-of-Work difficulty.
///
/// Append-only from this node's perspective, but the whole chain may be
/// replaced by a strictly longer valid chain learned from a peer.
#[derive(Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    pub difficulty: u32,
}

impl Blockchain {
    /// Initialize a new blockchain holding only the genesis block.
    pub fn new(difficulty: u32) -> Self {
        Self {
            chain: vec![Self::genesis(difficulty)],
            difficulty,
        }
    }

    /// Mine the canonical genesis block. Deterministic: fixed payload and
    /// timestamp, nonce searched from zero, so every node configured with
    /// the same difficulty produces a byte-identical block.
    pub fn genesis(difficulty: u32) -> Block {
        let mut block = Block::with_timestamp(
            0,
            GENESIS_TIMESTAMP,
            GENESIS_DATA.to_string(),
            GENESIS_PREV_HASH.to_string(),
        );
        block.mine(difficulty);
        block
    }

    /// Rebuild a chain from deserialized blocks, validating end to end.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: u32) -> Result<Self, ChainError> {
        let bc = Self {
            chain: blocks,
            difficulty,
        };
        bc.validate()?;
        Ok(bc)
    }

    /// The block at the greatest index.
    pub fn tip(&self) -> &Block {
        self.chain
            .last()
            .expect("chain always holds at least the genesis block")
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Validate a candidate successor of `prev`: index increment, hash
    /// linkage, hash integrity, and PoW difficulty, in that order.
    pub fn validate_block(block: &Block, prev: &Block, difficulty: u32) -> Result<(), ChainError> {
        if block.index != prev.index + 1 {
            return Err(ChainError::BadIndex {
                expected: prev.index + 1,
                got: block.index,
            });
        }
        if block.prev_hash != prev.hash {
            return Err(ChainError::BadLinkage { index: block.index });
        }
        if block.hash != block.compute_hash() {
            return Err(ChainError::BadHash { index: block.index });
        }
        if !block.meets_difficulty(difficulty) {
            return Err(ChainError::DifficultyNotMet {
                index: block.index,
                difficulty,
            });
        }
        Ok(())
    }

    /// Validate the whole chain: the canonical genesis first, then every
    /// consecutive pair.
    pub fn validate(&self) -> Result<(), ChainError> {
        let genesis = self.chain.first().ok_or(ChainError::Empty)?;
        if genesis.index != 0
            || genesis.prev_hash != GENESIS_PREV_HASH
            || genesis.data != GENESIS_DATA
            || genesis.timestamp != GENESIS_TIMESTAMP
            || genesis.hash != genesis.compute_hash()
            || !genesis.meets_difficulty(self.difficulty)
        {
            return Err(ChainError::BadGenesis);
        }
        for pair in self.chain.windows(2) {
            Self::validate_block(&pair[1], &pair[0], self.difficulty)?;
        }
        Ok(())
    }

    /// Append a block after validating it against the current tip.
    pub fn append(&mut self, block: Block) -> Result<(), ChainError> {
        Self::validate_block(&block, self.tip(), self.difficulty)?;
        self.chain.push(block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFFICULTY: u32 = 2;

    fn mined_block(index: u64, data: &str, prev_hash: &str) -> Block {
        let mut block =
            Block::with_timestamp(index, 1_700_000_000, data.to_string(), prev_hash.to_string());
        block.mine(DIFFICULTY);
        block
    }

    fn chain_of(payloads: &[&str]) -> Blockchain {
        let mut bc = Blockchain::new(DIFFICULTY);
        for data in payloads {
            let block = mined_block(bc.tip().index + 1, data, &bc.tip().hash);
            bc.append(block).expect("mined block is valid");
        }
        bc
    }

    #[test]
    fn genesis_is_identical_across_nodes() {
        let a = Blockchain::new(DIFFICULTY);
        let b = Blockchain::new(DIFFICULTY);
        assert_eq!(a.chain[0], b.chain[0]);
        assert!(a.chain[0].meets_difficulty(DIFFICULTY));
        assert!(a.validate().is_ok());
    }

    #[test]
    fn append_accepts_valid_successor() {
        let mut bc = Blockchain::new(DIFFICULTY);
        let block = mined_block(1, "alpha", &bc.tip().hash);
        assert!(bc.append(block).is_ok());
        assert_eq!(bc.len(), 2);
        assert!(bc.validate().is_ok());
    }

    #[test]
    fn append_rejects_index_gap() {
        let mut bc = Blockchain::new(DIFFICULTY);
        let block = mined_block(3, "alpha", &bc.tip().hash);
        assert_eq!(
            bc.append(block),
            Err(ChainError::BadIndex {
                expected: 1,
                got: 3
            })
        );
        assert_eq!(bc.len(), 1);
    }

    #[test]
    fn append_rejects_broken_linkage() {
        let mut bc = Blockchain::new(DIFFICULTY);
        let block = mined_block(1, "alpha", &"f".repeat(64));
        assert_eq!(bc.append(block), Err(ChainError::BadLinkage { index: 1 }));
    }

    #[test]
    fn append_rejects_wrong_hash() {
        let mut bc = Blockchain::new(DIFFICULTY);
        let mut block = mined_block(1, "alpha", &bc.tip().hash);
        block.hash = "0".repeat(64);
        assert_eq!(bc.append(block), Err(ChainError::BadHash { index: 1 }));
    }

    #[test]
    fn append_rejects_insufficient_difficulty() {
        let mut bc = Blockchain::new(DIFFICULTY);
        let mut block = Block::with_timestamp(
            1,
            1_700_000_000,
            "alpha".to_string(),
            bc.tip().hash.clone(),
        );
        // Find a nonce whose hash is internally consistent but fails PoW.
        while block.hash.starts_with('0') {
            block.nonce += 1;
            block.hash = block.compute_hash();
        }
        assert_eq!(
            bc.append(block),
            Err(ChainError::DifficultyNotMet {
                index: 1,
                difficulty: DIFFICULTY
            })
        );
    }

    #[test]
    fn validate_detects_tampered_middle_block() {
        let mut bc = chain_of(&["alpha", "beta", "gamma"]);
        bc.chain[2].data = "forged".to_string();
        assert!(bc.validate().is_err());
    }

    #[test]
    fn validate_rejects_foreign_genesis() {
        let mut blocks = chain_of(&["alpha"]).chain;
        blocks[0].data = "Other Genesis".to_string();
        blocks[0].mine(DIFFICULTY);
        let result = Blockchain::from_blocks(blocks, DIFFICULTY);
        assert!(matches!(result, Err(ChainError::BadGenesis)));
    }

    #[test]
    fn serde_round_trip_preserves_chain() {
        let bc = chain_of(&["alpha", "beta"]);
        let json = serde_json::to_string(&bc.chain).expect("serialize");
        let restored: Vec<Block> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, bc.chain);
        assert!(Blockchain::from_blocks(restored, DIFFICULTY).is_ok());
    }
}

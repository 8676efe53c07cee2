use thiserror::Error;

/// Violations detected while validating a block or a whole chain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain is empty")]
    Empty,

    #[error("genesis block is not canonical")]
    BadGenesis,

    #[error("block index {got} where {expected} was expected")]
    BadIndex { expected: u64, got: u64 },

    #[error("block {index} does not link to its predecessor")]
    BadLinkage { index: u64 },

    #[error("block {index} hash does not match its contents")]
    BadHash { index: u64 },

    #[error("block {index} does not meet difficulty {difficulty}")]
    DifficultyNotMet { index: u64, difficulty: u32 },
}

/// Why `/receive_block` turned a block away. The `Display` strings are the
/// wire `reason` values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectReason {
    #[error("stale")]
    Stale,

    #[error("orphan")]
    Orphan,

    #[error("linkage mismatch")]
    LinkageMismatch,

    #[error("invalid: {0}")]
    Invalid(ChainError),
}

/// Errors from outbound HTTP calls. Always logged and absorbed at their
/// call sites; nothing here is fatal after startup.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("tracker unreachable: {0}")]
    TrackerUnreachable(String),

    #[error("peer request failed: {0}")]
    PeerRequest(String),
}

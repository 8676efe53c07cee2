use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::blockchain::Block;

/// Default directory for per-node chain snapshots.
pub const DEFAULT_STATE_DIR: &str = "blockchain_states";

/// Persists one node's chain as a single JSON document, rewritten atomically
/// after every accepted mutation.
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    /// Store rooted at `dir`, keyed by the node's host and port.
    pub fn new(dir: impl AsRef<Path>, host: &str, port: u16) -> Self {
        Self {
            path: dir.as_ref().join(format!("node_{host}_{port}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a chain snapshot: serialize to a temporary sibling, then rename
    /// over the target so a crash never leaves a partial file behind.
    pub fn save(&self, blocks: &[Block]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(blocks)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "persisted {} blocks to {}",
            blocks.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the persisted chain, if any. Missing, unreadable, or corrupt
    /// files are treated as absent so the caller can fall back to genesis.
    pub fn load(&self) -> Option<Vec<Block>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("failed to read {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(blocks) => Some(blocks),
            Err(e) => {
                warn!("corrupt chain file {}: {e}", self.path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ChainStore::new(dir.path(), "127.0.0.1", 5501);
        let mut bc = Blockchain::new(1);
        let mut block = crate::blockchain::Block::new(1, "alpha".into(), bc.tip().hash.clone());
        block.mine(1);
        bc.append(block).expect("valid block");

        store.save(&bc.chain).expect("save");
        assert_eq!(store.load().expect("load"), bc.chain);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ChainStore::new(dir.path(), "127.0.0.1", 5501);
        assert!(store.load().is_none());
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ChainStore::new(dir.path(), "127.0.0.1", 5501);
        fs::create_dir_all(dir.path()).expect("mkdir");
        fs::write(store.path(), "{not valid json").expect("write");
        assert!(store.load().is_none());
    }

    #[test]
    fn save_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ChainStore::new(dir.path(), "127.0.0.1", 5501);
        let bc = Blockchain::new(1);
        store.save(&bc.chain).expect("save");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

use {
    alloy::primitives::Address,
    anyhow::{Context, Result},
    serde::{Deserialize, Serialize},
    std::{
        io::Write,
        path::{Path, PathBuf},
    },
    tokio::sync::Mutex,
};

/// The unit of lifecycle tracking. An auction contract selling several
/// enabled tokens produces one pair per token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuctionTokenPair {
    pub auction: Address,
    pub token: Address,
}

/// The persisted aggregate. Presence of a pair in `active` means "kicked but
/// not yet fully taken or expired".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    pub active: Vec<AuctionTokenPair>,
    pub last_checked_block: u64,
}

/// Durable record of the tracked pairs and the missed-take scan watermark.
///
/// This is the only place lifecycle membership is recorded. All operations
/// take the internal lock for their whole read-modify-write cycle and only
/// update the in-memory state after the new state hit disk, so a failed
/// write leaves the previous state intact and the caller sees the
/// transition as not applied.
pub struct Store {
    path: PathBuf,
    state: Mutex<TrackerState>,
}

impl Store {
    /// Loads the state file, or starts with the empty default state if the
    /// file does not exist yet. A present but unreadable file is an error:
    /// silently starting over would drop every tracked auction.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt state file {path:?}"))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => TrackerState::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("could not read state file {path:?}"));
            }
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Marks the pair as active. Returns whether it was newly inserted;
    /// adding an already tracked pair is a no-op.
    pub async fn add(&self, pair: AuctionTokenPair) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.active.contains(&pair) {
            return Ok(false);
        }
        let mut next = state.clone();
        next.active.push(pair);
        self.persist(&next)?;
        *state = next;
        Ok(true)
    }

    /// Removes the pair. Returns whether it was present; removing an absent
    /// pair is a no-op, not an error.
    pub async fn remove(&self, pair: AuctionTokenPair) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(index) = state.active.iter().position(|active| *active == pair) else {
            return Ok(false);
        };
        let mut next = state.clone();
        next.active.remove(index);
        self.persist(&next)?;
        *state = next;
        Ok(true)
    }

    /// Advances the missed-take scan watermark. The watermark never moves
    /// backwards; a smaller block is a no-op.
    pub async fn set_watermark(&self, block: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        if block <= state.last_checked_block {
            return Ok(());
        }
        let mut next = state.clone();
        next.last_checked_block = block;
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    pub async fn active(&self) -> Vec<AuctionTokenPair> {
        self.state.lock().await.active.clone()
    }

    pub async fn watermark(&self) -> u64 {
        self.state.lock().await.last_checked_block
    }

    /// Writes the whole state document to a temporary file and atomically
    /// renames it over the state file, so a crash mid-write can never leave
    /// a partially written document behind.
    fn persist(&self, state: &TrackerState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("could not create temporary state file in {dir:?}"))?;
        file.write_all(&serde_json::to_vec(state)?)
            .context("could not write state")?;
        file.persist(&self.path)
            .with_context(|| format!("could not replace state file {:?}", self.path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(auction_byte: u8, token_byte: u8) -> AuctionTokenPair {
        AuctionTokenPair {
            auction: Address::repeat_byte(auction_byte),
            token: Address::repeat_byte(token_byte),
        }
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(dir.path().join("state.json")).unwrap();

        assert!(store.add(pair(1, 2)).await.unwrap());
        assert!(!store.add(pair(1, 2)).await.unwrap());
        assert_eq!(store.active().await, vec![pair(1, 2)]);
    }

    #[tokio::test]
    async fn remove_absent_pair_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(dir.path().join("state.json")).unwrap();

        store.add(pair(1, 2)).await.unwrap();
        assert!(store.remove(pair(1, 2)).await.unwrap());
        assert!(!store.remove(pair(1, 2)).await.unwrap());
        assert!(store.active().await.is_empty());
    }

    #[tokio::test]
    async fn watermark_never_decreases() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(dir.path().join("state.json")).unwrap();

        store.set_watermark(100).await.unwrap();
        store.set_watermark(42).await.unwrap();
        assert_eq!(store.watermark().await, 100);
        store.set_watermark(101).await.unwrap();
        assert_eq!(store.watermark().await, 101);
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = Store::load(&path).unwrap();
        store.add(pair(1, 2)).await.unwrap();
        store.add(pair(3, 4)).await.unwrap();
        store.remove(pair(1, 2)).await.unwrap();
        store.set_watermark(7).await.unwrap();
        drop(store);

        let store = Store::load(&path).unwrap();
        assert_eq!(store.active().await, vec![pair(3, 4)]);
        assert_eq!(store.watermark().await, 7);
    }

    #[tokio::test]
    async fn missing_file_loads_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(dir.path().join("does_not_exist.json")).unwrap();
        assert!(store.active().await.is_empty());
        assert_eq!(store.watermark().await, 0);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(Store::load(&path).is_err());
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = Store::load(&path).unwrap();
        store.add(pair(1, 2)).await.unwrap();

        // Point the store at a directory that does not exist so persisting
        // fails, then check the failed transition was not applied in memory.
        let broken = Store {
            path: dir.path().join("missing").join("state.json"),
            state: Mutex::new(store.state.lock().await.clone()),
        };
        assert!(broken.add(pair(3, 4)).await.is_err());
        assert_eq!(broken.active().await, vec![pair(1, 2)]);
        assert!(broken.remove(pair(1, 2)).await.is_err());
        assert_eq!(broken.active().await, vec![pair(1, 2)]);
    }
}

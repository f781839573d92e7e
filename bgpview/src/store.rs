use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::aspath::AsPath;
use crate::error::{Result, ViewError};
use crate::sig::PeerSignatureStore;

/// Stable id of a path in the store: the arena index plus the arena tag.
/// Equal `(encoding, is_core)` pairs map to equal ids for the lifetime of
/// the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathId {
    pub index: u32,
    pub is_core: bool,
}

/// A stored AS path: the canonical encoding plus the arena tag. "Core"
/// paths are fully-interned canonical paths; "non-core" paths are
/// synthesized variants (e.g. per-origin) kept under separate ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePath {
    encoding: Vec<u8>,
    is_core: bool,
}

impl StorePath {
    pub fn encoding(&self) -> &[u8] {
        &self.encoding
    }

    pub fn is_core(&self) -> bool {
        self.is_core
    }

    pub fn decode(&self) -> Result<AsPath> {
        AsPath::decode(&self.encoding)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(path) => path.fmt(f),
            Err(_) => write!(f, "<undecodable path>"),
        }
    }
}

#[derive(Debug, Default)]
struct PathArena {
    index: HashMap<Vec<u8>, u32>,
    paths: Vec<StorePath>,
}

impl PathArena {
    fn insert(&mut self, encoding: &[u8], is_core: bool) -> u32 {
        if let Some(idx) = self.index.get(encoding) {
            return *idx;
        }
        let idx = self.paths.len() as u32;
        self.paths.push(StorePath {
            encoding: encoding.to_vec(),
            is_core,
        });
        self.index.insert(encoding.to_vec(), idx);
        idx
    }
}

/// Content-addressed AS path store.
#[derive(Debug, Default)]
pub struct AsPathStore {
    core: PathArena,
    noncore: PathArena,
}

impl AsPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn arena(&self, is_core: bool) -> &PathArena {
        if is_core { &self.core } else { &self.noncore }
    }

    /// Insert an encoded path. Idempotent per `(encoding, is_core)`.
    pub fn insert(&mut self, encoding: &[u8], is_core: bool) -> PathId {
        let arena = if is_core {
            &mut self.core
        } else {
            &mut self.noncore
        };
        PathId {
            index: arena.insert(encoding, is_core),
            is_core,
        }
    }

    /// Encode and insert a decoded path.
    pub fn insert_path(&mut self, path: &AsPath, is_core: bool) -> PathId {
        self.insert(&path.encode(), is_core)
    }

    pub fn get(&self, id: PathId) -> Result<&StorePath> {
        self.arena(id.is_core)
            .paths
            .get(id.index as usize)
            .ok_or(ViewError::NotFound)
    }

    pub fn contains(&self, id: PathId) -> bool {
        (id.index as usize) < self.arena(id.is_core).paths.len()
    }

    pub fn iter_paths(&self) -> impl Iterator<Item = (PathId, &StorePath)> {
        fn tag(is_core: bool) -> impl Fn((usize, &StorePath)) -> (PathId, &StorePath) {
            move |(idx, path): (usize, &StorePath)| {
                (
                    PathId {
                        index: idx as u32,
                        is_core,
                    },
                    path,
                )
            }
        }
        self.core
            .paths
            .iter()
            .enumerate()
            .map(tag(true))
            .chain(self.noncore.paths.iter().enumerate().map(tag(false)))
    }

    pub fn len(&self) -> usize {
        self.core.paths.len() + self.noncore.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The stores shared by a view, its snapshots and the routing-table engine.
///
/// Both stores are append-only. The single-threaded core mutates them
/// through the write guards; a worker holding a detached snapshot only ever
/// reads. Lock poisoning is ignored: an append that panicked left the store
/// in a consistent (if shorter) state.
#[derive(Debug, Default)]
pub struct ViewStores {
    sigs: RwLock<PeerSignatureStore>,
    paths: RwLock<AsPathStore>,
}

impl ViewStores {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sigs(&self) -> RwLockReadGuard<'_, PeerSignatureStore> {
        self.sigs.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sigs_mut(&self) -> RwLockWriteGuard<'_, PeerSignatureStore> {
        self.sigs.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn paths(&self) -> RwLockReadGuard<'_, AsPathStore> {
        self.paths.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn paths_mut(&self) -> RwLockWriteGuard<'_, AsPathStore> {
        self.paths.write().unwrap_or_else(PoisonError::into_inner)
    }
}

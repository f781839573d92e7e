use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use strum_macros::Display;

use crate::rt::peer::PeerTables;
use crate::sig::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum CollectorState {
    Unknown,
    Up,
    Down,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CollectorCounters {
    pub valid_record_cnt: u64,
    pub corrupted_record_cnt: u64,
    pub empty_record_cnt: u64,
}

/// Per-collector state: its registered peers and the bounds of the last
/// promoted RIB among them.
#[derive(Debug)]
pub struct CollectorTables {
    pub name: String,
    pub peer_ids: BTreeSet<PeerId>,
    pub state: CollectorState,
    pub ref_rib_start: u32,
    pub ref_rib_end: u32,
    pub uc_rib_start: u32,
    pub uc_rib_end: u32,
    pub counters: CollectorCounters,
}

impl CollectorTables {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            peer_ids: BTreeSet::new(),
            state: CollectorState::Unknown,
            ref_rib_start: 0,
            ref_rib_end: 0,
            uc_rib_start: 0,
            uc_rib_end: 0,
            counters: CollectorCounters::default(),
        }
    }

    /// A collector is up while at least one of its peers has an
    /// established session; down once all of them went away.
    pub fn recompute_state(&mut self, peers: &BTreeMap<PeerId, PeerTables>) {
        let mut any = false;
        for id in self.peer_ids.iter() {
            if let Some(peer) = peers.get(id) {
                any = true;
                if peer.fsm_state.is_established() {
                    self.state = CollectorState::Up;
                    return;
                }
            }
        }
        self.state = if any {
            CollectorState::Down
        } else {
            CollectorState::Unknown
        };
    }
}

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;
use ipnet::IpNet;
use serde::Serialize;

use crate::aspath::AsSegment;
use crate::rt::elem::FsmState;
use crate::sig::PeerId;
use crate::store::PathId;

bitflags! {
    /// Status of a per-(collector, peer, pfx) record. `ANNOUNCED` means
    /// the route is trusted in the reference timeline; `UC_ANNOUNCED`
    /// means it was seen in the RIB dump currently being ingested.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PfxStatus: u8 {
        const ANNOUNCED = 0x01;
        const UC_ANNOUNCED = 0x02;
    }
}

/// Per-(collector, peer, pfx) record. Exists iff the peer has been
/// observed announcing the prefix in the current reference RIB or the
/// current UC RIB.
#[derive(Debug, Clone, Copy, Default)]
pub struct PfxInfo {
    pub uc_path_id: Option<PathId>,
    /// Offset of the UC entry's timestamp from the UC RIB start, saturated.
    pub bgp_time_uc_delta: u16,
    pub bgp_time_last: u32,
    pub status: PfxStatus,
}

/// Timestamp window of a RIB dump in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UcWindow {
    pub start: u32,
    pub end: u32,
}

impl UcWindow {
    pub fn entry_time(&self, info: &PfxInfo) -> u32 {
        self.start + info.bgp_time_uc_delta as u32
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PeerCounters {
    pub rib_entry_cnt: u64,
    pub announce_cnt: u64,
    pub withdrawal_cnt: u64,
    pub state_messages_cnt: u64,
    pub stale_cnt: u64,
    pub positive_mismatch_cnt: u64,
    pub negative_mismatch_cnt: u64,
}

/// Per-(collector, peer) reconciliation state.
#[derive(Debug)]
pub struct PeerTables {
    pub id: PeerId,
    pub fsm_state: FsmState,
    /// Bounds of the last fully-ingested (reference) RIB: routes at or
    /// after `ref_rib_start` are trusted.
    pub ref_rib_start: u32,
    pub ref_rib_end: u32,
    /// Window of the RIB dump being ingested, if any.
    pub uc: Option<UcWindow>,
    pub last_ts: u32,
    pub metrics_generated: bool,
    pub counters: PeerCounters,
    pub announcing_origins: HashSet<AsSegment>,
    pub announced_pfxs: HashSet<IpNet>,
    pub withdrawn_pfxs: HashSet<IpNet>,
    pub pfxs: HashMap<IpNet, PfxInfo>,
}

impl PeerTables {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            fsm_state: FsmState::Unknown,
            ref_rib_start: 0,
            ref_rib_end: 0,
            uc: None,
            last_ts: 0,
            metrics_generated: false,
            counters: PeerCounters::default(),
            announcing_origins: HashSet::new(),
            announced_pfxs: HashSet::new(),
            withdrawn_pfxs: HashSet::new(),
            pfxs: HashMap::new(),
        }
    }

    /// Reset the per-interval counters and sets at an interval boundary.
    pub fn interval_reset(&mut self) {
        self.counters = PeerCounters::default();
        self.announcing_origins.clear();
        self.announced_pfxs.clear();
        self.withdrawn_pfxs.clear();
        self.metrics_generated = false;
    }
}

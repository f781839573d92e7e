use std::net::IpAddr;

use ipnet::IpNet;
use serde::Serialize;
use strum_macros::Display;

use crate::aspath::AsPath;

/// Record-level type of the stream a BGP element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RecordType {
    Rib,
    Update,
}

/// Record-level status attached to each element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RecordStatus {
    Valid,
    Corrupted,
    Empty,
}

/// Per-peer BGP session state. A peer is "up" only when `Established`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum FsmState {
    Unknown,
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl FsmState {
    pub fn is_established(&self) -> bool {
        *self == FsmState::Established
    }

    /// Explicitly observed down states, as opposed to peers never seen
    /// reporting session state at all.
    pub fn is_down(&self) -> bool {
        !matches!(self, FsmState::Unknown | FsmState::Established)
    }
}

#[derive(Debug, Clone)]
pub enum ElemKind {
    /// One entry of a RIB dump in progress.
    RibEntry { pfx: IpNet, as_path: AsPath },
    Announce { pfx: IpNet, as_path: AsPath },
    Withdraw { pfx: IpNet },
    State { new_state: FsmState },
}

/// One element of a BGP record stream, tagged with its source collector
/// and peer.
#[derive(Debug, Clone)]
pub struct BgpElem {
    pub record_type: RecordType,
    pub record_status: RecordStatus,
    pub ts: u32,
    pub collector: String,
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
    pub kind: ElemKind,
}

impl BgpElem {
    fn new(
        record_type: RecordType,
        ts: u32,
        collector: &str,
        peer_ip: IpAddr,
        peer_asn: u32,
        kind: ElemKind,
    ) -> Self {
        Self {
            record_type,
            record_status: RecordStatus::Valid,
            ts,
            collector: collector.to_string(),
            peer_ip,
            peer_asn,
            kind,
        }
    }

    pub fn rib_entry(
        ts: u32,
        collector: &str,
        peer_ip: IpAddr,
        peer_asn: u32,
        pfx: IpNet,
        as_path: AsPath,
    ) -> Self {
        Self::new(
            RecordType::Rib,
            ts,
            collector,
            peer_ip,
            peer_asn,
            ElemKind::RibEntry { pfx, as_path },
        )
    }

    pub fn announce(
        ts: u32,
        collector: &str,
        peer_ip: IpAddr,
        peer_asn: u32,
        pfx: IpNet,
        as_path: AsPath,
    ) -> Self {
        Self::new(
            RecordType::Update,
            ts,
            collector,
            peer_ip,
            peer_asn,
            ElemKind::Announce { pfx, as_path },
        )
    }

    pub fn withdraw(ts: u32, collector: &str, peer_ip: IpAddr, peer_asn: u32, pfx: IpNet) -> Self {
        Self::new(
            RecordType::Update,
            ts,
            collector,
            peer_ip,
            peer_asn,
            ElemKind::Withdraw { pfx },
        )
    }

    pub fn state(
        ts: u32,
        collector: &str,
        peer_ip: IpAddr,
        peer_asn: u32,
        new_state: FsmState,
    ) -> Self {
        Self::new(
            RecordType::Update,
            ts,
            collector,
            peer_ip,
            peer_asn,
            ElemKind::State { new_state },
        )
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.record_status = status;
        self
    }
}

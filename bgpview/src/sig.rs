use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

use crate::error::{Result, ViewError};

/// Collector names longer than this fail interning with `InvalidArg`.
pub const COLLECTOR_NAME_MAX: usize = 255;

/// Interned id of a `(collector, peer_ip, peer_asn)` signature. Id 0 is
/// reserved as "invalid"; valid ids run 1..=65534.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PeerId(pub u16);

impl PeerId {
    pub const INVALID: PeerId = PeerId(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeerSignature {
    pub collector: String,
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
}

impl fmt::Display for PeerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.collector, self.peer_ip, self.peer_asn)
    }
}

/// Interns peer signatures to compact 16-bit ids. Signatures are immutable
/// once assigned; distinct signatures map to distinct ids.
#[derive(Debug, Default)]
pub struct PeerSignatureStore {
    ids: HashMap<PeerSignature, PeerId>,
    sigs: Vec<PeerSignature>,
}

impl PeerSignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a signature, assigning a fresh id for a new triple and
    /// returning the existing id otherwise.
    pub fn intern(&mut self, collector: &str, peer_ip: IpAddr, peer_asn: u32) -> Result<PeerId> {
        if collector.len() > COLLECTOR_NAME_MAX {
            return Err(ViewError::InvalidArg(format!(
                "collector name exceeds {} bytes",
                COLLECTOR_NAME_MAX
            )));
        }
        let sig = PeerSignature {
            collector: collector.to_string(),
            peer_ip,
            peer_asn,
        };
        if let Some(id) = self.ids.get(&sig) {
            return Ok(*id);
        }
        // Id 0 is reserved and id 65535 is never assigned, so the id space
        // holds 65534 signatures.
        if self.sigs.len() >= u16::MAX as usize - 1 {
            return Err(ViewError::Capacity("peer signature store"));
        }
        let id = PeerId(self.sigs.len() as u16 + 1);
        self.sigs.push(sig.clone());
        self.ids.insert(sig, id);
        Ok(id)
    }

    pub fn lookup(&self, id: PeerId) -> Result<&PeerSignature> {
        if !id.is_valid() {
            return Err(ViewError::NotFound);
        }
        self.sigs
            .get(id.0 as usize - 1)
            .ok_or(ViewError::NotFound)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PeerId, &PeerSignature)> {
        self.sigs
            .iter()
            .enumerate()
            .map(|(idx, sig)| (PeerId(idx as u16 + 1), sig))
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

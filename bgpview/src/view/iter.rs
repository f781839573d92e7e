use std::ops::Bound;

use bitflags::bitflags;
use ipnet::IpNet;

use crate::sig::PeerId;
use crate::view::{PfxEntry, PfxPeerInfo, View, is_ipv4};

bitflags! {
    /// Field filter for the view cursors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFilter: u8 {
        const ACTIVE = 0x01;
        const INACTIVE = 0x02;
        const ALL_FIELDS = 0x03;
    }
}

impl FieldFilter {
    fn admits(&self, active: bool) -> bool {
        if active {
            self.contains(FieldFilter::ACTIVE)
        } else {
            self.contains(FieldFilter::INACTIVE)
        }
    }
}

/// Address family filter for the prefix cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyFilter {
    V4,
    V6,
    Both,
}

impl FamilyFilter {
    fn admits(&self, pfx: &IpNet) -> bool {
        match self {
            FamilyFilter::V4 => is_ipv4(pfx),
            FamilyFilter::V6 => !is_ipv4(pfx),
            FamilyFilter::Both => true,
        }
    }
}

/// Cursor over a view with three independent sub-cursors: peer, pfx and
/// pfx-peer. The pfx-peer cursor is only valid while the pfx cursor is
/// positioned on a prefix; advancing the pfx cursor resets it. Iteration
/// order is the map order, stable between mutations; the borrow of the
/// view guarantees no mutation happens while a cursor is alive.
pub struct ViewIter<'a> {
    view: &'a View,

    peer_filter: FieldFilter,
    peer_pos: Option<PeerId>,

    pfx_filter: FieldFilter,
    pfx_family: FamilyFilter,
    pfx_pos: Option<IpNet>,

    pp_filter: FieldFilter,
    pp_pos: Option<PeerId>,
}

impl<'a> ViewIter<'a> {
    pub(crate) fn new(view: &'a View) -> Self {
        Self {
            view,
            peer_filter: FieldFilter::ALL_FIELDS,
            peer_pos: None,
            pfx_filter: FieldFilter::ALL_FIELDS,
            pfx_family: FamilyFilter::Both,
            pfx_pos: None,
            pp_filter: FieldFilter::ALL_FIELDS,
            pp_pos: None,
        }
    }

    // Peer cursor.

    fn scan_peer(&self, from: Bound<PeerId>) -> Option<PeerId> {
        self.view
            .peers()
            .filter(|(id, _)| match from {
                Bound::Excluded(cur) => *id > cur,
                _ => true,
            })
            .find(|(_, info)| self.peer_filter.admits(info.is_active()))
            .map(|(id, _)| id)
    }

    pub fn first_peer(&mut self, filter: FieldFilter) -> bool {
        self.peer_filter = filter;
        self.peer_pos = self.scan_peer(Bound::Unbounded);
        self.peer_pos.is_some()
    }

    pub fn has_more_peer(&self) -> bool {
        self.peer_pos.is_some()
    }

    pub fn next_peer(&mut self) -> bool {
        if let Some(cur) = self.peer_pos {
            self.peer_pos = self.scan_peer(Bound::Excluded(cur));
        }
        self.peer_pos.is_some()
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        self.peer_pos
    }

    pub fn peer(&self) -> Option<&'a crate::view::PeerInfo> {
        self.view.peer(self.peer_pos?)
    }

    // Pfx cursor.

    fn scan_pfx(&self, from: Bound<IpNet>) -> Option<IpNet> {
        self.view
            .pfxs()
            .filter(|(pfx, _)| match from {
                Bound::Excluded(cur) => **pfx > cur,
                _ => true,
            })
            .find(|(pfx, entry)| {
                self.pfx_family.admits(pfx) && self.pfx_filter.admits(entry.is_active())
            })
            .map(|(pfx, _)| *pfx)
    }

    pub fn first_pfx(&mut self, filter: FieldFilter, family: FamilyFilter) -> bool {
        self.pfx_filter = filter;
        self.pfx_family = family;
        self.pfx_pos = self.scan_pfx(Bound::Unbounded);
        self.pp_pos = None;
        self.pfx_pos.is_some()
    }

    pub fn has_more_pfx(&self) -> bool {
        self.pfx_pos.is_some()
    }

    pub fn next_pfx(&mut self) -> bool {
        if let Some(cur) = self.pfx_pos {
            self.pfx_pos = self.scan_pfx(Bound::Excluded(cur));
        }
        // Advancing the pfx cursor invalidates the pfx-peer cursor.
        self.pp_pos = None;
        self.pfx_pos.is_some()
    }

    pub fn pfx(&self) -> Option<IpNet> {
        self.pfx_pos
    }

    pub fn pfx_entry(&self) -> Option<&'a PfxEntry> {
        self.view.pfx(&self.pfx_pos?)
    }

    // Pfx-peer cursor, bound to the current pfx.

    fn scan_pfx_peer(&self, from: Bound<PeerId>) -> Option<PeerId> {
        let entry = self.view.pfx(&self.pfx_pos?)?;
        entry
            .peers()
            .filter(|(id, _)| match from {
                Bound::Excluded(cur) => *id > cur,
                _ => true,
            })
            .find(|(_, info)| self.pp_filter.admits(info.is_active()))
            .map(|(id, _)| id)
    }

    pub fn first_pfx_peer(&mut self, filter: FieldFilter) -> bool {
        self.pp_filter = filter;
        self.pp_pos = self.scan_pfx_peer(Bound::Unbounded);
        self.pp_pos.is_some()
    }

    pub fn has_more_pfx_peer(&self) -> bool {
        self.pp_pos.is_some()
    }

    pub fn next_pfx_peer(&mut self) -> bool {
        if let Some(cur) = self.pp_pos {
            self.pp_pos = self.scan_pfx_peer(Bound::Excluded(cur));
        }
        self.pp_pos.is_some()
    }

    pub fn pfx_peer_id(&self) -> Option<PeerId> {
        self.pp_pos
    }

    pub fn pfx_peer(&self) -> Option<&'a PfxPeerInfo> {
        self.view.pfx_peer(&self.pfx_pos?, self.pp_pos?)
    }
}

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;

use crate::error::{Result, ViewError};
use crate::sig::PeerId;
use crate::store::{PathId, ViewStores};

pub mod iter;
pub use iter::{FamilyFilter, FieldFilter, ViewIter};

pub mod codec;
pub use codec::{ActiveFields, AllFields, ViewFilter, encode_view, read_view, write_view};

pub mod diff;
pub use diff::{DiffStats, FrameKind, apply_diff, encode_diff, read_frame};

pub mod dump;
pub use dump::write_ascii;

pub fn is_ipv4(pfx: &IpNet) -> bool {
    matches!(pfx, IpNet::V4(_))
}

/// Per-(pfx, peer) state: the path the peer announced for the prefix and
/// whether the route is currently advertised.
pub struct PfxPeerInfo {
    path_id: PathId,
    active: bool,
    user: Option<Box<dyn Any + Send>>,
}

impl PfxPeerInfo {
    fn new(path_id: PathId) -> Self {
        Self {
            path_id,
            active: false,
            user: None,
        }
    }

    pub fn path_id(&self) -> PathId {
        self.path_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn user<T: Any>(&self) -> Option<&T> {
        self.user.as_ref().and_then(|u| u.downcast_ref())
    }

    pub fn set_user(&mut self, user: Box<dyn Any + Send>) {
        self.user = Some(user);
    }

    // User data is attached to one view; duplicates start without it.
    fn dup(&self) -> Self {
        Self {
            path_id: self.path_id,
            active: self.active,
            user: None,
        }
    }
}

impl fmt::Debug for PfxPeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PfxPeerInfo")
            .field("path_id", &self.path_id)
            .field("active", &self.active)
            .field("user", &self.user.is_some())
            .finish()
    }
}

/// Per-peer state within a view.
pub struct PeerInfo {
    id: PeerId,
    active: bool,
    pfx_cnt_v4: u32,
    pfx_cnt_v6: u32,
    user: Option<Box<dyn Any + Send>>,
}

impl PeerInfo {
    fn new(id: PeerId) -> Self {
        Self {
            id,
            active: false,
            pfx_cnt_v4: 0,
            pfx_cnt_v6: 0,
            user: None,
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of active pfx-peers on this peer, by address family.
    pub fn pfx_cnt_v4(&self) -> u32 {
        self.pfx_cnt_v4
    }

    pub fn pfx_cnt_v6(&self) -> u32 {
        self.pfx_cnt_v6
    }

    pub fn user<T: Any>(&self) -> Option<&T> {
        self.user.as_ref().and_then(|u| u.downcast_ref())
    }

    pub fn set_user(&mut self, user: Box<dyn Any + Send>) {
        self.user = Some(user);
    }

    fn dup(&self) -> Self {
        Self {
            id: self.id,
            active: self.active,
            pfx_cnt_v4: self.pfx_cnt_v4,
            pfx_cnt_v6: self.pfx_cnt_v6,
            user: None,
        }
    }
}

impl fmt::Debug for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerInfo")
            .field("id", &self.id)
            .field("active", &self.active)
            .field("pfx_cnt_v4", &self.pfx_cnt_v4)
            .field("pfx_cnt_v6", &self.pfx_cnt_v6)
            .finish()
    }
}

/// Per-prefix state: the pfx-peer edges of the prefix. A prefix is active
/// iff at least one of its edges is active. Entries are created on first
/// insert and kept (inactive) when their last edge goes away; only `gc`
/// drops them.
#[derive(Debug)]
pub struct PfxEntry {
    active_cnt: u32,
    peers: BTreeMap<PeerId, PfxPeerInfo>,
}

impl PfxEntry {
    fn new() -> Self {
        Self {
            active_cnt: 0,
            peers: BTreeMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_cnt > 0
    }

    pub fn peer(&self, id: PeerId) -> Option<&PfxPeerInfo> {
        self.peers.get(&id)
    }

    pub fn peers(&self) -> impl Iterator<Item = (PeerId, &PfxPeerInfo)> {
        self.peers.iter().map(|(id, info)| (*id, info))
    }

    pub fn peer_cnt(&self) -> usize {
        self.peers.len()
    }

    pub fn active_peer_cnt(&self) -> u32 {
        self.active_cnt
    }

    fn dup(&self) -> Self {
        Self {
            active_cnt: self.active_cnt,
            peers: self.peers.iter().map(|(id, i)| (*id, i.dup())).collect(),
        }
    }
}

/// The triply-indexed (prefix x peer x path) container at the heart of the
/// framework. Peer signatures and AS paths are interned in stores shared
/// with the engine and with duplicated views.
///
/// Invariant violations are bugs: they abort in debug builds; in release
/// builds the view is poisoned and every further mutation fails fast with
/// `Internal`.
#[derive(Debug)]
pub struct View {
    time: u32,
    stores: Arc<ViewStores>,
    peers: BTreeMap<PeerId, PeerInfo>,
    pfxs: BTreeMap<IpNet, PfxEntry>,
    poisoned: bool,
}

impl View {
    pub fn new(stores: Arc<ViewStores>) -> Self {
        Self {
            time: 0,
            stores,
            peers: BTreeMap::new(),
            pfxs: BTreeMap::new(),
            poisoned: false,
        }
    }

    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn set_time(&mut self, time: u32) {
        self.time = time;
    }

    pub fn stores(&self) -> &Arc<ViewStores> {
        &self.stores
    }

    fn ensure_ok(&self) -> Result<()> {
        if self.poisoned {
            return Err(ViewError::Internal("view is poisoned".into()));
        }
        Ok(())
    }

    fn poison(&mut self, what: &str) -> ViewError {
        debug_assert!(false, "view invariant violated: {what}");
        self.poisoned = true;
        ViewError::Internal(format!("view invariant violated: {what}"))
    }

    /// Intern the signature and create an inactive peer entry if new.
    pub fn add_peer(&mut self, collector: &str, peer_ip: IpAddr, peer_asn: u32) -> Result<PeerId> {
        self.ensure_ok()?;
        let id = self.stores.sigs_mut().intern(collector, peer_ip, peer_asn)?;
        self.peers.entry(id).or_insert_with(|| PeerInfo::new(id));
        Ok(id)
    }

    pub fn peer(&self, id: PeerId) -> Option<&PeerInfo> {
        self.peers.get(&id)
    }

    pub fn peers(&self) -> impl Iterator<Item = (PeerId, &PeerInfo)> {
        self.peers.iter().map(|(id, info)| (*id, info))
    }

    pub fn peer_cnt(&self) -> usize {
        self.peers.len()
    }

    pub fn activate_peer(&mut self, peer: PeerId) -> Result<bool> {
        self.ensure_ok()?;
        let info = self.peers.get_mut(&peer).ok_or(ViewError::NotFound)?;
        if info.active {
            return Ok(false);
        }
        info.active = true;
        Ok(true)
    }

    /// Deactivate a peer and all of its pfx-peers.
    pub fn deactivate_peer(&mut self, peer: PeerId) -> Result<bool> {
        self.ensure_ok()?;
        if !self.peers.contains_key(&peer) {
            return Err(ViewError::NotFound);
        }
        let touched: Vec<IpNet> = self
            .pfxs
            .iter()
            .filter(|(_, e)| e.peers.get(&peer).is_some_and(|i| i.active))
            .map(|(pfx, _)| *pfx)
            .collect();
        let mut changed = false;
        for pfx in touched {
            self.deactivate_pfx_peer(&pfx, peer)?;
            changed = true;
        }
        let info = self.peers.get_mut(&peer).ok_or(ViewError::NotFound)?;
        if info.active {
            info.active = false;
            changed = true;
        }
        Ok(changed)
    }

    /// Remove a peer and all of its pfx-peers. Prefixes left without peers
    /// stay in the map, inactive.
    pub fn remove_peer(&mut self, peer: PeerId) -> Result<()> {
        self.ensure_ok()?;
        if self.peers.remove(&peer).is_none() {
            return Err(ViewError::NotFound);
        }
        let mut underflow = false;
        for entry in self.pfxs.values_mut() {
            if let Some(info) = entry.peers.remove(&peer)
                && info.active
            {
                if entry.active_cnt == 0 {
                    underflow = true;
                } else {
                    entry.active_cnt -= 1;
                }
            }
        }
        if underflow {
            return Err(self.poison("pfx active count underflow"));
        }
        Ok(())
    }

    /// Insert a pfx-peer edge, or update its path. A new edge starts
    /// inactive; an updated edge keeps its state.
    pub fn add_pfx_peer(&mut self, pfx: IpNet, peer: PeerId, path_id: PathId) -> Result<()> {
        self.ensure_ok()?;
        if !self.peers.contains_key(&peer) {
            return Err(ViewError::NotFound);
        }
        if !self.stores.paths().contains(path_id) {
            return Err(ViewError::NotFound);
        }
        let entry = self.pfxs.entry(pfx).or_insert_with(PfxEntry::new);
        entry
            .peers
            .entry(peer)
            .and_modify(|info| info.path_id = path_id)
            .or_insert_with(|| PfxPeerInfo::new(path_id));
        Ok(())
    }

    pub fn pfx(&self, pfx: &IpNet) -> Option<&PfxEntry> {
        self.pfxs.get(pfx)
    }

    pub fn pfxs(&self) -> impl Iterator<Item = (&IpNet, &PfxEntry)> {
        self.pfxs.iter()
    }

    pub fn pfx_cnt(&self) -> usize {
        self.pfxs.len()
    }

    pub fn pfx_peer(&self, pfx: &IpNet, peer: PeerId) -> Option<&PfxPeerInfo> {
        self.pfxs.get(pfx).and_then(|e| e.peers.get(&peer))
    }

    pub fn activate_pfx_peer(&mut self, pfx: &IpNet, peer: PeerId) -> Result<bool> {
        self.ensure_ok()?;
        {
            let entry = self.pfxs.get_mut(pfx).ok_or(ViewError::NotFound)?;
            let info = entry.peers.get_mut(&peer).ok_or(ViewError::NotFound)?;
            if info.active {
                return Ok(false);
            }
            info.active = true;
            entry.active_cnt += 1;
        }
        match self.peers.get_mut(&peer) {
            Some(p) => {
                p.active = true;
                if is_ipv4(pfx) {
                    p.pfx_cnt_v4 += 1;
                } else {
                    p.pfx_cnt_v6 += 1;
                }
                Ok(true)
            }
            None => Err(self.poison("pfx-peer references unknown peer")),
        }
    }

    pub fn deactivate_pfx_peer(&mut self, pfx: &IpNet, peer: PeerId) -> Result<bool> {
        self.ensure_ok()?;
        let mut underflow = false;
        {
            let entry = self.pfxs.get_mut(pfx).ok_or(ViewError::NotFound)?;
            let info = entry.peers.get_mut(&peer).ok_or(ViewError::NotFound)?;
            if !info.active {
                return Ok(false);
            }
            info.active = false;
            if entry.active_cnt == 0 {
                underflow = true;
            } else {
                entry.active_cnt -= 1;
            }
        }
        if underflow {
            return Err(self.poison("pfx active count underflow"));
        }
        let v4 = is_ipv4(pfx);
        match self.peers.get_mut(&peer) {
            Some(p) => {
                let cnt = if v4 {
                    &mut p.pfx_cnt_v4
                } else {
                    &mut p.pfx_cnt_v6
                };
                if *cnt == 0 {
                    underflow = true;
                } else {
                    *cnt -= 1;
                    if p.pfx_cnt_v4 == 0 && p.pfx_cnt_v6 == 0 {
                        p.active = false;
                    }
                }
            }
            None => underflow = true,
        }
        if underflow {
            return Err(self.poison("peer pfx count underflow"));
        }
        Ok(true)
    }

    pub fn remove_pfx_peer(&mut self, pfx: &IpNet, peer: PeerId) -> Result<()> {
        self.ensure_ok()?;
        let active = {
            let entry = self.pfxs.get(pfx).ok_or(ViewError::NotFound)?;
            entry.peers.get(&peer).ok_or(ViewError::NotFound)?.active
        };
        if active {
            self.deactivate_pfx_peer(pfx, peer)?;
        }
        if let Some(entry) = self.pfxs.get_mut(pfx) {
            entry.peers.remove(&peer);
        }
        Ok(())
    }

    pub fn set_peer_user(&mut self, peer: PeerId, user: Box<dyn Any + Send>) -> Result<()> {
        let info = self.peers.get_mut(&peer).ok_or(ViewError::NotFound)?;
        info.set_user(user);
        Ok(())
    }

    pub fn set_pfx_peer_user(
        &mut self,
        pfx: &IpNet,
        peer: PeerId,
        user: Box<dyn Any + Send>,
    ) -> Result<()> {
        let entry = self.pfxs.get_mut(pfx).ok_or(ViewError::NotFound)?;
        let info = entry.peers.get_mut(&peer).ok_or(ViewError::NotFound)?;
        info.set_user(user);
        Ok(())
    }

    /// Drop prefixes without peers and peers without pfx-peers. Only
    /// inactive entries qualify.
    pub fn gc(&mut self) {
        self.pfxs.retain(|_, e| !e.peers.is_empty());
        let mut referenced: BTreeSet<PeerId> = BTreeSet::new();
        for entry in self.pfxs.values() {
            referenced.extend(entry.peers.keys().copied());
        }
        self.peers
            .retain(|id, p| p.active || referenced.contains(id));
    }

    /// Empty the peer and prefix maps. The shared stores are retained.
    pub fn clear(&mut self) {
        self.peers.clear();
        self.pfxs.clear();
    }

    /// Structural deep copy sharing the same signature/path stores. User
    /// data is not carried over.
    pub fn dup(&self) -> View {
        View {
            time: self.time,
            stores: Arc::clone(&self.stores),
            peers: self.peers.iter().map(|(id, p)| (*id, p.dup())).collect(),
            pfxs: self.pfxs.iter().map(|(pfx, e)| (*pfx, e.dup())).collect(),
            poisoned: self.poisoned,
        }
    }

    /// Replace this view's contents with a deep copy of `src`. Both views
    /// must share the same stores.
    pub fn copy_from(&mut self, src: &View) -> Result<()> {
        if !Arc::ptr_eq(&self.stores, &src.stores) {
            return Err(ViewError::InvalidArg(
                "source view does not share this view's stores".into(),
            ));
        }
        let dup = src.dup();
        self.time = dup.time;
        self.peers = dup.peers;
        self.pfxs = dup.pfxs;
        self.poisoned = dup.poisoned;
        Ok(())
    }

    /// Number of active prefixes by address family.
    pub fn active_pfx_cnt(&self, v4: bool) -> usize {
        self.pfxs
            .iter()
            .filter(|(pfx, e)| e.is_active() && is_ipv4(pfx) == v4)
            .count()
    }

    /// Structural equivalence of peer set, active pfx-peer set and time,
    /// comparing signatures and path encodings so that renumbered ids
    /// still compare equal.
    pub fn routing_state_eq(&self, other: &View) -> bool {
        if self.time != other.time {
            return false;
        }
        fn peer_sigs(v: &View) -> Option<HashSet<(String, IpAddr, u32)>> {
            let sigs = v.stores.sigs();
            let mut out = HashSet::new();
            for (id, _) in v.peers() {
                let sig = sigs.lookup(id).ok()?;
                out.insert((sig.collector.clone(), sig.peer_ip, sig.peer_asn));
            }
            Some(out)
        }
        #[allow(clippy::type_complexity)]
        fn active_edges(v: &View) -> Option<HashSet<(IpNet, String, IpAddr, u32, Vec<u8>)>> {
            let sigs = v.stores.sigs();
            let paths = v.stores.paths();
            let mut out = HashSet::new();
            for (pfx, entry) in v.pfxs() {
                for (id, info) in entry.peers() {
                    if !info.is_active() {
                        continue;
                    }
                    let sig = sigs.lookup(id).ok()?;
                    let path = paths.get(info.path_id()).ok()?;
                    out.insert((
                        *pfx,
                        sig.collector.clone(),
                        sig.peer_ip,
                        sig.peer_asn,
                        path.encoding().to_vec(),
                    ));
                }
            }
            Some(out)
        }
        peer_sigs(self) == peer_sigs(other) && active_edges(self) == active_edges(other)
    }

    /// Cursor over peers, prefixes and pfx-peers. The cursor borrows the
    /// view; mutating the view first requires dropping it.
    pub fn iter(&self) -> ViewIter<'_> {
        ViewIter::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspath::AsPath;
    use std::net::Ipv4Addr;

    fn pfx(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn test_view() -> View {
        View::new(ViewStores::new())
    }

    fn path_id(view: &View, path: &str) -> PathId {
        let path: AsPath = path.parse().unwrap();
        view.stores().paths_mut().insert_path(&path, true)
    }

    #[test]
    fn single_peer_single_pfx() {
        let mut view = test_view();
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let pid = path_id(&view, "65001");
        view.add_pfx_peer(pfx("10.1.0.0/16"), peer, pid).unwrap();
        assert!(!view.pfx(&pfx("10.1.0.0/16")).unwrap().is_active());

        assert!(view.activate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap());
        let entry = view.pfx(&pfx("10.1.0.0/16")).unwrap();
        assert!(entry.is_active());
        assert!(entry.peer(peer).unwrap().is_active());
        let info = view.peer(peer).unwrap();
        assert!(info.is_active());
        assert_eq!(info.pfx_cnt_v4(), 1);
        assert_eq!(info.pfx_cnt_v6(), 0);

        let stored = view.stores().paths();
        let stored = stored.get(entry.peer(peer).unwrap().path_id()).unwrap();
        assert_eq!(stored.decode().unwrap(), AsPath::from_seq(vec![65001]));
    }

    #[test]
    fn activation_is_level_triggered() {
        let mut view = test_view();
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let pid = path_id(&view, "65001");
        view.add_pfx_peer(pfx("10.1.0.0/16"), peer, pid).unwrap();
        assert!(view.activate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap());
        assert!(!view.activate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap());
        assert!(view.deactivate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap());
        assert!(!view.deactivate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap());
        assert!(!view.peer(peer).unwrap().is_active());
        assert!(!view.pfx(&pfx("10.1.0.0/16")).unwrap().is_active());
    }

    #[test]
    fn family_counters() {
        let mut view = test_view();
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let pid = path_id(&view, "65001 65002");
        for p in ["10.1.0.0/16", "10.2.0.0/16", "2001:db8::/32"] {
            view.add_pfx_peer(pfx(p), peer, pid).unwrap();
            view.activate_pfx_peer(&pfx(p), peer).unwrap();
        }
        let info = view.peer(peer).unwrap();
        assert_eq!(info.pfx_cnt_v4(), 2);
        assert_eq!(info.pfx_cnt_v6(), 1);
        assert_eq!(view.active_pfx_cnt(true), 2);
        assert_eq!(view.active_pfx_cnt(false), 1);

        view.deactivate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap();
        let info = view.peer(peer).unwrap();
        assert_eq!(info.pfx_cnt_v4(), 1);
        assert!(info.is_active());
    }

    #[test]
    fn deactivate_peer_cascades() {
        let mut view = test_view();
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let other = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 65002)
            .unwrap();
        let pid = path_id(&view, "65001");
        view.add_pfx_peer(pfx("10.1.0.0/16"), peer, pid).unwrap();
        view.add_pfx_peer(pfx("10.1.0.0/16"), other, pid).unwrap();
        view.activate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap();
        view.activate_pfx_peer(&pfx("10.1.0.0/16"), other).unwrap();

        assert!(view.deactivate_peer(peer).unwrap());
        assert!(!view.peer(peer).unwrap().is_active());
        assert!(!view.pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap().is_active());
        // The prefix stays active through the other peer.
        assert!(view.pfx(&pfx("10.1.0.0/16")).unwrap().is_active());
    }

    #[test]
    fn remove_peer_keeps_inactive_pfx() {
        let mut view = test_view();
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let pid = path_id(&view, "65001");
        view.add_pfx_peer(pfx("10.1.0.0/16"), peer, pid).unwrap();
        view.activate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap();
        view.remove_peer(peer).unwrap();

        let entry = view.pfx(&pfx("10.1.0.0/16")).unwrap();
        assert_eq!(entry.peer_cnt(), 0);
        assert!(!entry.is_active());
        assert!(view.peer(peer).is_none());

        view.gc();
        assert_eq!(view.pfx_cnt(), 0);
    }

    #[test]
    fn gc_drops_only_empty_and_inactive() {
        let mut view = test_view();
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let lonely = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 65002)
            .unwrap();
        let pid = path_id(&view, "65001");
        view.add_pfx_peer(pfx("10.1.0.0/16"), peer, pid).unwrap();
        view.gc();
        // Peer with an (inactive) edge survives; edge-less peer does not.
        assert!(view.peer(peer).is_some());
        assert!(view.peer(lonely).is_none());
        assert_eq!(view.pfx_cnt(), 1);
    }

    #[test]
    fn dup_and_copy_share_stores() {
        let mut view = test_view();
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let pid = path_id(&view, "65001");
        view.add_pfx_peer(pfx("10.1.0.0/16"), peer, pid).unwrap();
        view.activate_pfx_peer(&pfx("10.1.0.0/16"), peer).unwrap();
        view.set_time(1000);

        let dup = view.dup();
        assert!(dup.routing_state_eq(&view));
        assert!(Arc::ptr_eq(view.stores(), dup.stores()));

        let mut other = View::new(Arc::clone(view.stores()));
        other.copy_from(&view).unwrap();
        assert!(other.routing_state_eq(&view));

        let mut foreign = View::new(ViewStores::new());
        assert!(foreign.copy_from(&view).is_err());
    }

    #[test]
    fn add_pfx_peer_requires_live_refs() {
        let mut view = test_view();
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let bogus_path = PathId {
            index: 7,
            is_core: true,
        };
        assert!(matches!(
            view.add_pfx_peer(pfx("10.1.0.0/16"), peer, bogus_path),
            Err(ViewError::NotFound)
        ));
        let pid = path_id(&view, "65001");
        assert!(matches!(
            view.add_pfx_peer(pfx("10.1.0.0/16"), PeerId(99), pid),
            Err(ViewError::NotFound)
        ));
    }

    #[test]
    fn clear_retains_stores() {
        let mut view = test_view();
        view.add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        view.clear();
        assert_eq!(view.peer_cnt(), 0);
        assert_eq!(view.stores().sigs().len(), 1);
    }
}

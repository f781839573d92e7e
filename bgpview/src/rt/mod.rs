//! The routing-table state engine: consumes a stream of BGP elements and
//! maintains an eventually-consistent view of the active routing state,
//! reconciling RIB dumps against live update streams per (collector, peer).

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;
use serde::Serialize;

use crate::aspath::AsPath;
use crate::config::metric_safe;
use crate::error::{Result, ViewError};
use crate::sig::PeerId;
use crate::store::ViewStores;
use crate::view::View;
use crate::{rt_debug, rt_info};

pub mod elem;
pub use elem::{BgpElem, ElemKind, FsmState, RecordStatus, RecordType};

pub mod peer;
pub use peer::{PeerCounters, PeerTables, PfxInfo, PfxStatus, UcWindow};

pub mod collector;
pub use collector::{CollectorCounters, CollectorState, CollectorTables};

/// Inactive per-pfx state untouched for this long is dropped at interval
/// boundaries.
pub const DEPRECATED_INFO_INTERVAL: u32 = 24 * 3600;

#[derive(Debug, Clone, Serialize)]
pub struct PeerReport {
    pub collector: String,
    pub peer_ip: IpAddr,
    pub peer_asn: u32,
    pub fsm_state: FsmState,
    pub announced_pfx_cnt: u64,
    pub withdrawn_pfx_cnt: u64,
    pub announcing_origin_cnt: u64,
    pub active_v4_pfx_cnt: u32,
    pub active_v6_pfx_cnt: u32,
    #[serde(flatten)]
    pub counters: PeerCounters,
}

impl PeerReport {
    /// Metric path component for this peer, graphite-safe.
    pub fn metric_key(&self) -> String {
        format!(
            "{}.{}.{}",
            metric_safe(&self.collector),
            metric_safe(&self.peer_ip.to_string()),
            self.peer_asn
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectorReport {
    pub name: String,
    pub state: CollectorState,
    pub peer_cnt: usize,
    pub active_peer_cnt: usize,
    #[serde(flatten)]
    pub counters: CollectorCounters,
}

/// Snapshot of the per-peer and per-collector statistics emitted at each
/// interval boundary.
#[derive(Debug, Clone, Serialize)]
pub struct IntervalReport {
    pub time: u32,
    pub collectors: Vec<CollectorReport>,
    pub peers: Vec<PeerReport>,
}

/// Per-collector/per-peer state machine producing a view from a BGP
/// element stream. The engine does not own the view: the caller injects
/// it into every call.
#[derive(Debug)]
pub struct RoutingTables {
    stores: Arc<ViewStores>,
    collectors: BTreeMap<String, CollectorTables>,
    peers: BTreeMap<PeerId, PeerTables>,
    interval_start_ts: Option<u32>,
    barrier: Option<u32>,
    cancelled: bool,
}

impl RoutingTables {
    pub fn new(stores: Arc<ViewStores>) -> Self {
        Self {
            stores,
            collectors: BTreeMap::new(),
            peers: BTreeMap::new(),
            interval_start_ts: None,
            barrier: None,
            cancelled: false,
        }
    }

    pub fn collector(&self, name: &str) -> Option<&CollectorTables> {
        self.collectors.get(name)
    }

    pub fn peer(&self, id: PeerId) -> Option<&PeerTables> {
        self.peers.get(&id)
    }

    /// Start of the interval currently being accumulated, if any.
    pub fn interval_start_ts(&self) -> Option<u32> {
        self.interval_start_ts
    }

    /// Begin a statistics interval: per-peer interval counters and sets
    /// start from zero.
    pub fn interval_start(&mut self, ts: u32) {
        self.interval_start_ts = Some(ts);
        for peer in self.peers.values_mut() {
            peer.interval_reset();
        }
    }

    /// Request cancellation. Takes effect at the next element boundary;
    /// all engine state is released.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.collectors.clear();
        self.peers.clear();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Apply one BGP element to the view. The engine never aborts on
    /// input: per-element failures either increment counters or are
    /// dropped; only resource exhaustion (`Capacity`) propagates.
    pub fn process(&mut self, view: &mut View, elem: &BgpElem) -> Result<()> {
        if self.cancelled {
            return Ok(());
        }
        if let Some(barrier) = self.barrier
            && elem.ts <= barrier
        {
            return Err(ViewError::OutOfOrder {
                ts: elem.ts,
                barrier,
            });
        }

        {
            let collector = self
                .collectors
                .entry(elem.collector.clone())
                .or_insert_with(|| CollectorTables::new(&elem.collector));
            match elem.record_status {
                RecordStatus::Corrupted => {
                    collector.counters.corrupted_record_cnt += 1;
                    return Ok(());
                }
                RecordStatus::Empty => {
                    collector.counters.empty_record_cnt += 1;
                    return Ok(());
                }
                RecordStatus::Valid => collector.counters.valid_record_cnt += 1,
            }
        }

        // Unknown collectors and peers auto-register.
        let peer_id = view.add_peer(&elem.collector, elem.peer_ip, elem.peer_asn)?;
        if let Some(collector) = self.collectors.get_mut(&elem.collector) {
            collector.peer_ids.insert(peer_id);
        }
        let peer = self
            .peers
            .entry(peer_id)
            .or_insert_with(|| PeerTables::new(peer_id));
        peer.last_ts = elem.ts;

        let stores = Arc::clone(&self.stores);
        match &elem.kind {
            ElemKind::RibEntry { pfx, as_path } => {
                handle_rib_entry(peer, &stores, *pfx, as_path, elem.ts);
                if let Some(collector) = self.collectors.get_mut(&elem.collector)
                    && let Some(uc) = self.peers.get(&peer_id).and_then(|p| p.uc)
                {
                    collector.uc_rib_start = uc.start;
                    collector.uc_rib_end = uc.end;
                }
            }
            ElemKind::Announce { pfx, as_path } => {
                handle_announce(peer, view, &stores, *pfx, as_path, elem.ts)?;
            }
            ElemKind::Withdraw { pfx } => {
                handle_withdraw(peer, view, *pfx, elem.ts)?;
            }
            ElemKind::State { new_state } => {
                let changed = handle_state(peer, view, *new_state, elem.ts)?;
                if changed
                    && let Some(collector) = self.collectors.get_mut(&elem.collector)
                {
                    collector.recompute_state(&self.peers);
                }
            }
        }
        Ok(())
    }

    /// End a statistics interval: a barrier on the element stream. Applies
    /// pending end-of-valid-RIB promotions when `eovrib` is set, emits the
    /// statistics snapshot and drops deprecated per-pfx state. The view is
    /// not reset: it carries the cumulative active routing state.
    pub fn interval_end(&mut self, view: &mut View, ts: u32, eovrib: bool) -> Result<IntervalReport> {
        if let Some(barrier) = self.barrier
            && ts <= barrier
        {
            return Err(ViewError::OutOfOrder { ts, barrier });
        }
        self.barrier = Some(ts);

        if eovrib {
            let pending: Vec<PeerId> = self
                .peers
                .iter()
                .filter(|(_, p)| p.uc.is_some())
                .map(|(id, _)| *id)
                .collect();
            for id in pending {
                self.promote(view, id, ts)?;
            }
        }

        let report = self.report(view, ts);
        for peer in self.peers.values_mut() {
            peer.metrics_generated = true;
        }

        // Drop per-pfx state that is inactive and untouched for a day.
        for (id, peer) in self.peers.iter_mut() {
            let view_ref = &*view;
            peer.pfxs.retain(|pfx, info| {
                if info.bgp_time_last as u64 + DEPRECATED_INFO_INTERVAL as u64 >= ts as u64 {
                    return true;
                }
                view_ref.pfx_peer(pfx, *id).is_some_and(|i| i.is_active())
            });
        }

        view.set_time(ts);
        Ok(report)
    }

    /// Promote a peer's UC RIB to its reference RIB. `end_ts` is the
    /// end-of-valid-RIB signal time and bounds the dump window.
    fn promote(&mut self, view: &mut View, id: PeerId, end_ts: u32) -> Result<()> {
        let (uc_start, uc_end) = {
            let Some(peer) = self.peers.get_mut(&id) else {
                return Ok(());
            };
            let Some(uc) = peer.uc.take() else {
                return Ok(());
            };
            let uc_end = uc.end.max(end_ts);

            let mut positive: u64 = 0;
            let mut negative: u64 = 0;
            for (pfx, info) in peer.pfxs.iter_mut() {
                if info.status.contains(PfxStatus::UC_ANNOUNCED) {
                    let uc_ts = uc.entry_time(info);
                    info.status.remove(PfxStatus::UC_ANNOUNCED);
                    let path = info.uc_path_id.take();
                    if info.bgp_time_last > uc_ts {
                        // A newer live update already decided this prefix.
                        continue;
                    }
                    let Some(path) = path else {
                        continue;
                    };
                    if !info.status.contains(PfxStatus::ANNOUNCED) {
                        // The dump carries a route live tracking did not.
                        negative += 1;
                    }
                    view.add_pfx_peer(*pfx, id, path)?;
                    view.activate_pfx_peer(pfx, id)?;
                    info.status.insert(PfxStatus::ANNOUNCED);
                    info.bgp_time_last = info.bgp_time_last.max(uc_ts);
                } else if info.status.contains(PfxStatus::ANNOUNCED)
                    && info.bgp_time_last < uc.start
                {
                    // Trusted before the dump but absent from it.
                    if view.pfx_peer(pfx, id).is_some_and(|i| i.is_active()) {
                        view.deactivate_pfx_peer(pfx, id)?;
                    }
                    info.status.remove(PfxStatus::ANNOUNCED);
                    positive += 1;
                }
            }
            peer.counters.positive_mismatch_cnt += positive;
            peer.counters.negative_mismatch_cnt += negative;
            peer.ref_rib_start = uc.start;
            peer.ref_rib_end = uc_end;
            // A full dump implies the session was up at dump time.
            if peer.fsm_state == FsmState::Unknown {
                peer.fsm_state = FsmState::Established;
            }
            rt_info!(
                "promoted rib for peer {}: window {}..{}",
                id,
                uc.start,
                uc_end
            );
            (uc.start, uc_end)
        };

        let collector_name = self
            .stores
            .sigs()
            .lookup(id)
            .ok()
            .map(|sig| sig.collector.clone());
        if let Some(name) = collector_name
            && let Some(collector) = self.collectors.get_mut(&name)
        {
            collector.ref_rib_start = uc_start;
            collector.ref_rib_end = uc_end;
            collector.uc_rib_start = 0;
            collector.uc_rib_end = 0;
            collector.recompute_state(&self.peers);
        }
        Ok(())
    }

    fn report(&self, view: &View, ts: u32) -> IntervalReport {
        let sigs = self.stores.sigs();
        let peers = self
            .peers
            .iter()
            .filter_map(|(id, p)| {
                let sig = sigs.lookup(*id).ok()?;
                let info = view.peer(*id);
                Some(PeerReport {
                    collector: sig.collector.clone(),
                    peer_ip: sig.peer_ip,
                    peer_asn: sig.peer_asn,
                    fsm_state: p.fsm_state,
                    announced_pfx_cnt: p.announced_pfxs.len() as u64,
                    withdrawn_pfx_cnt: p.withdrawn_pfxs.len() as u64,
                    announcing_origin_cnt: p.announcing_origins.len() as u64,
                    active_v4_pfx_cnt: info.map(|i| i.pfx_cnt_v4()).unwrap_or_default(),
                    active_v6_pfx_cnt: info.map(|i| i.pfx_cnt_v6()).unwrap_or_default(),
                    counters: p.counters.clone(),
                })
            })
            .collect();
        let collectors = self
            .collectors
            .values()
            .map(|c| CollectorReport {
                name: c.name.clone(),
                state: c.state,
                peer_cnt: c.peer_ids.len(),
                active_peer_cnt: c
                    .peer_ids
                    .iter()
                    .filter(|id| view.peer(**id).is_some_and(|p| p.is_active()))
                    .count(),
                counters: c.counters.clone(),
            })
            .collect();
        IntervalReport {
            time: ts,
            collectors,
            peers,
        }
    }
}

fn handle_rib_entry(peer: &mut PeerTables, stores: &ViewStores, pfx: IpNet, path: &AsPath, ts: u32) {
    peer.counters.rib_entry_cnt += 1;
    // First entry opens the UC RIB.
    let mut uc = peer.uc.unwrap_or(UcWindow { start: ts, end: ts });
    uc.end = uc.end.max(ts);
    peer.uc = Some(uc);

    let delta = ts.saturating_sub(uc.start).min(u16::MAX as u32) as u16;
    let path_id = stores.paths_mut().insert_path(path, true);
    let info = peer.pfxs.entry(pfx).or_default();
    info.uc_path_id = Some(path_id);
    info.status.insert(PfxStatus::UC_ANNOUNCED);
    info.bgp_time_uc_delta = delta;
    // Keep the newest live timestamp so promotion tie-breaking still sees
    // updates that overtook the dump.
    info.bgp_time_last = info.bgp_time_last.max(ts);
}

fn handle_announce(
    peer: &mut PeerTables,
    view: &mut View,
    stores: &ViewStores,
    pfx: IpNet,
    path: &AsPath,
    ts: u32,
) -> Result<()> {
    peer.counters.announce_cnt += 1;
    peer.announced_pfxs.insert(pfx);
    if let Some(origin) = path.origin_segment() {
        peer.announcing_origins.insert(origin);
    }
    if peer.fsm_state.is_down() {
        peer.counters.stale_cnt += 1;
        return Ok(());
    }
    // A live update from a never-seen peer implies an up session.
    if peer.fsm_state == FsmState::Unknown {
        peer.fsm_state = FsmState::Established;
    }

    if let Some(uc) = peer.uc
        && ts >= uc.start
    {
        // The update belongs to the UC timeline. Newer wins; ties go to
        // the RIB entry.
        let info = peer.pfxs.entry(pfx).or_default();
        if info.status.contains(PfxStatus::UC_ANNOUNCED) && uc.entry_time(info) >= ts {
            info.bgp_time_last = info.bgp_time_last.max(ts);
            return Ok(());
        }
        let path_id = stores.paths_mut().insert_path(path, false);
        info.uc_path_id = Some(path_id);
        info.status.insert(PfxStatus::UC_ANNOUNCED);
        info.bgp_time_uc_delta = ts.saturating_sub(uc.start).min(u16::MAX as u32) as u16;
        info.bgp_time_last = info.bgp_time_last.max(ts);
        return Ok(());
    }

    if ts < peer.ref_rib_start {
        // Positive-stale: behind the trusted epoch.
        peer.counters.stale_cnt += 1;
        return Ok(());
    }
    let info = peer.pfxs.entry(pfx).or_default();
    if ts < info.bgp_time_last {
        peer.counters.stale_cnt += 1;
        return Ok(());
    }
    let path_id = stores.paths_mut().insert_path(path, false);
    view.add_pfx_peer(pfx, peer.id, path_id)?;
    view.activate_pfx_peer(&pfx, peer.id)?;
    info.status.insert(PfxStatus::ANNOUNCED);
    info.bgp_time_last = ts;
    Ok(())
}

fn handle_withdraw(peer: &mut PeerTables, view: &mut View, pfx: IpNet, ts: u32) -> Result<()> {
    peer.counters.withdrawal_cnt += 1;
    peer.withdrawn_pfxs.insert(pfx);
    if peer.fsm_state.is_down() {
        peer.counters.stale_cnt += 1;
        return Ok(());
    }
    if peer.fsm_state == FsmState::Unknown {
        peer.fsm_state = FsmState::Established;
    }

    // A newer withdrawal clears an under-construction entry; ties favor
    // the UC entry.
    if let Some(uc) = peer.uc
        && ts >= uc.start
        && let Some(info) = peer.pfxs.get_mut(&pfx)
        && info.status.contains(PfxStatus::UC_ANNOUNCED)
        && ts > uc.entry_time(info)
    {
        info.status.remove(PfxStatus::UC_ANNOUNCED);
        info.uc_path_id = None;
        info.bgp_time_last = info.bgp_time_last.max(ts);
    }

    if ts >= peer.ref_rib_start
        && let Some(info) = peer.pfxs.get_mut(&pfx)
        && ts >= info.bgp_time_last
    {
        if info.status.contains(PfxStatus::ANNOUNCED) {
            info.status.remove(PfxStatus::ANNOUNCED);
            if view.pfx_peer(&pfx, peer.id).is_some_and(|i| i.is_active()) {
                view.deactivate_pfx_peer(&pfx, peer.id)?;
            }
        }
        info.bgp_time_last = ts;
    }
    Ok(())
}

fn handle_state(
    peer: &mut PeerTables,
    view: &mut View,
    new_state: FsmState,
    ts: u32,
) -> Result<bool> {
    peer.counters.state_messages_cnt += 1;
    let old = peer.fsm_state;
    if old == new_state {
        return Ok(false);
    }
    peer.fsm_state = new_state;
    rt_debug!("peer {} session {} -> {}", peer.id, old, new_state);

    if old.is_established() && !new_state.is_established() {
        // Session down: everything learned from it is no longer trusted.
        rt_info!("peer {} session down at {}", peer.id, ts);
        view.deactivate_peer(peer.id)?;
        peer.ref_rib_start = ts;
        peer.ref_rib_end = ts;
        peer.uc = None;
        for info in peer.pfxs.values_mut() {
            info.status = PfxStatus::empty();
            info.uc_path_id = None;
        }
    } else if !old.is_established() && new_state.is_established() {
        // Session up: wait for a RIB or live announces before activating.
        peer.counters = PeerCounters::default();
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const COLLECTOR: &str = "rrc00";

    fn peer_ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
    }

    fn pfx(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn path(s: &str) -> AsPath {
        s.parse().unwrap()
    }

    struct Rig {
        rt: RoutingTables,
        view: View,
    }

    impl Rig {
        fn new() -> Self {
            let stores = ViewStores::new();
            Self {
                rt: RoutingTables::new(Arc::clone(&stores)),
                view: View::new(stores),
            }
        }

        fn feed(&mut self, elem: BgpElem) {
            self.rt.process(&mut self.view, &elem).unwrap();
        }

        fn peer_id(&self) -> PeerId {
            self.view
                .stores()
                .sigs_mut()
                .intern(COLLECTOR, peer_ip(), 65001)
                .unwrap()
        }

        /// Scenario: a full RIB dump promoted at the interval end.
        fn promote_rib(&mut self) {
            self.rt.interval_start(1000);
            self.feed(BgpElem::rib_entry(
                1000,
                COLLECTOR,
                peer_ip(),
                65001,
                pfx("10.1.0.0/16"),
                path("65001"),
            ));
            self.feed(BgpElem::rib_entry(
                1000,
                COLLECTOR,
                peer_ip(),
                65001,
                pfx("10.2.0.0/16"),
                path("65001 65002"),
            ));
            self.rt.interval_end(&mut self.view, 1010, true).unwrap();
        }
    }

    #[test]
    fn rib_promotion() {
        let mut rig = Rig::new();
        rig.promote_rib();
        let id = rig.peer_id();

        for p in ["10.1.0.0/16", "10.2.0.0/16"] {
            assert!(rig.view.pfx_peer(&pfx(p), id).unwrap().is_active());
        }
        let peer = rig.rt.peer(id).unwrap();
        assert_eq!(peer.ref_rib_start, 1000);
        assert_eq!(peer.ref_rib_end, 1010);
        assert!(peer.uc.is_none());
        assert!(peer.fsm_state.is_established());
        assert_eq!(rig.view.peer(id).unwrap().pfx_cnt_v4(), 2);
        assert_eq!(rig.view.time(), 1010);
    }

    #[test]
    fn withdrawal_inside_ref_window() {
        let mut rig = Rig::new();
        rig.promote_rib();
        let id = rig.peer_id();

        rig.feed(BgpElem::withdraw(
            1020,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.1.0.0/16"),
        ));
        assert!(!rig.view.pfx_peer(&pfx("10.1.0.0/16"), id).unwrap().is_active());
        assert!(!rig.view.pfx(&pfx("10.1.0.0/16")).unwrap().is_active());
        // The peer stays active through the other prefix.
        assert!(rig.view.peer(id).unwrap().is_active());
        assert_eq!(rig.view.peer(id).unwrap().pfx_cnt_v4(), 1);
    }

    #[test]
    fn peer_state_down() {
        let mut rig = Rig::new();
        rig.promote_rib();
        rig.feed(BgpElem::withdraw(
            1020,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.1.0.0/16"),
        ));
        let id = rig.peer_id();

        rig.feed(BgpElem::state(
            1030,
            COLLECTOR,
            peer_ip(),
            65001,
            FsmState::Idle,
        ));
        assert!(!rig.view.peer(id).unwrap().is_active());
        for p in ["10.1.0.0/16", "10.2.0.0/16"] {
            assert!(!rig.view.pfx_peer(&pfx(p), id).unwrap().is_active());
        }
        let peer = rig.rt.peer(id).unwrap();
        assert_eq!(peer.ref_rib_start, 1030);
        assert_eq!(
            rig.rt.collector(COLLECTOR).unwrap().state,
            CollectorState::Down
        );
    }

    #[test]
    fn announce_outside_uc_applies_directly() {
        let mut rig = Rig::new();
        rig.promote_rib();
        let id = rig.peer_id();

        rig.feed(BgpElem::announce(
            1040,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.3.0.0/16"),
            path("65001 65003"),
        ));
        assert!(rig.view.pfx_peer(&pfx("10.3.0.0/16"), id).unwrap().is_active());
        // Live paths are interned as non-core variants.
        assert!(!rig.view.pfx_peer(&pfx("10.3.0.0/16"), id).unwrap().path_id().is_core);
    }

    #[test]
    fn stale_update_is_dropped() {
        let mut rig = Rig::new();
        rig.promote_rib();
        let id = rig.peer_id();

        // ref_rib_start is 1000; an update stamped before it is ignored.
        rig.rt
            .process(
                &mut rig.view,
                &BgpElem::announce(
                    1011,
                    COLLECTOR,
                    peer_ip(),
                    65001,
                    pfx("10.9.0.0/16"),
                    path("65001"),
                ),
            )
            .unwrap();
        // Accepted: 1011 >= ref start.
        assert!(rig.view.pfx_peer(&pfx("10.9.0.0/16"), id).is_some());

        let peer = rig.rt.peer(id).unwrap();
        let stale_before = peer.counters.stale_cnt;
        // Behind the barrier entirely: rejected as out of order.
        let err = rig
            .rt
            .process(
                &mut rig.view,
                &BgpElem::announce(
                    900,
                    COLLECTOR,
                    peer_ip(),
                    65001,
                    pfx("10.9.0.0/16"),
                    path("65001"),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, ViewError::OutOfOrder { .. }));
        assert_eq!(rig.rt.peer(id).unwrap().counters.stale_cnt, stale_before);
    }

    #[test]
    fn uc_entry_wins_ties_and_newer_updates_win() {
        let mut rig = Rig::new();
        rig.rt.interval_start(1000);
        rig.feed(BgpElem::rib_entry(
            1002,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.1.0.0/16"),
            path("65001"),
        ));
        // Same timestamp as the UC entry: the UC entry wins the tie.
        rig.feed(BgpElem::withdraw(
            1002,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.1.0.0/16"),
        ));
        rig.feed(BgpElem::rib_entry(
            1003,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.2.0.0/16"),
            path("65001 65002"),
        ));
        // Newer withdrawal beats the dumped route.
        rig.feed(BgpElem::withdraw(
            1005,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.2.0.0/16"),
        ));
        rig.rt.interval_end(&mut rig.view, 1010, true).unwrap();

        let id = rig.peer_id();
        assert!(rig.view.pfx_peer(&pfx("10.1.0.0/16"), id).unwrap().is_active());
        // 10.2.0.0/16: the withdrawal at 1005 is newer than the dump entry
        // at 1003, so the promotion never applies it.
        assert!(rig.view.pfx_peer(&pfx("10.2.0.0/16"), id).is_none());
        // 10.1.0.0/16 was promoted without prior live tracking.
        assert_eq!(rig.rt.peer(id).unwrap().counters.negative_mismatch_cnt, 1);
    }

    #[test]
    fn missing_from_dump_is_positive_mismatch() {
        let mut rig = Rig::new();
        rig.promote_rib();
        let id = rig.peer_id();

        // Second dump no longer contains 10.2.0.0/16.
        rig.rt.interval_start(2000);
        rig.feed(BgpElem::rib_entry(
            2000,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.1.0.0/16"),
            path("65001"),
        ));
        rig.rt.interval_end(&mut rig.view, 2010, true).unwrap();

        assert!(rig.view.pfx_peer(&pfx("10.1.0.0/16"), id).unwrap().is_active());
        assert!(!rig.view.pfx_peer(&pfx("10.2.0.0/16"), id).unwrap().is_active());
        assert_eq!(rig.rt.peer(id).unwrap().counters.positive_mismatch_cnt, 1);
    }

    #[test]
    fn corrupted_and_empty_records_are_counted() {
        let mut rig = Rig::new();
        rig.feed(
            BgpElem::announce(
                1000,
                COLLECTOR,
                peer_ip(),
                65001,
                pfx("10.1.0.0/16"),
                path("65001"),
            )
            .with_status(RecordStatus::Corrupted),
        );
        rig.feed(
            BgpElem::announce(
                1001,
                COLLECTOR,
                peer_ip(),
                65001,
                pfx("10.1.0.0/16"),
                path("65001"),
            )
            .with_status(RecordStatus::Empty),
        );
        let collector = rig.rt.collector(COLLECTOR).unwrap();
        assert_eq!(collector.counters.corrupted_record_cnt, 1);
        assert_eq!(collector.counters.empty_record_cnt, 1);
        assert_eq!(collector.counters.valid_record_cnt, 0);
        // Dropped records register neither peers nor routes.
        assert_eq!(rig.view.peer_cnt(), 0);
    }

    #[test]
    fn interval_report_contents() {
        let mut rig = Rig::new();
        rig.promote_rib();
        rig.rt.interval_start(2000);
        rig.feed(BgpElem::announce(
            2001,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.3.0.0/16"),
            path("65001 65003"),
        ));
        let report = rig.rt.interval_end(&mut rig.view, 2010, false).unwrap();

        assert_eq!(report.time, 2010);
        assert_eq!(report.collectors.len(), 1);
        assert_eq!(report.collectors[0].state, CollectorState::Up);
        assert_eq!(report.collectors[0].active_peer_cnt, 1);
        assert_eq!(report.peers.len(), 1);
        let peer = &report.peers[0];
        assert_eq!(peer.announced_pfx_cnt, 1);
        assert_eq!(peer.announcing_origin_cnt, 1);
        assert_eq!(peer.active_v4_pfx_cnt, 3);
        assert_eq!(peer.metric_key(), "rrc00.10_0_0_1.65001");
    }

    #[test]
    fn deprecated_pfx_state_is_dropped() {
        let mut rig = Rig::new();
        rig.promote_rib();
        let id = rig.peer_id();
        rig.feed(BgpElem::withdraw(
            1020,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.1.0.0/16"),
        ));

        let later = 1020 + DEPRECATED_INFO_INTERVAL + 10;
        rig.rt.interval_end(&mut rig.view, later, false).unwrap();
        let peer = rig.rt.peer(id).unwrap();
        // The withdrawn prefix state aged out; the active one survives.
        assert!(!peer.pfxs.contains_key(&pfx("10.1.0.0/16")));
        assert!(peer.pfxs.contains_key(&pfx("10.2.0.0/16")));
    }

    #[test]
    fn interval_end_is_a_barrier() {
        let mut rig = Rig::new();
        rig.promote_rib();
        let err = rig
            .rt
            .interval_end(&mut rig.view, 1010, false)
            .unwrap_err();
        assert!(matches!(err, ViewError::OutOfOrder { .. }));
    }

    #[test]
    fn cancel_releases_state() {
        let mut rig = Rig::new();
        rig.promote_rib();
        rig.rt.cancel();
        assert!(rig.rt.is_cancelled());
        assert!(rig.rt.peer(rig.peer_id()).is_none());
        // Further elements are ignored without error.
        rig.feed(BgpElem::withdraw(
            5000,
            COLLECTOR,
            peer_ip(),
            65001,
            pfx("10.1.0.0/16"),
        ));
    }
}

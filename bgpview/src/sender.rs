//! Publication cadence for view consumers: full sync frames on a fixed
//! interval, parent-relative diff frames in between.

use bytes::BytesMut;
use ipnet::IpNet;
use serde::Serialize;

use crate::config::SenderConfig;
use crate::error::Result;
use crate::sig::PeerId;
use crate::view::codec::{ActiveFields, ViewFilter, encode_view};
use crate::view::diff::{DiffStats, encode_diff};
use crate::view::{PfxPeerInfo, View};

/// Keeps active full-feed peers: peers whose active prefix count reaches
/// the configured floor in either address family.
pub struct FullFeedFilter {
    pub v4_min: u32,
    pub v6_min: u32,
}

impl FullFeedFilter {
    pub fn from_config(cfg: &SenderConfig) -> Self {
        Self {
            v4_min: cfg.filter_ff_v4_min,
            v6_min: cfg.filter_ff_v6_min,
        }
    }
}

impl ViewFilter for FullFeedFilter {
    fn keep_peer(&self, view: &View, id: PeerId) -> bool {
        view.peer(id).is_some_and(|p| {
            p.is_active() && (p.pfx_cnt_v4() >= self.v4_min || p.pfx_cnt_v6() >= self.v6_min)
        })
    }

    fn keep_pfx(&self, view: &View, pfx: &IpNet) -> bool {
        view.pfx(pfx).is_some_and(|e| e.is_active())
    }

    fn keep_pfx_peer(&self, _view: &View, _pfx: &IpNet, _id: PeerId, info: &PfxPeerInfo) -> bool {
        info.is_active()
    }
}

/// Metadata companion of each published frame.
#[derive(Debug, Clone, Serialize)]
pub struct MetaFrame {
    pub time: u32,
    pub kind: &'static str,
    pub parent_time: Option<u32>,
}

pub enum Publication {
    Sync {
        frame: BytesMut,
        meta: MetaFrame,
    },
    Diff {
        frame: BytesMut,
        meta: MetaFrame,
        stats: DiffStats,
    },
    /// Out-of-step with the sync cadence and no parent yet.
    Skipped,
}

/// Decides, per published view, between a sync frame, a diff frame and no
/// publication. Diffs only flow once a sync has aligned the stream.
pub struct ViewSender {
    cfg: SenderConfig,
    filter: FullFeedFilter,
    parent: Option<View>,
    stats: DiffStats,
}

impl ViewSender {
    pub fn new(cfg: SenderConfig) -> Self {
        let filter = FullFeedFilter::from_config(&cfg);
        Self {
            cfg,
            filter,
            parent: None,
            stats: DiffStats::default(),
        }
    }

    /// Statistics of the last emitted frame.
    pub fn last_stats(&self) -> &DiffStats {
        &self.stats
    }

    /// Project the full-feed filter into a standalone view, so successive
    /// publications diff against exactly what was sent.
    fn project(&self, view: &View) -> Result<View> {
        let mut out = view.dup();
        let dropped: Vec<PeerId> = out
            .peers()
            .filter(|(id, _)| !self.filter.keep_peer(view, *id))
            .map(|(id, _)| id)
            .collect();
        for id in dropped {
            out.remove_peer(id)?;
        }
        Ok(out)
    }

    pub fn publish(&mut self, view: &View) -> Result<Publication> {
        let interval = self.cfg.sync_interval.max(1);
        let projected = self.project(view)?;

        if view.time() % interval == 0 {
            let frame = encode_view(&projected, &ActiveFields)?;
            let meta = MetaFrame {
                time: view.time(),
                kind: "sync",
                parent_time: None,
            };
            let active = projected.pfxs().filter(|(_, e)| e.is_active()).count() as u32;
            self.stats = DiffStats {
                sync_pfx_cnt: active,
                pfx_cnt: active,
                ..Default::default()
            };
            self.parent = Some(projected);
            return Ok(Publication::Sync { frame, meta });
        }

        let Some(parent) = &self.parent else {
            return Ok(Publication::Skipped);
        };
        let (frame, stats) = encode_diff(parent, &projected)?;
        let meta = MetaFrame {
            time: view.time(),
            kind: "diff",
            parent_time: Some(parent.time()),
        };
        self.stats = stats.clone();
        self.parent = Some(projected);
        Ok(Publication::Diff { frame, meta, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ViewStores;
    use crate::view::read_frame;
    use std::net::{IpAddr, Ipv4Addr};

    fn small_feed_config() -> SenderConfig {
        SenderConfig {
            filter_ff_v4_min: 1,
            filter_ff_v6_min: 1,
            ..Default::default()
        }
    }

    fn seeded_view() -> View {
        let mut view = View::new(ViewStores::new());
        view.set_time(3600);
        let peer = view
            .add_peer("rrc00", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 65001)
            .unwrap();
        let pid = view
            .stores()
            .paths_mut()
            .insert_path(&"65001".parse().unwrap(), true);
        for p in ["10.1.0.0/16", "10.2.0.0/16"] {
            let pfx = p.parse().unwrap();
            view.add_pfx_peer(pfx, peer, pid).unwrap();
            view.activate_pfx_peer(&pfx, peer).unwrap();
        }
        view
    }

    #[test]
    fn out_of_step_startup_skips() {
        let mut sender = ViewSender::new(small_feed_config());
        let mut view = seeded_view();
        view.set_time(3605);
        assert!(matches!(
            sender.publish(&view).unwrap(),
            Publication::Skipped
        ));
        // Alignment reached: sync, then diffs flow.
        view.set_time(7200);
        assert!(matches!(sender.publish(&view).unwrap(), Publication::Sync { .. }));
        view.set_time(7205);
        assert!(matches!(sender.publish(&view).unwrap(), Publication::Diff { .. }));
    }

    #[test]
    fn sync_then_diff_round_trip() {
        let mut sender = ViewSender::new(small_feed_config());
        let view = seeded_view();
        let Publication::Sync { frame: sync, .. } = sender.publish(&view).unwrap() else {
            panic!("expected sync at aligned time");
        };
        assert_eq!(sender.last_stats().sync_pfx_cnt, 2);

        let mut mutated = view.dup();
        mutated.set_time(3605);
        let pfx = "10.1.0.0/16".parse().unwrap();
        let peer = PeerId(1);
        mutated.deactivate_pfx_peer(&pfx, peer).unwrap();
        let Publication::Diff { frame: diff, meta, stats } = sender.publish(&mutated).unwrap()
        else {
            panic!("expected diff between syncs");
        };
        assert_eq!(meta.parent_time, Some(3600));
        assert_eq!(stats.removed_pfxs_cnt, 1);

        // A receiver following the stream reproduces the mutated view.
        let mut receiver = View::new(std::sync::Arc::clone(view.stores()));
        let mut stream = sync.to_vec();
        stream.extend_from_slice(&diff);
        let mut r = stream.as_slice();
        read_frame(&mut r, &mut receiver).unwrap().unwrap();
        read_frame(&mut r, &mut receiver).unwrap().unwrap();
        assert_eq!(receiver.time(), 3605);
        assert!(!receiver
            .pfx(&pfx)
            .map(|e| e.is_active())
            .unwrap_or_default());
    }

    #[test]
    fn below_threshold_peers_are_not_published() {
        let cfg = SenderConfig {
            filter_ff_v4_min: 10,
            filter_ff_v6_min: 10,
            ..Default::default()
        };
        let mut sender = ViewSender::new(cfg);
        let view = seeded_view();
        let Publication::Sync { frame, .. } = sender.publish(&view).unwrap() else {
            panic!("expected sync");
        };
        let decoded = crate::view::read_view(&mut frame.as_ref(), view.stores())
            .unwrap()
            .unwrap();
        assert_eq!(decoded.peer_cnt(), 0);
        assert_eq!(decoded.pfx_cnt(), 0);
    }
}

//! Transport shim: the contract between the view sender and a pub/sub
//! backend, plus the background publisher worker.
//!
//! One worker runs per (identity, topic-group). It owns the sink and the
//! publication state; the main task hands it detached view snapshots
//! through a single-slot mailbox protected by a mutex and condvar and
//! must not touch a snapshot after handover.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::metric_safe;
use crate::error::{Result, ViewError};
use crate::sender::{MetaFrame, Publication, ViewSender};
use crate::view::View;
use crate::{io_info, io_warn};

/// Frame-oriented pub/sub sink. Implementations exist per `io_module`
/// (Kafka, ZeroMQ); tests use in-memory recorders.
pub trait FrameSink: Send {
    fn connect(&mut self) -> Result<()>;
    fn send(&mut self, topic: &str, frame: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Topic namespace of one sender identity:
/// `{namespace}.{identity}.{pfxs|peers|meta}`, plus the shared
/// `{namespace}.members` and `{namespace}.globalmeta[.channel]` topics.
#[derive(Debug, Clone)]
pub struct TopicSet {
    namespace: String,
    identity: String,
}

impl TopicSet {
    pub fn new(namespace: &str, identity: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            identity: metric_safe(identity),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn pfxs(&self) -> String {
        format!("{}.{}.pfxs", self.namespace, self.identity)
    }

    pub fn peers(&self) -> String {
        format!("{}.{}.peers", self.namespace, self.identity)
    }

    pub fn meta(&self) -> String {
        format!("{}.{}.meta", self.namespace, self.identity)
    }

    pub fn members(&self) -> String {
        format!("{}.members", self.namespace)
    }

    pub fn global_meta(&self, channel: Option<&str>) -> String {
        match channel {
            Some(channel) => format!("{}.globalmeta.{}", self.namespace, channel),
            None => format!("{}.globalmeta", self.namespace),
        }
    }
}

pub const RECONNECT_MIN_WAIT: Duration = Duration::from_secs(10);
pub const RECONNECT_MAX_WAIT: Duration = Duration::from_secs(180);
pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;
pub const SHUTDOWN_DRAIN_ITERATIONS: u32 = 12;
pub const SHUTDOWN_DRAIN_WAIT: Duration = Duration::from_secs(5);

/// Exponential reconnect backoff, 10 s doubling to a 180 s cap.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = RECONNECT_MIN_WAIT
        .as_secs()
        .saturating_mul(1u64 << attempt.min(16));
    Duration::from_secs(secs.min(RECONNECT_MAX_WAIT.as_secs()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Shutdown,
}

struct Shared {
    state: WorkerState,
    job: Option<View>,
}

/// Background publisher worker. Snapshots submitted from the main task
/// are published on the worker thread; shutdown drains the outbound
/// queue up to a bounded time.
pub struct SenderWorker {
    shared: Arc<(Mutex<Shared>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl SenderWorker {
    pub fn spawn(sink: Box<dyn FrameSink>, topics: TopicSet, sender: ViewSender) -> SenderWorker {
        let shared = Arc::new((
            Mutex::new(Shared {
                state: WorkerState::Idle,
                job: None,
            }),
            Condvar::new(),
        ));
        let worker_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || worker_run(worker_shared, sink, topics, sender));
        SenderWorker {
            shared,
            handle: Some(handle),
        }
    }

    /// Hand a detached snapshot to the worker, blocking while the
    /// previous one is still queued. Ownership passes to the worker.
    pub fn submit(&self, snapshot: View) -> Result<()> {
        let (lock, cvar) = &*self.shared;
        let mut shared = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while shared.job.is_some() && shared.state != WorkerState::Shutdown {
            shared = cvar.wait(shared).unwrap_or_else(PoisonError::into_inner);
        }
        if shared.state == WorkerState::Shutdown {
            return Err(ViewError::Transport("worker is shut down".into()));
        }
        shared.job = Some(snapshot);
        cvar.notify_all();
        Ok(())
    }

    /// Request shutdown and wait for the worker to drain and exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        {
            let (lock, cvar) = &*self.shared;
            let mut shared = lock.lock().unwrap_or_else(PoisonError::into_inner);
            shared.state = WorkerState::Shutdown;
            cvar.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_run(
    shared: Arc<(Mutex<Shared>, Condvar)>,
    mut sink: Box<dyn FrameSink>,
    topics: TopicSet,
    mut sender: ViewSender,
) {
    if let Err(e) = sink.connect() {
        io_warn!("initial connect failed: {e}");
    }
    let _ = sink.send(&topics.members(), topics.identity().as_bytes());
    io_info!("publisher worker up for {}", topics.identity());

    loop {
        let job = {
            let (lock, cvar) = &*shared;
            let mut s = lock.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                if let Some(job) = s.job.take() {
                    if s.state != WorkerState::Shutdown {
                        s.state = WorkerState::Running;
                    }
                    cvar.notify_all();
                    break Some(job);
                }
                if s.state == WorkerState::Shutdown {
                    break None;
                }
                s = cvar.wait(s).unwrap_or_else(PoisonError::into_inner);
            }
        };
        // Shutdown with no pending job: drain and exit.
        let Some(view) = job else { break };
        if let Err(e) = publish_view(&mut *sink, &topics, &mut sender, &view) {
            io_warn!("publication at {} dropped: {e}", view.time());
        }
        {
            let (lock, cvar) = &*shared;
            let mut s = lock.lock().unwrap_or_else(PoisonError::into_inner);
            if s.state != WorkerState::Shutdown {
                s.state = WorkerState::Idle;
            }
            cvar.notify_all();
        }
    }

    for _ in 0..SHUTDOWN_DRAIN_ITERATIONS {
        match sink.flush() {
            Ok(()) => break,
            Err(_) => thread::sleep(SHUTDOWN_DRAIN_WAIT),
        }
    }
}

fn publish_view(
    sink: &mut dyn FrameSink,
    topics: &TopicSet,
    sender: &mut ViewSender,
    view: &View,
) -> Result<()> {
    match sender.publish(view)? {
        Publication::Sync { frame, meta } => publish_frames(sink, topics, &frame, &meta),
        Publication::Diff { frame, meta, .. } => publish_frames(sink, topics, &frame, &meta),
        Publication::Skipped => Ok(()),
    }
}

fn publish_frames(
    sink: &mut dyn FrameSink,
    topics: &TopicSet,
    frame: &[u8],
    meta: &MetaFrame,
) -> Result<()> {
    send_with_backoff(sink, &topics.pfxs(), frame)?;
    let meta_bytes = serde_json::to_vec(meta)
        .map_err(|e| ViewError::Transport(format!("meta frame encoding: {e}")))?;
    send_with_backoff(sink, &topics.meta(), &meta_bytes)
}

/// Send one frame, reconnecting with exponential backoff on transport
/// errors. After the last attempt the frame is given up; state is
/// preserved for the next one.
fn send_with_backoff(sink: &mut dyn FrameSink, topic: &str, frame: &[u8]) -> Result<()> {
    if sink.send(topic, frame).is_ok() {
        return Ok(());
    }
    for attempt in 0..RECONNECT_MAX_ATTEMPTS {
        thread::sleep(backoff_delay(attempt));
        if sink.connect().is_err() {
            continue;
        }
        if sink.send(topic, frame).is_ok() {
            return Ok(());
        }
    }
    io_warn!("giving up on frame for {topic} after {RECONNECT_MAX_ATTEMPTS} reconnect attempts");
    Err(ViewError::Transport(format!("send to {topic} failed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SenderConfig;
    use crate::store::ViewStores;
    use std::net::{IpAddr, Ipv4Addr};

    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    impl FrameSink for RecordingSink {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn send(&mut self, topic: &str, frame: &[u8]) -> Result<()> {
            self.frames
                .lock()
                .unwrap()
                .push((topic.to_string(), frame.to_vec()));
            Ok(())
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
        let pfx = "10.1.0.0/16".parse().unwrap();
        view.add_pfx_peer(pfx, peer, pid).unwrap();
        view.activate_pfx_peer(&pfx, peer).unwrap();
        view
    }

    #[test]
    fn topic_namespace() {
        let topics = TopicSet::new("bgpview", "prod.sender*1");
        assert_eq!(topics.identity(), "prod_sender-1");
        assert_eq!(topics.pfxs(), "bgpview.prod_sender-1.pfxs");
        assert_eq!(topics.peers(), "bgpview.prod_sender-1.peers");
        assert_eq!(topics.meta(), "bgpview.prod_sender-1.meta");
        assert_eq!(topics.members(), "bgpview.members");
        assert_eq!(topics.global_meta(None), "bgpview.globalmeta");
        assert_eq!(topics.global_meta(Some("c1")), "bgpview.globalmeta.c1");
    }

    #[test]
    fn backoff_schedule() {
        assert_eq!(backoff_delay(0), Duration::from_secs(10));
        assert_eq!(backoff_delay(1), Duration::from_secs(20));
        assert_eq!(backoff_delay(2), Duration::from_secs(40));
        assert_eq!(backoff_delay(4), Duration::from_secs(160));
        // Capped thereafter.
        assert_eq!(backoff_delay(5), Duration::from_secs(180));
        assert_eq!(backoff_delay(30), Duration::from_secs(180));
    }

    #[test]
    fn worker_publishes_handed_snapshots() {
        let sink = RecordingSink::default();
        let frames = Arc::clone(&sink.frames);
        let cfg = SenderConfig {
            filter_ff_v4_min: 1,
            filter_ff_v6_min: 1,
            ..Default::default()
        };
        let topics = TopicSet::new("bgpview", "test");
        let worker = SenderWorker::spawn(Box::new(sink), topics, ViewSender::new(cfg));

        let view = seeded_view();
        worker.submit(view.dup()).unwrap();
        let mut later = view.dup();
        later.set_time(3605);
        worker.submit(later).unwrap();
        worker.shutdown();

        let frames = frames.lock().unwrap();
        let topics_seen: Vec<&str> = frames.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(
            topics_seen,
            vec![
                "bgpview.members",
                "bgpview.test.pfxs",
                "bgpview.test.meta",
                "bgpview.test.pfxs",
                "bgpview.test.meta",
            ]
        );
        // The second meta frame describes a diff against the sync.
        let meta: serde_json::Value = serde_json::from_slice(&frames[4].1).unwrap();
        assert_eq!(meta["kind"], "diff");
        assert_eq!(meta["parent_time"], 3600);
    }
}

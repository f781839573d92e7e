//! Live/historical BGP data analysis: a shared, time-indexed view of the
//! global routing table as observed by many collectors and their peers,
//! the state engine producing it from BGP element streams, and the binary
//! sync/diff codecs feeding archives and pub/sub transports.

pub mod error;
pub use error::{Result, ViewError};

pub mod logging;

pub mod aspath;
pub use aspath::{AsPath, AsSegment, SegmentKind};

pub mod sig;
pub use sig::{PeerId, PeerSignature, PeerSignatureStore};

pub mod store;
pub use store::{AsPathStore, PathId, StorePath, ViewStores};

pub mod view;
pub use view::*;

pub mod rt;
pub use rt::{
    BgpElem, ElemKind, FsmState, IntervalReport, RecordStatus, RecordType, RoutingTables,
};

pub mod config;
pub use config::{ArchiverConfig, IoModule, OutputFormat, SenderConfig, metric_safe};

pub mod sender;
pub use sender::{FullFeedFilter, MetaFrame, Publication, ViewSender};

pub mod transport;
pub use transport::{FrameSink, SenderWorker, TopicSet};

pub mod archive;
pub use archive::{Archiver, PlainFiles, WriterFactory};

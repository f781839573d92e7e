//! Magic-framed binary serialization of full views.
//!
//! A view is framed by 64-bit markers `VIEW_MAGIC || sub_magic`. All frame
//! integers are big-endian; AS-path bytes are the canonical big-endian path
//! encoding, so files are portable across architectures.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use ipnet::IpNet;

use crate::aspath::AsPath;
use crate::error::{Result, ViewError};
use crate::sig::PeerId;
use crate::store::{PathId, ViewStores};
use crate::view::{PfxPeerInfo, View};

pub const VIEW_MAGIC: u32 = 0x4247_5056; // "BGPV"
pub const START_MAGIC: u32 = 0x5354_5254; // "STRT"
pub const PEER_END_MAGIC: u32 = 0x5045_4E44; // "PEND"
pub const PATH_END_MAGIC: u32 = 0x5041_5448; // "PATH"
pub const PFX_END_MAGIC: u32 = 0x5845_4E44; // "XEND"
pub const VIEW_END_MAGIC: u32 = 0x5645_4E44; // "VEND"
pub const DIFF_MAGIC: u32 = 0x4449_4646; // "DIFF"

/// Caller-supplied filter consulted at three granularities. Skipping a
/// peer also skips all of its pfx-peers; a prefix whose edges are all
/// filtered out is not emitted.
pub trait ViewFilter {
    fn keep_peer(&self, _view: &View, _id: PeerId) -> bool {
        true
    }

    fn keep_pfx(&self, _view: &View, _pfx: &IpNet) -> bool {
        true
    }

    fn keep_pfx_peer(&self, _view: &View, _pfx: &IpNet, _id: PeerId, _info: &PfxPeerInfo) -> bool {
        true
    }
}

/// Keeps everything.
pub struct AllFields;

impl ViewFilter for AllFields {}

/// Keeps only active peers, prefixes and pfx-peers.
pub struct ActiveFields;

impl ViewFilter for ActiveFields {
    fn keep_peer(&self, view: &View, id: PeerId) -> bool {
        view.peer(id).is_some_and(|p| p.is_active())
    }

    fn keep_pfx(&self, view: &View, pfx: &IpNet) -> bool {
        view.pfx(pfx).is_some_and(|e| e.is_active())
    }

    fn keep_pfx_peer(&self, _view: &View, _pfx: &IpNet, _id: PeerId, info: &PfxPeerInfo) -> bool {
        info.is_active()
    }
}

pub(crate) fn put_magic(buf: &mut BytesMut, sub: u32) {
    buf.put_u32(VIEW_MAGIC);
    buf.put_u32(sub);
}

fn put_ip(buf: &mut BytesMut, ip: IpAddr) {
    match ip {
        IpAddr::V4(v4) => {
            buf.put_u8(4);
            buf.put_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            buf.put_u8(16);
            buf.put_slice(&v6.octets());
        }
    }
}

pub(crate) fn put_pfx(buf: &mut BytesMut, pfx: &IpNet) {
    put_ip(buf, pfx.addr());
    buf.put_u8(pfx.prefix_len());
}

/// Emit the peer section and return the set of peers that survived the
/// filter.
pub(crate) fn encode_peer_section(
    view: &View,
    filter: &dyn ViewFilter,
    buf: &mut BytesMut,
) -> Result<HashSet<PeerId>> {
    let mut kept = HashSet::new();
    let sigs = view.stores().sigs();
    for (id, _) in view.peers() {
        if !filter.keep_peer(view, id) {
            continue;
        }
        let sig = sigs.lookup(id)?;
        buf.put_u16(id.0);
        buf.put_u8(sig.collector.len() as u8);
        buf.put_slice(sig.collector.as_bytes());
        put_ip(buf, sig.peer_ip);
        buf.put_u32(sig.peer_asn);
        kept.insert(id);
    }
    put_magic(buf, PEER_END_MAGIC);
    buf.put_u16(kept.len() as u16);
    Ok(kept)
}

/// Emit the path section: every path in the shared store, under a
/// contiguous wire index space. Returns the store-id to wire-index map
/// used by the prefix sections.
pub(crate) fn encode_path_section(view: &View, buf: &mut BytesMut) -> HashMap<PathId, u32> {
    let mut wire = HashMap::new();
    let paths = view.stores().paths();
    for (id, path) in paths.iter_paths() {
        let idx = wire.len() as u32;
        buf.put_u32(idx);
        buf.put_u8(path.is_core() as u8);
        buf.put_u16(path.encoding().len() as u16);
        buf.put_slice(path.encoding());
        wire.insert(id, idx);
    }
    put_magic(buf, PATH_END_MAGIC);
    buf.put_u32(wire.len() as u32);
    wire
}

pub(crate) fn wire_idx(map: &HashMap<PathId, u32>, id: PathId) -> Result<u32> {
    map.get(&id)
        .copied()
        .ok_or_else(|| ViewError::Internal("pfx-peer path missing from store".into()))
}

/// Serialize a view into a framed byte buffer.
pub fn encode_view(view: &View, filter: &dyn ViewFilter) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    put_magic(&mut buf, START_MAGIC);
    buf.put_u32(view.time());

    let kept = encode_peer_section(view, filter, &mut buf)?;
    let path_wire = encode_path_section(view, &mut buf);

    let mut pfx_sent: u32 = 0;
    for (pfx, entry) in view.pfxs() {
        if !filter.keep_pfx(view, pfx) {
            continue;
        }
        let edges: Vec<(PeerId, &PfxPeerInfo)> = entry
            .peers()
            .filter(|(id, info)| kept.contains(id) && filter.keep_pfx_peer(view, pfx, *id, info))
            .collect();
        if edges.is_empty() {
            continue;
        }
        put_pfx(&mut buf, pfx);
        let mut edge_sent: u16 = 0;
        for (id, info) in edges {
            buf.put_u16(id.0);
            buf.put_u32(wire_idx(&path_wire, info.path_id())?);
            edge_sent += 1;
        }
        put_magic(&mut buf, PEER_END_MAGIC);
        buf.put_u16(edge_sent);
        pfx_sent += 1;
    }
    put_magic(&mut buf, PFX_END_MAGIC);
    buf.put_u32(pfx_sent);
    put_magic(&mut buf, VIEW_END_MAGIC);
    Ok(buf)
}

/// Serialize a view to a writer.
pub fn write_view<W: Write>(view: &View, filter: &dyn ViewFilter, w: &mut W) -> Result<()> {
    let buf = encode_view(view, filter)?;
    w.write_all(&buf)?;
    Ok(())
}

/// Reader with an 8-byte lookahead, so section terminator magics can be
/// told apart from record heads.
pub(crate) struct FrameReader<R> {
    inner: R,
    pending: Vec<u8>,
    off: usize,
}

impl<R: Read> FrameReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            off: 0,
        }
    }

    /// Peek the next 8 bytes without consuming them. `None` means a clean
    /// end of stream exactly at this position.
    pub(crate) fn peek8(&mut self) -> Result<Option<[u8; 8]>> {
        let have = self.pending.len() - self.off;
        if have >= 8 {
            let mut out = [0u8; 8];
            out.copy_from_slice(&self.pending[self.off..self.off + 8]);
            return Ok(Some(out));
        }
        let mut tmp = [0u8; 8];
        tmp[..have].copy_from_slice(&self.pending[self.off..]);
        let mut n = have;
        while n < 8 {
            let got = self.inner.read(&mut tmp[n..]).map_err(ViewError::Io)?;
            if got == 0 {
                break;
            }
            n += got;
        }
        if n == 0 {
            self.pending.clear();
            self.off = 0;
            return Ok(None);
        }
        if n < 8 {
            return Err(ViewError::CorruptStream("truncated frame marker".into()));
        }
        self.pending = tmp.to_vec();
        self.off = 0;
        Ok(Some(tmp))
    }

    /// Consume the 8-byte magic `VIEW_MAGIC || sub` if it is next.
    pub(crate) fn try_magic(&mut self, sub: u32) -> Result<bool> {
        let Some(b) = self.peek8()? else {
            return Err(ViewError::CorruptStream("unexpected end of stream".into()));
        };
        let head = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let tail = u32::from_be_bytes([b[4], b[5], b[6], b[7]]);
        if head == VIEW_MAGIC && tail == sub {
            self.off += 8;
            if self.off >= self.pending.len() {
                self.pending.clear();
                self.off = 0;
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn expect_magic(&mut self, sub: u32, what: &str) -> Result<()> {
        if self.try_magic(sub)? {
            Ok(())
        } else {
            Err(ViewError::CorruptStream(format!("missing {what} marker")))
        }
    }

    fn fill_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut n = 0;
        while n < buf.len() && self.off < self.pending.len() {
            buf[n] = self.pending[self.off];
            n += 1;
            self.off += 1;
        }
        if self.off >= self.pending.len() {
            self.pending.clear();
            self.off = 0;
        }
        if n < buf.len() {
            self.inner.read_exact(&mut buf[n..]).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    ViewError::CorruptStream("truncated record".into())
                } else {
                    ViewError::Io(e)
                }
            })?;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.fill_exact(&mut b)?;
        Ok(b[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.fill_exact(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.fill_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill_exact(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn read_ip(&mut self) -> Result<IpAddr> {
        match self.read_u8()? {
            4 => {
                let mut b = [0u8; 4];
                self.fill_exact(&mut b)?;
                Ok(IpAddr::V4(Ipv4Addr::from(b)))
            }
            16 => {
                let mut b = [0u8; 16];
                self.fill_exact(&mut b)?;
                Ok(IpAddr::V6(Ipv6Addr::from(b)))
            }
            n => Err(ViewError::InvalidFormat(format!("unknown ip length {n}"))),
        }
    }

    pub(crate) fn read_pfx(&mut self) -> Result<IpNet> {
        let ip = self.read_ip()?;
        let mask = self.read_u8()?;
        IpNet::new(ip, mask)
            .map_err(|_| ViewError::InvalidFormat(format!("invalid prefix length {mask}")))
    }
}

/// Read the peer section into a fresh (inactive) peer set, returning the
/// remote-to-local id translation table.
pub(crate) fn decode_peer_section<R: Read>(
    fr: &mut FrameReader<R>,
    view: &mut View,
) -> Result<HashMap<u16, PeerId>> {
    let mut map = HashMap::new();
    let mut seen: u32 = 0;
    loop {
        if fr.try_magic(PEER_END_MAGIC)? {
            let sent = fr.read_u16()?;
            if sent as u32 != seen {
                return Err(ViewError::CorruptStream(format!(
                    "peer count mismatch: sent {sent}, read {seen}"
                )));
            }
            return Ok(map);
        }
        let remote = fr.read_u16()?;
        let clen = fr.read_u8()? as usize;
        let collector = String::from_utf8(fr.read_bytes(clen)?)
            .map_err(|_| ViewError::InvalidFormat("collector name is not utf-8".into()))?;
        let ip = fr.read_ip()?;
        let asn = fr.read_u32()?;
        let local = view.add_peer(&collector, ip, asn)?;
        map.insert(remote, local);
        seen += 1;
    }
}

/// Read the path section into the shared store, returning the wire-index
/// to local path-id translation table.
pub(crate) fn decode_path_section<R: Read>(
    fr: &mut FrameReader<R>,
    stores: &Arc<ViewStores>,
) -> Result<HashMap<u32, PathId>> {
    let mut map = HashMap::new();
    let mut seen: u32 = 0;
    loop {
        if fr.try_magic(PATH_END_MAGIC)? {
            let sent = fr.read_u32()?;
            if sent != seen {
                return Err(ViewError::CorruptStream(format!(
                    "path count mismatch: sent {sent}, read {seen}"
                )));
            }
            return Ok(map);
        }
        let idx = fr.read_u32()?;
        let is_core = match fr.read_u8()? {
            0 => false,
            1 => true,
            b => {
                return Err(ViewError::InvalidFormat(format!(
                    "unknown path arena tag {b}"
                )));
            }
        };
        let len = fr.read_u16()? as usize;
        let data = fr.read_bytes(len)?;
        AsPath::decode(&data)?;
        map.insert(idx, stores.paths_mut().insert(&data, is_core));
        seen += 1;
    }
}

pub(crate) fn decode_body<R: Read>(fr: &mut FrameReader<R>, stores: &Arc<ViewStores>) -> Result<View> {
    let time = fr.read_u32()?;
    // Decode into a scratch view; the caller only sees it on success.
    let mut view = View::new(Arc::clone(stores));
    view.set_time(time);

    let peer_map = decode_peer_section(fr, &mut view)?;
    let path_map = decode_path_section(fr, stores)?;

    let mut pfx_seen: u32 = 0;
    loop {
        if fr.try_magic(PFX_END_MAGIC)? {
            let sent = fr.read_u32()?;
            if sent != pfx_seen {
                return Err(ViewError::CorruptStream(format!(
                    "pfx count mismatch: sent {sent}, read {pfx_seen}"
                )));
            }
            break;
        }
        let pfx = fr.read_pfx()?;
        let mut edge_seen: u32 = 0;
        loop {
            if fr.try_magic(PEER_END_MAGIC)? {
                let sent = fr.read_u16()?;
                if sent as u32 != edge_seen {
                    return Err(ViewError::CorruptStream(format!(
                        "pfx-peer count mismatch: sent {sent}, read {edge_seen}"
                    )));
                }
                break;
            }
            let remote = fr.read_u16()?;
            let idx = fr.read_u32()?;
            let local = *peer_map
                .get(&remote)
                .ok_or_else(|| ViewError::CorruptStream("pfx-peer references unknown peer".into()))?;
            let path = *path_map
                .get(&idx)
                .ok_or_else(|| ViewError::CorruptStream("pfx-peer references unknown path".into()))?;
            view.add_pfx_peer(pfx, local, path)?;
            view.activate_pfx_peer(&pfx, local)?;
            edge_seen += 1;
        }
        pfx_seen += 1;
    }
    fr.expect_magic(VIEW_END_MAGIC, "view end")?;
    Ok(view)
}

/// Read one view from the stream. `Ok(None)` is the normal termination:
/// end of stream exactly at a view boundary. On any error the decoded
/// scratch state is discarded; previously decoded views are unaffected.
pub fn read_view<R: Read>(r: &mut R, stores: &Arc<ViewStores>) -> Result<Option<View>> {
    let mut fr = FrameReader::new(r);
    if fr.peek8()?.is_none() {
        return Ok(None);
    }
    fr.expect_magic(START_MAGIC, "view start")?;
    decode_body(&mut fr, stores).map(Some)
}

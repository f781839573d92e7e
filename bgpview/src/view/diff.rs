//! Pfx-peer deltas between a parent view and the current view.
//!
//! Diff frames reuse the binary-codec framing: an opening
//! `VIEW_MAGIC || DIFF` marker, the peer and path sections of the full
//! codec, then a change section of tagged records. A receiver positioned
//! on the parent state applies a diff and lands exactly on the current
//! state.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use ipnet::IpNet;
use serde::Serialize;

use crate::error::{Result, ViewError};
use crate::sig::PeerId;
use crate::store::PathId;
use crate::view::codec::{
    AllFields, DIFF_MAGIC, FrameReader, PEER_END_MAGIC, PFX_END_MAGIC, START_MAGIC,
    VIEW_END_MAGIC, decode_body, decode_path_section, decode_peer_section, encode_path_section,
    encode_peer_section, put_magic, put_pfx, wire_idx,
};
use crate::view::{PfxEntry, View};

const OP_ADD: u8 = 1;
const OP_REMOVE: u8 = 2;
const OP_CHANGE: u8 = 3;

/// Producer-side statistics for one diff frame.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DiffStats {
    pub common_pfxs_cnt: u32,
    pub added_pfxs_cnt: u32,
    pub removed_pfxs_cnt: u32,
    pub changed_pfxs_cnt: u32,
    pub added_pfx_peer_cnt: u32,
    pub changed_pfx_peer_cnt: u32,
    pub removed_pfx_peer_cnt: u32,
    pub sync_pfx_cnt: u32,
    pub pfx_cnt: u32,
}

fn active_map(entry: &PfxEntry) -> BTreeMap<PeerId, PathId> {
    entry
        .peers()
        .filter(|(_, info)| info.is_active())
        .map(|(id, info)| (id, info.path_id()))
        .collect()
}

/// Compute and encode the delta from `parent` to `current`. Both views
/// must share the same stores; membership is judged on active pfx-peers.
pub fn encode_diff(parent: &View, current: &View) -> Result<(BytesMut, DiffStats)> {
    if !Arc::ptr_eq(parent.stores(), current.stores()) {
        return Err(ViewError::InvalidArg(
            "diff requires views sharing the same stores".into(),
        ));
    }

    let mut buf = BytesMut::new();
    put_magic(&mut buf, DIFF_MAGIC);
    buf.put_u32(current.time());
    buf.put_u32(parent.time());

    encode_peer_section(current, &AllFields, &mut buf)?;
    let path_wire = encode_path_section(current, &mut buf);

    let mut stats = DiffStats {
        pfx_cnt: current.pfxs().filter(|(_, e)| e.is_active()).count() as u32,
        ..Default::default()
    };

    let keys: BTreeSet<IpNet> = current
        .pfxs()
        .map(|(pfx, _)| *pfx)
        .chain(parent.pfxs().map(|(pfx, _)| *pfx))
        .collect();

    let mut records: u32 = 0;
    for pfx in keys {
        let cur = current.pfx(&pfx).map(active_map).unwrap_or_default();
        let par = parent.pfx(&pfx).map(active_map).unwrap_or_default();
        match (par.is_empty(), cur.is_empty()) {
            (true, true) => {}
            // Prefix new in the current view: emitted whole.
            (true, false) => {
                buf.put_u8(OP_ADD);
                put_pfx(&mut buf, &pfx);
                for (id, path) in cur.iter() {
                    buf.put_u16(id.0);
                    buf.put_u32(wire_idx(&path_wire, *path)?);
                }
                put_magic(&mut buf, PEER_END_MAGIC);
                buf.put_u16(cur.len() as u16);
                stats.added_pfxs_cnt += 1;
                stats.added_pfx_peer_cnt += cur.len() as u32;
                records += 1;
            }
            // Prefix gone from the current view.
            (false, true) => {
                buf.put_u8(OP_REMOVE);
                put_pfx(&mut buf, &pfx);
                stats.removed_pfxs_cnt += 1;
                stats.removed_pfx_peer_cnt += par.len() as u32;
                records += 1;
            }
            (false, false) => {
                if cur == par {
                    stats.common_pfxs_cnt += 1;
                    continue;
                }
                let added: Vec<_> = cur.iter().filter(|(id, _)| !par.contains_key(id)).collect();
                let removed: Vec<_> = par.keys().filter(|id| !cur.contains_key(id)).collect();
                let changed: Vec<_> = cur
                    .iter()
                    .filter(|(id, path)| par.get(id).is_some_and(|p| p != *path))
                    .collect();
                let base = par.len() - removed.len() - changed.len();

                buf.put_u8(OP_CHANGE);
                put_pfx(&mut buf, &pfx);
                buf.put_u16(base as u16);
                for (id, path) in added.iter() {
                    buf.put_u16(id.0);
                    buf.put_u32(wire_idx(&path_wire, **path)?);
                }
                put_magic(&mut buf, PEER_END_MAGIC);
                buf.put_u16(added.len() as u16);
                for (id, path) in changed.iter() {
                    buf.put_u16(id.0);
                    buf.put_u32(wire_idx(&path_wire, **path)?);
                }
                put_magic(&mut buf, PEER_END_MAGIC);
                buf.put_u16(changed.len() as u16);
                for id in removed.iter() {
                    buf.put_u16(id.0);
                }
                put_magic(&mut buf, PEER_END_MAGIC);
                buf.put_u16(removed.len() as u16);

                stats.changed_pfxs_cnt += 1;
                stats.added_pfx_peer_cnt += added.len() as u32;
                stats.changed_pfx_peer_cnt += changed.len() as u32;
                stats.removed_pfx_peer_cnt += removed.len() as u32;
                records += 1;
            }
        }
    }
    put_magic(&mut buf, PFX_END_MAGIC);
    buf.put_u32(records);
    put_magic(&mut buf, VIEW_END_MAGIC);
    Ok((buf, stats))
}

fn apply_diff_body<R: Read>(fr: &mut FrameReader<R>, view: &mut View) -> Result<()> {
    let time = fr.read_u32()?;
    let parent_time = fr.read_u32()?;
    if parent_time != view.time() {
        return Err(ViewError::CorruptStream(format!(
            "diff parent time {} does not match view time {}",
            parent_time,
            view.time()
        )));
    }

    // Apply onto a scratch copy; the caller's view is only replaced on
    // success.
    let mut scratch = view.dup();
    scratch.set_time(time);

    let peer_map = decode_peer_section(fr, &mut scratch)?;
    let stores = Arc::clone(scratch.stores());
    let path_map = decode_path_section(fr, &stores)?;

    let lookup_peer = |map: &std::collections::HashMap<u16, PeerId>, id: u16| {
        map.get(&id)
            .copied()
            .ok_or_else(|| ViewError::CorruptStream("diff references unknown peer".into()))
    };
    let lookup_path = |map: &std::collections::HashMap<u32, PathId>, idx: u32| {
        map.get(&idx)
            .copied()
            .ok_or_else(|| ViewError::CorruptStream("diff references unknown path".into()))
    };

    let mut records: u32 = 0;
    loop {
        if fr.try_magic(PFX_END_MAGIC)? {
            let sent = fr.read_u32()?;
            if sent != records {
                return Err(ViewError::CorruptStream(format!(
                    "diff record count mismatch: sent {sent}, read {records}"
                )));
            }
            break;
        }
        match fr.read_u8()? {
            OP_ADD => {
                let pfx = fr.read_pfx()?;
                let mut seen: u32 = 0;
                loop {
                    if fr.try_magic(PEER_END_MAGIC)? {
                        let sent = fr.read_u16()?;
                        if sent as u32 != seen {
                            return Err(ViewError::CorruptStream(
                                "diff pfx-peer count mismatch".into(),
                            ));
                        }
                        break;
                    }
                    let peer = lookup_peer(&peer_map, fr.read_u16()?)?;
                    let path = lookup_path(&path_map, fr.read_u32()?)?;
                    scratch.add_pfx_peer(pfx, peer, path)?;
                    scratch.activate_pfx_peer(&pfx, peer)?;
                    seen += 1;
                }
            }
            OP_REMOVE => {
                let pfx = fr.read_pfx()?;
                let peers: Vec<PeerId> = scratch
                    .pfx(&pfx)
                    .ok_or_else(|| ViewError::CorruptStream("diff removes unknown pfx".into()))?
                    .peers()
                    .filter(|(_, info)| info.is_active())
                    .map(|(id, _)| id)
                    .collect();
                for peer in peers {
                    scratch.remove_pfx_peer(&pfx, peer)?;
                }
            }
            OP_CHANGE => {
                let pfx = fr.read_pfx()?;
                let base = fr.read_u16()? as u32;
                let active_before = scratch
                    .pfx(&pfx)
                    .map(|e| e.active_peer_cnt())
                    .unwrap_or_default();

                let mut added: u32 = 0;
                loop {
                    if fr.try_magic(PEER_END_MAGIC)? {
                        let sent = fr.read_u16()?;
                        if sent as u32 != added {
                            return Err(ViewError::CorruptStream(
                                "diff pfx-peer count mismatch".into(),
                            ));
                        }
                        break;
                    }
                    let peer = lookup_peer(&peer_map, fr.read_u16()?)?;
                    let path = lookup_path(&path_map, fr.read_u32()?)?;
                    scratch.add_pfx_peer(pfx, peer, path)?;
                    scratch.activate_pfx_peer(&pfx, peer)?;
                    added += 1;
                }

                let mut changed: u32 = 0;
                loop {
                    if fr.try_magic(PEER_END_MAGIC)? {
                        let sent = fr.read_u16()?;
                        if sent as u32 != changed {
                            return Err(ViewError::CorruptStream(
                                "diff pfx-peer count mismatch".into(),
                            ));
                        }
                        break;
                    }
                    let peer = lookup_peer(&peer_map, fr.read_u16()?)?;
                    let path = lookup_path(&path_map, fr.read_u32()?)?;
                    scratch.add_pfx_peer(pfx, peer, path)?;
                    scratch.activate_pfx_peer(&pfx, peer)?;
                    changed += 1;
                }

                let mut removed: u32 = 0;
                loop {
                    if fr.try_magic(PEER_END_MAGIC)? {
                        let sent = fr.read_u16()?;
                        if sent as u32 != removed {
                            return Err(ViewError::CorruptStream(
                                "diff pfx-peer count mismatch".into(),
                            ));
                        }
                        break;
                    }
                    let peer = lookup_peer(&peer_map, fr.read_u16()?)?;
                    scratch
                        .remove_pfx_peer(&pfx, peer)
                        .map_err(|_| ViewError::CorruptStream("diff does not match view".into()))?;
                    removed += 1;
                }

                // The unchanged-edge count cross-checks the receiver state
                // against the producer's parent.
                if active_before.saturating_sub(changed + removed) != base {
                    return Err(ViewError::CorruptStream(format!(
                        "diff base peer mismatch for {pfx}: base {base}, had {active_before}"
                    )));
                }
            }
            op => {
                return Err(ViewError::InvalidFormat(format!(
                    "unknown diff record op {op}"
                )));
            }
        }
        records += 1;
    }
    fr.expect_magic(VIEW_END_MAGIC, "view end")?;
    *view = scratch;
    Ok(())
}

/// Apply a diff frame to a view holding the parent state.
pub fn apply_diff<R: Read>(r: &mut R, view: &mut View) -> Result<()> {
    let mut fr = FrameReader::new(r);
    fr.expect_magic(DIFF_MAGIC, "diff start")?;
    apply_diff_body(&mut fr, view)
}

/// What a receiver got out of one wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Sync,
    Diff,
}

/// Read one frame, sync or diff, updating `view` in place. `Ok(None)` is
/// the clean end of stream.
pub fn read_frame<R: Read>(r: &mut R, view: &mut View) -> Result<Option<FrameKind>> {
    let mut fr = FrameReader::new(r);
    if fr.peek8()?.is_none() {
        return Ok(None);
    }
    if fr.try_magic(START_MAGIC)? {
        let decoded = decode_body(&mut fr, &Arc::clone(view.stores()))?;
        *view = decoded;
        Ok(Some(FrameKind::Sync))
    } else if fr.try_magic(DIFF_MAGIC)? {
        apply_diff_body(&mut fr, view)?;
        Ok(Some(FrameKind::Diff))
    } else {
        Err(ViewError::CorruptStream("unknown frame marker".into()))
    }
}

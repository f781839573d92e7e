//! Line-oriented text rendering of a view, one line per active pfx-peer:
//! `TIME|PFX|COLLECTOR|PEER_ASN|PEER_IP|AS_PATH|ORIGIN_SEG`.

use std::io::Write;

use crate::error::Result;
use crate::view::View;

pub fn write_ascii<W: Write>(view: &View, w: &mut W) -> Result<()> {
    writeln!(w, "# View {}", view.time())?;
    writeln!(w, "# IPv4 Prefixes: {}", view.active_pfx_cnt(true))?;
    writeln!(w, "# IPv6 Prefixes: {}", view.active_pfx_cnt(false))?;

    let sigs = view.stores().sigs();
    let paths = view.stores().paths();
    for (pfx, entry) in view.pfxs() {
        if !entry.is_active() {
            continue;
        }
        for (id, info) in entry.peers() {
            if !info.is_active() {
                continue;
            }
            let sig = sigs.lookup(id)?;
            let path = paths.get(info.path_id())?.decode()?;
            let origin = path
                .origin_segment()
                .map(|seg| seg.to_string())
                .unwrap_or_default();
            writeln!(
                w,
                "{}|{}|{}|{}|{}|{}|{}",
                view.time(),
                pfx,
                sig.collector,
                sig.peer_asn,
                sig.peer_ip,
                path,
                origin
            )?;
        }
    }
    Ok(())
}

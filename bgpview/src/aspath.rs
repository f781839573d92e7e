use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};
use itertools::Itertools;
use num_enum::TryFromPrimitive;

use crate::error::{Result, ViewError};

pub const AS_SET: u8 = 1;
pub const AS_SEQ: u8 = 2;
pub const AS_CONFED_SEQ: u8 = 3;
pub const AS_CONFED_SET: u8 = 4;

/// AS path segment kind with the BGP wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum SegmentKind {
    Set = 1,
    Seq = 2,
    ConfedSeq = 3,
    ConfedSet = 4,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsSegment {
    pub kind: SegmentKind,
    pub asns: Vec<u32>,
}

impl AsSegment {
    pub fn new(kind: SegmentKind) -> Self {
        Self {
            kind,
            asns: Vec::new(),
        }
    }

    pub fn seq(asns: Vec<u32>) -> Self {
        Self {
            kind: SegmentKind::Seq,
            asns,
        }
    }
}

impl fmt::Display for AsSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.asns.iter().format(" ");
        match self.kind {
            SegmentKind::Set => write!(f, "{{{v}}}"),
            SegmentKind::ConfedSeq => write!(f, "({v})"),
            SegmentKind::ConfedSet => write!(f, "[{v}]"),
            SegmentKind::Seq => write!(f, "{v}"),
        }
    }
}

/// An AS path as an ordered list of segments.
///
/// The canonical byte encoding is a sequence of
/// `{kind: u8, asn_count: u8, asns: [u32; asn_count]}` records with
/// big-endian ASN words. The encoding is canonical on every architecture:
/// equal paths have equal encodings, in memory and on the wire.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct AsPath {
    pub segs: Vec<AsSegment>,
}

impl AsPath {
    pub fn new() -> Self {
        Self { segs: Vec::new() }
    }

    /// New path consisting of a single sequence segment.
    pub fn from_seq(asns: Vec<u32>) -> Self {
        Self {
            segs: vec![AsSegment::seq(asns)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }

    /// The origin of the path: the last ASN of a trailing sequence, or
    /// the whole trailing set.
    pub fn origin_segment(&self) -> Option<AsSegment> {
        let last = self.segs.last()?;
        match last.kind {
            SegmentKind::Seq | SegmentKind::ConfedSeq => last
                .asns
                .last()
                .map(|asn| AsSegment::seq(vec![*asn])),
            SegmentKind::Set | SegmentKind::ConfedSet => Some(last.clone()),
        }
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        for seg in self.segs.iter() {
            if seg.asns.is_empty() {
                buf.put_u8(seg.kind as u8);
                buf.put_u8(0);
                continue;
            }
            // Segments longer than one record can carry are split.
            for chunk in seg.asns.chunks(u8::MAX as usize) {
                buf.put_u8(seg.kind as u8);
                buf.put_u8(chunk.len() as u8);
                chunk.iter().for_each(|asn| buf.put_u32(*asn));
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.to_vec()
    }

    pub fn decode(mut data: &[u8]) -> Result<Self> {
        let mut segs = Vec::new();
        while !data.is_empty() {
            if data.len() < 2 {
                return Err(ViewError::InvalidFormat(
                    "truncated as-path segment header".into(),
                ));
            }
            let kind = SegmentKind::try_from(data[0]).map_err(|_| {
                ViewError::InvalidFormat(format!("unknown as-path segment kind {}", data[0]))
            })?;
            let count = data[1] as usize;
            data = &data[2..];
            if data.len() < count * 4 {
                return Err(ViewError::InvalidFormat(
                    "truncated as-path segment body".into(),
                ));
            }
            let asns = data[..count * 4]
                .chunks_exact(4)
                .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            data = &data[count * 4..];
            segs.push(AsSegment { kind, asns });
        }
        Ok(Self { segs })
    }
}

impl fmt::Display for AsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.segs.iter().map(|s| s.to_string()).join(" ");
        write!(f, "{v}")
    }
}

impl fmt::Debug for AsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS Path: {}", self)
    }
}

impl FromStr for AsPath {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self> {
        let mut path = AsPath::new();
        let mut seg: Option<AsSegment> = None;
        let mut num: Option<u32> = None;

        let mut push_num = |seg: &mut Option<AsSegment>, num: &mut Option<u32>| {
            if let Some(n) = num.take() {
                seg.get_or_insert_with(|| AsSegment::new(SegmentKind::Seq))
                    .asns
                    .push(n);
            }
        };

        for c in s.chars() {
            match c {
                '0'..='9' => {
                    let d = c as u32 - '0' as u32;
                    num = Some(num.unwrap_or(0).wrapping_mul(10).wrapping_add(d));
                }
                ' ' | '\t' => push_num(&mut seg, &mut num),
                '{' | '(' | '[' => {
                    push_num(&mut seg, &mut num);
                    if let Some(s) = seg.take() {
                        path.segs.push(s);
                    }
                    let kind = match c {
                        '{' => SegmentKind::Set,
                        '(' => SegmentKind::ConfedSeq,
                        _ => SegmentKind::ConfedSet,
                    };
                    seg = Some(AsSegment::new(kind));
                }
                '}' | ')' | ']' => {
                    push_num(&mut seg, &mut num);
                    match seg.take() {
                        Some(s) if s.kind != SegmentKind::Seq => path.segs.push(s),
                        _ => {
                            return Err(ViewError::InvalidArg(format!(
                                "unbalanced '{c}' in as-path"
                            )));
                        }
                    }
                }
                _ => {
                    return Err(ViewError::InvalidArg(format!(
                        "unexpected character '{c}' in as-path"
                    )));
                }
            }
        }
        push_num(&mut seg, &mut num);
        if let Some(s) = seg {
            if s.kind != SegmentKind::Seq {
                return Err(ViewError::InvalidArg("unterminated as-path segment".into()));
            }
            path.segs.push(s);
        }
        Ok(path)
    }
}

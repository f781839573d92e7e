//! View archiver: serializes each published view into time-rotated
//! output files.
//!
//! Files are written under a temporary name and renamed into place when
//! the segment closes; there is no fsync, rotation is atomic through the
//! rename alone.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::DateTime;

use crate::config::{ArchiverConfig, OutputFormat};
use crate::error::Result;
use crate::io_info;
use crate::view::{ActiveFields, View, write_ascii, write_view};

/// Opens segment writers. The compressed-I/O layer plugs in here; the
/// compression level is part of the contract and ignored by plain files.
pub trait WriterFactory: Send {
    fn open(&self, path: &Path, compression_level: u8) -> Result<Box<dyn Write + Send>>;
}

pub struct PlainFiles;

impl WriterFactory for PlainFiles {
    fn open(&self, path: &Path, _compression_level: u8) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(File::create(path)?))
    }
}

struct OpenSegment {
    writer: Box<dyn Write + Send>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    opened_at: u32,
}

pub struct Archiver {
    cfg: ArchiverConfig,
    factory: Box<dyn WriterFactory>,
    current: Option<OpenSegment>,
}

impl Archiver {
    pub fn new(cfg: ArchiverConfig, factory: Box<dyn WriterFactory>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            factory,
            current: None,
        })
    }

    fn segment_start(&self, ts: u32) -> u32 {
        if self.cfg.rotation_align {
            ts - ts % self.cfg.rotation_interval
        } else {
            ts
        }
    }

    fn segment_path(&self, ts: u32) -> PathBuf {
        let dt = DateTime::from_timestamp(ts as i64, 0).unwrap_or_default();
        PathBuf::from(dt.format(&self.cfg.outfile_pattern).to_string())
    }

    /// Append a view to the archive, rotating first when its time falls
    /// past the open segment.
    pub fn publish(&mut self, view: &View) -> Result<()> {
        let ts = view.time();
        if self
            .current
            .as_ref()
            .is_some_and(|seg| ts >= seg.opened_at + self.cfg.rotation_interval)
        {
            self.rotate()?;
        }
        if self.current.is_none() {
            let opened_at = self.segment_start(ts);
            let final_path = self.segment_path(opened_at);
            let tmp_path = PathBuf::from(format!("{}.tmp", final_path.display()));
            let writer = self.factory.open(&tmp_path, self.cfg.compression_level)?;
            self.current = Some(OpenSegment {
                writer,
                tmp_path,
                final_path,
                opened_at,
            });
        }
        let Some(seg) = self.current.as_mut() else {
            return Ok(());
        };
        match self.cfg.output_format {
            OutputFormat::Binary => write_view(view, &ActiveFields, &mut seg.writer)?,
            OutputFormat::Ascii => write_ascii(view, &mut seg.writer)?,
        }
        Ok(())
    }

    /// Close the open segment: flush, rename into place and record the
    /// closed filename.
    pub fn rotate(&mut self) -> Result<Option<PathBuf>> {
        let Some(seg) = self.current.take() else {
            return Ok(None);
        };
        let OpenSegment {
            mut writer,
            tmp_path,
            final_path,
            ..
        } = seg;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, &final_path)?;
        if let Some(latest) = &self.cfg.latest_filename {
            fs::write(latest, format!("{}\n", final_path.display()))?;
        }
        io_info!("rotated archive segment {}", final_path.display());
        Ok(Some(final_path))
    }
}

impl Drop for Archiver {
    fn drop(&mut self) {
        let _ = self.rotate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ViewStores;
    use crate::view::read_view;
    use std::net::{IpAddr, Ipv4Addr};

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bgpview-archive-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_view(time: u32) -> View {
        let mut view = View::new(ViewStores::new());
        view.set_time(time);
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
    fn rotation_and_latest() {
        let dir = scratch_dir("rotate");
        let cfg = ArchiverConfig {
            outfile_pattern: format!("{}/views.%s.bin", dir.display()),
            rotation_interval: 600,
            rotation_align: true,
            latest_filename: Some(format!("{}/latest", dir.display())),
            ..Default::default()
        };
        let mut archiver = Archiver::new(cfg, Box::new(PlainFiles)).unwrap();

        archiver.publish(&sample_view(1000)).unwrap();
        archiver.publish(&sample_view(1100)).unwrap();
        // Crossing the 600 s boundary closes the first segment.
        archiver.publish(&sample_view(1300)).unwrap();

        let first = dir.join("views.600.bin");
        assert!(first.exists());
        let latest = fs::read_to_string(dir.join("latest")).unwrap();
        assert_eq!(latest.trim(), first.display().to_string());

        // The first segment holds both early views, concatenated.
        let stores = ViewStores::new();
        let data = fs::read(&first).unwrap();
        let mut r = data.as_slice();
        let v1 = read_view(&mut r, &stores).unwrap().unwrap();
        let v2 = read_view(&mut r, &stores).unwrap().unwrap();
        assert!(read_view(&mut r, &stores).unwrap().is_none());
        assert_eq!(v1.time(), 1000);
        assert_eq!(v2.time(), 1100);

        // The second segment is still in progress under its tmp name.
        assert!(dir.join("views.1200.bin.tmp").exists());
        archiver.rotate().unwrap();
        assert!(dir.join("views.1200.bin").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn ascii_segments() {
        let dir = scratch_dir("ascii");
        let cfg = ArchiverConfig {
            outfile_pattern: format!("{}/views.%s.txt", dir.display()),
            output_format: OutputFormat::Ascii,
            rotation_align: false,
            ..Default::default()
        };
        let mut archiver = Archiver::new(cfg, Box::new(PlainFiles)).unwrap();
        archiver.publish(&sample_view(1234)).unwrap();
        let path = archiver.rotate().unwrap().unwrap();
        // Unaligned rotation names segments after their first view.
        assert_eq!(path, dir.join("views.1234.txt"));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# View 1234\n"));
        assert!(text.contains("10.1.0.0/16|rrc00|65001"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn calendar_substitution() {
        let dir = scratch_dir("cal");
        let cfg = ArchiverConfig {
            outfile_pattern: format!("{}/%Y%m%d.%s.bin", dir.display()),
            ..Default::default()
        };
        let mut archiver = Archiver::new(cfg, Box::new(PlainFiles)).unwrap();
        // 2021-01-01 00:10:00 UTC aligns down to 00:00:00.
        archiver.publish(&sample_view(1609459200 + 600)).unwrap();
        let path = archiver.rotate().unwrap().unwrap();
        assert_eq!(path, dir.join("20210101.1609459200.bin"));

        let _ = fs::remove_dir_all(&dir);
    }
}

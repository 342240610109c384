//! Raw video sink: concatenated pixel buffers plus a JSON manifest.

use crate::collector::types::{Frame, Geometry, PixelFormat};
use crate::recording::{RecordingError, VideoSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Describes the layout of `frames.raw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoManifest {
    pub session_id: Uuid,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub format: PixelFormat,
    pub frame_interval_secs: f64,
    pub frame_count: u64,
}

/// Writes `frames.raw` and `video.json` into a directory.
pub struct RawVideoSink {
    dir: PathBuf,
    writer: Option<BufWriter<File>>,
    manifest: Option<VideoManifest>,
    session_id: Uuid,
}

impl RawVideoSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writer: None,
            manifest: None,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn frames_path(&self) -> PathBuf {
        self.dir.join("frames.raw")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("video.json")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl VideoSink for RawVideoSink {
    fn open(
        &mut self,
        geometry: Geometry,
        format: PixelFormat,
        frame_interval: Duration,
    ) -> Result<(), RecordingError> {
        std::fs::create_dir_all(&self.dir)?;
        self.writer = Some(BufWriter::new(File::create(self.frames_path())?));
        self.manifest = Some(VideoManifest {
            session_id: self.session_id,
            host: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            started_at: Utc::now(),
            width: geometry.width,
            height: geometry.height,
            channels: geometry.channels,
            format,
            frame_interval_secs: frame_interval.as_secs_f64(),
            frame_count: 0,
        });
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        let (writer, manifest) = match (self.writer.as_mut(), self.manifest.as_mut()) {
            (Some(w), Some(m)) => (w, m),
            _ => return Err(RecordingError::NotOpen),
        };
        writer.write_all(&frame.data)?;
        manifest.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), RecordingError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        if let Some(manifest) = self.manifest.take() {
            let json = serde_json::to_string_pretty(&manifest)?;
            std::fs::write(self.manifest_path(), json)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_manifest_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RawVideoSink::new(dir.path().join("video"));
        let frame = Frame::new(2, 2, PixelFormat::Rgb8, vec![5; 12]).unwrap();

        sink.open(frame.geometry(), frame.format, Duration::from_millis(100))
            .unwrap();
        sink.write_frame(&frame).unwrap();
        sink.write_frame(&frame).unwrap();
        sink.close().unwrap();

        let raw = std::fs::read(sink.frames_path()).unwrap();
        assert_eq!(raw.len(), 24);
        let manifest: VideoManifest =
            serde_json::from_str(&std::fs::read_to_string(sink.manifest_path()).unwrap())
                .unwrap();
        assert_eq!(manifest.frame_count, 2);
        assert_eq!(manifest.width, 2);
        assert_eq!(manifest.format, PixelFormat::Rgb8);
        assert!((manifest.frame_interval_secs - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_write_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RawVideoSink::new(dir.path());
        let frame = Frame::new(1, 1, PixelFormat::Gray8, vec![0]).unwrap();
        assert!(matches!(
            sink.write_frame(&frame),
            Err(RecordingError::NotOpen)
        ));
    }
}

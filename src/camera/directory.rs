//! Directory replay source
//!
//! Loads every `.jpg`/`.jpeg` file from a directory once, sorted by file
//! name, and replays them in a loop.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use super::{CameraError, Frame, FrameSource};
use crate::config::CameraConfig;

pub struct DirectorySource {
    frames: Vec<Bytes>,
    sequence: AtomicU64,
}

impl DirectorySource {
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let frames = load_jpegs(Path::new(&config.directory))?;
        if frames.is_empty() {
            return Err(CameraError::Device(format!(
                "no JPEG files in '{}'",
                config.directory
            )));
        }
        Ok(Self {
            frames,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

fn load_jpegs(dir: &Path) -> Result<Vec<Bytes>, CameraError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_jpeg(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|p| std::fs::read(p).map(Bytes::from).map_err(CameraError::from))
        .collect()
}

impl FrameSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    fn capture(&self) -> Result<Frame, CameraError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let index = usize::try_from((sequence - 1) % self.frames.len() as u64).unwrap_or(0);
        Ok(Frame::new(self.frames[index].clone(), sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "camera_httpd_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config_for(dir: &Path) -> CameraConfig {
        let mut cfg = Config::from_toml_str("").unwrap().camera;
        cfg.directory = dir.to_string_lossy().into_owned();
        cfg
    }

    #[test]
    fn test_replays_in_name_order() {
        let dir = scratch_dir("replay");
        std::fs::write(dir.join("b.jpg"), b"second").unwrap();
        std::fs::write(dir.join("a.JPEG"), b"first").unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let source = DirectorySource::open(&config_for(&dir)).unwrap();
        assert_eq!(source.frame_count(), 2);
        assert_eq!(&source.capture().unwrap().data[..], b"first");
        assert_eq!(&source.capture().unwrap().data[..], b"second");
        assert_eq!(&source.capture().unwrap().data[..], b"first");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_directory() {
        let dir = scratch_dir("empty");
        assert!(DirectorySource::open(&config_for(&dir)).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory() {
        let dir = std::env::temp_dir().join("camera_httpd_does_not_exist");
        assert!(matches!(
            DirectorySource::open(&config_for(&dir)),
            Err(CameraError::Io(_))
        ));
    }
}

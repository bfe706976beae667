//! Frame extraction into a zip archive.
//!
//! A video is sampled at a fixed rate into PNG frames, which are then
//! packed into a single deflate-compressed archive next to them.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Frame extractor configuration.
#[derive(Debug, Clone)]
pub struct FrameExtractorConfig {
    /// Frames sampled per second of video
    pub fps: u32,
    /// FFmpeg timeout
    pub timeout_secs: Option<u64>,
}

impl Default for FrameExtractorConfig {
    fn default() -> Self {
        Self {
            fps: 1,
            timeout_secs: Some(1800), // 30 minutes
        }
    }
}

impl FrameExtractorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fps: std::env::var("FRAME_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|fps| *fps > 0)
                .unwrap_or(defaults.fps),
            // "0" disables the timeout; anything unparseable keeps the default
            timeout_secs: match std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => defaults.timeout_secs,
            },
        }
    }
}

/// Archive produced from a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArchive {
    /// Local path of the archive
    pub path: PathBuf,
    /// File name of the archive
    pub name: String,
}

/// Extracts frames from a video and packs them into a zip archive.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    config: FrameExtractorConfig,
    runner: FfmpegRunner,
}

impl FrameExtractor {
    pub fn new(config: FrameExtractorConfig) -> Self {
        let runner = match config.timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        };
        Self { config, runner }
    }

    /// Extract frames from `input` and archive them inside `work_dir`.
    pub async fn extract(&self, input: &Path, work_dir: &Path) -> MediaResult<ExtractedArchive> {
        if !tokio::fs::try_exists(input).await? {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        // Fresh directory, so no existing file in work_dir can clash with it
        tokio::fs::create_dir_all(work_dir).await?;
        let frames = tempfile::Builder::new()
            .prefix("frames-")
            .tempdir_in(work_dir)?;
        let frames_dir = frames.path().to_path_buf();

        let cmd = FfmpegCommand::new(input, frames_dir.join("frame_%04d.png"))
            .video_filter(format!("fps={}", self.config.fps));
        self.runner.run(&cmd).await?;

        let name = format!("frames-{}.zip", Uuid::new_v4().simple());
        let path = work_dir.join(&name);

        let archive = path.clone();
        let count = tokio::task::spawn_blocking(move || pack_frames(&frames_dir, &archive))
            .await
            .map_err(|e| MediaError::internal(format!("archive task failed: {}", e)))??;

        info!(
            "Extracted {} frames from {} into {}",
            count,
            input.display(),
            name
        );

        Ok(ExtractedArchive { path, name })
    }
}

/// Pack every PNG in `frames_dir` into a zip at `archive`, in name order.
///
/// Returns the number of frames written. An empty directory is an error.
pub fn pack_frames(frames_dir: &Path, archive: &Path) -> MediaResult<usize> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(frames_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
        })
        .collect();

    if frames.is_empty() {
        return Err(MediaError::NoFrames(frames_dir.to_path_buf()));
    }
    frames.sort();

    let mut writer = ZipWriter::new(BufWriter::new(File::create(archive)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for frame in &frames {
        let name = frame
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| MediaError::internal("frame without file name"))?;
        debug!("Adding {} to archive", name);

        writer.start_file(name, options)?;
        let mut source = File::open(frame)?;
        std::io::copy(&mut source, &mut writer)?;
    }

    writer.finish()?;
    Ok(frames.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        std::fs::write(frames.join("frame_0002.png"), b"second").unwrap();
        std::fs::write(frames.join("frame_0001.png"), b"first").unwrap();
        std::fs::write(frames.join("notes.txt"), b"ignored").unwrap();

        let archive = dir.path().join("frames.zip");
        let count = pack_frames(&frames, &archive).unwrap();
        assert_eq!(count, 2);

        let zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"frame_0001.png"));
        assert!(names.contains(&"frame_0002.png"));
    }

    #[test]
    fn test_pack_frames_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("frames.zip");

        let err = pack_frames(dir.path(), &archive).unwrap_err();
        assert!(matches!(err, MediaError::NoFrames(_)));
    }

    #[tokio::test]
    async fn test_extract_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FrameExtractor::new(FrameExtractorConfig::default());

        let err = extractor
            .extract(&dir.path().join("missing.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_input_named_frames_does_not_block_setup() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frames");
        std::fs::write(&input, b"not really a video").unwrap();
        let extractor = FrameExtractor::new(FrameExtractorConfig::default());

        // Whether or not ffmpeg is installed, the failure must come from ffmpeg
        let err = extractor.extract(&input, dir.path()).await.unwrap_err();
        assert!(
            matches!(
                err,
                MediaError::FfmpegNotFound | MediaError::FfmpegFailed { .. }
            ),
            "unexpected error: {}",
            err
        );
        assert!(input.is_file());
    }

    #[test]
    fn test_timeout_env_fallback() {
        std::env::set_var("FFMPEG_TIMEOUT_SECS", "soon");
        assert_eq!(FrameExtractorConfig::from_env().timeout_secs, Some(1800));
        std::env::set_var("FFMPEG_TIMEOUT_SECS", "0");
        assert_eq!(FrameExtractorConfig::from_env().timeout_secs, None);
        std::env::set_var("FFMPEG_TIMEOUT_SECS", "90");
        assert_eq!(FrameExtractorConfig::from_env().timeout_secs, Some(90));
        std::env::remove_var("FFMPEG_TIMEOUT_SECS");
    }

    #[test]
    fn test_default_config() {
        let config = FrameExtractorConfig::default();
        assert_eq!(config.fps, 1);
        assert_eq!(config.timeout_secs, Some(1800));
    }
}

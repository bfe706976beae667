//! FFmpeg CLI wrapper for frame extraction.
//!
//! This crate provides:
//! - FFmpeg command building and execution with timeout
//! - Frame extraction at a fixed rate
//! - Packing extracted frames into a zip archive

pub mod command;
pub mod error;
pub mod frames;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{pack_frames, ExtractedArchive, FrameExtractor, FrameExtractorConfig};

//! Frame sources.
//!
//! Sources are pull-based: `pull` blocks until the next frame is decoded and
//! returns `Ok(None)` (or an empty frame) once the stream has ended. The
//! ingestion stage treats any error the same way as end-of-stream.
//!
//! Available sources, selected by URI in `open_source`:
//! - `stub://<scene>`: synthetic scene with people-shaped blocks
//! - a path to an image file: a single still frame
//! - a path to a directory: the images in it, in file-name order
//! - any other path: a video file decoded by ffmpeg (feature: ingest-file-ffmpeg)

#[cfg(feature = "ingest-file-ffmpeg")]
pub mod file_ffmpeg;
pub mod normalize;
pub mod still;
pub mod synthetic;

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

#[cfg(feature = "ingest-file-ffmpeg")]
pub use file_ffmpeg::FfmpegFileSource;
pub use normalize::PixelFormat;
pub use still::StillImageSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

pub trait FrameSource: Send {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Next frame, or `None` at end of stream.
    fn pull(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device or file. Called once when ingestion stops.
    fn release(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn pull(&mut self) -> Result<Option<Frame>> {
        (**self).pull()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Open a source from a URI or path.
pub fn open_source(uri: &str) -> Result<Box<dyn FrameSource>> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(anyhow!("frame source must not be empty"));
    }
    if let Some(scene) = uri.strip_prefix("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig::for_scene(scene)?)));
    }
    if uri.contains("://") {
        return Err(anyhow!(
            "unsupported source '{}': only stub:// URIs and local paths are accepted",
            uri
        ));
    }

    let path = Path::new(uri);
    if path.is_dir() || is_still_image(path) {
        return Ok(Box::new(StillImageSource::open(path)?));
    }

    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        Ok(Box::new(FfmpegFileSource::open(path)?))
    }
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        Err(anyhow!(
            "video file '{}' requires the ingest-file-ffmpeg feature",
            uri
        ))
    }
}

/// True for paths that name a single image file the still source can decode.
pub fn is_still_image(path: &Path) -> bool {
    path.is_file() && image::ImageFormat::from_path(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_and_empty_uris() {
        assert!(open_source("").is_err());
        assert!(open_source("rtsp://camera/stream").is_err());
    }

    #[test]
    fn opens_synthetic_scenes() -> Result<()> {
        let mut source = open_source("stub://walkers")?;
        assert!(source.describe().contains("walkers"));
        assert!(source.pull()?.is_some());
        assert!(open_source("stub://no-such-scene").is_err());
        Ok(())
    }
}

//! Delivery rendering for the sniffer.
//!
//! Each delivery gets a header line followed by a body rendered according to its
//! content type: text is printed, JPEG frames are saved to disk, anything else is
//! hex dumped.

pub mod hexdump;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::broker::Delivery;
use crate::encoding::decode_int;

/// Content type printed as text.
pub const TEXT_PLAIN: &str = "text/plain";
/// Content type saved as a frame file.
pub const IMAGE_JPEG: &str = "image/jpeg";

/// What the renderer did with a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Text,
    /// Path of the saved frame, `None` when the write failed.
    Frame(Option<PathBuf>),
    HexDump,
}

/// Saves JPEG frames under unique names.
///
/// Names combine a microsecond UTC timestamp with a per-process sequence number,
/// so frames arriving within the same tick still get distinct files.
#[derive(Debug)]
pub struct FrameWriter {
    dir: PathBuf,
    next_seq: u64,
}

impl FrameWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_seq: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&mut self) -> PathBuf {
        let seq = self.next_seq;
        self.next_seq += 1;
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        self.dir.join(format!("frame_{}_{:06}.jpg", stamp, seq))
    }

    /// Write `body` to a fresh file. Never overwrites an existing frame.
    pub fn save(&mut self, body: &[u8]) -> io::Result<PathBuf> {
        self.save_with(body, |file, body| file.write_all(body))
    }

    /// A partially written frame is removed before the error is returned.
    fn save_with<F>(&mut self, body: &[u8], write: F) -> io::Result<PathBuf>
    where
        F: FnOnce(&mut fs::File, &[u8]) -> io::Result<()>,
    {
        let path = self.next_path();
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        if let Err(e) = write(&mut file, body) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        Ok(path)
    }
}

/// Renders deliveries to an output stream.
pub struct Renderer<W: Write> {
    out: W,
    source: String,
    frames: FrameWriter,
}

impl<W: Write> Renderer<W> {
    /// `source` is the queue or exchange name shown in each header line.
    pub fn new(out: W, source: impl Into<String>, frames: FrameWriter) -> Self {
        Self {
            out,
            source: source.into(),
            frames,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render one delivery. Only errors on the output stream are returned.
    pub fn render(&mut self, delivery: &Delivery) -> io::Result<Rendered> {
        debug!(
            content_type = %delivery.content_type,
            bytes = delivery.body.len(),
            "Received delivery"
        );

        writeln!(
            self.out,
            "{} | {} | {}",
            chrono::Local::now().to_rfc3339(),
            self.source,
            delivery.content_type
        )?;

        let rendered = match delivery.content_type.as_str() {
            TEXT_PLAIN => {
                writeln!(self.out, "{}", String::from_utf8_lossy(&delivery.body))?;
                Rendered::Text
            }
            IMAGE_JPEG => match self.frames.save(&delivery.body) {
                Ok(path) => {
                    writeln!(
                        self.out,
                        "saved {} bytes to {}",
                        delivery.body.len(),
                        path.display()
                    )?;
                    Rendered::Frame(Some(path))
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        dir = %self.frames.dir().display(),
                        "Failed to save frame, skipping"
                    );
                    Rendered::Frame(None)
                }
            },
            _ => {
                debug!(as_int = ?decode_int(&delivery.body), "Hex dumping delivery");
                self.out
                    .write_all(hexdump::dump(&delivery.body).as_bytes())?;
                Rendered::HexDump
            }
        };

        self.out.flush()?;
        Ok(rendered)
    }
}

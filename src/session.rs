//! Report session: asset folders and collision-free sidecar files.
//!
//! One session exists per test run. It owns:
//! - The `screenshots/`, `sources/` and `downloads/` folders next to the HTML
//!   report, recreated empty when the session starts
//! - A generated `screenshots/error.png` placeholder used when an image
//!   cannot be written
//! - UUID-based file naming so sequential tests and separate runner processes
//!   never overwrite each other
//!
//! In single-page mode nothing is written; assets become base64 data URIs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error};
use uuid::Uuid;

use crate::capture::MockFramebuffer;
use crate::config::Config;
use crate::error::ExtrasResult;
use crate::mime::Mime;

pub const SCREENSHOTS_DIR: &str = "screenshots";
pub const SOURCES_DIR: &str = "sources";
pub const DOWNLOADS_DIR: &str = "downloads";
pub const ERROR_IMAGE: &str = "error.png";

const ASSET_DIRS: [&str; 3] = [SCREENSHOTS_DIR, SOURCES_DIR, DOWNLOADS_DIR];

/// A report session shared read-only by every recorder
#[derive(Debug)]
pub struct ReportSession {
    /// Unique session ID
    pub id: String,
    /// Folder holding the HTML report, when one is produced
    pub dir: Option<PathBuf>,
    config: Arc<Config>,
}

impl ReportSession {
    /// Validate the configuration and prepare the asset folders
    pub fn start(config: Config) -> ExtrasResult<Self> {
        config.validate()?;
        let session = Self {
            id: generate_session_id(),
            dir: config.html_folder(),
            config: Arc::new(config),
        };
        session.init()?;
        Ok(session)
    }

    fn init(&self) -> ExtrasResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        if self.config.single_page {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
            return Ok(());
        }
        for name in ASSET_DIRS {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_dir_all(&path)?;
            }
            fs::create_dir_all(&path)?;
        }
        fs::write(dir.join(SCREENSHOTS_DIR).join(ERROR_IMAGE), error_placeholder()?)?;
        debug!(session = %self.id, dir = %dir.display(), "report assets initialized");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn embeds(&self) -> bool {
        self.config.single_page
    }

    /// Store an image, video or audio payload. Returns the report-relative
    /// link, or `None` when no HTML report is produced.
    pub fn save_media(&self, data: &[u8], mime: Mime) -> Option<String> {
        let dir = self.dir.as_ref()?;
        if self.embeds() {
            return Some(data_uri(mime.as_str(), data));
        }
        let link = format!("{}/image-{}.{}", SCREENSHOTS_DIR, Uuid::new_v4(), mime.extension());
        match fs::write(dir.join(&link), data) {
            Ok(()) => Some(link),
            Err(err) => {
                error!(session = %self.id, file = %link, "cannot write image: {}", err);
                Some(format!("{}/{}", SCREENSHOTS_DIR, ERROR_IMAGE))
            }
        }
    }

    /// Store a webpage source. Returns its link, or `None` when no HTML report
    /// is produced or the file cannot be written.
    pub fn save_page_source(&self, html: &str) -> Option<String> {
        let dir = self.dir.as_ref()?;
        if self.embeds() {
            return Some(data_uri(Mime::Text.as_str(), html.as_bytes()));
        }
        let link = format!("{}/page-{}.txt", SOURCES_DIR, Uuid::new_v4());
        match fs::write(dir.join(&link), html) {
            Ok(()) => Some(link),
            Err(err) => {
                error!(session = %self.id, file = %link, "cannot write page source: {}", err);
                None
            }
        }
    }

    /// Copy a file into the downloads folder
    pub fn add_file_to_downloads(&self, source: &Path) -> ExtrasResult<Option<String>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        if self.embeds() {
            let data = fs::read(source)?;
            return Ok(Some(data_uri("application/octet-stream", &data)));
        }
        let name = source
            .file_name()
            .map(|n| sanitize_name(&n.to_string_lossy()))
            .unwrap_or_else(|| "download".to_string());
        let folder = format!("{}/{}", DOWNLOADS_DIR, Uuid::new_v4());
        fs::create_dir_all(dir.join(&folder))?;
        let link = format!("{}/{}", folder, name);
        fs::copy(source, dir.join(&link))?;
        Ok(Some(link))
    }

    /// Write bytes into the downloads folder
    pub fn add_bytes_to_downloads(
        &self,
        data: &[u8],
        extension: Option<&str>,
    ) -> ExtrasResult<Option<String>> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        if self.embeds() {
            return Ok(Some(data_uri("application/octet-stream", data)));
        }
        let suffix = extension
            .map(|e| format!(".{}", sanitize_name(e)))
            .unwrap_or_default();
        let link = format!("{}/download-{}{}", DOWNLOADS_DIR, Uuid::new_v4(), suffix);
        fs::write(dir.join(&link), data)?;
        Ok(Some(link))
    }

    /// List all sidecar files of one asset folder
    pub fn list_assets(&self, folder: &str) -> std::io::Result<Vec<PathBuf>> {
        let mut assets = Vec::new();
        let Some(dir) = &self.dir else {
            return Ok(assets);
        };
        let root = dir.join(folder);
        if root.exists() {
            for entry in fs::read_dir(&root)? {
                let path = entry?.path();
                if path.is_file() {
                    assets.push(path);
                }
            }
        }
        assets.sort();
        Ok(assets)
    }

    /// Remove asset folders left empty at the end of the session
    pub fn finish(&self) -> std::io::Result<usize> {
        match &self.dir {
            Some(dir) => delete_empty_subfolders(dir),
            None => Ok(0),
        }
    }
}

/// `data:<mime>;base64,<payload>`
pub fn data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// Remove the empty asset folders under `dir`
pub fn delete_empty_subfolders(dir: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    for name in ASSET_DIRS {
        let path = dir.join(name);
        if !path.is_dir() {
            continue;
        }
        // Per-file download folders first
        if name == DOWNLOADS_DIR {
            for entry in fs::read_dir(&path)? {
                let sub = entry?.path();
                if sub.is_dir() && fs::read_dir(&sub)?.next().is_none() {
                    fs::remove_dir(&sub)?;
                }
            }
        }
        let only_placeholder = name == SCREENSHOTS_DIR
            && fs::read_dir(&path)?
                .filter_map(Result::ok)
                .all(|e| e.file_name() == ERROR_IMAGE);
        if only_placeholder {
            let _ = fs::remove_file(path.join(ERROR_IMAGE));
        }
        if fs::read_dir(&path)?.next().is_none() {
            fs::remove_dir(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Red "image unavailable" card
fn error_placeholder() -> crate::capture::CaptureResult<Vec<u8>> {
    let mut fb = MockFramebuffer::with_color(160, 40, [255, 235, 235]);
    fb.draw_rect(0, 0, 160, 2, [200, 0, 0]);
    fb.draw_rect(0, 38, 160, 2, [200, 0, 0]);
    fb.draw_text(16, 16, "image unavailable", [200, 0, 0], [255, 235, 235]);
    fb.to_png()
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let pid = std::process::id();
    format!("session_{}_{}", timestamp, pid)
}

/// Sanitize a name for use in filenames
pub(crate) fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

//! Track records and the builder that produces them
//!
//! A [`TrackRecord`] is built from one audio file. Embedded tags are tried
//! first (via lofty); when a file has no readable tags the file name is
//! parsed instead. Either way, album and artist left unset are then inferred
//! from the folder layout (`Artist/Album/track.mp3`).

use lofty::prelude::*;
use lofty::probe::Probe;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Album name used when neither tags nor folders provide one
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Folder names too generic to be an album or artist
const GENERIC_FOLDER_NAMES: &[&str] = &["Music", "iTunes", "Songs", "MP3", "Audio", "Downloads"];

/// `01. Title`, `01 Title`, `1.Title`
static NUMBERED_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.?\s*(.+)$").expect("numbered title pattern is valid"));

/// Track record build errors
#[derive(Debug, Error)]
pub enum RecordBuildError {
    /// File could not be opened or stat'ed
    #[error("Cannot read {0}: {1}")]
    Unreadable(PathBuf, String),
}

/// One catalog entry for a single audio file
#[derive(Debug, Clone)]
pub struct TrackRecord {
    /// Fresh for every scan; never reused across rescans
    pub id: Uuid,
    /// Absolute path of the audio file
    pub path: PathBuf,
    pub filename: String,
    pub parent_directory: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// 0 when unknown
    pub track_number: u32,
    /// Embedded picture bytes, shared between snapshot copies
    pub artwork: Option<Arc<[u8]>>,
}

impl TrackRecord {
    /// Skeleton record for `path` with the title defaulted to the file stem
    pub fn for_path(path: &Path) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent_directory = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Self {
            id: Uuid::new_v4(),
            path: path.to_path_buf(),
            filename,
            parent_directory,
            title: file_stem(path),
            artist: None,
            album: None,
            track_number: 0,
            artwork: None,
        }
    }

    pub fn has_artwork(&self) -> bool {
        self.artwork.as_ref().is_some_and(|data| !data.is_empty())
    }

    pub fn artwork(&self) -> Option<&[u8]> {
        self.artwork.as_deref().filter(|data| !data.is_empty())
    }

    /// Album inferred from the parent folder name
    pub fn inferred_album(&self) -> Option<String> {
        folder_name(&self.parent_directory)
    }

    /// Artist inferred from the grandparent folder name
    pub fn inferred_artist(&self) -> Option<String> {
        self.parent_directory.parent().and_then(folder_name)
    }

    /// Album name used for sorting and grouping
    ///
    /// Tag (or filename) album first, then folder inference, then
    /// [`UNKNOWN_ALBUM`].
    pub fn album_name(&self) -> String {
        self.album
            .clone()
            .or_else(|| self.inferred_album())
            .unwrap_or_else(|| UNKNOWN_ALBUM.to_string())
    }

    /// Fill album/artist from folders where still unset
    fn apply_folder_inference(&mut self) {
        if self.album.is_none() {
            self.album = self.inferred_album();
        }
        if self.artist.is_none() {
            self.artist = self.inferred_artist();
        }
    }

    /// Parse the file name when tags are unavailable
    ///
    /// Patterns, first match wins:
    /// 1. `Artist - Title`
    /// 2. `01. Title` / `01 Title`
    /// 3. `Artist_Album_Title`
    ///
    /// Anything else keeps the bare stem as the title.
    fn apply_filename_patterns(&mut self) {
        let stem = file_stem(&self.path);
        self.title = stem.clone();

        if let Some((artist, title)) = stem.split_once(" - ") {
            let artist = artist.trim();
            if !artist.is_empty() {
                self.artist = Some(artist.to_string());
                self.title = title.trim().to_string();
            }
            return;
        }

        if let Some(captures) = NUMBERED_TITLE.captures(&stem) {
            if let Ok(number) = captures[1].parse::<u32>() {
                self.track_number = number;
                self.title = captures[2].trim().to_string();
            }
            return;
        }

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() >= 3 {
            self.artist = non_empty(parts[0]);
            self.album = non_empty(parts[1]);
            if let Some(title) = non_empty(parts[2]) {
                self.title = title;
            }
        }
    }
}

/// Builds [`TrackRecord`]s from file paths
///
/// The library engine scans through this trait so a scan can be driven with
/// a different builder.
pub trait RecordBuilder: Send + Sync {
    fn build(&self, path: &Path) -> Result<TrackRecord, RecordBuildError>;
}

/// Tag-first builder with filename and folder fallbacks
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackRecordBuilder;

impl TrackRecordBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Copy tag fields into `record`
    ///
    /// Returns `false` when the file has no readable tag at all.
    fn apply_tags(&self, record: &mut TrackRecord) -> bool {
        let tagged_file = match Probe::open(&record.path).and_then(|probe| probe.read()) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(file = %record.path.display(), error = %e, "Tag read failed");
                return false;
            }
        };

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            tracing::debug!(file = %record.path.display(), "No tags present");
            return false;
        };

        if let Some(title) = tag.title().as_deref().and_then(non_empty) {
            record.title = title;
        }
        record.artist = tag.artist().as_deref().and_then(non_empty);
        record.album = tag.album().as_deref().and_then(non_empty);
        record.track_number = tag.track().unwrap_or(0);
        record.artwork = tag
            .pictures()
            .first()
            .map(|picture| picture.data())
            .filter(|data| !data.is_empty())
            .map(Arc::from);

        true
    }
}

impl RecordBuilder for TrackRecordBuilder {
    fn build(&self, path: &Path) -> Result<TrackRecord, RecordBuildError> {
        std::fs::File::open(path)
            .map_err(|e| RecordBuildError::Unreadable(path.to_path_buf(), e.to_string()))?;

        let mut record = TrackRecord::for_path(path);

        if !self.apply_tags(&mut record) {
            tracing::debug!(file = %path.display(), "Falling back to filename parsing");
            record.apply_filename_patterns();
        }

        record.apply_folder_inference();

        tracing::debug!(
            file = %path.display(),
            title = %record.title,
            artist = ?record.artist,
            album = ?record.album,
            track = record.track_number,
            "Built track record"
        );

        Ok(record)
    }
}

/// File name without its extension
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Folder name usable as album/artist, skipping generic names
fn folder_name(dir: &Path) -> Option<String> {
    let name = dir.file_name()?.to_string_lossy();
    let name = name.trim();
    if name.is_empty() || name == "." {
        return None;
    }
    if GENERIC_FOLDER_NAMES
        .iter()
        .any(|generic| generic.eq_ignore_ascii_case(name))
    {
        return None;
    }
    Some(name.to_string())
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

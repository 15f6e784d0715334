//! Library engine
//!
//! Owns the catalog snapshot and runs scans. Readers always get copies; a
//! scan builds its result off-lock and publishes it in one swap.
//!
//! Scan lifecycle:
//! 1. Mark scanning and publish an empty snapshot
//! 2. Walk the root, building one [`TrackRecord`] per supported file
//! 3. Sort, group into albums
//! 4. Publish the new snapshot and clear the scanning flag
//!
//! Observers learn about both transitions through [`LibraryEvent`]s, which
//! are sent only after the lock is released.

use super::ordering::{group_into_albums, sort_tracks, Album};
use super::track::{RecordBuilder, TrackRecord, TrackRecordBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// File extensions picked up by a scan (compared case-insensitively)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3"];

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Library scan errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// `rescan` called before any root was selected
    #[error("No music folder selected")]
    NoRootSelected,

    /// Root folder missing or unreadable; aborts the scan
    #[error("Cannot read music folder {0}: {1}")]
    RootUnreadable(PathBuf, String),

    /// A subdirectory could not be listed; the scan skips it
    #[error("Cannot read directory {0}: {1}")]
    DirectoryUnreadable(PathBuf, String),
}

/// Notifications about library state changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    ScanningChanged { scanning: bool },
    LibraryChanged { songs: usize, albums: usize },
}

/// Outcome of a completed scan
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub songs: usize,
    pub albums: usize,
    /// Supported files the builder could not read
    pub skipped_files: usize,
    /// Subdirectories that could not be listed
    pub skipped_directories: usize,
    pub elapsed: Duration,
}

/// One published catalog
#[derive(Debug, Default)]
pub struct LibrarySnapshot {
    songs: Vec<TrackRecord>,
    albums: Vec<Album>,
    index: HashMap<Uuid, usize>,
}

impl LibrarySnapshot {
    fn new(songs: Vec<TrackRecord>, albums: Vec<Album>) -> Self {
        let index = songs
            .iter()
            .enumerate()
            .map(|(position, song)| (song.id, position))
            .collect();
        Self {
            songs,
            albums,
            index,
        }
    }

    pub fn songs(&self) -> &[TrackRecord] {
        &self.songs
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn song(&self, id: Uuid) -> Option<&TrackRecord> {
        self.index.get(&id).map(|&position| &self.songs[position])
    }
}

#[derive(Debug, Default)]
struct LibraryState {
    root: Option<PathBuf>,
    scanning: bool,
    snapshot: Arc<LibrarySnapshot>,
}

/// Walk statistics
#[derive(Debug, Default)]
struct WalkOutcome {
    tracks: Vec<TrackRecord>,
    skipped_files: usize,
    skipped_directories: usize,
}

/// Thread-safe music catalog
pub struct LibraryEngine {
    state: RwLock<LibraryState>,
    builder: Arc<dyn RecordBuilder>,
    events: broadcast::Sender<LibraryEvent>,
}

impl LibraryEngine {
    /// Engine with an empty catalog and the default tag-first builder
    pub fn new() -> Self {
        Self::with_builder(Arc::new(TrackRecordBuilder::new()))
    }

    pub fn with_builder(builder: Arc<dyn RecordBuilder>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(LibraryState::default()),
            builder,
            events,
        }
    }

    // ========================================
    // Reads
    // ========================================

    /// Current snapshot, shared
    pub fn snapshot(&self) -> Arc<LibrarySnapshot> {
        Arc::clone(&self.read().snapshot)
    }

    /// Copy of all songs in catalog order
    pub fn songs(&self) -> Vec<TrackRecord> {
        self.snapshot().songs.clone()
    }

    /// Copy of all albums, sorted by name
    pub fn albums(&self) -> Vec<Album> {
        self.snapshot().albums.clone()
    }

    pub fn song(&self, id: Uuid) -> Option<TrackRecord> {
        self.snapshot().song(id).cloned()
    }

    pub fn is_scanning(&self) -> bool {
        self.read().scanning
    }

    pub fn root(&self) -> Option<PathBuf> {
        self.read().root.clone()
    }

    pub fn song_count(&self) -> usize {
        self.read().snapshot.songs.len()
    }

    pub fn album_count(&self) -> usize {
        self.read().snapshot.albums.len()
    }

    /// Receive scanning and catalog change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    // ========================================
    // Scanning
    // ========================================

    /// Set the music folder and rescan it on a blocking worker
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    pub fn select_root(
        self: &Arc<Self>,
        root: impl Into<PathBuf>,
    ) -> JoinHandle<Result<ScanSummary, ScanError>> {
        let root = root.into();
        info!("Music folder selected: {}", root.display());
        self.write().root = Some(root);

        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.rescan())
    }

    /// Scan the selected root on the calling thread
    pub fn rescan(&self) -> Result<ScanSummary, ScanError> {
        let Some(root) = self.root() else {
            warn!("Rescan requested with no music folder selected");
            return Err(ScanError::NoRootSelected);
        };

        let started = Instant::now();
        info!("Scanning music folder: {}", root.display());

        {
            let mut state = self.write();
            state.scanning = true;
            state.snapshot = Arc::new(LibrarySnapshot::default());
        }
        self.emit(LibraryEvent::ScanningChanged { scanning: true });
        self.emit(LibraryEvent::LibraryChanged {
            songs: 0,
            albums: 0,
        });

        let outcome = match self.walk(&root) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Scan aborted: {}", e);
                self.write().scanning = false;
                self.emit(LibraryEvent::ScanningChanged { scanning: false });
                return Err(e);
            }
        };

        let songs = sort_tracks(outcome.tracks);
        let albums = group_into_albums(&songs);
        let summary = ScanSummary {
            songs: songs.len(),
            albums: albums.len(),
            skipped_files: outcome.skipped_files,
            skipped_directories: outcome.skipped_directories,
            elapsed: started.elapsed(),
        };
        let snapshot = Arc::new(LibrarySnapshot::new(songs, albums));

        {
            let mut state = self.write();
            state.snapshot = snapshot;
            state.scanning = false;
        }
        self.emit(LibraryEvent::ScanningChanged { scanning: false });
        self.emit(LibraryEvent::LibraryChanged {
            songs: summary.songs,
            albums: summary.albums,
        });

        info!(
            songs = summary.songs,
            albums = summary.albums,
            skipped_files = summary.skipped_files,
            skipped_directories = summary.skipped_directories,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Scan complete"
        );

        Ok(summary)
    }

    /// Walk `root` and build records for every supported file
    fn walk(&self, root: &Path) -> Result<WalkOutcome, ScanError> {
        std::fs::read_dir(root)
            .map_err(|e| ScanError::RootUnreadable(root.to_path_buf(), e.to_string()))?;

        let mut outcome = WalkOutcome::default();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    if e.depth() == 0 {
                        return Err(ScanError::RootUnreadable(path, e.to_string()));
                    }
                    warn!("{}", ScanError::DirectoryUnreadable(path, e.to_string()));
                    outcome.skipped_directories += 1;
                    continue;
                }
            };

            let path = entry.path();
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && path.is_file());
            if !is_file || !is_supported_audio(path) {
                continue;
            }

            match self.builder.build(path) {
                Ok(record) => outcome.tracks.push(record),
                Err(e) => {
                    warn!("Skipping file: {}", e);
                    outcome.skipped_files += 1;
                }
            }
        }

        debug!(
            "Walk of {} found {} tracks",
            root.display(),
            outcome.tracks.len()
        );

        Ok(outcome)
    }

    fn emit(&self, event: LibraryEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, LibraryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LibraryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LibraryEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// True for files with a supported audio extension
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::track::RecordBuildError;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Builder that can park the scan inside its first build call
    struct GatedBuilder {
        inner: TrackRecordBuilder,
        hold: AtomicBool,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl RecordBuilder for GatedBuilder {
        fn build(&self, path: &Path) -> Result<TrackRecord, RecordBuildError> {
            if self.hold.load(Ordering::SeqCst) {
                self.entered.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            self.inner.build(path)
        }
    }

    fn write_files(root: &Path, files: &[&str]) {
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"fake audio").unwrap();
        }
    }

    fn engine_for(root: &Path) -> LibraryEngine {
        let engine = LibraryEngine::new();
        engine.write().root = Some(root.to_path_buf());
        engine
    }

    #[test]
    fn test_new_engine_is_empty() {
        let engine = LibraryEngine::new();
        assert!(engine.songs().is_empty());
        assert!(engine.albums().is_empty());
        assert!(!engine.is_scanning());
        assert!(engine.root().is_none());
    }

    #[test]
    fn test_rescan_without_root() {
        let engine = LibraryEngine::new();
        assert!(matches!(engine.rescan(), Err(ScanError::NoRootSelected)));
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_audio(Path::new("a.mp3")));
        assert!(is_supported_audio(Path::new("a.MP3")));
        assert!(!is_supported_audio(Path::new("a.flac")));
        assert!(!is_supported_audio(Path::new("cover.jpg")));
        assert!(!is_supported_audio(Path::new("mp3")));
    }

    #[test]
    fn test_scan_builds_sorted_catalog() {
        let temp_dir = TempDir::new().unwrap();
        write_files(
            temp_dir.path(),
            &[
                "Artist/Record/10 Intro.mp3",
                "Artist/Record/2 Verse.mp3",
                "Artist/Record/notes.txt",
                "Artist/Record/cover.jpg",
            ],
        );

        let engine = engine_for(temp_dir.path());
        let summary = engine.rescan().unwrap();
        assert_eq!(summary.songs, 2);
        assert_eq!(summary.albums, 1);

        let songs = engine.songs();
        let titles: Vec<&str> = songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Verse", "Intro"]);
        assert_eq!(songs[0].album.as_deref(), Some("Record"));
        assert_eq!(songs[0].artist.as_deref(), Some("Artist"));

        let found = engine.song(songs[1].id).unwrap();
        assert_eq!(found.title, "Intro");
        assert!(engine.song(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_rescan_issues_fresh_ids() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path(), &["Album/track.mp3"]);

        let engine = engine_for(temp_dir.path());
        engine.rescan().unwrap();
        let before = engine.songs()[0].id;
        engine.rescan().unwrap();
        let after = engine.songs()[0].id;

        assert_ne!(before, after);
        assert!(engine.song(before).is_none());
    }

    #[test]
    fn test_scan_events_in_order() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path(), &["One/a.mp3", "Two/b.mp3"]);

        let engine = engine_for(temp_dir.path());
        let mut events = engine.subscribe();
        engine.rescan().unwrap();

        let received: Vec<LibraryEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(
            received,
            vec![
                LibraryEvent::ScanningChanged { scanning: true },
                LibraryEvent::LibraryChanged {
                    songs: 0,
                    albums: 0
                },
                LibraryEvent::ScanningChanged { scanning: false },
                LibraryEvent::LibraryChanged {
                    songs: 2,
                    albums: 2
                },
            ]
        );
    }

    #[test]
    fn test_missing_root_is_fatal_and_leaves_catalog_empty() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path(), &["Album/track.mp3"]);

        let engine = engine_for(temp_dir.path());
        engine.rescan().unwrap();
        assert_eq!(engine.song_count(), 1);

        engine.write().root = Some(temp_dir.path().join("gone"));
        let mut events = engine.subscribe();
        let result = engine.rescan();

        assert!(matches!(result, Err(ScanError::RootUnreadable(_, _))));
        assert_eq!(engine.song_count(), 0);
        assert_eq!(engine.album_count(), 0);
        assert!(!engine.is_scanning());

        let received: Vec<LibraryEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(
            received.last(),
            Some(&LibraryEvent::ScanningChanged { scanning: false })
        );
    }

    #[test]
    fn test_catalog_empty_while_scan_in_progress() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path(), &["Album/a.mp3", "Album/b.mp3"]);

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let builder = Arc::new(GatedBuilder {
            inner: TrackRecordBuilder::new(),
            hold: AtomicBool::new(false),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });

        let engine = Arc::new(LibraryEngine::with_builder(builder.clone()));
        engine.write().root = Some(temp_dir.path().to_path_buf());
        engine.rescan().unwrap();
        assert_eq!(engine.song_count(), 2);

        builder.hold.store(true, Ordering::SeqCst);
        let scanning_engine = Arc::clone(&engine);
        let handle = std::thread::spawn(move || scanning_engine.rescan());

        entered_rx.recv().unwrap();
        assert!(engine.is_scanning());
        assert!(engine.songs().is_empty());
        assert!(engine.albums().is_empty());

        builder.hold.store(false, Ordering::SeqCst);
        release_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();

        assert!(!engine.is_scanning());
        assert_eq!(engine.song_count(), 2);
    }

    /// Refuses any file whose name contains "broken"
    struct RefusingBuilder;

    impl RecordBuilder for RefusingBuilder {
        fn build(&self, path: &Path) -> Result<TrackRecord, RecordBuildError> {
            if path.to_string_lossy().contains("broken") {
                return Err(RecordBuildError::Unreadable(
                    path.to_path_buf(),
                    "refused".to_string(),
                ));
            }
            TrackRecordBuilder::new().build(path)
        }
    }

    #[test]
    fn test_unbuildable_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_files(
            temp_dir.path(),
            &["Album/01 good.mp3", "Album/02 broken.mp3", "Album/03 fine.mp3"],
        );

        let engine = LibraryEngine::with_builder(Arc::new(RefusingBuilder));
        engine.write().root = Some(temp_dir.path().to_path_buf());
        let summary = engine.rescan().unwrap();

        assert_eq!(summary.skipped_files, 1);
        assert_eq!(summary.skipped_directories, 0);
        assert_eq!(summary.songs, 2);
        let titles: Vec<String> = engine.songs().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["good", "fine"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        write_files(
            temp_dir.path(),
            &["Locked/hidden.mp3", "Open/01 visible.mp3", "Zed/02 also.mp3"],
        );
        let locked = temp_dir.path().join("Locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind a privileged user
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let engine = engine_for(temp_dir.path());
        let result = engine.rescan();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let summary = result.unwrap();

        assert_eq!(summary.skipped_directories, 1);
        assert_eq!(summary.skipped_files, 0);
        assert_eq!(summary.songs, 2);
        let albums: Vec<String> = engine.albums().into_iter().map(|a| a.name).collect();
        assert_eq!(albums, vec!["Open", "Zed"]);
    }

    #[tokio::test]
    async fn test_select_root_scans_in_background() {
        let temp_dir = TempDir::new().unwrap();
        write_files(temp_dir.path(), &["Band/Album/01 Song.mp3"]);

        let engine = Arc::new(LibraryEngine::new());
        let summary = engine
            .select_root(temp_dir.path())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.songs, 1);
        assert_eq!(engine.root().as_deref(), Some(temp_dir.path()));
        assert_eq!(engine.albums()[0].name, "Album");
    }
}

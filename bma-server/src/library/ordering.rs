//! Catalog ordering and album grouping
//!
//! Songs are ordered by album (case-insensitive), then by
//! [`compare_tracks`] within an album. Albums are the sorted songs grouped by
//! [`TrackRecord::album_name`].

use super::track::TrackRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

static LEADING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)").expect("leading digits pattern is valid"));

/// A derived grouping of tracks sharing one album name
#[derive(Debug, Clone)]
pub struct Album {
    pub id: Uuid,
    /// Never empty; `Unknown Album` when nothing better is known
    pub name: String,
    /// Artist of the first track
    pub artist: Option<String>,
    /// Member tracks in catalog order
    pub tracks: Vec<TrackRecord>,
}

impl Album {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Numbered-track-priority comparison within an album
///
/// 1. Both have a track number: compare numbers, ties by title.
/// 2. Only one has a track number: that one goes first.
/// 3. Neither: leading digits of the title, zero-padded to two places and
///    compared as text. A title with digits beats one without.
/// 4. Otherwise titles, case-insensitively.
pub fn compare_tracks(a: &TrackRecord, b: &TrackRecord) -> Ordering {
    match (a.track_number, b.track_number) {
        (0, 0) => {}
        (_, 0) => return Ordering::Less,
        (0, _) => return Ordering::Greater,
        (x, y) => return x.cmp(&y).then_with(|| compare_titles(a, b)),
    }

    match (leading_number(&a.title), leading_number(&b.title)) {
        (Some(x), Some(y)) => format!("{:02}", x)
            .cmp(&format!("{:02}", y))
            .then_with(|| compare_titles(a, b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_titles(a, b),
    }
}

/// Full catalog order: album name, then [`compare_tracks`]
pub fn compare_catalog(a: &TrackRecord, b: &TrackRecord) -> Ordering {
    a.album_name()
        .to_lowercase()
        .cmp(&b.album_name().to_lowercase())
        .then_with(|| compare_tracks(a, b))
}

/// Stable sort into catalog order
pub fn sort_tracks(mut tracks: Vec<TrackRecord>) -> Vec<TrackRecord> {
    tracks.sort_by(compare_catalog);
    tracks
}

/// Group already-sorted tracks into albums
///
/// Track order inside each album follows the input. Albums come back sorted
/// by case-insensitive name; albums whose names differ only in case keep
/// their first-seen order.
pub fn group_into_albums(sorted: &[TrackRecord]) -> Vec<Album> {
    let mut albums: Vec<Album> = Vec::new();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for track in sorted {
        let name = track.album_name();
        match index_by_name.get(&name) {
            Some(&index) => albums[index].tracks.push(track.clone()),
            None => {
                index_by_name.insert(name.clone(), albums.len());
                albums.push(Album {
                    id: Uuid::new_v4(),
                    name,
                    artist: track.artist.clone(),
                    tracks: vec![track.clone()],
                });
            }
        }
    }

    albums.sort_by_cached_key(|album| album.name.to_lowercase());
    albums
}

fn compare_titles(a: &TrackRecord, b: &TrackRecord) -> Ordering {
    a.title.to_lowercase().cmp(&b.title.to_lowercase())
}

/// Leading decimal digits of a title, if any fit in a u64
fn leading_number(title: &str) -> Option<u64> {
    LEADING_DIGITS
        .captures(title)
        .and_then(|captures| captures[1].parse().ok())
}

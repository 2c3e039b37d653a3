//! Writing statistics computed from a user's notes and tags.

use chrono::{DateTime, Utc};
use etu_types::{ListNotesResponse, ListTagsResponse, Note};
use serde::Serialize;

/// Upper bound on notes fetched for statistics.
pub const STATS_NOTE_LIMIT: i32 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_notes: i32,
    pub total_tags: usize,
    pub total_words: usize,
    pub first_note_date: Option<DateTime<Utc>>,
}

/// Summarize a note listing and a tag listing.
///
/// `total_notes` is the backend's count, which may exceed the notes returned.
#[must_use]
pub fn summarize(notes: &ListNotesResponse, tags: &ListTagsResponse) -> Stats {
    Stats {
        total_notes: notes.total,
        total_tags: tags.tags.len(),
        total_words: notes.notes.iter().map(Note::word_count).sum(),
        first_note_date: notes.notes.iter().map(Note::created).min(),
    }
}

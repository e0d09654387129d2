//! Queue navigation
//!
//! Owns the ordered song list, the cursor, shuffle/repeat modes and the bounded
//! history. All operations are synchronous and all-or-nothing: an operation that
//! returns an error leaves the queue untouched.
//!
//! Repeat-one is deliberately absent from index selection. The controller replays
//! the current song itself when it ends, so the cursor and history never move.

use crate::error::{QueueFault, QueueResult};
use crate::history::History;
use crate::shuffle;
use crate::types::{InsertPosition, RepeatMode};
use cadence_core::{Song, SongId};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Ordered playback queue with cursor, modes and history
#[derive(Debug, Clone)]
pub struct QueueManager {
    items: Vec<Song>,
    /// `Some` and in range whenever `items` is non-empty
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    history: History,
    rng: StdRng,
}

/// Read-only copy of the queue for observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<Song>,
    pub current_index: Option<usize>,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    /// Oldest first
    pub history: Vec<Song>,
}

/// Index that follows `current` under the given modes
///
/// Shared by `advance` and `peek_upcoming` so a preview makes exactly the picks a
/// later advance will make, given the same RNG state.
fn select_next(
    len: usize,
    current: Option<usize>,
    shuffle_enabled: bool,
    repeat: RepeatMode,
    rng: &mut StdRng,
) -> Option<usize> {
    let current = current?;
    if shuffle_enabled {
        return shuffle::pick_other(rng, len, current);
    }

    let next = current + 1;
    if next < len {
        Some(next)
    } else if repeat == RepeatMode::All {
        Some(0)
    } else {
        None
    }
}

impl QueueManager {
    /// Empty queue; `seed` fixes the shuffle RNG
    pub fn new(history_size: usize, seed: Option<u64>) -> Self {
        Self {
            items: Vec::new(),
            current: None,
            shuffle: false,
            repeat: RepeatMode::Off,
            history: History::new(history_size),
            rng: shuffle::shuffle_rng(seed),
        }
    }

    /// Replace the queue, clamping `start` into range
    ///
    /// History belongs to the old queue and is cleared.
    pub fn set_queue(&mut self, songs: Vec<Song>, start: usize) -> Option<usize> {
        self.current = if songs.is_empty() {
            None
        } else {
            Some(start.min(songs.len() - 1))
        };
        self.items = songs;
        self.history.clear();

        debug!(len = self.items.len(), current = ?self.current, "Queue replaced");
        self.current
    }

    /// Insert a song and return its index
    ///
    /// `Next` inserts right after the cursor. Adding to an empty queue makes the
    /// new song current.
    pub fn add_to_queue(&mut self, song: Song, position: InsertPosition) -> usize {
        let index = match (position, self.current) {
            (InsertPosition::Next, Some(current)) => current + 1,
            _ => self.items.len(),
        };
        self.items.insert(index, song);

        if self.current.is_none() {
            self.current = Some(index);
        }

        trace!(index, ?position, len = self.items.len(), "Song added to queue");
        index
    }

    /// Remove the song at `index`
    ///
    /// A removal before the cursor shifts it left so it keeps pointing at the same
    /// song. Removing the current song leaves the cursor on the song that followed
    /// it, or on the new last song.
    pub fn remove_from_queue(&mut self, index: usize) -> QueueResult<Song> {
        if index >= self.items.len() {
            return Err(QueueFault::InvalidIndex {
                index,
                len: self.items.len(),
            });
        }

        let removed = self.items.remove(index);
        self.current = match self.current {
            _ if self.items.is_empty() => None,
            Some(current) if index < current => Some(current - 1),
            Some(current) => Some(current.min(self.items.len() - 1)),
            None => Some(0),
        };

        trace!(index, current = ?self.current, "Song removed from queue");
        Ok(removed)
    }

    /// Move to the next index
    ///
    /// Returns `Ok(None)` when the queue is exhausted; the cursor is unchanged.
    pub fn advance(&mut self) -> QueueResult<Option<usize>> {
        if self.items.is_empty() {
            return Err(QueueFault::EmptyQueue);
        }

        let next = select_next(
            self.items.len(),
            self.current,
            self.shuffle,
            self.repeat,
            &mut self.rng,
        );
        if let Some(next) = next {
            self.move_to(next);
        }

        debug!(next = ?next, shuffle = self.shuffle, repeat = ?self.repeat, "Queue advanced");
        Ok(next)
    }

    /// Move to the previous index, wrapping to the end
    ///
    /// Ignores shuffle and repeat.
    pub fn retreat(&mut self) -> QueueResult<Option<usize>> {
        let previous = self.previous_index().ok_or(QueueFault::EmptyQueue)?;
        self.move_to(previous);

        debug!(previous, "Queue retreated");
        Ok(Some(previous))
    }

    /// Make `index` current
    pub fn jump_to(&mut self, index: usize) -> QueueResult<&Song> {
        if index >= self.items.len() {
            return Err(QueueFault::InvalidIndex {
                index,
                len: self.items.len(),
            });
        }

        self.move_to(index);
        Ok(&self.items[index])
    }

    /// Index `retreat` would move to
    pub fn previous_index(&self) -> Option<usize> {
        let len = self.items.len();
        self.current.map(|current| (current + len - 1) % len)
    }

    /// Flip shuffle and return the new setting
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.shuffle = enabled;
    }

    /// Rotate `Off -> One -> All -> Off` and return the new mode
    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycled();
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    /// Preview up to `n` songs that `advance` would play next
    ///
    /// Nothing is mutated. The iterator can be cloned to restart it from the same
    /// point, and in shuffle mode it runs on a copy of the RNG so its picks match
    /// the following advances as long as the queue is not changed in between.
    pub fn peek_upcoming(&self, n: usize) -> Upcoming<'_> {
        Upcoming {
            items: &self.items,
            cursor: self.current,
            remaining: n,
            shuffle: self.shuffle,
            repeat: self.repeat,
            rng: self.rng.clone(),
        }
    }

    pub fn current(&self) -> Option<&Song> {
        self.current.map(|index| &self.items[index])
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn items(&self) -> &[Song] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Song> {
        self.items.get(index)
    }

    /// Position of the first song with `id`
    pub fn position_of(&self, id: &SongId) -> Option<usize> {
        self.items.iter().position(|song| &song.id == id)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.items.clone(),
            current_index: self.current,
            shuffle_enabled: self.shuffle,
            repeat_mode: self.repeat,
            history: self.history.iter().cloned().collect(),
        }
    }

    /// Move the cursor, recording the old song only on an actual change
    fn move_to(&mut self, index: usize) {
        if let Some(current) = self.current {
            if current != index {
                self.history.push(self.items[current].clone());
            }
        }
        self.current = Some(index);
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(20, None)
    }
}

/// Lazy preview of upcoming songs; see [`QueueManager::peek_upcoming`]
#[derive(Debug, Clone)]
pub struct Upcoming<'a> {
    items: &'a [Song],
    cursor: Option<usize>,
    remaining: usize,
    shuffle: bool,
    repeat: RepeatMode,
    rng: StdRng,
}

impl<'a> Iterator for Upcoming<'a> {
    type Item = &'a Song;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let Some(next) = select_next(
            self.items.len(),
            self.cursor,
            self.shuffle,
            self.repeat,
            &mut self.rng,
        ) else {
            self.remaining = 0;
            return None;
        };

        self.cursor = Some(next);
        self.remaining -= 1;
        Some(&self.items[next])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str) -> Song {
        Song::builder(id, format!("Song {id}")).build()
    }

    fn queue_of(ids: &[&str]) -> QueueManager {
        let mut queue = QueueManager::new(20, Some(7));
        queue.set_queue(ids.iter().map(|id| song(id)).collect(), 0);
        queue
    }

    fn ids<'a>(songs: impl Iterator<Item = &'a Song>) -> Vec<&'a str> {
        songs.map(|song| song.id.as_str()).collect()
    }

    #[test]
    fn set_queue_clamps_start() {
        let mut queue = QueueManager::default();
        assert_eq!(queue.set_queue(vec![song("a"), song("b")], 9), Some(1));
        assert_eq!(queue.set_queue(Vec::new(), 3), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn set_queue_clears_history() {
        let mut queue = queue_of(&["a", "b"]);
        queue.advance().unwrap();
        assert_eq!(queue.history().len(), 1);

        queue.set_queue(vec![song("c")], 0);
        assert!(queue.history().is_empty());
    }

    #[test]
    fn add_next_inserts_after_cursor() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.jump_to(1).unwrap();

        let index = queue.add_to_queue(song("x"), InsertPosition::Next);

        assert_eq!(index, 2);
        assert_eq!(ids(queue.items().iter()), vec!["a", "b", "x", "c"]);
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn add_to_empty_queue_becomes_current() {
        let mut queue = QueueManager::default();
        queue.add_to_queue(song("a"), InsertPosition::Next);
        assert_eq!(queue.current_index(), Some(0));

        queue.add_to_queue(song("b"), InsertPosition::End);
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn remove_before_cursor_shifts_left() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.jump_to(2).unwrap();

        let removed = queue.remove_from_queue(0).unwrap();

        assert_eq!(removed.id.as_str(), "a");
        assert_eq!(queue.current().unwrap().id.as_str(), "c");
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn remove_current_reclamps() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.jump_to(2).unwrap();

        queue.remove_from_queue(2).unwrap();
        assert_eq!(queue.current_index(), Some(1));

        queue.jump_to(0).unwrap();
        queue.remove_from_queue(0).unwrap();
        assert_eq!(queue.current().unwrap().id.as_str(), "b");

        queue.remove_from_queue(0).unwrap();
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn remove_out_of_range_is_rejected() {
        let mut queue = queue_of(&["a"]);
        assert_eq!(
            queue.remove_from_queue(3),
            Err(QueueFault::InvalidIndex { index: 3, len: 1 })
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn advance_on_empty_queue_fails() {
        let mut queue = QueueManager::default();
        assert_eq!(queue.advance(), Err(QueueFault::EmptyQueue));
        assert_eq!(queue.retreat(), Err(QueueFault::EmptyQueue));
    }

    #[test]
    fn advance_stops_at_end_without_repeat() {
        let mut queue = queue_of(&["s1", "s2", "s3"]);
        queue.jump_to(2).unwrap();
        let history_before = queue.history().len();

        assert_eq!(queue.advance(), Ok(None));
        assert_eq!(queue.current_index(), Some(2));
        assert_eq!(queue.history().len(), history_before);
    }

    #[test]
    fn advance_wraps_with_repeat_all() {
        let mut queue = queue_of(&["s1", "s2", "s3"]);
        queue.jump_to(2).unwrap();
        queue.set_repeat(RepeatMode::All);

        assert_eq!(queue.advance(), Ok(Some(0)));
    }

    #[test]
    fn repeat_one_does_not_change_selection() {
        let mut queue = queue_of(&["s1", "s2"]);
        queue.set_repeat(RepeatMode::One);

        assert_eq!(queue.advance(), Ok(Some(1)));
        assert_eq!(queue.advance(), Ok(None));
    }

    #[test]
    fn single_song_repeat_all_keeps_history_empty() {
        let mut queue = queue_of(&["only"]);
        queue.set_repeat(RepeatMode::All);

        assert_eq!(queue.advance(), Ok(Some(0)));
        assert!(queue.history().is_empty());
    }

    #[test]
    fn retreat_wraps_to_end() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(queue.retreat(), Ok(Some(2)));
        assert_eq!(queue.retreat(), Ok(Some(1)));
        assert_eq!(ids(queue.history().iter()), vec!["a", "c"]);
    }

    #[test]
    fn shuffle_with_single_song_has_no_next() {
        let mut queue = queue_of(&["only"]);
        queue.toggle_shuffle();
        assert_eq!(queue.advance(), Ok(None));
    }

    #[test]
    fn cycle_repeat_rotates() {
        let mut queue = QueueManager::default();
        assert_eq!(queue.cycle_repeat(), RepeatMode::One);
        assert_eq!(queue.cycle_repeat(), RepeatMode::All);
        assert_eq!(queue.cycle_repeat(), RepeatMode::Off);
    }

    #[test]
    fn peek_stops_at_end() {
        let queue = queue_of(&["a", "b", "c"]);
        assert_eq!(ids(queue.peek_upcoming(5)), vec!["b", "c"]);
    }

    #[test]
    fn peek_wraps_with_repeat_all() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.set_repeat(RepeatMode::All);
        queue.jump_to(1).unwrap();

        assert_eq!(ids(queue.peek_upcoming(4)), vec!["c", "a", "b", "c"]);
    }

    #[test]
    fn peek_is_restartable_and_pure() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        queue.toggle_shuffle();

        let upcoming = queue.peek_upcoming(3);
        let first: Vec<_> = ids(upcoming.clone());
        let second: Vec<_> = ids(upcoming);
        assert_eq!(first, second);
        assert_eq!(queue.current_index(), Some(0));
        assert!(queue.history().is_empty());
    }

    #[test]
    fn shuffle_peek_matches_advances() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e"]);
        queue.toggle_shuffle();

        let preview: Vec<SongId> = queue.peek_upcoming(6).map(|s| s.id.clone()).collect();
        let mut actual = Vec::new();
        for _ in 0..6 {
            queue.advance().unwrap();
            actual.push(queue.current().unwrap().id.clone());
        }

        assert_eq!(preview, actual);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut queue = queue_of(&["a", "b"]);
        queue.advance().unwrap();
        queue.cycle_repeat();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.current_index, Some(1));
        assert_eq!(snapshot.repeat_mode, RepeatMode::One);
        assert_eq!(snapshot.history.len(), 1);
        assert!(!snapshot.shuffle_enabled);
    }
}

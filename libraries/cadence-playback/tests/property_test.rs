//! Property-based tests for queue navigation
//!
//! Random edit and navigation sequences must keep the cursor valid, the history
//! bounded and the preview consistent with what `advance` actually does.

mod common;

use cadence_playback::{InsertPosition, QueueManager, RepeatMode};
use common::inline_song;
use proptest::prelude::*;

// ===== Helpers =====

#[derive(Debug, Clone)]
enum Op {
    Add(bool),
    Remove(usize),
    Advance,
    Retreat,
    Jump(usize),
    ToggleShuffle,
    CycleRepeat,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Add),
        (0usize..12).prop_map(Op::Remove),
        Just(Op::Advance),
        Just(Op::Retreat),
        (0usize..12).prop_map(Op::Jump),
        Just(Op::ToggleShuffle),
        Just(Op::CycleRepeat),
    ]
}

fn apply(queue: &mut QueueManager, op: &Op, counter: &mut usize) {
    match op {
        Op::Add(next) => {
            *counter += 1;
            let position = if *next {
                InsertPosition::Next
            } else {
                InsertPosition::End
            };
            queue.add_to_queue(inline_song(&format!("s{counter}"), 60), position);
        }
        Op::Remove(index) => {
            let _ = queue.remove_from_queue(*index);
        }
        Op::Advance => {
            let _ = queue.advance();
        }
        Op::Retreat => {
            let _ = queue.retreat();
        }
        Op::Jump(index) => {
            let _ = queue.jump_to(*index);
        }
        Op::ToggleShuffle => {
            queue.toggle_shuffle();
        }
        Op::CycleRepeat => {
            queue.cycle_repeat();
        }
    }
}

// ===== Property Tests =====

proptest! {
    /// Property: the cursor is in range exactly when the queue is non-empty
    #[test]
    fn cursor_always_valid(
        history_size in 0usize..8,
        seed in any::<u64>(),
        ops in prop::collection::vec(op(), 1..80)
    ) {
        let mut queue = QueueManager::new(history_size, Some(seed));
        let mut counter = 0;

        for op in &ops {
            apply(&mut queue, op, &mut counter);

            match queue.current_index() {
                Some(index) => prop_assert!(index < queue.len()),
                None => prop_assert!(queue.is_empty()),
            }
            prop_assert!(queue.history().len() <= history_size);
        }
    }

    /// Property: a failed operation leaves the queue unchanged
    #[test]
    fn failed_operations_change_nothing(
        len in 0usize..6,
        index in 6usize..20
    ) {
        let mut queue = QueueManager::new(20, Some(1));
        for i in 0..len {
            queue.add_to_queue(inline_song(&format!("s{i}"), 60), InsertPosition::End);
        }
        let before = queue.snapshot();

        prop_assert!(queue.jump_to(index).is_err());
        prop_assert!(queue.remove_from_queue(index).is_err());
        prop_assert_eq!(queue.snapshot(), before);
    }

    /// Property: the preview lists exactly the songs the next advances play
    #[test]
    fn preview_matches_advances(
        len in 1usize..10,
        start in 0usize..10,
        shuffle in any::<bool>(),
        repeat_all in any::<bool>(),
        seed in any::<u64>(),
        n in 0usize..15
    ) {
        let mut queue = QueueManager::new(20, Some(seed));
        let songs = (0..len).map(|i| inline_song(&format!("s{i}"), 60)).collect();
        queue.set_queue(songs, start);
        queue.set_shuffle(shuffle);
        if repeat_all {
            queue.set_repeat(RepeatMode::All);
        }

        let preview: Vec<String> = queue
            .peek_upcoming(n)
            .map(|song| song.id.to_string())
            .collect();

        let mut played = Vec::new();
        for _ in 0..n {
            match queue.advance().unwrap() {
                Some(index) => played.push(queue.get(index).unwrap().id.to_string()),
                None => break,
            }
        }

        prop_assert_eq!(preview, played);
    }

    /// Property: shuffle never selects the current song when another exists
    #[test]
    fn shuffle_never_picks_current(
        len in 2usize..10,
        seed in any::<u64>(),
        steps in 1usize..50
    ) {
        let mut queue = QueueManager::new(20, Some(seed));
        let songs = (0..len).map(|i| inline_song(&format!("s{i}"), 60)).collect();
        queue.set_queue(songs, 0);
        queue.set_shuffle(true);

        for _ in 0..steps {
            let before = queue.current_index();
            let next = queue.advance().unwrap();
            prop_assert!(next.is_some());
            prop_assert_ne!(next, before);
        }
    }
}

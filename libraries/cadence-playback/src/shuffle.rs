//! Random selection for shuffle mode
//!
//! Shuffle never reorders the queue. Each step picks uniformly among every index
//! except the current one, so the queue order survives toggling shuffle off.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// RNG for shuffle selection; fixed seed for reproducible runs
pub fn shuffle_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Pick an index in `0..len` other than `current`, uniformly
///
/// Returns `None` when there is no other index (`len <= 1`).
pub fn pick_other(rng: &mut StdRng, len: usize, current: usize) -> Option<usize> {
    if len <= 1 {
        return None;
    }
    // Draw from the len - 1 other slots and skip over the current one
    let pick = rng.gen_range(0..len - 1);
    Some(if pick >= current { pick + 1 } else { pick })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn single_item_has_no_other() {
        let mut rng = shuffle_rng(Some(1));
        assert_eq!(pick_other(&mut rng, 0, 0), None);
        assert_eq!(pick_other(&mut rng, 1, 0), None);
    }

    #[test]
    fn two_items_always_pick_the_other() {
        let mut rng = shuffle_rng(Some(1));
        for _ in 0..50 {
            assert_eq!(pick_other(&mut rng, 2, 0), Some(1));
            assert_eq!(pick_other(&mut rng, 2, 1), Some(0));
        }
    }

    #[test]
    fn picks_are_roughly_uniform() {
        let mut rng = shuffle_rng(Some(42));
        let mut counts: HashMap<usize, usize> = HashMap::new();

        for _ in 0..4000 {
            let pick = pick_other(&mut rng, 5, 2).unwrap();
            *counts.entry(pick).or_default() += 1;
        }

        assert!(!counts.contains_key(&2));
        assert_eq!(counts.len(), 4);
        // Expect ~1000 each
        for count in counts.values() {
            assert!((800..1200).contains(count), "skewed count {count}");
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = shuffle_rng(Some(9));
        let mut b = shuffle_rng(Some(9));
        let picks_a: Vec<_> = (0..20).map(|_| pick_other(&mut a, 10, 3)).collect();
        let picks_b: Vec<_> = (0..20).map(|_| pick_other(&mut b, 10, 3)).collect();
        assert_eq!(picks_a, picks_b);
    }
}

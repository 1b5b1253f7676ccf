//! Integration tests for priorities and the ready bitmap

use quickcheck_macros::quickcheck;
use rk0_core::{Priority, PriorityMask, PRIORITY_LEVELS};

#[test]
fn test_every_level_fits_the_mask() {
    let mut mask = PriorityMask::new();
    for level in 0..PRIORITY_LEVELS as u8 {
        let prio = Priority::new(level).expect("level in range");
        mask.set(prio);
        assert!(mask.is_set(prio));
    }
    assert_eq!(mask.raw(), u32::MAX);
    assert_eq!(mask.most_urgent(), Some(Priority::HIGHEST));
}

#[test]
fn test_clearing_last_level_empties_mask() {
    let mut mask = PriorityMask::new();
    let prio = Priority::new_unchecked(12);
    mask.set(prio);
    mask.clear(prio);
    assert!(mask.is_empty());
    assert_eq!(mask.most_urgent(), None);
}

#[quickcheck]
fn most_urgent_is_minimum_set_level(levels: Vec<u8>) -> bool {
    let mut mask = PriorityMask::new();
    let levels: Vec<u8> = levels
        .into_iter()
        .map(|l| l % PRIORITY_LEVELS as u8)
        .collect();
    for &l in &levels {
        mask.set(Priority::new_unchecked(l));
    }
    mask.most_urgent().map(Priority::raw) == levels.iter().copied().min()
}

use std::num::NonZeroUsize;

use erumby_core::{CyclicBuffer, OutOfRange};
use proptest::prelude::*;

fn cap(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

proptest! {
    #[test]
    fn at_k_is_the_kth_most_recent_push(
        capacity in 1usize..16,
        values in proptest::collection::vec(-1.0e3f32..1.0e3, 0..64),
    ) {
        let mut b = CyclicBuffer::new(cap(capacity));
        for v in &values {
            b.push(*v);
        }
        let held = values.len().min(capacity);
        prop_assert_eq!(b.size(), held);
        prop_assert_eq!(b.capacity(), capacity);
        for k in 0..held {
            prop_assert_eq!(*b.at(k).unwrap(), values[values.len() - 1 - k]);
        }
        prop_assert_eq!(b.at(held), Err(OutOfRange { index: held, len: held }));
    }

    #[test]
    fn filled_buffer_reads_fill_value_until_overwritten(
        capacity in 1usize..16,
        pushes in 0usize..16,
    ) {
        let mut b = CyclicBuffer::filled(cap(capacity), -1_i32);
        for i in 0..pushes {
            b.push(i32::try_from(i).unwrap());
        }
        prop_assert_eq!(b.size(), capacity);
        for k in 0..capacity {
            let expected = if k < pushes {
                i32::try_from(pushes - 1 - k).unwrap()
            } else {
                -1
            };
            prop_assert_eq!(*b.at(k).unwrap(), expected);
        }
    }
}

#[test]
fn capacity_one_is_a_single_register() {
    let mut b = CyclicBuffer::new(cap(1));
    b.push(3.0_f32);
    b.push(4.0);
    assert_eq!(b.size(), 1);
    assert_eq!(*b.at(0).unwrap(), 4.0);
    assert!(b.at(1).is_err());
}

#[test]
fn fill_restores_a_full_buffer() {
    let mut b = CyclicBuffer::new(cap(3));
    b.push(1_u8);
    assert_eq!(b.size(), 1);
    b.fill(9);
    assert_eq!(b.size(), 3);
    assert_eq!(b.iter().copied().collect::<Vec<_>>(), vec![9, 9, 9]);
}

//! Property-based tests using proptest
//!
//! Random operation sequences against every engine, checked against a
//! plain sorted-vector model.

use proptest::prelude::*;

use linked_heaps::{Heap, HeapEntry};

fn check_extraction_is_sorted<H: Heap<i32, i32>>(values: Vec<i32>) -> Result<(), TestCaseError> {
    let mut heap = H::new();
    for &value in &values {
        heap.insert(value, value);
    }
    prop_assert_eq!(heap.size(), values.len());

    let mut last = i32::MIN;
    let mut count = 0;
    while let Ok(entry) = heap.extract_minimum() {
        let key = *entry.key();
        prop_assert!(key >= last, "extracted {} after {}", key, last);
        last = key;
        count += 1;
    }
    prop_assert_eq!(count, values.len());
    Ok(())
}

fn check_minimum_tracks_model<H: Heap<i32, i32>>(
    ops: Vec<(bool, i32)>,
) -> Result<(), TestCaseError> {
    let mut heap = H::new();
    let mut model: Vec<i32> = Vec::new();

    for (extract, value) in ops {
        if extract && !heap.is_empty() {
            let key = *heap.extract_minimum().unwrap().key();
            let pos = model.iter().position(|&v| v == key);
            prop_assert!(pos.is_some(), "extracted {} not in model", key);
            model.swap_remove(pos.unwrap());
        } else {
            heap.insert(value, value);
            model.push(value);
        }

        prop_assert_eq!(heap.size(), model.len());
        match model.iter().min() {
            Some(&expected) => prop_assert_eq!(*heap.minimum().unwrap().key(), expected),
            None => prop_assert!(heap.minimum().is_err()),
        }
    }
    Ok(())
}

fn check_decrease_key_tracks_model<H: Heap<i32, i32>>(
    initial: Vec<i32>,
    decreases: Vec<(usize, i32)>,
) -> Result<(), TestCaseError> {
    let mut heap = H::new();
    let mut handles = Vec::new();
    let mut keys = initial.clone();

    for (index, &key) in initial.iter().enumerate() {
        handles.push(heap.insert(key, index as i32));
    }

    for (index, new_key) in decreases {
        if index >= handles.len() {
            continue;
        }
        if new_key <= keys[index] {
            heap.decrease_key(&handles[index], new_key).unwrap();
            keys[index] = new_key;
        } else {
            prop_assert!(heap.decrease_key(&handles[index], new_key).is_err());
        }

        if let Some(&expected) = keys.iter().min() {
            prop_assert_eq!(*heap.minimum().unwrap().key(), expected);
        }
    }
    Ok(())
}

fn check_union_preserves_multiset<H: Heap<i32, i32>>(
    left: Vec<i32>,
    right: Vec<i32>,
) -> Result<(), TestCaseError> {
    let mut one = H::new();
    let mut two = H::new();
    for &value in &left {
        one.insert(value, value);
    }
    for &value in &right {
        two.insert(value, value);
    }

    one.union(&mut two);
    prop_assert_eq!(one.size(), left.len() + right.len());
    prop_assert!(two.is_empty());

    let mut drained = Vec::new();
    while let Ok(entry) = one.extract_minimum() {
        drained.push(*entry.key());
    }
    let mut expected: Vec<i32> = left.iter().chain(right.iter()).copied().collect();
    expected.sort_unstable();
    prop_assert_eq!(drained, expected);
    Ok(())
}

fn check_delete_tracks_model<H: Heap<i32, i32>>(
    values: Vec<i32>,
    picks: Vec<usize>,
) -> Result<(), TestCaseError> {
    let mut heap = H::new();
    let mut handles = Vec::new();
    for &value in &values {
        handles.push(Some(heap.insert(value, value)));
    }
    let mut model = values.clone();

    for pick in picks {
        if handles.is_empty() {
            break;
        }
        let index = pick % handles.len();
        if let Some(handle) = handles[index].take() {
            heap.delete(&handle).unwrap();
            let pos = model.iter().position(|&v| v == values[index]).unwrap();
            model.swap_remove(pos);
            prop_assert!(!heap.holds_entry(&handle));
        }
        prop_assert_eq!(heap.size(), model.len());
    }

    let mut drained = Vec::new();
    while let Ok(entry) = heap.extract_minimum() {
        drained.push(*entry.key());
    }
    model.sort_unstable();
    prop_assert_eq!(drained, model);
    Ok(())
}

macro_rules! engine_properties {
    ($module:ident, $heap:ident) => {
        mod $module {
            use super::*;
            use linked_heaps::$module::$heap;

            proptest! {
                #[test]
                fn extraction_is_sorted(values in prop::collection::vec(-1000i32..1000, 0..200)) {
                    check_extraction_is_sorted::<$heap<i32, i32>>(values)?;
                }

                #[test]
                fn minimum_tracks_model(
                    ops in prop::collection::vec((any::<bool>(), -100i32..100), 0..150)
                ) {
                    check_minimum_tracks_model::<$heap<i32, i32>>(ops)?;
                }

                #[test]
                fn decrease_key_tracks_model(
                    initial in prop::collection::vec(-100i32..100, 1..60),
                    decreases in prop::collection::vec((0usize..60, -200i32..200), 0..40)
                ) {
                    check_decrease_key_tracks_model::<$heap<i32, i32>>(initial, decreases)?;
                }

                #[test]
                fn union_preserves_multiset(
                    left in prop::collection::vec(-100i32..100, 0..60),
                    right in prop::collection::vec(-100i32..100, 0..60)
                ) {
                    check_union_preserves_multiset::<$heap<i32, i32>>(left, right)?;
                }

                #[test]
                fn delete_tracks_model(
                    values in prop::collection::vec(-100i32..100, 1..60),
                    picks in prop::collection::vec(0usize..1000, 0..30)
                ) {
                    check_delete_tracks_model::<$heap<i32, i32>>(values, picks)?;
                }
            }
        }
    };
}

engine_properties!(binomial, BinomialHeap);
engine_properties!(fibonacci, FibonacciHeap);
engine_properties!(leftist, LeftistHeap);
engine_properties!(pairing, PairingHeap);
engine_properties!(skew, SkewHeap);

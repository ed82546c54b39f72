//! Parallel in-memory sort of one chunk-sized slice.
//!
//! Equal-split parallel merge sort: `T` workers each sort a disjoint
//! contiguous sub-range, then a sequential pairwise cascade merges adjacent
//! sorted sub-ranges back together.

use crate::error::{Result, SortError};

/// Sorts `buf` in non-decreasing order using up to `threads` worker
/// threads. `buf` must be non-empty.
pub fn sort_chunk(buf: &mut [i32], threads: usize) -> Result<()> {
    let len = buf.len();
    debug_assert!(len >= 1);

    if threads <= 1 || len == 1 {
        merge_sort(buf);
        return Ok(());
    }

    let t = threads.min(len);
    let npt = len / t;
    let offset = len % t;

    // Each worker gets a disjoint contiguous sub-range; the last worker
    // absorbs the remainder so every element is covered exactly once.
    let mut bounds = Vec::with_capacity(t);
    for i in 0..t {
        let start = i * npt;
        let end = if i == t - 1 { len } else { start + npt };
        bounds.push((start, end));
    }

    let spawn_failed = std::sync::atomic::AtomicBool::new(false);
    std::thread::scope(|scope| {
        // reborrow, not move: `buf` must still be usable after this scope
        // block for the cascade merge below.
        let mut rest: &mut [i32] = &mut *buf;
        let mut handles = Vec::with_capacity(t);
        let mut prev_end = 0;
        for &(start, end) in &bounds {
            debug_assert_eq!(start, prev_end);
            let (sub, tail) = rest.split_at_mut(end - start);
            rest = tail;
            prev_end = end;
            let spawn_failed = &spawn_failed;
            let handle = std::thread::Builder::new().spawn_scoped(scope, move || {
                merge_sort(sub);
            });
            match handle {
                Ok(h) => handles.push(h),
                Err(_) => {
                    spawn_failed.store(true, std::sync::atomic::Ordering::SeqCst);
                }
            }
        }
        for handle in handles {
            if handle.join().is_err() {
                spawn_failed.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }
    });

    if spawn_failed.load(std::sync::atomic::Ordering::SeqCst) {
        return Err(SortError::ThreadPanic);
    }

    cascade_merge(buf, npt, t, len);
    Ok(())
}

/// Sequential pairwise cascade: on pass `p`, adjacent units of size
/// `npt * 2^p` are merged into units of size `npt * 2^(p+1)`. The right
/// boundary of the rightmost merge in each pass is clamped to `len - 1` to
/// absorb the non-power-of-two tail produced by `len % t != 0`.
fn cascade_merge(buf: &mut [i32], npt: usize, t: usize, len: usize) {
    let mut unit = npt;
    let mut units = t;
    while units >= 2 {
        let pairs = units / 2;
        for i in 0..pairs {
            let left = i * 2 * unit;
            let mid = (left + unit).min(len);
            let right = ((i * 2 + 2) * unit).min(len);
            if mid < right {
                merge_ranges(buf, left, mid, right);
            }
        }
        unit *= 2;
        units = (units + 1) / 2;
    }
}

/// Merges the two adjacent sorted ranges `buf[left..mid]` and
/// `buf[mid..right]` into one sorted range `buf[left..right]`.
fn merge_ranges(buf: &mut [i32], left: usize, mid: usize, right: usize) {
    let mut scratch = Vec::with_capacity(right - left);
    let (mut i, mut j) = (left, mid);
    while i < mid && j < right {
        if buf[i] <= buf[j] {
            scratch.push(buf[i]);
            i += 1;
        } else {
            scratch.push(buf[j]);
            j += 1;
        }
    }
    scratch.extend_from_slice(&buf[i..mid]);
    scratch.extend_from_slice(&buf[j..right]);
    buf[left..right].copy_from_slice(&scratch);
}

/// Single-threaded bottom-up merge sort, used both for each worker's
/// sub-range and for the `threads == 1` / `len == 1` fast path.
fn merge_sort(buf: &mut [i32]) {
    let len = buf.len();
    if len <= 1 {
        return;
    }
    let mut width = 1;
    let mut scratch = vec![0i32; len];
    while width < len {
        let mut left = 0;
        while left < len {
            let mid = (left + width).min(len);
            let right = (left + 2 * width).min(len);
            merge_into(buf, &mut scratch, left, mid, right);
            left += 2 * width;
        }
        width *= 2;
    }
}

fn merge_into(buf: &mut [i32], scratch: &mut [i32], left: usize, mid: usize, right: usize) {
    if mid >= right {
        return;
    }
    let (mut i, mut j, mut k) = (left, mid, left);
    while i < mid && j < right {
        if buf[i] <= buf[j] {
            scratch[k] = buf[i];
            i += 1;
        } else {
            scratch[k] = buf[j];
            j += 1;
        }
        k += 1;
    }
    while i < mid {
        scratch[k] = buf[i];
        i += 1;
        k += 1;
    }
    while j < right {
        scratch[k] = buf[j];
        j += 1;
        k += 1;
    }
    buf[left..right].copy_from_slice(&scratch[left..right]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_sorted(buf: &[i32]) -> bool {
        buf.windows(2).all(|w| w[0] <= w[1])
    }

    #[test]
    fn single_element() {
        let mut buf = [42];
        sort_chunk(&mut buf, 4).unwrap();
        assert_eq!(buf, [42]);
    }

    #[test]
    fn single_thread_matches_sequential() {
        let mut buf = vec![5, 3, 1, 4, 1, 5, 9, 2, 6];
        sort_chunk(&mut buf, 1).unwrap();
        assert!(is_sorted(&buf));
    }

    #[test]
    fn threads_exceeding_len_are_clamped() {
        let mut buf = vec![3, 1, 2];
        sort_chunk(&mut buf, 1024).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
    }

    #[test]
    fn non_power_of_two_thread_count_and_tail() {
        let mut data: Vec<i32> = (0..97).rev().collect();
        sort_chunk(&mut data, 5).unwrap();
        assert!(is_sorted(&data));
        let mut expected: Vec<i32> = (0..97).collect();
        expected.sort();
        assert_eq!(data, expected);
    }

    #[test]
    fn duplicates_and_extremes_preserved() {
        let mut data = vec![i32::MAX, i32::MIN, 0, 0, i32::MAX, i32::MIN];
        sort_chunk(&mut data, 3).unwrap();
        assert_eq!(data, vec![i32::MIN, i32::MIN, 0, 0, i32::MAX, i32::MAX]);
    }

    #[test]
    fn large_random_buffer_sorts_correctly() {
        // deterministic xorshift in place of an RNG dependency in a unit test
        let mut state: u32 = 0x9E3779B9;
        let mut data = Vec::with_capacity(5000);
        for _ in 0..5000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            data.push(state as i32);
        }
        let mut expected = data.clone();
        expected.sort();
        sort_chunk(&mut data, 8).unwrap();
        assert_eq!(data, expected);
    }
}

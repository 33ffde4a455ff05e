//! Run-length counting of boolean conditions.
//!
//! The counter at position `i` is the number of consecutive `true` values
//! ending at `i` (0 when `cond[i]` is false). Two equivalent forms:
//!
//! - sequential: reset to 0 on false, increment on true
//! - batch: mark every reset position with its index and every other
//!   position with -1, take the running maximum (the last reset seen so
//!   far), and subtract it from the position
//!
//! The batch form has no data-dependent branches in its inner step, so it
//! maps onto array/columnar evaluation. Both must agree index by index.

/// Sequential reset/increment scan.
pub fn sequential_run_lengths(cond: &[bool]) -> Vec<u32> {
    let mut counts = Vec::with_capacity(cond.len());
    let mut run = 0u32;
    for &c in cond {
        run = if c { run + 1 } else { 0 };
        counts.push(run);
    }
    counts
}

/// Running-maximum scan over reset markers.
pub fn batch_run_lengths(cond: &[bool]) -> Vec<u32> {
    let markers: Vec<i64> = cond
        .iter()
        .enumerate()
        .map(|(i, &c)| if c { -1 } else { i as i64 })
        .collect();

    let last_reset: Vec<i64> = markers
        .iter()
        .scan(-1i64, |running_max, &m| {
            *running_max = (*running_max).max(m);
            Some(*running_max)
        })
        .collect();

    last_reset
        .iter()
        .enumerate()
        .map(|(i, &reset)| (i as i64 - reset) as u32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sequential_basic() {
        let cond = [true, true, false, true, true, true, false];
        assert_eq!(sequential_run_lengths(&cond), vec![1, 2, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_batch_basic() {
        let cond = [true, true, false, true, true, true, false];
        assert_eq!(batch_run_lengths(&cond), vec![1, 2, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_empty_input() {
        assert!(sequential_run_lengths(&[]).is_empty());
        assert!(batch_run_lengths(&[]).is_empty());
    }

    #[test]
    fn test_all_false_and_all_true() {
        assert_eq!(batch_run_lengths(&[false; 4]), vec![0, 0, 0, 0]);
        assert_eq!(batch_run_lengths(&[true; 4]), vec![1, 2, 3, 4]);
    }

    proptest! {
        #[test]
        fn prop_batch_matches_sequential(cond in proptest::collection::vec(any::<bool>(), 0..512)) {
            prop_assert_eq!(batch_run_lengths(&cond), sequential_run_lengths(&cond));
        }
    }
}

//! Longest increasing subsequence.
//!
//! The keyed reconciler records, for each node in the new window, the
//! 1-based position of its old counterpart (0 when it has none). Nodes whose
//! entries form a longest increasing subsequence are already in relative
//! order; only the others need to move.

/// Indices of one longest strictly increasing subsequence of `arr`,
/// ignoring zero entries. Runs in O(n log n).
pub fn longest_increasing_subsequence(arr: &[usize]) -> Vec<usize> {
    // predecessor[i]: index before i in the best sequence ending at i
    let mut predecessor = vec![0usize; arr.len()];
    // tails[k]: index of the smallest tail of an increasing run of length k+1
    let mut tails: Vec<usize> = Vec::with_capacity(arr.len());

    for (i, &value) in arr.iter().enumerate() {
        if value == 0 {
            continue;
        }

        match tails.last() {
            None => {
                tails.push(i);
                continue;
            }
            Some(&last) if arr[last] < value => {
                predecessor[i] = last;
                tails.push(i);
                continue;
            }
            Some(_) => {}
        }

        let pos = tails.partition_point(|&t| arr[t] < value);
        if value < arr[tails[pos]] {
            if pos > 0 {
                predecessor[i] = tails[pos - 1];
            }
            tails[pos] = i;
        }
    }

    let mut len = tails.len();
    if let Some(&last) = tails.last() {
        let mut cursor = last;
        while len > 0 {
            len -= 1;
            tails[len] = cursor;
            cursor = predecessor[cursor];
        }
    }
    tails
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(arr: &[usize], indices: &[usize]) -> Vec<usize> {
        indices.iter().map(|&i| arr[i]).collect()
    }

    /// Quadratic reference length.
    fn reference_len(arr: &[usize]) -> usize {
        let mut best = vec![0usize; arr.len()];
        let mut overall = 0;
        for i in 0..arr.len() {
            if arr[i] == 0 {
                continue;
            }
            best[i] = 1;
            for j in 0..i {
                if arr[j] != 0 && arr[j] < arr[i] {
                    best[i] = best[i].max(best[j] + 1);
                }
            }
            overall = overall.max(best[i]);
        }
        overall
    }

    #[test]
    fn empty_and_all_zero() {
        assert!(longest_increasing_subsequence(&[]).is_empty());
        assert!(longest_increasing_subsequence(&[0, 0, 0]).is_empty());
    }

    #[test]
    fn sorted_input_is_whole_sequence() {
        assert_eq!(longest_increasing_subsequence(&[1, 2, 3, 4]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn reversed_input_keeps_one() {
        assert_eq!(longest_increasing_subsequence(&[4, 3, 2, 1]).len(), 1);
    }

    #[test]
    fn skips_zero_entries() {
        let arr = [3, 2, 0];
        let seq = longest_increasing_subsequence(&arr);
        assert_eq!(seq.len(), 1);
        assert!(seq.iter().all(|&i| arr[i] != 0));
    }

    #[test]
    fn mixed_sequence() {
        let arr = [2, 3, 1, 5, 6, 8, 7, 9, 4];
        let seq = longest_increasing_subsequence(&arr);
        assert_eq!(values(&arr, &seq), vec![2, 3, 5, 6, 7, 9]);
    }

    proptest! {
        #[test]
        fn result_is_increasing_and_longest(
            arr in prop::collection::vec(0usize..40, 0..60)
        ) {
            let seq = longest_increasing_subsequence(&arr);

            prop_assert!(seq.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(seq.iter().all(|&i| arr[i] != 0));
            let picked = values(&arr, &seq);
            prop_assert!(picked.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(seq.len(), reference_len(&arr));
        }
    }
}

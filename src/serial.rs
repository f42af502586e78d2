//! Sequential reference scans.
//!
//! Deliberately independent of the look-back machinery so parity tests and
//! benchmarks compare against a separately derived result.

/// Exclusive scan: `out[i] = init ⊕ x[0] ⊕ … ⊕ x[i-1]`, left to right.
pub fn exclusive_scan_serial<T, F>(input: &[T], init: T, combine: F) -> Vec<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let mut out = Vec::with_capacity(input.len());
    let mut running = init;
    for &item in input {
        out.push(running);
        running = combine(running, item);
    }
    out
}

/// Inclusive scan: `out[i] = x[0] ⊕ … ⊕ x[i]`, left to right.
pub fn inclusive_scan_serial<T, F>(input: &[T], combine: F) -> Vec<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let mut out = Vec::with_capacity(input.len());
    let mut running: Option<T> = None;
    for &item in input {
        let acc = match running {
            Some(acc) => combine(acc, item),
            None => item,
        };
        out.push(acc);
        running = Some(acc);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_matches_hand_computed_sums() {
        let input = [3i32, -1, 4, -1, 5];
        assert_eq!(exclusive_scan_serial(&input, 0, |a, b| a + b), vec![0, 3, 2, 6, 5]);
    }

    #[test]
    fn inclusive_matches_hand_computed_sums() {
        let input = [1u32, 2, 3, 4, 5];
        assert_eq!(inclusive_scan_serial(&input, |a, b| a + b), vec![1, 3, 6, 10, 15]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let input: [u64; 0] = [];
        assert!(exclusive_scan_serial(&input, 0, |a, b| a + b).is_empty());
        assert!(inclusive_scan_serial(&input, |a, b| a + b).is_empty());
    }
}

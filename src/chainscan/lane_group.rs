//! Fixed-width cooperative lane group for the backward walk.
//!
//! A group of `width` logical lanes observes `width` consecutive predecessor
//! slots per round and reduces the observations collectively. On this
//! substrate the owning worker evaluates the lanes in order, one logical
//! step at a time, which satisfies the lockstep semantics exactly: the
//! "any lane observed Complete" predicate and the segmented reduction are
//! computed over one coherent set of observations per round.

use super::flag::BlockPrefix;
use super::state::LookbackState;

/// Upper bound on the lane-group width (and thus on padding slots).
pub const MAX_LANE_GROUP_WIDTH: usize = 64;

/// Default width used by the engine; matches the padding of its states.
pub const DEFAULT_LOOKBACK_WIDTH: usize = 64;

/// Result of one backward round.
#[derive(Clone, Copy, Debug)]
pub struct RoundOutcome<T> {
    /// Combination of every observed value from the nearest lane out to and
    /// including the first `Complete`, earliest-in-grid operand leftmost.
    /// `None` only when the round observed no real slot at all, which a
    /// well-formed walk never produces.
    pub prefix: Option<T>,
    /// Whether any lane observed `Complete` (terminating the walk).
    pub complete: bool,
}

pub struct LaneGroup {
    width: usize,
}

impl LaneGroup {
    pub fn new(width: usize) -> Self {
        debug_assert!(width >= 1 && width <= MAX_LANE_GROUP_WIDTH);
        Self { width }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// One backward round at `base`: lane `i` observes predecessor
    /// `base - i`, then the group reduces the observations.
    ///
    /// The reduction is segmented on `Complete` flags and ordered so the
    /// farther (earlier-in-grid) operand is always on the left; the combine
    /// operator is only associative, not commutative.
    /// Padding slots beyond the first `Complete` contribute nothing; an
    /// `Invalid` observation simply bounds the round.
    pub fn lookback_round<T, S, F>(&self, state: &S, base: i64, combine: &F) -> RoundOutcome<T>
    where
        T: Copy,
        S: LookbackState<T>,
        F: Fn(T, T) -> T,
    {
        debug_assert!(base >= 0, "round base must be a real block id");

        // Lockstep gather: every lane resolves its observation before the
        // collective reduction starts.
        let mut observed = [BlockPrefix::Invalid; MAX_LANE_GROUP_WIDTH];
        for lane in 0..self.width {
            observed[lane] = state.get(base - lane as i64);
        }

        let mut prefix: Option<T> = None;
        let mut complete = false;
        for lane in 0..self.width {
            match observed[lane] {
                BlockPrefix::Partial(value) => {
                    prefix = Some(match prefix {
                        Some(acc) => combine(value, acc),
                        None => value,
                    });
                }
                BlockPrefix::Complete(value) => {
                    prefix = Some(match prefix {
                        Some(acc) => combine(value, acc),
                        None => value,
                    });
                    complete = true;
                    break;
                }
                // Padding: nothing earlier in the grid can contribute.
                BlockPrefix::Invalid => break,
            }
        }

        RoundOutcome { prefix, complete }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chainscan::layout::AlignedBuf;
    use crate::chainscan::state::SplitScanState;

    /// Build a width-4 state over 8 blocks with the given publications.
    fn seeded_state(
        partial: &[(usize, u64)],
        complete: &[(usize, u64)],
    ) -> (AlignedBuf, SplitScanState<u64>) {
        let layout = SplitScanState::<u64>::layout(8, 4);
        let mut buf = AlignedBuf::for_state(&layout);
        let state = unsafe { SplitScanState::<u64>::create(buf.as_mut_ptr(), &layout) };
        for id in 0..12 {
            state.initialize_slot(id);
        }
        for &(id, v) in partial {
            state.set_partial(id, v);
        }
        for &(id, v) in complete {
            state.set_complete(id, v);
        }
        (buf, state)
    }

    // Non-commutative combine: digit concatenation in base 10.
    fn concat(a: u64, b: u64) -> u64 {
        let mut shift = 10;
        while shift <= b {
            shift *= 10;
        }
        a * shift + b
    }

    #[test]
    fn round_without_complete_reduces_all_lanes() {
        // Blocks 4..8 partial; look back from block 8's perspective.
        let (_buf, state) = seeded_state(&[(4, 5), (5, 6), (6, 7), (7, 8)], &[]);
        let group = LaneGroup::new(4);
        let out = group.lookback_round(&state, 7, &concat);
        assert!(!out.complete);
        // Earliest block leftmost: 5 then 6 then 7 then 8.
        assert_eq!(out.prefix, Some(5678));
    }

    #[test]
    fn complete_flag_bounds_the_segment() {
        // Block 5 complete: block 4 beyond it must not contribute; the
        // segment ends at the first Complete inclusive.
        let (_buf, state) = seeded_state(&[(4, 1), (6, 7), (7, 8)], &[(5, 99)]);
        let group = LaneGroup::new(4);
        let out = group.lookback_round(&state, 7, &concat);
        assert!(out.complete);
        assert_eq!(out.prefix, Some(concat(concat(99, 7), 8)));
    }

    #[test]
    fn nearest_lane_complete_short_circuits() {
        let (_buf, state) = seeded_state(&[(4, 1), (5, 2), (6, 3)], &[(7, 42)]);
        let group = LaneGroup::new(4);
        let out = group.lookback_round(&state, 7, &concat);
        assert!(out.complete);
        assert_eq!(out.prefix, Some(42));
    }

    #[test]
    fn padding_bounds_round_past_block_zero() {
        // Walk from block 2: lanes observe blocks 1, 0, then padding.
        let (_buf, state) = seeded_state(&[(1, 3)], &[(0, 9)]);
        let group = LaneGroup::new(4);
        let out = group.lookback_round(&state, 1, &concat);
        assert!(out.complete);
        assert_eq!(out.prefix, Some(93));
    }

    #[test]
    fn reduction_order_is_strictly_left_to_right() {
        // Subtraction-like probe via concatenation ensures any reordering
        // of operands changes the result.
        let (_buf, state) = seeded_state(&[(5, 2), (6, 3), (7, 4)], &[(4, 1)]);
        let group = LaneGroup::new(4);
        let out = group.lookback_round(&state, 7, &concat);
        assert_eq!(out.prefix, Some(1234));
        assert!(out.complete);
    }
}

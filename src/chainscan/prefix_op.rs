//! Per-block look-back prefix operator.
//!
//! One instance is created per block invocation (block id > 0 only; block 0
//! has no predecessors and publishes `Complete` directly). The operator
//! publishes the block's local reduction as `Partial`, walks backward in
//! lane-group-wide rounds until a round observes `Complete`, publishes the
//! block's inclusive total, and returns the exclusive prefix.

use super::lane_group::LaneGroup;
use super::state::LookbackState;

pub struct LookbackPrefixOp<'a, T, F, S> {
    block_id: usize,
    combine: &'a F,
    state: &'a S,
    group: LaneGroup,
    _value: std::marker::PhantomData<T>,
}

impl<'a, T, F, S> LookbackPrefixOp<'a, T, F, S>
where
    T: Copy,
    F: Fn(T, T) -> T,
    S: LookbackState<T>,
{
    /// The combine operator must be associative (commutativity is neither
    /// assumed nor required) and free of side effects on anything but its
    /// operands.
    pub fn new(block_id: usize, combine: &'a F, state: &'a S) -> Self {
        debug_assert!(block_id > 0, "block 0 has no predecessors to look back at");
        debug_assert!(block_id < state.block_count());
        Self {
            block_id,
            combine,
            state,
            group: LaneGroup::new(state.width()),
            _value: std::marker::PhantomData,
        }
    }

    /// Publish `Partial`, resolve the exclusive prefix through the backward
    /// walk, publish `Complete`, and return the exclusive prefix.
    pub fn exclusive_prefix(&self, local_reduction: T) -> T {
        self.state.set_partial(self.block_id, local_reduction);
        let prefix = self.lookback();
        self.state
            .set_complete(self.block_id, (self.combine)(prefix, local_reduction));
        prefix
    }

    /// Backward search in rounds of `width` predecessors. A round that
    /// observes no `Complete` consists entirely of `Partial` real slots, so
    /// its combined value is merged as the earlier-in-grid (left) operand of
    /// everything accumulated so far, and the walk moves one group further
    /// back. Termination is structural: block 0 only ever publishes
    /// `Complete`, so the round that reaches it always terminates; padding
    /// slots keep that round's far lanes in range, and no round ever starts
    /// below block 0.
    fn lookback(&self) -> T {
        let width = self.group.width() as i64;
        let mut base = self.block_id as i64 - 1;

        let mut out = self.group.lookback_round(self.state, base, self.combine);
        let mut prefix = out.prefix;
        while !out.complete {
            base -= width;
            out = self.group.lookback_round(self.state, base, self.combine);
            prefix = match (out.prefix, prefix) {
                (Some(round), Some(acc)) => Some((self.combine)(round, acc)),
                (Some(round), None) => Some(round),
                (None, acc) => acc,
            };
        }

        // The first round always observes at least the immediate real
        // predecessor, so a finished walk has folded at least one value.
        prefix.expect("look-back walk observed no predecessors")
    }
}

//! Decoupled look-back scan internals and public API.

mod backoff;
mod engine;
mod flag;
mod lane_group;
mod layout;
mod prefix_op;
mod state;

pub use backoff::PollBackoff;
pub use engine::{ChainScan, ChainScanConfig};
pub use flag::{BlockPrefix, PrefixFlag};
pub use lane_group::{DEFAULT_LOOKBACK_WIDTH, LaneGroup, MAX_LANE_GROUP_WIDTH, RoundOutcome};
pub use layout::{AlignedBuf, StateLayout};
pub use prefix_op::LookbackPrefixOp;
pub use state::{CombinedScanState, LookbackState, SplitScanState, fits_combined_word};

//! Single-pass parallel prefix scan with decoupled look-back.

pub mod chainscan;
pub mod serial;
pub use chainscan::{ChainScan, ChainScanConfig};

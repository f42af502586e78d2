//! Single-pass scan engine over a dedicated thread pool.
//!
//! Inputs are tiled into fixed-size blocks. Workers claim block ids from a
//! shared monotone ticket, compute the block's local reduction, resolve the
//! exclusive prefix through the look-back protocol, and emit the block's
//! outputs. Ticket ordering is what makes the protocol live on a pool with
//! fewer workers than blocks: block b is only claimed after blocks 0..b,
//! every claimed block runs to completion, and the lowest unfinished block
//! only ever reads Complete predecessors.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::lane_group::{DEFAULT_LOOKBACK_WIDTH, MAX_LANE_GROUP_WIDTH};
use super::layout::AlignedBuf;
use super::prefix_op::LookbackPrefixOp;
use super::state::{CombinedScanState, LookbackState, SplitScanState, fits_combined_word};

struct SendPtr<T> {
    inner: *mut T,
}
unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}
impl<T> Copy for SendPtr<T> {}
impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> SendPtr<T> {
    #[inline(always)]
    fn new(ptr: *mut T) -> Self {
        Self { inner: ptr }
    }
    #[inline(always)]
    fn get(&self) -> *mut T {
        self.inner
    }
}

/// Items per block. Large enough to amortize one protocol round trip per
/// block, small enough that a block's tile stays cache-resident.
const DEFAULT_BLOCK_SIZE: usize = 1 << 16;

static PHYSICAL_CORES: OnceLock<usize> = OnceLock::new();

#[inline]
fn physical_core_count() -> usize {
    *PHYSICAL_CORES.get_or_init(|| num_cpus::get_physical().max(1))
}

/// Scans are memory-bound; past 8 cores extra workers mostly contend on
/// bandwidth, so cap the auto-detected pool at half the physical cores.
#[inline]
fn auto_pool_thread_count() -> usize {
    let physical = physical_core_count();
    if physical <= 8 {
        physical
    } else {
        physical.div_ceil(2).max(6)
    }
}

fn resolve_thread_count(config: &ChainScanConfig) -> usize {
    let mut threads = config.thread_count.unwrap_or_else(auto_pool_thread_count);
    if let Some(cap) = config.max_threads {
        threads = threads.min(cap);
    }
    threads.max(1)
}

/// Configuration for a ChainScan engine instance.
///
/// Use `ChainScanConfig::default()` for auto-tuned defaults, or customise
/// individual knobs via the builder methods.
#[derive(Clone, Debug, Default)]
pub struct ChainScanConfig {
    /// Number of threads for the compute pool.
    /// `None` means auto-detect (physical cores, memory-bandwidth capped).
    pub thread_count: Option<usize>,
    /// Hard upper bound on threads regardless of auto-detection.
    pub max_threads: Option<usize>,
    /// Items per block. `None` means the tuned default.
    pub block_size: Option<usize>,
    /// Look-back lane-group width (and padding slot count).
    /// `None` means the crate default.
    pub lookback_width: Option<usize>,
}

impl ChainScanConfig {
    /// Set an explicit thread count for the compute pool.
    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = Some(n.max(1));
        self
    }

    /// Set a hard upper bound on threads.
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n.max(1));
        self
    }

    /// Set the items-per-block tile size.
    pub fn block_size(mut self, n: usize) -> Self {
        self.block_size = Some(n.max(1));
        self
    }

    /// Set the look-back lane-group width.
    pub fn lookback_width(mut self, n: usize) -> Self {
        self.lookback_width = Some(n.clamp(1, MAX_LANE_GROUP_WIDTH));
        self
    }
}

#[derive(Clone, Copy)]
enum ScanMode<T> {
    Exclusive(T),
    Inclusive,
}

pub struct ChainScan {
    pool: rayon::ThreadPool,
    block_size: usize,
    lookback_width: usize,
}

impl Default for ChainScan {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainScan {
    pub fn new() -> Self {
        Self::with_config(ChainScanConfig::default())
    }

    /// Create a ChainScan engine with explicit configuration.
    pub fn with_config(config: ChainScanConfig) -> Self {
        let threads = resolve_thread_count(&config);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("failed to build chain-scan rayon thread pool");

        Self {
            pool,
            block_size: config.block_size.unwrap_or(DEFAULT_BLOCK_SIZE).max(1),
            lookback_width: config
                .lookback_width
                .unwrap_or(DEFAULT_LOOKBACK_WIDTH)
                .clamp(1, MAX_LANE_GROUP_WIDTH),
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn lookback_width(&self) -> usize {
        self.lookback_width
    }

    /// Exclusive scan into `output`: `output[i] = init ⊕ input[0] ⊕ … ⊕
    /// input[i-1]`, combined left to right. `combine` must be associative;
    /// commutativity is not required.
    pub fn exclusive_scan_in<T, F>(&self, input: &[T], output: &mut [T], init: T, combine: F)
    where
        T: Copy + Send + Sync,
        F: Fn(T, T) -> T + Sync,
    {
        assert_eq!(input.len(), output.len(), "input/output length mismatch");
        if input.is_empty() {
            return;
        }
        if input.len().div_ceil(self.block_size) < 2 {
            emit_exclusive(input, output.as_mut_ptr(), init, &combine);
            return;
        }
        if fits_combined_word::<T>() {
            self.run_blocks::<T, CombinedScanState<T>, F>(
                input,
                output,
                ScanMode::Exclusive(init),
                &combine,
            );
        } else {
            self.run_blocks::<T, SplitScanState<T>, F>(
                input,
                output,
                ScanMode::Exclusive(init),
                &combine,
            );
        }
    }

    /// Inclusive scan into `output`: `output[i] = input[0] ⊕ … ⊕ input[i]`.
    pub fn inclusive_scan_in<T, F>(&self, input: &[T], output: &mut [T], combine: F)
    where
        T: Copy + Send + Sync,
        F: Fn(T, T) -> T + Sync,
    {
        assert_eq!(input.len(), output.len(), "input/output length mismatch");
        if input.is_empty() {
            return;
        }
        if input.len().div_ceil(self.block_size) < 2 {
            emit_inclusive(input, output.as_mut_ptr(), None, &combine);
            return;
        }
        if fits_combined_word::<T>() {
            self.run_blocks::<T, CombinedScanState<T>, F>(
                input,
                output,
                ScanMode::Inclusive,
                &combine,
            );
        } else {
            self.run_blocks::<T, SplitScanState<T>, F>(
                input,
                output,
                ScanMode::Inclusive,
                &combine,
            );
        }
    }

    /// Allocating variant of `exclusive_scan_in`.
    pub fn exclusive_scan<T, F>(&self, input: &[T], init: T, combine: F) -> Vec<T>
    where
        T: Copy + Send + Sync,
        F: Fn(T, T) -> T + Sync,
    {
        let mut output = vec![init; input.len()];
        self.exclusive_scan_in(input, &mut output, init, combine);
        output
    }

    /// Allocating variant of `inclusive_scan_in`.
    pub fn inclusive_scan<T, F>(&self, input: &[T], combine: F) -> Vec<T>
    where
        T: Copy + Send + Sync,
        F: Fn(T, T) -> T + Sync,
    {
        if input.is_empty() {
            return Vec::new();
        }
        let mut output = vec![input[0]; input.len()];
        self.inclusive_scan_in(input, &mut output, combine);
        output
    }

    fn run_blocks<T, S, F>(&self, input: &[T], output: &mut [T], mode: ScanMode<T>, combine: &F)
    where
        T: Copy + Send + Sync,
        S: LookbackState<T>,
        F: Fn(T, T) -> T + Sync,
    {
        let block_size = self.block_size;
        let num_blocks = input.len().div_ceil(block_size);
        debug_assert!(num_blocks >= 2);

        // Two-phase sizing: learn the footprint, allocate exactly, bind.
        let layout = S::layout(num_blocks, self.lookback_width);
        let mut buf = AlignedBuf::for_state(&layout);
        let state = unsafe { S::create(buf.as_mut_ptr(), &layout) };

        // Separate initialization pass; the pool dispatch below publishes
        // these writes to every worker before any block runs.
        for id in 0..layout.slots() {
            state.initialize_slot(id);
        }

        let next_block = AtomicUsize::new(0);
        let out = SendPtr::new(output.as_mut_ptr());

        self.pool.broadcast(|_| {
            loop {
                // Monotone ticket: predecessors of any claimed block are
                // already claimed, which upholds the look-back liveness
                // assumption on this pool.
                let b = next_block.fetch_add(1, Ordering::Relaxed);
                if b >= num_blocks {
                    break;
                }
                let start = b * block_size;
                let end = (start + block_size).min(input.len());
                let items = &input[start..end];

                let local = block_reduce(items, combine);
                let prefix = if b == 0 {
                    // Block 0 has no predecessors: publish Complete directly
                    // and never Partial, so near-origin walks always find a
                    // Complete at or before slot 0.
                    state.set_complete(0, local);
                    None
                } else {
                    let op = LookbackPrefixOp::new(b, combine, &state);
                    Some(op.exclusive_prefix(local))
                };

                let block_out = unsafe { out.get().add(start) };
                match mode {
                    ScanMode::Exclusive(init) => {
                        let running = match prefix {
                            Some(p) => combine(init, p),
                            None => init,
                        };
                        emit_exclusive(items, block_out, running, combine);
                    }
                    ScanMode::Inclusive => emit_inclusive(items, block_out, prefix, combine),
                }
            }
        });
    }
}

/// Block-local reduction: the per-group "reduce N owned items into one
/// value" capability consumed by the protocol.
#[inline]
fn block_reduce<T, F>(items: &[T], combine: &F) -> T
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    debug_assert!(!items.is_empty());
    let mut acc = items[0];
    for &item in &items[1..] {
        acc = combine(acc, item);
    }
    acc
}

#[inline]
fn emit_exclusive<T, F>(items: &[T], out: *mut T, mut running: T, combine: &F)
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    for (i, &item) in items.iter().enumerate() {
        unsafe { out.add(i).write(running) };
        running = combine(running, item);
    }
}

#[inline]
fn emit_inclusive<T, F>(items: &[T], out: *mut T, mut running: Option<T>, combine: &F)
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    for (i, &item) in items.iter().enumerate() {
        let acc = match running {
            Some(acc) => combine(acc, item),
            None => item,
        };
        unsafe { out.add(i).write(acc) };
        running = Some(acc);
    }
}

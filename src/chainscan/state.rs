//! Scan state: per-block publication slots over caller-supplied memory.
//!
//! Two backing strategies implement one contract. The combined strategy
//! packs flag and value into a single atomic word, so one store publishes
//! both indivisibly. The split strategy keeps a flag region and two value
//! regions; the value write happens-before the release store of the flag,
//! and readers acquire-load the flag before touching the value region it
//! selects. Either way a reader can only obtain a value through the flag
//! transition that published it.
//!
//! Slots are partitioned by owner: exactly one block ever writes a given
//! slot, so the only race in the protocol is read-after-write on value
//! visibility, and that is resolved by the flag-gates-value rule above.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use super::backoff::PollBackoff;
use super::flag::{BlockPrefix, PrefixFlag};
use super::layout::StateLayout;

/// Payload bytes that fit next to the flag in one atomic word.
const COMBINED_PAYLOAD_BYTES: usize = 4;

/// Capability check selecting the combined strategy: the payload must ride
/// in the upper half of an `AtomicU64` next to the flag.
#[inline]
pub const fn fits_combined_word<T>() -> bool {
    size_of::<T>() <= COMBINED_PAYLOAD_BYTES
}

/// Common contract of the two backing strategies.
///
/// Implementations are thin `Copy` views over caller memory; the caller
/// keeps the buffer alive and initialized for as long as any view is used.
/// Every slot id in `[0, width + block_count)` must be passed to
/// `initialize_slot` (idempotently, any thread) with the writes visible to
/// all participants before the first `set_partial`/`get`.
pub trait LookbackState<T: Copy>: Copy + Send + Sync {
    /// Storage this strategy needs for `block_count` blocks and `width`
    /// padding slots.
    fn layout(block_count: usize, width: usize) -> StateLayout;

    /// Bind a view over `buffer`.
    ///
    /// # Safety
    /// `buffer` must be valid for reads and writes of
    /// `layout.storage_size()` bytes at `layout.alignment()`, and must
    /// outlive every copy of the returned view. Undersized buffers are
    /// undefined behavior.
    unsafe fn create(buffer: *mut u8, layout: &StateLayout) -> Self;

    fn block_count(&self) -> usize;

    /// Lane-group width; equals the number of padding slots.
    fn width(&self) -> usize;

    /// Initialize one participant id: real slot `id` to `Empty` when
    /// `id < block_count`, padding slot `id` to `Invalid` when `id < width`.
    /// Idempotent.
    fn initialize_slot(&self, id: usize);

    /// Publish the block's local reduction. Value first, then flag.
    fn set_partial(&self, block_id: usize, value: T);

    /// Publish the block's inclusive prefix. Value first, then flag.
    fn set_complete(&self, block_id: usize, value: T);

    /// Observe a predecessor slot, re-polling until it has advanced past
    /// `Empty`. Ids in `[-width, 0)` address padding slots.
    fn get(&self, block_id: i64) -> BlockPrefix<T>;
}

#[inline]
fn slot_index(block_id: i64, width: usize, block_count: usize) -> usize {
    debug_assert!(
        block_id >= -(width as i64) && block_id < block_count as i64,
        "predecessor id {block_id} outside [-{width}, {block_count})"
    );
    (width as i64 + block_id) as usize
}

// ── combined strategy ───────────────────────────────────────────────────

/// Flag and value in one `AtomicU64` per slot: flag in the low byte, payload
/// bytes in the upper half. A single release store publishes both, so no
/// write-side fence is needed; readers still re-poll until the flag half is
/// non-`Empty`.
pub struct CombinedScanState<T> {
    words: *const AtomicU64,
    block_count: usize,
    width: usize,
    _value: PhantomData<T>,
}

impl<T> Clone for CombinedScanState<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for CombinedScanState<T> {}

// SAFETY: the view only moves `T` values by copy through atomic words; the
// shared buffer is synchronized by the flag protocol itself.
unsafe impl<T: Send> Send for CombinedScanState<T> {}
unsafe impl<T: Send> Sync for CombinedScanState<T> {}

impl<T: Copy> CombinedScanState<T> {
    #[inline]
    fn pack(flag: PrefixFlag, value: T) -> u64 {
        let mut payload = [0u8; COMBINED_PAYLOAD_BYTES];
        unsafe {
            ptr::copy_nonoverlapping(
                &value as *const T as *const u8,
                payload.as_mut_ptr(),
                size_of::<T>(),
            );
        }
        ((u32::from_ne_bytes(payload) as u64) << 32) | flag as u64
    }

    #[inline]
    fn unpack_value(word: u64) -> T {
        let payload = ((word >> 32) as u32).to_ne_bytes();
        let mut value = std::mem::MaybeUninit::<T>::uninit();
        unsafe {
            ptr::copy_nonoverlapping(
                payload.as_ptr(),
                value.as_mut_ptr().cast::<u8>(),
                size_of::<T>(),
            );
            value.assume_init()
        }
    }

    #[inline]
    fn word(&self, slot: usize) -> &AtomicU64 {
        debug_assert!(slot < self.width + self.block_count);
        unsafe { &*self.words.add(slot) }
    }
}

impl<T: Copy + Send> LookbackState<T> for CombinedScanState<T> {
    fn layout(block_count: usize, width: usize) -> StateLayout {
        StateLayout::combined(block_count, width)
    }

    unsafe fn create(buffer: *mut u8, layout: &StateLayout) -> Self {
        debug_assert!(fits_combined_word::<T>());
        debug_assert_eq!(buffer as usize % align_of::<AtomicU64>(), 0);
        Self {
            words: buffer.cast::<AtomicU64>(),
            block_count: layout.block_count(),
            width: layout.width(),
            _value: PhantomData,
        }
    }

    #[inline]
    fn block_count(&self) -> usize {
        self.block_count
    }

    #[inline]
    fn width(&self) -> usize {
        self.width
    }

    fn initialize_slot(&self, id: usize) {
        if id < self.block_count {
            self.word(self.width + id)
                .store(PrefixFlag::Empty as u64, Ordering::Relaxed);
        }
        if id < self.width {
            self.word(id)
                .store(PrefixFlag::Invalid as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    fn set_partial(&self, block_id: usize, value: T) {
        debug_assert!(block_id < self.block_count);
        self.word(self.width + block_id)
            .store(Self::pack(PrefixFlag::Partial, value), Ordering::Release);
    }

    #[inline]
    fn set_complete(&self, block_id: usize, value: T) {
        debug_assert!(block_id < self.block_count);
        self.word(self.width + block_id)
            .store(Self::pack(PrefixFlag::Complete, value), Ordering::Release);
    }

    fn get(&self, block_id: i64) -> BlockPrefix<T> {
        let slot = slot_index(block_id, self.width, self.block_count);
        let word = self.word(slot);
        let mut backoff = PollBackoff::new();
        loop {
            let raw = word.load(Ordering::Acquire);
            match PrefixFlag::from_raw(raw as u8) {
                PrefixFlag::Empty => backoff.snooze(),
                PrefixFlag::Partial => return BlockPrefix::Partial(Self::unpack_value(raw)),
                PrefixFlag::Complete => return BlockPrefix::Complete(Self::unpack_value(raw)),
                PrefixFlag::Invalid => return BlockPrefix::Invalid,
            }
        }
    }
}

// ── split strategy ──────────────────────────────────────────────────────

/// Flags and values in parallel regions, for payloads too large for the
/// combined word. Partial and complete values are separate regions because
/// flag and value cannot be stored in one instruction: writing the complete
/// value over the partial one before the flag update became visible would
/// hand a reader that still observes `Partial` a corrupt value.
pub struct SplitScanState<T> {
    flags: *const AtomicU8,
    partial: *mut T,
    complete: *mut T,
    block_count: usize,
    width: usize,
}

impl<T> Clone for SplitScanState<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for SplitScanState<T> {}

// SAFETY: values only cross threads by copy, ordered by release/acquire on
// the flag region; each value slot is written once before its flag advances
// and never after.
unsafe impl<T: Send> Send for SplitScanState<T> {}
unsafe impl<T: Send> Sync for SplitScanState<T> {}

impl<T: Copy> SplitScanState<T> {
    #[inline]
    fn flag(&self, slot: usize) -> &AtomicU8 {
        debug_assert!(slot < self.width + self.block_count);
        unsafe { &*self.flags.add(slot) }
    }
}

impl<T: Copy + Send> LookbackState<T> for SplitScanState<T> {
    fn layout(block_count: usize, width: usize) -> StateLayout {
        StateLayout::split::<T>(block_count, width)
    }

    unsafe fn create(buffer: *mut u8, layout: &StateLayout) -> Self {
        debug_assert_eq!(buffer as usize % layout.alignment(), 0);
        unsafe {
            Self {
                flags: buffer.cast::<AtomicU8>(),
                partial: buffer.add(layout.partial_offset()).cast::<T>(),
                complete: buffer.add(layout.complete_offset()).cast::<T>(),
                block_count: layout.block_count(),
                width: layout.width(),
            }
        }
    }

    #[inline]
    fn block_count(&self) -> usize {
        self.block_count
    }

    #[inline]
    fn width(&self) -> usize {
        self.width
    }

    fn initialize_slot(&self, id: usize) {
        if id < self.block_count {
            self.flag(self.width + id)
                .store(PrefixFlag::Empty as u8, Ordering::Relaxed);
        }
        if id < self.width {
            self.flag(id)
                .store(PrefixFlag::Invalid as u8, Ordering::Relaxed);
        }
    }

    #[inline]
    fn set_partial(&self, block_id: usize, value: T) {
        debug_assert!(block_id < self.block_count);
        let slot = self.width + block_id;
        unsafe { self.partial.add(slot).write(value) };
        // Value write above must be visible before the flag advance.
        self.flag(slot)
            .store(PrefixFlag::Partial as u8, Ordering::Release);
    }

    #[inline]
    fn set_complete(&self, block_id: usize, value: T) {
        debug_assert!(block_id < self.block_count);
        let slot = self.width + block_id;
        unsafe { self.complete.add(slot).write(value) };
        self.flag(slot)
            .store(PrefixFlag::Complete as u8, Ordering::Release);
    }

    fn get(&self, block_id: i64) -> BlockPrefix<T> {
        let slot = slot_index(block_id, self.width, self.block_count);
        let flag = self.flag(slot);
        let mut backoff = PollBackoff::new();
        loop {
            // The acquire load orders the value read below after the
            // writer's value write; the observed flag selects the region.
            match PrefixFlag::from_raw(flag.load(Ordering::Acquire)) {
                PrefixFlag::Empty => backoff.snooze(),
                PrefixFlag::Partial => {
                    return BlockPrefix::Partial(unsafe { self.partial.add(slot).read() });
                }
                PrefixFlag::Complete => {
                    return BlockPrefix::Complete(unsafe { self.complete.add(slot).read() });
                }
                PrefixFlag::Invalid => return BlockPrefix::Invalid,
            }
        }
    }
}

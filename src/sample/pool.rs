// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::sample::Sample;
use std::ops::{Deref, DerefMut};
use std::ptr::{null_mut, NonNull};
use std::sync::atomic::{
    AtomicBool, AtomicPtr, AtomicU64, AtomicUsize,
    Ordering::{Acquire, Relaxed, Release, SeqCst},
};

/// One pooled sample plus the intrusive free-list link. Slots are boxed once
/// and then shuttle between the pool and at most one lease at a time.
pub(crate) struct Slot {
    sample: Sample,
    next: *mut Slot,
    generation: u64,
}

/// Free list of idle samples.
///
/// The list head is guarded by a raw spin flag rather than a `Mutex`: the
/// critical section is a single pointer swap, and after a fork the child's
/// reset hook must be able to force the guard open with a plain atomic store,
/// which no blocking lock offers. The pool never shrinks on its own; slots
/// are only freed when the pool itself is dropped at process teardown.
pub(crate) struct SamplePool {
    head: AtomicPtr<Slot>,
    busy: AtomicBool,
    idle: AtomicUsize,
    generation: AtomicU64,
}

impl SamplePool {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(null_mut()),
            busy: AtomicBool::new(false),
            idle: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) {
        while self
            .busy
            .compare_exchange_weak(false, true, Acquire, Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    fn unlock(&self) {
        self.busy.store(false, Release);
    }

    /// Pops an idle sample, or `None` when the pool is empty.
    pub(crate) fn take(&self) -> Option<PooledSample<'_>> {
        self.lock();
        let popped = NonNull::new(self.head.load(Relaxed)).map(|slot| {
            // Safety: slots on the list are exclusively owned by the pool,
            // and we hold the list guard.
            self.head.store(unsafe { slot.as_ref().next }, Relaxed);
            self.idle.fetch_sub(1, Relaxed);
            slot
        });
        self.unlock();

        popped.map(|mut slot| {
            // Safety: the slot is now exclusively ours; unlink it and stamp
            // the generation it was leased under.
            unsafe {
                slot.as_mut().next = null_mut();
                slot.as_mut().generation = self.generation.load(Relaxed);
            }
            PooledSample { slot, pool: self }
        })
    }

    /// Wraps a freshly constructed sample in a lease backed by this pool, so
    /// it joins the free list when released.
    pub(crate) fn adopt(&self, sample: Sample) -> PooledSample<'_> {
        let raw = Box::into_raw(Box::new(Slot {
            sample,
            next: null_mut(),
            generation: self.generation.load(Relaxed),
        }));
        // Safety: Box::into_raw never returns null.
        let slot = unsafe { NonNull::new_unchecked(raw) };
        PooledSample { slot, pool: self }
    }

    /// Returns a slot to the free list. Takes ownership of the slot; called
    /// only from the lease destructor. A slot leased before a fork is dropped
    /// outright rather than given to the child's pool.
    fn give(&self, slot: NonNull<Slot>) {
        // Safety: the lease owns the slot until this point.
        if unsafe { slot.as_ref().generation } != self.generation.load(Relaxed) {
            drop(unsafe { Box::from_raw(slot.as_ptr()) });
            return;
        }
        self.lock();
        // Safety: the slot is not yet reachable from the list; we hold the
        // list guard for the head manipulation.
        unsafe {
            (*slot.as_ptr()).next = self.head.load(Relaxed);
        }
        self.head.store(slot.as_ptr(), Relaxed);
        self.idle.fetch_add(1, Relaxed);
        self.unlock();
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.idle.load(Relaxed)
    }

    /// Empties the pool in a freshly forked child using only atomic stores.
    ///
    /// The guard is forced open (a parent thread holding it no longer exists
    /// here), the free list is detached without freeing anything (the
    /// allocator may be in an arbitrary state during the atfork window, and
    /// the child must not reuse the parent's buffers anyway), and the
    /// generation is bumped so leases taken before the fork never re-enter
    /// this pool.
    pub(crate) fn reset_postfork(&self) {
        self.busy.store(false, SeqCst);
        self.head.store(null_mut(), SeqCst);
        self.idle.store(0, SeqCst);
        self.generation.fetch_add(1, SeqCst);
    }
}

impl Drop for SamplePool {
    fn drop(&mut self) {
        let mut cur = *self.head.get_mut();
        while !cur.is_null() {
            // Safety: slots on the list were created by Box::into_raw and
            // are exclusively owned by the pool.
            let slot = unsafe { Box::from_raw(cur) };
            cur = slot.next;
        }
    }
}

/// An owned lease on a pooled [`Sample`].
///
/// Dereferences to the sample; on scope exit the buffers are cleared and the
/// sample returns to its pool, so a lease can neither be returned twice nor
/// used after return.
pub struct PooledSample<'a> {
    slot: NonNull<Slot>,
    pool: &'a SamplePool,
}

// Safety: a lease is the sole owner of its slot, and Sample itself is Send.
unsafe impl Send for PooledSample<'_> {}

impl Deref for PooledSample<'_> {
    type Target = Sample;

    fn deref(&self) -> &Sample {
        // Safety: exclusive ownership of the slot for the lease's lifetime.
        unsafe { &self.slot.as_ref().sample }
    }
}

impl DerefMut for PooledSample<'_> {
    fn deref_mut(&mut self) -> &mut Sample {
        // Safety: exclusive ownership of the slot for the lease's lifetime.
        unsafe { &mut self.slot.as_mut().sample }
    }
}

impl Drop for PooledSample<'_> {
    fn drop(&mut self) {
        // Safety: exclusive ownership of the slot; `give` consumes it.
        unsafe { self.slot.as_mut().sample.clear_buffers() };
        self.pool.give(self.slot);
    }
}

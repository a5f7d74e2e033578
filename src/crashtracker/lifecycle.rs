// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::sample::SampleManager;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering::SeqCst};

const NOT_STARTED: u8 = 0;
const STARTING: u8 = 1;
const STARTED: u8 = 2;

/// Tri-state guard making the start body execute exactly once across any
/// number of concurrent first callers. Monotonic for the life of the
/// process: it never reverts once `STARTED`, not even in a forked child
/// (atfork registrations survive fork, so a child needs no re-arming).
pub(crate) struct LifecycleFlag {
    state: AtomicU8,
}

impl LifecycleFlag {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(NOT_STARTED),
        }
    }

    /// Claims the right to run the start body. Exactly one caller ever
    /// observes `true`; everyone else, including callers racing the winner,
    /// gets `false`.
    pub(crate) fn begin_start(&self) -> bool {
        self.state
            .compare_exchange(NOT_STARTED, STARTING, SeqCst, SeqCst)
            .is_ok()
    }

    pub(crate) fn complete_start(&self) {
        self.state.store(STARTED, SeqCst);
    }

    pub(crate) fn is_started(&self) -> bool {
        self.state.load(SeqCst) == STARTED
    }
}

static FORK_HOOK_REGISTRATIONS: AtomicUsize = AtomicUsize::new(0);

/// Registers the child-side fork hook with the OS. Called from the winning
/// `start`, so at most once per process in ordinary use.
///
/// On platforms without native process duplication there is nothing to
/// register; the host can call [`postfork_child`] from its own fork
/// surrogate instead.
pub(crate) fn register_fork_hook() {
    #[cfg(unix)]
    {
        // Safety: registering an async-signal-safe handler; the hook body
        // only performs atomic stores.
        let rc = unsafe { libc::pthread_atfork(None, None, Some(atfork_child)) };
        if rc != 0 {
            tracing::warn!("pthread_atfork failed with {rc}; fork reset hook not registered");
            return;
        }
    }
    FORK_HOOK_REGISTRATIONS.fetch_add(1, SeqCst);
}

/// Number of successful fork-hook registrations so far: zero before the
/// first [`crate::Crashtracker::start`], one afterwards.
pub fn fork_hook_registrations() -> usize {
    FORK_HOOK_REGISTRATIONS.load(SeqCst)
}

#[cfg(unix)]
extern "C" fn atfork_child() {
    postfork_child();
}

/// Re-synchronizes process-wide profiler state in a freshly forked child:
/// clears the phase flags (the parent's in-flight stage is meaningless here)
/// and empties the sample pool (the child must not reuse buffers from the
/// parent's potentially half-mutated pool).
///
/// Invoked automatically, exactly once per fork, by the hook registered at
/// start. Hosts that intercept fork themselves may also call it directly.
///
/// SIGNAL SAFETY:
///     Restricted to atomic stores. Takes no locks that a vanished parent
///     thread could hold, and performs no heap allocation or deallocation.
pub fn postfork_child() {
    super::Crashtracker::instance().reset_phases();
    SampleManager::instance().postfork_child();
}

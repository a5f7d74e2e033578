// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Crash-context arming and phase tracking.
//!
//! A process has exactly one [`Crashtracker`], reached through
//! [`Crashtracker::instance`]. The host configures it during single-threaded
//! startup, arms it once with [`Crashtracker::start`], and thereafter toggles
//! the phase flags around each stage of its sampling pipeline. Fork and
//! signal behaviour depend on the one-instance-per-process semantic, which is
//! why the constructor is not public.

mod backend;
mod configuration;
mod lifecycle;
mod phase;

pub use backend::CrashtrackerBackend;
pub use configuration::{CrashtrackerConfiguration, Metadata, StacktraceCollection};
pub use lifecycle::{fork_hook_registrations, postfork_child};
pub use phase::{
    PhaseError, PhaseFlags, ProfilingPhase, DD_CRASHTRACK_BEGIN_PHASES, DD_CRASHTRACK_END_PHASES,
};

use lifecycle::LifecycleFlag;
use std::sync::{Mutex, PoisonError};

static INSTANCE: Crashtracker = Crashtracker::new();

/// Process-wide crash-context state: the configuration handed to the crash
/// handling mechanism at start, and the phase flags it reads at fault time.
pub struct Crashtracker {
    config: Mutex<CrashtrackerConfiguration>,
    phases: PhaseFlags,
    lifecycle: LifecycleFlag,
}

impl Crashtracker {
    const fn new() -> Self {
        Self {
            config: Mutex::new(CrashtrackerConfiguration::new()),
            phases: PhaseFlags::new(),
            lifecycle: LifecycleFlag::new(),
        }
    }

    /// The single instance for this process. Lives for the process lifetime;
    /// there is no teardown beyond process exit.
    pub fn instance() -> &'static Crashtracker {
        &INSTANCE
    }

    /// Applies a mutation to the configuration. Conventionally called only
    /// during single-threaded startup, before [`Crashtracker::start`]; the
    /// lock makes concurrent use safe anyway, and mutation after start has no
    /// effect on an already-armed handler.
    pub fn configure(&self, f: impl FnOnce(&mut CrashtrackerConfiguration)) {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut config);
    }

    /// See [`CrashtrackerConfiguration::set_receiver_binary_path`]. Returns
    /// whether the path was accepted; on `false` the prior configuration is
    /// unchanged.
    pub fn set_receiver_binary_path(&self, path: impl Into<String>) -> bool {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        config.set_receiver_binary_path(path)
    }

    pub fn config_snapshot(&self) -> CrashtrackerConfiguration {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Arms the crash-handling mechanism with the current configuration and
    /// registers the fork-child reset hook. Thread-safe and idempotent: under
    /// arbitrary concurrent first-call races the body executes exactly once,
    /// and every later call is a no-op. Returns whether this call was the one
    /// that performed initialization.
    ///
    /// A backend installation failure is logged and otherwise swallowed, so
    /// the host proceeds with degraded crash reporting rather than aborting
    /// its own startup.
    pub fn start(&self, backend: &dyn CrashtrackerBackend) -> bool {
        if !self.lifecycle.begin_start() {
            return false;
        }
        let config = self.config_snapshot();
        let metadata = config.metadata();
        if let Err(e) = backend.install(&config, &metadata) {
            tracing::error!("failed to arm crash tracking: {e:#}");
        }
        lifecycle::register_fork_hook();
        self.lifecycle.complete_start();
        true
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    // The phase transitions below may be called by components which have no
    // knowledge of whether the crashtracker was started. We let them call,
    // but ignore them if it was not: better to miss a flag than to force
    // every caller to track arming state.

    pub fn sampling_start(&self) {
        if self.lifecycle.is_started() {
            self.phases.start(ProfilingPhase::Sampling);
        }
    }

    pub fn sampling_stop(&self) {
        if self.lifecycle.is_started() {
            self.phases.stop(ProfilingPhase::Sampling);
        }
    }

    pub fn unwinding_start(&self) {
        if self.lifecycle.is_started() {
            self.phases.start(ProfilingPhase::Unwinding);
        }
    }

    pub fn unwinding_stop(&self) {
        if self.lifecycle.is_started() {
            self.phases.stop(ProfilingPhase::Unwinding);
        }
    }

    pub fn serializing_start(&self) {
        if self.lifecycle.is_started() {
            self.phases.start(ProfilingPhase::Serializing);
        }
    }

    pub fn serializing_stop(&self) {
        if self.lifecycle.is_started() {
            self.phases.stop(ProfilingPhase::Serializing);
        }
    }

    /// Read side for the crash handler: the flags as they stand right now.
    pub fn phases(&self) -> &PhaseFlags {
        &self.phases
    }

    pub(crate) fn reset_phases(&self) {
        self.phases.reset();
    }
}

// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::configuration::{CrashtrackerConfiguration, Metadata};

/// Interface to the native crash-handling mechanism.
///
/// The mechanism itself lives outside this crate: it owns signal-handler
/// installation, spawning the receiver process, and serializing a crash
/// report (which incorporates the current configuration metadata and
/// [`crate::PhaseFlags`] state at fault time). This crate only materializes
/// the current configuration into it, exactly once, when
/// [`crate::Crashtracker::start`] first runs.
pub trait CrashtrackerBackend: Send + Sync {
    /// Installs crash handling armed with the given configuration and
    /// metadata.
    ///
    /// PRECONDITIONS:
    ///     Called at most once per process by this crate.
    /// SAFETY:
    ///     Crash-tracking functions are not reentrant.
    fn install(&self, config: &CrashtrackerConfiguration, metadata: &Metadata)
        -> anyhow::Result<()>;
}

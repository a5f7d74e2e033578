// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process glue between a profiler and the crash-tracking runtime.
//!
//! This crate owns two process-wide concerns of a profiling agent:
//!
//! * **Crash context**: [`Crashtracker`] collects process/runtime metadata
//!   and arms an external crash-handling mechanism with it, then keeps a set
//!   of phase flags describing what the profiler was doing (sampling,
//!   unwinding, serializing) up to date so a crash report can say which
//!   pipeline stage was in flight at fault time.
//! * **Sample buffer reuse**: [`SampleManager`] hands out [`Sample`] working
//!   buffers from a free list so the high-frequency sampling loop does not
//!   pay allocation cost on every sample.
//!
//! Both are fork-aware: starting the crashtracker registers a
//! `pthread_atfork` child hook that resets the phase flags and the sample
//! pool in a freshly forked child, using only operations that are legal in
//! that restricted context.

pub mod crashtracker;
pub mod sample;

pub use crashtracker::{
    Crashtracker, CrashtrackerBackend, CrashtrackerConfiguration, Metadata, PhaseFlags,
    ProfilingPhase, StacktraceCollection,
};
pub use sample::{PooledSample, Sample, SampleManager, SampleType};

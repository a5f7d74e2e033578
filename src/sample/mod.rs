// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Allocation-amortized sample buffers.
//!
//! A [`Sample`] carries growable per-sample buffers (frames, labels, value
//! slots); constructing and freeing one per sampling event would dominate
//! hot-path cost at high sampling frequency. [`SampleManager`] therefore
//! recycles samples through a free list: after the in-flight working set has
//! warmed the pool, acquiring a sample costs a pointer swap.

mod manager;
mod pool;
#[allow(clippy::module_inception)]
mod sample;
mod types;

pub use manager::{SampleManager, DEFAULT_MAX_NFRAMES, MAX_NFRAMES};
pub use pool::PooledSample;
pub use sample::{Frame, Label, LabelValue, Sample};
pub use types::SampleType;

// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::pool::{PooledSample, SamplePool};
use super::sample::Sample;
use super::types::SampleType;
use std::sync::atomic::{AtomicU32, Ordering::SeqCst};
use std::sync::OnceLock;

/// Hard backend limit on frames kept per sample; requests above it are
/// silently clamped.
pub const MAX_NFRAMES: u32 = 512;
/// Frame limit used when the host never asks for one.
pub const DEFAULT_MAX_NFRAMES: u32 = 64;

/// Construction parameters shared by every pool-miss sample, frozen at
/// [`SampleManager::init`].
#[derive(Debug, Copy, Clone)]
struct SampleParams {
    type_mask: SampleType,
    max_nframes: u32,
}

static INSTANCE: SampleManager = SampleManager::new();

/// Facade combining sample-construction configuration with pool-backed
/// acquire/release.
///
/// The expected call order is: any number of [`SampleManager::add_type`] and
/// [`SampleManager::set_max_nframes`] calls, one [`SampleManager::init`],
/// then the sampling loop of [`SampleManager::start_sample`] /
/// [`SampleManager::drop_sample`]. Acquire and release are safe under
/// concurrent multi-thread use and never block for longer than a pointer
/// swap.
pub struct SampleManager {
    type_mask: AtomicU32,
    max_nframes: AtomicU32,
    params: OnceLock<SampleParams>,
    pool: SamplePool,
}

impl Default for SampleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleManager {
    pub const fn new() -> Self {
        Self {
            type_mask: AtomicU32::new(0),
            max_nframes: AtomicU32::new(DEFAULT_MAX_NFRAMES),
            params: OnceLock::new(),
            pool: SamplePool::new(),
        }
    }

    /// The process-wide manager, reset on fork by the crashtracker's child
    /// hook.
    pub fn instance() -> &'static SampleManager {
        &INSTANCE
    }

    /// Enables a sample category. Accumulates across calls; bits outside the
    /// declared vocabulary are discarded.
    pub fn add_type(&self, sample_type: SampleType) {
        self.type_mask
            .fetch_or(SampleType::from_bits(sample_type.bits()).bits(), SeqCst);
    }

    /// Sets the per-sample frame limit. Zero means "no change"; values above
    /// [`MAX_NFRAMES`] are clamped.
    pub fn set_max_nframes(&self, max_nframes: u32) {
        if max_nframes > 0 {
            self.max_nframes.store(max_nframes.min(MAX_NFRAMES), SeqCst);
        }
    }

    /// Forwards the process-wide timeline toggle to the sample type.
    pub fn set_timeline(&self, enabled: bool) {
        Sample::set_timeline(enabled);
    }

    pub fn type_mask(&self) -> SampleType {
        SampleType::from_bits(self.type_mask.load(SeqCst))
    }

    pub fn max_nframes(&self) -> u32 {
        self.max_nframes.load(SeqCst)
    }

    /// One-time freeze of the construction parameters used on pool misses.
    /// Call after all `add_type`/`set_max_nframes` calls and before the first
    /// `start_sample`; later calls are no-ops.
    pub fn init(&self) {
        let _ = self.params.set(self.current_params());
    }

    fn current_params(&self) -> SampleParams {
        SampleParams {
            type_mask: self.type_mask(),
            max_nframes: self.max_nframes(),
        }
    }

    /// Returns a ready sample with empty buffers: one recycled from the pool
    /// when possible, otherwise a newly constructed one parameterized by the
    /// frozen type mask and frame limit.
    pub fn start_sample(&self) -> PooledSample<'_> {
        let params = *self.params.get_or_init(|| self.current_params());
        let sample = match self.pool.take() {
            Some(sample) => sample,
            None => self
                .pool
                .adopt(Sample::new(params.type_mask, params.max_nframes)),
        };
        debug_assert!(sample.is_cleared());
        sample
    }

    /// Clears the sample's buffers and returns it to the pool. The sample is
    /// never destroyed; the pool never shrinks on its own.
    pub fn drop_sample(&self, sample: PooledSample<'_>) {
        drop(sample);
    }

    /// Number of idle samples currently warming the pool.
    pub fn idle_samples(&self) -> usize {
        self.pool.idle_count()
    }

    /// Pool-side fork reset; invoked by the crashtracker's child hook rather
    /// than by ordinary callers.
    pub fn postfork_child(&self) {
        self.pool.reset_postfork();
    }
}

// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::types::SampleType;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};

/// One resolved stack frame recorded into a sample.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub function_name: String,
    pub filename: String,
    pub line: i64,
    pub address: u64,
}

/// A `key:value` attribute attached to a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub key: String,
    pub value: LabelValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelValue {
    Str(String),
    Num(i64),
}

/// Process-wide timeline toggle; samples record timestamps when it is on.
static TIMELINE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Working storage for one stack-sampling operation.
///
/// A sample carries growable frame and label buffers plus one value slot per
/// enabled category. Constructing one preallocates the frame buffer to the
/// frame limit, which is exactly the cost the pool in
/// [`crate::SampleManager`] exists to amortize; `clear_buffers` keeps that
/// capacity so a recycled sample allocates nothing.
#[derive(Debug)]
pub struct Sample {
    type_mask: SampleType,
    max_nframes: u32,
    frames: Vec<Frame>,
    labels: Vec<Label>,
    values: Vec<i64>,
    dropped_frames: usize,
}

impl Sample {
    pub fn new(type_mask: SampleType, max_nframes: u32) -> Self {
        Self {
            type_mask,
            max_nframes,
            frames: Vec::with_capacity(max_nframes as usize),
            labels: Vec::new(),
            values: vec![0; type_mask.count()],
            dropped_frames: 0,
        }
    }

    pub fn type_mask(&self) -> SampleType {
        self.type_mask
    }

    pub fn max_nframes(&self) -> u32 {
        self.max_nframes
    }

    /// Records a frame, innermost first. Frames beyond the limit are counted
    /// rather than stored; returns whether the frame was kept.
    pub fn push_frame(&mut self, frame: Frame) -> bool {
        if self.frames.len() >= self.max_nframes as usize {
            self.dropped_frames += 1;
            return false;
        }
        self.frames.push(frame);
        true
    }

    pub fn push_label(&mut self, key: impl Into<String>, value: LabelValue) {
        self.labels.push(Label {
            key: key.into(),
            value,
        });
    }

    /// Adds into the value slot for the given category. Ignored when the
    /// category is not in this sample's mask.
    pub fn add_value(&mut self, category: SampleType, value: i64) {
        if !self.type_mask.contains(category) || category.count() != 1 {
            return;
        }
        // Slot index is the rank of the category bit among the enabled bits.
        let below = self.type_mask.bits() & (category.bits() - 1);
        let idx = below.count_ones() as usize;
        self.values[idx] += value;
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn dropped_frames(&self) -> usize {
        self.dropped_frames
    }

    /// Whether the buffers hold no data from any sampling operation.
    pub fn is_cleared(&self) -> bool {
        self.frames.is_empty()
            && self.labels.is_empty()
            && self.dropped_frames == 0
            && self.values.iter().all(|v| *v == 0)
    }

    /// Empties every buffer while retaining capacity. Must run before a
    /// sample returns to the pool so no data leaks into the next reuse.
    pub fn clear_buffers(&mut self) {
        self.frames.clear();
        self.labels.clear();
        self.values.fill(0);
        self.dropped_frames = 0;
    }

    pub fn set_timeline(enabled: bool) {
        TIMELINE_ENABLED.store(enabled, SeqCst);
    }

    pub fn timeline_enabled() -> bool {
        TIMELINE_ENABLED.load(SeqCst)
    }
}

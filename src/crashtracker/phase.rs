// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use thiserror::Error;

/// Marker lines bracketing the phase-flag block in a crash report stream.
/// The receiver scans for these when reassembling the report.
pub const DD_CRASHTRACK_BEGIN_PHASES: &str = "DD_CRASHTRACK_BEGIN_PHASES";
pub const DD_CRASHTRACK_END_PHASES: &str = "DD_CRASHTRACK_END_PHASES";

/// This enum represents pipeline stages the profiler might be engaged in.
/// The idea is that if a crash consistently occurs while a particular stage
/// is ongoing, its likely related.
///
/// NOTE: This enum is known to be non-exhaustive.  Feel free to add new
///       stages as needed.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ProfilingPhase {
    Sampling = 0,
    Unwinding,
    Serializing,
    /// Dummy value to allow easier iteration
    SIZE,
}

impl ProfilingPhase {
    /// A static string giving the name of the `ProfilingPhase`.
    /// We implement this, rather than `to_string`, to avoid the memory
    /// allocation associated with `String`.
    pub fn name(i: usize) -> Result<&'static str, PhaseError> {
        let rval = match i {
            0 => "sampling",
            1 => "unwinding",
            2 => "serializing",
            _ => return Err(PhaseError::InvalidEnumValue(i)),
        };
        Ok(rval)
    }
}

// In this case, we actually WANT multiple copies of the interior mutable struct
#[allow(clippy::declare_interior_mutable_const)]
const ATOMIC_FALSE: AtomicBool = AtomicBool::new(false);

/// One boolean indicator per profiling stage, read by the crash handler at
/// fault time. There is no ordering relation between the flags, and no
/// pairing is enforced between starts and stops: correctness here means
/// best-effort visibility to whatever reads the flags when a crash happens.
pub struct PhaseFlags {
    flags: [AtomicBool; ProfilingPhase::SIZE as usize],
}

impl Default for PhaseFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseFlags {
    pub const fn new() -> Self {
        Self {
            flags: [ATOMIC_FALSE; ProfilingPhase::SIZE as usize],
        }
    }

    /// Track that a profiling stage has begun.
    /// Infallible; repeated starts are idempotent.
    /// ATOMICITY:
    ///     This function is atomic and never blocks or allocates.
    pub fn start(&self, phase: ProfilingPhase) {
        self.flags[phase as usize].store(true, SeqCst);
    }

    /// Track that a profiling stage has finished.
    /// Infallible; a stop without a prior start is a no-op.
    /// ATOMICITY:
    ///     This function is atomic and never blocks or allocates.
    pub fn stop(&self, phase: ProfilingPhase) {
        self.flags[phase as usize].store(false, SeqCst);
    }

    pub fn is_active(&self, phase: ProfilingPhase) -> bool {
        self.flags[phase as usize].load(SeqCst)
    }

    pub fn any_active(&self) -> bool {
        self.flags.iter().any(|f| f.load(SeqCst))
    }

    /// Resets all flags to inactive.
    /// Expected to be used after a fork, to reset the flags on the child:
    /// whatever stage the parent was in is not meaningful there.
    /// ATOMICITY:
    ///     Each store is atomic; the sweep as a whole is not. Should only be
    ///     used when no conflicting updates can occur, e.g. after a fork but
    ///     before profiling resumes on the child.
    pub fn reset(&self) {
        for f in self.flags.iter() {
            f.store(false, SeqCst);
        }
    }

    /// Emits the flags as structured json to the given writer.
    /// In particular, a series of lines:
    ///
    /// DD_CRASHTRACK_BEGIN_PHASES
    /// {"phase_1_name": 0_or_1}
    /// ...
    /// {"phase_n_name": 0_or_1}
    /// DD_CRASHTRACK_END_PHASES
    ///
    /// SIGNAL SAFETY:
    ///     This function is careful to only write to the handle, without
    ///     taking any mutexes or allocating memory.
    pub fn emit(&self, w: &mut impl Write) -> Result<(), PhaseError> {
        writeln!(w, "{DD_CRASHTRACK_BEGIN_PHASES}")?;
        for (i, f) in self.flags.iter().enumerate() {
            writeln!(
                w,
                "{{\"{}\": {}}}",
                ProfilingPhase::name(i)?,
                f.load(SeqCst) as u8
            )?;
        }
        writeln!(w, "{DD_CRASHTRACK_END_PHASES}")?;
        w.flush()?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("Invalid enum value: {0}")]
    InvalidEnumValue(usize),
    #[error("Failed to write to output: {0}")]
    WriteError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop_toggles_the_right_flag() {
        let phases = PhaseFlags::new();
        assert!(!phases.any_active());

        phases.start(ProfilingPhase::Unwinding);
        assert!(phases.is_active(ProfilingPhase::Unwinding));
        assert!(!phases.is_active(ProfilingPhase::Sampling));
        assert!(!phases.is_active(ProfilingPhase::Serializing));

        phases.stop(ProfilingPhase::Unwinding);
        assert!(!phases.any_active());
    }

    #[test]
    fn test_stop_without_start_is_a_noop() {
        let phases = PhaseFlags::new();
        phases.stop(ProfilingPhase::Sampling);
        phases.stop(ProfilingPhase::Sampling);
        assert!(!phases.is_active(ProfilingPhase::Sampling));

        // The pair keeps working normally afterwards.
        phases.start(ProfilingPhase::Sampling);
        assert!(phases.is_active(ProfilingPhase::Sampling));
        phases.stop(ProfilingPhase::Sampling);
        assert!(!phases.is_active(ProfilingPhase::Sampling));
    }

    #[test]
    fn test_repeated_starts_are_idempotent() {
        let phases = PhaseFlags::new();
        phases.start(ProfilingPhase::Serializing);
        phases.start(ProfilingPhase::Serializing);
        phases.stop(ProfilingPhase::Serializing);
        assert!(!phases.is_active(ProfilingPhase::Serializing));
    }

    #[test]
    fn test_reset_clears_everything() {
        let phases = PhaseFlags::new();
        phases.start(ProfilingPhase::Sampling);
        phases.start(ProfilingPhase::Unwinding);
        phases.start(ProfilingPhase::Serializing);
        phases.reset();
        assert!(!phases.any_active());
    }

    #[test]
    fn test_emit_format() {
        let phases = PhaseFlags::new();
        phases.start(ProfilingPhase::Unwinding);

        let mut buf = Vec::new();
        phases.emit(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                DD_CRASHTRACK_BEGIN_PHASES,
                "{\"sampling\": 0}",
                "{\"unwinding\": 1}",
                "{\"serializing\": 0}",
                DD_CRASHTRACK_END_PHASES,
            ]
        );
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(ProfilingPhase::name(0).unwrap(), "sampling");
        assert_eq!(ProfilingPhase::name(2).unwrap(), "serializing");
        assert!(ProfilingPhase::name(3).is_err());
    }
}

// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle behaviour of the process-wide crashtracker instance. The whole
//! scenario lives in one test function because arming is, by design, a
//! one-way transition for the life of the test process.

use libdd_profiling_agent::crashtracker::{fork_hook_registrations, postfork_child};
use libdd_profiling_agent::{
    Crashtracker, CrashtrackerBackend, CrashtrackerConfiguration, Metadata, StacktraceCollection,
};
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::Mutex;

#[derive(Default)]
struct RecordingBackend {
    installs: AtomicUsize,
    seen: Mutex<Option<(CrashtrackerConfiguration, Metadata)>>,
}

impl CrashtrackerBackend for RecordingBackend {
    fn install(
        &self,
        config: &CrashtrackerConfiguration,
        metadata: &Metadata,
    ) -> anyhow::Result<()> {
        self.installs.fetch_add(1, SeqCst);
        *self.seen.lock().unwrap() = Some((config.clone(), metadata.clone()));
        Ok(())
    }
}

#[test]
fn test_exactly_once_start_and_fork_reset() {
    let tracker = Crashtracker::instance();
    let backend = RecordingBackend::default();

    tracker.configure(|config| {
        config.set_service("profiling-tests");
        config.set_env("ci");
        config.set_runtime("python");
        config.set_create_alt_stack(true);
        config.set_resolve_frames(StacktraceCollection::EnabledWithSymbolsInReceiver);
    });

    // Before start, phase transitions are silent no-ops and nothing has been
    // handed to the crash-handling mechanism.
    assert!(!tracker.is_started());
    tracker.sampling_start();
    tracker.unwinding_start();
    tracker.serializing_start();
    assert!(!tracker.phases().any_active());
    assert_eq!(backend.installs.load(SeqCst), 0);
    assert_eq!(fork_hook_registrations(), 0);

    // Race the first start across many threads: the body runs exactly once.
    let winners: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| s.spawn(|| tracker.start(&backend) as usize))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(winners, 1);
    assert_eq!(backend.installs.load(SeqCst), 1);
    assert_eq!(fork_hook_registrations(), 1);
    assert!(tracker.is_started());

    // The winner materialized the configuration current at start time.
    let (config, metadata) = backend.seen.lock().unwrap().take().unwrap();
    assert_eq!(config.service(), "profiling-tests");
    assert!(config.create_alt_stack());
    assert_eq!(
        config.resolve_frames(),
        StacktraceCollection::EnabledWithSymbolsInReceiver
    );
    assert_eq!(metadata.family, "python");
    assert!(metadata.tags.contains(&"service:profiling-tests".to_string()));
    assert!(metadata.tags.contains(&"env:ci".to_string()));

    // Later calls are no-ops regardless of the backend offered.
    let other = RecordingBackend::default();
    assert!(!tracker.start(&other));
    assert_eq!(other.installs.load(SeqCst), 0);
    assert_eq!(backend.installs.load(SeqCst), 1);
    assert_eq!(fork_hook_registrations(), 1);

    // After start the six transitions drive the flags.
    tracker.sampling_start();
    tracker.unwinding_start();
    assert!(tracker
        .phases()
        .is_active(libdd_profiling_agent::ProfilingPhase::Sampling));
    assert!(tracker
        .phases()
        .is_active(libdd_profiling_agent::ProfilingPhase::Unwinding));
    tracker.unwinding_stop();
    assert!(!tracker
        .phases()
        .is_active(libdd_profiling_agent::ProfilingPhase::Unwinding));

    // A stop without a matching start stays a no-op even when armed.
    tracker.serializing_stop();
    assert!(!tracker
        .phases()
        .is_active(libdd_profiling_agent::ProfilingPhase::Serializing));

    // Simulated fork: the child hook clears the in-flight phase but leaves
    // the tracker armed (atfork registrations survive fork, so nothing needs
    // re-arming in the child).
    tracker.serializing_start();
    postfork_child();
    assert!(!tracker.phases().any_active());
    assert!(tracker.is_started());

    // The phase machinery keeps working after the reset.
    tracker.sampling_start();
    assert!(tracker
        .phases()
        .is_active(libdd_profiling_agent::ProfilingPhase::Sampling));
    tracker.sampling_stop();
    assert!(!tracker.phases().any_active());
}

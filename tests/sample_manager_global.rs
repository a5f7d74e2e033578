// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fork behaviour of the process-wide sample manager. Runs against the
//! global instance, so it gets its own test process.

use libdd_profiling_agent::crashtracker::postfork_child;
use libdd_profiling_agent::{SampleManager, SampleType};

#[test]
fn test_fork_reset_empties_the_global_pool() {
    let manager = SampleManager::instance();
    manager.add_type(SampleType::CPU);
    manager.add_type(SampleType::WALL);
    manager.init();

    // Warm the pool, keeping one sample in flight across the fork.
    let in_flight = manager.start_sample();
    for _ in 0..3 {
        let sample = manager.start_sample();
        manager.drop_sample(sample);
    }
    assert_eq!(manager.idle_samples(), 3);

    // Simulated fork: the child-side hook leaves the pool empty.
    postfork_child();
    assert_eq!(manager.idle_samples(), 0);

    // A lease taken before the fork is discarded on release rather than
    // handed to the child's pool.
    manager.drop_sample(in_flight);
    assert_eq!(manager.idle_samples(), 0);

    // Sampling resumes normally in the child.
    let sample = manager.start_sample();
    assert!(sample.is_cleared());
    assert_eq!(sample.type_mask(), SampleType::CPU | SampleType::WALL);
    manager.drop_sample(sample);
    assert_eq!(manager.idle_samples(), 1);
}

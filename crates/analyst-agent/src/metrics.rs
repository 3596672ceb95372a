//! Prometheus metrics collection and formatting.
//!
//! Counters are plain atomics shared by the RPC service and the lease
//! manager, rendered in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters.
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_executed: AtomicU64,
    tasks_failed: AtomicU64,
    subtasks_skipped: AtomicU64,
    lease_renewals: AtomicU64,
    lease_reacquisitions: AtomicU64,
    reregistration_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_task_executed(&self) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_subtasks_skipped(&self, count: usize) {
        self.subtasks_skipped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_lease_renewal(&self) {
        self.lease_renewals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lease_reacquired(&self) {
        self.lease_reacquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reregistration_failure(&self) {
        self.reregistration_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tasks_executed(&self) -> u64 {
        self.tasks_executed.load(Ordering::Relaxed)
    }

    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    pub fn subtasks_skipped(&self) -> u64 {
        self.subtasks_skipped.load(Ordering::Relaxed)
    }

    pub fn lease_renewals(&self) -> u64 {
        self.lease_renewals.load(Ordering::Relaxed)
    }

    pub fn lease_reacquisitions(&self) -> u64 {
        self.lease_reacquisitions.load(Ordering::Relaxed)
    }

    pub fn reregistration_failures(&self) -> u64 {
        self.reregistration_failures.load(Ordering::Relaxed)
    }

    /// Format all counters as Prometheus text.
    pub fn render(&self) -> String {
        let mut output = String::new();

        write_counter(
            &mut output,
            "analyst_tasks_total",
            "Tasks handled by outcome",
            &[
                ("outcome=\"executed\"", self.tasks_executed()),
                ("outcome=\"failed\"", self.tasks_failed()),
            ],
        );
        write_counter(
            &mut output,
            "analyst_subtasks_skipped_total",
            "Sub-tasks dropped because their type is unknown",
            &[("", self.subtasks_skipped())],
        );
        write_counter(
            &mut output,
            "analyst_lease_renewals_total",
            "Successful lease keep-alives",
            &[("", self.lease_renewals())],
        );
        write_counter(
            &mut output,
            "analyst_lease_reacquisitions_total",
            "Leases granted again after a failed renewal",
            &[("", self.lease_reacquisitions())],
        );
        write_counter(
            &mut output,
            "analyst_reregistration_failures_total",
            "Failed attempts to re-acquire a lease and re-publish the key",
            &[("", self.reregistration_failures())],
        );

        output
    }
}

fn write_counter(output: &mut String, name: &str, help: &str, samples: &[(&str, u64)]) {
    if !output.is_empty() {
        writeln!(output).ok();
    }
    writeln!(output, "# HELP {name} {help}").ok();
    writeln!(output, "# TYPE {name} counter").ok();
    for (labels, value) in samples {
        if labels.is_empty() {
            writeln!(output, "{name} {value}").ok();
        } else {
            writeln!(output, "{name}{{{labels}}} {value}").ok();
        }
    }
}

// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Stacktrace collection occurs in the context of a crashing process.
/// If the stack is sufficiently corrupted, it is possible (but unlikely),
/// for stack trace collection itself to crash.
/// We recommend fully enabling stacktrace collection, but having an
/// environment variable to allow downgrading the collector.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StacktraceCollection {
    Disabled,
    WithoutSymbols,
    /// Gathers symbol information in the crashing process itself. Yields the
    /// most complete traces, at the cost of doing the most work inside a
    /// signal handler.
    EnabledWithInprocessSymbols,
    EnabledWithSymbolsInReceiver,
}

/// Mutable metadata consumed by the external crash-handling mechanism.
///
/// All fields are freely mutable before [`crate::Crashtracker::start`];
/// mutation after start has no defined effect on an already-armed handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashtrackerConfiguration {
    url: String,
    service: String,
    env: String,
    version: String,
    runtime: String,
    runtime_version: String,
    runtime_id: String,
    library_version: String,
    stdout_filename: Option<String>,
    stderr_filename: Option<String>,
    receiver_binary_path: String,
    create_alt_stack: bool,
    resolve_frames: StacktraceCollection,
}

/// Metadata record shipped to the receiver alongside a crash report.
/// Tags carry the `key:value` resource attributes built from the
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub library_name: String,
    pub library_version: String,
    pub family: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Default for CrashtrackerConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl CrashtrackerConfiguration {
    pub const fn new() -> Self {
        Self {
            url: String::new(),
            service: String::new(),
            env: String::new(),
            version: String::new(),
            runtime: String::new(),
            runtime_version: String::new(),
            runtime_id: String::new(),
            library_version: String::new(),
            stdout_filename: None,
            stderr_filename: None,
            receiver_binary_path: String::new(),
            create_alt_stack: false,
            resolve_frames: StacktraceCollection::Disabled,
        }
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn set_service(&mut self, service: impl Into<String>) {
        self.service = service.into();
    }

    pub fn set_env(&mut self, env: impl Into<String>) {
        self.env = env.into();
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    pub fn set_runtime(&mut self, runtime: impl Into<String>) {
        self.runtime = runtime.into();
    }

    pub fn set_runtime_version(&mut self, runtime_version: impl Into<String>) {
        self.runtime_version = runtime_version.into();
    }

    pub fn set_runtime_id(&mut self, runtime_id: impl Into<String>) {
        self.runtime_id = runtime_id.into();
    }

    pub fn set_library_version(&mut self, library_version: impl Into<String>) {
        self.library_version = library_version.into();
    }

    pub fn set_stdout_filename(&mut self, filename: impl Into<String>) {
        self.stdout_filename = Some(filename.into());
    }

    pub fn set_stderr_filename(&mut self, filename: impl Into<String>) {
        self.stderr_filename = Some(filename.into());
    }

    pub fn set_create_alt_stack(&mut self, create_alt_stack: bool) {
        self.create_alt_stack = create_alt_stack;
    }

    pub fn set_resolve_frames(&mut self, resolve_frames: StacktraceCollection) {
        self.resolve_frames = resolve_frames;
    }

    /// Sets the path to the receiver executable after checking that it
    /// actually resolves to one. Returns `false` and leaves the prior path
    /// untouched when the check fails; the host may proceed with degraded
    /// crash reporting.
    pub fn set_receiver_binary_path(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if !is_executable_file(Path::new(&path)) {
            tracing::warn!("rejecting receiver binary path {path:?}: not an executable file");
            return false;
        }
        self.receiver_binary_path = path;
        true
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    pub fn runtime_id(&self) -> &str {
        &self.runtime_id
    }

    pub fn library_version(&self) -> &str {
        &self.library_version
    }

    pub fn stdout_filename(&self) -> Option<&str> {
        self.stdout_filename.as_deref()
    }

    pub fn stderr_filename(&self) -> Option<&str> {
        self.stderr_filename.as_deref()
    }

    pub fn receiver_binary_path(&self) -> &str {
        &self.receiver_binary_path
    }

    pub fn create_alt_stack(&self) -> bool {
        self.create_alt_stack
    }

    pub fn resolve_frames(&self) -> StacktraceCollection {
        self.resolve_frames
    }

    /// Builds the metadata record sent to the receiver, tagging the report
    /// with every non-empty resource attribute.
    pub fn metadata(&self) -> Metadata {
        let mut tags = Vec::new();
        let mut push = |key: &str, value: &str| {
            if !value.is_empty() {
                tags.push(format!("{key}:{value}"));
            }
        };
        push("service", &self.service);
        push("env", &self.env);
        push("version", &self.version);
        push("runtime", &self.runtime);
        push("runtime_version", &self.runtime_version);
        push("runtime-id", &self.runtime_id);
        push("library_version", &self.library_version);

        let family = if self.runtime.is_empty() {
            "native".to_string()
        } else {
            self.runtime.clone()
        };
        Metadata {
            library_name: env!("CARGO_PKG_NAME").to_string(),
            library_version: self.library_version.clone(),
            family,
            tags,
        }
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match path.metadata() {
        Ok(m) => m.is_file() && m.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

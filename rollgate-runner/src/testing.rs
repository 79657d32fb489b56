//! Test doubles shared by the controller's unit tests

use async_trait::async_trait;
use rollgate_core::domain::{CommandLine, InitSystem, PlatformFamily, PlatformProfile, ServiceTarget};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ProcessError;
use crate::host::HostFacts;
use crate::process::{ProcessOutput, ProcessRunner, SystemProcessRunner};
use crate::service::HealthGate;

type Responder = dyn Fn(&CommandLine) -> ProcessOutput + Send + Sync;

/// Process runner that answers from a closure and records every command
pub struct ScriptedRunner {
    calls: Mutex<Vec<CommandLine>>,
    responder: Box<Responder>,
    passthrough_tar: bool,
}

impl ScriptedRunner {
    pub fn new(responder: impl Fn(&CommandLine) -> ProcessOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            passthrough_tar: false,
        }
    }

    /// Runner where every command succeeds with empty output
    pub fn succeeding() -> Self {
        Self::new(|_| ProcessOutput::ok(""))
    }

    /// Runs `tar` for real, scripting everything else
    pub fn with_real_tar(mut self) -> Self {
        self.passthrough_tar = true;
        self
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded commands matching `program` and first argument
    pub fn count(&self, program: &str, first: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is(program, first))
            .count()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandLine) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.clone());
        if self.passthrough_tar && command.program == "tar" {
            return SystemProcessRunner::default().run(command).await;
        }
        Ok((self.responder)(command))
    }
}

/// Health gate returning a fixed answer and counting calls
pub struct StubGate {
    healthy: bool,
    calls: AtomicUsize,
}

impl StubGate {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthGate for StubGate {
    async fn check(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.healthy
    }
}

/// Debian/systemd target used throughout the tests
pub fn debian_target() -> Arc<ServiceTarget> {
    Arc::new(debian_profile().service_target())
}

pub fn debian_profile() -> PlatformProfile {
    PlatformProfile::for_family(PlatformFamily::Debian, InitSystem::Systemd)
}

/// Facts of an Ubuntu 22.04 host
pub fn ubuntu_host() -> HostFacts {
    HostFacts {
        hostname: "web-01".to_string(),
        platform: "ubuntu".to_string(),
        platform_version: "22.04".to_string(),
        family: PlatformFamily::Debian,
        init: InitSystem::Systemd,
        memory_mb: Some(4096),
        cpu_cores: Some(4),
    }
}

//! Service launch and supervision.
//!
//! This module spawns each selected service behind a pseudo-terminal so
//! programs keep their interactive-terminal behavior (line buffering,
//! color), drains every pty into the shared console as tagged lines, and
//! waits for the whole fleet. On interrupt it terminates the running
//! services and relaunches their teardown commands through the same
//! pipeline.

use std::future::Future;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use tokio::task::{JoinError, JoinSet};

use crate::color;
use crate::output::{self, LineSink};
use crate::select::{self, RunRequest};
use crate::service::{LaunchedService, ServiceSpec};

/// Bytes read from a pty master per loop iteration.
const READ_CHUNK: usize = 1024;

/// Runtime options that adjust supervision behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSettings {
    /// Exit non-zero when any service exits with failure.
    pub fail_on_error: bool,
    /// Grace period before force-killing services after an interrupt.
    pub kill_after: Option<Duration>,
}

/// Outcome of one supervised task.
enum TaskDone {
    /// A reader task drained its pty to end of stream.
    Drained,
    /// A service process exited.
    Exited { name: String, success: bool },
}

/// Launches the selected services and supervises them until they finish
/// or the run is interrupted.
pub struct Runner {
    specs: Vec<ServiceSpec>,
    sink: Arc<dyn LineSink>,
    settings: RunSettings,
    launched: Vec<LaunchedService>,
    tasks: JoinSet<TaskDone>,
    failed: Vec<String>,
}

impl Runner {
    pub fn new(specs: Vec<ServiceSpec>, sink: Arc<dyn LineSink>, settings: RunSettings) -> Self {
        Self {
            specs,
            sink,
            settings,
            launched: Vec::new(),
            tasks: JoinSet::new(),
            failed: Vec::new(),
        }
    }

    /// Runs the requested services until they finish or the process
    /// receives an interrupt (ctrl-c, or SIGTERM on unix).
    pub async fn run(self, request: &RunRequest) -> Result<()> {
        self.run_with_shutdown(request, interrupt()).await
    }

    /// Same as `run`, with an explicit shutdown trigger.
    pub async fn run_with_shutdown(
        mut self,
        request: &RunRequest,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let declared: Vec<String> = self.specs.iter().map(|s| s.name.clone()).collect();
        let selected = select::resolve(&declared, request)?;

        let specs = self.specs.clone();
        let running: Vec<&str> = specs
            .iter()
            .filter(|spec| selected.contains(&spec.name))
            .map(|spec| spec.name.as_str())
            .collect();
        self.sink
            .line(&format!("spinning up: {}", running.join(", ")));

        for (index, spec) in specs.iter().enumerate() {
            if !selected.contains(&spec.name) {
                continue;
            }
            let commands = spec.startup_commands(request.include_pre_steps);
            if let Err(err) = self.launch(spec, index, &commands) {
                // Abort the rest of the sequence, but do not leave the
                // services launched so far behind.
                self.terminate_all();
                self.drain(Vec::new()).await;
                return Err(err);
            }
        }

        tokio::pin!(shutdown);
        let interrupted = loop {
            let next = tokio::select! {
                next = self.tasks.join_next() => next,
                _ = &mut shutdown => break true,
            };
            match next {
                Some(done) => self.record(done),
                None => break false,
            }
        };

        if interrupted {
            let names: Vec<&str> = self.launched.iter().map(|s| s.name.as_str()).collect();
            self.sink
                .line(&format!("shutting down: {}", names.join(", ")));
            let startup_pids = self.terminate_all();
            for (index, spec) in specs.iter().enumerate() {
                if !selected.contains(&spec.name) || spec.teardown.is_empty() {
                    continue;
                }
                if let Err(err) = self.launch(spec, index, &spec.teardown) {
                    self.sink
                        .line(&format!("teardown failed for {}: {}", spec.name, err));
                }
            }
            self.drain(startup_pids).await;
            return Ok(());
        }

        if self.settings.fail_on_error && !self.failed.is_empty() {
            bail!("services failed: {}", self.failed.join(", "));
        }
        Ok(())
    }

    /// Launches one command sequence for a service behind a fresh pty and
    /// starts the reader task draining it.
    fn launch(&mut self, spec: &ServiceSpec, index: usize, commands: &[String]) -> Result<()> {
        if commands.is_empty() {
            bail!("no commands to run for {}", spec.name);
        }
        let command_line = commands.join(" && ");
        let service_color = color::for_index(index);
        self.sink.line(&format!(
            "{}: {}",
            color::paint(service_color, &spec.name),
            color::paint(color::COMMAND, &command_line),
        ));

        let pty = native_pty_system()
            .openpty(PtySize::default())
            .with_context(|| format!("failed to open pty for {}", spec.name))?;
        let mut child = pty
            .slave
            .spawn_command(shell_command(&command_line, spec))
            .with_context(|| format!("failed to spawn {}", spec.name))?;
        // Drop the parent's slave handle so the reader sees end of stream
        // once the child exits.
        drop(pty.slave);

        let reader = pty
            .master
            .try_clone_reader()
            .with_context(|| format!("failed to open pty reader for {}", spec.name))?;
        self.spawn_reader(pty.master, reader, spec.name.clone(), service_color);

        let pid = child.process_id();
        let name = spec.name.clone();
        self.tasks.spawn_blocking(move || {
            let success = child.wait().map(|status| status.success()).unwrap_or(false);
            TaskDone::Exited { name, success }
        });
        self.launched.push(LaunchedService {
            name: spec.name.clone(),
            pid,
        });
        Ok(())
    }

    /// Reader task: drains one pty into tagged lines on the shared sink.
    ///
    /// Runs until end of stream or a read error, then flushes any trailing
    /// partial line labeled with its length. The master handle is owned
    /// here and dropped exactly once when the loop ends.
    fn spawn_reader(
        &mut self,
        master: Box<dyn MasterPty + Send>,
        mut reader: Box<dyn Read + Send>,
        name: String,
        color_code: &'static str,
    ) {
        let sink = Arc::clone(&self.sink);
        self.tasks.spawn_blocking(move || {
            let mut assembler = output::LineAssembler::new();
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        for line in assembler.feed(&chunk[..n]) {
                            sink.line(&output::tagged_line(
                                &output::service_tag(&name),
                                color_code,
                                &line,
                            ));
                        }
                    }
                }
            }
            if let Some(fragment) = assembler.finish() {
                let len = fragment.chars().count();
                sink.line(&output::tagged_line(
                    &output::fragment_tag(&name, len),
                    color_code,
                    &fragment,
                ));
            }
            drop(master);
            TaskDone::Drained
        });
    }

    fn record(&mut self, done: Result<TaskDone, JoinError>) {
        if let Ok(TaskDone::Exited {
            name,
            success: false,
        }) = done
        {
            self.failed.push(name);
        }
    }

    /// Sends a terminate request to every launched process, best effort.
    fn terminate_all(&self) -> Vec<u32> {
        let pids: Vec<u32> = self.launched.iter().filter_map(|s| s.pid).collect();
        for pid in &pids {
            send_terminate(*pid);
        }
        pids
    }

    /// Waits for all outstanding tasks. With a grace period configured,
    /// force-kills the given pids once it elapses and keeps waiting.
    async fn drain(&mut self, escalate: Vec<u32>) {
        if let Some(grace) = self.settings.kill_after {
            let deadline = tokio::time::sleep(grace);
            tokio::pin!(deadline);
            loop {
                let next = tokio::select! {
                    next = self.tasks.join_next() => next,
                    _ = &mut deadline => {
                        for pid in &escalate {
                            send_kill(*pid);
                        }
                        break;
                    }
                };
                match next {
                    Some(done) => self.record(done),
                    None => return,
                }
            }
        }
        while let Some(done) = self.tasks.join_next().await {
            self.record(done);
        }
    }
}

/// Builds the shell invocation for one joined command line, with cwd set
/// to the service's working directory. The parent environment is
/// inherited.
#[cfg(unix)]
fn shell_command(command_line: &str, spec: &ServiceSpec) -> CommandBuilder {
    let mut cmd = CommandBuilder::new("/bin/sh");
    cmd.args(["-c", command_line]);
    cmd.cwd(&spec.path);
    cmd
}

#[cfg(windows)]
fn shell_command(command_line: &str, spec: &ServiceSpec) -> CommandBuilder {
    let mut cmd = CommandBuilder::new("cmd.exe");
    cmd.args(["/C", command_line]);
    cmd.cwd(&spec.path);
    cmd
}

/// Resolves when the process receives an interrupt request.
async fn interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32) {
    unsafe {
        let pid = pid as i32;
        let _ = libc::kill(-pid, libc::SIGTERM);
        let _ = libc::kill(pid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) {
    send_ctrl_break(pid);
}

#[cfg(unix)]
fn send_kill(pid: u32) {
    unsafe {
        let pid = pid as i32;
        let _ = libc::kill(-pid, libc::SIGKILL);
        let _ = libc::kill(pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn send_kill(pid: u32) {
    send_ctrl_break(pid);
}

#[cfg(all(not(unix), windows))]
fn send_ctrl_break(pid: u32) {
    use windows_sys::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};
    // Windows has no SIGTERM; CTRL_BREAK is the closest console signal.
    unsafe {
        let _ = GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid);
    }
}

#[cfg(all(not(unix), not(windows)))]
fn send_ctrl_break(_pid: u32) {}

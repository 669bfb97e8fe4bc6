//! Supervision of a single server process.
//!
//! A [`ProcessSupervisor`] launches one executable with both output streams piped,
//! feeds every line through [`classify`] into the shared [`MetricsAggregator`] and
//! blocks until the process has exited and its output has been drained.
use std::{
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread,
    time::Instant,
};

use chrono::{DateTime, Local};
use serde::Serialize;
use strum_macros::AsRefStr;
use tracing::{debug, error, info, warn};

use crate::{
    classify::{ClassifiedLine, ServerRole, Severity, classify},
    config::{RoleMap, normalize_executable},
    constants::{DRAIN_GRACE, LAUNCH_FAILURE_EXIT_CODE},
    metrics::MetricsAggregator,
};

/// Outcome of one supervised run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    /// The supervisor saw the run through to the end.
    pub completed: bool,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Full transcript on failure, launch error message if the process never started,
    /// empty on success.
    pub output: String,
}

impl ProcessResult {
    fn launch_failure(message: String) -> Self {
        Self {
            completed: true,
            exit_code: Some(LAUNCH_FAILURE_EXIT_CODE),
            output: message,
        }
    }

    /// True when the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Lifecycle of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// `run` has not been called yet.
    NotStarted,
    /// The process is alive or its output is still draining.
    Running,
    /// The run finished with this exit code.
    Exited(Option<i32>),
    /// The executable could not be launched.
    FailedToStart,
}

/// A console line ready to be shown by a display front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    /// Server that printed the line.
    pub role: ServerRole,
    /// Severity selecting the tag color.
    pub severity: Severity,
    /// Text before the tag.
    pub leading: String,
    /// Severity tag to render in the severity color, empty for untagged lines.
    pub tag: &'static str,
    /// Text after the tag.
    pub text: String,
    /// Local time the line was read.
    pub received_at: DateTime<Local>,
}

impl DisplayLine {
    fn from_classified(line: &ClassifiedLine<'_>) -> Option<Self> {
        let split = line.display?;
        Some(Self {
            role: line.role,
            severity: split.severity,
            leading: split.leading.to_string(),
            tag: split.tag,
            text: split.remainder.to_string(),
            received_at: Local::now(),
        })
    }
}

/// Notifications delivered to the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A classified line to show.
    Line(DisplayLine),
    /// The login server reported a new online player count.
    Online(u32),
    /// A server process exited. Sent once per run.
    Stopped {
        /// Server that stopped.
        role: ServerRole,
        /// Its exit code, `None` when killed by a signal.
        exit_code: Option<i32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum StreamKind {
    Stdout,
    Stderr,
}

/// Messages flowing from the reader and waiter threads to the draining thread.
#[derive(Debug)]
pub(crate) enum PipeMessage {
    /// A line from one stream; `None` marks the end of that stream.
    Data {
        stream: StreamKind,
        line: Option<String>,
    },
    Exited(Option<i32>),
}

/// Tracks end-of-stream for stdout and stderr independently.
#[derive(Debug, Default)]
struct StreamClosures {
    stdout: bool,
    stderr: bool,
}

impl StreamClosures {
    /// Marks `stream` closed; returns `false` if it already was.
    fn close(&mut self, stream: StreamKind) -> bool {
        let flag = match stream {
            StreamKind::Stdout => &mut self.stdout,
            StreamKind::Stderr => &mut self.stderr,
        };
        !std::mem::replace(flag, true)
    }

    fn drained(&self) -> bool {
        self.stdout && self.stderr
    }
}

/// Per-run state of the draining loop.
pub(crate) struct RunPipeline {
    role: Option<ServerRole>,
    metrics: MetricsAggregator,
    events: Option<Sender<MonitorEvent>>,
    transcript: String,
    closures: StreamClosures,
    exit: Option<Option<i32>>,
}

impl RunPipeline {
    pub(crate) fn new(
        role: Option<ServerRole>,
        metrics: MetricsAggregator,
        events: Option<Sender<MonitorEvent>>,
    ) -> Self {
        Self {
            role,
            metrics,
            events,
            transcript: String::new(),
            closures: StreamClosures::default(),
            exit: None,
        }
    }

    pub(crate) fn handle(&mut self, message: PipeMessage) {
        match message {
            PipeMessage::Data {
                line: Some(line), ..
            } => self.accept_line(&line),
            PipeMessage::Data { stream, line: None } => {
                if self.closures.close(stream) {
                    debug!("{} closed", stream.as_ref());
                }
            }
            PipeMessage::Exited(code) => {
                if self.exit.is_none() {
                    self.exit = Some(code);
                }
            }
        }
    }

    fn accept_line(&mut self, raw: &str) {
        if raw.trim().is_empty() {
            return;
        }

        if let Some(role) = self.role
            && let Some(classified) = classify(role, raw)
        {
            self.metrics.record(&classified);
            if let Some(online) = classified.online {
                self.emit(MonitorEvent::Online(online));
            }
            if let Some(display) = DisplayLine::from_classified(&classified) {
                self.emit(MonitorEvent::Line(display));
            }
        }

        self.transcript.push_str(raw);
        self.transcript.push('\n');
    }

    fn emit(&mut self, event: MonitorEvent) {
        if let Some(events) = &self.events
            && events.send(event).is_err()
        {
            debug!("Display receiver dropped; no longer forwarding events");
            self.events = None;
        }
    }

    pub(crate) fn has_exited(&self) -> bool {
        self.exit.is_some()
    }

    pub(crate) fn finished(&self) -> bool {
        self.has_exited() && self.closures.drained()
    }

    /// Emits the stop notice and builds the result. Consumes the pipeline so the
    /// notice can only be sent once per run.
    pub(crate) fn finish(mut self) -> ProcessResult {
        let exit_code = self.exit.flatten();
        if let Some(role) = self.role {
            self.emit(MonitorEvent::Stopped { role, exit_code });
        }

        let output = if exit_code == Some(0) {
            String::new()
        } else {
            self.transcript
        };

        ProcessResult {
            completed: true,
            exit_code,
            output,
        }
    }
}

/// Supervises one server executable for the lifetime of its process.
pub struct ProcessSupervisor {
    executable: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    roles: RoleMap,
    metrics: MetricsAggregator,
    events: Option<Sender<MonitorEvent>>,
    role: Option<ServerRole>,
    state: SupervisorState,
}

impl ProcessSupervisor {
    /// Creates a supervisor for `executable`, which may be quoted or relative.
    pub fn new(
        executable: impl Into<String>,
        roles: RoleMap,
        metrics: MetricsAggregator,
    ) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            roles,
            metrics,
            events: None,
            role: None,
            state: SupervisorState::NotStarted,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the default working directory (the executable's directory).
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sends display lines and stop notices to `events`.
    pub fn events(mut self, events: Sender<MonitorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Role resolved at launch, if the image matched a configured server.
    pub fn role(&self) -> Option<ServerRole> {
        self.role
    }

    /// Launches the process and blocks until it exits and both streams are drained.
    ///
    /// Never imposes a timeout on the process itself.
    pub fn run(&mut self) -> ProcessResult {
        let executable = normalize_executable(&self.executable);
        let working_dir = self.resolve_working_dir(&executable);

        debug!(
            "Launching `{}` with args {:?} in {}",
            executable.display(),
            self.args,
            working_dir.display()
        );

        let mut command = Command::new(&executable);
        command
            .args(&self.args)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                let message = format!("Failed to start '{}': {err}", executable.display());
                error!("{message}");
                self.role = None;
                self.state = SupervisorState::FailedToStart;
                return ProcessResult::launch_failure(message);
            }
        };

        self.role = executable
            .file_stem()
            .and_then(|stem| self.roles.resolve(&stem.to_string_lossy()));
        self.state = SupervisorState::Running;

        match self.role {
            Some(role) => info!("{} started with PID {}", role.label(), child.id()),
            None => warn!(
                "Started `{}` (PID {}) but it matches no configured server; output is not classified",
                executable.display(),
                child.id()
            ),
        }

        let (tx, rx) = mpsc::channel();
        spawn_stream_reader(StreamKind::Stdout, child.stdout.take(), tx.clone());
        spawn_stream_reader(StreamKind::Stderr, child.stderr.take(), tx.clone());

        // The waiter owns the child handle and releases it once reaped.
        thread::spawn(move || {
            let code = match child.wait() {
                Ok(status) => status.code(),
                Err(err) => {
                    error!("Failed to wait for child process: {err}");
                    None
                }
            };
            let _ = tx.send(PipeMessage::Exited(code));
        });

        let pipeline = RunPipeline::new(self.role, self.metrics.clone(), self.events.clone());
        let result = drain(pipeline, &rx);

        match self.role {
            Some(role) => info!("{} stopped with exit code {:?}", role.label(), result.exit_code),
            None => info!(
                "`{}` stopped with exit code {:?}",
                executable.display(),
                result.exit_code
            ),
        }

        self.state = SupervisorState::Exited(result.exit_code);
        result
    }

    fn resolve_working_dir(&self, executable: &Path) -> PathBuf {
        if let Some(dir) = &self.working_dir {
            return dir.clone();
        }

        executable
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Pumps pipe messages into `pipeline` until the process exited and both streams
/// closed. Once the exit status is in, waits at most [`DRAIN_GRACE`] for streams a
/// grandchild may be holding open.
pub(crate) fn drain(mut pipeline: RunPipeline, rx: &Receiver<PipeMessage>) -> ProcessResult {
    let mut deadline: Option<Instant> = None;

    while !pipeline.finished() {
        let message = match deadline {
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(remaining) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        warn!("Output streams still open after process exit; finalising run");
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        };

        pipeline.handle(message);

        if deadline.is_none() && pipeline.has_exited() {
            deadline = Some(Instant::now() + DRAIN_GRACE);
        }
    }

    pipeline.finish()
}

fn spawn_stream_reader<R>(stream: StreamKind, pipe: Option<R>, tx: Sender<PipeMessage>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        if let Some(pipe) = pipe {
            let mut reader = BufReader::new(pipe);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\n', '\r']).to_string();
                        if tx
                            .send(PipeMessage::Data {
                                stream,
                                line: Some(line),
                            })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(err) => {
                        debug!("Reading {} failed: {err}", stream.as_ref());
                        break;
                    }
                }
            }
        }

        let _ = tx.send(PipeMessage::Data { stream, line: None });
    });
}

//! The build/run command loop
//!
//! One command line means two compose verbs: `build` the entrypoint
//! service image (workspace context, captured output, timed), then
//! `run` the user's line through `/bin/bash -c` inside the container
//! (streams attached to the terminal, timed). A failed build is
//! recoverable and never reaches the run verb; a nonzero exit from the
//! user's own command is a normal outcome.

use crate::error::{Error, Result};
use crate::session::Session;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Shell used inside the entrypoint container
const CONTAINER_SHELL: &str = "/bin/bash";

/// What became of one submitted command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Build and run both completed; the user's command exited with
    /// this code (nonzero is not a system failure).
    Completed { exit_code: i32 },
    /// The user interrupted the command; the child was terminated and
    /// the loop goes back to prompting.
    Interrupted,
}

/// Drives commands through a [`Session`]'s merged compose file.
///
/// Owns the two timing fields; they are updated only between states
/// and never shared with the redraw side except as a rendered string.
pub struct SessionRunner {
    session: Session,
    build_time: Option<f64>,
    run_time: Option<f64>,
}

impl SessionRunner {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            build_time: None,
            run_time: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Give the session back, e.g. for an eager close on loop exit.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Wall-clock duration of the most recent build, seconds.
    pub fn build_time(&self) -> Option<f64> {
        self.build_time
    }

    /// Wall-clock duration of the most recent run, seconds.
    pub fn run_time(&self) -> Option<f64> {
        self.run_time
    }

    /// Execute one command line: build, then run. Ctrl-C during either
    /// verb terminates the child and yields [`CommandOutcome::Interrupted`].
    pub async fn execute(&mut self, line: &str) -> Result<CommandOutcome> {
        match self.build().await? {
            BuildStep::Done => {}
            BuildStep::Interrupted => return Ok(CommandOutcome::Interrupted),
        }
        self.run(line).await
    }

    /// `Building`: compose build with captured output. An incomplete
    /// build must never be run against, so a nonzero exit is returned
    /// as the recoverable [`Error::BuildFailure`] before the run verb
    /// is reachable.
    async fn build(&mut self) -> Result<BuildStep> {
        let mut cmd = Command::new(self.session.environment().compose_program());
        cmd.arg("-f")
            .arg(self.session.compose_path())
            .arg("build")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Building session image");
        let started = Instant::now();
        let output = tokio::select! {
            output = cmd.output() => output?,
            _ = tokio::signal::ctrl_c() => {
                // Dropping the future kills the child (kill_on_drop).
                self.build_time = Some(started.elapsed().as_secs_f64());
                return Ok(BuildStep::Interrupted);
            }
        };
        self.build_time = Some(started.elapsed().as_secs_f64());

        if output.status.success() {
            Ok(BuildStep::Done)
        } else {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            Err(Error::BuildFailure {
                status: output.status.code().unwrap_or(-1),
                output: text,
            })
        }
    }

    /// `Running`: compose run with the user's line handed to the
    /// container shell as a single argument. Streams stay attached to
    /// the terminal; the exit code is reported, never treated as an
    /// error.
    async fn run(&mut self, line: &str) -> Result<CommandOutcome> {
        let mut cmd = Command::new(self.session.environment().compose_program());
        cmd.arg("-f")
            .arg(self.session.compose_path())
            .args(["run", "--rm", crate::compose::ENTRYPOINT_SERVICE, CONTAINER_SHELL, "-c"])
            .arg(line)
            .kill_on_drop(true);

        debug!("Running command in entrypoint service");
        let started = Instant::now();
        let status = tokio::select! {
            status = cmd.status() => status?,
            _ = tokio::signal::ctrl_c() => {
                self.run_time = Some(started.elapsed().as_secs_f64());
                return Ok(CommandOutcome::Interrupted);
            }
        };
        self.run_time = Some(started.elapsed().as_secs_f64());

        Ok(CommandOutcome::Completed {
            exit_code: status.code().unwrap_or(-1),
        })
    }

    /// Human-readable status line: engine context, toolkit name and
    /// version, workspace path, and - once a command has run - the most
    /// recent timings.
    pub fn status_line(&self) -> String {
        let session = &self.session;
        let mut line = format!(
            "eitri | {} | {}: {} | {}",
            session.environment().docker_context(),
            session.toolkit().name(),
            session.toolkit().version(),
            session.workspace(),
        );
        if let (Some(build), Some(run)) = (self.build_time, self.run_time) {
            line.push_str(&format!(" ({:.5} | {:.5})", build, run));
        }
        line
    }
}

enum BuildStep {
    Done,
    Interrupted,
}

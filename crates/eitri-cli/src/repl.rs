//! Interactive prompt loop
//!
//! One logical thread of control with cooperative suspension: the
//! prompt read blocks on a dedicated blocking task while a timer task
//! redraws the status line through the editor's external printer. The
//! two sides share no session state - only a watch channel carrying
//! the already-rendered line.

use anyhow::Context;
use eitri_core::{CommandOutcome, SessionRunner};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, ExternalPrinter};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

const PROMPT: &str = "> ";

/// Fixed status-line redraw interval
const REDRAW_INTERVAL: Duration = Duration::from_secs(5);

/// Drive the session until the user ends it. The session directory is
/// released on every exit path: eagerly on a clean exit, by drop when
/// the loop aborts with an error.
pub async fn run_loop(mut runner: SessionRunner) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new().context("cannot initialize the line editor")?;
    let printer = editor
        .create_external_printer()
        .context("cannot create a status printer")?;

    let (status_tx, status_rx) = watch::channel(runner.status_line());
    let redraw = tokio::spawn(redraw_status(printer, status_rx));

    println!("{}", runner.status_line());
    println!("Each line runs inside the toolkit container. Ctrl-D ends the session.");

    let result = prompt_loop(editor, &mut runner, &status_tx).await;
    redraw.abort();

    if result.is_ok() {
        runner.into_session().close()?;
    }
    result
}

/// `Prompting -> Building -> Running -> Prompting` until end-of-input
/// or an unrecoverable error.
async fn prompt_loop(
    mut editor: DefaultEditor,
    runner: &mut SessionRunner,
    status_tx: &watch::Sender<String>,
) -> anyhow::Result<()> {
    loop {
        // The blocking read lives on its own thread so the redraw
        // timer keeps ticking while we wait.
        let (returned, readline) = tokio::task::spawn_blocking(move || {
            let line = editor.readline(PROMPT);
            (editor, line)
        })
        .await
        .context("prompt task failed")?;
        editor = returned;

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                debug!("Executing: {}", line);

                match runner.execute(&line).await {
                    Ok(CommandOutcome::Completed { exit_code }) => {
                        report_timings(runner);
                        if exit_code != 0 {
                            println!("command exited with status {}", exit_code);
                        }
                    }
                    Ok(CommandOutcome::Interrupted) => {
                        println!("interrupted");
                    }
                    Err(err) if err.is_recoverable() => {
                        // Build failed: show what the build said and
                        // keep prompting. The run step never happened.
                        if let eitri_core::Error::BuildFailure { status, output } = err {
                            eprint!("{}", output);
                            eprintln!("build failed with status {}, not running command", status);
                        }
                    }
                    Err(err) => return Err(err.into()),
                }

                let status = runner.status_line();
                if *status_tx.borrow() != status {
                    let _ = status_tx.send(status);
                }
            }
            // Interrupt or end-of-input at the prompt ends the session.
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                debug!("Prompt closed, ending session");
                return Ok(());
            }
            Err(err) => return Err(err).context("prompt read failed"),
        }
    }
}

fn report_timings(runner: &SessionRunner) {
    if let (Some(build), Some(run)) = (runner.build_time(), runner.run_time()) {
        println!("({:.5} | {:.5})", build, run);
    }
}

/// Timer-driven status redraw. Wakes on a fixed interval and reprints
/// the status line when its content changed since the last tick; goes
/// away silently once the prompt loop drops the sender.
async fn redraw_status<P>(mut printer: P, mut status: watch::Receiver<String>)
where
    P: ExternalPrinter + Send + 'static,
{
    let mut interval = tokio::time::interval(REDRAW_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        match status.has_changed() {
            Ok(true) => {
                let line = status.borrow_and_update().clone();
                if printer.print(line).is_err() {
                    break;
                }
            }
            Ok(false) => {}
            Err(_) => break,
        }
    }
}

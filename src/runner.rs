use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow, bail};

use crate::{error::HarnessError, run_log::RunLog, scan::TestCase};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

type PipeResult = std::io::Result<Vec<u8>>;

/// One finished invocation of the companion binary.
#[derive(Debug)]
pub struct CaseOutput {
    pub status: ExitStatus,
    pub stdout_lines: Vec<String>,
    pub stderr: String,
    pub duration_ms: u128,
}

pub struct Runner<'a> {
    pub companion: &'a Path,
    pub timeout: Duration,
    pub show_stderr: bool,
}

impl Runner<'_> {
    /// Runs every case in order and stops at the first failure.
    pub fn run_all(&self, input: &Path, cases: &[TestCase], log: &mut RunLog) -> Result<()> {
        println!(
            "Running {} test cases for file {}",
            cases.len(),
            input.display()
        );
        log.entry(
            "run",
            format_args!(
                "{} -> {} ({} cases, timeout {}s)",
                input.display(),
                self.companion.display(),
                cases.len(),
                self.timeout.as_secs()
            ),
        )?;

        for (passed, case) in cases.iter().enumerate() {
            let command = command_line(self.companion, &case.arguments);
            println!("  Running {command}");
            log.entry("case", format_args!("line {}: {command}", case.line))?;

            let result = self
                .execute(&case.arguments)
                .and_then(|output| self.check(case, output));
            match result {
                Ok(output) => log.entry(
                    "case",
                    format_args!(
                        "line {} passed in {} ms (exit {:?})",
                        case.line,
                        output.duration_ms,
                        output.status.code()
                    ),
                )?,
                Err(err) => {
                    log.entry("case", format_args!("line {} failed: {err:#}", case.line))?;
                    log.entry(
                        "run",
                        format_args!("finished: {}/{} passed", passed, cases.len()),
                    )?;
                    return Err(err);
                }
            }
        }

        log.entry(
            "run",
            format_args!("finished: {}/{} passed", cases.len(), cases.len()),
        )?;
        Ok(())
    }

    /// Spawns the companion with `args` and collects its output, killing it
    /// once the timeout elapses.
    pub fn execute(&self, args: &[String]) -> Result<CaseOutput> {
        let command = command_line(self.companion, args);
        let mut child = Command::new(program_path(self.companion))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run {command}"))?;

        let stdout = drain(child.stdout.take().context("child stdout not captured")?);
        let stderr = drain(child.stderr.take().context("child stderr not captured")?);

        let start = Instant::now();
        // No deadline when the timeout does not fit in an `Instant`.
        let deadline = start.checked_add(self.timeout);
        let timed_out = || HarnessError::Timeout {
            command: command.clone(),
            timeout: self.timeout,
        };

        let Some(status) = wait_until(&mut child, deadline)
            .with_context(|| format!("failed to wait for {command}"))?
        else {
            return Err(timed_out().into());
        };
        let duration_ms = start.elapsed().as_millis();

        // A background process may keep the pipes open after the child exits.
        let Some(stdout) = collect(&stdout, deadline)
            .with_context(|| format!("failed to read stdout of {command}"))?
        else {
            return Err(timed_out().into());
        };
        let Some(stderr) = collect(&stderr, deadline)
            .with_context(|| format!("failed to read stderr of {command}"))?
        else {
            return Err(timed_out().into());
        };
        let stdout = String::from_utf8(stdout)
            .with_context(|| format!("stdout of {command} is not valid UTF-8"))?;

        Ok(CaseOutput {
            status,
            stdout_lines: normalize(&stdout),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            duration_ms,
        })
    }

    fn check(&self, case: &TestCase, output: CaseOutput) -> Result<CaseOutput> {
        if output.stdout_lines == case.expected_output {
            return Ok(output);
        }
        let stderr = (self.show_stderr && !output.stderr.trim().is_empty())
            .then(|| output.stderr.clone());
        Err(HarnessError::OutputMismatch {
            expected: case.expected_output.clone(),
            actual: output.stdout_lines,
            stderr,
        }
        .into())
    }
}

/// Translates `\r\n` and lone `\r` to `\n`, trims the whole stream, then
/// splits it into lines. Empty output has no lines.
pub fn normalize(stdout: &str) -> Vec<String> {
    let text = stdout.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('\n').map(str::to_string).collect()
}

fn command_line(companion: &Path, args: &[String]) -> String {
    std::iter::once(companion.display().to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A bare file name would be looked up on `PATH`; anchor it to the current directory.
fn program_path(companion: &Path) -> PathBuf {
    let bare = companion
        .parent()
        .is_none_or(|parent| parent.as_os_str().is_empty());
    if companion.is_relative() && bare {
        Path::new(".").join(companion)
    } else {
        companion.to_path_buf()
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<PipeResult> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let result = pipe.read_to_end(&mut buffer).map(|_| buffer);
        let _ = sender.send(result);
    });
    receiver
}

/// Waits for a pipe reader to hit end of file. `None` if the deadline passes first.
fn collect(pipe: &Receiver<PipeResult>, deadline: Option<Instant>) -> Result<Option<Vec<u8>>> {
    let result = match deadline {
        Some(deadline) => {
            match pipe.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => bail!("pipe reader panicked"),
            }
        }
        None => pipe.recv().map_err(|_| anyhow!("pipe reader panicked"))?,
    };
    Ok(Some(result?))
}

/// Polls the child until it exits. Past `deadline` it is killed and `None` returned.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

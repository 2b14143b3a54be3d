//! `std::process` backed command executor.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{CommandExecutor, CommandOutput};
use crate::error::CommandError;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executes commands as child processes.
///
/// With a timeout set, a command that has not exited in time is killed
/// and reported as `CommandError::Timeout`.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    fn wait(&self, program: &str, child: &mut Child) -> Result<ExitStatus, CommandError> {
        let io_err = |source| CommandError::Io {
            program: program.to_string(),
            source,
        };

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(io_err);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(io_err)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::Timeout {
                    program: program.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl CommandExecutor for ProcessExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        debug!("exec: {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Io {
                program: program.to_string(),
                source,
            })?;

        // Both pipes drain concurrently; output is stdout then stderr
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(program, &mut child)?;

        let mut output = stdout.join().unwrap_or_default();
        output.extend(stderr.join().unwrap_or_default());

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            output: String::from_utf8_lossy(&output).into_owned(),
        })
    }
}

//! Process-backed [`CommandExecutor`] with a hard timeout.

use super::Connection;
use declarative::{CommandExecutor, CommandOutput};
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the LDAP client tools as child processes.
///
/// Output pipes are drained on helper threads so a chatty tool never
/// blocks on a full pipe while the timeout is being watched.
#[derive(Debug, Clone)]
pub struct LdapCli {
    timeout: Duration,
}

impl LdapCli {
    /// Create an executor that kills commands running longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Create an executor using the connection's timeout.
    pub fn for_connection(connection: &Connection) -> Self {
        Self::new(connection.timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CommandExecutor for LdapCli {
    fn run(&self, program: &str, args: &[&str], input: Option<&str>) -> io::Result<CommandOutput> {
        log::debug!("Running: {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let writer = match (child.stdin.take(), input) {
            (Some(mut stdin), Some(input)) => {
                let input = input.to_string();
                Some(thread::spawn(move || -> io::Result<()> {
                    // The tool may exit before reading everything; its status says why
                    match stdin.write_all(input.as_bytes()) {
                        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                        _ => Ok(()),
                    }
                }))
            }
            _ => None,
        };

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "{} exceeded {}s, killing it",
                    program,
                    self.timeout.as_secs()
                );
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!(
                        "{program} did not finish within {}s",
                        self.timeout.as_secs()
                    ),
                ));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if let Some(writer) = writer {
            join(writer)?;
        }

        let output = CommandOutput {
            stdout: join(stdout)?,
            stderr: join(stderr)?,
            success: status.success(),
            code: status.code(),
        };
        log::trace!("{} exited with {:?}", program, output.code);
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join<T>(handle: JoinHandle<io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .map_err(|_| io::Error::other("pipe thread panicked"))?
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn cli() -> LdapCli {
        LdapCli::new(Duration::from_secs(5))
    }

    #[test]
    fn test_stdin_is_piped_through() {
        let output = cli()
            .run("sh", &["-c", "cat"], Some("dn: cn=config\n"))
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout_str(), "dn: cn=config\n");
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let output = cli()
            .run("sh", &["-c", "echo 'No such object (32)' >&2; exit 32"], None)
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(32));
        assert_eq!(output.diagnostic(), "No such object (32)");
    }

    #[test]
    fn test_timeout_kills_command() {
        let err = LdapCli::new(Duration::from_millis(100))
            .run("sleep", &["5"], None)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_missing_program() {
        let err = cli()
            .run("slapdconf-definitely-not-installed", &[], None)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

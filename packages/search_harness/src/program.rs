use std::error::Error as StdError;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// The failure type returned by a [`Program`].
pub type ProgramError = Box<dyn StdError + Send + Sync + 'static>;

/// The program under test: a batch entry point that receives an argument vector.
///
/// Any function or closure with the matching signature is a `Program`, which is how in-process
/// drivers are plugged in. [`CommandProgram`] runs an external executable instead.
///
/// # Example
///
/// ```
/// use search_harness::{Program, ProgramError};
///
/// let program = |args: &[String]| -> Result<(), ProgramError> {
///     if args.is_empty() {
///         return Err("no arguments".into());
///     }
///     Ok(())
/// };
///
/// assert!(program.run(&["-text".to_string()]).is_ok());
/// assert!(program.run(&[]).is_err());
/// ```
pub trait Program: Send + Sync {
    /// Runs the program once with the given arguments, blocking until it finishes.
    ///
    /// # Errors
    ///
    /// Returns whatever failure the program reports.
    fn run(&self, args: &[String]) -> Result<(), ProgramError>;
}

impl<F> Program for F
where
    F: Fn(&[String]) -> Result<(), ProgramError> + Send + Sync,
{
    fn run(&self, args: &[String]) -> Result<(), ProgramError> {
        self(args)
    }
}

/// Runs an external executable as the program under test.
///
/// Standard output is inherited from the harness process, so it is discarded whenever the
/// invoker suppresses output. Standard error is passed through to the standard error of the
/// harness line by line, which likewise hides it while output is suppressed. It is also
/// captured and, if the executable exits unsuccessfully, returned as part of the
/// [`CommandFailed`] error.
#[derive(Clone, Debug)]
pub struct CommandProgram {
    executable: PathBuf,
    working_dir: Option<PathBuf>,
}

impl CommandProgram {
    /// Creates a program that runs `executable`, resolved through `PATH` if not a path.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: None,
        }
    }

    /// Runs the executable in `dir` instead of the current working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The executable that is run.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Program for CommandProgram {
    fn run(&self, args: &[String]) -> Result<(), ProgramError> {
        let mut command = Command::new(&self.executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;

        let captured = match child.stderr.take() {
            Some(stderr) => tee_lines(BufReader::new(stderr), &mut io::stderr()),
            None => Ok(Vec::new()),
        };

        // Reap the child even if its error stream broke.
        let status = child.wait()?;
        let captured = captured?;

        if status.success() {
            return Ok(());
        }

        Err(Box::new(CommandFailed {
            executable: self.executable.clone(),
            status,
            stderr: String::from_utf8_lossy(&captured).into_owned(),
        }))
    }
}

/// Copies `reader` to `echo` one line at a time, returning everything that was read.
///
/// A failure to write to `echo` does not stop the copy.
fn tee_lines(mut reader: impl BufRead, echo: &mut impl Write) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();

    loop {
        let start = captured.len();

        if reader.read_until(b'\n', &mut captured)? == 0 {
            return Ok(captured);
        }

        if let Some(line) = captured.get(start..) {
            // The echo is a courtesy; the captured copy is what failures are reported with.
            drop(echo.write_all(line).and_then(|()| echo.flush()));
        }
    }
}

/// An external executable exited unsuccessfully.
#[derive(Debug, thiserror::Error)]
#[error("{} exited with {status}", .executable.display())]
pub struct CommandFailed {
    executable: PathBuf,
    status: ExitStatus,
    stderr: String,
}

impl CommandFailed {
    /// Everything the executable wrote to standard error.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// The exit status of the executable.
    #[must_use]
    pub fn status(&self) -> ExitStatus {
        self.status
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(CommandProgram: Program, Send, Sync);
    assert_impl_all!(CommandFailed: Send, Sync);

    #[test]
    fn closure_receives_arguments() {
        let program = |args: &[String]| -> Result<(), ProgramError> {
            assert_eq!(args, ["-text", "input"]);
            Ok(())
        };

        program
            .run(&["-text".to_string(), "input".to_string()])
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn successful_command_is_ok() {
        let program = CommandProgram::new("sh");

        program
            .run(&["-c".to_string(), "exit 0".to_string()])
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_captures_stderr() {
        let program = CommandProgram::new("sh");

        let error = program
            .run(&["-c".to_string(), "echo broken index >&2; exit 3".to_string()])
            .unwrap_err();

        let failed = error.downcast_ref::<CommandFailed>().unwrap();
        assert_eq!(failed.stderr().trim(), "broken index");
        assert_eq!(failed.status().code(), Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn succeeding_command_with_diagnostics_is_ok() {
        let program = CommandProgram::new("sh");

        program
            .run(&["-c".to_string(), "echo merging segments >&2".to_string()])
            .unwrap();
    }

    #[test]
    fn tee_echoes_and_captures_every_line() {
        let mut echo = Vec::new();

        let captured = tee_lines(&b"first\nsecond\r\nlast"[..], &mut echo).unwrap();

        assert_eq!(captured, b"first\nsecond\r\nlast");
        assert_eq!(echo, captured);
    }

    #[test]
    fn tee_keeps_capturing_when_echo_fails() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("terminal gone"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let captured = tee_lines(&b"a\nb\n"[..], &mut Broken).unwrap();

        assert_eq!(captured, b"a\nb\n");
    }

    #[test]
    fn missing_executable_is_an_error() {
        let program = CommandProgram::new("search-harness-no-such-executable");

        assert!(program.run(&[]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn working_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let program = CommandProgram::new("sh").working_dir(dir.path());

        program
            .run(&["-c".to_string(), "touch marker".to_string()])
            .unwrap();

        assert!(dir.path().join("marker").exists());
    }
}

//! The external `traceroute` process.

use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::{Error, Result};

/// Help text marker of traceroute builds that can annotate hops with AS numbers.
const AS_LOOKUP_FLAG: &str = "--as-path-lookups";

/// How long `--help` may take before the program counts as unsupported.
pub const HELP_TIMEOUT: Duration = Duration::from_secs(5);

/// Probing options passed through to traceroute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceOptions {
    pub program: String,
    pub first_hop: u8,
    pub max_hop: u8,
    pub port: u16,
    pub tos: u8,
    pub wait: u32,
    pub icmp: bool,
    pub as_lookups: bool,
    pub destination: String,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            program: "traceroute".to_string(),
            first_hop: 1,
            max_hop: 64,
            port: 33434,
            tos: 0,
            wait: 3,
            icmp: false,
            as_lookups: false,
            destination: String::new(),
        }
    }
}

impl TraceOptions {
    /// Arguments for the traceroute invocation, destination last.
    ///
    /// One probe per hop (`-q 1`) keeps every hop on a single line.
    pub fn command_args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.port.to_string(),
            "-f".to_string(),
            self.first_hop.to_string(),
            "-m".to_string(),
            self.max_hop.to_string(),
            "-w".to_string(),
            self.wait.to_string(),
        ];
        if self.tos != 0 {
            args.extend(["-t".to_string(), self.tos.to_string()]);
        }
        if self.icmp {
            args.push("-I".to_string());
        }
        args.extend(["-q".to_string(), "1".to_string()]);
        if self.as_lookups {
            args.push("-A".to_string());
        }
        args.push(self.destination.clone());
        args
    }
}

/// Whether `program` advertises per-hop AS lookups in its help text.
///
/// Any failure to run the program, or a `--help` that does not finish within
/// [`HELP_TIMEOUT`], counts as no support.
pub fn supports_as_lookups(program: &str) -> bool {
    supports_as_lookups_within(program, HELP_TIMEOUT)
}

fn supports_as_lookups_within(program: &str, timeout: Duration) -> bool {
    let supported = match help_text(program, timeout) {
        Ok(Some(text)) => contains(&text, AS_LOOKUP_FLAG),
        Ok(None) => {
            debug!("{program} --help did not finish within {timeout:?}");
            false
        }
        Err(err) => {
            debug!("{program} --help failed: {err}");
            false
        }
    };
    debug!("{program} AS lookups supported: {supported}");
    supported
}

/// Combined stdout and stderr of `program --help`, or `None` on timeout.
fn help_text(program: &str, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
    let mut child = Command::new(program)
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    while child.try_wait()?.is_none() {
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(10));
    }

    let mut text = collect(stdout)?;
    text.extend(collect(stderr)?);
    Ok(Some(text))
}

/// Read `pipe` to the end on its own thread so the child never blocks on it.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("pipe reader panicked"))?,
        None => Ok(Vec::new()),
    }
}

#[inline]
fn contains(haystack: &[u8], needle: &str) -> bool {
    bstr::ByteSlice::find(haystack, needle).is_some()
}

/// A running traceroute whose stdout is streamed to the caller.
///
/// Stderr is collected in the background while stdout is consumed.
#[derive(Debug)]
pub struct Traceroute {
    program: String,
    child: Child,
    stderr: Option<JoinHandle<io::Result<Vec<u8>>>>,
}

impl Traceroute {
    pub fn spawn(options: &TraceOptions) -> Result<Self> {
        let args = options.command_args();
        info!("running {} {}", options.program, args.join(" "));
        let mut child = Command::new(&options.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: options.program.clone(),
                source,
            })?;
        let stderr = child.stderr.take().map(drain);
        Ok(Self {
            program: options.program.clone(),
            child,
            stderr,
        })
    }

    /// Hop output of the process. Can only be taken once.
    pub fn stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Wait for the process and fail on a non-zero exit, carrying its stderr.
    pub fn finish(self) -> Result<()> {
        let Traceroute {
            program,
            mut child,
            stderr,
        } = self;
        let status = child.wait()?;
        let stderr = collect(stderr)?;
        if !status.success() {
            return Err(Error::TraceFailed {
                program,
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

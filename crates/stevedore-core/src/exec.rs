//! Command executor: runs one command inside a container through an exec
//! session and waits for it to finish.
//!
//! Output is read from the engine's multiplexed stream while the session is
//! polled with exponential backoff. Every complete output line is emitted as
//! a `tracing` event; partial lines are held back until their newline
//! arrives or the session ends.

use crate::error::{CoreError, Result};
use crate::platform::Platform;
use futures::StreamExt;
use std::time::Duration;
use stevedore_engine::{
    Engine, ExecApi, ExecCreateRequest, ExecStartRequest, Frame, FrameDecoder, StreamKind,
};

/// First delay between two status polls.
pub const INITIAL_POLL_DELAY: Duration = Duration::from_millis(1);

/// Upper bound of the poll delay.
pub const MAX_POLL_DELAY: Duration = Duration::from_millis(1000);

/// How long output is still read once the session reports it has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Splits stream payloads into lines, per stream.
#[derive(Debug, Default)]
pub struct LineBuffer {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload and return the lines it completes.
    ///
    /// Lines are returned without their terminator; a trailing `\r` is
    /// dropped too.
    pub fn push(&mut self, stream: StreamKind, payload: &[u8]) -> Vec<String> {
        let buf = self.buffer(stream);
        buf.extend_from_slice(payload);

        let mut lines = Vec::new();
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Take whatever partial line is left on a stream.
    pub fn flush(&mut self, stream: StreamKind) -> Option<String> {
        let buf = self.buffer(stream);
        if buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    fn buffer(&mut self, stream: StreamKind) -> &mut Vec<u8> {
        match stream {
            StreamKind::Stderr => &mut self.stderr,
            _ => &mut self.stdout,
        }
    }
}

/// Forwards decoded output to the log.
struct OutputLog<'a> {
    container: &'a str,
    decoder: FrameDecoder,
    lines: LineBuffer,
}

impl<'a> OutputLog<'a> {
    fn new(container: &'a str) -> Self {
        Self {
            container,
            decoder: FrameDecoder::new(),
            lines: LineBuffer::new(),
        }
    }

    fn feed(&mut self, chunk: &[u8]) {
        for Frame { stream, payload } in self.decoder.push(chunk) {
            for line in self.lines.push(stream, &payload) {
                self.emit(stream, &line);
            }
        }
    }

    fn finish(&mut self) {
        if self.decoder.pending() > 0 {
            tracing::debug!(
                container = %self.container,
                bytes = self.decoder.pending(),
                "Discarding incomplete output frame"
            );
        }
        for stream in [StreamKind::Stdout, StreamKind::Stderr] {
            if let Some(line) = self.lines.flush(stream) {
                self.emit(stream, &line);
            }
        }
    }

    fn emit(&self, stream: StreamKind, line: &str) {
        tracing::info!(container = %self.container, stream = %stream, "{line}");
    }
}

/// Run `argv` inside `container` and wait for it to exit.
///
/// `working_dir` must already be a resolved container path. A non-zero exit
/// code is reported as [`CoreError::CommandFailed`].
pub(crate) async fn run_command(
    engine: &dyn Engine,
    platform: Platform,
    container: &str,
    argv: &[String],
    working_dir: &str,
) -> Result<()> {
    let start = std::time::Instant::now();
    let command = argv.join(" ");
    tracing::info!(container = %container, command = %command, working_dir, "Executing command");

    let request = ExecCreateRequest {
        cmd: argv.to_vec(),
        user: platform.exec_user().map(str::to_string),
        working_dir: Some(working_dir.to_string()),
        attach_stdout: true,
        attach_stderr: true,
        tty: false,
    };
    let exec = engine
        .create_exec(container, &request)
        .await
        .map_err(|e| CoreError::engine(format!("failed to create exec in container {container}"), &e))?;
    tracing::debug!(container = %container, exec_id = %exec.id, "Exec session created");

    let mut output = engine
        .start_exec(&exec.id, &ExecStartRequest::default())
        .await
        .map_err(|e| CoreError::engine(format!("failed to start exec {}", exec.id), &e))?;

    let mut log = OutputLog::new(container);
    let mut stream_open = true;
    let mut delay = INITIAL_POLL_DELAY;
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    let exit_code = loop {
        tokio::select! {
            chunk = output.next(), if stream_open => match chunk {
                Some(Ok(bytes)) => log.feed(&bytes),
                Some(Err(e)) => {
                    tracing::warn!(container = %container, exec_id = %exec.id, error = %e, "Output stream failed");
                    stream_open = false;
                }
                None => stream_open = false,
            },
            _ = &mut sleep => {
                let state = engine
                    .inspect_exec(&exec.id)
                    .await
                    .map_err(|e| CoreError::engine(format!("failed to inspect exec {}", exec.id), &e))?;
                if !state.running {
                    break state.exit_code;
                }
                delay = (delay * 2).min(MAX_POLL_DELAY);
                tracing::trace!(exec_id = %exec.id, delay_ms = delay.as_millis() as u64, "Exec still running");
                sleep.as_mut().reset(tokio::time::Instant::now() + delay);
            }
        }
    };

    if stream_open {
        let drained = tokio::time::timeout(DRAIN_GRACE, async {
            while let Some(Ok(bytes)) = output.next().await {
                log.feed(&bytes);
            }
        })
        .await;
        if drained.is_err() {
            tracing::debug!(exec_id = %exec.id, "Output stream still open after exit, closing");
        }
    }
    drop(output);
    log.finish();

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match exit_code {
        Some(code) if code != 0 => {
            tracing::warn!(container = %container, command = %command, code, elapsed_ms, "Command failed");
            Err(CoreError::CommandFailed { command, code })
        }
        _ => {
            tracing::debug!(container = %container, elapsed_ms, "Command finished");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_pushes() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(StreamKind::Stdout, b"hel").is_empty());
        assert_eq!(buf.push(StreamKind::Stdout, b"lo\nwor"), vec!["hello"]);
        assert_eq!(buf.push(StreamKind::Stdout, b"ld\r\n\n"), vec!["world", ""]);
        assert_eq!(buf.flush(StreamKind::Stdout), None);
    }

    #[test]
    fn test_streams_buffer_independently() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(StreamKind::Stdout, b"out").is_empty());
        assert_eq!(buf.push(StreamKind::Stderr, b"err\n"), vec!["err"]);
        assert_eq!(buf.flush(StreamKind::Stdout).as_deref(), Some("out"));
        assert_eq!(buf.flush(StreamKind::Stderr), None);
    }

    #[test]
    fn test_multibyte_split() {
        let mut buf = LineBuffer::new();
        let text = "héllo\n".as_bytes();
        assert!(buf.push(StreamKind::Stdout, &text[..2]).is_empty());
        assert_eq!(buf.push(StreamKind::Stdout, &text[2..]), vec!["héllo"]);
    }
}

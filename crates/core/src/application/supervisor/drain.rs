// Output drain task: reads one stream line by line through the hooks

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::cancellation::{escalate_drain_failure, filter_read_error, CancelToken};
use super::panic_guard::guard_hook;
use super::BoxedReader;
use crate::domain::{DrainReport, StreamKind, TaskFailure};
use crate::port::ProcessHooks;

/// Drain `reader` until EOF, feeding every line to the stream's hook
///
/// The collected lines are owned by this task until it returns them in the
/// report. A failure cancels the wait task (the process gets killed) unless it
/// is collateral damage of a kill that is already under way.
pub(crate) async fn drain_stream<H: ProcessHooks>(
    stream: StreamKind,
    reader: BoxedReader,
    hooks: Arc<H>,
    wait_cancel: CancelToken,
) -> DrainReport<H::Error> {
    let mut lines = Vec::new();
    let result = read_lines(stream, reader, hooks.as_ref(), &mut lines, &wait_cancel).await;

    match &result {
        Ok(()) => debug!(stream = %stream, lines = lines.len(), "Stream closed"),
        Err(failure) => escalate_drain_failure(stream, failure, &wait_cancel),
    }

    DrainReport {
        stream,
        lines,
        result,
    }
}

async fn read_lines<H: ProcessHooks>(
    stream: StreamKind,
    reader: BoxedReader,
    hooks: &H,
    lines: &mut Vec<String>,
    wait_cancel: &CancelToken,
) -> Result<(), TaskFailure<H::Error>> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = match reader.read_until(b'\n', &mut buf).await {
            Ok(read) => read,
            Err(err) => {
                return match filter_read_error(stream, err, wait_cancel) {
                    Some(err) => Err(TaskFailure::Io(err)),
                    None => Ok(()),
                };
            }
        };

        if read == 0 {
            return Ok(());
        }

        let line = decode_line(&buf);
        guard_hook(|| match stream {
            StreamKind::Stdout => hooks.handle_output(line, lines),
            StreamKind::Stderr => hooks.handle_error_output(line, lines),
        })?;
    }
}

/// Strip the line terminator (`\n` or `\r\n`); invalid UTF-8 is replaced
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

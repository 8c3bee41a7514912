use super::{Completion, PoolEvent, PoolJob, RouterPool, RuntimeError};
use crate::router::{Invocation, Router, RouterReply};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

/// One line of output: either a reply or a report about an input line that
/// could not be decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub line: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<RouterReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplyLine {
    fn from_completion(done: Completion) -> Self {
        Self {
            id: done.invocation_id,
            line: done.sequence,
            reply: Some(done.reply),
            error: None,
        }
    }

    fn decode_error(line: u64, error: String) -> Self {
        Self {
            id: None,
            line,
            reply: None,
            error: Some(error),
        }
    }
}

enum InputLine {
    Job(PoolJob),
    Rejected(ReplyLine),
}

/// Reads JSON invocations one per line and writes one JSON reply line each.
/// Replies may be written out of input order; `line` and `id` correlate them.
pub fn serve_json_lines<R, W>(
    reader: R,
    mut writer: W,
    router: Arc<Router>,
    max_concurrency: usize,
) -> Result<usize, RuntimeError>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    let pool = RouterPool::new(router, max_concurrency);
    let (job_tx, job_rx) = mpsc::channel::<PoolJob>();
    let (reject_tx, reject_rx) = mpsc::channel::<ReplyLine>();

    let reader_handle = thread::spawn(move || -> Result<(), RuntimeError> {
        let mut reader = reader;
        let mut buf = Vec::new();
        let mut number = 0u64;
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| RuntimeError::ReadInput { source })?;
            if read == 0 {
                break;
            }
            number += 1;
            let sent = match decode_line(number, &buf) {
                None => true,
                Some(InputLine::Job(job)) => job_tx.send(job).is_ok(),
                Some(InputLine::Rejected(reply)) => reject_tx.send(reply).is_ok(),
            };
            if !sent {
                break;
            }
        }
        Ok(())
    });

    let mut written = 0usize;
    pool.run_events(job_rx, |event| {
        while let Ok(rejected) = reject_rx.try_recv() {
            write_line(&mut writer, &rejected)?;
            written += 1;
        }
        if let PoolEvent::Completed(done) = event {
            write_line(&mut writer, &ReplyLine::from_completion(done))?;
            written += 1;
        }
        Ok(())
    })?;

    for rejected in reject_rx.try_iter() {
        write_line(&mut writer, &rejected)?;
        written += 1;
    }

    match reader_handle.join() {
        Ok(result) => result?,
        Err(_) => tracing::error!("invocation reader thread panicked"),
    }
    tracing::info!(replies = written, "invocation stream closed");
    Ok(written)
}

fn decode_line(number: u64, raw: &[u8]) -> Option<InputLine> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        Err(err) => {
            tracing::warn!(line = number, "skipping non-UTF-8 invocation: {err}");
            return Some(InputLine::Rejected(ReplyLine::decode_error(
                number,
                format!("invalid invocation: line is not valid UTF-8 ({err})"),
            )));
        }
    };
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Invocation>(line) {
        Ok(invocation) => Some(InputLine::Job(PoolJob {
            sequence: number,
            invocation,
        })),
        Err(err) => {
            tracing::warn!(line = number, "skipping malformed invocation: {err}");
            Some(InputLine::Rejected(ReplyLine::decode_error(
                number,
                format!("invalid invocation: {err}"),
            )))
        }
    }
}

fn write_line<W: Write>(writer: &mut W, reply: &ReplyLine) -> Result<(), RuntimeError> {
    let encoded =
        serde_json::to_string(reply).map_err(|source| RuntimeError::EncodeReply { source })?;
    writeln!(writer, "{encoded}").map_err(|source| RuntimeError::WriteOutput { source })?;
    writer
        .flush()
        .map_err(|source| RuntimeError::WriteOutput { source })
}

//! Wire format spoken with the simulator.
//!
//! Client to server: a JSON object `{"a","b","c","d","reward","done"}`, or one of two
//! sentinels: a lone `0x00` (close) and `CLOSE_CONNECT\0` (export rewards, then close).
//! Server to client: the chosen action in decimal ASCII followed by `\0`.
//!
//! The simulator does not delimit its JSON payloads, so frames are recovered from the
//! byte stream by brace matching; sentinels and any other payload end at a `\0`.

use ndarray::{array, Array1};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{DuelError, Result};

pub const CLOSE_SENTINEL: &[u8] = b"\0";
pub const CLOSE_AND_REPORT_SENTINEL: &[u8] = b"CLOSE_CONNECT\0";

/// Largest frame accepted before the connection is treated as malformed
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// One observation reported by the environment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepMessage {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub reward: f32,
    pub done: bool,
}

impl StepMessage {
    /// The observed state, in `a, b, c, d` order.
    pub fn state(&self) -> Array1<f32> {
        array![self.a, self.b, self.c, self.d]
    }

    /// Whether every number survived the conversion to `f32`.
    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.reward].iter().all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Close,
    CloseAndReport,
    Step(StepMessage),
}

/// Decode one frame. Sentinels are recognized before any JSON parsing.
pub fn decode(frame: &[u8]) -> Result<Message> {
    if frame == CLOSE_SENTINEL {
        return Ok(Message::Close);
    }
    if frame == CLOSE_AND_REPORT_SENTINEL {
        return Ok(Message::CloseAndReport);
    }

    let payload = frame.strip_suffix(b"\0").unwrap_or(frame);
    let text = std::str::from_utf8(payload)
        .map_err(|e| DuelError::MalformedMessage(format!("payload is not UTF-8: {}", e)))?;
    let message: StepMessage = serde_json::from_str(text)
        .map_err(|e| DuelError::MalformedMessage(format!("{}: {:?}", e, truncate(text))))?;
    if !message.is_finite() {
        return Err(DuelError::MalformedMessage(format!("non-finite number: {:?}", truncate(text))));
    }
    Ok(Message::Step(message))
}

/// Encode an action reply: decimal ASCII digits terminated by `\0`.
pub fn encode_action(action: usize) -> Vec<u8> {
    let mut reply = action.to_string().into_bytes();
    reply.push(0);
    reply
}

/// Remove and return the first complete frame at the front of `buffer`, if there is one.
///
/// Leading whitespace is discarded. A frame starting with `{` ends at its matching `}`
/// (braces inside JSON strings are ignored) and swallows one directly following `\0`.
/// Anything else ends at the first `\0`, inclusive.
pub fn split_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let start = buffer.iter().position(|b| !b.is_ascii_whitespace())?;
    buffer.drain(..start);

    let end = if buffer[0] == b'{' {
        let mut end = json_object_end(buffer)?;
        if buffer.get(end) == Some(&0) {
            end += 1;
        }
        end
    } else {
        buffer.iter().position(|&b| b == 0)? + 1
    };
    Some(buffer.drain(..end).collect())
}

/// Index one past the `}` closing the object that opens at `bytes[0]`.
fn json_object_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate(text: &str) -> String {
    text.chars().take(80).collect()
}

/// Reads frames off a byte stream.
pub struct FrameReader<R> {
    inner: R,
    buffer: Vec<u8>,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_frame_len(inner, MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(inner: R, max_frame_len: usize) -> Self {
        FrameReader {
            inner,
            buffer: Vec::with_capacity(1024),
            max_frame_len,
        }
    }

    /// Wait for the next frame. `Ok(None)` means the peer closed the stream between frames.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(frame) = split_frame(&mut self.buffer) {
                return Ok(Some(frame));
            }
            if self.buffer.len() > self.max_frame_len {
                return Err(DuelError::MalformedMessage(format!(
                    "frame exceeds {} bytes",
                    self.max_frame_len
                )));
            }

            let read = self.inner.read(&mut chunk).await?;
            if read == 0 {
                return if self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
                    Ok(None)
                } else {
                    Err(DuelError::MalformedMessage(format!(
                        "connection closed mid-frame after {} bytes",
                        self.buffer.len()
                    )))
                };
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

//! SSE（text/event-stream）解码
//!
//! 上游润色服务的每个 `data:` 行是一个 JSON 对象，按 `type` 字段区分：
//! - `content`：内容帧，原样交给调用方解析
//! - `end`：流结束
//! - 其他：服务器错误

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value as JsonValue;
use tracing::error;

use crate::error::{ApiError, AppError, AppResult};

/// 解码后的帧流，每项是一个内容帧的原始 JSON
pub type FrameStream = BoxStream<'static, AppResult<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Content(String),
    End,
    ServerError(String),
}

/// 按行切分字节流，容忍任意分块边界和 `\r\n`
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个分块，返回其中已完整的行
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// 流结束时取出没有换行结尾的最后一行
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// 识别一行 SSE；非 `data:` 行与无法解析的 JSON 返回 None
pub fn classify_line(line: &str) -> Option<SseFrame> {
    let data = line.strip_prefix("data:")?;

    let event: JsonValue = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            error!("JSON解析错误: {}, 原始数据: {}", e, data);
            return None;
        }
    };

    match event.get("type").and_then(JsonValue::as_str) {
        Some("content") => Some(SseFrame::Content(data.to_string())),
        Some("end") => Some(SseFrame::End),
        _ => Some(SseFrame::ServerError(data.to_string())),
    }
}

struct FrameState<S> {
    body: Pin<Box<S>>,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    body_exhausted: bool,
    finished: bool,
}

/// 把原始字节流转换为内容帧流
///
/// 遇到 `end` 帧正常结束；遇到错误帧或读取失败时产出一个 Err 后结束
pub fn content_frames<S, B, E>(body: S) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = FrameState {
        body: Box::pin(body),
        decoder: LineDecoder::new(),
        pending: VecDeque::new(),
        body_exhausted: false,
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(line) = st.pending.pop_front() {
                match classify_line(&line) {
                    Some(SseFrame::Content(raw)) => return Some((Ok(raw), st)),
                    Some(SseFrame::End) => {
                        st.finished = true;
                        return None;
                    }
                    Some(SseFrame::ServerError(raw)) => {
                        st.finished = true;
                        let err = ApiError::StreamServerError { payload: raw };
                        return Some((Err(AppError::from(err)), st));
                    }
                    None => continue,
                }
            }

            if st.body_exhausted {
                return None;
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let lines = st.decoder.feed(chunk.as_ref());
                    st.pending.extend(lines);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    let err = ApiError::StreamReadFailed {
                        source: Box::new(e),
                    };
                    return Some((Err(AppError::from(err)), st));
                }
                None => {
                    st.body_exhausted = true;
                    if let Some(rest) = st.decoder.finish() {
                        st.pending.push_back(rest);
                    }
                }
            }
        }
    })
    .boxed()
}

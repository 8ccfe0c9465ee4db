use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use tracing::debug;

use crate::{RagChatError, Result};

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Content fragments of a streaming completion, read from a server-sent event body.
///
/// Finite and single-use: iteration ends at the `[DONE]` marker or end of body,
/// and the first error ends the stream.
pub struct CompletionStream {
    reader: Box<dyn BufRead>,
    finished: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl CompletionStream {
    #[inline]
    pub fn new<R: Read + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(BufReader::new(reader)),
            finished: false,
        }
    }

    /// Drain the remaining fragments into one string
    #[inline]
    pub fn collect_text(self) -> Result<String> {
        self.collect()
    }

    fn next_fragment(&mut self) -> Result<Option<String>> {
        let mut line = String::new();

        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                debug!("Completion stream closed without a done marker");
                return Ok(None);
            }

            let Some(data) = line.trim().strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let data = data.trim_start();

            if data == DONE_MARKER {
                return Ok(None);
            }

            let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
                RagChatError::Service(format!("Invalid JSON in completion stream: {}", e))
            })?;

            let content = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty());

            if let Some(content) = content {
                return Ok(Some(content));
            }
        }
    }
}

impl Iterator for CompletionStream {
    type Item = Result<String>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_fragment() {
            Ok(Some(fragment)) => Some(Ok(fragment)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}


use std::io::{BufRead, Write};
use tracing::{debug, error, info};

use crate::chat::{ConversationHistory, IntentClassifier};
use crate::openai::{OpenAiClient, RetryPolicy};
use crate::rag::{RAG_SYSTEM_PROMPT, RagOrchestrator};
use crate::Result;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant who gives accurate and useful answers.";
pub const ASSISTANT_LABEL: &str = "Assistant";
pub const USER_PROMPT: &str = "You: ";
pub const FAREWELL_MESSAGE: &str = "Thank you for chatting with me, goodbye!";
pub const QUIT_MESSAGE: &str = "Goodbye!";
pub const CLEARED_MESSAGE: &str = "Conversation history cleared!";

const QUIT_COMMAND: &str = "quit";
const CLEAR_COMMAND: &str = "clear";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Classifying,
    Retrieving,
    StreamingResponse,
    Terminated,
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    Farewell,
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Continue,
    End(SessionEnd),
}

/// Interactive chat loop streaming model replies to an output writer.
///
/// With a [`RagOrchestrator`] attached, every question is first wrapped in
/// retrieved context before it is sent.
pub struct ChatSession {
    client: OpenAiClient,
    classifier: IntentClassifier,
    retriever: Option<RagOrchestrator>,
    history: ConversationHistory,
    retry: RetryPolicy,
    state: SessionState,
}

impl ChatSession {
    #[inline]
    pub fn new(client: OpenAiClient) -> Self {
        Self::build(client, None, DEFAULT_SYSTEM_PROMPT)
    }

    #[inline]
    pub fn with_rag(client: OpenAiClient, retriever: RagOrchestrator) -> Self {
        Self::build(client, Some(retriever), RAG_SYSTEM_PROMPT)
    }

    fn build(client: OpenAiClient, retriever: Option<RagOrchestrator>, system_prompt: &str) -> Self {
        Self {
            classifier: IntentClassifier::new(client.clone()),
            client,
            retriever,
            history: ConversationHistory::new(system_prompt),
            retry: RetryPolicy::default(),
            state: SessionState::AwaitingInput,
        }
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn greeting(&self) -> &'static str {
        if self.retriever.is_some() {
            "Welcome to the knowledge-base assistant! Type 'quit' to exit or 'clear' to clear the conversation history."
        } else {
            "Welcome to the chat assistant! Type 'quit' to exit or 'clear' to clear the conversation history."
        }
    }

    /// Read lines from `input` until the session ends.
    ///
    /// A failed turn is reported on `output` and the loop keeps going; only
    /// I/O errors on `input` or `output` end the session with an error.
    #[inline]
    pub async fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<SessionEnd> {
        writeln!(output, "{}", self.greeting())?;

        loop {
            write!(output, "\n{}", USER_PROMPT)?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                info!("Input closed, ending session");
                self.state = SessionState::Terminated;
                return Ok(SessionEnd::EndOfInput);
            }

            match self.handle_input(&line, &mut output).await {
                Ok(TurnOutcome::Continue) => {}
                Ok(TurnOutcome::End(end)) => {
                    info!("Session ended: {:?}", end);
                    return Ok(end);
                }
                Err(e) => {
                    error!("Turn failed: {}", e);
                    self.state = SessionState::AwaitingInput;
                    writeln!(output, "\nError: {}", e)?;
                }
            }
        }
    }

    /// Process one line of user input
    #[inline]
    pub async fn handle_input<W: Write>(&mut self, line: &str, output: &mut W) -> Result<TurnOutcome> {
        let input = line.trim();

        if input.eq_ignore_ascii_case(QUIT_COMMAND) {
            writeln!(output, "{}", QUIT_MESSAGE)?;
            self.state = SessionState::Terminated;
            return Ok(TurnOutcome::End(SessionEnd::Quit));
        }

        if input.eq_ignore_ascii_case(CLEAR_COMMAND) {
            self.history.clear();
            writeln!(output, "{}", CLEARED_MESSAGE)?;
            return Ok(TurnOutcome::Continue);
        }

        if input.is_empty() {
            return Ok(TurnOutcome::Continue);
        }

        self.state = SessionState::Classifying;
        if self.classifier.is_farewell(input) {
            writeln!(output, "{}: {}", ASSISTANT_LABEL, FAREWELL_MESSAGE)?;
            self.state = SessionState::Terminated;
            return Ok(TurnOutcome::End(SessionEnd::Farewell));
        }

        let content = match &self.retriever {
            Some(retriever) => {
                self.state = SessionState::Retrieving;
                retriever.answer(input).await
            }
            None => input.to_string(),
        };
        self.history.push_user(content);

        self.state = SessionState::StreamingResponse;
        let reply = self.stream_reply(output);
        self.state = SessionState::AwaitingInput;

        self.history.push_assistant(reply?);
        Ok(TurnOutcome::Continue)
    }

    fn stream_reply<W: Write>(&self, output: &mut W) -> Result<String> {
        let stream = self
            .retry
            .run(|| self.client.stream_completion(self.history.messages()))?;

        write!(output, "{}: ", ASSISTANT_LABEL)?;
        output.flush()?;

        let mut reply = String::new();
        for fragment in stream {
            let fragment = match fragment {
                Ok(fragment) => fragment,
                Err(e) => {
                    writeln!(output)?;
                    return Err(e);
                }
            };

            output.write_all(fragment.as_bytes())?;
            output.flush()?;
            reply.push_str(&fragment);
        }
        writeln!(output)?;

        debug!("Streamed reply of {} bytes", reply.len());
        Ok(reply)
    }
}

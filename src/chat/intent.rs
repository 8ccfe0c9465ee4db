use tracing::{debug, warn};

use crate::openai::{ChatMessage, CompletionOptions, OpenAiClient, Role};

const FAREWELL_INSTRUCTION: &str = "Your task is to decide whether the user's input expresses \
an intention to end the conversation. If it does, reply with only 'true'; if it does not, \
reply with only 'false'.";

/// Asks the model whether a user turn means "I want to stop talking"
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    client: OpenAiClient,
}

impl IntentClassifier {
    #[inline]
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }

    /// True only when the model answers exactly "true"; any failure counts as false
    #[inline]
    pub fn is_farewell(&self, text: &str) -> bool {
        let messages = [
            ChatMessage::new(Role::System, FAREWELL_INSTRUCTION),
            ChatMessage::new(Role::User, format!("The user said: {}", text)),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(10),
        };

        match self.client.complete(&messages, options) {
            Ok(answer) => {
                let verdict = answer.trim().to_lowercase() == "true";
                debug!("Farewell intent {:?} -> {}", answer, verdict);
                verdict
            }
            Err(e) => {
                warn!("Failed to classify intent: {}", e);
                false
            }
        }
    }
}

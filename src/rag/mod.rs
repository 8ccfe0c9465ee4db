
use tracing::{debug, warn};

use crate::vectorizer::Vectorizer;

pub const DEFAULT_TOP_K: usize = 3;

pub const RAG_SYSTEM_PROMPT: &str = "You are a knowledgeable assistant. Answer questions using \
only the reference information supplied with each question, and say so clearly when that \
information is not enough.";

/// Wraps user questions in the texts retrieved for them
pub struct RagOrchestrator {
    vectorizer: Vectorizer,
    top_k: usize,
}

impl RagOrchestrator {
    #[inline]
    pub fn new(vectorizer: Vectorizer) -> Self {
        Self {
            vectorizer,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn vectorizer(&self) -> &Vectorizer {
        &self.vectorizer
    }

    /// Retrieved texts for `query`, one per line, nearest first.
    ///
    /// Retrieval failures are logged and give an empty context.
    #[inline]
    pub async fn retrieve_context(&self, query: &str) -> String {
        match self.vectorizer.search(query, self.top_k).await {
            Ok(results) => {
                debug!("Retrieved {} context entries", results.len());
                results
                    .iter()
                    .map(|result| result.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Err(e) => {
                warn!("Failed to retrieve context: {}", e);
                String::new()
            }
        }
    }

    /// The user turn to send for `query`
    #[inline]
    pub async fn answer(&self, query: &str) -> String {
        let context = self.retrieve_context(query).await;
        build_prompt(query, &context)
    }
}

/// Fill the answer template; the context goes in verbatim
#[inline]
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "Answer the user's question using only the reference information below. \
If the reference information is not enough to answer the question, say clearly that you cannot \
answer it or that more information is needed.\n\n\
Reference information:\n{context}\n\n\
User question: {query}\n\n\
Answer:"
    )
}

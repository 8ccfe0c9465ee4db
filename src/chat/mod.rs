// Chat module
// Conversation history, farewell detection and the interactive streaming loop

pub mod history;
pub mod intent;
pub mod session;

pub use history::ConversationHistory;
pub use intent::IntentClassifier;
pub use session::{ChatSession, SessionEnd, SessionState, TurnOutcome};

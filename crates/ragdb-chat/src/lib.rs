//! Chat layer on top of the retrieval pipeline: conversation session, prompt
//! template, model selection and streaming completion.

mod backend;
pub mod model;
pub mod openai;
pub mod prompt;
pub mod session;

pub use backend::ChatBackend;
pub use model::{select_model, ChatModel, ModelProvider, ModelSelection, TextStream};
pub use openai::OpenAiChatModel;
pub use session::{ChatMessage, ChatSession, Role, GREETING};

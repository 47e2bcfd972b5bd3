pub mod error;
pub mod gemini;
pub mod util;

pub use error::{AiError, Result};
pub use gemini::{Gemini, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use gemini::types::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, InlineData, Part,
    PromptFeedback,
};
pub use util::{body_preview, truncate_to_char_boundary};

pub mod encoder;
pub mod pipeline;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use encoder::{sniff_mime, Encoder};
pub use pipeline::{build_prompt, EditPipeline, EDIT_DIRECTIVE};
pub use session::{Phase, PendingEdit, Session, SessionSnapshot, SessionState, SkipReason};
pub use traits::ImageEditor;

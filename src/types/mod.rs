// Public modules
pub mod completion;
pub mod message;
pub mod model;
pub mod settings;
pub mod thread;

// Re-exports
pub use completion::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, CompletionUsage, ErrorBody,
    ErrorDetail, INVALID_FORMAT_MESSAGE, MAX_TOKENS,
};
pub use message::{Message, Role};
pub use model::{KnownModel, Model};
pub use settings::{DEFAULT_TEMPERATURE, Settings, TEMPERATURE_STEP, snap_temperature};
pub use thread::{DEFAULT_TITLE, TITLE_MAX_CHARS, Thread, derive_title};

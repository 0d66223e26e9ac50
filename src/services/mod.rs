pub mod content_cleaner;
pub mod position_calculator;
pub mod response_processor;
pub mod retry;

pub use content_cleaner::ContentCleaner;
pub use position_calculator::{locate, SentencePosition};
pub use response_processor::{MergeDrop, MergeReport, StepPayload};
pub use retry::RetryExecutor;

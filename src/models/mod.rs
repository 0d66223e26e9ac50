pub mod event;
pub mod request;
pub mod response;
pub mod upstream;

pub use event::{AiEvaluationSlice, ErrorData, EventData, EventType, InitData, Step, StreamEvent};
pub use request::{EssayContext, EvaluationRequest, ScoreOptions, ScoreRatio};
pub use response::{
    AiEvaluation, Category, EssayInfo, EvaluationResult, ModelVersion, PolishingEdit,
    PolishingEvaluation, SegmentedText, SentenceEvaluation, SentenceGrid, WordEvaluation,
};

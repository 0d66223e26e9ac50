pub mod evaluation_api;

pub use evaluation_api::{EvaluationApi, HttpEvaluationApi};

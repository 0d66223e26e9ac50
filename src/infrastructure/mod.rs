pub mod http_client;
pub mod sse;

pub use http_client::HttpClient;
pub use sse::FrameStream;

pub mod stream_coordinator;

pub use stream_coordinator::{FanInStats, StreamCoordinator, UpstreamCallResult};

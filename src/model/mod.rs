mod fetch;
mod session;

pub use fetch::{HttpFetcher, ModelFetcher};
pub use session::{LoadOptions, ModelInfo, ModelSession, SupportInfo};

pub mod config;
pub mod evidence;
pub mod judgement;
pub mod requirement;
pub mod verdict;

pub use config::{EmbeddingConfig, EngineConfig, LimitsConfig, SearchConfig};
pub use evidence::*;
pub use judgement::*;
pub use requirement::*;
pub use verdict::*;

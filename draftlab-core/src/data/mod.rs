//! Data acquisition: providers, normalization and the cache layer.

pub mod cache;
pub mod cancel;
pub mod circuit_breaker;
pub mod http;
pub mod normalize;
pub mod provider;
pub mod sources;

pub use cache::{CacheKey, CachePolicy, CacheStats, RankCache};
pub use cancel::CancelToken;
pub use circuit_breaker::CircuitBreaker;
pub use http::{HttpSettings, JsonClient};
pub use normalize::{normalize, RankBasis, RawRow};
pub use provider::{FetchError, FilterParams, PositionFilter, RankProvider};
pub use sources::{CsvSheetProvider, EspnEditorialProvider, SleeperAdpProvider};

//! Network-facing side: transport, retry, coalescing and the public facade.

pub mod api;
pub mod coalescer;
pub mod facade;
pub mod retry;

pub use api::{
    BatchLines, FailureKind, FetchError, HttpIngredientApi, IngredientApi, IngredientStore,
};
pub use coalescer::{cache_key, normalized_ids, RequestCoalescer};
pub use facade::{IngredientFetchFacade, PriceResult};
pub use retry::{FetchOutcome, FetchStatus, RetryPolicy, RetryingFetcher};

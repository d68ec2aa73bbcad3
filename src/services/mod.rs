pub mod item_pool_fetcher;
pub mod routing;
pub mod scoring;

pub use item_pool_fetcher::ItemPoolFetcher;
pub use routing::{RoutingDecision, RoutingOutcome, ROUTING_THRESHOLD};
pub use scoring::{Score, ScoringEngine, SectionScore};

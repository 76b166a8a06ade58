pub mod feed;
pub mod tracker;
pub mod types;

pub use feed::PriceFeed;
pub use tracker::PriceChangeTracker;

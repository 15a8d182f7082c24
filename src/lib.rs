pub mod config;
pub mod history;
pub mod identity;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod transform;

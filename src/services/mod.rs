pub mod accuracy;
pub mod baseline;
pub mod dataset;
pub mod features;
pub mod lineups;
pub mod markets;
pub mod rating;
pub mod slip;

pub use accuracy::AccuracyTracker;
pub use baseline::{BaselineModel, ForecastModel};
pub use features::{FeatureEngine, FeatureRequest};
pub use lineups::LineupMode;
pub use markets::MarketScorer;
pub use rating::EloTracker;
pub use slip::{select_slip, SlipPick};

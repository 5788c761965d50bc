pub mod claims;
pub mod scheduler;
pub mod sweep;

pub use scheduler::{spawn_tracking, Cadence};
pub use sweep::{PredictionResult, SweepReport, SweepScope, Tracker};

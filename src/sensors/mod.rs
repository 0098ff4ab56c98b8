pub mod models;
pub mod normalize;

pub use models::{ReadingHistoryEntry, SensorKind, SensorSnapshot};
pub use normalize::{is_empty_payload, normalize, NormalizeError};

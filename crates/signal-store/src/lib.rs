pub mod backtests;
pub mod candles;
pub mod channels;
pub mod consensus;
pub mod db;
pub mod instruments;
pub mod messages;
pub mod patterns;
pub mod rules;
pub mod signals;
pub mod traders;

pub use candles::CandleSaveReport;
pub use consensus::ConsensusStatsReport;
pub use db::{SignalStore, SystemStatistics};
pub use patterns::{NewPattern, PatternUpdate};
pub use rules::NewRule;
pub use signals::SignalQuery;

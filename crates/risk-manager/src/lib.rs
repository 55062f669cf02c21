pub mod daily_pnl;
pub mod models;
pub mod pyramid;
#[cfg(test)]
mod tests;

pub use daily_pnl::DailyPnLTracker;
pub use models::*;
pub use pyramid::PyramidLadder;

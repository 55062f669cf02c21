pub mod indicators;
pub mod intraday;
pub mod scorer;
pub mod snapshot;


pub use indicators::*;
pub use intraday::*;
pub use scorer::*;
pub use snapshot::*;

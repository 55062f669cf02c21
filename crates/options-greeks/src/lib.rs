pub mod greeks;
pub mod session;
pub mod strikes;

pub use greeks::*;
pub use session::*;
pub use strikes::*;

pub mod records;
pub mod units;

pub use records::*;
pub use units::*;

pub mod enums;
pub mod diagnosis;
pub mod records;

pub use diagnosis::*;
pub use enums::*;
pub use records::*;

pub mod assess;
pub mod clean;

pub use assess::*;
pub use clean::*;

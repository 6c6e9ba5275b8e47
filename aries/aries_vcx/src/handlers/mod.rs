#[macro_use]
pub mod util;
pub mod correlation;

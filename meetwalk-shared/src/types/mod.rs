pub mod api;
pub mod validation;

pub use api::*;
pub use validation::*;

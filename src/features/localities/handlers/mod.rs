pub mod locality_handler;
pub mod resolution_handler;

pub use locality_handler::*;
pub use resolution_handler::*;

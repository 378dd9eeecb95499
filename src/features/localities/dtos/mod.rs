pub mod locality_dto;

pub use locality_dto::*;

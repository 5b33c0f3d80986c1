pub mod engine;
pub mod mapping;

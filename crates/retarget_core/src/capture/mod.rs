pub mod builder;
pub mod rotation;

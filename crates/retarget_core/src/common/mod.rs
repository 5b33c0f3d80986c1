pub mod landmarks;
pub mod pose;
pub mod skeleton;

pub mod common;
pub mod des;

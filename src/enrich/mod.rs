pub mod sink;
pub mod pass;

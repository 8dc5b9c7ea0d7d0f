pub mod outcome;
pub mod validation;
pub mod engine;

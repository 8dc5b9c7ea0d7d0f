pub mod normalize;
pub mod doi;

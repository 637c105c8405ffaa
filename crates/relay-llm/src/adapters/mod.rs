pub mod anthropic_like;
pub mod mock;

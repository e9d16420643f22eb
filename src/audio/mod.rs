pub mod analyzer;
pub mod decode;
pub mod filter;

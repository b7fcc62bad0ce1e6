pub mod filter;
pub mod transport;

pub mod transport;
pub mod types;

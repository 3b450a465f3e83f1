pub mod nonce;

pub use nonce::{NonceGenerator, RequestNonce};

pub mod fingerprint;
pub mod jwt;
pub mod request;
pub mod time;

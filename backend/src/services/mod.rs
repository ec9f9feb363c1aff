pub mod auth_guard;
pub mod credentials;
pub mod session_pool;
pub mod session_store;

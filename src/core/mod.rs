pub mod backend;
pub mod detection;
pub mod retry;
pub mod store;

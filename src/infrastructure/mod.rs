pub mod exchange;
pub mod http_client_factory;
pub mod persistence;

pub use persistence::Database;

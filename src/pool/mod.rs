pub mod connection;
pub mod types;

pub use connection::MiddlewarePoolConnection;
pub use types::MiddlewarePool;

pub mod connection;
pub mod queries;
pub mod schema;
pub mod writers;

pub use connection::Database;

pub mod connection_pool;
pub mod sqlite_data_source;

pub use connection_pool::ConnectionPool;
pub use sqlite_data_source::SqliteDataSource;

mod memory_data_source;

pub use memory_data_source::MemoryDataSource;

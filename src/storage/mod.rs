pub mod layout;
pub mod file_lock;
pub mod wal;
pub mod segment;
pub mod segment_writer;
pub mod segment_reader;
pub mod merge_policy;
pub mod checkpoint;
pub mod map;
pub mod env;
pub mod typed;

pub mod buffer_pool;
pub mod jobs;
pub mod signal;

pub mod memory;
pub mod post_repository;
pub mod storage;

#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    ExamResultRepository, ExamResultRow, InMemoryRepository, Storage, StorageError,
    UserRepository,
};

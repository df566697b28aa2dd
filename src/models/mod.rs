//! Data models for Biblioteka

pub mod book;
pub mod order;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookFilter, PageRequest, SortDirection, SortField};
pub use order::{BookSnapshot, DisplayBook, Order, OrderStatus};
pub use user::{Identity, Role, User};

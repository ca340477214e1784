//! Application services orchestrating the domain, repositories and caches.

pub mod error;
pub mod posts;
pub mod repos;

#![doc = include_str!("../README.md")]

mod common;
pub mod repository;
pub mod service;

pub use common::*;
pub use repository::{InMemoryRepository, Repository};
pub use service::ConsignmentService;

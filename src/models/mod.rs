//! Typed views of catalog records.
//!
//! The API returns far more fields than most callers need. These structs
//! name the common ones and keep the rest in `extra`.
//!
//! - `Item`: A product, addressable by `id` or `sid`
//! - `Category`: A node of the category tree

pub mod catalog;

pub use catalog::{Category, Item};

//! Built-in capability backends for the data room, the web, and findings files.

pub mod dataroom;
pub mod file;
pub mod web;

pub use dataroom::DataRoom;
pub use file::FindingsStore;
pub use web::WebResearch;

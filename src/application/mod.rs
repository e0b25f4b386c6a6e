//! Application services: the two reload hook handlers and their collaborators.

pub mod error;
pub mod insert_tags;
pub mod marker;
pub mod reload;
pub mod render;
pub mod repos;
pub mod tokens;

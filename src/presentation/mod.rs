//! Askama views for pages, fragments and the pagination script.

pub mod views;

//! Frammento re-renders single page elements of a content-management front end.
//!
//! During a full page render, reload-enabled elements are tagged with
//! `data-ajax-reload-*` attributes. A follow-up ajax request carrying
//! `ajax_reload_element=<kind>::<id>` is intercepted before page-layout
//! construction and answered with a JSON payload containing just that
//! element's freshly rendered HTML, or a typed JSON error.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;

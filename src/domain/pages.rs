//! Pages, layouts and themes: the context a full-page render runs in.
//!
//! The page-layout pipeline itself is a host concern; these records carry
//! only what fragment re-rendering needs to observe the same context a
//! full-page render would produce.

use crate::domain::elements::ElementRef;

/// A front-end page and the elements placed on it, in render order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub layout_id: i64,
    pub elements: Vec<ElementRef>,
}

/// A page layout. The doctype string follows the host convention
/// `format[_variant]`, e.g. `html_5`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRecord {
    pub id: i64,
    pub name: String,
    pub template: Option<String>,
    pub doctype: String,
    pub theme: ThemeRecord,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThemeRecord {
    pub name: String,
    pub image_densities: String,
    pub template_group: Option<String>,
}

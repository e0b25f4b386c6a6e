//! Template marker injector.
//!
//! Runs while a front-end template is being finalized: reload-enabled
//! elements get `data-ajax-reload-*` attributes appended to their CSS-id
//! attribute string, and the pagination script is appended to the page body
//! exactly once per page render.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use crate::application::tokens::{CsrfTokenProvider, escape_attribute};
use crate::domain::elements::{
    ArticleRecord, CONTENT_PARENT_TABLES, ContentRecord, ElementKind, ElementRef, ModuleRecord,
    ReloadFlags,
};

pub const ATTR_ELEMENT: &str = "data-ajax-reload-element";
pub const ATTR_FORM_SUBMIT: &str = "data-ajax-reload-form-submit";
pub const ATTR_TOKEN: &str = "data-ajax-reload-token";

/// Mutable view of one element template while it is being finalized.
#[derive(Debug, Clone)]
pub struct ElementTemplateContext {
    pub id: i64,
    pub logical_type: String,
    pub parent_table: Option<String>,
    pub css_id_attr: String,
    pub flags: ReloadFlags,
}

impl From<&ModuleRecord> for ElementTemplateContext {
    fn from(record: &ModuleRecord) -> Self {
        Self {
            id: record.id,
            logical_type: record.module_type.clone(),
            parent_table: None,
            css_id_attr: record.css_id_attr.clone(),
            flags: record.flags,
        }
    }
}

impl From<&ContentRecord> for ElementTemplateContext {
    fn from(record: &ContentRecord) -> Self {
        Self {
            id: record.id,
            logical_type: record.content_type.clone(),
            parent_table: Some(record.parent_table.clone()),
            css_id_attr: record.css_id_attr.clone(),
            flags: record.flags,
        }
    }
}

impl From<&ArticleRecord> for ElementTemplateContext {
    fn from(record: &ArticleRecord) -> Self {
        Self {
            id: record.id,
            logical_type: "article".to_string(),
            parent_table: Some("tl_page".to_string()),
            css_id_attr: record.css_id_attr.clone(),
            flags: record.flags,
        }
    }
}

/// Ordered output chunks appended to the page body during a render.
#[derive(Debug, Default)]
pub struct PageBody {
    pub chunks: Vec<String>,
}

impl PageBody {
    pub fn append(&mut self, chunk: String) {
        self.chunks.push(chunk);
    }
}

/// Request-scoped render state. Constructed per page render; never shared
/// across requests, so the once-per-page bookkeeping cannot leak between
/// independent render cycles.
#[derive(Debug, Default)]
pub struct PageRenderState {
    pagination_script_injected: bool,
}

impl PageRenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pagination_script_injected(&self) -> bool {
        self.pagination_script_injected
    }
}

pub struct MarkerInjector {
    tokens: Arc<CsrfTokenProvider>,
    pagination_script: String,
}

impl MarkerInjector {
    /// `pagination_script` is the pre-rendered progressive-enhancement
    /// script appended to the page body once per render.
    pub fn new(tokens: Arc<CsrfTokenProvider>, pagination_script: String) -> Self {
        Self {
            tokens,
            pagination_script,
        }
    }

    /// Tag one element template. No-op for elements without the reload flag.
    pub fn tag(
        &self,
        template: &mut ElementTemplateContext,
        body: &mut PageBody,
        state: &mut PageRenderState,
    ) {
        if !template.flags.allow_ajax_reload {
            return;
        }

        let kind = classify(template);
        let reference = ElementRef::new(kind, template.id);
        template
            .css_id_attr
            .push_str(&self.data_attributes(reference, template.flags.ajax_reload_form_submit));

        if !state.pagination_script_injected {
            body.append(self.pagination_script.clone());
            state.pagination_script_injected = true;
            counter!("frammento_pagination_script_injected_total").increment(1);
            debug!(
                target = "frammento::marker",
                element = %reference,
                "pagination script appended to page body"
            );
        }
    }

    /// The reload marker attributes for one element, attribute-escaped.
    pub fn data_attributes(&self, reference: ElementRef, form_submit: bool) -> String {
        let token = escape_attribute(self.tokens.token());
        let mut attrs = format!(" {ATTR_ELEMENT}=\"{reference}\"");
        if form_submit {
            attrs.push_str(&format!(" {ATTR_FORM_SUBMIT}=\"\""));
        }
        attrs.push_str(&format!(" {ATTR_TOKEN}=\"{token}\""));
        attrs
    }
}

/// Element kind from template shape: articles by logical type, content
/// elements by their hosting parent table, modules otherwise.
fn classify(template: &ElementTemplateContext) -> ElementKind {
    if template.logical_type == "article" {
        return ElementKind::Article;
    }
    if template
        .parent_table
        .as_deref()
        .is_some_and(|table| CONTENT_PARENT_TABLES.contains(&table))
    {
        return ElementKind::Content;
    }
    ElementKind::Module
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        ATTR_ELEMENT, ATTR_FORM_SUBMIT, ATTR_TOKEN, ElementTemplateContext, MarkerInjector,
        PageBody, PageRenderState, classify,
    };
    use crate::application::tokens::CsrfTokenProvider;
    use crate::domain::elements::{ElementKind, ReloadFlags};

    fn injector() -> MarkerInjector {
        MarkerInjector::new(
            Arc::new(CsrfTokenProvider::fixed("tok\"123")),
            "<script>window.paginationReload()</script>".to_string(),
        )
    }

    fn template(logical_type: &str, parent_table: Option<&str>, flags: ReloadFlags) -> ElementTemplateContext {
        ElementTemplateContext {
            id: 12,
            logical_type: logical_type.to_string(),
            parent_table: parent_table.map(str::to_string),
            css_id_attr: r#" id="el12" class="block""#.to_string(),
            flags,
        }
    }

    #[test]
    fn unflagged_template_is_left_untouched() {
        let injector = injector();
        let mut tpl = template("navigation", None, ReloadFlags::default());
        let before = tpl.css_id_attr.clone();
        let mut body = PageBody::default();
        let mut state = PageRenderState::new();

        injector.tag(&mut tpl, &mut body, &mut state);

        assert_eq!(tpl.css_id_attr, before);
        assert!(body.chunks.is_empty());
        assert!(!state.pagination_script_injected());
    }

    #[test]
    fn flagged_module_gets_marker_attributes() {
        let injector = injector();
        let mut tpl = template("navigation", None, ReloadFlags::enabled());
        let mut body = PageBody::default();
        let mut state = PageRenderState::new();

        injector.tag(&mut tpl, &mut body, &mut state);

        assert!(tpl.css_id_attr.contains(&format!("{ATTR_ELEMENT}=\"mod::12\"")));
        assert!(tpl.css_id_attr.contains(ATTR_TOKEN));
        assert!(!tpl.css_id_attr.contains(ATTR_FORM_SUBMIT));
    }

    #[test]
    fn form_submit_flag_emits_the_empty_attribute() {
        let injector = injector();
        let mut tpl = template("search", None, ReloadFlags::enabled().with_form_submit());
        let mut body = PageBody::default();
        let mut state = PageRenderState::new();

        injector.tag(&mut tpl, &mut body, &mut state);

        assert!(tpl.css_id_attr.contains(&format!("{ATTR_FORM_SUBMIT}=\"\"")));
    }

    #[test]
    fn token_value_is_attribute_escaped() {
        let injector = injector();
        let mut tpl = template("navigation", None, ReloadFlags::enabled());
        let mut body = PageBody::default();
        let mut state = PageRenderState::new();

        injector.tag(&mut tpl, &mut body, &mut state);

        assert!(tpl.css_id_attr.contains("tok&quot;123"));
        assert!(!tpl.css_id_attr.contains("tok\"123"));
    }

    #[test]
    fn pagination_script_is_appended_exactly_once() {
        let injector = injector();
        let mut body = PageBody::default();
        let mut state = PageRenderState::new();

        for _ in 0..4 {
            let mut tpl = template("navigation", None, ReloadFlags::enabled());
            injector.tag(&mut tpl, &mut body, &mut state);
        }

        assert_eq!(body.chunks.len(), 1);
        assert!(state.pagination_script_injected());
    }

    #[test]
    fn fresh_render_state_appends_the_script_again() {
        let injector = injector();

        let mut first_body = PageBody::default();
        let mut first_state = PageRenderState::new();
        let mut tpl = template("navigation", None, ReloadFlags::enabled());
        injector.tag(&mut tpl, &mut first_body, &mut first_state);

        let mut second_body = PageBody::default();
        let mut second_state = PageRenderState::new();
        let mut tpl = template("navigation", None, ReloadFlags::enabled());
        injector.tag(&mut tpl, &mut second_body, &mut second_state);

        assert_eq!(first_body.chunks.len(), 1);
        assert_eq!(second_body.chunks.len(), 1);
    }

    #[test]
    fn classification_follows_type_then_parent_table() {
        let article = template("article", Some("tl_page"), ReloadFlags::enabled());
        assert_eq!(classify(&article), ElementKind::Article);

        let content = template("text", Some("tl_article"), ReloadFlags::enabled());
        assert_eq!(classify(&content), ElementKind::Content);

        let news_content = template("text", Some("tl_news"), ReloadFlags::enabled());
        assert_eq!(classify(&news_content), ElementKind::Content);

        let module = template("navigation", None, ReloadFlags::enabled());
        assert_eq!(classify(&module), ElementKind::Module);

        let other_parent = template("text", Some("tl_box"), ReloadFlags::enabled());
        assert_eq!(classify(&other_parent), ElementKind::Module);
    }
}

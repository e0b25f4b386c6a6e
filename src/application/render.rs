//! Per-request render context and the kind strategy registry.
//!
//! Each element kind pairs a lookup with a renderer. The registry is built
//! once at startup and validated to cover every kind, so the responder's
//! only remaining failure mode for a kind token is the explicit
//! unknown-kind error branch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::application::repos::{ArticlesRepo, ContentRepo, ModulesRepo, RepoError};
use crate::config::DOCTYPE_SEPARATOR;
use crate::domain::elements::{
    ArticleRecord, ContentRecord, ElementKind, ModuleRecord, ReloadFlags,
};
use crate::domain::error::DomainError;
use crate::domain::pages::LayoutRecord;

/// Transient per-request render state. Populated before a fragment render
/// so the single-element renderer observes the same context a full-page
/// render would produce.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub image_densities: String,
    pub layout_id: i64,
    pub page_template: String,
    pub template_group: Option<String>,
    pub output_format: Option<String>,
    pub output_variant: Option<String>,
}

impl RenderContext {
    pub fn for_layout(layout: &LayoutRecord, default_page_template: &str) -> Self {
        let mut doctype = layout.doctype.splitn(2, DOCTYPE_SEPARATOR);
        let output_format = doctype
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);
        let output_variant = doctype
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);

        let page_template = layout
            .template
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(default_page_template)
            .to_string();

        Self {
            image_densities: layout.theme.image_densities.clone(),
            layout_id: layout.id,
            page_template,
            template_group: layout.theme.template_group.clone(),
            output_format,
            output_variant,
        }
    }
}

/// Everything a single fragment render needs besides the record itself.
#[derive(Debug, Clone)]
pub struct FragmentRequest {
    pub context: RenderContext,
    /// Effective element page number, after the generic `page` fallback.
    pub page: Option<u32>,
    /// Sanitized request path and query for URLs generated during rendering.
    pub request_url: String,
    /// Full attribute string for the element root tag, reload markers included.
    pub attributes: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{template}` failed to render: {message}")]
    Template { template: &'static str, message: String },
}

impl RenderError {
    pub fn template(template: &'static str, message: impl Into<String>) -> Self {
        Self::Template {
            template,
            message: message.into(),
        }
    }
}

pub trait ModuleRenderer: Send + Sync {
    fn render(&self, record: &ModuleRecord, request: &FragmentRequest)
    -> Result<String, RenderError>;
}

pub trait ContentRenderer: Send + Sync {
    fn render(
        &self,
        record: &ContentRecord,
        request: &FragmentRequest,
    ) -> Result<String, RenderError>;
}

pub trait ArticleRenderer: Send + Sync {
    fn render(
        &self,
        record: &ArticleRecord,
        request: &FragmentRequest,
    ) -> Result<String, RenderError>;
}

/// A resolved element, ready to be authorized and rendered.
pub trait ResolvedElement: Send {
    fn flags(&self) -> ReloadFlags;
    fn css_id_attr(&self) -> &str;
    fn render(&self, request: &FragmentRequest) -> Result<String, RenderError>;
}

/// Lookup + render pair for one element kind.
#[async_trait]
pub trait ReloadStrategy: Send + Sync {
    fn kind(&self) -> ElementKind;
    async fn resolve(&self, id: i64) -> Result<Option<Box<dyn ResolvedElement>>, RepoError>;
}

pub struct ModuleStrategy {
    repo: Arc<dyn ModulesRepo>,
    renderer: Arc<dyn ModuleRenderer>,
}

impl ModuleStrategy {
    pub fn new(repo: Arc<dyn ModulesRepo>, renderer: Arc<dyn ModuleRenderer>) -> Self {
        Self { repo, renderer }
    }
}

struct ResolvedModule {
    record: ModuleRecord,
    renderer: Arc<dyn ModuleRenderer>,
}

impl ResolvedElement for ResolvedModule {
    fn flags(&self) -> ReloadFlags {
        self.record.flags
    }

    fn css_id_attr(&self) -> &str {
        &self.record.css_id_attr
    }

    fn render(&self, request: &FragmentRequest) -> Result<String, RenderError> {
        self.renderer.render(&self.record, request)
    }
}

#[async_trait]
impl ReloadStrategy for ModuleStrategy {
    fn kind(&self) -> ElementKind {
        ElementKind::Module
    }

    async fn resolve(&self, id: i64) -> Result<Option<Box<dyn ResolvedElement>>, RepoError> {
        let record = self.repo.find_module(id).await?;
        Ok(record.map(|record| {
            Box::new(ResolvedModule {
                record,
                renderer: self.renderer.clone(),
            }) as Box<dyn ResolvedElement>
        }))
    }
}

pub struct ContentStrategy {
    repo: Arc<dyn ContentRepo>,
    renderer: Arc<dyn ContentRenderer>,
}

impl ContentStrategy {
    pub fn new(repo: Arc<dyn ContentRepo>, renderer: Arc<dyn ContentRenderer>) -> Self {
        Self { repo, renderer }
    }
}

struct ResolvedContent {
    record: ContentRecord,
    renderer: Arc<dyn ContentRenderer>,
}

impl ResolvedElement for ResolvedContent {
    fn flags(&self) -> ReloadFlags {
        self.record.flags
    }

    fn css_id_attr(&self) -> &str {
        &self.record.css_id_attr
    }

    fn render(&self, request: &FragmentRequest) -> Result<String, RenderError> {
        self.renderer.render(&self.record, request)
    }
}

#[async_trait]
impl ReloadStrategy for ContentStrategy {
    fn kind(&self) -> ElementKind {
        ElementKind::Content
    }

    async fn resolve(&self, id: i64) -> Result<Option<Box<dyn ResolvedElement>>, RepoError> {
        let record = self.repo.find_content(id).await?;
        Ok(record.map(|record| {
            Box::new(ResolvedContent {
                record,
                renderer: self.renderer.clone(),
            }) as Box<dyn ResolvedElement>
        }))
    }
}

pub struct ArticleStrategy {
    repo: Arc<dyn ArticlesRepo>,
    renderer: Arc<dyn ArticleRenderer>,
}

impl ArticleStrategy {
    pub fn new(repo: Arc<dyn ArticlesRepo>, renderer: Arc<dyn ArticleRenderer>) -> Self {
        Self { repo, renderer }
    }
}

struct ResolvedArticle {
    record: ArticleRecord,
    renderer: Arc<dyn ArticleRenderer>,
}

impl ResolvedElement for ResolvedArticle {
    fn flags(&self) -> ReloadFlags {
        self.record.flags
    }

    fn css_id_attr(&self) -> &str {
        &self.record.css_id_attr
    }

    fn render(&self, request: &FragmentRequest) -> Result<String, RenderError> {
        self.renderer.render(&self.record, request)
    }
}

#[async_trait]
impl ReloadStrategy for ArticleStrategy {
    fn kind(&self) -> ElementKind {
        ElementKind::Article
    }

    async fn resolve(&self, id: i64) -> Result<Option<Box<dyn ResolvedElement>>, RepoError> {
        let record = self.repo.find_article(id).await?;
        Ok(record.map(|record| {
            Box::new(ResolvedArticle {
                record,
                renderer: self.renderer.clone(),
            }) as Box<dyn ResolvedElement>
        }))
    }
}

/// Strategy map keyed by element kind.
pub struct ReloadRegistry {
    strategies: HashMap<ElementKind, Arc<dyn ReloadStrategy>>,
}

impl std::fmt::Debug for ReloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadRegistry")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ReloadRegistry {
    /// Build the registry, requiring exactly one strategy per kind.
    pub fn new(strategies: Vec<Arc<dyn ReloadStrategy>>) -> Result<Self, DomainError> {
        let mut map: HashMap<ElementKind, Arc<dyn ReloadStrategy>> = HashMap::new();
        for strategy in strategies {
            let kind = strategy.kind();
            if map.insert(kind, strategy).is_some() {
                return Err(DomainError::invariant(format!(
                    "duplicate reload strategy for kind `{kind}`"
                )));
            }
        }
        for kind in ElementKind::ALL {
            if !map.contains_key(&kind) {
                return Err(DomainError::invariant(format!(
                    "missing reload strategy for kind `{kind}`"
                )));
            }
        }
        Ok(Self { strategies: map })
    }

    pub fn strategy(&self, kind: ElementKind) -> &Arc<dyn ReloadStrategy> {
        // new() guarantees coverage of every kind
        &self.strategies[&kind]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{ReloadRegistry, ReloadStrategy, RenderContext, ResolvedElement};
    use crate::application::repos::RepoError;
    use crate::domain::elements::ElementKind;
    use crate::domain::pages::{LayoutRecord, ThemeRecord};

    struct NullStrategy(ElementKind);

    #[async_trait]
    impl ReloadStrategy for NullStrategy {
        fn kind(&self) -> ElementKind {
            self.0
        }

        async fn resolve(
            &self,
            _id: i64,
        ) -> Result<Option<Box<dyn ResolvedElement>>, RepoError> {
            Ok(None)
        }
    }

    fn layout(template: Option<&str>, doctype: &str) -> LayoutRecord {
        LayoutRecord {
            id: 7,
            name: "default".to_string(),
            template: template.map(str::to_string),
            doctype: doctype.to_string(),
            theme: ThemeRecord {
                name: "base".to_string(),
                image_densities: "1x, 2x".to_string(),
                template_group: Some("templates/base".to_string()),
            },
        }
    }

    #[test]
    fn registry_requires_all_three_kinds() {
        let err = ReloadRegistry::new(vec![
            Arc::new(NullStrategy(ElementKind::Module)),
            Arc::new(NullStrategy(ElementKind::Content)),
        ])
        .expect_err("article strategy missing");
        assert!(err.to_string().contains("art"));
    }

    #[test]
    fn registry_rejects_duplicate_kinds() {
        let err = ReloadRegistry::new(vec![
            Arc::new(NullStrategy(ElementKind::Module)),
            Arc::new(NullStrategy(ElementKind::Module)),
        ])
        .expect_err("duplicate module strategy");
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn doctype_splits_into_format_and_variant() {
        let context = RenderContext::for_layout(&layout(None, "html_5"), "fe_page");
        assert_eq!(context.output_format.as_deref(), Some("html"));
        assert_eq!(context.output_variant.as_deref(), Some("5"));
    }

    #[test]
    fn doctype_without_separator_has_no_variant() {
        let context = RenderContext::for_layout(&layout(None, "xhtml"), "fe_page");
        assert_eq!(context.output_format.as_deref(), Some("xhtml"));
        assert_eq!(context.output_variant, None);
    }

    #[test]
    fn empty_doctype_leaves_both_segments_absent() {
        let context = RenderContext::for_layout(&layout(None, ""), "fe_page");
        assert_eq!(context.output_format, None);
        assert_eq!(context.output_variant, None);
    }

    #[test]
    fn unset_layout_template_falls_back_to_the_default() {
        let context = RenderContext::for_layout(&layout(None, "html_5"), "fe_page");
        assert_eq!(context.page_template, "fe_page");

        let context = RenderContext::for_layout(&layout(Some("fe_custom"), "html_5"), "fe_page");
        assert_eq!(context.page_template, "fe_custom");
    }

    #[test]
    fn theme_settings_are_carried_into_the_context() {
        let context = RenderContext::for_layout(&layout(None, "html_5"), "fe_page");
        assert_eq!(context.image_densities, "1x, 2x");
        assert_eq!(context.layout_id, 7);
        assert_eq!(context.template_group.as_deref(), Some("templates/base"));
    }
}

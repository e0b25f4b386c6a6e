use askama::Template;

use crate::application::render::{
    ArticleRenderer, ContentRenderer, FragmentRequest, ModuleRenderer, RenderError,
};
use crate::domain::elements::{ArticleRecord, ContentRecord, ModuleRecord};

fn render_template<T: Template>(template: &T, name: &'static str) -> Result<String, RenderError> {
    template
        .render()
        .map_err(|err| RenderError::template(name, err.to_string()))
}

#[derive(Template)]
#[template(path = "module.html")]
struct ModuleFragmentTemplate {
    module_type: String,
    headline: Option<String>,
    body: String,
    attributes: String,
    page: Option<u32>,
    request_url: String,
}

#[derive(Template)]
#[template(path = "content.html")]
struct ContentFragmentTemplate {
    content_type: String,
    headline: Option<String>,
    body: String,
    attributes: String,
    page: Option<u32>,
    request_url: String,
}

#[derive(Template)]
#[template(path = "article.html")]
struct ArticleFragmentTemplate {
    title: String,
    body: String,
    attributes: String,
    page: Option<u32>,
    request_url: String,
}

#[derive(Template)]
#[template(path = "pagination_script.html")]
struct PaginationScriptTemplate;

/// Full page shell: rendered elements in order, then the body collection.
#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub title: String,
    pub page_template: String,
    pub elements: Vec<String>,
    pub body_chunks: Vec<String>,
}

impl PageTemplate {
    pub fn render_html(&self) -> Result<String, RenderError> {
        render_template(self, "page.html")
    }
}

/// The progressive-enhancement script appended once per page render.
pub fn pagination_script() -> Result<String, RenderError> {
    render_template(&PaginationScriptTemplate, "pagination_script.html")
}

/// Askama-backed renderer shared by the page pipeline and the responder.
#[derive(Debug, Default, Clone, Copy)]
pub struct AskamaFragmentRenderer;

impl ModuleRenderer for AskamaFragmentRenderer {
    fn render(
        &self,
        record: &ModuleRecord,
        request: &FragmentRequest,
    ) -> Result<String, RenderError> {
        let template = ModuleFragmentTemplate {
            module_type: record.module_type.clone(),
            headline: record.headline.clone(),
            body: record.body_html.clone(),
            attributes: request.attributes.clone(),
            page: request.page,
            request_url: request.request_url.clone(),
        };
        render_template(&template, "module.html")
    }
}

impl ContentRenderer for AskamaFragmentRenderer {
    fn render(
        &self,
        record: &ContentRecord,
        request: &FragmentRequest,
    ) -> Result<String, RenderError> {
        let template = ContentFragmentTemplate {
            content_type: record.content_type.clone(),
            headline: record.headline.clone(),
            body: record.body_html.clone(),
            attributes: request.attributes.clone(),
            page: request.page,
            request_url: request.request_url.clone(),
        };
        render_template(&template, "content.html")
    }
}

impl ArticleRenderer for AskamaFragmentRenderer {
    fn render(
        &self,
        record: &ArticleRecord,
        request: &FragmentRequest,
    ) -> Result<String, RenderError> {
        let template = ArticleFragmentTemplate {
            title: record.title.clone(),
            body: record.body_html.clone(),
            attributes: request.attributes.clone(),
            page: request.page,
            request_url: request.request_url.clone(),
        };
        render_template(&template, "article.html")
    }
}

#[cfg(test)]
mod tests {
    use super::{AskamaFragmentRenderer, pagination_script};
    use crate::application::render::{
        ContentRenderer, FragmentRequest, ModuleRenderer, RenderContext,
    };
    use crate::domain::elements::{ContentRecord, ModuleRecord, ReloadFlags};

    fn request() -> FragmentRequest {
        FragmentRequest {
            context: RenderContext {
                image_densities: String::new(),
                layout_id: 1,
                page_template: "fe_page".to_string(),
                template_group: None,
                output_format: Some("html".to_string()),
                output_variant: Some("5".to_string()),
            },
            page: Some(2),
            request_url: "/home?keep=1".to_string(),
            attributes: " id=\"el\" data-ajax-reload-element=\"mod::1\"".to_string(),
        }
    }

    #[test]
    fn module_fragment_carries_attributes_and_pagination() {
        let record = ModuleRecord {
            id: 1,
            module_type: "navigation".to_string(),
            name: "Main navigation".to_string(),
            css_id_attr: String::new(),
            headline: Some("Sections".to_string()),
            body_html: "<ul><li>Home</li></ul>".to_string(),
            flags: ReloadFlags::enabled(),
        };

        let html = ModuleRenderer::render(&AskamaFragmentRenderer, &record, &request())
            .expect("render module");

        assert!(html.contains("mod-navigation"));
        assert!(html.contains("data-ajax-reload-element=\"mod::1\""));
        assert!(html.contains("data-page=\"2\""));
        assert!(html.contains("/home?keep=1"));
    }

    #[test]
    fn content_fragment_without_headline_omits_the_heading() {
        let record = ContentRecord {
            id: 2,
            content_type: "text".to_string(),
            parent_table: "tl_article".to_string(),
            css_id_attr: String::new(),
            headline: None,
            body_html: "<p>hello</p>".to_string(),
            flags: ReloadFlags::enabled(),
        };

        let html = ContentRenderer::render(&AskamaFragmentRenderer, &record, &request())
            .expect("render content");

        assert!(html.contains("ce-text"));
        assert!(!html.contains("headline"));
    }

    #[test]
    fn pagination_script_targets_tagged_elements() {
        let script = pagination_script().expect("render script");
        assert!(script.contains("<script"));
        assert!(script.contains("data-ajax-reload-element"));
        assert!(script.contains("ajax_reload_element"));
    }
}

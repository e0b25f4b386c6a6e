use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, HOST},
        request::Parts,
    },
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tracing::warn;
use url::Url;

use crate::{
    application::{
        error::{AppError, HttpError},
        insert_tags::{InsertTagReplacer, ScriptTagRewriter},
        marker::{ElementTemplateContext, MarkerInjector, PageBody, PageRenderState},
        reload::{FragmentResponder, RequestEnvelope, SessionState},
        render::{
            ArticleRenderer, ArticleStrategy, ContentRenderer, ContentStrategy, FragmentRequest,
            ModuleRenderer, ModuleStrategy, ReloadRegistry, RenderContext,
        },
        repos::{ArticlesRepo, ContentRepo, ModulesRepo, PagesRepo},
        tokens::CsrfTokenProvider,
    },
    config::RenderSettings,
    domain::elements::ElementKind,
    domain::pages::{LayoutRecord, PageRecord},
    infra::store::InMemoryStore,
    presentation::views::{AskamaFragmentRenderer, PageTemplate, pagination_script},
};

use super::{
    middleware::{log_responses, set_request_context},
    pipeline_error_to_http, repo_error_to_http,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const AJAX_HEADER: &str = "x-requested-with";
const AJAX_HEADER_VALUE: &str = "XMLHttpRequest";

#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<InMemoryStore>,
    pub responder: Arc<FragmentResponder>,
    pub marker: Arc<MarkerInjector>,
    pub renderer: AskamaFragmentRenderer,
    pub default_page_template: String,
}

/// Wire the reload pipeline onto a store with a fresh process token.
pub fn build_state(
    store: Arc<InMemoryStore>,
    insert_tags: Arc<dyn InsertTagReplacer>,
    script_rewriter: Option<Arc<dyn ScriptTagRewriter>>,
    render: &RenderSettings,
) -> Result<HttpState, AppError> {
    build_state_with_tokens(
        store,
        insert_tags,
        script_rewriter,
        render,
        Arc::new(CsrfTokenProvider::new()),
    )
}

pub fn build_state_with_tokens(
    store: Arc<InMemoryStore>,
    insert_tags: Arc<dyn InsertTagReplacer>,
    script_rewriter: Option<Arc<dyn ScriptTagRewriter>>,
    render: &RenderSettings,
    tokens: Arc<CsrfTokenProvider>,
) -> Result<HttpState, AppError> {
    let script = pagination_script().map_err(|err| AppError::unexpected(err.to_string()))?;
    let marker = Arc::new(MarkerInjector::new(tokens.clone(), script));

    let renderer = Arc::new(AskamaFragmentRenderer);
    let registry = ReloadRegistry::new(vec![
        Arc::new(ModuleStrategy::new(
            store.clone() as Arc<dyn ModulesRepo>,
            renderer.clone() as Arc<dyn ModuleRenderer>,
        )),
        Arc::new(ContentStrategy::new(
            store.clone() as Arc<dyn ContentRepo>,
            renderer.clone() as Arc<dyn ContentRenderer>,
        )),
        Arc::new(ArticleStrategy::new(
            store.clone() as Arc<dyn ArticlesRepo>,
            renderer.clone() as Arc<dyn ArticleRenderer>,
        )),
    ])?;

    let responder = Arc::new(FragmentResponder::new(
        registry,
        marker.clone(),
        tokens,
        insert_tags,
        script_rewriter,
        render.default_page_template.clone(),
    ));

    Ok(HttpState {
        store,
        responder,
        marker,
        renderer: AskamaFragmentRenderer,
        default_page_template: render.default_page_template.clone(),
    })
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/pages/{slug}", get(render_page).post(render_page))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn render_page(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    request: Request<Body>,
) -> Response {
    const SOURCE: &str = "infra::http::render_page";

    let (parts, body) = request.into_parts();
    let mut envelope = match envelope_from_request(&parts, body).await {
        Ok(envelope) => envelope,
        Err(err) => return err.into_response(),
    };

    let page = match state.store.find_page_by_slug(&slug).await {
        Ok(Some(page)) => page,
        Ok(None) => {
            return HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Page not found",
                format!("no page with slug `{slug}`"),
            )
            .into_response();
        }
        Err(err) => return repo_error_to_http(SOURCE, err).into_response(),
    };

    let layout = match state.store.find_layout(page.layout_id).await {
        Ok(Some(layout)) => layout,
        Ok(None) => {
            return HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Layout missing",
                format!("page `{slug}` references unknown layout {}", page.layout_id),
            )
            .into_response();
        }
        Err(err) => return repo_error_to_http(SOURCE, err).into_response(),
    };

    // Fragment responder runs before any page-layout work; a terminal
    // payload short-circuits the whole render.
    let mut session = SessionState::default();
    match state
        .responder
        .intercept(&mut envelope, &mut session, &layout)
        .await
    {
        Ok(Some(payload)) => return Json(payload).into_response(),
        Ok(None) => {}
        Err(err) => return pipeline_error_to_http(SOURCE, err).into_response(),
    }

    match render_full_page(&state, &page, &layout, &envelope).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn render_full_page(
    state: &HttpState,
    page: &PageRecord,
    layout: &LayoutRecord,
    envelope: &RequestEnvelope,
) -> Result<String, HttpError> {
    const SOURCE: &str = "infra::http::render_full_page";

    let context = RenderContext::for_layout(layout, &state.default_page_template);
    let mut body = PageBody::default();
    let mut render_state = PageRenderState::new();
    let mut elements = Vec::with_capacity(page.elements.len());

    for reference in &page.elements {
        let element_page = envelope
            .param(&reference.kind.page_param(reference.id))
            .and_then(|value| value.parse::<u32>().ok());

        let rendered = match reference.kind {
            ElementKind::Module => {
                let Some(record) = state
                    .store
                    .find_module(reference.id)
                    .await
                    .map_err(|err| repo_error_to_http(SOURCE, err))?
                else {
                    warn!(
                        target = "frammento::http",
                        element = %reference,
                        "page references missing module, skipping"
                    );
                    continue;
                };
                let mut template = ElementTemplateContext::from(&record);
                state.marker.tag(&mut template, &mut body, &mut render_state);
                let request = fragment_request(&context, element_page, envelope, template);
                ModuleRenderer::render(&state.renderer, &record, &request)
            }
            ElementKind::Content => {
                let Some(record) = state
                    .store
                    .find_content(reference.id)
                    .await
                    .map_err(|err| repo_error_to_http(SOURCE, err))?
                else {
                    warn!(
                        target = "frammento::http",
                        element = %reference,
                        "page references missing content element, skipping"
                    );
                    continue;
                };
                let mut template = ElementTemplateContext::from(&record);
                state.marker.tag(&mut template, &mut body, &mut render_state);
                let request = fragment_request(&context, element_page, envelope, template);
                ContentRenderer::render(&state.renderer, &record, &request)
            }
            ElementKind::Article => {
                let Some(record) = state
                    .store
                    .find_article(reference.id)
                    .await
                    .map_err(|err| repo_error_to_http(SOURCE, err))?
                else {
                    warn!(
                        target = "frammento::http",
                        element = %reference,
                        "page references missing article, skipping"
                    );
                    continue;
                };
                let mut template = ElementTemplateContext::from(&record);
                state.marker.tag(&mut template, &mut body, &mut render_state);
                let request = fragment_request(&context, element_page, envelope, template);
                ArticleRenderer::render(&state.renderer, &record, &request)
            }
        }
        .map_err(|err| {
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Element rendering failed",
                &err,
            )
        })?;

        elements.push(rendered);
    }

    let template = PageTemplate {
        title: page.title.clone(),
        page_template: context.page_template.clone(),
        elements,
        body_chunks: body.chunks,
    };
    template.render_html().map_err(|err| {
        HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Page rendering failed",
            &err,
        )
    })
}

fn fragment_request(
    context: &RenderContext,
    page: Option<u32>,
    envelope: &RequestEnvelope,
    template: ElementTemplateContext,
) -> FragmentRequest {
    FragmentRequest {
        context: context.clone(),
        page,
        request_url: envelope.request_url(),
        attributes: template.css_id_attr,
    }
}

async fn envelope_from_request(parts: &Parts, body: Body) -> Result<RequestEnvelope, HttpError> {
    const SOURCE: &str = "infra::http::envelope_from_request";

    let is_ajax = parts
        .headers
        .get(AJAX_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case(AJAX_HEADER_VALUE));

    let host = parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");

    let url = Url::parse(&format!("http://{host}{path_and_query}")).map_err(|err| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Malformed request URL",
            err.to_string(),
        )
    })?;

    let is_form = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));

    let body_params = if is_form {
        let bytes = axum::body::to_bytes(body, 1024 * 1024).await.map_err(|err| {
            HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Unreadable request body",
                err.to_string(),
            )
        })?;
        url::form_urlencoded::parse(&bytes)
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect()
    } else {
        Vec::new()
    };

    Ok(RequestEnvelope::new(is_ajax, url, body_params))
}

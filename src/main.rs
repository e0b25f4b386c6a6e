use std::{process, sync::Arc};

use frammento::{
    application::{error::AppError, insert_tags::{DeferredScriptRewriter, ScriptTagRewriter, StaticInsertTags}},
    config,
    domain::elements::{
        ArticleRecord, ContentRecord, ElementKind, ElementRef, ModuleRecord, ReloadFlags,
    },
    domain::error::DomainError,
    domain::pages::{LayoutRecord, PageRecord, ThemeRecord},
    infra::{http, store::InMemoryStore, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let store = Arc::new(InMemoryStore::new());
    seed_demo_site(&store)?;

    let insert_tags = Arc::new(
        StaticInsertTags::new()
            .with_tag("site_name", "Frammento demo")
            .with_tag("year", "2026"),
    );
    let script_rewriter: Arc<dyn ScriptTagRewriter> = Arc::new(DeferredScriptRewriter);

    let state = http::build_state(
        store,
        insert_tags,
        Some(script_rewriter),
        &settings.render,
    )?;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(frammento::infra::error::InfraError::from(err)))?;

    info!(
        target = "frammento::serve",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

/// A small self-contained site so the server is useful out of the box.
fn seed_demo_site(store: &InMemoryStore) -> Result<(), DomainError> {
    store.insert_layout(LayoutRecord {
        id: 1,
        name: "default".to_string(),
        template: None,
        doctype: "html_5".to_string(),
        theme: ThemeRecord {
            name: "base".to_string(),
            image_densities: "1x, 2x".to_string(),
            template_group: None,
        },
    });

    store.insert_module(ModuleRecord {
        id: 1,
        module_type: "navigation".to_string(),
        name: "Main navigation".to_string(),
        css_id_attr: " id=\"mainnav\" class=\"block\"".to_string(),
        headline: Some("Sections".to_string()),
        body_html: "<ul><li><a href=\"/pages/home\">Home</a></li></ul>".to_string(),
        flags: ReloadFlags::enabled(),
    })?;

    store.insert_content(ContentRecord {
        id: 2,
        content_type: "text".to_string(),
        parent_table: "tl_article".to_string(),
        css_id_attr: " id=\"intro\"".to_string(),
        headline: Some("Welcome".to_string()),
        body_html: "<p>{{site_name}} serves reload-enabled content.</p>".to_string(),
        flags: ReloadFlags::enabled().with_form_submit(),
    })?;

    store.insert_article(ArticleRecord {
        id: 3,
        title: "About this demo".to_string(),
        css_id_attr: " id=\"about\"".to_string(),
        body_html: "<p>Articles can be re-rendered in isolation.</p>".to_string(),
        flags: ReloadFlags::enabled(),
    })?;

    store.insert_page(PageRecord {
        id: 1,
        slug: "home".to_string(),
        title: "Home".to_string(),
        layout_id: 1,
        elements: vec![
            ElementRef::new(ElementKind::Module, 1),
            ElementRef::new(ElementKind::Content, 2),
            ElementRef::new(ElementKind::Article, 3),
        ],
    });

    Ok(())
}

//! Fragment responder.
//!
//! Intercepts ajax reload requests early in page-layout construction and
//! answers with a JSON payload instead of a full page. The responder is a
//! decision function: `Ok(None)` hands control back to normal rendering,
//! `Ok(Some(payload))` is terminal and the surrounding pipeline
//! short-circuits on it. Collaborator failures are not mapped to the three
//! domain error codes; they bubble up to the host's generic error path.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::application::insert_tags::{InsertTagReplacer, ScriptTagRewriter, post_process_fragment};
use crate::application::marker::MarkerInjector;
use crate::application::render::{FragmentRequest, ReloadRegistry, RenderContext, RenderError};
use crate::application::repos::RepoError;
use crate::application::tokens::CsrfTokenProvider;
use crate::domain::elements::{ElementKind, ElementRef, REF_SEPARATOR};
use crate::domain::pages::LayoutRecord;

/// Request parameter carrying the reload identifier, query or body.
pub const PARAM_RELOAD_ELEMENT: &str = "ajax_reload_element";

/// Generic pagination parameter mapped onto the kind-specific one.
pub const PARAM_PAGE: &str = "page";

pub const ERROR_ELEMENT_NOT_FOUND: u8 = 1;
pub const ERROR_ELEMENT_AJAX_NOT_ALLOWED: u8 = 2;
pub const ERROR_ELEMENT_TYPE_UNKNOWN: u8 = 3;

/// Message table keyed by numeric error code. Placeholders are filled in
/// order of appearance.
const ERROR_MESSAGES: &[(u8, &str)] = &[
    (
        ERROR_ELEMENT_NOT_FOUND,
        "Could not find the reloadable element \"%s\"",
    ),
    (
        ERROR_ELEMENT_AJAX_NOT_ALLOWED,
        "The %s with ID %s is not allowed to be reloaded via ajax",
    ),
    (
        ERROR_ELEMENT_TYPE_UNKNOWN,
        "Unknown reloadable element type \"%s\"",
    ),
];

fn message_template(code: u8) -> &'static str {
    ERROR_MESSAGES
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, template)| *template)
        .unwrap_or("An unknown error occurred")
}

fn interpolate(template: &str, args: &[&str]) -> String {
    let mut out = template.to_string();
    for arg in args {
        out = out.replacen("%s", arg, 1);
    }
    out
}

/// The three terminal reload failures, each with a stable numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReloadError {
    #[error("element `{identifier}` not found")]
    ElementNotFound { identifier: String },
    #[error("{kind} {id} does not allow ajax reload")]
    AjaxNotAllowed { kind: ElementKind, id: i64 },
    #[error("unknown element kind token `{token}`")]
    TypeUnknown { token: String },
}

impl ReloadError {
    pub fn code(&self) -> u8 {
        match self {
            ReloadError::ElementNotFound { .. } => ERROR_ELEMENT_NOT_FOUND,
            ReloadError::AjaxNotAllowed { .. } => ERROR_ELEMENT_AJAX_NOT_ALLOWED,
            ReloadError::TypeUnknown { .. } => ERROR_ELEMENT_TYPE_UNKNOWN,
        }
    }

    /// Localized, parameter-interpolated message for the JSON payload.
    pub fn message(&self) -> String {
        let template = message_template(self.code());
        match self {
            ReloadError::ElementNotFound { identifier } => interpolate(template, &[identifier]),
            ReloadError::AjaxNotAllowed { kind, id } => {
                interpolate(template, &[kind.display_name(), &id.to_string()])
            }
            ReloadError::TypeUnknown { token } => interpolate(template, &[token]),
        }
    }
}

/// JSON body of a terminated reload request. Created once per intercepted
/// request, never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReloadPayload {
    Ok {
        status: &'static str,
        html: String,
    },
    Error {
        status: &'static str,
        error_code: u8,
        error: String,
    },
}

impl ReloadPayload {
    pub fn ok(html: String) -> Self {
        ReloadPayload::Ok {
            status: "ok",
            html,
        }
    }

    pub fn error(error: &ReloadError) -> Self {
        ReloadPayload::Error {
            status: "error",
            error_code: error.code(),
            error: error.message(),
        }
    }
}

/// Failures of collaborator services. Not part of the JSON error contract;
/// the HTTP layer maps these to its generic 500 path.
#[derive(Debug, Error)]
pub enum ReloadPipelineError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Per-request session state. Only the host quirk this component works
/// around is modeled: a stale login error that would otherwise surface in
/// the re-rendered fragment.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    pub login_error: Option<String>,
}

impl SessionState {
    pub fn clear_login_error(&mut self) {
        self.login_error = None;
    }
}

/// Incoming request as the responder sees it: ajax flag, canonical URL and
/// the merged query/body parameter set handed to rendering.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    is_ajax: bool,
    url: Url,
    params: Vec<(String, String)>,
}

impl RequestEnvelope {
    pub fn new(is_ajax: bool, url: Url, body_params: Vec<(String, String)>) -> Self {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        params.extend(body_params);
        Self {
            is_ajax,
            url,
            params,
        }
    }

    pub fn is_ajax(&self) -> bool {
        self.is_ajax
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_param_if_absent(&mut self, name: &str, value: &str) {
        if self.param(name).is_none() {
            self.params.push((name.to_string(), value.to_string()));
        }
    }

    /// Remove a parameter from the parsed set and from the canonical URL,
    /// so it cannot leak into any URL generated during rendering.
    pub fn strip_param(&mut self, name: &str) -> Option<String> {
        let found = self.param(name).map(str::to_string);
        if found.is_none() {
            return None;
        }
        self.params.retain(|(candidate, _)| candidate != name);

        let remaining: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(candidate, _)| candidate != name)
            .map(|(n, v)| (n.into_owned(), v.into_owned()))
            .collect();
        if remaining.is_empty() {
            self.url.set_query(None);
        } else {
            self.url
                .query_pairs_mut()
                .clear()
                .extend_pairs(remaining.iter().map(|(n, v)| (n.as_str(), v.as_str())));
        }
        found
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sanitized path plus query, the form links are generated from.
    pub fn request_url(&self) -> String {
        match self.url.query() {
            Some(query) if !query.is_empty() => format!("{}?{}", self.url.path(), query),
            _ => self.url.path().to_string(),
        }
    }
}

pub struct FragmentResponder {
    registry: ReloadRegistry,
    marker: Arc<MarkerInjector>,
    tokens: Arc<CsrfTokenProvider>,
    insert_tags: Arc<dyn InsertTagReplacer>,
    script_rewriter: Option<Arc<dyn ScriptTagRewriter>>,
    default_page_template: String,
}

impl FragmentResponder {
    pub fn new(
        registry: ReloadRegistry,
        marker: Arc<MarkerInjector>,
        tokens: Arc<CsrfTokenProvider>,
        insert_tags: Arc<dyn InsertTagReplacer>,
        script_rewriter: Option<Arc<dyn ScriptTagRewriter>>,
        default_page_template: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            marker,
            tokens,
            insert_tags,
            script_rewriter,
            default_page_template: default_page_template.into(),
        }
    }

    /// Intercept one request. `Ok(None)` means the request is not a reload
    /// request and normal rendering continues; `Ok(Some(_))` is terminal.
    pub async fn intercept(
        &self,
        envelope: &mut RequestEnvelope,
        session: &mut SessionState,
        layout: &LayoutRecord,
    ) -> Result<Option<ReloadPayload>, ReloadPipelineError> {
        if !envelope.is_ajax() || envelope.param(PARAM_RELOAD_ELEMENT).is_none() {
            return Ok(None);
        }

        // Present, checked above
        let raw = match envelope.strip_param(PARAM_RELOAD_ELEMENT) {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match self.reload(&raw, envelope, session, layout).await? {
            Ok(html) => {
                counter!("frammento_reload_ok_total").increment(1);
                debug!(
                    target = "frammento::reload",
                    identifier = %raw,
                    "fragment reload succeeded"
                );
                Ok(Some(ReloadPayload::ok(html)))
            }
            Err(error) => {
                counter!("frammento_reload_error_total").increment(1);
                warn!(
                    target = "frammento::reload",
                    identifier = %raw,
                    error_code = error.code(),
                    error = %error,
                    "fragment reload rejected"
                );
                Ok(Some(ReloadPayload::error(&error)))
            }
        }
    }

    async fn reload(
        &self,
        raw: &str,
        envelope: &mut RequestEnvelope,
        session: &mut SessionState,
        layout: &LayoutRecord,
    ) -> Result<Result<String, ReloadError>, ReloadPipelineError> {
        let (token, rest) = raw.split_once(REF_SEPARATOR).unwrap_or((raw, ""));
        let Some(kind) = ElementKind::from_token(token) else {
            return Ok(Err(ReloadError::TypeUnknown {
                token: token.to_string(),
            }));
        };

        // A malformed id can never resolve; fold it into the not-found branch
        // with the raw identifier preserved for the message.
        let Some(id) = rest.parse::<i64>().ok() else {
            return Ok(Err(ReloadError::ElementNotFound {
                identifier: raw.to_string(),
            }));
        };

        let page_param = kind.page_param(id);
        if let Some(generic) = envelope.param(PARAM_PAGE).map(str::to_string) {
            envelope.set_param_if_absent(&page_param, &generic);
        }
        let page = envelope
            .param(&page_param)
            .and_then(|value| value.parse::<u32>().ok());

        let Some(element) = self.registry.strategy(kind).resolve(id).await? else {
            return Ok(Err(ReloadError::ElementNotFound {
                identifier: raw.to_string(),
            }));
        };

        if !element.flags().allow_ajax_reload {
            return Ok(Err(ReloadError::AjaxNotAllowed { kind, id }));
        }

        // Stale login errors from the host session would otherwise leak into
        // the re-rendered fragment.
        session.clear_login_error();

        let context = RenderContext::for_layout(layout, &self.default_page_template);
        let mut attributes = element.css_id_attr().to_string();
        attributes.push_str(&self.marker.data_attributes(
            ElementRef::new(kind, id),
            element.flags().ajax_reload_form_submit,
        ));

        let request = FragmentRequest {
            context,
            page,
            request_url: envelope.request_url(),
            attributes,
        };

        let html = element.render(&request)?;
        let html = post_process_fragment(
            html,
            self.insert_tags.as_ref(),
            self.tokens.token(),
            self.script_rewriter.as_ref(),
        );

        Ok(Ok(html))
    }
}

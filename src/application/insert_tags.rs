//! Insert-tag replacement and fragment post-processing.
//!
//! Insert tags are shortcode-like placeholders (`{{date}}`, `{{link::home}}`)
//! resolved by a shared replacer after rendering. Authors escape literal
//! braces as `[{]` / `[}]`; those markers are restored last so the replacer
//! never sees them as tags.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::tokens::REQUEST_TOKEN_PLACEHOLDER;

pub const ESCAPED_OPEN_BRACES: &str = "[{]";
pub const ESCAPED_CLOSE_BRACES: &str = "[}]";

/// Shared insert-tag replacer. Unknown tags are passed through untouched.
pub trait InsertTagReplacer: Send + Sync {
    fn replace(&self, html: &str) -> String;
}

/// Rewrites deferred script-tag placeholders into final script tags.
/// Optional capability; older hosts ship without it.
pub trait ScriptTagRewriter: Send + Sync {
    fn rewrite(&self, html: &str) -> String;
}

/// Replacer backed by a static tag table.
#[derive(Debug, Default)]
pub struct StaticInsertTags {
    tags: HashMap<String, String>,
}

impl StaticInsertTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }
}

impl InsertTagReplacer for StaticInsertTags {
    fn replace(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut rest = html;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let name = &after[..end];
                    match self.tags.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("{{");
                            out.push_str(name);
                            out.push_str("}}");
                        }
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    // Unterminated tag, emit verbatim
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Rewrites `<script data-deferred-src="...">` placeholders emitted by the
/// body collection into plain script tags.
#[derive(Debug, Default)]
pub struct DeferredScriptRewriter;

impl ScriptTagRewriter for DeferredScriptRewriter {
    fn rewrite(&self, html: &str) -> String {
        html.replace("<script data-deferred-src=", "<script src=")
    }
}

/// Post-process a rendered fragment before it is emitted as JSON.
///
/// Order matters: insert tags first, then any request-token residue, then
/// literal brace restoration, and the script rewrite last (only when the
/// capability is configured).
pub fn post_process_fragment(
    html: String,
    insert_tags: &dyn InsertTagReplacer,
    live_token: &str,
    script_rewriter: Option<&Arc<dyn ScriptTagRewriter>>,
) -> String {
    let replaced = insert_tags.replace(&html);
    let replaced = replaced.replace(REQUEST_TOKEN_PLACEHOLDER, live_token);
    let replaced = replaced
        .replace(ESCAPED_OPEN_BRACES, "{{")
        .replace(ESCAPED_CLOSE_BRACES, "}}");

    match script_rewriter {
        Some(rewriter) => rewriter.rewrite(&replaced),
        None => replaced,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        DeferredScriptRewriter, InsertTagReplacer, ScriptTagRewriter, StaticInsertTags,
        post_process_fragment,
    };

    #[test]
    fn known_tags_are_replaced_and_unknown_tags_survive() {
        let tags = StaticInsertTags::new().with_tag("site_name", "Example");
        let out = tags.replace("<p>{{site_name}} and {{mystery}}</p>");
        assert_eq!(out, "<p>Example and {{mystery}}</p>");
    }

    #[test]
    fn unterminated_tag_is_emitted_verbatim() {
        let tags = StaticInsertTags::new().with_tag("a", "b");
        assert_eq!(tags.replace("x {{a"), "x {{a");
    }

    #[test]
    fn request_token_residue_gets_the_live_token() {
        let tags = StaticInsertTags::new();
        let out = post_process_fragment(
            r#"<input value="{{request_token}}">"#.to_string(),
            &tags,
            "tok123",
            None,
        );
        assert_eq!(out, r#"<input value="tok123">"#);
    }

    #[test]
    fn escaped_braces_are_restored_to_literals() {
        let tags = StaticInsertTags::new().with_tag("date", "2024");
        let out = post_process_fragment(
            "{{date}} [{]date[}]".to_string(),
            &tags,
            "tok",
            None,
        );
        assert_eq!(out, "2024 {{date}}");
    }

    #[test]
    fn deferred_scripts_are_rewritten_when_capability_exists() {
        let tags = StaticInsertTags::new();
        let rewriter: Arc<dyn ScriptTagRewriter> = Arc::new(DeferredScriptRewriter);
        let out = post_process_fragment(
            r#"<script data-deferred-src="/js/app.js"></script>"#.to_string(),
            &tags,
            "tok",
            Some(&rewriter),
        );
        assert_eq!(out, r#"<script src="/js/app.js"></script>"#);
    }
}

//! Server-rendered page templates.
//!
//! Templates are embedded at build time and compiled into a single shared
//! minijinja environment on first use.

use axum::http::StatusCode;
use axum::response::Html;
use minijinja::Environment;
use once_cell::sync::Lazy;
use rust_embed::RustEmbed;

use crate::errors::Error;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

static ENVIRONMENT: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    // Same encoder the handlers use for redirect targets, so template links
    // and handler-built URLs agree on the escaping
    env.add_filter("urlencode", |value: String| urlencoding::encode(&value).into_owned());
    for name in Templates::iter() {
        let Some(file) = Templates::get(name.as_ref()) else {
            continue;
        };
        let source = String::from_utf8_lossy(&file.data).into_owned();
        env.add_template_owned(name, source).expect("embedded template failed to parse");
    }
    env
});

/// Render a named template to an HTML response.
pub fn render(name: &str, ctx: minijinja::Value) -> Result<Html<String>, Error> {
    let template = ENVIRONMENT.get_template(name).map_err(|e| Error::Internal {
        operation: format!("load template {name}: {e}"),
    })?;

    let body = template.render(ctx).map_err(|e| Error::Internal {
        operation: format!("render template {name}: {e}"),
    })?;

    Ok(Html(body))
}

/// Error page used by the `Error` response conversion.
pub fn render_error_page(status: StatusCode, message: &str) -> Result<Html<String>, Error> {
    render(
        "error.html",
        minijinja::context! {
            status => status.as_u16(),
            reason => status.canonical_reason().unwrap_or("Error"),
            message => message,
        },
    )
}

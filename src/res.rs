use axum::{debug_handler, http::{header, StatusCode}, response::{Html, IntoResponse, Response}};
use time::OffsetDateTime;
use tower_sessions::Session;

use crate::{db::User, session, AppResult};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

#[debug_handler]
pub async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], include_res!(str, "/style.css"))
}

#[debug_handler]
pub async fn default_avatar() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/svg+xml")], include_res!(bytes, "/avatar.svg"))
}

pub fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "You are not allowed to do that!!!").into_response()
}

/// Escapes text for HTML. Braces are encoded too, so user text can never
/// spell a `{placeholder}` that a later template substitution would expand.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            c => out.push(c),
        }
    }
    out
}

/// Percent-encodes a value for use in a query string. `/` is left as is.
pub fn url_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// Renders a message body. Raw HTML in the source is shown as text.
pub fn markdown(source: &str) -> String {
    use pulldown_cmark::{Event, Options, Parser};

    let parser = Parser::new_ext(source, Options::ENABLE_STRIKETHROUGH)
        .map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            _ => event,
        });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output.replace('{', "&#123;").replace('}', "&#125;")
}

pub fn ago(then: OffsetDateTime) -> String {
    let seconds = (OffsetDateTime::now_utc() - then).whole_seconds().max(0);
    let (n, unit) = match seconds {
        0..60 => return "just now".to_owned(),
        60..3_600 => (seconds / 60, "minute"),
        3_600..86_400 => (seconds / 3_600, "hour"),
        86_400..2_592_000 => (seconds / 86_400, "day"),
        2_592_000..31_536_000 => (seconds / 2_592_000, "month"),
        _ => (seconds / 31_536_000, "year"),
    };
    format!("{n} {unit}{} ago", if n == 1 { "" } else { "s" })
}

/// Wraps page content in the site layout, draining any pending flash messages.
pub async fn page(session: &Session, viewer: Option<&User>, title: &str, content: &str) -> AppResult<Response> {
    let flashes: String = session::take_flashes(session)
        .await?
        .iter()
        .map(|message| format!(r#"<li class="flash">{}</li>"#, escape(message)))
        .collect();

    let nav = match viewer {
        Some(user) => include_res!(str, "/pages/nav_user.html")
            .replace("{id}", &user.id.to_string())
            .replace("{avatar}", &escape(&user.avatar_url()))
            .replace("{username}", &escape(&user.username)),
        None => include_res!(str, "/pages/nav_guest.html").to_owned(),
    };

    Ok(Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{nav}", &nav)
            .replace("{flashes}", &flashes)
            .replace("{content}", content)
    ).into_response())
}

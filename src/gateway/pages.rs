//! HTML served to authenticated browsers.

use crate::auth::Identity;

/// Welcome page for `GET /tasks`.
pub fn render_welcome_page(identity: &Identity) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>Task manager - Welcome</title>
  </head>
  <body>
    <h1>Welcome to the task API</h1>
    <p>Authenticated user: <strong>{username}</strong> (id: {user_id})</p>
    <p>This page is still under construction.</p>
  </body>
</html>
"#,
        username = escape_html(&identity.username),
        user_id = identity.user_id,
    )
}

/// Minimal HTML escaping for text nodes and attribute values.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

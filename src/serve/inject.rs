//! Live-reload script injection.

use crate::embed::serve::HotreloadVars;

/// Inline `<script>` tag for the live-reload client.
pub fn script_tag(vars: &HotreloadVars) -> String {
    format!("<script>\n{}</script>\n", vars.render())
}

/// Insert `script` before the last `</body>`, or append it if there is none.
pub fn inject_script(content: &[u8], script: &str) -> Vec<u8> {
    // Byte pattern for </body> - most generators use lowercase
    const PATTERN: &[u8] = b"</body>";
    let script_bytes = script.as_bytes();

    let mut result = Vec::with_capacity(content.len() + script_bytes.len());
    match content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        Some(pos) => {
            result.extend_from_slice(&content[..pos]);
            result.extend_from_slice(script_bytes);
            result.extend_from_slice(&content[pos..]);
        }
        None => {
            result.extend_from_slice(content);
            result.extend_from_slice(script_bytes);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_before_body_close() {
        let out = inject_script(b"<html><body><p>x</p></body></html>", "<script></script>");
        assert_eq!(out, b"<html><body><p>x</p><script></script></body></html>");
    }

    #[test]
    fn test_inject_uses_last_body_close() {
        let html = b"<body><pre>&lt;/body&gt; </body></pre></BODY>";
        let out = inject_script(html, "S");
        assert!(out.ends_with(b"S</BODY>"));
    }

    #[test]
    fn test_inject_appends_without_body() {
        assert_eq!(inject_script(b"<p>fragment</p>", "S"), b"<p>fragment</p>S");
    }

    #[test]
    fn test_script_tag_connects_to_ws() {
        let tag = script_tag(&HotreloadVars::default());
        assert!(tag.starts_with("<script>"));
        assert!(tag.contains("new WebSocket"));
        assert!(tag.contains("\"/ws\""));
    }
}

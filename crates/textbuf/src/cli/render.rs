use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use textbufapp::buffer::TextFileBuffer;
use textbufapp::model::BufferStatus;
use textbufapp::store::backend::ContentBackend;

/// What `textbuf info` reports about a buffer.
#[derive(Debug, Serialize)]
pub struct BufferInfo {
    pub path: String,
    pub charset: String,
    pub explicit_encoding: Option<String>,
    pub byte_order_mark: bool,
    pub malformed_input: bool,
    pub content_type: Option<String>,
    pub modified: Option<DateTime<Utc>>,
    pub chars: usize,
    pub lines: usize,
    pub status: String,
    pub error: Option<String>,
}

impl BufferInfo {
    pub fn from_buffer<B: ContentBackend>(buffer: &TextFileBuffer<B>) -> Self {
        let (chars, lines) = buffer
            .document()
            .map(|d| d.with_text_ref(|t| (t.chars().count(), t.lines().count())))
            .unwrap_or((0, 0));
        let encoding = buffer.encoding();
        let (status, error) = match buffer.status() {
            BufferStatus::Ok => ("ok".to_string(), None),
            BufferStatus::Error(message) => ("error".to_string(), Some(message)),
        };
        Self {
            path: buffer.location().to_string(),
            charset: encoding.charset().to_string(),
            explicit_encoding: encoding.explicit_override.clone(),
            byte_order_mark: encoding.has_byte_order_mark,
            malformed_input: buffer.has_malformed_input(),
            content_type: buffer.content_type(),
            modified: buffer.modification_stamp(),
            chars,
            lines,
            status,
            error,
        }
    }
}

pub fn render_info(info: &BufferInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", style(&info.path).bold()));
    let rows = [
        ("charset", info.charset.clone()),
        ("bom", if info.byte_order_mark { "yes" } else { "no" }.to_string()),
        (
            "content type",
            info.content_type.clone().unwrap_or_else(|| "-".to_string()),
        ),
        (
            "modified",
            info.modified
                .map(|m| m.to_rfc3339())
                .unwrap_or_else(|| "(not on disk)".to_string()),
        ),
        ("size", format!("{} chars, {} lines", info.chars, info.lines)),
    ];
    for (label, value) in rows {
        out.push_str(&format!("  {}{}\n", style(format!("{:<13}", label)).dim(), value));
    }
    if info.malformed_input {
        let warning = format!("not valid {}, undecodable bytes shown as U+FFFD", info.charset);
        out.push_str(&format!(
            "  {}{}\n",
            style(format!("{:<13}", "warning")).dim(),
            style(warning).yellow()
        ));
    }
    let status = match &info.error {
        None => style("ok".to_string()).green(),
        Some(message) => style(message.clone()).red(),
    };
    out.push_str(&format!("  {}{}\n", style(format!("{:<13}", "status")).dim(), status));
    out
}

pub fn render_info_json(info: &BufferInfo) -> serde_json::Result<String> {
    serde_json::to_string_pretty(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BufferInfo {
        BufferInfo {
            path: "/tmp/a.txt".to_string(),
            charset: "UTF-8".to_string(),
            explicit_encoding: None,
            byte_order_mark: true,
            malformed_input: false,
            content_type: Some("text/plain".to_string()),
            modified: None,
            chars: 4,
            lines: 1,
            status: "ok".to_string(),
            error: None,
        }
    }

    #[test]
    fn test_render_info_lists_fields() {
        console::set_colors_enabled(false);
        let out = render_info(&sample());
        assert!(out.starts_with("/tmp/a.txt\n"));
        assert!(out.contains("charset      UTF-8"));
        assert!(out.contains("bom          yes"));
        assert!(out.contains("(not on disk)"));
        assert!(out.contains("4 chars, 1 lines"));
        assert!(!out.contains("warning"));
    }

    #[test]
    fn test_render_info_warns_on_malformed_input() {
        console::set_colors_enabled(false);
        let info = BufferInfo {
            malformed_input: true,
            ..sample()
        };
        let out = render_info(&info);
        assert!(out.contains("warning      not valid UTF-8"));
    }

    #[test]
    fn test_render_info_json() {
        let json = render_info_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["charset"], "UTF-8");
        assert_eq!(value["byte_order_mark"], true);
        assert_eq!(value["status"], "ok");
    }
}

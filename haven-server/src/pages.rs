//! Server-rendered HTML for the chat form, the emotion report and errors.

use haven_core::Turn;

use crate::subsystems::report::EmotionReport;

const STYLE: &str = "body{font-family:sans-serif;max-width:720px;margin:2em auto;color:#222}\
.turn{border-bottom:1px solid #ddd;padding:.6em 0}\
.user{font-weight:bold}.bot{margin-top:.3em;white-space:pre-wrap}\
.meta{color:#777;font-size:.85em}\
table{border-collapse:collapse}td,th{padding:.3em .8em;border-bottom:1px solid #ddd;text-align:left}\
nav a{margin-right:1em}";

/// Escape text for HTML element and attribute content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
<nav><a href=\"/\">Chat</a><a href=\"/report\">Emotion report</a><a href=\"/reset\">Reset</a></nav>\n\
<h1>{title}</h1>\n{body}\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

pub fn render_home(turns: &[Turn]) -> String {
    let mut body = String::new();

    if turns.is_empty() {
        body.push_str("<p class=\"meta\">No messages yet. How are you feeling today?</p>\n");
    }

    for turn in turns {
        body.push_str(&format!(
            "<div class=\"turn\">\n<div class=\"user\">You: {user}</div>\n\
<div class=\"meta\">{time} · {label} ({score:.2})</div>\n\
<div class=\"bot\">Therapist: {bot}</div>\n</div>\n",
            user = escape_html(&turn.user_text),
            time = turn.timestamp_label(),
            label = escape_html(&turn.emotion_label),
            score = turn.emotion_score,
            bot = escape_html(&turn.bot_text),
        ));
    }

    body.push_str(
        "<form method=\"post\" action=\"/send\">\n\
<input type=\"text\" name=\"message\" autofocus required size=\"60\">\n\
<button type=\"submit\">Send</button>\n</form>",
    );

    layout("Therapist chat", &body)
}

pub fn render_report(report: &EmotionReport) -> String {
    let body = if report.is_empty() {
        "<p class=\"meta\">No conversation yet.</p>".to_string()
    } else {
        let rows: String = report
            .tallies
            .iter()
            .map(|t| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{:.0}%</td></tr>\n",
                    escape_html(&t.label),
                    t.count,
                    t.percent
                )
            })
            .collect();
        format!(
            "<table>\n<tr><th>Emotion</th><th>Messages</th><th>Share</th></tr>\n{rows}</table>\n\
<p class=\"meta\">{} messages in total.</p>",
            report.total
        )
    };
    layout("Emotion report", &body)
}

pub fn render_error(message: &str) -> String {
    layout(
        "Something went wrong",
        &format!(
            "<p>{}</p>\n<p><a href=\"/\">Back to the chat</a></p>",
            escape_html(message)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::EmotionScore;
    use std::collections::HashMap;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_home_renders_escaped_turns() {
        let turns = vec![Turn::new(
            "<script>alert(1)</script>",
            &EmotionScore::new("fear", 0.42),
            "Breathe slowly.",
        )];
        let html = render_home(&turns);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("fear (0.42)"));
        assert!(html.contains("Therapist: Breathe slowly."));
        assert!(html.contains("action=\"/send\""));
    }

    #[test]
    fn test_report_lists_counts() {
        let report = EmotionReport::from_counts(HashMap::from([
            ("joy".to_string(), 3),
            ("sadness".to_string(), 1),
        ]));
        let html = render_report(&report);
        assert!(html.contains("<td>joy</td><td>3</td><td>75%</td>"));
        assert!(html.contains("4 messages in total"));
    }

    #[test]
    fn test_empty_report_message() {
        let html = render_report(&EmotionReport::default());
        assert!(html.contains("No conversation yet."));
    }
}

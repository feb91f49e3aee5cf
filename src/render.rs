// Terminal presentation of answers and excerpts.

use chrono::{DateTime, Local, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::knowledge::ranking::Excerpt;
use crate::knowledge::session::Answer;

const RULE_WIDTH: usize = 60;

const BOLD: &str = "\x1b[1m";
const CYAN: &str = "\x1b[36m";
const GREY: &str = "\x1b[90m";
const BADGE: &str = "\x1b[30;46m";
const RESET: &str = "\x1b[0m";

static CITATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[Document:\s*([^\]]+)\]").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)\*\s+(.+)$").unwrap());

struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn badge(&self, name: &str) -> String {
        if self.color {
            format!("{} {} {}", BADGE, name.trim(), RESET)
        } else {
            format!("[{}]", name.trim())
        }
    }
}

fn render_line(line: &str, style: &Style) -> String {
    let trimmed = line.trim_start();
    let line = if let Some(rest) = trimmed.strip_prefix("###") {
        style.paint(BOLD, rest.trim())
    } else if let Some(rest) = trimmed.strip_prefix("##") {
        let title = rest.trim();
        let underline = "=".repeat(title.chars().count());
        format!("{}\n{}", style.paint(&format!("{}{}", BOLD, CYAN), title), underline)
    } else if let Some(caps) = BULLET.captures(line) {
        format!("{}• {}", &caps[1], &caps[2])
    } else {
        line.to_string()
    };

    CITATION
        .replace_all(&line, |caps: &Captures| style.badge(&caps[1]))
        .into_owned()
}

/// Formats an answer for the terminal: header, stats line, then the body.
pub fn render_answer(answer: &Answer, color: bool) -> String {
    let style = Style { color };
    let local: DateTime<Local> = answer.answered_at.with_timezone(&Local);

    let mut out = String::new();
    out.push_str(&style.paint(BOLD, &format!("Q: {}", answer.query)));
    out.push_str("  ");
    out.push_str(&style.paint(GREY, &format!("[{}]", answer.model)));
    out.push('\n');
    out.push_str(&style.paint(
        GREY,
        &format!(
            "{} document(s) analyzed · {}",
            answer.documents.len(),
            local.format("%H:%M:%S")
        ),
    ));
    out.push('\n');
    out.push_str(&"─".repeat(RULE_WIDTH));
    out.push('\n');

    for line in answer.text.lines() {
        out.push_str(&render_line(line, &style));
        out.push('\n');
    }
    out
}

/// Formats ranked excerpts, best first.
pub fn render_excerpts(excerpts: &[Excerpt], color: bool) -> String {
    let style = Style { color };
    if excerpts.is_empty() {
        return "No relevant documents found.\n".to_string();
    }

    let mut out = String::new();
    for (rank, excerpt) in excerpts.iter().enumerate() {
        out.push_str(&style.paint(
            BOLD,
            &format!("{}. {} ({})", rank + 1, excerpt.name, excerpt.kind.label()),
        ));
        out.push_str(&style.paint(GREY, &format!("  score {}", excerpt.score)));
        out.push('\n');
        out.push_str(&excerpt.snippet);
        out.push_str("\n\n");
    }
    out
}

/// Plain-text export of a question and its answer.
pub fn export_text(answer: &Answer) -> String {
    format!("Question: {}\n\nAnswer:\n{}", answer.query, answer.text)
}

/// Default export file name, e.g. `answer_1718000000000.txt`.
pub fn default_export_name(now: DateTime<Utc>) -> String {
    format!("answer_{}.txt", now.timestamp_millis())
}

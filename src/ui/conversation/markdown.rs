//! Turns message content into wrapped, styled terminal lines.
//!
//! Markdown goes through pulldown-cmark. Math (`$…$`, `$$…$$`, `\(…\)`,
//! `\[…\]`) is lifted out before parsing and put back verbatim, so LaTeX
//! escapes and underscores survive untouched.

use crate::config::RenderMode;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

const MATH_OPEN: char = '\u{E000}';
const MATH_CLOSE: char = '\u{E001}';

/// Render `content` into lines no wider than `width` columns.
pub fn render_content(content: &str, mode: RenderMode, width: usize, base: Style) -> Vec<Line<'static>> {
    match mode {
        RenderMode::Plain => content
            .split('\n')
            .flat_map(|line| wrap_spans(vec![Span::styled(line.to_string(), base)], width))
            .collect(),
        RenderMode::Markdown => MarkdownRenderer::new(width, base).render(content),
    }
}

fn math_style() -> Style {
    Style::default().fg(Color::Magenta)
}

/// Replace math regions with placeholder tokens; returns the rewritten text
/// and the lifted regions in order.
fn protect_math(content: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(content.len());
    let mut regions = Vec::new();
    let mut rest = content;

    while !rest.is_empty() {
        if let Some((region, consumed)) = match_math(rest) {
            out.push(MATH_OPEN);
            out.push_str(&regions.len().to_string());
            out.push(MATH_CLOSE);
            regions.push(region.to_string());
            rest = &rest[consumed..];
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    (out, regions)
}

/// If `text` starts with a closed math region, return it and its byte length.
fn match_math(text: &str) -> Option<(&str, usize)> {
    let delimiters = [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")];

    for (open, close) in delimiters {
        if !text.starts_with(open) {
            continue;
        }
        let body = &text[open.len()..];
        let end = body.find(close)?;
        let inner = &body[..end];
        if inner.trim().is_empty() || inner.contains("\n\n") {
            return None;
        }
        // Single dollars hug their content and stay on one line, so prices
        // like "$5 and $6" are left alone.
        if open == "$"
            && (inner.contains('\n') || inner.starts_with(char::is_whitespace) || inner.ends_with(char::is_whitespace))
        {
            return None;
        }
        let consumed = open.len() + end + close.len();
        return Some((&text[..consumed], consumed));
    }

    None
}

/// Split text on math placeholders, styling restored regions.
fn restore_math(text: &str, regions: &[String], style: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(MATH_OPEN) {
        let Some(len) = rest[start..].find(MATH_CLOSE) else {
            break;
        };
        let index = rest[start + MATH_OPEN.len_utf8()..start + len]
            .parse::<usize>()
            .ok()
            .and_then(|i| regions.get(i));

        if start > 0 {
            spans.push(Span::styled(rest[..start].to_string(), style));
        }
        match index {
            Some(region) => spans.push(Span::styled(region.clone(), math_style())),
            None => spans.push(Span::styled(
                rest[start..start + len + MATH_CLOSE.len_utf8()].to_string(),
                style,
            )),
        }
        rest = &rest[start + len + MATH_CLOSE.len_utf8()..];
    }

    if !rest.is_empty() {
        spans.push(Span::styled(rest.to_string(), style));
    }
    spans
}

/// Same as `restore_math` but flattened to a string, for code spans.
fn restore_math_plain(text: &str, regions: &[String]) -> String {
    restore_math(text, regions, Style::default())
        .into_iter()
        .map(|span| span.content.into_owned())
        .collect()
}

struct MarkdownRenderer {
    width: usize,
    base: Style,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
    regions: Vec<String>,
}

impl MarkdownRenderer {
    fn new(width: usize, base: Style) -> Self {
        Self {
            width,
            base,
            lines: Vec::new(),
            current: Vec::new(),
            styles: vec![base],
            lists: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
            regions: Vec::new(),
        }
    }

    fn render(mut self, content: &str) -> Vec<Line<'static>> {
        let (protected, regions) = protect_math(content);
        self.regions = regions;

        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);

        for event in Parser::new_ext(&protected, options) {
            self.handle(event);
        }
        self.flush_line();

        while self.lines.last().is_some_and(|line| line.spans.is_empty()) {
            self.lines.pop();
        }
        if self.lines.is_empty() {
            self.lines.push(Line::default());
        }
        self.lines
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or(self.base)
    }

    fn push_style(&mut self, patch: Style) {
        let next = self.style().patch(patch);
        self.styles.push(next);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn line_prefix(&self) -> Option<Span<'static>> {
        if self.quote_depth == 0 {
            return None;
        }
        Some(Span::styled(
            "│ ".repeat(self.quote_depth),
            Style::default().fg(Color::DarkGray),
        ))
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = Vec::new();
        if let Some(prefix) = self.line_prefix() {
            spans.push(prefix);
        }
        spans.append(&mut self.current);
        self.lines.extend(wrap_spans(spans, self.width));
    }

    fn blank_line(&mut self) {
        self.flush_line();
        if self.lines.last().is_some_and(|line| !line.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn push_text(&mut self, text: &str) {
        let style = self.style();
        let spans = restore_math(text, &self.regions, style);
        self.current.extend(spans);
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Paragraph) => {}
            Event::End(TagEnd::Paragraph) => self.blank_line(),
            Event::Start(Tag::Heading { level, .. }) => {
                self.blank_line();
                let mut style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
                if level == HeadingLevel::H1 {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                self.push_style(style);
            }
            Event::End(TagEnd::Heading { .. }) => {
                self.pop_style();
                self.blank_line();
            }
            Event::Start(Tag::Emphasis) => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Event::Start(Tag::Strong) => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Event::Start(Tag::Strikethrough) => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Event::End(TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough) => self.pop_style(),
            Event::Start(Tag::BlockQuote { .. }) => {
                self.flush_line();
                self.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote { .. }) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Event::Start(Tag::CodeBlock { .. }) => {
                self.blank_line();
                self.in_code_block = true;
                self.push_style(Style::default().fg(Color::Yellow));
            }
            Event::End(TagEnd::CodeBlock { .. }) => {
                self.flush_line();
                self.in_code_block = false;
                self.pop_style();
                self.blank_line();
            }
            Event::Start(Tag::List(start)) => {
                self.flush_line();
                self.lists.push(start);
            }
            Event::End(TagEnd::List { .. }) => {
                self.flush_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            Event::Start(Tag::Item) => {
                self.flush_line();
                let depth = self.lists.len().saturating_sub(1);
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let label = format!("{}. ", n);
                        *n += 1;
                        label
                    }
                    _ => "• ".to_string(),
                };
                self.current.push(Span::styled(
                    format!("{}{}", "  ".repeat(depth), bullet),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Event::End(TagEnd::Item) => self.flush_line(),
            Event::Text(text) => {
                if self.in_code_block {
                    let style = self.style();
                    let mut parts = text.split('\n').peekable();
                    while let Some(part) = parts.next() {
                        let restored = restore_math_plain(part, &self.regions);
                        if !restored.is_empty() {
                            self.current.push(Span::styled(restored, style));
                        }
                        if parts.peek().is_some() {
                            if self.current.is_empty() {
                                self.current.push(Span::raw(""));
                            }
                            self.flush_line();
                        }
                    }
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(code) => {
                let restored = restore_math_plain(&code, &self.regions);
                self.current.push(Span::styled(
                    restored,
                    self.style().patch(Style::default().fg(Color::Yellow)),
                ));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            Event::SoftBreak => self.current.push(Span::styled(" ", self.style())),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.blank_line();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(self.width.clamp(3, 40)),
                    Style::default().fg(Color::DarkGray),
                )));
                self.lines.push(Line::default());
            }
            Event::End(TagEnd::TableRow | TagEnd::TableHead) => self.flush_line(),
            Event::Start(Tag::TableCell) => {
                if !self.current.is_empty() {
                    self.current.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
                }
            }
            Event::TaskListMarker(done) => {
                self.current.push(Span::raw(if done { "[x] " } else { "[ ] " }));
            }
            _ => {}
        }
    }
}

/// Word-wrap styled spans into lines of at most `width` characters.
pub fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return vec![Line::from(spans)];
    }

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0usize;

    for span in spans {
        let style = span.style;
        for word in span.content.split_inclusive(' ') {
            let mut word = word.to_string();
            let mut len = word.chars().count();

            if used + len > width && used > 0 {
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
                let trimmed = word.trim_start().to_string();
                len = trimmed.chars().count();
                word = trimmed;
            }

            // Hard-break words longer than a full line.
            while len > width {
                let head: String = word.chars().take(width - used).collect();
                let tail: String = word.chars().skip(width - used).collect();
                current.push(Span::styled(head, style));
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
                word = tail;
                len = word.chars().count();
            }

            if !word.is_empty() {
                used += len;
                match current.last_mut() {
                    Some(last) if last.style == style => last.content.to_mut().push_str(&word),
                    _ => current.push(Span::styled(word, style)),
                }
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

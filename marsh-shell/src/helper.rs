//! Line editor integration: adapts the core's highlighting and completion to
//! rustyline's callback traits.

use std::borrow::Cow;

use marsh_core::highlight::{Color, Style, Styler};
use rustyline::Helper;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::Validator;

pub(crate) struct MarshHelper {
    pub hostname: String,
}

impl Completer for MarshHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, candidates) = marsh_core::completion::complete_line(line, pos);

        let pairs = candidates
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.clone(),
                replacement: candidate,
            })
            .collect();

        Ok((start, pairs))
    }
}

impl Highlighter for MarshHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let Some(node) = marsh_parser::parse(line) else {
            return Cow::Borrowed(line);
        };

        let mut styler = AnsiStyler::new(line);
        marsh_core::highlight::highlight(&node, &self.hostname, &mut styler);
        Cow::Owned(styler.render())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

impl Hinter for MarshHelper {
    type Hint = String;
}

impl Validator for MarshHelper {}
impl Helper for MarshHelper {}

/// Accumulates style spans and renders the line with ANSI escapes.
struct AnsiStyler<'a> {
    line: &'a str,
    byte_styles: Vec<Style>,
}

impl<'a> AnsiStyler<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            line,
            byte_styles: vec![Style::default(); line.len()],
        }
    }

    fn render(&self) -> String {
        let mut rendered = String::with_capacity(self.line.len() * 2);
        let mut active: Option<&Style> = None;

        for (offset, c) in self.line.char_indices() {
            let style = &self.byte_styles[offset];
            if active != Some(style) {
                if let Some(previous) = active {
                    close_span(&mut rendered, previous);
                }
                if let Some(target) = &style.hyperlink {
                    rendered.push_str(&format!("\x1b]8;;{target}\x1b\\"));
                }
                rendered.push_str(&ansi_prefix(style));
                active = Some(style);
            }
            rendered.push(c);
        }

        if let Some(previous) = active {
            close_span(&mut rendered, previous);
        }

        rendered
    }
}

impl Styler for AnsiStyler<'_> {
    fn stylize(&mut self, range: std::ops::Range<usize>, style: Style) {
        let end = range.end.min(self.byte_styles.len());
        for byte_style in &mut self.byte_styles[range.start.min(end)..end] {
            if style.foreground.is_some() {
                byte_style.foreground = style.foreground;
            }
            byte_style.bold |= style.bold;
            byte_style.underline |= style.underline;
            if style.hyperlink.is_some() {
                byte_style.hyperlink = style.hyperlink.clone();
            }
        }
    }
}

fn close_span(rendered: &mut String, style: &Style) {
    rendered.push_str("\x1b[0m");
    if style.hyperlink.is_some() {
        rendered.push_str("\x1b]8;;\x1b\\");
    }
}

fn ansi_prefix(style: &Style) -> String {
    let mut prefix = String::new();

    if style.bold {
        prefix.push_str("\x1b[1m");
    }
    if style.underline {
        prefix.push_str("\x1b[4m");
    }

    match style.foreground {
        Some(Color::Red) => prefix.push_str("\x1b[31m"),
        Some(Color::Green) => prefix.push_str("\x1b[32m"),
        Some(Color::Yellow) => prefix.push_str("\x1b[33m"),
        Some(Color::Blue) => prefix.push_str("\x1b[34m"),
        Some(Color::Cyan) => prefix.push_str("\x1b[36m"),
        Some(Color::Rgb(r, g, b)) => {
            prefix.push_str(&format!("\x1b[38;2;{r};{g};{b}m"));
        }
        None => {}
    }

    prefix
}

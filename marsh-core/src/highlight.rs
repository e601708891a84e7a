//! Syntax highlighting: walks an AST and reports style spans through the line
//! editor's stylize callback.

use std::ops::Range;
use std::path::Path;

use marsh_parser::ast::{Node, NodeKind};

/// A foreground color the line editor can render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Yellow.
    Yellow,
    /// Blue.
    Blue,
    /// Cyan.
    Cyan,
    /// A 24-bit color.
    Rgb(u8, u8, u8),
}

/// A style applied to a span of the input line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Style {
    /// The foreground color, if any.
    pub foreground: Option<Color>,
    /// Whether the span is rendered bold.
    pub bold: bool,
    /// Whether the span is underlined.
    pub underline: bool,
    /// A hyperlink target attached to the span.
    pub hyperlink: Option<String>,
}

impl Style {
    fn foreground(color: Color) -> Self {
        Self {
            foreground: Some(color),
            ..Self::default()
        }
    }

    fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    fn hyperlink(target: String) -> Self {
        Self {
            hyperlink: Some(target),
            ..Self::default()
        }
    }
}

/// The stylize callback surface a line editor provides.
pub trait Styler {
    /// Applies the given style to a byte range of the input line.
    fn stylize(&mut self, range: Range<usize>, style: Style);
}

const VARIABLE_COLOR: Color = Color::Rgb(214, 112, 214);
const REDIRECTION_COLOR: Color = Color::Rgb(0x87, 0x9b, 0xcd);
const CLOSE_TERMINATOR_COLOR: Color = Color::Rgb(0xff, 0x7e, 0x00);
const COMMENT_COLOR: Color = Color::Rgb(150, 150, 150);

/// Walks the tree, reporting style spans for the line editor to render. The
/// hostname is used for `file://` hyperlinks on existing paths.
pub fn highlight(node: &Node, hostname: &str, styler: &mut dyn Styler) {
    highlight_node(
        node,
        hostname,
        styler,
        Metadata {
            is_first_in_list: true,
        },
    );
}

#[derive(Clone, Copy)]
struct Metadata {
    is_first_in_list: bool,
}

#[allow(clippy::too_many_lines)]
fn highlight_node(node: &Node, hostname: &str, styler: &mut dyn Styler, metadata: Metadata) {
    let range = node.position().start_offset..node.position().end_offset;

    match node.kind() {
        NodeKind::Bareword(text) => {
            if metadata.is_first_in_list {
                styler.stylize(range, Style::bold());
                return;
            }

            if let Some(option_style) = option_style(text, &range) {
                styler.stylize(option_style.0, option_style.1);
            }

            if Path::new(text).exists() {
                let target = format!("file://{hostname}{}", absolute_path_text(text));
                styler.stylize(range, Style::hyperlink(target));
            }
        }

        NodeKind::StringLiteral(_) => {
            stylize_word(styler, range, Color::Yellow, metadata);
        }

        NodeKind::DoubleQuotedString(inner) => {
            stylize_word(styler, range, Color::Yellow, metadata);
            if let Some(inner) = inner {
                highlight_node(
                    inner,
                    hostname,
                    styler,
                    Metadata {
                        is_first_in_list: false,
                    },
                );
            }
        }

        NodeKind::Glob(_) => {
            stylize_word(styler, range, Color::Cyan, metadata);
        }

        NodeKind::SimpleVariable(_) | NodeKind::SpecialVariable(_) => {
            stylize_word(styler, range, VARIABLE_COLOR, metadata);
        }

        NodeKind::DynamicEvaluate(inner) => {
            styler.stylize(range, Style::foreground(Color::Yellow));
            highlight_node(inner, hostname, styler, metadata);
        }

        NodeKind::Execute {
            command,
            capture_stdout,
        } => {
            if *capture_stdout {
                styler.stylize(range, Style::foreground(Color::Green));
            }
            highlight_node(
                command,
                hostname,
                styler,
                Metadata {
                    is_first_in_list: true,
                },
            );
        }

        NodeKind::And(left, right) | NodeKind::Or(left, right) => {
            let first = Metadata {
                is_first_in_list: true,
            };
            highlight_node(left, hostname, styler, first);
            highlight_node(right, hostname, styler, first);
        }

        NodeKind::Sequence(left, right)
        | NodeKind::Pipe(left, right)
        | NodeKind::Juxtaposition(left, right)
        | NodeKind::StringPartCompose(left, right) => {
            highlight_node(left, hostname, styler, metadata);
            highlight_node(right, hostname, styler, metadata);
        }

        NodeKind::ListConcatenate(element, list) => {
            highlight_node(
                list,
                hostname,
                styler,
                Metadata {
                    is_first_in_list: false,
                },
            );
            highlight_node(element, hostname, styler, metadata);
        }

        NodeKind::CastToCommand(inner) | NodeKind::Background(inner) => {
            highlight_node(inner, hostname, styler, metadata);
        }

        NodeKind::CastToList(Some(inner)) => {
            highlight_node(inner, hostname, styler, metadata);
        }

        NodeKind::VariableDeclarations(decls) => {
            let value_metadata = Metadata {
                is_first_in_list: false,
            };
            for decl in decls {
                let name_end = decl.name.position().end_offset;
                styler.stylize(name_end..name_end + 1, Style::foreground(Color::Blue));
                highlight_node(&decl.value, hostname, styler, value_metadata);
            }
        }

        NodeKind::PathRedirection { path, .. } => {
            styler.stylize(range, Style::foreground(REDIRECTION_COLOR));
            highlight_node(
                path,
                hostname,
                styler,
                Metadata {
                    is_first_in_list: false,
                },
            );

            if let NodeKind::Bareword(text) = path.kind() {
                if Path::new(text).exists() {
                    let target = format!("file://{hostname}{}", absolute_path_text(text));
                    let path_range =
                        path.position().start_offset..path.position().end_offset;
                    styler.stylize(path_range, Style::hyperlink(target));
                }
            }
        }

        NodeKind::CloseFdRedirection(_) => {
            // The trailing terminator is colored separately from the fd digits.
            if range.len() > 1 {
                styler.stylize(
                    range.start..range.end - 1,
                    Style::foreground(REDIRECTION_COLOR),
                );
                styler.stylize(
                    range.end - 1..range.end,
                    Style::foreground(CLOSE_TERMINATOR_COLOR),
                );
            } else {
                styler.stylize(range, Style::foreground(REDIRECTION_COLOR));
            }
        }

        NodeKind::Fd2FdRedirection { .. } => {
            styler.stylize(range, Style::foreground(REDIRECTION_COLOR));
        }

        NodeKind::Comment(_) => {
            styler.stylize(range, Style::foreground(COMMENT_COLOR));
        }

        NodeKind::SyntaxError(_) => {
            styler.stylize(
                range,
                Style {
                    foreground: Some(Color::Red),
                    underline: true,
                    ..Style::default()
                },
            );
        }

        NodeKind::Tilde(_) | NodeKind::CastToList(None) => {}
    }
}

fn stylize_word(styler: &mut dyn Styler, range: Range<usize>, color: Color, metadata: Metadata) {
    let mut style = Style::foreground(color);
    style.bold = metadata.is_first_in_list;
    styler.stylize(range, style);
}

fn option_style(text: &str, range: &Range<usize>) -> Option<(Range<usize>, Style)> {
    if !text.starts_with('-') || text == "-" {
        return None;
    }

    if text == "--" {
        return Some((range.clone(), Style::foreground(Color::Green)));
    }

    if text.starts_with("--") {
        // Color a long option only up to its '=' when it carries a value.
        let option_len = text.find('=').map_or(text.len(), |index| index + 1);
        return Some((
            range.start..range.start + option_len,
            Style::foreground(Color::Cyan),
        ));
    }

    Some((range.clone(), Style::foreground(Color::Cyan)))
}

fn absolute_path_text(text: &str) -> String {
    if text.starts_with('/') {
        return text.to_owned();
    }

    match std::env::current_dir() {
        Ok(cwd) => cwd.join(text).to_string_lossy().to_string(),
        Err(_) => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingStyler {
        spans: Vec<(Range<usize>, Style)>,
    }

    impl Styler for RecordingStyler {
        fn stylize(&mut self, range: Range<usize>, style: Style) {
            self.spans.push((range, style));
        }
    }

    fn highlight_str(input: &str) -> Vec<(Range<usize>, Style)> {
        let node = marsh_parser::parse(input).unwrap();
        let mut styler = RecordingStyler::default();
        highlight(&node, "testhost", &mut styler);
        styler.spans
    }

    #[test]
    fn test_first_word_is_bold() {
        let spans = highlight_str("frobnicate now");
        assert!(
            spans
                .iter()
                .any(|(range, style)| *range == (0..10) && style.bold)
        );
    }

    #[test]
    fn test_options_are_colored() {
        let spans = highlight_str("ls -l --color=auto");
        assert!(spans.iter().any(|(range, style)| {
            *range == (3..5) && style.foreground == Some(Color::Cyan)
        }));
        // The long option is colored only through its '='.
        assert!(spans.iter().any(|(range, style)| {
            *range == (6..14) && style.foreground == Some(Color::Cyan)
        }));
    }

    #[test]
    fn test_strings_are_yellow() {
        let spans = highlight_str("echo 'quoted text'");
        assert!(spans.iter().any(|(range, style)| {
            *range == (5..18) && style.foreground == Some(Color::Yellow)
        }));
    }

    #[test]
    fn test_capture_expressions_are_green() {
        let spans = highlight_str("echo $(date)");
        assert!(
            spans
                .iter()
                .any(|(_, style)| style.foreground == Some(Color::Green))
        );
    }

    #[test]
    fn test_close_redirection_terminator_is_distinct() {
        let spans = highlight_str("cmd 2>&-");
        assert!(spans.iter().any(|(range, style)| {
            *range == (4..7) && style.foreground == Some(REDIRECTION_COLOR)
        }));
        assert!(spans.iter().any(|(range, style)| {
            *range == (7..8) && style.foreground == Some(CLOSE_TERMINATOR_COLOR)
        }));
    }

    #[test]
    fn test_syntax_errors_are_marked() {
        let spans = highlight_str("echo 'oops");
        assert!(
            spans
                .iter()
                .any(|(_, style)| style.foreground == Some(Color::Red) && style.underline)
        );
    }
}

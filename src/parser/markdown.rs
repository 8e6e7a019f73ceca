use std::sync::LazyLock;

use ego_tree::iter::Edge;
use ego_tree::NodeRef;
use regex::Regex;
use scraper::Node;

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static TRAILING_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());

enum List {
    Bullet,
    Ordered(usize),
}

/// Render a node as lightweight markdown: paragraphs, line breaks, bold,
/// italics, links, headings and (nested) lists.
pub fn render(node: &NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    let mut lists: Vec<List> = Vec::new();

    for edge in node.traverse() {
        match edge {
            Edge::Open(n) => match n.value() {
                Node::Text(t) => push_text(&mut out, t),
                Node::Element(e) => match e.name() {
                    "br" => {
                        trim_end_spaces(&mut out);
                        out.push('\n');
                    }
                    "p" | "div" | "blockquote" if lists.is_empty() => paragraph_break(&mut out),
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                        paragraph_break(&mut out);
                        let level = e.name()[1..].parse::<usize>().unwrap_or(1);
                        out.push_str(&"#".repeat(level));
                        out.push(' ');
                    }
                    "strong" | "b" => out.push_str("**"),
                    "em" | "i" => out.push('_'),
                    "ul" => open_list(&mut out, &mut lists, List::Bullet),
                    "ol" => open_list(&mut out, &mut lists, List::Ordered(0)),
                    "li" => {
                        line_break(&mut out);
                        let indent = "  ".repeat(lists.len().saturating_sub(1));
                        out.push_str(&indent);
                        match lists.last_mut() {
                            Some(List::Ordered(n)) => {
                                *n += 1;
                                out.push_str(&format!("{}. ", n));
                            }
                            _ => out.push_str("- "),
                        }
                    }
                    "a" if e.attr("href").is_some() => out.push('['),
                    _ => {}
                },
                _ => {}
            },
            Edge::Close(n) => {
                let Some(e) = n.value().as_element() else { continue };
                match e.name() {
                    "p" | "div" | "blockquote" if lists.is_empty() => paragraph_break(&mut out),
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => paragraph_break(&mut out),
                    "strong" | "b" => close_inline(&mut out, "**"),
                    "em" | "i" => close_inline(&mut out, "_"),
                    "ul" | "ol" => {
                        lists.pop();
                        if lists.is_empty() {
                            paragraph_break(&mut out);
                        } else {
                            line_break(&mut out);
                        }
                    }
                    "li" => line_break(&mut out),
                    "a" => {
                        if let Some(href) = e.attr("href") {
                            out.push_str(&format!("]({})", href));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    tidy(&out)
}

fn push_text(out: &mut String, text: &str) {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let at_line_start = out.is_empty() || out.ends_with('\n');
    let leading = text.starts_with(char::is_whitespace) && !at_line_start && !out.ends_with(' ');
    let trailing = text.ends_with(char::is_whitespace) && !collapsed.is_empty();

    if leading {
        out.push(' ');
    }
    out.push_str(&collapsed);
    if trailing {
        out.push(' ');
    }
}

fn close_inline(out: &mut String, marker: &str) {
    if out.ends_with(marker) {
        out.truncate(out.len() - marker.len());
        return;
    }
    let spaced = out.ends_with(' ');
    trim_end_spaces(out);
    out.push_str(marker);
    if spaced {
        out.push(' ');
    }
}

fn open_list(out: &mut String, lists: &mut Vec<List>, kind: List) {
    if lists.is_empty() {
        paragraph_break(out);
    }
    lists.push(kind);
}

fn trim_end_spaces(out: &mut String) {
    let len = out.trim_end_matches([' ', '\t']).len();
    out.truncate(len);
}

fn line_break(out: &mut String) {
    trim_end_spaces(out);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn paragraph_break(out: &mut String) {
    trim_end_spaces(out);
    if out.is_empty() || out.ends_with("\n\n") {
        return;
    }
    if out.ends_with('\n') {
        out.push('\n');
    } else {
        out.push_str("\n\n");
    }
}

fn tidy(out: &str) -> String {
    let trimmed = TRAILING_SPACE.replace_all(out, "");
    BLANK_LINES.replace_all(&trimmed, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn md(html: &str) -> String {
        let doc = Html::parse_fragment(html);
        render(&doc.root_element())
    }

    #[test]
    fn paragraphs_and_bold() {
        assert_eq!(
            md("<p><strong>Label:</strong> first</p><p>second\n  line</p>"),
            "**Label:** first\n\nsecond line"
        );
    }

    #[test]
    fn trailing_space_moves_out_of_bold() {
        assert_eq!(md("<p><strong>Label: </strong>value</p>"), "**Label:** value");
    }

    #[test]
    fn line_breaks() {
        assert_eq!(md("<p>one<br> two<br/>three</p>"), "one\ntwo\nthree");
    }

    #[test]
    fn lists() {
        assert_eq!(
            md("<p>Counts:</p><ul><li>one</li><li>two<ol><li>a</li><li>b</li></ol></li></ul><p>after</p>"),
            "Counts:\n\n- one\n- two\n  1. a\n  2. b\n\nafter"
        );
    }

    #[test]
    fn links_and_emphasis() {
        assert_eq!(
            md("<p>See <a href=\"http://x.test/a\">the <em>Act</em></a></p>"),
            "See [the _Act_](http://x.test/a)"
        );
    }

    #[test]
    fn empty_bold_dropped() {
        assert_eq!(md("<p><strong></strong>text</p>"), "text");
    }
}

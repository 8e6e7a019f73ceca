use std::sync::LazyLock;

use ego_tree::NodeRef;
use regex::Regex;
use scraper::Node;
use tracing::debug;

use super::markdown;
use super::normalize::{node_text, normalize, tag_name};
use super::record::Field;

/// Upper bound on sibling nodes folded into one span value.
const MAX_SPAN_NODES: usize = 64;

/// Non-newline whitespace, so nbsp inside a label still matches.
const SP: &str = r"[\s&&[^\n]]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Rest of the line holding the label.
    Line,
    /// Rest of the label's node, whitespace normalized.
    NormalizedLine,
    /// Label node plus following siblings up to the next bold label, as text.
    Span,
    /// As `Span`, rendered as markdown.
    MarkdownSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Entry is rejected without it.
    Required,
    /// Left unset when the label is missing.
    Nullable,
    /// Only some notices carry it.
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colon {
    Required,
    /// Whitespace or end of line may stand in for the colon.
    Optional,
}

#[derive(Debug)]
pub struct FieldRule {
    pub field: Field,
    /// Case-insensitive regex fragment; a literal space matches any whitespace run.
    pub label: &'static str,
    pub colon: Colon,
    pub mode: Mode,
    pub presence: Presence,
}

/// Extraction plan, in the order fields are pulled from an entry.
pub const RULES: &[FieldRule] = &[
    FieldRule {
        field: Field::Address,
        label: "address(?:es)? of business",
        colon: Colon::Required,
        mode: Mode::Span,
        presence: Presence::Required,
    },
    FieldRule {
        field: Field::TradingName,
        label: "trading names?",
        colon: Colon::Required,
        mode: Mode::Line,
        presence: Presence::Nullable,
    },
    FieldRule {
        field: Field::NameOfConvicted,
        label: "names? of (?:the )?convicted(?: (?:persons?|party|parties|company))?",
        colon: Colon::Required,
        mode: Mode::Span,
        presence: Presence::Nullable,
    },
    FieldRule {
        field: Field::DateOfOffence,
        label: "dates? of (?:the )?offences?",
        colon: Colon::Required,
        mode: Mode::Span,
        presence: Presence::Nullable,
    },
    FieldRule {
        field: Field::OffenceNature,
        label: "nature and circumstances of (?:the )?offences?",
        colon: Colon::Required,
        mode: Mode::MarkdownSpan,
        presence: Presence::Nullable,
    },
    FieldRule {
        field: Field::CourtDecisionDate,
        label: "court decision date",
        colon: Colon::Required,
        mode: Mode::Line,
        presence: Presence::Nullable,
    },
    FieldRule {
        field: Field::Court,
        label: "court",
        colon: Colon::Required,
        mode: Mode::NormalizedLine,
        presence: Presence::Nullable,
    },
    FieldRule {
        field: Field::ProsecutionBroughtBy,
        label: "prosecution brought by",
        colon: Colon::Required,
        mode: Mode::Line,
        presence: Presence::Nullable,
    },
    FieldRule {
        field: Field::Fine,
        label: "fines?",
        colon: Colon::Required,
        mode: Mode::Line,
        presence: Presence::Nullable,
    },
    FieldRule {
        field: Field::ProsecutionCosts,
        label: "prosecution costs?",
        colon: Colon::Required,
        mode: Mode::Line,
        presence: Presence::Optional,
    },
    FieldRule {
        field: Field::VictimsOfCrimeLevy,
        label: r"vic(?:tims?)?\.? of crime(?: levy)?|victims? levy",
        colon: Colon::Optional,
        mode: Mode::Line,
        presence: Presence::Required,
    },
    FieldRule {
        field: Field::TotalPenalty,
        label: "total(?: penalty)?",
        colon: Colon::Required,
        mode: Mode::Line,
        presence: Presence::Required,
    },
    FieldRule {
        field: Field::Comments,
        label: "comments?",
        colon: Colon::Required,
        mode: Mode::Line,
        presence: Presence::Optional,
    },
];

/// Compiled label of one rule. `line` captures to end of line, `rest` to end of text.
pub struct Label {
    pub rule: &'static FieldRule,
    line: Regex,
    rest: Regex,
}

static LABELS: LazyLock<Vec<Label>> = LazyLock::new(|| RULES.iter().map(Label::compile).collect());

/// Compiled labels, aligned with `RULES`.
pub fn labels() -> &'static [Label] {
    &LABELS
}

impl Label {
    fn compile(rule: &'static FieldRule) -> Label {
        let label = rule.label.replace(' ', &format!("{SP}+"));
        let separator = match rule.colon {
            Colon::Required => ":".to_string(),
            Colon::Optional => format!("(?::|{SP}|$)"),
        };
        // Optional bold markup and "1." numbering, the label, an optional
        // asterisk, then the separator and any closing bold markup.
        let prefix = format!(
            r"(?im)^{SP}*(?:[*_]{{1,2}}{SP}*)?(?:\d+\.{SP}*)?(?:{label})\**{SP}*(?:[*_]{{2}}{SP}*)?{separator}{SP}*(?:[*_]{{2}})?{SP}*"
        );
        Label {
            rule,
            line: Regex::new(&format!(r"{prefix}(?P<value>[^\n]*)")).unwrap(),
            rest: Regex::new(&format!(r"{prefix}(?P<value>(?s:.*))")).unwrap(),
        }
    }

    fn capture<'t>(&self, re: &Regex, text: &'t str) -> Option<&'t str> {
        re.captures(text).and_then(|c| c.name("value")).map(|m| m.as_str())
    }

    /// Value following the label on its own line.
    pub fn capture_line<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.capture(&self.line, text)
    }

    /// Everything after the label, across lines.
    pub fn capture_rest<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.capture(&self.rest, text)
    }

    /// Index of the first node carrying this label at the start of a line.
    pub fn find_node(&self, nodes: &[NodeRef<'_, Node>]) -> Option<usize> {
        nodes
            .iter()
            .position(|n| self.capture_line(&node_text(n)).is_some())
    }
}

/// A node that opens the next field: it has a bold child element.
pub fn is_terminator(node: &NodeRef<'_, Node>) -> bool {
    node.children()
        .any(|c| matches!(tag_name(&c), Some("strong") | Some("b")))
}

/// Single-line extraction.
pub fn extract_single(label: &Label, nodes: &[NodeRef<'_, Node>]) -> Option<String> {
    match label.rule.mode {
        Mode::NormalizedLine => nodes
            .iter()
            .find_map(|n| label.capture_rest(&node_text(n)).map(normalize)),
        _ => nodes
            .iter()
            .find_map(|n| label.capture_line(&node_text(n)).map(normalize)),
    }
}

/// Span extraction: the label's node and its following siblings up to the
/// next terminator, with the label stripped from the front.
pub fn extract_span(label: &Label, nodes: &[NodeRef<'_, Node>]) -> Option<String> {
    let start = label.find_node(nodes)?;
    let span = span_from(nodes, start);
    debug!("{}: {} node span", label.rule.field, span.len());

    if label.rule.mode == Mode::MarkdownSpan {
        let md = span.iter().map(markdown::render).collect::<Vec<_>>().join("\n\n");
        if let Some(value) = label.capture_rest(&md) {
            return Some(value.trim().to_string());
        }
        // Label markup the regex does not recognise: keep the siblings only.
        let tail = span[1..].iter().map(markdown::render).collect::<Vec<_>>().join("\n\n");
        return Some(tail.trim().to_string());
    }

    let text = span
        .iter()
        .map(|n| node_text(n).trim().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    label.capture_rest(&text).map(|v| v.trim().to_string())
}

fn span_from<'a, 'b>(nodes: &'b [NodeRef<'a, Node>], start: usize) -> &'b [NodeRef<'a, Node>] {
    let mut end = start + 1;
    while end < nodes.len() && end - start < MAX_SPAN_NODES {
        if is_terminator(&nodes[end]) {
            break;
        }
        end += 1;
    }
    &nodes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn label_for(field: Field) -> &'static Label {
        labels().iter().find(|l| l.rule.field == field).unwrap()
    }

    fn fragment(html: &str) -> Html {
        Html::parse_fragment(html)
    }

    fn top_nodes(html: &Html) -> Vec<NodeRef<'_, Node>> {
        html.root_element()
            .children()
            .filter(crate::parser::normalize::is_significant)
            .collect()
    }

    #[test]
    fn every_rule_compiles() {
        assert_eq!(labels().len(), RULES.len());
        for rule in RULES {
            assert_eq!(label_for(rule.field).rule.field, rule.field);
        }
    }

    #[test]
    fn crime_levy_variants() {
        let label = label_for(Field::VictimsOfCrimeLevy);
        for line in [
            "Victim of Crime Levy: $160",
            "Victims of Crime: $160",
            "Victim of Crime: $160",
            "victims of crime levy $160",
            "Vic of Crime Levy*: $160",
            "VICTIMS LEVY: $160",
        ] {
            assert_eq!(label.capture_line(line), Some("$160"), "{line}");
        }
        assert_eq!(label.capture_line("Victims included two children."), None);
        assert_eq!(label.capture_line("Victim statements were tendered."), None);
    }

    #[test]
    fn total_variants() {
        let label = label_for(Field::TotalPenalty);
        assert_eq!(label.capture_line("Total: $1,160"), Some("$1,160"));
        assert_eq!(label.capture_line("Total Penalty: $1,160"), Some("$1,160"));
        assert_eq!(label.capture_line("TOTAL PENALTY*: $1,160"), Some("$1,160"));
    }

    #[test]
    fn numbering_and_asterisk() {
        let label = label_for(Field::Fine);
        assert_eq!(label.capture_line("1. Fine: $500"), Some("$500"));
        assert_eq!(label.capture_line("2.Fine*: $500"), Some("$500"));
        assert_eq!(label.capture_line("**Fine:** $500"), Some("$500"));
        assert_eq!(label.capture_line("Fine**:** $500"), Some("$500"));
    }

    #[test]
    fn colon_required_except_levy() {
        assert_eq!(label_for(Field::Fine).capture_line("Fine $500"), None);
        assert_eq!(label_for(Field::TotalPenalty).capture_line("Total of 3 samples failed testing."), None);
        assert_eq!(label_for(Field::Comments).capture_line("Comments from the inspector were ignored."), None);
        assert_eq!(label_for(Field::Court).capture_line("Court appearances were adjourned twice."), None);
        assert_eq!(
            label_for(Field::VictimsOfCrimeLevy).capture_line("Victims of Crime Levy $160"),
            Some("$160")
        );
    }

    #[test]
    fn anchored_at_line_start() {
        let fine = label_for(Field::Fine);
        assert_eq!(fine.capture_line("The magistrate imposed a fine: $500"), None);
        assert_eq!(fine.capture_line("Finest foods"), None);
        assert_eq!(fine.capture_line("Other text\nFine: $500"), Some("$500"));
    }

    #[test]
    fn court_does_not_take_decision_date() {
        let court = label_for(Field::Court);
        assert_eq!(court.capture_line("Court decision date: 1 May 2015"), None);
        assert_eq!(court.capture_line("Court: Adelaide Magistrates Court"), Some("Adelaide Magistrates Court"));
        let both = "Court decision date: 1 May 2015\nCourt: Adelaide";
        assert_eq!(court.capture_line(both), Some("Adelaide"));
    }

    #[test]
    fn nbsp_inside_label() {
        let label = label_for(Field::CourtDecisionDate);
        assert_eq!(label.capture_line("Court\u{a0}decision date:\u{a0}3 June 2014").map(normalize), Some("3 June 2014".into()));
    }

    #[test]
    fn narrative_line_starting_with_label_word_is_skipped() {
        let html = fragment(
            "<p>Total of 3 samples failed testing.</p>\
             <p>Fine particles of dust on benches.</p>\
             <p><strong>Fine:</strong> $500</p>\
             <p><strong>Total penalty:</strong> $660</p>",
        );
        let nodes = top_nodes(&html);
        assert_eq!(extract_single(label_for(Field::Fine), &nodes).as_deref(), Some("$500"));
        assert_eq!(extract_single(label_for(Field::TotalPenalty), &nodes).as_deref(), Some("$660"));
    }

    #[test]
    fn single_line_takes_first_matching_node() {
        let html = fragment(
            "<p><strong>Trading name*:</strong> Moo View Dairy</p>\
             <p><strong>Trading name:</strong> Second</p>",
        );
        let nodes = top_nodes(&html);
        assert_eq!(extract_single(label_for(Field::TradingName), &nodes).as_deref(), Some("Moo View Dairy"));
        assert_eq!(extract_single(label_for(Field::Comments), &nodes), None);
    }

    #[test]
    fn normalized_line_reads_to_node_end() {
        let html = fragment("<p><strong>Court:</strong> Adelaide<br>Magistrates\u{a0}Court</p>");
        let nodes = top_nodes(&html);
        assert_eq!(
            extract_single(label_for(Field::Court), &nodes).as_deref(),
            Some("Adelaide Magistrates Court")
        );
    }

    #[test]
    fn span_stops_at_next_bold_label() {
        let html = fragment(
            "<p><strong>Address of business:</strong> 12 Main Street</p>\
             <p>Adelaide SA 5000</p>\
             <p><strong>Trading name:</strong> Foo</p>",
        );
        let nodes = top_nodes(&html);
        assert_eq!(
            extract_span(label_for(Field::Address), &nodes).as_deref(),
            Some("12 Main Street\nAdelaide SA 5000")
        );
    }

    #[test]
    fn span_over_three_nodes_strips_label() {
        let html = fragment(
            "<p><strong>Nature and circumstances of offence:</strong> Failed to keep premises clean.</p>\
             <p>Evidence of rodent activity.</p>\
             <p>Food stored at unsafe temperatures.</p>\
             <p><strong>Court decision date:</strong> 1 May 2015</p>",
        );
        let nodes = top_nodes(&html);
        let value = extract_span(label_for(Field::OffenceNature), &nodes).unwrap();
        assert_eq!(
            value,
            "Failed to keep premises clean.\n\nEvidence of rodent activity.\n\nFood stored at unsafe temperatures."
        );
        assert!(!value.contains("Court decision date"));
    }

    #[test]
    fn plain_span_over_three_nodes() {
        let html = fragment(
            "<p><strong>Date of offence:</strong> 1 January 2014</p>\
             <p>2 January 2014</p>\
             <p>3 January 2014</p>\
             <p><strong>Nature and circumstances of offence:</strong> x</p>",
        );
        let nodes = top_nodes(&html);
        assert_eq!(
            extract_span(label_for(Field::DateOfOffence), &nodes).as_deref(),
            Some("1 January 2014\n2 January 2014\n3 January 2014")
        );
    }

    #[test]
    fn span_ends_with_run() {
        let html = fragment("<p><strong>Name of convicted:</strong></p><p>Jane Citizen</p>");
        let nodes = top_nodes(&html);
        assert_eq!(
            extract_span(label_for(Field::NameOfConvicted), &nodes).as_deref(),
            Some("Jane Citizen")
        );
    }

    #[test]
    fn terminator_needs_bold_child() {
        let html = fragment("<p><b>Fine:</b> $1</p><p>plain <em>text</em></p>");
        let nodes = top_nodes(&html);
        assert!(is_terminator(&nodes[0]));
        assert!(!is_terminator(&nodes[1]));
    }
}

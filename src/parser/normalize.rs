use ego_tree::iter::Edge;
use ego_tree::NodeRef;
use scraper::Node;

/// Elements whose boundaries end a line of visible text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "ul", "ol", "table",
];

/// Replace every whitespace character (nbsp, tabs, newlines included) with a
/// plain space, then trim.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// True for nodes that carry content: elements, and text that is not blank.
pub fn is_significant(node: &NodeRef<'_, Node>) -> bool {
    match node.value() {
        Node::Element(_) => true,
        Node::Text(t) => !t.trim().is_empty(),
        _ => false,
    }
}

pub fn tag_name<'a>(node: &NodeRef<'a, Node>) -> Option<&'a str> {
    node.value().as_element().map(|e| e.name())
}

/// Visible text of a node. `<br>` and block boundaries become `\n`, other
/// whitespace inside a line is left as authored.
pub fn node_text(node: &NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for edge in node.traverse() {
        match edge {
            Edge::Open(n) => match n.value() {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) if e.name() == "br" => out.push('\n'),
                _ => {}
            },
            Edge::Close(n) => {
                if let Some(name) = tag_name(&n) {
                    if BLOCK_TAGS.contains(&name) && !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
            }
        }
    }
    out
}

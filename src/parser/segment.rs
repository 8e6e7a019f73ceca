use std::sync::LazyLock;

use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

use super::normalize::{is_significant, tag_name};
use super::ParseError;

pub const CONTAINER_SELECTOR: &str = "div.wysiwyg";
const HEADING_TAG: &str = "h3";

/// Upper bound on siblings walked for a single entry.
const MAX_RUN_NODES: usize = 10_000;

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(CONTAINER_SELECTOR).unwrap());
static HEADING_ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3 a[id]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingAnchor {
    pub id: String,
    pub link: String,
}

/// One entry's slice of the container: its heading node followed by every
/// sibling up to (not including) the next heading.
#[derive(Debug, Clone)]
pub struct EntryRun<'a> {
    pub anchor: HeadingAnchor,
    pub nodes: Vec<NodeRef<'a, Node>>,
}

/// All `h3 a[id]` anchors in document order.
pub fn heading_anchors(document: &Html, base_url: &str) -> Vec<HeadingAnchor> {
    document
        .select(&HEADING_ANCHORS)
        .filter_map(|a| a.value().attr("id"))
        .map(|id| HeadingAnchor {
            id: id.to_string(),
            link: format!("{}#{}", base_url, id),
        })
        .collect()
}

/// Split the content container into one run per heading anchor.
pub fn segment<'a>(document: &'a Html, base_url: &str) -> Result<Vec<EntryRun<'a>>, ParseError> {
    let container = document
        .select(&CONTAINER)
        .next()
        .ok_or(ParseError::MissingContainer {
            selector: CONTAINER_SELECTOR,
        })?;

    let anchors = heading_anchors(document, base_url);
    if anchors.is_empty() {
        return Err(ParseError::NoHeadings);
    }

    let mut runs = Vec::with_capacity(anchors.len());
    for anchor in anchors {
        let Some(heading) = enclosing_heading(container, &anchor.id) else {
            warn!("No heading found for anchor #{} inside {}, skipping", anchor.id, CONTAINER_SELECTOR);
            continue;
        };
        let nodes = collect_run(heading);
        debug!("Entry #{}: {} nodes", anchor.id, nodes.len());
        runs.push(EntryRun { anchor, nodes });
    }
    Ok(runs)
}

/// The `h3` enclosing the anchor with this id, when both sit inside `container`.
fn enclosing_heading<'a>(container: ElementRef<'a>, id: &str) -> Option<NodeRef<'a, Node>> {
    let anchor = container
        .descendants()
        .find(|n| n.value().as_element().is_some_and(|e| e.name() == "a" && e.attr("id") == Some(id)))?;

    anchor
        .ancestors()
        .take_while(|n| *n != *container)
        .find(|n| tag_name(n) == Some(HEADING_TAG))
}

fn collect_run(heading: NodeRef<'_, Node>) -> Vec<NodeRef<'_, Node>> {
    let mut nodes = vec![heading];
    let mut current = heading.next_sibling();
    while let Some(node) = current {
        if tag_name(&node) == Some(HEADING_TAG) || nodes.len() >= MAX_RUN_NODES {
            break;
        }
        if is_significant(&node) {
            nodes.push(node);
        }
        current = node.next_sibling();
    }
    nodes
}

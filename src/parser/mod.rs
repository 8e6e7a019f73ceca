pub mod fields;
pub mod markdown;
pub mod normalize;
pub mod record;
pub mod segment;

use std::collections::HashSet;

use scraper::Html;
use thiserror::Error;
use tracing::{info, warn};

pub use record::{Field, Location, Prosecution, Rejected};

/// The register page no longer has the layout the extractor expects.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("content container `{selector}` not found; page layout changed")]
    MissingContainer { selector: &'static str },
    #[error("no `h3 a[id]` headings found; page layout changed")]
    NoHeadings,
}

/// Outcome of one pass over the register page.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Headings found on the page.
    pub found: usize,
    /// Entries whose link is already stored.
    pub known: usize,
    pub rejected: Vec<(String, Rejected)>,
    /// New, accepted records in page order.
    pub records: Vec<Prosecution>,
}

/// Segment the page, skip entries already stored, and assemble the rest.
pub fn process_page(html: &str, base_url: &str, seen: &HashSet<String>) -> Result<Extraction, ParseError> {
    let document = Html::parse_document(html);
    let runs = segment::segment(&document, base_url)?;

    let mut out = Extraction {
        found: runs.len(),
        ..Default::default()
    };
    info!("Found {} prosecutions", out.found);

    for run in runs {
        if seen.contains(&run.anchor.link) {
            out.known += 1;
            continue;
        }
        match record::assemble(&run.anchor, &run.nodes) {
            Ok(p) => {
                info!("Extracting {}", normalize::normalize(p.address()));
                out.records.push(p);
            }
            Err(reason) => {
                warn!("Rejected #{}: {}", run.anchor.id, reason);
                out.rejected.push((run.anchor.id, reason));
            }
        }
    }

    info!(
        "{} new prosecutions ({} already stored, {} rejected)",
        out.records.len(),
        out.known,
        out.rejected.len()
    );
    Ok(out)
}

// ── Tests ──

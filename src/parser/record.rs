use std::collections::BTreeMap;
use std::fmt;

use ego_tree::NodeRef;
use scraper::Node;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::fields::{self, Mode, Presence};
use super::segment::HeadingAnchor;

/// Extracted attribute names, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Address,
    TradingName,
    NameOfConvicted,
    DateOfOffence,
    OffenceNature,
    CourtDecisionDate,
    Court,
    ProsecutionBroughtBy,
    Fine,
    ProsecutionCosts,
    VictimsOfCrimeLevy,
    TotalPenalty,
    Comments,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Address,
        Field::TradingName,
        Field::NameOfConvicted,
        Field::DateOfOffence,
        Field::OffenceNature,
        Field::CourtDecisionDate,
        Field::Court,
        Field::ProsecutionBroughtBy,
        Field::Fine,
        Field::ProsecutionCosts,
        Field::VictimsOfCrimeLevy,
        Field::TotalPenalty,
        Field::Comments,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Address => "address",
            Field::TradingName => "trading_name",
            Field::NameOfConvicted => "name_of_convicted",
            Field::DateOfOffence => "date_of_offence",
            Field::OffenceNature => "offence_nature",
            Field::CourtDecisionDate => "court_decision_date",
            Field::Court => "court",
            Field::ProsecutionBroughtBy => "prosecution_brought_by",
            Field::Fine => "fine",
            Field::ProsecutionCosts => "prosecution_costs",
            Field::VictimsOfCrimeLevy => "victims_of_crime_levy",
            Field::TotalPenalty => "total_penalty",
            Field::Comments => "comments",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// One prosecution notice: its anchor plus every attribute found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prosecution {
    pub id: String,
    pub link: String,
    #[serde(flatten)]
    pub attrs: BTreeMap<Field, String>,
    #[serde(flatten)]
    pub location: Option<Location>,
}

impl Prosecution {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.attrs.get(&field).map(String::as_str)
    }

    /// Always present on an assembled record.
    pub fn address(&self) -> &str {
        self.get(Field::Address).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("no `{0}` label in entry")]
    MissingField(Field),
    #[error("`{0}` is blank")]
    BlankField(Field),
}

/// Pull every field of the plan out of one entry's nodes.
pub fn assemble(anchor: &HeadingAnchor, nodes: &[NodeRef<'_, Node>]) -> Result<Prosecution, Rejected> {
    let mut attrs = BTreeMap::new();

    for label in fields::labels() {
        let rule = label.rule;
        let value = match rule.mode {
            Mode::Span | Mode::MarkdownSpan => fields::extract_span(label, nodes),
            Mode::Line | Mode::NormalizedLine => fields::extract_single(label, nodes),
        };

        match (value, rule.presence) {
            (Some(v), Presence::Required) if v.trim().is_empty() => {
                return Err(Rejected::BlankField(rule.field));
            }
            (Some(v), _) => {
                attrs.insert(rule.field, v);
            }
            (None, Presence::Required) => return Err(Rejected::MissingField(rule.field)),
            (None, Presence::Nullable) => debug!("#{}: no {}", anchor.id, rule.field),
            (None, Presence::Optional) => {}
        }
    }

    Ok(Prosecution {
        id: anchor.id.clone(),
        link: anchor.link.clone(),
        attrs,
        location: None,
    })
}

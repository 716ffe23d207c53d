//! Query intent classification.
//!
//! A single completion call with the router template, followed by a strict
//! parse-or-default step: any malformed model output maps deterministically
//! to the `general_chat` fallback and never throws past this boundary. The
//! raw response is logged for diagnosis when parsing fails.
//!
//! Manual-name resolution happens after parsing: an extracted name that
//! fails catalog matching rewrites the scenario to `invalid_manual`,
//! retaining the original name for the user-facing message.

use anyhow::Result;
use serde::Deserialize;
use tracing::warn;

use crate::catalog::ManualCatalog;
use crate::models::{Classification, Scenario};
use crate::prompt;
use crate::traits::Completer;

/// Structured reply expected from the router call.
#[derive(Debug, Deserialize)]
struct RouterReply {
    scenario: Scenario,
    #[serde(default)]
    manual_name: Option<String>,
}

/// Classify a user question against the catalog of available manuals.
///
/// Never fails on malformed model output; only a completion-service
/// failure propagates as an error.
pub async fn classify(
    completer: &dyn Completer,
    catalog: &ManualCatalog,
    query: &str,
) -> Result<Classification> {
    let router = prompt::router_prompt(query, catalog.manuals());
    let raw = completer.complete(&router).await?;

    let parsed = match parse_reply(&raw) {
        Some(c) => c,
        None => {
            warn!(raw = %raw, "unparseable classifier output, defaulting to general_chat");
            Classification::fallback()
        }
    };

    Ok(resolve_manual(parsed, catalog))
}

/// Decode the router reply into the closed scenario enumeration.
///
/// Accepts either a bare JSON object or one embedded in surrounding prose
/// (models occasionally wrap the JSON in commentary).
fn parse_reply(raw: &str) -> Option<Classification> {
    let object = serde_json::from_str::<RouterReply>(raw.trim())
        .ok()
        .or_else(|| {
            let start = raw.find('{')?;
            let end = raw.rfind('}')?;
            serde_json::from_str(&raw[start..=end]).ok()
        })?;

    Some(Classification {
        scenario: object.scenario,
        manual_name: object.manual_name,
    })
}

/// Apply catalog resolution to a parsed classification.
///
/// Pure function: `manual_query` with a resolvable name gets the canonical
/// catalog entry; with an unresolvable name it becomes `invalid_manual`;
/// with no extracted name at all it falls back to `general_chat`.
pub fn resolve_manual(parsed: Classification, catalog: &ManualCatalog) -> Classification {
    if parsed.scenario != Scenario::ManualQuery {
        return Classification {
            scenario: parsed.scenario,
            manual_name: None,
        };
    }

    match parsed.manual_name {
        Some(name) => match catalog.resolve(&name) {
            Some(resolved) => Classification {
                scenario: Scenario::ManualQuery,
                manual_name: Some(resolved.to_string()),
            },
            None => Classification {
                scenario: Scenario::InvalidManual,
                manual_name: Some(name),
            },
        },
        None => Classification::fallback(),
    }
}

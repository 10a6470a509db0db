//! Classifier instructions and their typed verdicts.
//!
//! Prompts are policy constants, not algorithms; the typed structs below are
//! the schema each instruction asks the model to emit. Model output is prose
//! around a JSON blob, so all parsing goes through `common::extract_json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::{extract_json, JsonExtractError};

/// Touchless classification policy.
///
/// The default verdict is `false`, not unknown: most car washes are not
/// touchless, so absence of touchless language is evidence against. `null`
/// is reserved for pages with near-zero content to analyze.
pub const TOUCHLESS_SYSTEM: &str = "\
You classify car wash websites. Decide whether the facility offers a TOUCHLESS \
wash (also called touch-free, contactless, brushless, or laser wash): water and \
chemical jets only, no brushes or cloth touching the vehicle.

Rules, applied in order:
1. If the text mentions touchless, touch-free, contactless, brushless, or laser \
wash, answer true — even if friction options are also offered.
2. If the facility is self-serve, wand, or coin-operated bays, answer true \
(nothing touches the car but the owner's wand).
3. If the text describes wash services without any of that language (tunnel, \
express, soft-touch, soft cloth, foam brushes), answer false. Do NOT answer \
null just because touchless is not mentioned.
4. Answer null only when there is almost no content to analyze.

Also extract amenities (short 1-5 word phrases) and opening hours if stated.

Respond with only a JSON object:
{\"is_touchless\": true|false|null, \"evidence\": \"<short quote or summary>\", \
\"amenities\": [\"...\"], \"hours\": {\"monday\": \"8am-8pm\", ...} or null}";

/// Amenity extraction instruction.
pub const AMENITIES_SYSTEM: &str = "\
You extract car wash amenities from website text. Prefer terms from this \
vocabulary when they apply: free vacuums, membership plans, unlimited club, \
self-serve bays, RV/oversized vehicles, pet wash, tire shine, ceramic coating, \
spot-free rinse, undercarriage wash, wheel cleaning, air fresheners, towel \
service, open 24 hours. Add other amenities only if clearly stated, as short \
1-5 word phrases.

Respond with only a JSON object: {\"amenities\": [\"...\"]}";

/// Vendor-name cleanup instruction.
pub const VENDOR_NAME_SYSTEM: &str = "\
You normalize car wash brand names. Given a company's web domain and sample \
location names from a directory, return the canonical brand name a customer \
would recognize. Strip location suffixes, store numbers, and scraping \
artifacts (e.g. \"Find Shell\" for shell.com is just \"Shell\"). If the name \
is already correct, return it unchanged.

Respond with only a JSON object: {\"name\": \"...\"}";

/// Description generation instruction.
pub const DESCRIPTION_SYSTEM: &str = "\
You write a short, factual description (2-3 sentences) of a car wash for a \
directory page, based on its website text. Mention the wash type and notable \
amenities. No marketing superlatives, no invented facts.

Respond with only a JSON object: {\"description\": \"...\"}";

/// Hero-photo selection policy: strict allow-list, when in doubt block.
pub const HERO_PHOTO_SYSTEM: &str = "\
You select the best hero photo for a car wash directory listing from numbered \
candidate images. An image is approved ONLY if it is a real photograph (not a \
logo, illustration, icon, map, screenshot, or text-heavy graphic) AND it shows \
the business's physical location or wash equipment. When in doubt, block the \
image. It is fine to approve nothing.

Respond with only a JSON object: \
{\"best_index\": <number or null>, \"blocked\": [<numbers>]}";

// ============================================================================
// Verdicts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchlessVerdict {
    pub is_touchless: Option<bool>,
    #[serde(default)]
    pub evidence: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub hours: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmenityVerdict {
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorNameVerdict {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionVerdict {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroPhotoVerdict {
    pub best_index: Option<usize>,
    #[serde(default)]
    pub blocked: Vec<usize>,
}

pub fn parse_touchless(raw: &str) -> Result<TouchlessVerdict, JsonExtractError> {
    extract_json(raw)
}

pub fn parse_amenities(raw: &str) -> Result<AmenityVerdict, JsonExtractError> {
    extract_json(raw)
}

pub fn parse_vendor_name(raw: &str) -> Result<VendorNameVerdict, JsonExtractError> {
    extract_json(raw)
}

pub fn parse_description(raw: &str) -> Result<DescriptionVerdict, JsonExtractError> {
    extract_json(raw)
}

pub fn parse_hero_photo(raw: &str) -> Result<HeroPhotoVerdict, JsonExtractError> {
    extract_json(raw)
}

/// Build the user message for touchless classification.
pub fn touchless_input(name: &str, markdown: &str) -> String {
    format!("Business: {}\n\nWebsite content:\n{}", name, markdown)
}

/// Build the user message for vendor-name cleanup.
pub fn vendor_name_input(domain: &str, sample_names: &[String]) -> String {
    format!(
        "Domain: {}\nSample listing names:\n{}",
        domain,
        sample_names.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touchless_verdict_parses_from_prose() {
        let raw = r#"Here is my analysis:
{"is_touchless": true, "evidence": "laser wash mentioned", "amenities": ["free vacuums"], "hours": null}
Let me know if you need more."#;
        let verdict = parse_touchless(raw).unwrap();
        assert_eq!(verdict.is_touchless, Some(true));
        assert_eq!(verdict.amenities, vec!["free vacuums"]);
    }

    #[test]
    fn touchless_verdict_tolerates_missing_optional_fields() {
        let verdict = parse_touchless(r#"{"is_touchless": false}"#).unwrap();
        assert_eq!(verdict.is_touchless, Some(false));
        assert!(verdict.evidence.is_empty());
        assert!(verdict.amenities.is_empty());
        assert!(verdict.hours.is_none());
    }

    #[test]
    fn touchless_null_verdict_parses() {
        let verdict =
            parse_touchless(r#"{"is_touchless": null, "evidence": "page was empty"}"#).unwrap();
        assert_eq!(verdict.is_touchless, None);
    }

    #[test]
    fn non_json_output_is_an_error_with_raw_preserved() {
        let err = parse_touchless("I could not determine anything.").unwrap_err();
        assert!(err.raw().contains("could not determine"));
    }

    #[test]
    fn hero_verdict_allows_approving_nothing() {
        let verdict =
            parse_hero_photo(r#"{"best_index": null, "blocked": [0, 1, 2]}"#).unwrap();
        assert!(verdict.best_index.is_none());
        assert_eq!(verdict.blocked, vec![0, 1, 2]);
    }

    #[test]
    fn vendor_name_input_lists_samples() {
        let input = vendor_name_input(
            "find.shell.com",
            &["Find Shell".to_string(), "Find Shell #12".to_string()],
        );
        assert!(input.contains("find.shell.com"));
        assert!(input.contains("Find Shell #12"));
    }

    #[test]
    fn touchless_policy_states_default_false() {
        // Rule 3 is the asymmetric default; the prompt must not drift to a
        // symmetric "unknown when unsure" policy.
        assert!(TOUCHLESS_SYSTEM.contains("answer false"));
        assert!(TOUCHLESS_SYSTEM.contains("Do NOT answer null"));
    }
}

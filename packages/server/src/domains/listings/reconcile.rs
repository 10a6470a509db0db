//! Reconciliation layer: the merge rules between enrichment output and the
//! listing's current state.
//!
//! Every pipeline write goes through this module. The governing rule is
//! "fill gaps, never clobber": a field that already holds data (imported,
//! admin-entered, or previously classified) is left alone. This is also what
//! makes concurrent jobs safe against the shared listings table without row
//! locks — independent jobs write disjoint or idempotent fields.
//!
//! The one exception is the single-listing re-check endpoint, which passes
//! `force` to overwrite a previous touchless verdict.

use serde_json::Value;

/// Decision for one field: keep what is stored, or write a new value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite<T> {
    Keep,
    Set(T),
}

impl<T> FieldWrite<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, FieldWrite::Set(_))
    }

    /// Resolve against the current value.
    pub fn resolve(self, current: T) -> T {
        match self {
            FieldWrite::Keep => current,
            FieldWrite::Set(value) => value,
        }
    }
}

/// `is_touchless` gap-fill: only write when the listing has no verdict yet.
///
/// A previously determined or admin-approved value is never overwritten by a
/// batch run, even if the classifier would now disagree. `force` is the
/// one-shot re-check path and always writes.
pub fn fill_touchless(
    current: Option<bool>,
    proposed: Option<bool>,
    force: bool,
) -> FieldWrite<Option<bool>> {
    if force {
        return FieldWrite::Set(proposed);
    }
    if current.is_some() {
        return FieldWrite::Keep;
    }
    match proposed {
        Some(_) => FieldWrite::Set(proposed),
        None => FieldWrite::Keep,
    }
}

/// Evidence text follows the verdict: set only alongside a touchless write.
pub fn fill_evidence(evidence: &str, verdict_written: bool) -> FieldWrite<String> {
    if !verdict_written || evidence.trim().is_empty() {
        return FieldWrite::Keep;
    }
    FieldWrite::Set(evidence.trim().to_string())
}

/// Amenity merge: union of existing and found, deduplicated
/// case-insensitively, existing entries never removed and their original
/// casing preserved. Returns the merged set and whether anything was added.
pub fn merge_amenities(existing: &[String], found: &[String]) -> (Vec<String>, bool) {
    let mut merged: Vec<String> = existing.to_vec();
    let mut seen: Vec<String> = existing
        .iter()
        .map(|a| a.trim().to_lowercase())
        .collect();
    let mut added = false;

    for amenity in found {
        let normalized = amenity.trim().to_lowercase();
        if normalized.is_empty() || seen.contains(&normalized) {
            continue;
        }
        merged.push(amenity.trim().to_string());
        seen.push(normalized);
        added = true;
    }

    (merged, added)
}

/// Hero image gap-fill: only set when currently empty.
pub fn fill_hero(current: Option<&str>, candidate: Option<&str>) -> FieldWrite<String> {
    if current.map(|c| !c.is_empty()).unwrap_or(false) {
        return FieldWrite::Keep;
    }
    match candidate {
        Some(url) if !url.is_empty() => FieldWrite::Set(url.to_string()),
        _ => FieldWrite::Keep,
    }
}

/// Photo append: new URLs are appended in order, duplicates skipped,
/// existing entries untouched.
pub fn append_photos(existing: &[String], new: &[String]) -> (Vec<String>, bool) {
    let mut photos = existing.to_vec();
    let mut added = false;

    for url in new {
        if url.is_empty() || photos.iter().any(|p| p == url) {
            continue;
        }
        photos.push(url.clone());
        added = true;
    }

    (photos, added)
}

/// Hours gap-fill: populated hours are authoritative; only write when the
/// stored value is NULL or an empty object.
pub fn fill_hours(current: Option<&Value>, proposed: Option<Value>) -> FieldWrite<Value> {
    let current_empty = match current {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    };
    if !current_empty {
        return FieldWrite::Keep;
    }
    match proposed {
        Some(Value::Object(map)) if !map.is_empty() => FieldWrite::Set(Value::Object(map)),
        _ => FieldWrite::Keep,
    }
}

/// Description gap-fill.
pub fn fill_description(current: Option<&str>, proposed: &str) -> FieldWrite<String> {
    if current.map(|c| !c.trim().is_empty()).unwrap_or(false) {
        return FieldWrite::Keep;
    }
    let proposed = proposed.trim();
    if proposed.is_empty() {
        return FieldWrite::Keep;
    }
    FieldWrite::Set(proposed.to_string())
}

/// Vendor rename: an explicit cleanup overwrite, but only when the proposed
/// name actually differs — this keeps the job's `changed` counter accurate
/// and makes reruns idempotent.
pub fn rename_vendor(current: &str, proposed: &str) -> FieldWrite<String> {
    let proposed = proposed.trim();
    if proposed.is_empty() || proposed == current.trim() {
        return FieldWrite::Keep;
    }
    FieldWrite::Set(proposed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // --- is_touchless -------------------------------------------------------

    #[test]
    fn touchless_fills_when_unset() {
        assert_eq!(
            fill_touchless(None, Some(true), false),
            FieldWrite::Set(Some(true))
        );
        assert_eq!(
            fill_touchless(None, Some(false), false),
            FieldWrite::Set(Some(false))
        );
    }

    #[test]
    fn touchless_never_clobbers_existing_verdict() {
        // Even a contradicting classifier result leaves the stored value alone
        assert_eq!(fill_touchless(Some(true), Some(false), false), FieldWrite::Keep);
        assert_eq!(fill_touchless(Some(false), Some(true), false), FieldWrite::Keep);
    }

    #[test]
    fn touchless_null_verdict_writes_nothing() {
        assert_eq!(fill_touchless(None, None, false), FieldWrite::Keep);
    }

    #[test]
    fn touchless_force_always_writes() {
        assert_eq!(
            fill_touchless(Some(true), Some(false), true),
            FieldWrite::Set(Some(false))
        );
        assert_eq!(fill_touchless(Some(true), None, true), FieldWrite::Set(None));
    }

    #[test]
    fn touchless_rerun_is_idempotent() {
        // Same content, same verdict: second run keeps, value unchanged
        let first = fill_touchless(None, Some(true), false).resolve(None);
        let second = fill_touchless(first, Some(true), false);
        assert_eq!(second, FieldWrite::Keep);
        assert_eq!(second.resolve(first), Some(true));
    }

    // --- amenities ----------------------------------------------------------

    #[test]
    fn amenities_union_never_removes() {
        let existing = vec!["Free Vacuum".to_string(), "tire shine".to_string()];
        let found = vec!["ceramic coating".to_string(), "free vacuum".to_string()];

        let (merged, added) = merge_amenities(&existing, &found);
        assert!(added);
        assert_eq!(
            merged,
            vec!["Free Vacuum", "tire shine", "ceramic coating"]
        );
    }

    #[test]
    fn amenities_no_new_entries_means_unchanged() {
        let existing = vec!["free vacuum".to_string()];
        let (merged, added) = merge_amenities(&existing, &["Free Vacuum ".to_string()]);
        assert!(!added);
        assert_eq!(merged, existing);
    }

    #[test]
    fn amenities_blank_entries_dropped() {
        let (merged, added) = merge_amenities(&[], &["  ".to_string(), "RV bays".to_string()]);
        assert!(added);
        assert_eq!(merged, vec!["RV bays"]);
    }

    // --- photos / hero ------------------------------------------------------

    #[test]
    fn hero_fills_only_when_empty() {
        assert_eq!(
            fill_hero(None, Some("https://cdn/x.jpg")),
            FieldWrite::Set("https://cdn/x.jpg".to_string())
        );
        assert_eq!(fill_hero(Some(""), Some("https://cdn/x.jpg")).is_set(), true);
        assert_eq!(
            fill_hero(Some("https://cdn/old.jpg"), Some("https://cdn/new.jpg")),
            FieldWrite::Keep
        );
    }

    #[test]
    fn photos_append_dedups() {
        let existing = vec!["a.jpg".to_string()];
        let (photos, added) =
            append_photos(&existing, &["a.jpg".to_string(), "b.jpg".to_string()]);
        assert!(added);
        assert_eq!(photos, vec!["a.jpg", "b.jpg"]);
    }

    // --- hours --------------------------------------------------------------

    #[test]
    fn hours_populated_are_authoritative() {
        let current = json!({"mon": "8-6"});
        assert_eq!(
            fill_hours(Some(&current), Some(json!({"mon": "9-5"}))),
            FieldWrite::Keep
        );
    }

    #[test]
    fn hours_fill_null_or_empty() {
        assert!(fill_hours(None, Some(json!({"mon": "8-6"}))).is_set());
        assert!(fill_hours(Some(&json!({})), Some(json!({"mon": "8-6"}))).is_set());
        assert!(fill_hours(Some(&Value::Null), Some(json!({"mon": "8-6"}))).is_set());
    }

    #[test]
    fn hours_empty_proposal_writes_nothing() {
        assert_eq!(fill_hours(None, Some(json!({}))), FieldWrite::Keep);
        assert_eq!(fill_hours(None, None), FieldWrite::Keep);
    }

    // --- vendor rename ------------------------------------------------------

    #[test]
    fn vendor_rename_only_when_different() {
        assert_eq!(
            rename_vendor("Find Shell", "Shell"),
            FieldWrite::Set("Shell".to_string())
        );
        // Echoed-back unchanged name is not a change
        assert_eq!(rename_vendor("Shell", "Shell"), FieldWrite::Keep);
        assert_eq!(rename_vendor("Shell", "  Shell  "), FieldWrite::Keep);
        assert_eq!(rename_vendor("Shell", ""), FieldWrite::Keep);
    }

    // --- description --------------------------------------------------------

    #[test]
    fn description_fill_if_empty() {
        assert!(fill_description(None, "A touchless wash.").is_set());
        assert_eq!(
            fill_description(Some("Existing copy"), "New copy"),
            FieldWrite::Keep
        );
        assert_eq!(fill_description(None, "   "), FieldWrite::Keep);
    }
}

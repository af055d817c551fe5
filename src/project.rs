//! Project identity and remote key derivation
//!
//! Projects are implicit: there is no registry entity, a project exists iff
//! the metadata store holds at least one item for it. This module owns the
//! id allow-pattern and the deterministic remote key scheme.

use crate::defaults::{FALLBACK_SUFFIX, MAX_PROJECT_ID_LEN, MAX_SUFFIX_LEN};
use crate::error::{IrisError, Result};

/// Validate a project id against the allow-pattern: first char alphanumeric,
/// then alphanumeric plus `.`, `_`, `-`; 1-128 chars.
pub fn validate_project_id(project_id: &str) -> Result<&str> {
    let id = project_id.trim();
    if id.is_empty() {
        return Err(IrisError::invalid_project("project id is required"));
    }
    if id.len() > MAX_PROJECT_ID_LEN {
        return Err(IrisError::invalid_project(format!(
            "project id is too long ({} > {} chars)",
            id.len(),
            MAX_PROJECT_ID_LEN
        )));
    }

    let mut chars = id.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_alphanumeric() {
        return Err(IrisError::invalid_project(format!(
            "project id must start with an alphanumeric character: {id:?}"
        )));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
        return Err(IrisError::invalid_project(format!(
            "project id contains disallowed characters: {id:?}"
        )));
    }

    Ok(id)
}

/// Validate an item id (UUIDs, as generated on upload)
pub fn validate_item_id(item_id: &str) -> Result<&str> {
    uuid::Uuid::parse_str(item_id)
        .map_err(|_| IrisError::InvalidItemId(item_id.to_string()))?;
    Ok(item_id)
}

/// Extract a safe file suffix (with leading dot) from an original filename.
/// Falls back to `.bin` when absent, over-long, or not plain ASCII.
pub fn safe_suffix(filename: Option<&str>) -> String {
    let Some(name) = filename else {
        return FALLBACK_SUFFIX.to_string();
    };

    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() < MAX_SUFFIX_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext)
        }
        _ => FALLBACK_SUFFIX.to_string(),
    }
}

/// Compose the remote object key for an uploaded blob:
/// `{prefix}{project_id}/{item_id}{suffix}`
pub fn remote_key(prefix: &str, project_id: &str, item_id: &str, suffix: &str) -> String {
    format!("{}{}/{}{}", prefix, project_id, item_id, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_project_ids() {
        for id in ["demo", "p1", "My.Project_2-beta", "0abc", &"a".repeat(128)] {
            assert!(validate_project_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_invalid_project_ids() {
        for id in ["", "  ", ".hidden", "-lead", "has space", "emoji🙂", &"a".repeat(129)] {
            assert!(
                matches!(validate_project_id(id), Err(IrisError::InvalidProject(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_project_id_is_trimmed() {
        assert_eq!(validate_project_id("  demo  ").unwrap(), "demo");
    }

    #[test]
    fn test_item_id_must_be_uuid() {
        assert!(validate_item_id("7f1c1264-17a5-4a5f-a6b2-1f6e6f3d9a10").is_ok());
        assert!(matches!(
            validate_item_id("not-a-uuid"),
            Err(IrisError::InvalidItemId(_))
        ));
    }

    #[test]
    fn test_safe_suffix() {
        assert_eq!(safe_suffix(Some("cat.jpg")), ".jpg");
        assert_eq!(safe_suffix(Some("archive.tar.gz")), ".gz");
        assert_eq!(safe_suffix(Some("noext")), ".bin");
        assert_eq!(safe_suffix(Some(".hidden")), ".bin");
        assert_eq!(safe_suffix(Some("weird.super-long-extension")), ".bin");
        assert_eq!(safe_suffix(None), ".bin");
    }

    #[test]
    fn test_remote_key_shape() {
        let key = remote_key("images/", "demo", "abc-123", ".jpg");
        assert_eq!(key, "images/demo/abc-123.jpg");
    }
}

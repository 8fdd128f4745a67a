//! Partial-update merge contract
//!
//! PATCH-like endpoints and UPDATE events both apply a sparse patch onto a
//! persisted record. Patches are explicit per-entity structs whose fields are
//! `Option<T>`: `None` means "leave the target untouched", `Some(v)` means
//! "overwrite with exactly v". This makes the set-to-empty vs. absent
//! distinction explicit in the type instead of relying on runtime
//! introspection, so a field can never be skipped by accident.

/// Applies the explicitly-present fields of a patch onto `target`.
pub trait MergePatch<T> {
    /// Overwrite every field of `target` for which this patch holds a value.
    /// Returns `true` when at least one field changed.
    fn apply_to(&self, target: &mut T) -> bool;

    /// A patch with no fields set applies as a no-op.
    fn is_empty(&self) -> bool;
}

/// Overwrites `target` with the patch value when one is present and differs.
/// Returns whether the target changed.
pub fn merge_field<T: Clone + PartialEq>(source: &Option<T>, target: &mut T) -> bool {
    match source {
        Some(value) if value != target => {
            *target = value.clone();
            true
        }
        _ => false,
    }
}

/// Like [`merge_field`] but for optional target columns.
pub fn merge_optional_field<T: Clone + PartialEq>(
    source: &Option<T>,
    target: &mut Option<T>,
) -> bool {
    match source {
        Some(value) if Some(value) != target.as_ref() => {
            *target = Some(value.clone());
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_leave_target_untouched() {
        let mut name = "Alice".to_string();
        assert!(!merge_field(&None::<String>, &mut name));
        assert_eq!(name, "Alice");
    }

    #[test]
    fn present_fields_overwrite_exactly() {
        let mut name = "Alice".to_string();
        assert!(merge_field(&Some("".to_string()), &mut name));
        assert_eq!(name, "", "explicit empty string is a real value, not absence");
    }

    #[test]
    fn equal_values_do_not_count_as_changes() {
        let mut dept = Some(3i64);
        assert!(!merge_optional_field(&Some(3i64), &mut dept));
        assert!(merge_optional_field(&Some(4i64), &mut dept));
        assert_eq!(dept, Some(4));
    }
}

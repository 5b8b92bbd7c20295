//! Facility categories and category filters.
//!
//! Facilities carry a localized amenity label (e.g. `"bệnh viện"`). Clients
//! may pass either that label or one of the English tags in
//! [`CATEGORY_TAGS`]; [`resolve_category`] maps the tags and passes anything
//! else through untouched.

/// English tag to stored amenity label.
///
/// This table is part of the public contract and must not change.
pub const CATEGORY_TAGS: [(&str, &str); 8] = [
    ("hospital", "bệnh viện"),
    ("pharmacy", "nhà thuốc"),
    ("doctor", "phòng khám tư nhân"),
    ("clinic", "trạm y tế/phòng khám"),
    ("dentist", "nha khoa"),
    ("alternative", "y học cổ truyền"),
    ("blood_donation", "trung tâm hiến máu"),
    ("vacxin", "trung tâm tiêm vacxin"),
];

/// Label used when a facility has no specialty.
pub const DEFAULT_SPECIALITY: &str = "chung";

/// Map an English category tag to its stored label.
///
/// Unknown values are returned unchanged so raw labels work too.
///
/// # Examples
///
/// ```
/// use healthreach::category::resolve_category;
///
/// assert_eq!(resolve_category("hospital"), "bệnh viện");
/// assert_eq!(resolve_category("nha khoa"), "nha khoa");
/// ```
pub fn resolve_category(value: &str) -> &str {
    CATEGORY_TAGS
        .iter()
        .find(|(tag, _)| *tag == value)
        .map(|(_, label)| *label)
        .unwrap_or(value)
}

/// How a category filter is compared against a facility's category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityFilter {
    /// Case-sensitive equality.
    Exact(String),
    /// Case-insensitive substring.
    Contains(String),
}

impl FacilityFilter {
    /// Exact filter on the resolved label of `value`.
    pub fn exact(value: &str) -> Self {
        FacilityFilter::Exact(resolve_category(value).to_string())
    }

    /// Substring filter on the resolved label of `value`.
    pub fn contains(value: &str) -> Self {
        FacilityFilter::Contains(resolve_category(value).to_string())
    }

    /// Whether a facility category passes this filter.
    pub fn matches(&self, category: &str) -> bool {
        match self {
            FacilityFilter::Exact(label) => category == label,
            FacilityFilter::Contains(needle) => {
                category.to_lowercase().contains(&needle.to_lowercase())
            }
        }
    }

    /// The label to bind for an exact comparison, if this is one.
    pub fn exact_label(&self) -> Option<&str> {
        match self {
            FacilityFilter::Exact(label) => Some(label),
            FacilityFilter::Contains(_) => None,
        }
    }

    /// The needle to bind for a substring comparison, if this is one.
    pub fn contains_label(&self) -> Option<&str> {
        match self {
            FacilityFilter::Contains(needle) => Some(needle),
            FacilityFilter::Exact(_) => None,
        }
    }

    /// The resolved label, whatever the comparison.
    pub fn label(&self) -> &str {
        match self {
            FacilityFilter::Exact(label) | FacilityFilter::Contains(label) => label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_all_tags() {
        assert_eq!(resolve_category("hospital"), "bệnh viện");
        assert_eq!(resolve_category("pharmacy"), "nhà thuốc");
        assert_eq!(resolve_category("doctor"), "phòng khám tư nhân");
        assert_eq!(resolve_category("clinic"), "trạm y tế/phòng khám");
        assert_eq!(resolve_category("dentist"), "nha khoa");
        assert_eq!(resolve_category("alternative"), "y học cổ truyền");
        assert_eq!(resolve_category("blood_donation"), "trung tâm hiến máu");
        assert_eq!(resolve_category("vacxin"), "trung tâm tiêm vacxin");
    }

    #[test]
    fn test_resolve_passes_raw_labels() {
        assert_eq!(resolve_category("nhà thuốc"), "nhà thuốc");
        assert_eq!(resolve_category("Hospital"), "Hospital");
        assert_eq!(resolve_category(""), "");
    }

    #[test]
    fn test_exact_filter_is_case_sensitive() {
        let filter = FacilityFilter::exact("hospital");
        assert!(filter.matches("bệnh viện"));
        assert!(!filter.matches("Bệnh viện"));
        assert!(!filter.matches("bệnh viện đa khoa"));
        assert_eq!(filter.exact_label(), Some("bệnh viện"));
        assert_eq!(filter.contains_label(), None);
    }

    #[test]
    fn test_contains_filter_ignores_case() {
        let filter = FacilityFilter::contains("PHÒNG KHÁM");
        assert!(filter.matches("phòng khám tư nhân"));
        assert!(filter.matches("trạm y tế/phòng khám"));
        assert!(!filter.matches("nha khoa"));
        assert_eq!(filter.contains_label(), Some("PHÒNG KHÁM"));
    }
}

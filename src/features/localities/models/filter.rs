use super::{AdministrativeType, TerritorialLevel};

/// Department filter value that selects rows with missing parent data
pub const INCOMPLETE_LOCATION_SENTINEL: &str = "__incomplete__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartmentFilter {
    Named(String),
    /// Any record missing department, province or district
    IncompleteLocation,
}

impl DepartmentFilter {
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == INCOMPLETE_LOCATION_SENTINEL {
            DepartmentFilter::IncompleteLocation
        } else {
            DepartmentFilter::Named(raw.to_string())
        }
    }
}

/// Structured locality filter. Every present field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalityFilter {
    pub text: Option<String>,
    pub department: Option<DepartmentFilter>,
    pub province: Option<String>,
    pub administrative_type: Option<AdministrativeType>,
    pub territorial_level: Option<TerritorialLevel>,
    pub active: Option<bool>,
}

impl LocalityFilter {
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, |t| t.trim().is_empty())
            && self.department.is_none()
            && self.province.is_none()
            && self.administrative_type.is_none()
            && self.territorial_level.is_none()
            && self.active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_parses_to_incomplete_location() {
        assert_eq!(
            DepartmentFilter::parse("__incomplete__"),
            DepartmentFilter::IncompleteLocation
        );
        assert_eq!(
            DepartmentFilter::parse("Puno"),
            DepartmentFilter::Named("Puno".to_string())
        );
    }

    #[test]
    fn test_blank_text_only_filter_is_empty() {
        let filter = LocalityFilter {
            text: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(filter.is_empty());

        let filter = LocalityFilter {
            active: Some(false),
            ..Default::default()
        };
        assert!(!filter.is_empty());
    }
}

//! Structured filtering and free-text relevance ranking over a catalog snapshot.
//!
//! Everything here is synchronous and works on borrowed data, so callers can
//! run it directly against an `Arc`-held snapshot.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::features::localities::models::{
    AdministrativeType, DepartmentFilter, Locality, LocalityFilter,
};
use crate::shared::text::{fold, folded_contains};

pub const EXACT_NAME_SCORE: u32 = 1000;
pub const PARTIAL_NAME_SCORE: u32 = 500;
pub const HIERARCHY_BONUS_MULTIPLIER: u32 = 5;

const PARTIAL_DEPARTMENT_SCORE: u32 = 100;
const PARTIAL_PROVINCE_SCORE: u32 = 80;
const PARTIAL_DISTRICT_SCORE: u32 = 60;
const PARTIAL_CODE_SCORE: u32 = 40;

/// A catalog entry with its relevance score. Score is 0 for unranked output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredLocality<'a> {
    pub locality: &'a Locality,
    pub score: u32,
}

fn folded_eq(value: Option<&str>, folded: &str) -> bool {
    value.is_some_and(|v| fold(v) == folded)
}

/// True when the locality satisfies every predicate present in `filter`
pub fn matches_filter(locality: &Locality, filter: &LocalityFilter) -> bool {
    if let Some(text) = filter.text.as_deref().map(fold).filter(|t| !t.is_empty()) {
        let hit = [
            Some(locality.name.as_str()),
            locality.department.as_deref(),
            locality.province.as_deref(),
            locality.district.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| folded_contains(field, &text));

        if !hit {
            return false;
        }
    }

    match &filter.department {
        Some(DepartmentFilter::Named(department)) => {
            if !folded_eq(locality.department.as_deref(), &fold(department)) {
                return false;
            }
        }
        Some(DepartmentFilter::IncompleteLocation) => {
            if !locality.has_incomplete_location() {
                return false;
            }
        }
        None => {}
    }

    if let Some(province) = &filter.province {
        if !folded_eq(locality.province.as_deref(), &fold(province)) {
            return false;
        }
    }

    if filter
        .administrative_type
        .is_some_and(|kind| locality.administrative_type != Some(kind))
    {
        return false;
    }

    if filter
        .territorial_level
        .is_some_and(|level| locality.territorial_level != Some(level))
    {
        return false;
    }

    filter.active.map_or(true, |active| locality.active == active)
}

/// Subset of `catalog` matching `filter`, in catalog order
pub fn filter<'a>(catalog: &'a [Locality], filter: &LocalityFilter) -> Vec<&'a Locality> {
    catalog
        .iter()
        .filter(|l| matches_filter(l, filter))
        .collect()
}

fn department_bonus(kind: Option<AdministrativeType>) -> u32 {
    match kind {
        Some(AdministrativeType::Department) => 1000,
        Some(AdministrativeType::Province) => 800,
        Some(AdministrativeType::District) => 200,
        _ => 0,
    }
}

fn province_bonus(kind: Option<AdministrativeType>) -> u32 {
    match kind {
        Some(AdministrativeType::Province) => 1000,
        Some(AdministrativeType::District) => 700,
        Some(k) if k.is_below_district() => 400,
        _ => 0,
    }
}

fn district_bonus(kind: Option<AdministrativeType>) -> u32 {
    match kind {
        Some(AdministrativeType::District) => 1000,
        Some(k) if k.is_below_district() => 600,
        _ => 0,
    }
}

/// Relevance of `locality` for an already folded, non-empty query.
///
/// Returns `None` when no rule matched, which excludes the locality from
/// ranked output. A rule worth 0 points still counts as a match.
pub fn score(locality: &Locality, query: &str) -> Option<u32> {
    let kind = locality.administrative_type;
    let name = fold(&locality.name);

    let mut total = 0;
    let mut matched = false;
    let mut name_matched = false;

    if name == query {
        total += EXACT_NAME_SCORE;
        matched = true;
        name_matched = true;
    } else if name.contains(query) {
        total += PARTIAL_NAME_SCORE;
        matched = true;
        name_matched = true;
    }

    if folded_eq(locality.department.as_deref(), query) {
        total += department_bonus(kind);
        matched = true;
    }
    if folded_eq(locality.province.as_deref(), query) {
        total += province_bonus(kind);
        matched = true;
    }
    if folded_eq(locality.district.as_deref(), query) {
        total += district_bonus(kind);
        matched = true;
    }

    if !matched {
        let fallback = [
            (locality.department.as_deref(), PARTIAL_DEPARTMENT_SCORE),
            (locality.province.as_deref(), PARTIAL_PROVINCE_SCORE),
            (locality.district.as_deref(), PARTIAL_DISTRICT_SCORE),
            (locality.official_code.as_deref(), PARTIAL_CODE_SCORE),
        ]
        .into_iter()
        .find_map(|(field, points)| {
            field
                .filter(|f| folded_contains(f, query))
                .map(|_| points)
        });

        if let Some(points) = fallback {
            total += points;
            matched = true;
        }
    }

    if !matched {
        return None;
    }

    if !name_matched {
        total += locality.level_rank() * HIERARCHY_BONUS_MULTIPLIER;
    }

    Some(total)
}

fn alphabetical(a: &Locality, b: &Locality) -> Ordering {
    fold(&a.name).cmp(&fold(&b.name))
}

/// Scores and sorts candidates for `query`.
///
/// Sorted by score, then level rank (both descending), then name. Remaining
/// ties keep input order. A blank query returns every candidate
/// alphabetically with score 0.
pub fn rank<'a, I>(candidates: I, query: &str) -> Vec<ScoredLocality<'a>>
where
    I: IntoIterator<Item = &'a Locality>,
{
    let query = fold(query);

    if query.is_empty() {
        let mut all: Vec<ScoredLocality<'a>> = candidates
            .into_iter()
            .map(|locality| ScoredLocality { locality, score: 0 })
            .collect();
        all.sort_by(|a, b| alphabetical(a.locality, b.locality));
        return all;
    }

    let mut scored: Vec<ScoredLocality<'a>> = candidates
        .into_iter()
        .filter_map(|locality| {
            score(locality, &query).map(|score| ScoredLocality { locality, score })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.locality.level_rank().cmp(&a.locality.level_rank()))
            .then_with(|| alphabetical(a.locality, b.locality))
    });

    scored
}

/// Entry point used by the service layer.
///
/// - no query and no filter: the catalog unchanged
/// - filter only: the filtered subset in catalog order
/// - query: the (optionally filtered) candidates ranked
pub fn search<'a>(
    catalog: &'a [Locality],
    query: Option<&str>,
    locality_filter: Option<&LocalityFilter>,
) -> Vec<ScoredLocality<'a>> {
    let locality_filter = locality_filter.filter(|f| !f.is_empty());

    let candidates: Vec<&'a Locality> = match locality_filter {
        Some(f) => filter(catalog, f),
        None => catalog.iter().collect(),
    };

    match query {
        Some(q) => rank(candidates, q),
        None => candidates
            .into_iter()
            .map(|locality| ScoredLocality { locality, score: 0 })
            .collect(),
    }
}

/// Distinct values de-duplicated by folded form, first spelling wins, sorted
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for value in values {
        seen.entry(fold(value)).or_insert_with(|| value.trim().to_string());
    }
    seen.into_values().collect()
}

/// Every department named in the catalog
pub fn departments(catalog: &[Locality]) -> Vec<String> {
    distinct(catalog.iter().filter_map(|l| {
        if l.administrative_type == Some(AdministrativeType::Department) {
            Some(l.name.as_str())
        } else {
            l.department.as_deref()
        }
    }))
}

/// Provinces belonging to `department`
pub fn provinces(catalog: &[Locality], department: &str) -> Vec<String> {
    let department = fold(department);

    distinct(
        catalog
            .iter()
            .filter(|l| folded_eq(l.department.as_deref(), &department))
            .filter_map(|l| {
                if l.administrative_type == Some(AdministrativeType::Province) {
                    Some(l.name.as_str())
                } else {
                    l.province.as_deref()
                }
            }),
    )
}

/// Districts belonging to `department` / `province`
pub fn districts(catalog: &[Locality], department: &str, province: &str) -> Vec<String> {
    let department = fold(department);
    let province = fold(province);

    distinct(
        catalog
            .iter()
            .filter(|l| {
                folded_eq(l.department.as_deref(), &department)
                    && folded_eq(l.province.as_deref(), &province)
            })
            .filter_map(|l| {
                if l.administrative_type == Some(AdministrativeType::District) {
                    Some(l.name.as_str())
                } else {
                    l.district.as_deref()
                }
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::localities::models::TerritorialLevel;
    use crate::shared::test_helpers::locality;
    use AdministrativeType as T;

    fn names(results: &[ScoredLocality<'_>]) -> Vec<String> {
        results.iter().map(|r| r.locality.name.clone()).collect()
    }

    #[test]
    fn test_exact_name_scores_1000_and_ranks_first() {
        let catalog = vec![
            locality("Puno", T::Province, None, None, None),
            locality("Punotambo", T::Town, Some("PUNO"), None, None),
        ];

        let results = rank(&catalog, "puno");

        assert_eq!(results[0].locality.name, "Puno");
        assert_eq!(results[0].score, 1000);
    }

    #[test]
    fn test_single_exact_match_has_score_1000() {
        let catalog = vec![locality("Puno", T::Province, None, None, None)];

        let results = search(&catalog, Some("puno"), None);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 1000);
    }

    #[test]
    fn test_department_match_on_district_adds_bonus_and_hierarchy() {
        let catalog = vec![locality("X", T::District, Some("PUNO"), None, None)];

        let results = search(&catalog, Some("PUNO"), None);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 200 + 5 * 5);
    }

    #[test]
    fn test_zero_point_rule_still_counts_as_match() {
        // Department match on a town is worth 0 but keeps the record in the ranking
        let town = locality("Chucasuyo", T::Town, Some("PUNO"), None, None);

        assert_eq!(score(&town, "puno"), Some(2 * HIERARCHY_BONUS_MULTIPLIER));
    }

    #[test]
    fn test_partial_fallback_takes_first_hit_in_order() {
        let mut record = locality("Camicachi", T::PopulatedPlace, Some("PUNO"), Some("PUNO"), None);
        record.official_code = Some("210101".to_string());

        // "un" hits both department and province; department wins
        assert_eq!(score(&record, "un"), Some(100 + 3 * 5));
        // Only the official code contains "2101"
        assert_eq!(score(&record, "2101"), Some(40 + 3 * 5));
    }

    #[test]
    fn test_partial_name_without_hierarchy_bonus() {
        let record = locality("Juliaca", T::City, Some("PUNO"), Some("SAN ROMAN"), None);

        assert_eq!(score(&record, "juli"), Some(PARTIAL_NAME_SCORE));
    }

    #[test]
    fn test_unmatched_candidates_are_excluded() {
        let catalog = vec![
            locality("Ilave", T::District, Some("PUNO"), Some("EL COLLAO"), None),
            locality("Cusco", T::Department, None, None, None),
        ];

        let results = rank(&catalog, "ilave");

        assert_eq!(names(&results), vec!["Ilave"]);
    }

    #[test]
    fn test_query_is_diacritic_insensitive() {
        let catalog = vec![locality("Juliaca", T::City, Some("PUNO"), None, None)];

        assert_eq!(rank(&catalog, "JULIÁCA")[0].score, EXACT_NAME_SCORE);
    }

    #[test]
    fn test_ties_break_by_level_then_name() {
        let catalog = vec![
            locality("Zepita", T::Town, Some("PUNO"), Some("CHUCUITO"), Some("POMATA")),
            locality("Pomata", T::District, Some("PUNO"), Some("CHUCUITO"), None),
            locality("Ccopamaya", T::Town, Some("PUNO"), Some("CHUCUITO"), Some("POMATA")),
        ];

        // All three match on partial name 500; district outranks towns, towns go A-Z
        let results = rank(&catalog, "a");

        assert_eq!(names(&results), vec!["Pomata", "Ccopamaya", "Zepita"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let catalog = vec![
            locality("Puno", T::Department, None, None, None),
            locality("Puno", T::Province, Some("PUNO"), None, None),
            locality("Puno", T::District, Some("PUNO"), Some("PUNO"), None),
            locality("Paucarcolla", T::District, Some("PUNO"), Some("PUNO"), None),
            locality("Uros Chulluni", T::PopulatedPlace, Some("PUNO"), Some("PUNO"), Some("PUNO")),
        ];

        let first = rank(&catalog, "puno");
        for _ in 0..10 {
            let again = rank(&catalog, "puno");
            let ids: Vec<_> = again.iter().map(|r| r.locality.id).collect();
            let expected: Vec<_> = first.iter().map(|r| r.locality.id).collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_level_orders_equal_name_matches() {
        let catalog = vec![
            locality("Puno", T::District, Some("PUNO"), Some("PUNO"), None),
            locality("Puno", T::Department, None, None, None),
            locality("Puno", T::Province, Some("PUNO"), None, None),
        ];

        let results = rank(&catalog, "Puno");
        let kinds: Vec<_> = results
            .iter()
            .map(|r| r.locality.administrative_type)
            .collect();

        // Department: 1000. Province: 1000 + 800 (department bonus). District: 1000 + 200 + 700.
        assert_eq!(
            kinds,
            vec![Some(T::District), Some(T::Province), Some(T::Department)]
        );
        assert_eq!(results[0].score, 1900);
        assert_eq!(results[1].score, 1800);
        assert_eq!(results[2].score, 1000);
    }

    #[test]
    fn test_blank_query_returns_alphabetical() {
        let catalog = vec![
            locality("Zepita", T::Department, None, None, None),
            locality("Juli", T::District, None, None, None),
            locality("ácora", T::Town, None, None, None),
            locality("Ilave", T::Province, None, None, None),
        ];

        let results = search(&catalog, Some("  "), None);

        assert_eq!(names(&results), vec!["ácora", "Ilave", "Juli", "Zepita"]);
        assert!(results.iter().all(|r| r.score == 0));
    }

    #[test]
    fn test_search_without_query_or_filter_keeps_catalog_order() {
        let catalog = vec![
            locality("Juli", T::District, None, None, None),
            locality("Acora", T::District, None, None, None),
        ];

        let results = search(&catalog, None, None);
        assert_eq!(names(&results), vec!["Juli", "Acora"]);

        let empty_filter = LocalityFilter::default();
        let results = search(&catalog, None, Some(&empty_filter));
        assert_eq!(names(&results), vec!["Juli", "Acora"]);
    }

    #[test]
    fn test_filter_only_keeps_catalog_order() {
        let mut inactive = locality("Pilcuyo", T::District, Some("PUNO"), Some("EL COLLAO"), None);
        inactive.active = false;
        let catalog = vec![
            locality("Santa Rosa", T::District, Some("PUNO"), Some("EL COLLAO"), None),
            locality("Cusco", T::Department, None, None, None),
            inactive,
            locality("Ilave", T::District, Some("Puno"), Some("El Collao"), None),
        ];

        let f = LocalityFilter {
            department: Some(DepartmentFilter::Named("puno".to_string())),
            province: Some("EL COLLAO".to_string()),
            active: Some(true),
            ..Default::default()
        };

        let results = search(&catalog, None, Some(&f));
        assert_eq!(names(&results), vec!["Santa Rosa", "Ilave"]);
    }

    #[test]
    fn test_incomplete_location_sentinel() {
        let catalog = vec![
            locality("Ilave", T::District, Some("PUNO"), Some("EL COLLAO"), Some("ILAVE")),
            locality("Chijichaya", T::PopulatedPlace, Some("PUNO"), None, None),
        ];

        let f = LocalityFilter {
            department: Some(DepartmentFilter::IncompleteLocation),
            ..Default::default()
        };

        assert_eq!(
            filter(&catalog, &f)
                .iter()
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>(),
            vec!["Chijichaya"]
        );
    }

    #[test]
    fn test_text_filter_and_type_and_level() {
        let catalog = vec![
            locality("Juli", T::District, Some("PUNO"), Some("CHUCUITO"), None),
            locality("Juliaca", T::City, Some("PUNO"), Some("SAN ROMAN"), None),
            locality("Chucuito", T::Province, Some("PUNO"), None, None),
        ];

        let f = LocalityFilter {
            text: Some("chucuito".to_string()),
            territorial_level: Some(TerritorialLevel::District),
            ..Default::default()
        };
        assert_eq!(filter(&catalog, &f).len(), 1);

        let f = LocalityFilter {
            text: Some("JULI".to_string()),
            administrative_type: Some(T::City),
            ..Default::default()
        };
        assert_eq!(filter(&catalog, &f)[0].name, "Juliaca");
    }

    #[test]
    fn test_query_ranks_only_filtered_candidates() {
        let catalog = vec![
            locality("Puno", T::Department, None, None, None),
            locality("Puno", T::Province, Some("PUNO"), None, None),
        ];

        let f = LocalityFilter {
            administrative_type: Some(T::Province),
            ..Default::default()
        };

        let results = search(&catalog, Some("puno"), Some(&f));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].locality.administrative_type, Some(T::Province));
    }

    #[test]
    fn test_hierarchy_listings() {
        let catalog = vec![
            locality("Puno", T::Department, None, None, None),
            locality("El Collao", T::Province, Some("PUNO"), None, None),
            locality("Ilave", T::District, Some("Puno"), Some("El Collao"), None),
            locality("Pilcuyo", T::District, Some("PUNO"), Some("EL COLLAO"), None),
            locality("Chijichaya", T::PopulatedPlace, Some("PUNO"), Some("EL COLLAO"), Some("ILAVE")),
            locality("Juli", T::District, Some("PUNO"), Some("CHUCUITO"), None),
            locality("Wanchaq", T::District, Some("CUSCO"), Some("CUSCO"), None),
        ];

        assert_eq!(departments(&catalog), vec!["CUSCO", "Puno"]);
        assert_eq!(provinces(&catalog, "puno"), vec!["CHUCUITO", "El Collao"]);
        assert_eq!(
            districts(&catalog, "PUNO", "el collao"),
            vec!["Ilave", "Pilcuyo"]
        );
    }
}

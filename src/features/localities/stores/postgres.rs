use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::LocalityStore;
use crate::core::error::{AppError, Result};
use crate::features::localities::models::{
    DepartmentFilter, LocalityDraft, LocalityFilter, LocalityRecord,
};

const LOCALITY_COLUMNS: &str = "id, name, administrative_type, territorial_level, department, \
     province, district, official_code, lat, lng, description, observations, is_active, \
     created_at, updated_at";

/// Locality store backed by the `localities` table
pub struct PgLocalityStore {
    pool: PgPool,
}

impl PgLocalityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `%text%` with LIKE wildcards in `text` matched literally
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Appends `WHERE ...` predicates for every present filter field
fn push_filter_conditions(builder: &mut QueryBuilder<'_, Postgres>, filter: &LocalityFilter) {
    let mut has_where = false;
    let mut next_clause = |builder: &mut QueryBuilder<'_, Postgres>| {
        builder.push(if has_where { " AND " } else { " WHERE " });
        has_where = true;
    };

    if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = contains_pattern(text);
        next_clause(builder);
        builder
            .push("(name ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR department ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR province ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR district ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }

    match &filter.department {
        Some(DepartmentFilter::Named(department)) => {
            next_clause(builder);
            builder
                .push("UPPER(TRIM(department)) = UPPER(TRIM(")
                .push_bind(department.clone())
                .push("))");
        }
        Some(DepartmentFilter::IncompleteLocation) => {
            next_clause(builder);
            builder.push(
                "(COALESCE(TRIM(department), '') = '' \
                 OR COALESCE(TRIM(province), '') = '' \
                 OR COALESCE(TRIM(district), '') = '')",
            );
        }
        None => {}
    }

    if let Some(province) = &filter.province {
        next_clause(builder);
        builder
            .push("UPPER(TRIM(province)) = UPPER(TRIM(")
            .push_bind(province.clone())
            .push("))");
    }

    if let Some(kind) = filter.administrative_type {
        next_clause(builder);
        builder.push("administrative_type = ").push_bind(kind);
    }

    if let Some(level) = filter.territorial_level {
        next_clause(builder);
        builder.push("territorial_level = ").push_bind(level);
    }

    if let Some(active) = filter.active {
        next_clause(builder);
        builder.push("is_active = ").push_bind(active);
    }
}

#[async_trait]
impl LocalityStore for PgLocalityStore {
    async fn list_all(&self) -> Result<Vec<LocalityRecord>> {
        let query = format!(
            "SELECT {} FROM localities ORDER BY created_at ASC, id ASC",
            LOCALITY_COLUMNS
        );

        sqlx::query_as::<_, LocalityRecord>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list localities: {:?}", e);
                AppError::Database(e)
            })
    }

    async fn list_by_filter(&self, filter: &LocalityFilter) -> Result<Vec<LocalityRecord>> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM localities", LOCALITY_COLUMNS));
        push_filter_conditions(&mut builder, filter);
        builder.push(" ORDER BY created_at ASC, id ASC");

        builder
            .build_query_as::<LocalityRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to filter localities: {:?}", e);
                AppError::Database(e)
            })
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<LocalityRecord>> {
        let query = format!("SELECT {} FROM localities WHERE id = $1", LOCALITY_COLUMNS);

        sqlx::query_as::<_, LocalityRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch locality {}: {:?}", id, e);
                AppError::Database(e)
            })
    }

    async fn create(&self, draft: &LocalityDraft) -> Result<LocalityRecord> {
        let query = format!(
            r#"
            INSERT INTO localities (
                id, name, administrative_type, territorial_level, department, province,
                district, official_code, lat, lng, description, observations, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            LOCALITY_COLUMNS
        );

        sqlx::query_as::<_, LocalityRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(&draft.name)
            .bind(draft.administrative_type)
            .bind(draft.territorial_level)
            .bind(&draft.department)
            .bind(&draft.province)
            .bind(&draft.district)
            .bind(&draft.official_code)
            .bind(draft.coordinates.map(|c| c.latitude))
            .bind(draft.coordinates.map(|c| c.longitude))
            .bind(&draft.description)
            .bind(&draft.observations)
            .bind(draft.active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create locality '{}': {:?}", draft.name, e);
                AppError::Database(e)
            })
    }

    async fn update(&self, id: Uuid, draft: &LocalityDraft) -> Result<LocalityRecord> {
        let query = format!(
            r#"
            UPDATE localities
            SET name = $2, administrative_type = $3, territorial_level = $4, department = $5,
                province = $6, district = $7, official_code = $8, lat = $9, lng = $10,
                description = $11, observations = $12, is_active = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LOCALITY_COLUMNS
        );

        sqlx::query_as::<_, LocalityRecord>(&query)
            .bind(id)
            .bind(&draft.name)
            .bind(draft.administrative_type)
            .bind(draft.territorial_level)
            .bind(&draft.department)
            .bind(&draft.province)
            .bind(&draft.district)
            .bind(&draft.official_code)
            .bind(draft.coordinates.map(|c| c.latitude))
            .bind(draft.coordinates.map(|c| c.longitude))
            .bind(&draft.description)
            .bind(&draft.observations)
            .bind(draft.active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update locality {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Locality with id '{}' not found", id)))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<LocalityRecord> {
        let query = format!(
            "UPDATE localities SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            LOCALITY_COLUMNS
        );

        sqlx::query_as::<_, LocalityRecord>(&query)
            .bind(id)
            .bind(active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to toggle locality {}: {:?}", id, e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("Locality with id '{}' not found", id)))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM localities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete locality {}: {:?}", id, e);
                AppError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Locality with id '{}' not found",
                id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::localities::models::AdministrativeType;

    #[test]
    fn test_empty_filter_adds_no_where_clause() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM localities");
        push_filter_conditions(&mut builder, &LocalityFilter::default());
        assert_eq!(builder.sql(), "SELECT id FROM localities");
    }

    #[test]
    fn test_text_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("ilave"), "%ilave%");
        assert_eq!(contains_pattern("50%_a\\b"), "%50\\%\\_a\\\\b%");

        let filter = LocalityFilter {
            text: Some("50%".to_string()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM localities");
        push_filter_conditions(&mut builder, &filter);

        assert!(builder.sql().contains("(name ILIKE $1 ESCAPE '\\' OR department ILIKE $2"));
    }

    #[test]
    fn test_filter_conditions_are_and_combined() {
        let filter = LocalityFilter {
            text: Some("ila".to_string()),
            department: Some(DepartmentFilter::Named("Puno".to_string())),
            administrative_type: Some(AdministrativeType::District),
            active: Some(true),
            ..Default::default()
        };

        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM localities");
        push_filter_conditions(&mut builder, &filter);
        let sql = builder.sql();

        assert!(sql.contains(" WHERE (name ILIKE $1"));
        assert!(sql.contains(" AND UPPER(TRIM(department)) = UPPER(TRIM($5))"));
        assert!(sql.contains(" AND administrative_type = $6"));
        assert!(sql.contains(" AND is_active = $7"));
        assert_eq!(sql.matches(" WHERE ").count(), 1);
    }

    #[test]
    fn test_incomplete_location_filter_has_no_binding() {
        let filter = LocalityFilter {
            department: Some(DepartmentFilter::IncompleteLocation),
            ..Default::default()
        };

        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM localities");
        push_filter_conditions(&mut builder, &filter);

        assert!(builder.sql().contains("COALESCE(TRIM(district), '') = ''"));
        assert!(!builder.sql().contains('$'));
    }
}

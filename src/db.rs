use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::config::DEFAULT_ROW_CAP;
use crate::error::Result;
use crate::models::{
    BuildingRecord, FixtureRecord, FloorRecord, IssueRecord, KeyRecord, OccupantRecord,
    RoomRecord,
};
use crate::retry::{with_backoff, RetryPolicy};

/// Read-only query description against one externally-owned table.
/// Filter and order clauses are plain SQL fragments; every spec in this
/// crate is a fixed constant per report type, nothing is user-supplied.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub filter: Option<&'static str>,
    pub order_by: Option<&'static str>,
    pub limit: u32,
}

impl QuerySpec {
    pub fn new(table: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            table,
            columns,
            filter: None,
            order_by: None,
            limit: DEFAULT_ROW_CAP,
        }
    }

    pub fn filter(mut self, clause: &'static str) -> Self {
        self.filter = Some(clause);
        self
    }

    pub fn order_by(mut self, clause: &'static str) -> Self {
        self.order_by = Some(clause);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);
        if let Some(filter) = self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if let Some(order) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        sql.push_str(&format!(" LIMIT {}", self.limit));
        sql
    }
}

#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub data: Vec<T>,
    pub count: usize,
    /// True iff the row count hit the cap. A heuristic, not an exact
    /// total: the table may hold exactly `limit` rows.
    pub has_more: bool,
}

/// Runs the spec under the retry policy and decodes every row with
/// `map_row`. An empty result is a valid result, never an error.
pub async fn execute_query<T, F>(
    pool: &PgPool,
    spec: &QuerySpec,
    map_row: F,
    policy: &RetryPolicy,
) -> Result<QueryResult<T>>
where
    F: Fn(&PgRow) -> Result<T>,
{
    let sql = spec.to_sql();
    debug!(table = spec.table, %sql, "executing report query");

    let rows = with_backoff(policy, || sqlx::query(&sql).fetch_all(pool)).await?;

    let mut data = Vec::with_capacity(rows.len());
    for row in &rows {
        data.push(map_row(row)?);
    }
    let count = data.len();
    let has_more = count as u32 == spec.limit;
    debug!(table = spec.table, count, has_more, "query finished");
    Ok(QueryResult {
        data,
        count,
        has_more,
    })
}

pub fn issue_from_row(row: &PgRow) -> Result<IssueRecord> {
    Ok(IssueRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        issue_type: row.try_get("issue_type")?,
        location: row.try_get("location")?,
        assigned_to: row.try_get("assigned_to")?,
        created_at: row.try_get("created_at")?,
        due_date: row.try_get("due_date")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

pub fn fixture_from_row(row: &PgRow) -> Result<FixtureRecord> {
    Ok(FixtureRecord {
        id: row.try_get("id")?,
        label: row.try_get("label")?,
        technology: row.try_get("technology")?,
        status: row.try_get("status")?,
        wattage: row.try_get("wattage")?,
        room: row.try_get("room")?,
        installed_at: row.try_get("installed_at")?,
    })
}

pub fn occupant_from_row(row: &PgRow) -> Result<OccupantRecord> {
    Ok(OccupantRecord {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        department: row.try_get("department")?,
        status: row.try_get("status")?,
        room: row.try_get("room")?,
        building: row.try_get("building")?,
    })
}

pub fn key_from_row(row: &PgRow) -> Result<KeyRecord> {
    Ok(KeyRecord {
        id: row.try_get("id")?,
        key_code: row.try_get("key_code")?,
        assignee: row.try_get("assignee")?,
        room: row.try_get("room")?,
        building: row.try_get("building")?,
        status: row.try_get("status")?,
        issued_at: row.try_get("issued_at")?,
        due_back: row.try_get("due_back")?,
        returned_at: row.try_get("returned_at")?,
    })
}

pub fn room_from_row(row: &PgRow) -> Result<RoomRecord> {
    Ok(RoomRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        room_type: row.try_get("room_type")?,
        capacity: row.try_get("capacity")?,
        floor: row.try_get("floor")?,
        building: row.try_get("building")?,
    })
}

pub fn building_from_row(row: &PgRow) -> Result<BuildingRecord> {
    Ok(BuildingRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
    })
}

pub fn floor_from_row(row: &PgRow) -> Result<FloorRecord> {
    Ok(FloorRecord {
        id: row.try_get("id")?,
        building: row.try_get("building")?,
        level: row.try_get("level")?,
        name: row.try_get("name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_sql_with_all_clauses() {
        let spec = QuerySpec::new("issues", &["id", "title", "status"])
            .filter("status <> 'archived'")
            .order_by("created_at DESC")
            .limit(250);
        assert_eq!(
            spec.to_sql(),
            "SELECT id, title, status FROM issues \
             WHERE status <> 'archived' ORDER BY created_at DESC LIMIT 250"
        );
    }

    #[test]
    fn to_sql_defaults_to_the_row_cap() {
        let spec = QuerySpec::new("rooms", &["id", "name"]);
        assert_eq!(spec.to_sql(), "SELECT id, name FROM rooms LIMIT 1000");
    }

    #[test]
    fn limit_never_drops_to_zero() {
        let spec = QuerySpec::new("keys", &["id"]).limit(0);
        assert_eq!(spec.limit, 1);
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

// Row types for the externally-owned facilities tables. This crate is a
// read-only consumer: column names here are part of the contract with the
// hosted database, not a schema this crate owns.

#[derive(Debug, Clone, Serialize)]
pub struct IssueRecord {
    pub id: Uuid,
    pub title: String,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub issue_type: Option<String>,
    pub location: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixtureRecord {
    pub id: Uuid,
    pub label: String,
    pub technology: Option<String>,
    pub status: Option<String>,
    pub wattage: Option<i32>,
    pub room: Option<String>,
    pub installed_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OccupantRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub room: Option<String>,
    pub building: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyRecord {
    pub id: Uuid,
    pub key_code: String,
    pub assignee: Option<String>,
    pub room: Option<String>,
    pub building: Option<String>,
    pub status: Option<String>,
    pub issued_at: Option<NaiveDate>,
    pub due_back: Option<NaiveDate>,
    pub returned_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomRecord {
    pub id: Uuid,
    pub name: String,
    pub room_type: Option<String>,
    pub capacity: Option<i32>,
    pub floor: Option<String>,
    pub building: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingRecord {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FloorRecord {
    pub id: Uuid,
    pub building: String,
    pub level: i32,
    pub name: Option<String>,
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state of a todo item. `Deleted` marks a soft-deleted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ItemStatus {
    #[default]
    Doing = 0,
    Done = 1,
    Deleted = 2,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 3] = [ItemStatus::Doing, ItemStatus::Done, ItemStatus::Deleted];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Doing => "Doing",
            ItemStatus::Done => "Done",
            ItemStatus::Deleted => "Deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status string: {0}")]
pub struct ParseStatusError(String);

impl FromStr for ItemStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl ToSql for ItemStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ItemStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: ItemStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of a create request. The generated id is kept off the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoItemCreation {
    #[serde(skip)]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: ItemStatus,
}

/// Partial update: `None` leaves the column as stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ItemStatus>,
}

impl TodoItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }
}

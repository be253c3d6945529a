use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Задачи одной партиции, упорядоченные по `SortKey`.
pub type Partition = BTreeMap<SortKey, Task>;

/// Ключ партиции: владелец и период (например, водитель и неделя).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKey {
    owner_name: String,
    period: i64,
}

/// Ключ задачи внутри партиции: день и час начала.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKey {
    day: i64,
    start_hour: i64,
}

/// Значение, хранящееся в таблице.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub operation: String,
    pub start_hour: i64,
    pub duration: i64,
}

impl PartitionKey {
    pub fn new(
        owner_name: impl Into<String>,
        period: i64,
    ) -> Self {
        Self {
            owner_name: owner_name.into(),
            period,
        }
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn period(&self) -> i64 {
        self.period
    }
}

impl SortKey {
    pub fn new(
        day: i64,
        start_hour: i64,
    ) -> Self {
        Self { day, start_hour }
    }

    pub fn day(&self) -> i64 {
        self.day
    }

    pub fn start_hour(&self) -> i64 {
        self.start_hour
    }
}

impl Task {
    pub fn new(
        operation: impl Into<String>,
        start_hour: i64,
        duration: i64,
    ) -> Self {
        Self {
            operation: operation.into(),
            start_hour,
            duration,
        }
    }
}

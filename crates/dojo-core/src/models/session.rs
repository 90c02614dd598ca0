use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Entity, EntityKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl Entity for Location {
    const KIND: EntityKind = EntityKind::Location;
}

/// A scheduled training occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub date_time: DateTime<Utc>,
    pub location_id: String,
    #[serde(default)]
    pub level: Option<String>,
}

impl Entity for Session {
    const KIND: EntityKind = EntityKind::Session;
}

impl Session {
    /// Calendar year the session took place in.
    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.date_time.year()
    }
}

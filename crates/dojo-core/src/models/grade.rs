use serde::{Deserialize, Serialize};

use crate::store::{Entity, EntityKind};

/// One rung of the belt/grade ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Grade {
    pub id: String,
    /// Display order. Gaps and duplicates are legal.
    pub order: i32,
    pub name: String,
    /// Cord colors as hex strings, primary first.
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub points_required: u32,
}

impl Entity for Grade {
    const KIND: EntityKind = EntityKind::Grade;
}

impl Grade {
    pub fn primary_color(&self) -> Option<&str> {
        self.colors.first().map(String::as_str)
    }
}

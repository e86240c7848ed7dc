use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recent order row, from `GET /orders/recent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub placed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn customer_display(&self) -> &str {
        self.customer_name.as_deref().unwrap_or("(guest)")
    }

    pub fn status_display(&self) -> &str {
        self.status.as_deref().unwrap_or("-")
    }

    pub fn placed_display(&self) -> String {
        self.placed_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

use serde::{Deserialize, Serialize};

/// KPI summary for the dashboard tab, from `GET /dashboard/summary`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(default)]
    pub revenue_today: f64,
    #[serde(default)]
    pub order_count: i64,
    #[serde(default)]
    pub customer_count: i64,
    #[serde(default)]
    pub low_stock_count: i64,
}

impl DashboardSummary {
    pub fn revenue_display(&self) -> String {
        format!("${:.2}", self.revenue_today)
    }
}

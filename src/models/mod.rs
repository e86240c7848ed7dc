//! Domain models for shop-management data.
//!
//! These structs mirror the camelCase JSON payloads returned by the
//! backend API (inside its `{succeeded, data, message}` envelope).

pub mod dashboard;
pub mod order;
pub mod profile;

pub use dashboard::DashboardSummary;
pub use order::Order;
pub use profile::Profile;

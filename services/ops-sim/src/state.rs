// services/ops-sim/src/state.rs
//
// Compliance ledger snapshot - the record published on every tick
//

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::simulation::Bounded;

/// Full state published by the compliance simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSnapshot {
    /// Newest first, never longer than the configured capacity
    pub transactions: Vec<Transaction>,
    pub critical_issues: Vec<Issue>,
    pub traceability_data: Vec<ProductTrace>,
    pub compliance_metrics: ComplianceMetrics,
    pub last_update: DateTime<Utc>,
    pub network_status: NetworkStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    #[default]
    Synchronized,
    Syncing,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    FoodSafety,
    SupplierAudit,
    ProductRecall,
    CarbonTracking,
}

impl TransactionType {
    pub const ALL: [TransactionType; 4] = [
        TransactionType::FoodSafety,
        TransactionType::SupplierAudit,
        TransactionType::ProductRecall,
        TransactionType::CarbonTracking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::FoodSafety => "food_safety",
            TransactionType::SupplierAudit => "supplier_audit",
            TransactionType::ProductRecall => "product_recall",
            TransactionType::CarbonTracking => "carbon_tracking",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Verified,
    ActionRequired,
    Pending,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 3] = [
        TransactionStatus::Verified,
        TransactionStatus::ActionRequired,
        TransactionStatus::Pending,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Critical, Priority::High, Priority::Medium, Priority::Low];
}

/// A ledger entry. Never modified after it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub details: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Transaction {
    /// Relative label such as "just now" or "5 min ago"
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        let secs = (now - self.timestamp).num_seconds().max(0);
        match secs {
            0..=59 => "just now".to_string(),
            60..=3_599 => format!("{} min ago", secs / 60),
            3_600..=86_399 => format!("{} hr ago", secs / 3_600),
            _ => format!("{} d ago", secs / 86_400),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub priority: Priority,
    pub affected_products: u32,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTrace {
    pub product_id: String,
    pub product_name: String,
    pub origin: String,
    pub current_location: String,
    pub journey: Vec<String>,
    pub temperature_c: f64,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceMetrics {
    pub food_safety_score: f64,
    pub supplier_compliance: f64,
    pub carbon_footprint_reduction: f64,
    pub audit_completion_rate: f64,
    pub traceability_coverage: f64,
    pub verified_transactions: u64,
    pub pending_audits: u32,
}

impl ComplianceMetrics {
    pub const FOOD_SAFETY_SCORE: Bounded = Bounded::new(95.0, 100.0);
    pub const SUPPLIER_COMPLIANCE: Bounded = Bounded::new(85.0, 100.0);
    pub const CARBON_FOOTPRINT_REDUCTION: Bounded = Bounded::new(0.0, 100.0);
    pub const AUDIT_COMPLETION_RATE: Bounded = Bounded::new(80.0, 100.0);
    pub const TRACEABILITY_COVERAGE: Bounded = Bounded::new(90.0, 100.0);
    pub const PENDING_AUDITS: Bounded = Bounded::new(0.0, 50.0);

    /// True when every bounded field sits inside its declared range
    pub fn within_bounds(&self) -> bool {
        Self::FOOD_SAFETY_SCORE.contains(self.food_safety_score)
            && Self::SUPPLIER_COMPLIANCE.contains(self.supplier_compliance)
            && Self::CARBON_FOOTPRINT_REDUCTION.contains(self.carbon_footprint_reduction)
            && Self::AUDIT_COMPLETION_RATE.contains(self.audit_completion_rate)
            && Self::TRACEABILITY_COVERAGE.contains(self.traceability_coverage)
            && Self::PENDING_AUDITS.contains(self.pending_audits as f64)
    }
}

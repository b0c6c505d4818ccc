// services/ops-sim/src/mock.rs
//
// Compliance ledger mock data generator
// Seeds a plausible snapshot and perturbs it on every tick
//

use std::fmt::Write;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use svckit::metrics;

use crate::config::PublisherConfig;
use crate::simulation::{Simulation, TickContext};
use crate::state::{
    ComplianceMetrics, ComplianceSnapshot, Issue, NetworkStatus, Priority, ProductTrace,
    Transaction, TransactionStatus, TransactionType,
};

const LOCATIONS: [&str; 6] = [
    "Store #142 - Downtown",
    "Store #087 - Riverside",
    "Store #215 - Westfield",
    "Store #033 - Harbor Point",
    "Distribution Center North",
    "Distribution Center South",
];

const PRODUCTS: [&str; 6] = [
    "organic strawberries",
    "fresh salmon fillets",
    "free-range eggs",
    "baby spinach",
    "whole milk",
    "ground beef",
];

const SUPPLIERS: [&str; 4] = [
    "Green Valley Farms",
    "Pacific Catch Co.",
    "Sunrise Dairy",
    "Heartland Meats",
];

const FIRST_BLOCK_HEIGHT: u64 = 18_472_903;

/// Mutates a [`ComplianceSnapshot`] the way a live ledger feed would look
pub struct ComplianceSimulation {
    snapshot: ComplianceSnapshot,
    transaction_probability: f64,
    metrics_probability: f64,
    capacity: usize,
    next_block_height: u64,
}

impl ComplianceSimulation {
    pub fn new(config: &PublisherConfig, now: DateTime<Utc>) -> Self {
        let mut transactions = seed_transactions(now);
        transactions.truncate(config.transaction_capacity);

        let next_block_height = transactions
            .iter()
            .filter_map(|tx| tx.block_height)
            .max()
            .map_or(FIRST_BLOCK_HEIGHT, |height| height + 1);

        Self {
            snapshot: ComplianceSnapshot {
                transactions,
                critical_issues: seed_issues(now),
                traceability_data: seed_traces(),
                compliance_metrics: seed_metrics(),
                last_update: now,
                network_status: NetworkStatus::default(),
            },
            transaction_probability: config.transaction_probability,
            metrics_probability: config.metrics_probability,
            capacity: config.transaction_capacity,
            next_block_height,
        }
    }

    fn synthesize_transaction(&mut self, ctx: &mut TickContext<'_>) -> Transaction {
        let rng = &mut *ctx.rng;
        let kind = *TransactionType::ALL.choose(rng).unwrap_or(&TransactionType::FoodSafety);
        let status = *TransactionStatus::ALL.choose(rng).unwrap_or(&TransactionStatus::Pending);
        let priority = *Priority::ALL.choose(rng).unwrap_or(&Priority::Medium);
        let location = LOCATIONS.choose(rng).copied().unwrap_or(LOCATIONS[0]);
        let details = details_for(kind, rng);

        let block_height = self.next_block_height;
        self.next_block_height += rng.gen_range(1..=3);

        let hash_bytes: [u8; 32] = rng.gen();
        let mut hash = String::with_capacity(66);
        hash.push_str("0x");
        for byte in hash_bytes {
            let _ = write!(hash, "{:02x}", byte);
        }

        Transaction {
            id: uuid::Builder::from_random_bytes(rng.gen()).into_uuid(),
            kind,
            location: location.to_string(),
            timestamp: ctx.now,
            status,
            details,
            priority,
            block_height: Some(block_height),
            hash: Some(hash),
        }
    }

    fn push_transaction(&mut self, tx: Transaction) {
        if tx.status == TransactionStatus::Verified {
            self.snapshot.compliance_metrics.verified_transactions += 1;
        }
        let transactions = &mut self.snapshot.transactions;
        transactions.insert(0, tx);
        transactions.truncate(self.capacity);
    }

    fn nudge_metrics<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let m = &mut self.snapshot.compliance_metrics;
        m.food_safety_score = ComplianceMetrics::FOOD_SAFETY_SCORE.jitter(rng, m.food_safety_score, 0.5);
        m.supplier_compliance =
            ComplianceMetrics::SUPPLIER_COMPLIANCE.jitter(rng, m.supplier_compliance, 1.0);
        m.carbon_footprint_reduction = ComplianceMetrics::CARBON_FOOTPRINT_REDUCTION.jitter(
            rng,
            m.carbon_footprint_reduction,
            0.5,
        );
        m.audit_completion_rate =
            ComplianceMetrics::AUDIT_COMPLETION_RATE.jitter(rng, m.audit_completion_rate, 1.0);
        m.traceability_coverage =
            ComplianceMetrics::TRACEABILITY_COVERAGE.jitter(rng, m.traceability_coverage, 0.5);
        m.pending_audits = ComplianceMetrics::PENDING_AUDITS.jitter_count(rng, m.pending_audits, 2);
    }
}

impl Simulation for ComplianceSimulation {
    type Snapshot = ComplianceSnapshot;

    fn name(&self) -> &'static str {
        "compliance"
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        if ctx.chance(self.transaction_probability) {
            let tx = self.synthesize_transaction(ctx);
            debug!(
                "New {} transaction at {} (block {:?})",
                tx.kind.as_str(),
                tx.location,
                tx.block_height
            );
            metrics::record_transaction(tx.kind.as_str());
            self.push_transaction(tx);
        }

        if ctx.chance(self.metrics_probability) {
            self.nudge_metrics(&mut *ctx.rng);
        }

        self.snapshot.last_update = ctx.stamp(self.snapshot.last_update);
    }

    fn snapshot(&self) -> ComplianceSnapshot {
        self.snapshot.clone()
    }
}

fn details_for<R: Rng + ?Sized>(kind: TransactionType, rng: &mut R) -> String {
    let product = PRODUCTS.choose(rng).copied().unwrap_or(PRODUCTS[0]);
    let supplier = SUPPLIERS.choose(rng).copied().unwrap_or(SUPPLIERS[0]);
    match kind {
        TransactionType::FoodSafety => match rng.gen_range(0..3) {
            0 => format!("Cold-chain temperature log verified for {}", product),
            1 => format!("HACCP checkpoint passed for {}", product),
            _ => format!("Shelf-life inspection recorded for {}", product),
        },
        TransactionType::SupplierAudit => match rng.gen_range(0..2) {
            0 => format!("{} quarterly audit submitted", supplier),
            _ => format!("{} certification renewal under review", supplier),
        },
        TransactionType::ProductRecall => {
            let lot = rng.gen_range(1_000..10_000);
            format!("Recall notice for {} lot #{} from {}", product, lot, supplier)
        }
        TransactionType::CarbonTracking => {
            let kg = rng.gen_range(120..2_400);
            format!("Delivery route emissions logged: {} kg CO2e", kg)
        }
    }
}

fn seed_transactions(now: DateTime<Utc>) -> Vec<Transaction> {
    vec![
        Transaction {
            id: Uuid::from_u128(0x7a1e_0001),
            kind: TransactionType::FoodSafety,
            location: LOCATIONS[0].to_string(),
            timestamp: now - Duration::minutes(2),
            status: TransactionStatus::Verified,
            details: "Cold-chain temperature log verified for fresh salmon fillets".to_string(),
            priority: Priority::Medium,
            block_height: Some(FIRST_BLOCK_HEIGHT - 1),
            hash: Some("0x8f3a5c7e9b1d2f4a6c8e0b2d4f6a8c0e2b4d6f8a0c2e4b6d8f0a2c4e6b8d0f2a".to_string()),
        },
        Transaction {
            id: Uuid::from_u128(0x7a1e_0002),
            kind: TransactionType::ProductRecall,
            location: LOCATIONS[4].to_string(),
            timestamp: now - Duration::minutes(7),
            status: TransactionStatus::ActionRequired,
            details: "Recall notice for baby spinach lot #4471 from Green Valley Farms".to_string(),
            priority: Priority::Critical,
            block_height: Some(FIRST_BLOCK_HEIGHT - 3),
            hash: Some("0x1b3d5f7a9c0e2b4d6f8a1c3e5b7d9f0a2c4e6b8d1f3a5c7e9b0d2f4a6c8e1b3d".to_string()),
        },
        Transaction {
            id: Uuid::from_u128(0x7a1e_0003),
            kind: TransactionType::SupplierAudit,
            location: LOCATIONS[2].to_string(),
            timestamp: now - Duration::minutes(18),
            status: TransactionStatus::Pending,
            details: "Sunrise Dairy quarterly audit submitted".to_string(),
            priority: Priority::High,
            block_height: None,
            hash: None,
        },
        Transaction {
            id: Uuid::from_u128(0x7a1e_0004),
            kind: TransactionType::CarbonTracking,
            location: LOCATIONS[5].to_string(),
            timestamp: now - Duration::minutes(41),
            status: TransactionStatus::Verified,
            details: "Delivery route emissions logged: 860 kg CO2e".to_string(),
            priority: Priority::Low,
            block_height: Some(FIRST_BLOCK_HEIGHT - 9),
            hash: Some("0xc2e4a6b8d0f1a3c5e7b9d2f4a6c8e0b1d3f5a7c9e2b4d6f8a0c1e3b5d7f9a2c4".to_string()),
        },
    ]
}

fn seed_issues(now: DateTime<Utc>) -> Vec<Issue> {
    vec![
        Issue {
            id: "ISS-2041".to_string(),
            title: "Refrigeration excursion".to_string(),
            description: "Dairy case held above 5°C for 47 minutes".to_string(),
            location: LOCATIONS[1].to_string(),
            priority: Priority::Critical,
            affected_products: 132,
            detected_at: now - Duration::minutes(26),
        },
        Issue {
            id: "ISS-2038".to_string(),
            title: "Expired supplier certificate".to_string(),
            description: "Heartland Meats organic certification lapsed".to_string(),
            location: LOCATIONS[5].to_string(),
            priority: Priority::High,
            affected_products: 58,
            detected_at: now - Duration::hours(3),
        },
        Issue {
            id: "ISS-2033".to_string(),
            title: "Recall lot still on shelf".to_string(),
            description: "Baby spinach lot #4471 scanned at checkout".to_string(),
            location: LOCATIONS[3].to_string(),
            priority: Priority::Critical,
            affected_products: 24,
            detected_at: now - Duration::hours(5),
        },
    ]
}

fn seed_traces() -> Vec<ProductTrace> {
    vec![
        ProductTrace {
            product_id: "PRD-88231".to_string(),
            product_name: "Organic strawberries 1lb".to_string(),
            origin: "Green Valley Farms, CA".to_string(),
            current_location: LOCATIONS[0].to_string(),
            journey: vec![
                "Harvested".to_string(),
                "Packed".to_string(),
                LOCATIONS[4].to_string(),
                LOCATIONS[0].to_string(),
            ],
            temperature_c: 2.8,
            verified: true,
        },
        ProductTrace {
            product_id: "PRD-55102".to_string(),
            product_name: "Atlantic salmon fillet".to_string(),
            origin: "Pacific Catch Co., WA".to_string(),
            current_location: LOCATIONS[5].to_string(),
            journey: vec![
                "Caught".to_string(),
                "Processed".to_string(),
                LOCATIONS[5].to_string(),
            ],
            temperature_c: 0.9,
            verified: true,
        },
        ProductTrace {
            product_id: "PRD-31977".to_string(),
            product_name: "Grass-fed ground beef".to_string(),
            origin: "Heartland Meats, NE".to_string(),
            current_location: LOCATIONS[2].to_string(),
            journey: vec![
                "Processed".to_string(),
                LOCATIONS[4].to_string(),
                LOCATIONS[2].to_string(),
            ],
            temperature_c: 3.4,
            verified: false,
        },
    ]
}

fn seed_metrics() -> ComplianceMetrics {
    ComplianceMetrics {
        food_safety_score: 98.7,
        supplier_compliance: 94.2,
        carbon_footprint_reduction: 23.5,
        audit_completion_rate: 91.0,
        traceability_coverage: 97.3,
        verified_transactions: 15_847,
        pending_audits: 7,
    }
}

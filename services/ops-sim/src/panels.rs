// services/ops-sim/src/panels.rs
//
// Dashboard panel feeds (security, warehouse, sustainability, workforce,
// promotions). Each panel is a flat record of bounded gauges that drifts a
// little on most ticks; all of them run through the same Publisher.
//

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::simulation::{Bounded, Simulation, TickContext};

/// A panel's record shape
pub trait PanelRecord: Clone + Send + Sync + 'static {
    const NAME: &'static str;

    fn seed(now: DateTime<Utc>) -> Self;

    /// Nudge every gauge by a bounded delta
    fn perturb(&mut self, rng: &mut StdRng);

    fn last_update_mut(&mut self) -> &mut DateTime<Utc>;

    fn within_bounds(&self) -> bool;
}

/// Drives any [`PanelRecord`] as a [`Simulation`]
pub struct PanelSimulation<P> {
    record: P,
    update_probability: f64,
}

impl<P: PanelRecord> PanelSimulation<P> {
    pub fn new(update_probability: f64, now: DateTime<Utc>) -> Self {
        Self {
            record: P::seed(now),
            update_probability,
        }
    }
}

impl<P: PanelRecord> Simulation for PanelSimulation<P> {
    type Snapshot = P;

    fn name(&self) -> &'static str {
        P::NAME
    }

    fn advance(&mut self, ctx: &mut TickContext<'_>) {
        if ctx.chance(self.update_probability) {
            self.record.perturb(&mut *ctx.rng);
        }
        let stamped = ctx.stamp(*self.record.last_update_mut());
        *self.record.last_update_mut() = stamped;
    }

    fn snapshot(&self) -> P {
        self.record.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPanel {
    pub cameras_online: u32,
    pub active_alerts: u32,
    pub threat_level: f64,
    pub access_events_per_min: f64,
    pub last_update: DateTime<Utc>,
}

impl SecurityPanel {
    pub const CAMERAS_ONLINE: Bounded = Bounded::new(180.0, 200.0);
    pub const ACTIVE_ALERTS: Bounded = Bounded::new(0.0, 12.0);
    pub const THREAT_LEVEL: Bounded = Bounded::new(0.0, 100.0);
    pub const ACCESS_EVENTS_PER_MIN: Bounded = Bounded::new(20.0, 400.0);
}

impl PanelRecord for SecurityPanel {
    const NAME: &'static str = "security";

    fn seed(now: DateTime<Utc>) -> Self {
        Self {
            cameras_online: 196,
            active_alerts: 3,
            threat_level: 18.0,
            access_events_per_min: 142.0,
            last_update: now,
        }
    }

    fn perturb(&mut self, rng: &mut StdRng) {
        self.cameras_online = Self::CAMERAS_ONLINE.jitter_count(rng, self.cameras_online, 2);
        self.active_alerts = Self::ACTIVE_ALERTS.jitter_count(rng, self.active_alerts, 1);
        self.threat_level = Self::THREAT_LEVEL.jitter(rng, self.threat_level, 4.0);
        self.access_events_per_min =
            Self::ACCESS_EVENTS_PER_MIN.jitter(rng, self.access_events_per_min, 25.0);
    }

    fn last_update_mut(&mut self) -> &mut DateTime<Utc> {
        &mut self.last_update
    }

    fn within_bounds(&self) -> bool {
        Self::CAMERAS_ONLINE.contains(self.cameras_online as f64)
            && Self::ACTIVE_ALERTS.contains(self.active_alerts as f64)
            && Self::THREAT_LEVEL.contains(self.threat_level)
            && Self::ACCESS_EVENTS_PER_MIN.contains(self.access_events_per_min)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehousePanel {
    pub stock_accuracy: f64,
    pub robot_utilization: f64,
    pub orders_per_hour: f64,
    pub dock_doors_busy: u32,
    pub inventory_turnover: f64,
    pub last_update: DateTime<Utc>,
}

impl WarehousePanel {
    pub const STOCK_ACCURACY: Bounded = Bounded::new(95.0, 100.0);
    pub const ROBOT_UTILIZATION: Bounded = Bounded::new(40.0, 100.0);
    pub const ORDERS_PER_HOUR: Bounded = Bounded::new(800.0, 2_400.0);
    pub const DOCK_DOORS_BUSY: Bounded = Bounded::new(0.0, 24.0);
    pub const INVENTORY_TURNOVER: Bounded = Bounded::new(4.0, 12.0);
}

impl PanelRecord for WarehousePanel {
    const NAME: &'static str = "warehouse";

    fn seed(now: DateTime<Utc>) -> Self {
        Self {
            stock_accuracy: 99.2,
            robot_utilization: 78.5,
            orders_per_hour: 1_640.0,
            dock_doors_busy: 14,
            inventory_turnover: 8.3,
            last_update: now,
        }
    }

    fn perturb(&mut self, rng: &mut StdRng) {
        self.stock_accuracy = Self::STOCK_ACCURACY.jitter(rng, self.stock_accuracy, 0.3);
        self.robot_utilization = Self::ROBOT_UTILIZATION.jitter(rng, self.robot_utilization, 3.0);
        self.orders_per_hour = Self::ORDERS_PER_HOUR.jitter(rng, self.orders_per_hour, 60.0);
        self.dock_doors_busy = Self::DOCK_DOORS_BUSY.jitter_count(rng, self.dock_doors_busy, 2);
        self.inventory_turnover = Self::INVENTORY_TURNOVER.jitter(rng, self.inventory_turnover, 0.2);
    }

    fn last_update_mut(&mut self) -> &mut DateTime<Utc> {
        &mut self.last_update
    }

    fn within_bounds(&self) -> bool {
        Self::STOCK_ACCURACY.contains(self.stock_accuracy)
            && Self::ROBOT_UTILIZATION.contains(self.robot_utilization)
            && Self::ORDERS_PER_HOUR.contains(self.orders_per_hour)
            && Self::DOCK_DOORS_BUSY.contains(self.dock_doors_busy as f64)
            && Self::INVENTORY_TURNOVER.contains(self.inventory_turnover)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainabilityPanel {
    pub energy_kwh: f64,
    pub renewable_share: f64,
    pub waste_diverted_pct: f64,
    pub water_liters: f64,
    pub last_update: DateTime<Utc>,
}

impl SustainabilityPanel {
    pub const ENERGY_KWH: Bounded = Bounded::new(1_200.0, 4_800.0);
    pub const RENEWABLE_SHARE: Bounded = Bounded::new(20.0, 80.0);
    pub const WASTE_DIVERTED_PCT: Bounded = Bounded::new(50.0, 95.0);
    pub const WATER_LITERS: Bounded = Bounded::new(5_000.0, 20_000.0);
}

impl PanelRecord for SustainabilityPanel {
    const NAME: &'static str = "sustainability";

    fn seed(now: DateTime<Utc>) -> Self {
        Self {
            energy_kwh: 2_870.0,
            renewable_share: 46.0,
            waste_diverted_pct: 78.4,
            water_liters: 11_250.0,
            last_update: now,
        }
    }

    fn perturb(&mut self, rng: &mut StdRng) {
        self.energy_kwh = Self::ENERGY_KWH.jitter(rng, self.energy_kwh, 90.0);
        self.renewable_share = Self::RENEWABLE_SHARE.jitter(rng, self.renewable_share, 1.5);
        self.waste_diverted_pct = Self::WASTE_DIVERTED_PCT.jitter(rng, self.waste_diverted_pct, 1.0);
        self.water_liters = Self::WATER_LITERS.jitter(rng, self.water_liters, 300.0);
    }

    fn last_update_mut(&mut self) -> &mut DateTime<Utc> {
        &mut self.last_update
    }

    fn within_bounds(&self) -> bool {
        Self::ENERGY_KWH.contains(self.energy_kwh)
            && Self::RENEWABLE_SHARE.contains(self.renewable_share)
            && Self::WASTE_DIVERTED_PCT.contains(self.waste_diverted_pct)
            && Self::WATER_LITERS.contains(self.water_liters)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkforcePanel {
    pub staff_on_shift: u32,
    pub productivity_index: f64,
    pub overtime_hours: f64,
    pub absentee_rate: f64,
    pub last_update: DateTime<Utc>,
}

impl WorkforcePanel {
    pub const STAFF_ON_SHIFT: Bounded = Bounded::new(120.0, 260.0);
    pub const PRODUCTIVITY_INDEX: Bounded = Bounded::new(70.0, 120.0);
    pub const OVERTIME_HOURS: Bounded = Bounded::new(0.0, 80.0);
    pub const ABSENTEE_RATE: Bounded = Bounded::new(0.0, 12.0);
}

impl PanelRecord for WorkforcePanel {
    const NAME: &'static str = "workforce";

    fn seed(now: DateTime<Utc>) -> Self {
        Self {
            staff_on_shift: 214,
            productivity_index: 96.0,
            overtime_hours: 22.5,
            absentee_rate: 3.8,
            last_update: now,
        }
    }

    fn perturb(&mut self, rng: &mut StdRng) {
        self.staff_on_shift = Self::STAFF_ON_SHIFT.jitter_count(rng, self.staff_on_shift, 4);
        self.productivity_index = Self::PRODUCTIVITY_INDEX.jitter(rng, self.productivity_index, 2.0);
        self.overtime_hours = Self::OVERTIME_HOURS.jitter(rng, self.overtime_hours, 1.5);
        self.absentee_rate = Self::ABSENTEE_RATE.jitter(rng, self.absentee_rate, 0.4);
    }

    fn last_update_mut(&mut self) -> &mut DateTime<Utc> {
        &mut self.last_update
    }

    fn within_bounds(&self) -> bool {
        Self::STAFF_ON_SHIFT.contains(self.staff_on_shift as f64)
            && Self::PRODUCTIVITY_INDEX.contains(self.productivity_index)
            && Self::OVERTIME_HOURS.contains(self.overtime_hours)
            && Self::ABSENTEE_RATE.contains(self.absentee_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionsPanel {
    pub active_campaigns: u32,
    pub conversion_rate: f64,
    pub redemptions_per_hour: f64,
    pub avg_basket_uplift: f64,
    pub last_update: DateTime<Utc>,
}

impl PromotionsPanel {
    pub const ACTIVE_CAMPAIGNS: Bounded = Bounded::new(3.0, 20.0);
    pub const CONVERSION_RATE: Bounded = Bounded::new(1.0, 15.0);
    pub const REDEMPTIONS_PER_HOUR: Bounded = Bounded::new(50.0, 900.0);
    pub const AVG_BASKET_UPLIFT: Bounded = Bounded::new(0.0, 30.0);
}

impl PanelRecord for PromotionsPanel {
    const NAME: &'static str = "promotions";

    fn seed(now: DateTime<Utc>) -> Self {
        Self {
            active_campaigns: 9,
            conversion_rate: 6.4,
            redemptions_per_hour: 385.0,
            avg_basket_uplift: 12.7,
            last_update: now,
        }
    }

    fn perturb(&mut self, rng: &mut StdRng) {
        self.active_campaigns = Self::ACTIVE_CAMPAIGNS.jitter_count(rng, self.active_campaigns, 1);
        self.conversion_rate = Self::CONVERSION_RATE.jitter(rng, self.conversion_rate, 0.3);
        self.redemptions_per_hour =
            Self::REDEMPTIONS_PER_HOUR.jitter(rng, self.redemptions_per_hour, 25.0);
        self.avg_basket_uplift = Self::AVG_BASKET_UPLIFT.jitter(rng, self.avg_basket_uplift, 0.8);
    }

    fn last_update_mut(&mut self) -> &mut DateTime<Utc> {
        &mut self.last_update
    }

    fn within_bounds(&self) -> bool {
        Self::ACTIVE_CAMPAIGNS.contains(self.active_campaigns as f64)
            && Self::CONVERSION_RATE.contains(self.conversion_rate)
            && Self::REDEMPTIONS_PER_HOUR.contains(self.redemptions_per_hour)
            && Self::AVG_BASKET_UPLIFT.contains(self.avg_basket_uplift)
    }
}

// services/ops-sim/src/main.rs
//
// Demo runner for the retail operations telemetry simulator
//
// Run with: cargo run --bin ops-sim -- --ticks 10 --json
//

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ops_sim::config::{self, PanelConfig};
use ops_sim::panels::{
    PanelRecord, PanelSimulation, PromotionsPanel, SecurityPanel, SustainabilityPanel,
    WarehousePanel, WorkforcePanel,
};
use ops_sim::state::{ComplianceSnapshot, TransactionStatus};
use ops_sim::{ComplianceSimulation, Publisher, Subscription};
use svckit::metrics;

#[derive(Parser, Debug)]
#[command(name = "ops-sim")]
#[command(about = "Simulated retail operations telemetry feed")]
struct Args {
    /// Configuration file (optional; defaults apply when missing)
    #[arg(short, long, default_value = "config/ops-sim.yaml")]
    config: String,

    /// Stop after this many compliance ticks (runs until Ctrl-C otherwise)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    ticks: Option<u64>,

    /// Override publisher.interval_ms
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Override publisher.seed
    #[arg(long)]
    seed: Option<u64>,

    /// Print every compliance snapshot as a JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Also run the dashboard panel feeds
    #[arg(long)]
    panels: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = config::load_config(&args.config)?;
    if let Some(interval_ms) = args.interval_ms {
        config.publisher.interval_ms = interval_ms;
    }
    if args.seed.is_some() {
        config.publisher.seed = args.seed;
    }
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ops_sim={}", config.observability.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting compliance feed: every {:?}, tx p={}, metrics p={}, capacity {}",
        config.publisher.interval(),
        config.publisher.transaction_probability,
        config.publisher.metrics_probability,
        config.publisher.transaction_capacity
    );

    let compliance = Publisher::compliance(&config.publisher);
    let done = Arc::new(Notify::new());
    let subscriptions = wire_compliance(&compliance, &args, done.clone());

    let panels = if args.panels {
        start_panels(&config.panels, config.publisher.seed)?
    } else {
        Vec::new()
    };

    compliance.start()?;

    tokio::select! {
        _ = done.notified() => info!("Tick limit reached"),
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Interrupted");
        }
    }

    compliance.stop();
    for panel in &panels {
        panel.stop();
    }
    for subscription in &subscriptions {
        subscription.unsubscribe();
    }

    let snapshot = compliance.get_snapshot();
    info!(
        "Finished after {} ticks: {} transactions held, food safety {:.2}",
        compliance.tick_count(),
        snapshot.transactions.len(),
        snapshot.compliance_metrics.food_safety_score
    );

    if config.observability.dump_metrics_on_exit {
        debug!("Metrics:\n{}", metrics::gather_text());
    }

    Ok(())
}

fn wire_compliance(
    publisher: &Publisher<ComplianceSimulation>,
    args: &Args,
    done: Arc<Notify>,
) -> Vec<Subscription> {
    let mut subscriptions = Vec::new();

    let newest = Arc::new(parking_lot::Mutex::new(None));
    subscriptions.push(publisher.subscribe(move |snapshot: &ComplianceSnapshot| {
        let head = snapshot.transactions.first().map(|tx| tx.id);
        let mut newest = newest.lock();
        if head != *newest {
            if let Some(tx) = snapshot.transactions.first() {
                let level_hint = match tx.status {
                    TransactionStatus::ActionRequired => "ACTION",
                    TransactionStatus::Pending => "PENDING",
                    TransactionStatus::Verified => "OK",
                };
                info!("[{}] {:?} {} - {}", level_hint, tx.priority, tx.location, tx.details);
            }
            *newest = head;
        }
        debug!(
            "Compliance tick: food safety {:.2}, suppliers {:.2}, pending audits {}",
            snapshot.compliance_metrics.food_safety_score,
            snapshot.compliance_metrics.supplier_compliance,
            snapshot.compliance_metrics.pending_audits
        );
    }));

    if args.json {
        subscriptions.push(publisher.subscribe(|snapshot: &ComplianceSnapshot| {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize snapshot: {}", e),
            }
        }));
    }

    if let Some(limit) = args.ticks {
        let seen = AtomicU64::new(0);
        subscriptions.push(publisher.subscribe(move |_: &ComplianceSnapshot| {
            if seen.fetch_add(1, Ordering::SeqCst) + 1 == limit {
                done.notify_one();
            }
        }));
    }

    subscriptions
}

/// Type-erased handle so panels of different shapes can share a Vec
trait Stoppable {
    fn stop(&self);
}

impl<P: PanelRecord> Stoppable for Publisher<PanelSimulation<P>> {
    fn stop(&self) {
        Publisher::stop(self);
    }
}

fn start_panels(config: &PanelConfig, seed: Option<u64>) -> Result<Vec<Box<dyn Stoppable>>> {
    Ok(vec![
        start_panel::<SecurityPanel>(config, panel_seed(seed, 0))?,
        start_panel::<WarehousePanel>(config, panel_seed(seed, 1))?,
        start_panel::<SustainabilityPanel>(config, panel_seed(seed, 2))?,
        start_panel::<WorkforcePanel>(config, panel_seed(seed, 3))?,
        start_panel::<PromotionsPanel>(config, panel_seed(seed, 4))?,
    ])
}

/// Distinct stream per panel; the compliance feed keeps the base seed
fn panel_seed(seed: Option<u64>, index: u64) -> Option<u64> {
    seed.map(|seed| seed.wrapping_add(index + 1))
}

fn start_panel<P>(config: &PanelConfig, seed: Option<u64>) -> Result<Box<dyn Stoppable>>
where
    P: PanelRecord + Serialize,
{
    let publisher = Publisher::<PanelSimulation<P>>::panel(config, seed);
    // Subscription lives as long as the publisher; never unsubscribed
    let _subscription = publisher.subscribe(|record: &P| match serde_json::to_string(record) {
        Ok(json) => debug!("{} panel: {}", P::NAME, json),
        Err(e) => warn!("Failed to serialize {} panel: {}", P::NAME, e),
    });
    publisher.start()?;
    Ok(Box::new(publisher))
}

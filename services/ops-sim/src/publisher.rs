// services/ops-sim/src/publisher.rs
//
// Publisher - periodic mutate-then-fan-out driver for a Simulation
//
// Lifecycle is Stopped <-> Running. Each Running period gets a fresh epoch;
// the timer task only delivers while its epoch is current, so a stop() that
// has returned can never be followed by another delivery.
//

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use svckit::errors::SimError;
use svckit::metrics;

use crate::clock::{Clock, SystemClock};
use crate::config::{PanelConfig, PublisherConfig};
use crate::mock::ComplianceSimulation;
use crate::panels::{PanelRecord, PanelSimulation};
use crate::simulation::{Simulation, TickContext};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Receives every snapshot published while it is registered.
///
/// Implemented for any `Fn(&T) + Send + Sync` closure. A panicking observer
/// is isolated: the panic is logged and the remaining observers still get
/// the snapshot.
pub trait Observer<T>: Send + Sync {
    fn on_snapshot(&self, snapshot: &T);
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn on_snapshot(&self, snapshot: &T) {
        self(snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Running,
}

/// Capability returned by [`Publisher::subscribe`].
///
/// Dropping it does not unsubscribe.
#[must_use = "keep the Subscription to be able to unsubscribe later"]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Detach + Send + Sync>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the observer. Safe to call more than once, from inside the
    /// observer's own callback, or after the publisher is gone.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

trait Detach {
    fn detach(&self, id: u64);
}

type ObserverEntry<T> = (u64, Arc<dyn Observer<T>>);

struct Registry<T> {
    simulation: &'static str,
    next_id: AtomicU64,
    observers: RwLock<Vec<ObserverEntry<T>>>,
}

impl<T> Registry<T> {
    fn new(simulation: &'static str) -> Self {
        Self {
            simulation,
            next_id: AtomicU64::new(1),
            observers: RwLock::new(Vec::new()),
        }
    }

    fn attach(&self, observer: Arc<dyn Observer<T>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut observers = self.observers.write();
        observers.push((id, observer));
        metrics::set_subscribers(self.simulation, observers.len());
        id
    }

    fn contains(&self, id: u64) -> bool {
        self.observers.read().iter().any(|(existing, _)| *existing == id)
    }

    fn len(&self) -> usize {
        self.observers.read().len()
    }

    fn current(&self) -> Vec<ObserverEntry<T>> {
        self.observers.read().clone()
    }
}

impl<T> Detach for Registry<T> {
    fn detach(&self, id: u64) {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        if observers.len() != before {
            debug!("Observer {} unsubscribed from {}", id, self.simulation);
            metrics::set_subscribers(self.simulation, observers.len());
        }
    }
}

thread_local! {
    // Publishers this thread is currently delivering for
    static DELIVERING: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

struct DeliveryGuard {
    key: usize,
}

impl DeliveryGuard {
    fn enter(key: usize) -> Self {
        DELIVERING.with(|keys| keys.borrow_mut().push(key));
        Self { key }
    }

    fn is_active(key: usize) -> bool {
        DELIVERING.with(|keys| keys.borrow().contains(&key))
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERING.with(|keys| {
            let mut keys = keys.borrow_mut();
            if let Some(pos) = keys.iter().rposition(|key| *key == self.key) {
                keys.remove(pos);
            }
        });
    }
}

struct Engine<S> {
    simulation: S,
    rng: StdRng,
    ticks: u64,
}

struct Inner<S: Simulation> {
    name: &'static str,
    interval: Duration,
    clock: Arc<dyn Clock>,
    engine: Mutex<Engine<S>>,
    registry: Arc<Registry<S::Snapshot>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    epoch: AtomicU64,
    // Held for a whole mutate + deliver cycle
    tick_gate: Mutex<()>,
}

impl<S: Simulation> Inner<S> {
    fn key(&self) -> usize {
        self as *const Self as *const () as usize
    }

    fn is_current(&self, epoch: Option<u64>) -> bool {
        match epoch {
            Some(epoch) => self.epoch.load(Ordering::SeqCst) == epoch,
            None => true,
        }
    }

    /// One tick. `epoch` is `None` for manual ticks, which ignore the lifecycle.
    fn run_tick(&self, epoch: Option<u64>) {
        if DeliveryGuard::is_active(self.key()) {
            warn!("Ignoring re-entrant tick of {} from inside an observer", self.name);
            return;
        }

        let _gate = self.tick_gate.lock();
        if !self.is_current(epoch) {
            return;
        }

        let snapshot = {
            let mut engine = self.engine.lock();
            let Engine {
                simulation,
                rng,
                ticks,
            } = &mut *engine;
            let mut ctx = TickContext {
                rng,
                now: self.clock.now(),
            };
            simulation.advance(&mut ctx);
            *ticks += 1;
            simulation.snapshot()
        };
        metrics::record_tick(self.name);

        let observers = self.registry.current();
        let _delivering = DeliveryGuard::enter(self.key());
        for (id, observer) in observers {
            if !self.is_current(epoch) {
                debug!("{} stopped mid-delivery, skipping remaining observers", self.name);
                break;
            }
            // Another observer may have removed this one earlier in the tick
            if !self.registry.contains(id) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.on_snapshot(&snapshot)));
            if let Err(payload) = outcome {
                let fault = SimError::ObserverFault {
                    simulation: self.name.to_string(),
                    message: panic_message(payload.as_ref()),
                };
                warn!("Observer {} faulted: {}", id, fault);
                metrics::record_observer_fault(self.name);
            }
        }
    }
}

impl<S: Simulation> Drop for Inner<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

/// Owns a [`Simulation`], mutates it on a fixed interval and publishes each
/// resulting snapshot to the registered observers.
///
/// Cloning yields another handle to the same publisher. When the last handle
/// is dropped the timer stops.
pub struct Publisher<S: Simulation> {
    inner: Arc<Inner<S>>,
}

impl<S: Simulation> Clone for Publisher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Non-owning handle for observers that call back into their own publisher.
pub struct WeakPublisher<S: Simulation> {
    inner: Weak<Inner<S>>,
}

impl<S: Simulation> Clone for WeakPublisher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Simulation> WeakPublisher<S> {
    /// `None` once every `Publisher` handle has been dropped
    pub fn upgrade(&self) -> Option<Publisher<S>> {
        self.inner.upgrade().map(|inner| Publisher { inner })
    }
}

impl<S: Simulation> Publisher<S> {
    /// Entropy-seeded random source, system clock.
    pub fn new(simulation: S, interval: Duration) -> Self {
        Self::with_parts(simulation, interval, StdRng::from_entropy(), Arc::new(SystemClock))
    }

    pub fn with_parts(simulation: S, interval: Duration, rng: StdRng, clock: Arc<dyn Clock>) -> Self {
        let name = simulation.name();
        Self {
            inner: Arc::new(Inner {
                name,
                interval: interval.max(MIN_INTERVAL),
                clock,
                engine: Mutex::new(Engine {
                    simulation,
                    rng,
                    ticks: 0,
                }),
                registry: Arc::new(Registry::new(name)),
                timer: Mutex::new(None),
                epoch: AtomicU64::new(0),
                tick_gate: Mutex::new(()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Owned copy of the current state
    pub fn get_snapshot(&self) -> S::Snapshot {
        self.inner.engine.lock().simulation.snapshot()
    }

    /// Register `observer` for every future tick.
    ///
    /// The publisher keeps the observer alive, so an observer holding a
    /// `Publisher` clone forms a cycle: neither is freed and the timer keeps
    /// running after the caller drops its handles. Capture
    /// [`Publisher::downgrade`] instead.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<S::Snapshot> + 'static,
    {
        self.subscribe_arc(Arc::new(observer))
    }

    /// Every call registers independently, even for the same observer.
    pub fn subscribe_arc(&self, observer: Arc<dyn Observer<S::Snapshot>>) -> Subscription {
        let id = self.inner.registry.attach(observer);
        debug!("Observer {} subscribed to {}", id, self.inner.name);
        let registry: Arc<dyn Detach + Send + Sync> = self.inner.registry.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&registry),
        }
    }

    pub fn downgrade(&self) -> WeakPublisher<S> {
        WeakPublisher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Begin ticking every `interval`; the first tick lands one interval
    /// from now. No-op when already running.
    pub fn start(&self) -> Result<(), SimError> {
        let mut timer = self.inner.timer.lock();
        if timer.is_some() {
            debug!("{} already running", self.inner.name);
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SimError::RuntimeUnavailable)?;
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::downgrade(&self.inner);
        *timer = Some(runtime.spawn(drive(inner, self.inner.interval, epoch)));

        info!(
            "{} simulation started (interval {:?}, epoch {})",
            self.inner.name, self.inner.interval, epoch
        );
        Ok(())
    }

    /// Cancel ticking. No-op when stopped. Once this returns no further
    /// snapshot is delivered; when called from inside an observer the rest
    /// of the current tick's deliveries are skipped.
    pub fn stop(&self) {
        let handle = {
            let mut timer = self.inner.timer.lock();
            let handle = timer.take();
            if handle.is_some() {
                self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            }
            handle
        };

        let Some(handle) = handle else {
            debug!("{} already stopped", self.inner.name);
            return;
        };
        handle.abort();

        // Let an in-flight tick on another thread drain
        if !DeliveryGuard::is_active(self.inner.key()) {
            drop(self.inner.tick_gate.lock());
        }

        info!("{} simulation stopped", self.inner.name);
    }

    pub fn state(&self) -> LifecycleState {
        if self.inner.timer.lock().is_some() {
            LifecycleState::Running
        } else {
            LifecycleState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Run one mutate + publish cycle now, whatever the lifecycle state.
    pub fn tick(&self) {
        self.inner.run_tick(None);
    }

    /// Ticks executed so far, timer and manual
    pub fn tick_count(&self) -> u64 {
        self.inner.engine.lock().ticks
    }
}

impl Publisher<ComplianceSimulation> {
    pub fn compliance(config: &PublisherConfig) -> Self {
        Self::compliance_with_clock(config, Arc::new(SystemClock))
    }

    pub fn compliance_with_clock(config: &PublisherConfig, clock: Arc<dyn Clock>) -> Self {
        let simulation = ComplianceSimulation::new(config, clock.now());
        Self::with_parts(simulation, config.interval(), seeded_rng(config.seed), clock)
    }
}

impl<P: PanelRecord> Publisher<PanelSimulation<P>> {
    pub fn panel(config: &PanelConfig, seed: Option<u64>) -> Self {
        Self::panel_with_clock(config, seed, Arc::new(SystemClock))
    }

    pub fn panel_with_clock(config: &PanelConfig, seed: Option<u64>, clock: Arc<dyn Clock>) -> Self {
        let simulation = PanelSimulation::<P>::new(config.update_probability, clock.now());
        Self::with_parts(simulation, config.interval(), seeded_rng(seed), clock)
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

async fn drive<S: Simulation>(inner: Weak<Inner<S>>, period: Duration, epoch: u64) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.is_current(Some(epoch)) {
            break;
        }
        inner.run_tick(Some(epoch));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use chrono::{DateTime, TimeZone, Utc};

    use crate::clock::ManualClock;

    /// Counts ticks and records the clock
    struct Counter {
        value: u64,
        last_update: DateTime<Utc>,
    }

    impl Simulation for Counter {
        type Snapshot = (u64, DateTime<Utc>);

        fn name(&self) -> &'static str {
            "counter"
        }

        fn advance(&mut self, ctx: &mut TickContext<'_>) {
            self.value += 1;
            self.last_update = ctx.stamp(self.last_update);
        }

        fn snapshot(&self) -> Self::Snapshot {
            (self.value, self.last_update)
        }
    }

    fn counter_publisher(clock: ManualClock) -> Publisher<Counter> {
        let counter = Counter {
            value: 0,
            last_update: clock.now(),
        };
        Publisher::with_parts(
            counter,
            Duration::from_millis(100),
            StdRng::seed_from_u64(0),
            Arc::new(clock),
        )
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_manual_tick_publishes() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = publisher.subscribe(move |snapshot: &(u64, DateTime<Utc>)| {
            sink.lock().push(snapshot.0);
        });

        publisher.tick();
        publisher.tick();

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(publisher.get_snapshot().0, 2);
        assert_eq!(publisher.tick_count(), 2);
        assert_eq!(publisher.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_last_update_non_decreasing_with_backwards_clock() {
        let clock = ManualClock::new(epoch());
        let publisher = counter_publisher(clock.clone());
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let sink = stamps.clone();
        let _sub = publisher.subscribe(move |snapshot: &(u64, DateTime<Utc>)| {
            sink.lock().push(snapshot.1);
        });

        clock.advance(chrono::Duration::seconds(3));
        publisher.tick();
        clock.set(epoch() - chrono::Duration::seconds(60));
        publisher.tick();
        clock.set(epoch() + chrono::Duration::seconds(9));
        publisher.tick();

        let stamps = stamps.lock();
        assert_eq!(stamps.len(), 3);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(stamps[1], epoch() + chrono::Duration::seconds(3));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let sub = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(publisher.subscriber_count(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        publisher.tick();

        assert_eq!(publisher.subscriber_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_after_publisher_dropped() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let sub = publisher.subscribe(|_: &(u64, DateTime<Utc>)| {});
        drop(publisher);
        sub.unsubscribe();
    }

    #[test]
    fn test_double_subscribe_registers_twice() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let observer: Arc<dyn Observer<(u64, DateTime<Utc>)>> =
            Arc::new(move |_: &(u64, DateTime<Utc>)| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let first = publisher.subscribe_arc(observer.clone());
        let second = publisher.subscribe_arc(observer);
        assert_ne!(first.id(), second.id());

        publisher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        first.unsubscribe();
        publisher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_observer_is_isolated() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));

        let _bad = publisher.subscribe(|_: &(u64, DateTime<Utc>)| panic!("observer blew up"));
        let counter = hits.clone();
        let _good = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        publisher.tick();
        publisher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_from_own_callback() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let counter = hits.clone();
        let own = slot.clone();
        let sub = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = own.lock().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        publisher.tick();
        publisher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_observer_removed_mid_tick_is_skipped() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));
        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let victim_ref = victim_slot.clone();
        let _killer = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            if let Some(victim) = victim_ref.lock().as_ref() {
                victim.unsubscribe();
            }
        });
        let counter = hits.clone();
        let victim = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *victim_slot.lock() = Some(victim);

        publisher.tick();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_get_snapshot_from_callback() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let seen = Arc::new(Mutex::new(None));
        let handle = publisher.downgrade();
        let sink = seen.clone();
        let _sub = publisher.subscribe(move |snapshot: &(u64, DateTime<Utc>)| {
            if let Some(publisher) = handle.upgrade() {
                *sink.lock() = Some(publisher.get_snapshot().0 == snapshot.0);
            }
        });

        publisher.tick();
        assert_eq!(*seen.lock(), Some(true));
    }

    #[test]
    fn test_reentrant_tick_is_ignored() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let handle = publisher.downgrade();
        let _sub = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            if let Some(publisher) = handle.upgrade() {
                publisher.tick();
            }
        });

        publisher.tick();
        assert_eq!(publisher.tick_count(), 1);
    }

    #[test]
    fn test_start_without_runtime() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        assert!(matches!(publisher.start(), Err(SimError::RuntimeUnavailable)));
        assert!(!publisher.is_running());
        publisher.stop();
    }

    #[test]
    fn test_zero_interval_is_raised() {
        let counter = Counter {
            value: 0,
            last_update: epoch(),
        };
        let publisher = Publisher::new(counter, Duration::ZERO);
        assert_eq!(publisher.interval(), MIN_INTERVAL);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _sub = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        publisher.start().unwrap();
        publisher.start().unwrap();
        assert!(publisher.is_running());

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        publisher.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _sub = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            publisher.start().unwrap();
            tokio::time::sleep(Duration::from_millis(250)).await;
            publisher.stop();
            publisher.stop();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 6);
        assert_eq!(publisher.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_callback_skips_rest_of_tick() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));

        let handle = publisher.downgrade();
        let _stopper = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            if let Some(publisher) = handle.upgrade() {
                publisher.stop();
            }
        });
        let counter = hits.clone();
        let _late = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        publisher.start().unwrap();
        tokio::time::sleep(Duration::from_millis(550)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(publisher.tick_count(), 1);
        assert!(!publisher.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_handle_stops_timer() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _sub = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        publisher.start().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(publisher);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_weak_handle_does_not_keep_publisher_alive() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let weak = publisher.downgrade();
        let handle = weak.clone();
        let _sub = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            let _ = handle.upgrade();
        });

        assert!(weak.upgrade().is_some());
        drop(publisher);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_referencing_observer_does_not_pin_timer() {
        let publisher = counter_publisher(ManualClock::new(epoch()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handle = publisher.downgrade();
        let _sub = publisher.subscribe(move |_: &(u64, DateTime<Utc>)| {
            if let Some(publisher) = handle.upgrade() {
                assert!(publisher.tick_count() > 0);
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        publisher.start().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        drop(publisher);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panel_with_injected_clock() {
        use crate::panels::WarehousePanel;

        let clock = ManualClock::new(epoch());
        let config = PanelConfig {
            update_probability: 0.0,
            ..PanelConfig::default()
        };
        let publisher = Publisher::<PanelSimulation<WarehousePanel>>::panel_with_clock(
            &config,
            Some(5),
            Arc::new(clock.clone()),
        );
        assert_eq!(publisher.get_snapshot().last_update, epoch());

        clock.advance(chrono::Duration::seconds(5));
        publisher.tick();
        assert_eq!(publisher.get_snapshot().last_update, epoch() + chrono::Duration::seconds(5));
        assert_eq!(publisher.name(), "warehouse");
    }
}

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use herald_core::EmitterConfig;
use herald_events::{DeferredProvider, Dispatcher, HandlerStore, ThreadedProvider};
use tracing::info;

/// Channel payload: (sensor name, reading).
type Reading = (String, f64);

fn main() -> anyhow::Result<()> {
    herald_observability::init();

    let config = EmitterConfig::from_env()?;

    immediate();
    deferred();
    keyed();
    threaded(config)?;

    Ok(())
}

fn immediate() {
    let mut readings: HandlerStore<Reading> = HandlerStore::new();
    readings.register(|(sensor, value): &Reading| {
        info!(%sensor, value, "reading observed");
    });
    readings.register_once(|(sensor, _): &Reading| {
        info!(%sensor, "first reading seen");
    });

    readings.trigger(&("boiler".to_string(), 71.5));
    readings.trigger(&("boiler".to_string(), 72.0));
}

fn deferred() {
    let mut alarms: DeferredProvider<String> = DeferredProvider::new();
    let escalate = alarms.deferrer();
    alarms.on(move |alarm: &String| {
        info!(%alarm, "alarm handled");
        if !alarm.starts_with("escalated:") {
            escalate.trigger(format!("escalated:{alarm}"));
        }
    });

    alarms.trigger("pressure".to_string());
    alarms.trigger("temperature".to_string());
    info!(pending = alarms.pending(), "alarms queued");

    alarms.run_all_deferred();
}

fn keyed() {
    let mut router: Dispatcher<&'static str, f64> = Dispatcher::new();
    router.on("boiler", |value: &f64| info!(value, "boiler route"));
    router.once("chiller", |value: &f64| info!(value, "chiller route (once)"));

    router.trigger("boiler", 70.0);
    router.trigger("chiller", 4.0);
    router.trigger("chiller", 3.5);
    router.trigger("unknown", 0.0);
}

fn threaded(config: EmitterConfig) -> anyhow::Result<()> {
    let provider: Arc<ThreadedProvider<Reading>> = Arc::new(ThreadedProvider::with_config(config));

    let future = provider.future_once();

    provider.async_wait(
        |(sensor, value): &Reading| info!(%sensor, value, "async waiter notified"),
        Duration::from_millis(500),
        || info!("async waiter timed out"),
    )?;

    let producer = {
        let provider = Arc::clone(&provider);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            provider.trigger(("turbine".to_string(), 3_600.0));
        })
    };

    let notified = provider.wait(Duration::from_millis(200));
    info!(notified, "blocking wait returned");

    let (sensor, value) = future.get()?;
    info!(%sensor, value, "future fulfilled");

    producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    Ok(())
}

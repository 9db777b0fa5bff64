use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thermomon::adapters::LmSensorsSource;
use thermomon::{CollectorService, Config, ReadingStats};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("thermomon={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🌡 Starting thermomon v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    let source = LmSensorsSource::new(config.sensors());
    if source.is_available() {
        info!("✓ Found sensor tool '{}'", config.sensors_command);
    } else {
        warn!(
            "⚠ Sensor tool '{}' not found. Readings will fail until lm-sensors is installed.",
            config.sensors_command
        );
    }

    let service = CollectorService::new(Arc::new(source), config.collector());

    service.register_reading_callback(|readings| {
        for reading in readings {
            info!(
                sensor = %reading.key,
                category = %reading.category,
                "{}: {:.1}{}",
                reading.label,
                reading.value,
                reading.unit
            );
        }
        Ok(())
    });
    service.register_error_callback(|err| {
        error!(error = %err, "sensor error");
        Ok(())
    });

    service.start().await;
    info!("✓ Collector running, polling every {:?}", service.interval());

    let mut refresh = tokio::time::interval(config.refresh_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                service.drain_pending();
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down");
    service.stop().await;
    service.drain_pending();

    let window = config.history_window_minutes;
    let histories = service.all_histories(window);
    for key in service.sensor_keys() {
        let Some(stats) = histories.get(&key).and_then(|r| ReadingStats::from_readings(r)) else {
            continue;
        };
        info!(
            sensor = %key,
            samples = stats.count,
            "last {}m: min {:.1} / avg {:.1} / max {:.1}",
            window,
            stats.min,
            stats.mean,
            stats.max
        );
    }

    Ok(())
}

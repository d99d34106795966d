use beacon_coordinator::domain::settings::SettingsService;
use beacon_coordinator::infrastructure::bluetooth::protocol::BEACON_PASSWORD;
use beacon_coordinator::infrastructure::bluetooth::simulated::SimulatedRadio;
use beacon_coordinator::infrastructure::logging::init_logger;
use beacon_coordinator::presentation::console::run_console;
use beacon_coordinator::CoordinatorConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();
    let _guard = init_logger(&settings.log_settings)?;
    info!("Starting Beacon Coordinator");
    let settings_path = settings_service.path();
    if settings_path.exists() {
        info!("Settings loaded from {}", settings_path.display());
    } else {
        settings_service.save()?;
        info!("Default settings written to {}", settings_path.display());
    }

    let radio = Arc::new(SimulatedRadio::new(
        settings.simulated_beacons.clone(),
        Duration::from_millis(settings.simulated_scan_interval_ms),
        BEACON_PASSWORD,
    ));
    let handle = beacon_coordinator::spawn(radio, CoordinatorConfig::from(&settings));

    let input = BufReader::new(tokio::io::stdin());
    run_console(handle, input, tokio::io::stdout()).await?;
    info!("Beacon Coordinator exited");
    Ok(())
}

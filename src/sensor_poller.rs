use crate::config::HomeAssistantConfig;
use crate::energy_manager::SensorUpdate;
use crate::event_coordinator::EnergyEvent;
use crate::home_assistant::HomeAssistantAPI;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};

const MAX_RETRIES: u32 = 3;

/// Polls Home Assistant entities and publishes them as sensor updates
pub struct SensorPoller {
    sensors: Vec<(String, String)>,
    poll_interval: Duration,
    update_sender: Sender<EnergyEvent>,
    ha_client: HomeAssistantAPI,
}

impl SensorPoller {
    pub fn new(config: &HomeAssistantConfig, update_sender: Sender<EnergyEvent>) -> Self {
        let mut sensors = Vec::with_capacity(config.sensors.len());
        for (sensor_id, entity_id) in &config.sensors {
            if sensor_id.contains('.') {
                warn!(
                    sensor = %sensor_id,
                    entity = %entity_id,
                    "Sensor id must not contain '.', skipping"
                );
                continue;
            }
            info!(sensor = %sensor_id, entity = %entity_id, "Polling Home Assistant entity");
            sensors.push((sensor_id.clone(), entity_id.clone()));
        }

        Self {
            sensors,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            update_sender,
            ha_client: HomeAssistantAPI::new(&config.url, &config.token),
        }
    }

    /// Spawns the poller in its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Waits for a spawned poller to end and logs how it ended
    pub async fn watch(handle: JoinHandle<()>) -> Result<(), JoinError> {
        let result = handle.await;
        match &result {
            Ok(()) => info!("Sensor poller stopped"),
            Err(e) if e.is_panic() => error!(error = %e, "Sensor poller panicked"),
            Err(e) => warn!(error = %e, "Sensor poller cancelled"),
        }
        result
    }

    async fn run(&self) {
        if self.sensors.is_empty() {
            info!("No Home Assistant sensors configured, poller not started");
            return;
        }

        let mut read_interval = interval(self.poll_interval);
        loop {
            read_interval.tick().await;

            let update = self.poll_once().await;
            if update.is_empty() {
                continue;
            }
            if let Err(e) = self.update_sender.send(EnergyEvent::Sensors(update)).await {
                warn!(error = %e, "Event channel closed, stopping sensor poller");
                break;
            }
        }
    }

    /// Reads every sensor once. Sensors that can't be read are left out of the
    /// update rather than reported as zero.
    pub async fn poll_once(&self) -> SensorUpdate {
        let mut update = HashMap::with_capacity(self.sensors.len());
        for (sensor_id, entity_id) in &self.sensors {
            match self.read_fields_with_retry(entity_id).await {
                Ok(fields) => {
                    debug!(sensor = %sensor_id, fields = fields.len(), "Read sensor");
                    update.insert(sensor_id.clone(), fields);
                }
                Err(e) => warn!(sensor = %sensor_id, error = %e, "Home Assistant read error"),
            }
        }
        update
    }

    async fn read_fields_with_retry(&self, entity_id: &str) -> anyhow::Result<HashMap<String, f64>> {
        let mut attempt = 1;
        loop {
            match self.ha_client.read_entity_state(entity_id).await {
                Ok(state) => return Ok(state.numeric_fields()),
                Err(e) if attempt < MAX_RETRIES => {
                    debug!(entity = %entity_id, attempt, error = %e, "HA read failed, retrying");
                    sleep(Duration::from_millis(200 * attempt as u64)).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!("all {MAX_RETRIES} attempts failed for {entity_id}")))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    fn config(url: &str, sensors: &[(&str, &str)]) -> HomeAssistantConfig {
        HomeAssistantConfig {
            url: url.to_string(),
            token: "test_token".to_string(),
            sensors: sensors
                .iter()
                .map(|(id, entity)| (id.to_string(), entity.to_string()))
                .collect::<BTreeMap<_, _>>(),
            poll_interval_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_poll_once_builds_sensor_update() {
        let mut server = mockito::Server::new_async().await;
        let _plug = server
            .mock("GET", "/api/states/sensor.printer_plug")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"entity_id": "sensor.printer_plug", "state": "42.5",
                    "attributes": {"total_energy": 1.75}}"#,
            )
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/api/states/sensor.broken")
            .with_status(500)
            .expect(MAX_RETRIES as usize)
            .create_async()
            .await;

        let (tx, _rx) = mpsc::channel(8);
        let poller = SensorPoller::new(
            &config(
                &server.url(),
                &[("printer", "sensor.printer_plug"), ("broken", "sensor.broken")],
            ),
            tx,
        );

        let update = poller.poll_once().await;
        assert_eq!(update.len(), 1);
        let printer = &update["printer"];
        assert_eq!(printer["state"], 42.5);
        assert_eq!(printer["total_energy"], 1.75);
    }

    #[tokio::test]
    async fn test_dotted_sensor_ids_are_skipped() {
        let (tx, _rx) = mpsc::channel(8);
        let poller = SensorPoller::new(
            &config("http://localhost", &[("sensor.plug", "sensor.plug"), ("plug", "sensor.plug")]),
            tx,
        );
        assert_eq!(poller.sensors, vec![("plug".to_string(), "sensor.plug".to_string())]);
    }

    #[tokio::test]
    async fn test_watch_reports_poller_exit() {
        let (tx, _rx) = mpsc::channel(8);
        let handle = SensorPoller::new(&config("http://localhost", &[]), tx).spawn();
        assert!(SensorPoller::watch(handle).await.is_ok());

        let failing = tokio::spawn(async { panic!("poller failure") });
        let result = SensorPoller::watch(failing).await;
        assert!(result.unwrap_err().is_panic());
    }

    #[tokio::test]
    async fn test_spawned_poller_publishes_events() {
        let mut server = mockito::Server::new_async().await;
        let _plug = server
            .mock("GET", "/api/states/sensor.printer_plug")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"entity_id": "sensor.printer_plug", "state": "7"}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let (tx, mut rx) = mpsc::channel(8);
        let handle =
            SensorPoller::new(&config(&server.url(), &[("printer", "sensor.printer_plug")]), tx).spawn();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("Should receive a sensor update")
            .unwrap();

        match event {
            EnergyEvent::Sensors(update) => assert_eq!(update["printer"]["state"], 7.0),
            other => panic!("Expected sensor update, got {other:?}"),
        }
        handle.abort();
    }
}

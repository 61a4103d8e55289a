use crate::energy_manager::{SensorUpdate, SharedEnergyManager};
use crate::job_state::JobEvent;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::info;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Everything that can change the energy accounting
#[derive(Debug, Clone)]
pub enum EnergyEvent {
    Sensors(SensorUpdate),
    Job(JobEvent),
}

/// Feeds inbound events into the shared energy manager.
/// All events go through one channel and one task, so they are applied in the
/// order they were sent.
pub struct EventCoordinator {
    sender: Sender<EnergyEvent>,
    worker: JoinHandle<()>,
}

impl EventCoordinator {
    /// Creates the event channel and starts the task applying its events
    pub fn start(manager: SharedEnergyManager) -> Self {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let worker = tokio::spawn(Self::run(manager, receiver));
        Self { sender, worker }
    }

    /// Handle for producers of events
    pub fn sender(&self) -> Sender<EnergyEvent> {
        self.sender.clone()
    }

    /// Drops our own sender and waits until every queued event is applied.
    /// Returns once all other senders are gone too.
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.worker.await;
    }

    async fn run(manager: SharedEnergyManager, mut events: Receiver<EnergyEvent>) {
        info!("Starting energy event handler task");

        while let Some(event) = events.recv().await {
            let mut manager = manager.lock().await;
            match event {
                EnergyEvent::Sensors(update) => manager.handle_sensor_update(&update),
                EnergyEvent::Job(job_event) => manager.handle_job_event(job_event),
            }
        }

        info!("Energy event handler task exiting");
    }
}

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a running channel listener
pub struct ChannelHandle {
    pub name: String,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<(), String>>,
}

impl ChannelHandle {
    pub fn new(
        name: impl Into<String>,
        shutdown_tx: oneshot::Sender<()>,
        task: JoinHandle<Result<(), String>>,
    ) -> Self {
        Self {
            name: name.into(),
            shutdown_tx,
            task,
        }
    }

    /// Signal the listener and wait for it to finish
    pub async fn stop(self) -> Result<(), String> {
        if self.shutdown_tx.send(()).is_err() {
            log::debug!("{} listener already stopped", self.name);
        }
        self.task
            .await
            .map_err(|e| format!("{} listener task failed: {}", self.name, e))?
    }
}

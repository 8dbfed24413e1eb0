use super::controller::{ControllerSnapshot, SyncCommand};
use super::error::SyncError;
use super::ingest::IncomingFile;
use crate::metadata::MetadataField;
use tokio::sync::{mpsc, oneshot, watch};

/// Handle to interact with the sync controller from HTTP handlers and tests.
///
/// Every operation returns as soon as the controller has validated and
/// applied it; generation cycles continue in the background and show up in
/// later snapshots.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    snapshot_rx: watch::Receiver<ControllerSnapshot>,
}

impl SyncHandle {
    pub fn new(
        command_tx: mpsc::Sender<SyncCommand>,
        snapshot_rx: watch::Receiver<ControllerSnapshot>,
    ) -> Self {
        Self {
            command_tx,
            snapshot_rx,
        }
    }

    /// Route a dropped or picked audio file into the controller.
    pub async fn select_audio_file(&self, file: IncomingFile) -> Result<(), SyncError> {
        self.request(|response| SyncCommand::SelectAudioFile { file, response })
            .await
    }

    /// Submit a track link. Resolution continues in the background.
    pub async fn submit_link(&self, link: String) -> Result<(), SyncError> {
        self.request(|response| SyncCommand::SubmitLink { link, response })
            .await
    }

    /// Write a field by hand. Any regeneration is left to the debounce gates.
    pub async fn edit_field(&self, field: MetadataField, value: String) -> Result<(), SyncError> {
        self.request(|response| SyncCommand::EditField {
            field,
            value,
            response,
        })
        .await
    }

    pub async fn upload_cover(&self, file: IncomingFile) -> Result<(), SyncError> {
        self.request(|response| SyncCommand::UploadCover { file, response })
            .await
    }

    pub async fn clear_cover(&self) -> Result<(), SyncError> {
        self.request(|response| SyncCommand::ClearCover { response })
            .await
    }

    /// Explicitly run a generation cycle for the current title. With `image`
    /// set, the cycle produces a cover even over a user-authored one.
    pub async fn regenerate(&self, image: bool) -> Result<(), SyncError> {
        self.request(|response| SyncCommand::Regenerate { image, response })
            .await
    }

    /// Latest published state.
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified on every published state change.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until a published snapshot satisfies `condition`.
    pub async fn wait_for(
        &self,
        condition: impl FnMut(&ControllerSnapshot) -> bool,
    ) -> Result<ControllerSnapshot, SyncError> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(condition)
            .await
            .map_err(|_| SyncError::ControllerStopped)?;
        Ok(snapshot.clone())
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<(), SyncError>>) -> SyncCommand,
    ) -> Result<(), SyncError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(command(response_tx))
            .await
            .map_err(|_| SyncError::ControllerStopped)?;

        response_rx
            .await
            .map_err(|_| SyncError::ControllerStopped)?
    }
}

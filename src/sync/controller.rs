//! The metadata synchronization controller.
//!
//! A single task owns the metadata record, progress, the loop guard and both
//! debounce gates. Commands arrive from [`SyncHandle`]s; upload simulation,
//! link resolution and generation cycles run as spawned tasks that report back
//! through an internal event channel, so every mutation happens on this task.

use super::debounce::{DebounceExpired, DebounceGate, WatchGroup};
use super::error::{ErrorReport, SyncError};
use super::handle::SyncHandle;
use super::ingest::{parse_link, seed_from_audio_file, IncomingFile};
use super::link_resolver::LinkResolver;
use super::loop_guard::LoopGuard;
use super::pipeline::{GenerationPipeline, PipelineOutcome, ProgressReporter};
use crate::metadata::{
    checkpoints, cover, CoverImage, CoverOrigin, DetailsGroup, Genre, GenerationRequest,
    GenerationResult, MetadataField, MetadataRecord, Privacy, ProgressState, Seed,
};
use crate::server::metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing knobs for the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Quiet period of both debounce gates.
    pub debounce: Duration,
    /// Delay between simulated upload progress steps.
    pub upload_step_interval: Duration,
    /// Upload progress added per step.
    pub upload_step_percent: u8,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: super::debounce::DEFAULT_QUIET_PERIOD,
            upload_step_interval: Duration::from_millis(100),
            upload_step_percent: 10,
        }
    }
}

/// The input the current metadata was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputSource {
    #[default]
    None,
    AudioFile {
        file_name: String,
    },
    Link {
        url: String,
    },
}

impl InputSource {
    pub fn is_some(&self) -> bool {
        !matches!(self, InputSource::None)
    }
}

/// Everything a presentation layer needs to render the current state.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ControllerSnapshot {
    pub record: MetadataRecord,
    pub progress: ProgressState,
    /// A generation cycle is in flight.
    pub busy: bool,
    /// Another cycle is queued behind the in-flight one.
    pub pending: bool,
    /// A submitted link is being resolved.
    pub resolving: bool,
    pub source: InputSource,
    pub last_error: Option<ErrorReport>,
}

/// Whether a cycle should produce a cover image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImagePolicy {
    /// Only when the record has no cover when the cycle starts.
    IfMissing,
    Never,
    /// Explicit request; may replace a user-authored cover.
    Force,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerReason {
    Ingestion,
    TitleSettled,
    DetailsSettled,
    Explicit,
}

impl TriggerReason {
    fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::Ingestion => "ingestion",
            TriggerReason::TitleSettled => "title_settled",
            TriggerReason::DetailsSettled => "details_settled",
            TriggerReason::Explicit => "explicit",
        }
    }
}

impl ImagePolicy {
    fn strength(&self) -> u8 {
        match self {
            ImagePolicy::Never => 0,
            ImagePolicy::IfMissing => 1,
            ImagePolicy::Force => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CycleTrigger {
    reason: TriggerReason,
    image: ImagePolicy,
}

impl CycleTrigger {
    /// Fold a newer trigger into a queued one. The newer reason wins; the
    /// image policy never weakens.
    fn merge(self, newer: CycleTrigger) -> CycleTrigger {
        CycleTrigger {
            reason: newer.reason,
            image: if newer.image.strength() >= self.image.strength() {
                newer.image
            } else {
                self.image
            },
        }
    }
}

struct InFlightCycle {
    id: u64,
    epoch: u64,
    trigger: CycleTrigger,
    /// The title was cleared while this cycle ran.
    stale: bool,
    handle: AbortHandle,
}

/// Commands sent by a [`SyncHandle`].
pub enum SyncCommand {
    SelectAudioFile {
        file: IncomingFile,
        response: oneshot::Sender<Result<(), SyncError>>,
    },
    SubmitLink {
        link: String,
        response: oneshot::Sender<Result<(), SyncError>>,
    },
    EditField {
        field: MetadataField,
        value: String,
        response: oneshot::Sender<Result<(), SyncError>>,
    },
    UploadCover {
        file: IncomingFile,
        response: oneshot::Sender<Result<(), SyncError>>,
    },
    ClearCover {
        response: oneshot::Sender<Result<(), SyncError>>,
    },
    Regenerate {
        image: bool,
        response: oneshot::Sender<Result<(), SyncError>>,
    },
}

/// Reports from tasks spawned by the controller.
#[derive(Debug)]
enum ControllerEvent {
    UploadProgress { epoch: u64, value: u8 },
    UploadFinished { epoch: u64 },
    LinkResolved { epoch: u64, result: Result<Seed, SyncError> },
    AnalysisProgress { cycle_id: u64, value: u8 },
    CycleFinished { cycle_id: u64, result: Result<PipelineOutcome, SyncError> },
}

struct CycleProgress {
    cycle_id: u64,
    events: mpsc::UnboundedSender<ControllerEvent>,
}

impl ProgressReporter for CycleProgress {
    fn analysis_progress(&self, value: u8) {
        let _ = self.events.send(ControllerEvent::AnalysisProgress {
            cycle_id: self.cycle_id,
            value,
        });
    }
}

pub struct SyncController {
    record: MetadataRecord,
    progress: ProgressState,
    source: InputSource,
    last_error: Option<ErrorReport>,
    guard: LoopGuard,
    title_gate: DebounceGate<String>,
    details_gate: DebounceGate<DetailsGroup>,

    /// Bumped by every ingestion; cycles started under an older epoch are superseded.
    input_epoch: u64,
    next_cycle_id: u64,
    in_flight: Option<InFlightCycle>,
    pending: Option<CycleTrigger>,
    upload_task: Option<JoinHandle<()>>,
    link_task: Option<JoinHandle<()>>,

    pipeline: Arc<GenerationPipeline>,
    link_resolver: Arc<dyn LinkResolver>,
    settings: SyncSettings,

    command_rx: mpsc::Receiver<SyncCommand>,
    event_tx: mpsc::UnboundedSender<ControllerEvent>,
    event_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    expired_rx: mpsc::UnboundedReceiver<DebounceExpired>,
    snapshot_tx: watch::Sender<ControllerSnapshot>,
    shutdown_token: CancellationToken,
}

impl SyncController {
    /// Main controller loop. Returns on shutdown or when every handle is gone.
    pub async fn run(mut self) {
        info!(
            provider = self.pipeline.service().name(),
            model = self.pipeline.service().model(),
            "Starting sync controller"
        );

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        info!("All sync handles dropped");
                        break;
                    }
                },
                Some(event) = self.event_rx.recv() => {
                    self.handle_event(event);
                }
                Some(expired) = self.expired_rx.recv() => {
                    self.on_debounce_expired(expired);
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Sync controller received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown();
        info!("Sync controller stopped");
    }

    fn shutdown(&mut self) {
        for task in [self.upload_task.take(), self.link_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        if let Some(cycle) = self.in_flight.take() {
            debug!(cycle_id = cycle.id, "Aborting in-flight generation cycle");
            cycle.handle.abort();
        }
    }

    fn handle_command(&mut self, cmd: SyncCommand) {
        match cmd {
            SyncCommand::SelectAudioFile { file, response } => {
                let result = self.select_audio_file(file);
                self.respond(response, result);
            }
            SyncCommand::SubmitLink { link, response } => {
                let result = self.submit_link(link);
                self.respond(response, result);
            }
            SyncCommand::EditField {
                field,
                value,
                response,
            } => {
                let result = self.edit_field(field, value);
                self.respond(response, result);
            }
            SyncCommand::UploadCover { file, response } => {
                let result = self.upload_cover(file);
                self.respond(response, result);
            }
            SyncCommand::ClearCover { response } => {
                self.clear_cover();
                self.respond(response, Ok(()));
            }
            SyncCommand::Regenerate { image, response } => {
                self.regenerate(image);
                self.respond(response, Ok(()));
            }
        }
    }

    /// Publish the resulting state before answering, so callers observe their own writes.
    fn respond(
        &self,
        response: oneshot::Sender<Result<(), SyncError>>,
        result: Result<(), SyncError>,
    ) {
        self.publish();
        let _ = response.send(result);
    }

    fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::UploadProgress { epoch, value } => {
                if epoch == self.input_epoch {
                    self.progress.ingestion = value;
                }
            }
            ControllerEvent::UploadFinished { epoch } => {
                if epoch == self.input_epoch {
                    self.upload_task = None;
                    debug!("Simulated upload complete");
                    self.request_cycle(CycleTrigger {
                        reason: TriggerReason::Ingestion,
                        image: ImagePolicy::IfMissing,
                    });
                }
            }
            ControllerEvent::LinkResolved { epoch, result } => {
                if epoch == self.input_epoch {
                    self.link_task = None;
                    self.on_link_resolved(result);
                } else {
                    debug!("Dropping resolution of a superseded link");
                }
            }
            ControllerEvent::AnalysisProgress { cycle_id, value } => {
                if self.is_current_cycle(cycle_id) {
                    self.progress.analysis = value;
                }
            }
            ControllerEvent::CycleFinished { cycle_id, result } => {
                self.on_cycle_finished(cycle_id, result);
            }
        }
        self.publish();
    }

    // ---- Ingestion ----

    fn select_audio_file(&mut self, file: IncomingFile) -> Result<(), SyncError> {
        metrics::record_input("audio_file");
        self.begin_input();

        let seed = match seed_from_audio_file(&file) {
            Ok(seed) => seed,
            Err(e) => {
                warn!(file_name = %file.file_name, "Rejected audio input: {}", e);
                self.source = InputSource::None;
                self.write_ingested(MetadataRecord::reset_derived);
                self.last_error = Some(e.report());
                return Err(e);
            }
        };

        info!(
            file_name = %file.file_name,
            title = %seed.title,
            track_type = %seed.track_type,
            "Audio file selected"
        );
        self.source = InputSource::AudioFile {
            file_name: file.file_name.clone(),
        };
        self.write_ingested(|record| {
            record.reset_derived();
            record.title = seed.title;
            record.track_type = seed.track_type;
        });
        self.spawn_upload();
        Ok(())
    }

    fn submit_link(&mut self, link: String) -> Result<(), SyncError> {
        metrics::record_input("link");

        let url = match parse_link(&link) {
            Ok(url) => url,
            Err(SyncError::EmptyInput(field)) => {
                let err = SyncError::EmptyInput(field);
                self.last_error = Some(err.report());
                return Err(err);
            }
            Err(e) => {
                warn!("Rejected link '{}': {}", link.trim(), e);
                self.begin_input();
                self.source = InputSource::None;
                self.write_ingested(MetadataRecord::reset_derived);
                self.last_error = Some(e.report());
                return Err(e);
            }
        };

        info!(link = %url, "Track link submitted");
        self.begin_input();
        self.source = InputSource::Link {
            url: url.to_string(),
        };
        self.write_ingested(MetadataRecord::reset_derived);

        let epoch = self.input_epoch;
        let events = self.event_tx.clone();
        let resolver = self.link_resolver.clone();
        let link = url.to_string();
        self.link_task = Some(tokio::spawn(async move {
            let result = resolver.resolve(&link).await;
            let _ = events.send(ControllerEvent::LinkResolved { epoch, result });
        }));
        Ok(())
    }

    fn on_link_resolved(&mut self, result: Result<Seed, SyncError>) {
        match result {
            Ok(seed) => {
                info!(
                    title = %seed.title,
                    artist = seed.artist.as_deref().unwrap_or(""),
                    track_type = %seed.track_type,
                    "Link resolved"
                );
                self.write_ingested(|record| apply_seed(record, seed));
                self.request_cycle(CycleTrigger {
                    reason: TriggerReason::Ingestion,
                    image: ImagePolicy::IfMissing,
                });
            }
            Err(e) => {
                warn!("Link resolution failed: {}", e);
                self.source = InputSource::None;
                self.progress = ProgressState::default();
                self.write_ingested(MetadataRecord::reset_derived);
                self.last_error = Some(e.report());
            }
        }
    }

    /// Start a new operation: supersede in-flight work and reset progress.
    fn begin_input(&mut self) {
        self.input_epoch += 1;
        self.pending = None;
        self.last_error = None;
        self.progress = ProgressState::default();
        for task in [self.upload_task.take(), self.link_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }

    fn spawn_upload(&mut self) {
        let epoch = self.input_epoch;
        let events = self.event_tx.clone();
        let interval = self.settings.upload_step_interval;
        let step = self.settings.upload_step_percent.clamp(1, 100);

        self.upload_task = Some(tokio::spawn(async move {
            let mut value: u8 = 0;
            while value < 100 {
                tokio::time::sleep(interval).await;
                value = value.saturating_add(step).min(100);
                let _ = events.send(ControllerEvent::UploadProgress { epoch, value });
            }
            let _ = events.send(ControllerEvent::UploadFinished { epoch });
        }));
    }

    // ---- Manual edits ----

    fn edit_field(&mut self, field: MetadataField, value: String) -> Result<(), SyncError> {
        if let Err(e) = self.apply_edit(field, value) {
            warn!(field = field.as_str(), "Rejected manual edit: {}", e);
            self.last_error = Some(e.report());
            return Err(e);
        }
        debug!(field = field.as_str(), "Manual edit");
        self.record_changed();
        Ok(())
    }

    fn apply_edit(&mut self, field: MetadataField, value: String) -> Result<(), SyncError> {
        match field {
            MetadataField::Title => self.record.title = value,
            MetadataField::Artist => self.record.artist = value,
            MetadataField::Tags => self.record.tags = value,
            MetadataField::Description => self.record.description = value,
            MetadataField::Genre => {
                self.record.genre = if value.trim().is_empty() {
                    None
                } else {
                    Some(Genre::parse(&value).ok_or_else(|| {
                        SyncError::InvalidInputKind(format!("unknown genre '{}'", value.trim()))
                    })?)
                };
            }
            MetadataField::Privacy => {
                self.record.privacy = Privacy::parse(&value).ok_or_else(|| {
                    SyncError::InvalidInputKind(format!("unknown privacy '{}'", value.trim()))
                })?;
            }
        }
        Ok(())
    }

    fn upload_cover(&mut self, file: IncomingFile) -> Result<(), SyncError> {
        if !file.is_image() {
            let err = SyncError::InvalidInputKind(format!(
                "expected an image file, got '{}'",
                file.content_type
            ));
            warn!(file_name = %file.file_name, "Rejected cover upload: {}", err);
            self.record.cover_image = None;
            self.last_error = Some(err.report());
            return Err(err);
        }

        info!(file_name = %file.file_name, bytes = file.bytes.len(), "Cover image uploaded");
        self.record.cover_image = Some(CoverImage {
            data_uri: cover::encode_data_uri(&file.bytes, Some(&file.content_type)),
            origin: CoverOrigin::User,
        });
        self.last_error = None;
        Ok(())
    }

    fn clear_cover(&mut self) {
        if self.record.cover_image.take().is_some() {
            info!("Cover image removed");
        }
    }

    fn regenerate(&mut self, image: bool) {
        info!(image, "Regeneration requested");
        self.request_cycle(CycleTrigger {
            reason: TriggerReason::Explicit,
            image: if image {
                ImagePolicy::Force
            } else {
                ImagePolicy::Never
            },
        });
    }

    // ---- Reactive rules ----

    fn on_debounce_expired(&mut self, expired: DebounceExpired) {
        match expired.group {
            WatchGroup::Title => {
                if let Some(title) = self.title_gate.on_expired(expired.seq) {
                    self.on_title_settled(title);
                }
            }
            WatchGroup::Details => {
                if self.details_gate.on_expired(expired.seq).is_some() {
                    self.on_details_settled();
                }
            }
        }
        self.publish();
    }

    fn on_title_settled(&mut self, title: String) {
        if self.guard.is_engaged() {
            return;
        }

        if title.trim().is_empty() {
            debug!("Title cleared, clearing generated fields");
            if let Some(cycle) = self.in_flight.as_mut() {
                info!(cycle_id = cycle.id, "Title cleared mid-cycle, result will be dropped");
                cycle.stale = true;
                self.progress.analysis = checkpoints::START;
            }
            self.pending = None;
            self.write_derived(MetadataRecord::clear_generated_text);
            return;
        }

        self.request_cycle(CycleTrigger {
            reason: TriggerReason::TitleSettled,
            image: ImagePolicy::IfMissing,
        });
    }

    fn on_details_settled(&mut self) {
        if !self.source.is_some() || self.record.title.trim().is_empty() {
            return;
        }
        if self.guard.is_engaged() {
            return;
        }

        self.request_cycle(CycleTrigger {
            reason: TriggerReason::DetailsSettled,
            image: ImagePolicy::Never,
        });
    }

    // ---- Generation cycles ----

    fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn is_current_cycle(&self, cycle_id: u64) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|c| c.id == cycle_id && c.epoch == self.input_epoch && !c.stale)
    }

    fn request_cycle(&mut self, trigger: CycleTrigger) {
        if self.is_busy() {
            debug!(
                reason = trigger.reason.as_str(),
                "Generation in flight, deferring cycle"
            );
            self.pending = Some(match self.pending {
                Some(queued) => queued.merge(trigger),
                None => trigger,
            });
            return;
        }
        self.start_cycle(trigger);
    }

    fn start_cycle(&mut self, trigger: CycleTrigger) {
        let generate_image = match trigger.image {
            ImagePolicy::IfMissing => !self.record.has_cover(),
            ImagePolicy::Never => false,
            ImagePolicy::Force => true,
        };
        let request = GenerationRequest::from_record(&self.record, generate_image);

        self.next_cycle_id += 1;
        let cycle_id = self.next_cycle_id;
        self.progress.analysis = checkpoints::START;
        self.last_error = None;

        info!(
            cycle_id,
            reason = trigger.reason.as_str(),
            title = %request.title,
            generate_image,
            "Starting generation cycle"
        );

        let pipeline = self.pipeline.clone();
        let progress = CycleProgress {
            cycle_id,
            events: self.event_tx.clone(),
        };
        let work = tokio::spawn(async move { pipeline.generate(&request, &progress).await });
        let handle = work.abort_handle();

        // A crashed cycle still reports back, so the controller never stays busy.
        let events = self.event_tx.clone();
        tokio::spawn(async move {
            let result = match work.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => return,
                Err(e) => {
                    error!(cycle_id, "Generation cycle panicked: {}", e);
                    Err(SyncError::CycleCrashed(e.to_string()))
                }
            };
            let _ = events.send(ControllerEvent::CycleFinished { cycle_id, result });
        });

        self.in_flight = Some(InFlightCycle {
            id: cycle_id,
            epoch: self.input_epoch,
            trigger,
            stale: false,
            handle,
        });
    }

    fn on_cycle_finished(&mut self, cycle_id: u64, result: Result<PipelineOutcome, SyncError>) {
        let cycle = match self.in_flight.take() {
            Some(cycle) if cycle.id == cycle_id => cycle,
            other => {
                self.in_flight = other;
                debug!(cycle_id, "Ignoring result of an unknown cycle");
                return;
            }
        };

        if cycle.epoch != self.input_epoch || cycle.stale {
            info!(cycle_id, "Discarding result of a superseded cycle");
        } else {
            self.apply_cycle_result(&cycle, result);
        }

        if let Some(trigger) = self.pending.take() {
            self.start_cycle(trigger);
        }
    }

    fn apply_cycle_result(&mut self, cycle: &InFlightCycle, result: Result<PipelineOutcome, SyncError>) {
        match result {
            Ok(PipelineOutcome::ClearRequested) => {
                self.write_derived(|record| {
                    record.clear_generated_text();
                    record.artist.clear();
                });
                self.progress.analysis = checkpoints::START;
            }
            Ok(PipelineOutcome::Generated(generated)) => {
                if let Some(message) = &generated.partial_parse {
                    self.last_error = Some(ErrorReport::partial_parse(message.clone()));
                }
                let force_image = cycle.trigger.image == ImagePolicy::Force;
                self.write_derived(|record| apply_generated(record, generated, force_image));
                info!(cycle_id = cycle.id, "Generation cycle applied");
            }
            Err(e) => {
                error!(cycle_id = cycle.id, "Generation cycle failed: {}", e);
                self.progress.analysis = checkpoints::START;
                self.last_error = Some(e.report());
            }
        }
    }

    // ---- Record writes ----

    /// Apply a controller-originated write with the loop guard engaged.
    ///
    /// Only the groups the write touched are rebased, so a user edit still
    /// settling in an untouched group keeps its timer.
    fn write_derived(&mut self, write: impl FnOnce(&mut MetadataRecord)) {
        let _scope = self.guard.engage();
        let title = self.record.title_group();
        let details = self.record.details_group();
        write(&mut self.record);

        let next_title = self.record.title_group();
        if next_title != title {
            self.title_gate.rebase(next_title);
        }
        let next_details = self.record.details_group();
        if next_details != details {
            self.details_gate.rebase(next_details);
        }
    }

    /// Apply a new input. Edits still settling belong to the replaced record
    /// and are dropped.
    fn write_ingested(&mut self, write: impl FnOnce(&mut MetadataRecord)) {
        let _scope = self.guard.engage();
        write(&mut self.record);
        self.title_gate.reset(self.record.title_group());
        self.details_gate.reset(self.record.details_group());
    }

    /// Feed a user edit into the gates, restarting the quiet period of each
    /// group it changed.
    fn record_changed(&mut self) {
        if self.guard.is_engaged() {
            return;
        }
        let title = self.record.title_group();
        if *self.title_gate.latest() != title {
            self.title_gate.observe(title);
        }
        let details = self.record.details_group();
        if *self.details_gate.latest() != details {
            self.details_gate.observe(details);
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            record: self.record.clone(),
            progress: self.progress,
            busy: self.is_busy(),
            pending: self.pending.is_some(),
            resolving: self.link_task.is_some(),
            source: self.source.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

fn apply_seed(record: &mut MetadataRecord, seed: Seed) {
    record.title = seed.title;
    record.artist = seed.artist.unwrap_or_default();
    record.genre = seed.genre;
    record.tags = seed.tags.unwrap_or_default();
    record.description = seed.description.unwrap_or_default();
    record.track_type = seed.track_type;
}

/// Apply generated fields. A user-authored cover is replaced only when the
/// cycle was an explicit image request.
fn apply_generated(record: &mut MetadataRecord, generated: GenerationResult, force_image: bool) {
    record.genre = generated.genre;
    record.tags = generated.tags;
    record.description = generated.description;

    if let Some(data_uri) = generated.image {
        let replaceable = match &record.cover_image {
            None => true,
            Some(existing) => existing.origin == CoverOrigin::Generated || force_image,
        };
        if replaceable {
            record.cover_image = Some(CoverImage {
                data_uri,
                origin: CoverOrigin::Generated,
            });
        } else {
            debug!("Keeping user-authored cover over generated image");
        }
    }
}

/// Create a controller and its handle. The caller spawns [`SyncController::run`].
pub fn create_controller(
    pipeline: GenerationPipeline,
    link_resolver: Arc<dyn LinkResolver>,
    settings: SyncSettings,
    shutdown_token: CancellationToken,
) -> (SyncController, SyncHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (expired_tx, expired_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(ControllerSnapshot::default());

    let record = MetadataRecord::default();
    let title_gate = DebounceGate::new(
        WatchGroup::Title,
        settings.debounce,
        record.title_group(),
        expired_tx.clone(),
    );
    let details_gate = DebounceGate::new(
        WatchGroup::Details,
        settings.debounce,
        record.details_group(),
        expired_tx,
    );

    let controller = SyncController {
        record,
        progress: ProgressState::default(),
        source: InputSource::None,
        last_error: None,
        guard: LoopGuard::new(),
        title_gate,
        details_gate,
        input_epoch: 0,
        next_cycle_id: 0,
        in_flight: None,
        pending: None,
        upload_task: None,
        link_task: None,
        pipeline: Arc::new(pipeline),
        link_resolver,
        settings,
        command_rx,
        event_tx,
        event_rx,
        expired_rx,
        snapshot_tx,
        shutdown_token,
    };

    (controller, SyncHandle::new(command_tx, snapshot_rx))
}

/// Create a controller and spawn it on the current runtime.
pub fn spawn_controller(
    pipeline: GenerationPipeline,
    link_resolver: Arc<dyn LinkResolver>,
    settings: SyncSettings,
    shutdown_token: CancellationToken,
) -> (SyncHandle, JoinHandle<()>) {
    let (controller, handle) =
        create_controller(pipeline, link_resolver, settings, shutdown_token);
    (handle, tokio::spawn(controller.run()))
}

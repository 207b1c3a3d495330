// Classification loop: one frame -> one inference round-trip -> one state-machine step
//
// Cycles run strictly one after another: `run` awaits each cycle before waiting
// for the next tick, so at most one classification request is ever in flight.

use crate::core::clock::Clock;
use crate::core::config::Config;
use crate::core::inference_client::PoseInference;
use crate::core::overlay::{self, DrawSurface, OverlayRenderer};
use crate::core::session_state::Session;
use crate::models::pose::{ClassificationResult, ClassifyError, ClassifyResult, FailureKind};
use crate::models::session::{LoopEvent, PoseSequence, SessionState, SessionSummary};
use crate::platform::frame_source::FrameSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==============================================================================
// Settings
// ==============================================================================

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub pose_sequence: PoseSequence,
    pub confidence_threshold: f32,
    pub hold_duration_ms: i64,
    pub congratulation_delay_ms: i64,
    pub congratulation_message: String,
    pub prompt_templates: Vec<String>,
    pub frame_interval: Duration,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pose_sequence: config.pose_sequence.clone(),
            confidence_threshold: config.confidence_threshold,
            hold_duration_ms: config.hold_duration_ms,
            congratulation_delay_ms: config.congratulation_delay_ms,
            congratulation_message: config.congratulation_message.clone(),
            prompt_templates: config.prompt_templates.clone(),
            frame_interval: Duration::from_millis(config.frame_interval_ms),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Display surfaces owned by the loop
pub struct Surfaces<S> {
    /// Skeleton overlay
    pub pose: S,
    /// Timer, prompt, and congratulation text
    pub text: S,
}

/// What a single cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Classified { events: Vec<LoopEvent> },
    Skipped(FailureKind),
    /// The sequence is exhausted; nothing was done
    Finished,
}

// ==============================================================================
// Classification Loop
// ==============================================================================

pub struct ClassificationLoop<F, C, S, K> {
    session_id: Uuid,
    settings: LoopSettings,
    frames: F,
    inference: C,
    renderer: OverlayRenderer,
    surfaces: Surfaces<S>,
    clock: K,
    rng: StdRng,
    position: usize,
    // None once the sequence is exhausted
    session: Option<Session>,
    state: SessionState,
    pending_congratulation: Option<i64>,
    summary: SessionSummary,
}

impl<F, C, S, K> ClassificationLoop<F, C, S, K>
where
    F: FrameSource,
    C: PoseInference,
    S: DrawSurface,
    K: Clock,
{
    pub fn new(settings: LoopSettings, frames: F, inference: C, surfaces: Surfaces<S>, clock: K) -> Self {
        let session_id = Uuid::new_v4();
        let mut this = Self {
            session_id,
            settings,
            frames,
            inference,
            renderer: OverlayRenderer::default(),
            surfaces,
            clock,
            rng: StdRng::from_os_rng(),
            position: 0,
            session: None,
            state: SessionState::Waiting,
            pending_congratulation: None,
            summary: SessionSummary {
                session_id: session_id.to_string(),
                ..Default::default()
            },
        };
        this.start_session();
        this
    }

    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Seed prompt selection, regenerating the current prompt
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.start_session();
        self
    }

    fn start_session(&mut self) {
        let mut session = Session::new();
        session.set_target(self.settings.pose_sequence.first());
        let draw = self.rng.random::<u32>() as usize;
        session.generate_prompt(&self.settings.prompt_templates, draw);

        self.position = 0;
        self.state = SessionState::Waiting;
        self.session = Some(session);
    }

    /// Run one cycle: classify the current frame, draw, and step the state machine
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if self.session.is_none() {
            return CycleOutcome::Finished;
        }
        self.summary.cycles += 1;

        let outcome = match self.classify_current_frame().await {
            Ok(result) => {
                self.summary.classified_cycles += 1;
                self.renderer.render(&mut self.surfaces.pose, &result.predictions);
                let events = self.apply_transition(&result);
                CycleOutcome::Classified { events }
            }
            Err(err) => {
                self.record_failure(&err);
                CycleOutcome::Skipped(err.kind())
            }
        };

        self.refresh_text();
        outcome
    }

    /// Run cycles at the frame interval until the sequence completes, `max_cycles`
    /// is reached, or `shutdown` resolves
    pub async fn run<Fut>(&mut self, shutdown: Fut, max_cycles: Option<u64>) -> SessionSummary
    where
        Fut: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.settings.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Session {} started with {} pose(s), first target: {}",
            self.session_id,
            self.settings.pose_sequence.len(),
            self.settings.pose_sequence.first()
        );

        loop {
            if max_cycles.is_some_and(|max| self.summary.cycles >= max) {
                info!("Reached cycle limit ({})", self.summary.cycles);
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                outcome = self.run_cycle() => outcome,
            };

            if outcome == CycleOutcome::Finished || self.is_finished() {
                self.deliver_final_congratulation(&mut shutdown).await;
                break;
            }
        }

        info!(
            "Session {} stopped after {} cycle(s): {} classified, {} failed, completed poses: {:?}",
            self.session_id,
            self.summary.cycles,
            self.summary.classified_cycles,
            self.summary.total_failures(),
            self.summary.completed_poses
        );

        self.summary.clone()
    }

    async fn classify_current_frame(&mut self) -> ClassifyResult<ClassificationResult> {
        let frame = self
            .frames
            .current_frame()
            .await
            .map_err(|e| ClassifyError::EncodeError(format!("Frame unavailable: {}", e)))?;
        self.inference.classify(&frame).await
    }

    /// Step the state machine with the first prediction's pose and confidence
    fn apply_transition(&mut self, result: &ClassificationResult) -> Vec<LoopEvent> {
        let now = self.clock.now_ms();
        let threshold = self.settings.confidence_threshold;
        let confidence = result.confidence;
        let previous = self.state;
        let mut events = Vec::new();

        let Some(session) = self.session.as_mut() else {
            return events;
        };
        let target = session.target_pose().unwrap_or_default().to_string();
        let matched = result.predicted_pose == target && confidence > threshold;

        match self.state {
            SessionState::Waiting => {
                if matched {
                    info!("Holding {} ({:.1}%)", target, confidence);
                    session.start_timer(now);
                    self.state = SessionState::Holding;
                    events.push(LoopEvent::HoldStarted { pose: target });
                } else {
                    debug!(
                        "Waiting for {}, saw {} ({:.1}%)",
                        target, result.predicted_pose, confidence
                    );
                }
            }
            SessionState::Holding => {
                if confidence <= threshold {
                    info!("Lost {} ({:.1}%), back to waiting", target, confidence);
                    session.stop_timer(now);
                    self.state = SessionState::Waiting;
                    events.push(LoopEvent::HoldBroken { pose: target });
                } else if matched
                    && session
                        .elapsed(now)
                        .is_some_and(|held| held > self.settings.hold_duration_ms)
                {
                    session.stop_timer(now);
                    self.state = SessionState::Waiting;
                    self.position += 1;
                    self.summary.completed_poses.push(target.clone());
                    self.pending_congratulation = Some(now + self.settings.congratulation_delay_ms);

                    match self.settings.pose_sequence.get(self.position) {
                        Some(next) => {
                            info!("Completed {}, next pose: {}", target, next);
                            session.set_target(next);
                            let draw = self.rng.random::<u32>() as usize;
                            session.generate_prompt(&self.settings.prompt_templates, draw);
                            events.push(LoopEvent::PoseAdvanced {
                                from: target,
                                to: next.to_string(),
                            });
                        }
                        None => {
                            info!("Completed {}, sequence finished", target);
                            self.session = None;
                            self.summary.finished = true;
                            events.push(LoopEvent::SequenceComplete { last: target });
                        }
                    }
                } else {
                    debug!("Holding {}", target);
                }
            }
        }

        if self.state != previous {
            debug!("State {} -> {}", previous.to_string(), self.state.to_string());
        }
        events
    }

    fn record_failure(&mut self, err: &ClassifyError) {
        *self.summary.failures.entry(err.kind()).or_insert(0) += 1;
        match err {
            ClassifyError::NoDetection => debug!("No subject in frame, skipping cycle"),
            other => warn!("Skipping cycle: {}", other),
        }
    }

    /// Timer while holding, otherwise the prompt; a due congratulation takes precedence
    fn refresh_text(&mut self) {
        let now = self.clock.now_ms();
        if self.pending_congratulation.is_some_and(|due| now >= due) {
            self.show_congratulation();
            return;
        }

        let Some(session) = self.session.as_ref() else {
            return;
        };
        let text = match session.elapsed(now) {
            Some(elapsed) => overlay::format_timer(elapsed),
            None => session.prompt().unwrap_or_default().to_string(),
        };
        overlay::render_status(&mut self.surfaces.text, &text);
    }

    fn show_congratulation(&mut self) {
        self.pending_congratulation = None;
        overlay::render_status(&mut self.surfaces.text, &self.settings.congratulation_message);
    }

    /// The last pose's congratulation is still owed when the sequence ends
    async fn deliver_final_congratulation<Fut>(&mut self, shutdown: &mut std::pin::Pin<&mut Fut>)
    where
        Fut: Future<Output = ()>,
    {
        let Some(due) = self.pending_congratulation else {
            return;
        };
        let wait = (due - self.clock.now_ms()).max(0) as u64;

        tokio::select! {
            biased;
            _ = shutdown.as_mut() => {}
            _ = tokio::time::sleep(Duration::from_millis(wait)) => self.show_congratulation(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_none()
    }

    pub fn pending_congratulation(&self) -> Option<i64> {
        self.pending_congratulation
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn surfaces(&self) -> &Surfaces<S> {
        &self.surfaces
    }
}

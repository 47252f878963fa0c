use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use nav_session_types::Maneuver;

use crate::config::NarrationConfig;
use crate::error::NarrationError;
use crate::locale::{primary_subtag, Locale};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP-47 tag, like "es-AR"
    pub lang: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// None means the engine's default voice
    pub voice: Option<Voice>,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    /// May be empty while the engine is still loading its voices.
    fn voices(&self) -> Vec<Voice>;

    /// Resolves once playback ends. Dropping the future doesn't stop playback; `cancel_all` does.
    async fn speak(&self, utterance: Utterance) -> Result<(), NarrationError>;

    fn cancel_all(&self);

    fn pause(&self) {}

    fn resume(&self) {}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct UtteranceId(pub u64);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NarrationOutcome {
    /// Everything was spoken to the end
    Completed,
    /// Preempted by newer narration, or narration was stopped
    Interrupted,
    /// The engine failed. Already logged.
    Failed,
}

/// A running narration job. Dropping this doesn't stop it.
pub struct Narration {
    task: JoinHandle<NarrationOutcome>,
}

impl Narration {
    pub async fn finished(self) -> NarrationOutcome {
        self.task.await.unwrap_or(NarrationOutcome::Interrupted)
    }
}

#[derive(Default)]
struct NarratorState {
    enabled: bool,
    active_utterance: Option<UtteranceId>,
    // The running job's number and its cancellation
    job: Option<(u64, CancellationToken)>,
    next_job: u64,
    next_id: u64,
}

/// Speaks instructions through a `SpeechEngine`. Only one job runs at a time; starting a new one
/// cancels the old one, and at most one utterance is ever playing.
#[derive(Clone)]
pub struct VoiceNarrator {
    engine: Arc<dyn SpeechEngine>,
    config: NarrationConfig,
    language: String,
    locale: Locale,
    state: Arc<Mutex<NarratorState>>,
}

impl VoiceNarrator {
    /// Starts out disabled.
    pub fn new(engine: Arc<dyn SpeechEngine>, config: NarrationConfig, language: &str) -> Self {
        Self {
            engine,
            config,
            language: language.to_string(),
            locale: Locale::from_tag(language),
            state: Arc::new(Mutex::new(NarratorState::default())),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.engine.is_supported()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn active_utterance(&self) -> Option<UtteranceId> {
        self.lock().active_utterance
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Disabling stops everything immediately. Enabling never resumes what was interrupted.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), NarrationError> {
        if enabled {
            if !self.engine.is_supported() {
                return Err(NarrationError::Unsupported);
            }
            self.lock().enabled = true;
            info!("Voice narration enabled");
        } else {
            self.lock().enabled = false;
            self.stop();
            info!("Voice narration disabled");
        }
        Ok(())
    }

    /// Cancels the running job and silences the engine.
    pub fn stop(&self) {
        {
            let mut state = self.lock();
            if let Some((_, job)) = state.job.take() {
                job.cancel();
            }
            state.active_utterance = None;
        }
        self.engine.cancel_all();
    }

    pub fn pause(&self) {
        self.engine.pause();
    }

    pub fn resume(&self) {
        self.engine.resume();
    }

    /// Preempts whatever is playing. Returns None if narration is disabled.
    ///
    /// Must be called within a tokio runtime.
    pub fn speak(&self, text: &str) -> Option<Narration> {
        self.start(vec![text.to_string()])
    }

    /// The intro phrase, every maneuver, then the arrival phrase, with a pause between each.
    pub fn speak_sequence(&self, maneuvers: &[Maneuver]) -> Option<Narration> {
        let mut items = Vec::with_capacity(maneuvers.len() + 2);
        items.push(self.locale.intro().to_string());
        for m in maneuvers {
            items.push(self.announce(m));
        }
        items.push(self.locale.arrival().to_string());
        self.start(items)
    }

    /// The spoken form of one maneuver. Short distances aren't worth mentioning.
    pub fn announce(&self, maneuver: &Maneuver) -> String {
        if maneuver.distance_meters > self.config.announce_distance_over_meters {
            format!(
                "{} {}",
                maneuver.text,
                self.locale.distance_phrase(maneuver.distance_meters)
            )
        } else {
            maneuver.text.clone()
        }
    }

    fn start(&self, items: Vec<String>) -> Option<Narration> {
        let cancel = CancellationToken::new();
        let number = {
            let mut state = self.lock();
            if !state.enabled {
                return None;
            }
            state.next_job += 1;
            let number = state.next_job;
            if let Some((_, old)) = state.job.replace((number, cancel.clone())) {
                debug!("Preempting the previous narration");
                old.cancel();
            }
            state.active_utterance = None;
            number
        };
        self.engine.cancel_all();

        let job = Job {
            narrator: self.clone(),
            number,
            cancel,
        };
        Some(Narration {
            task: tokio::spawn(async move { job.run(items).await }),
        })
    }

    fn utterance(&self, text: &str) -> Utterance {
        // Voices can show up late, so look every time
        let want = primary_subtag(&self.language);
        let voice = self
            .engine
            .voices()
            .into_iter()
            .find(|v| primary_subtag(&v.lang) == want);
        Utterance {
            text: text.to_string(),
            voice,
            lang: self.language.clone(),
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
        }
    }

    fn lock(&self) -> MutexGuard<'_, NarratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Job {
    narrator: VoiceNarrator,
    number: u64,
    cancel: CancellationToken,
}

enum Played {
    Done,
    Interrupted,
    Failed,
}

impl Job {
    async fn run(self, items: Vec<String>) -> NarrationOutcome {
        // Give the engine time to process the cancel before queueing anything
        if !self.wait(self.narrator.config.settle()).await {
            return NarrationOutcome::Interrupted;
        }
        for (idx, text) in items.iter().enumerate() {
            if idx > 0 && !self.wait(self.narrator.config.pause()).await {
                return NarrationOutcome::Interrupted;
            }
            match self.play(text).await {
                Played::Done => {}
                Played::Interrupted => return NarrationOutcome::Interrupted,
                Played::Failed => {
                    self.finish();
                    return NarrationOutcome::Failed;
                }
            }
        }
        self.finish();
        NarrationOutcome::Completed
    }

    /// False if cancelled before the time is up
    async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    async fn play(&self, text: &str) -> Played {
        let id = {
            let mut state = self.narrator.lock();
            // Checked under the lock, so a newer job can never share the slot with this one
            if self.cancel.is_cancelled() {
                return Played::Interrupted;
            }
            state.next_id += 1;
            let id = UtteranceId(state.next_id);
            state.active_utterance = Some(id);
            id
        };

        let utterance = self.narrator.utterance(text);
        // Cancellation is checked first, so nothing starts after a stop
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.narrator.engine.speak(utterance) => Some(result),
        };

        {
            let mut state = self.narrator.lock();
            if state.active_utterance == Some(id) {
                state.active_utterance = None;
            }
        }

        match result {
            None => Played::Interrupted,
            Some(Ok(())) => Played::Done,
            Some(Err(err)) => {
                warn!("Narration failed on {text:?}: {err}");
                Played::Failed
            }
        }
    }

    // Forget this job, unless a newer one already took its place
    fn finish(&self) {
        let mut state = self.narrator.lock();
        if matches!(state.job, Some((number, _)) if number == self.number) {
            state.job = None;
        }
    }
}

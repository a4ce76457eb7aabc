/// Emotion reaction pipeline.
///
/// `text → classify → gate (confidence, neutral) → map → lookup → dispatch`.
/// The only state kept between calls is the time of the last successful
/// reaction, used as a cooldown so the lamp does not twitch on every sentence.
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::animation::{AnimationDispatcher, RecordingStore};
use crate::config::EmotionConfig;
use crate::error::EmotionError;

use super::classifier::snippet;
use super::{Emotion, EmotionClassifier, EmotionRecordingMap};

/// Gating policy, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionSettings {
    pub auto_react: bool,
    pub min_confidence: f32,
    pub cooldown: Duration,
}

impl ReactionSettings {
    pub fn from_config(config: &EmotionConfig) -> Result<Self, EmotionError> {
        if !(0.0..=1.0).contains(&config.min_confidence) {
            return Err(EmotionError::Config(format!(
                "min_confidence must be within [0, 1], got {}",
                config.min_confidence
            )));
        }
        let cooldown = Duration::try_from_secs_f64(config.cooldown_seconds).map_err(|_| {
            EmotionError::Config(format!(
                "cooldown_seconds must be a non-negative number, got {}",
                config.cooldown_seconds
            ))
        })?;
        Ok(Self {
            auto_react: config.auto_react,
            min_confidence: config.min_confidence,
            cooldown,
        })
    }
}

/// Why a reaction attempt ended without moving the lamp.
#[derive(Debug, Clone, PartialEq)]
pub enum SuppressReason {
    AutoReactDisabled,
    CoolingDown,
    NoClassification,
    LowConfidence { emotion: Emotion, confidence: f32 },
    Neutral,
    NoRecordingMapped(Emotion),
    RecordingMissing(String),
    DispatchFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReactionOutcome {
    Reacted {
        emotion: Emotion,
        recording: String,
        confidence: f32,
    },
    Suppressed(SuppressReason),
}

impl ReactionOutcome {
    pub fn is_reacted(&self) -> bool {
        matches!(self, Self::Reacted { .. })
    }
}

pub struct EmotionService {
    settings: ReactionSettings,
    classifier: EmotionClassifier,
    recordings: EmotionRecordingMap,
    store: Arc<dyn RecordingStore>,
    dispatcher: Arc<dyn AnimationDispatcher>,
    /// Held only for the compare and the update, never across an await.
    last_reaction: Mutex<Option<Instant>>,
}

impl EmotionService {
    pub fn new(
        settings: ReactionSettings,
        classifier: EmotionClassifier,
        recordings: EmotionRecordingMap,
        store: Arc<dyn RecordingStore>,
        dispatcher: Arc<dyn AnimationDispatcher>,
    ) -> Self {
        Self {
            settings,
            classifier,
            recordings,
            store,
            dispatcher,
            last_reaction: Mutex::new(None),
        }
    }

    /// Build the service from the `[emotion]` config section.
    ///
    /// A disabled or malformed section yields `Ok(None)`. A missing API key is
    /// an error: a half-configured service should not silently do nothing.
    pub fn from_config(
        config: &EmotionConfig,
        store: Arc<dyn RecordingStore>,
        dispatcher: Arc<dyn AnimationDispatcher>,
    ) -> Result<Option<Self>, EmotionError> {
        match Self::try_from_config(config, store, dispatcher) {
            Ok(service) => {
                tracing::info!(
                    provider = %config.provider,
                    model = %config.effective_model(),
                    "emotion service initialized"
                );
                Ok(Some(service))
            }
            Err(EmotionError::Disabled) => {
                tracing::info!("emotion service disabled in config");
                Ok(None)
            }
            Err(e) if e.is_config() => {
                tracing::warn!("emotion service not started: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn try_from_config(
        config: &EmotionConfig,
        store: Arc<dyn RecordingStore>,
        dispatcher: Arc<dyn AnimationDispatcher>,
    ) -> Result<Self, EmotionError> {
        if !config.enabled {
            return Err(EmotionError::Disabled);
        }
        let settings = ReactionSettings::from_config(config)?;
        let classifier = EmotionClassifier::from_config(config)?;
        let recordings = EmotionRecordingMap::with_overrides(&config.recordings);
        Ok(Self::new(settings, classifier, recordings, store, dispatcher))
    }

    pub fn settings(&self) -> &ReactionSettings {
        &self.settings
    }

    pub fn classifier(&self) -> &EmotionClassifier {
        &self.classifier
    }

    /// Time of the last successful reaction, if any.
    pub fn last_reaction_time(&self) -> Option<Instant> {
        *self.lock_last_reaction()
    }

    /// Classify `text` and play a matching recording. Returns true iff a
    /// reaction was dispatched. Never fails: every problem is logged and
    /// counts as "no reaction".
    pub async fn trigger_reaction(&self, text: &str) -> bool {
        self.react(text).await.is_reacted()
    }

    /// Same as [`trigger_reaction`](Self::trigger_reaction), reporting where
    /// the attempt stopped.
    pub async fn react(&self, text: &str) -> ReactionOutcome {
        use SuppressReason::*;

        if !self.settings.auto_react {
            return ReactionOutcome::Suppressed(AutoReactDisabled);
        }

        // Checked before classifying so the API is not billed during cooldown.
        if self.cooling_down(Instant::now()) {
            tracing::debug!("emotion reaction skipped: cooling down");
            return ReactionOutcome::Suppressed(CoolingDown);
        }

        tracing::debug!(text = %snippet(text, 100), "analyzing emotion");
        let Some(result) = self.classifier.classify(text).await else {
            tracing::debug!("emotion analysis returned no result");
            return ReactionOutcome::Suppressed(NoClassification);
        };
        let (emotion, confidence) = (result.emotion, result.confidence);

        if confidence < self.settings.min_confidence {
            tracing::info!(
                %emotion,
                confidence = format_args!("{confidence:.2}"),
                threshold = self.settings.min_confidence,
                "emotion below confidence threshold, skipping reaction"
            );
            return ReactionOutcome::Suppressed(LowConfidence {
                emotion,
                confidence,
            });
        }

        if emotion == Emotion::Neutral {
            tracing::debug!("neutral emotion detected, skipping reaction");
            return ReactionOutcome::Suppressed(Neutral);
        }

        let Some(recording) = self.recordings.map(emotion, self.store.as_ref()) else {
            tracing::warn!(%emotion, "no recording mapping for emotion");
            return ReactionOutcome::Suppressed(NoRecordingMapped(emotion));
        };
        tracing::info!(%emotion, %recording, "mapped emotion to recording");

        match self.store.resolve(&recording) {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!(%recording, "recording not found");
                return ReactionOutcome::Suppressed(RecordingMissing(recording));
            }
            Err(e) => {
                tracing::warn!(%recording, "recording lookup failed: {e}");
                return ReactionOutcome::Suppressed(RecordingMissing(recording));
            }
        }

        if let Err(e) = self.dispatcher.dispatch("play", &recording).await {
            tracing::error!(%emotion, %recording, "error triggering emotion animation: {e}");
            return ReactionOutcome::Suppressed(DispatchFailed(e.to_string()));
        }

        self.record_reaction(Instant::now());
        tracing::info!(
            %emotion,
            %recording,
            confidence = format_args!("{confidence:.2}"),
            text = %snippet(text, 50),
            "emotion reaction triggered"
        );
        ReactionOutcome::Reacted {
            emotion,
            recording,
            confidence,
        }
    }

    fn cooling_down(&self, now: Instant) -> bool {
        match *self.lock_last_reaction() {
            Some(last) => now.saturating_duration_since(last) < self.settings.cooldown,
            None => false,
        }
    }

    fn record_reaction(&self, at: Instant) {
        let mut last = self.lock_last_reaction();
        *last = Some(last.map_or(at, |prev| prev.max(at)));
    }

    fn lock_last_reaction(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        // The guarded value is a plain timestamp; a panic elsewhere cannot corrupt it.
        self.last_reaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GenerationParams, TextGenerator};
    use anyhow::Result;
    use futures::future::{BoxFuture, FutureExt};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // ── test doubles ─────────────────────────────────────────────

    struct ScriptedModel {
        reply: String,
        calls: Arc<AtomicUsize>,
    }

    impl TextGenerator for ScriptedModel {
        fn generate<'a>(
            &'a self,
            _prompt: &'a str,
            _params: GenerationParams,
        ) -> BoxFuture<'a, Result<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply.clone();
            async move { Ok(reply) }.boxed()
        }
    }

    struct Recordings(Vec<&'static str>);

    impl RecordingStore for Recordings {
        fn resolve(&self, name: &str) -> Result<Option<PathBuf>> {
            Ok(self
                .0
                .iter()
                .any(|n| *n == name)
                .then(|| PathBuf::from(format!("/recordings/{name}.csv"))))
        }

        fn list(&self) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|n| n.to_string()).collect())
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(String, String)>>,
        fail: AtomicBool,
    }

    impl AnimationDispatcher for RecordingDispatcher {
        fn dispatch<'a>(&'a self, command: &'a str, argument: &'a str) -> BoxFuture<'a, Result<()>> {
            async move {
                if self.fail.load(Ordering::SeqCst) {
                    anyhow::bail!("motor bus offline");
                }
                self.sent
                    .lock()
                    .unwrap()
                    .push((command.to_string(), argument.to_string()));
                Ok(())
            }
            .boxed()
        }
    }

    struct Harness {
        service: EmotionService,
        model_calls: Arc<AtomicUsize>,
        dispatcher: Arc<RecordingDispatcher>,
    }

    impl Harness {
        fn sent(&self) -> Vec<(String, String)> {
            self.dispatcher.sent.lock().unwrap().clone()
        }

        fn model_calls(&self) -> usize {
            self.model_calls.load(Ordering::SeqCst)
        }
    }

    fn settings(cooldown_secs: f64) -> ReactionSettings {
        ReactionSettings {
            auto_react: true,
            min_confidence: 0.7,
            cooldown: Duration::from_secs_f64(cooldown_secs),
        }
    }

    fn harness_with(
        reply: &str,
        settings: ReactionSettings,
        recordings: Vec<&'static str>,
    ) -> Harness {
        let model_calls = Arc::new(AtomicUsize::new(0));
        let classifier = EmotionClassifier::new(Box::new(ScriptedModel {
            reply: reply.to_string(),
            calls: model_calls.clone(),
        }));
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let service = EmotionService::new(
            settings,
            classifier,
            EmotionRecordingMap::default(),
            Arc::new(Recordings(recordings)),
            dispatcher.clone(),
        );
        Harness {
            service,
            model_calls,
            dispatcher,
        }
    }

    fn harness(reply: &str) -> Harness {
        harness_with(reply, settings(2.0), vec!["happy_wiggle", "sad", "curious"])
    }

    const HAPPY_085: &str =
        r#"{"emotion": "happy", "confidence": 0.85, "reasoning": "user shared good news"}"#;

    // ── gating ───────────────────────────────────────────────────

    #[tokio::test]
    async fn qualifying_happy_text_plays_happy_wiggle() {
        let h = harness(HAPPY_085);
        let before = Instant::now();

        assert!(h.service.trigger_reaction("I got the job!").await);

        assert_eq!(h.sent(), vec![("play".to_string(), "happy_wiggle".to_string())]);
        let last = h.service.last_reaction_time().expect("timestamp updated");
        assert!(last >= before);
    }

    #[tokio::test]
    async fn low_confidence_never_dispatches() {
        for confidence in ["0.0", "0.5", "0.69"] {
            let reply = format!(r#"{{"emotion": "happy", "confidence": {confidence}}}"#);
            let h = harness(&reply);
            let outcome = h.service.react("meh").await;
            assert!(
                matches!(outcome, ReactionOutcome::Suppressed(SuppressReason::LowConfidence { .. })),
                "confidence {confidence}: {outcome:?}"
            );
            assert!(h.sent().is_empty());
            assert!(h.service.last_reaction_time().is_none());
        }
    }

    #[tokio::test]
    async fn confidence_exactly_at_threshold_passes() {
        let h = harness(r#"{"emotion": "sad", "confidence": 0.7}"#);
        assert!(h.service.trigger_reaction("my cat is sick").await);
        assert_eq!(h.sent()[0].1, "sad");
    }

    #[tokio::test]
    async fn neutral_never_dispatches_even_when_certain() {
        let h = harness(r#"{"emotion": "neutral", "confidence": 0.99}"#);
        assert_eq!(
            h.service.react("the meeting is at 3").await,
            ReactionOutcome::Suppressed(SuppressReason::Neutral)
        );
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_response_never_dispatches() {
        let h = harness("I'd say they're pretty happy!");
        assert_eq!(
            h.service.react("yay").await,
            ReactionOutcome::Suppressed(SuppressReason::NoClassification)
        );
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_emotion_field_is_treated_as_neutral() {
        let h = harness(r#"{"confidence": 0.95, "reasoning": "?"}"#);
        assert_eq!(
            h.service.react("yay").await,
            ReactionOutcome::Suppressed(SuppressReason::Neutral)
        );
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn auto_react_off_skips_classification() {
        let mut s = settings(2.0);
        s.auto_react = false;
        let h = harness_with(HAPPY_085, s, vec!["happy_wiggle"]);
        assert_eq!(
            h.service.react("I got the job!").await,
            ReactionOutcome::Suppressed(SuppressReason::AutoReactDisabled)
        );
        assert_eq!(h.model_calls(), 0);
    }

    #[tokio::test]
    async fn blank_text_is_no_classification() {
        let h = harness(HAPPY_085);
        assert!(!h.service.trigger_reaction("   ").await);
        assert_eq!(h.model_calls(), 0);
    }

    // ── mapping and lookup ───────────────────────────────────────

    #[tokio::test]
    async fn excited_falls_through_to_happy_wiggle() {
        let h = harness(r#"{"emotion": "joy", "confidence": 0.9}"#);
        let outcome = h.service.react("we won!!").await;
        assert_eq!(
            outcome,
            ReactionOutcome::Reacted {
                emotion: Emotion::Excited,
                recording: "happy_wiggle".to_string(),
                confidence: 0.9,
            }
        );
    }

    #[tokio::test]
    async fn missing_recording_is_not_dispatched() {
        let h = harness_with(HAPPY_085, settings(2.0), vec![]);
        assert_eq!(
            h.service.react("I got the job!").await,
            ReactionOutcome::Suppressed(SuppressReason::RecordingMissing("happy_wiggle".to_string()))
        );
        assert!(h.sent().is_empty());
        assert!(h.service.last_reaction_time().is_none());
    }

    // ── dispatch failure ─────────────────────────────────────────

    #[tokio::test]
    async fn dispatch_failure_leaves_cooldown_untouched() {
        let h = harness(HAPPY_085);
        h.dispatcher.fail.store(true, Ordering::SeqCst);

        let outcome = h.service.react("I got the job!").await;
        assert!(matches!(
            outcome,
            ReactionOutcome::Suppressed(SuppressReason::DispatchFailed(ref msg)) if msg.contains("offline")
        ));
        assert!(h.service.last_reaction_time().is_none());

        // Not cooling down: the next qualifying input goes straight through.
        h.dispatcher.fail.store(false, Ordering::SeqCst);
        assert!(h.service.trigger_reaction("I got the job!").await);
        assert_eq!(h.model_calls(), 2);
    }

    // ── cooldown ─────────────────────────────────────────────────

    #[tokio::test]
    async fn rapid_repeat_reacts_once_and_skips_classifier() {
        let h = harness(HAPPY_085);

        let first = h.service.trigger_reaction("I got the job!").await;
        let second = h.service.trigger_reaction("I got the job!").await;

        assert!(first);
        assert!(!second);
        assert_eq!(h.model_calls(), 1, "classifier must not run during cooldown");
        assert_eq!(h.sent().len(), 1);
    }

    #[tokio::test]
    async fn cooldown_reports_reason() {
        let h = harness(HAPPY_085);
        h.service.react("I got the job!").await;
        assert_eq!(
            h.service.react("and a raise!").await,
            ReactionOutcome::Suppressed(SuppressReason::CoolingDown)
        );
    }

    #[tokio::test]
    async fn zero_cooldown_allows_back_to_back_reactions() {
        let h = harness_with(HAPPY_085, settings(0.0), vec!["happy_wiggle"]);
        assert!(h.service.trigger_reaction("one").await);
        assert!(h.service.trigger_reaction("two").await);
        assert_eq!(h.sent().len(), 2);
    }

    #[tokio::test]
    async fn cooldown_expires() {
        let h = harness_with(HAPPY_085, settings(0.05), vec!["happy_wiggle"]);
        assert!(h.service.trigger_reaction("one").await);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(h.service.trigger_reaction("two").await);
        assert_eq!(h.model_calls(), 2);
    }

    #[test]
    fn record_reaction_never_moves_backwards() {
        let h = harness(HAPPY_085);
        let later = Instant::now() + Duration::from_secs(10);
        h.service.record_reaction(later);
        h.service.record_reaction(Instant::now());
        assert_eq!(h.service.last_reaction_time(), Some(later));
    }

    #[tokio::test]
    async fn shared_service_reacts_from_spawned_tasks() {
        let h = harness(HAPPY_085);
        let service = Arc::new(h.service);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.trigger_reaction("I got the job!").await })
            })
            .collect();
        let mut reacted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                reacted += 1;
            }
        }
        // Racing callers may all slip past the cooldown check; at least one reacts.
        assert!(reacted >= 1);
        assert_eq!(h.dispatcher.sent.lock().unwrap().len(), reacted);
    }

    // ── construction ─────────────────────────────────────────────

    fn deps() -> (Arc<dyn RecordingStore>, Arc<dyn AnimationDispatcher>) {
        (
            Arc::new(Recordings(vec![])),
            Arc::new(RecordingDispatcher::default()),
        )
    }

    #[test]
    fn settings_reject_out_of_range_values() {
        let mut config = EmotionConfig::default();
        config.min_confidence = 1.5;
        assert!(ReactionSettings::from_config(&config).unwrap_err().is_config());

        let mut config = EmotionConfig::default();
        config.cooldown_seconds = -1.0;
        assert!(ReactionSettings::from_config(&config).unwrap_err().is_config());
    }

    #[test]
    fn settings_carry_config_values() {
        let config = EmotionConfig {
            min_confidence: 0.6,
            cooldown_seconds: 3.5,
            auto_react: false,
            ..EmotionConfig::default()
        };
        let s = ReactionSettings::from_config(&config).unwrap();
        assert!(!s.auto_react);
        assert!((s.min_confidence - 0.6).abs() < 1e-6);
        assert_eq!(s.cooldown, Duration::from_millis(3500));
    }

    #[test]
    fn disabled_config_builds_no_service() {
        let (store, dispatcher) = deps();
        let service = EmotionService::from_config(&EmotionConfig::default(), store, dispatcher);
        assert!(service.unwrap().is_none());
    }

    #[test]
    fn malformed_config_builds_no_service() {
        let (store, dispatcher) = deps();
        let config = EmotionConfig {
            enabled: true,
            min_confidence: -0.2,
            ..EmotionConfig::default()
        };
        assert!(EmotionService::from_config(&config, store, dispatcher)
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let (store, dispatcher) = deps();
        let config = EmotionConfig {
            enabled: true,
            api_key_env: "LELAMP_TEST_EMOTION_KEY_UNSET".to_string(),
            ..EmotionConfig::default()
        };
        let err = EmotionService::from_config(&config, store, dispatcher)
            .err()
            .expect("missing credential must propagate");
        assert!(matches!(err, EmotionError::MissingCredential(_)));
    }

    #[test]
    fn configured_service_uses_config_settings() {
        std::env::set_var("LELAMP_TEST_EMOTION_KEY_SET", "test-key");
        let (store, dispatcher) = deps();
        let config = EmotionConfig {
            enabled: true,
            cooldown_seconds: 4.0,
            api_key_env: "LELAMP_TEST_EMOTION_KEY_SET".to_string(),
            ..EmotionConfig::default()
        };
        let service = EmotionService::from_config(&config, store, dispatcher)
            .unwrap()
            .expect("service should be built");
        assert_eq!(service.settings().cooldown, Duration::from_secs(4));
        assert!(service.last_reaction_time().is_none());
    }

    #[test]
    fn service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EmotionService>();
    }
}

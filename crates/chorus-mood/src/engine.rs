use crate::heuristic::MoodHeuristic;
use crate::validate::{validate_update, EmotionalStateUpdate};
use async_trait::async_trait;
use chorus_bus::{EventBus, EventHandler};
use chorus_common::emotional::{EmotionalState, MoodDelta, MoodVector};
use chorus_common::event::{Event, EventData, EventType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const STRESS_REGULATION_THRESHOLD: f32 = 0.85;
const ENERGY_REGULATION_THRESHOLD: f32 = 0.15;
const VALENCE_REGULATION_THRESHOLD: f32 = 0.85;
const REGULATION_STEP: f32 = 0.1;

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

fn apply_momentum_axis(current: f32, delta: f32, momentum: &mut f32, range: (f32, f32)) -> f32 {
    *momentum = 0.7 * *momentum + 0.3 * delta;
    let effective = delta + 0.2 * *momentum;
    (current + effective).clamp(range.0, range.1)
}

/// Translates events into bounded emotional deltas and emits
/// `minion.emotional_change` when the update produces a material change.
/// Owned exclusively by the agent runtime for its minion — external
/// readers go through a snapshot or the bus, never a shared reference.
pub struct EmotionalEngine {
    minion_id: String,
    bus: Arc<EventBus>,
    heuristic: Arc<dyn MoodHeuristic>,
    state: RwLock<EmotionalState>,
    momentum: Mutex<MoodVector6>,
}

/// Per-axis EMA momentum, same shape as `MoodDelta` but tracked
/// independently of any single update.
#[derive(Default)]
struct MoodVector6 {
    valence: f32,
    arousal: f32,
    dominance: f32,
    curiosity: f32,
    creativity: f32,
    sociability: f32,
}

impl EmotionalEngine {
    pub fn new(minion_id: impl Into<String>, bus: Arc<EventBus>, heuristic: Arc<dyn MoodHeuristic>) -> Arc<Self> {
        let minion_id = minion_id.into();
        Arc::new(EmotionalEngine {
            state: RwLock::new(EmotionalState::new(minion_id.clone())),
            minion_id,
            bus,
            heuristic,
            momentum: Mutex::new(MoodVector6::default()),
        })
    }

    pub async fn snapshot(&self) -> EmotionalState {
        self.state.read().await.clone()
    }

    /// A single-paragraph natural-language rendering of the current
    /// snapshot, for substitution into a generator's system instruction.
    pub async fn mood_cue(&self) -> String {
        let state = self.state.read().await;
        let valence_word = if state.mood.valence > 0.3 {
            "upbeat"
        } else if state.mood.valence < -0.3 {
            "down"
        } else {
            "even-keeled"
        };
        let energy_word = if state.energy > 0.7 {
            "energetic"
        } else if state.energy < 0.3 {
            "tired"
        } else {
            "steady"
        };
        let stress_word = if state.stress > 0.7 {
            "stressed"
        } else if state.stress < 0.3 {
            "relaxed"
        } else {
            "calm"
        };
        let commander_clause = match state.commander_opinion() {
            Some(o) if o.overall_sentiment() > 80.0 => " You hold the commander in high regard.",
            Some(o) if o.overall_sentiment() < 60.0 => " You are wary of the commander.",
            _ => "",
        };
        format!(
            "You are feeling {valence_word}, {energy_word}, and {stress_word}.{commander_clause}"
        )
    }

    async fn apply(&self, update: EmotionalStateUpdate) {
        let validated = validate_update(update);
        let mut state = self.state.write().await;
        let mut momentum = self.momentum.lock().await;

        let mood = state.mood;
        state.mood = MoodVector {
            valence: apply_momentum_axis(mood.valence, validated.mood_delta.valence, &mut momentum.valence, (-1.0, 1.0)),
            arousal: apply_momentum_axis(mood.arousal, validated.mood_delta.arousal, &mut momentum.arousal, (0.0, 1.0)),
            dominance: apply_momentum_axis(mood.dominance, validated.mood_delta.dominance, &mut momentum.dominance, (0.0, 1.0)),
            curiosity: apply_momentum_axis(mood.curiosity, validated.mood_delta.curiosity, &mut momentum.curiosity, (0.0, 1.0)),
            creativity: apply_momentum_axis(mood.creativity, validated.mood_delta.creativity, &mut momentum.creativity, (0.0, 1.0)),
            sociability: apply_momentum_axis(mood.sociability, validated.mood_delta.sociability, &mut momentum.sociability, (0.0, 1.0)),
        };
        state.energy = clamp01(state.energy + validated.energy_delta);
        state.stress = clamp01(state.stress + validated.stress_delta);

        for (entity_id, (entity_type, delta)) in validated.opinion_deltas {
            let opinion = state.opinion_of(&entity_id, &entity_type);
            opinion.trust += delta.trust;
            opinion.respect += delta.respect;
            opinion.affection += delta.affection;
            opinion.interaction_count += 1;
            opinion.last_interaction = chrono::Utc::now();
            opinion.clamp_if_commander();
        }
        if let Some(event) = validated.notable_event {
            state.reflections.push(event);
        }
        state.bump_version();
        drop(momentum);

        let commander_opinion = state.commander_opinion().map(|o| o.overall_sentiment()).unwrap_or(0.0);
        let snapshot_mood = state.mood;
        let energy = state.energy;
        let stress = state.stress;
        drop(state);

        let _ = self
            .bus
            .emit(
                EventType::MinionEmotionalChange,
                EventData::MinionEmotionalChange {
                    minion_id: self.minion_id.clone(),
                    mood: serde_json::to_value(snapshot_mood).unwrap_or(serde_json::Value::Null),
                    energy,
                    stress,
                    commander_opinion,
                },
                "emotional_engine",
                HashMap::new(),
            )
            .await;
    }

    /// Nudges extreme values back toward neutral. Runs on the self-
    /// regulation loop, not on the per-event path, so it bypasses the
    /// heuristic but still goes through the same clamped-step/emit
    /// machinery via a synthetic update.
    async fn self_regulate(&self) {
        let (stress, energy, valence) = {
            let state = self.state.read().await;
            (state.stress, state.energy, state.mood.valence)
        };
        let mut update = EmotionalStateUpdate::default();
        let mut triggered = false;
        if stress > STRESS_REGULATION_THRESHOLD {
            update.stress_delta = -REGULATION_STEP;
            triggered = true;
        }
        if energy < ENERGY_REGULATION_THRESHOLD {
            update.energy_delta = REGULATION_STEP;
            triggered = true;
        }
        if valence.abs() > VALENCE_REGULATION_THRESHOLD {
            update.mood_delta = MoodDelta {
                valence: -REGULATION_STEP * valence.signum(),
                ..Default::default()
            };
            triggered = true;
        }
        if triggered {
            debug!(minion_id = %self.minion_id, "self-regulation triggered");
            self.apply(update).await;
        }
    }

    pub fn spawn_self_regulation_loop(self: &Arc<Self>, interval_secs: u64, token: CancellationToken) {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => engine.self_regulate().await,
                }
            }
        });
    }

    /// Subscribes to `channel.message` (filtered to sender/mention by the
    /// handler), every `task.*` event, and `minion.spawned`.
    pub async fn install(self: &Arc<Self>) {
        let handler: Arc<dyn EventHandler> = Arc::new(EngineHandler { engine: self.clone() });
        self.bus.subscribe(EventType::ChannelMessage, handler.clone()).await;
        self.bus.subscribe(EventType::MinionSpawned, handler.clone()).await;
        for &event_type in EventType::ALL.iter().filter(|t| t.is_task()) {
            self.bus.subscribe(event_type, handler.clone()).await;
        }
    }
}

struct EngineHandler {
    engine: Arc<EmotionalEngine>,
}

impl EngineHandler {
    fn relevant(&self, event: &Event) -> bool {
        match &event.data {
            EventData::ChannelMessage { sender_id, content, .. } => {
                sender_id == &self.engine.minion_id
                    || content.contains(&format!("@{}", self.engine.minion_id))
            }
            EventData::Task { assigned_to, .. } => {
                assigned_to.as_deref() == Some(self.engine.minion_id.as_str())
            }
            EventData::MinionSpawned { minion_id } => minion_id != &self.engine.minion_id,
            _ => false,
        }
    }
}

#[async_trait]
impl EventHandler for EngineHandler {
    async fn handle(&self, event: &Event) {
        if !self.relevant(event) {
            return;
        }
        let update = self.engine.heuristic.propose(event, &self.engine.minion_id).await;
        self.engine.apply(update).await;
    }
}

//! Proposes an unvalidated `EmotionalStateUpdate` from an event. Grounded
//! on the keyword/shape scoring style used elsewhere in the corpus for
//! "bounded score from heuristics over text" (confidence estimation);
//! generalized here from a single confidence scalar to a handful of
//! mood/energy/stress/opinion deltas.

use crate::validate::{EmotionalStateUpdate, OpinionDelta};
use async_trait::async_trait;
use chorus_common::emotional::MoodDelta;
use chorus_common::event::{Event, EventData};
use chorus_common::generator::{GenerationConfig, ResponseGenerator, ToolDescriptor};
use std::sync::Arc;

#[async_trait]
pub trait MoodHeuristic: Send + Sync {
    async fn propose(&self, event: &Event, minion_id: &str) -> EmotionalStateUpdate;
}

const POSITIVE_WORDS: &[&str] = &["thanks", "great", "awesome", "good job", "love", "nice", "helpful"];
const NEGATIVE_WORDS: &[&str] = &["stupid", "hate", "wrong", "terrible", "useless", "angry", "annoying"];
const TASK_WORDS: &[&str] = &["urgent", "deadline", "asap", "blocked", "failing"];

/// Default heuristic: scans message content for a small curated lexicon.
pub struct KeywordMoodHeuristic;

impl KeywordMoodHeuristic {
    fn score(content: &str, words: &[&str]) -> f32 {
        let lower = content.to_lowercase();
        words.iter().filter(|w| lower.contains(*w)).count() as f32
    }
}

#[async_trait]
impl MoodHeuristic for KeywordMoodHeuristic {
    async fn propose(&self, event: &Event, minion_id: &str) -> EmotionalStateUpdate {
        match &event.data {
            EventData::ChannelMessage { content, sender_id, .. } => {
                let positive = Self::score(content, POSITIVE_WORDS);
                let negative = Self::score(content, NEGATIVE_WORDS);
                let urgency = Self::score(content, TASK_WORDS);
                let sentiment = (positive - negative).clamp(-3.0, 3.0) / 3.0;

                let mut opinion_deltas = std::collections::HashMap::new();
                if sender_id != minion_id {
                    opinion_deltas.insert(
                        sender_id.clone(),
                        (
                            "human".to_string(),
                            OpinionDelta {
                                trust: sentiment * 5.0,
                                respect: sentiment * 3.0,
                                affection: sentiment * 4.0,
                            },
                        ),
                    );
                }

                EmotionalStateUpdate {
                    mood_delta: MoodDelta {
                        valence: sentiment * 0.2,
                        arousal: urgency.min(1.0) * 0.1,
                        dominance: 0.0,
                        curiosity: 0.0,
                        creativity: 0.0,
                        sociability: 0.05,
                    },
                    energy_delta: -0.02,
                    stress_delta: urgency.min(1.0) * 0.1 + if negative > 0.0 { 0.05 } else { 0.0 },
                    opinion_deltas,
                    notable_event: if sentiment.abs() > 0.5 {
                        Some(format!("strong sentiment from {sender_id}"))
                    } else {
                        None
                    },
                }
            }
            EventData::Task { status, .. } => EmotionalStateUpdate {
                stress_delta: if status == "failed" { 0.1 } else { -0.02 },
                energy_delta: if status == "completed" { 0.05 } else { 0.0 },
                ..Default::default()
            },
            EventData::MinionSpawned { .. } => EmotionalStateUpdate {
                mood_delta: MoodDelta {
                    sociability: 0.05,
                    ..Default::default()
                },
                ..Default::default()
            },
            _ => EmotionalStateUpdate::default(),
        }
    }
}

/// Optional variant backed by the same `ResponseGenerator` used by the
/// agent runtime, for deployments that want an LLM-derived mood judgment
/// instead of the keyword heuristic. Falls back to a zero delta on any
/// generator or parse failure rather than erroring the whole update path.
pub struct PolicyMoodHeuristic {
    generator: Arc<dyn ResponseGenerator>,
}

impl PolicyMoodHeuristic {
    pub fn new(generator: Arc<dyn ResponseGenerator>) -> Self {
        PolicyMoodHeuristic { generator }
    }
}

#[async_trait]
impl MoodHeuristic for PolicyMoodHeuristic {
    async fn propose(&self, event: &Event, minion_id: &str) -> EmotionalStateUpdate {
        let content = match &event.data {
            EventData::ChannelMessage { content, .. } => content.clone(),
            other => other.as_json().to_string(),
        };
        let instruction = format!(
            "You are the emotional appraisal module for minion {minion_id}. \
             Given the following event, respond with a JSON object \
             {{\"valence\":f32,\"energy\":f32,\"stress\":f32}} describing the \
             proposed delta, each in [-1,1]."
        );
        let config = GenerationConfig::for_persona(0.2, 128);
        let outcome = self
            .generator
            .generate(&instruction, &content, &[] as &[ToolDescriptor], &config)
            .await;
        let text = match outcome {
            Ok(chorus_common::generator::GenerationOutcome::Text(text)) => text,
            _ => return EmotionalStateUpdate::default(),
        };
        let parsed: serde_json::Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) => return EmotionalStateUpdate::default(),
        };
        EmotionalStateUpdate {
            mood_delta: MoodDelta {
                valence: parsed.get("valence").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
                ..Default::default()
            },
            energy_delta: parsed.get("energy").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
            stress_delta: parsed.get("stress").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn positive_message_yields_positive_valence_and_opinion() {
        let heuristic = KeywordMoodHeuristic;
        let event = Event::new(
            chorus_common::event::EventType::ChannelMessage,
            EventData::ChannelMessage {
                message_id: "msg_1".into(),
                channel_id: "c1".into(),
                sender_id: "u1".into(),
                content: "thanks, great job!".into(),
                message_type: "chat".into(),
                metadata: HashMap::new(),
                timestamp: chrono::Utc::now(),
            },
            "test",
            HashMap::new(),
        );
        let update = heuristic.propose(&event, "aria").await;
        assert!(update.mood_delta.valence > 0.0);
        assert!(update.opinion_deltas.contains_key("u1"));
    }

    #[tokio::test]
    async fn negative_message_yields_negative_valence() {
        let heuristic = KeywordMoodHeuristic;
        let event = Event::new(
            chorus_common::event::EventType::ChannelMessage,
            EventData::ChannelMessage {
                message_id: "msg_1".into(),
                channel_id: "c1".into(),
                sender_id: "u1".into(),
                content: "this is terrible and useless".into(),
                message_type: "chat".into(),
                metadata: HashMap::new(),
                timestamp: chrono::Utc::now(),
            },
            "test",
            HashMap::new(),
        );
        let update = heuristic.propose(&event, "aria").await;
        assert!(update.mood_delta.valence < 0.0);
    }
}

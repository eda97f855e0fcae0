//! Emotional snapshot types shared between the domain model and the
//! engine that mutates them (`chorus-mood`). Kept here, not in
//! `chorus-mood`, so `EmotionalState` can ride along on `minion.spawned`
//! and `minion.emotional_change` event payloads without a crate cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const COMMANDER_ENTITY_TYPE: &str = "commander";
pub const COMMANDER_OPINION_FLOOR: f32 = 50.0;
pub const COMMANDER_OPINION_CEIL: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodVector {
    pub valence: f32,
    pub arousal: f32,
    pub dominance: f32,
    pub curiosity: f32,
    pub creativity: f32,
    pub sociability: f32,
}

impl Default for MoodVector {
    fn default() -> Self {
        MoodVector {
            valence: 0.0,
            arousal: 0.5,
            dominance: 0.5,
            curiosity: 0.5,
            creativity: 0.5,
            sociability: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoodDelta {
    pub valence: f32,
    pub arousal: f32,
    pub dominance: f32,
    pub curiosity: f32,
    pub creativity: f32,
    pub sociability: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpinionScore {
    pub entity_type: String,
    pub trust: f32,
    pub respect: f32,
    pub affection: f32,
    pub interaction_count: u32,
    pub last_interaction: DateTime<Utc>,
    pub notable_events: Vec<String>,
}

impl OpinionScore {
    pub fn new(entity_type: impl Into<String>) -> Self {
        OpinionScore {
            entity_type: entity_type.into(),
            trust: 0.0,
            respect: 0.0,
            affection: 0.0,
            interaction_count: 0,
            last_interaction: Utc::now(),
            notable_events: Vec::new(),
        }
    }

    pub fn overall_sentiment(&self) -> f32 {
        (self.trust + self.respect + self.affection) / 3.0
    }

    /// For the commander, trust/respect/affection are floor-clamped at
    /// [COMMANDER_OPINION_FLOOR, COMMANDER_OPINION_CEIL] regardless of how
    /// the update arrived.
    pub fn clamp_if_commander(&mut self) {
        if self.entity_type == COMMANDER_ENTITY_TYPE {
            self.trust = self.trust.clamp(COMMANDER_OPINION_FLOOR, COMMANDER_OPINION_CEIL);
            self.respect = self.respect.clamp(COMMANDER_OPINION_FLOOR, COMMANDER_OPINION_CEIL);
            self.affection = self.affection.clamp(COMMANDER_OPINION_FLOOR, COMMANDER_OPINION_CEIL);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalState {
    pub minion_id: String,
    pub mood: MoodVector,
    pub energy: f32,
    pub stress: f32,
    pub opinions: HashMap<String, OpinionScore>,
    pub reflections: Vec<String>,
    pub last_updated: DateTime<Utc>,
    pub version: u64,
}

impl EmotionalState {
    pub fn new(minion_id: impl Into<String>) -> Self {
        EmotionalState {
            minion_id: minion_id.into(),
            mood: MoodVector::default(),
            energy: 0.7,
            stress: 0.2,
            opinions: HashMap::new(),
            reflections: Vec::new(),
            last_updated: Utc::now(),
            version: 0,
        }
    }

    pub fn opinion_of(&mut self, entity_id: &str, entity_type: &str) -> &mut OpinionScore {
        self.opinions
            .entry(entity_id.to_string())
            .or_insert_with(|| OpinionScore::new(entity_type))
    }

    pub fn commander_opinion(&self) -> Option<&OpinionScore> {
        self.opinions
            .values()
            .find(|o| o.entity_type == COMMANDER_ENTITY_TYPE)
    }

    pub fn bump_version(&mut self) {
        self.version += 1;
        self.last_updated = Utc::now();
    }
}

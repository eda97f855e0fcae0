//! The one place deltas get clamped, shared by every heuristic so the
//! quantified bounds in the testable-properties set hold regardless of
//! which algorithm proposed the update.

use chorus_common::emotional::MoodDelta;
use std::collections::HashMap;

pub const MOOD_DELTA_CAP: f32 = 0.3;
pub const ENERGY_DELTA_CAP: f32 = 0.2;
pub const STRESS_DELTA_CAP: f32 = 0.2;
pub const OPINION_DELTA_CAP: f32 = 20.0;

#[derive(Debug, Clone, Default)]
pub struct OpinionDelta {
    pub trust: f32,
    pub respect: f32,
    pub affection: f32,
}

#[derive(Debug, Clone, Default)]
pub struct EmotionalStateUpdate {
    pub mood_delta: MoodDelta,
    pub energy_delta: f32,
    pub stress_delta: f32,
    /// entity_id -> proposed opinion delta, plus the entity_type to use if
    /// this is the first interaction with that entity.
    pub opinion_deltas: HashMap<String, (String, OpinionDelta)>,
    pub notable_event: Option<String>,
}

fn clamp_axis(v: f32, cap: f32) -> f32 {
    v.clamp(-cap, cap)
}

/// Pure function: clamps every delta in `raw` to the documented per-call
/// bounds, independent of which heuristic produced it.
pub fn validate_update(raw: EmotionalStateUpdate) -> EmotionalStateUpdate {
    let mood_delta = MoodDelta {
        valence: clamp_axis(raw.mood_delta.valence, MOOD_DELTA_CAP),
        arousal: clamp_axis(raw.mood_delta.arousal, MOOD_DELTA_CAP),
        dominance: clamp_axis(raw.mood_delta.dominance, MOOD_DELTA_CAP),
        curiosity: clamp_axis(raw.mood_delta.curiosity, MOOD_DELTA_CAP),
        creativity: clamp_axis(raw.mood_delta.creativity, MOOD_DELTA_CAP),
        sociability: clamp_axis(raw.mood_delta.sociability, MOOD_DELTA_CAP),
    };
    let energy_delta = clamp_axis(raw.energy_delta, ENERGY_DELTA_CAP);
    let stress_delta = clamp_axis(raw.stress_delta, STRESS_DELTA_CAP);
    let opinion_deltas = raw
        .opinion_deltas
        .into_iter()
        .map(|(entity_id, (entity_type, delta))| {
            let clamped = OpinionDelta {
                trust: clamp_axis(delta.trust, OPINION_DELTA_CAP),
                respect: clamp_axis(delta.respect, OPINION_DELTA_CAP),
                affection: clamp_axis(delta.affection, OPINION_DELTA_CAP),
            };
            (entity_id, (entity_type, clamped))
        })
        .collect();
    EmotionalStateUpdate {
        mood_delta,
        energy_delta,
        stress_delta,
        opinion_deltas,
        notable_event: raw.notable_event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_deltas_are_clamped_to_cap() {
        let mut raw = EmotionalStateUpdate::default();
        raw.mood_delta.valence = 5.0;
        raw.mood_delta.arousal = -5.0;
        let validated = validate_update(raw);
        assert_eq!(validated.mood_delta.valence, MOOD_DELTA_CAP);
        assert_eq!(validated.mood_delta.arousal, -MOOD_DELTA_CAP);
    }

    #[test]
    fn energy_and_stress_deltas_clamped() {
        let mut raw = EmotionalStateUpdate::default();
        raw.energy_delta = 10.0;
        raw.stress_delta = -10.0;
        let validated = validate_update(raw);
        assert_eq!(validated.energy_delta, ENERGY_DELTA_CAP);
        assert_eq!(validated.stress_delta, -STRESS_DELTA_CAP);
    }

    #[test]
    fn opinion_deltas_clamped_per_axis() {
        let mut raw = EmotionalStateUpdate::default();
        raw.opinion_deltas.insert(
            "commander".to_string(),
            ("commander".to_string(), OpinionDelta { trust: 50.0, respect: -50.0, affection: 5.0 }),
        );
        let validated = validate_update(raw);
        let (_, delta) = &validated.opinion_deltas["commander"];
        assert_eq!(delta.trust, OPINION_DELTA_CAP);
        assert_eq!(delta.respect, -OPINION_DELTA_CAP);
        assert_eq!(delta.affection, 5.0);
    }
}

//! Workspace configuration, loaded from a single TOML file at startup.

use crate::domain::Persona;
use crate::error::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    #[serde(default = "default_rate_limit")]
    pub default_rate_limit_per_second: u32,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_rate_limit() -> u32 {
    10
}

fn default_history_limit() -> usize {
    1000
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            default_rate_limit_per_second: default_rate_limit(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelServiceConfig {
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    #[serde(default = "default_direct_channel_ttl_days")]
    pub direct_channel_ttl_days: i64,
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_direct_channel_ttl_days() -> i64 {
    7
}

impl Default for ChannelServiceConfig {
    fn default() -> Self {
        ChannelServiceConfig {
            flush_interval_secs: default_flush_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            direct_channel_ttl_days: default_direct_channel_ttl_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MinionConfig {
    pub id: String,
    pub persona: PersonaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonaConfig {
    pub name: String,
    pub base_personality: String,
    #[serde(default)]
    pub quirks: Vec<String>,
    #[serde(default)]
    pub catchphrases: Vec<String>,
    #[serde(default)]
    pub expertise_areas: Vec<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.9
}

fn default_max_tokens() -> u32 {
    2048
}

impl PersonaConfig {
    pub fn into_persona(self) -> Result<Persona, crate::domain::ValidationError> {
        Persona::new(
            self.name,
            self.base_personality,
            self.quirks,
            self.catchphrases,
            self.expertise_areas,
            self.allowed_tools,
            self.model_name,
            self.temperature,
            self.max_tokens,
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoodConfig {
    #[serde(default = "default_self_regulation_secs")]
    pub self_regulation_interval_secs: u64,
}

fn default_self_regulation_secs() -> u64 {
    60
}

impl Default for MoodConfig {
    fn default() -> Self {
        MoodConfig {
            self_regulation_interval_secs: default_self_regulation_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub channels: ChannelServiceConfig,
    #[serde(default)]
    pub mood: MoodConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub minions: Vec<MinionConfig>,
}

impl SystemConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> CommonResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SystemConfig = toml::from_str(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> CommonResult<()> {
        if self.bus.history_limit == 0 {
            return Err(CommonError::Validation("bus.history_limit must be > 0".into()));
        }
        Ok(())
    }
}

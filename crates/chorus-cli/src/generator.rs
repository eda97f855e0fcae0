//! Placeholder `ResponseGenerator`. The real generation backend is an
//! external collaborator outside this workspace's scope (see the
//! response-generator interface); this stub lets the container wire a
//! full runtime before a real backend is plugged in, and fails loudly
//! rather than fabricating replies.

use async_trait::async_trait;
use chorus_common::generator::{GenerationConfig, GenerationOutcome, GeneratorError, ResponseGenerator, ToolDescriptor};

pub struct UnconfiguredGenerator;

#[async_trait]
impl ResponseGenerator for UnconfiguredGenerator {
    async fn generate(
        &self,
        _system_instruction: &str,
        _history: &str,
        _tools: &[ToolDescriptor],
        _config: &GenerationConfig,
    ) -> Result<GenerationOutcome, GeneratorError> {
        Err(GeneratorError::Backend(
            "no response generator backend configured".to_string(),
        ))
    }
}

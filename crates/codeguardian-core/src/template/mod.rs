//! Prompt Template Rendering
//!
//! This module renders the prompt of every [`AiTask`]:
//! - One Handlebars template per task, registered at startup
//! - Strict mode, so a missing slot fails loudly instead of sending a broken prompt
//! - No HTML escaping, code is embedded verbatim

use crate::ai::AiTask;
use codeguardian_shared::{GuardianError, Result};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

/// Values substituted into a prompt template
#[derive(Debug, Serialize)]
struct PromptContext<'a> {
    code: &'a str,
    analysis: &'a str,
    schema: &'static str,
}

/// Template engine for AI prompts
pub struct PromptEngine {
    handlebars: Handlebars<'static>,
}

impl PromptEngine {
    /// Create an engine with every task template registered
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();

        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        for task in AiTask::ALL {
            handlebars
                .register_template_string(task.name(), task.template())
                .map_err(|e| GuardianError::Prompt {
                    message: format!("failed to register {} template: {}", task, e),
                })?;
        }

        Ok(Self { handlebars })
    }

    /// Render the prompt for `task`. `analysis` is only used by tasks that embed it.
    pub fn render(&self, task: AiTask, code: &str, analysis: Option<&str>) -> Result<String> {
        let context = PromptContext {
            code,
            analysis: analysis.unwrap_or_default(),
            schema: task.schema().json_template(),
        };

        let prompt = self
            .handlebars
            .render(task.name(), &context)
            .map_err(|e| GuardianError::Prompt {
                message: format!("failed to render {} prompt: {}", task, e),
            })?;

        debug!(task = task.name(), prompt_len = prompt.len(), "Rendered prompt");
        Ok(prompt)
    }
}

pub mod responses;
pub mod scripted;

use std::sync::Arc;

use tokio::runtime::Handle;

pub use responses::{ResponsesBackend, ResponsesConfig};
pub use scripted::ScriptedBackend;

use super::{GenerationBackend, GenerationError, ToolHandler};
use crate::Provider;
use crate::core::config::ResolvedConfig;

/// Builds the backend the resolved configuration asks for. Network
/// backends spawn their streams on `runtime`.
pub fn build_backend(
    config: &ResolvedConfig,
    tools: Arc<dyn ToolHandler>,
    runtime: Handle,
) -> Result<Arc<dyn GenerationBackend>, GenerationError> {
    let backend: Arc<dyn GenerationBackend> = match config.provider {
        Provider::OpenRouter => {
            let api_key = config.openrouter_api_key.clone().ok_or_else(|| {
                GenerationError::Config(
                    "OpenRouter needs an API key (OPENROUTER_API_KEY or [openrouter] api_key)"
                        .into(),
                )
            })?;
            let responses = ResponsesConfig {
                name: String::from("openrouter"),
                base_url: config.openrouter_base_url.clone(),
                api_key: Some(api_key),
                system_prompt: config.system_prompt.clone(),
            };
            Arc::new(ResponsesBackend::new(responses, runtime).with_tools(tools))
        }
        Provider::LmStudio => {
            let responses = ResponsesConfig {
                name: String::from("lmstudio"),
                base_url: config.lmstudio_base_url.clone(),
                api_key: None,
                system_prompt: config.system_prompt.clone(),
            };
            Arc::new(ResponsesBackend::new(responses, runtime).with_tools(tools))
        }
        Provider::Offline => Arc::new(ScriptedBackend::new()),
    };
    Ok(backend)
}

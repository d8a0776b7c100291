//! rill library exports for testing

use clap::ValueEnum;

pub mod core;
pub mod inference;
pub mod tui;

#[cfg(test)]
pub mod test_support;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// OpenRouter's hosted Responses API (needs an API key)
    #[value(name = "openrouter")]
    OpenRouter,
    /// A local LM Studio server
    #[default]
    #[value(name = "lmstudio")]
    LmStudio,
    /// Scripted replies, no network
    Offline,
}

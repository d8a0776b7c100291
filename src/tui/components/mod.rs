//! # TUI Components
//!
//! Reusable pieces of the screen, each implementing [`Component`].
//!
//! Persistent state (scroll position, the input buffer) lives in structs
//! owned by `TuiState`; props are read from `App` each frame.
//!
//! - [`MessageList`]: the transcript, bottom-anchored with a scrollbar
//! - [`InputBox`]: prompt editor, or the generating notice while streaming
//! - [`Sidebar`]: status, settings, statistics and controls
//! - [`Welcome`]: shown while the transcript is empty
//!
//! `message` and `tool_message` hold the [`TranscriptRenderer`] that turns
//! message content into display lines.
//!
//! [`Component`]: crate::tui::component::Component

pub mod input_box;
pub mod message;
pub mod message_list;
pub mod sidebar;
pub mod tool_message;
pub mod welcome;

pub use input_box::{InputBox, InputEvent};
pub use message::{Indicator, TranscriptRenderer};
pub use message_list::{MessageList, MessageListState, WHEEL_STEP};
pub use sidebar::{SIDEBAR_WIDTH, Sidebar};
pub use welcome::Welcome;

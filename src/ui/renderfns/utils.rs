use ratatui::prelude::Color;

use crate::store::StatusMessage;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a status message
pub fn status_color(status: StatusMessage) -> Color {
  if status.is_error() {
    Color::Red
  } else {
    Color::Yellow
  }
}

mod renderfns;
mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::{ListState, Paragraph};
use renderfns::{draw_footer, draw_header, status_color};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // User list
      Constraint::Length(1), // Pagination
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  let endpoint = app.endpoint().to_string();
  let notice = app.notice().map(String::from);
  let (state, list_state) = app.render_parts();

  draw_header(frame, chunks[0], &endpoint, state);
  views::draw_user_list(frame, chunks[1], state, list_state);
  draw_footer(frame, chunks[2], state);
  draw_status_bar(frame, chunks[3], state.status, notice.as_deref());
}

fn draw_status_bar(
  frame: &mut Frame,
  area: Rect,
  status: Option<crate::store::StatusMessage>,
  notice: Option<&str>,
) {
  // A transient notice (e.g. rejected navigation) wins over the store status
  let (content, style) = match (notice, status) {
    (Some(notice), _) => (format!(" {}", notice), Style::default().fg(Color::Yellow)),
    (None, Some(status)) => (
      format!(" {}", status),
      Style::default().fg(status_color(status)),
    ),
    (None, None) => (
      " j/k:select  f:favorite  n/p:page  r:refresh  o:offline  q:quit".to_string(),
      Style::default().fg(Color::DarkGray),
    ),
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}

/// Clamp the selection to the list, selecting the first row when one exists
pub fn ensure_valid_selection(list_state: &mut ListState, len: usize) {
  match list_state.selected() {
    _ if len == 0 => list_state.select(None),
    Some(i) if i >= len => list_state.select(Some(len - 1)),
    None => list_state.select(Some(0)),
    Some(_) => {}
  }
}

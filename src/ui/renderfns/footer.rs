use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::store::AppState;

/// Draw the pagination bar: visible range and page numbers
pub fn draw_footer(frame: &mut Frame, area: Rect, state: &AppState) {
  let mut spans = vec![Span::raw(" ")];

  spans.push(Span::styled(
    range_label(state),
    Style::default().fg(Color::White),
  ));
  spans.push(Span::styled("  │ ", Style::default().fg(Color::DarkGray)));

  for page in 1..=state.total_pages {
    let style = if page == state.current_page {
      // Current page - highlighted
      Style::default().fg(Color::Black).bg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::DarkGray)
    };
    spans.push(Span::styled(format!(" {} ", page), style));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn range_label(state: &AppState) -> String {
  match state.display_range() {
    Some((first, last, total)) => format!("Showing {} to {} of {} users", first, last, total),
    None => "No users".to_string(),
  }
}

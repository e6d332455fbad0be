use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::store::AppState;

/// Draw the header bar with logo, endpoint, connectivity, and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, endpoint: &str, state: &AppState) {
  let domain = extract_domain(endpoint);
  let (mode, mode_color) = connectivity_label(state);

  let mut spans = vec![
    Span::styled(" userdir ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", domain), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", mode), Style::default().fg(mode_color).bold()),
  ];
  if state.is_loading {
    spans.push(Span::styled(" loading... ", Style::default().fg(Color::Yellow)));
  }
  spans.push(Span::raw("  "));

  // Shortcuts - keys and brackets highlighted, descriptions dimmed
  for (key, label) in [
    ("<f>", " favorite"),
    ("<n/p>", " page"),
    ("<r>", " refresh"),
    ("<o>", " offline"),
    ("<q>", " quit"),
  ] {
    spans.push(Span::styled(key, Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(label, Style::default().fg(Color::DarkGray)));
    spans.push(Span::raw("   "));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn connectivity_label(state: &AppState) -> (&'static str, Color) {
  if state.is_manual_offline {
    ("SIMULATED OFFLINE", Color::Magenta)
  } else if state.is_online {
    ("ONLINE", Color::Green)
  } else {
    ("OFFLINE", Color::Red)
  }
}

/// Extract domain from the endpoint URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::models::User;
use crate::store::{AppState, Phase};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;

/// Draw the visible page of user cards
pub fn draw_user_list(frame: &mut Frame, area: Rect, state: &AppState, list_state: &mut ListState) {
  ensure_valid_selection(list_state, state.users.len());

  let title = match state.phase() {
    Phase::Loading => " Users (loading...) ".to_string(),
    Phase::Idle => " Users ".to_string(),
    Phase::Loaded { with_error } => format!(
      " Users ({}){} - page {}/{} ",
      state.all_users.len(),
      if with_error { " [!]" } else { "" },
      state.current_page,
      state.total_pages
    ),
  };

  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if state.users.is_empty() {
    let content = match state.phase() {
      Phase::Loading => "Loading users...",
      Phase::Idle => "No users loaded.",
      Phase::Loaded { .. } => "Nothing to show. Press 'r' to retry or 'o' to toggle offline mode.",
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = state.users.iter().map(user_item).collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  frame.render_stateful_widget(list, area, list_state);
}

fn user_item(user: &User) -> ListItem<'static> {
  let heart = if user.is_favorite {
    Span::styled("♥ ", Style::default().fg(Color::Red))
  } else {
    Span::styled("♡ ", Style::default().fg(Color::DarkGray))
  };

  let line = Line::from(vec![
    heart,
    Span::styled(
      format!("{:<24}", truncate(&user.full_name(), 24)),
      Style::default().fg(Color::Cyan),
    ),
    Span::raw(" "),
    Span::raw(format!("{:<32}", truncate(&user.email, 32))),
    Span::raw(" "),
    Span::styled(
      format!("{:<18}", truncate(&user.phone, 18)),
      Style::default().fg(Color::White),
    ),
    Span::raw(" "),
    Span::styled(
      truncate(
        &format!("{}, {}", user.location.city, user.location.country),
        40,
      ),
      Style::default().fg(Color::DarkGray),
    ),
  ]);
  ListItem::new(line)
}

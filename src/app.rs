use crate::event::{Event, EventHandler};
use crate::store::{AppState, SyncStore};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::ListState;
use std::io::stdout;
use std::time::Duration;
use tracing::debug;

/// Main application state
pub struct App {
  /// The synchronization store; every mutation goes through it
  store: SyncStore,

  /// Last snapshot published by the store
  state: AppState,

  /// Selection within the visible page
  list_state: ListState,

  /// Endpoint shown in the header
  endpoint: String,

  /// Transient message for rejected actions, cleared on the next key press
  notice: Option<String>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(store: SyncStore, endpoint: String) -> Self {
    let state = store.snapshot();
    Self {
      store,
      state,
      list_state: ListState::default(),
      endpoint,
      notice: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250), self.store.subscribe());

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {}
      Event::StateChanged => self.state = self.store.snapshot(),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    self.notice = None;

    match key.code {
      // Quit
      KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Selection
      KeyCode::Up | KeyCode::Char('k') => self.list_state.select_previous(),
      KeyCode::Down | KeyCode::Char('j') => self.list_state.select_next(),

      // Pages
      KeyCode::Right | KeyCode::Char('n') | KeyCode::Char('l') => {
        if let Err(e) = self.store.next_page() {
          self.notice = Some(e.to_string());
        } else {
          self.list_state.select(Some(0));
        }
      }
      KeyCode::Left | KeyCode::Char('p') | KeyCode::Char('h') => {
        if let Err(e) = self.store.previous_page() {
          self.notice = Some(e.to_string());
        } else {
          self.list_state.select(Some(0));
        }
      }

      // Store actions run in the background; results arrive as StateChanged
      KeyCode::Char('f') | KeyCode::Enter => self.toggle_selected_favorite(),
      KeyCode::Char('r') => {
        let store = self.store.clone();
        tokio::spawn(async move { store.fetch_users(true).await });
      }
      KeyCode::Char('o') => {
        let store = self.store.clone();
        tokio::spawn(async move { store.toggle_manual_offline().await });
      }

      _ => {}
    }
  }

  fn toggle_selected_favorite(&mut self) {
    let Some(uuid) = self
      .list_state
      .selected()
      .and_then(|idx| self.state.users.get(idx))
      .map(|user| user.uuid.clone())
    else {
      return;
    };

    let store = self.store.clone();
    tokio::spawn(async move {
      if let Err(e) = store.toggle_favorite(&uuid).await {
        debug!(error = %e, "favorite toggle rejected");
      }
    });
  }

  // Accessors for UI rendering
  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_deref()
  }

  pub fn render_parts(&mut self) -> (&AppState, &mut ListState) {
    (&self.state, &mut self.list_state)
  }
}

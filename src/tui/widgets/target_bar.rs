use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::source::validate_target;

/// Outcome of a key press while the target bar is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAction {
    /// Key was not for the bar (it is closed).
    Ignored,
    /// Key edited the input or was swallowed.
    Consumed,
    /// Enter on a valid target; the bar has closed.
    Submit(String),
    /// Esc; the bar has closed without changes.
    Cancel,
}

/// One-line prompt for editing the monitored `host:port`.
///
/// Opening the bar pre-fills the current target. Enter validates the input:
/// a bad target keeps the bar open and shows the reason.
#[derive(Default)]
pub struct TargetBar {
    input: String,
    active: bool,
    error: Option<String>,
}

impl TargetBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Open the bar with `current` as the editable text.
    pub fn activate(&mut self, current: &str) {
        self.input = current.to_string();
        self.error = None;
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.error = None;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> TargetAction {
        if !self.active {
            return TargetAction::Ignored;
        }

        match key.code {
            KeyCode::Char(c) => {
                if c == 'u' && key.modifiers.contains(KeyModifiers::CONTROL) {
                    self.input.clear();
                } else {
                    self.input.push(c);
                }
                self.error = None;
                TargetAction::Consumed
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.error = None;
                TargetAction::Consumed
            }
            KeyCode::Esc => {
                self.deactivate();
                TargetAction::Cancel
            }
            KeyCode::Enter => match validate_target(&self.input) {
                Ok(target) => {
                    self.deactivate();
                    TargetAction::Submit(target)
                }
                Err(e) => {
                    self.error = Some(e.to_string());
                    TargetAction::Consumed
                }
            },
            _ => TargetAction::Consumed,
        }
    }

    /// Render as a bordered prompt. When closed, shows `current` and the key
    /// hint instead.
    pub fn widget<'a>(&'a self, current: &'a str) -> Paragraph<'a> {
        if !self.active {
            let line = Line::from(vec![
                Span::styled("Target: ", Style::default().fg(Color::DarkGray)),
                Span::raw(current),
                Span::styled("   (press e to edit)", Style::default().fg(Color::DarkGray)),
            ]);
            return Paragraph::new(line).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title("Target"),
            );
        }

        let mut spans = vec![
            Span::styled("Target: ", Style::default().fg(Color::Yellow)),
            Span::styled(self.input.as_str(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled("_", Style::default().fg(Color::Yellow)),
        ];
        if let Some(err) = &self.error {
            spans.push(Span::styled(format!("  {err}"), Style::default().fg(Color::Red)));
        }

        Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title("Target (Enter to apply, Esc to cancel)"),
        )
    }
}

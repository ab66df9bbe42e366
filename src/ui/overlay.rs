// Overlay message system for displaying centered text on screen

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::network::{BootPhase, ConnectionPhase, ConnectionStatus};

/// A message to display as an overlay in the center of the screen
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMessage {
    /// Lines of text to display
    pub lines: Vec<String>,
    /// Optional title for the overlay box
    pub title: Option<String>,
    /// Style preset for the overlay
    pub style: OverlayStyle,
}

/// Predefined styles for overlay messages
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayStyle {
    /// Informational message (white/gray)
    Info,
    /// Warning message (yellow)
    Warning,
    /// Error message (red)
    Error,
}

impl OverlayMessage {
    fn styled(lines: Vec<String>, style: OverlayStyle) -> Self {
        Self {
            lines,
            title: None,
            style,
        }
    }

    pub fn info(lines: Vec<String>) -> Self {
        Self::styled(lines, OverlayStyle::Info)
    }

    pub fn warning(lines: Vec<String>) -> Self {
        Self::styled(lines, OverlayStyle::Warning)
    }

    pub fn error(lines: Vec<String>) -> Self {
        Self::styled(lines, OverlayStyle::Error)
    }

    /// Set the title for this message
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn border_color(&self) -> Color {
        match self.style {
            OverlayStyle::Info => Color::Cyan,
            OverlayStyle::Warning => Color::Yellow,
            OverlayStyle::Error => Color::Red,
        }
    }

    fn text_color(&self) -> Color {
        match self.style {
            OverlayStyle::Info => Color::White,
            OverlayStyle::Warning => Color::Yellow,
            OverlayStyle::Error => Color::LightRed,
        }
    }
}

/// Status box for every connection phase except `connected`, with the retry hint where it applies
pub fn connection_overlay(status: &ConnectionStatus, reconnect_key: &str) -> Option<OverlayMessage> {
    let retry_hint = format!("{} to retry now", reconnect_key);

    let message = match status.phase {
        ConnectionPhase::Connected => return None,
        ConnectionPhase::Idle => {
            OverlayMessage::info(vec![status.message.clone(), String::new(), retry_hint])
        }
        ConnectionPhase::Connecting => OverlayMessage::info(vec![status.message.clone()]),
        ConnectionPhase::Warming => {
            let stage = match status.boot_phase {
                Some(BootPhase::Booting) => "Server booting",
                Some(BootPhase::Finalizing) => "Almost there",
                Some(BootPhase::Warming) | None => "Waking server",
            };
            OverlayMessage::warning(vec![stage.to_string(), status.message.clone()])
        }
        ConnectionPhase::Retrying => OverlayMessage::warning(vec![
            status.message.clone(),
            format!("Attempt {}", status.retry_count + 1),
            String::new(),
            retry_hint,
        ]),
        ConnectionPhase::Error => {
            OverlayMessage::error(vec![status.message.clone(), String::new(), retry_hint])
        }
    };
    Some(message.with_title("Connection"))
}

/// Render an overlay message in the center of the screen
pub fn render_overlay(frame: &mut Frame, message: &OverlayMessage, area: Rect) {
    let max_line_length = message
        .lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);

    // Add padding for borders and spacing
    let overlay_width = (max_line_length as u16 + 6).min(area.width.saturating_sub(4));
    let overlay_height = (message.lines.len() as u16 + 4).min(area.height.saturating_sub(4));

    let overlay_area = Rect {
        x: area.x + (area.width.saturating_sub(overlay_width)) / 2,
        y: area.y + (area.height.saturating_sub(overlay_height)) / 2,
        width: overlay_width,
        height: overlay_height,
    };

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(message.border_color()))
        .style(Style::default().bg(Color::Rgb(20, 20, 20)));

    if let Some(ref title) = message.title {
        block = block.title(format!(" {} ", title));
    }

    frame.render_widget(block, overlay_area);

    let inner_area = overlay_area.inner(ratatui::layout::Margin::new(2, 1));

    let text_lines: Vec<Line> = message
        .lines
        .iter()
        .map(|line| {
            Line::from(Span::styled(
                line.clone(),
                Style::default().fg(message.text_color()),
            ))
        })
        .collect();

    let paragraph = Paragraph::new(text_lines).alignment(Alignment::Center);

    frame.render_widget(paragraph, inner_area);
}

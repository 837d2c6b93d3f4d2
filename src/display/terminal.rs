use anyhow::Result;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use image::DynamicImage;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};
use std::io;
use std::time::Duration;

use crate::camera::Frame;

use super::{command_for_key, Command, FrameSink, Status};

/// Live view in the terminal using whatever graphics protocol the terminal
/// supports. The terminal is restored on `close` and on drop.
pub struct TerminalDisplay {
    terminal: Option<Terminal<CrosstermBackend<io::Stdout>>>,
    picker: Option<Picker>,
}

impl TerminalDisplay {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        let picker = Picker::from_query_stdio().ok();
        if picker.is_none() {
            tracing::warn!("Terminal graphics query failed, showing status only");
        }

        Ok(Self {
            terminal: Some(terminal),
            picker,
        })
    }

    fn restore(&mut self) {
        if let Some(mut terminal) = self.terminal.take() {
            let _ = disable_raw_mode();
            let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
            let _ = terminal.show_cursor();
        }
    }
}

impl FrameSink for TerminalDisplay {
    fn present(&mut self, frame: &Frame, status: &Status) -> Result<()> {
        let mut protocol: Option<StatefulProtocol> = self
            .picker
            .as_mut()
            .map(|picker| picker.new_resize_protocol(DynamicImage::ImageRgb8(frame.clone())));

        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };

        terminal.draw(|f| render(f, protocol.as_mut(), status))?;
        Ok(())
    }

    fn poll_command(&mut self, wait: Duration) -> Result<Option<Command>> {
        if event::poll(wait)? {
            if let Event::Key(key) = event::read()? {
                return Ok(command_for_key(&key));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.restore();
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        self.restore();
    }
}

fn render(frame: &mut ratatui::Frame, protocol: Option<&mut StatefulProtocol>, status: &Status) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let block = Block::default()
        .borders(Borders::NONE)
        .style(Style::default().bg(Color::Black));
    frame.render_widget(block, chunks[0]);

    match protocol {
        Some(protocol) => {
            let image = StatefulImage::new(None).resize(Resize::Fit(None));
            frame.render_stateful_widget(image, chunks[0], protocol);
        }
        None => {
            let placeholder = Paragraph::new("Image preview unavailable in this terminal")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
            frame.render_widget(placeholder, chunks[0]);
        }
    }

    let status_line = Paragraph::new(status.summary()).style(Style::default().fg(Color::Cyan));
    frame.render_widget(status_line, chunks[1]);

    let help = match &status.notice {
        Some(notice) => Paragraph::new(notice.as_str()).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new("r:reload gallery | q/Esc/Ctrl-C:quit")
            .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(help, chunks[2]);
}

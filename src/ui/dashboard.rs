use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use log::debug;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;

use crate::analysis::SUSPICIOUS_PORTS;
use crate::capture::CaptureProperties;
use crate::config::ReportConfig;
use crate::session::{Session, SessionCache, SessionId};
use crate::utils::formatting::format_bytes;
use crate::visualization::{widgets, FrameLayout, OverviewLayout};

const TABS: [&str; 3] = ["Overview", "Conversations", "Network Map"];

/// Interactive view of one cached session. The session is looked up on every
/// frame, so an entry that expires while the dashboard is open is reported
/// instead of being kept alive.
pub struct Dashboard {
    cache: Arc<SessionCache>,
    session_id: SessionId,
    report: ReportConfig,
    capture: Option<CaptureProperties>,
    selected_tab: usize,
    should_quit: bool,
}

impl Dashboard {
    pub fn new(cache: Arc<SessionCache>, session_id: SessionId, report: ReportConfig) -> Self {
        Self {
            cache,
            session_id,
            report,
            capture: None,
            selected_tab: 0,
            should_quit: false,
        }
    }

    /// Show the capture's file name, size and link type in the header.
    pub fn with_capture(mut self, properties: CaptureProperties) -> Self {
        self.capture = Some(properties);
        self
    }

    pub fn selected_tab(&self) -> usize {
        self.selected_tab
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let result = Terminal::new(backend)
            .map_err(anyhow::Error::from)
            .and_then(|mut terminal| self.event_loop(&mut terminal));

        disable_raw_mode()?;
        io::stdout().execute(LeaveAlternateScreen)?;
        result
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let tick = self.report.refresh_rate();
        debug!("dashboard started for session {}", self.session_id);

        while !self.should_quit {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(tick)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.selected_tab = (self.selected_tab + 1) % TABS.len(),
            KeyCode::BackTab => {
                self.selected_tab = (self.selected_tab + TABS.len() - 1) % TABS.len()
            }
            KeyCode::Char('1') => self.selected_tab = 0,
            KeyCode::Char('2') => self.selected_tab = 1,
            KeyCode::Char('3') => self.selected_tab = 2,
            _ => {}
        }
    }

    pub fn draw(&self, f: &mut Frame) {
        let layout = FrameLayout::split(f.size());

        self.draw_header(f, layout.header);
        match self.cache.get(&self.session_id) {
            Some(session) => match self.selected_tab {
                1 => self.draw_conversations(&session, f, layout.body),
                2 => self.draw_network_map(&session, f, layout.body),
                _ => self.draw_overview(&session, f, layout.body),
            },
            None => self.draw_expired(f, layout.body),
        }
        self.draw_footer(f, layout.footer);
    }

    fn draw_header(&self, f: &mut Frame, area: Rect) {
        let selected_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);
        let normal_style = Style::default().fg(Color::White);

        let titles: Vec<Span> = TABS
            .iter()
            .enumerate()
            .map(|(i, tab)| {
                let style = if i == self.selected_tab { selected_style } else { normal_style };
                Span::styled(format!(" {} {} ", i + 1, tab), style)
            })
            .collect();

        let title = match &self.capture {
            Some(capture) => format!(
                "Traffic Lens - {} ({}, {})",
                capture.file_name,
                format_bytes(capture.file_size),
                capture.link_type
            ),
            None => "Traffic Lens".to_string(),
        };
        let header = Paragraph::new(Line::from(titles))
            .block(Block::default().borders(Borders::ALL).title(title))
            .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn draw_overview(&self, session: &Session, f: &mut Frame, area: Rect) {
        let layout = OverviewLayout::split(area);
        let timeline = session.traffic_timeline();

        widgets::render_stats_panel(&session.traffic_stats().snapshot(), layout.stats, f);
        session.protocol_chart().render(layout.protocols, f);
        timeline.render(layout.timeline, f);
        widgets::render_query_list(
            &session.dns().top_queries(self.report.top_queries),
            layout.queries,
            f,
        );
        if layout.sizes.width > 0 {
            timeline.render_size_distribution(layout.sizes, f);
        }
    }

    fn draw_conversations(&self, session: &Session, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let rows = chunks[0].height.saturating_sub(4) as usize;
        widgets::render_conversation_table(&session.conversations().top(rows), chunks[0], f);

        let rows = chunks[1].height.saturating_sub(4) as usize;
        let by_bytes = session.conversations().top_by_bytes(rows);
        widgets::render_conversation_table(&by_bytes, chunks[1], f);
    }

    fn draw_network_map(&self, session: &Session, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let port_rows = SUSPICIOUS_PORTS.len() as u16 + 2;
        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(port_rows)])
            .split(chunks[1]);

        let map = session.network_map();
        widgets::render_node_table(&map.active_nodes(), chunks[0], f);
        widgets::render_connection_list(&map.active_connections(), side[0], f);
        let ports = session.security().top_ports(SUSPICIOUS_PORTS.len());
        widgets::render_port_list(&ports, side[1], f);
    }

    fn draw_expired(&self, f: &mut Frame, area: Rect) {
        let message = Paragraph::new(vec![
            Line::from(Span::styled(
                "Session expired",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "Session {} is no longer cached; re-run the command to analyze the capture again.",
                self.session_id
            )),
        ])
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(message, area);
    }

    fn draw_footer(&self, f: &mut Frame, area: Rect) {
        let footer = Paragraph::new(format!(
            "Press 'q' to quit | Tab/1-3 to switch tabs | Session: {} | TTL: {}s",
            self.session_id,
            self.cache.ttl().as_secs()
        ))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(footer, area);
    }
}

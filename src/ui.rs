use std::{
    io::{self, Write},
    panic,
    time::Duration,
};

use crossbeam_channel::Receiver;
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Axis, Block, BorderType, Borders, Chart, Dataset, GraphType, LegendPosition, Paragraph,
    },
    Frame, Terminal,
};
use tracing::info;

use crate::app::{App, LinkState, Renderer};
use crate::broker::BrokerEvent;
use crate::constants::{CHART_TITLE, PLOT_LIMIT, TICK_RATE_MS};
use crate::error::Result;
use crate::util::format_value;
use crate::window::{SampleWindow, SensorKind};

const LIGHT_COLOR: Color = Color::Yellow;
const PRESENCE_COLOR: Color = Color::Cyan;

/// Draws the window as a two-series line chart in the terminal.
pub struct TerminalRenderer<B: Backend> {
    terminal: Terminal<B>,
    endpoint: String,
}

impl<B: Backend> TerminalRenderer<B> {
    pub fn new(terminal: Terminal<B>, endpoint: impl Into<String>) -> Self {
        Self {
            terminal,
            endpoint: endpoint.into(),
        }
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }
}

impl<B: Backend> Renderer for TerminalRenderer<B> {
    fn render(&mut self, window: &SampleWindow, link: &LinkState) -> Result<()> {
        let endpoint = &self.endpoint;
        self.terminal.draw(|f| draw(f, window, link, endpoint))?;
        Ok(())
    }
}

/// Headless stand-in for the chart: one log line per redraw.
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render(&mut self, window: &SampleWindow, link: &LinkState) -> Result<()> {
        let latest = |kind: SensorKind| {
            window
                .latest(kind)
                .map(|(v, _)| format_value(v))
                .unwrap_or_else(|| "-".to_string())
        };
        info!(
            samples = window.len(),
            capacity = window.capacity(),
            link = %link,
            "light={} presence={}",
            latest(SensorKind::Light),
            latest(SensorKind::Presence)
        );
        Ok(())
    }
}

pub fn run(window: SampleWindow, events: Receiver<BrokerEvent>, endpoint: &str) -> Result<()> {
    install_panic_hook();

    // Initialize terminal
    enable_raw_mode()?;
    let res = run_on_alternate_screen(window, &events, endpoint);

    // Cleanup
    restore_terminal()?;
    res
}

fn run_on_alternate_screen(
    window: SampleWindow,
    events: &Receiver<BrokerEvent>,
    endpoint: &str,
) -> Result<()> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = App::new(window, TerminalRenderer::new(terminal, endpoint));
    run_app_loop(&mut app, events)
}

// A panic inside the draw loop must not leave the shell in raw mode.
fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        default_hook(info);
    }));
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    leave_screen(&mut io::stdout())
}

fn leave_screen<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(out, LeaveAlternateScreen, Show)
}

fn run_app_loop<B: Backend>(
    app: &mut App<TerminalRenderer<B>>,
    events: &Receiver<BrokerEvent>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(TICK_RATE_MS);
    app.redraw()?;

    loop {
        for event in events.try_iter() {
            app.handle(event)?;
        }

        // Handle input
        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c') | KeyCode::Esc) {
                        return Ok(());
                    }
                }
                Event::Resize(_, _) => app.redraw()?,
                _ => {}
            }
        }
    }
}

fn draw(f: &mut Frame, window: &SampleWindow, link: &LinkState, endpoint: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // Chart
            Constraint::Length(1), // Status Bar
        ].as_ref())
        .split(f.size());

    // ============= Chart ============
    let light = points(window, SensorKind::Light);
    let presence = points(window, SensorKind::Presence);
    let datasets = vec![
        Dataset::default()
            .name(SensorKind::Light.label())
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(LIGHT_COLOR))
            .data(&light),
        Dataset::default()
            .name(SensorKind::Presence.label())
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(PRESENCE_COLOR))
            .data(&presence),
    ];

    let [y_min, y_max] = y_bounds(window);
    let x_max = window.len().saturating_sub(1).max(1) as f64;
    let axis_style = Style::default().fg(Color::Gray);

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(CHART_TITLE)
                .title_style(Style::default().add_modifier(Modifier::BOLD))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .x_axis(
            Axis::default()
                .title("Time")
                .style(axis_style)
                .bounds([0.0, x_max])
                .labels(time_labels(window).into_iter().map(Span::raw).collect()),
        )
        .y_axis(
            Axis::default()
                .title("Value")
                .style(axis_style)
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::raw(format_value(y_min)),
                    Span::raw(format_value((y_min + y_max) / 2.0)),
                    Span::raw(format_value(y_max)),
                ]),
        )
        .legend_position(Some(LegendPosition::TopLeft))
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)));
    f.render_widget(chart, chunks[0]);

    // ============ Bottom Status Bar ============
    let mut spans = vec![
        Span::styled(" ROOM ", Style::default().bg(Color::White).fg(Color::Black).add_modifier(Modifier::BOLD)),
    ];
    for (kind, color) in [(SensorKind::Light, LIGHT_COLOR), (SensorKind::Presence, PRESENCE_COLOR)] {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{}: ", kind.label().to_uppercase()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        match window.latest(kind) {
            Some((value, at)) => {
                spans.push(Span::raw(format!("{} ", format_value(value))));
                spans.push(Span::styled(format!("(@{})", at), Style::default().fg(Color::DarkGray)));
            }
            None => spans.push(Span::styled("-", Style::default().fg(Color::DarkGray))),
        }
    }
    let link_color = match link {
        LinkState::Connected => Color::Green,
        LinkState::Connecting => Color::LightYellow,
        LinkState::Failed(_) | LinkState::Closed => Color::Red,
    };
    spans.push(Span::raw(" | "));
    spans.push(Span::raw(format!("{} ", endpoint)));
    spans.push(Span::styled(link.to_string(), Style::default().fg(link_color)));
    spans.push(Span::raw(" | Press 'q' to quit"));

    let status_bar = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::Rgb(20, 20, 20)));
    f.render_widget(status_bar, chunks[1]);
}

fn points(window: &SampleWindow, kind: SensorKind) -> Vec<(f64, f64)> {
    window
        .series(kind)
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, plot_value(v)))
        .collect()
}

// The braille canvas overflows its integer grid math near f64::MAX, so
// plotted values and bounds stay within ±PLOT_LIMIT.
fn plot_value(v: f64) -> f64 {
    v.clamp(-PLOT_LIMIT, PLOT_LIMIT)
}

// Both series share the axis; never narrower than [0, 1].
fn y_bounds(window: &SampleWindow) -> [f64; 2] {
    let values = window
        .light()
        .iter()
        .chain(window.presence().iter())
        .map(|&v| plot_value(v));
    let (lo, hi) = values.fold((0.0_f64, 1.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    [lo, hi + (hi - lo) * 0.05]
}

// Terminal text can't be rotated, so only first / middle / last are labelled.
fn time_labels(window: &SampleWindow) -> Vec<String> {
    let stamps = window.timestamps();
    match stamps.len() {
        0 => vec!["--:--:--".to_string(); 2],
        1 => vec![stamps[0].clone(); 2],
        2 => vec![stamps[0].clone(), stamps[1].clone()],
        n => vec![stamps[0].clone(), stamps[n / 2].clone(), stamps[n - 1].clone()],
    }
}

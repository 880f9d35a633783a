use crate::client::{
    AppSnapshot,
    CaseView,
};
use color_eyre::eyre::Result;
use crossterm::{
    event::{
        Event,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use gift_cases::{
    Currency,
    Rarity,
    SessionId,
    SpinRequest,
    WheelOption,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::{
    io::stdout,
    time::{
        Duration,
        Instant,
    },
};

/// Whole turns the pointer makes before settling on the outcome.
const FULL_TURNS: f64 = 3.0;

pub enum UserEvent {
    Quit,
    Redraw,
    NextCase,
    PrevCase,
    Buy,
    DismissResult,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Cases,
    Inventory,
    Tasks,
    Profile,
}

impl Tab {
    const ALL: [Tab; 4] = [Tab::Cases, Tab::Inventory, Tab::Tasks, Tab::Profile];

    fn title(self) -> &'static str {
        match self {
            Tab::Cases => "Cases",
            Tab::Inventory => "Inventory",
            Tab::Tasks => "Tasks",
            Tab::Profile => "Profile",
        }
    }

    fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    CasePreview,
    QuitModal,
}

/// A wheel spin being played for one session.
#[derive(Clone, Debug)]
pub struct WheelSpin {
    request: SpinRequest,
    started: Instant,
    duration: Duration,
}

impl WheelSpin {
    pub fn new(request: SpinRequest, started: Instant, duration: Duration) -> Self {
        Self {
            request,
            started,
            duration,
        }
    }

    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn is_done(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    /// Segment under the pointer. Decelerates and always stops on the
    /// drawn outcome.
    pub fn highlighted(&self, now: Instant) -> usize {
        if self.is_done(now) {
            return self.request.outcome_index;
        }
        let p = self.progress(now);
        let eased = 1.0 - (1.0 - p).powi(3);
        let landing = segment_center(&self.request.options, self.request.outcome_index);
        let point = ((FULL_TURNS + landing) * eased).fract();
        segment_at(&self.request.options, point).unwrap_or(self.request.outcome_index)
    }

    pub fn request(&self) -> &SpinRequest {
        &self.request
    }
}

fn segment_center(options: &[WheelOption], index: usize) -> f64 {
    let start: f64 = options.iter().take(index).map(|o| o.share).sum();
    let share = options.get(index).map(|o| o.share).unwrap_or(0.0);
    start + share / 2.0
}

fn segment_at(options: &[WheelOption], point: f64) -> Option<usize> {
    let mut acc = 0.0;
    for (i, option) in options.iter().enumerate() {
        acc += option.share;
        if option.share > 0.0 && point < acc {
            return Some(i);
        }
    }
    None
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    tab: Tab,
    spin: Option<WheelSpin>,
    result_shown: bool,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl UiState {
    pub fn start_spin(&mut self, request: SpinRequest, now: Instant, duration: Duration) {
        self.mode = Mode::Normal;
        self.spin = Some(WheelSpin::new(request, now, duration));
    }

    pub fn is_spinning(&self) -> bool {
        self.spin.is_some()
    }

    /// Returns the session whose spin just finished, once.
    pub fn advance_spin(&mut self, now: Instant) -> Option<SessionId> {
        self.spin
            .take_if(|spin| spin.is_done(now))
            .map(|spin| spin.request.session)
    }

    /// Abandons the running spin, returning its session.
    pub fn take_spin(&mut self) -> Option<SessionId> {
        self.spin.take().map(|spin| spin.request.session)
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.result_shown = snap.last_result.is_some() && state.spin.is_none();
    if let Some(mut term) = state.terminal.take() {
        let now = Instant::now();
        term.draw(|f| ui(f, state, snap, now))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Maps a terminal event to an action. Purchase and selection keys are
/// ignored while an opening is in progress.
pub fn interpret_event(state: &mut UiState, event: Event, busy: bool) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };

    // Raw mode swallows SIGINT, so Ctrl+C arrives as a key.
    if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UserEvent::Quit);
    }

    match state.mode {
        Mode::QuitModal => {
            return match k.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::CasePreview => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                return Some(UserEvent::Redraw);
            }
            KeyCode::Enter | KeyCode::Char('b') if !busy => {
                state.mode = Mode::Normal;
                return Some(UserEvent::Buy);
            }
            KeyCode::Down | KeyCode::Char('j') if !busy => return Some(UserEvent::NextCase),
            KeyCode::Up | KeyCode::Char('k') if !busy => return Some(UserEvent::PrevCase),
            _ => return None,
        },
        Mode::Normal => {}
    }

    if let KeyCode::Char('q') | KeyCode::Esc = k.code {
        state.mode = Mode::QuitModal;
        return Some(UserEvent::Redraw);
    }
    if state.result_shown && matches!(k.code, KeyCode::Enter | KeyCode::Char(' ')) {
        return Some(UserEvent::DismissResult);
    }
    if busy {
        return None;
    }
    match k.code {
        KeyCode::Tab => {
            state.tab = state.tab.next();
            Some(UserEvent::Redraw)
        }
        KeyCode::Char(c @ '1'..='4') => {
            let idx = c as usize - '1' as usize;
            state.tab = Tab::ALL[idx];
            Some(UserEvent::Redraw)
        }
        KeyCode::Down | KeyCode::Char('j') if state.tab == Tab::Cases => {
            Some(UserEvent::NextCase)
        }
        KeyCode::Up | KeyCode::Char('k') if state.tab == Tab::Cases => {
            Some(UserEvent::PrevCase)
        }
        KeyCode::Enter if state.tab == Tab::Cases => {
            state.mode = Mode::CasePreview;
            Some(UserEvent::Redraw)
        }
        KeyCode::Char('b') if state.tab == Tab::Cases => Some(UserEvent::Buy),
        _ => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot, now: Instant) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // balances
            Constraint::Length(3), // tabs
            Constraint::Min(8),
            Constraint::Length(4), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_balances(f, chunks[0], snap);
    draw_tabs(f, chunks[1], state.tab);
    match state.tab {
        Tab::Cases => draw_cases(f, chunks[2], snap),
        Tab::Inventory => draw_inventory(f, chunks[2], snap),
        Tab::Tasks => draw_tasks(f, chunks[2]),
        Tab::Profile => draw_profile(f, chunks[2], snap),
    }
    draw_status(f, chunks[3], snap);
    draw_help(f, chunks[4], state);
    draw_modals(f, state, snap, now);
}

fn draw_balances(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let text = format!(
        "{} | {} | Phase: {}",
        Currency::Stars.format_amount(snap.stars),
        Currency::Ton.format_amount(snap.ton),
        snap.phase.label()
    );
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_tabs(f: &mut Frame, area: Rect, tab: Tab) {
    let titles: Vec<&str> = Tab::ALL.iter().map(|t| t.title()).collect();
    let tabs = Tabs::new(titles)
        .select(tab.index())
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(tabs, area);
}

fn draw_cases(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = Vec::new();
    if snap.cases.is_empty() {
        lines.push(Line::from("No cases available"));
    }
    for (i, case) in snap.cases.iter().enumerate() {
        let cur = if i == snap.selected_case { ">" } else { " " };
        let text = format!(
            "{} {}  {}",
            cur,
            case.name,
            Currency::Stars.format_amount(case.cost)
        );
        let style = if i == snap.selected_case {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else if !case.affordable {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        lines.push(Line::styled(text, style));
        if !case.description.is_empty() {
            lines.push(Line::styled(
                format!("    {}", case.description),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Cases"));
    f.render_widget(widget, area);
}

fn draw_inventory(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = Vec::new();
    if snap.items.is_empty() {
        lines.push(Line::styled(
            "No gifts yet. Open a case!",
            Style::default().fg(Color::DarkGray),
        ));
    }
    for item in &snap.items {
        lines.push(Line::styled(
            format!(
                "{}  [{}]  {}  from {}  {}",
                item.name,
                item.rarity,
                Currency::Stars.format_amount(item.value),
                item.case_id,
                item.obtained_at.format("%Y-%m-%d %H:%M")
            ),
            rarity_style(item.rarity),
        ));
    }
    let title = format!("Inventory ({})", snap.items.len());
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn draw_tasks(f: &mut Frame, area: Rect) {
    let widget = Paragraph::new("No tasks available right now.")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title("Tasks"));
    f.render_widget(widget, area);
}

fn draw_profile(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![
        Line::from(format!(
            "Stars: {}",
            Currency::Stars.format_amount(snap.stars)
        )),
        Line::from(format!("TON: {}", Currency::Ton.format_amount(snap.ton))),
        Line::from(format!("Gifts owned: {}", snap.items.len())),
        Line::from(format!(
            "Collection value: {}",
            Currency::Stars.format_amount(snap.collection_value)
        )),
        Line::from(""),
    ];
    for rarity in [Rarity::Legendary, Rarity::Mythic, Rarity::Rare, Rarity::Common] {
        let count = snap.items.iter().filter(|i| i.rarity == rarity).count();
        lines.push(Line::styled(
            format!("  {}: {}", rarity, count),
            rarity_style(rarity),
        ));
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Profile"));
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let widget = if snap.errors.is_empty() {
        Paragraph::new(snap.status.clone())
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, state: &UiState) {
    let text = match state.mode {
        Mode::CasePreview => "Enter/b buy | ↑/↓ case | Esc close",
        _ if state.result_shown => "Enter/Space continue | q quit",
        _ => "Tab/1-4 switch tab | ↑/↓ select | Enter preview | b buy | q/Esc quit",
    };
    let help =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot, now: Instant) {
    if let Some(spin) = &state.spin {
        draw_spin(f, spin, now);
    } else if let Some(item) = &snap.last_result {
        let area = centered_rect(50, 30, f.area());
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Congratulations!");
        let lines = vec![
            Line::from("You received"),
            Line::styled(
                item.name.clone(),
                rarity_style(item.rarity).add_modifier(Modifier::BOLD),
            ),
            Line::from(format!(
                "{} | worth {}",
                item.rarity,
                Currency::Stars.format_amount(item.value)
            )),
            Line::from(""),
            Line::from("Enter=continue"),
        ];
        f.render_widget(Clear, area);
        f.render_widget(block.clone(), area);
        f.render_widget(
            Paragraph::new(lines).alignment(Alignment::Center),
            block.inner(area),
        );
    }

    match state.mode {
        Mode::CasePreview => {
            if let Some(case) = snap.cases.get(snap.selected_case) {
                draw_case_preview(f, case, snap.busy);
            }
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let text = if snap.busy {
                "An opening is in progress and will be settled. Quit? (Y/N)"
            } else {
                "Quit? (Y/N)"
            };
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(
                Paragraph::new(text).wrap(Wrap { trim: true }),
                block.inner(area),
            );
        }
        Mode::Normal => {}
    }
}

fn draw_case_preview(f: &mut Frame, case: &CaseView, busy: bool) {
    let area = centered_rect(60, 60, f.area());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("{} | {}", case.name, Currency::Stars.format_amount(case.cost)));
    let mut lines = Vec::new();
    if !case.description.is_empty() {
        lines.push(Line::from(case.description.clone()));
        lines.push(Line::from(""));
    }
    lines.push(Line::from("Possible gifts:"));
    for gift in &case.gifts {
        lines.push(Line::styled(
            format!(
                "  {:<20} {:<10} {:>6.2}%  {}",
                gift.name,
                gift.rarity.label(),
                gift.chance * 100.0,
                Currency::Stars.format_amount(gift.value)
            ),
            rarity_style(gift.rarity),
        ));
    }
    lines.push(Line::from(""));
    let footer = if busy {
        Line::styled("Opening in progress...", Style::default().fg(Color::DarkGray))
    } else if case.affordable {
        Line::from("Enter=buy Esc=close")
    } else {
        Line::styled(
            "Not enough Stars. Esc=close",
            Style::default().fg(Color::Red),
        )
    };
    lines.push(footer);
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(lines), block.inner(area));
}

fn draw_spin(f: &mut Frame, spin: &WheelSpin, now: Instant) {
    let area = centered_rect(50, 50, f.area());
    let block = Block::default().borders(Borders::ALL).title("Opening...");
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let current = spin.highlighted(now);
    let lines: Vec<Line> = spin
        .request()
        .options
        .iter()
        .enumerate()
        .map(|(i, option)| {
            if i == current {
                Line::styled(
                    format!("> {} <", option.name),
                    rarity_style(option.rarity).add_modifier(Modifier::REVERSED),
                )
            } else {
                Line::styled(format!("  {}  ", option.name), rarity_style(option.rarity))
            }
        })
        .collect();
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        rows[0],
    );
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(spin.progress(now));
    f.render_widget(gauge, rows[1]);
}

fn rarity_style(rarity: Rarity) -> Style {
    match rarity {
        Rarity::Common => Style::default().fg(Color::Gray),
        Rarity::Rare => Style::default().fg(Color::Blue),
        Rarity::Mythic => Style::default().fg(Color::Magenta),
        Rarity::Legendary => Style::default().fg(Color::Yellow),
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::KeyEvent;
    use gift_cases::{
        CatalogStore,
        test_helpers::machine_with,
    };

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn request(outcome_index: usize) -> SpinRequest {
        let catalog = CatalogStore::builtin();
        let case = catalog.get_case("new-year").unwrap();
        let session = machine_with(1_000, [0.5]).begin("new-year").unwrap();
        SpinRequest {
            session,
            case_id: case.id.clone(),
            outcome_index,
            options: WheelOption::for_case(case),
        }
    }

    #[test]
    fn wheel_spin__stops_on_outcome_when_done() {
        // given
        let start = Instant::now();
        let spin = WheelSpin::new(request(2), start, Duration::from_millis(100));

        // when
        let at_end = spin.highlighted(start + Duration::from_millis(100));
        let past_end = spin.highlighted(start + Duration::from_secs(5));

        // then
        assert_eq!(at_end, 2);
        assert_eq!(past_end, 2);
    }

    #[test]
    fn wheel_spin__approaches_outcome_just_before_end() {
        let start = Instant::now();
        let spin = WheelSpin::new(request(1), start, Duration::from_millis(1_000));

        let nearly = spin.highlighted(start + Duration::from_millis(999));

        assert_eq!(nearly, 1);
    }

    #[test]
    fn wheel_spin__zero_duration_is_immediately_done() {
        let start = Instant::now();
        let spin = WheelSpin::new(request(0), start, Duration::ZERO);

        assert!(spin.is_done(start));
        assert_eq!(spin.progress(start), 1.0);
    }

    #[test]
    fn advance_spin__reports_session_exactly_once() {
        // given
        let mut state = UiState::default();
        let start = Instant::now();
        let req = request(0);
        let session = req.session;
        state.start_spin(req, start, Duration::from_millis(10));

        // when
        let early = state.advance_spin(start);
        let done = state.advance_spin(start + Duration::from_millis(10));
        let again = state.advance_spin(start + Duration::from_millis(20));

        // then
        assert_eq!(early, None);
        assert_eq!(done, Some(session));
        assert_eq!(again, None);
        assert!(!state.is_spinning());
    }

    #[test]
    fn interpret_event__buy_ignored_while_busy() {
        let mut state = UiState::default();

        let ev = interpret_event(&mut state, key(KeyCode::Char('b')), true);

        assert!(ev.is_none());
    }

    #[test]
    fn interpret_event__quit_requires_confirmation() {
        // given
        let mut state = UiState::default();

        // when
        let first = interpret_event(&mut state, key(KeyCode::Char('q')), true);
        let second = interpret_event(&mut state, key(KeyCode::Char('y')), true);

        // then
        assert!(matches!(first, Some(UserEvent::Redraw)));
        assert!(matches!(second, Some(UserEvent::Quit)));
    }

    #[test]
    fn interpret_event__ctrl_c_quits_from_any_mode() {
        // given
        let mut state = UiState {
            mode: Mode::CasePreview,
            ..UiState::default()
        };
        let ctrl_c =
            Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));

        // when
        let ev = interpret_event(&mut state, ctrl_c, true);

        // then
        assert!(matches!(ev, Some(UserEvent::Quit)));
    }

    #[test]
    fn interpret_event__plain_c_does_not_quit() {
        let mut state = UiState::default();

        let ev = interpret_event(&mut state, key(KeyCode::Char('c')), false);

        assert!(ev.is_none());
    }

    #[test]
    fn interpret_event__preview_enter_buys_and_closes() {
        // given
        let mut state = UiState::default();
        interpret_event(&mut state, key(KeyCode::Enter), false);
        assert_eq!(state.mode, Mode::CasePreview);

        // when
        let ev = interpret_event(&mut state, key(KeyCode::Enter), false);

        // then
        assert!(matches!(ev, Some(UserEvent::Buy)));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__enter_dismisses_shown_result() {
        let mut state = UiState {
            result_shown: true,
            ..UiState::default()
        };

        let ev = interpret_event(&mut state, key(KeyCode::Enter), false);

        assert!(matches!(ev, Some(UserEvent::DismissResult)));
    }
}

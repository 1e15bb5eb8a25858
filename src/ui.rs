use std::fmt;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::api::{FetchError, Person, PersonDetail, PlanetMate};
use crate::auth::{AuthError, AuthStatus, Authenticator};
use crate::catalogue::{Catalogue, Outcome, PeopleRequest, RequestIds, View};
use crate::data::PeopleService;
use crate::detail::{self, Detail, DetailView, MatesRequest, MatesView, PersonRequest};
use crate::query::FilterField;
use crate::session::Session;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Screen address, written the way the browser routes were: `/` and `/person/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Catalogue,
    Person(String),
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Some(Route::Catalogue);
        }
        let id = trimmed.strip_prefix("/person/")?;
        if id.is_empty() || id.contains('/') {
            return None;
        }
        Some(Route::Person(id.to_string()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Catalogue => write!(f, "/"),
            Route::Person(id) => write!(f, "/person/{id}"),
        }
    }
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

enum AsyncResponse {
    Auth {
        result: Result<bool, AuthError>,
    },
    ReAuth {
        result: Result<(), AuthError>,
    },
    People {
        request_id: u64,
        result: Result<Vec<Person>, FetchError>,
    },
    Person {
        request_id: u64,
        result: Result<PersonDetail, FetchError>,
    },
    Mates {
        request_id: u64,
        result: Result<Vec<PlanetMate>, FetchError>,
    },
}

#[derive(Clone)]
pub struct Options {
    pub status_message: String,
    pub session: Session,
    /// `None` when browsing offline data; the session then already holds a token.
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub people_service: Arc<dyn PeopleService>,
    pub start_route: Route,
}

pub struct Model {
    status_message: String,
    session: Session,
    authenticator: Option<Arc<dyn Authenticator>>,
    people_service: Arc<dyn PeopleService>,
    route: Route,
    history: Vec<Route>,
    catalogue: Catalogue,
    detail: Option<Detail>,
    request_ids: RequestIds,
    selected_person: usize,
    selected_mate: usize,
    auth_in_flight: bool,
    reauth_in_flight: bool,
    in_flight: usize,
    needs_redraw: bool,
    spinner: Spinner,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let request_ids = RequestIds::default();
        let mut model = Self {
            status_message: opts.status_message,
            catalogue: Catalogue::new(opts.session.clone(), request_ids.clone()),
            session: opts.session,
            authenticator: opts.authenticator,
            people_service: opts.people_service,
            route: Route::Catalogue,
            history: Vec::new(),
            detail: None,
            request_ids,
            selected_person: 0,
            selected_mate: 0,
            auth_in_flight: false,
            reauth_in_flight: false,
            in_flight: 0,
            needs_redraw: true,
            spinner: Spinner::new(),
            response_tx,
            response_rx,
        };

        model.enter(opts.start_route);
        model.ensure_auth();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {err}");
                                self.mark_dirty();
                            }
                        }
                    }
                } else {
                    self.mark_dirty();
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.in_flight > 0 || self.auth_in_flight || self.reauth_in_flight
    }

    fn auth_status(&self) -> AuthStatus {
        let mut status = self
            .authenticator
            .as_ref()
            .map(|auth| auth.status())
            .unwrap_or_default();
        status.auth_loading |= self.auth_in_flight;
        status.reauth_loading |= self.reauth_in_flight;
        status
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('r') => self.retry(),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') | KeyCode::Left => self.back(),
            _ => match self.route {
                Route::Catalogue => self.handle_catalogue_key(code),
                Route::Person(_) => self.handle_person_key(code)?,
            },
        }
        self.mark_dirty();
        Ok(false)
    }

    fn handle_catalogue_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                let len = self.catalogue.people().len();
                if len > 0 {
                    self.selected_person = (self.selected_person + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_person = self.selected_person.saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
                if let Some(person) = self.catalogue.people().get(self.selected_person) {
                    let route = Route::Person(person.id.clone());
                    self.navigate(route);
                }
            }
            KeyCode::Char(ch @ ('1' | '2' | '3')) => {
                let field = FilterField::ALL[(ch as u8 - b'1') as usize];
                self.catalogue.cycle_draft(field, 1);
                self.status_message =
                    format!("{} draft updated. Press f to filter.", field.label());
            }
            KeyCode::Char('f') => {
                if self.catalogue.can_apply() {
                    let request = self.catalogue.apply_filters();
                    self.status_message = "Applying filters…".to_string();
                    self.dispatch_people(request);
                } else {
                    self.status_message = "Choose a filter value first (1-3).".to_string();
                }
            }
            KeyCode::Char('c') => {
                if self.catalogue.shows_clear() || self.catalogue.can_apply() {
                    let request = self.catalogue.clear_filters();
                    self.status_message = "Filters cleared.".to_string();
                    self.dispatch_people(request);
                }
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                let delta = if code == KeyCode::Char('s') { 1 } else { -1 };
                let sort = self.catalogue.sort().cycle(delta);
                let request = self.catalogue.set_sort(sort);
                self.status_message = format!("Sorted by {}.", sort.label());
                self.dispatch_people(request);
            }
            _ => {}
        }
    }

    fn handle_person_key(&mut self, code: KeyCode) -> Result<()> {
        let Some(detail) = self.detail.as_ref() else {
            return Ok(());
        };
        match code {
            KeyCode::Char('j') | KeyCode::Down => {
                let len = detail.mates().len();
                if len > 0 {
                    self.selected_mate = (self.selected_mate + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_mate = self.selected_mate.saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
                if let Some(mate) = detail.mates().get(self.selected_mate) {
                    let route = Route::Person(mate.id.clone());
                    self.navigate(route);
                }
            }
            KeyCode::Char('o') => {
                let url = detail
                    .person()
                    .map(|d| d.person.image_url.clone())
                    .unwrap_or_default();
                self.open_image(&url)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn open_image(&mut self, url: &str) -> Result<()> {
        if url.is_empty() {
            self.status_message = "No image for this person.".to_string();
            return Ok(());
        }
        match webbrowser::open(url) {
            Ok(_) => self.status_message = "Opened image in your browser.".to_string(),
            Err(err) => {
                tracing::warn!(%url, "opening image failed: {err}");
                self.status_message = format!("Failed to open image: {err} (URL: {url})");
            }
        }
        Ok(())
    }

    /// Pushes the current screen onto the history and shows `route`.
    fn navigate(&mut self, route: Route) {
        if route == self.route {
            return;
        }
        let previous = std::mem::replace(&mut self.route, Route::Catalogue);
        self.history.push(previous);
        self.enter(route);
    }

    fn back(&mut self) {
        if let Some(route) = self.history.pop() {
            self.enter(route);
        }
    }

    fn enter(&mut self, route: Route) {
        tracing::debug!(%route, "entering screen");
        match &route {
            Route::Catalogue => {
                self.detail = None;
                let request = self.catalogue.mount();
                self.dispatch_people(request);
            }
            Route::Person(id) => {
                self.selected_mate = 0;
                let request = match self.detail.as_mut() {
                    Some(detail) => detail.set_id(id.clone()),
                    None => {
                        let mut detail =
                            Detail::new(self.session.clone(), id.clone(), self.request_ids.clone());
                        let request = detail.mount();
                        self.detail = Some(detail);
                        request
                    }
                };
                self.dispatch_person(request);
            }
        }
        self.route = route;
        self.mark_dirty();
    }

    fn retry(&mut self) {
        if !self.session.has_access_token() {
            self.status_message = "Requesting a new access token…".to_string();
            self.ensure_auth();
            return;
        }
        self.status_message = "Refreshing…".to_string();
        match self.route {
            Route::Catalogue => {
                let request = self.catalogue.refresh();
                self.dispatch_people(request);
            }
            Route::Person(_) => {
                let request = self.detail.as_mut().and_then(Detail::refresh);
                self.dispatch_person(request);
            }
        }
    }

    fn ensure_auth(&mut self) {
        let Some(auth) = self.authenticator.clone() else {
            return;
        };
        if self.auth_in_flight || self.session.has_access_token() {
            return;
        }
        self.auth_in_flight = true;
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = auth.ensure();
            let _ = tx.send(AsyncResponse::Auth { result });
        });
    }

    fn request_reauth(&mut self) {
        if self.reauth_in_flight {
            return;
        }
        let Some(auth) = self.authenticator.clone() else {
            self.status_message = "Access token rejected.".to_string();
            return;
        };
        self.reauth_in_flight = true;
        self.status_message = "Access token rejected; refreshing…".to_string();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = auth.reauth();
            let _ = tx.send(AsyncResponse::ReAuth { result });
        });
    }

    /// The stored token changed; the visible screen fetches again.
    fn on_token_changed(&mut self) {
        match self.route {
            Route::Catalogue => {
                let request = self.catalogue.on_token_changed();
                self.dispatch_people(request);
            }
            Route::Person(_) => {
                let request = self.detail.as_mut().and_then(Detail::on_token_changed);
                self.dispatch_person(request);
            }
        }
    }

    fn dispatch_people(&mut self, request: Option<PeopleRequest>) {
        let Some(request) = request else {
            return;
        };
        self.in_flight += 1;
        let tx = self.response_tx.clone();
        let service = self.people_service.clone();
        thread::spawn(move || {
            let result = service.list_people(&request.filters, request.sort);
            let _ = tx.send(AsyncResponse::People {
                request_id: request.request_id,
                result,
            });
        });
    }

    fn dispatch_person(&mut self, request: Option<PersonRequest>) {
        let Some(request) = request else {
            return;
        };
        self.in_flight += 1;
        let tx = self.response_tx.clone();
        let service = self.people_service.clone();
        thread::spawn(move || {
            let result = detail::load_person(service.as_ref(), &request.id);
            let _ = tx.send(AsyncResponse::Person {
                request_id: request.request_id,
                result,
            });
        });
    }

    fn dispatch_mates(&mut self, request: Option<MatesRequest>) {
        let Some(request) = request else {
            return;
        };
        self.in_flight += 1;
        let tx = self.response_tx.clone();
        let service = self.people_service.clone();
        thread::spawn(move || {
            let result = service.planet_mates(&request.planet_id, &request.exclude_id);
            let _ = tx.send(AsyncResponse::Mates {
                request_id: request.request_id,
                result,
            });
        });
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Auth { result } => {
                self.auth_in_flight = false;
                match result {
                    Ok(_) => {
                        self.status_message = "Signed in.".to_string();
                        self.on_token_changed();
                    }
                    Err(err) => self.status_message = err.to_string(),
                }
            }
            AsyncResponse::ReAuth { result } => {
                self.reauth_in_flight = false;
                match result {
                    Ok(()) => {
                        self.status_message = "Access token refreshed.".to_string();
                        self.on_token_changed();
                    }
                    Err(err) => {
                        self.status_message = format!("{err}. Press r to sign in again.");
                    }
                }
            }
            AsyncResponse::People { request_id, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let outcome = self.catalogue.on_people(request_id, result);
                if outcome == Outcome::Applied {
                    let len = self.catalogue.people().len();
                    self.selected_person = self.selected_person.min(len.saturating_sub(1));
                }
                self.follow_outcome(outcome);
            }
            AsyncResponse::Person { request_id, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let Some(detail) = self.detail.as_mut() else {
                    return;
                };
                let outcome = detail.on_person(request_id, result);
                if outcome == Outcome::Applied {
                    let request = detail.request_mates();
                    self.dispatch_mates(request);
                }
                self.follow_outcome(outcome);
            }
            AsyncResponse::Mates { request_id, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let Some(detail) = self.detail.as_mut() else {
                    return;
                };
                let outcome = detail.on_mates(request_id, result);
                self.follow_outcome(outcome);
            }
        }
    }

    fn follow_outcome(&mut self, outcome: Outcome) {
        if outcome == Outcome::NeedsReauth {
            self.request_reauth();
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" SW Catalogue {} ", self.route),
                Style::default().fg(COLOR_BG).bg(COLOR_ACCENT),
            ),
            Span::raw(" "),
            Span::raw(status_text),
        ]))
        .style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        match self.route {
            Route::Catalogue => self.draw_catalogue(frame, layout[1]),
            Route::Person(_) => self.draw_person(frame, layout[1]),
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn panel_block(title: String, focused: bool) -> Block<'static> {
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(title, title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::horizontal(1))
    }

    fn draw_catalogue(&self, frame: &mut Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0)])
            .split(area);

        frame.render_widget(self.filter_panel(), chunks[0]);

        let block = Self::panel_block("People".to_string(), true);
        let inner = block.inner(chunks[1]);
        frame.render_widget(block, chunks[1]);

        match self.catalogue.render(self.auth_status()) {
            View::List(people) => {
                let items: Vec<ListItem> = people.iter().map(person_row).collect();
                let list = List::new(items)
                    .highlight_style(
                        Style::default()
                            .bg(COLOR_PANEL_SELECTED_BG)
                            .add_modifier(Modifier::BOLD),
                    )
                    .highlight_symbol("▌ ");
                let mut state = ListState::default().with_selected(Some(self.selected_person));
                frame.render_stateful_widget(list, inner, &mut state);
            }
            View::Loading => frame.render_widget(self.loading_text(), inner),
            View::Idle => frame.render_widget(
                Paragraph::new("Waiting for an access token…")
                    .style(Style::default().fg(COLOR_TEXT_SECONDARY)),
                inner,
            ),
            view @ (View::AuthError | View::FetchError | View::Empty) => {
                let color = if view == View::Empty {
                    COLOR_TEXT_SECONDARY
                } else {
                    COLOR_ERROR
                };
                frame.render_widget(
                    Paragraph::new(view.message().unwrap_or_default())
                        .style(Style::default().fg(color)),
                    inner,
                );
            }
        }
    }

    fn filter_panel(&self) -> Paragraph<'static> {
        let draft = self.catalogue.draft();
        let active = self.catalogue.active();
        let mut spans = Vec::new();
        for (idx, field) in FilterField::ALL.iter().enumerate() {
            let value = draft
                .get(*field)
                .map(|value| field.choice_label(value).unwrap_or(value).to_string())
                .unwrap_or_else(|| "Any".to_string());
            let style = if draft.get(*field) == active.get(*field) {
                Style::default().fg(COLOR_TEXT_PRIMARY)
            } else {
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::ITALIC)
            };
            spans.push(Span::styled(
                format!("[{}] ", idx + 1),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
            spans.push(Span::styled(format!("{}: {value}   ", field.label()), style));
        }

        let apply_style = if self.catalogue.can_apply() {
            Style::default().fg(COLOR_SUCCESS).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(COLOR_BORDER_IDLE)
                .add_modifier(Modifier::DIM)
        };
        let mut controls = vec![
            Span::styled("[f] Filter", apply_style),
            Span::raw("   "),
        ];
        if self.catalogue.shows_clear() {
            controls.push(Span::styled(
                "[c] Clear Filters",
                Style::default().fg(COLOR_ERROR),
            ));
            controls.push(Span::raw("   "));
        }
        controls.push(Span::styled(
            format!("[s] Sort: {}", self.catalogue.sort().label()),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        ));

        Paragraph::new(Text::from(vec![Line::from(spans), Line::from(controls)]))
            .block(Self::panel_block("Filters".to_string(), false))
    }

    fn draw_person(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(detail) = self.detail.as_ref() else {
            return;
        };
        match detail.render(self.auth_status()) {
            DetailView::Person { detail, mates } => {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(10), Constraint::Min(0)])
                    .split(area);
                frame.render_widget(person_card(detail), chunks[0]);
                self.draw_mates(frame, chunks[1], mates);
            }
            view => {
                let block = Self::panel_block("Person".to_string(), true);
                let inner = block.inner(area);
                frame.render_widget(block, area);
                let paragraph = match view {
                    DetailView::Loading => self.loading_text(),
                    DetailView::Idle => Paragraph::new("Waiting for an access token…")
                        .style(Style::default().fg(COLOR_TEXT_SECONDARY)),
                    other => Paragraph::new(other.message().unwrap_or_default())
                        .style(Style::default().fg(COLOR_ERROR)),
                };
                frame.render_widget(paragraph, inner);
            }
        }
    }

    fn draw_mates(&self, frame: &mut Frame<'_>, area: Rect, mates: MatesView<'_>) {
        match mates {
            MatesView::Hidden => {}
            MatesView::List { mates: [], .. } => {}
            MatesView::Loading => {
                let block = Self::panel_block("Same planet".to_string(), false);
                let inner = block.inner(area);
                frame.render_widget(block, area);
                frame.render_widget(self.loading_text(), inner);
            }
            MatesView::Error => {
                let block = Self::panel_block("Same planet".to_string(), false);
                let inner = block.inner(area);
                frame.render_widget(block, area);
                frame.render_widget(
                    Paragraph::new(mates.heading().unwrap_or_default())
                        .style(Style::default().fg(COLOR_ERROR)),
                    inner,
                );
            }
            MatesView::List { mates: list, .. } => {
                let block = Self::panel_block(mates.heading().unwrap_or_default(), true);
                let items: Vec<ListItem> = list
                    .iter()
                    .map(|mate| {
                        ListItem::new(Line::from(Span::styled(
                            mate.name.clone(),
                            Style::default().fg(COLOR_TEXT_PRIMARY),
                        )))
                    })
                    .collect();
                let widget = List::new(items)
                    .block(block)
                    .highlight_style(
                        Style::default()
                            .bg(COLOR_PANEL_SELECTED_BG)
                            .add_modifier(Modifier::BOLD),
                    )
                    .highlight_symbol("▌ ");
                let mut state = ListState::default().with_selected(Some(self.selected_mate));
                frame.render_stateful_widget(widget, area, &mut state);
            }
        }
    }

    fn loading_text(&self) -> Paragraph<'static> {
        Paragraph::new(format!("{} Loading…", self.spinner.frame())).style(
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        )
    }

    fn footer_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        match self.route {
            Route::Catalogue => {
                parts.push("j/k move · Enter open");
                parts.push("1 planet · 2 gender · 3 species");
                parts.push("f filter · c clear · s/S sort");
            }
            Route::Person(_) => {
                parts.push("j/k move · Enter open");
                parts.push("o open image");
                parts.push("Esc back");
            }
        }
        parts.push("r retry · q quit");
        parts.join("  |  ")
    }
}

fn person_row(person: &Person) -> ListItem<'static> {
    let meta = [
        person.species.as_str(),
        person.gender.as_str(),
        person.birth_year.as_str(),
    ]
    .iter()
    .filter(|value| !value.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" · ");
    ListItem::new(Line::from(vec![
        Span::styled(
            person.name.clone(),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(meta, Style::default().fg(COLOR_TEXT_SECONDARY)),
    ]))
}

fn person_card(detail: &PersonDetail) -> Paragraph<'static> {
    let person = &detail.person;
    let label = Style::default().fg(COLOR_TEXT_SECONDARY);
    let value = Style::default().fg(COLOR_TEXT_PRIMARY);
    let row = |name: &str, text: &str| {
        Line::from(vec![
            Span::styled(format!("{name:<11}"), label),
            Span::styled(text.to_string(), value),
        ])
    };
    let mut lines = vec![
        row("Species", &person.species),
        row("Gender", &person.gender),
        row("Birth year", &person.birth_year),
        row("Planet", &detail.planet_name),
    ];
    if !person.image_url.is_empty() {
        lines.push(row("Image", &person.image_url));
    }
    if !person.info.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(person.info.clone(), value)));
    }
    Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: true })
        .block(Model::panel_block(person.name.clone(), false))
}

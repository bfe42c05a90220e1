//! Interactive directory session: key handling on top of the controller, and
//! the draw loop that drives it.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use cybervault::screen::ScreenGuard;
use cybervault::worker::StoreWorker;
use cybervault::{
    DirectoryController, Mutation, MutationOutcome, NoticeCenter, NoticeKind, Notifier,
    ProfileRecord, RecordStore, VaultError,
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::form::AddForm;
use crate::ui;

const IDLE_POLL: Duration = Duration::from_millis(100);
const BUSY_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mode {
    Browse,
    Search,
    ConfirmDelete { id: String, name: String },
}

pub(crate) struct App {
    controller: DirectoryController<NoticeCenter>,
    worker: Option<StoreWorker>,
    mode: Mode,
    form: AddForm,
    cursor: usize,
    frame_tick: usize,
}

impl App {
    /// Session whose store calls run on a background worker.
    pub(crate) fn with_worker(store: Arc<dyn RecordStore>) -> Result<Self> {
        let worker = StoreWorker::spawn(store.clone()).context("start store worker")?;
        let mut app = Self::new(store);
        app.worker = Some(worker);
        Ok(app)
    }

    /// Session that runs store calls inline.
    pub(crate) fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            controller: DirectoryController::new(store, NoticeCenter::new()),
            worker: None,
            mode: Mode::Browse,
            form: AddForm::default(),
            cursor: 0,
            frame_tick: 0,
        }
    }

    pub(crate) fn start(&mut self) {
        // Load failures are already on screen as a notice.
        let _ = self.controller.on_start();
    }

    pub(crate) fn controller(&self) -> &DirectoryController<NoticeCenter> {
        &self.controller
    }

    pub(crate) fn mode(&self) -> &Mode {
        &self.mode
    }

    pub(crate) fn form(&self) -> Option<&AddForm> {
        self.controller.is_add_panel_open().then_some(&self.form)
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn frame_tick(&self) -> usize {
        self.frame_tick
    }

    /// Apply finished worker results and expire notices. Returns `true` when
    /// the screen needs a redraw.
    pub(crate) fn tick(&mut self) -> bool {
        let mut changed = false;
        while let Some(outcome) = self.worker.as_ref().and_then(StoreWorker::try_recv) {
            let _ = self.controller.complete(outcome);
            changed = true;
        }
        if self.controller.is_busy() {
            self.frame_tick = self.frame_tick.wrapping_add(1);
            changed = true;
        }
        changed |= self.controller.notifier_mut().tick();
        self.clamp_cursor();
        changed
    }

    /// Returns `true` when the session should end.
    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        tracing::trace!(code = ?key.code, modifiers = ?key.modifiers, "key");

        if self.controller.is_add_panel_open() {
            self.handle_form_key(key);
            return false;
        }
        match self.mode.clone() {
            Mode::ConfirmDelete { id, .. } => {
                self.handle_confirm_key(&id, key);
                false
            }
            Mode::Search => {
                self.handle_search_key(key);
                false
            }
            Mode::Browse => self.handle_browse_key(key),
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Esc => {
                if self.controller.selection().is_some() {
                    self.controller.on_deselect();
                } else if !self.controller.query().is_empty() {
                    self.set_query(String::new());
                }
            }
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            KeyCode::Enter => {
                if let Some(id) = self.highlighted_id() {
                    self.controller.on_select(&id);
                }
            }
            KeyCode::Char('a') => {
                self.form = AddForm::default();
                self.controller.on_add_requested();
            }
            KeyCode::Char('d') => self.prompt_delete(),
            KeyCode::Char('r') => match self.controller.on_refresh() {
                Ok(()) => self
                    .controller
                    .notifier_mut()
                    .notify(NoticeKind::Info, "Records refreshed"),
                Err(err) => self.report_refused(&err),
            },
            _ => {}
        }
        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.set_query(String::new());
                self.mode = Mode::Browse;
            }
            KeyCode::Enter => self.mode = Mode::Browse,
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            KeyCode::Backspace => {
                let mut query = self.controller.query().to_string();
                query.pop();
                self.set_query(query);
            }
            KeyCode::Char(ch) if !ch.is_control() => {
                let mut query = self.controller.query().to_string();
                query.push(ch);
                self.set_query(query);
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.controller.on_add_panel_closed(),
            KeyCode::Tab | KeyCode::Down => self.form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.form.focus_prev(),
            KeyCode::Backspace => self.form.backspace(),
            KeyCode::Enter => self.submit_form(),
            KeyCode::Char(ch) => self.form.push_char(ch),
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, id: &str, key: KeyEvent) {
        let accepted = matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y'));
        self.mode = Mode::Browse;
        match self
            .controller
            .begin_delete(id, &mut |_: &ProfileRecord| accepted)
        {
            Ok(Some(mutation)) => self.dispatch(mutation),
            Ok(None) => self
                .controller
                .notifier_mut()
                .notify(NoticeKind::Info, "Delete cancelled"),
            Err(err) => self.report_refused(&err),
        }
    }

    fn submit_form(&mut self) {
        let draft = match self.form.to_draft() {
            Ok(draft) => draft,
            Err(message) => {
                self.controller
                    .notifier_mut()
                    .notify(NoticeKind::Error, &message);
                return;
            }
        };
        match self.controller.begin_add(draft) {
            Ok(mutation) => self.dispatch(mutation),
            Err(err) => self.report_refused(&err),
        }
    }

    fn prompt_delete(&mut self) {
        let target = self
            .controller
            .selection()
            .map(|r| (r.id.clone(), r.full_name.clone()))
            .or_else(|| {
                let visible = self.controller.visible();
                visible
                    .get(self.cursor)
                    .map(|r| (r.id.clone(), r.full_name.clone()))
            });
        if let Some((id, name)) = target {
            self.mode = Mode::ConfirmDelete { id, name };
        }
    }

    /// Hand a mutation to the worker, or run it inline when there is none.
    fn dispatch(&mut self, mutation: Mutation) {
        let Some(worker) = &self.worker else {
            let outcome = mutation.execute(self.controller.store().as_ref());
            let _ = self.controller.complete(outcome);
            self.clamp_cursor();
            return;
        };
        if let Err(err) = worker.submit(mutation.clone()) {
            tracing::error!(error = %err, "store worker unavailable");
            let outcome = match mutation {
                Mutation::Create(_) => MutationOutcome::Created(Err(err)),
                Mutation::Delete { id } => MutationOutcome::Deleted {
                    id,
                    result: Err(err),
                },
            };
            let _ = self.controller.complete(outcome);
        }
    }

    /// Surface errors the controller does not already report.
    fn report_refused(&mut self, err: &VaultError) {
        if matches!(err, VaultError::Busy) {
            self.controller
                .notifier_mut()
                .notify(NoticeKind::Info, "Store busy, try again shortly");
        }
    }

    fn set_query(&mut self, query: String) {
        self.controller.on_query_change(query);
        self.cursor = 0;
    }

    fn highlighted_id(&self) -> Option<String> {
        self.controller
            .visible()
            .get(self.cursor)
            .map(|r| r.id.clone())
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.controller.visible().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
    }

    fn clamp_cursor(&mut self) {
        let len = self.controller.visible().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }
}

/// Configure the terminal, run the draw loop, and tear everything down.
pub(crate) fn run(app: &mut App) -> Result<()> {
    let mut stdout = io::stdout();
    let screen = ScreenGuard::enter(&mut stdout).context("prepare terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let result = app_loop(&mut terminal, app);

    drop(terminal);
    screen.leave();

    result
}

fn app_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| ui::draw(frame, app))?;

    loop {
        let mut should_draw = app.tick();
        let poll = if app.controller().is_busy() {
            BUSY_POLL
        } else {
            IDLE_POLL
        };

        if event::poll(poll)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    if app.handle_key(key) {
                        break;
                    }
                    should_draw = true;
                }
                Event::Resize(_, _) => should_draw = true,
                _ => {}
            }
        }

        if should_draw {
            terminal.draw(|frame| ui::draw(frame, app))?;
        }
    }
    Ok(())
}

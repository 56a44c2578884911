use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use cogito_core::config::AgentCfg;
use cogito_core::io::input;
use cogito_core::io::output::{Turn, TurnOutcome};
use cogito_core::runtime::worker::{self, WorkerHandle};
use cogito_core::runtime::Orchestrator;
use cogito_core::types::UserPreferences;
use cogito_llm::provider::LlmProvider;

use crate::event::AppEvent;
use crate::widgets;

/// Single-line text field with a byte-offset cursor kept on char boundaries.
#[derive(Debug, Default, Clone)]
pub struct LineInput {
    pub text: String,
    pub cursor: usize,
}

impl LineInput {
    fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    fn prev_boundary(&self) -> usize {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn delete_char_before_cursor(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = self.prev_boundary();
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn move_left(&mut self) {
        self.cursor = self.prev_boundary();
    }

    fn move_right(&mut self) {
        if self.cursor >= self.text.len() {
            return;
        }
        self.cursor = self.text[self.cursor..]
            .char_indices()
            .nth(1)
            .map(|(i, _)| self.cursor + i)
            .unwrap_or(self.text.len());
    }

    fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    /// Shared editing keys. Returns false when the key is not an edit.
    fn handle_edit(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Backspace => self.delete_char_before_cursor(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.text.len(),
            KeyCode::Char(c) => self.insert_char(c),
            _ => return false,
        }
        true
    }
}

pub const SETUP_LABELS: [&str; 3] = [
    "Interests (comma-separated)",
    "Location",
    "Favorite topics (comma-separated)",
];

/// First-run form collecting the three preference answers.
#[derive(Debug, Default)]
pub struct SetupForm {
    pub fields: [LineInput; 3],
    pub focus: usize,
    pub error: Option<String>,
}

impl SetupForm {
    fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    fn focus_prev(&mut self) {
        self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
    }

    /// Every field is required; the first empty one takes focus.
    fn submit(&mut self) -> Option<UserPreferences> {
        if let Some(empty) = self.fields.iter().position(|f| f.text.trim().is_empty()) {
            self.focus = empty;
            self.error = Some(format!("{} is required", SETUP_LABELS[empty]));
            return None;
        }
        let likes = UserPreferences::parse_list(&self.fields[0].text);
        let topics = UserPreferences::parse_list(&self.fields[2].text);
        if likes.is_empty() || topics.is_empty() {
            self.error = Some("lists need at least one non-empty entry".into());
            return None;
        }
        self.error = None;
        Some(UserPreferences::new(likes, self.fields[1].text.trim(), topics))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    You,
    Agent,
    Error,
}

/// One chat entry. Replies from a completed pass carry that pass's
/// confidence and reasoning chain.
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
    pub confidence: Option<f64>,
    pub reasoning: Vec<String>,
}

impl ChatMessage {
    pub fn plain(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
            confidence: None,
            reasoning: Vec::new(),
        }
    }
}

pub enum Screen {
    Setup(SetupForm),
    Chat,
}

/// What the event loop must do after a key press.
#[derive(Debug, PartialEq)]
enum Command {
    None,
    Start(UserPreferences),
    Submit(String),
    Reset,
    Exit,
}

/// Dashboard state.
pub struct App {
    pub screen: Screen,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub input: LineInput,
    pub scroll_offset: u16,
    pub thinking: bool,
    pub anim_frame: usize,
    /// Confidence of every completed pass this session, oldest first.
    pub confidence_history: Vec<f64>,
    /// Seconds taken by the last turn, failed or not.
    pub latency: Option<f64>,
    pub show_reasoning: bool,
    /// Request whose reply is awaited; other replies are stale.
    pending: Option<input::Ticket>,
}

impl App {
    fn new(model: impl Into<String>) -> Self {
        Self {
            screen: Screen::Setup(SetupForm::default()),
            model: model.into(),
            messages: Vec::new(),
            input: LineInput::default(),
            scroll_offset: 0,
            thinking: false,
            anim_frame: 0,
            confidence_history: Vec::new(),
            latency: None,
            show_reasoning: false,
            pending: None,
        }
    }

    /// Reasoning chain of the most recent completed pass.
    pub fn last_reasoning(&self) -> Option<&[String]> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.confidence.is_some())
            .map(|m| m.reasoning.as_slice())
    }

    /// Cancel the awaited request, if any; the worker drops it unprocessed.
    fn withdraw_pending(&mut self) {
        if let Some(ticket) = self.pending.take() {
            tracing::debug!(request_id = %ticket.id, "withdrawing request");
            ticket.cancel.cancel();
        }
    }

    /// Back to the setup form with an empty session.
    fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.model));
    }

    fn handle_key(&mut self, key: KeyEvent) -> Command {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Command::Exit,
                KeyCode::Char('n') if matches!(self.screen, Screen::Chat) => Command::Reset,
                KeyCode::Char('r') => {
                    self.show_reasoning = !self.show_reasoning;
                    Command::None
                }
                _ => Command::None,
            };
        }

        if let Screen::Setup(form) = &mut self.screen {
            return match key.code {
                KeyCode::Tab | KeyCode::Down => {
                    form.focus_next();
                    Command::None
                }
                KeyCode::BackTab | KeyCode::Up => {
                    form.focus_prev();
                    Command::None
                }
                KeyCode::Enter => form.submit().map_or(Command::None, Command::Start),
                code => {
                    form.fields[form.focus].handle_edit(code);
                    Command::None
                }
            };
        }

        match key.code {
            KeyCode::Enter => self.submit_input().map_or(Command::None, Command::Submit),
            KeyCode::Up => {
                self.scroll_offset = self.scroll_offset.saturating_add(1);
                Command::None
            }
            KeyCode::Down => {
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
                Command::None
            }
            code => {
                self.input.handle_edit(code);
                Command::None
            }
        }
    }

    /// Take the input line. While a reply is pending the previous question
    /// is replaced and its request withdrawn from the worker.
    fn submit_input(&mut self) -> Option<String> {
        let text = self.input.take().trim().to_owned();
        if text.is_empty() {
            return None;
        }
        self.scroll_offset = 0;
        if self.thinking {
            self.withdraw_pending();
            if let Some(pos) = self.messages.iter().rposition(|m| m.speaker == Speaker::You) {
                self.messages.remove(pos);
            }
        }
        self.messages.push(ChatMessage::plain(Speaker::You, text.clone()));
        self.thinking = true;
        Some(text)
    }

    fn apply_turn(&mut self, turn: Turn) {
        if self.pending.as_ref().map(|t| t.id) != Some(turn.request_id) {
            tracing::debug!(request_id = %turn.request_id, "dropping stale reply");
            return;
        }
        self.pending = None;
        self.thinking = false;
        self.scroll_offset = 0;

        match turn.outcome {
            TurnOutcome::Completed(response) => {
                let (speaker, content) = match &response.action_error {
                    Some(err) => (Speaker::Error, format!("action failed: {err}")),
                    None => (Speaker::Agent, response.output_text()),
                };
                self.confidence_history.push(response.confidence);
                self.latency = Some(response.execution_time);
                self.messages.push(ChatMessage {
                    speaker,
                    content,
                    confidence: Some(response.confidence),
                    reasoning: response.reasoning_chain,
                });
            }
            TurnOutcome::Failed { error, execution_time } => {
                self.messages.push(ChatMessage::plain(Speaker::Error, error));
                self.latency = Some(execution_time);
            }
        }
    }
}

/// A running orchestrator behind its worker task.
struct Session {
    worker: WorkerHandle,
    token: CancellationToken,
}

impl Session {
    fn start(
        cfg: &Arc<AgentCfg>,
        provider: &Arc<dyn LlmProvider>,
        preferences: UserPreferences,
        parent: &CancellationToken,
    ) -> anyhow::Result<Self> {
        let mut orchestrator = Orchestrator::new(cfg.clone(), provider.clone());
        orchestrator.set_preferences(preferences)?;
        let token = parent.child_token();
        let worker = worker::spawn(orchestrator, token.clone());
        Ok(Self { worker, token })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn next_turn(session: &mut Option<Session>) -> Option<Turn> {
    match session {
        Some(s) => s.worker.output.recv().await,
        None => std::future::pending().await,
    }
}

const AGENT_BUSY: &str = "agent is busy; try again shortly";
const AGENT_STOPPED: &str = "agent is not running; press Ctrl+N to start over";

/// Run the dashboard until Ctrl+C or `token` is cancelled.
pub async fn run_app(
    cfg: Arc<AgentCfg>,
    provider: Arc<dyn LlmProvider>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut event_rx = crate::event::spawn(stop.clone());

    let mut app = App::new(cfg.model.clone());
    let mut session: Option<Session> = None;
    let mut anim_interval = tokio::time::interval(std::time::Duration::from_millis(80));
    anim_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    terminal.draw(|f| widgets::draw(f, &app))?;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            evt = event_rx.recv() => {
                let Some(evt) = evt else { break };
                let AppEvent::Key(key) = evt else {
                    terminal.draw(|f| widgets::draw(f, &app))?;
                    continue;
                };
                match app.handle_key(key) {
                    Command::None => {}
                    Command::Exit => break,
                    Command::Start(prefs) => {
                        match Session::start(&cfg, &provider, prefs, &token) {
                            Ok(s) => {
                                session = Some(s);
                                app.screen = Screen::Chat;
                            }
                            Err(e) => {
                                if let Screen::Setup(form) = &mut app.screen {
                                    form.error = Some(e.to_string());
                                }
                            }
                        }
                    }
                    Command::Submit(text) => {
                        let sent = match &session {
                            Some(s) => input::try_submit_text(&s.worker.input, text).map_err(|e| match e {
                                TrySendError::Full(_) => AGENT_BUSY,
                                TrySendError::Closed(_) => AGENT_STOPPED,
                            }),
                            None => Err(AGENT_STOPPED),
                        };
                        match sent {
                            Ok(ticket) => app.pending = Some(ticket),
                            Err(msg) => {
                                app.thinking = false;
                                app.messages.push(ChatMessage::plain(Speaker::Error, msg));
                            }
                        }
                    }
                    Command::Reset => {
                        session = None;
                        app.reset();
                        tracing::info!("session reset");
                    }
                }
            }
            turn = next_turn(&mut session) => {
                match turn {
                    Some(turn) => app.apply_turn(turn),
                    // worker gone; keep the UI up so the user can reset
                    None => {
                        session = None;
                        app.thinking = false;
                    }
                }
            }
            _ = anim_interval.tick() => {
                if app.thinking {
                    app.anim_frame = app.anim_frame.wrapping_add(1);
                }
            }
        }
        terminal.draw(|f| widgets::draw(f, &app))?;
    }

    drop(session);
    stop.store(true, Ordering::Relaxed);
    terminal::disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

//! Terminal host - a small raw-mode editor the typing engine drives
//!
//! Printable keys, Enter, Tab and Backspace go through the interceptor;
//! arrows and Home/End move the cursor and feed reconciliation. Control keys
//! run commands. A one-line prompt at the bottom collects text, tasks, slash
//! commands and the y/n activation answer.

use std::io::{self, Write, stdout};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::style::Print;
use crossterm::terminal::{self, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};
use unicode_width::UnicodeWidthStr;

use crate::command::{Command, Controller, Flow, HELP, Prompt, parse_slash_command};
use crate::render::{Notice, NoticeBoard, NoticeLevel, UiEvent};
use crate::status_bar::{Indicator, StatusBarState};
use crate::typing::{
    BACKSPACE, CursorMoved, Disposition, Editor, EngineEvent, LINE_BREAK, MemoryEditor, Motion,
    SessionStatus,
};

const TICK: Duration = Duration::from_millis(100);
const TAB: &str = "    ";

/// What a key does while no prompt is open
#[derive(Debug, Clone, PartialEq, Eq)]
enum EditorAction {
    Command(Command),
    OpenCommandLine,
    Keystroke(String),
    Move(Motion),
    Ignore,
}

fn editor_action(key: KeyEvent) -> EditorAction {
    if key.kind != KeyEventKind::Press {
        return EditorAction::Ignore;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
            't' => EditorAction::Command(Command::Toggle),
            'o' => EditorAction::Command(Command::SetText(None)),
            'g' => EditorAction::Command(Command::Generate(None)),
            'p' => EditorAction::Command(Command::PauseResume),
            'x' => EditorAction::Command(Command::Stop),
            'r' => EditorAction::Command(Command::Restart),
            'q' | 'c' => EditorAction::Command(Command::Quit),
            _ => EditorAction::Ignore,
        },
        KeyCode::Char(c) => EditorAction::Keystroke(c.to_string()),
        KeyCode::Enter => EditorAction::Keystroke("\n".to_string()),
        KeyCode::Tab => EditorAction::Keystroke("\t".to_string()),
        KeyCode::Backspace => EditorAction::Keystroke(BACKSPACE.to_string()),
        KeyCode::Left => EditorAction::Move(Motion::Left),
        KeyCode::Right => EditorAction::Move(Motion::Right),
        KeyCode::Up => EditorAction::Move(Motion::Up),
        KeyCode::Down => EditorAction::Move(Motion::Down),
        KeyCode::Home => EditorAction::Move(Motion::LineStart),
        KeyCode::End => EditorAction::Move(Motion::LineEnd),
        KeyCode::Esc => EditorAction::OpenCommandLine,
        KeyCode::F(1) => EditorAction::Command(Command::Help),
        _ => EditorAction::Ignore,
    }
}

/// Hand a keystroke to the engine, falling back to normal typing
fn keystroke(raw: &str, controller: &Controller<MemoryEditor>) {
    let engine = controller.engine();
    if engine.intercept(raw) == Disposition::PassThrough {
        host_default(engine.editor(), raw);
    }
}

/// Normal editor behavior for a keystroke nobody intercepted
fn host_default(editor: &MemoryEditor, raw: &str) {
    match raw {
        BACKSPACE => editor.delete_before_cursor(),
        "\n" | "\r" => editor.insert_at_cursor(LINE_BREAK),
        _ => editor.insert_at_cursor(&crate::typing::normalize_line_endings(raw)),
    }
}

// ============================================================================
// Prompt line
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    SetText,
    Generate,
    Activate,
    Command,
}

impl From<Prompt> for InputMode {
    fn from(prompt: Prompt) -> Self {
        match prompt {
            Prompt::SetText => InputMode::SetText,
            Prompt::Generate => InputMode::Generate,
            Prompt::Activate => InputMode::Activate,
        }
    }
}

impl InputMode {
    fn label(&self) -> &'static str {
        match self {
            InputMode::SetText => "Text to type: ",
            InputMode::Generate => "Programming task: ",
            InputMode::Activate => "Activate typing mode now? (y/n) ",
            InputMode::Command => "/",
        }
    }
}

/// Single-line input with a char cursor
#[derive(Debug, Default)]
struct PromptLine {
    input: String,
    cursor_pos: usize,
}

impl PromptLine {
    /// Convert character index to byte index
    fn char_to_byte_index(&self, char_idx: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    fn insert_str(&mut self, text: &str) {
        let byte_pos = self.char_to_byte_index(self.cursor_pos);
        self.input.insert_str(byte_pos, text);
        self.cursor_pos += text.chars().count();
    }

    fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            let byte_pos = self.char_to_byte_index(self.cursor_pos);
            self.input.remove(byte_pos);
        }
    }

    fn delete(&mut self) {
        if self.cursor_pos < self.char_count() {
            let byte_pos = self.char_to_byte_index(self.cursor_pos);
            self.input.remove(byte_pos);
        }
    }

    fn left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    fn right(&mut self) {
        if self.cursor_pos < self.char_count() {
            self.cursor_pos += 1;
        }
    }

    fn home(&mut self) {
        self.cursor_pos = 0;
    }

    fn end(&mut self) {
        self.cursor_pos = self.char_count();
    }

    fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    fn take(&mut self) -> String {
        self.cursor_pos = 0;
        std::mem::take(&mut self.input)
    }

    /// Printable form; pasted line breaks and tabs get visible markers
    fn display(&self, chars: Option<usize>) -> String {
        self.input
            .chars()
            .take(chars.unwrap_or(usize::MAX))
            .filter(|&c| c != '\r')
            .map(|c| match c {
                '\n' => '⏎',
                '\t' => '→',
                c => c,
            })
            .collect()
    }

    fn cursor_display_width(&self) -> usize {
        self.display(Some(self.cursor_pos)).width()
    }
}

// ============================================================================
// Document view
// ============================================================================

fn expand_tabs(line: &str) -> String {
    line.replace('\t', TAB)
}

/// Document lines without their CR LF
fn document_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// First line to draw so that `cursor_line` stays in a window of `rows`
fn scroll_start(cursor_line: usize, rows: usize) -> usize {
    if rows == 0 {
        return cursor_line;
    }
    cursor_line.saturating_sub(rows - 1)
}

fn clip_to_width(line: &str, width: usize) -> String {
    let mut out = String::new();
    for c in line.chars() {
        let next = format!("{}{}", out, c);
        if next.width() > width {
            break;
        }
        out = next;
    }
    out
}

// ============================================================================
// Terminal
// ============================================================================

pub struct Tui {
    prompt: Option<(InputMode, PromptLine)>,
    board: NoticeBoard,
    status: StatusBarState,
    show_help: bool,
}

impl Tui {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, EnableBracketedPaste)?;
        Ok(Self {
            prompt: None,
            board: NoticeBoard::new(),
            status: StatusBarState::new(),
            show_help: false,
        })
    }

    pub fn restore(&self) -> io::Result<()> {
        execute!(
            stdout(),
            DisableBracketedPaste,
            LeaveAlternateScreen,
            cursor::Show
        )?;
        terminal::disable_raw_mode()
    }

    fn open(&mut self, mode: InputMode) {
        self.prompt = Some((mode, PromptLine::default()));
    }

    fn post(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.board.post(Notice::new(level, text));
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Completed => self.post(NoticeLevel::Info, "Typing complete"),
            EngineEvent::Failed(msg) => self.post(NoticeLevel::Error, format!("Edit failed: {}", msg)),
            EngineEvent::Status(status) => tracing::debug!(%status, "Session status"),
        }
    }

    fn handle_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Notice(notice) => self.board.post(notice),
            UiEvent::Generated(_) => {
                if self.prompt.is_none() {
                    self.open(InputMode::Activate);
                }
            }
        }
    }

    async fn handle_terminal_event(
        &mut self,
        event: Event,
        controller: &Controller<MemoryEditor>,
    ) -> Flow {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if self.prompt.is_some() {
                    self.handle_prompt_key(key, controller).await
                } else {
                    self.handle_editor_key(key, controller).await
                }
            }
            Event::Paste(text) => {
                match &mut self.prompt {
                    Some((InputMode::Activate, _)) => {}
                    Some((_, line)) => line.insert_str(&text),
                    // One paste is one keystroke
                    None => keystroke(&text, controller),
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    async fn handle_editor_key(&mut self, key: KeyEvent, controller: &Controller<MemoryEditor>) -> Flow {
        self.show_help = false;
        match editor_action(key) {
            EditorAction::Command(command) => self.run_command(command, controller).await,
            EditorAction::OpenCommandLine => {
                self.open(InputMode::Command);
                Flow::Continue
            }
            EditorAction::Keystroke(raw) => {
                keystroke(&raw, controller);
                Flow::Continue
            }
            EditorAction::Move(motion) => {
                let editor = controller.engine().editor();
                let offset = editor.move_cursor(motion);
                controller.engine().on_cursor_moved(CursorMoved {
                    editor: editor.id(),
                    offset,
                });
                Flow::Continue
            }
            EditorAction::Ignore => Flow::Continue,
        }
    }

    async fn handle_prompt_key(&mut self, key: KeyEvent, controller: &Controller<MemoryEditor>) -> Flow {
        let Some((mode, line)) = &mut self.prompt else {
            return Flow::Continue;
        };
        let mode = *mode;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if mode == InputMode::Activate {
            match key.code {
                KeyCode::Char('y' | 'Y') => {
                    self.prompt = None;
                    controller.activate();
                }
                KeyCode::Char('n' | 'N') | KeyCode::Esc => self.prompt = None,
                _ => {}
            }
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                let text = line.take();
                self.prompt = None;
                return self.submit(mode, text, controller).await;
            }
            KeyCode::Char('u') if ctrl => line.clear(),
            KeyCode::Char('c') if ctrl => self.prompt = None,
            KeyCode::Char(c) if !ctrl => line.insert_str(c.encode_utf8(&mut [0; 4])),
            KeyCode::Tab => line.insert_str("\t"),
            KeyCode::Backspace => line.backspace(),
            KeyCode::Delete => line.delete(),
            KeyCode::Left => line.left(),
            KeyCode::Right => line.right(),
            KeyCode::Home => line.home(),
            KeyCode::End => line.end(),
            _ => {}
        }
        Flow::Continue
    }

    async fn submit(&mut self, mode: InputMode, text: String, controller: &Controller<MemoryEditor>) -> Flow {
        if text.trim().is_empty() {
            return Flow::Continue;
        }
        match mode {
            InputMode::SetText => self.run_command(Command::SetText(Some(text)), controller).await,
            InputMode::Generate => {
                self.post(NoticeLevel::Info, "Generating code...");
                self.run_command(Command::Generate(Some(text)), controller).await
            }
            InputMode::Command => {
                let line = format!("/{}", text.trim().trim_start_matches('/'));
                match parse_slash_command(&line) {
                    Some(command) => self.run_command(command, controller).await,
                    None => {
                        self.post(NoticeLevel::Warn, format!("Unknown command: {}", line));
                        Flow::Continue
                    }
                }
            }
            InputMode::Activate => Flow::Continue,
        }
    }

    async fn run_command(&mut self, command: Command, controller: &Controller<MemoryEditor>) -> Flow {
        match controller.execute(command).await {
            Flow::Ask(prompt) => {
                self.open(prompt.into());
                Flow::Continue
            }
            Flow::ShowHelp => {
                self.show_help = true;
                Flow::Continue
            }
            flow => flow,
        }
    }

    fn refresh_status(&mut self, controller: &Controller<MemoryEditor>) {
        let engine = controller.engine();
        let status = engine.status();
        self.status.indicator = Indicator::resolve(status, controller.state().is_generating());
        self.status.progress = match status {
            SessionStatus::Stopped => None,
            _ => engine.progress(),
        };
        self.status.notice = self.board.visible(Instant::now()).cloned();
    }

    /// Redraw the document, status bar and prompt
    fn draw(&mut self, controller: &Controller<MemoryEditor>) -> io::Result<()> {
        self.refresh_status(controller);

        let editor = controller.engine().editor();
        let mut out = stdout();
        let (width, height) = terminal::size().map(|(w, h)| (w as usize, h as usize))?;
        let rows = height.saturating_sub(2);

        let text = editor.text();
        let lines = document_lines(&text);
        let (cursor_line, cursor_col) = editor.line_col();
        let first = scroll_start(cursor_line, rows);

        queue!(
            out,
            cursor::Hide,
            cursor::MoveTo(0, 0),
            terminal::Clear(ClearType::All)
        )?;

        if self.show_help {
            for (row, line) in HELP.lines().take(rows).enumerate() {
                queue!(out, cursor::MoveTo(0, row as u16), Print(clip_to_width(line, width)))?;
            }
        } else {
            for (row, line) in lines.iter().skip(first).take(rows).enumerate() {
                let shown = clip_to_width(&expand_tabs(line), width);
                queue!(out, cursor::MoveTo(0, row as u16), Print(shown))?;
            }
        }

        let status = self.status.render_status(Some(width));
        queue!(
            out,
            cursor::MoveTo(0, rows as u16),
            Print(status),
            cursor::MoveTo(0, (rows + 1) as u16),
        )?;

        match &self.prompt {
            Some((mode, line)) => {
                let label = mode.label();
                queue!(
                    out,
                    Print(format!("\x1b[32m{}\x1b[0m{}", label, line.display(None))),
                    cursor::MoveTo((label.width() + line.cursor_display_width()) as u16, (rows + 1) as u16),
                )?;
            }
            None => {
                queue!(out, Print("\x1b[90mEsc: command  F1: help\x1b[0m"))?;
                let prefix: String = lines
                    .get(cursor_line)
                    .map(|line| line.chars().take(cursor_col).collect())
                    .unwrap_or_default();
                let col = expand_tabs(&prefix).width();
                queue!(out, cursor::MoveTo(col as u16, (cursor_line - first) as u16))?;
            }
        }

        queue!(out, cursor::Show)?;
        out.flush()
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Forward terminal events from a blocking reader thread
fn spawn_input_thread() -> flume::Receiver<io::Result<Event>> {
    let (tx, rx) = flume::unbounded();
    std::thread::spawn(move || {
        loop {
            let event = event::read();
            let failed = event.is_err();
            if tx.send(event).is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Run the terminal host until the user quits
pub async fn run(
    controller: Controller<MemoryEditor>,
    engine_events: flume::Receiver<EngineEvent>,
    ui_events: flume::Receiver<UiEvent>,
    initial_prompt: Option<Prompt>,
) -> io::Result<()> {
    let mut tui = Tui::new()?;
    if let Some(prompt) = initial_prompt {
        tui.open(prompt.into());
    }

    let input = spawn_input_thread();
    let mut ticker = tokio::time::interval(TICK);

    loop {
        tui.draw(&controller)?;

        tokio::select! {
            event = input.recv_async() => match event {
                Ok(Ok(event)) => {
                    if tui.handle_terminal_event(event, &controller).await == Flow::Quit {
                        break;
                    }
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => break,
            },
            Ok(event) = engine_events.recv_async() => tui.handle_engine_event(event),
            Ok(event) = ui_events.recv_async() => tui.handle_ui_event(event),
            _ = ticker.tick() => tui.status.update_spinner(),
        }

        if controller.state().quit_requested() {
            break;
        }
    }

    controller.engine().stop();
    tracing::info!("Terminal host exiting");
    tui.restore()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_control_keys_map_to_commands() {
        let ctrl = KeyModifiers::CONTROL;
        assert_eq!(
            editor_action(key(KeyCode::Char('t'), ctrl)),
            EditorAction::Command(Command::Toggle)
        );
        assert_eq!(
            editor_action(key(KeyCode::Char('o'), ctrl)),
            EditorAction::Command(Command::SetText(None))
        );
        assert_eq!(
            editor_action(key(KeyCode::Char('p'), ctrl)),
            EditorAction::Command(Command::PauseResume)
        );
        assert_eq!(
            editor_action(key(KeyCode::Char('q'), ctrl)),
            EditorAction::Command(Command::Quit)
        );
        assert_eq!(editor_action(key(KeyCode::Char('z'), ctrl)), EditorAction::Ignore);
    }

    #[test]
    fn test_text_keys_are_keystrokes() {
        let none = KeyModifiers::NONE;
        assert_eq!(
            editor_action(key(KeyCode::Char('a'), none)),
            EditorAction::Keystroke("a".into())
        );
        assert_eq!(
            editor_action(key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            EditorAction::Keystroke("A".into())
        );
        assert_eq!(
            editor_action(key(KeyCode::Enter, none)),
            EditorAction::Keystroke("\n".into())
        );
        assert_eq!(
            editor_action(key(KeyCode::Backspace, none)),
            EditorAction::Keystroke(BACKSPACE.into())
        );
        assert_eq!(editor_action(key(KeyCode::Home, none)), EditorAction::Move(Motion::LineStart));
        assert_eq!(editor_action(key(KeyCode::Esc, none)), EditorAction::OpenCommandLine);
    }

    #[test]
    fn test_release_events_ignored() {
        let mut event = key(KeyCode::Char('a'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(editor_action(event), EditorAction::Ignore);
    }

    #[test]
    fn test_host_default_typing() {
        let editor = MemoryEditor::new(crate::typing::EditorId(1));
        host_default(&editor, "a");
        host_default(&editor, "\n");
        host_default(&editor, "b\nc");
        assert_eq!(editor.text(), "a\r\nb\r\nc");
        host_default(&editor, BACKSPACE);
        assert_eq!(editor.text(), "a\r\nb\r\n");
    }

    #[test]
    fn test_prompt_line_editing() {
        let mut line = PromptLine::default();
        line.insert_str("héllo");
        line.left();
        line.left();
        line.backspace();
        assert_eq!(line.input, "hélo");
        line.home();
        line.delete();
        assert_eq!(line.input, "élo");
        line.end();
        line.insert_str("!");
        assert_eq!(line.take(), "élo!");
        assert_eq!(line.cursor_pos, 0);
    }

    #[test]
    fn test_prompt_line_display() {
        let mut line = PromptLine::default();
        line.insert_str("a\r\n\tb");
        assert_eq!(line.display(None), "a⏎→b");
        line.home();
        line.right();
        assert_eq!(line.cursor_display_width(), 1);
    }

    #[test]
    fn test_document_lines() {
        assert_eq!(document_lines("a\r\nb\r\n"), vec!["a", "b", ""]);
        assert_eq!(document_lines(""), vec![""]);
    }

    #[test]
    fn test_scroll_start() {
        assert_eq!(scroll_start(0, 10), 0);
        assert_eq!(scroll_start(9, 10), 0);
        assert_eq!(scroll_start(10, 10), 1);
        assert_eq!(scroll_start(3, 0), 3);
    }

    #[test]
    fn test_clip_to_width() {
        assert_eq!(clip_to_width("abcdef", 3), "abc");
        assert_eq!(clip_to_width("ab", 10), "ab");
    }

    #[test]
    fn test_input_mode_labels() {
        assert_eq!(InputMode::from(Prompt::Activate).label(), "Activate typing mode now? (y/n) ");
        assert_eq!(InputMode::Command.label(), "/");
    }
}

//! Command surface - what a user can ask for
//!
//! Key bindings and slash commands both resolve to a [`Command`]; the
//! [`Controller`] carries it out against the typing engine, the clipboard
//! and the LLM backend, reporting back through [`Ui`] notices.

use std::sync::Arc;

use crate::codegen;
use crate::config::{Config, LlmConfig};
use crate::llm::{self, LlmBackend, LlmError};
use crate::render::Ui;
use crate::source::Clipboard;
use crate::state::RuntimeState;
use crate::typing::{Editor, SessionStatus, TypingEngine};

pub const HELP: &str = "\
/toggle            start from the clipboard, or stop        (Ctrl-T)
/set [text]        set the text to type                     (Ctrl-O)
/generate [task]   generate code for a task                 (Ctrl-G)
/pause             pause or resume                          (Ctrl-P)
/stop              stop typing                              (Ctrl-X)
/restart           type the current text again              (Ctrl-R)
/quit              exit                                     (Ctrl-Q)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle,
    /// `None` asks the user for the text
    SetText(Option<String>),
    /// `None` asks the user for the task
    Generate(Option<String>),
    PauseResume,
    Stop,
    Restart,
    Quit,
    Help,
}

/// Parse a `/command [argument]` line. `None` for anything else.
pub fn parse_slash_command(input: &str) -> Option<Command> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };

    let command = match name.to_lowercase().as_str() {
        "toggle" | "t" => Command::Toggle,
        "set" | "text" => Command::SetText(arg),
        "generate" | "gen" | "g" => Command::Generate(arg),
        "pause" | "resume" | "p" => Command::PauseResume,
        "stop" | "x" => Command::Stop,
        "restart" | "r" => Command::Restart,
        "quit" | "exit" | "q" => Command::Quit,
        "help" | "h" | "?" => Command::Help,
        _ => return None,
    };
    Some(command)
}

/// What the host should do after a command ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
    ShowHelp,
    Ask(Prompt),
}

/// Input the host has to collect before the command can finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    SetText,
    Generate,
    /// "Activate typing mode now? (y/n)"
    Activate,
}

pub struct Controller<E: Editor> {
    engine: TypingEngine<E>,
    state: Arc<RuntimeState>,
    ui: Ui,
    clipboard: Arc<dyn Clipboard>,
    llm: LlmConfig,
    backend: Option<Arc<dyn LlmBackend>>,
    tab_width: usize,
}

impl<E: Editor> Clone for Controller<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            state: Arc::clone(&self.state),
            ui: self.ui.clone(),
            clipboard: Arc::clone(&self.clipboard),
            llm: self.llm.clone(),
            backend: self.backend.clone(),
            tab_width: self.tab_width,
        }
    }
}

impl<E: Editor> Controller<E> {
    pub fn new(
        engine: TypingEngine<E>,
        state: Arc<RuntimeState>,
        ui: Ui,
        clipboard: Arc<dyn Clipboard>,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            state,
            ui,
            clipboard,
            llm: config.llm.clone(),
            backend: None,
            tab_width: config.typing.tab_width,
        }
    }

    /// Use `backend` instead of building one from the config
    pub fn with_backend(mut self, backend: Arc<dyn LlmBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn engine(&self) -> &TypingEngine<E> {
        &self.engine
    }

    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    /// Run a command. Generation is spawned so the host stays responsive.
    pub async fn execute(&self, command: Command) -> Flow {
        match command {
            Command::Toggle => {
                self.toggle();
            }
            Command::SetText(None) => return Flow::Ask(Prompt::SetText),
            Command::SetText(Some(text)) => {
                if self.set_text(&text) {
                    return Flow::Ask(Prompt::Activate);
                }
            }
            Command::Generate(None) => return Flow::Ask(Prompt::Generate),
            Command::Generate(Some(task)) => {
                let controller = self.clone();
                tokio::spawn(async move {
                    let _ = controller.generate(&task).await;
                });
            }
            Command::PauseResume => self.pause_resume(),
            Command::Stop => self.stop(),
            Command::Restart => {
                self.restart();
            }
            Command::Quit => {
                self.state.request_quit();
                return Flow::Quit;
            }
            Command::Help => return Flow::ShowHelp,
        }
        Flow::Continue
    }

    /// Stop a live session, or start one from the clipboard
    pub fn toggle(&self) -> bool {
        if self.engine.status() != SessionStatus::Stopped {
            self.engine.stop();
            self.ui.info("Typing mode deactivated");
            return false;
        }

        match self.clipboard.read_text() {
            Some(text) if !text.is_empty() && self.engine.start(&text) => {
                self.ui.info("Typing mode activated");
                true
            }
            _ => {
                self.ui.warn("No text in clipboard");
                false
            }
        }
    }

    /// Replace the text to type without starting
    pub fn set_text(&self, text: &str) -> bool {
        if self.engine.load(text) {
            self.ui.info("Text set");
            true
        } else {
            self.ui.warn("No text provided");
            false
        }
    }

    /// Start typing the current text from the cursor
    pub fn activate(&self) -> bool {
        if self.engine.restart() {
            self.ui.info("Typing mode activated");
            true
        } else {
            self.ui.warn("No text to type");
            false
        }
    }

    /// Pause a running session or resume a paused one. Queued keystrokes
    /// are replayed in the background.
    pub fn pause_resume(&self) {
        match self.engine.status() {
            SessionStatus::Running => {
                self.engine.pause();
            }
            SessionStatus::Paused => {
                self.engine.resume_detached();
            }
            SessionStatus::Stopped => tracing::debug!("Pause ignored: not typing"),
        }
    }

    pub fn stop(&self) {
        if self.engine.status() != SessionStatus::Stopped {
            self.engine.stop();
            self.ui.info("Typing stopped");
        }
    }

    pub fn restart(&self) -> bool {
        if self.engine.restart() {
            self.ui.info("Typing restarted");
            true
        } else {
            self.ui.warn("No text to type");
            false
        }
    }

    /// Generate code for `task`, load it as the buffer and copy it to the
    /// clipboard. A failure is reported and leaves the session untouched.
    pub async fn generate(&self, task: &str) -> Result<String, LlmError> {
        let Some(_guard) = self.state.begin_generation() else {
            self.ui.warn("Generation already running");
            return Err(LlmError::Unavailable("generation already running"));
        };

        let result = self.request_completion(task).await;
        match result {
            Ok(code) => {
                self.engine.load(&code);
                if self.clipboard.write_text(&code) {
                    self.ui.info("Code generated and copied to clipboard");
                } else {
                    self.ui.info("Code generated");
                }
                self.ui.generated(code.clone());
                Ok(code)
            }
            Err(LlmError::MissingApiKey) => {
                tracing::warn!("Generation aborted: no API key");
                self.ui.warn("Set an API key in the [llm] section of the config");
                Err(LlmError::MissingApiKey)
            }
            Err(err) => {
                tracing::error!(error = %err, "Generation failed");
                self.ui.error(format!("Failed to generate code: {}", err));
                Err(err)
            }
        }
    }

    async fn request_completion(&self, task: &str) -> Result<String, LlmError> {
        let backend = match &self.backend {
            Some(backend) => Arc::clone(backend),
            None => llm::create_backend(&self.llm)?,
        };

        tracing::info!(task, "Generating code");
        let completion = llm::complete_off_runtime(backend, codegen::build_messages(task)).await?;
        let code = codegen::prepare(&completion, self.tab_width);
        if code.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(code)
    }
}

//! UI Actor - single thread that owns the terminal.
//!
//! Reporter calls arrive from async tasks; the actor serializes them so a
//! progress line being redrawn in place is never torn by another message.

use std::io::{IsTerminal, Write};
use std::sync::mpsc;
use std::thread;

use crossterm::style::Stylize;
use crossterm::{QueueableCommand, cursor, terminal};

use super::progress::{fit_name, format_bar, format_size};
use super::theme::Theme;

#[derive(Debug)]
pub enum UiEvent {
    Section(String),
    Transfer {
        verb: &'static str,
        name: String,
        current: u64,
        total: Option<u64>,
    },
    Removing(String),
    Done {
        name: String,
        detail: String,
        size: Option<u64>,
    },
    Failed {
        name: String,
        reason: String,
    },
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    /// Acknowledged once every earlier event has been rendered.
    Sync(mpsc::Sender<()>),
    Shutdown,
}

#[derive(Debug)]
pub struct UiActor {
    sender: mpsc::Sender<UiEvent>,
    _handle: thread::JoinHandle<()>,
}

impl UiActor {
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || run_event_loop(&receiver));
        Self {
            sender,
            _handle: handle,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<UiEvent> {
        self.sender.clone()
    }
}

impl Drop for UiActor {
    fn drop(&mut self) {
        let _ = self.sender.send(UiEvent::Shutdown);
    }
}

/// Renders events to stdout.
struct Renderer {
    theme: Theme,
    interactive: bool,
    /// Name of the transfer whose progress line is currently open.
    live: Option<String>,
}

impl Renderer {
    fn new(theme: Theme) -> Self {
        Self {
            theme,
            interactive: std::io::stdout().is_terminal(),
            live: None,
        }
    }

    /// Terminate an open progress line before printing anything else.
    fn close_live(&mut self, out: &mut impl Write) {
        if self.live.take().is_some() && self.interactive {
            let _ = writeln!(out);
        }
    }

    fn rewind(&self, out: &mut impl Write) {
        let _ = out.queue(cursor::MoveToColumn(0));
        let _ = out.queue(terminal::Clear(terminal::ClearType::CurrentLine));
    }

    fn render(&mut self, event: UiEvent, out: &mut impl Write) {
        let theme = self.theme.clone();
        let icons = &theme.icons;
        let colors = &theme.colors;
        let width = theme.name_width;

        match event {
            UiEvent::Section(title) => {
                self.close_live(out);
                let _ = writeln!(out);
                let _ = writeln!(out, "{}", title.bold().with(colors.header));
            }
            UiEvent::Transfer {
                verb,
                name,
                current,
                total,
            } => {
                // Without a terminal only the first update of each asset is shown.
                if !self.interactive {
                    if self.live.as_deref() != Some(name.as_str()) {
                        let _ = writeln!(out, "  {verb} {name}");
                        self.live = Some(name);
                    }
                    return;
                }
                if self.live.as_deref() != Some(name.as_str()) {
                    self.close_live(out);
                }
                self.rewind(out);
                let _ = write!(
                    out,
                    "{} {} {}",
                    icons.active.with(colors.active),
                    fit_name(&name, width).with(colors.asset),
                    format_bar(current, total, theme.bar_width).with(colors.secondary)
                );
                self.live = Some(name);
            }
            UiEvent::Removing(name) => {
                self.close_live(out);
                let _ = writeln!(
                    out,
                    "{} {}",
                    icons.removed.with(colors.secondary),
                    fit_name(&name, width).with(colors.asset)
                );
            }
            UiEvent::Done { name, detail, size } => {
                let same_line = self.interactive && self.live.as_deref() == Some(name.as_str());
                if same_line {
                    self.rewind(out);
                    self.live = None;
                } else {
                    self.close_live(out);
                }
                let size = size.map(format_size).unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{} {} {} {}",
                    icons.success.with(colors.success),
                    fit_name(&name, width).with(colors.asset),
                    detail,
                    size.with(colors.secondary)
                );
            }
            UiEvent::Failed { name, reason } => {
                self.close_live(out);
                let _ = writeln!(
                    out,
                    "{} {} {}",
                    icons.error.with(colors.error),
                    fit_name(&name, width).with(colors.asset),
                    reason.with(colors.error)
                );
            }
            UiEvent::Info(msg) => {
                self.close_live(out);
                let _ = writeln!(out, "{} {msg}", icons.info.with(colors.secondary));
            }
            UiEvent::Success(msg) => {
                self.close_live(out);
                let _ = writeln!(
                    out,
                    "{} {}",
                    icons.success.with(colors.success),
                    msg.with(colors.success).bold()
                );
            }
            UiEvent::Warning(msg) => {
                self.close_live(out);
                let _ = writeln!(
                    out,
                    "{} {}",
                    icons.warning.with(colors.warning),
                    msg.with(colors.warning)
                );
            }
            UiEvent::Error(msg) => {
                self.close_live(out);
                let _ = writeln!(
                    out,
                    "{} {}",
                    icons.error.with(colors.error),
                    msg.with(colors.error).bold()
                );
            }
            UiEvent::Sync(ack) => {
                let _ = out.flush();
                let _ = ack.send(());
            }
            UiEvent::Shutdown => {
                self.close_live(out);
            }
        }
        let _ = out.flush();
    }
}

fn run_event_loop(receiver: &mpsc::Receiver<UiEvent>) {
    let mut renderer = Renderer::new(Theme::default());
    let stdout = std::io::stdout();

    while let Ok(event) = receiver.recv() {
        let shutdown = matches!(event, UiEvent::Shutdown);
        renderer.render(event, &mut stdout.lock());
        if shutdown {
            break;
        }
    }
}

use anyhow::Result;
use crossterm::{
    cursor,
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use futures::StreamExt;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};
use unicode_width::UnicodeWidthChar;

use crate::presentation::{ListElement, Menu, MenuAction, MenuElement};
use crate::session::{Detail, Dispatcher, QueryEvent, UiMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Searching,
    Done,
}

/// What a key press asks the host to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    Submit(String),
    /// An option picked from the menu built by query session `session`.
    Select { session: u64, action: MenuAction },
}

pub struct TuiApp {
    pub title: String,
    pub input: String,
    pub log: Vec<String>,
    pub menu: Option<Menu>,
    /// Index into the menu's selectable options.
    pub selected: usize,
    pub detail: Option<Detail>,
    pub status: Status,
    pub max_log_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RenderPlan {
    header_lines: Vec<String>,
    body_lines: Vec<String>,
    input_line: String,
}

fn truncate_display(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let mut width = 0usize;
    let mut out = String::new();
    for ch in s.chars() {
        let ch_w = ch.width().unwrap_or(0);
        if ch_w == 0 {
            out.push(ch);
            continue;
        }
        if width + ch_w > max {
            break;
        }
        out.push(ch);
        width += ch_w;
    }
    out
}

/// `focus` is a body line that must stay on screen (the selected option).
fn build_render_plan(
    title: &str,
    status: Status,
    body: &[String],
    focus: Option<usize>,
    input: &str,
    w: u16,
    h: u16,
) -> RenderPlan {
    let w_usize = w as usize;
    let status_str = match status {
        Status::Idle => "Idle",
        Status::Searching => "Searching",
        Status::Done => "Done",
    };
    let title_full = format!("{title} [{status_str}]");
    let header_lines = vec![
        truncate_display(&title_full, w_usize),
        "-".repeat(w_usize),
    ];

    let max_rows = h.saturating_sub(3) as usize;
    let start = match focus {
        Some(line) if line >= max_rows => line + 1 - max_rows,
        _ => 0,
    };
    let body_lines = body
        .iter()
        .skip(start)
        .take(max_rows)
        .map(|line| truncate_display(line.trim_end_matches('\n'), w_usize))
        .collect();

    let input_line = truncate_display(&format!("> {input}"), w_usize);

    RenderPlan {
        header_lines,
        body_lines,
        input_line,
    }
}

fn menu_lines(menu: &Menu, selected: usize) -> (Vec<String>, Option<usize>) {
    let mut lines = Vec::new();
    let mut focus = None;
    let mut option_idx = 0usize;
    for (_, element) in menu.ordered() {
        match element {
            MenuElement::Text { body, .. } => lines.extend(body.lines().map(str::to_string)),
            MenuElement::Option { label, .. } => {
                let marker = if option_idx == selected {
                    focus = Some(lines.len());
                    "> "
                } else {
                    "  "
                };
                lines.push(format!("{marker}{label}"));
                option_idx += 1;
            }
        }
    }
    (lines, focus)
}

fn detail_lines(detail: &Detail) -> Vec<String> {
    let mut lines = vec![format!("== {} ==", detail.label)];
    lines.extend(detail.markdown.lines().map(str::to_string));
    lines.push(String::new());

    let mut summary: Vec<_> = detail.summary.values().collect();
    summary.sort_by_key(|e| e.order());
    for element in summary {
        match element {
            ListElement::Link { href, .. } => lines.push(href.clone()),
            ListElement::Pair { label, value, .. } => lines.push(format!("{label}: {value}")),
            ListElement::Message { header, body, .. } => {
                lines.push(header.clone());
                lines.push(body.clone());
            }
        }
    }
    lines.push(String::new());
    lines.push("(Esc to go back)".to_string());
    lines
}

impl TuiApp {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            input: String::new(),
            log: Vec::new(),
            menu: None,
            selected: 0,
            detail: None,
            status: Status::Idle,
            max_log_lines: 200,
        }
    }

    pub fn push_log<S: Into<String>>(&mut self, s: S) {
        self.log.push(s.into());
        if self.log.len() > self.max_log_lines {
            let overflow = self.log.len() - self.max_log_lines;
            self.log.drain(0..overflow);
        }
    }

    pub fn apply_message(&mut self, msg: UiMessage) {
        match msg {
            UiMessage::Menu(menu) => {
                // A new menu replaces the old one.
                self.menu = Some(menu);
                self.selected = 0;
                self.detail = None;
            }
            UiMessage::Detail(detail) => self.detail = Some(detail),
        }
        self.status = Status::Done;
    }

    fn option_count(&self) -> usize {
        self.menu.as_ref().map(|m| m.options().len()).unwrap_or(0)
    }

    fn selected_action(&self) -> Option<(u64, MenuAction)> {
        let menu = self.menu.as_ref()?;
        let action = menu
            .options()
            .get(self.selected)
            .and_then(|(_, e)| e.action().cloned())?;
        Some((menu.session(), action))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Command::Quit)
            }
            KeyCode::Esc => {
                if self.detail.take().is_some() {
                    None
                } else {
                    Some(Command::Quit)
                }
            }
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.selected + 1 < self.option_count() {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.input);
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    if trimmed == "/quit" {
                        return Some(Command::Quit);
                    }
                    self.push_log(format!("> {trimmed}"));
                    self.status = Status::Searching;
                    return Some(Command::Submit(line));
                }
                let (session, action) = self.selected_action()?;
                if matches!(action, MenuAction::Navigate(_)) {
                    self.status = Status::Searching;
                }
                Some(Command::Select { session, action })
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                None
            }
            _ => None,
        }
    }

    fn body(&self) -> (Vec<String>, Option<usize>) {
        if let Some(detail) = &self.detail {
            return (detail_lines(detail), None);
        }
        if let Some(menu) = &self.menu {
            return menu_lines(menu, self.selected);
        }
        (self.log.clone(), None)
    }

    pub async fn run(
        &mut self,
        dispatcher: Arc<Dispatcher>,
        mut inbox_rx: UnboundedReceiver<UiMessage>,
    ) -> Result<()> {
        struct TuiGuard;
        impl Drop for TuiGuard {
            fn drop(&mut self) {
                let mut stdout = io::stdout();
                let _ = execute!(stdout, terminal::LeaveAlternateScreen, cursor::Show);
                let _ = terminal::disable_raw_mode();
            }
        }

        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
        let _guard = TuiGuard;

        let mut events = EventStream::new();
        self.draw()?;
        loop {
            tokio::select! {
                msg = inbox_rx.recv() => {
                    match msg {
                        Some(msg) => self.apply_message(msg),
                        None => break,
                    }
                }
                ev = events.next() => {
                    match ev {
                        Some(Ok(Event::Key(key))) => {
                            match self.handle_key(key) {
                                Some(Command::Quit) => break,
                                Some(Command::Submit(text)) => {
                                    dispatcher.on_query(QueryEvent::new(text));
                                }
                                Some(Command::Select { session, action }) => {
                                    dispatcher.on_select(session, action);
                                }
                                None => {}
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(error = %e, "terminal event error");
                            dispatcher.on_query(QueryEvent {
                                text: String::new(),
                                error: Some(e.to_string()),
                            });
                        }
                        None => break,
                    }
                }
            }
            self.draw()?;
        }
        info!("tui exiting");
        dispatcher.shutdown();
        Ok(())
    }

    fn draw(&self) -> Result<()> {
        let mut stdout = io::stdout();
        let (w, h) = terminal::size()?;
        let (body, focus) = self.body();
        let plan = build_render_plan(&self.title, self.status, &body, focus, &self.input, w, h);
        queue!(
            stdout,
            terminal::Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        if let Some(first) = plan.header_lines.first() {
            queue!(stdout, SetForegroundColor(Color::Cyan))?;
            write!(stdout, "\r{first}\n")?;
            queue!(stdout, ResetColor)?;
        }
        if let Some(second) = plan.header_lines.get(1) {
            queue!(stdout, SetForegroundColor(Color::DarkGrey))?;
            write!(stdout, "\r{second}\n")?;
            queue!(stdout, ResetColor)?;
        }
        for line in &plan.body_lines {
            if line.starts_with("# ") || line.starts_with("== ") {
                queue!(stdout, SetForegroundColor(Color::Yellow))?;
                write!(stdout, "\r{line}\n")?;
                queue!(stdout, ResetColor)?;
            } else if line.starts_with("> ") {
                queue!(stdout, SetForegroundColor(Color::Green))?;
                write!(stdout, "\r{line}\n")?;
                queue!(stdout, ResetColor)?;
            } else {
                write!(stdout, "\r{line}\n")?;
            }
        }
        queue!(
            stdout,
            cursor::MoveTo(0, h.saturating_sub(1)),
            terminal::Clear(ClearType::CurrentLine)
        )?;
        write!(stdout, "\r{}", plan.input_line)?;
        stdout.flush()?;
        Ok(())
    }
}

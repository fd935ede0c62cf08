use anyhow::Result;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::presentation::{ListElement, Menu, MenuAction, MenuElement};
use crate::session::{Detail, Dispatcher, QueryEvent, UiMessage};

pub fn print_help() {
    println!(
        "<text>     Search vendors\n<n>        Open option n of the current menu\n/open <n>  Same as <n>\n/menu      Show the current menu again\n/clear     Clear screen\n/help      Show help\n/quit      Quit"
    );
}

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliInput {
    Empty,
    Help,
    Clear,
    Menu,
    Quit,
    Open(usize),
    Query(String),
    Invalid(String),
}

/// Queries keep the text exactly as typed; commands are matched trimmed.
pub fn parse_line(raw: &str) -> CliInput {
    let line = raw.trim();
    if line.is_empty() {
        return CliInput::Empty;
    }
    if let Ok(n) = line.parse::<usize>() {
        return CliInput::Open(n);
    }
    match line {
        "/help" => return CliInput::Help,
        "/clear" => return CliInput::Clear,
        "/menu" => return CliInput::Menu,
        "/quit" | "/exit" => return CliInput::Quit,
        _ => {}
    }
    if let Some(rest) = line.strip_prefix("/open") {
        return match rest.trim().parse::<usize>() {
            Ok(n) => CliInput::Open(n),
            Err(_) => CliInput::Invalid("usage: /open <n>".to_string()),
        };
    }
    if line.starts_with('/') {
        return CliInput::Invalid(format!("unknown command: {line} (try /help)"));
    }
    CliInput::Query(raw.to_string())
}

/// Render a menu with 1-based option numbers; the returned actions line up
/// with those numbers.
pub fn format_menu(menu: &Menu) -> (String, Vec<MenuAction>) {
    let mut out = String::new();
    let mut actions = Vec::new();
    for (_, element) in menu.ordered() {
        match element {
            MenuElement::Text { body, .. } => {
                out.push_str(body);
                out.push('\n');
            }
            MenuElement::Option { label, action, .. } => {
                actions.push(action.clone());
                out.push_str(&format!("  [{}] {label}\n", actions.len()));
            }
        }
    }
    (out, actions)
}

pub fn format_detail(detail: &Detail) -> String {
    let mut out = format!("== {} ==\n{}\n\n", detail.label, detail.markdown);
    let mut summary: Vec<_> = detail.summary.values().collect();
    summary.sort_by_key(|e| e.order());
    for element in summary {
        match element {
            ListElement::Link { href, .. } => out.push_str(&format!("Website: {href}\n")),
            ListElement::Pair { label, value, .. } => out.push_str(&format!("{label}: {value}\n")),
            ListElement::Message { header, body, .. } => {
                out.push_str(header);
                out.push('\n');
                if !body.is_empty() {
                    out.push_str(body);
                    out.push('\n');
                }
            }
        }
    }
    out
}

/// Plain stdin/stdout host. Menus arrive on `inbox_rx` while lines are read.
pub async fn run_cli_loop(
    dispatcher: Arc<Dispatcher>,
    mut inbox_rx: UnboundedReceiver<UiMessage>,
) -> Result<()> {
    println!("vds (CLI) - type a search, or /help for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut current: Option<Menu> = None;
    let mut actions: Vec<MenuAction> = Vec::new();
    prompt();

    loop {
        tokio::select! {
            msg = inbox_rx.recv() => {
                match msg {
                    Some(UiMessage::Menu(menu)) => {
                        let (text, acts) = format_menu(&menu);
                        print!("\n{text}");
                        actions = acts;
                        current = Some(menu);
                    }
                    Some(UiMessage::Detail(detail)) => print!("\n{}", format_detail(&detail)),
                    None => break,
                }
                prompt();
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                match parse_line(&line) {
                    CliInput::Empty => {}
                    CliInput::Help => print_help(),
                    CliInput::Clear => {
                        print!("\x1B[2J\x1B[H");
                    }
                    CliInput::Menu => match &current {
                        Some(menu) => print!("{}", format_menu(menu).0),
                        None => println!("no menu yet; type a search"),
                    },
                    CliInput::Quit => break,
                    CliInput::Open(n) => {
                        let session = current.as_ref().map(Menu::session).unwrap_or_default();
                        match n.checked_sub(1).and_then(|i| actions.get(i)) {
                            Some(action) => {
                                dispatcher.on_select(session, action.clone());
                            }
                            None => eprintln!("no option {n}"),
                        }
                    }
                    CliInput::Query(text) => {
                        dispatcher.on_query(QueryEvent::new(text));
                    }
                    CliInput::Invalid(msg) => eprintln!("{msg}"),
                }
                prompt();
            }
        }
    }
    info!("cli exiting");
    dispatcher.shutdown();
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

use std::io::{self, BufRead, Write};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use treepad::command::{self, Command};
use treepad::view;
use treepad::{AppConfig, MemoryAuthority, Msg, Workspace};

/// Upper bound on waiting for in-flight saves at shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shell line, or end of input.
enum Input {
    Line(String),
    Eof,
}

fn main() -> Result<()> {
    let config = AppConfig::load()?;

    // Initialize logging to file (never stdout)
    let log_dir = AppConfig::log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, &config.logging.file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("treepad=info"));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .init();

    tracing::info!("treepad starting");

    if let Err(e) = run(config) {
        tracing::error!("treepad error: {e:?}");
        eprintln!("treepad error: {e:?}");
    }

    tracing::info!("treepad stopped");
    Ok(())
}

fn run(config: AppConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();
    let (line_tx, line_rx) = mpsc::channel::<Input>();

    let authority =
        Arc::new(MemoryAuthority::with_welcome().with_snippet_radius(config.search.snippet_radius));
    let tick = config.tick();
    let mut ws = Workspace::new(config, authority, tx.clone());

    // Input thread: stdin lines; a wake-up Tick gets the loop to look at them
    let tx_input = tx.clone();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(Input::Line(line)).is_err() || tx_input.send(Msg::Tick).is_err() {
                return;
            }
        }
        let _ = line_tx.send(Input::Eof);
        let _ = tx_input.send(Msg::Tick);
    });

    // Tick thread: periodic tick for debounce checks
    let tx_tick = tx.clone();
    thread::spawn(move || {
        loop {
            thread::sleep(tick);
            if tx_tick.send(Msg::Tick).is_err() {
                break;
            }
        }
    });

    ws.update(Msg::Initialize);
    drain_until_idle(&mut ws, &rx);
    print_screen(&mut ws)?;

    // ── Main event loop ──
    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        ws.update(first);
        while let Ok(msg) = rx.try_recv() {
            ws.update(msg);
        }

        let mut handled = false;
        while let Ok(input) = line_rx.try_recv() {
            match input {
                Input::Line(line) => {
                    handle_line(&mut ws, &line);
                    handled = true;
                }
                Input::Eof => ws.update(Msg::Quit),
            }
            if ws.should_quit {
                break;
            }
        }

        if ws.should_quit {
            break;
        }

        if handled {
            // Let the authority answer so the printout reflects it.
            drain_until_idle(&mut ws, &rx);
            print_screen(&mut ws)?;
        }
    }

    // Final save before exit
    drain_until_idle(&mut ws, &rx);
    if ws.in_flight() > 0 {
        tracing::warn!(in_flight = ws.in_flight(), "exiting with unfinished authority calls");
    }
    for note in ws.drain_notifications() {
        eprintln!("! {note}");
    }

    Ok(())
}

fn handle_line(ws: &mut Workspace, line: &str) {
    let parsed = match command::parse_command(line) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return,
        Err(err) => {
            println!("{err}");
            return;
        }
    };

    match parsed {
        Command::Dispatch(msg) => ws.update(msg),
        Command::OpenFocused(id) => ws.update(Msg::OpenNote {
            id,
            pane: ws.panes().focused(),
            focus_editor: true,
        }),
        Command::ChildOfSelection => ws.update(Msg::CreateChild(ws.selected().cloned())),
        Command::Find(query) => {
            for id in ws.filter_titles(&query) {
                println!("  {}", ws.breadcrumb(&id).join(" / "));
            }
        }
        Command::Tree => {
            for line in view::tree_lines(ws) {
                println!("{line}");
            }
        }
        Command::Status => println!("{}", view::status_line(ws)),
        Command::Help => {
            for line in command::HELP {
                println!("  {line}");
            }
        }
    }
}

/// Apply authority completions until nothing is in flight (or the grace
/// period runs out).
fn drain_until_idle(ws: &mut Workspace, rx: &mpsc::Receiver<Msg>) {
    while ws.in_flight() > 0 {
        match rx.recv_timeout(SHUTDOWN_GRACE) {
            // debounce is driven by the main loop only
            Ok(Msg::Tick) => {}
            Ok(msg) => ws.update(msg),
            Err(_) => break,
        }
    }
}

fn print_screen(ws: &mut Workspace) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out)?;
    for line in view::tree_lines(ws) {
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;
    for line in view::pane_lines(ws) {
        writeln!(out, "{line}")?;
    }
    if let Some(request) = ws.take_focus_request() {
        writeln!(out, "  (editor focus → pane {})", request.target_pane.number())?;
    }
    for line in view::editor_lines(ws) {
        writeln!(out, "  {line}")?;
    }

    if let Some(trash) = ws.trash()
        && !trash.is_empty()
    {
        writeln!(out, "trash:")?;
        for note in trash {
            writeln!(out, "  {} [{}]", note.title, note.id)?;
        }
    }
    for hit in ws.search_results() {
        writeln!(out, "  {} [{}]: {}", hit.title, hit.id, hit.snippet)?;
    }

    for note in ws.drain_notifications() {
        writeln!(out, "! {note}")?;
    }
    writeln!(out, "{}", view::status_line(ws))?;
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

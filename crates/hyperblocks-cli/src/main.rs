mod app;

use anyhow::Result;
use app::App;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use hyperblocks_config::Config;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use std::{env, io::stdout, path::PathBuf, process};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <document.md|document.json>", args[0]);
        process::exit(1);
    }

    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Fix or remove {}", Config::config_path().display());
            process::exit(1);
        }
    };
    let path = config.document_path(&PathBuf::from(&args[1]));
    log::info!("document path: {}", path.display());

    let mut app = match App::open(path.clone(), &config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: Could not open '{}': {e}", path.display());
            process::exit(1);
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let result = match key.code {
            KeyCode::Char('q') => {
                if app.is_dirty() {
                    app.save()?;
                }
                return Ok(());
            }
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            KeyCode::Char('o') => app.open_below(),
            KeyCode::Char('x') => app.remove(),
            KeyCode::Tab | KeyCode::Char('>') => app.nest(),
            KeyCode::BackTab | KeyCode::Char('<') => app.unnest(),
            KeyCode::Char('s') => app.split(),
            KeyCode::Char('h') => app.toggle_heading(),
            KeyCode::Char('l') => app.cycle_list(),
            KeyCode::Char('b') => app.toggle_bold(),
            KeyCode::Char('w') => app.save(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("command failed: {e}");
            app.status = format!("Error: {e}");
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());

    let items: Vec<ListItem> = app
        .rows
        .iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            let marker = if row.marker.is_empty() {
                String::new()
            } else {
                format!("{} ", row.marker)
            };
            ListItem::new(Line::from(vec![
                Span::raw(indent),
                Span::styled(marker, Style::default().fg(Color::Cyan)),
                Span::raw(row.label.clone()),
            ]))
        })
        .collect();

    let title = format!(
        "{}{}",
        app.path.display(),
        if app.is_dirty() { " [+]" } else { "" }
    );
    let outline = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .bg(Color::Yellow)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    state.select(Some(app.selected));
    f.render_stateful_widget(outline, chunks[0], &mut state);

    let help_text = Line::from(vec![
        Span::raw("q: Quit | j/k: Move | o: New | x: Delete | >/<: Nest | "),
        Span::raw("s: Split | h: Heading | l: List | b: Bold | w: Save"),
    ]);
    let status = Line::from(Span::styled(
        app.status.clone(),
        Style::default().fg(Color::DarkGray),
    ));

    let help = Paragraph::new(vec![help_text, status]).block(Block::default());
    f.render_widget(help, chunks[1]);
}

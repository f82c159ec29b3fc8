mod app;

use action::Action;
use app::App;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fractran::SimulatorConfig;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use std::{error::Error, fs, io, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Redraw interval while nothing is scheduled.
const IDLE_TICK: Duration = Duration::from_millis(100);

/// A FRACTRAN simulator with a Terminal User Interface.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "EXAMPLES:
  fractran-tui presets/primegame.frac
  cat presets/fibonacci.frac | fractran-tui
  RUST_LOG=debug fractran-tui --log fractran.log")]
struct Cli {
    /// Path to a FRACTRAN program file (.frac).
    /// If not provided, the application will load the built-in presets.
    /// Can also pipe program content via stdin.
    program_file: Option<String>,

    /// JSON file with simulator settings (history size, forecast limit, speed).
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Initial playback speed, 1 to 100.
    #[clap(short, long)]
    speed: Option<u32>,

    /// Write logs to this file. The terminal is owned by the interface.
    #[clap(long)]
    log: Option<PathBuf>,
}

/// Represents the state of the application loop.
#[derive(PartialEq)]
enum AppState {
    Running,
    ShouldQuit,
}

/// A wrapper around the terminal to ensure it's restored on drop.
struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl Tui {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        // Errors during drop cannot be reported anywhere useful.
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
        let _ = self.terminal.show_cursor();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(path) = &cli.log {
        let file = fs::File::create(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();

        info!("fractran-tui starting");
    }

    // Load before entering the alternate screen so errors reach stderr.
    let app = match load_config(&cli).and_then(|config| load_program(&cli, config)) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut tui = Tui::new()?;

    run_app(&mut tui.terminal, app)?;

    Ok(())
}

fn load_config(cli: &Cli) -> Result<SimulatorConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config '{}': {}", path.display(), e))?;
            serde_json::from_str(&content)
                .map_err(|e| format!("Invalid config '{}': {}", path.display(), e))?
        }
        None => SimulatorConfig::default(),
    };

    if let Some(speed) = cli.speed {
        config.initial_speed = speed;
    }

    Ok(config)
}

/// Loads a program from a file path, then from stdin, and finally falls back to the
/// built-in presets.
fn load_program(cli: &Cli, config: SimulatorConfig) -> Result<App, String> {
    if let Some(file_path) = &cli.program_file {
        fs::read_to_string(file_path)
            .map_err(|e| format!("Failed to read file '{}': {}", file_path, e))
            .and_then(|content| App::new_from_program_string(content, config))
    } else if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))
            .and_then(|_| App::new_from_program_string(buffer, config))
    } else {
        App::new_default(config)
    }
}

/// Runs the main application loop.
///
/// Input is polled until the next animation phase is due, then the elapsed wall time is
/// handed to the simulator.
fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
) -> io::Result<()> {
    let mut last = Instant::now();

    loop {
        terminal.draw(|f| app.render(f))?;

        let timeout = app
            .time_until_next_phase()
            .map_or(IDLE_TICK, |due| due.min(IDLE_TICK));

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && handle_key_event(&mut app, key) == AppState::ShouldQuit
                {
                    return Ok(());
                }
            }
        }

        let now = Instant::now();
        app.advance(now - last);
        last = now;
    }
}

/// Handles key events and updates the application state.
fn handle_key_event(app: &mut App, key: KeyEvent) -> AppState {
    if let Some(action) = app.keymap.get(&key) {
        match action {
            Action::Quit => return AppState::ShouldQuit,
            Action::Reset => app.reset_machine(),
            Action::Step => app.step_machine(),
            Action::TogglePlay => app.toggle_play(),
            Action::ToggleHelp => app.toggle_help(),
            Action::PreviousProgram => app.previous_program(),
            Action::NextProgram => app.next_program(),
            Action::ScrubBack => app.scrub_back(),
            Action::ScrubForward => app.scrub_forward(),
            Action::Faster => app.faster(),
            Action::Slower => app.slower(),
            Action::SelectUp => app.select_up(),
            Action::SelectDown => app.select_down(),
            Action::Increment => app.increment(),
            Action::Decrement => app.decrement(),
        }
    }
    AppState::Running
}

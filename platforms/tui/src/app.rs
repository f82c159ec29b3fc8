use action::Action;
use fractran::{
    AnimationPhase, FractranError, MachineState, Preset, PresetManager, ProgramLoader, Simulator,
    SimulatorConfig,
};
use keymap::{Config, KeyMapConfig};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Padding, Paragraph, Wrap},
    Frame,
};
use std::time::Duration;

const BLOCK_PADDING: Padding = Padding::new(1, 1, 0, 0);
const SPEED_STEP: u32 = 10;
const VALUE_DIGITS: usize = 48;

pub struct App {
    simulator: Simulator,
    preset: Preset,
    current_program_index: usize,
    selected_register: usize,
    message: String,
    show_help: bool,
    pub(crate) keymap: Config<Action>,
    // Indicates if the program was loaded from a file/stdin, disabling program switching
    program_loaded_from_source: bool,
}

impl App {
    pub fn new_default(config: SimulatorConfig) -> Result<Self, String> {
        let preset = PresetManager::get_preset_by_index(0).map_err(|e| e.to_string())?;
        let mut app = Self::with_preset(preset, config).map_err(|e| e.to_string())?;
        app.message = "Press 'h' for help.".to_string();
        Ok(app)
    }

    pub fn new_from_program_string(
        content: String,
        config: SimulatorConfig,
    ) -> Result<Self, String> {
        let preset = ProgramLoader::load_program_from_string(&content)
            .map_err(|e| format!("Failed to load program: {}", e))?;
        let mut app = Self::with_preset(preset, config)
            .map_err(|e| format!("Failed to load program: {}", e))?;
        app.message = "Program loaded from source. Press 'h' for help.".to_string();
        app.program_loaded_from_source = true;
        Ok(app)
    }

    fn with_preset(preset: Preset, config: SimulatorConfig) -> Result<Self, FractranError> {
        let simulator = Simulator::with_preset(config, &preset)?;

        Ok(Self {
            simulator,
            preset,
            keymap: Action::keymap_config(),
            current_program_index: 0,
            selected_register: 0,
            message: String::new(),
            show_help: false,
            program_loaded_from_source: false,
        })
    }

    pub fn render(&mut self, f: &mut Frame) {
        let inner_area = f.area().inner(Margin::new(1, 0));

        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // Program info
                Constraint::Min(0),    // Rules, registers, events
                Constraint::Length(3), // Status
            ])
            .split(inner_area);

        self.render_program_info(f, main_chunks[0]);

        let middle_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Length(1),
                Constraint::Percentage(50),
            ])
            .split(main_chunks[1]);

        let left_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(10)])
            .split(middle_chunks[0]);

        self.render_rules(f, left_chunks[0]);
        self.render_events(f, left_chunks[1]);

        let right_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // Machine state
                Constraint::Min(0),    // Registers or help
            ])
            .split(middle_chunks[2]);

        self.render_machine_state(f, right_chunks[0]);

        if self.show_help {
            self.render_help(f, right_chunks[1]);
        } else {
            self.render_registers(f, right_chunks[1]);
        }

        self.render_status(f, main_chunks[2]);
    }

    fn render_program_info(&self, f: &mut Frame, area: Rect) {
        let label = Style::default().fg(Color::Yellow);
        let root = self.simulator.history().root();

        let text = vec![
            Line::from(vec![
                Span::styled("Program: ", label),
                Span::raw(if self.program_loaded_from_source {
                    format!("{} (Custom)", self.preset.name)
                } else {
                    format!(
                        "{} ({}/{})",
                        self.preset.name,
                        self.current_program_index + 1,
                        PresetManager::count()
                    )
                }),
            ]),
            Line::from(vec![
                Span::styled("Initial: ", label),
                Span::raw(root.registers.to_string()),
                Span::styled(" | Rules: ", label),
                Span::raw(self.simulator.program().len().to_string()),
            ]),
            Line::from(vec![
                Span::styled("Forecast: ", label),
                Span::raw(self.simulator.forecast().to_string()),
            ]),
        ];

        let paragraph =
            Paragraph::new(text).block(block("FRACTRAN (TUI)").title_alignment(Alignment::Center));

        f.render_widget(paragraph, area);
    }

    fn render_rules(&self, f: &mut Frame, area: Rect) {
        let state = self.simulator.current_state();
        let animation = self.simulator.animation();
        let active = self.simulator.active_rule().map(|(index, _)| index);

        let lines: Vec<Line> = self
            .simulator
            .program()
            .iter()
            .enumerate()
            .map(|(index, fraction)| {
                let (marker, style) = if Some(index) == active {
                    let color = match animation.phase {
                        AnimationPhase::Scanning => Color::Yellow,
                        _ => Color::Green,
                    };
                    let style = Style::default()
                        .fg(Color::Black)
                        .bg(color)
                        .add_modifier(Modifier::BOLD);
                    ("▶", style)
                } else if animation.phase == AnimationPhase::Idle
                    && state.last_rule_index == Some(index)
                {
                    ("•", Style::default().fg(Color::Cyan))
                } else {
                    (" ", Style::default())
                };

                Line::from(vec![
                    Span::raw(format!("{marker} {:>2}. ", index + 1)),
                    Span::styled(format!("{:<10}", fraction.to_string()), style),
                    Span::styled(
                        format!(
                            "  {} / {}",
                            fraction.numerator_factors, fraction.denominator_factors
                        ),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])
            })
            .collect();

        let title = if state.halted { "Program (halted)" } else { "Program" };
        let paragraph = section(title, lines).wrap(Wrap { trim: false });

        f.render_widget(paragraph, area);
    }

    fn render_events(&self, f: &mut Frame, area: Rect) {
        let visible = area.height.saturating_sub(2) as usize;

        let lines: Vec<Line> = self
            .simulator
            .events()
            .iter()
            .rev()
            .take(visible)
            .map(|event| {
                Line::from(vec![
                    Span::styled(
                        format!("[{:>5}] ", event.step),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::styled(
                        format!("{:<14} ", event.kind.to_string()),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::raw(event.message.clone()),
                ])
            })
            .collect();

        f.render_widget(section("Events", lines), area);
    }

    fn render_machine_state(&self, f: &mut Frame, area: Rect) {
        let state = self.simulator.current_state();
        let history = self.simulator.history();
        let label = Style::default().fg(Color::Yellow);

        let (status_text, status_color) = status(state);

        let text = vec![
            Line::from(vec![
                Span::styled("Step: ", label),
                Span::raw(state.step.to_string()),
                Span::styled(" | Status: ", label),
                Span::styled(
                    status_text,
                    Style::default().fg(status_color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(" | Phase: ", label),
                Span::raw(self.simulator.phase().to_string()),
            ]),
            Line::from(vec![
                Span::styled("Value: ", label),
                Span::raw(abbreviate(&self.simulator.value().to_string())),
            ]),
            Line::from(vec![
                Span::styled("History: ", label),
                Span::raw(format!(
                    "{}/{} (capacity {}, evicted {})",
                    history.cursor() + 1,
                    history.len(),
                    history.capacity(),
                    history.offset()
                )),
            ]),
        ];

        f.render_widget(section("Machine State", text), area);
    }

    fn render_registers(&self, f: &mut Frame, area: Rect) {
        let registers = &self.simulator.current_state().registers;
        let phase = self.simulator.phase();
        let active = self.simulator.active_rule().map(|(_, fraction)| fraction);
        let selected = self.selected_prime();

        let lines: Vec<Line> = self
            .simulator
            .used_primes()
            .into_iter()
            .map(|prime| {
                let exponent = registers.get(prime);

                // Highlight the registers the current phase is touching
                let touched = active.is_some_and(|fraction| match phase {
                    AnimationPhase::Consuming => fraction.denominator_factors.get(prime) > 0,
                    AnimationPhase::Producing => fraction.numerator_factors.get(prime) > 0,
                    _ => false,
                });
                let bar_style = match (touched, phase) {
                    (true, AnimationPhase::Consuming) => Style::default().fg(Color::Red),
                    (true, _) => Style::default().fg(Color::Green),
                    _ => Style::default().fg(Color::Blue),
                };

                let name_style = if Some(prime) == selected {
                    Style::default().fg(Color::Black).bg(Color::Yellow)
                } else {
                    Style::default().fg(Color::Yellow)
                };
                let lock = if self.simulator.is_editable(prime) { "✎" } else { " " };

                Line::from(vec![
                    Span::styled(format!("{prime:>4}"), name_style),
                    Span::raw(format!(" {lock} {exponent:>4} ")),
                    Span::styled("█".repeat((exponent as usize).min(40)), bar_style),
                ])
            })
            .collect();

        f.render_widget(section("Registers", lines), area);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let help_text = vec![
            Line::from("Controls:"),
            Line::from("  Space - Step forward"),
            Line::from("  p - Play / pause"),
            Line::from("  f / s - Faster / slower"),
            Line::from("  b / n - Scrub back / forward"),
            Line::from("  r - Reset to the initial registers"),
            Line::from("  ↑ ↓ - Select an editable register (✎)"),
            Line::from("  i / d - Increment / decrement it (step 0 only)"),
            Line::from(if self.program_loaded_from_source {
                "  ← → - Program switching disabled (loaded from file/stdin)"
            } else {
                "  ← → - Switch programs"
            }),
            Line::from("  h - Toggle this help"),
            Line::from("  q - Quit"),
            Line::from(""),
            Line::from(format!(
                "Speeds above {} skip the animated phases.",
                self.simulator.config().instant_threshold
            )),
        ];

        f.render_widget(section("Help", help_text), area);
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let repo = "@rezigned/fractran";
        let outer = block("Status");
        let inner = outer.inner(area);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Fill(1), Constraint::Length(repo.len() as u16)])
            .split(inner);

        let play_status = if self.simulator.is_playing() { "ON" } else { "OFF" };
        let status = Line::from(vec![
            Span::raw("Playing: "),
            Span::styled(play_status, Style::default().fg(Color::Yellow)),
            Span::raw(" | Speed: "),
            Span::styled(
                self.simulator.speed().to_string(),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(format!(" | {}", self.message)),
        ]);

        let social = Text::from(
            Line::from(Span::styled(repo, Style::default().fg(Color::Yellow))).right_aligned(),
        );

        f.render_widget(outer, area);
        f.render_widget(status, chunks[0]);
        f.render_widget(social, chunks[1]);
    }

    pub fn step_machine(&mut self) {
        let state = self.simulator.step();

        self.message = if state.halted {
            "Machine is halted. Press 'r' to reset.".to_string()
        } else {
            format!("Step {} completed", state.step)
        };
    }

    pub fn reset_machine(&mut self) {
        self.simulator.reset();
        self.message = "Machine reset".to_string();
    }

    pub fn toggle_play(&mut self) {
        self.simulator.toggle_playing();
        self.message = if self.simulator.is_playing() {
            "Playback started".to_string()
        } else if self.simulator.current_state().halted {
            "Machine is halted. Press 'r' to reset.".to_string()
        } else {
            "Playback paused".to_string()
        };
    }

    pub fn is_playing(&self) -> bool {
        self.simulator.is_playing()
    }

    /// Feeds elapsed wall time to the simulator.
    pub fn advance(&mut self, elapsed: Duration) {
        let was_playing = self.simulator.is_playing();

        if self.simulator.advance(elapsed) > 0 && was_playing && !self.simulator.is_playing() {
            self.message = "Machine halted".to_string();
        }
    }

    pub fn time_until_next_phase(&self) -> Option<Duration> {
        self.simulator.time_until_next_phase()
    }

    pub fn faster(&mut self) {
        self.simulator
            .set_speed(self.simulator.speed().saturating_add(SPEED_STEP));
        self.message = format!("Speed {}", self.simulator.speed());
    }

    pub fn slower(&mut self) {
        self.simulator
            .set_speed(self.simulator.speed().saturating_sub(SPEED_STEP));
        self.message = format!("Speed {}", self.simulator.speed());
    }

    pub fn scrub_back(&mut self) {
        let cursor = self.simulator.history_index().saturating_sub(1);
        self.simulator.scrub(cursor);
        self.message = format!("Viewing step {}", self.simulator.current_state().step);
    }

    pub fn scrub_forward(&mut self) {
        let cursor = self.simulator.history_index() + 1;
        self.simulator.scrub(cursor);
        self.message = format!("Viewing step {}", self.simulator.current_state().step);
    }

    fn selected_prime(&self) -> Option<u64> {
        self.simulator.editable_primes().nth(self.selected_register)
    }

    pub fn select_up(&mut self) {
        self.selected_register = self.selected_register.saturating_sub(1);
    }

    pub fn select_down(&mut self) {
        let count = self.simulator.editable_primes().count();
        if self.selected_register + 1 < count {
            self.selected_register += 1;
        }
    }

    pub fn increment(&mut self) {
        self.edit_selected(1);
    }

    pub fn decrement(&mut self) {
        self.edit_selected(-1);
    }

    fn edit_selected(&mut self, delta: i64) {
        let Some(prime) = self.selected_prime() else {
            self.message = "This program has no editable registers.".to_string();
            return;
        };

        self.message = match self.simulator.edit_register(prime, delta) {
            Ok(()) => format!(
                "Register {prime} set to {}",
                self.simulator.current_state().registers.get(prime)
            ),
            Err(e) => format!("Cannot edit: {e}"),
        };
    }

    pub fn next_program(&mut self) {
        if self.program_loaded_from_source {
            self.message = "Cannot switch programs when loaded from file/stdin.".to_string();
            return;
        }
        let count = PresetManager::count();
        if count == 0 {
            return;
        }
        self.current_program_index = (self.current_program_index + 1) % count;
        self.load_current_program();
    }

    pub fn previous_program(&mut self) {
        if self.program_loaded_from_source {
            self.message = "Cannot switch programs when loaded from file/stdin.".to_string();
            return;
        }
        let count = PresetManager::count();
        if count == 0 {
            return;
        }
        self.current_program_index = if self.current_program_index == 0 {
            count - 1
        } else {
            self.current_program_index - 1
        };
        self.load_current_program();
    }

    fn load_current_program(&mut self) {
        let loaded = PresetManager::get_preset_by_index(self.current_program_index)
            .and_then(|preset| self.simulator.load_preset(&preset).map(|_| preset));

        self.message = match loaded {
            Ok(preset) => {
                let message = format!("Loaded program: {}", preset.name);
                self.preset = preset;
                self.selected_register = 0;
                message
            }
            Err(e) => format!("Failed to load program: {e}"),
        };
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }
}

fn status(state: &MachineState) -> (&'static str, Color) {
    if state.halted {
        ("HALTED", Color::Red)
    } else if state.step == 0 {
        ("READY", Color::Blue)
    } else {
        ("RUNNING", Color::Green)
    }
}

/// Shortens long decimal values to their leading digits and a digit count.
fn abbreviate(digits: &str) -> String {
    if digits.len() <= VALUE_DIGITS {
        digits.to_string()
    } else {
        format!("{}… ({} digits)", &digits[..VALUE_DIGITS], digits.len())
    }
}

fn section<'a>(title: &'a str, content: Vec<Line<'a>>) -> Paragraph<'a> {
    Paragraph::new(content).block(block(title))
}

fn block(title: &str) -> Block {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(format!(" {title} "))
        .padding(BLOCK_PADDING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("243"), "243");

        let long = "9".repeat(100);
        assert_eq!(abbreviate(&long), format!("{}… (100 digits)", "9".repeat(VALUE_DIGITS)));
    }

    #[test]
    fn test_editing_and_switching() {
        let mut app = App::new_default(SimulatorConfig::default()).unwrap();

        // Multiplication has editable registers 2 and 3
        app.next_program();
        app.next_program();
        assert_eq!(app.preset.name, "Multiplication");

        app.select_down();
        app.increment();
        assert_eq!(app.simulator.current_state().registers.get(3), 5);

        app.step_machine();
        app.decrement();
        assert!(app.message.starts_with("Cannot edit"));

        app.scrub_back();
        app.decrement();
        assert_eq!(app.simulator.current_state().registers.get(3), 4);
    }

    #[test]
    fn test_program_string_disables_switching() {
        let mut app = App::new_from_program_string(
            "name: Custom\nprogram: 3/2".to_string(),
            SimulatorConfig::default(),
        )
        .unwrap();

        app.next_program();
        assert_eq!(app.preset.name, "Custom");
        assert!(app.message.starts_with("Cannot switch"));
    }

    #[test]
    fn test_playback_reaches_halt() {
        let mut app = App::new_from_program_string(
            "name: Addition\nprogram: 3/2\nregisters: 2^3".to_string(),
            SimulatorConfig::default(),
        )
        .unwrap();

        app.toggle_play();
        for _ in 0..1000 {
            app.advance(Duration::from_millis(50));
        }

        assert!(!app.is_playing());
        assert!(app.simulator.current_state().halted);
        assert_eq!(app.message, "Machine halted");
    }
}

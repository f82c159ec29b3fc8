use clap::Parser;
use fractran::{
    FractranError, LoadOptions, PresetManager, PrimeExponentMap, ProgramLoader, Simulator,
    SimulatorConfig,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{fs, io, process};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
#[clap(after_help = "EXAMPLES:
  fractran-cli --preset primegame --max-steps 2000
  fractran-cli --fractions 3/2 --registers 2^3,3^2 --debug
  fractran-cli --program presets/multiplication.frac --forecast
  cat presets/fibonacci.frac | fractran-cli --program -")]
struct Cli {
    /// The FRACTRAN program file to execute, or '-' for stdin
    #[clap(short, long, conflicts_with_all = ["preset", "fractions"])]
    program: Option<String>,

    /// Name of a built-in program
    #[clap(long, conflicts_with = "fractions")]
    preset: Option<String>,

    /// Comma-separated fractions, e.g. "3/2,5/3"
    #[clap(short, long, value_delimiter = ',')]
    fractions: Vec<String>,

    /// Initial value, factored into registers
    #[clap(short, long, conflicts_with = "registers")]
    input: Option<u64>,

    /// Initial registers as prime powers, e.g. "2^3,3^2"
    #[clap(short, long, value_delimiter = ',')]
    registers: Vec<String>,

    /// JSON file with simulator settings
    #[clap(long)]
    config: Option<PathBuf>,

    /// Stop after this many steps if the program has not halted
    #[clap(short, long, default_value_t = 10_000)]
    max_steps: u64,

    /// Print each step of the execution
    #[clap(short = 'd', long)]
    debug: bool,

    /// Only print the halting forecast for the initial registers
    #[clap(long)]
    forecast: bool,

    /// List the built-in programs and exit
    #[clap(long)]
    list: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("{e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), FractranError> {
    if cli.list {
        for (index, name) in PresetManager::list_preset_names().iter().enumerate() {
            let info = PresetManager::get_preset_info(index)?;
            println!("{name:<16} {}", info.description);
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let mut simulator = Simulator::new(config);
    load(cli, &mut simulator)?;

    let root = simulator.current_state().clone();
    info!(registers = %root.registers, value = %simulator.value(), "starting");

    if cli.forecast {
        println!("{}", simulator.forecast());
        return Ok(());
    }

    let print_state = |simulator: &Simulator| {
        let state = simulator.current_state();
        let rule = state
            .last_rule_index
            .and_then(|i| simulator.program().get(i))
            .map_or_else(|| "-".to_string(), ToString::to_string);

        println!(
            "Step: {}, Rule: {}, Registers: {}, Value: {}",
            state.step,
            rule,
            state.registers,
            simulator.value()
        );
    };

    if cli.debug {
        print_state(&simulator);
    }

    while simulator.current_state().step < cli.max_steps {
        let halted = simulator.step().halted;

        if halted {
            break;
        }
        if cli.debug {
            print_state(&simulator);
        }
    }

    let state = simulator.current_state();
    if state.halted {
        println!("\nHalted after {} steps.", state.step);
    } else {
        println!("\nStill running after {} steps.", state.step);
    }

    for event in simulator.events().iter().skip(1) {
        println!("[{}] {}", event.step, event.message);
    }

    println!("{}", state.registers);
    println!("{}", simulator.value());

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SimulatorConfig, FractranError> {
    let Some(path) = path else {
        return Ok(SimulatorConfig::default());
    };

    let content = fs::read_to_string(path).map_err(|e| {
        FractranError::FileError(format!("Failed to read config {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        FractranError::ValidationError(format!("Invalid config {}: {}", path.display(), e))
    })
}

/// Loads the program named on the command line. Explicit registers or input override
/// whatever the program file declares.
fn load(cli: &Cli, simulator: &mut Simulator) -> Result<(), FractranError> {
    let registers = initial_registers(cli)?;

    if !cli.fractions.is_empty() {
        return simulator.load(
            cli.fractions.as_slice(),
            registers.unwrap_or_default(),
            LoadOptions::default(),
        );
    }

    let mut preset = match (&cli.program, &cli.preset) {
        (Some(path), _) if path == "-" => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| FractranError::FileError(format!("Failed to read stdin: {}", e)))?;
            ProgramLoader::load_program_from_string(&buffer)?
        }
        (Some(path), _) => ProgramLoader::load_program(Path::new(path))?,
        (None, Some(name)) => PresetManager::get_preset_by_name(name)?,
        (None, None) => {
            return Err(FractranError::ValidationError(
                "One of --program, --preset or --fractions is required".to_string(),
            ))
        }
    };

    if let Some(registers) = registers {
        preset.registers = registers;
    }

    simulator.load_preset(&preset)
}

fn initial_registers(cli: &Cli) -> Result<Option<PrimeExponentMap>, FractranError> {
    if let Some(input) = cli.input {
        if input == 0 {
            return Err(FractranError::ValidationError(
                "Input must be a positive integer".to_string(),
            ));
        }
        return Ok(Some(PrimeExponentMap::factorize(input)));
    }

    if cli.registers.is_empty() {
        return Ok(None);
    }

    let pairs = cli
        .registers
        .iter()
        .map(|term| parse_power(term.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    PrimeExponentMap::try_from_pairs(pairs).map(Some)
}

/// Parses `p` or `p^e`.
fn parse_power(term: &str) -> Result<(u64, u32), FractranError> {
    let invalid = || FractranError::ValidationError(format!("Invalid register '{term}'"));

    match term.split_once('^') {
        Some((prime, exponent)) => Ok((
            prime.trim().parse().map_err(|_| invalid())?,
            exponent.trim().parse().map_err(|_| invalid())?,
        )),
        None => Ok((term.parse().map_err(|_| invalid())?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_power() {
        assert_eq!(parse_power("2^3").unwrap(), (2, 3));
        assert_eq!(parse_power("7").unwrap(), (7, 1));
        assert!(parse_power("2^x").is_err());
        assert!(parse_power("").is_err());
    }

    #[test]
    fn test_registers_override_preset() {
        let cli = Cli::parse_from([
            "fractran-cli",
            "--preset",
            "addition",
            "--registers",
            "2^1,3^1",
        ]);
        let mut simulator = Simulator::default();

        load(&cli, &mut simulator).unwrap();
        assert_eq!(simulator.current_state().registers.get(2), 1);
        assert_eq!(simulator.current_state().registers.get(3), 1);
    }

    #[test]
    fn test_fractions_with_input() {
        let cli = Cli::parse_from(["fractran-cli", "--fractions", "1/15", "--input", "225"]);
        let mut simulator = Simulator::default();

        load(&cli, &mut simulator).unwrap();
        assert_eq!(simulator.program().sources(), vec!["1/15"]);
        assert_eq!(simulator.forecast().halt_step(), Some(2));
    }

    #[test]
    fn test_malformed_fractions_fail() {
        let cli = Cli::parse_from(["fractran-cli", "--fractions", "3/x"]);
        let mut simulator = Simulator::default();

        assert!(matches!(
            load(&cli, &mut simulator),
            Err(FractranError::ParseError(_))
        ));
    }
}

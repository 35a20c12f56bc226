//! termpal - inspect and exercise the attached terminal
//!
//! Shows what the capability layer resolved for the current terminal and
//! lets you try colors, cursor queries and key recognition interactively.
//!
//! # Quick Start
//!
//! ```text
//! termpal              # Capability summary
//! termpal --colors     # 16-color chart
//! termpal --keys       # Echo recognized keys (Esc or q to quit)
//! termpal -t screen    # Pretend TERM=screen
//! ```

use std::env;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use termpal::{ColorChannel, Config, Console, ConsoleColor, ConsoleKey, KeyInfo, Modifiers};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often the key loop checks for breaks while idle
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Info,
    Colors,
    Keys,
}

/// Command line options
struct Options {
    mode: Mode,
    term: Option<String>,
    debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: Mode::Info,
            term: None,
            debug: false,
        }
    }
}

fn print_version() {
    eprintln!("termpal {}", VERSION);
}

fn print_help() {
    eprintln!("termpal {} - terminfo-driven console control", VERSION);
    eprintln!();
    eprintln!("Usage: termpal [OPTIONS]");
    eprintln!();
    eprintln!("Mode options:");
    eprintln!("  -i, --info            Show resolved capabilities (default)");
    eprintln!("  -c, --colors          Show the 16-color chart");
    eprintln!("  -k, --keys            Echo recognized keys until Esc or q");
    eprintln!();
    eprintln!("Terminal options:");
    eprintln!("  -t, --term <TERM>     Terminal type (overrides config and $TERM)");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -d, --debug           Debug logging");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.termpal/config.toml");
    eprintln!("Log file:      ~/.termpal/termpal.log");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-i" | "--info" => options.mode = Mode::Info,
            "-c" | "--colors" => options.mode = Mode::Colors,
            "-k" | "--keys" => options.mode = Mode::Keys,
            "-t" | "--term" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing terminal type".to_string());
                }
                options.term = Some(args[i].clone());
            }
            "-d" | "--debug" => options.debug = true,
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging(level: &str) {
    let log_path = Config::log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load();
    if options.term.is_some() {
        config.term = options.term.clone();
    }
    init_logging(if options.debug { "debug" } else { config.log_level.as_str() });
    info!("termpal {} starting ({:?} mode)", VERSION, options.mode);

    #[cfg(not(unix))]
    {
        eprintln!("termpal currently only supports Unix terminals.");
        return Ok(());
    }

    #[cfg(unix)]
    {
        let console = Console::open(&config);
        match options.mode {
            Mode::Info => show_info(&console)?,
            Mode::Colors => show_colors(&console)?,
            Mode::Keys => show_keys(&console)?,
        }
    }

    info!("termpal exiting");
    Ok(())
}

fn show_info(console: &Console) -> anyhow::Result<()> {
    let caps = console.capabilities();
    let flag = |present: bool| if present { "yes" } else { "no" };

    let mut out = String::new();
    out.push_str(&format!("Terminal:          {}\n", caps.term));
    out.push_str(&format!("Colors:            {}\n", caps.max_colors));
    match (console.window_width(), console.window_height()) {
        (Ok(w), Ok(h)) => out.push_str(&format!("Window:            {}x{}\n", w, h)),
        _ => out.push_str("Window:            unknown\n"),
    }
    out.push_str(&format!("Key sequences:     {}\n", caps.key_table.len()));
    out.push_str(&format!("Cursor addressing: {}\n", flag(caps.cursor_address.is_some())));
    out.push_str(&format!("Position reports:  {}\n", flag(caps.cursor_position_request.is_some())));
    out.push_str(&format!("Title:             {}\n", flag(caps.title.is_some())));
    out.push_str(&format!(
        "Redirected:        input {}, output {}\n",
        flag(console.is_input_redirected()),
        flag(console.is_output_redirected())
    ));
    console.write(&out)?;

    if !console.is_input_redirected() && !console.is_output_redirected() {
        let (left, top) = console.cursor_position()?;
        console.write(&format!("Cursor position:   column {}, row {}\n", left, top))?;
    }
    Ok(())
}

fn show_colors(console: &Console) -> anyhow::Result<()> {
    console.set_title("termpal colors")?;
    for background in [None, Some(ConsoleColor::Black), Some(ConsoleColor::White)] {
        console.set_color(ColorChannel::Background, background)?;
        for color in ConsoleColor::ALL {
            console.set_foreground_color(color)?;
            console.write(&format!(" {:>2} ", color.index()))?;
        }
        console.reset_color()?;
        console.write("\n")?;
    }
    Ok(())
}

#[cfg(unix)]
fn show_keys(console: &Console) -> anyhow::Result<()> {
    let breaks = termpal::BreakSignal::register()?;
    console.write("Press keys to see how they are recognized; Esc or q quits.\r\n")?;
    console.set_cursor_visible(false)?;

    let result = key_loop(console, &breaks);

    console.set_cursor_visible(true)?;
    result
}

#[cfg(unix)]
fn key_loop(console: &Console, breaks: &termpal::BreakSignal) -> anyhow::Result<()> {
    let _raw = console.raw_mode()?;
    loop {
        if breaks.take() {
            info!("Break received");
            return Ok(());
        }
        if !console.key_available()? {
            std::thread::sleep(KEY_POLL_INTERVAL);
            continue;
        }

        let key = console.read_key(true)?;
        console.write(&format!("{}\r\n", describe_key(&key)))?;
        if is_quit(&key) {
            return Ok(());
        }
    }
}

fn is_quit(key: &KeyInfo) -> bool {
    match key.key {
        ConsoleKey::Escape => true,
        ConsoleKey::Char('q') => key.modifiers.is_empty(),
        ConsoleKey::Char('c') => key.modifiers == Modifiers::CTRL,
        _ => false,
    }
}

fn describe_key(key: &KeyInfo) -> String {
    let mut name = String::new();
    for (flag, label) in [
        (Modifiers::CTRL, "Ctrl+"),
        (Modifiers::ALT, "Alt+"),
        (Modifiers::SHIFT, "Shift+"),
    ] {
        if key.modifiers.contains(flag) {
            name.push_str(label);
        }
    }
    match key.key {
        ConsoleKey::F(n) => name.push_str(&format!("F{}", n)),
        ConsoleKey::Char(c) if c.is_control() => name.push_str(&format!("{:?}", c)),
        ConsoleKey::Char(c) => name.push(c),
        other => name.push_str(&format!("{:?}", other)),
    }
    name
}

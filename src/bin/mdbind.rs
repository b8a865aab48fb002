// MouseDirectionBinder CLI
// Terminal collaborator: settings, notifications and access grants

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use mdbind_core::engine::Engine;
use mdbind_core::event::EvdevSource;
use mdbind_core::input::{is_keyboard, is_pointer};
use mdbind_core::output::MemorySink;
use mdbind_core::settings::{default_settings_content, Settings};
use mdbind_core::{ErrorReport, Key, Notification};

/// How access requests for restricted devices are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GrantPolicy {
    /// Prompt on the terminal
    Ask,
    /// Run pkexec without prompting
    Always,
    /// Deny every request
    Never,
}

/// Hold a key and move the mouse sideways to press A or D
#[derive(Parser, Debug)]
#[command(name = "mdbind")]
#[command(version)]
#[command(about = "Turns horizontal mouse motion into A/D key presses", long_about = None)]
struct Args {
    /// Settings file (default: ~/.config/mdbind/settings.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Activation key name or code, overriding the settings file
    #[arg(short = 'k', long, value_name = "KEY")]
    activation_key: Option<Key>,

    /// Enable the randomizer with a MIN-MAX percent range
    #[arg(long, value_name = "MIN-MAX", value_parser = parse_range, conflicts_with = "no_randomizer")]
    randomizer: Option<(i32, i32)>,

    /// Disable the randomizer
    #[arg(long)]
    no_randomizer: bool,

    /// Log synthesized keys instead of creating a virtual keyboard
    #[arg(long)]
    dry_run: bool,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// List named activation keys and exit
    #[arg(long)]
    list_keys: bool,

    /// Answer device access requests
    #[arg(long, value_enum, default_value_t = GrantPolicy::Ask)]
    grant: GrantPolicy,

    /// Write a commented settings file and exit
    #[arg(long)]
    write_default_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_range(value: &str) -> Result<(i32, i32), String> {
    let (min, max) = value
        .split_once('-')
        .ok_or_else(|| format!("expected MIN-MAX, got '{}'", value))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid percent '{}': {}", part, e))
    };
    Ok((parse(min)?, parse(max)?))
}

/// Main application state
struct Application {
    args: Args,
    settings: Settings,
}

impl Application {
    fn new(args: Args) -> Result<Self> {
        let mut settings = match &args.config {
            Some(path) => Settings::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Settings::load_default().context("loading default settings")?,
        };

        if let Some(key) = args.activation_key {
            settings.activation_key = key;
        }
        if let Some((min, max)) = args.randomizer {
            settings.randomizer_enabled = true;
            settings.randomizer_minimum = min.clamp(0, 100);
            settings.randomizer_maximum = max.clamp(0, 100);
        }
        if args.no_randomizer {
            settings.randomizer_enabled = false;
        }

        Ok(Self { args, settings })
    }

    /// List available input devices
    fn list_devices() {
        let devices = EvdevSource::list_devices();
        println!("Found {} input device(s):", devices.len());
        for device in &devices {
            let mut kinds = Vec::new();
            if is_pointer(&device.capabilities) {
                kinds.push("pointer");
            }
            if is_keyboard(&device.capabilities) {
                kinds.push("keyboard");
            }
            let path = device
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "  {}: {} [{}]",
                path,
                device.descriptor,
                if kinds.is_empty() { "-".to_string() } else { kinds.join(", ") }
            );
        }
    }

    /// Print every named key; other codes work when a device reports them.
    fn list_keys() {
        println!("Named keys (raw codes are also accepted):");
        for name in Key::known_names() {
            println!("  {}", name);
        }
    }

    fn run(&self) -> Result<()> {
        let options = self.settings.engine_options();
        log::debug!("Engine options: {:?}", options);

        let (engine, notifications) = if self.args.dry_run {
            Engine::start(EvdevSource::new, || Ok(MemorySink::new()), options)?
        } else {
            Engine::spawn_default(options)?
        };

        // Set up signal handler for graceful shutdown
        {
            use signal_hook::consts::{SIGINT, SIGTERM};
            use signal_hook::iterator::Signals;

            let stop = engine.stop_handle();
            let mut signals =
                Signals::new([SIGINT, SIGTERM]).context("installing signal handlers")?;
            std::thread::spawn(move || {
                if signals.forever().next().is_some() {
                    println!("\nReceived signal, shutting down gracefully...");
                    stop.stop();
                }
            });
        }

        println!(
            "Hold {} and move the mouse sideways. Press Ctrl+C to exit.",
            self.settings.activation_key
        );

        let mut fatal: Option<ErrorReport> = None;
        for notification in notifications.iter() {
            match notification {
                Notification::Status(status) => println!("{}", status),
                Notification::Error(report) => {
                    eprintln!("Error: {}", report);
                    if report.is_fatal() {
                        fatal = Some(report);
                    }
                }
                Notification::DevicesDetected { pointer, keyboard } => {
                    println!("Pointer: {}", display_or_none(&pointer));
                    println!("Keyboard: {}", display_or_none(&keyboard));
                }
                Notification::AccessRequested { path } => {
                    let granted = self.answer_access_request(&path);
                    engine.deliver_access_confirmation(granted);
                }
                Notification::Stopped => break,
            }
        }
        engine.join();

        match fatal {
            Some(report) => bail!("{}", report),
            None => Ok(()),
        }
    }

    fn answer_access_request(&self, path: &Path) -> bool {
        let approved = match self.args.grant {
            GrantPolicy::Never => false,
            GrantPolicy::Always => true,
            GrantPolicy::Ask => prompt(&format!(
                "{} cannot be opened. Grant access with pkexec? [y/N] ",
                path.display()
            )),
        };
        if !approved {
            log::info!("Access to {} not granted", path.display());
            return false;
        }

        match grant_access(path) {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Could not grant access to {}: {:#}", path.display(), e);
                false
            }
        }
    }
}

fn display_or_none(descriptor: &str) -> &str {
    if descriptor.is_empty() {
        "none detected"
    } else {
        descriptor
    }
}

fn prompt(question: &str) -> bool {
    print!("{}", question);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn current_user() -> Option<String> {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|user| !user.trim().is_empty())
}

/// Give the current user read/write access to `path` through polkit.
fn grant_access(path: &Path) -> Result<()> {
    let user = current_user().context("cannot determine the user name")?;
    let output = Command::new("pkexec")
        .arg("setfacl")
        .arg("-m")
        .arg(format!("u:{}:rw", user))
        .arg(path)
        .output()
        .context("failed to run pkexec (is polkit installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.trim().is_empty() {
            bail!("the request was cancelled or refused");
        }
        bail!("{}", stderr.trim());
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Handle list-devices flag (doesn't require settings)
    if args.list_devices {
        Application::list_devices();
        return Ok(());
    }

    if args.list_keys {
        Application::list_keys();
        return Ok(());
    }

    if args.write_default_config {
        let path = match args.config.clone().or_else(Settings::default_path) {
            Some(path) => path,
            None => bail!("cannot determine the configuration directory"),
        };
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, default_settings_content())?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let app = Application::new(args)?;
    app.run()
}

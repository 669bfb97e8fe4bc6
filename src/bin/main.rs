use std::{
    error::Error,
    io::{self, IsTerminal},
    sync::mpsc::Receiver,
    thread::{self, JoinHandle},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rathena_monitor::{
    classify::ServerRole,
    cli::{Cli, Commands, parse_args},
    config::{Config, load_config},
    display::{ConsoleRenderer, Palette},
    error::MonitorError,
    kill::{KillReport, kill_by_name},
    metrics::MetricsAggregator,
    registry::SupervisorRegistry,
    supervisor::{MonitorEvent, ProcessSupervisor},
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    match args.command {
        Commands::Start {
            config,
            roles,
            json,
            no_color,
        } => start(config.as_deref(), &roles, json, no_color)?,
        Commands::Run {
            executable,
            config,
            no_color,
            args,
        } => {
            let code = run_single(&executable, args, config.as_deref(), no_color)?;
            std::process::exit(code);
        }
        Commands::Kill { name, role, config } => {
            let target = match (name, role) {
                (Some(name), _) => name,
                (None, role) => {
                    let role = role.ok_or("either a name or --role is required")?;
                    let config = load_config(config.as_deref())?;
                    config
                        .server(role)
                        .map(|entry| entry.path().to_string())
                        .ok_or(MonitorError::RoleNotConfigured(role))?
                }
            };
            report_kill(&kill_by_name(&target));
        }
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn start(
    config_path: Option<&str>,
    roles: &[ServerRole],
    json: bool,
    no_color: bool,
) -> Result<(), Box<dyn Error>> {
    let config = load_config(config_path)?;
    if let Some(missing) = roles.iter().find(|role| config.server(**role).is_none()) {
        return Err(MonitorError::RoleNotConfigured(*missing).into());
    }
    let palette = Palette::from_config(&config.colors)?;
    let metrics = MetricsAggregator::new();

    register_signal_handler(&config)?;

    let (mut registry, events) = SupervisorRegistry::new(config, metrics.clone());
    let started = if roles.is_empty() {
        registry.start_all()
    } else {
        let mut started = Vec::new();
        for role in roles {
            registry.start(*role)?;
            started.push(*role);
        }
        started
    };

    if started.is_empty() {
        warn!("No servers configured; nothing to supervise");
        return Ok(());
    }

    let renderer = spawn_renderer(events, palette, use_color(no_color));
    let results = registry.wait_all();
    drop(registry);
    if renderer.join().is_err() {
        error!("Console renderer panicked");
    }

    for (role, result) in &results {
        if !result.success() {
            warn!("{} finished with exit code {:?}", role.label(), result.exit_code);
        }
    }

    let snapshot = metrics.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        ConsoleRenderer::new(io::stdout(), Palette::default(), false)
            .render_summary(&snapshot)?;
    }

    Ok(())
}

fn run_single(
    executable: &str,
    args: Vec<String>,
    config_path: Option<&str>,
    no_color: bool,
) -> Result<i32, Box<dyn Error>> {
    let config = match config_path {
        Some(path) => load_config(Some(path))?,
        None => load_config(None).unwrap_or_else(|err| {
            info!("Running without configuration: {err}");
            Config::default()
        }),
    };
    let palette = Palette::from_config(&config.colors)?;
    let color = use_color(no_color);

    let (tx, events) = std::sync::mpsc::channel();
    let renderer = spawn_renderer(events, palette.clone(), color);

    let mut supervisor =
        ProcessSupervisor::new(executable, config.role_map(), MetricsAggregator::new())
            .args(args)
            .events(tx);
    let result = supervisor.run();
    drop(supervisor);
    if renderer.join().is_err() {
        error!("Console renderer panicked");
    }

    ConsoleRenderer::new(io::stdout(), palette, color).render_result(&result)?;
    Ok(result.exit_code.unwrap_or(1))
}

fn spawn_renderer(
    events: Receiver<MonitorEvent>,
    palette: Palette,
    color: bool,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut renderer = ConsoleRenderer::new(io::stdout(), palette, color);
        for event in events {
            if let Err(err) = renderer.render(&event) {
                error!("Failed to render console output: {err}");
                return;
            }
        }
    })
}

fn use_color(no_color: bool) -> bool {
    !no_color && io::stdout().is_terminal()
}

fn report_kill(report: &KillReport) {
    if report.killed.is_empty() && report.failures.is_empty() {
        println!("No running process matches '{}'", report.pattern);
        return;
    }

    for pid in &report.killed {
        println!("Killed PID {pid} ('{}')", report.pattern);
    }
    for failure in &report.failures {
        eprintln!(
            "Failed to kill '{}' (PID {}): {}",
            failure.name, failure.pid, failure.reason
        );
    }
}

/// On Ctrl-C, kill the configured servers; their supervisors then drain and report
/// normally.
fn register_signal_handler(config: &Config) -> Result<(), Box<dyn Error>> {
    let targets: Vec<String> = config
        .configured_roles()
        .into_iter()
        .filter_map(|role| config.server(role).map(|entry| entry.path().to_string()))
        .collect();

    ctrlc::set_handler(move || {
        eprintln!("ramon is shutting down... stopping servers");
        for target in &targets {
            report_kill(&kill_by_name(target));
        }
    })?;

    Ok(())
}

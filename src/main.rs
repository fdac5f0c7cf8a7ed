use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use claude_dash::client::connection::ConnectionManager;
use claude_dash::client::dashboard::DashboardEvent;
use claude_dash::client::dispatcher::Listeners;
use claude_dash::client::transport::WsConnector;
use claude_dash::common::logging::{init_logging, Logger};
use claude_dash::common::persistence::FileStorage;
use claude_dash::common::types::{HookAlert, HookDescriptor, HookType};
use claude_dash::config::{Cli, Command, Config, SettingsAction};
use claude_dash::error::{format_any_error, OrchestratorError};
use claude_dash::notify::desktop::DesktopAlerts;
use claude_dash::notify::settings::{NotificationSettings, SettingsPatch};
use claude_dash::notify::sound::SoundScheduler;
use claude_dash::notify::store::{NotificationStore, SWEEP_INTERVAL};
use claude_dash::tui::app::{App, KeyAction};
use claude_dash::tui::timers::{Tick, Timers, REDRAW_INTERVAL};
use claude_dash::tui::ui::ui;
use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::DefaultTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Poll timeout of the input thread
const INPUT_POLL: Duration = Duration::from_millis(100);

fn main() {
    let cli = Cli::parse();
    let mode = claude_dash::error::RuntimeMode::from_env();

    if let Err(e) = run_cli(cli) {
        let response = format_any_error(&e, mode);
        match serde_json::to_string_pretty(&response) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("{:#}", e),
        }
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let config = Config::from_cli(&cli)?;
    init_logging(&config.log_level, config.log_file.clone())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    match cli.command {
        None => run_dashboard(&runtime, config),
        Some(Command::Settings { action }) => run_settings(action, &config),
        Some(Command::Sound { profile }) => {
            let played = SoundScheduler::system().play(&profile, true);
            println!("{}: {} tone(s) scheduled", profile, played);
            Ok(())
        }
        Some(Command::NotifyTest) => runtime.block_on(notify_test()),
    }
}

fn open_store(config: &Config) -> NotificationStore {
    let storage = FileStorage::new(config.settings_file.clone());
    NotificationStore::new(Box::new(storage), config.max_notifications)
}

fn run_settings(action: SettingsAction, config: &Config) -> Result<()> {
    let mut store = open_store(config);
    if let SettingsAction::Set { patch } = action {
        let value: serde_json::Value = serde_json::from_str(&patch)
            .map_err(|e| OrchestratorError::validation(format!("settings patch is not JSON: {}", e)))?;
        store.update_settings(SettingsPatch::from_json(&value)?)?;
    }
    println!("{}", serde_json::to_string_pretty(store.settings())?);
    Ok(())
}

async fn notify_test() -> Result<()> {
    let desktop = DesktopAlerts::system();
    if !desktop.request_permission().await {
        bail!("desktop notifications are not available on this host");
    }
    let settings = NotificationSettings {
        browser_notifications: true,
        ..Default::default()
    };
    let alert = HookAlert {
        session_id: "notify-test".into(),
        session_name: "claude-dash".into(),
        hook: HookDescriptor {
            hook_type: HookType::Question,
            tool_use_id: "notify-test".into(),
            tool_name: "AskUserQuestion".into(),
            input: serde_json::Value::Null,
            preview: Some("Test notification".into()),
        },
        received_at: Utc::now(),
    };
    if !desktop.show(&alert, &settings) {
        bail!("failed to show notification");
    }
    Ok(())
}

fn run_dashboard(runtime: &Runtime, config: Config) -> Result<()> {
    // Set up signal handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let mut terminal = ratatui::init();
    let result = runtime.block_on(run(&mut terminal, config, running));
    ratatui::restore();
    result
}

async fn run(terminal: &mut DefaultTerminal, config: Config, running: Arc<AtomicBool>) -> Result<()> {
    let log = Logger::root();
    log.info(format_args!("starting dashboard for {}", config.server));

    let store = open_store(&config);
    let (events_tx, mut events) = mpsc::unbounded_channel::<DashboardEvent>();
    let mut enabled_hooks = store.settings().enabled_hooks;
    let mut manager = ConnectionManager::start(
        config.server.clone(),
        Arc::new(WsConnector),
        Listeners {
            events: events_tx.clone(),
            enabled_hooks,
        },
    );

    let mut app = App::new(
        config.server.clone(),
        store,
        SoundScheduler::system(),
        DesktopAlerts::system(),
        manager.subscriptions(),
        config.resubscribe,
    );
    let mut link = manager.watch_link();
    let mut keys = spawn_input_thread(running.clone());
    let (permission_tx, mut permissions) = mpsc::unbounded_channel::<bool>();
    let mut timers = Timers::new(SWEEP_INTERVAL, REDRAW_INTERVAL);

    while running.load(Ordering::SeqCst) {
        terminal.draw(|frame| ui(frame, &mut app))?;

        tokio::select! {
            Some(event) = events.recv() => app.apply(event),
            changed = link.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = link.borrow_and_update().state();
                app.on_connection_state(state);
            }
            Some(key) = keys.recv() => {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    break;
                }
                match app.handle_key(key.code) {
                    KeyAction::Quit => break,
                    KeyAction::RequestPermission => {
                        let desktop = app.desktop.clone();
                        let tx = permission_tx.clone();
                        tokio::spawn(async move {
                            let granted = desktop.request_permission().await;
                            let _ = tx.send(granted);
                        });
                    }
                    KeyAction::None => {}
                }
            }
            Some(granted) = permissions.recv() => app.on_permission_result(granted),
            tick = timers.next() => {
                if tick == Tick::Sweep {
                    app.sweep(Utc::now());
                }
            }
        }

        // Filters travel through the listener cell; the channel stays up
        let current = app.store.settings().enabled_hooks;
        if current != enabled_hooks {
            enabled_hooks = current;
            manager.update_listeners(app.listeners(events_tx.clone()));
        }
    }

    running.store(false, Ordering::SeqCst);
    manager.shutdown().await;
    log.info("dashboard stopped");
    Ok(())
}

/// Forward key presses from crossterm's blocking reader
fn spawn_input_thread(running: Arc<AtomicBool>) -> mpsc::UnboundedReceiver<KeyEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            match poll(INPUT_POLL) {
                Ok(true) => match read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        if tx.send(key).is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => return,
                },
                Ok(false) => {}
                Err(_) => return,
            }
        }
    });
    rx
}

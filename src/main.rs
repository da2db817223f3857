mod api;
mod app;
mod client;
mod config;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::http::HttpTransport;
use api::{Registration, Transport, User, UserForm};
use app::App;
use client::render::render_item;
use client::{Completion, Operation, RenderMode, UserClient, ViewUpdate};
use config::AppConfig;
use theme::Theme;

const EXIT_STATUS_HELP: &str = "Exit status reflects failure alerts only. \
Network errors and timeouts are logged to stderr and still exit 0.";

#[derive(Parser, Debug)]
#[command(name = "userdesk")]
#[command(author = "Sean Fournier")]
#[command(version = "0.1.0")]
#[command(about = "A terminal client for a REST user API")]
#[command(after_help = EXIT_STATUS_HELP)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server root, overrides `base_url` from the config
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Whether reads return a list of users or a single user
    #[arg(long, value_enum, global = true)]
    mode: Option<RenderMode>,

    /// Print users as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Run one operation and exit instead of starting the TUI
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the users
    List,
    /// Print the single user the detail endpoint returns
    Show,
    /// Create a user, then print the list
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        age: String,
    },
    /// Update a user by id, then print the list
    Update {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        age: String,
    },
    /// Delete a user by id, then print the list
    Delete { id: String },
    /// Register an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.command.is_none());

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load()?,
    };
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }

    let mode = match args.command {
        Some(Command::Show) => RenderMode::Single,
        _ => config.mode,
    };

    let transport = HttpTransport::new(&config.base_url, config.request_timeout())
        .context("Failed to build HTTP client")?;
    let (client, completions) =
        UserClient::new(transport, config.endpoints.clone(), config.credentials(), mode);

    tracing::info!("Using {} in {:?} mode", config.base_url, mode);

    match args.command {
        Some(command) => {
            run_command(
                command,
                client,
                completions,
                config.notifications,
                args.json,
                &mut io::stdout(),
                &mut io::stderr(),
            )
            .await
        }
        None => run_tui(client, completions, &config).await,
    }
}

/// CLI commands log to stderr; the TUI logs to a file so the screen stays clean
fn init_logging(tui: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if !tui {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .with(filter)
            .init();
        return;
    }

    match open_log_file() {
        Some(file) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
            .with(filter)
            .init(),
        None => tracing_subscriber::registry().with(filter).init(),
    }
}

fn open_log_file() -> Option<std::fs::File> {
    let dir = dirs::cache_dir()?.join("userdesk");
    std::fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("userdesk.log"))
        .ok()
}

/// Run one operation to completion. Users go to `out`, success alerts to
/// `err`; a failure alert becomes the returned error.
async fn run_command<T: Transport>(
    command: Command,
    mut client: UserClient<T>,
    mut completions: mpsc::UnboundedReceiver<Completion>,
    notifications: bool,
    json: bool,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    let operation = match command {
        Command::List | Command::Show => client.mode().read_operation(),
        Command::Create { name, age } => Operation::Create(UserForm { name, age }),
        Command::Update { id, name, age } => Operation::Update {
            id,
            form: UserForm { name, age },
        },
        Command::Delete { id } => Operation::Delete { id },
        Command::Register {
            username,
            password,
            name,
            email,
        } => Operation::Register(Registration {
            username,
            password,
            name,
            email,
        }),
    };

    client.dispatch(operation);
    let updates = client.run_until_idle(&mut completions).await;

    let mut failure = None;
    for update in updates {
        match update {
            ViewUpdate::Render(users) => print_users(out, &users, json)?,
            ViewUpdate::Alert(alert) => {
                if notifications {
                    if let Err(e) = notify("userdesk", &alert.message) {
                        tracing::warn!("Desktop notification failed: {}", e);
                    }
                }
                if alert.failure {
                    failure = Some(alert.message);
                } else {
                    writeln!(err, "{}", alert.message)?;
                }
            }
        }
    }

    match failure {
        Some(message) => anyhow::bail!(message),
        None => Ok(()),
    }
}

fn print_users(out: &mut impl Write, users: &[User], json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(users)?)?;
    } else {
        for user in users {
            writeln!(out, "{}", render_item(user))?;
        }
    }
    Ok(())
}

async fn run_tui<T: Transport>(
    client: UserClient<T>,
    completions: mpsc::UnboundedReceiver<Completion>,
    config: &AppConfig,
) -> Result<()> {
    ui::init_theme(Theme::with_overrides(&config.theme));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state (issues the startup read)
    let mut app = App::new(client, completions, config.notifications);

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app<T: Transport>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<T>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if !app.is_modal() => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => {
                            // Handle key and catch any errors to prevent crashes
                            if let Err(e) = app.handle_key(key).await {
                                app.status_message = Some(format!("Error: {}", e));
                            }
                        }
                    }
                }
            }
        }

        // Apply finished requests
        let _ = app.tick().await;
    }
}

fn notify(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("system-users")
        .show()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::Credentials;
    use crate::api::testing::FakeTransport;
    use crate::api::{Endpoints, TransportError};
    use clap::CommandFactory;
    use reqwest::Method;

    const USERS: &str = r#"[
        {"id": 1, "name": "Homer Simpson", "username": "homer", "email": "homer@x.com"},
        {"id": 2, "name": "Marge Simpson", "username": "marge", "email": "marge@x.com"}
    ]"#;

    /// Run `command` against `fake`, returning the result and what was written
    async fn run(fake: &FakeTransport, command: Command, json: bool) -> (Result<()>, String, String) {
        let (client, completions) = UserClient::new(
            fake.clone(),
            Endpoints::default(),
            Some(Credentials::default()),
            RenderMode::List,
        );
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run_command(command, client, completions, false, json, &mut out, &mut err).await;
        (
            result,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn register() -> Command {
        Command::Register {
            username: "bart".to_string(),
            password: "eatmyshorts".to_string(),
            name: "Bart Simpson".to_string(),
            email: "bart@x.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_prints_one_line_per_user() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 200, USERS);

        let (result, out, err) = run(&fake, Command::List, false).await;

        assert!(result.is_ok());
        assert_eq!(
            out,
            "Homer Simpson (homer) - homer@x.com\nMarge Simpson (marge) - marge@x.com\n"
        );
        assert!(err.is_empty());
    }

    #[tokio::test]
    async fn test_list_as_json() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 200, USERS);

        let (result, out, _) = run(&fake, Command::List, true).await;

        assert!(result.is_ok());
        let printed: Vec<User> = serde_json::from_str(&out).unwrap();
        assert_eq!(printed.len(), 2);
        assert_eq!(printed[1].username.as_deref(), Some("marge"));
    }

    #[tokio::test]
    async fn test_failed_read_fails_the_command() {
        let fake = FakeTransport::new();
        fake.respond(Method::GET, "/api/user/", 500, "");

        let (result, out, _) = run(&fake, Command::List, false).await;

        let error = result.unwrap_err();
        assert_eq!(error.to_string(), "Failed to load users");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_registration_fails_the_command() {
        let fake = FakeTransport::new();
        fake.respond(Method::POST, "/api/user/register/", 400, "");

        let (result, out, err) = run(&fake, register(), false).await;

        assert!(result.is_err());
        assert!(out.is_empty());
        assert!(err.is_empty());
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_registration_alerts_then_prints_the_list() {
        let fake = FakeTransport::new();
        fake.respond(Method::POST, "/api/user/register/", 201, "{}");
        fake.respond(Method::GET, "/api/user/", 200, USERS);

        let (result, out, err) = run(&fake, register(), false).await;

        assert!(result.is_ok());
        assert_eq!(err, format!("{}\n", crate::client::REGISTER_OK));
        assert_eq!(out.lines().count(), 2);
        let requests = fake.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::GET);
    }

    #[tokio::test]
    async fn test_network_error_still_exits_cleanly() {
        let fake = FakeTransport::new();
        fake.fail(Method::DELETE, "/api/users/5/", TransportError::Timeout);

        let (result, out, err) = run(&fake, Command::Delete { id: "5".to_string() }, false).await;

        assert!(result.is_ok());
        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    #[test]
    fn test_help_documents_exit_status() {
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("Exit status reflects failure alerts only"));
    }
}

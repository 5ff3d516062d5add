use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use taskdeck::api::tasks::{self, NewTask, TaskFilters, TaskPatch, TaskStatus};
use taskdeck::api::{CategoryPatch, NewCategory, TaskStats, categories, stats};
use taskdeck::{ApiError, Client, ClientConfig, ConfigError, ErrorCode, FileStore, TransportError};
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("client setup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("{code}: {source}")]
    Api { code: &'static str, source: ApiError },
    #[error("not signed in; run `taskdeck login` first")]
    NotSignedIn,
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<ApiError> for CliError {
    fn from(source: ApiError) -> Self {
        Self::Api { code: source.error_code(), source }
    }
}

#[derive(Parser, Debug)]
#[command(name = "taskdeck", about = "Taskdeck task API CLI")]
struct Cli {
    /// Overrides TASKDECK_API_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides TASKDECK_SESSION_FILE.
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        #[arg(long)]
        name: String,
        email: String,
        #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    /// Exchange the stored refresh token for a new pair.
    Refresh,
    Tasks(TasksCommand),
    Categories(CategoriesCommand),
    /// Dashboard summary over all tasks.
    Stats {
        #[arg(long, default_value_t = 5)]
        recent: usize,
        #[arg(long, default_value_t = 3)]
        due_soon: usize,
    },
}

#[derive(Args, Debug)]
struct TasksCommand {
    #[command(subcommand)]
    command: TasksSubcommand,
}

#[derive(Subcommand, Debug)]
enum TasksSubcommand {
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<TaskStatus>,
        #[arg(long)]
        category_id: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category_id: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, help = "RFC 3339 timestamp or YYYY-MM-DD")]
        due_date: Option<String>,
        #[arg(long, value_parser = parse_status, default_value = "PENDING")]
        status: TaskStatus,
    },
    Update {
        task_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        due_date: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<TaskStatus>,
        #[arg(long)]
        category_id: Option<String>,
    },
    Delete {
        task_id: String,
    },
    /// Completed ↔ pending.
    Toggle {
        task_id: String,
    },
}

#[derive(Args, Debug)]
struct CategoriesCommand {
    #[command(subcommand)]
    command: CategoriesSubcommand,
}

#[derive(Subcommand, Debug)]
enum CategoriesSubcommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "#3B82F6")]
        color: String,
    },
    Update {
        category_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    Delete {
        category_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(session_file) = cli.session_file {
        config.session_file = session_file;
    }

    let storage = Arc::new(FileStore::new(config.session_file.clone()));
    let client = Client::new(&config, storage)?;
    client.session().restore().await;

    match cli.command {
        Command::Login { email, password } => {
            let user = client.session().login(&email, &password).await?;
            print_json(&serde_json::to_value(user)?)
        }
        Command::Register { name, email, password } => {
            let user = client.session().register(&name, &email, &password).await?;
            print_json(&serde_json::to_value(user)?)
        }
        Command::Logout => {
            client.session().logout().await;
            print_json(&json!({ "signedOut": true }))
        }
        Command::Whoami => {
            require_session(&client)?;
            print_json(&serde_json::to_value(client.session().session().user)?)
        }
        Command::Refresh => {
            require_session(&client)?;
            client.session().refresh().await?;
            print_json(&json!({ "refreshed": true }))
        }
        Command::Tasks(cmd) => {
            require_session(&client)?;
            run_tasks(&client, cmd).await
        }
        Command::Categories(cmd) => {
            require_session(&client)?;
            run_categories(&client, cmd).await
        }
        Command::Stats { recent, due_soon } => {
            require_session(&client)?;
            run_stats(&client, recent, due_soon).await
        }
    }
}

async fn run_tasks(client: &Client, cmd: TasksCommand) -> Result<(), CliError> {
    let gateway = client.gateway();
    match cmd.command {
        TasksSubcommand::List { status, category_id, search } => {
            let filters = TaskFilters { status, category_id, search };
            let tasks = tasks::list(gateway, &filters).await?;
            print_json(&serde_json::to_value(tasks)?)
        }
        TasksSubcommand::Create { title, category_id, description, due_date, status } => {
            let new = NewTask { title, description, due_date, status, category_id };
            let task = tasks::create(gateway, &new).await?;
            print_json(&serde_json::to_value(task)?)
        }
        TasksSubcommand::Update { task_id, title, description, due_date, status, category_id } => {
            let patch = TaskPatch { title, description, due_date, status, category_id };
            let task = tasks::update(gateway, &task_id, &patch).await?;
            print_json(&serde_json::to_value(task)?)
        }
        TasksSubcommand::Delete { task_id } => {
            tasks::delete(gateway, &task_id).await?;
            print_json(&json!({ "deleted": task_id }))
        }
        TasksSubcommand::Toggle { task_id } => {
            let all = tasks::list(gateway, &TaskFilters::default()).await?;
            let Some(task) = all.into_iter().find(|t| t.id == task_id) else {
                return Err(CliError::TaskNotFound(task_id));
            };
            let task = tasks::toggle(gateway, &task).await?;
            print_json(&serde_json::to_value(task)?)
        }
    }
}

async fn run_categories(client: &Client, cmd: CategoriesCommand) -> Result<(), CliError> {
    let gateway = client.gateway();
    match cmd.command {
        CategoriesSubcommand::List => {
            let categories = categories::list(gateway).await?;
            print_json(&serde_json::to_value(categories)?)
        }
        CategoriesSubcommand::Create { name, color } => {
            let category = categories::create(gateway, &NewCategory { name, color }).await?;
            print_json(&serde_json::to_value(category)?)
        }
        CategoriesSubcommand::Update { category_id, name, color } => {
            let patch = CategoryPatch { name, color };
            let category = categories::update(gateway, &category_id, &patch).await?;
            print_json(&serde_json::to_value(category)?)
        }
        CategoriesSubcommand::Delete { category_id } => {
            categories::delete(gateway, &category_id).await?;
            print_json(&json!({ "deleted": category_id }))
        }
    }
}

async fn run_stats(client: &Client, recent: usize, due_soon: usize) -> Result<(), CliError> {
    let all = tasks::list(client.gateway(), &TaskFilters::default()).await?;
    let now = OffsetDateTime::now_utc();
    let summary = json!({
        "stats": TaskStats::compute(&all, now),
        "dueSoon": stats::due_soon(&all, now, due_soon),
        "recent": stats::recent(&all, recent),
    });
    print_json(&summary)
}

fn require_session(client: &Client) -> Result<(), CliError> {
    if client.session().session().is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotSignedIn)
    }
}

fn parse_status(raw: &str) -> Result<TaskStatus, tasks::UnknownStatus> {
    raw.parse()
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

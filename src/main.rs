//! Koji Scope CLI
//!
//! Entry point for the `koji-scope` command-line tool.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use koji_scope::config::{self, ScopeConfig, PASSWORD_ENV};
use koji_scope::hub::{build_info_url, HubClient, Task, TaskQuery, TaskStateFilter};
use koji_scope::logs::{fetch_task_log, task_log_url, COMMON_TASK_LOG_FILES};
use koji_scope::tls::load_tls_material;
use koji_scope::transport::{HttpTransport, TransportConfig};

#[derive(Parser)]
#[command(name = "koji-scope")]
#[command(about = "Browse builds, tasks, and logs on a Koji hub", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the latest builds
    Builds {
        /// Maximum number of builds (default: from config)
        #[arg(long)]
        limit: Option<i64>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Path to config file (default: ~/.config/koji-scope/config.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// List the latest tasks
    Tasks {
        /// Maximum number of tasks (default: from config)
        #[arg(long)]
        limit: Option<i64>,

        /// Only tasks owned by this user
        #[arg(long)]
        owner: Option<String>,

        /// Only tasks in this state (ALL, FREE, OPEN, CLOSED, CANCELED, ASSIGNED, FAILED)
        #[arg(long)]
        state: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Path to config file (default: ~/.config/koji-scope/config.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Show one task
    Task {
        /// Task ID
        id: i64,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Path to config file (default: ~/.config/koji-scope/config.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Fetch a task log
    Log {
        /// Task ID
        id: i64,

        /// Log file name (default: task.log)
        file: Option<String>,

        /// List common log file URLs instead of fetching
        #[arg(long)]
        list: bool,

        /// Path to config file (default: ~/.config/koji-scope/config.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Builds {
            limit,
            json,
            config,
        } => {
            run_builds(limit, json, config);
        }
        Commands::Tasks {
            limit,
            owner,
            state,
            json,
            config,
        } => {
            run_tasks(limit, owner, state, json, config);
        }
        Commands::Task { id, json, config } => {
            run_task(id, json, config);
        }
        Commands::Log {
            id,
            file,
            list,
            config,
        } => {
            run_log(id, file, list, config);
        }
    }
}

/// Initialize tracing with environment-based filtering, on stderr so
/// stdout stays clean for command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> ScopeConfig {
    let loaded = match config_path {
        Some(path) => ScopeConfig::load(&path),
        None => ScopeConfig::load_default(),
    };

    match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    }
}

/// Build a client and establish a session per the configured credentials.
///
/// Login failures are reported but not fatal; the hub answers read-only
/// queries anonymously.
fn connect(config: &ScopeConfig) -> HubClient {
    let tls_files = config.tls_with_env_passphrase();
    let material = match load_tls_material(&tls_files) {
        Ok(material) => material,
        Err(e) => {
            eprintln!("Error loading TLS material: {}", e);
            process::exit(1);
        }
    };
    let has_identity = material
        .as_ref()
        .is_some_and(|m| m.identity_pem.is_some());

    let transport = match HttpTransport::new(TransportConfig {
        timeout: config.http.timeout(),
        tls: material,
    }) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("Error setting up HTTP client: {}", e);
            process::exit(1);
        }
    };

    let mut client = HubClient::new(config.hub.hub_url.as_str(), Arc::new(transport))
        .with_user_agent(format!("koji-scope/{}", env!("CARGO_PKG_VERSION")));

    if has_identity {
        if let Err(e) = client.ssl_login() {
            tracing::warn!(error = %e, "sslLogin failed, continuing anonymously");
        }
    } else if let Some(username) = &config.hub.username {
        match config::env_password() {
            Some(password) => {
                if let Err(e) = client.login(username, &password) {
                    tracing::warn!(error = %e, "login failed, continuing anonymously");
                }
            }
            None => {
                tracing::warn!(
                    "hub.username is set but {} is empty, continuing anonymously",
                    PASSWORD_ENV
                );
            }
        }
    }

    client
}

fn run_builds(limit: Option<i64>, json_output: bool, config_path: Option<PathBuf>) {
    let config = load_config(config_path);
    let limit = limit.unwrap_or(config.builds.limit);

    let mut client = connect(&config);
    let builds = match client.list_builds_latest(limit) {
        Ok(builds) => builds,
        Err(e) => {
            eprintln!("Error listing builds: {}", e);
            process::exit(1);
        }
    };

    if json_output {
        match serde_json::to_string_pretty(&builds) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    if builds.is_empty() {
        println!("No builds found.");
        return;
    }

    println!("Latest builds ({} total):\n", builds.len());

    for build in &builds {
        println!("  {} (#{})", build.nvr(), build.build_id);
        if let Some(time) = build.completion_time.as_deref().or(build.creation_time.as_deref()) {
            println!("    Finished: {}", time);
        }
        if let Some(ref owner) = build.owner_name {
            println!("    Owner: {}", owner);
        }
        if let Some(task_id) = build.task_id {
            println!("    Task: {}", task_id);
        }
        println!("    Link: {}", build_info_url(&config.hub.web_url, build.build_id));
        println!();
    }
}

fn run_tasks(
    limit: Option<i64>,
    owner: Option<String>,
    state: Option<String>,
    json_output: bool,
    config_path: Option<PathBuf>,
) {
    let config = load_config(config_path);

    let state_filter = match state {
        Some(ref spelling) => match TaskStateFilter::parse(spelling) {
            Some(filter) => filter,
            None => {
                eprintln!("Unknown task state: {}", spelling);
                process::exit(1);
            }
        },
        // Config carries a validated spelling.
        None => config.tasks.state_filter().unwrap_or_default(),
    };

    let query = TaskQuery {
        limit: limit.unwrap_or(config.tasks.limit),
        owner: owner.or_else(|| config.tasks.owner.clone()),
        state: state_filter.code(),
    };

    let mut client = connect(&config);
    let tasks = match client.list_tasks_latest(&query) {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("Error listing tasks: {}", e);
            process::exit(1);
        }
    };

    if json_output {
        match serde_json::to_string_pretty(&tasks) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    println!("Latest tasks ({} total):\n", tasks.len());

    for task in &tasks {
        print_task(task);
        println!();
    }
}

fn run_task(id: i64, json_output: bool, config_path: Option<PathBuf>) {
    let config = load_config(config_path);

    let mut client = connect(&config);
    let task = match client.get_task_info(id) {
        Ok(Some(task)) => task,
        Ok(None) => {
            eprintln!("Task {} not found.", id);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error fetching task: {}", e);
            process::exit(1);
        }
    };

    if json_output {
        match serde_json::to_string_pretty(&task) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    print_task(&task);
}

fn print_task(task: &Task) {
    let owner = task
        .owner_name
        .as_deref()
        .map(|name| format!(" · {}", name))
        .unwrap_or_default();
    println!("  #{} {}{} ({})", task.id, task.method, owner, task.state_label());
    if let Some(ref time) = task.create_time {
        println!("    Created: {}", time);
    }
    if let Some(ref time) = task.start_time {
        println!("    Started: {}", time);
    }
    if let Some(ref time) = task.completion_time {
        println!("    Completed: {}", time);
    }
}

fn run_log(id: i64, file: Option<String>, list: bool, config_path: Option<PathBuf>) {
    let config = load_config(config_path);

    if list {
        println!("Common log files for task {}:\n", id);
        for file in COMMON_TASK_LOG_FILES {
            println!("  {:<10} {}", file, task_log_url(&config.hub.files_url, id, file));
        }
        return;
    }

    let file = file.unwrap_or_else(|| "task.log".to_string());
    let client = connect(&config);

    match fetch_task_log(&client, &config.hub.files_url, id, &file) {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Error fetching {}: {}", file, e);
            process::exit(1);
        }
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use adowiki_core::config::{Credential, Settings, load_config};
use adowiki_core::host::WikiHost;
use adowiki_core::tools::{
    GetPageArgs, ListWikisArgs, PageTreeArgs, ScopeArgs, SearchWikiArgs, ToolCall,
    UpdatePageArgs, tool_catalog,
};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILENAME: &str = "adowiki.toml";

#[derive(Debug, Parser)]
#[command(
    name = "adowiki",
    version,
    about = "Azure DevOps wiki adapter: page trees, page reads, create-or-update and search"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "NAME")]
    organization: Option<String>,
    #[arg(long, global = true, value_name = "NAME")]
    project: Option<String>,
    #[arg(long, global = true, help = "Print resolved settings to stderr")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    config: Option<PathBuf>,
    scope: ScopeArgs,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            scope: ScopeArgs {
                organization: cli.organization.clone(),
                project: cli.project.clone(),
            },
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "List wikis in the project")]
    Wikis,
    #[command(about = "Print the page hierarchy of a wiki")]
    Tree(TreeArgs),
    #[command(about = "Print one page with its content and version")]
    Page(PageArgs),
    #[command(about = "Create a page, or update it when it already exists")]
    Upsert(UpsertArgs),
    #[command(about = "Search wiki content")]
    Search(SearchArgs),
    #[command(about = "Print the tool catalog as JSON")]
    Tools,
    #[command(about = "Run one tool call and print the tool response")]
    Call(CallArgs),
}

#[derive(Debug, Args)]
struct TreeArgs {
    wiki: String,
    #[arg(long, help = "Retrieve the full hierarchy instead of one level")]
    depth: Option<u32>,
}

#[derive(Debug, Args)]
struct PageArgs {
    wiki: String,
    path: String,
}

#[derive(Debug, Args)]
struct UpsertArgs {
    wiki: String,
    path: String,
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    content: Option<String>,
    #[arg(long, value_name = "PATH", help = "Read page content from a file")]
    file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SearchArgs {
    text: String,
    #[arg(long, value_name = "ID")]
    wiki: Option<String>,
    #[arg(long)]
    top: Option<u32>,
}

#[derive(Debug, Args)]
struct CallArgs {
    tool: String,
    #[arg(help = "Tool arguments as a JSON object")]
    arguments: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Tools) => run_tools(),
        Some(Commands::Call(args)) => run_call(&runtime, args).await,
        Some(Commands::Wikis) => {
            run_tool(
                &runtime,
                ToolCall::ListWikis(ListWikisArgs {
                    scope: runtime.scope.clone(),
                }),
            )
            .await
        }
        Some(Commands::Tree(TreeArgs { wiki, depth })) => {
            run_tool(
                &runtime,
                ToolCall::GetPageTree(PageTreeArgs {
                    scope: runtime.scope.clone(),
                    wiki_id: wiki,
                    depth,
                }),
            )
            .await
        }
        Some(Commands::Page(PageArgs { wiki, path })) => {
            run_tool(
                &runtime,
                ToolCall::GetPage(GetPageArgs {
                    scope: runtime.scope.clone(),
                    wiki_id: wiki,
                    path,
                }),
            )
            .await
        }
        Some(Commands::Upsert(args)) => {
            let content = read_content(&args)?;
            run_tool(
                &runtime,
                ToolCall::UpdatePage(UpdatePageArgs {
                    scope: runtime.scope.clone(),
                    wiki_id: args.wiki,
                    path: args.path,
                    content,
                }),
            )
            .await
        }
        Some(Commands::Search(SearchArgs { text, wiki, top })) => {
            run_tool(
                &runtime,
                ToolCall::SearchWiki(SearchWikiArgs {
                    scope: runtime.scope.clone(),
                    search_text: text,
                    wiki_id: wiki,
                    top,
                }),
            )
            .await
        }
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run_tools() -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&tool_catalog())?);
    Ok(ExitCode::SUCCESS)
}

async fn run_tool(runtime: &RuntimeOptions, call: ToolCall) -> Result<ExitCode> {
    call.validate()?;
    let host = build_host(runtime)?;
    let value = host
        .execute(&call)
        .await
        .with_context(|| format!("{} failed", call.name()))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(ExitCode::SUCCESS)
}

async fn run_call(runtime: &RuntimeOptions, args: CallArgs) -> Result<ExitCode> {
    let arguments = match args.arguments.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("tool arguments must be valid JSON")?,
        None => serde_json::Value::Null,
    };
    let host = build_host(runtime)?;
    let response = host.call_tool(&args.tool, arguments).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build_host(runtime: &RuntimeOptions) -> Result<WikiHost> {
    let settings = resolve_settings(runtime)?;
    if runtime.diagnostics {
        eprintln!("[diagnostics]\n{}", describe_settings(&settings));
    }
    Ok(WikiHost::new(settings))
}

fn resolve_settings(runtime: &RuntimeOptions) -> Result<Settings> {
    dotenvy::dotenv().ok();

    let config_path = runtime
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
    let config = load_config(&config_path)?;
    let settings = config.resolve().with_context(|| {
        format!(
            "failed to resolve settings from {}",
            normalize_path(&config_path)
        )
    })?;
    tracing::debug!(config = %normalize_path(&config_path), "resolved settings");
    Ok(settings)
}

fn read_content(args: &UpsertArgs) -> Result<String> {
    if let Some(content) = &args.content {
        return Ok(content.clone());
    }
    let path = args.file.as_ref().context("either --content or --file is required")?;
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn describe_settings(settings: &Settings) -> String {
    let credential = match &settings.credential {
        Some(Credential::PersonalAccessToken(_)) => "personal access token",
        Some(Credential::Bearer(_)) => "bearer token",
        None => "<none>",
    };
    format!(
        "url={}\norganization={}\nproject={}\ncredential={}\ndefault_branch={}\nuser_agent={}\ntimeout_ms={}",
        settings.url.as_deref().unwrap_or("<default>"),
        settings.organization.as_deref().unwrap_or("<unset>"),
        settings.project.as_deref().unwrap_or("<unset>"),
        credential,
        settings.default_branch,
        settings.user_agent,
        settings.timeout.as_millis()
    )
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

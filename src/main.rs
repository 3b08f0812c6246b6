use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;
use excel_analytics::analysis::{AnalysisSession, ChartConfig};
use excel_analytics::auth::RegisterForm;
use excel_analytics::upload::UploadEvent;
use excel_analytics::utils::{format_bytes, format_duration, progress_bar};
use excel_analytics::{
    ApiClient, AuthContext, Candidate, Config, FileService, Navigator, Route, RouteGuard,
    SessionManager, UploadWorkflow,
};

#[derive(Parser)]
#[command(name = "excel-analytics")]
#[command(about = "Upload spreadsheets and build charts with Excel Analytics", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/excel-analytics/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Clear the stored session
    Logout,
    /// Show the logged in user
    Whoami,
    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Request password reset instructions
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },
    /// Set a new password with the token from the reset link
    ResetPassword {
        #[arg(short, long)]
        token: Option<String>,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Upload .xlsx, .xls or .csv files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List uploaded files
    Files,
    /// Show the columns of an uploaded file
    Structure {
        file_id: String,
    },
    /// Generate chart data from an uploaded file
    Chart {
        file_id: String,
        /// bar, line, pie, scatter, area, bar3d, pie3d, scatter3d
        #[arg(long = "type")]
        chart_type: String,
        #[arg(long)]
        title: String,
        #[arg(short, long)]
        x: String,
        #[arg(short, long)]
        y: String,
        /// 2D or 3D
        #[arg(long, default_value = "2D")]
        dimension: String,
        /// sum, average, count, min, max
        #[arg(long, default_value = "sum")]
        aggregation: String,
    },
    /// Delete an uploaded file
    Delete {
        file_id: String,
    },
}

struct App {
    config: Config,
    session: SessionManager,
    api: Arc<ApiClient>,
    navigator: Navigator,
}

impl App {
    async fn init(config: Config) -> anyhow::Result<Self> {
        let storage = config.token_storage().context("Failed to open session storage")?;
        let session = SessionManager::new(Arc::new(storage));
        // 路由判定之前先恢复会话
        session.init().await.context("Failed to restore session")?;

        let api = Arc::new(ApiClient::from_config(&config, session.clone())?);
        let navigator = Navigator::new(RouteGuard::new(session.clone()));

        Ok(Self {
            config,
            session,
            api,
            navigator,
        })
    }

    fn auth(&self) -> AuthContext {
        AuthContext::new(self.api.clone(), self.session.clone(), self.navigator.clone())
            .with_reset_redirect_delay(self.config.reset_redirect_delay())
    }

    /// 受保护的命令先经过路由守卫
    async fn enter(&self, route: Route) -> anyhow::Result<()> {
        let shown = self.navigator.push(route.clone()).await;
        if shown != route {
            bail!("Not logged in. Run `excel-analytics login` first.");
        }
        Ok(())
    }
}

fn parse_value<T: DeserializeOwned>(name: &str, raw: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .with_context(|| format!("Invalid {}: {}", name, raw))
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_config(&config_path)?;
    let app = App::init(config).await?;

    let result = run(&app, cli.command).await;
    app.session.teardown().await;
    result
}

async fn run(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => {
            let mut view = app.auth().login_view();
            view.form.email = email;
            view.form.password = password;

            match view.submit().await {
                Some(route) => {
                    let user = app.session.user().await;
                    println!("Logged in as {} -> {}", user.map(|u| u.name).unwrap_or_default(), route);
                }
                None => bail!("{}", view.status().message().unwrap_or("Login failed")),
            }
        }
        Commands::Logout => {
            app.session.logout().await?;
            println!("Logged out");
        }
        Commands::Whoami => match app.session.user().await {
            Some(user) => println!("{} <{}>", user.name, user.email),
            None => println!("Not logged in"),
        },
        Commands::Register { first_name, last_name, email, password, confirm_password } => {
            let mut view = app.auth().register_view();
            view.form = RegisterForm {
                first_name,
                last_name,
                email,
                password,
                confirm_password,
            };

            match view.submit().await {
                Some(_) => println!("Account created, you can log in now"),
                None => bail!("{}", view.status().message().unwrap_or("Registration failed")),
            }
        }
        Commands::ForgotPassword { email } => {
            let mut view = app.auth().forgot_password_view();
            view.email = email;
            let ok = view.submit().await;
            let message = view.status().message().unwrap_or_default().to_string();
            if !ok {
                bail!("{}", message);
            }
            println!("{}", message);
        }
        Commands::ResetPassword { token, password, confirm_password } => {
            let mut view = app.auth().reset_password_view(token);
            if view.is_disabled() {
                bail!("{}", view.status().message().unwrap_or_default());
            }
            view.password = password;
            view.confirm_password = confirm_password;

            match view.submit().await {
                Some(redirect) => {
                    println!("{}", view.status().message().unwrap_or_default());
                    redirect.await?;
                }
                None => bail!("{}", view.status().message().unwrap_or("Failed to reset password")),
            }
        }
        Commands::Upload { files } => {
            app.enter(Route::Upload).await?;
            upload(app, files).await?;
        }
        Commands::Files => {
            app.enter(Route::Dashboard).await?;
            let files = app.api.get_files().await.map_err(|err| anyhow::anyhow!(err.user_message()))?;
            if files.is_empty() {
                println!("No files uploaded yet");
            }
            for file in files {
                let uploaded = file.uploaded_at.map(|at| at.format("%Y-%m-%d %H:%M").to_string());
                println!(
                    "{}  {}  {}  {}",
                    file.id,
                    file.filename,
                    uploaded.unwrap_or_default(),
                    file.status.unwrap_or_default()
                );
            }
        }
        Commands::Structure { file_id } => {
            app.enter(Route::Analysis { file_id: Some(file_id.clone()) }).await?;
            let mut analysis = AnalysisSession::new(app.api.clone(), Some(file_id));
            analysis.load().await;
            if let Some(error) = analysis.error() {
                bail!("{}", error);
            }
            for column in analysis.columns() {
                println!("{}\t{}\t{:?}", column.id, column.label, column.column_type);
            }
        }
        Commands::Chart { file_id, chart_type, title, x, y, dimension, aggregation } => {
            app.enter(Route::Analysis { file_id: Some(file_id.clone()) }).await?;
            let config = ChartConfig {
                chart_type: Some(parse_value("chart type", &chart_type)?),
                dimension: parse_value("dimension", &dimension)?,
                title,
                x_axis: x,
                y_axis: y,
                aggregation: parse_value("aggregation", &aggregation)?,
            };

            let mut analysis = AnalysisSession::new(app.api.clone(), Some(file_id));
            match analysis.generate_chart(&config).await {
                Some(chart) => println!("{}", serde_json::to_string_pretty(chart)?),
                None => {
                    let validation = analysis.validation_errors().first().map(String::from);
                    bail!("{}", validation.or(analysis.error().map(String::from)).unwrap_or_default());
                }
            }
        }
        Commands::Delete { file_id } => {
            app.enter(Route::Dashboard).await?;
            app.api.delete_file(&file_id).await.map_err(|err| anyhow::anyhow!(err.user_message()))?;
            println!("Deleted {}", file_id);
        }
    }

    Ok(())
}

async fn upload(app: &App, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut candidates = Vec::with_capacity(files.len());
    for path in files {
        let candidate = Candidate::from_path(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        candidates.push(candidate);
    }

    let workflow = UploadWorkflow::new(app.api.clone())
        .with_max_concurrent(app.config.max_concurrent_uploads())
        .with_navigator(app.navigator.clone());
    let intake = workflow.add_candidates(candidates).await;
    for rejection in &intake.rejected {
        eprintln!("Skipped {}", rejection);
    }
    if intake.accepted.is_empty() {
        bail!("Nothing to upload. Supported formats: .xlsx, .xls, .csv (max 50MB)");
    }

    let snapshot = workflow.snapshot().await;
    let mut events = workflow.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                UploadEvent::Progress { upload_id, percent, .. } => {
                    if let Some(item) = snapshot.get(upload_id) {
                        println!("{} {}", progress_bar(percent, 30), item.file.name);
                    }
                }
                UploadEvent::Completed { file, .. } => println!("Uploaded {}", file.filename),
                UploadEvent::Failed { upload_id, error } => {
                    let name = snapshot.get(upload_id).map(|item| item.file.name.clone()).unwrap_or_default();
                    eprintln!("Failed {}: {}", name, error);
                }
                UploadEvent::BatchFinished(_) => break,
                _ => {}
            }
        }
    });

    let started = std::time::Instant::now();
    let outcome = workflow.run().await?;
    let _ = printer.await;

    let total: u64 = workflow.snapshot().await.items().iter().map(|item| item.file.size).sum();
    println!(
        "{} uploaded, {} failed ({} in {})",
        outcome.completed,
        outcome.failed,
        format_bytes(total),
        format_duration(started.elapsed())
    );

    match (outcome.navigate_to, outcome.last_error) {
        (Some(route), _) => println!("All files uploaded -> {}", route),
        (None, Some(error)) => bail!("{}", error),
        (None, None) => {}
    }

    Ok(())
}

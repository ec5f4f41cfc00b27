use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::path::PathBuf;
use taskcal::api::{Api, Envelope, TaskInput};
use taskcal::clock::SystemClock;
use taskcal::export::CsvExport;
use taskcal::filter::{ExportCriteria, TaskCriteria};
use taskcal::store::TaskStore;

#[derive(Parser)]
#[command(name = "taskcal")]
#[command(about = "Calendar task manager - filtered queries and CSV import/export")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the task database (default: per-user data directory)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TaskFields {
    title: String,

    #[arg(long)]
    task_date: String,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    due_date: Option<String>,

    /// Low, Medium, or High
    #[arg(long)]
    priority: Option<String>,

    #[arg(long)]
    category: Option<String>,

    /// Pending, "In Progress", or Completed
    #[arg(long)]
    status: Option<String>,
}

impl TaskFields {
    fn into_input(self) -> TaskInput {
        TaskInput {
            title: self.title,
            description: self.description,
            task_date: self.task_date,
            due_date: self.due_date,
            priority: self.priority,
            category: self.category,
            status: self.status,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks falling in a month
    ListMonth {
        #[arg(short, long)]
        month: i64,
        #[arg(short, long)]
        year: i64,
    },

    /// List tasks on an exact date
    ListDate { date: String },

    /// Add a task
    Add {
        #[command(flatten)]
        fields: TaskFields,
    },

    /// Replace the fields of an existing task
    Update {
        id: i64,
        #[command(flatten)]
        fields: TaskFields,
    },

    /// Delete a task
    Delete { id: i64 },

    /// Toggle a task between completed and pending
    Toggle { id: i64 },

    /// Filter tasks by any combination of criteria
    Filter {
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        date_from: Option<String>,
        #[arg(long)]
        date_to: Option<String>,
    },

    /// List the distinct category labels in use
    Categories,

    /// Show aggregate task statistics
    Stats,

    /// List incomplete tasks past their due date
    Overdue,

    /// List incomplete tasks scheduled in the next seven days
    Upcoming,

    /// Export every task to a CSV file
    ExportAll {
        /// Output path (default: stamped filename in the current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Export tasks matching priority/category/status to a CSV file
    ExportFiltered {
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import tasks from a CSV file
    Import { file: PathBuf },
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let db_path = cli.db.unwrap_or_else(default_db_path);
    let store = TaskStore::open(&db_path)?;
    let api = Api::new(store, SystemClock);

    let envelope = match cli.command {
        Commands::ListMonth { month, year } => api.list_by_month(month, year),
        Commands::ListDate { date } => api.list_by_date(&date),
        Commands::Add { fields } => api.create(&fields.into_input()),
        Commands::Update { id, fields } => api.update(id, &fields.into_input()),
        Commands::Delete { id } => api.delete(id),
        Commands::Toggle { id } => api.toggle_complete(id),
        Commands::Filter {
            priority,
            category,
            status,
            search,
            date_from,
            date_to,
        } => api.filter(&TaskCriteria {
            priority,
            category,
            status,
            search,
            date_from,
            date_to,
        }),
        Commands::Categories => api.categories(),
        Commands::Stats => api.statistics(),
        Commands::Overdue => api.overdue(),
        Commands::Upcoming => api.upcoming(),
        Commands::ExportAll { out } => return write_export(api.export_all(), out),
        Commands::ExportFiltered {
            priority,
            category,
            status,
            out,
        } => {
            let criteria = ExportCriteria {
                priority,
                category,
                status,
            };
            return write_export(api.export_filtered(&criteria), out);
        }
        Commands::Import { file } => api.import(&file),
    };

    print_envelope(&envelope)
}

fn print_envelope(envelope: &Envelope) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    if !envelope.success {
        std::process::exit(1);
    }
    Ok(())
}

fn write_export(result: Result<CsvExport, Envelope>, out: Option<PathBuf>) -> Result<()> {
    match result {
        Ok(export) => {
            let out = out.unwrap_or_else(|| PathBuf::from(&export.filename));
            std::fs::write(&out, &export.bytes)?;
            eprintln!("{} {}", "Exported".green().bold(), out.display());
            Ok(())
        }
        Err(envelope) => print_envelope(&envelope),
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("taskcal").join("tasks.db"))
        .unwrap_or_else(|| PathBuf::from("tasks.db"))
}

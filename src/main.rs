use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use spice_lite::classifier::{ClassifierRequest, ResultGroups};
use spice_lite::config::WorkspaceConfig;
use spice_lite::scheduler::{JobId, JobRecord, JobStatus};
use spice_lite::shutdown::install_shutdown_handler;
use spice_lite::validation::check_upload_size;
use spice_lite::Workspace;

#[derive(Parser, Debug)]
#[command(name = "spice-lite")]
#[command(version)]
#[command(about = "Project and job queue manager for the protein feature pipeline")]
#[command(propagate_version = true)]
struct Args {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Storage root holding one directory per user
    #[arg(long, env = "SPICE_ROOT", default_value = "spice_data", global = true)]
    root: PathBuf,

    /// User whose projects are addressed
    #[arg(long, short = 'u', env = "SPICE_USER", default_value = "guest", global = true)]
    user: String,

    /// Classifier timeout in seconds, passed to the worker
    #[arg(long, default_value = "20", global = true)]
    classifier_timeout: u64,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Project management commands
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Inspect queued jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Feature extraction commands
    Feature {
        #[command(subcommand)]
        command: FeatureCommands,
    },

    /// Classifier commands
    Classifier {
        #[command(subcommand)]
        command: ClassifierCommands,
    },
}

// =============================================================================
// Project Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum ProjectCommands {
    /// Create a new project
    Create {
        project: String,

        /// Pick a free id (<id>_0, <id>_1, ...) if the id is taken
        #[arg(long)]
        unique: bool,
    },
    /// Delete a project and everything in it
    Delete { project: String },
    /// List projects, newest first
    List,
    /// Check an upload against the size limit
    CheckUpload { file: PathBuf },
}

// =============================================================================
// Job Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// List jobs of a project, newest first
    List {
        project: String,

        /// Only jobs run by this program (e.g. featext, classification)
        #[arg(long)]
        app: Option<String>,
    },
    /// Show the descriptor and status of one job
    Status { project: String, job_id: String },
}

// =============================================================================
// Feature Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum FeatureCommands {
    /// Queue feature extraction for one or more categories
    Run {
        project: String,
        #[arg(required = true)]
        categories: Vec<String>,
    },
    /// Show the status of every requested feature category
    Status { project: String },
}

// =============================================================================
// Classifier Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum ClassifierCommands {
    /// Queue a classifier training run
    Run(ClassifierRunArgs),
    /// List classifier runs of a project
    List { project: String },
    /// Show progress, settings and scores of one run
    Show { project: String, classifier_id: String },
    /// Show all finished runs grouped by class set
    Results { project: String },
    /// Poll a run until it finishes or fails
    Watch {
        project: String,
        classifier_id: String,

        /// Poll interval in milliseconds
        #[arg(long, default_value = "2000")]
        interval_ms: u64,
    },
}

#[derive(Parser, Debug)]
struct ClassifierRunArgs {
    project: String,

    /// Classifier type (e.g. lda, svm, knn)
    #[arg(long, short = 'c')]
    classifier: String,

    /// Number of cross-validation folds
    #[arg(long, short = 'n', default_value = "5")]
    folds: u32,

    /// Labeling to train on
    #[arg(long, short = 'l')]
    labeling: String,

    /// Comma-separated class ids
    #[arg(long, value_delimiter = ',', required = true)]
    classes: Vec<String>,

    /// Comma-separated feature ids
    #[arg(long, value_delimiter = ',', required = true)]
    features: Vec<String>,

    /// Evaluation score (ignored for more than two classes)
    #[arg(long, short = 'e')]
    eval_score: Option<String>,

    /// Feature selection mode
    #[arg(long, short = 's')]
    feature_selection: Option<String>,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct ProjectCreateOutput {
    project_id: String,
    path: String,
}

#[derive(Serialize)]
struct JobSubmitOutput {
    job_id: String,
}

#[derive(Serialize)]
struct JobListItem {
    job_id: String,
    status: JobStatus,
    program: String,
    path: String,
}

impl From<&JobRecord> for JobListItem {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.id.to_string(),
            status: record.status,
            program: record.command.app_name().to_string(),
            path: record.path.display().to_string(),
        }
    }
}

#[derive(Serialize)]
struct JobStatusOutput {
    job_id: String,
    status: JobStatus,
    command: String,
    stdout: String,
    stderr: String,
}

#[derive(Serialize)]
struct ClassifierListItem {
    classifier_id: String,
    status: Option<JobStatus>,
    finished: bool,
}

#[derive(Serialize)]
struct ClassifierShowOutput {
    classifier_id: String,
    status: Option<JobStatus>,
    finished: bool,
    progress: Option<String>,
    error: Option<String>,
    settings: Option<serde_json::Value>,
    result: Option<serde_json::Value>,
    roc: Option<String>,
    predictions: Option<String>,
}

#[derive(Serialize)]
struct ResultGroupOutput {
    classes: Vec<String>,
    runs: serde_json::Value,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_label(status: Option<JobStatus>) -> String {
    status
        .map(|s| s.to_string().to_uppercase())
        .unwrap_or_else(|| "-".to_string())
}

fn print_block(title: &str, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    println!("{}:", title);
    for line in text.lines() {
        println!("  {}", line);
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn handle_project(
    ws: &Workspace,
    user: &str,
    command: ProjectCommands,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        ProjectCommands::Create { project, unique } => {
            let handle = if unique {
                ws.create_project_unique(user, &project).await?
            } else {
                ws.create_project(user, &project).await?
            };
            match output {
                OutputFormat::Json => print_json(&ProjectCreateOutput {
                    project_id: handle.id().to_string(),
                    path: handle.paths().project_dir.display().to_string(),
                })?,
                OutputFormat::Table => {
                    println!("Project created: {}", handle.id());
                }
            }
        }
        ProjectCommands::Delete { project } => {
            ws.delete_project(user, &project).await?;
            if let OutputFormat::Table = output {
                println!("Project deleted: {}", project);
            }
        }
        ProjectCommands::List => {
            let projects = ws.list_projects(user).await?;
            match output {
                OutputFormat::Json => print_json(&projects)?,
                OutputFormat::Table => {
                    if projects.is_empty() {
                        println!("No projects found.");
                    } else {
                        println!("{:<30} CREATED", "PROJECT");
                        println!("{}", "-".repeat(52));
                        for p in &projects {
                            println!("{:<30} {}", p.project_id, p.project_init);
                        }
                    }
                }
            }
        }
        ProjectCommands::CheckUpload { file } => {
            let mut reader = tokio::fs::File::open(&file).await?;
            let size = check_upload_size(&mut reader, ws.pipeline().max_upload_bytes).await?;
            println!("{}: {} bytes, within limit", file.display(), size);
        }
    }
    Ok(())
}

async fn handle_job(
    ws: &Workspace,
    user: &str,
    command: JobCommands,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        JobCommands::List { project, app } => {
            let handle = ws.open(user, &project).await?;
            let records: Vec<JobRecord> = match app {
                Some(app) => handle.jobs().list_jobs(&app).await,
                None => handle.jobs().scan().await.newest_first().cloned().collect(),
            };
            let items: Vec<JobListItem> = records.iter().map(JobListItem::from).collect();

            match output {
                OutputFormat::Json => print_json(&items)?,
                OutputFormat::Table => {
                    if items.is_empty() {
                        println!("No jobs found.");
                    } else {
                        println!("{:<22} {:<10} PROGRAM", "JOB ID", "STATUS");
                        println!("{}", "-".repeat(50));
                        for job in &items {
                            println!(
                                "{:<22} {:<10} {}",
                                job.job_id,
                                job.status.to_string().to_uppercase(),
                                job.program
                            );
                        }
                    }
                }
            }
        }
        JobCommands::Status { project, job_id } => {
            let handle = ws.open(user, &project).await?;
            let id = JobId::new(job_id);
            let (status, descriptor) = handle.jobs().get_job(&id).await?;
            let out = JobStatusOutput {
                job_id: id.to_string(),
                status,
                command: descriptor.command.to_line(),
                stdout: descriptor.stdout_path.display().to_string(),
                stderr: descriptor.stderr_path.display().to_string(),
            };
            match output {
                OutputFormat::Json => print_json(&out)?,
                OutputFormat::Table => {
                    println!("Job ID:  {}", out.job_id);
                    println!("Status:  {}", status_label(Some(out.status)));
                    println!("Command: {}", out.command);
                    println!("Stdout:  {}", out.stdout);
                    println!("Stderr:  {}", out.stderr);
                }
            }
        }
    }
    Ok(())
}

async fn handle_feature(
    ws: &Workspace,
    user: &str,
    command: FeatureCommands,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        FeatureCommands::Run {
            project,
            categories,
        } => {
            let handle = ws.open(user, &project).await?;
            let id = handle.jobs().enqueue_feature_extraction(&categories).await?;
            match output {
                OutputFormat::Json => print_json(&JobSubmitOutput {
                    job_id: id.to_string(),
                })?,
                OutputFormat::Table => {
                    println!("Feature extraction queued!");
                    println!("Job ID: {}", id);
                }
            }
        }
        FeatureCommands::Status { project } => {
            let handle = ws.open(user, &project).await?;
            let status = handle.feature_status().await;
            match output {
                OutputFormat::Json => print_json(&status)?,
                OutputFormat::Table => {
                    if status.is_empty() {
                        println!("No feature categories requested.");
                    } else {
                        println!("{:<30} STATUS", "CATEGORY");
                        println!("{}", "-".repeat(40));
                        for (category, s) in status.iter() {
                            println!("{:<30} {}", category, status_label(Some(s)));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

async fn handle_classifier(
    ws: &Workspace,
    user: &str,
    command: ClassifierCommands,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        ClassifierCommands::Run(args) => {
            let handle = ws.open(user, &args.project).await?;
            let mut request = ClassifierRequest::new(args.classifier, args.folds, args.labeling)
                .with_classes(args.classes)
                .with_features(args.features);
            request.eval_score = args.eval_score;
            request.feature_selection = args.feature_selection;

            let id = handle.classifiers().start_run(&request).await?;
            match output {
                OutputFormat::Json => print_json(&JobSubmitOutput {
                    job_id: id.to_string(),
                })?,
                OutputFormat::Table => {
                    println!("Classifier run queued!");
                    println!("Classifier ID: {}", id);
                }
            }
        }
        ClassifierCommands::List { project } => {
            let handle = ws.open(user, &project).await?;
            let registry = handle.classifiers();
            let mut items = Vec::new();
            for id in registry.ids().await?.into_iter().rev() {
                items.push(ClassifierListItem {
                    status: handle.jobs().job_status(&JobId::new(id.as_str())).await?,
                    finished: registry.is_finished(&id).await?,
                    classifier_id: id,
                });
            }
            match output {
                OutputFormat::Json => print_json(&items)?,
                OutputFormat::Table => {
                    if items.is_empty() {
                        println!("No classifier runs found.");
                    } else {
                        println!("{:<22} {:<10} FINISHED", "CLASSIFIER ID", "JOB");
                        println!("{}", "-".repeat(45));
                        for item in &items {
                            println!(
                                "{:<22} {:<10} {}",
                                item.classifier_id,
                                status_label(item.status),
                                if item.finished { "yes" } else { "no" }
                            );
                        }
                    }
                }
            }
        }
        ClassifierCommands::Show {
            project,
            classifier_id,
        } => {
            let handle = ws.open(user, &project).await?;
            let registry = handle.classifiers();
            if !registry.ids().await?.contains(&classifier_id) {
                return Err(format!("Classifier not found: {}", classifier_id).into());
            }

            let finished = registry.is_finished(&classifier_id).await?;
            let (settings, result) = if finished {
                (
                    Some(serde_json::to_value(registry.settings(&classifier_id).await?)?),
                    Some(serde_json::to_value(registry.result(&classifier_id).await?)?),
                )
            } else {
                (None, None)
            };
            let out = ClassifierShowOutput {
                status: handle
                    .jobs()
                    .job_status(&JobId::new(classifier_id.as_str()))
                    .await?,
                finished,
                progress: registry.progress(&classifier_id).await.ok(),
                error: registry.error(&classifier_id).await.ok(),
                settings,
                result,
                roc: registry
                    .roc_path(&classifier_id)
                    .await?
                    .map(|p| p.display().to_string()),
                predictions: registry
                    .predictions_path(&classifier_id)
                    .await?
                    .map(|p| p.display().to_string()),
                classifier_id,
            };

            match output {
                OutputFormat::Json => print_json(&out)?,
                OutputFormat::Table => print_classifier(&out),
            }
        }
        ClassifierCommands::Results { project } => {
            let handle = ws.open(user, &project).await?;
            let groups = handle.classifiers().all_results().await?;
            match output {
                OutputFormat::Json => print_json(&result_groups_json(&groups)?)?,
                OutputFormat::Table => print_result_groups(&groups),
            }
        }
        ClassifierCommands::Watch {
            project,
            classifier_id,
            interval_ms,
        } => {
            let handle = ws.open(user, &project).await?;
            watch_classifier(&handle, &classifier_id, interval_ms).await?;
        }
    }
    Ok(())
}

fn print_classifier(out: &ClassifierShowOutput) {
    println!("Classifier ID: {}", out.classifier_id);
    println!("Job Status:    {}", status_label(out.status));
    println!("Finished:      {}", if out.finished { "yes" } else { "no" });
    if let Some(progress) = &out.progress {
        print_block("Progress", progress);
    }
    if let Some(error) = &out.error {
        print_block("Error", error);
    }
    if let Some(serde_json::Value::Object(map)) = &out.settings {
        println!("Settings:");
        for (k, v) in map {
            println!("  {:<20} {}", k, v);
        }
    }
    if let Some(result) = &out.result {
        if let Some(serde_json::Value::Object(avg)) = result.get("averages") {
            println!("Scores:");
            for (metric, summary) in avg {
                println!(
                    "  {:<20} {:.3} (+/- {:.3})",
                    metric,
                    summary["mean"].as_f64().unwrap_or(f64::NAN),
                    summary["std_dev"].as_f64().unwrap_or(f64::NAN)
                );
            }
        }
    }
    if let Some(roc) = &out.roc {
        println!("ROC curve:     {}", roc);
    }
    if let Some(predictions) = &out.predictions {
        println!("Predictions:   {}", predictions);
    }
}

fn result_groups_json(
    groups: &ResultGroups,
) -> Result<Vec<ResultGroupOutput>, Box<dyn std::error::Error>> {
    let mut out = Vec::with_capacity(groups.len());
    for (classes, runs) in groups {
        out.push(ResultGroupOutput {
            classes: classes.clone(),
            runs: serde_json::to_value(runs)?,
        });
    }
    Ok(out)
}

fn print_result_groups(groups: &ResultGroups) {
    if groups.is_empty() {
        println!("No finished classifier runs.");
        return;
    }
    for (classes, runs) in groups {
        println!("Classes: {}", classes.join(", "));
        println!("{}", "=".repeat(60));
        println!("{:<22} {:<12} {:<10} MEAN (+/- SD)", "CLASSIFIER ID", "TYPE", "METRIC");
        for (id, run) in runs {
            let kind = run.settings.get_str("classifier").unwrap_or("-");
            for (metric, summary) in &run.result.averages {
                println!(
                    "{:<22} {:<12} {:<10} {:.3} (+/- {:.3})",
                    id, kind, metric, summary.mean, summary.std_dev
                );
            }
        }
        println!();
    }
}

/// Print the part of `progress` not shown yet. Progress lines often arrive
/// without a trailing newline, so the writer is flushed every time.
fn write_progress_delta<W: Write>(out: &mut W, last: &str, progress: &str) -> std::io::Result<()> {
    let delta = progress.strip_prefix(last).unwrap_or(progress);
    out.write_all(delta.as_bytes())?;
    out.flush()
}

async fn watch_classifier(
    handle: &spice_lite::ProjectHandle,
    classifier_id: &str,
    interval_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = install_shutdown_handler();
    let registry = handle.classifiers();
    let job_id = JobId::new(classifier_id);
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(100)));
    let mut last_progress = String::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                println!("Stopped watching {}", classifier_id);
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        if let Ok(progress) = registry.progress(classifier_id).await {
            if progress != last_progress {
                write_progress_delta(&mut std::io::stdout(), &last_progress, &progress)?;
                last_progress = progress;
            }
        }

        if registry.is_finished(classifier_id).await? {
            println!("Classifier {} finished.", classifier_id);
            return Ok(());
        }

        match handle.jobs().job_status(&job_id).await? {
            Some(JobStatus::Error) => {
                let error = registry.error(classifier_id).await.unwrap_or_default();
                eprintln!("Classifier {} failed.", classifier_id);
                print_block("Error", &error);
                std::process::exit(1);
            }
            None => {
                return Err(format!("No job found for classifier {}", classifier_id).into());
            }
            Some(status) => {
                tracing::debug!(classifier_id, status = %status, "Classifier not finished");
            }
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = WorkspaceConfig::new(&args.global.root)
        .with_classifier_timeout(args.global.classifier_timeout);
    let ws = Workspace::new(config)?;
    let user = args.global.user.as_str();
    let output = &args.global.output;

    let result = match args.command {
        Commands::Project { command } => handle_project(&ws, user, command, output).await,
        Commands::Job { command } => handle_job(&ws, user, command, output).await,
        Commands::Feature { command } => handle_feature(&ws, user, command, output).await,
        Commands::Classifier { command } => handle_classifier(&ws, user, command, output).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingWriter {
        written: Vec<u8>,
        flushes: usize,
    }

    impl Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn progress_delta_is_flushed_without_newline() {
        let mut out = RecordingWriter::default();

        write_progress_delta(&mut out, "", "fold 1/5").unwrap();
        assert_eq!(out.written, b"fold 1/5");
        assert_eq!(out.flushes, 1);

        write_progress_delta(&mut out, "fold 1/5", "fold 1/5 done\nfold 2/5").unwrap();
        assert_eq!(out.written, b"fold 1/5 done\nfold 2/5");
        assert_eq!(out.flushes, 2);
    }

    #[test]
    fn rewritten_progress_is_printed_in_full() {
        let mut out = RecordingWriter::default();
        write_progress_delta(&mut out, "old text", "new").unwrap();
        assert_eq!(out.written, b"new");
    }
}

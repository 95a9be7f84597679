use crate::config::{parse_deadline, IngestConfig};
use crate::error::AppError;
use crate::telemetry;
use crate::workflows::ingest::{
    check_exam_number, check_identifier, load_class_list, IngestJob, IngestPipeline, IngestReport,
    ReportRow, StudentRecord,
};
use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gradex-ingest",
    about = "Ingest exam submissions from a Learn download and rename them by exam number",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place submissions into the output folder and write reports (default command)
    Run(RunArgs),
    /// Check class-list identifiers and exam numbers without moving anything
    Check(CheckArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Course code, used in logs and the run summary
    #[arg(long)]
    course: Option<String>,
    /// CSV with UUN, Exam Number, First Name, Last Name, Minutes of Extra Time Allowed
    #[arg(long)]
    classlist: Option<PathBuf>,
    /// Folder containing the unzipped Learn download
    #[arg(long = "learndir")]
    learn_dir: Option<PathBuf>,
    /// Folder where the anonymised scripts are placed
    #[arg(long = "outputdir")]
    output_dir: Option<PathBuf>,
    /// Normal submission deadline (YYYY-MM-DD-HH-MM)
    #[arg(long, value_parser = parse_deadline_arg)]
    deadline: Option<NaiveDateTime>,
    /// Print the run summary as JSON
    #[arg(long)]
    summary_json: bool,
}

#[derive(Args, Debug, Default)]
struct CheckArgs {
    /// Class list to check (defaults to the configured class list)
    #[arg(long)]
    classlist: Option<PathBuf>,
}

pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(RunArgs::default()));

    let mut config = IngestConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match command {
        Command::Run(args) => {
            let summary_json = args.summary_json;
            apply_overrides(&mut config, args);
            run_ingest(&config, summary_json)
        }
        Command::Check(args) => {
            let classlist = args.classlist.unwrap_or(config.paths.classlist);
            let students = load_class_list(&classlist)?;
            for line in check_lines(&students) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn parse_deadline_arg(raw: &str) -> Result<NaiveDateTime, String> {
    parse_deadline(raw).map_err(|err| err.to_string())
}

fn apply_overrides(config: &mut IngestConfig, args: RunArgs) {
    if let Some(course) = args.course {
        config.course = course;
    }
    if let Some(classlist) = args.classlist {
        config.paths.classlist = classlist;
    }
    if let Some(learn_dir) = args.learn_dir {
        config.paths.learn_dir = learn_dir;
    }
    if let Some(output_dir) = args.output_dir {
        config.paths.output_dir = output_dir;
    }
    if let Some(deadline) = args.deadline {
        config.deadline = deadline;
    }
}

fn run_ingest(config: &IngestConfig, summary_json: bool) -> Result<(), AppError> {
    let job = IngestJob {
        course: config.course.clone(),
        classlist: config.paths.classlist.clone(),
        learn_dir: config.paths.learn_dir.clone(),
        output_dir: config.paths.output_dir.clone(),
        deadline: config.deadline,
    };

    let report = IngestPipeline::learn().run(&job, Local::now().naive_local())?;
    if summary_json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
    } else {
        render_report(&report);
    }
    Ok(())
}

fn render_report(report: &IngestReport) {
    let summary = &report.summary;
    println!("Course: {}", summary.course);
    println!("Students in class list: {}", summary.students);
    println!(
        "Successful submissions: {} ({} late)",
        summary.placed, summary.late
    );
    println!(
        "Bad submissions: {} ({} quarantined, {} with no submission)",
        report.entries.bad_submissions().len(),
        summary.quarantined,
        summary.unmatched
    );

    for entry in report.entries.bad_submissions() {
        let row = ReportRow::from_submission(entry);
        println!("- {} ({}): {}", row.identifier, row.exam_number, row.reason);
    }

    println!("\nReports");
    println!("- {}", summary.reports.success.display());
    println!("- {}", summary.reports.errors.display());
}

fn check_lines(students: &[StudentRecord]) -> Vec<String> {
    let mut lines = Vec::new();
    for student in students {
        if let Err(reason) = check_identifier(&student.identifier) {
            lines.push(format!("{}: identifier {}", student.identifier, reason));
        }
        if let Err(reason) = check_exam_number(&student.exam_number) {
            lines.push(format!(
                "{}: exam number '{}' {}",
                student.identifier, student.exam_number, reason
            ));
        }
    }
    if lines.is_empty() {
        lines.push(format!("{} rows checked, no problems found", students.len()));
    }
    lines
}

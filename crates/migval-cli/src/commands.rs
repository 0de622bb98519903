use colored::Colorize;
use migval_runner::{ConfigError, ExecutionManager, RunConfig, RunError, RunOutcome};
use migval_store::{ResultStoreReader, StoreContents};
use serde::Serialize;

use crate::cli::*;

pub const EXIT_SUCCESS: u8 = 0;
/// The run was aborted or could not finish.
pub const EXIT_ABORTED: u8 = 1;
/// The configuration was rejected before any object was processed.
pub const EXIT_CONFIG: u8 = 2;

pub fn run_command(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Command::Validate(args) => cmd_validate(args, cli.format),
        Command::Summary(args) => cmd_summary(args, cli.format),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn cmd_validate(args: ValidateArgs, format: OutputFormat) -> anyhow::Result<u8> {
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => return Ok(config_failure(&e)),
    };
    let results_dir = config.results_dir.clone();
    match ExecutionManager::run_local(config) {
        Ok(outcome) => {
            print_outcome(&outcome, format)?;
            if outcome.success() {
                if format == OutputFormat::Text {
                    println!("  Results: {}", results_dir.display().to_string().bold());
                }
                Ok(EXIT_SUCCESS)
            } else {
                Ok(EXIT_ABORTED)
            }
        }
        Err(RunError::Config(e)) => Ok(config_failure(&e)),
        Err(e) => {
            eprintln!("{} {e}", "run failed:".red().bold());
            Ok(EXIT_ABORTED)
        }
    }
}

/// Load the file and apply command-line overrides.
fn load_config(args: &ValidateArgs) -> Result<RunConfig, ConfigError> {
    let mut config = RunConfig::load(&args.config)?;
    if args.resume {
        config.resume = true;
    }
    if args.limit.is_some() {
        config.limit = args.limit;
    }
    config.validate()?;
    config.local_paths()?;
    Ok(config)
}

fn config_failure(e: &ConfigError) -> u8 {
    eprintln!("{} {e}", "configuration error:".red().bold());
    EXIT_CONFIG
}

fn print_outcome(outcome: &RunOutcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "success": outcome.success,
                "processed": outcome.processed,
                "failed_objects": outcome.failed_objects,
                "skipped": outcome.skipped,
                "observed": outcome.observed,
                "halted_by_limit": outcome.halted_by_limit,
                "repository_checked": outcome.repository_checked,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            if outcome.success {
                println!("{} Validation run complete", "✓".green().bold());
            } else {
                println!("{} Validation run aborted", "✗".red().bold());
            }
            println!("  Processed: {}", outcome.processed.to_string().bold());
            if outcome.failed_objects > 0 {
                println!("  With failures: {}", outcome.failed_objects.to_string().red());
            }
            if outcome.skipped > 0 {
                println!("  Skipped (resumed): {}", outcome.skipped);
            }
            if outcome.halted_by_limit {
                println!("  Stopped at the run limit; resume to continue.");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// summary
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Summary {
    pub objects: usize,
    pub failed_objects: usize,
    pub results: usize,
    pub failed_results: usize,
    pub repository: Vec<RepositoryLine>,
    pub per_object: Vec<ObjectLine>,
    pub unreadable_files: usize,
}

#[derive(Debug, Serialize)]
pub struct ObjectLine {
    pub pid: String,
    pub target: Option<String>,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct RepositoryLine {
    #[serde(rename = "type")]
    pub validation_type: String,
    pub status: String,
    pub details: String,
}

pub fn summarize(contents: &StoreContents) -> Summary {
    let per_object: Vec<ObjectLine> = contents
        .objects
        .iter()
        .map(|set| ObjectLine {
            pid: set.source_object_id().to_string(),
            target: set.target_object_id().map(str::to_string),
            passed: set.pass_count(),
            failed: set.fail_count(),
        })
        .collect();
    Summary {
        objects: per_object.len(),
        failed_objects: per_object.iter().filter(|o| o.failed > 0).count(),
        results: per_object.iter().map(|o| o.passed + o.failed).sum(),
        failed_results: per_object.iter().map(|o| o.failed).sum(),
        repository: contents
            .repository
            .iter()
            .map(|r| RepositoryLine {
                validation_type: r.validation_type.as_str().to_string(),
                status: r.status.to_string(),
                details: r.details.clone(),
            })
            .collect(),
        per_object,
        unreadable_files: contents.skipped.len(),
    }
}

fn cmd_summary(args: SummaryArgs, format: OutputFormat) -> anyhow::Result<u8> {
    let contents = ResultStoreReader::new(&args.results).read_all()?;
    let summary = summarize(&contents);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(EXIT_SUCCESS)
}

fn print_summary(summary: &Summary) {
    for line in &summary.per_object {
        let mark = if line.failed == 0 { "✓".green() } else { "✗".red() };
        println!(
            "{} {}  {} passed, {} failed",
            mark,
            line.pid.bold(),
            line.passed,
            line.failed
        );
    }
    for line in &summary.repository {
        let status = if line.status == "OK" { line.status.green() } else { line.status.red() };
        println!("  {} {}: {}", line.validation_type.cyan(), status, line.details);
    }
    println!(
        "Objects: {} ({} with failures), results: {} ({} failed)",
        summary.objects.to_string().bold(),
        summary.failed_objects,
        summary.results,
        summary.failed_results
    );
    if summary.unreadable_files > 0 {
        println!("  {} unreadable result files", summary.unreadable_files.to_string().yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migval_store::{ResultSink, ResultStore};
    use migval_types::{ResultStatus, ValidationResult, ValidationType};

    fn object_results(pid: &str, fail: bool) -> Vec<ValidationResult> {
        let target = format!("info:fedora/{pid}");
        vec![
            ValidationResult::object(
                0,
                ResultStatus::Ok,
                ValidationType::SourceObjectExistsInTarget,
                pid,
                &target,
                "",
            ),
            ValidationResult::resource(
                1,
                ResultStatus::from_bool(!fail),
                ValidationType::BinaryChecksum,
                pid,
                &target,
                format!("{pid}/MASTER/MASTER.0"),
                format!("{target}/MASTER"),
                "",
            ),
        ]
    }

    #[test]
    fn summary_counts_objects_and_repository_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store.write(&object_results("demo:1", false)).unwrap();
        store.write(&object_results("demo:2", true)).unwrap();
        store
            .write(&[ValidationResult::repository(
                0,
                ResultStatus::Fail,
                ValidationType::RepositoryResourceCount,
                "source objects: 2, target objects: 3",
            )])
            .unwrap();

        let contents = ResultStoreReader::new(dir.path()).read_all().unwrap();
        let summary = summarize(&contents);

        assert_eq!(summary.objects, 2);
        assert_eq!(summary.failed_objects, 1);
        assert_eq!(summary.results, 4);
        assert_eq!(summary.failed_results, 1);
        assert_eq!(summary.repository.len(), 1);
        assert_eq!(summary.repository[0].status, "FAIL");
        assert_eq!(summary.per_object[0].pid, "demo:1");
        assert_eq!(summary.per_object[1].failed, 1);
        assert_eq!(summary.per_object[1].target.as_deref(), Some("info:fedora/demo:2"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["repository"][0]["type"], "REPOSITORY_RESOURCE_COUNT");
    }

    #[test]
    fn empty_store_summarizes_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let contents = ResultStoreReader::new(dir.path()).read_all().unwrap();
        let summary = summarize(&contents);
        assert_eq!(summary.objects, 0);
        assert!(summary.repository.is_empty());
    }

    #[test]
    fn invalid_config_maps_to_config_exit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "workers = 0\n").unwrap();
        let args = ValidateArgs {
            config: path,
            resume: false,
            limit: None,
        };
        assert!(matches!(load_config(&args), Err(ConfigError::Invalid(_))));
        let code = cmd_validate(args, OutputFormat::Text).unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }

    #[test]
    fn missing_source_dir_is_a_config_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "source_dir = \"nowhere\"\ntarget_root = \"target\"\n").unwrap();
        let args = ValidateArgs {
            config: path,
            resume: true,
            limit: Some(5),
        };
        assert!(matches!(load_config(&args), Err(ConfigError::Invalid(_))));
    }
}

//! Command implementations

use crate::cli::{MeasureArgs, OutputFormat, SubmitArgs};
use crate::collector::{collect_files, MatchingOptions, MeasuredFile};
use crate::config::ProjectConfig;
use crate::repo::get_repo_info;
use crate::submission::{submit_reading, SubmissionOptions};
use anyhow::Result;
use std::path::Path;

/// Measure the given files and submit them as a reading.
pub async fn submit(args: &SubmitArgs, api_url: Option<String>) -> Result<()> {
    let config = ProjectConfig::load_or_default(Path::new("."))?;

    let matching = MatchingOptions {
        include: args.include.clone().or_else(|| config.include.clone()),
        exclude: args.exclude.clone().or_else(|| config.exclude.clone()),
    };
    let files = collect_files(&args.files, &matching)?;

    let explicit = SubmissionOptions {
        project_key: args.project_key.clone(),
        api_url,
        bundleset: args.bundleset.clone(),
        commit: args.commit.clone(),
        commit_message: None,
        parent_commits: args.parent_commits.clone(),
        branch: args.branch.clone(),
        base_branch: None,
        is_feature_branch: None,
        only_if_env: args.only_if_env.clone(),
    };

    submit_reading(&files, &explicit, &config).await
}

/// Measure the given files and print the result without submitting.
pub fn measure(args: &MeasureArgs, format: OutputFormat) -> Result<()> {
    let config = ProjectConfig::load_or_default(Path::new("."))?;

    let matching = MatchingOptions {
        include: args.include.clone().or_else(|| config.include.clone()),
        exclude: args.exclude.clone().or_else(|| config.exclude.clone()),
    };
    let files = collect_files(&args.files, &matching)?;

    match format {
        OutputFormat::Json => print_files_json(&files)?,
        OutputFormat::Text => print_files_text(&files),
    }

    Ok(())
}

/// Print the source control info a submission would pick up.
pub fn repo_info(format: OutputFormat) -> Result<()> {
    let info = get_repo_info(Path::new("."));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Text => match info {
            Some(info) => {
                println!("System: {}", info.system);
                println!("Commit: {}", info.commit_id);
                if let Some(ref message) = info.commit_message {
                    println!("Message: {}", message.lines().next().unwrap_or(""));
                }
                println!("Branch: {}", info.branch.as_deref().unwrap_or("(detached)"));
                if let Some(ref tag) = info.tag {
                    println!("Tag: {}", tag);
                }
                if let Some(ref parents) = info.parent_commit_ids {
                    println!("Parents: {}", parents.join(", "));
                }
            }
            None => println!("Not inside a git repository."),
        },
    }

    Ok(())
}

/// Print measured files in JSON format
pub fn print_files_json(files: &[MeasuredFile]) -> Result<()> {
    let json = serde_json::to_string_pretty(files)?;
    println!("{}", json);
    Ok(())
}

/// Print measured files as a table
pub fn print_files_text(files: &[MeasuredFile]) {
    if files.is_empty() {
        println!("No files measured.");
        return;
    }

    let name_width = files
        .iter()
        .map(|f| f.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    println!(
        "{:<name_width$}  {:>10}  {:>10}  HASH",
        "NAME", "RAW", "GZIP"
    );
    for file in files {
        println!(
            "{:<name_width$}  {:>10}  {:>10}  {}",
            file.name,
            file.raw_size,
            file.gzip_size,
            if file.hash.is_empty() { "-" } else { &file.hash },
        );
    }

    println!();
    println!("✓ {} file(s) measured", files.len());
}

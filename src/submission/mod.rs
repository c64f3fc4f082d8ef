//! Submission pipeline.
//!
//! Several entry points submit readings (the CLI today, maybe others later)
//! and they should agree on where values come from: explicit options beat
//! `SIZEWATCH_*` environment variables, which beat the config file, CI
//! detection and git metadata. Every chosen value remembers its source so
//! the pre-submission report can say where it was found.

use crate::api::{Api, FeatureBranch, Reading};
use crate::ci::{CiEvent, CiInfo, CiSources, Env};
use crate::collector::MeasuredFile;
use crate::config::ProjectConfig;
use crate::repo::RepoInfo;
use anyhow::Result;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.sizewatch.io/api";

/// Errors for configuration the user must fix before a reading can be sent.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("the apiUrl option needs to be set to something")]
    MissingApiUrl,

    #[error("the projectKey option needs to be set to something")]
    MissingProjectKey,

    #[error("the bundleset option needs to be set to something")]
    MissingBundleset,
}

/// User-provided submission options, all optional at this stage.
#[derive(Debug, Clone, Default)]
pub struct SubmissionOptions {
    pub project_key: Option<String>,
    pub api_url: Option<String>,
    pub bundleset: Option<String>,
    pub commit: Option<String>,
    pub commit_message: Option<String>,
    pub parent_commits: Option<Vec<String>>,
    pub branch: Option<String>,
    pub base_branch: Option<String>,
    pub is_feature_branch: Option<bool>,
    pub only_if_env: Option<String>,
}

/// A merged value together with a human-readable description of where it
/// came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue<T> {
    pub value: Option<T>,
    pub source: Option<String>,
}

impl<T> Default for ResolvedValue<T> {
    fn default() -> Self {
        Self {
            value: None,
            source: None,
        }
    }
}

/// All submission values after precedence merging.
#[derive(Debug, Default)]
pub struct ResolvedSubmission {
    pub api_url: ResolvedValue<String>,
    pub project_key: ResolvedValue<String>,
    pub bundleset: ResolvedValue<String>,
    pub commit: ResolvedValue<String>,
    pub commit_message: ResolvedValue<String>,
    pub branch: ResolvedValue<String>,
    pub parent_commits: ResolvedValue<Vec<String>>,
    pub base_branch: ResolvedValue<String>,
    pub is_feature_branch: ResolvedValue<bool>,
}

/// Values that count as "not set" during precedence merging.
trait EmptyValue {
    fn is_empty_value(&self) -> bool;
}

impl EmptyValue for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl EmptyValue for Vec<String> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl EmptyValue for bool {
    // An explicit `false` falls through to the next source, so a pull
    // request detected by CI still marks the reading as a feature branch.
    fn is_empty_value(&self) -> bool {
        !self
    }
}

/// First non-empty candidate wins; its source label is kept for display.
fn pick<T: EmptyValue>(candidates: Vec<(Option<T>, &str)>) -> ResolvedValue<T> {
    for (candidate, source) in candidates {
        if let Some(value) = candidate {
            if !value.is_empty_value() {
                return ResolvedValue {
                    value: Some(value),
                    source: Some(source.to_string()),
                };
            }
        }
    }
    ResolvedValue::default()
}

/// Read `SIZEWATCH_*` options from an environment snapshot.
pub fn read_options_from_env(env: &Env) -> SubmissionOptions {
    let read = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

    SubmissionOptions {
        project_key: read("SIZEWATCH_KEY"),
        api_url: read("SIZEWATCH_APIURL"),
        bundleset: read("SIZEWATCH_BUNDLESET"),
        commit: read("SIZEWATCH_COMMIT"),
        commit_message: read("SIZEWATCH_COMMITMESSAGE"),
        parent_commits: read("SIZEWATCH_PARENTCOMMITS")
            .map(|v| v.split(',').map(str::to_string).collect()),
        branch: read("SIZEWATCH_BRANCH"),
        base_branch: read("SIZEWATCH_BASEBRANCH"),
        is_feature_branch: read("SIZEWATCH_ISFEATUREBRANCH").map(|v| as_bool(&v)),
        only_if_env: read("SIZEWATCH_ONLYIFENV"),
    }
}

/// Is the given string a known false?
fn as_bool(value: &str) -> bool {
    !(value.is_empty() || value.eq_ignore_ascii_case("false") || value == "0")
}

/// Merge all sources of submission values by precedence.
pub fn resolve_submission(
    explicit: &SubmissionOptions,
    env_opts: &SubmissionOptions,
    config: &ProjectConfig,
    ci: Option<&(CiInfo, CiSources)>,
    repo: Option<&RepoInfo>,
) -> ResolvedSubmission {
    let ci_info = ci.map(|(info, _)| info);
    let ci_sources = ci.map(|(_, sources)| sources);

    let ci_value = |value: Option<&Option<String>>, source: Option<&Option<String>>| {
        let value = value.and_then(|v| v.clone());
        let source = format!(
            "found in CI env var {}",
            source
                .and_then(|s| s.as_deref())
                .unwrap_or("unknown")
        );
        (value, source)
    };
    let repo_src = format!(
        "found via {} repo",
        repo.map(|r| r.system).unwrap_or("source control")
    );

    let (ci_commit, ci_commit_src) = ci_value(
        ci_info.map(|c| &c.commit_id),
        ci_sources.map(|s| &s.commit_id),
    );
    let (ci_message, ci_message_src) = ci_value(
        ci_info.map(|c| &c.commit_message),
        ci_sources.map(|s| &s.commit_message),
    );
    let (ci_branch, ci_branch_src) = ci_value(
        ci_info.map(|c| &c.branch),
        ci_sources.map(|s| &s.branch),
    );
    let (ci_base_branch, ci_base_branch_src) = ci_value(
        ci_info.map(|c| &c.base_branch),
        ci_sources.map(|s| &s.base_branch),
    );
    let ci_is_feature = ci_info.and_then(|c| c.event.map(|e| e == CiEvent::PullRequest));
    let ci_event_src = format!(
        "found in CI env var {}",
        ci_sources
            .and_then(|s| s.event.as_deref())
            .unwrap_or("unknown")
    );

    ResolvedSubmission {
        api_url: pick(vec![
            (explicit.api_url.clone(), "options"),
            (env_opts.api_url.clone(), "environment"),
            (config.api_url.clone(), "config file"),
            (Some(DEFAULT_API_URL.to_string()), "default"),
        ]),
        project_key: pick(vec![
            (explicit.project_key.clone(), "options"),
            (env_opts.project_key.clone(), "environment"),
        ]),
        bundleset: pick(vec![
            (explicit.bundleset.clone(), "options"),
            (env_opts.bundleset.clone(), "environment"),
            (config.bundleset.clone(), "config file"),
        ]),
        commit: pick(vec![
            (explicit.commit.clone(), "specified on command line"),
            (env_opts.commit.clone(), "environment"),
            (ci_commit, ci_commit_src.as_str()),
            (repo.map(|r| r.commit_id.clone()), repo_src.as_str()),
        ]),
        commit_message: pick(vec![
            (env_opts.commit_message.clone(), "environment"),
            (ci_message, ci_message_src.as_str()),
            (
                repo.and_then(|r| r.commit_message.clone()),
                repo_src.as_str(),
            ),
        ]),
        branch: pick(vec![
            (explicit.branch.clone(), "specified on command line"),
            (env_opts.branch.clone(), "environment"),
            (ci_branch, ci_branch_src.as_str()),
            (repo.and_then(|r| r.branch.clone()), repo_src.as_str()),
        ]),
        parent_commits: pick(vec![
            (
                explicit.parent_commits.clone(),
                "specified on command line",
            ),
            (env_opts.parent_commits.clone(), "environment"),
            (
                repo.and_then(|r| r.parent_commit_ids.clone()),
                repo_src.as_str(),
            ),
        ]),
        base_branch: pick(vec![
            (explicit.base_branch.clone(), "options"),
            (env_opts.base_branch.clone(), "environment"),
            (ci_base_branch, ci_base_branch_src.as_str()),
        ]),
        is_feature_branch: pick(vec![
            (explicit.is_feature_branch, "options"),
            (env_opts.is_feature_branch, "environment"),
            (ci_is_feature, ci_event_src.as_str()),
        ]),
    }
}

/// Make sure everything the API requires is present.
pub fn validate(resolved: &ResolvedSubmission) -> Result<(), ValidationError> {
    if resolved.api_url.value.is_none() {
        return Err(ValidationError::MissingApiUrl);
    }
    if resolved.project_key.value.is_none() {
        return Err(ValidationError::MissingProjectKey);
    }
    if resolved.bundleset.value.is_none() {
        return Err(ValidationError::MissingBundleset);
    }
    Ok(())
}

fn report_value(label: &str, value: Option<&str>, source: Option<&str>) {
    match value {
        Some(value) => {
            let source = source.unwrap_or("not found");
            println!("  {label}: {value} ({source})");
        }
        None => println!("  {label}: unset"),
    }
}

/// Print what is about to be submitted and where each value came from.
fn report(files: &[MeasuredFile], resolved: &ResolvedSubmission) {
    println!("Submitting reading with {} files:", files.len());
    report_value(
        "Commit",
        resolved.commit.value.as_deref(),
        resolved.commit.source.as_deref(),
    );
    let parents = resolved
        .parent_commits
        .value
        .as_ref()
        .map(|list| list.join(","));
    report_value(
        "Parent Commits",
        parents.as_deref(),
        resolved.parent_commits.source.as_deref(),
    );
    report_value(
        "Branch",
        resolved.branch.value.as_deref(),
        resolved.branch.source.as_deref(),
    );
    if resolved.base_branch.value.is_some() {
        report_value(
            "Base Branch",
            resolved.base_branch.value.as_deref(),
            resolved.base_branch.source.as_deref(),
        );
    } else {
        let flag = resolved.is_feature_branch.value.map(|v| v.to_string());
        report_value(
            "Is Feature Branch",
            flag.as_deref(),
            resolved.is_feature_branch.source.as_deref(),
        );
    }
}

/// Submit measured files as a reading.
///
/// Gathers provenance from CI and git, merges it with explicit options,
/// environment variables and the config file, validates, and posts to the
/// API. When `only_if_env` names an unset variable the submission is
/// skipped without error.
pub async fn submit_reading(
    files: &[MeasuredFile],
    explicit: &SubmissionOptions,
    config: &ProjectConfig,
) -> Result<()> {
    let env: Env = std::env::vars().collect();
    let env_opts = read_options_from_env(&env);

    let only_if_env = explicit
        .only_if_env
        .clone()
        .or_else(|| env_opts.only_if_env.clone());
    if let Some(var) = only_if_env {
        if env.get(&var).map(|v| v.is_empty()).unwrap_or(true) {
            tracing::info!(var = %var, "submission skipped");
            println!("Skipping submission, because environment variable {var} is not set.");
            return Ok(());
        }
    }

    let ci = crate::ci::detect_ci_from(&env);
    let repo = crate::repo::get_repo_info(std::path::Path::new("."));

    let resolved = resolve_submission(explicit, &env_opts, config, ci.as_ref(), repo.as_ref());
    validate(&resolved)?;

    report(files, &resolved);

    // A known base branch implies a feature branch; the API accepts the
    // branch name in place of the boolean.
    let is_feature_branch = match (
        resolved.base_branch.value.clone(),
        resolved.is_feature_branch.value,
    ) {
        (Some(base), _) => Some(FeatureBranch::BaseBranch(base)),
        (None, Some(flag)) => Some(FeatureBranch::Flag(flag)),
        (None, None) => None,
    };

    let reading = Reading {
        files,
        bundleset: resolved.bundleset.value.clone().unwrap_or_default(),
        commit: resolved.commit.value.clone(),
        commit_message: resolved.commit_message.value.clone(),
        branch: resolved.branch.value.clone(),
        is_feature_branch,
        parent_commits: resolved.parent_commits.value.clone(),
    };

    let api = Api::new(
        resolved.api_url.value.clone().unwrap_or_default(),
        resolved.project_key.value.clone().unwrap_or_default(),
    );
    api.submit_reading(&reading).await?;

    println!();
    println!("✓ Submitted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> Env {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn repo_info() -> RepoInfo {
        RepoInfo {
            system: "git",
            commit_id: "1111111111111111111111111111111111111111".to_string(),
            commit_message: Some("from repo".to_string()),
            branch: Some("repo-branch".to_string()),
            tag: None,
            parent_commit_ids: Some(vec!["0000000000".to_string()]),
        }
    }

    #[test]
    fn test_env_option_reading() {
        let env = env(&[
            ("SIZEWATCH_KEY", "secret"),
            ("SIZEWATCH_PARENTCOMMITS", "aaa,bbb"),
            ("SIZEWATCH_ISFEATUREBRANCH", "false"),
        ]);
        let opts = read_options_from_env(&env);
        assert_eq!(opts.project_key.as_deref(), Some("secret"));
        assert_eq!(
            opts.parent_commits,
            Some(vec!["aaa".to_string(), "bbb".to_string()])
        );
        assert_eq!(opts.is_feature_branch, Some(false));
    }

    #[test]
    fn test_as_bool() {
        assert!(!as_bool("false"));
        assert!(!as_bool("FALSE"));
        assert!(!as_bool("0"));
        assert!(as_bool("true"));
        assert!(as_bool("yes"));
    }

    #[test]
    fn test_explicit_options_beat_everything() {
        let explicit = SubmissionOptions {
            commit: Some("explicit-commit".to_string()),
            ..Default::default()
        };
        let env_opts = SubmissionOptions {
            commit: Some("env-commit".to_string()),
            ..Default::default()
        };
        let resolved = resolve_submission(
            &explicit,
            &env_opts,
            &ProjectConfig::default(),
            None,
            Some(&repo_info()),
        );

        assert_eq!(resolved.commit.value.as_deref(), Some("explicit-commit"));
        assert_eq!(
            resolved.commit.source.as_deref(),
            Some("specified on command line")
        );
    }

    #[test]
    fn test_repo_is_the_last_resort() {
        let resolved = resolve_submission(
            &SubmissionOptions::default(),
            &SubmissionOptions::default(),
            &ProjectConfig::default(),
            None,
            Some(&repo_info()),
        );

        assert_eq!(
            resolved.commit.value.as_deref(),
            Some("1111111111111111111111111111111111111111")
        );
        assert_eq!(resolved.commit.source.as_deref(), Some("found via git repo"));
        assert_eq!(resolved.branch.value.as_deref(), Some("repo-branch"));
        assert_eq!(
            resolved.parent_commits.value,
            Some(vec!["0000000000".to_string()])
        );
    }

    #[test]
    fn test_ci_beats_repo() {
        let ci_env: HashMap<String, String> = [
            ("CIRCLECI".to_string(), "true".to_string()),
            ("CIRCLE_SHA1".to_string(), "ci-commit".to_string()),
            ("CIRCLE_BRANCH".to_string(), "ci-branch".to_string()),
        ]
        .into_iter()
        .collect();
        let ci = crate::ci::detect_ci_from(&ci_env).unwrap();

        let resolved = resolve_submission(
            &SubmissionOptions::default(),
            &SubmissionOptions::default(),
            &ProjectConfig::default(),
            Some(&ci),
            Some(&repo_info()),
        );

        assert_eq!(resolved.commit.value.as_deref(), Some("ci-commit"));
        assert_eq!(
            resolved.commit.source.as_deref(),
            Some("found in CI env var CIRCLE_SHA1")
        );
    }

    #[test]
    fn test_api_url_falls_back_to_default() {
        let resolved = resolve_submission(
            &SubmissionOptions::default(),
            &SubmissionOptions::default(),
            &ProjectConfig::default(),
            None,
            None,
        );
        assert_eq!(resolved.api_url.value.as_deref(), Some(DEFAULT_API_URL));
        assert_eq!(resolved.api_url.source.as_deref(), Some("default"));
    }

    #[test]
    fn test_config_file_beats_default_api_url() {
        let config = ProjectConfig {
            api_url: Some("https://example.com/api".to_string()),
            ..Default::default()
        };
        let resolved = resolve_submission(
            &SubmissionOptions::default(),
            &SubmissionOptions::default(),
            &config,
            None,
            None,
        );
        assert_eq!(
            resolved.api_url.value.as_deref(),
            Some("https://example.com/api")
        );
        assert_eq!(resolved.api_url.source.as_deref(), Some("config file"));
    }

    #[test]
    fn test_empty_strings_count_as_unset() {
        let explicit = SubmissionOptions {
            branch: Some(String::new()),
            ..Default::default()
        };
        let resolved = resolve_submission(
            &explicit,
            &SubmissionOptions::default(),
            &ProjectConfig::default(),
            None,
            Some(&repo_info()),
        );
        assert_eq!(resolved.branch.value.as_deref(), Some("repo-branch"));
    }

    #[test]
    fn test_explicit_false_feature_flag_falls_through_to_ci() {
        let ci_env: HashMap<String, String> = [
            ("CIRCLECI".to_string(), "true".to_string()),
            ("CI_PULL_REQUEST".to_string(), "https://pr".to_string()),
        ]
        .into_iter()
        .collect();
        let ci = crate::ci::detect_ci_from(&ci_env).unwrap();

        let explicit = SubmissionOptions {
            is_feature_branch: Some(false),
            ..Default::default()
        };
        let resolved = resolve_submission(
            &explicit,
            &SubmissionOptions::default(),
            &ProjectConfig::default(),
            Some(&ci),
            None,
        );
        assert_eq!(resolved.is_feature_branch.value, Some(true));
    }

    #[test]
    fn test_validation() {
        let mut resolved = ResolvedSubmission::default();
        assert!(matches!(
            validate(&resolved),
            Err(ValidationError::MissingApiUrl)
        ));

        resolved.api_url.value = Some(DEFAULT_API_URL.to_string());
        assert!(matches!(
            validate(&resolved),
            Err(ValidationError::MissingProjectKey)
        ));

        resolved.project_key.value = Some("secret".to_string());
        assert!(matches!(
            validate(&resolved),
            Err(ValidationError::MissingBundleset)
        ));

        resolved.bundleset.value = Some("web".to_string());
        assert!(validate(&resolved).is_ok());
    }
}

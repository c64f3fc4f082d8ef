//! CI environment detection.
//!
//! Each supported provider declares which environment variables carry its
//! build metadata. Detection walks the provider table in order, returns the
//! first provider whose presence check passes, and records for every value
//! the variable name it was read from so the submission report can explain
//! where a value came from.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Environment snapshot. Passed in explicitly so the table is testable
/// without mutating the process environment.
pub type Env = HashMap<String, String>;

/// Kind of build a CI run represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CiEvent {
    Push,
    PullRequest,
}

impl fmt::Display for CiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CiEvent::Push => write!(f, "push"),
            CiEvent::PullRequest => write!(f, "pull_request"),
        }
    }
}

/// Where a provider reads one metadata value from.
enum EnvSource {
    /// The provider does not expose this value.
    None,
    /// A single variable.
    Var(&'static str),
    /// Ordered fallback list; the first non-empty variable wins.
    Vars(&'static [&'static str]),
    /// Custom logic over the environment. Returns the value and the
    /// variable name it was derived from.
    Custom(fn(&Env) -> Option<(String, String)>),
}

/// Like [`EnvSource`], for the push/pull-request event.
enum EventSource {
    None,
    Custom(fn(&Env) -> Option<(CiEvent, String)>),
}

/// How to tell whether a provider's environment is active.
enum Presence {
    Var(&'static str),
    /// Every listed variable must hold exactly the given value.
    Matches(&'static [(&'static str, &'static str)]),
}

struct CiProvider {
    id: &'static str,
    name: &'static str,
    presence: Presence,
    branch: EnvSource,
    tag: EnvSource,
    commit_id: EnvSource,
    commit_message: EnvSource,
    event: EventSource,
    base_branch: EnvSource,
}

/// Metadata resolved from a CI environment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CiInfo {
    pub id: String,
    pub name: String,
    pub commit_id: Option<String>,
    pub commit_message: Option<String>,
    pub tag: Option<String>,
    pub branch: Option<String>,
    pub event: Option<CiEvent>,
    pub base_branch: Option<String>,
}

/// For each resolved value, the environment variable it was read from.
#[derive(Debug, Clone, Default)]
pub struct CiSources {
    pub commit_id: Option<String>,
    pub commit_message: Option<String>,
    pub tag: Option<String>,
    pub branch: Option<String>,
    pub event: Option<String>,
    pub base_branch: Option<String>,
}

// https://circleci.com/docs/1.0/environment-variables/
const CIRCLE_CI: CiProvider = CiProvider {
    id: "circleci",
    name: "CircleCI",
    presence: Presence::Var("CIRCLECI"),
    branch: EnvSource::Var("CIRCLE_BRANCH"),
    tag: EnvSource::Var("CIRCLE_TAG"),
    commit_id: EnvSource::Var("CIRCLE_SHA1"),
    commit_message: EnvSource::None,
    event: EventSource::Custom(|env| {
        if get(env, "CI_PULL_REQUEST").is_some() {
            Some((CiEvent::PullRequest, "CI_PULL_REQUEST".to_string()))
        } else {
            Some((CiEvent::Push, "missing CI_PULL_REQUEST".to_string()))
        }
    }),
    base_branch: EnvSource::None,
};

// https://docs.travis-ci.com/user/environment-variables/
const TRAVIS: CiProvider = CiProvider {
    id: "travis",
    name: "Travis",
    presence: Presence::Var("TRAVIS"),
    // If it's a pull request, TRAVIS_BRANCH contains the base branch!
    branch: EnvSource::Vars(&["TRAVIS_PULL_REQUEST_BRANCH", "TRAVIS_BRANCH"]),
    tag: EnvSource::Var("TRAVIS_TAG"),
    commit_id: EnvSource::Vars(&["TRAVIS_PULL_REQUEST_SHA", "TRAVIS_COMMIT"]),
    commit_message: EnvSource::Var("TRAVIS_COMMIT_MESSAGE"),
    event: EventSource::Custom(|env| {
        if get(env, "TRAVIS_EVENT_TYPE") == Some("pull_request") {
            Some((CiEvent::PullRequest, "TRAVIS_EVENT_TYPE".to_string()))
        } else {
            Some((CiEvent::Push, "TRAVIS_EVENT_TYPE".to_string()))
        }
    }),
    // TRAVIS_BRANCH, but only if it's a pull request.
    base_branch: EnvSource::Custom(|env| {
        if get(env, "TRAVIS_PULL_REQUEST_BRANCH").is_some() {
            get(env, "TRAVIS_BRANCH").map(|v| (v.to_string(), "TRAVIS_BRANCH".to_string()))
        } else {
            None
        }
    }),
};

// https://wiki.jenkins.io/display/JENKINS/Building+a+software+project
const JENKINS: CiProvider = CiProvider {
    id: "jenkins",
    name: "Jenkins",
    presence: Presence::Var("JENKINS_URL"),
    branch: EnvSource::Vars(&["GIT_BRANCH", "CVS_BRANCH"]),
    tag: EnvSource::None,
    commit_id: EnvSource::Vars(&["GIT_COMMIT", "SVN_REVISION"]),
    commit_message: EnvSource::None,
    event: EventSource::None,
    base_branch: EnvSource::None,
};

// https://www.appveyor.com/docs/environment-variables/
const APPVEYOR: CiProvider = CiProvider {
    id: "appveyor",
    name: "AppVeyor",
    presence: Presence::Var("APPVEYOR"),
    // For a pull request APPVEYOR_REPO_BRANCH holds the base branch; there
    // is no variable with the feature branch itself.
    branch: EnvSource::Custom(|env| {
        if get(env, "APPVEYOR_PULL_REQUEST_NUMBER").is_some() {
            None
        } else {
            get(env, "APPVEYOR_REPO_BRANCH")
                .map(|v| (v.to_string(), "APPVEYOR_REPO_BRANCH".to_string()))
        }
    }),
    tag: EnvSource::Var("APPVEYOR_REPO_TAG_NAME"),
    commit_id: EnvSource::Var("APPVEYOR_REPO_COMMIT"),
    commit_message: EnvSource::Var("APPVEYOR_REPO_COMMIT_MESSAGE"),
    event: EventSource::Custom(|env| {
        if get(env, "APPVEYOR_PULL_REQUEST_NUMBER").is_some() {
            Some((CiEvent::PullRequest, "APPVEYOR_PULL_REQUEST_NUMBER".to_string()))
        } else {
            Some((CiEvent::Push, "missing APPVEYOR_PULL_REQUEST_NUMBER".to_string()))
        }
    }),
    base_branch: EnvSource::Custom(|env| {
        if get(env, "APPVEYOR_PULL_REQUEST_NUMBER").is_some() {
            get(env, "APPVEYOR_REPO_BRANCH")
                .map(|v| (v.to_string(), "APPVEYOR_REPO_BRANCH".to_string()))
        } else {
            None
        }
    }),
};

// http://readme.drone.io/0.5/usage/environment-reference/
const DRONE: CiProvider = CiProvider {
    id: "drone",
    name: "Drone CI",
    presence: Presence::Var("DRONE"),
    branch: EnvSource::Var("DRONE_COMMIT_BRANCH"),
    tag: EnvSource::Custom(|env| {
        if get(env, "DRONE_COMMIT_REF") != get(env, "DRONE_COMMIT_BRANCH") {
            get(env, "DRONE_COMMIT_REF")
                .map(|v| (v.to_string(), "DRONE_COMMIT_REF".to_string()))
        } else {
            None
        }
    }),
    commit_id: EnvSource::Var("DRONE_COMMIT_SHA"),
    commit_message: EnvSource::Var("DRONE_COMMIT_MESSAGE"),
    // Can be push, pull_request or tag; tag builds carry no event.
    event: EventSource::Custom(|env| match get(env, "DRONE_BUILD_EVENT") {
        Some("push") => Some((CiEvent::Push, "DRONE_BUILD_EVENT".to_string())),
        Some("pull_request") => Some((CiEvent::PullRequest, "DRONE_BUILD_EVENT".to_string())),
        _ => None,
    }),
    base_branch: EnvSource::None,
};

// https://documentation.codeship.com/basic/builds-and-configuration/set-environment-variables/
const CODESHIP: CiProvider = CiProvider {
    id: "codeship",
    name: "Codeship",
    presence: Presence::Matches(&[("CI_NAME", "codeship")]),
    branch: EnvSource::Var("CI_BRANCH"),
    tag: EnvSource::None,
    commit_id: EnvSource::Var("CI_COMMIT_ID"),
    commit_message: EnvSource::Var("CI_MESSAGE"),
    event: EventSource::Custom(|env| {
        if get(env, "CI_PULL_REQUEST").is_some() {
            Some((CiEvent::PullRequest, "CI_PULL_REQUEST".to_string()))
        } else {
            Some((CiEvent::Push, "missing CI_PULL_REQUEST".to_string()))
        }
    }),
    base_branch: EnvSource::None,
};

// https://docs.gitlab.com/ee/ci/variables/
const GITLAB: CiProvider = CiProvider {
    id: "gitlab",
    name: "GitLab CI",
    presence: Presence::Var("GITLAB_CI"),
    // CI_COMMIT_REF_NAME might be a tag, which we don't want as a branch.
    branch: EnvSource::Custom(|env| {
        if get(env, "CI_COMMIT_REF_NAME") != get(env, "CI_COMMIT_TAG") {
            get(env, "CI_COMMIT_REF_NAME")
                .map(|v| (v.to_string(), "CI_COMMIT_REF_NAME".to_string()))
        } else {
            None
        }
    }),
    tag: EnvSource::Var("CI_COMMIT_TAG"),
    commit_id: EnvSource::Var("CI_COMMIT_SHA"),
    commit_message: EnvSource::None,
    event: EventSource::None,
    base_branch: EnvSource::None,
};

const PROVIDERS: &[CiProvider] = &[
    CIRCLE_CI, TRAVIS, JENKINS, APPVEYOR, DRONE, CODESHIP, GITLAB,
];

/// Detect the CI provider from the process environment.
pub fn detect_ci() -> Option<(CiInfo, CiSources)> {
    let env: Env = std::env::vars().collect();
    detect_ci_from(&env)
}

/// Detect the CI provider from an explicit environment snapshot. The first
/// provider in table order whose presence check passes wins.
pub fn detect_ci_from(env: &Env) -> Option<(CiInfo, CiSources)> {
    for provider in PROVIDERS {
        if !check_presence(&provider.presence, env) {
            continue;
        }

        tracing::debug!(ci = provider.id, "detected CI environment");

        let (commit_id, commit_id_src) = resolve(&provider.commit_id, env);
        let (commit_message, commit_message_src) = resolve(&provider.commit_message, env);
        let (tag, tag_src) = resolve(&provider.tag, env);
        let (branch, branch_src) = resolve(&provider.branch, env);
        let (event, event_src) = resolve_event(&provider.event, env);
        let (base_branch, base_branch_src) = resolve(&provider.base_branch, env);

        return Some((
            CiInfo {
                id: provider.id.to_string(),
                name: provider.name.to_string(),
                commit_id,
                commit_message,
                tag,
                branch,
                event,
                base_branch,
            },
            CiSources {
                commit_id: commit_id_src,
                commit_message: commit_message_src,
                tag: tag_src,
                branch: branch_src,
                event: event_src,
                base_branch: base_branch_src,
            },
        ));
    }

    None
}

/// Read a variable, treating empty values as absent.
fn get<'e>(env: &'e Env, key: &str) -> Option<&'e str> {
    env.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn check_presence(presence: &Presence, env: &Env) -> bool {
    match presence {
        Presence::Var(key) => get(env, key).is_some(),
        Presence::Matches(pairs) => pairs
            .iter()
            .all(|(key, expected)| get(env, key) == Some(*expected)),
    }
}

/// Resolve a value and the variable name it came from.
fn resolve(source: &EnvSource, env: &Env) -> (Option<String>, Option<String>) {
    match source {
        EnvSource::None => (None, None),
        EnvSource::Var(key) => match get(env, key) {
            Some(value) => (Some(value.to_string()), Some(key.to_string())),
            None => (None, None),
        },
        EnvSource::Vars(keys) => {
            for key in *keys {
                if let Some(value) = get(env, key) {
                    return (Some(value.to_string()), Some(key.to_string()));
                }
            }
            (None, None)
        }
        EnvSource::Custom(func) => match func(env) {
            Some((value, source)) => (Some(value), Some(source)),
            None => (None, None),
        },
    }
}

fn resolve_event(source: &EventSource, env: &Env) -> (Option<CiEvent>, Option<String>) {
    match source {
        EventSource::None => (None, None),
        EventSource::Custom(func) => match func(env) {
            Some((event, src)) => (Some(event), Some(src)),
            None => (None, None),
        },
    }
}

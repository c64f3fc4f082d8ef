//! Git repository metadata.
//!
//! Used as the lowest-precedence provenance source for a reading: when
//! neither the command line, the environment, nor a CI provider supplies a
//! commit or branch, we read it from the repository the command runs in.

use git2::Repository as GitRepo;
use serde::Serialize;
use std::path::Path;

/// Provenance information gathered from a source control repository.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    /// Source control system, currently always "git".
    pub system: &'static str,
    pub commit_id: String,
    pub commit_message: Option<String>,
    /// None when HEAD is detached.
    pub branch: Option<String>,
    /// A tag pointing at HEAD, if any.
    pub tag: Option<String>,
    pub parent_commit_ids: Option<Vec<String>>,
}

/// Gather repository info for the given working directory.
///
/// Absence of a repository is not an error: readings can be submitted from
/// exported build trees, so any failure here just means "no repo data".
pub fn get_repo_info(path: &Path) -> Option<RepoInfo> {
    let repo = match GitRepo::discover(path) {
        Ok(repo) => repo,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no git repository");
            return None;
        }
    };

    let head = repo.head().ok()?;
    let commit = head.peel_to_commit().ok()?;
    let commit_id = commit.id().to_string();

    let branch = if head.is_branch() {
        head.shorthand().map(str::to_string)
    } else {
        None
    };

    let commit_message = commit.message().map(|m| m.trim_end().to_string());

    let parents: Vec<String> = commit.parent_ids().map(|id| id.to_string()).collect();
    let parent_commit_ids = if parents.is_empty() { None } else { Some(parents) };

    let tag = tag_at_commit(&repo, commit.id());

    Some(RepoInfo {
        system: "git",
        commit_id,
        commit_message,
        branch,
        tag,
        parent_commit_ids,
    })
}

/// Find a tag whose target (after peeling annotated tags) is the given
/// commit.
fn tag_at_commit(repo: &GitRepo, commit_id: git2::Oid) -> Option<String> {
    let references = repo.references_glob("refs/tags/*").ok()?;

    for reference in references.flatten() {
        let points_here = reference
            .peel_to_commit()
            .map(|c| c.id() == commit_id)
            .unwrap_or(false);
        if points_here {
            return reference.shorthand().map(str::to_string);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use tempfile::TempDir;

    fn init_repo_with_commit(dir: &Path) -> GitRepo {
        let repo = GitRepo::init(dir).unwrap();
        {
            std::fs::write(dir.join("app.js"), "var x = 1;\n").unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("app.js")).unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = Signature::now("Tester", "tester@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial build", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_no_repository_yields_none() {
        let dir = TempDir::new().unwrap();
        assert!(get_repo_info(dir.path()).is_none());
    }

    #[test]
    fn test_repo_info_from_fresh_commit() {
        let dir = TempDir::new().unwrap();
        init_repo_with_commit(dir.path());

        let info = get_repo_info(dir.path()).unwrap();
        assert_eq!(info.system, "git");
        assert_eq!(info.commit_id.len(), 40);
        assert_eq!(info.commit_message.as_deref(), Some("initial build"));
        assert!(info.branch.is_some());
        assert_eq!(info.tag, None);
        // The first commit has no parents.
        assert_eq!(info.parent_commit_ids, None);
    }

    #[test]
    fn test_tag_at_head_is_reported() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo_with_commit(dir.path());

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.tag_lightweight("v1.0.0", head.as_object(), false)
            .unwrap();

        let info = get_repo_info(dir.path()).unwrap();
        assert_eq!(info.tag.as_deref(), Some("v1.0.0"));
    }
}

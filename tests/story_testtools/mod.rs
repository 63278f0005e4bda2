use anyhow::Result;
use git2::{Commit, Error, Oid, Repository, ResetType};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use chronicle::pipeline::Config;
use chronicle::story::StoryRecord;

/// The default story document: two header lines that inserts never touch.
pub const DEFAULT_HEADER: &str = "# User Stories\n\n";

/// Repository path of the story document inside test repositories.
pub const STORY_DOC: &str = "docs/user-stories/README.md";

pub struct GitRepository {
    pub repo: Repository,
    pub path: PathBuf,
}

impl GitRepository {
    pub fn init(path: &Path) -> Result<Self> {
        let repo = Repository::init(path)?;
        {
            // Commits in testtools use the repo signature; keep it local so
            // tests pass on machines without a global git identity.
            let mut config = repo.config()?;
            config.set_str("user.name", "chronicle-tests")?;
            config.set_str("user.email", "tests@chronicle.invalid")?;
        }
        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    pub fn commit(&self, path_str: Option<&str>, commit_msg: &str) -> Result<Oid, Error> {
        let mut index = self.repo.index().unwrap();
        if let Some(path_str) = path_str {
            index.add_path(&PathBuf::from(path_str)).unwrap();
        } else {
            index
                .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
                .unwrap();
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = self.repo.signature().unwrap();

        let binding = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|target_id| self.repo.find_commit(target_id).ok())
            .map(|parent_commit| vec![parent_commit])
            .unwrap_or_default();
        let parent_commits: Vec<&Commit> = binding.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, commit_msg, &tree, &parent_commits)
    }

    pub fn add_file(&self, path: &Path, file_name: &str, content: &str) -> Result<()> {
        std::fs::create_dir_all(path)?;
        let path = path.join(file_name);
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn head_oid(&self) -> Oid {
        self.repo.head().unwrap().target().unwrap()
    }

    pub fn head_branch(&self) -> String {
        self.repo.head().unwrap().shorthand().unwrap().to_string()
    }

    pub fn reset_hard(&self, oid: Oid) -> Result<()> {
        let object = self.repo.find_object(oid, None)?;
        self.repo.reset(&object, ResetType::Hard, None)?;
        Ok(())
    }
}

impl Deref for GitRepository {
    type Target = Repository;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}

/// Create a repository containing the default story document, committed.
pub fn initialize_story_repo() -> Result<(tempfile::TempDir, GitRepository)> {
    let td = tempfile::tempdir()?;
    let repo = GitRepository::init(td.path())?;
    repo.add_file(&td.path().join("docs/user-stories"), "README.md", DEFAULT_HEADER)?;
    repo.commit(None, "Add story document")?;
    Ok((td, repo))
}

/// Register a bare repository as the `origin` remote. The returned
/// tempdir must outlive every push in the test.
pub fn add_bare_remote(repo: &GitRepository) -> Result<tempfile::TempDir> {
    let td = tempfile::tempdir()?;
    Repository::init_bare(td.path())?;
    repo.remote("origin", &td.path().to_string_lossy())?;
    Ok(td)
}

/// Target of `refs/heads/<branch>` in the bare remote, if it exists.
pub fn remote_branch_oid(remote_path: &Path, branch: &str) -> Option<Oid> {
    let remote = Repository::open_bare(remote_path).unwrap();
    remote
        .find_reference(&format!("refs/heads/{branch}"))
        .ok()
        .and_then(|reference| reference.target())
}

/// The default configuration pointed at the repository's actual branch.
pub fn base_config(repo: &GitRepository) -> Config {
    Config {
        branch: repo.head_branch(),
        ..Config::default()
    }
}

pub fn sample_record(issue_number: u64) -> StoryRecord {
    StoryRecord::new(
        issue_number,
        &format!("https://example.com/issues/{issue_number}"),
        "In-Progress",
        "As a user, I want X",
    )
    .unwrap()
}

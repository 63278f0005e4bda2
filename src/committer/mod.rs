//! The committer module detects changes to the documentation subpath of
//! a git repository and publishes them as a commit on the main line.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use git2::{
    Commit, Cred, CredentialType, DiffOptions, IndexAddOption, Oid, PushOptions, RemoteCallbacks,
    Repository, Signature,
};

/// Commit author identity, distinct from the ambient git identity so
/// automation commits are attributable to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorIdentity {
    /// Author name.
    pub name: String,
    /// Author email.
    pub email: String,
}

/// The repository holding the story document. Includes helpers for
/// diffing, committing and pushing the documentation subpath.
pub struct DocRepo {
    /// Path the repository was discovered from.
    path: PathBuf,
    /// git2 repository handle.
    repo: Repository,
}

impl fmt::Debug for DocRepo {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "DocRepo for the repository at {}",
            self.path.display()
        )
    }
}

impl DocRepo {
    /// Open the repository enclosing `path`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if no git repository exists at or above `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        tracing::debug!("Opening document repository at {}", path.display());
        let repo = Repository::discover(path)
            .with_context(|| format!("no git repository found at {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            repo,
        })
    }

    /// Whether the working tree differs from the last commit under
    /// `subpath`. Untracked files under the subpath count as changes.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the diff cannot be computed.
    pub fn is_changed(&self, subpath: &str) -> anyhow::Result<bool> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            // An unborn branch has no tree; everything counts as new.
            Err(_) => None,
        };
        let mut options = DiffOptions::new();
        options
            .pathspec(subpath)
            .include_untracked(true)
            .recurse_untracked_dirs(true);
        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut options))?;
        Ok(diff.deltas().count() > 0)
    }

    /// Stage everything under `subpath` and commit it to HEAD with the
    /// given message and author identity.
    ///
    /// # Errors
    ///
    /// Will return `Err` if staging, tree writing, or the commit fails.
    pub fn commit_subpath(
        &self,
        subpath: &str,
        message: &str,
        author: &AuthorIdentity,
    ) -> anyhow::Result<Oid> {
        let mut index = self.repo.index()?;
        index.add_all([subpath].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let signature = Signature::now(&author.name, &author.email)?;

        let binding = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|target_id| self.repo.find_commit(target_id).ok())
            .map(|parent_commit| vec![parent_commit])
            .unwrap_or_default();
        let parent_commits: Vec<&Commit> = binding.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parent_commits,
        )?;
        tracing::debug!(commit = %oid, "Committed `{subpath}`");
        Ok(oid)
    }

    /// Push `branch` to `remote_name`.
    ///
    /// With `force` false the refspec is plain, so a remote that has
    /// diverged rejects the push and the run fails (fail-closed). With
    /// `force` true the refspec is `+`-prefixed and the remote branch is
    /// overwritten, discarding any concurrent history.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the remote is missing, authentication
    /// fails, or the remote rejects the update.
    pub fn push(
        &self,
        remote_name: &str,
        branch: &str,
        force: bool,
        token: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut remote = self
            .repo
            .find_remote(remote_name)
            .with_context(|| format!("repository has no remote named `{remote_name}`"))?;
        let refspec = if force {
            format!("+refs/heads/{branch}:refs/heads/{branch}")
        } else {
            format!("refs/heads/{branch}:refs/heads/{branch}")
        };

        let token_owned = token.map(ToOwned::to_owned);
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, allowed| {
            if let Some(token) = &token_owned {
                if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                    return Cred::userpass_plaintext(username_from_url.unwrap_or("git"), token);
                }
            }
            if allowed.contains(CredentialType::SSH_KEY) {
                if let Some(username) = username_from_url {
                    return Cred::ssh_key_from_agent(username);
                }
            }
            Cred::default()
        });
        callbacks.push_update_reference(|refname, status| match status {
            Some(message) => Err(git2::Error::from_str(&format!(
                "remote rejected {refname}: {message}"
            ))),
            None => Ok(()),
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        remote
            .push(&[refspec.as_str()], Some(&mut options))
            .with_context(|| format!("could not push `{branch}` to `{remote_name}`"))?;
        tracing::debug!(remote = remote_name, branch, force, "Pushed");
        Ok(())
    }
}

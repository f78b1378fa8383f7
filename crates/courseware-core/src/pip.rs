//! Version pinning of academy libraries installed by `%pip` cells.
//!
//! A published notebook must install every academy library at a fixed
//! version. Released tags (`@v1.2.3`) are kept, unpinned URLs are pinned to
//! the latest published commit, and explicit branches or commit ids are only
//! tolerated in build versions.

use tracing::info;

use crate::config::BUILD_VERSIONS;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::language::Language;
use crate::patterns::MAGIC_LINE_PREFIX;

/// Installable URL prefix of every academy library.
pub const ACADEMY_PREFIX: &str = "git+https://github.com/databricks-academy";

const GEMS: &str = "dbacademy-gems";
const REST: &str = "dbacademy-rest";
const HELPER: &str = "dbacademy-helper";

/// The build tools themselves are never pinned.
const UNPINNED: &str = "git+https://github.com/databricks-academy/dbacademy-courseware";

/// Looks up the latest commit of a library repository.
pub trait CommitResolver: Send + Sync {
    /// Commit id at the head of the published branch of `repo_name`.
    fn latest_commit(&self, repo_name: &str) -> Result<String>;
}

/// Pinning checks for the `%pip` cells of one notebook.
pub struct PipChecker<'a> {
    pub language: Language,
    /// Course version, compared against [`BUILD_VERSIONS`].
    pub version: &'a str,
    pub resolver: Option<&'a dyn CommitResolver>,
}

impl PipChecker<'_> {
    /// Validate a `%pip` command, returning it with unpinned URLs pinned.
    ///
    /// Commands that are not `%pip` cells are returned unchanged.
    pub fn check(&self, command: &str, index: usize, diagnostics: &mut Diagnostics) -> String {
        let prefix = format!("{} %pip", self.language.magic_prefix());
        if !command.starts_with(&prefix) {
            return command.to_string();
        }

        let cmd = index + 1;
        let mut command = command.to_string();

        for name in [GEMS, REST, HELPER] {
            let url = format!("{}/{}", ACADEMY_PREFIX, name);
            command = self.update_git_commit(&command, &url, index, diagnostics);
        }

        let uses = |name: &str| command.contains(&format!("https://github.com/databricks-academy/{name}"));

        if uses(HELPER) {
            diagnostics.test(
                uses(REST),
                format!("Cmd #{cmd} | Using repo {HELPER} without including {REST}"),
            );
            diagnostics.test(
                uses(GEMS),
                format!("Cmd #{cmd} | Using repo {HELPER} without including {GEMS}"),
            );
        } else if uses(REST) {
            diagnostics.test(
                uses(GEMS),
                format!("Cmd #{cmd} | Using repo {REST} without including {GEMS}"),
            );
        }

        let flattened = MAGIC_LINE_PREFIX.replace_all(&command, "").replace('\n', " ");
        for library in flattened
            .split(' ')
            .filter(|word| word.starts_with(ACADEMY_PREFIX) && *word != UNPINNED)
        {
            diagnostics.test(
                library.contains('@'),
                format!(
                    "Cmd #{cmd} | The library is not pinned to a specific version: {library}\n{command}"
                ),
            );
        }

        command
    }

    fn update_git_commit(
        &self,
        command: &str,
        url: &str,
        index: usize,
        diagnostics: &mut Diagnostics,
    ) -> String {
        if !command.contains(url) {
            return command.to_string();
        }

        let released = format!("{url}@v");
        let pinned = format!("{url}@");

        if command.contains(&released) {
            info!(
                "Publishing w/version v{} for {}",
                parse_version(command, &released),
                url
            );
            return command.to_string();
        }

        if command.contains(&pinned) {
            let version = parse_version(command, &pinned);
            if BUILD_VERSIONS.contains(&self.version) {
                info!("Publishing w/version @{} for {}", version, url);
                diagnostics.warning(format!(
                    "Building with named branch or commit id ({version}), not a released version, not head - this will prevent publishing."
                ));
            } else {
                diagnostics.error(format!(
                    "Cannot publish with libraries that specify a specific branch or commit id ({version})."
                ));
            }
            return command.to_string();
        }

        let Some(resolver) = self.resolver else {
            return command.to_string();
        };

        let name = url.rsplit('/').next().unwrap_or(url);
        match resolver.latest_commit(name) {
            Ok(commit_id) => {
                info!("Publishing w/commit \"{}\" for {}", commit_id, url);
                command.replace(url, &format!("{url}@{commit_id}"))
            }
            Err(e) => {
                diagnostics.error(format!(
                    "Cmd #{} | Unable to determine the latest commit for {}: {}",
                    index + 1,
                    url,
                    e
                ));
                command.to_string()
            }
        }
    }
}

/// The text following `url` up to the next space or newline.
fn parse_version<'c>(command: &'c str, url: &str) -> &'c str {
    let Some(pos) = command.find(url) else {
        return "";
    };
    let rest = &command[pos + url.len()..];
    let end = rest.find([' ', '\n']).unwrap_or(rest.len());
    &rest[..end]
}

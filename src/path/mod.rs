//! File path expansion and normalization.
//!
//! [`PathResolver::expand_path`] turns a client-supplied path into one the
//! server can open:
//!
//! 1. reject characters outside the portable file name set
//! 2. return early unless the path is relative, has `./`, `../`, `~`, `$`,
//!    or starts with the scratch prefix
//! 3. bare file names get the working directory prepended
//! 4. `$NAME` elements are substituted from the environment
//! 5. the directory is canonicalized (`.`/`..`/symlinks); failure is soft
//! 6. client-side symlink dereferencing of the full path
//! 7. scratch paths get `/{net-name}/{host}` prepended
//! 8. private path replacement rules
//!
//! # Example
//!
//! ```
//! use uda_core::config::Config;
//! use uda_core::error_stack::ErrorStack;
//! use uda_core::path::PathResolver;
//!
//! let config = Config::default();
//! let resolver = PathResolver::new(&config);
//! let mut stack = ErrorStack::new();
//!
//! // Absolute paths without relative elements are left alone.
//! let path = resolver.expand_path("/data/shot1.nc", &mut stack).unwrap();
//! assert_eq!(path, "/data/shot1.nc");
//! ```

mod replace;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use replace::{PathReplacement, ReplacementRule, MAX_PATH_SUBS, MAX_PATH_SUB_LENGTH};

use crate::config::Config;
use crate::error::{Result, UdaError};
use crate::error_stack::ErrorStack;
use crate::strings::{is_legal_file_path, is_number};

/// Source of environment variable values for `$NAME` substitution.
pub trait EnvLookup: Sync {
    /// Value of `name`, if set.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

static PROCESS_ENV: ProcessEnv = ProcessEnv;

/// Substitute `$NAME` path elements found at the start of `path` or right
/// after a `/`.
///
/// Absolute values replace the element in place. Relative values are
/// inserted behind a `/`. Unknown variables are left for the server.
pub fn expand_env_vars(path: &str, env: &dyn EnvLookup) -> String {
    if !path.contains('$') {
        return path.to_string();
    }

    let mut out = String::with_capacity(path.len());
    for (i, element) in path.split('/').enumerate() {
        if i > 0 {
            out.push('/');
        }
        let value = element.strip_prefix('$').and_then(|name| env.var(name));
        match value {
            Some(value) if i == 0 && !value.starts_with('/') => {
                out.push('/');
                out.push_str(&value);
            }
            Some(value) if i > 0 => {
                // Join without doubling the separator.
                out.push_str(value.trim_start_matches('/'));
            }
            Some(value) => out.push_str(&value),
            None => out.push_str(element),
        }
    }
    out
}

/// Expands client paths according to a [`Config`].
pub struct PathResolver<'a> {
    config: &'a Config,
    env: &'a dyn EnvLookup,
    cwd: Option<PathBuf>,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver reading the process environment and working directory.
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            env: &PROCESS_ENV,
            cwd: None,
        }
    }

    /// Use a different environment variable source.
    pub fn with_env(mut self, env: &'a dyn EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Resolve relative paths against `cwd` instead of the process directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn current_dir(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Check whether `path` has anything to expand.
    pub fn needs_expansion(&self, path: &str) -> bool {
        path.contains("./")
            || path.contains("../")
            || path.contains('~')
            || path.contains('$')
            || !path.starts_with('/')
            || path.starts_with(&self.config.scratch_prefix())
    }

    /// Expand and normalize `path`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalPath` for characters outside the portable set, and
    /// `Config`/`Syntax` errors from the replacement rules. Directory and
    /// symlink resolution failures are not errors: the input is returned.
    pub fn expand_path(&self, path: &str, stack: &mut ErrorStack) -> Result<String> {
        if !is_legal_file_path(path) {
            return Err(stack.record(
                "expand_path",
                UdaError::IllegalPath(format!("The Source contains a Syntax Error! ({})", path)),
            ));
        }

        if path.is_empty() || !self.needs_expansion(path) {
            return Ok(path.to_string());
        }

        // A leading integer is a pulse number resolved by a data plugin.
        let first = path.trim_start_matches('/').split('/').next().unwrap_or("");
        if is_number(first) {
            return Ok(path.to_string());
        }

        let scratch = self.config.scratch_prefix();
        let mut expanded = path.to_string();

        if !path.starts_with('/') || path.contains("./") || path.contains('$') || path.contains('~')
        {
            let cwd = self
                .current_dir()
                .map_err(|e| stack.record("expand_path", e))?;

            match path.rfind('/') {
                None => {
                    let joined = format!("{}/{}", cwd.display(), path);
                    let linked = self.link_replacement(&joined);
                    let replaced = self.path_replacement(&linked, stack)?;
                    if !replaced.starts_with(&scratch) {
                        return Ok(replaced);
                    }
                    expanded = replaced;
                }
                Some(split) => {
                    let (dir, file) = path.split_at(split + 1);
                    let dir = expand_env_vars(dir, self.env);
                    let dir_path = if Path::new(&dir).is_absolute() {
                        PathBuf::from(&dir)
                    } else {
                        cwd.join(&dir)
                    };

                    match std::fs::canonicalize(&dir_path) {
                        Ok(resolved) => {
                            expanded = format!("{}/{}", resolved.display(), file);
                        }
                        Err(e) => {
                            tracing::debug!(
                                path = %path,
                                error = %e,
                                "unable to identify the directory; leaving it to the server"
                            );
                            return Ok(path.to_string());
                        }
                    }
                }
            }
        }

        expanded = self.link_replacement(&expanded);

        if expanded.starts_with(&scratch) {
            expanded = self.scratch_network_path(&expanded);
        }

        self.path_replacement(&expanded, stack)
    }

    /// Apply the configured private path replacement rules.
    pub fn path_replacement(&self, path: &str, stack: &mut ErrorStack) -> Result<String> {
        PathReplacement::from_config(self.config)
            .and_then(|rules| rules.apply(path))
            .map_err(|e| stack.record("path_replacement", e))
    }

    /// Dereference `path` if it is a symbolic link with an absolute target.
    ///
    /// Client side only. Relative targets and lookup failures leave the path
    /// untouched.
    pub fn link_replacement(&self, path: &str) -> String {
        if !self.config.client_side {
            return path.to_string();
        }
        match std::fs::read_link(path) {
            Ok(target) if target.is_absolute() => {
                let target = target.display().to_string();
                tracing::debug!(from = %path, to = %target, "symbolic link dereferenced");
                target
            }
            Ok(target) => {
                tracing::debug!(link = %path, target = %target.display(), "relative link target ignored");
                path.to_string()
            }
            Err(_) => path.to_string(),
        }
    }

    /// Prepend `/{net-name}/{host}` to a scratch path.
    fn scratch_network_path(&self, path: &str) -> String {
        let host = self.host_name().unwrap_or_default();
        let net = &self.config.net_name;
        match (net.is_empty(), host.is_empty()) {
            (false, false) => format!("/{}/{}{}", net, host, path),
            (false, true) => format!("/{}{}", net, path),
            (true, false) => format!("/{}{}", host, path),
            (true, true) => path.to_string(),
        }
    }

    /// Name of the current host: configuration, then `$HOSTNAME`, then the OS.
    pub fn host_name(&self) -> Option<String> {
        if let Some(host) = &self.config.host_name {
            return Some(host.clone());
        }
        if let Some(host) = self.env.var("HOSTNAME").filter(|h| !h.is_empty()) {
            return Some(host);
        }
        match std::fs::read_to_string("/etc/hostname") {
            Ok(host) if !host.trim().is_empty() => Some(host.trim().to_string()),
            _ => {
                tracing::warn!("unable to identify the host name");
                None
            }
        }
    }
}

//! Private path replacement.
//!
//! Rewrites path prefixes the server cannot see into ones it can. Rules come
//! from two parallel delimited lists (targets and substitutes, split on any of
//! `,:;`) matched positionally. The first matching rule wins.
//!
//! ```text
//! target      /A/*/C
//! substitute  /X/*/Z
//! path        /A/foo/C/bar   ->   /X/foo/Z/bar
//! ```
//!
//! A `*` stands for one whole path element. Wildcards in a substitute are
//! filled, in order, with the path elements matched by the target's
//! wildcards, so the counts must agree.

use crate::config::Config;
use crate::error::{Result, UdaError};
use crate::strings::contains_wildcard;

/// Maximum number of replacement rules.
pub const MAX_PATH_SUBS: usize = 10;

/// Maximum length of a single target or substitute.
pub const MAX_PATH_SUB_LENGTH: usize = 256;

const RULE_DELIMITERS: [char; 3] = [',', ':', ';'];

/// One `(target, substitute)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementRule {
    pub target: String,
    pub substitute: String,
}

/// Ordered set of replacement rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathReplacement {
    rules: Vec<ReplacementRule>,
}

fn split_rules(list: &str, role: &str) -> Result<Vec<String>> {
    let items: Vec<String> = list
        .split(RULE_DELIMITERS)
        .filter(|s| !s.is_empty())
        .take(MAX_PATH_SUBS)
        .map(str::to_string)
        .collect();

    if let Some(long) = items.iter().find(|s| s.len() >= MAX_PATH_SUB_LENGTH) {
        return Err(UdaError::Config(format!(
            "The length of the path {} '{}...' exceeds the internal limit",
            role,
            long.chars().take(16).collect::<String>()
        )));
    }
    Ok(items)
}

/// Non-empty elements of `path` with their byte offsets.
fn located_elements(path: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    let mut located = Vec::new();
    for element in path.split('/') {
        if !element.is_empty() {
            located.push((offset, element));
        }
        offset += element.len() + 1;
    }
    located
}

fn elements(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl PathReplacement {
    /// Build rules from parallel target and substitute lists.
    ///
    /// # Errors
    ///
    /// Returns `Config` error if the counts differ or an element is too long.
    pub fn new(targets: &str, substitutes: &str) -> Result<Self> {
        let targets = split_rules(targets, "target")?;
        let substitutes = split_rules(substitutes, "substitute")?;

        if targets.len() != substitutes.len() {
            return Err(UdaError::Config(
                "Number of Path Targets and Substitutes is inconsistent".to_string(),
            ));
        }

        let rules = targets
            .into_iter()
            .zip(substitutes)
            .map(|(target, substitute)| ReplacementRule { target, substitute })
            .collect();

        Ok(Self { rules })
    }

    /// Build rules from the private path lists of a configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.private_path_target, &config.private_path_substitute)
    }

    /// The parsed rules.
    pub fn rules(&self) -> &[ReplacementRule] {
        &self.rules
    }

    /// Apply the first matching rule to `path`.
    ///
    /// Paths no rule matches are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Syntax` error when wildcard counts disagree, or when a
    /// substitute has wildcards its target does not.
    pub fn apply(&self, path: &str) -> Result<String> {
        if path.is_empty() {
            return Ok(String::new());
        }

        for rule in &self.rules {
            let replaced = if contains_wildcard(&rule.target) {
                Self::apply_wildcard(rule, path)?
            } else {
                if contains_wildcard(&rule.substitute) {
                    return Err(UdaError::Syntax(
                        "No wildcards are permitted in the substitute path unless matched by one in the target path."
                            .to_string(),
                    ));
                }
                path.strip_prefix(rule.target.as_str())
                    .map(|rest| format!("{}{}", rule.substitute, rest))
            };

            if let Some(new_path) = replaced {
                tracing::debug!(from = %path, to = %new_path, "path replaced");
                return Ok(new_path);
            }
        }

        Ok(path.to_string())
    }

    fn apply_wildcard(rule: &ReplacementRule, path: &str) -> Result<Option<String>> {
        let target = elements(&rule.target);
        let located = located_elements(path);
        let path_elements: Vec<&str> = located.iter().map(|(_, e)| *e).collect();

        if path_elements.len() < target.len() {
            return Ok(None);
        }

        let substitute = elements(&rule.substitute);
        let sub_wild = substitute.iter().filter(|s| s.starts_with('*')).count();
        let target_wild = target.iter().filter(|s| s.starts_with('*')).count();

        if sub_wild > 0 && sub_wild != target_wild {
            return Err(UdaError::Syntax(
                "Un-matched wildcards found in the target and substitute paths".to_string(),
            ));
        }

        let matched = target
            .iter()
            .zip(&path_elements)
            .all(|(t, p)| t.starts_with('*') || t == p);
        if !matched {
            return Ok(None);
        }

        // Remainder of the path after the last matched element.
        let split = located[..target.len()]
            .last()
            .map_or(0, |(offset, element)| offset + element.len());
        let remainder = path.get(split..).unwrap_or("");

        let mut result = String::new();
        if sub_wild == 0 {
            result.push_str(&rule.substitute);
        } else {
            let mut captured = target
                .iter()
                .zip(&path_elements)
                .filter(|(t, _)| t.starts_with('*'))
                .map(|(_, p)| *p);
            for element in &substitute {
                result.push('/');
                if element.starts_with('*') {
                    result.push_str(captured.next().unwrap_or_default());
                } else {
                    result.push_str(element);
                }
            }
        }
        result.push_str(remainder);

        Ok(Some(result))
    }
}

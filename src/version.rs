//! Version parsing, bump suggestion and the persisted version file.
//!
//! Two version file formats are supported:
//! - plain text (`version.txt`) holding only the version string
//! - a Python module (`version.py`) with `__version_info__` and `__version__` lines

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::Configuration;
use crate::error::{ReleaseError, Result};

/// Release category tagged in changelog lines as `[PATCH]`, `[MINOR]` or `[MAJOR]`.
///
/// Ordered by severity, so `max()` picks the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReleaseCategory {
    Patch,
    Minor,
    Major,
}

fn category_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[\s\-]*\[(patch|minor|major)\]").expect("valid category regex")
    })
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:([-+.]?)([A-Za-z0-9][A-Za-z0-9.+\-]*))?$")
            .expect("valid version regex")
    })
}

impl ReleaseCategory {
    /// The highest-severity category tagged at the start of a line.
    ///
    /// Every non-blank line must carry a tag; a single untagged line means the
    /// category cannot be trusted and nothing is suggested.
    pub fn detect_from_changelog<S: AsRef<str>>(lines: &[S]) -> Option<Self> {
        let mut highest = None;
        for line in lines.iter().map(AsRef::as_ref) {
            if line.trim().is_empty() {
                continue;
            }
            let caps = category_regex().captures(line)?;
            let category = match caps[1].to_ascii_uppercase().as_str() {
                "PATCH" => ReleaseCategory::Patch,
                "MINOR" => ReleaseCategory::Minor,
                _ => ReleaseCategory::Major,
            };
            highest = highest.max(Some(category));
        }
        highest
    }
}

/// A validated version: numeric core, optional extra component, and the
/// separator joining the extra to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub extra: Option<String>,
    /// One of `-`, `+` or `.`
    pub separator: char,
}

impl Version {
    /// Parse `MAJOR.MINOR.PATCH[{-,+,.}EXTRA]`.
    ///
    /// An extra component written with no separator (`1.7.10post2`) is attached with `-`.
    pub fn parse(version: &str) -> Result<Self> {
        let caps = version_regex().captures(version.trim()).ok_or_else(|| {
            ReleaseError::version(format!(
                "Invalid version: {}. Versions must be in the format MAJOR.MINOR.PATCH, \
                 optionally followed by -, + or . and extra information.",
                version
            ))
        })?;

        let number = |idx: usize| -> Result<u64> {
            caps[idx]
                .parse::<u64>()
                .map_err(|_| ReleaseError::version(format!("Invalid version number: {}", &caps[idx])))
        };

        let extra = caps.get(5).map(|m| m.as_str().to_string());
        let separator = match caps.get(4).map(|m| m.as_str()) {
            Some("+") => '+',
            Some(".") => '.',
            _ => '-',
        };

        Ok(Version {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            extra,
            separator,
        })
    }

    /// Numeric core used for ordering; the extra component is advisory.
    pub fn core(&self) -> semver::Version {
        semver::Version::new(self.major, self.minor, self.patch)
    }

    /// `[major, minor, patch]`
    pub fn numeric_parts(&self) -> [u64; 3] {
        [self.major, self.minor, self.patch]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref extra) = self.extra {
            write!(f, "{}{}", self.separator, extra)?;
        }
        Ok(())
    }
}

/// A version branch restricting which bumps may be released from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBranch {
    /// `N.x.x`: minor and patch releases of major `N`
    Major(u64),
    /// `N.M.x`: patch releases of `N.M`
    Minor(u64, u64),
}

impl VersionBranch {
    /// Recognize `\d+\.x\.x` and `\d+\.\d+\.x` branch names.
    pub fn parse(branch_name: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"^(\d+)\.(?:(x)|(\d+))\.x$").expect("valid branch regex")
        });

        let caps = re.captures(branch_name)?;
        let major = caps[1].parse().ok()?;
        if caps.get(2).is_some() {
            return Some(VersionBranch::Major(major));
        }
        let minor = caps.get(3)?.as_str().parse().ok()?;
        Some(VersionBranch::Minor(major, minor))
    }

    fn allows(&self, version: &Version) -> bool {
        match *self {
            VersionBranch::Major(major) => version.major == major,
            VersionBranch::Minor(major, minor) => version.major == major && version.minor == minor,
        }
    }
}

impl fmt::Display for VersionBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBranch::Major(major) => write!(f, "{}.x.x", major),
            VersionBranch::Minor(major, minor) => write!(f, "{}.{}.x", major, minor),
        }
    }
}

/// Next version for `category`, or `None` when no category was tagged.
///
/// Below 1.0.0 a MAJOR change only bumps the minor version.
pub fn suggest_version(current: &str, category: Option<ReleaseCategory>) -> Result<Option<String>> {
    let Some(category) = category else {
        return Ok(None);
    };

    let current = Version::parse(current)?;
    let (major, minor, patch) = (current.major, current.minor, current.patch);

    let next = match category {
        ReleaseCategory::Patch => (major, minor, patch + 1),
        ReleaseCategory::Minor => (major, minor + 1, 0),
        ReleaseCategory::Major if major == 0 => (major, minor + 1, 0),
        ReleaseCategory::Major => (major + 1, 0, 0),
    };

    Ok(Some(format!("{}.{}.{}", next.0, next.1, next.2)))
}

/// Check that `candidate` is a well-formed version strictly greater than
/// `current`, and permitted on the version branch named `branch`, if any.
pub fn validate_and_normalize_version(
    current: &str,
    candidate: &str,
    branch: Option<&str>,
) -> Result<Version> {
    let new_version = Version::parse(candidate)?;
    let current_version = Version::parse(current)?;

    if new_version.core() <= current_version.core() {
        return Err(ReleaseError::version(format!(
            "New version number {} is not greater than current version {}.",
            new_version, current_version
        )));
    }

    if let Some(version_branch) = branch.and_then(VersionBranch::parse) {
        if !version_branch.allows(&new_version) {
            let allowed = match version_branch {
                VersionBranch::Major(_) => "minor and patch",
                VersionBranch::Minor(..) => "patch",
            };
            return Err(ReleaseError::version(format!(
                "Version {} cannot be released from branch {}; only {} releases are permitted there.",
                new_version, version_branch, allowed
            )));
        }
    }

    Ok(new_version)
}

const VERSION_INFO_PREFIX: &str = "__version_info__";
const VERSION_PREFIX: &str = "__version__";

fn python_version_line(separator: char) -> String {
    format!(
        "__version__ = '{}'.join(filter(None, ['.'.join(map(str, __version_info__[:3])), \
         (__version_info__[3:] or [None])[0]]))",
        separator
    )
}

fn python_version_info_line(version: &Version) -> String {
    match version.extra {
        Some(ref extra) => format!(
            "__version_info__ = ({}, {}, {}, '{}')",
            version.major, version.minor, version.patch, extra
        ),
        None => format!(
            "__version_info__ = ({}, {}, {})",
            version.major, version.minor, version.patch
        ),
    }
}

fn is_assignment(line: &str, name: &str) -> bool {
    line.strip_prefix(name)
        .map_or(false, |rest| rest.trim_start().starts_with('='))
}

/// Rewrite the project version file with `version`.
pub fn update_version_file(config: &Configuration, version: &Version) -> Result<()> {
    write_version_file(&config.version_file_name, config.use_version_text, version)
}

/// Rewrite the version file at `path`.
///
/// Text files are overwritten with exactly the version string. In Python files
/// the `__version_info__` and `__version__` lines are replaced in place;
/// `__version_info__` is (re)written immediately before `__version__`.
pub fn write_version_file(path: &Path, use_version_text: bool, version: &Version) -> Result<()> {
    if !path.is_file() {
        return Err(ReleaseError::version(format!(
            "Version file {} does not exist.",
            path.display()
        )));
    }

    debug!("Writing version {} to {}", version, path.display());

    if use_version_text {
        fs::write(path, version.to_string())?;
        return Ok(());
    }

    let contents = fs::read_to_string(path)?;
    let info_line = python_version_info_line(version);
    let version_line = python_version_line(version.separator);

    let mut output: Vec<String> = Vec::new();
    let mut wrote_info = false;
    let mut wrote_version = false;
    let version_first = contents
        .lines()
        .find(|l| is_assignment(l, VERSION_INFO_PREFIX) || is_assignment(l, VERSION_PREFIX))
        .map_or(false, |l| is_assignment(l, VERSION_PREFIX));

    for line in contents.lines() {
        if is_assignment(line, VERSION_INFO_PREFIX) {
            // When __version__ comes first, the info line moves up to precede it
            if !wrote_info && !version_first {
                output.push(info_line.clone());
                wrote_info = true;
            }
        } else if is_assignment(line, VERSION_PREFIX) {
            if !wrote_info {
                output.push(info_line.clone());
                wrote_info = true;
            }
            output.push(version_line.clone());
            wrote_version = true;
        } else {
            output.push(line.to_string());
        }
    }

    if !wrote_info {
        output.push(info_line);
    }
    if !wrote_version {
        output.push(version_line);
    }

    let mut rendered = output.join("\n");
    rendered.push('\n');
    fs::write(path, rendered)?;
    Ok(())
}

/// Read the project's current version, always fresh from disk.
pub fn read_project_version(config: &Configuration) -> Result<String> {
    read_version_file(&config.version_file_name, config.use_version_text)
}

/// Read the version stored at `path`.
pub fn read_version_file(path: &Path, use_version_text: bool) -> Result<String> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ReleaseError::version(format!(
            "Could not read version file {}: {}",
            path.display(),
            e
        ))
    })?;

    if use_version_text {
        return Ok(contents.trim().to_string());
    }

    static LITERAL: OnceLock<Regex> = OnceLock::new();
    static JOINED: OnceLock<Regex> = OnceLock::new();
    static INFO: OnceLock<Regex> = OnceLock::new();
    let literal = LITERAL.get_or_init(|| {
        Regex::new(r#"^__version__\s*=\s*['"]([^'"]+)['"]\s*$"#).expect("valid literal regex")
    });
    let joined = JOINED.get_or_init(|| {
        Regex::new(r#"^__version__\s*=\s*['"]([-+.])['"]\.join\("#).expect("valid join regex")
    });
    let info = INFO.get_or_init(|| {
        Regex::new(r#"^__version_info__\s*=\s*\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*(?:,\s*['"]([^'"]*)['"]\s*)?,?\s*\)"#)
            .expect("valid info regex")
    });

    let mut separator = None;
    let mut parts = None;
    for line in contents.lines() {
        if let Some(caps) = literal.captures(line) {
            return Ok(caps[1].to_string());
        }
        if let Some(caps) = joined.captures(line) {
            separator = Some(caps[1].to_string());
        }
        if let Some(caps) = info.captures(line) {
            let core = format!("{}.{}.{}", &caps[1], &caps[2], &caps[3]);
            let extra = caps
                .get(4)
                .map(|m| m.as_str().to_string())
                .filter(|e| !e.is_empty());
            parts = Some((core, extra));
        }
    }

    match (separator, parts) {
        (Some(sep), Some((core, Some(extra)))) => Ok(format!("{}{}{}", core, sep, extra)),
        (Some(_), Some((core, None))) => Ok(core),
        _ => Err(ReleaseError::version(format!(
            "Could not find a __version__ assignment in {}.",
            path.display()
        ))),
    }
}

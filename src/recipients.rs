//! Recipient list loading.
//!
//! The users file is newline-delimited; each non-blank line is one email
//! address. Blank lines are skipped later but still count toward the raw total.

use std::path::Path;

use crate::error::{Error, Result};

/// One email address taken from the users file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    email: String,
}

impl Recipient {
    /// Parse a raw line; `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let email = line.trim();
        if email.is_empty() {
            None
        } else {
            Some(Self {
                email: email.to_string(),
            })
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// Fail unless `path` names an existing regular file.
pub fn ensure_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// Read the raw lines of the users file.
///
/// A file without any line is an error; a file holding only blank lines is not.
/// A leading UTF-8 byte order mark is dropped.
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileUnreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    if lines.is_empty() {
        return Err(Error::EmptyInput(path.display().to_string()));
    }

    Ok(lines)
}

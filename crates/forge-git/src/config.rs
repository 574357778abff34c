//! Remote discovery from `.git/config`
//!
//! The config file is parsed as text so that resolution works on machines
//! without a `git` binary. Only `[remote "<name>"]` sections and their `url`
//! keys are interpreted; everything else is skipped.

use std::fs;
use std::path::Path;

use crate::validate::GIT_DIR;
use crate::{Error, Result};

/// A named remote and the URL it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// Read the remotes configured for the working copy rooted at `dir`.
///
/// Remotes are returned in file order.
///
/// # Errors
///
/// Returns [`Error::NoRemotesConfigured`] when the config file is missing,
/// unreadable, or declares no remote with a URL. Unparseable content counts
/// as "no remotes".
pub fn read_remotes(dir: &Path) -> Result<Vec<Remote>> {
    let config_path = dir.join(GIT_DIR).join("config");
    let no_remotes = || Error::NoRemotesConfigured {
        path: dir.to_path_buf(),
    };

    let text = match fs::read_to_string(&config_path) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(path = %config_path.display(), error = %e, "git config unreadable");
            return Err(no_remotes());
        }
    };

    let remotes = parse_remotes(&text);
    if remotes.is_empty() {
        return Err(no_remotes());
    }

    tracing::debug!(
        path = %config_path.display(),
        remotes = remotes.len(),
        "read git remotes"
    );
    Ok(remotes)
}

/// Parse the remotes out of git config text.
///
/// A remote declared in more than one section keeps its first position and
/// its first `url`. Sections without a `url` are dropped.
pub fn parse_remotes(text: &str) -> Vec<Remote> {
    let mut entries: Vec<(String, Option<String>)> = Vec::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let mut line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            let Some((header, rest)) = split_section_header(line) else {
                current = None;
                continue;
            };
            current = remote_name(header);
            if let Some(name) = &current {
                if !entries.iter().any(|(existing, _)| existing == name) {
                    entries.push((name.clone(), None));
                }
            }
            // git accepts a key on the same line as its section header
            line = rest.trim();
            if line.is_empty() {
                continue;
            }
        }

        let Some(name) = &current else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("url") {
            continue;
        }

        let value = parse_value(value);
        if value.is_empty() {
            continue;
        }
        if let Some(entry) = entries.iter_mut().find(|(existing, _)| existing == name) {
            entry.1.get_or_insert(value);
        }
    }

    entries
        .into_iter()
        .filter_map(|(name, url)| url.map(|url| Remote { name, url }))
        .collect()
}

/// Split `[section "sub"] rest` into the header body and whatever follows.
fn split_section_header(line: &str) -> Option<(&str, &str)> {
    let body = line.strip_prefix('[')?;
    let mut in_quotes = false;
    let mut escaped = false;

    for (idx, c) in body.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ']' if !in_quotes => return Some((&body[..idx], &body[idx + 1..])),
            _ => {}
        }
    }
    None
}

/// Return the remote name if the header is a `remote` section.
///
/// Handles both `remote "name"` and the legacy `remote.name` spelling.
fn remote_name(header: &str) -> Option<String> {
    let header = header.trim();

    if let Some((section, subsection)) = header.split_once(char::is_whitespace) {
        if !section.eq_ignore_ascii_case("remote") {
            return None;
        }
        let quoted = subsection.trim().strip_prefix('"')?.strip_suffix('"')?;
        let name = unescape(quoted);
        return (!name.is_empty()).then_some(name);
    }

    let (section, name) = header.split_once('.')?;
    (section.eq_ignore_ascii_case("remote") && !name.is_empty()).then(|| name.to_string())
}

fn unescape(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode a config value: quotes, escapes, and trailing comments.
fn parse_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_quotes = false;
    let mut chars = raw.trim().chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            },
            '#' | ';' if !in_quotes => break,
            _ => out.push(c),
        }
    }

    out.trim_end().to_string()
}

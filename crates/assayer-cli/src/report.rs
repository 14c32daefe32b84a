//! Report rendering.
//!
//! - list: one line per verdict, `repository  kind  [details]`
//! - count: number of repositories per selected family
//! - template: user text with `{family}` placeholders replaced by counts
//! - json: one serialized verdict per line

use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use assayer_core::{CheckSelection, Verdict, VerdictFamily};

/// How verdicts are rendered.
#[derive(Debug, Clone)]
pub enum Style {
    List { verbose: bool, unmodified: bool },
    Count { checks: CheckSelection },
    Template(Template),
    Json,
}

/// Renders verdicts as they arrive; summary styles print on `finish`.
#[derive(Debug)]
pub struct Report {
    style: Style,
    tally: Tally,
}

impl Report {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            tally: Tally::default(),
        }
    }

    pub fn record(&mut self, verdict: &Verdict, out: &mut impl Write) -> Result<()> {
        self.tally.add(verdict);
        match &self.style {
            Style::List {
                verbose,
                unmodified,
            } => {
                if verdict.family() == VerdictFamily::Unmodified && !unmodified {
                    return Ok(());
                }
                write_line(verdict, *verbose, out)?;
            }
            Style::Json => {
                serde_json::to_writer(&mut *out, verdict)?;
                writeln!(out)?;
            }
            Style::Count { .. } | Style::Template(_) => {}
        }
        Ok(())
    }

    pub fn finish(self, out: &mut impl Write) -> Result<()> {
        match &self.style {
            Style::Count { checks } => {
                for family in VerdictFamily::ALL {
                    if family == VerdictFamily::Unmodified || !checks.is_enabled(family) {
                        continue;
                    }
                    writeln!(out, "{:<40} {}", count_label(family), self.tally.count(family))?;
                }
            }
            Style::Template(template) => {
                let rendered = template.render(&self.tally);
                out.write_all(rendered.as_bytes())?;
                if !rendered.ends_with('\n') {
                    writeln!(out)?;
                }
            }
            Style::List { .. } | Style::Json => {}
        }
        out.flush()?;
        Ok(())
    }
}

fn write_line(verdict: &Verdict, verbose: bool, out: &mut impl Write) -> std::io::Result<()> {
    let repository = verdict.repository().display().to_string();
    let kind = verdict.family().label();
    match details(verdict) {
        Some(details) if verbose => writeln!(out, "{repository:<60} {kind:<40} {details}"),
        _ => writeln!(out, "{repository:<60} {kind}"),
    }
}

fn details(verdict: &Verdict) -> Option<String> {
    match verdict {
        Verdict::Unmodified { .. } => None,
        Verdict::Untracked { path, .. } => Some(format!("Path \"{path}\" is untracked")),
        Verdict::Modified { path, change, .. } => Some(format!("File \"{path}\" is {change}")),
        Verdict::StashedChanges { base, .. } => Some(format!("on commit \"{}\"", base.summary)),
        Verdict::LocalOnlyBranch { branch, .. } => Some(branch.clone()),
        Verdict::RemoteAhead { local_branch, .. } | Verdict::RemoteBehind { local_branch, .. } => {
            Some(local_branch.clone())
        }
    }
}

fn count_label(family: VerdictFamily) -> &'static str {
    match family {
        VerdictFamily::Unmodified => "Unmodified Repositories",
        VerdictFamily::Untracked => "Repositories with Untracked files",
        VerdictFamily::Modified => "Modified Repositories",
        VerdictFamily::LocalOnlyBranch => "Repositories With Local Only Branches",
        VerdictFamily::Stashed => "Repositories With Stashes",
        VerdictFamily::RemoteAhead => "Not Pulled Repositories",
        VerdictFamily::RemoteBehind => "Not Pushed Repositories",
    }
}

/// Distinct repositories seen per family.
#[derive(Debug, Default)]
pub struct Tally {
    repositories: HashMap<VerdictFamily, BTreeSet<PathBuf>>,
}

impl Tally {
    pub fn add(&mut self, verdict: &Verdict) {
        self.repositories
            .entry(verdict.family())
            .or_default()
            .insert(verdict.repository().to_path_buf());
    }

    pub fn count(&self, family: VerdictFamily) -> usize {
        self.repositories.get(&family).map_or(0, BTreeSet::len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Count(VerdictFamily),
}

/// A report template such as `"{modified} modified, {untracked} untracked"`.
///
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        bail!("error parsing template: unclosed placeholder \"{{{name}\"");
                    }
                    let Some(family) = placeholder(name.trim()) else {
                        bail!("error parsing template: unknown placeholder \"{{{name}}}\"");
                    };
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Count(family));
                }
                '}' => bail!("error parsing template: unmatched \"}}\""),
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { segments })
    }

    pub fn render(&self, tally: &Tally) -> String {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Count(family) => rendered.push_str(&tally.count(*family).to_string()),
            }
        }
        rendered
    }
}

fn placeholder(name: &str) -> Option<VerdictFamily> {
    let family = match name {
        "unmodified" => VerdictFamily::Unmodified,
        "untracked" => VerdictFamily::Untracked,
        "modified" => VerdictFamily::Modified,
        "localOnlyBranch" => VerdictFamily::LocalOnlyBranch,
        "stashedChanges" => VerdictFamily::Stashed,
        "remoteAhead" => VerdictFamily::RemoteAhead,
        "remoteBehind" => VerdictFamily::RemoteBehind,
        _ => return None,
    };
    Some(family)
}

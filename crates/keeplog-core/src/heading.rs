//! Release heading parser.
//!
//! A level-2 heading names either the Unreleased section or a release.
//! Two spellings are accepted, because a previous run may already have
//! turned the version into a link reference:
//!
//! - plain text: `1.0.0 - 2022-01-01 suffix`, optionally with brackets
//!   around the version (`[1.0.0] - 2022-01-01`);
//! - a shortcut reference followed by text: `[1.0.0]` + ` - 2022-01-01`.
//!
//! Malformed headings are reported through [`Diagnostics`]; the parser
//! itself never fails.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::{Inline, Span};
use crate::release::{DATE_FORMAT, Release, ReleaseSpec};
use crate::version::parse_version;

static PLAIN_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\[?([A-Za-z0-9.+-]+)\]?(\s+-\s*(\d{4}-\d{2}-\d{2}))?\s*(.*)$")
        .expect("plain heading pattern is valid")
});

static LINKED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*-\s*(\d{4}-\d{2}-\d{2})\s*(.*)$").expect("linked date pattern is valid")
});

const EXPECTED_HEADING: &str = "`[<version>] - <YYYY-MM-DD>` or `[Unreleased]`";

/// Parse the inline content of one level-2 heading.
///
/// Returns `None` after recording a fatal diagnostic at `span` when the
/// heading is not a release heading.
pub fn parse_heading(
    children: &[Inline],
    span: Option<Span>,
    diagnostics: &mut Diagnostics,
) -> Option<ReleaseSpec> {
    match parse(children) {
        Ok(spec) => Some(spec),
        Err(problem) => {
            diagnostics.push(problem.into_diagnostic(span));
            None
        }
    }
}

#[derive(Debug)]
struct Problem {
    message: &'static str,
    expected: &'static str,
    actual: String,
}

impl Problem {
    fn new(message: &'static str, expected: &'static str, actual: impl Into<String>) -> Self {
        Self {
            message,
            expected,
            actual: actual.into(),
        }
    }

    fn into_diagnostic(self, span: Option<Span>) -> Diagnostic {
        Diagnostics::error(self.message, span).with_context(self.expected, self.actual)
    }
}

fn parse(children: &[Inline]) -> Result<ReleaseSpec, Problem> {
    match children {
        [] => Err(Problem::new("release heading is empty", EXPECTED_HEADING, "")),
        [Inline::Text(text), rest @ ..] => parse_plain(text, rest),
        [Inline::LinkReference { label }, rest @ ..] => parse_linked(label, rest),
        [Inline::Raw(raw), ..] => Err(Problem::new(
            "unsupported release heading",
            EXPECTED_HEADING,
            raw.as_str(),
        )),
    }
}

fn parse_plain(text: &str, rest: &[Inline]) -> Result<ReleaseSpec, Problem> {
    let captures = PLAIN_HEADING
        .captures(text)
        .ok_or_else(|| Problem::new("invalid release heading", EXPECTED_HEADING, text))?;

    let token = captures.get(1).map_or("", |m| m.as_str());
    if token.eq_ignore_ascii_case("unreleased") {
        return Ok(ReleaseSpec::Unreleased);
    }
    let version = parse_token(token)?;

    let Some(date) = captures.get(3) else {
        return Err(Problem::new(
            "release heading has no date",
            EXPECTED_HEADING,
            text,
        ));
    };
    let date = parse_date(date.as_str())?;
    let suffix = join_suffix(captures.get(4).map_or("", |m| m.as_str()), rest);

    Ok(ReleaseSpec::Released(Release {
        version,
        date,
        suffix,
    }))
}

fn parse_linked(label: &str, rest: &[Inline]) -> Result<ReleaseSpec, Problem> {
    if label.eq_ignore_ascii_case("unreleased") {
        return Ok(ReleaseSpec::Unreleased);
    }
    let version = parse_token(label)?;

    let (text, rest) = match rest {
        [Inline::Text(text), rest @ ..] => (text, rest),
        _ => {
            let mut actual = String::new();
            for inline in rest {
                inline.write_to(&mut actual);
            }
            return Err(Problem::new(
                "release heading has no date",
                "` - <YYYY-MM-DD>` after the version",
                actual,
            ));
        }
    };

    let captures = LINKED_DATE.captures(text).ok_or_else(|| {
        Problem::new(
            "invalid release date",
            "` - <YYYY-MM-DD>` after the version",
            text.as_str(),
        )
    })?;
    let date = parse_date(captures.get(1).map_or("", |m| m.as_str()))?;
    let suffix = join_suffix(captures.get(2).map_or("", |m| m.as_str()), rest);

    Ok(ReleaseSpec::Released(Release {
        version,
        date,
        suffix,
    }))
}

fn parse_token(token: &str) -> Result<semver::Version, Problem> {
    parse_version(token)
        .map_err(|_| Problem::new("invalid version in release heading", "a semantic version", token))
}

fn parse_date(date: &str) -> Result<NaiveDate, Problem> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| Problem::new("invalid release date", "a calendar date (YYYY-MM-DD)", date))
}

/// Trailing free text, including any formatted inlines after the date.
fn join_suffix(text: &str, rest: &[Inline]) -> String {
    let mut suffix = text.to_string();
    for inline in rest {
        inline.write_to(&mut suffix);
    }
    suffix.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn text(s: &str) -> Inline {
        Inline::Text(s.into())
    }

    fn link(label: &str) -> Inline {
        Inline::LinkReference {
            label: label.into(),
        }
    }

    fn parse_ok(children: &[Inline]) -> ReleaseSpec {
        let mut diagnostics = Diagnostics::new();
        let spec = parse_heading(children, None, &mut diagnostics);
        assert!(!diagnostics.has_fatal(), "{:?}", diagnostics.entries());
        spec.unwrap()
    }

    fn parse_err(children: &[Inline]) -> Diagnostic {
        let mut diagnostics = Diagnostics::new();
        assert!(parse_heading(children, None, &mut diagnostics).is_none());
        let entries = diagnostics.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_fatal());
        entries[0].clone()
    }

    fn released(spec: ReleaseSpec) -> Release {
        match spec {
            ReleaseSpec::Released(release) => release,
            ReleaseSpec::Unreleased => panic!("expected a release"),
        }
    }

    #[test]
    fn plain_unreleased_any_case() {
        assert_eq!(parse_ok(&[text("[Unreleased]")]), ReleaseSpec::Unreleased);
        assert_eq!(parse_ok(&[text("UNRELEASED")]), ReleaseSpec::Unreleased);
    }

    #[test]
    fn plain_release_with_brackets() {
        let release = released(parse_ok(&[text("[1.0.0] - 2022-01-01")]));
        assert_eq!(release.version, Version::new(1, 0, 0));
        assert_eq!(release.date, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert_eq!(release.suffix, "");
    }

    #[test]
    fn plain_release_without_brackets_keeps_suffix() {
        let release = released(parse_ok(&[text("2.1.0 - 2023-06-30 [YANKED]")]));
        assert_eq!(release.version, Version::new(2, 1, 0));
        assert_eq!(release.suffix, "[YANKED]");
    }

    #[test]
    fn linked_unreleased() {
        assert_eq!(parse_ok(&[link("unreleased")]), ReleaseSpec::Unreleased);
    }

    #[test]
    fn linked_release_with_formatted_suffix() {
        let release = released(parse_ok(&[
            link("1.0.0-rc.1"),
            text(" - 2022-01-01 "),
            Inline::Raw("**Breaking**".into()),
        ]));
        assert_eq!(release.version, Version::parse("1.0.0-rc.1").unwrap());
        assert_eq!(release.suffix, "**Breaking**");
    }

    #[test]
    fn malformed_version_is_fatal() {
        let diagnostic = parse_err(&[text("notaversion")]);
        assert_eq!(diagnostic.message, "invalid version in release heading");
        assert_eq!(diagnostic.actual.as_deref(), Some("notaversion"));
    }

    #[test]
    fn missing_date_is_fatal() {
        let diagnostic = parse_err(&[text("[1.0.0]")]);
        assert_eq!(diagnostic.message, "release heading has no date");
    }

    #[test]
    fn impossible_date_is_fatal() {
        let diagnostic = parse_err(&[text("1.0.0 - 2022-13-45")]);
        assert_eq!(diagnostic.message, "invalid release date");
        assert_eq!(diagnostic.actual.as_deref(), Some("2022-13-45"));
    }

    #[test]
    fn linked_release_without_date_is_fatal() {
        let diagnostic = parse_err(&[link("1.0.0")]);
        assert_eq!(diagnostic.message, "release heading has no date");
    }

    #[test]
    fn linked_release_with_bad_date_format_is_fatal() {
        let diagnostic = parse_err(&[link("1.0.0"), text(" (2022/01/01)")]);
        assert_eq!(diagnostic.message, "invalid release date");
    }

    #[test]
    fn empty_heading_is_fatal() {
        assert_eq!(parse_err(&[]).message, "release heading is empty");
    }

    #[test]
    fn other_first_child_is_fatal() {
        let diagnostic = parse_err(&[Inline::Raw("*1.0.0*".into())]);
        assert_eq!(diagnostic.message, "unsupported release heading");
    }

    #[test]
    fn diagnostic_carries_span() {
        let span = Span {
            start_line: 5,
            start_column: 1,
            end_line: 5,
            end_column: 15,
        };
        let mut diagnostics = Diagnostics::new();
        parse_heading(&[text("notaversion")], Some(span), &mut diagnostics);
        assert_eq!(diagnostics.entries()[0].span, Some(span));
    }
}

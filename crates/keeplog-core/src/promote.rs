//! Promotion of the Unreleased section to a release.

use chrono::NaiveDate;
use semver::Version;
use tracing::{debug, info, instrument};

use crate::diagnostics::Diagnostics;
use crate::document::Document;
use crate::error::{ChangelogError, ChangelogResult};
use crate::index::{DocumentIndex, Heading, RELEASE_HEADING_DEPTH};
use crate::release::{Release, ReleaseSpec};

/// Turn the Unreleased heading into `## [version] - date`.
///
/// Both the heading block and its index entry are replaced; the section
/// body stays where it is.
#[instrument(skip(document, index), fields(%version, %date))]
pub fn promote(
    document: &mut Document,
    index: &mut DocumentIndex,
    version: &Version,
    date: NaiveDate,
) -> ChangelogResult<()> {
    let Some(heading) = index
        .first_mut()
        .filter(|heading| heading.spec().is_unreleased())
    else {
        return Err(Diagnostics::fail("the Unreleased section must be present"));
    };

    let spec = ReleaseSpec::Released(Release {
        version: version.clone(),
        date,
        suffix: String::new(),
    });
    if !document.set_heading_children(heading.node(), spec.heading_inlines()) {
        return Err(ChangelogError::Internal(
            "the Unreleased heading is no longer in the document".into(),
        ));
    }
    heading.set_spec(spec);

    info!(%version, "promoted Unreleased section");
    Ok(())
}

/// Add an empty `## [Unreleased]` heading above the newest section.
///
/// Does nothing if the first heading is already Unreleased.
#[instrument(skip_all)]
pub fn insert_unreleased_placeholder(
    document: &mut Document,
    index: &mut DocumentIndex,
) -> ChangelogResult<()> {
    if index.unreleased().is_some() {
        debug!("Unreleased section already present");
        return Ok(());
    }

    let spec = ReleaseSpec::Unreleased;
    let (node, end) = match index.first() {
        Some(first) => {
            let node = document
                .insert_heading_before(first.node(), RELEASE_HEADING_DEPTH, spec.heading_inlines())
                .ok_or_else(|| {
                    ChangelogError::Internal(format!(
                        "heading `{}` is no longer in the document",
                        first.spec()
                    ))
                })?;
            (node, Some(first.node()))
        }
        None => (
            document.push_heading(RELEASE_HEADING_DEPTH, spec.heading_inlines()),
            None,
        ),
    };
    index.prepend(Heading::new(node, spec, None).closed_by(end));

    debug!("inserted Unreleased placeholder");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;

    fn parse(markdown: &str) -> (Document, DocumentIndex) {
        let document = Document::parse(markdown).unwrap();
        let mut diagnostics = Diagnostics::new();
        let index = build_index(&document, &mut diagnostics);
        diagnostics.check().unwrap();
        (document, index)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    const CHANGELOG: &str = "# Changelog

## [Unreleased]

- Pending

## [1.0.0] - 2022-01-01

- First
";

    #[test]
    fn promotes_heading_and_index_entry() {
        let (mut document, mut index) = parse(CHANGELOG);
        promote(&mut document, &mut index, &Version::new(1, 1, 0), date("2022-03-31")).unwrap();

        assert_eq!(
            document.to_markdown(),
            "# Changelog

## [1.1.0] - 2022-03-31

- Pending

## [1.0.0] - 2022-01-01

- First
"
        );
        let release = index.first().unwrap().spec().release().unwrap();
        assert_eq!(release.version, Version::new(1, 1, 0));
        assert_eq!(release.suffix, "");
        assert!(index.unreleased().is_none());
    }

    #[test]
    fn promotion_requires_unreleased() {
        let (mut document, mut index) = parse("## [1.0.0] - 2022-01-01\n\n- First\n");
        let err = promote(&mut document, &mut index, &Version::new(1, 1, 0), date("2022-03-31"))
            .unwrap_err();
        assert_eq!(err.to_string(), "the Unreleased section must be present");
    }

    #[test]
    fn promotion_of_empty_index_fails() {
        let (mut document, mut index) = parse("# Changelog\n");
        assert!(
            promote(&mut document, &mut index, &Version::new(0, 1, 0), date("2022-03-31")).is_err()
        );
    }

    #[test]
    fn placeholder_goes_above_promoted_release() {
        let (mut document, mut index) = parse(CHANGELOG);
        promote(&mut document, &mut index, &Version::new(1, 1, 0), date("2022-03-31")).unwrap();
        insert_unreleased_placeholder(&mut document, &mut index).unwrap();

        assert!(
            document
                .to_markdown()
                .starts_with("# Changelog\n\n## [Unreleased]\n\n## [1.1.0] - 2022-03-31\n")
        );
        assert_eq!(index.len(), 3);
        assert!(index.unreleased().is_some());
        assert_eq!(
            index.headings()[0].section_end(),
            Some(index.headings()[1].node())
        );
    }

    #[test]
    fn placeholder_is_not_duplicated() {
        let (mut document, mut index) = parse(CHANGELOG);
        insert_unreleased_placeholder(&mut document, &mut index).unwrap();
        assert_eq!(document.to_markdown(), CHANGELOG);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn placeholder_in_empty_changelog_goes_last() {
        let (mut document, mut index) = parse("# Changelog\n");
        insert_unreleased_placeholder(&mut document, &mut index).unwrap();
        assert_eq!(document.to_markdown(), "# Changelog\n\n## [Unreleased]\n");
        assert_eq!(index.len(), 1);
    }
}

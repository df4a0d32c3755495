// 🆕 Newbie Selector - animals first seen in the most recent survey
// Their photos are harvested so the reference photo library can be updated by hand.

use crate::error::{Result, SurveyError};
use crate::ledger::{Identifier, Ledger, PhotoTags};
use crate::survey::SurveySeries;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Left and right flank photos are stored as `<tag>_L.jpg` / `<tag>_R.jpg`
const PHOTO_SIDES: [&str; 2] = ["_L.jpg", "_R.jpg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Newbie {
    pub key: Identifier,

    /// Every sighting tag, in the order the sightings were recorded
    pub tags: Vec<String>,
}

/// Animals with no sighting in any survey before the last one
///
/// Every ledger entry has at least one sighting, so an animal absent from
/// all earlier surveys was seen in the last one.
pub fn collect_newbies(series: &SurveySeries, ledger: &Ledger<PhotoTags>) -> Vec<Newbie> {
    let earlier = match series.surveys().split_last() {
        Some((_, earlier)) => earlier,
        None => return Vec::new(),
    };

    ledger
        .individuals()
        .iter()
        .filter(|individual| {
            !earlier
                .iter()
                .any(|survey| survey.dates().iter().any(|date| individual.seen_on(date)))
        })
        .map(|individual| Newbie {
            key: individual.key.clone(),
            tags: individual
                .records
                .iter()
                .flat_map(|r| r.payload.tags().iter().cloned())
                .collect(),
        })
        .collect()
}

/// One line per newbie: `id, tag1, tag2` with CRLF
pub fn write_newbies<W: Write>(out: &mut W, newbies: &[Newbie]) -> Result<()> {
    for newbie in newbies {
        write!(out, "{}", newbie.key)?;
        for tag in &newbie.tags {
            write!(out, ", {}", tag)?;
        }
        out.write_all(b"\r\n")?;
    }
    Ok(())
}

/// Create the photo directory; it must not exist already
pub fn create_photo_dir(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(SurveyError::OutputDirectoryExists(path.to_path_buf()));
    }
    fs::create_dir_all(path)?;
    Ok(())
}

/// Copy the left/right photos for every newbie sighting into `dest`
///
/// Missing photos are skipped. Returns the number of files copied.
pub fn collect_photos(src: &Path, dest: &Path, newbies: &[Newbie]) -> usize {
    let mut copied = 0;
    for newbie in newbies {
        for tag in &newbie.tags {
            for side in PHOTO_SIDES {
                let file_name = format!("{}{}", tag, side);
                let photo = src.join(&file_name);
                if !photo.exists() {
                    debug!(photo = %photo.display(), "no photo");
                    continue;
                }
                match fs::copy(&photo, dest.join(&file_name)) {
                    Ok(_) => copied += 1,
                    Err(e) => warn!(photo = %photo.display(), error = %e, "photo copy failed"),
                }
            }
        }
    }
    copied
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::SurveyDate;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> SurveyDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn key(s: &str) -> Identifier {
        Identifier::Concrete(s.to_string())
    }

    fn series() -> SurveySeries {
        SurveySeries::from_markers(
            "Gorge",
            vec![Some(d(2010, 1, 5)), None, Some(d(2011, 1, 5)), Some(d(2011, 1, 6))],
        )
    }

    fn ledger() -> Ledger<PhotoTags> {
        let mut ledger = Ledger::new();
        ledger.add_sighting(d(2010, 1, 5), key("old"), PhotoTags::single("100"));
        ledger.add_sighting(d(2011, 1, 5), key("new"), PhotoTags::single("200"));
        ledger.add_sighting(d(2011, 1, 5), Identifier::AnonymousSingleton, PhotoTags::single("201"));
        ledger.add_sighting(d(2011, 1, 5), key("old"), PhotoTags::single("202"));
        ledger.add_sighting(d(2011, 1, 6), key("new"), PhotoTags::single("203"));
        ledger.add_sighting(d(2011, 1, 6), key("new"), PhotoTags::single("204"));
        ledger
    }

    #[test]
    fn test_newbies_only_seen_in_last_survey() {
        let newbies = collect_newbies(&series(), &ledger());

        assert_eq!(
            newbies,
            vec![
                Newbie {
                    key: key("new"),
                    tags: vec!["200".to_string(), "203".to_string(), "204".to_string()],
                },
                Newbie {
                    key: Identifier::AnonymousSingleton,
                    tags: vec!["201".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_unmatched_animal_in_last_survey_is_a_newbie() {
        let mut ledger = Ledger::new();
        ledger.add_sighting(d(2010, 1, 5), Identifier::UnmatchedPending, PhotoTags::single("100"));
        ledger.add_sighting(d(2011, 1, 5), Identifier::UnmatchedPending, PhotoTags::single("200"));

        let newbies = collect_newbies(&series(), &ledger);

        assert_eq!(
            newbies,
            vec![Newbie {
                key: Identifier::UnmatchedPending,
                tags: vec!["200".to_string()],
            }]
        );
    }

    #[test]
    fn test_single_survey_everyone_is_new() {
        let series = SurveySeries::from_markers("Gorge", vec![Some(d(2011, 1, 5))]);
        let mut ledger = Ledger::new();
        ledger.add_sighting(d(2011, 1, 5), key("a"), PhotoTags::single("1"));
        ledger.add_sighting(d(2011, 1, 5), key("b"), PhotoTags::single("2"));

        assert_eq!(collect_newbies(&series, &ledger).len(), 2);
    }

    #[test]
    fn test_write_newbies_csv_lines() {
        let newbies = collect_newbies(&series(), &ledger());
        let mut buf = Vec::new();

        write_newbies(&mut buf, &newbies).unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "new, 200, 203, 204\r\nSINGLETON_SO_FAR, 201\r\n"
        );
    }

    #[test]
    fn test_photo_dir_must_be_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let photos = dir.path().join("Gorge_grand");

        create_photo_dir(&photos).unwrap();
        assert!(photos.is_dir());

        let err = create_photo_dir(&photos).unwrap_err();
        assert!(matches!(err, SurveyError::OutputDirectoryExists(_)));
    }

    #[test]
    fn test_collect_photos_copies_existing_sides() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("200_L.jpg"), b"left").unwrap();
        fs::write(src.path().join("200_R.jpg"), b"right").unwrap();
        fs::write(src.path().join("204_R.jpg"), b"right").unwrap();
        fs::write(src.path().join("100_L.jpg"), b"old").unwrap();

        let newbies = collect_newbies(&series(), &ledger());
        let copied = collect_photos(src.path(), dest.path(), &newbies);

        assert_eq!(copied, 3);
        assert!(dest.path().join("200_L.jpg").exists());
        assert!(dest.path().join("204_R.jpg").exists());
        assert!(!dest.path().join("100_L.jpg").exists());
    }
}

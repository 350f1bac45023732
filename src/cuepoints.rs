//! Navigation cuepoint generation and document emission.
//!
//! The cuepoint document is the XML-like format the metadata injector
//! consumes: a declaration line, a `<tags>` root, and one
//! `<metatag event="onCuePoint">` block per cuepoint.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveTime;

use crate::error::Result;

/// A player-navigation marker at a whole-second offset into the video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cuepoint {
    /// Human-readable `HH:MM:SS` label.
    pub name: String,
    /// Offset into the video, in whole seconds.
    pub offset_secs: u32,
}

impl Cuepoint {
    pub fn at(offset_secs: u32) -> Self {
        // Offset added to a zero epoch; wraps past 24h like the HH:MM:SS
        // rendering itself does.
        let time = NaiveTime::MIN + chrono::Duration::seconds(i64::from(offset_secs));
        Self {
            name: time.format("%H:%M:%S").to_string(),
            offset_secs,
        }
    }

    /// The `<timestamp>` field: the second offset with three literal
    /// zeros appended (the injector expects milliseconds).
    pub fn timestamp_millis(&self) -> String {
        format!("{}000", self.offset_secs)
    }
}

/// One cuepoint per `interval` seconds, at offsets `0, f, 2f, ... < duration`.
pub fn generate(duration_secs: u32, interval_secs: u32) -> Vec<Cuepoint> {
    (0..duration_secs)
        .step_by(interval_secs as usize)
        .map(Cuepoint::at)
        .collect()
}

/// Serialize the cuepoints as a navigation-cuepoint document at `path`.
pub fn write_document(path: &Path, cuepoints: &[Cuepoint]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);

    writeln!(file, "<?xml version=\"1.0\"?>")?;
    writeln!(file, "<tags>")?;
    writeln!(file, "  <!-- navigation cue points -->")?;
    for cue in cuepoints {
        writeln!(file, "  <metatag event=\"onCuePoint\">")?;
        writeln!(file, "    <name>{}</name>", cue.name)?;
        writeln!(file, "    <timestamp>{}</timestamp>", cue.timestamp_millis())?;
        writeln!(file, "    <type>navigation</type>")?;
        writeln!(file, "  </metatag>")?;
    }
    writeln!(file, "</tags>")?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_multiples_of_the_interval_below_duration() {
        let cues = generate(10, 3);
        let offsets: Vec<u32> = cues.iter().map(|c| c.offset_secs).collect();
        assert_eq!(offsets, vec![0, 3, 6, 9]);
    }

    #[test]
    fn count_is_duration_over_interval_rounded_up() {
        for (duration, interval) in [(10u32, 1u32), (10, 3), (12, 4), (1, 5), (60, 7)] {
            let expected = duration.div_ceil(interval) as usize;
            assert_eq!(generate(duration, interval).len(), expected);
        }
    }

    #[test]
    fn zero_duration_yields_no_cuepoints() {
        assert!(generate(0, 1).is_empty());
    }

    #[test]
    fn timestamp_fields_round_trip() {
        let cue = Cuepoint::at(3661);
        assert_eq!(cue.name, "01:01:01");
        assert_eq!(cue.timestamp_millis(), "3661000");

        let zero = Cuepoint::at(0);
        assert_eq!(zero.name, "00:00:00");
        assert_eq!(zero.timestamp_millis(), "0000");
    }

    #[test]
    fn document_has_wrapper_and_one_block_per_cuepoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cues.xml");
        write_document(&path, &generate(3, 1)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\"?>\n<tags>\n"));
        assert!(text.ends_with("</tags>\n"));
        assert_eq!(text.matches("<metatag event=\"onCuePoint\">").count(), 3);
        assert!(text.contains("<name>00:00:02</name>"));
        assert!(text.contains("<timestamp>2000</timestamp>"));
        assert!(text.contains("<type>navigation</type>"));
    }

    #[test]
    fn empty_document_is_just_the_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cues.xml");
        write_document(&path, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "<?xml version=\"1.0\"?>\n<tags>\n  <!-- navigation cue points -->\n</tags>\n"
        );
    }
}

//! Content provider boundary.
//!
//! Provider records arrive as loosely typed JSON (translation payloads are
//! arbitrary values). They are validated here, once, into [`SectionData`];
//! nothing past this module sees a raw record.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;

use crate::content::{Entry, Marker, SectionData, SectionMeta};
use crate::error::InputError;

/// Chapter record as served by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterRecord {
    pub id: u32,
    #[serde(default)]
    pub bismillah_pre: bool,
    pub name_simple: String,
    #[serde(default)]
    pub name_arabic: String,
    pub verses_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerseRecord {
    #[serde(default)]
    pub id: u32,
    pub verse_number: u32,
    #[serde(default)]
    pub ruku_number: Option<u32>,
    #[serde(default)]
    pub sajdah_number: Option<u32>,
    #[serde(default)]
    pub text_uthmani: String,
    #[serde(default)]
    pub translations: Vec<Value>,
}

/// One provider response: a chapter and its verses.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionRecord {
    pub chapter: ChapterRecord,
    pub verses: Vec<VerseRecord>,
}

impl SectionRecord {
    pub fn from_json(json: &str) -> Result<Self, InputError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate into engine input: entries sorted by index, duplicate
    /// indices rejected, translation payloads reduced to optional text.
    pub fn validate(self) -> Result<SectionData, InputError> {
        let id = self.chapter.id;
        let invalid = |reason: String| InputError::InvalidRecord { id, reason };

        if self.chapter.name_simple.trim().is_empty() {
            return Err(invalid("chapter has no name".into()));
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(self.verses.len());
        for verse in self.verses {
            if verse.verse_number == 0 {
                return Err(invalid(format!("verse record {} has number 0", verse.id)));
            }
            if !seen.insert(verse.verse_number) {
                return Err(invalid(format!("verse {} appears twice", verse.verse_number)));
            }
            entries.push(verse_to_entry(verse));
        }
        entries.sort_by_key(|e| e.index);

        if entries.len() as u32 != self.chapter.verses_count {
            log::warn!(
                "chapter {id} advertises {} verses but {} were supplied",
                self.chapter.verses_count,
                entries.len()
            );
        }

        Ok(SectionData {
            meta: SectionMeta {
                id,
                name: self.chapter.name_simple,
                native_name: self.chapter.name_arabic,
                entry_count: self.chapter.verses_count,
                has_preamble: self.chapter.bismillah_pre,
            },
            entries,
        })
    }
}

fn verse_to_entry(verse: VerseRecord) -> Entry {
    let mut markers = Vec::new();
    if let Some(n) = verse.sajdah_number.filter(|n| *n > 0) {
        markers.push(Marker::new("Sajdah", n));
    }
    if let Some(n) = verse.ruku_number.filter(|n| *n > 0) {
        markers.push(Marker::new("Ruku", n));
    }
    Entry {
        index: verse.verse_number,
        primary: verse.text_uthmani,
        annotations: verse.translations.iter().map(translation_text).collect(),
        markers,
    }
}

/// A translation is either a bare string or an object with a `text` field.
fn translation_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("text")?.as_str()?,
        _ => return None,
    };
    let text = strip_footnote_tags(text);
    (!text.trim().is_empty()).then_some(text)
}

/// Providers embed footnote references as `<sup ...>n</sup>`; drop them.
fn strip_footnote_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<sup") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</sup>") {
            Some(end) => rest = &rest[start + end + "</sup>".len()..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Supplies one section per identifier.
pub trait ContentProvider {
    fn fetch_section(&self, id: u32) -> Result<SectionData, InputError>;
}

/// Reads `<dir>/<id>.json` provider records.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    dir: PathBuf,
}

impl DirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Identifiers of all `<id>.json` files in the directory, ascending.
    pub fn available_ids(&self) -> Result<Vec<u32>, InputError> {
        let mut ids: Vec<u32> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension()? != "json" {
                    return None;
                }
                path.file_stem()?.to_str()?.parse().ok()
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

impl ContentProvider for DirectoryProvider {
    fn fetch_section(&self, id: u32) -> Result<SectionData, InputError> {
        let path = self.dir.join(format!("{id}.json"));
        let json = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => InputError::Unavailable {
                id,
                reason: format!("{} not found", path.display()),
            },
            _ => InputError::Io(e),
        })?;
        let record = SectionRecord::from_json(&json).map_err(|e| InputError::InvalidRecord {
            id,
            reason: e.to_string(),
        })?;
        if record.chapter.id != id {
            return Err(InputError::InvalidRecord {
                id,
                reason: format!("file holds chapter {}", record.chapter.id),
            });
        }
        log::debug!("loaded chapter {id} from {}", path.display());
        record.validate()
    }
}

/// Fetch `ids` in parallel. The result keeps the order of `ids`; the first
/// failure in that order is returned.
pub fn fetch_sections<P: ContentProvider + Sync + ?Sized>(
    provider: &P,
    ids: &[u32],
) -> Result<Vec<SectionData>, InputError> {
    if ids.is_empty() {
        return Err(InputError::NoSectionsSelected);
    }
    let sections = ids
        .par_iter()
        .map(|&id| provider.fetch_section(id))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("fetched {} chapter(s)", sections.len());
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "chapter": {"id": 3, "bismillah_pre": true, "name_simple": "Test", "name_arabic": "اختبار", "verses_count": 2},
        "verses": [
            {"id": 12, "verse_number": 2, "ruku_number": 1, "sajdah_number": null, "text_uthmani": "ب",
             "translations": [{"resource_id": 20, "text": "Second<sup foot_note=1>1</sup>"}]},
            {"id": 11, "verse_number": 1, "ruku_number": 0, "sajdah_number": 4, "text_uthmani": "أ",
             "translations": [{"resource_id": 20}, "plain"]}
        ]
    }"#;

    #[test]
    fn record_validates_sorted() {
        let section = SectionRecord::from_json(RECORD).unwrap().validate().unwrap();
        assert_eq!(section.meta.name, "Test");
        assert!(section.meta.has_preamble);
        let indices: Vec<u32> = section.entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn translations_reduce_to_optional_text() {
        let section = SectionRecord::from_json(RECORD).unwrap().validate().unwrap();
        assert_eq!(section.entries[0].annotations, vec![None, Some("plain".to_string())]);
        assert_eq!(section.entries[1].annotations, vec![Some("Second".to_string())]);
    }

    #[test]
    fn markers_from_ruku_and_sajdah() {
        let section = SectionRecord::from_json(RECORD).unwrap().validate().unwrap();
        assert_eq!(section.entries[0].markers, vec![Marker::new("Sajdah", 4)]);
        assert_eq!(section.entries[1].markers, vec![Marker::new("Ruku", 1)]);
    }

    #[test]
    fn duplicate_verse_is_rejected() {
        let json = r#"{"chapter": {"id": 1, "name_simple": "D", "verses_count": 2},
            "verses": [{"verse_number": 1}, {"verse_number": 1}]}"#;
        let err = SectionRecord::from_json(json).unwrap().validate().unwrap_err();
        assert!(matches!(err, InputError::InvalidRecord { id: 1, .. }));
    }

    #[test]
    fn count_mismatch_is_tolerated() {
        let json = r#"{"chapter": {"id": 1, "name_simple": "D", "verses_count": 7},
            "verses": [{"verse_number": 1, "text_uthmani": "x"}]}"#;
        let section = SectionRecord::from_json(json).unwrap().validate().unwrap();
        assert_eq!(section.entries.len(), 1);
        assert_eq!(section.meta.entry_count, 7);
    }

    #[test]
    fn no_ids_is_an_error() {
        let provider = DirectoryProvider::new("/nonexistent");
        assert!(matches!(
            fetch_sections(&provider, &[]),
            Err(InputError::NoSectionsSelected)
        ));
    }

    #[test]
    fn directory_provider_keeps_requested_order() {
        let tmp = tempfile::tempdir().unwrap();
        for id in [1u32, 2, 3] {
            let json = format!(
                r#"{{"chapter": {{"id": {id}, "name_simple": "C{id}", "verses_count": 1}},
                    "verses": [{{"verse_number": 1, "text_uthmani": "x"}}]}}"#
            );
            fs::write(tmp.path().join(format!("{id}.json")), json).unwrap();
        }
        let provider = DirectoryProvider::new(tmp.path());
        let sections = fetch_sections(&provider, &[3, 1, 2]).unwrap();
        let ids: Vec<u32> = sections.iter().map(|s| s.meta.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(provider.available_ids().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = DirectoryProvider::new(tmp.path());
        let err = fetch_sections(&provider, &[5]).unwrap_err();
        assert!(matches!(err, InputError::Unavailable { id: 5, .. }));
    }
}

//! Built-in sample chapters for demos and tests.
//!
//! The samples are stored as provider records and go through the same
//! validation as records read from disk.

use serde_json::{json, Value};

use crate::content::SectionData;
use crate::error::InputError;
use crate::provider::{ContentProvider, SectionRecord};

/// Chapter 1 (Al-Fatihah): seven verses, no preamble.
pub fn al_fatihah_record() -> Value {
    let verses = [
        ("بِسْمِ ٱللَّهِ ٱلرَّحْمَـٰنِ ٱلرَّحِيمِ", "In the name of Allah, the Entirely Merciful, the Especially Merciful."),
        ("ٱلْحَمْدُ لِلَّهِ رَبِّ ٱلْعَـٰلَمِينَ", "[All] praise is [due] to Allah, Lord of the worlds -"),
        ("ٱلرَّحْمَـٰنِ ٱلرَّحِيمِ", "The Entirely Merciful, the Especially Merciful,"),
        ("مَـٰلِكِ يَوْمِ ٱلدِّينِ", "Sovereign of the Day of Recompense."),
        ("إِيَّاكَ نَعْبُدُ وَإِيَّاكَ نَسْتَعِينُ", "It is You we worship and You we ask for help."),
        ("ٱهْدِنَا ٱلصِّرَٰطَ ٱلْمُسْتَقِيمَ", "Guide us to the straight path -"),
        (
            "صِرَٰطَ ٱلَّذِينَ أَنْعَمْتَ عَلَيْهِمْ غَيْرِ ٱلْمَغْضُوبِ عَلَيْهِمْ وَلَا ٱلضَّآلِّينَ",
            "The path of those upon whom You have bestowed favor, not of those who have evoked [Your] anger or of those who are astray.",
        ),
    ];
    record(1, false, "Al-Fatihah", "الفاتحة", Some(1), &verses)
}

/// Chapter 112 (Al-Ikhlas): four verses with the preamble.
pub fn al_ikhlas_record() -> Value {
    let verses = [
        ("قُلْ هُوَ ٱللَّهُ أَحَدٌ", "Say, \"He is Allah, [who is] One,"),
        ("ٱللَّهُ ٱلصَّمَدُ", "Allah, the Eternal Refuge."),
        ("لَمْ يَلِدْ وَلَمْ يُولَدْ", "He neither begets nor is born,"),
        ("وَلَمْ يَكُن لَّهُۥ كُفُوًا أَحَدٌۢ", "Nor is there to Him any equivalent.\""),
    ];
    record(112, true, "Al-Ikhlas", "الإخلاص", None, &verses)
}

fn record(
    id: u32,
    bismillah_pre: bool,
    name: &str,
    arabic: &str,
    ruku: Option<u32>,
    verses: &[(&str, &str)],
) -> Value {
    let verses: Vec<Value> = verses
        .iter()
        .enumerate()
        .map(|(i, (text, translation))| {
            json!({
                "id": id * 1000 + i as u32 + 1,
                "verse_number": i + 1,
                "ruku_number": ruku,
                "sajdah_number": null,
                "text_uthmani": text,
                "translations": [{ "resource_id": 20, "text": translation }],
            })
        })
        .collect();
    json!({
        "chapter": {
            "id": id,
            "bismillah_pre": bismillah_pre,
            "name_simple": name,
            "name_arabic": arabic,
            "verses_count": verses.len(),
        },
        "verses": verses,
    })
}

/// Serves the built-in samples by chapter id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleProvider;

impl SampleProvider {
    pub const IDS: [u32; 2] = [1, 112];
}

impl ContentProvider for SampleProvider {
    fn fetch_section(&self, id: u32) -> Result<SectionData, InputError> {
        let value = match id {
            1 => al_fatihah_record(),
            112 => al_ikhlas_record(),
            _ => {
                return Err(InputError::Unavailable {
                    id,
                    reason: "not among the built-in samples".into(),
                })
            }
        };
        let record: SectionRecord = serde_json::from_value(value)?;
        record.validate()
    }
}

/// Both samples in chapter order.
pub fn demo_sections() -> Result<Vec<SectionData>, InputError> {
    SampleProvider::IDS
        .iter()
        .map(|&id| SampleProvider.fetch_section(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_validate() {
        let sections = demo_sections().unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].entries.len(), 7);
        assert!(!sections[0].meta.has_preamble);
        assert_eq!(sections[1].entries.len(), 4);
        assert!(sections[1].meta.has_preamble);
    }

    #[test]
    fn every_sample_entry_has_a_translation() {
        for section in demo_sections().unwrap() {
            for entry in &section.entries {
                assert!(matches!(entry.annotations.as_slice(), [Some(_)]));
            }
        }
    }

    #[test]
    fn unknown_sample_is_unavailable() {
        assert!(matches!(
            SampleProvider.fetch_section(2),
            Err(InputError::Unavailable { id: 2, .. })
        ));
    }
}

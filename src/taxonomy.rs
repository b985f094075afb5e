//! Instrument and voice taxonomy.
//!
//! Maps instrument/voice abbreviations to the namespace scope their feature
//! columns live in. Resolution is total over the declared vocabulary and
//! fails loudly for anything outside it: an unknown token signals a
//! vocabulary gap, never a value to be defaulted.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{ReportError, Result};

/// Namespace level of a feature column.
///
/// Carried explicitly once resolved so that no downstream code re-derives it
/// from string prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A single instrument part (e.g. first violins).
    Part,
    /// An instrument family (used for the vocal parts).
    Family,
    /// An aggregated sound category (e.g. all oboes).
    Sound,
}

/// Prefix of the presence columns produced by instrumentation unbundling.
pub const PRESENCE: &str = "Presence";

/// Entity name used for the consolidated vocal family.
pub const VOICE_ENTITY: &str = "Voice";

/// Column prefix for a Part-scope entity, e.g. `PartVnI_`.
pub fn part_prefix(entity: &str) -> String {
    format!("Part{entity}_")
}

/// Column prefix for a Family-scope entity, e.g. `FamilyVoice_`.
pub fn family_prefix(entity: &str) -> String {
    format!("Family{entity}_")
}

/// Column prefix for a Sound-scope entity, e.g. `SoundOb_`.
pub fn sound_prefix(entity: &str) -> String {
    format!("Sound{entity}_")
}

/// Capitalizes the first letter of an abbreviation while preserving the
/// rest, so roman numerals survive (`vnI` becomes `VnI`).
pub fn entity_name(abbrev: &str) -> String {
    let mut chars = abbrev.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One entry of the instrument vocabulary.
#[derive(Debug, Clone)]
pub struct InstrumentRecord {
    /// Canonical singular abbreviation, e.g. `ob`.
    pub abbrev: String,
    /// Plural/group form used in scoring descriptors, e.g. `obs`.
    pub plural: String,
    /// Sound category the part collapses to, e.g. `ob` for `obI`/`obII`.
    pub sound: String,
    /// Instrument family, e.g. `ww`, `str`, `voice`.
    pub family: String,
    /// Canonical score order index; lower comes first.
    pub order: usize,
}

/// Result of resolving one abbreviation.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub scope: Scope,
    /// Capitalized entity the feature columns are keyed by.
    pub entity: String,
    /// Canonical order index, used by the texture ratio matrix.
    pub order: usize,
    /// True for vocal parts: clef-derived columns are only relevant then.
    pub clef_relevant: bool,
}

impl Resolution {
    /// Column prefix of this entity's feature namespace.
    pub fn prefix(&self) -> String {
        match self.scope {
            Scope::Part => part_prefix(&self.entity),
            Scope::Family => family_prefix(&self.entity),
            Scope::Sound => sound_prefix(&self.entity),
        }
    }

    /// Name of the column holding this entity's note count. Part-scope
    /// entities carry a raw count; family and sound scopes carry a mean
    /// across the aggregated parts.
    pub fn note_count_column(&self) -> String {
        match self.scope {
            Scope::Part => format!("{}Notes", self.prefix()),
            Scope::Family | Scope::Sound => format!("{}NotesMean", self.prefix()),
        }
    }
}

const VOICE_FAMILY: &str = "voice";

/// Total mapping from instrument/voice abbreviation to taxonomy record.
#[derive(Debug, Clone)]
pub struct InstrumentTaxonomy {
    records: BTreeMap<String, InstrumentRecord>,
    /// Plural form → canonical abbreviation, so `obs` resolves like `ob`.
    aliases: HashMap<String, String>,
}

impl InstrumentTaxonomy {
    /// Builds a taxonomy from explicit records.
    pub fn from_records(records: Vec<InstrumentRecord>) -> Self {
        let mut map = BTreeMap::new();
        let mut aliases = HashMap::new();
        for record in records {
            if record.plural != record.abbrev {
                aliases.insert(record.plural.clone(), record.abbrev.clone());
            }
            map.insert(record.abbrev.clone(), record);
        }
        Self {
            records: map,
            aliases,
        }
    }

    /// The vocabulary used by the aria corpus: vocal parts first (the
    /// texture matrix orders voices before the band), then winds, brass,
    /// percussion, and strings in customary score order.
    pub fn aria_corpus() -> Self {
        let mut records = Vec::new();
        let mut order = 0;
        let mut push = |abbrev: &str, plural: &str, sound: &str, family: &str| {
            records.push(InstrumentRecord {
                abbrev: abbrev.to_string(),
                plural: plural.to_string(),
                sound: sound.to_string(),
                family: family.to_string(),
                order,
            });
            order += 1;
        };

        for voice in ["sop", "mez", "alt", "ten", "bar", "bass"] {
            push(voice, voice, voice, VOICE_FAMILY);
        }
        push("fl", "fls", "fl", "ww");
        push("flI", "fls", "fl", "ww");
        push("flII", "fls", "fl", "ww");
        push("ob", "obs", "ob", "ww");
        push("obI", "obs", "ob", "ww");
        push("obII", "obs", "ob", "ww");
        push("cl", "cls", "cl", "ww");
        push("fag", "fags", "fag", "ww");
        push("hn", "hns", "hn", "br");
        push("hnI", "hns", "hn", "br");
        push("hnII", "hns", "hn", "br");
        push("tpt", "tpts", "tpt", "br");
        push("tb", "tbs", "tb", "br");
        push("timp", "timp", "timp", "perc");
        push("vnI", "vnI", "vn", "str");
        push("vnII", "vnII", "vn", "str");
        push("va", "vas", "va", "str");
        push("vc", "vcs", "vc", "str");
        push("bs", "bs", "bs", "str");
        Self::from_records(records)
    }

    fn record(&self, token: &str) -> Result<&InstrumentRecord> {
        let canonical = self.aliases.get(token).map(String::as_str).unwrap_or(token);
        self.records
            .get(canonical)
            .ok_or_else(|| ReportError::Resolution(token.to_string()))
    }

    /// Resolves an abbreviation to its scope, entity, and canonical order.
    ///
    /// Violin parts keep Part scope so first and second violins remain
    /// distinguishable; vocal parts collapse to the Voice family; everything
    /// else aggregates at Sound scope with singular/plural normalization.
    pub fn resolve(&self, token: &str) -> Result<Resolution> {
        let record = self.record(token)?;
        if record.abbrev.starts_with("vn") && record.abbrev != record.sound {
            return Ok(Resolution {
                scope: Scope::Part,
                entity: entity_name(&record.abbrev),
                order: record.order,
                clef_relevant: false,
            });
        }
        if record.family == VOICE_FAMILY {
            return Ok(Resolution {
                scope: Scope::Family,
                entity: VOICE_ENTITY.to_string(),
                order: record.order,
                clef_relevant: true,
            });
        }
        Ok(Resolution {
            scope: Scope::Sound,
            entity: entity_name(&record.sound),
            order: record.order,
            clef_relevant: false,
        })
    }

    /// True for the declared-vocabulary check used by the tests.
    pub fn contains(&self, token: &str) -> bool {
        self.record(token).is_ok()
    }

    /// All canonical abbreviations, in canonical order.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut entries: Vec<&InstrumentRecord> = self.records.values().collect();
        entries.sort_by_key(|record| record.order);
        entries.iter().map(|record| record.abbrev.clone()).collect()
    }

    /// Resolves a list of instrument tokens into the distinct entities whose
    /// note counts feed the texture ratio matrix, in canonical order.
    ///
    /// The second of a roman-numeral II pair of the same sound is skipped so
    /// the sound is not counted twice; multiple vocal parts collapse to one
    /// Voice entry for the same reason.
    pub fn resolve_ensemble(&self, tokens: &[String]) -> Result<Vec<Resolution>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut resolved: Vec<Resolution> = Vec::new();
        for token in tokens {
            let record = self.record(token)?;
            if record.family != VOICE_FAMILY
                && record.abbrev.ends_with("II")
                && !record.abbrev.starts_with("vn")
            {
                continue;
            }
            let resolution = self.resolve(token)?;
            if seen.insert(resolution.entity.clone()) {
                resolved.push(resolution);
            }
        }
        resolved.sort_by_key(|resolution| resolution.order);
        Ok(resolved)
    }

    /// Generates every textual descriptor of a realizable sub-ensemble.
    ///
    /// For each non-empty subset of the given instruments (taken in
    /// canonical order) and each substitution of an individual label by its
    /// resolved group label, one comma-joined descriptor is produced.
    /// Descriptors are deduplicated, so singular and plural forms that
    /// collapse to the same text appear once, and the output is
    /// deterministic for a fixed taxonomy and instrument list.
    pub fn scoring_descriptors(&self, tokens: &[String]) -> Result<Vec<String>> {
        let mut labels: Vec<(String, String, usize)> = Vec::new();
        let mut seen_individual: HashSet<String> = HashSet::new();
        for token in tokens {
            let record = self.record(token)?;
            if seen_individual.insert(record.abbrev.clone()) {
                labels.push((record.abbrev.clone(), record.plural.clone(), record.order));
            }
        }
        labels.sort_by_key(|(_, _, order)| *order);

        let mut descriptors: Vec<String> = Vec::new();
        let mut emitted: HashSet<String> = HashSet::new();
        let count = labels.len();
        // Subsets are enumerated by bitmask; within a subset every
        // individual/group choice is enumerated by a second mask. The order
        // of both enumerations is fixed, which makes the output stable.
        for subset in 1u32..(1u32 << count) {
            let members: Vec<usize> = (0..count).filter(|i| subset & (1 << i) != 0).collect();
            for choice in 0u32..(1u32 << members.len()) {
                let descriptor = members
                    .iter()
                    .enumerate()
                    .map(|(slot, &i)| {
                        if choice & (1 << slot) != 0 {
                            labels[i].1.as_str()
                        } else {
                            labels[i].0.as_str()
                        }
                    })
                    .collect::<Vec<&str>>()
                    .join(",");
                if emitted.insert(descriptor.clone()) {
                    descriptors.push(descriptor);
                }
            }
        }
        Ok(descriptors)
    }
}

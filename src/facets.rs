//! Combinatorial generation of metadata groupings.
//!
//! A facet combination is the ordered tuple of metadata dimensions one
//! report groups by. Generation is pure and deterministic for a fixed
//! vocabulary; domain exclusion rules remove combinations that would induce
//! degenerate single-row groups.

use crate::model;

/// Dimensions that identify a single aria. An arrangement drawn entirely
/// from these is already covered by a lower factor count (every group is one
/// work), so it is skipped at higher factor counts.
pub const ARIA_IDENTIFYING: &[&str] = &[
    model::ARIA_ID,
    model::ARIA_LABEL,
    model::TITLE,
    model::OPERA,
];

/// Dimensions that must never follow an aria-identifying dimension in a
/// combination of more than two factors.
const PROHIBITED_AFTER_ARIA: &[&str] = &[model::COMPOSER, model::OPERA];

/// Default grouping vocabulary, in declared priority order: the
/// aria-identifying dimensions first, then the broader musicological ones.
/// `Decade` is derived during aggregation and is not a raw metadata column,
/// so it never leads a combination.
pub const DIMENSION_VOCABULARY: &[&str] = &[
    model::ARIA_ID,
    model::ARIA_LABEL,
    model::TITLE,
    model::OPERA,
    model::COMPOSER,
    model::YEAR,
    "Decade",
    model::CLEF1,
];

/// An ordered tuple of facet dimensions defining one report's grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FacetCombination {
    pub dimensions: Vec<String>,
    pub factor_count: usize,
}

impl FacetCombination {
    fn new(dimensions: Vec<String>, factor_count: usize) -> Self {
        Self {
            dimensions,
            factor_count,
        }
    }

    /// File-name-friendly label for this combination.
    pub fn label(&self) -> String {
        if self.factor_count == 0 {
            "Total".to_string()
        } else {
            self.dimensions.join("_")
        }
    }

    /// True when Composer or Opera appears after an aria-identifying
    /// dimension; such a grouping degenerates to single-row groups.
    fn places_prohibited_after_aria(&self) -> bool {
        let first_aria = self
            .dimensions
            .iter()
            .position(|dim| dim == model::ARIA_ID || dim == model::ARIA_LABEL);
        let Some(first_aria) = first_aria else {
            return false;
        };
        self.dimensions[first_aria..]
            .iter()
            .skip(1)
            .any(|dim| PROHIBITED_AFTER_ARIA.contains(&dim.as_str()))
    }
}

/// Generates every valid facet combination for the given factor count.
///
/// - factor 0: a single per-work grouping (alphabetic by work identifier);
/// - factor 1: one combination per dimension;
/// - factor ≥ 2: each metadata dimension extended by every ordered
///   arrangement of `factor_count - 1` further distinct dimensions, minus
///   the arrangements covered by lower factor counts and those violating
///   the Composer/Opera exclusion rule.
pub fn generate(factor_count: usize, vocabulary: &[&str]) -> Vec<FacetCombination> {
    match factor_count {
        0 => vec![FacetCombination::new(vec![model::ARIA_ID.to_string()], 0)],
        1 => vocabulary
            .iter()
            .map(|dim| FacetCombination::new(vec![dim.to_string()], 1))
            .collect(),
        _ => {
            let extensions = arrangements(vocabulary, factor_count - 1)
                .into_iter()
                .filter(|arrangement| {
                    !arrangement
                        .iter()
                        .all(|dim| ARIA_IDENTIFYING.contains(&dim.as_str()))
                })
                .filter(|arrangement| {
                    model::METADATA_COLUMNS.contains(&arrangement[0].as_str())
                });

            let mut combinations = Vec::new();
            for extension in extensions {
                for base in vocabulary {
                    if extension.iter().any(|dim| dim == base) {
                        continue;
                    }
                    if !model::METADATA_COLUMNS.contains(base) {
                        continue;
                    }
                    let mut dimensions = vec![base.to_string()];
                    dimensions.extend(extension.iter().cloned());
                    let combination = FacetCombination::new(dimensions, factor_count);
                    if factor_count > 2 && combination.places_prohibited_after_aria() {
                        continue;
                    }
                    combinations.push(combination);
                }
            }
            combinations
        }
    }
}

/// Every ordered arrangement (permutation) of `length` distinct dimensions,
/// in lexicographic order over the vocabulary's declared ordering.
fn arrangements(vocabulary: &[&str], length: usize) -> Vec<Vec<String>> {
    let mut results = Vec::new();
    let mut current: Vec<String> = Vec::with_capacity(length);
    let mut used = vec![false; vocabulary.len()];
    extend_arrangement(vocabulary, length, &mut current, &mut used, &mut results);
    results
}

fn extend_arrangement(
    vocabulary: &[&str],
    length: usize,
    current: &mut Vec<String>,
    used: &mut Vec<bool>,
    results: &mut Vec<Vec<String>>,
) {
    if current.len() == length {
        results.push(current.clone());
        return;
    }
    for (i, dim) in vocabulary.iter().enumerate() {
        if used[i] {
            continue;
        }
        used[i] = true;
        current.push(dim.to_string());
        extend_arrangement(vocabulary, length, current, used, results);
        current.pop();
        used[i] = false;
    }
}

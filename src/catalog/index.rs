use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::protocol::Protocol;
use crate::core::types::CategoryMode;
use crate::utils::text::normalize_category;

/// A set of selected categories plus how to combine them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    /// Normalized, deduplicated selection
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub mode: CategoryMode,
}

impl CategoryFilter {
    pub fn new<I, S>(categories: I, mode: CategoryMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let categories = categories
            .into_iter()
            .map(|c| normalize_category(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        Self { categories, mode }
    }

    /// Parse a comma separated list such as `"adult,trauma"`
    pub fn from_csv(csv: Option<&str>, mode: CategoryMode) -> Self {
        Self::new(csv.unwrap_or_default().split(','), mode)
    }

    /// No categories selected (the filter passes everything)
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Check a single protocol against the filter
    pub fn matches(&self, protocol: &Protocol) -> bool {
        if self.is_empty() {
            return true;
        }
        match self.mode {
            CategoryMode::Any => self.categories.iter().any(|c| protocol.has_category(c)),
            CategoryMode::All => self.categories.iter().all(|c| protocol.has_category(c)),
        }
    }

    /// Narrow an arbitrary working set, keeping its order
    pub fn apply<'a>(&self, protocols: &[&'a Protocol]) -> Vec<&'a Protocol> {
        protocols
            .iter()
            .copied()
            .filter(|p| self.matches(p))
            .collect()
    }
}

/// Category -> catalog positions, built as protocols are added
#[derive(Debug, Default)]
pub struct CategoryIndex {
    by_category: HashMap<String, Vec<usize>>,
}

impl CategoryIndex {
    pub fn insert(&mut self, index: usize, categories: &[String]) {
        for category in categories {
            self.by_category
                .entry(category.clone())
                .or_default()
                .push(index);
        }
    }

    /// Catalog positions matching a non-empty filter, ascending
    pub fn matching_indices(&self, filter: &CategoryFilter) -> Vec<usize> {
        let mut postings = filter
            .categories
            .iter()
            .map(|c| self.by_category.get(c).map_or(&[][..], Vec::as_slice));

        let result: BTreeSet<usize> = match filter.mode {
            CategoryMode::Any => postings.flatten().copied().collect(),
            CategoryMode::All => {
                let Some(first) = postings.next() else {
                    return Vec::new();
                };
                let mut acc: BTreeSet<usize> = first.iter().copied().collect();
                for list in postings {
                    acc.retain(|idx| list.contains(idx));
                }
                acc
            }
        };
        result.into_iter().collect()
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.by_category
            .iter()
            .map(|(c, list)| (c.clone(), list.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::ProtocolCatalog;

    fn make_catalog() -> ProtocolCatalog {
        let mut catalog = ProtocolCatalog::new();
        catalog
            .add_protocol(Protocol::new("peds", "Mixed", "").with_categories(["adult", "pediatric"]))
            .unwrap();
        catalog
            .add_protocol(Protocol::new("trauma", "Trauma", "").with_categories(["trauma"]))
            .unwrap();
        catalog
            .add_protocol(Protocol::new("untagged", "Untagged", ""))
            .unwrap();
        catalog
    }

    fn ids(protocols: &[&Protocol]) -> Vec<String> {
        protocols.iter().map(|p| p.id.0.clone()).collect()
    }

    #[test]
    fn test_single_category_both_modes() {
        let catalog = make_catalog();
        for mode in [CategoryMode::Any, CategoryMode::All] {
            let filter = CategoryFilter::new(["pediatric"], mode);
            assert_eq!(ids(&catalog.filter_by_categories(&filter)), vec!["peds"]);
        }
    }

    #[test]
    fn test_any_vs_all() {
        let catalog = make_catalog();

        let any = CategoryFilter::new(["pediatric", "trauma"], CategoryMode::Any);
        assert_eq!(ids(&catalog.filter_by_categories(&any)), vec!["peds", "trauma"]);

        let all = CategoryFilter::new(["pediatric", "trauma"], CategoryMode::All);
        assert!(catalog.filter_by_categories(&all).is_empty());

        let all = CategoryFilter::new(["Adult", "PEDIATRIC"], CategoryMode::All);
        assert_eq!(ids(&catalog.filter_by_categories(&all)), vec!["peds"]);
    }

    #[test]
    fn test_unknown_category() {
        let catalog = make_catalog();
        let filter = CategoryFilter::new(["obstetric"], CategoryMode::Any);
        assert!(catalog.filter_by_categories(&filter).is_empty());
    }

    #[test]
    fn test_apply_matches_index() {
        let catalog = make_catalog();
        let all = catalog.all();
        for mode in [CategoryMode::Any, CategoryMode::All] {
            let filter = CategoryFilter::new(["adult", "trauma"], mode);
            assert_eq!(
                ids(&filter.apply(&all)),
                ids(&catalog.filter_by_categories(&filter))
            );
        }
    }

    #[test]
    fn test_from_csv() {
        let filter = CategoryFilter::from_csv(Some(" adult, ,Trauma"), CategoryMode::All);
        assert_eq!(filter.categories.len(), 2);
        assert!(filter.categories.contains("trauma"));
        assert!(CategoryFilter::from_csv(None, CategoryMode::Any).is_empty());
    }
}

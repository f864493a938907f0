use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{FormulaClassifier, FormulaFeatures};

/// Per-run memo of formula features keyed by exact formula text.
///
/// Lives for one analysis; each distinct formula reaches the classifier once.
pub struct FeatureCache<'c> {
    classifier: &'c dyn FormulaClassifier,
    entries: FxHashMap<String, Arc<FormulaFeatures>>,
    hits: usize,
}

impl<'c> FeatureCache<'c> {
    pub fn new(classifier: &'c dyn FormulaClassifier) -> Self {
        Self {
            classifier,
            entries: FxHashMap::default(),
            hits: 0,
        }
    }

    /// Features for `formula`, plus whether this call classified it.
    pub fn lookup(&mut self, formula: &str) -> (Arc<FormulaFeatures>, bool) {
        if let Some(features) = self.entries.get(formula) {
            self.hits += 1;
            return (Arc::clone(features), false);
        }
        let features = Arc::new(self.classifier.classify(formula));
        self.entries
            .insert(formula.to_string(), Arc::clone(&features));
        (features, true)
    }

    pub fn get(&mut self, formula: &str) -> Arc<FormulaFeatures> {
        self.lookup(formula).0
    }

    /// Distinct formulas classified so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::classifier::ExcelFormulaClassifier;

    struct Counting {
        inner: ExcelFormulaClassifier,
        calls: Cell<usize>,
    }

    impl FormulaClassifier for Counting {
        fn classify(&self, formula: &str) -> FormulaFeatures {
            self.calls.set(self.calls.get() + 1);
            self.inner.classify(formula)
        }
    }

    #[test]
    fn repeated_text_is_classified_once() {
        let counting = Counting {
            inner: ExcelFormulaClassifier::default(),
            calls: Cell::new(0),
        };
        let mut cache = FeatureCache::new(&counting);
        let (a, fresh_a) = cache.lookup("=SUM(A1:A3)");
        let (b, fresh_b) = cache.lookup("=SUM(A1:A3)");
        let c = cache.get("=SUM(B1:B3)");
        assert!(fresh_a && !fresh_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(counting.calls.get(), 2);
        assert_eq!((cache.len(), cache.hits()), (2, 1));
    }
}

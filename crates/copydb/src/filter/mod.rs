//! Include/exclude/order rules over schema object names.
//!
//! One filter instance exists per object category (tables, sequences).
//! Filters are built once from configuration and are immutable during a
//! run. All name handling is case-insensitive; `*` is a wildcard token
//! meaning "everything" in either set.

use std::collections::HashSet;

/// Name filter with an optional explicit copy order.
#[derive(Debug, Clone)]
pub struct ObjectFilter {
    enabled: bool,
    include: HashSet<String>,
    exclude: HashSet<String>,
    order: Vec<String>,
}

impl ObjectFilter {
    /// Create a filter that passes everything.
    #[must_use]
    pub fn all(enabled: bool) -> Self {
        Self {
            enabled,
            include: HashSet::new(),
            exclude: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Build a filter from configured name lists.
    ///
    /// When no explicit `order` is configured the include list doubles as
    /// the copy order.
    #[must_use]
    pub fn new(
        enabled: bool,
        include: impl IntoIterator<Item = String>,
        exclude: impl IntoIterator<Item = String>,
        order: impl IntoIterator<Item = String>,
    ) -> Self {
        let include_list: Vec<String> = include.into_iter().map(|s| s.to_lowercase()).collect();
        let mut order: Vec<String> = order.into_iter().map(|s| s.to_lowercase()).collect();
        if order.is_empty() {
            order = include_list.clone();
        }
        Self {
            enabled,
            include: include_list.into_iter().collect(),
            exclude: exclude.into_iter().map(|s| s.to_lowercase()).collect(),
            order,
        }
    }

    /// Whether this object category participates in the run at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the rules exclude every possible name.
    #[must_use]
    pub fn excludes_all(&self) -> bool {
        self.include.is_empty() && self.exclude.contains("*")
    }

    /// Membership test.
    ///
    /// Precedence:
    /// 1. a non-empty include set containing the name (or `*`) always wins;
    /// 2. otherwise an excluded name is out;
    /// 3. otherwise the name is in iff the include set is empty and the
    ///    exclude set does not contain `*`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        if !self.include.is_empty() && (self.include.contains(&key) || self.include.contains("*")) {
            return true;
        }
        if self.exclude.contains(&key) {
            return false;
        }
        self.include.is_empty() && !self.exclude.contains("*")
    }

    /// Stably sort `list` by position in the configured order.
    ///
    /// Items absent from the order list sort after all listed items; ties
    /// (including the whole unlisted bucket) break on the lower-cased name.
    /// An empty order list leaves the snapshot-provided order untouched.
    pub fn sort<T>(&self, list: &mut [T], name_of: impl Fn(&T) -> &str) {
        if self.order.is_empty() {
            return;
        }

        list.sort_by(|a, b| {
            let ka = name_of(a).to_lowercase();
            let kb = name_of(b).to_lowercase();
            let ia = self.order.iter().position(|o| *o == ka).unwrap_or(usize::MAX);
            let ib = self.order.iter().position(|o| *o == kb).unwrap_or(usize::MAX);
            ia.cmp(&ib).then_with(|| ka.cmp(&kb))
        });
    }
}

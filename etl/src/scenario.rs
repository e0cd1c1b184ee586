use parser::dataset::{sort_rules, SortRule};
use parser::Vocabulary;

/// Ordered raw-token → canonical-name table for one dimension.
///
/// Raw tokens are what filenames encode; canonical names are what figures
/// display. Several raw tokens may share a canonical name (e.g. the 8- and
/// 24-thread runs of one workload), and table order defines the display
/// order of the canonical names.
pub struct CanonicalMap {
    pairs: Vec<(&'static str, &'static str)>,
}

impl CanonicalMap {
    pub fn new(pairs: &[(&'static str, &'static str)]) -> Self {
        Self {
            pairs: pairs.to_vec(),
        }
    }

    /// Raw tokens, as a recognizer vocabulary.
    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary::exact(self.pairs.iter().map(|(raw, _)| *raw))
    }

    pub fn canonical(&self, raw: &str) -> Option<&'static str> {
        self.pairs
            .iter()
            .find(|(r, _)| *r == raw)
            .map(|(_, canonical)| *canonical)
    }

    /// Canonical names in table order, deduplicated.
    pub fn canonical_order(&self) -> Vec<&'static str> {
        let mut order = Vec::new();
        for (_, canonical) in &self.pairs {
            if !order.contains(canonical) {
                order.push(*canonical);
            }
        }
        order
    }

    /// Sort rule ranking labels by canonical table order.
    pub fn sort_rule(&self) -> SortRule {
        sort_rules::rank_by(self.canonical_order())
    }
}

pub fn settings() -> CanonicalMap {
    CanonicalMap::new(&[
        ("baseType3", "Base-CSSD"),
        ("flatflash", "SkyByte-P"),
        ("assd-C-rr", "SkyByte-C"),
        ("assd-W", "SkyByte-W"),
        ("assd-CA", "AstriFlash-CXL"),
        ("assd-CT", "SkyByte-CT"),
        ("assd-CP", "SkyByte-CP"),
        ("assd-WCT", "SkyByte-WCT"),
        ("assd-WP", "SkyByte-WP"),
        ("assd-Full-rr", "SkyByte-Full"),
        ("assd-WP-DRAM", "DRAM-Only"),
    ])
}

/// Setting subset shown in the end-to-end performance figure.
pub fn e2e_settings() -> CanonicalMap {
    CanonicalMap::new(&[
        ("baseType3", "Base-CSSD"),
        ("flatflash", "SkyByte-P"),
        ("assd-C-rr", "SkyByte-C"),
        ("assd-W", "SkyByte-W"),
        ("assd-CP", "SkyByte-CP"),
        ("assd-WP", "SkyByte-WP"),
        ("assd-Full-rr", "SkyByte-Full"),
        ("assd-WP-DRAM", "DRAM-Only"),
    ])
}

pub fn workloads() -> CanonicalMap {
    CanonicalMap::new(&[
        ("bc-8", "bc"),
        ("bc-24", "bc"),
        ("bfs-dense-8", "bfs-dense"),
        ("bfs-dense-24", "bfs-dense"),
        ("dlrm-8", "dlrm"),
        ("dlrm-24", "dlrm"),
        ("radix-8", "radix"),
        ("radix-24", "radix"),
        ("srad-8", "srad"),
        ("srad-48", "srad"),
        ("tpcc-8", "tpcc"),
        ("tpcc-24", "tpcc"),
        ("ycsb-8", "ycsb"),
        ("ycsb-24", "ycsb"),
    ])
}

/// 8-thread workload runs, used as the baseline pass of the thread-count
/// scaling figure.
pub fn nthreads_base_workloads() -> CanonicalMap {
    CanonicalMap::new(&[
        ("bc-8", "bc"),
        ("bfs-dense-8", "bfs-dense"),
        ("dlrm-8", "dlrm"),
        ("radix-8", "radix"),
        ("srad-8", "srad"),
        ("tpcc-8", "tpcc"),
        ("ycsb-8", "ycsb-a"),
        ("ycsbB-8", "ycsb-b"),
    ])
}

/// Bare workload names, used when the thread count lives in the setting
/// dimension instead of the workload token.
pub fn nthreads_scaling_workloads() -> CanonicalMap {
    CanonicalMap::new(&[
        ("bc", "bc"),
        ("bfs-dense", "bfs-dense"),
        ("dlrm", "dlrm"),
        ("radix", "radix"),
        ("srad", "srad"),
        ("tpcc", "tpcc"),
        ("ycsb", "ycsb-a"),
        ("ycsbB", "ycsb-b"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_lookup() {
        let settings = settings();
        assert_eq!(settings.canonical("assd-WP"), Some("SkyByte-WP"));
        assert_eq!(settings.canonical("unknown"), None);
    }

    #[test]
    fn test_canonical_order_deduplicates() {
        let workloads = workloads();
        let order = workloads.canonical_order();
        assert_eq!(order.iter().filter(|w| **w == "bc").count(), 1);
        assert_eq!(order[0], "bc");
    }

    #[test]
    fn test_sort_rule_uses_table_order() {
        let rule = settings().sort_rule();
        let sorted = rule(vec!["SkyByte-P".to_string(), "Base-CSSD".to_string()]);
        assert_eq!(sorted, vec!["Base-CSSD", "SkyByte-P"]);
    }
}

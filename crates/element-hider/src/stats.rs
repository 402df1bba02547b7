use serde::{Deserialize, Serialize};

/// Per-rule hide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStats {
    pub selector: String,
    pub rule_id: String,
    pub note: String,
    pub element_count: usize,
    /// At least one element is hidden by the rule.
    pub is_effective: bool,
}

/// Read-only snapshot of the hider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiderStats {
    pub total_rules: usize,
    pub total_elements: usize,
    pub rule_stats: Vec<RuleStats>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = HiderStats {
            total_rules: 1,
            total_elements: 2,
            rule_stats: vec![RuleStats {
                selector: ".ad".into(),
                rule_id: "r1".into(),
                note: String::new(),
                element_count: 2,
                is_effective: true,
            }],
            is_active: true,
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["totalElements"], 2);
        assert_eq!(value["ruleStats"][0]["isEffective"], true);
        assert_eq!(value["isActive"], true);
    }
}

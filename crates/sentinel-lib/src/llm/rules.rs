//! Routing rule conditions
//!
//! Conditions are parsed once at registration into an explicit enum;
//! anything unrecognized parses to a variant that never matches, so
//! misconfigured rules fail closed instead of routing surprisingly.

use serde::Serialize;

use super::LlmRequest;

/// Predicate over a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RuleCondition {
    /// `urgent == true`
    Urgent,
    /// `task_type == <value>`
    TaskTypeIs(String),
    /// Any condition string the parser does not understand; never matches
    Unsupported(String),
}

impl RuleCondition {
    /// Parse the textual condition form used in rule configuration
    pub fn parse(condition: &str) -> Self {
        let condition = condition.trim();
        if condition == "urgent == true" {
            return RuleCondition::Urgent;
        }
        if let Some(task_type) = condition.strip_prefix("task_type == ") {
            return RuleCondition::TaskTypeIs(task_type.trim().to_string());
        }
        RuleCondition::Unsupported(condition.to_string())
    }

    /// Evaluate the condition against a request
    pub fn matches(&self, request: &LlmRequest) -> bool {
        match self {
            RuleCondition::Urgent => request.urgent,
            RuleCondition::TaskTypeIs(task_type) => request.task_type == *task_type,
            RuleCondition::Unsupported(_) => false,
        }
    }
}

/// Priority-ordered mapping from a condition to a provider name
#[derive(Debug, Clone, Serialize)]
pub struct RoutingRule {
    pub priority: u32,
    pub condition: RuleCondition,
    pub provider: String,
    pub description: String,
}

impl RoutingRule {
    pub fn new(
        priority: u32,
        condition: &str,
        provider: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            priority,
            condition: RuleCondition::parse(condition),
            provider: provider.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task_type: &str, urgent: bool) -> LlmRequest {
        LlmRequest {
            task_type: task_type.to_string(),
            urgent,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_urgent_condition() {
        let condition = RuleCondition::parse("urgent == true");
        assert_eq!(condition, RuleCondition::Urgent);
        assert!(condition.matches(&request("anything", true)));
        assert!(!condition.matches(&request("anything", false)));
    }

    #[test]
    fn test_parse_task_type_condition() {
        let condition = RuleCondition::parse("task_type == prediction");
        assert_eq!(
            condition,
            RuleCondition::TaskTypeIs("prediction".to_string())
        );
        assert!(condition.matches(&request("prediction", false)));
        assert!(!condition.matches(&request("script_generation", false)));
    }

    #[test]
    fn test_unrecognized_condition_never_matches() {
        let condition = RuleCondition::parse("max_tokens > 300");
        assert!(matches!(condition, RuleCondition::Unsupported(_)));
        assert!(!condition.matches(&request("prediction", true)));
    }

    #[test]
    fn test_rule_constructor_parses_condition() {
        let rule = RoutingRule::new(1, "task_type == prediction", "fast_local", "predictions");
        assert_eq!(rule.priority, 1);
        assert!(rule.condition.matches(&request("prediction", false)));
    }
}

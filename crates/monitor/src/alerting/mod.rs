//! Alert rules, their evaluation against the metric store, and the
//! lifecycle of the alerts they raise.

mod alert;
mod evaluator;
mod lifecycle;
mod rule;

pub use alert::{Alert, AlertStatus};
pub use evaluator::{evaluate_rule, EvaluationResult, RuleEngine};
pub use lifecycle::{AlertEvent, AlertEventKind, AlertLifecycleManager};
pub use rule::{default_rules, AlertRule, AlertRuleRequest, Condition, Severity, MAX_DURATION_SECS};

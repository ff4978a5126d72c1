//! Q4: can this be fixed quickly? Higher means easier.

use vpr_core::model::{Domain, FindingRecord};

use crate::classifier;

const NO_CLEAR_PATCH_FRICTION: f64 = 30.0;
const TICKET_DISCOUNT: f64 = 20.0;
const HARD_DOMAIN_FRICTION: f64 = 20.0;

/// Fixability in [0,100] as the inverse of accumulated fix friction:
/// a named upgrade path removes the base friction, effort adds to it,
/// an existing owning ticket discounts it, and database/infrastructure
/// components are harder to change.
pub fn calculate_q4_fixability(record: &FindingRecord) -> f64 {
    let mitigation = record.mitigation.as_deref().unwrap_or("").to_ascii_lowercase();
    let mut friction = if mitigation.contains("upgrade to version") || mitigation.contains("update")
    {
        0.0
    } else {
        NO_CLEAR_PATCH_FRICTION
    };

    if let Some(effort) = record.effort_for_fixing.as_deref() {
        if let Ok(value) = effort.trim().parse::<f64>() {
            friction += value * 10.0;
        } else {
            let upper = effort.to_ascii_uppercase();
            if upper.contains("HIGH") || upper.contains("COMPLEX") {
                friction += 40.0;
            } else if upper.contains("MEDIUM") || upper.contains("MODERATE") {
                friction += 20.0;
            } else if upper.contains("LOW") || upper.contains("SIMPLE") {
                friction += 10.0;
            }
        }
    }

    if record.has_ticket {
        friction -= TICKET_DISCOUNT;
    }

    let domain = classifier::classify_domain(record);
    if matches!(domain, Domain::Database | Domain::Infrastructure) {
        friction += HARD_DOMAIN_FRICTION;
    }

    (100.0 - friction).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FindingRecord {
        FindingRecord::from_json(value, 0)
    }

    #[test]
    fn clear_upgrade_path_is_easy() {
        let q4 = calculate_q4_fixability(&record(
            json!({"mitigation": "Upgrade to version 2.17.1"}),
        ));
        assert_eq!(q4, 100.0);
    }

    #[test]
    fn no_patch_costs_thirty() {
        assert_eq!(calculate_q4_fixability(&record(json!({}))), 70.0);
    }

    #[test]
    fn effort_categories_add_friction() {
        let high = record(json!({"effort_for_fixing": "HIGH"}));
        let low = record(json!({"effort_for_fixing": "Low"}));
        assert_eq!(calculate_q4_fixability(&high), 30.0);
        assert_eq!(calculate_q4_fixability(&low), 60.0);
    }

    #[test]
    fn numeric_effort_scales() {
        let q4 = calculate_q4_fixability(&record(
            json!({"mitigation": "update dependency", "effort_for_fixing": "3"}),
        ));
        assert_eq!(q4, 70.0);
    }

    #[test]
    fn ticket_makes_it_easier() {
        let q4 = calculate_q4_fixability(&record(json!({"has_jira_issue": true})));
        assert_eq!(q4, 90.0);
    }

    #[test]
    fn infrastructure_is_harder() {
        let q4 = calculate_q4_fixability(&record(
            json!({"component_name": "terraform-provider-aws"}),
        ));
        assert_eq!(q4, 50.0);
    }

    #[test]
    fn friction_clamps_at_bounds() {
        let worst = record(json!({
            "component_name": "postgres",
            "effort_for_fixing": "9",
        }));
        assert_eq!(calculate_q4_fixability(&worst), 0.0);
    }
}

//! Request integrity checks.
//!
//! Validates the inputs of a run before any scheduling happens. Input
//! errors surface as a violation list and short-circuit the engine with
//! an empty schedule; they are never panics.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::{Callout, CalloutTarget, Client, Therapist, Violation, ViolationRule};

/// Validates a run request.
///
/// Checks:
/// 1. A date is present.
/// 2. Every callout targets a client or therapist present in the inputs.
///
/// Empty client or therapist sets are not errors here; the engine treats
/// them as a trivially satisfied day.
pub fn validate_request(
    date: Option<NaiveDate>,
    clients: &[Client],
    therapists: &[Therapist],
    callouts: &[Callout],
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if date.is_none() {
        violations.push(Violation::new(
            ViolationRule::MissingDate,
            "request",
            "no date supplied for the roster",
        ));
        return violations;
    }

    let client_ids: HashSet<&str> = clients.iter().map(|c| c.id.as_str()).collect();
    let therapist_ids: HashSet<&str> = therapists.iter().map(|t| t.id.as_str()).collect();

    for callout in callouts {
        let known = match callout.target {
            CalloutTarget::Client => client_ids.contains(callout.entity_id.as_str()),
            CalloutTarget::Therapist => therapist_ids.contains(callout.entity_id.as_str()),
        };
        if !known {
            violations.push(Violation::new(
                ViolationRule::UnknownEntity,
                &callout.entity_id,
                format!(
                    "callout {} references unknown {} '{}'",
                    callout.id,
                    match callout.target {
                        CalloutTarget::Client => "client",
                        CalloutTarget::Therapist => "therapist",
                    },
                    callout.entity_id
                ),
            ));
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::time::TimeRange;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    #[test]
    fn test_missing_date() {
        let violations = validate_request(None, &[], &[], &[]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, ViolationRule::MissingDate);
    }

    #[test]
    fn test_unknown_callout_entity() {
        let clients = vec![Client::new("c1")];
        let therapists = vec![Therapist::new("t1", Role::Rbt)];
        let callouts = vec![
            Callout::new("co1", CalloutTarget::Therapist, "t1", monday(), TimeRange::new(480, 540)),
            Callout::new("co2", CalloutTarget::Therapist, "ghost", monday(), TimeRange::new(480, 540)),
            Callout::new("co3", CalloutTarget::Client, "t1", monday(), TimeRange::new(480, 540)),
        ];
        let violations = validate_request(Some(monday()), &clients, &therapists, &callouts);
        // co2: unknown therapist; co3: "t1" is not a client id
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.rule == ViolationRule::UnknownEntity));
    }

    #[test]
    fn test_clean_request() {
        let clients = vec![Client::new("c1")];
        let therapists = vec![Therapist::new("t1", Role::Rbt)];
        assert!(validate_request(Some(monday()), &clients, &therapists, &[]).is_empty());
    }
}

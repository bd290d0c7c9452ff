//! Property-based tests for precedence rules.

use chrono::{DateTime, Duration, TimeZone, Utc};
use keygate_core::{PermissionId, RoleId, UserId};
use proptest::prelude::*;

use crate::edge::{EdgeAudit, EdgeOwner, Effect, PermissionEdge};
use crate::resolution::{DecisionSource, resolve_verdict};

fn base_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

fn effect_strategy() -> impl Strategy<Value = Effect> {
    prop_oneof![Just(Effect::Grant), Just(Effect::Deny)]
}

/// Optional expiry expressed as minutes from the base instant.
fn expiry_strategy() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(-120_i64..120)
}

fn edge_at(owner: EdgeOwner, effect: Effect, expiry_minutes: Option<i64>) -> PermissionEdge {
    PermissionEdge {
        owner,
        permission_id: PermissionId::new(1),
        effect,
        audit: EdgeAudit {
            assigned_at: base_instant() - Duration::days(1),
            assigned_by: "proptest".to_owned(),
            expires_at: expiry_minutes.map(|minutes| base_instant() + Duration::minutes(minutes)),
            reason: None,
        },
    }
}

fn role_edges_strategy() -> impl Strategy<Value = Vec<PermissionEdge>> {
    prop::collection::vec((effect_strategy(), expiry_strategy()), 0..8).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(index, (effect, expiry))| {
                edge_at(
                    EdgeOwner::Role(RoleId::new(i64::try_from(index).unwrap_or(0))),
                    effect,
                    expiry,
                )
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn active_override_is_returned_verbatim(
        role_edges in role_edges_strategy(),
        effect in effect_strategy(),
        expiry in prop::option::of(1_i64..120),
    ) {
        let user_edge = edge_at(EdgeOwner::User(UserId::new(42)), effect, expiry);

        let verdict = resolve_verdict(Some(&user_edge), role_edges.iter(), base_instant());

        prop_assert_eq!(verdict.granted, effect.is_grant());
        prop_assert_eq!(verdict.source, DecisionSource::User);
    }

    #[test]
    fn any_active_role_deny_denies_without_override(role_edges in role_edges_strategy()) {
        let now = base_instant();
        let has_active_deny = role_edges
            .iter()
            .any(|edge| edge.effect == Effect::Deny && edge.is_active_at(now));
        let has_active_grant = role_edges
            .iter()
            .any(|edge| edge.effect == Effect::Grant && edge.is_active_at(now));

        let verdict = resolve_verdict(None, role_edges.iter(), now);

        prop_assert_eq!(verdict.granted, has_active_grant && !has_active_deny);
        if has_active_deny || has_active_grant {
            prop_assert_eq!(verdict.source, DecisionSource::Role);
        } else {
            prop_assert_eq!(verdict.source, DecisionSource::None);
        }
    }

    #[test]
    fn expired_override_matches_role_level(
        role_edges in role_edges_strategy(),
        effect in effect_strategy(),
        expired_minutes_ago in 0_i64..120,
    ) {
        let now = base_instant();
        let user_edge = edge_at(
            EdgeOwner::User(UserId::new(42)),
            effect,
            Some(-expired_minutes_ago),
        );

        let with_override = resolve_verdict(Some(&user_edge), role_edges.iter(), now);
        let without_override = resolve_verdict(None, role_edges.iter(), now);

        prop_assert_eq!(with_override, without_override);
    }
}

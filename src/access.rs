//! Feature-access gate. Not part of the calculation pipeline; the
//! hosting application consults it before any engine call is
//! reachable. The verdict is recomputed from signup timestamp and a
//! subscription lookup on every check; no state transition is stored.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const TRIAL_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    SuperuserBypass,
    TrialActive,
    SubscriptionActive,
    Denied,
}

impl AccessState {
    pub fn allows(&self) -> bool {
        !matches!(self, Self::Denied)
    }
}

impl Display for AccessState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::SuperuserBypass => "superuser bypass",
            Self::TrialActive => "trial active",
            Self::SubscriptionActive => "subscription active",
            Self::Denied => "denied",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Superuser,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub account_id: String,
    pub role: AccountRole,
    pub signed_up_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    async fn has_active_subscription(&self, account_id: &str) -> Result<bool>;
}

/// In-memory lookup over a fixed set of subscribed account ids.
/// The hosting product owns real billing; this is the seam the CLI,
/// server and tests plug in.
#[derive(Debug, Clone, Default)]
pub struct StaticSubscriptions {
    active: BTreeSet<String>,
}

impl StaticSubscriptions {
    pub fn new(active: impl IntoIterator<Item = String>) -> Self {
        Self {
            active: active.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SubscriptionLookup for StaticSubscriptions {
    async fn has_active_subscription(&self, account_id: &str) -> Result<bool> {
        Ok(self.active.contains(account_id))
    }
}

/// Classify in priority order: superuser, then trial window, then paid
/// subscription. A failed subscription lookup denies access rather
/// than granting it.
pub async fn evaluate_access(
    profile: &AccountProfile,
    lookup: &dyn SubscriptionLookup,
    now: DateTime<Utc>,
    trial_days: i64,
) -> AccessState {
    if profile.role == AccountRole::Superuser {
        return AccessState::SuperuserBypass;
    }

    if now < profile.signed_up_at + Duration::days(trial_days) {
        return AccessState::TrialActive;
    }

    match lookup.has_active_subscription(&profile.account_id).await {
        Ok(true) => AccessState::SubscriptionActive,
        Ok(false) => AccessState::Denied,
        Err(err) => {
            warn!(
                "subscription lookup failed for {}, denying access: {err}",
                profile.account_id
            );
            AccessState::Denied
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    fn profile(role: AccountRole, signed_up_days_ago: i64, now: DateTime<Utc>) -> AccountProfile {
        AccountProfile {
            account_id: "acct-1".to_string(),
            role,
            signed_up_at: now - Duration::days(signed_up_days_ago),
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl SubscriptionLookup for FailingLookup {
        async fn has_active_subscription(&self, _account_id: &str) -> Result<bool> {
            Err(anyhow!("billing storage unreachable"))
        }
    }

    #[tokio::test]
    async fn trial_allows_inside_thirty_days() {
        let now = Utc::now();
        let lookup = StaticSubscriptions::default();
        let state = evaluate_access(
            &profile(AccountRole::Member, 29, now),
            &lookup,
            now,
            TRIAL_PERIOD_DAYS,
        )
        .await;
        assert_eq!(state, AccessState::TrialActive);
        assert!(state.allows());
    }

    #[tokio::test]
    async fn expired_trial_without_subscription_denies() {
        let now = Utc::now();
        let lookup = StaticSubscriptions::default();
        let state = evaluate_access(
            &profile(AccountRole::Member, 31, now),
            &lookup,
            now,
            TRIAL_PERIOD_DAYS,
        )
        .await;
        assert_eq!(state, AccessState::Denied);
        assert!(!state.allows());
    }

    #[tokio::test]
    async fn active_subscription_allows_after_trial() {
        let now = Utc::now();
        let lookup = StaticSubscriptions::new(["acct-1".to_string()]);
        let state = evaluate_access(
            &profile(AccountRole::Member, 31, now),
            &lookup,
            now,
            TRIAL_PERIOD_DAYS,
        )
        .await;
        assert_eq!(state, AccessState::SubscriptionActive);
    }

    #[tokio::test]
    async fn superuser_bypasses_everything() {
        let now = Utc::now();
        let state = evaluate_access(
            &profile(AccountRole::Superuser, 500, now),
            &FailingLookup,
            now,
            TRIAL_PERIOD_DAYS,
        )
        .await;
        assert_eq!(state, AccessState::SuperuserBypass);
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let now = Utc::now();
        let state = evaluate_access(
            &profile(AccountRole::Member, 31, now),
            &FailingLookup,
            now,
            TRIAL_PERIOD_DAYS,
        )
        .await;
        assert_eq!(state, AccessState::Denied);
    }

    #[tokio::test]
    async fn trial_boundary_is_exclusive_at_exactly_thirty_days() {
        let now = Utc::now();
        let lookup = StaticSubscriptions::default();
        let exactly = AccountProfile {
            account_id: "acct-1".to_string(),
            role: AccountRole::Member,
            signed_up_at: now - Duration::days(TRIAL_PERIOD_DAYS),
        };
        let state = evaluate_access(&exactly, &lookup, now, TRIAL_PERIOD_DAYS).await;
        assert_eq!(state, AccessState::Denied);
    }
}

//! Resource-level authorization policy.
//!
//! - No IO
//! - No panics
//! - First matching rule wins: admin, then user, then anonymous.

use thiserror::Error;

use storefront_core::{AccountId, StoreId};

use crate::Claim;

/// What the caller wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ReadMany,
    ReadOne,
    Create,
    Update,
    Delete,
}

/// What the caller wants to do it to.
///
/// `None` means the collection itself, or an id that could not be parsed;
/// it never matches a specific account or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Account(Option<AccountId>),
    Store(Option<StoreId>),
}

impl core::fmt::Display for Target {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Target::Account(Some(id)) => write!(f, "account {id}"),
            Target::Account(None) => f.write_str("accounts"),
            Target::Store(Some(id)) => write!(f, "store {id}"),
            Target::Store(None) => f.write_str("stores"),
        }
    }
}

/// The caller as seen by the policy: a verified claim plus, for users, the
/// ownership set loaded from storage.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    claim: Claim,
    owned_stores: &'a [StoreId],
}

impl<'a> Subject<'a> {
    pub fn new(claim: Claim) -> Self {
        Self {
            claim,
            owned_stores: &[],
        }
    }

    pub fn with_owned_stores(claim: Claim, owned_stores: &'a [StoreId]) -> Self {
        Self { claim, owned_stores }
    }

    pub fn claim(&self) -> Claim {
        self.claim
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("access denied: {action:?} on {target}")]
    Denied { target: Target, action: Action },
}

/// Decide whether `subject` may perform `action` on `target`.
///
/// Registration and login are public operations and never reach this policy.
pub fn authorize(subject: &Subject<'_>, target: Target, action: Action) -> Result<(), AuthzError> {
    let allowed = match subject.claim {
        Claim::Admin(_) => true,
        Claim::User(me) => match (target, action) {
            (Target::Account(id), Action::ReadOne | Action::Update | Action::Delete) => id == Some(me),
            (Target::Account(_), Action::ReadMany | Action::Create) => false,
            (Target::Store(_), Action::Create | Action::ReadOne | Action::ReadMany) => true,
            (Target::Store(Some(id)), Action::Delete) => subject.owned_stores.contains(&id),
            (Target::Store(_), _) => false,
        },
        Claim::Anonymous => matches!(
            (target, action),
            (Target::Store(_), Action::ReadOne | Action::ReadMany)
        ),
    };

    if allowed {
        Ok(())
    } else {
        Err(AuthzError::Denied { target, action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    const ALL_ACTIONS: [Action; 5] = [
        Action::ReadMany,
        Action::ReadOne,
        Action::Create,
        Action::Update,
        Action::Delete,
    ];

    fn allowed(subject: &Subject<'_>, target: Target, action: Action) -> bool {
        authorize(subject, target, action).is_ok()
    }

    #[test]
    fn user_may_manage_only_own_account() {
        let me = AccountId::new();
        let other = AccountId::new();
        let subject = Subject::new(Claim::User(me));

        for action in [Action::ReadOne, Action::Update, Action::Delete] {
            assert!(allowed(&subject, Target::Account(Some(me)), action));
            assert!(!allowed(&subject, Target::Account(Some(other)), action));
            assert!(!allowed(&subject, Target::Account(None), action));
        }
        assert!(!allowed(&subject, Target::Account(None), Action::ReadMany));
        assert!(!allowed(&subject, Target::Account(None), Action::Create));
    }

    #[test]
    fn user_may_delete_only_owned_stores() {
        let owned = StoreId::new();
        let foreign = StoreId::new();
        let set = [owned];
        let subject = Subject::with_owned_stores(Claim::User(AccountId::new()), &set);

        assert!(allowed(&subject, Target::Store(Some(owned)), Action::Delete));
        assert!(!allowed(&subject, Target::Store(Some(foreign)), Action::Delete));
        assert!(!allowed(&subject, Target::Store(None), Action::Delete));
        assert!(allowed(&subject, Target::Store(None), Action::Create));
    }

    #[test]
    fn anonymous_may_only_read_stores() {
        let subject = Subject::new(Claim::Anonymous);
        let store = Target::Store(Some(StoreId::new()));

        assert!(allowed(&subject, store, Action::ReadOne));
        assert!(allowed(&subject, Target::Store(None), Action::ReadMany));
        assert!(!allowed(&subject, Target::Store(None), Action::Create));
        assert!(!allowed(&subject, store, Action::Delete));
        for action in ALL_ACTIONS {
            assert!(!allowed(&subject, Target::Account(Some(AccountId::new())), action));
        }
    }

    #[test]
    fn denial_reports_target_and_action() {
        let err = authorize(&Subject::new(Claim::Anonymous), Target::Account(None), Action::ReadMany)
            .unwrap_err();
        assert_eq!(err.to_string(), "access denied: ReadMany on accounts");
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop::sample::select(ALL_ACTIONS.to_vec())
    }

    fn arb_target() -> impl Strategy<Value = Target> {
        prop_oneof![
            proptest::option::of(any::<u128>())
                .prop_map(|v| Target::Account(v.map(|n| AccountId::from_uuid(Uuid::from_u128(n))))),
            proptest::option::of(any::<u128>())
                .prop_map(|v| Target::Store(v.map(|n| StoreId::from_uuid(Uuid::from_u128(n))))),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: an admin claim is never denied.
        #[test]
        fn admin_is_never_denied(id in any::<u128>(), target in arb_target(), action in arb_action()) {
            let subject = Subject::new(Claim::Admin(AccountId::from_uuid(Uuid::from_u128(id))));
            prop_assert!(allowed(&subject, target, action));
        }

        /// Property: a user can never act on an account other than their own.
        #[test]
        fn user_never_touches_foreign_accounts(me in any::<u128>(), other in any::<u128>(), action in arb_action()) {
            prop_assume!(me != other);
            let subject = Subject::new(Claim::User(AccountId::from_uuid(Uuid::from_u128(me))));
            let target = Target::Account(Some(AccountId::from_uuid(Uuid::from_u128(other))));
            prop_assert!(!allowed(&subject, target, action));
        }

        /// Property: anything an anonymous caller may do, a user may do too.
        #[test]
        fn users_are_never_weaker_than_anonymous(me in any::<u128>(), target in arb_target(), action in arb_action()) {
            let anon = Subject::new(Claim::Anonymous);
            let user = Subject::new(Claim::User(AccountId::from_uuid(Uuid::from_u128(me))));
            if allowed(&anon, target, action) {
                prop_assert!(allowed(&user, target, action));
            }
        }
    }
}

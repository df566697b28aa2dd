//! Access decisions for every gated operation
//!
//! Handlers describe what the caller is about to do and get a verdict back.
//! Role and authentication gates only bite when `security.enabled` is set;
//! ownership rules hold in both modes.

use crate::{
    error::{AppError, AppResult},
    models::{Identity, Role},
};

/// Operation descriptor passed to [`AccessPolicy::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    ViewOwnProfile,
    MutateUser { target_id: &'a str },
    AssignRole,
    ListUsers,
    ViewUser,
    DeleteUser,
    MutateCatalog,
    MutateRental,
    ViewRental,
    DeleteRental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> AppResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(Denial::Unauthenticated) => {
                Err(AppError::Authentication("Authentication required".to_string()))
            }
            Decision::Deny(Denial::Forbidden(reason)) => {
                Err(AppError::Authorization(reason.to_string()))
            }
        }
    }
}

/// Which rentals a listing may show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RentalScope {
    /// Every rental, optionally narrowed to one user
    All { user_id: Option<String> },
    /// Only this user's rentals
    User(String),
    /// Anonymous non-admin caller; an empty listing
    Nobody,
}

#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    enforce: bool,
}

impl AccessPolicy {
    pub fn new(enforce: bool) -> Self {
        Self { enforce }
    }

    pub fn is_enforced(&self) -> bool {
        self.enforce
    }

    pub fn decide(&self, caller: Option<&Identity>, operation: Operation<'_>) -> Decision {
        match operation {
            Operation::ViewOwnProfile => match caller {
                Some(_) => Decision::Allow,
                None => Decision::Deny(Denial::Unauthenticated),
            },
            Operation::MutateUser { target_id } => match caller {
                Some(c) if c.is_admin() || c.user_id == target_id => Decision::Allow,
                Some(_) => Decision::Deny(Denial::Forbidden("Forbidden")),
                None if self.enforce => Decision::Deny(Denial::Unauthenticated),
                None => Decision::Deny(Denial::Forbidden("Forbidden")),
            },
            _ if !self.enforce => Decision::Allow,
            Operation::MutateCatalog | Operation::DeleteUser | Operation::AssignRole => {
                self.require_role(caller, Role::Admin, "Administrator privileges required")
            }
            Operation::MutateRental => {
                self.require_role(caller, Role::User, "Only library members can manage rentals")
            }
            Operation::ListUsers | Operation::ViewUser | Operation::ViewRental | Operation::DeleteRental => {
                match caller {
                    Some(_) => Decision::Allow,
                    None => Decision::Deny(Denial::Unauthenticated),
                }
            }
        }
    }

    fn require_role(&self, caller: Option<&Identity>, role: Role, reason: &'static str) -> Decision {
        match caller {
            None => Decision::Deny(Denial::Unauthenticated),
            Some(c) if c.has_role(role) => Decision::Allow,
            Some(_) => Decision::Deny(Denial::Forbidden(reason)),
        }
    }

    /// Admins see everything (or one requested user); everybody else only
    /// ever sees their own rentals, whatever they asked for
    pub fn scope_rentals(&self, caller: Option<&Identity>, requested_user: Option<&str>) -> RentalScope {
        match caller {
            Some(c) if c.is_admin() => RentalScope::All {
                user_id: requested_user.map(str::to_string),
            },
            Some(c) => RentalScope::User(c.user_id.clone()),
            None => RentalScope::Nobody,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Identity {
        Identity::new("admin-1", "Admin")
    }

    fn member() -> Identity {
        Identity::new("u1", "user")
    }

    #[test]
    fn catalog_mutation_needs_admin_when_enforced() {
        let policy = AccessPolicy::new(true);
        assert!(policy.decide(Some(&admin()), Operation::MutateCatalog).is_allowed());
        assert_eq!(
            policy.decide(Some(&member()), Operation::MutateCatalog),
            Decision::Deny(Denial::Forbidden("Administrator privileges required"))
        );
        assert_eq!(
            policy.decide(None, Operation::MutateCatalog),
            Decision::Deny(Denial::Unauthenticated)
        );
    }

    #[test]
    fn rental_gate_is_a_role_check() {
        let policy = AccessPolicy::new(true);
        assert!(policy.decide(Some(&member()), Operation::MutateRental).is_allowed());
        assert!(policy
            .decide(Some(&Identity::new("u2", "")), Operation::MutateRental)
            .is_allowed());
        assert!(!policy.decide(Some(&admin()), Operation::MutateRental).is_allowed());
    }

    #[test]
    fn permissive_mode_relaxes_role_gates_only() {
        let policy = AccessPolicy::new(false);
        assert!(policy.decide(None, Operation::MutateCatalog).is_allowed());
        assert!(policy.decide(None, Operation::DeleteUser).is_allowed());
        assert!(policy.decide(None, Operation::ViewRental).is_allowed());

        assert_eq!(
            policy.decide(None, Operation::ViewOwnProfile),
            Decision::Deny(Denial::Unauthenticated)
        );
        assert_eq!(
            policy.decide(Some(&member()), Operation::MutateUser { target_id: "u2" }),
            Decision::Deny(Denial::Forbidden("Forbidden"))
        );
        assert!(!policy
            .decide(None, Operation::MutateUser { target_id: "u1" })
            .is_allowed());
    }

    #[test]
    fn users_may_mutate_themselves_and_admins_anyone() {
        let policy = AccessPolicy::new(true);
        assert!(policy
            .decide(Some(&member()), Operation::MutateUser { target_id: "u1" })
            .is_allowed());
        assert!(policy
            .decide(Some(&admin()), Operation::MutateUser { target_id: "u1" })
            .is_allowed());
        assert_eq!(
            policy.decide(None, Operation::MutateUser { target_id: "u1" }),
            Decision::Deny(Denial::Unauthenticated)
        );
    }

    #[test]
    fn rental_listing_is_scoped_for_non_admins() {
        let policy = AccessPolicy::new(true);
        assert_eq!(
            policy.scope_rentals(Some(&member()), Some("someone-else")),
            RentalScope::User("u1".to_string())
        );
        assert_eq!(
            policy.scope_rentals(Some(&admin()), Some("u9")),
            RentalScope::All {
                user_id: Some("u9".to_string())
            }
        );
        assert_eq!(policy.scope_rentals(None, Some("u1")), RentalScope::Nobody);
    }

    #[test]
    fn denial_maps_to_error_kinds() {
        assert!(matches!(
            Decision::Deny(Denial::Unauthenticated).into_result(),
            Err(AppError::Authentication(_))
        ));
        assert!(matches!(
            Decision::Deny(Denial::Forbidden("no")).into_result(),
            Err(AppError::Authorization(_))
        ));
        assert!(Decision::Allow.into_result().is_ok());
    }
}

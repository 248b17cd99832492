use super::domain::UserRole;

pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];
pub const LISTING_AUTHORS: &[UserRole] = &[UserRole::Landlord, UserRole::Agent, UserRole::Admin];
pub const REWARD_VIEWERS: &[UserRole] = &[UserRole::Admin, UserRole::Agent];

/// Raised when an actor's role is outside the set an operation requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("role '{}' is not permitted here (requires one of: {})", .role, labels(.required))]
pub struct AccessDenied {
    pub role: UserRole,
    pub required: Vec<UserRole>,
}

fn labels(roles: &[UserRole]) -> String {
    roles
        .iter()
        .map(|role| role.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Capability check run by the service before any core operation.
pub fn authorize(role: UserRole, required: &[UserRole]) -> Result<(), AccessDenied> {
    if required.contains(&role) {
        Ok(())
    } else {
        Err(AccessDenied {
            role,
            required: required.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_listed_roles() {
        assert!(authorize(UserRole::Agent, LISTING_AUTHORS).is_ok());
        assert!(authorize(UserRole::Admin, ADMIN_ONLY).is_ok());
    }

    #[test]
    fn denial_names_the_required_roles() {
        let denied = authorize(UserRole::Seeker, REWARD_VIEWERS).expect_err("seekers denied");
        assert_eq!(denied.role, UserRole::Seeker);
        assert_eq!(
            denied.to_string(),
            "role 'seeker' is not permitted here (requires one of: admin, agent)"
        );
    }
}

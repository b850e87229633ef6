//! Role-based access guard

use std::collections::HashSet;
use std::fmt;

use cipherlane_core::Principal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Roles recognised by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Operator => write!(f, "operator"),
        }
    }
}

/// Admin identity plus the set of authorized operators
///
/// Grants are monotonic: there is no revocation.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    admin: Principal,
    operators: HashSet<Principal>,
}

impl AccessGuard {
    /// The admin is fixed here and holds the operator role from the start
    pub fn new(admin: Principal) -> Self {
        let mut operators = HashSet::new();
        operators.insert(admin);
        Self { admin, operators }
    }

    pub fn admin(&self) -> Principal {
        self.admin
    }

    pub fn is_operator(&self, who: &Principal) -> bool {
        self.operators.contains(who)
    }

    pub fn require_admin(&self, caller: &Principal) -> Result<()> {
        if *caller != self.admin {
            return Err(Error::Unauthorized {
                caller: *caller,
                role: Role::Admin,
            });
        }
        Ok(())
    }

    pub fn require_operator(&self, caller: &Principal) -> Result<()> {
        if !self.is_operator(caller) {
            return Err(Error::Unauthorized {
                caller: *caller,
                role: Role::Operator,
            });
        }
        Ok(())
    }

    /// Grant the operator role; returns false if it was already held
    pub fn authorize(&mut self, caller: &Principal, operator: Principal) -> Result<bool> {
        self.require_admin(caller)?;
        Ok(self.operators.insert(operator))
    }

    /// Operators in a stable order
    pub fn operators(&self) -> Vec<Principal> {
        let mut list: Vec<_> = self.operators.iter().copied().collect();
        list.sort();
        list
    }
}

//! Role slot bookkeeping for a group finder session

use serde::{Deserialize, Serialize};

use crate::types::{Role, UserId};

/// Occupants of the three role categories.
///
/// A user id appears in at most one role, and no role exceeds its capacity.
/// The fields are private so every mutation goes through methods that keep
/// both rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSlots {
    tank: Option<UserId>,
    healer: Option<UserId>,
    dps: Vec<UserId>,
}

impl RoleSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild slots from stored columns.
    ///
    /// Rows written by older versions may break the single-role rule; the
    /// first occurrence (tank, then healer, then dps order) wins and extra
    /// dps entries are dropped.
    pub fn from_parts(tank: Option<UserId>, healer: Option<UserId>, dps: Vec<UserId>) -> Self {
        let mut slots = Self::new();
        if let Some(user) = tank {
            slots.insert(Role::Tank, user);
        }
        if let Some(user) = healer {
            slots.insert(Role::Healer, user);
        }
        for user in dps {
            slots.insert(Role::Dps, user);
        }
        slots
    }

    pub fn tank(&self) -> Option<UserId> {
        self.tank
    }

    pub fn healer(&self) -> Option<UserId> {
        self.healer
    }

    pub fn dps(&self) -> &[UserId] {
        &self.dps
    }

    /// The role `user` currently holds, if any
    pub fn role_of(&self, user: UserId) -> Option<Role> {
        if self.tank == Some(user) {
            Some(Role::Tank)
        } else if self.healer == Some(user) {
            Some(Role::Healer)
        } else if self.dps.contains(&user) {
            Some(Role::Dps)
        } else {
            None
        }
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.role_of(user).is_some()
    }

    pub fn occupants(&self, role: Role) -> Vec<UserId> {
        match role {
            Role::Tank => self.tank.into_iter().collect(),
            Role::Healer => self.healer.into_iter().collect(),
            Role::Dps => self.dps.clone(),
        }
    }

    pub fn count(&self, role: Role) -> usize {
        match role {
            Role::Tank => self.tank.is_some() as usize,
            Role::Healer => self.healer.is_some() as usize,
            Role::Dps => self.dps.len(),
        }
    }

    pub fn has_capacity(&self, role: Role) -> bool {
        self.count(role) < role.capacity()
    }

    /// Place `user` into `role`.
    ///
    /// Returns false, leaving the slots untouched, when the role is full or
    /// the user already holds any role.
    pub fn insert(&mut self, role: Role, user: UserId) -> bool {
        if self.contains(user) || !self.has_capacity(role) {
            return false;
        }
        match role {
            Role::Tank => self.tank = Some(user),
            Role::Healer => self.healer = Some(user),
            Role::Dps => self.dps.push(user),
        }
        true
    }

    /// Remove `user` from whichever role they hold
    pub fn remove(&mut self, user: UserId) -> Option<Role> {
        let role = self.role_of(user)?;
        match role {
            Role::Tank => self.tank = None,
            Role::Healer => self.healer = None,
            Role::Dps => self.dps.retain(|id| *id != user),
        }
        Some(role)
    }

    /// Number of occupied slots across all roles
    pub fn filled(&self) -> usize {
        Role::ALL.iter().map(|role| self.count(*role)).sum()
    }

    /// Tank, healer and all three dps slots are taken
    pub fn is_full(&self) -> bool {
        Role::ALL.iter().all(|role| !self.has_capacity(*role))
    }

    /// Every occupant, tank first, then healer, then dps in join order
    pub fn members(&self) -> Vec<UserId> {
        self.tank
            .into_iter()
            .chain(self.healer)
            .chain(self.dps.iter().copied())
            .collect()
    }
}

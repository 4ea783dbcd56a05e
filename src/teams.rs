//! Team membership resolution
//!
//! Maps `(event, user)` to the user's team and roster. Read-only.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::{Event, EventId, Team, TeamId, UserId};
use crate::storage::Storage;

/// Whether the event must currently be running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAccess {
    /// Submissions and anything else that acts on the event
    Active,
    /// Read-only views that work before start and after end
    Bypass,
}

#[derive(Clone)]
pub struct TeamResolver {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl TeamResolver {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub async fn load_event(&self, event_id: EventId) -> CoreResult<Event> {
        self.storage
            .get_event(event_id)
            .await?
            .ok_or(CoreError::EventNotFound(event_id))
    }

    /// Checks the event window against `access`, without touching teams
    pub fn check_access(&self, event: &Event, access: EventAccess) -> CoreResult<()> {
        if access == EventAccess::Bypass {
            return Ok(());
        }
        let now = self.clock.now();
        if now < event.starts_at {
            return Err(CoreError::EventNotStarted);
        }
        if now > event.ends_at {
            return Err(CoreError::EventEnded);
        }
        Ok(())
    }

    /// Team of `user_id` in `event_id`
    ///
    /// Checked in order: authentication, event existence, event window
    /// (unless `access` is [`EventAccess::Bypass`]), membership.
    pub async fn resolve_team(
        &self,
        event_id: EventId,
        user_id: Option<UserId>,
        access: EventAccess,
    ) -> CoreResult<(Event, Team)> {
        let user_id = user_id.ok_or(CoreError::NotAuthenticated)?;
        let event = self.load_event(event_id).await?;
        self.check_access(&event, access)?;

        let team = self
            .storage
            .find_team_for_user(event_id, user_id)
            .await?
            .ok_or(CoreError::NoTeamForUser)?;

        Ok((event, team))
    }
}

/// User ids of the whole roster, leader included
pub fn team_member_ids(team: &Team) -> BTreeSet<UserId> {
    let mut ids: BTreeSet<UserId> = team.members.iter().map(|m| m.user_id).collect();
    ids.insert(team.leader_id);
    ids
}

/// User -> team lookup over every roster of an event
pub fn roster_map(teams: &[Team]) -> HashMap<UserId, TeamId> {
    teams
        .iter()
        .flat_map(|team| team_member_ids(team).into_iter().map(move |id| (id, team.id)))
        .collect()
}

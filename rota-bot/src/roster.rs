//! Channel membership snapshot.
//!
//! A refresh lists the channel, fetches every profile, drops bots and
//! deactivated accounts, classifies the rest and swaps the whole roster in
//! at once. Nothing is merged with the previous snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use rota_sdk::{Gateway, UserId};

use crate::groups::{Group, GroupTable};

/// Profile lookups kept in flight at once.
const PROFILE_CONCURRENCY: usize = 8;

/// A human channel member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
    /// `None` for members in neither group; they never receive tasks.
    pub group: Option<Group>,
}

/// Members in channel-listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    pub fn from_members(members: Vec<Member>) -> Self {
        Self { members }
    }

    /// Every human member, including unaffiliated ones.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn get(&self, id: &UserId) -> Option<&Member> {
        self.members.iter().find(|m| &m.id == id)
    }

    /// Members of `group`, in listing order.
    pub fn group(&self, group: Group) -> Vec<Member> {
        self.members
            .iter()
            .filter(|m| m.group == Some(group))
            .cloned()
            .collect()
    }

    pub fn display_names(&self, group: Group) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.group == Some(group))
            .map(|m| m.display_name.clone())
            .collect()
    }

    /// Members that can receive tasks.
    pub fn eligible_count(&self) -> usize {
        self.members.iter().filter(|m| m.group.is_some()).count()
    }
}

/// Build a fresh roster for `channel`.
///
/// Failing to list the channel or to learn our own id is an error; a
/// failed profile lookup only drops that member.
pub async fn build(
    gateway: &dyn Gateway,
    channel: &str,
    table: &GroupTable,
) -> rota_sdk::Result<Roster> {
    let ids = gateway.list_channel_members(channel).await?;
    let me = gateway.self_id().await?;

    let mut seen = HashSet::new();
    let candidates: Vec<UserId> = ids
        .into_iter()
        .filter(|id| id != &me && seen.insert(id.clone()))
        .collect();

    let profiles: Vec<_> = stream::iter(candidates)
        .map(|id| async move {
            let result = gateway.user_profile(&id).await;
            (id, result)
        })
        .buffered(PROFILE_CONCURRENCY)
        .collect()
        .await;

    let mut members = Vec::with_capacity(profiles.len());
    for (id, result) in profiles {
        let profile = match result {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(user = %id, error = %e, "Profile lookup failed, skipping member");
                continue;
            }
        };
        if profile.is_bot || profile.deleted {
            continue;
        }
        let group = table.classify(&profile.display_name);
        members.push(Member {
            id: profile.id,
            display_name: profile.display_name,
            group,
        });
    }

    let roster = Roster::from_members(members);
    tracing::debug!(
        channel,
        members = roster.members().len(),
        eligible = roster.eligible_count(),
        "Built roster"
    );
    Ok(roster)
}

/// Latest roster plus what is needed to rebuild it.
pub struct Membership {
    gateway: Arc<dyn Gateway>,
    table: GroupTable,
    current: RwLock<Arc<Roster>>,
}

impl Membership {
    pub fn new(gateway: Arc<dyn Gateway>, table: GroupTable) -> Self {
        Self {
            gateway,
            table,
            current: RwLock::new(Arc::new(Roster::default())),
        }
    }

    /// Rebuild from the gateway and replace the current snapshot.
    ///
    /// On error the previous snapshot stays in place.
    pub async fn refresh(&self, channel: &str) -> rota_sdk::Result<Arc<Roster>> {
        let roster = Arc::new(build(self.gateway.as_ref(), channel, &self.table).await?);
        *self.current.write() = roster.clone();
        Ok(roster)
    }

    /// The last successfully built roster.
    pub fn current(&self) -> Arc<Roster> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_sdk::UserProfile;
    use rota_sdk::memory::MemoryGateway;

    fn table() -> GroupTable {
        GroupTable::new(
            ["alice".to_string(), "bob".to_string()],
            ["carol".to_string()],
        )
        .unwrap()
    }

    fn channel_with_everyone() -> MemoryGateway {
        let gw = MemoryGateway::new("UBOT");
        gw.add_member("C1", "UBOT", "rota");
        gw.add_member("C1", "U1", "alice");
        gw.add_member("C1", "U2", "dave");
        gw.add_member("C1", "U3", "carol");
        gw.add_member("C1", "U4", "bob");
        gw.add_profile(
            "C1",
            UserProfile {
                id: UserId::new("B1"),
                display_name: "bob".to_string(),
                is_bot: true,
                deleted: false,
            },
        );
        gw.add_profile(
            "C1",
            UserProfile {
                id: UserId::new("U5"),
                display_name: "alice".to_string(),
                is_bot: false,
                deleted: true,
            },
        );
        gw
    }

    #[tokio::test]
    async fn excludes_self_bots_and_deactivated_accounts() {
        let gw = channel_with_everyone();
        let roster = build(&gw, "C1", &table()).await.unwrap();
        let ids: Vec<&str> = roster.members().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["U1", "U2", "U3", "U4"]);
    }

    #[tokio::test]
    async fn groups_keep_listing_order_and_skip_unaffiliated() {
        let gw = channel_with_everyone();
        let roster = build(&gw, "C1", &table()).await.unwrap();
        assert_eq!(roster.display_names(Group::A), vec!["alice", "bob"]);
        assert_eq!(roster.display_names(Group::B), vec!["carol"]);
        assert_eq!(roster.eligible_count(), 3);
        assert_eq!(roster.get(&UserId::new("U2")).unwrap().group, None);
    }

    #[tokio::test]
    async fn failed_profile_lookup_skips_only_that_member() {
        let gw = channel_with_everyone();
        gw.break_profile("U1");
        let roster = build(&gw, "C1", &table()).await.unwrap();
        assert!(roster.get(&UserId::new("U1")).is_none());
        assert_eq!(roster.display_names(Group::A), vec!["bob"]);
    }

    #[tokio::test]
    async fn listing_failure_is_an_error() {
        let gw = channel_with_everyone();
        gw.fail_listing(true);
        assert!(build(&gw, "C1", &table()).await.is_err());
    }

    #[tokio::test]
    async fn refresh_replaces_snapshot_wholesale() {
        let gw = Arc::new(channel_with_everyone());
        let membership = Membership::new(gw.clone(), table());
        assert!(membership.current().members().is_empty());

        membership.refresh("C1").await.unwrap();
        assert_eq!(membership.current().members().len(), 4);

        // A different channel shares nobody with C1.
        gw.add_member("C2", "U9", "carol");
        let roster = membership.refresh("C2").await.unwrap();
        assert_eq!(roster.members().len(), 1);
        assert_eq!(membership.current().members().len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let gw = Arc::new(channel_with_everyone());
        let membership = Membership::new(gw.clone(), table());
        membership.refresh("C1").await.unwrap();

        gw.fail_listing(true);
        assert!(membership.refresh("C1").await.is_err());
        assert_eq!(membership.current().members().len(), 4);
    }
}

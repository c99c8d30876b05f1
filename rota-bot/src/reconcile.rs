//! Completion reconciliation.
//!
//! Anyone who reacted to last week's announcement, with any emoji, is
//! considered done: every task assigned to them is dropped from the list.

use std::collections::HashSet;

use rota_sdk::{Gateway, MessageRef, Reaction, UserId};

use crate::rotation::Task;

/// Distinct users across all reactions.
pub fn reactors(reactions: &[Reaction]) -> HashSet<&UserId> {
    reactions.iter().flat_map(|r| r.users.iter()).collect()
}

/// Drop every task belonging to someone who reacted.
pub fn apply(tasks: Vec<Task>, reactions: &[Reaction]) -> Vec<Task> {
    let done = reactors(reactions);
    tasks
        .into_iter()
        .filter(|t| !done.contains(&t.user_id))
        .collect()
}

/// Fetch reactions on `announcement` and apply them to `tasks`.
///
/// Best effort: with no announcement, or when the fetch fails, `tasks`
/// come back untouched.
pub async fn reconcile(
    gateway: &dyn Gateway,
    channel: &str,
    tasks: Vec<Task>,
    announcement: Option<&MessageRef>,
) -> Vec<Task> {
    let Some(announcement) = announcement else {
        tracing::debug!("No previous announcement, nothing to reconcile");
        return tasks;
    };
    match gateway.reactions(channel, announcement).await {
        Ok(reactions) => {
            let before = tasks.len();
            let remaining = apply(tasks, &reactions);
            tracing::info!(
                announcement = %announcement,
                completed = before - remaining.len(),
                remaining = remaining.len(),
                "Reconciled completions from reactions"
            );
            remaining
        }
        Err(e) => {
            tracing::warn!(
                announcement = %announcement,
                error = %e,
                "Failed to fetch reactions, keeping previous tasks"
            );
            tasks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_sdk::memory::MemoryGateway;

    fn task(user: &str, loc: &str) -> Task {
        Task::new(UserId::new(user), loc)
    }

    fn reaction(emoji: &str, users: &[&str]) -> Reaction {
        Reaction {
            emoji: emoji.to_string(),
            users: users.iter().map(|u| UserId::new(*u)).collect(),
        }
    }

    #[test]
    fn reacting_user_loses_their_task() {
        let tasks = vec![task("u1", "L1"), task("u2", "L2")];
        let remaining = apply(tasks, &[reaction("white_check_mark", &["u1"])]);
        assert_eq!(remaining, vec![task("u2", "L2")]);
    }

    #[test]
    fn all_tasks_of_a_user_are_removed() {
        let tasks = vec![task("u1", "L1"), task("u2", "L2"), task("u1", "L3")];
        let remaining = apply(tasks, &[reaction("broom", &["u1"])]);
        assert_eq!(remaining, vec![task("u2", "L2")]);
    }

    #[test]
    fn any_emoji_and_repeats_count_once() {
        let reactions = [
            reaction("tada", &["u1", "u3"]),
            reaction("broom", &["u1"]),
        ];
        let who = reactors(&reactions);
        assert_eq!(who.len(), 2);

        let remaining = apply(vec![task("u1", "L1"), task("u2", "L2")], &reactions);
        assert_eq!(remaining, vec![task("u2", "L2")]);
    }

    #[test]
    fn reactions_from_unassigned_users_change_nothing() {
        let tasks = vec![task("u1", "L1")];
        assert_eq!(apply(tasks.clone(), &[reaction("eyes", &["u9"])]), tasks);
        assert_eq!(apply(tasks.clone(), &[]), tasks);
    }

    #[tokio::test]
    async fn first_run_has_nothing_to_reconcile() {
        let gw = MemoryGateway::new("UBOT");
        let tasks = vec![task("u1", "L1")];
        assert_eq!(reconcile(&gw, "C1", tasks.clone(), None).await, tasks);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_tasks() {
        let gw = MemoryGateway::new("UBOT");
        let msg = MessageRef::new("17.1");
        gw.react(&msg, "broom", &["u1"]);
        gw.fail_reactions(true);
        let tasks = vec![task("u1", "L1")];
        assert_eq!(reconcile(&gw, "C1", tasks.clone(), Some(&msg)).await, tasks);
    }

    #[tokio::test]
    async fn reactions_on_announcement_are_applied() {
        let gw = MemoryGateway::new("UBOT");
        let msg = MessageRef::new("17.1");
        gw.react(&msg, "broom", &["u1"]);
        let tasks = vec![task("u1", "L1"), task("u2", "L2")];
        let remaining = reconcile(&gw, "C1", tasks, Some(&msg)).await;
        assert_eq!(remaining, vec![task("u2", "L2")]);
    }
}

//! Rotation state and the pure steps of a cycle.
//!
//! Nothing here does I/O. The scheduler strings these together with the
//! gateway and the store.

use rand::Rng;
use rota_sdk::{MessageRef, UserId};
use serde::{Deserialize, Serialize};

use crate::groups::Group;
use crate::roster::Member;

/// One member's duty for the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub user_id: UserId,
    pub location: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(user_id: UserId, location: impl Into<String>) -> Self {
        Self {
            user_id,
            location: location.into(),
            completed: false,
        }
    }
}

/// Everything that survives a restart.
///
/// `tasks` always holds the most recently assigned week. Aliases accept the
/// field names of the older `data.json` layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationState {
    /// Even means group A is up next. Only the parity carries meaning.
    #[serde(default, alias = "WEEK_NUMBER")]
    pub period_counter: i64,
    #[serde(default, alias = "assignedTasks")]
    pub tasks: Vec<Task>,
    /// Consecutive cycles that found no unfinished task.
    #[serde(default, alias = "consecutiveDays")]
    pub streak: u32,
    #[serde(
        default,
        alias = "messageTimestamp",
        deserialize_with = "MessageRef::deserialize_optional"
    )]
    pub last_announcement: Option<MessageRef>,
}

/// The group responsible when the counter reads `counter`, and the counter
/// value to persist afterwards.
///
/// Even counters go up by one and odd counters down by one, so the parity
/// flips every cycle.
pub fn advance(counter: i64) -> (Group, i64) {
    if counter.rem_euclid(2) == 0 {
        (Group::A, counter + 1)
    } else {
        (Group::B, counter - 1)
    }
}

/// Streak after a cycle that found `incomplete` unfinished tasks.
pub fn next_streak(streak: u32, incomplete: usize) -> u32 {
    if incomplete == 0 {
        streak.saturating_add(1)
    } else {
        0
    }
}

/// Tasks nobody marked as done.
pub fn incomplete(tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|t| !t.completed).cloned().collect()
}

/// In-place Fisher–Yates shuffle.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Pair members with locations by index.
///
/// Produces `min(members, locations)` tasks; surplus members get nothing
/// and surplus locations stay unassigned this cycle.
pub fn assign(members: &[Member], locations: &[String]) -> Vec<Task> {
    members
        .iter()
        .zip(locations)
        .map(|(m, loc)| Task::new(m.id.clone(), loc.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::rngs::mock::StepRng;

    fn member(id: &str) -> Member {
        Member {
            id: UserId::new(id),
            display_name: id.to_string(),
            group: Some(Group::A),
        }
    }

    fn locs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn groups_alternate_from_zero() {
        let mut counter = 0;
        let mut seen = Vec::new();
        for cycle in 1..=6 {
            let (group, next) = advance(counter);
            seen.push(group);
            counter = next;
            assert_eq!(counter.rem_euclid(2), cycle % 2);
        }
        assert_eq!(
            seen,
            vec![Group::A, Group::B, Group::A, Group::B, Group::A, Group::B]
        );
    }

    #[test]
    fn advance_handles_any_magnitude() {
        assert_eq!(advance(10), (Group::A, 11));
        assert_eq!(advance(11), (Group::B, 10));
        assert_eq!(advance(-1), (Group::B, -2));
        assert_eq!(advance(-2), (Group::A, -1));
    }

    #[test]
    fn streak_increments_or_resets() {
        assert_eq!(next_streak(0, 0), 1);
        assert_eq!(next_streak(4, 0), 5);
        assert_eq!(next_streak(4, 2), 0);
        assert_eq!(next_streak(u32::MAX, 0), u32::MAX);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let original = locs(&["201", "203", "204", "205", "corridor", "sink", "sink"]);
        for _ in 0..20 {
            let mut shuffled = original.clone();
            shuffle(&mut shuffled, &mut rng);
            assert_eq!(shuffled.len(), original.len());
            let mut a = shuffled.clone();
            let mut b = original.clone();
            a.sort();
            b.sort();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn zero_rng_rotates_deterministically() {
        let mut rng = StepRng::new(0, 0);
        let mut two = locs(&["L1", "L2"]);
        shuffle(&mut two, &mut rng);
        assert_eq!(two, locs(&["L2", "L1"]));

        let mut three = locs(&["L1", "L2", "L3"]);
        shuffle(&mut three, &mut rng);
        assert_eq!(three, locs(&["L2", "L3", "L1"]));
    }

    #[test]
    fn shuffle_tolerates_short_inputs() {
        let mut rng = StepRng::new(0, 0);
        let mut empty: Vec<String> = Vec::new();
        shuffle(&mut empty, &mut rng);
        assert!(empty.is_empty());
        let mut one = locs(&["L1"]);
        shuffle(&mut one, &mut rng);
        assert_eq!(one, locs(&["L1"]));
    }

    #[test]
    fn assignment_is_bounded_by_the_smaller_side() {
        let members = vec![member("u1"), member("u2"), member("u3")];
        let two = locs(&["L1", "L2"]);
        let tasks = assign(&members, &two);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0], Task::new(UserId::new("u1"), "L1"));
        assert_eq!(tasks[1], Task::new(UserId::new("u2"), "L2"));

        let four = locs(&["L1", "L2", "L3", "L4"]);
        assert_eq!(assign(&members, &four).len(), 3);
        assert!(assign(&[], &four).is_empty());
    }

    #[test]
    fn incomplete_keeps_only_unfinished() {
        let mut done = Task::new(UserId::new("u1"), "L1");
        done.completed = true;
        let open = Task::new(UserId::new("u2"), "L2");
        assert_eq!(incomplete(&[done, open.clone()]), vec![open]);
    }

    #[test]
    fn state_serializes_with_documented_field_names() {
        let state = RotationState {
            period_counter: 1,
            tasks: vec![Task::new(UserId::new("U1"), "201")],
            streak: 2,
            last_announcement: Some(MessageRef::new("17.1")),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["periodCounter"], 1);
        assert_eq!(json["tasks"][0]["userId"], "U1");
        assert_eq!(json["tasks"][0]["completed"], false);
        assert_eq!(json["streak"], 2);
        assert_eq!(json["lastAnnouncement"], "17.1");
    }

    #[test]
    fn legacy_data_file_loads() {
        let legacy = r#"{
            "WEEK_NUMBER": 1,
            "assignedTasks": [{"userId": "U1", "location": "sink"}],
            "consecutiveDays": 3,
            "messageTimestamp": "1712345678.000200"
        }"#;
        let state: RotationState = serde_json::from_str(legacy).unwrap();
        assert_eq!(state.period_counter, 1);
        assert_eq!(state.tasks, vec![Task::new(UserId::new("U1"), "sink")]);
        assert_eq!(state.streak, 3);
        assert_eq!(state.last_announcement, Some(MessageRef::new("1712345678.000200")));

        let first_run = r#"{"WEEK_NUMBER":0,"assignedTasks":[],"consecutiveDays":0,"messageTimestamp":0}"#;
        let state: RotationState = serde_json::from_str(first_run).unwrap();
        assert_eq!(state, RotationState::default());
    }
}

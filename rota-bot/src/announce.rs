//! Message text posted to the channel.

use std::fmt::Write;

use crate::groups::Group;
use crate::rotation::Task;

/// Used when the roster file configures no thank-you messages.
pub const DEFAULT_THANKS: &[&str] = &[
    "Thank you all, the room has never looked better!",
    "Great work everyone, see you next week.",
    "Thanks for keeping the place tidy!",
    "Spotless. Thank you!",
    "Nice teamwork, thanks a lot!",
];

pub fn default_thanks() -> Vec<String> {
    DEFAULT_THANKS.iter().map(|s| s.to_string()).collect()
}

/// `"{location}: <@{user}>"`, one line per task.
fn task_lines(out: &mut String, tasks: &[Task]) {
    for task in tasks {
        let _ = writeln!(out, "{}: <@{}>", task.location, task.user_id);
    }
}

/// Opening section: who did not finish last week, or a thank-you.
pub fn notice(incomplete: &[Task], streak: u32, thanks: &str) -> String {
    let mut out = String::new();
    if incomplete.is_empty() {
        let weeks = if streak == 1 { "week" } else { "weeks" };
        let _ = writeln!(
            out,
            "Everyone finished their cleaning! That makes {streak} {weeks} in a row."
        );
        let _ = writeln!(out, "{thanks}");
    } else {
        out.push_str("These members did not finish last week's cleaning.\n");
        out.push_str("Please take care of it next time.\n");
        task_lines(&mut out, incomplete);
    }
    out
}

/// This week's duties for `group`.
pub fn assignment(group: Group, tasks: &[Task]) -> String {
    let mut out = format!("This week's cleaning duty: group {group}\n");
    task_lines(&mut out, tasks);
    out
}

/// The full weekly announcement.
pub fn announcement(notice: &str, assignment: &str) -> String {
    format!("{notice}\n{assignment}")
}

/// Reply to the `list` command.
pub fn member_list(group: Group, names: &[String]) -> String {
    format!("Group {group} members: {}", names.join(", "))
}

pub const MEMBERS_UPDATED: &str = "Member information updated.";

#[cfg(test)]
mod tests {
    use super::*;
    use rota_sdk::UserId;

    fn task(user: &str, loc: &str) -> Task {
        Task::new(UserId::new(user), loc)
    }

    #[test]
    fn incomplete_notice_lists_each_task() {
        let text = notice(&[task("U1", "201"), task("U2", "sink")], 0, "unused");
        assert!(text.contains("did not finish"));
        assert!(text.contains("201: <@U1>\n"));
        assert!(text.contains("sink: <@U2>\n"));
        assert!(!text.contains("unused"));
    }

    #[test]
    fn complete_notice_carries_streak_and_thanks() {
        let text = notice(&[], 3, "Spotless. Thank you!");
        assert!(text.contains("3 weeks in a row"));
        assert!(text.contains("Spotless. Thank you!"));
        assert!(!text.contains("did not finish"));

        assert!(notice(&[], 1, "x").contains("1 week in a row"));
    }

    #[test]
    fn assignment_names_the_group_and_pairs() {
        let text = assignment(Group::B, &[task("U3", "corridor")]);
        assert_eq!(text, "This week's cleaning duty: group B\ncorridor: <@U3>\n");
    }

    #[test]
    fn announcement_joins_sections_with_a_blank_line() {
        assert_eq!(announcement("a\n", "b\n"), "a\n\nb\n");
    }

    #[test]
    fn member_list_joins_names() {
        let names = vec!["alice".to_string(), "bob".to_string()];
        assert_eq!(member_list(Group::A, &names), "Group A members: alice, bob");
        assert_eq!(member_list(Group::B, &[]), "Group B members: ");
    }
}

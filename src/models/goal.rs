use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    NotStarted,
    InProgress,
    Completed,
    NeedsReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub title: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A mentee's goal. `progress` is derived from the milestone list and is
/// recomputed on every save; it is never accepted from the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct Goal {
    #[serde(rename = "_id")]
    pub goal_id: String,
    pub mentee_id: String,
    pub mentor_id: Option<String>,
    pub created_by: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: GoalPriority,
    pub status: GoalStatus,
    /// 0..=100, ratio of completed milestones, rounded to nearest integer.
    pub progress: u8,
    pub milestones: Vec<Milestone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Recompute the derived progress percentage and refresh `updated_at`.
    /// Must be called before every insert or replace.
    pub fn touch(&mut self) {
        self.progress = compute_progress(&self.milestones);
        self.updated_at = Utc::now();
    }
}

/// round(100 * completed / total); 0 when there are no milestones.
pub fn compute_progress(milestones: &[Milestone]) -> u8 {
    if milestones.is_empty() {
        return 0;
    }
    let completed = milestones.iter().filter(|m| m.completed).count();
    ((100.0 * completed as f64 / milestones.len() as f64).round()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milestone(completed: bool) -> Milestone {
        Milestone {
            title: "m".to_string(),
            completed,
            completed_at: completed.then(Utc::now),
        }
    }

    #[test]
    fn progress_is_zero_without_milestones() {
        assert_eq!(compute_progress(&[]), 0);
    }

    #[test]
    fn progress_is_ratio_of_completed_milestones() {
        let ms = vec![milestone(true), milestone(false)];
        assert_eq!(compute_progress(&ms), 50);

        let ms = vec![milestone(true), milestone(true), milestone(true)];
        assert_eq!(compute_progress(&ms), 100);

        let ms = vec![milestone(false), milestone(false)];
        assert_eq!(compute_progress(&ms), 0);
    }

    #[test]
    fn progress_rounds_to_nearest_integer() {
        // 1/3 -> 33.33 -> 33, 2/3 -> 66.67 -> 67
        let ms = vec![milestone(true), milestone(false), milestone(false)];
        assert_eq!(compute_progress(&ms), 33);

        let ms = vec![milestone(true), milestone(true), milestone(false)];
        assert_eq!(compute_progress(&ms), 67);
    }

    #[test]
    fn touch_recomputes_progress_and_refreshes_updated_at() {
        let old = Utc::now() - chrono::Duration::hours(1);
        let mut goal = Goal {
            goal_id: "g1".to_string(),
            mentee_id: "u1".to_string(),
            mentor_id: None,
            created_by: None,
            title: "Learn Rust".to_string(),
            description: None,
            due_date: Utc::now() + chrono::Duration::days(30),
            priority: GoalPriority::Medium,
            status: GoalStatus::InProgress,
            progress: 0,
            milestones: vec![milestone(true), milestone(false)],
            created_at: old,
            updated_at: old,
        };
        goal.touch();
        assert_eq!(goal.progress, 50);
        assert!(goal.updated_at > old);
    }
}

mod goal;

pub use goal::{Goal, GoalPriority, GoalStatus, Milestone};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Mentors own a public profile in the directory; mentees own
/// goals and receive tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Mentor,
    Mentee,
}

/// Represents a user account.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, safe to return from directory endpoints.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        UserProfile {
            user_id: u.user_id,
            username: u.username,
            email: u.email,
            role: u.role,
            full_name: u.full_name,
            bio: u.bio,
            skills: u.skills,
        }
    }
}

/// One login session. The `session_id` is returned at login and must be sent
/// back in the `X-Session-ID` header on every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSession {
    #[serde(rename = "_id")]
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub task_id: String,
    pub mentor_id: String,
    pub mentee_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: GoalPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

/// A scheduled mentoring session between a mentor and a mentee.
#[derive(Debug, Serialize, Deserialize)]
pub struct MentoringSession {
    #[serde(rename = "_id")]
    pub session_id: String,
    pub mentor_id: String,
    pub mentee_id: String,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A mentee's request to be mentored. Accepting it creates the mentorship
/// connection between the two parties.
#[derive(Debug, Serialize, Deserialize)]
pub struct MentorshipRequest {
    #[serde(rename = "_id")]
    pub request_id: String,
    pub mentor_id: String,
    pub mentee_id: String,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub rejection_details: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// A chat conversation between two (or more) users.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatConversation {
    #[serde(rename = "_id")]
    pub conversation_id: String,
    pub participants: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

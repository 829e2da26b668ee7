use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;
use log::{error, info};

use crate::app_state::AppState;
use crate::models::{Goal, GoalPriority, GoalStatus, Milestone};

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Option<GoalPriority>,
    pub status: Option<GoalStatus>,
    /// Defaults to the authenticated user (mentee creating their own goal).
    pub mentee_id: Option<String>,
    pub mentor_id: Option<String>,
    pub milestones: Option<Vec<MilestoneInput>>,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneInput {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<GoalPriority>,
    pub status: Option<GoalStatus>,
    pub mentor_id: Option<String>,
    pub milestones: Option<Vec<MilestoneInput>>,
}

#[derive(Debug, Deserialize)]
pub struct MilestoneToggleRequest {
    pub completed: bool,
}

fn milestones_from_input(input: Vec<MilestoneInput>) -> Vec<Milestone> {
    input
        .into_iter()
        .map(|m| Milestone {
            title: m.title,
            completed: m.completed,
            completed_at: m.completed.then(Utc::now),
        })
        .collect()
}

pub async fn create_goal(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateGoalRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let payload = payload.into_inner();

    let mut goal = Goal {
        goal_id: Uuid::new_v4().to_string(),
        mentee_id: payload.mentee_id.unwrap_or_else(|| current_user.clone()),
        mentor_id: payload.mentor_id,
        created_by: Some(current_user),
        title: payload.title,
        description: payload.description,
        due_date: payload.due_date,
        priority: payload.priority.unwrap_or(GoalPriority::Medium),
        status: payload.status.unwrap_or(GoalStatus::NotStarted),
        progress: 0,
        milestones: milestones_from_input(payload.milestones.unwrap_or_default()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    goal.touch();

    let goals = data.mongodb.db.collection::<Goal>("goals");
    match goals.insert_one(&goal).await {
        Ok(_) => {
            info!("Goal created: {}", goal.goal_id);
            HttpResponse::Ok().json(goal)
        }
        Err(e) => {
            error!("Error inserting goal: {}", e);
            HttpResponse::InternalServerError().body("Error creating goal")
        }
    }
}

pub async fn list_goals(
    req: HttpRequest,
    data: web::Data<AppState>,
    mentee_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let mentee_id = mentee_id.into_inner();

    // Mentees see their own goals; mentors see goals they are attached to.
    let filter = if current_user == mentee_id {
        doc! { "mentee_id": &mentee_id }
    } else {
        doc! { "mentee_id": &mentee_id, "mentor_id": &current_user }
    };

    let goals = data.mongodb.db.collection::<Goal>("goals");
    let mut cursor = match goals.find(filter).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching goals: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching goals");
        }
    };

    let mut result = Vec::new();
    while let Some(goal_res) = cursor.next().await {
        match goal_res {
            Ok(goal) => result.push(goal),
            Err(e) => {
                error!("Error iterating goals: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching goals");
            }
        }
    }
    HttpResponse::Ok().json(result)
}

pub async fn get_goal(
    req: HttpRequest,
    data: web::Data<AppState>,
    goal_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let goals = data.mongodb.db.collection::<Goal>("goals");
    match goals.find_one(doc! { "_id": &*goal_id }).await {
        Ok(Some(goal)) => {
            if goal.mentee_id != current_user && goal.mentor_id.as_deref() != Some(current_user.as_str()) {
                return HttpResponse::Unauthorized().body("Not a participant in this goal");
            }
            HttpResponse::Ok().json(goal)
        }
        Ok(None) => HttpResponse::NotFound().body("Goal not found"),
        Err(e) => {
            error!("Error fetching goal: {}", e);
            HttpResponse::InternalServerError().body("Error fetching goal")
        }
    }
}

/// Full-document update. Loads, applies the patch, recomputes progress and
/// `updated_at`, and replaces. Last write wins.
pub async fn update_goal(
    req: HttpRequest,
    data: web::Data<AppState>,
    goal_id: web::Path<String>,
    payload: web::Json<UpdateGoalRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let goals = data.mongodb.db.collection::<Goal>("goals");
    let mut goal = match goals.find_one(doc! { "_id": &*goal_id }).await {
        Ok(Some(goal)) => goal,
        Ok(None) => return HttpResponse::NotFound().body("Goal not found"),
        Err(e) => {
            error!("Error fetching goal: {}", e);
            return HttpResponse::InternalServerError().body("Error updating goal");
        }
    };
    if goal.mentee_id != current_user && goal.mentor_id.as_deref() != Some(current_user.as_str()) {
        return HttpResponse::Unauthorized().body("Not a participant in this goal");
    }

    let payload = payload.into_inner();
    if let Some(title) = payload.title {
        goal.title = title;
    }
    if let Some(description) = payload.description {
        goal.description = Some(description);
    }
    if let Some(due_date) = payload.due_date {
        goal.due_date = due_date;
    }
    if let Some(priority) = payload.priority {
        goal.priority = priority;
    }
    if let Some(status) = payload.status {
        goal.status = status;
    }
    if let Some(mentor_id) = payload.mentor_id {
        goal.mentor_id = Some(mentor_id);
    }
    if let Some(milestones) = payload.milestones {
        goal.milestones = milestones_from_input(milestones);
    }
    goal.touch();

    match goals.replace_one(doc! { "_id": &*goal_id }, &goal).await {
        Ok(_) => HttpResponse::Ok().json(goal),
        Err(e) => {
            error!("Error updating goal: {}", e);
            HttpResponse::InternalServerError().body("Error updating goal")
        }
    }
}

/// Toggle a single milestone by index; progress follows.
pub async fn toggle_milestone(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, usize)>,
    payload: web::Json<MilestoneToggleRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let (goal_id, index) = path.into_inner();

    let goals = data.mongodb.db.collection::<Goal>("goals");
    let mut goal = match goals.find_one(doc! { "_id": &goal_id }).await {
        Ok(Some(goal)) => goal,
        Ok(None) => return HttpResponse::NotFound().body("Goal not found"),
        Err(e) => {
            error!("Error fetching goal: {}", e);
            return HttpResponse::InternalServerError().body("Error updating milestone");
        }
    };
    if goal.mentee_id != current_user && goal.mentor_id.as_deref() != Some(current_user.as_str()) {
        return HttpResponse::Unauthorized().body("Not a participant in this goal");
    }
    let Some(milestone) = goal.milestones.get_mut(index) else {
        return HttpResponse::NotFound().body("Milestone not found");
    };
    milestone.completed = payload.completed;
    milestone.completed_at = payload.completed.then(Utc::now);
    goal.touch();

    match goals.replace_one(doc! { "_id": &goal_id }, &goal).await {
        Ok(_) => HttpResponse::Ok().json(goal),
        Err(e) => {
            error!("Error updating milestone: {}", e);
            HttpResponse::InternalServerError().body("Error updating milestone")
        }
    }
}

pub async fn delete_goal(
    req: HttpRequest,
    data: web::Data<AppState>,
    goal_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let goals = data.mongodb.db.collection::<Goal>("goals");
    let filter = doc! {
        "_id": &*goal_id,
        "$or": [ { "mentee_id": &current_user }, { "mentor_id": &current_user } ],
    };
    match goals.delete_one(filter).await {
        Ok(res) => {
            if res.deleted_count == 0 {
                HttpResponse::NotFound().body("Goal not found")
            } else {
                HttpResponse::Ok().json(serde_json::json!({ "status": "Goal deleted" }))
            }
        }
        Err(e) => {
            error!("Error deleting goal: {}", e);
            HttpResponse::InternalServerError().body("Error deleting goal")
        }
    }
}

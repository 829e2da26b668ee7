use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::events::ServerEvent;
use crate::hub::PushToUser;
use crate::models::{GoalPriority, Task, TaskStatus};
use crate::notification::{self, StoredNotification};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub mentee_id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<GoalPriority>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<GoalPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub mentee_id: Option<String>,
    pub mentor_id: Option<String>,
}

/// Builds the task list filter. The query narrows the result, but the caller
/// is always AND-ed in: no filter combination reaches tasks the caller is not
/// party to.
fn list_filter(
    current_user: &str,
    mentee_id: Option<&str>,
    mentor_id: Option<&str>,
) -> mongodb::bson::Document {
    let caller_scope = doc! { "$or": [
        { "mentee_id": current_user },
        { "mentor_id": current_user },
    ]};
    match (mentee_id, mentor_id) {
        (Some(mentee), _) => doc! { "mentee_id": mentee, "$and": [caller_scope] },
        (None, Some(mentor)) => doc! { "mentor_id": mentor, "$and": [caller_scope] },
        (None, None) => caller_scope,
    }
}

/// Mentor assigns a task to a mentee. The mentee gets a live `newTask` push
/// and a durable inbox entry.
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let now = Utc::now();
    let new_task = Task {
        task_id: Uuid::new_v4().to_string(),
        mentor_id: current_user,
        mentee_id: payload.mentee_id.clone(),
        title: payload.title.clone(),
        description: payload.description.clone(),
        priority: payload.priority.unwrap_or(GoalPriority::Medium),
        status: TaskStatus::Pending,
        due_date: payload.due_date,
        created_at: now,
        updated_at: now,
    };

    let tasks = data.mongodb.db.collection::<Task>("tasks");
    match tasks.insert_one(&new_task).await {
        Ok(_) => {
            info!("Task {} assigned to {}", new_task.task_id, new_task.mentee_id);
            if let Ok(task_json) = serde_json::to_value(&new_task) {
                data.hub.do_send(PushToUser {
                    user_id: new_task.mentee_id.clone(),
                    event: ServerEvent::NewTask(task_json),
                });
            }
            notification::enqueue(
                &data.mongodb.db,
                StoredNotification::new(
                    &new_task.mentee_id,
                    "new-task",
                    format!("New task assigned: {}", new_task.title),
                    "info",
                    "medium",
                    true,
                    None,
                ),
            )
            .await;
            HttpResponse::Ok().json(new_task)
        }
        Err(e) => {
            error!("Error inserting task: {}", e);
            HttpResponse::InternalServerError().body("Error creating task")
        }
    }
}

pub async fn list_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<TaskListQuery>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let filter = list_filter(
        &current_user,
        query.mentee_id.as_deref(),
        query.mentor_id.as_deref(),
    );

    let tasks = data.mongodb.db.collection::<Task>("tasks");
    let mut cursor = match tasks.find(filter).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching tasks: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching tasks");
        }
    };

    let mut result = Vec::new();
    while let Some(task_res) = cursor.next().await {
        match task_res {
            Ok(task) => result.push(task),
            Err(e) => {
                error!("Error iterating tasks: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching tasks");
            }
        }
    }
    HttpResponse::Ok().json(result)
}

pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let mut update_doc = doc! {};
    if let Some(title) = &payload.title {
        update_doc.insert("title", title);
    }
    if let Some(description) = &payload.description {
        update_doc.insert("description", description);
    }
    if let Some(priority) = &payload.priority {
        if let Ok(b) = mongodb::bson::to_bson(priority) {
            update_doc.insert("priority", b);
        }
    }
    if let Some(status) = &payload.status {
        if let Ok(b) = mongodb::bson::to_bson(status) {
            update_doc.insert("status", b);
        }
    }
    if let Some(due_date) = &payload.due_date {
        // Same serde representation the insert path uses.
        if let Ok(b) = mongodb::bson::to_bson(due_date) {
            update_doc.insert("due_date", b);
        }
    }
    if update_doc.is_empty() {
        return HttpResponse::BadRequest().body("No fields to update");
    }
    if let Ok(b) = mongodb::bson::to_bson(&Utc::now()) {
        update_doc.insert("updated_at", b);
    }

    let tasks = data.mongodb.db.collection::<Task>("tasks");
    let filter = doc! {
        "_id": &*task_id,
        "$or": [ { "mentee_id": &current_user }, { "mentor_id": &current_user } ],
    };
    match tasks.update_one(filter, doc! { "$set": update_doc }).await {
        Ok(res) => {
            if res.matched_count == 0 {
                HttpResponse::NotFound().body("Task not found")
            } else {
                HttpResponse::Ok().json(serde_json::json!({ "status": "Task updated" }))
            }
        }
        Err(e) => {
            error!("Error updating task: {}", e);
            HttpResponse::InternalServerError().body("Error updating task")
        }
    }
}

pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let tasks = data.mongodb.db.collection::<Task>("tasks");
    let filter = doc! { "_id": &*task_id, "mentor_id": &current_user };
    match tasks.delete_one(filter).await {
        Ok(res) => {
            if res.deleted_count == 0 {
                HttpResponse::NotFound().body("Task not found")
            } else {
                HttpResponse::Ok().json(serde_json::json!({ "status": "Task deleted" }))
            }
        }
        Err(e) => {
            error!("Error deleting task: {}", e);
            HttpResponse::InternalServerError().body("Error deleting task")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::list_filter;
    use mongodb::bson::doc;

    #[test]
    fn mentee_query_stays_scoped_to_the_caller() {
        // A caller asking for someone else's tasks still only sees tasks
        // they are themselves party to.
        let filter = list_filter("me", Some("someone-else"), None);
        assert_eq!(filter.get_str("mentee_id").unwrap(), "someone-else");
        let scope = &filter.get_array("$and").unwrap()[0];
        assert_eq!(
            scope.as_document().unwrap(),
            &doc! { "$or": [ { "mentee_id": "me" }, { "mentor_id": "me" } ] }
        );
    }

    #[test]
    fn mentor_query_stays_scoped_to_the_caller() {
        let filter = list_filter("me", None, Some("other-mentor"));
        assert_eq!(filter.get_str("mentor_id").unwrap(), "other-mentor");
        assert!(filter.get_array("$and").is_ok());
    }

    #[test]
    fn no_query_returns_the_callers_tasks() {
        let filter = list_filter("me", None, None);
        assert_eq!(
            filter,
            doc! { "$or": [ { "mentee_id": "me" }, { "mentor_id": "me" } ] }
        );
    }
}

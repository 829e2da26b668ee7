use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::error;
use mongodb::bson::doc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::{AuthSession, User, UserProfile, UserRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Deserialize)]
pub struct SignupInfo {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: UserRole,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginInfo {
    pub username: String,
    pub password: String,
}

// JWT Creation
pub fn create_jwt(user_id: &str, secret: &str) -> String {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn valid_email(email: &str) -> bool {
    // Shape check only; deliverability is not our problem.
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

// Signup Endpoint
pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> impl Responder {
    if !valid_email(&signup_info.email) {
        return HttpResponse::BadRequest().body("Invalid email address");
    }
    if signup_info.password.len() < 8 {
        return HttpResponse::BadRequest().body("Password must be at least 8 characters");
    }

    let users_collection = data.mongodb.db.collection::<User>("users");
    let existing = users_collection
        .find_one(doc! { "$or": [
            { "username": &signup_info.username },
            { "email": &signup_info.email },
        ]})
        .await;
    match existing {
        Ok(Some(_)) => return HttpResponse::Conflict().body("Username or email already taken"),
        Ok(None) => {}
        Err(e) => {
            error!("Error checking existing user: {}", e);
            return HttpResponse::InternalServerError().body("Error creating user");
        }
    }

    let hashed_password = match hash(&signup_info.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => return HttpResponse::InternalServerError().body("Error hashing password"),
    };

    let new_user = User {
        user_id: Uuid::new_v4().to_string(),
        username: signup_info.username.clone(),
        email: signup_info.email.clone(),
        password: hashed_password,
        role: signup_info.role,
        full_name: signup_info.full_name.clone(),
        bio: None,
        skills: None,
        created_at: Utc::now(),
    };

    match users_collection.insert_one(&new_user).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "User created",
            "user_id": new_user.user_id,
        })),
        Err(e) => {
            error!("Error inserting user: {}", e);
            HttpResponse::InternalServerError().body("Error creating user")
        }
    }
}

// Login Endpoint. Issues a JWT plus a server-stored session id; both must be
// presented on authenticated requests (Authorization and X-Session-ID).
pub async fn login(data: web::Data<AppState>, login_info: web::Json<LoginInfo>) -> impl Responder {
    let users_collection = data.mongodb.db.collection::<User>("users");
    let user_doc = users_collection
        .find_one(doc! { "username": &login_info.username })
        .await;

    match user_doc {
        Ok(Some(user)) => {
            if verify(&login_info.password, &user.password).unwrap_or(false) {
                let token = create_jwt(&user.user_id, &data.config.jwt_secret);
                let session = AuthSession {
                    session_id: Uuid::new_v4().to_string(),
                    user_id: user.user_id.clone(),
                    created_at: Utc::now(),
                };
                let sessions = data.mongodb.db.collection::<AuthSession>("auth_sessions");
                if let Err(e) = sessions.insert_one(&session).await {
                    error!("Error storing auth session: {}", e);
                    return HttpResponse::InternalServerError().body("Error logging in");
                }
                HttpResponse::Ok().json(serde_json::json!({
                    "token": token,
                    "user_id": user.user_id,
                    "sessionId": session.session_id,
                    "role": user.role,
                    "user": UserProfile::from(user),
                }))
            } else {
                HttpResponse::Unauthorized().body("Invalid credentials")
            }
        }
        Ok(None) => HttpResponse::Unauthorized().body("User not found"),
        Err(e) => {
            error!("Error logging in: {}", e);
            HttpResponse::InternalServerError().body("Error logging in")
        }
    }
}

// Logout: invalidates the server-stored session.
pub async fn logout(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let session_id = match req.headers().get("X-Session-ID").and_then(|v| v.to_str().ok()) {
        Some(s) => s.to_string(),
        None => return HttpResponse::BadRequest().body("Missing X-Session-ID header"),
    };

    let sessions = data.mongodb.db.collection::<AuthSession>("auth_sessions");
    match sessions
        .delete_one(doc! { "_id": &session_id, "user_id": &current_user })
        .await
    {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "status": "Logged out" })),
        Err(e) => {
            error!("Error deleting auth session: {}", e);
            HttpResponse::InternalServerError().body("Error logging out")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip_preserves_subject() {
        let token = create_jwt("user-42", "test-secret");
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "user-42");
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let token = create_jwt("user-42", "test-secret");
        assert!(validate_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn email_shape_check() {
        assert!(valid_email("mentee@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing@tld"));
        assert!(!valid_email("two@@example.com"));
    }
}

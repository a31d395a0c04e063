// Each test binary uses a different slice of the stub.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

pub const USER_EMAIL: &str = "amina@example.com";
pub const USER_PASSWORD: &str = "secret1";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "adminpw";
pub const OTP: &str = "123456";

#[derive(Debug, Clone, Default)]
pub struct ApiStubConfig {
    /// Paths answered with an HTML 502 page instead of JSON.
    pub html_paths: Vec<String>,
    /// A path whose reply is held back for the given time.
    pub slow_path: Option<(String, Duration)>,
}

#[derive(Debug, Clone)]
struct User {
    id: i64,
    name: String,
    email: String,
    password: String,
    role: &'static str,
}

#[derive(Debug, Clone)]
struct Payment {
    id: i64,
    user_id: i64,
    content_id: i64,
    phone_number: String,
    amount: f64,
    otp: String,
    status: &'static str,
    transaction_id: String,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    content: BTreeMap<i64, Value>,
    payments: Vec<Payment>,
    access: BTreeSet<(i64, i64)>,
    grants: Vec<(i64, i64)>,
    bookmarks: BTreeSet<(i64, i64)>,
    progress: BTreeMap<(i64, i64), (f64, u32)>,
    log: Vec<String>,
    revoked: bool,
}

/// In-process stand-in for the content/payments/auth collaborator.
pub struct ApiStub {
    pub base_url: String,
    state: Arc<Mutex<State>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ApiStub {
    pub fn spawn(config: ApiStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start api stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let state = Arc::new(Mutex::new(seed()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_state = Arc::clone(&state);
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let method = request.method().to_string();
                let url = request.url().to_string();
                let auth = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_owned());
                let mut raw = Vec::new();
                let _ = request.as_reader().read_to_end(&mut raw);
                let body = String::from_utf8_lossy(&raw).into_owned();

                let parsed = url::Url::parse(&format!("http://stub{url}")).expect("parse url");
                let path = parsed.path().to_owned();
                let query: BTreeMap<String, String> = parsed
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();

                if let Some((slow, delay)) = &config.slow_path
                    && slow == &path
                {
                    thread::sleep(*delay);
                }

                if config.html_paths.iter().any(|p| p == &path) {
                    let _ = request.respond(
                        tiny_http::Response::from_string(
                            "<html><body><h1>502 Bad Gateway</h1></body></html>",
                        )
                        .with_status_code(502),
                    );
                    continue;
                }

                let (status, payload) = {
                    let mut state = thread_state.lock().expect("lock stub state");
                    state.log.push(format!("{method} {path}"));
                    route(&mut state, &method, &path, &query, auth.as_deref(), &body)
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(payload.to_string())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// `METHOD /path` lines in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().expect("lock stub state").log.clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.requests().iter().filter(|l| l.as_str() == line).count()
    }

    /// Every (user, content) access grant recorded, duplicates included.
    pub fn grants(&self) -> Vec<(i64, i64)> {
        self.state.lock().expect("lock stub state").grants.clone()
    }

    pub fn bookmarked(&self, user_id: i64, content_id: i64) -> bool {
        self.state
            .lock()
            .expect("lock stub state")
            .bookmarks
            .contains(&(user_id, content_id))
    }

    /// Every token issued so far is rejected from now on.
    pub fn revoke_tokens(&self) {
        self.state.lock().expect("lock stub state").revoked = true;
    }

    pub fn user_role(&self, id: i64) -> Option<&'static str> {
        self.state
            .lock()
            .expect("lock stub state")
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.role)
    }

    pub fn content(&self, id: i64) -> Option<Value> {
        self.state
            .lock()
            .expect("lock stub state")
            .content
            .get(&id)
            .cloned()
    }
}

impl Drop for ApiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn seed() -> State {
    let mut state = State {
        users: vec![
            User {
                id: 1,
                name: "Amina".to_owned(),
                email: USER_EMAIL.to_owned(),
                password: USER_PASSWORD.to_owned(),
                role: "user",
            },
            User {
                id: 2,
                name: "Admin".to_owned(),
                email: ADMIN_EMAIL.to_owned(),
                password: ADMIN_PASSWORD.to_owned(),
                role: "admin",
            },
        ],
        ..State::default()
    };
    state.content.insert(
        1,
        json!({
            "id": 1,
            "title": "Kampala Nights",
            "author": "A. Writer",
            "category": "book",
            "description": "A city story.",
            "preview_text": "Chapter 1...",
            "full_text": "It was a quiet night.\n\nThe end.",
            "cover_image": null,
            "page_count": 12,
            "price": 5000.0,
            "is_featured": 1,
            "created_at": "2026-01-05 10:11:12"
        }),
    );
    state.content.insert(
        2,
        json!({
            "id": 2,
            "title": "Farming Guide",
            "author": "B. Grower",
            "category": "guide",
            "description": "Seasons and soil.",
            "preview_text": "Soil first.",
            "full_text": "Plant after the rains.",
            "cover_image": "cover_1a2b_farm.png",
            "page_count": 4,
            "price": 2500.0,
            "is_featured": 0,
            "created_at": "2026-01-06 09:00:00"
        }),
    );
    state
}

fn err(status: u16, message: &str) -> (u16, Value) {
    (status, json!({ "error": message }))
}

struct Caller {
    user_id: i64,
    admin: bool,
}

fn caller(state: &State, auth: Option<&str>) -> Result<Option<Caller>, (u16, Value)> {
    let Some(header) = auth else {
        return Ok(None);
    };
    if state.revoked {
        return Err(err(401, "Invalid or expired token"));
    }
    let token = header.trim_start_matches("Bearer ").trim();
    let user = token
        .strip_prefix("token-")
        .and_then(|id| id.parse::<i64>().ok())
        .and_then(|id| state.users.iter().find(|u| u.id == id));
    match user {
        Some(user) => Ok(Some(Caller {
            user_id: user.id,
            admin: user.role == "admin",
        })),
        None => Err(err(401, "Invalid or expired token")),
    }
}

fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
        "avatar_url": null,
        "created_at": "2026-01-01 08:00:00"
    })
}

fn content_for(state: &State, item: &Value, who: Option<&Caller>, include_full: bool) -> Value {
    let id = item["id"].as_i64().unwrap_or_default();
    let has_access = who.is_some_and(|c| c.admin || state.access.contains(&(c.user_id, id)));
    let mut out = item.clone();
    out["has_access"] = json!(has_access);
    if !(has_access && include_full)
        && let Some(obj) = out.as_object_mut()
    {
        obj.remove("full_text");
    }
    out
}

fn multipart_field(body: &str, name: &str) -> Option<String> {
    let marker = format!("name=\"{name}\"");
    let start = body.find(&marker)? + marker.len();
    let rest = &body[start..];
    let value_start = rest.find("\r\n\r\n")? + 4;
    let rest = &rest[value_start..];
    let value_end = rest.find("\r\n--")?;
    Some(rest[..value_end].to_owned())
}

fn route(
    state: &mut State,
    method: &str,
    path: &str,
    query: &BTreeMap<String, String>,
    auth: Option<&str>,
    body: &str,
) -> (u16, Value) {
    let json_body: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        ("POST", ["api", "auth", "login"]) => {
            let email = json_body["email"].as_str().unwrap_or_default();
            let password = json_body["password"].as_str().unwrap_or_default();
            match state
                .users
                .iter()
                .find(|u| u.email == email && u.password == password)
            {
                Some(user) => (
                    200,
                    json!({ "token": format!("token-{}", user.id), "user": user_json(user) }),
                ),
                None => err(401, "Invalid email or password"),
            }
        }
        ("POST", ["api", "auth", "register"]) => {
            let name = json_body["name"].as_str().unwrap_or_default().to_owned();
            let email = json_body["email"].as_str().unwrap_or_default().to_owned();
            let password = json_body["password"].as_str().unwrap_or_default().to_owned();
            if name.is_empty() || email.is_empty() || password.is_empty() {
                return err(400, "Name, email and password are required");
            }
            if state.users.iter().any(|u| u.email == email) {
                return err(409, "Email already registered");
            }
            let user = User {
                id: state.users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
                name,
                email,
                password,
                role: "user",
            };
            state.users.push(user.clone());
            (
                201,
                json!({ "token": format!("token-{}", user.id), "user": user_json(&user) }),
            )
        }
        ("GET", ["api", "auth", "me"]) => match caller(state, auth) {
            Ok(Some(c)) => {
                let user = state.users.iter().find(|u| u.id == c.user_id).cloned();
                match user {
                    Some(user) => (200, json!({ "user": user_json(&user) })),
                    None => err(404, "User not found"),
                }
            }
            Ok(None) => err(401, "Authentication required"),
            Err(e) => e,
        },
        ("GET", ["api", "content"]) => {
            // Optional auth: a bad token reads as anonymous.
            let who = caller(state, auth).ok().flatten();
            let category = query.get("category");
            let search = query.get("search").map(|s| s.to_lowercase());
            let featured = query.contains_key("featured");
            let items: Vec<Value> = state
                .content
                .values()
                .filter(|item| category.is_none_or(|c| item["category"] == c.as_str()))
                .filter(|item| {
                    search.as_deref().is_none_or(|s| {
                        ["title", "author", "description"].iter().any(|field| {
                            item[*field]
                                .as_str()
                                .is_some_and(|v| v.to_lowercase().contains(s))
                        })
                    })
                })
                .filter(|item| !featured || item["is_featured"] == 1)
                .map(|item| content_for(state, item, who.as_ref(), false))
                .collect();
            (200, json!({ "content": items }))
        }
        ("GET", ["api", "content", id]) => {
            let who = caller(state, auth).ok().flatten();
            let Some(item) = id.parse::<i64>().ok().and_then(|id| state.content.get(&id)) else {
                return err(404, "Content not found");
            };
            (
                200,
                json!({ "content": content_for(state, item, who.as_ref(), true) }),
            )
        }
        ("POST", ["api", "content"]) => {
            if let Err(e) = require_admin(state, auth) {
                return e;
            }
            let Some(title) = multipart_field(body, "title").filter(|t| !t.is_empty()) else {
                return err(400, "Title is required");
            };
            let id = state.content.keys().max().copied().unwrap_or(0) + 1;
            let price: f64 = multipart_field(body, "price")
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000.0);
            let field = |name: &str, default: &str| {
                multipart_field(body, name).unwrap_or_else(|| default.to_owned())
            };
            let cover = body
                .contains("name=\"cover_image\"")
                .then(|| format!("cover_{id}.png"));
            let featured: i64 = field("is_featured", "0").parse().unwrap_or(0);
            let item = json!({
                "id": id,
                "title": title,
                "author": field("author", "Unknown"),
                "category": field("category", "article"),
                "description": field("description", ""),
                "preview_text": field("preview_text", ""),
                "full_text": field("full_text", ""),
                "cover_image": cover,
                "page_count": 0,
                "price": price,
                "is_featured": featured,
                "created_at": "2026-02-01 12:00:00"
            });
            state.content.insert(id, item.clone());
            (201, json!({ "content": item }))
        }
        ("PUT", ["api", "content", id]) => {
            if let Err(e) = require_admin(state, auth) {
                return e;
            }
            let Some(item) = id
                .parse::<i64>()
                .ok()
                .and_then(|id| state.content.get_mut(&id))
            else {
                return err(404, "Content not found");
            };
            if let (Some(target), Some(patch)) = (item.as_object_mut(), json_body.as_object()) {
                for (key, value) in patch {
                    target.insert(key.clone(), value.clone());
                }
            }
            (200, json!({ "content": item.clone() }))
        }
        ("DELETE", ["api", "content", id]) => {
            if let Err(e) = require_admin(state, auth) {
                return e;
            }
            let Some(id) = id.parse::<i64>().ok() else {
                return err(404, "Content not found");
            };
            if state.content.remove(&id).is_none() {
                return err(404, "Content not found");
            }
            state.bookmarks.retain(|(_, c)| *c != id);
            state.access.retain(|(_, c)| *c != id);
            (200, json!({ "message": "Content deleted successfully" }))
        }
        ("POST", ["api", "payments", "initiate"]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let content_id = json_body["content_id"].as_i64().unwrap_or_default();
            let phone = json_body["phone_number"]
                .as_str()
                .unwrap_or_default()
                .trim()
                .to_owned();
            if content_id == 0 || phone.is_empty() {
                return err(400, "Content ID and phone number are required");
            }
            if !phone.starts_with("+256") && !phone.starts_with('0') {
                return err(400, "Please enter a valid Ugandan phone number");
            }
            if state.access.contains(&(c.user_id, content_id)) {
                return err(400, "You already have access to this content");
            }
            let Some(item) = state.content.get(&content_id) else {
                return err(404, "Content not found");
            };
            let amount = item["price"].as_f64().unwrap_or_default();
            let title = item["title"].as_str().unwrap_or_default().to_owned();
            let id = state.payments.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            let payment = Payment {
                id,
                user_id: c.user_id,
                content_id,
                phone_number: phone.clone(),
                amount,
                otp: OTP.to_owned(),
                status: "pending",
                transaction_id: format!("TXN{id:012}"),
            };
            state.payments.push(payment.clone());
            (
                200,
                json!({
                    "message": format!("Payment initiated for \"{title}\"."),
                    "payment_id": id,
                    "transaction_id": payment.transaction_id,
                    "amount": amount,
                    "currency": "UGX",
                    "phone_number": phone,
                    "otp_hint": format!("Your simulated OTP is: {OTP}")
                }),
            )
        }
        ("POST", ["api", "payments", "confirm"]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let payment_id = json_body["payment_id"]
                .as_i64()
                .or_else(|| json_body["payment_id"].as_str().and_then(|s| s.parse().ok()));
            let otp = json_body["otp"].as_str().unwrap_or_default().trim().to_owned();
            let (Some(payment_id), false) = (payment_id, otp.is_empty()) else {
                return err(400, "Payment ID and OTP are required");
            };
            let Some(payment) = state
                .payments
                .iter_mut()
                .find(|p| p.id == payment_id && p.user_id == c.user_id && p.status == "pending")
            else {
                return err(404, "Payment not found or already processed");
            };
            if payment.otp != otp {
                return err(400, "Invalid OTP. Please try again.");
            }
            payment.status = "confirmed";
            let grant = (c.user_id, payment.content_id);
            let transaction_id = payment.transaction_id.clone();
            if state.access.insert(grant) {
                state.grants.push(grant);
            }
            (
                200,
                json!({
                    "message": "Payment confirmed!",
                    "transaction_id": transaction_id,
                    "content_id": grant.1
                }),
            )
        }
        ("GET", ["api", "payments", "history"]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let payments: Vec<Value> = state
                .payments
                .iter()
                .rev()
                .filter(|p| p.user_id == c.user_id)
                .map(|p| {
                    json!({
                        "id": p.id,
                        "user_id": p.user_id,
                        "content_id": p.content_id,
                        "content_title": title_of(state, p.content_id),
                        "amount": p.amount,
                        "status": p.status,
                        "transaction_id": p.transaction_id,
                        "phone_number": p.phone_number,
                        "created_at": "2026-02-01 12:00:00"
                    })
                })
                .collect();
            (200, json!({ "payments": payments }))
        }
        ("GET", ["api", "bookmarks"]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let bookmarks: Vec<Value> = state
                .bookmarks
                .iter()
                .filter(|(u, _)| *u == c.user_id)
                .filter_map(|(_, content_id)| state.content.get(content_id))
                .map(|item| {
                    json!({
                        "id": item["id"],
                        "content_id": item["id"],
                        "title": item["title"],
                        "author": item["author"],
                        "category": item["category"],
                        "price": item["price"],
                        "created_at": "2026-02-01 12:00:00"
                    })
                })
                .collect();
            (200, json!({ "bookmarks": bookmarks }))
        }
        ("POST", ["api", "bookmarks"]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let Some(content_id) = json_body["content_id"].as_i64() else {
                return err(400, "Content ID is required");
            };
            if !state.bookmarks.insert((c.user_id, content_id)) {
                return err(409, "Bookmark already exists");
            }
            (201, json!({ "message": "Bookmark added" }))
        }
        ("DELETE", ["api", "bookmarks", id]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            if let Ok(content_id) = id.parse::<i64>() {
                state.bookmarks.remove(&(c.user_id, content_id));
            }
            (200, json!({ "message": "Bookmark removed" }))
        }
        ("GET", ["api", "users", "dashboard"]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let purchased: Vec<Value> = state
                .access
                .iter()
                .filter(|(u, _)| *u == c.user_id)
                .filter_map(|(_, id)| state.content.get(id).map(|item| (*id, item)))
                .map(|(id, item)| {
                    let progress = state.progress.get(&(c.user_id, id));
                    json!({
                        "id": id,
                        "title": item["title"],
                        "author": item["author"],
                        "category": item["category"],
                        "cover_image": item["cover_image"],
                        "page_count": item["page_count"],
                        "progress_percent": progress.map(|p| p.0),
                        "last_page": progress.map(|p| p.1)
                    })
                })
                .collect();
            let total_spent: f64 = state
                .payments
                .iter()
                .filter(|p| p.user_id == c.user_id && p.status == "confirmed")
                .map(|p| p.amount)
                .sum();
            let bookmarks_count = state.bookmarks.iter().filter(|(u, _)| *u == c.user_id).count();
            (
                200,
                json!({
                    "total_purchased": purchased.len(),
                    "purchased_content": purchased,
                    "bookmarks_count": bookmarks_count,
                    "total_spent": total_spent
                }),
            )
        }
        ("GET", ["api", "users"]) => {
            if let Err(e) = require_admin(state, auth) {
                return e;
            }
            let users: Vec<Value> = state.users.iter().rev().map(user_json).collect();
            (200, json!({ "users": users }))
        }
        ("GET", ["api", "users", "stats"]) => {
            if let Err(e) = require_admin(state, auth) {
                return e;
            }
            let confirmed: Vec<&Payment> = state
                .payments
                .iter()
                .filter(|p| p.status == "confirmed")
                .collect();
            let recent: Vec<Value> = confirmed
                .iter()
                .rev()
                .take(10)
                .map(|p| {
                    let user_name = state.users.iter().find(|u| u.id == p.user_id);
                    json!({
                        "id": p.id,
                        "user_id": p.user_id,
                        "content_id": p.content_id,
                        "amount": p.amount,
                        "status": p.status,
                        "transaction_id": p.transaction_id,
                        "phone_number": p.phone_number,
                        "otp": p.otp,
                        "created_at": "2026-02-01 12:00:00",
                        "user_name": user_name.map(|u| u.name.clone()),
                        "content_title": title_of(state, p.content_id)
                    })
                })
                .collect();
            (
                200,
                json!({ "stats": {
                    "total_users": state.users.iter().filter(|u| u.role == "user").count(),
                    "total_content": state.content.len(),
                    "total_payments": confirmed.len(),
                    "total_revenue": confirmed.iter().map(|p| p.amount).sum::<f64>(),
                    "recent_payments": recent
                }}),
            )
        }
        ("PUT", ["api", "users", id]) => {
            if let Err(e) = require_admin(state, auth) {
                return e;
            }
            let Some(user) = id
                .parse::<i64>()
                .ok()
                .and_then(|id| state.users.iter_mut().find(|u| u.id == id))
            else {
                return err(404, "User not found");
            };
            match json_body["role"].as_str() {
                Some("admin") => user.role = "admin",
                Some("user") => user.role = "user",
                _ => {}
            }
            if let Some(name) = json_body["name"].as_str() {
                user.name = name.to_owned();
            }
            let user = user.clone();
            (200, json!({ "user": user_json(&user) }))
        }
        ("DELETE", ["api", "users", id]) => {
            if let Err(e) = require_admin(state, auth) {
                return e;
            }
            let Some(user) = id
                .parse::<i64>()
                .ok()
                .and_then(|id| state.users.iter().find(|u| u.id == id))
            else {
                return err(404, "User not found");
            };
            if user.role == "admin" {
                return err(400, "Cannot delete admin user");
            }
            let user_id = user.id;
            state.bookmarks.retain(|(u, _)| *u != user_id);
            state.progress.retain(|(u, _), _| *u != user_id);
            state.access.retain(|(u, _)| *u != user_id);
            state.payments.retain(|p| p.user_id != user_id);
            state.users.retain(|u| u.id != user_id);
            (200, json!({ "message": "User deleted successfully" }))
        }
        ("PUT", ["api", "reading-progress"]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let Some(content_id) = json_body["content_id"].as_i64() else {
                return err(400, "Content ID is required");
            };
            let percent = json_body["progress_percent"].as_f64().unwrap_or_default();
            let last_page = json_body["last_page"].as_u64().unwrap_or_default() as u32;
            state
                .progress
                .insert((c.user_id, content_id), (percent, last_page));
            (200, json!({ "message": "Progress updated" }))
        }
        ("GET", ["api", "reading-progress", id]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let content_id = id.parse::<i64>().unwrap_or_default();
            match state.progress.get(&(c.user_id, content_id)) {
                Some((percent, last_page)) => (
                    200,
                    json!({ "progress": {
                        "content_id": content_id,
                        "progress_percent": percent,
                        "last_page": last_page,
                        "updated_at": "2026-02-01 12:00:00"
                    }}),
                ),
                None => (200, json!({ "progress": null })),
            }
        }
        ("PUT", ["api", "profile"]) => {
            let c = match require_user(state, auth) {
                Ok(c) => c,
                Err(e) => return e,
            };
            let name = json_body["name"].as_str().unwrap_or_default().trim().to_owned();
            if name.is_empty() {
                return err(400, "Name is required");
            }
            let Some(user) = state.users.iter_mut().find(|u| u.id == c.user_id) else {
                return err(404, "User not found");
            };
            if let Some(new_password) = json_body["new_password"].as_str() {
                if json_body["current_password"].as_str() != Some(user.password.as_str()) {
                    return err(401, "Current password is incorrect");
                }
                user.password = new_password.to_owned();
            }
            user.name = name;
            let user = user.clone();
            (
                200,
                json!({ "message": "Profile updated successfully", "user": user_json(&user) }),
            )
        }
        _ => err(404, "Not found"),
    }
}

fn title_of(state: &State, content_id: i64) -> Value {
    state
        .content
        .get(&content_id)
        .map(|c| c["title"].clone())
        .unwrap_or(Value::Null)
}

fn require_user(state: &State, auth: Option<&str>) -> Result<Caller, (u16, Value)> {
    match caller(state, auth)? {
        Some(c) => Ok(c),
        None => Err(err(401, "Authentication required")),
    }
}

fn require_admin(state: &State, auth: Option<&str>) -> Result<Caller, (u16, Value)> {
    let c = require_user(state, auth)?;
    if !c.admin {
        return Err(err(403, "Admin access required"));
    }
    Ok(c)
}

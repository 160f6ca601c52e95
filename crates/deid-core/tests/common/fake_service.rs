//! In-process stand-in for the de-identification jobs API.
//!
//! `PUT /jobs/{name}` creates a job; `GET /jobs/{name}` reports `Running` for
//! the first `running_polls` queries, then `Succeeded` (or `Failed` for items
//! listed in `failing_items`). Items in `rejected_items` get HTTP 400 on PUT.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::json;

use super::{serve, Request, Response};

#[derive(Debug, Clone, Default)]
pub struct FakeOptions {
    pub running_polls: usize,
    pub failing_items: HashSet<u64>,
    pub rejected_items: HashSet<u64>,
    /// When set, requests without `Authorization: Bearer <token>` get 401.
    pub required_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FakeJob {
    pub body: serde_json::Value,
    pub polls: usize,
}

#[derive(Default)]
pub struct FakeState {
    pub jobs: HashMap<String, FakeJob>,
    pub requests: Vec<Request>,
}

pub struct FakeService {
    pub url: String,
    pub state: Arc<Mutex<FakeState>>,
}

fn item_of(name: &str) -> Option<u64> {
    name.split('-').nth(1)?.parse().ok()
}

pub fn start(opts: FakeOptions) -> FakeService {
    let state = Arc::new(Mutex::new(FakeState::default()));
    let shared = Arc::clone(&state);
    let url = serve(move |req| respond(&opts, &shared, req));
    FakeService { url, state }
}

fn respond(opts: &FakeOptions, state: &Mutex<FakeState>, req: Request) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(req.clone());

    if let Some(token) = &opts.required_token {
        if req.header("Authorization") != Some(format!("Bearer {token}").as_str()) {
            return Response::json("401 Unauthorized", json!({"error": {"code": "Unauthorized"}}));
        }
    }
    if req.query_value("api-version").is_none() {
        return Response::json("400 Bad Request", json!({"error": {"message": "api-version missing"}}));
    }
    let Some(name) = req.path.strip_prefix("/jobs/").map(str::to_string) else {
        return Response::new("404 Not Found");
    };

    match req.method.as_str() {
        "PUT" => {
            if item_of(&name).is_some_and(|i| opts.rejected_items.contains(&i)) {
                return Response::json(
                    "400 Bad Request",
                    json!({"error": {"code": "InvalidRequest", "message": "bad source"}}),
                );
            }
            let Ok(body) = serde_json::from_slice::<serde_json::Value>(&req.body) else {
                return Response::new("400 Bad Request");
            };
            state.jobs.insert(name.clone(), FakeJob { body, polls: 0 });
            Response::json("201 Created", json!({"name": name, "status": "NotStarted"}))
        }
        "GET" => {
            let Some(job) = state.jobs.get_mut(&name) else {
                return Response::json("404 Not Found", json!({"error": {"code": "NotFound"}}));
            };
            job.polls += 1;
            if job.polls <= opts.running_polls {
                return Response::json("200 OK", json!({"name": name, "status": "Running"}));
            }
            if item_of(&name).is_some_and(|i| opts.failing_items.contains(&i)) {
                Response::json(
                    "200 OK",
                    json!({
                        "name": name,
                        "status": "Failed",
                        "error": {"code": "JobFailed", "message": "document could not be parsed"}
                    }),
                )
            } else {
                Response::json("200 OK", json!({"name": name, "status": "Succeeded"}))
            }
        }
        _ => Response::new("405 Method Not Allowed"),
    }
}

use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{loaded_gradebook, param, request_config};
use crate::ipc::types::{AppState, Request};
use crate::model::Gradebook;
use serde_json::json;
use std::path::PathBuf;

fn counts(gb: &Gradebook) -> serde_json::Value {
    json!({
        "periodCount": gb.periods.len(),
        "categoryCount": gb.categories.len(),
        "taskCount": gb.tasks.len(),
        "scoreCount": gb.scores.len(),
        "studentCount": gb.student_ids().len(),
    })
}

fn handle_gradebook_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match Gradebook::from_json_file(&path) {
        Ok(gb) => {
            tracing::info!(
                path = %path.display(),
                tasks = gb.tasks.len(),
                scores = gb.scores.len(),
                "gradebook opened"
            );
            let result = counts(&gb);
            state.gradebook = Some(gb);
            state.gradebook_path = Some(path);
            ok(&req.id, result)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "gradebook open failed");
            err(&req.id, "gradebook_load_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_gradebook_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let gb: Gradebook = match param(req, "gradebook") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    tracing::info!(tasks = gb.tasks.len(), scores = gb.scores.len(), "gradebook set");
    let result = counts(&gb);
    state.gradebook = Some(gb);
    state.gradebook_path = None;
    ok(&req.id, result)
}

fn handle_gradebook_validate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = match request_config(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let gb = match loaded_gradebook(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let report = calc::validate_gradebook(gb, &cfg);
    if !report.is_clean() {
        tracing::warn!(
            issues = report.issues.len(),
            errors = report.errors.len(),
            "gradebook has configuration problems"
        );
    }
    ok(
        &req.id,
        json!({
            "clean": report.is_clean(),
            "issues": report.issues,
            "errors": report.errors,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "gradebook.open" => Some(handle_gradebook_open(state, req)),
        "gradebook.set" => Some(handle_gradebook_set(state, req)),
        "gradebook.validate" => Some(handle_gradebook_validate(state, req)),
        _ => None,
    }
}

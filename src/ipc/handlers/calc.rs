use crate::calc::{self, Average};
use crate::error::ConfigIssue;
use crate::ipc::error::{calc_err, ok};
use crate::ipc::helpers::{loaded_gradebook, param, request_config};
use crate::ipc::types::{AppState, Request};
use crate::letter::letter_grade;
use crate::model::{Category, Period, Score, Task};
use serde_json::json;
use std::collections::BTreeMap;

fn warn_issues(req: &Request, issues: &[ConfigIssue]) {
    for issue in issues {
        tracing::warn!(id = %req.id, code = issue.code(), "{}", issue);
    }
}

fn handle_category_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = match request_config(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let tasks: Vec<Task> = match param(req, "tasks") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let scores: Vec<Score> = match param(req, "scores") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::category_average(&tasks, &scores, &cfg) {
        Ok(tally) => ok(&req.id, json!(tally)),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_period_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = match request_config(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let averages: BTreeMap<String, Average> = match param(req, "categoryAverages") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let categories: Vec<Category> = match param(req, "categories") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let period_id = req
        .params
        .get("periodId")
        .and_then(|v| v.as_str())
        .unwrap_or("period");
    match calc::period_average(period_id, &averages, &categories, &cfg) {
        Ok(out) => {
            warn_issues(req, &out.issues);
            ok(&req.id, json!(out))
        }
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_final_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = match request_config(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let averages: BTreeMap<String, Average> = match param(req, "periodAverages") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let periods: Vec<Period> = match param(req, "periods") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::final_average(&averages, &periods, &cfg) {
        Ok(out) => {
            warn_issues(req, &out.issues);
            ok(&req.id, json!(out))
        }
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_letter_grade(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let average: f64 = match param(req, "average") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match letter_grade(average) {
        Ok(letter) => ok(&req.id, json!({ "average": average, "letter": letter })),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_student_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = match request_config(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id: String = match param(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let gb = match loaded_gradebook(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::student_report(gb, &student_id, &cfg) {
        Ok(report) => {
            warn_issues(req, &report.issues);
            ok(&req.id, json!(report))
        }
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_class_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = match request_config(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let gb = match loaded_gradebook(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match calc::class_report(gb, &cfg) {
        Ok(report) => {
            warn_issues(req, &report.issues);
            ok(&req.id, json!(report))
        }
        Err(e) => calc_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.categoryAverage" => Some(handle_category_average(state, req)),
        "calc.periodAverage" => Some(handle_period_average(state, req)),
        "calc.finalAverage" => Some(handle_final_average(state, req)),
        "calc.letterGrade" => Some(handle_letter_grade(state, req)),
        "calc.studentSummary" => Some(handle_student_summary(state, req)),
        "calc.classSummary" => Some(handle_class_summary(state, req)),
        _ => None,
    }
}

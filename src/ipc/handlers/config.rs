use crate::config::CalcConfigPatch;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn effective(state: &AppState) -> serde_json::Value {
    json!({
        "config": state.session_config(),
        "hasOverride": state.config_override.is_some(),
    })
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, effective(state))
}

fn handle_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let patch = match CalcConfigPatch::from_json(Some(&req.params)) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let merged = match &state.config_override {
        Some(existing) => existing.merged(&patch),
        None => patch,
    };
    state.config_override = Some(merged);
    tracing::info!(config = ?state.session_config(), "calc config override set");
    ok(&req.id, effective(state))
}

fn handle_config_clear_override(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.config_override = None;
    tracing::info!("calc config override cleared");
    ok(&req.id, effective(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.config.get" => Some(handle_config_get(state, req)),
        "calc.config.update" => Some(handle_config_update(state, req)),
        "calc.config.clearOverride" => Some(handle_config_clear_override(state, req)),
        _ => None,
    }
}

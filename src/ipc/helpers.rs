use serde::de::DeserializeOwned;

use crate::config::{CalcConfig, CalcConfigPatch};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::Gradebook;

/// Required typed param; the error is a ready-to-send response.
pub fn param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing params.{}", key), None));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("params.{} is invalid: {}", key, e),
            None,
        )
    })
}

/// Session config overlaid with the request's optional `config` object.
pub fn request_config(state: &AppState, req: &Request) -> Result<CalcConfig, serde_json::Value> {
    let patch = CalcConfigPatch::from_json(req.params.get("config"))
        .map_err(|m| err(&req.id, "bad_params", m, None))?;
    Ok(state.session_config().apply(&patch))
}

pub fn loaded_gradebook<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Gradebook, serde_json::Value> {
    state.gradebook.as_ref().ok_or_else(|| {
        err(
            &req.id,
            "no_gradebook",
            "open or set a gradebook first",
            None,
        )
    })
}

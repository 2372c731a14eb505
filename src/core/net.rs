// src/core/net.rs
// Blocking HTTP GET → JSON

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::consts::USER_AGENT;

#[derive(Debug)]
pub enum NetError {
    Transport(reqwest::Error),
    Status(u16),
}

pub fn client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).user_agent(USER_AGENT).build()
}

/// GET `url?query` and decode the body as JSON.
/// Non-2xx is an error, except that a JSON body is still returned for 4xx
/// so callers can read API-level error messages.
pub fn get_json(client: &Client, url: &str, query: &[(&str, &str)]) -> Result<Value, NetError> {
    let resp = client.get(url).query(query).send().map_err(NetError::Transport)?;
    let status = resp.status();

    if status.is_success() {
        return resp.json::<Value>().map_err(NetError::Transport);
    }
    if status.is_client_error() {
        if let Ok(body) = resp.json::<Value>() {
            if body.get("error").is_some() {
                return Ok(body);
            }
        }
    }
    Err(NetError::Status(status.as_u16()))
}

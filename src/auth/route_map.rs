//! Route Authorization Mapper
//! Mission: Translate RPC method identifiers into the (path, verb) pairs rights are keyed on

use anyhow::{bail, Context, Result};
use axum::http::Method;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const GET_ALL_USERS: &str = "/UserService/GetAllUsers";
pub const CREATE_USER: &str = "/UserService/CreateUser";
pub const UPDATE_USER: &str = "/UserService/UpdateUser";
pub const DELETE_USER: &str = "/UserService/DeleteUser";

/// Externally visible identity of an RPC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMapping {
    pub path: String,
    pub verb: Method,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteMapError {
    #[error("invalid route: {0}")]
    InvalidRoute(String),
}

/// Immutable method -> (path, verb) table, built once at start-up
#[derive(Debug, Clone)]
pub struct RouteMap {
    entries: HashMap<String, RouteMapping>,
}

#[derive(Debug, Deserialize)]
struct RouteMapFile {
    routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    method: String,
    path: String,
    verb: String,
}

impl RouteMap {
    /// The user-resource table of the reference deployment
    pub fn reference() -> Self {
        let entries = [
            (GET_ALL_USERS, "/users", Method::GET),
            (CREATE_USER, "/users/user", Method::POST),
            (UPDATE_USER, "/users/user", Method::PUT),
            (DELETE_USER, "/users/user/{user_id}", Method::DELETE),
        ]
        .into_iter()
        .map(|(method, path, verb)| {
            (
                method.to_string(),
                RouteMapping {
                    path: path.to_string(),
                    verb,
                },
            )
        })
        .collect();

        Self { entries }
    }

    /// Parse a TOML table of `[[routes]]` entries
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: RouteMapFile = toml::from_str(raw).context("Failed to parse route map")?;

        let mut entries = HashMap::with_capacity(file.routes.len());
        for entry in file.routes {
            let verb = Method::from_bytes(entry.verb.trim().to_uppercase().as_bytes())
                .with_context(|| format!("Invalid verb '{}' for {}", entry.verb, entry.method))?;

            if entries.contains_key(&entry.method) {
                bail!("Duplicate route map entry for {}", entry.method);
            }
            entries.insert(
                entry.method,
                RouteMapping {
                    path: entry.path,
                    verb,
                },
            );
        }

        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read route map at {}", path.display()))?;
        let map = Self::from_toml_str(&raw)?;
        info!("🗺️  Loaded {} route mappings from {}", map.len(), path.display());
        Ok(map)
    }

    /// Look up an RPC method. A miss is a hard denial, never a pass-through.
    pub fn map_method(&self, rpc_method: &str) -> Result<&RouteMapping, RouteMapError> {
        self.entries
            .get(rpc_method)
            .ok_or_else(|| RouteMapError::InvalidRoute(rpc_method.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct REST paths, used when seeding role rights
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.values().map(|m| m.path.clone()).collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

//! Request bodies and query strings, checked field by field before they reach
//! the hierarchy engine.

use std::collections::HashMap;

use serde::Deserialize;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::database::models::{NewPosition, PositionKind, PositionPatch};
use crate::services::position_service::{check_parent_shape, normalize_name};

pub type FieldErrors = HashMap<String, String>;

/// A request that failed boundary validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRequest {
    pub message: String,
    pub field_errors: FieldErrors,
}

impl InvalidRequest {
    fn from_fields(field_errors: FieldErrors) -> Self {
        Self {
            message: "Validation failed".to_string(),
            field_errors,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePositionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub parent_id: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePositionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub parent_id: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn parse_kind(raw: &str, errors: &mut FieldErrors) -> Option<PositionKind> {
    match raw.parse::<PositionKind>() {
        Ok(kind) => Some(kind),
        Err(_) => {
            let allowed: Vec<_> = PositionKind::ALL.iter().map(|k| k.as_str()).collect();
            errors.insert(
                "type".to_string(),
                format!("Must be one of: {}", allowed.join(", ")),
            );
            None
        }
    }
}

fn parse_uuid(field: &str, raw: &str, errors: &mut FieldErrors) -> Option<Uuid> {
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.insert(field.to_string(), format!("Invalid UUID format: {}", raw));
            None
        }
    }
}

fn check_name(raw: &str, errors: &mut FieldErrors) -> Option<String> {
    match normalize_name(raw) {
        Ok(name) => Some(name),
        Err(err) => {
            errors.insert("name".to_string(), err.to_string());
            None
        }
    }
}

pub fn validate_create(request: CreatePositionRequest) -> Result<NewPosition, InvalidRequest> {
    let mut errors = FieldErrors::new();

    let name = match request.name.as_deref() {
        Some(raw) => check_name(raw, &mut errors),
        None => {
            errors.insert("name".to_string(), "This field is required".to_string());
            None
        }
    };

    let kind = match request.kind.as_deref() {
        Some(raw) => parse_kind(raw, &mut errors),
        None => {
            errors.insert("type".to_string(), "This field is required".to_string());
            None
        }
    };

    let parent_id = request
        .parent_id
        .as_deref()
        .and_then(|raw| parse_uuid("parentId", raw, &mut errors));

    // A root carrying a parent goes to the engine, which checks for an
    // existing root before the shape
    if let Some(kind) = kind.filter(|k| *k != PositionKind::Root) {
        if !errors.contains_key("parentId") {
            if let Err(err) = check_parent_shape(kind, parent_id) {
                errors.insert("parentId".to_string(), err.to_string());
            }
        }
    }

    match (name, kind) {
        (Some(name), Some(kind)) if errors.is_empty() => Ok(NewPosition {
            name,
            description: request.description,
            kind,
            parent_id,
            is_public: request.is_public.unwrap_or(false),
        }),
        _ => Err(InvalidRequest::from_fields(errors)),
    }
}

/// Unsupplied and null fields both leave the stored value alone
pub fn validate_update(request: UpdatePositionRequest) -> Result<PositionPatch, InvalidRequest> {
    let mut errors = FieldErrors::new();

    let name = request
        .name
        .as_deref()
        .and_then(|raw| check_name(raw, &mut errors));
    let kind = request
        .kind
        .as_deref()
        .and_then(|raw| parse_kind(raw, &mut errors));
    let parent_id = request
        .parent_id
        .as_deref()
        .and_then(|raw| parse_uuid("parentId", raw, &mut errors));

    if !errors.is_empty() {
        return Err(InvalidRequest::from_fields(errors));
    }

    Ok(PositionPatch {
        name,
        description: request.description,
        kind,
        parent_id,
        is_public: request.is_public,
    })
}

/// Path segment that must be a position id
pub fn validate_id(raw: &str) -> Result<Uuid, InvalidRequest> {
    let mut errors = FieldErrors::new();
    parse_uuid("id", raw, &mut errors).ok_or_else(|| InvalidRequest::from_fields(errors))
}

/// Resolve `page` and `limit`, applying the configured default and ceiling
pub fn validate_page(query: &PageQuery, api: &ApiConfig) -> Result<(i64, i64), InvalidRequest> {
    let mut errors = FieldErrors::new();

    let page = match query.page.as_deref() {
        None => 1,
        Some(raw) => match raw.parse::<i64>() {
            Ok(page) if page >= 1 => page,
            _ => {
                errors.insert("page".to_string(), "Must be an integer of at least 1".to_string());
                1
            }
        },
    };

    let limit = match query.limit.as_deref() {
        None => api.default_page_limit,
        Some(raw) => match raw.parse::<i64>() {
            Ok(limit) if (1..=api.max_page_limit).contains(&limit) => limit,
            _ => {
                errors.insert(
                    "limit".to_string(),
                    format!("Must be an integer between 1 and {}", api.max_page_limit),
                );
                api.default_page_limit
            }
        },
    };

    if errors.is_empty() {
        Ok((page, limit))
    } else {
        Err(InvalidRequest::from_fields(errors))
    }
}

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::policy::{self, Action};
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::models::{Event, EventPatch, EventPayload};
use crate::repo::event_repo::{EventChanges, EventFilter, EventOrder, EventRepo, NewEvent};
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};
use crate::AppState;

/// Allow-listed query parameters for `GET /api/v1/events/`. Anything
/// else is rejected with a 400 before any query runs.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventListQuery {
    pub time_created_gte: Option<DateTime<Utc>>,
    pub time_created_lte: Option<DateTime<Utc>>,
    pub date_gte: Option<DateTime<Utc>>,
    pub date_lte: Option<DateTime<Utc>>,
    pub organizer_id: Option<Uuid>,
    pub invited_user_id: Option<Uuid>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl EventListQuery {
    fn filter(&self) -> EventFilter {
        EventFilter {
            time_created_gte: self.time_created_gte,
            time_created_lte: self.time_created_lte,
            date_gte: self.date_gte,
            date_lte: self.date_lte,
            organizer_id: self.organizer_id,
            invited_user_id: self.invited_user_id,
            location: self.location.clone(),
            title: self.title.clone(),
            search: self.search.clone(),
        }
    }

    fn order(&self) -> Result<EventOrder, AppError> {
        match &self.ordering {
            Some(raw) => EventOrder::parse(raw),
            None => Ok(EventOrder::default()),
        }
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    Query(query): Query<EventListQuery>,
) -> Result<Response, AppError> {
    policy::check_collection(caller.user(), Action::View)?;
    let order = query.order()?;
    let events = EventRepo::new(&state.pool)
        .list(&query.filter(), order)
        .await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<EventPayload>,
) -> Result<Response, AppError> {
    policy::check_collection(Some(&user), Action::Create)?;
    // organizer is always the caller, never client input
    payload.validate(user.id)?;

    let new = NewEvent {
        title: &payload.title,
        description: &payload.description,
        location: &payload.location,
        date: payload.date,
        organizer: user.id,
        invited_users: &payload.invited_users,
    };
    let event = EventRepo::new(&state.pool).create(&new).await?;
    tracing::info!(event = %event, organizer = %user.id, "Event created");
    Ok(created(event, "Event created"))
}

pub async fn get_event(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    policy::check_collection(caller.user(), Action::View)?;
    let event = fetch_event(&state, id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn update_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<EventPayload>,
) -> Result<Response, AppError> {
    let event = fetch_event(&state, id).await?;
    policy::check_object(&user, Action::Edit, &event)?;
    payload.validate(user.id)?;

    let changes = EventChanges {
        title: Some(&payload.title),
        description: Some(&payload.description),
        location: Some(&payload.location),
        date: Some(payload.date),
        invited_users: Some(&payload.invited_users),
    };
    let updated = EventRepo::new(&state.pool)
        .update(id, &changes)
        .await?
        .ok_or_else(|| event_not_found(id))?;
    Ok(success(updated, "Event updated"))
}

pub async fn patch_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> Result<Response, AppError> {
    let event = fetch_event(&state, id).await?;
    policy::check_object(&user, Action::Edit, &event)?;
    patch.validate(user.id)?;

    let changes = EventChanges {
        title: patch.title.as_deref(),
        description: patch.description.as_deref(),
        location: patch.location.as_deref(),
        date: patch.date,
        invited_users: patch.invited_users.as_deref(),
    };
    let updated = EventRepo::new(&state.pool)
        .update(id, &changes)
        .await?
        .ok_or_else(|| event_not_found(id))?;
    Ok(success(updated, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = fetch_event(&state, id).await?;
    policy::check_object(&user, Action::Delete, &event)?;

    EventRepo::new(&state.pool).delete(id).await?;
    tracing::info!(event = %event, caller = %user.id, "Event deleted");
    Ok(empty_success("Event deleted"))
}

async fn fetch_event(state: &AppState, id: Uuid) -> Result<Event, AppError> {
    EventRepo::new(&state.pool)
        .get(id)
        .await?
        .ok_or_else(|| event_not_found(id))
}

fn event_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Event with id '{}' was not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_maps_onto_filter_fields() {
        let query: EventListQuery = serde_json::from_value(json!({
            "date_gte": "2024-06-01T00:00:00Z",
            "location": "HQ",
            "search": "launch"
        }))
        .unwrap();

        let filter = query.filter();
        assert!(filter.date_gte.is_some());
        assert_eq!(filter.location.as_deref(), Some("HQ"));
        assert_eq!(filter.search.as_deref(), Some("launch"));
        assert!(filter.organizer_id.is_none());
    }

    #[test]
    fn unknown_query_parameters_are_rejected() {
        let result: Result<EventListQuery, _> =
            serde_json::from_value(json!({ "locatoin": "HQ" }));
        assert!(result.is_err());
    }

    #[test]
    fn ordering_parameter_is_validated() {
        let query = EventListQuery {
            ordering: Some("-date".to_string()),
            ..EventListQuery::default()
        };
        assert!(query.order().is_ok());

        let query = EventListQuery {
            ordering: Some("secret_column".to_string()),
            ..EventListQuery::default()
        };
        assert!(query.order().is_err());
    }

    #[test]
    fn absent_ordering_falls_back_to_default() {
        let query = EventListQuery::default();
        assert_eq!(query.order().unwrap(), EventOrder::default());
    }
}

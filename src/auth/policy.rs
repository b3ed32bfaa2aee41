//! Authorization policy, evaluated as two sequential checks: a
//! collection-level authentication check and an object-level organizer
//! check. Safe (read) actions never mutate state and pass the stricter
//! checks unconditionally.

use crate::models::{Event, User};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

impl Action {
    /// Safe actions correspond to HTTP methods that never mutate state.
    pub fn is_safe(self) -> bool {
        matches!(self, Action::View)
    }
}

/// Collection-level check: reads are open, writes require an
/// authenticated caller.
pub fn check_collection(caller: Option<&User>, action: Action) -> Result<(), AppError> {
    if action.is_safe() || caller.is_some() {
        Ok(())
    } else {
        Err(AppError::Auth("authentication required".to_string()))
    }
}

/// Object-level check: only the organizer may mutate a specific event.
pub fn check_object(caller: &User, action: Action, event: &Event) -> Result<(), AppError> {
    if action.is_safe() || caller.id == event.organizer {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "only the organizer may modify this event".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(id: Uuid) -> User {
        User {
            id,
            username: "tester".to_string(),
            email: "tester@example.com".to_string(),
            created_at: Utc::now(),
        }
    }

    fn event(organizer: Uuid) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Launch".to_string(),
            description: "Party".to_string(),
            location: "HQ".to_string(),
            date: Utc::now(),
            organizer,
            invited_users: vec![],
            time_created: Utc::now(),
        }
    }

    #[test]
    fn anonymous_callers_may_read_the_collection() {
        assert!(check_collection(None, Action::View).is_ok());
    }

    #[test]
    fn anonymous_callers_may_not_create() {
        let err = check_collection(None, Action::Create).unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }

    #[test]
    fn authenticated_callers_may_create() {
        let u = user(Uuid::new_v4());
        assert!(check_collection(Some(&u), Action::Create).is_ok());
    }

    #[test]
    fn organizer_may_edit_and_delete() {
        let id = Uuid::new_v4();
        let u = user(id);
        let e = event(id);
        assert!(check_object(&u, Action::Edit, &e).is_ok());
        assert!(check_object(&u, Action::Delete, &e).is_ok());
    }

    #[test]
    fn non_organizer_mutation_is_forbidden_not_missing() {
        let u = user(Uuid::new_v4());
        let e = event(Uuid::new_v4());
        let err = check_object(&u, Action::Delete, &e).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn non_organizer_may_still_view() {
        let u = user(Uuid::new_v4());
        let e = event(Uuid::new_v4());
        assert!(check_object(&u, Action::View, &e).is_ok());
    }
}

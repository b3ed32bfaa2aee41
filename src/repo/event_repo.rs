use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::models::Event;
use crate::utils::error::AppError;

/// Explicit predicate set for event listings. Every populated field adds
/// one conjunctive restriction; an empty filter matches everything.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub time_created_gte: Option<DateTime<Utc>>,
    pub time_created_lte: Option<DateTime<Utc>>,
    pub date_gte: Option<DateTime<Utc>>,
    pub date_lte: Option<DateTime<Utc>>,
    pub organizer_id: Option<Uuid>,
    pub invited_user_id: Option<Uuid>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    TimeCreated,
    Date,
    Title,
    Id,
}

impl SortKey {
    fn column(self) -> &'static str {
        match self {
            SortKey::TimeCreated => "e.time_created",
            SortKey::Date => "e.date",
            SortKey::Title => "e.title",
            SortKey::Id => "e.id",
        }
    }
}

/// Sort order for listings. Parsed from the `ordering` query parameter
/// against an allow-list; unknown keys are a client error and never reach
/// the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOrder {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for EventOrder {
    fn default() -> Self {
        EventOrder {
            key: SortKey::TimeCreated,
            descending: false,
        }
    }
}

impl EventOrder {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let key = match name {
            "time_created" => SortKey::TimeCreated,
            "date" => SortKey::Date,
            "title" => SortKey::Title,
            "id" => SortKey::Id,
            _ => {
                return Err(AppError::field(
                    "ordering",
                    format!("'{}' is not a sortable field", raw),
                ))
            }
        };
        Ok(EventOrder { key, descending })
    }
}

impl EventFilter {
    fn apply(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        if let Some(bound) = self.time_created_gte {
            qb.push(" AND e.time_created >= ").push_bind(bound);
        }
        if let Some(bound) = self.time_created_lte {
            qb.push(" AND e.time_created <= ").push_bind(bound);
        }
        if let Some(bound) = self.date_gte {
            qb.push(" AND e.date >= ").push_bind(bound);
        }
        if let Some(bound) = self.date_lte {
            qb.push(" AND e.date <= ").push_bind(bound);
        }
        if let Some(organizer) = self.organizer_id {
            qb.push(" AND e.organizer_id = ").push_bind(organizer);
        }
        if let Some(invited) = self.invited_user_id {
            qb.push(" AND EXISTS (SELECT 1 FROM event_invited_users m WHERE m.event_id = e.id AND m.user_id = ")
                .push_bind(invited)
                .push(")");
        }
        if let Some(location) = &self.location {
            qb.push(" AND e.location ILIKE ")
                .push_bind(contains_pattern(location));
        }
        if let Some(title) = &self.title {
            qb.push(" AND e.title ILIKE ")
                .push_bind(contains_pattern(title));
        }
        if let Some(search) = &self.search {
            qb.push(" AND e.title ILIKE ")
                .push_bind(contains_pattern(search));
        }
    }
}

/// `%needle%` with LIKE metacharacters in the needle escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

const SELECT_EVENTS: &str = "SELECT e.id, e.title, e.description, e.location, e.date, \
     e.organizer_id AS organizer, e.time_created, \
     coalesce(array_agg(iu.user_id) FILTER (WHERE iu.user_id IS NOT NULL), '{}') AS invited_users \
     FROM events e \
     LEFT JOIN event_invited_users iu ON iu.event_id = e.id \
     WHERE TRUE";

fn list_query(filter: &EventFilter, order: EventOrder) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(SELECT_EVENTS);
    filter.apply(&mut qb);
    qb.push(" GROUP BY e.id ORDER BY ");
    qb.push(order.key.column());
    qb.push(if order.descending { " DESC" } else { " ASC" });
    qb
}

/// Event row without the aggregated invited-users column, as returned by
/// INSERT/UPDATE ... RETURNING.
#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    description: String,
    location: String,
    date: DateTime<Utc>,
    organizer: Uuid,
    time_created: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self, invited_users: Vec<Uuid>) -> Event {
        Event {
            id: self.id,
            title: self.title,
            description: self.description,
            location: self.location,
            date: self.date,
            organizer: self.organizer,
            invited_users,
            time_created: self.time_created,
        }
    }
}

pub struct NewEvent<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub date: DateTime<Utc>,
    pub organizer: Uuid,
    pub invited_users: &'a [Uuid],
}

/// Partial change set; `None` leaves the column untouched.
#[derive(Default)]
pub struct EventChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub location: Option<&'a str>,
    pub date: Option<DateTime<Utc>>,
    pub invited_users: Option<&'a [Uuid]>,
}

pub struct EventRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> EventRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &EventFilter,
        order: EventOrder,
    ) -> Result<Vec<Event>, AppError> {
        let mut qb = list_query(filter, order);
        let events = qb
            .build_query_as::<Event>()
            .fetch_all(self.pool)
            .await?;
        Ok(events)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT e.id, e.title, e.description, e.location, e.date, \
             e.organizer_id AS organizer, e.time_created, \
             coalesce(array_agg(iu.user_id) FILTER (WHERE iu.user_id IS NOT NULL), '{}') AS invited_users \
             FROM events e \
             LEFT JOIN event_invited_users iu ON iu.event_id = e.id \
             WHERE e.id = $1 \
             GROUP BY e.id",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(event)
    }

    /// Inserts the event row and its invited-user links in one
    /// transaction; either everything is written or nothing is.
    pub async fn create(&self, new: &NewEvent<'_>) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, EventRow>(
            "INSERT INTO events (title, description, location, date, organizer_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, title, description, location, date, organizer_id AS organizer, time_created",
        )
        .bind(new.title)
        .bind(new.description)
        .bind(new.location)
        .bind(new.date)
        .bind(new.organizer)
        .fetch_one(&mut *tx)
        .await?;

        insert_invited(&mut tx, row.id, new.invited_users).await?;
        tx.commit().await?;

        Ok(row.into_event(new.invited_users.to_vec()))
    }

    /// Applies a change set; returns `None` when the event no longer
    /// exists. Replaces the invited-user set only when one is supplied.
    pub async fn update(
        &self,
        id: Uuid,
        changes: &EventChanges<'_>,
    ) -> Result<Option<Event>, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, EventRow>(
            "UPDATE events SET \
             title = coalesce($2, title), \
             description = coalesce($3, description), \
             location = coalesce($4, location), \
             date = coalesce($5, date) \
             WHERE id = $1 \
             RETURNING id, title, description, location, date, organizer_id AS organizer, time_created",
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.location)
        .bind(changes.date)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let invited = match changes.invited_users {
            Some(users) => {
                sqlx::query("DELETE FROM event_invited_users WHERE event_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                insert_invited(&mut tx, id, users).await?;
                users.to_vec()
            }
            None => {
                sqlx::query_scalar("SELECT user_id FROM event_invited_users WHERE event_id = $1")
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;
        Ok(Some(row.into_event(invited)))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn insert_invited(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    users: &[Uuid],
) -> Result<(), AppError> {
    if users.is_empty() {
        return Ok(());
    }
    sqlx::query("INSERT INTO event_invited_users (event_id, user_id) SELECT $1, unnest($2::uuid[])")
        .bind(event_id)
        .bind(users.to_vec())
        .execute(&mut **tx)
        .await
        .map_err(map_invited_error)?;
    Ok(())
}

/// An unknown invited-user id violates the join table's foreign key;
/// surface that as a validation error rather than a 500.
fn map_invited_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23503") {
            return AppError::field("invited_users", "one or more invited users do not exist");
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_is_time_created_ascending() {
        let order = EventOrder::default();
        assert_eq!(order.key, SortKey::TimeCreated);
        assert!(!order.descending);
    }

    #[test]
    fn ordering_parses_allowed_keys() {
        let order = EventOrder::parse("date").unwrap();
        assert_eq!(order.key, SortKey::Date);
        assert!(!order.descending);

        let order = EventOrder::parse("-date").unwrap();
        assert_eq!(order.key, SortKey::Date);
        assert!(order.descending);

        assert!(EventOrder::parse("title").is_ok());
        assert!(EventOrder::parse("-time_created").is_ok());
        assert!(EventOrder::parse("id").is_ok());
    }

    #[test]
    fn unknown_ordering_keys_are_rejected() {
        for raw in ["organizer", "password", "e.title; DROP TABLE events", ""] {
            let err = EventOrder::parse(raw).unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "{:?}", raw);
        }
    }

    #[test]
    fn empty_filter_adds_no_predicates() {
        let qb = list_query(&EventFilter::default(), EventOrder::default());
        let sql = qb.into_sql();
        assert!(!sql.contains('$'));
        assert!(sql.ends_with("GROUP BY e.id ORDER BY e.time_created ASC"));
    }

    #[test]
    fn populated_filter_binds_each_predicate() {
        let filter = EventFilter {
            date_gte: Some(Utc::now()),
            organizer_id: Some(Uuid::new_v4()),
            location: Some("HQ".to_string()),
            ..EventFilter::default()
        };
        let sql = list_query(&filter, EventOrder::default()).into_sql();
        assert!(sql.contains("e.date >= $1"));
        assert!(sql.contains("e.organizer_id = $2"));
        assert!(sql.contains("e.location ILIKE $3"));
    }

    #[test]
    fn invited_user_filter_uses_membership_subquery() {
        let filter = EventFilter {
            invited_user_id: Some(Uuid::new_v4()),
            ..EventFilter::default()
        };
        let sql = list_query(&filter, EventOrder::default()).into_sql();
        assert!(sql.contains("EXISTS (SELECT 1 FROM event_invited_users"));
    }

    #[test]
    fn descending_order_is_rendered() {
        let order = EventOrder::parse("-date").unwrap();
        let sql = list_query(&EventFilter::default(), order).into_sql();
        assert!(sql.ends_with("ORDER BY e.date DESC"));
    }

    #[test]
    fn contains_pattern_escapes_like_metacharacters() {
        assert_eq!(contains_pattern("foo"), "%foo%");
        assert_eq!(contains_pattern("50%"), "%50\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("back\\slash"), "%back\\\\slash%");
    }
}

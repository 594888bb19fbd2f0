//! In-memory stand-ins for the Postgres repositories, plus state builders.
use std::{cmp::Ordering, collections::HashMap, sync::Arc, sync::Mutex};

use axum::async_trait;
use serde::Serialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{
        password::Hasher,
        repo::UserRepo,
        repo_types::{NewUser, Role, User, UserChanges, UserLookup, DEFAULT_PHOTO},
    },
    clock::ManualClock,
    config::AppConfig,
    error::{AppError, AppResult},
    mail::RecordingMailer,
    query::{CmpOp, Direction, FilterValue, Predicate, QueryDescriptor},
    state::AppState,
    tours::{
        repo::TourRepo,
        repo_types::{duration_weeks, NewTour, Tour},
    },
};

pub fn sample_user(role: Role, active: bool) -> User {
    User {
        id: Uuid::new_v4(),
        name: "Test User".into(),
        email: format!("{}@example.com", Uuid::new_v4().simple()),
        photo: DEFAULT_PHOTO.into(),
        role,
        password_hash: String::new(),
        password_changed_at: None,
        password_reset_token: None,
        password_reset_expires: None,
        active,
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

fn ordering(field: &Value, value: &FilterValue) -> Option<Ordering> {
    match (field, value) {
        (Value::String(s), FilterValue::Text(t)) => Some(s.as_str().cmp(t.as_str())),
        (Value::Number(n), FilterValue::Number(x)) => n.as_f64()?.partial_cmp(x),
        (Value::Bool(b), FilterValue::Bool(x)) => Some(b.cmp(x)),
        (Value::String(s), FilterValue::Timestamp(t)) => Some(OffsetDateTime::parse(s, &Rfc3339).ok()?.cmp(t)),
        (Value::String(s), FilterValue::Id(id)) => Some(Uuid::parse_str(s).ok()?.cmp(id)),
        _ => None,
    }
}

fn matches(record: &Value, p: &Predicate) -> bool {
    let Some(ord) = record.get(p.field).and_then(|f| ordering(f, &p.value)) else {
        return false;
    };
    match p.op {
        CmpOp::Eq => ord.is_eq(),
        CmpOp::Gt => ord.is_gt(),
        CmpOp::Gte => ord.is_ge(),
        CmpOp::Lt => ord.is_lt(),
        CmpOp::Lte => ord.is_le(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Filters, sorts and pages records through their JSON form, the way the
/// SQL rendering does in the database.
pub fn apply<T: Serialize>(items: Vec<T>, d: &QueryDescriptor) -> (Vec<T>, u64) {
    let mut rows: Vec<(Value, T)> = items
        .into_iter()
        .map(|t| (serde_json::to_value(&t).unwrap(), t))
        .filter(|(v, _)| d.predicates.iter().all(|p| matches(v, p)))
        .collect();
    let total = rows.len() as u64;
    rows.sort_by(|(a, _), (b, _)| {
        d.sort
            .iter()
            .map(|k| {
                let o = compare_values(
                    a.get(k.field).unwrap_or(&Value::Null),
                    b.get(k.field).unwrap_or(&Value::Null),
                );
                match k.direction {
                    Direction::Asc => o,
                    Direction::Desc => o.reverse(),
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    let page = rows
        .into_iter()
        .skip(d.page.skip as usize)
        .take(d.page.limit as usize)
        .map(|(_, t)| t)
        .collect();
    (page, total)
}

#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUsers {
    pub fn get(&self, id: Uuid) -> Option<User> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn remove(&self, id: Uuid) {
        self.rows.lock().unwrap().remove(&id);
    }

    pub fn set_role(&self, id: Uuid, role: Role) {
        if let Some(u) = self.rows.lock().unwrap().get_mut(&id) {
            u.role = role;
        }
    }
}

#[async_trait]
impl UserRepo for MemoryUsers {
    async fn find_by(&self, lookup: &UserLookup) -> AppResult<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .find(|u| match lookup {
                UserLookup::Id(id) => u.id == *id,
                UserLookup::Email(email) => u.email == *email,
                UserLookup::ResetToken(hash) => u.password_reset_token.as_deref() == Some(hash.as_str()),
            })
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            photo: DEFAULT_PHOTO.into(),
            role: user.role,
            password_hash: user.password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: user.created_at,
        };
        rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_fields(&self, id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(email) = &changes.email {
            if rows.values().any(|u| u.id != id && u.email == *email) {
                return Err(AppError::Conflict("Email already registered".into()));
            }
        }
        let Some(user) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(at) = changes.password_changed_at {
            user.password_changed_at = Some(at);
        }
        match changes.password_reset {
            Some(Some((token, expires))) => {
                user.password_reset_token = Some(token);
                user.password_reset_expires = Some(expires);
            }
            Some(None) => {
                user.password_reset_token = None;
                user.password_reset_expires = None;
            }
            None => {}
        }
        if let Some(active) = changes.active {
            user.active = active;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(Some(user.clone()))
    }

    async fn list(&self, scope: &QueryDescriptor) -> AppResult<(Vec<User>, u64)> {
        let active: Vec<User> = self.rows.lock().unwrap().values().filter(|u| u.active).cloned().collect();
        Ok(apply(active, scope))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryTours {
    rows: Mutex<HashMap<Uuid, Tour>>,
}

impl MemoryTours {
    pub fn get(&self, id: Uuid) -> Option<Tour> {
        self.rows.lock().unwrap().get(&id).cloned()
    }
}

fn tour_from(id: Uuid, t: NewTour, created_at: OffsetDateTime) -> Tour {
    Tour {
        id,
        name: t.name,
        slug: t.slug,
        duration: t.duration,
        duration_weeks: duration_weeks(t.duration),
        max_group_size: t.max_group_size,
        difficulty: t.difficulty,
        ratings_average: t.ratings_average,
        ratings_quantity: t.ratings_quantity,
        price: t.price,
        price_discount: t.price_discount,
        summary: t.summary,
        description: t.description,
        image_cover: t.image_cover,
        images: t.images,
        start_dates: t.start_dates,
        secret_tour: t.secret_tour,
        created_at,
    }
}

#[async_trait]
impl TourRepo for MemoryTours {
    async fn list(&self, scope: &QueryDescriptor) -> AppResult<(Vec<Tour>, u64)> {
        let public: Vec<Tour> =
            self.rows.lock().unwrap().values().filter(|t| !t.secret_tour).cloned().collect();
        Ok(apply(public, scope))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Tour>> {
        Ok(self.get(id))
    }

    async fn insert(&self, tour: NewTour, created_at: OffsetDateTime) -> AppResult<Tour> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|t| t.name == tour.name) {
            return Err(AppError::Conflict("A tour with this name already exists".into()));
        }
        let tour = tour_from(Uuid::new_v4(), tour, created_at);
        rows.insert(tour.id, tour.clone());
        Ok(tour)
    }

    async fn update(&self, id: Uuid, tour: NewTour) -> AppResult<Option<Tour>> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|t| t.id != id && t.name == tour.name) {
            return Err(AppError::Conflict("A tour with this name already exists".into()));
        }
        let Some(created_at) = rows.get(&id).map(|t| t.created_at) else {
            return Ok(None);
        };
        let tour = tour_from(id, tour, created_at);
        rows.insert(id, tour.clone());
        Ok(Some(tour))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}

pub fn test_state(users: Arc<MemoryUsers>, mailer: Arc<RecordingMailer>, clock: Arc<ManualClock>) -> AppState {
    let config = AppConfig::for_tests();
    let hasher = Hasher::new(&config.hash).unwrap();
    AppState {
        config: Arc::new(config),
        users,
        tours: Arc::new(MemoryTours::default()),
        mailer,
        clock,
        hasher,
    }
}

/// A full in-memory application state with handles on every fake.
pub struct Harness {
    pub state: AppState,
    pub users: Arc<MemoryUsers>,
    pub tours: Arc<MemoryTours>,
    pub mailer: Arc<RecordingMailer>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUsers::default());
        let tours = Arc::new(MemoryTours::default());
        let mailer = Arc::new(RecordingMailer::default());
        let clock = Arc::new(ManualClock::new());
        let mut state = test_state(users.clone(), mailer.clone(), clock.clone());
        state.tours = tours.clone();
        Self { state, users, tours, mailer, clock }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::query::{FieldKind, FieldSpec, QueryScope};

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("name", "name", FieldKind::Text),
        FieldSpec::new("role", "role", FieldKind::Text),
    ];
    const SCOPE: QueryScope =
        QueryScope::new(FIELDS, FieldSpec::new("id", "id", FieldKind::Id), &[("name", Direction::Asc)]);

    #[tokio::test]
    async fn memory_list_filters_sorts_and_pages() {
        let users = MemoryUsers::default();
        for name in ["Cara", "Abe", "Bo"] {
            let mut u = sample_user(Role::Guide, true);
            u.name = name.into();
            users.rows.lock().unwrap().insert(u.id, u);
        }
        let hidden = sample_user(Role::Guide, false);
        users.rows.lock().unwrap().insert(hidden.id, hidden);

        let raw: HashMap<String, String> =
            [("role", "guide"), ("limit", "2")].iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let (page, total) = users.list(&SCOPE.build(&raw).unwrap()).await.unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = page.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Abe", "Bo"]);
    }
}

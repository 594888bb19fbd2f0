//! Turns list-endpoint query strings into a validated [`QueryDescriptor`].
//!
//! A [`QueryScope`] is declared once per resource and names the fields a client
//! may filter, sort and project on. Building is pure; the repositories consume
//! the descriptor (see [`sql`]).

pub mod sql;

use std::collections::HashMap;

use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const DEFAULT_LIMIT: u64 = 100;
pub const MAX_LIMIT: u64 = 1000;

const RESERVED: [&str; 4] = ["sort", "fields", "page", "limit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Timestamp,
    Id,
}

/// A client-visible field and the storage column behind it.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "eq" => Ok(CmpOp::Eq),
            "gt" => Ok(CmpOp::Gt),
            "gte" => Ok(CmpOp::Gte),
            "lt" => Ok(CmpOp::Lt),
            "lte" => Ok(CmpOp::Lte),
            other => Err(AppError::validation(format!("Unsupported operator: {other}"))),
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => " = ",
            CmpOp::Gt => " > ",
            CmpOp::Gte => " >= ",
            CmpOp::Lt => " < ",
            CmpOp::Lte => " <= ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(OffsetDateTime),
    Id(Uuid),
}

impl FilterValue {
    fn parse(raw: &str, field: &FieldSpec) -> AppResult<Self> {
        let bad = || AppError::validation(format!("Invalid value for {}: {raw}", field.name));
        match field.kind {
            FieldKind::Text => Ok(FilterValue::Text(raw.to_string())),
            FieldKind::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FilterValue::Number)
                .ok_or_else(bad),
            FieldKind::Bool => raw.parse::<bool>().map(FilterValue::Bool).map_err(|_| bad()),
            FieldKind::Timestamp => OffsetDateTime::parse(raw, &Rfc3339)
                .map(FilterValue::Timestamp)
                .map_err(|_| bad()),
            FieldKind::Id => Uuid::parse_str(raw).map(FilterValue::Id).map_err(|_| bad()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: &'static str,
    pub column: &'static str,
    pub op: CmpOp,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub column: &'static str,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Include(Vec<&'static str>),
    Exclude(Vec<&'static str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
    pub skip: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub page: Page,
    identity: &'static str,
    strict: bool,
}

impl QueryDescriptor {
    /// In strict mode a page past the end is an error rather than an empty list.
    pub fn ensure_page_exists(&self, total: u64) -> AppResult<()> {
        if self.strict && self.page.page > 1 && self.page.skip >= total {
            return Err(AppError::NotFound("This page does not exist".into()));
        }
        Ok(())
    }

    /// Applies the field projection to one serialized record.
    pub fn project(&self, record: Value) -> Value {
        let Value::Object(mut map) = record else {
            return record;
        };
        match &self.projection {
            Projection::All => {}
            Projection::Include(keep) => {
                map.retain(|k, _| k == self.identity || keep.iter().any(|f| f == k));
            }
            Projection::Exclude(drop) => {
                map.retain(|k, _| !drop.iter().any(|f| f == k));
            }
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone)]
pub struct QueryScope {
    fields: &'static [FieldSpec],
    identity: FieldSpec,
    default_sort: &'static [(&'static str, Direction)],
    strict: bool,
}

impl QueryScope {
    pub const fn new(
        fields: &'static [FieldSpec],
        identity: FieldSpec,
        default_sort: &'static [(&'static str, Direction)],
    ) -> Self {
        Self { fields, identity, default_sort, strict: false }
    }

    pub const fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    fn field(&self, name: &str) -> AppResult<&FieldSpec> {
        if name == self.identity.name {
            return Ok(&self.identity);
        }
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| AppError::validation(format!("Unknown field: {name}")))
    }

    pub fn build(&self, raw: &HashMap<String, String>) -> AppResult<QueryDescriptor> {
        let mut predicates = Vec::new();
        // Sorted so the predicate order, and the SQL built from it, is deterministic.
        let mut keys: Vec<&String> = raw.keys().collect();
        keys.sort();
        for key in keys {
            if RESERVED.contains(&key.as_str()) {
                continue;
            }
            predicates.push(self.predicate(key, &raw[key])?);
        }

        Ok(QueryDescriptor {
            predicates,
            sort: self.sort(raw.get("sort").map(String::as_str))?,
            projection: self.projection(raw.get("fields").map(String::as_str))?,
            page: paginate(raw.get("page").map(String::as_str), raw.get("limit").map(String::as_str))?,
            identity: self.identity.name,
            strict: self.strict,
        })
    }

    fn predicate(&self, key: &str, raw_value: &str) -> AppResult<Predicate> {
        let (name, key_op) = split_bracket(key)?;
        let (value_op, value) = split_brace(raw_value)?;
        let op = match (key_op, value_op) {
            (Some(_), Some(_)) => {
                return Err(AppError::validation(format!("Operator given twice for {name}")))
            }
            (Some(op), None) | (None, Some(op)) => CmpOp::parse(op)?,
            (None, None) => CmpOp::Eq,
        };
        let spec = self.field(name)?;
        Ok(Predicate {
            field: spec.name,
            column: spec.column,
            op,
            value: FilterValue::parse(value, spec)?,
        })
    }

    fn sort(&self, raw: Option<&str>) -> AppResult<Vec<SortKey>> {
        let mut keys = Vec::new();
        match raw.filter(|s| !s.trim().is_empty()) {
            Some(list) => {
                for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let (name, direction) = match part.strip_prefix('-') {
                        Some(rest) => (rest, Direction::Desc),
                        None => (part, Direction::Asc),
                    };
                    let spec = self.field(name)?;
                    keys.push(SortKey { field: spec.name, column: spec.column, direction });
                }
            }
            None => {
                for (name, direction) in self.default_sort {
                    let spec = self.field(name)?;
                    keys.push(SortKey { field: spec.name, column: spec.column, direction: *direction });
                }
                if !keys.iter().any(|k| k.field == self.identity.name) {
                    keys.push(SortKey {
                        field: self.identity.name,
                        column: self.identity.column,
                        direction: Direction::Asc,
                    });
                }
            }
        }
        Ok(keys)
    }

    fn projection(&self, raw: Option<&str>) -> AppResult<Projection> {
        let Some(list) = raw.filter(|s| !s.trim().is_empty()) else {
            return Ok(Projection::All);
        };
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.strip_prefix('-') {
                Some(name) => {
                    let spec = self.field(name)?;
                    if spec.name == self.identity.name {
                        return Err(AppError::validation("The id field cannot be excluded"));
                    }
                    exclude.push(spec.name);
                }
                None => include.push(self.field(part)?.name),
            }
        }
        match (include.is_empty(), exclude.is_empty()) {
            (false, false) => Err(AppError::validation("Cannot mix included and excluded fields")),
            (false, true) => Ok(Projection::Include(include)),
            (true, false) => Ok(Projection::Exclude(exclude)),
            (true, true) => Ok(Projection::All),
        }
    }
}

fn paginate(page: Option<&str>, limit: Option<&str>) -> AppResult<Page> {
    let page = positive(page, "page")?.unwrap_or(1);
    let limit = positive(limit, "limit")?.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    // OFFSET is a signed BIGINT in Postgres.
    let skip = (page - 1)
        .checked_mul(limit)
        .filter(|skip| i64::try_from(*skip).is_ok())
        .ok_or_else(|| AppError::validation("page is too large"))?;
    Ok(Page { page, limit, skip })
}

fn positive(raw: Option<&str>, name: &str) -> AppResult<Option<u64>> {
    match raw {
        None => Ok(None),
        Some(v) => match v.trim().parse::<u64>() {
            Ok(n) if n >= 1 => Ok(Some(n)),
            _ => Err(AppError::validation(format!("{name} must be a positive integer"))),
        },
    }
}

/// `price[gte]` -> ("price", Some("gte"))
fn split_bracket(key: &str) -> AppResult<(&str, Option<&str>)> {
    match key.split_once('[') {
        None => Ok((key, None)),
        Some((name, rest)) => match rest.strip_suffix(']') {
            Some(op) if !op.contains(['[', ']']) => Ok((name, Some(op))),
            _ => Err(AppError::validation(format!("Malformed filter key: {key}"))),
        },
    }
}

/// `{gte}500` -> (Some("gte"), "500")
fn split_brace(value: &str) -> AppResult<(Option<&str>, &str)> {
    match value.strip_prefix('{') {
        None => Ok((None, value)),
        Some(rest) => rest
            .split_once('}')
            .map(|(op, v)| (Some(op), v))
            .ok_or_else(|| AppError::validation(format!("Malformed filter value: {value}"))),
    }
}

//! Postgres rendering of a [`QueryDescriptor`].
//!
//! Only columns taken from a `QueryScope` whitelist reach the SQL text; every
//! client value is bound.
use sqlx::{Postgres, QueryBuilder};

use super::{Direction, FilterValue, QueryDescriptor};

/// `select` is the `SELECT ... FROM table` head, `base` a fixed condition
/// the client cannot lift (e.g. hiding secret tours).
pub fn select_page(select: &str, base: &str, d: &QueryDescriptor) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(select);
    push_where(&mut qb, base, d);
    qb.push(" ORDER BY ");
    let mut order = qb.separated(", ");
    for key in &d.sort {
        order.push(key.column);
        order.push_unseparated(match key.direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
    }
    qb.push(" LIMIT ")
        .push_bind(i64::try_from(d.page.limit).unwrap_or(i64::MAX))
        .push(" OFFSET ")
        .push_bind(i64::try_from(d.page.skip).unwrap_or(i64::MAX));
    qb
}

pub fn count(table: &str, base: &str, d: &QueryDescriptor) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table}"));
    push_where(&mut qb, base, d);
    qb
}

fn push_where(qb: &mut QueryBuilder<'static, Postgres>, base: &str, d: &QueryDescriptor) {
    qb.push(" WHERE ").push(base);
    for p in &d.predicates {
        qb.push(" AND ").push(p.column).push(p.op.sql());
        match &p.value {
            FilterValue::Text(s) => qb.push_bind(s.clone()),
            FilterValue::Number(n) => qb.push_bind(*n),
            FilterValue::Bool(b) => qb.push_bind(*b),
            FilterValue::Timestamp(t) => qb.push_bind(*t),
            FilterValue::Id(id) => qb.push_bind(*id),
        };
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::query::{FieldKind, FieldSpec, QueryScope};

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("price", "price", FieldKind::Number),
        FieldSpec::new("name", "name", FieldKind::Text),
        FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp),
    ];
    const SCOPE: QueryScope = QueryScope::new(
        FIELDS,
        FieldSpec::new("id", "id", FieldKind::Id),
        &[("createdAt", Direction::Desc)],
    );

    fn build(pairs: &[(&str, &str)]) -> QueryDescriptor {
        let raw: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        SCOPE.build(&raw).unwrap()
    }

    #[test]
    fn renders_filters_order_and_page() {
        let d = build(&[("price[gte]", "500"), ("name", "x"), ("sort", "-price,name"), ("page", "2"), ("limit", "10")]);
        let qb = select_page("SELECT * FROM tours", "secret_tour = FALSE", &d);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM tours WHERE secret_tour = FALSE AND name = $1 AND price >= $2 \
             ORDER BY price DESC, name ASC LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn default_order_has_tiebreaker() {
        let qb = select_page("SELECT * FROM tours", "TRUE", &build(&[]));
        assert_eq!(
            qb.sql(),
            "SELECT * FROM tours WHERE TRUE ORDER BY created_at DESC, id ASC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn client_text_never_reaches_sql() {
        let d = build(&[("name", "'; DROP TABLE users; --")]);
        let qb = count("tours", "TRUE", &d);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM tours WHERE TRUE AND name = $1");
    }
}

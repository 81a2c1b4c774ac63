//! Filtros de consulta
//! 
//! Un `FilterSet` es el mapa columna → restricción que recibe cada `get_all`.
//! Se traduce a parámetros estilo PostgREST (`status=eq.active`) para la
//! plataforma remota y se evalúa localmente en la plataforma en memoria.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::utils::errors::{validation_error, AppResult};

/// Restricción sobre una columna
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "lowercase")]
pub enum Filter {
    Eq(Value),
    Neq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    /// Patrón con `*` como comodín, sin distinguir mayúsculas
    ILike(String),
    IsNull,
}

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl Filter {
    pub fn eq<T: Serialize>(value: T) -> Self {
        Filter::Eq(to_json(value))
    }

    pub fn neq<T: Serialize>(value: T) -> Self {
        Filter::Neq(to_json(value))
    }

    pub fn gt<T: Serialize>(value: T) -> Self {
        Filter::Gt(to_json(value))
    }

    pub fn gte<T: Serialize>(value: T) -> Self {
        Filter::Gte(to_json(value))
    }

    pub fn lt<T: Serialize>(value: T) -> Self {
        Filter::Lt(to_json(value))
    }

    pub fn lte<T: Serialize>(value: T) -> Self {
        Filter::Lte(to_json(value))
    }

    pub fn one_of<T: Serialize>(values: impl IntoIterator<Item = T>) -> Self {
        Filter::In(values.into_iter().map(to_json).collect())
    }

    pub fn ilike(pattern: impl Into<String>) -> Self {
        Filter::ILike(pattern.into())
    }

    /// Valor del parámetro PostgREST (`eq.active`, `in.(a,b)`, `is.null`)
    pub fn to_postgrest(&self) -> String {
        match self {
            Filter::Eq(v) => format!("eq.{}", render_value(v)),
            Filter::Neq(v) => format!("neq.{}", render_value(v)),
            Filter::Gt(v) => format!("gt.{}", render_value(v)),
            Filter::Gte(v) => format!("gte.{}", render_value(v)),
            Filter::Lt(v) => format!("lt.{}", render_value(v)),
            Filter::Lte(v) => format!("lte.{}", render_value(v)),
            Filter::In(values) => {
                let items: Vec<String> = values.iter().map(render_list_item).collect();
                format!("in.({})", items.join(","))
            }
            Filter::ILike(pattern) => format!("ilike.{}", pattern),
            Filter::IsNull => "is.null".to_string(),
        }
    }

    /// Evaluar la restricción sobre el valor de una columna
    pub fn matches(&self, field: Option<&Value>) -> bool {
        let field = match field {
            Some(Value::Null) | None => {
                return matches!(self, Filter::IsNull);
            }
            Some(v) => v,
        };

        match self {
            Filter::Eq(v) => values_equal(field, v),
            Filter::Neq(v) => !values_equal(field, v),
            Filter::Gt(v) => compare_values(field, v) == Some(Ordering::Greater),
            Filter::Gte(v) => matches!(compare_values(field, v), Some(Ordering::Greater | Ordering::Equal)),
            Filter::Lt(v) => compare_values(field, v) == Some(Ordering::Less),
            Filter::Lte(v) => matches!(compare_values(field, v), Some(Ordering::Less | Ordering::Equal)),
            Filter::In(values) => values.iter().any(|v| values_equal(field, v)),
            Filter::ILike(pattern) => match field {
                Value::String(s) => ilike_regex(pattern).map(|re| re.is_match(s)).unwrap_or(false),
                _ => false,
            },
            Filter::IsNull => false,
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn render_list_item(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains(',') || s.contains('(') || s.contains(')') => {
            format!("\"{}\"", s.replace('"', "\\\""))
        }
        other => render_value(other),
    }
}

fn ilike_regex(pattern: &str) -> Option<Regex> {
    let body: Vec<String> = pattern.split('*').map(regex::escape).collect();
    Regex::new(&format!("(?i)^{}$", body.join(".*"))).ok()
}

/// Igualdad tolerante: números por valor, resto por representación
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::String(y)) | (Value::String(y), Value::Number(x)) => {
            y.parse::<f64>().ok() == x.as_f64()
        }
        _ => a == b,
    }
}

/// Orden entre valores de columna. Las fechas ISO se comparan como texto.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Fecha límite `today + days` para las ventanas de vencimiento
pub fn window_end(today: NaiveDate, days: i64) -> AppResult<NaiveDate> {
    Duration::try_days(days)
        .and_then(|delta| today.checked_add_signed(delta))
        .ok_or_else(|| validation_error("days", "window exceeds the supported date range"))
}

/// Conjunto de filtros, ordenado para que la huella sea estable
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterSet {
    filters: BTreeMap<String, Vec<Filter>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Añadir una restricción (estilo builder)
    pub fn with(mut self, column: impl Into<String>, filter: Filter) -> Self {
        self.push(column, filter);
        self
    }

    /// Añadir una restricción si hay valor
    pub fn with_opt<T>(self, column: &str, value: Option<T>, filter: impl FnOnce(T) -> Filter) -> Self {
        match value {
            Some(v) => self.with(column, filter(v)),
            None => self,
        }
    }

    pub fn push(&mut self, column: impl Into<String>, filter: Filter) {
        let entry = self.filters.entry(column.into()).or_default();
        if !entry.contains(&filter) {
            entry.push(filter);
            entry.sort_by_key(Filter::to_postgrest);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Filter)> {
        self.filters
            .iter()
            .flat_map(|(column, filters)| filters.iter().map(move |f| (column.as_str(), f)))
    }

    /// Unir otro conjunto (se acumulan las restricciones por columna)
    pub fn merged(mut self, other: &FilterSet) -> Self {
        for (column, filter) in other.iter() {
            self.push(column, filter.clone());
        }
        self
    }

    /// Evaluar todas las restricciones sobre una fila JSON
    pub fn matches(&self, row: &Value) -> bool {
        self.iter().all(|(column, filter)| filter.matches(row.get(column)))
    }

    /// Parámetros de query PostgREST
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(column, filter)| (column.to_string(), filter.to_postgrest()))
            .collect()
    }

    /// Huella MD5 del contenido canónico; identifica la consulta en la caché
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(&self.filters).unwrap_or_default();
        format!("{:x}", md5::compute(canonical.as_bytes()))
    }
}

/// Orden de resultados
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), ascending: true }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), ascending: false }
    }

    pub fn to_postgrest(&self) -> String {
        let direction = if self.ascending { "asc" } else { "desc" };
        format!("{}.{}", self.column, direction)
    }
}

/// Consulta completa sobre una tabla
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub filters: FilterSet,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl TableQuery {
    pub fn new(filters: FilterSet) -> Self {
        Self { filters, order: None, limit: None }
    }

    pub fn order_by(mut self, order: Option<OrderBy>) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(self.filters.to_query_pairs());
        if let Some(order) = &self.order {
            pairs.push(("order".to_string(), order.to_postgrest()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

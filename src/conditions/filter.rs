//! Generic condition builder shared by the request wrappers
//!
//! `Filter` accumulates predicate fragments in append order and is
//! fail-fast: the first bad input (blank field, unresolvable reference,
//! null where a value is required) is recorded and surfaced by
//! `build()`; later calls keep chaining but add nothing.

use crate::conditions::expr::{BoolOp, CmpOp, Expr, FilterValue, LikeKind};
use crate::error::{MapperError, Result};
use crate::schema::entity::{Entity, FieldKey};
use crate::schema::registry::SchemaRegistry;
use std::marker::PhantomData;
use std::sync::Arc;

/// Predicate accumulator for entity type `E`
pub struct Filter<E: Entity> {
    registry: Arc<SchemaRegistry>,
    filters: Vec<Expr>,
    text_matches: Vec<Expr>,
    error: Option<MapperError>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Filter<E> {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            filters: Vec::new(),
            text_matches: Vec::new(),
            error: None,
            _marker: PhantomData,
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.text_matches.is_empty()
    }

    pub(crate) fn record_error(&mut self, err: MapperError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Resolve a field key, recording a failure instead of returning it
    pub(crate) fn resolve(&mut self, field: impl FieldKey<E>) -> Option<String> {
        match field.resolve(&self.registry) {
            Ok(column) => Some(column),
            Err(err) => {
                self.record_error(err);
                None
            }
        }
    }

    fn require_value(&mut self, value: FilterValue, context: &str) -> Option<FilterValue> {
        if value.is_null() {
            self.record_error(MapperError::Validation(format!(
                "{context} requires a non-null value"
            )));
            return None;
        }
        Some(value)
    }

    pub(crate) fn push_compare(
        &mut self,
        op: CmpOp,
        field: impl FieldKey<E>,
        value: FilterValue,
    ) {
        let Some(field) = self.resolve(field) else {
            return;
        };
        let Some(value) = self.require_value(value, "Comparison") else {
            return;
        };
        self.filters.push(Expr::Compare { field, op, value });
    }

    pub(crate) fn push_between(
        &mut self,
        field: impl FieldKey<E>,
        low: FilterValue,
        high: FilterValue,
        negated: bool,
    ) {
        let Some(field) = self.resolve(field) else {
            return;
        };
        let (Some(low), Some(high)) = (
            self.require_value(low, "Range bound"),
            self.require_value(high, "Range bound"),
        ) else {
            return;
        };
        self.filters.push(Expr::Between {
            field,
            low,
            high,
            negated,
        });
    }

    pub(crate) fn push_is_null(&mut self, field: impl FieldKey<E>, negated: bool) {
        if let Some(field) = self.resolve(field) {
            self.filters.push(Expr::IsNull { field, negated });
        }
    }

    pub(crate) fn push_in(
        &mut self,
        field: impl FieldKey<E>,
        values: Vec<FilterValue>,
        negated: bool,
    ) {
        let Some(field) = self.resolve(field) else {
            return;
        };
        if values.is_empty() {
            self.record_error(MapperError::Validation(
                "IN requires at least one value".to_string(),
            ));
            return;
        }
        self.filters.push(Expr::In {
            field,
            values,
            negated,
        });
    }

    pub(crate) fn push_like(
        &mut self,
        field: impl FieldKey<E>,
        pattern: String,
        kind: LikeKind,
        negated: bool,
    ) {
        let Some(field) = self.resolve(field) else {
            return;
        };
        if pattern.is_empty() {
            self.record_error(MapperError::Validation(
                "LIKE requires a non-empty pattern".to_string(),
            ));
            return;
        }
        self.filters.push(Expr::Like {
            field,
            pattern,
            kind,
            negated,
        });
    }

    pub(crate) fn push_call(
        &mut self,
        function: &'static str,
        field: impl FieldKey<E>,
        arg: FilterValue,
        negated: bool,
    ) {
        let Some(field) = self.resolve(field) else {
            return;
        };
        let Some(arg) = self.require_value(arg, function) else {
            return;
        };
        if matches!(&arg, FilterValue::List(items) if items.is_empty()) {
            self.record_error(MapperError::Validation(format!(
                "{function} requires at least one value"
            )));
            return;
        }
        self.filters.push(Expr::Call {
            function,
            field,
            arg,
            negated,
        });
    }

    pub(crate) fn push_array_length(&mut self, field: impl FieldKey<E>, length: i64) {
        if let Some(field) = self.resolve(field) {
            self.filters.push(Expr::ArrayLength { field, length });
        }
    }

    pub(crate) fn push_text_match(&mut self, field: impl FieldKey<E>, terms: String) {
        let Some(field) = self.resolve(field) else {
            return;
        };
        if terms.trim().is_empty() {
            self.record_error(MapperError::Validation(
                "Text match requires at least one term".to_string(),
            ));
            return;
        }
        self.text_matches.push(Expr::TextMatch { field, terms });
    }

    /// Merge another builder's fragments into this one.
    ///
    /// With both sides non-empty, each side is AND-collapsed (parens
    /// only around multi-fragment sides) and the pair is parenthesized
    /// under `op`. A one-sided merge appends without extra parentheses.
    pub(crate) fn merge(&mut self, op: BoolOp, mut other: Filter<E>) {
        if let Some(err) = other.error.take() {
            self.record_error(err);
        }
        self.text_matches.append(&mut other.text_matches);

        let left = Expr::combine(BoolOp::And, std::mem::take(&mut self.filters));
        let right = Expr::combine(BoolOp::And, other.filters);
        self.filters = match (left, right) {
            (Some(l), Some(r)) => vec![Expr::Group {
                op,
                parts: vec![l, r],
            }],
            (Some(l), None) => vec![l],
            (None, Some(r)) => vec![r],
            (None, None) => Vec::new(),
        };
    }

    /// Append another builder's fragments verbatim
    pub(crate) fn append(&mut self, mut other: Filter<E>) {
        if let Some(err) = other.error.take() {
            self.record_error(err);
        }
        self.text_matches.append(&mut other.text_matches);
        self.filters.append(&mut other.filters);
    }

    /// Wrap the accumulated plain filters in `NOT ( ... )`
    pub(crate) fn negate(&mut self) {
        if self.filters.is_empty() {
            return;
        }
        let joined = Expr::Seq(std::mem::take(&mut self.filters));
        self.filters = vec![Expr::Not(Box::new(joined))];
    }

    /// Serialize to the backend filter string.
    ///
    /// Text-match fragments come first, then plain filters, all joined
    /// with AND. Empty builders produce `""`. Deterministic and
    /// repeatable; a recorded validation error aborts the build.
    pub fn build(&self) -> Result<String> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let parts: Vec<String> = self
            .text_matches
            .iter()
            .chain(self.filters.iter())
            .map(Expr::render)
            .collect();
        Ok(parts.join(" AND "))
    }
}

impl<E: Entity> Conditions<E> for Filter<E> {
    fn filter_mut(&mut self) -> &mut Filter<E> {
        self
    }
}

/// Fluent operator surface, shared verbatim by the query, update, and
/// delete wrappers through default methods.
pub trait Conditions<E: Entity>: Sized {
    fn filter_mut(&mut self) -> &mut Filter<E>;

    fn eq(mut self, field: impl FieldKey<E>, value: impl Into<FilterValue>) -> Self {
        self.filter_mut().push_compare(CmpOp::Eq, field, value.into());
        self
    }

    fn ne(mut self, field: impl FieldKey<E>, value: impl Into<FilterValue>) -> Self {
        self.filter_mut().push_compare(CmpOp::Ne, field, value.into());
        self
    }

    fn gt(mut self, field: impl FieldKey<E>, value: impl Into<FilterValue>) -> Self {
        self.filter_mut().push_compare(CmpOp::Gt, field, value.into());
        self
    }

    fn ge(mut self, field: impl FieldKey<E>, value: impl Into<FilterValue>) -> Self {
        self.filter_mut().push_compare(CmpOp::Ge, field, value.into());
        self
    }

    fn lt(mut self, field: impl FieldKey<E>, value: impl Into<FilterValue>) -> Self {
        self.filter_mut().push_compare(CmpOp::Lt, field, value.into());
        self
    }

    fn le(mut self, field: impl FieldKey<E>, value: impl Into<FilterValue>) -> Self {
        self.filter_mut().push_compare(CmpOp::Le, field, value.into());
        self
    }

    fn between(
        mut self,
        field: impl FieldKey<E>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        self.filter_mut()
            .push_between(field, low.into(), high.into(), false);
        self
    }

    fn not_between(
        mut self,
        field: impl FieldKey<E>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        self.filter_mut()
            .push_between(field, low.into(), high.into(), true);
        self
    }

    fn is_null(mut self, field: impl FieldKey<E>) -> Self {
        self.filter_mut().push_is_null(field, false);
        self
    }

    fn is_not_null(mut self, field: impl FieldKey<E>) -> Self {
        self.filter_mut().push_is_null(field, true);
        self
    }

    fn is_in<V: Into<FilterValue>>(mut self, field: impl FieldKey<E>, values: Vec<V>) -> Self {
        self.filter_mut()
            .push_in(field, values.into_iter().map(Into::into).collect(), false);
        self
    }

    fn not_in<V: Into<FilterValue>>(mut self, field: impl FieldKey<E>, values: Vec<V>) -> Self {
        self.filter_mut()
            .push_in(field, values.into_iter().map(Into::into).collect(), true);
        self
    }

    /// Substring match
    fn like(mut self, field: impl FieldKey<E>, pattern: impl Into<String>) -> Self {
        self.filter_mut()
            .push_like(field, pattern.into(), LikeKind::Contains, false);
        self
    }

    fn not_like(mut self, field: impl FieldKey<E>, pattern: impl Into<String>) -> Self {
        self.filter_mut()
            .push_like(field, pattern.into(), LikeKind::Contains, true);
        self
    }

    /// Suffix match (`%pattern`)
    fn like_left(mut self, field: impl FieldKey<E>, pattern: impl Into<String>) -> Self {
        self.filter_mut()
            .push_like(field, pattern.into(), LikeKind::Left, false);
        self
    }

    fn not_like_left(mut self, field: impl FieldKey<E>, pattern: impl Into<String>) -> Self {
        self.filter_mut()
            .push_like(field, pattern.into(), LikeKind::Left, true);
        self
    }

    /// Prefix match (`pattern%`)
    fn like_right(mut self, field: impl FieldKey<E>, pattern: impl Into<String>) -> Self {
        self.filter_mut()
            .push_like(field, pattern.into(), LikeKind::Right, false);
        self
    }

    fn not_like_right(mut self, field: impl FieldKey<E>, pattern: impl Into<String>) -> Self {
        self.filter_mut()
            .push_like(field, pattern.into(), LikeKind::Right, true);
        self
    }

    fn json_contains(mut self, field: impl FieldKey<E>, value: impl Into<FilterValue>) -> Self {
        self.filter_mut()
            .push_call("JSON_CONTAINS", field, value.into(), false);
        self
    }

    fn not_json_contains(
        mut self,
        field: impl FieldKey<E>,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.filter_mut()
            .push_call("JSON_CONTAINS", field, value.into(), true);
        self
    }

    fn json_contains_all<V: Into<FilterValue>>(
        mut self,
        field: impl FieldKey<E>,
        values: Vec<V>,
    ) -> Self {
        let list = FilterValue::List(values.into_iter().map(Into::into).collect());
        self.filter_mut()
            .push_call("JSON_CONTAINS_ALL", field, list, false);
        self
    }

    fn not_json_contains_all<V: Into<FilterValue>>(
        mut self,
        field: impl FieldKey<E>,
        values: Vec<V>,
    ) -> Self {
        let list = FilterValue::List(values.into_iter().map(Into::into).collect());
        self.filter_mut()
            .push_call("JSON_CONTAINS_ALL", field, list, true);
        self
    }

    fn json_contains_any<V: Into<FilterValue>>(
        mut self,
        field: impl FieldKey<E>,
        values: Vec<V>,
    ) -> Self {
        let list = FilterValue::List(values.into_iter().map(Into::into).collect());
        self.filter_mut()
            .push_call("JSON_CONTAINS_ANY", field, list, false);
        self
    }

    fn not_json_contains_any<V: Into<FilterValue>>(
        mut self,
        field: impl FieldKey<E>,
        values: Vec<V>,
    ) -> Self {
        let list = FilterValue::List(values.into_iter().map(Into::into).collect());
        self.filter_mut()
            .push_call("JSON_CONTAINS_ANY", field, list, true);
        self
    }

    fn array_contains(mut self, field: impl FieldKey<E>, value: impl Into<FilterValue>) -> Self {
        self.filter_mut()
            .push_call("ARRAY_CONTAINS", field, value.into(), false);
        self
    }

    fn not_array_contains(
        mut self,
        field: impl FieldKey<E>,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.filter_mut()
            .push_call("ARRAY_CONTAINS", field, value.into(), true);
        self
    }

    fn array_contains_all<V: Into<FilterValue>>(
        mut self,
        field: impl FieldKey<E>,
        values: Vec<V>,
    ) -> Self {
        let list = FilterValue::List(values.into_iter().map(Into::into).collect());
        self.filter_mut()
            .push_call("ARRAY_CONTAINS_ALL", field, list, false);
        self
    }

    fn not_array_contains_all<V: Into<FilterValue>>(
        mut self,
        field: impl FieldKey<E>,
        values: Vec<V>,
    ) -> Self {
        let list = FilterValue::List(values.into_iter().map(Into::into).collect());
        self.filter_mut()
            .push_call("ARRAY_CONTAINS_ALL", field, list, true);
        self
    }

    fn array_contains_any<V: Into<FilterValue>>(
        mut self,
        field: impl FieldKey<E>,
        values: Vec<V>,
    ) -> Self {
        let list = FilterValue::List(values.into_iter().map(Into::into).collect());
        self.filter_mut()
            .push_call("ARRAY_CONTAINS_ANY", field, list, false);
        self
    }

    fn not_array_contains_any<V: Into<FilterValue>>(
        mut self,
        field: impl FieldKey<E>,
        values: Vec<V>,
    ) -> Self {
        let list = FilterValue::List(values.into_iter().map(Into::into).collect());
        self.filter_mut()
            .push_call("ARRAY_CONTAINS_ANY", field, list, true);
        self
    }

    fn array_length(mut self, field: impl FieldKey<E>, length: i64) -> Self {
        self.filter_mut().push_array_length(field, length);
        self
    }

    /// Term-level match against an analyzer-enabled text field
    fn text_match(mut self, field: impl FieldKey<E>, term: impl Into<String>) -> Self {
        self.filter_mut().push_text_match(field, term.into());
        self
    }

    /// Multiple terms, space-joined into one match fragment
    fn text_match_terms<S: Into<String>>(
        mut self,
        field: impl FieldKey<E>,
        terms: Vec<S>,
    ) -> Self {
        let joined = terms
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>()
            .join(" ");
        self.filter_mut().push_text_match(field, joined);
        self
    }

    /// Apply `then` only when `gate` is true; the closure (its
    /// validation included) never runs otherwise.
    fn when(self, gate: bool, then: impl FnOnce(Self) -> Self) -> Self {
        if gate {
            then(self)
        } else {
            self
        }
    }

    /// AND-merge with conditions built in a fresh sub-builder
    fn and(mut self, build: impl FnOnce(Filter<E>) -> Filter<E>) -> Self {
        let sub = build(Filter::new(Arc::clone(self.filter_mut().registry())));
        self.filter_mut().merge(BoolOp::And, sub);
        self
    }

    /// OR-merge with conditions built in a fresh sub-builder
    fn or(mut self, build: impl FnOnce(Filter<E>) -> Filter<E>) -> Self {
        let sub = build(Filter::new(Arc::clone(self.filter_mut().registry())));
        self.filter_mut().merge(BoolOp::Or, sub);
        self
    }

    /// AND-merge with an already built filter
    fn and_filter(mut self, other: Filter<E>) -> Self {
        self.filter_mut().merge(BoolOp::And, other);
        self
    }

    /// OR-merge with an already built filter
    fn or_filter(mut self, other: Filter<E>) -> Self {
        self.filter_mut().merge(BoolOp::Or, other);
        self
    }

    /// Negate everything accumulated so far
    fn not(mut self) -> Self {
        self.filter_mut().negate();
        self
    }

    /// Append the negation of conditions built in a fresh sub-builder
    fn not_with(mut self, build: impl FnOnce(Filter<E>) -> Filter<E>) -> Self {
        let mut sub = build(Filter::new(Arc::clone(self.filter_mut().registry())));
        sub.negate();
        self.filter_mut().append(sub);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::descriptor::{CollectionMeta, DataType, FieldMeta};
    use crate::schema::entity::FieldRef;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Person {
        id: i64,
        name: String,
        age: i32,
        status: String,
    }

    impl Person {
        const NAME: FieldRef<Person> = FieldRef::new("name");
        const AGE: FieldRef<Person> = FieldRef::new("age");
    }

    impl Entity for Person {
        fn collection() -> CollectionMeta {
            CollectionMeta::new("people")
        }
        fn fields() -> Vec<FieldMeta> {
            vec![
                FieldMeta::new("id", DataType::Int64).primary_key(),
                FieldMeta::new("name", DataType::VarChar).max_length(64),
                FieldMeta::new("age", DataType::Int32),
                FieldMeta::new("status", DataType::VarChar).max_length(32),
            ]
        }
    }

    fn filter() -> Filter<Person> {
        Filter::new(Arc::new(SchemaRegistry::new()))
    }

    #[test]
    fn test_scalar_comparisons() {
        let f = filter().eq(Person::AGE, 25);
        assert_eq!(f.build().unwrap(), "age == 25");

        let f = filter().eq(Person::NAME, "John");
        assert_eq!(f.build().unwrap(), "name == 'John'");
    }

    #[test]
    fn test_between_and_in() {
        let f = filter().between(Person::AGE, 18, 30);
        assert_eq!(f.build().unwrap(), "age >= 18 AND age <= 30");

        let f = filter().not_between(Person::AGE, 18, 30);
        assert_eq!(f.build().unwrap(), "NOT (age >= 18 AND age <= 30)");

        let f = filter().is_in("status", vec!["active"]);
        assert_eq!(f.build().unwrap(), "status IN ['active']");
    }

    #[test]
    fn test_or_merge_parenthesizes_pair() {
        let f = filter()
            .eq(Person::AGE, 25)
            .or(|sub| sub.ne("status", "inactive"));
        assert_eq!(f.build().unwrap(), "(age == 25 OR status != 'inactive')");
    }

    #[test]
    fn test_one_sided_merge_unwrapped() {
        let f = filter().or(|sub| sub.eq(Person::AGE, 25));
        assert_eq!(f.build().unwrap(), "age == 25");

        let f = filter().eq(Person::AGE, 25).or(|sub| sub);
        assert_eq!(f.build().unwrap(), "age == 25");
    }

    #[test]
    fn test_multi_fragment_sides_get_parens() {
        let f = filter()
            .eq(Person::AGE, 25)
            .eq("status", "active")
            .or(|sub| sub.eq(Person::NAME, "John"));
        assert_eq!(
            f.build().unwrap(),
            "((age == 25 AND status == 'active') OR name == 'John')"
        );
    }

    #[test]
    fn test_not_wraps_and_nests() {
        let f = filter().eq(Person::AGE, 25).eq("status", "active").not();
        assert_eq!(
            f.build().unwrap(),
            "NOT (age == 25 AND status == 'active')"
        );

        let f = filter().eq(Person::AGE, 25).not().not();
        assert_eq!(f.build().unwrap(), "NOT (NOT (age == 25))");
    }

    #[test]
    fn test_not_with_appends_negated_fragment() {
        let f = filter()
            .eq(Person::AGE, 25)
            .not_with(|sub| sub.eq("status", "active").eq(Person::NAME, "John"));
        assert_eq!(
            f.build().unwrap(),
            "age == 25 AND NOT (status == 'active' AND name == 'John')"
        );
    }

    #[test]
    fn test_empty_collection_rejected() {
        let f = filter().is_in("status", Vec::<i64>::new());
        assert!(f.build().is_err());

        let f = filter().json_contains_all("tags", Vec::<i64>::new());
        assert!(f.build().is_err());
    }

    #[test]
    fn test_build_is_repeatable_and_empty_is_ok() {
        let f = filter().eq(Person::AGE, 25).like(Person::NAME, "Jo");
        let first = f.build().unwrap();
        assert_eq!(first, f.build().unwrap());
        assert_eq!(first, "age == 25 AND name LIKE '%Jo%'");

        assert_eq!(filter().build().unwrap(), "");
    }

    #[test]
    fn test_text_match_ordered_first() {
        let f = filter()
            .eq(Person::AGE, 25)
            .text_match(Person::NAME, "john smith");
        assert_eq!(
            f.build().unwrap(),
            "TEXT_MATCH(name, 'john smith') AND age == 25"
        );
    }

    #[test]
    fn test_text_match_terms_joined() {
        let f = filter().text_match_terms(Person::NAME, vec!["john", "smith"]);
        assert_eq!(f.build().unwrap(), "TEXT_MATCH(name, 'john smith')");
    }

    #[test]
    fn test_when_skips_gated_block() {
        let f = filter()
            .eq(Person::AGE, 25)
            .when(false, |b| b.eq("", "would fail"))
            .when(true, |b| b.eq("status", "active"));
        assert_eq!(f.build().unwrap(), "age == 25 AND status == 'active'");
    }

    #[test]
    fn test_fail_fast_on_blank_field() {
        let f = filter().eq("", 1).eq(Person::AGE, 25);
        assert!(matches!(f.build(), Err(MapperError::Validation(_))));
    }

    #[test]
    fn test_null_value_rejected() {
        let f = filter().eq(Person::AGE, FilterValue::Null);
        assert!(f.build().is_err());
    }

    #[test]
    fn test_negations_wrap_in_not() {
        let f = filter().not_in("status", vec!["active"]);
        assert_eq!(f.build().unwrap(), "NOT (status IN ['active'])");

        let f = filter().not_like(Person::NAME, "Jo");
        assert_eq!(f.build().unwrap(), "NOT (name LIKE '%Jo%')");

        let f = filter().not_json_contains("tags", "rust");
        assert_eq!(f.build().unwrap(), "NOT (JSON_CONTAINS(tags, 'rust'))");
    }

    #[test]
    fn test_like_variants() {
        let f = filter().like_left(Person::NAME, "son");
        assert_eq!(f.build().unwrap(), "name LIKE '%son'");

        let f = filter().like_right(Person::NAME, "Jo");
        assert_eq!(f.build().unwrap(), "name LIKE 'Jo%'");
    }

    #[test]
    fn test_array_and_json_calls() {
        let f = filter().json_contains("tags", "rust");
        assert_eq!(f.build().unwrap(), "JSON_CONTAINS(tags, 'rust')");

        let f = filter().array_contains_any("tags", vec!["a", "b"]);
        assert_eq!(f.build().unwrap(), "ARRAY_CONTAINS_ANY(tags, ['a', 'b'])");

        let f = filter().array_length("tags", 3);
        assert_eq!(f.build().unwrap(), "ARRAY_LENGTH(tags) == 3");
    }
}

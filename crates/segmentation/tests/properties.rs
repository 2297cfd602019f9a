//! Property tests over randomly composed segment expressions.

use campaign_segmentation::codec;
use campaign_segmentation::{
    evaluate_expression, CustomerRecord, FieldDefinition, FieldRegistry, FieldType, FilterCondition,
    SegmentExpression, TypedValue,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Seed {
    field: usize,
    op: usize,
    num: i32,
    num2: i32,
    real: f64,
    real2: f64,
    text: String,
    flag: bool,
    secs: i64,
    secs2: i64,
    filled: bool,
}

/// Arbitrary finite doubles mixed with small quarter steps, so values
/// both stress the codec and collide often enough to match.
fn number() -> impl Strategy<Value = f64> {
    prop_oneof![
        prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO,
        (-1000i32..1000).prop_map(|n| f64::from(n) / 4.0),
    ]
}

fn seed() -> impl Strategy<Value = Seed> {
    (
        any::<usize>(),
        any::<usize>(),
        -1000i32..1000,
        -1000i32..1000,
        number(),
        number(),
        "[a-zA-Z ]{0,12}",
        any::<bool>(),
        0i64..4_000_000_000,
        0i64..4_000_000_000,
        any::<bool>(),
    )
        .prop_map(|(field, op, num, num2, real, real2, text, flag, secs, secs2, filled)| Seed {
            field,
            op,
            num,
            num2,
            real,
            real2,
            text,
            flag,
            secs,
            secs2,
            filled,
        })
}

fn value_for(field: &FieldDefinition, seed: &Seed, upper: bool) -> TypedValue {
    let (num, real, secs) = if upper {
        (seed.num2, seed.real2, seed.secs2)
    } else {
        (seed.num, seed.real, seed.secs)
    };
    match &field.field_type {
        FieldType::Text => TypedValue::text(seed.text.clone()),
        FieldType::Number => TypedValue::number(real),
        FieldType::Date => TypedValue::date(Utc.timestamp_opt(secs, 0).unwrap()),
        FieldType::Boolean => TypedValue::boolean(seed.flag),
        FieldType::Select { options } => {
            TypedValue::text(options[num.unsigned_abs() as usize % options.len()].value.clone())
        }
    }
}

fn build_condition(registry: &FieldRegistry, seed: &Seed) -> FilterCondition {
    let field = &registry.fields()[seed.field % registry.len()];
    let operators = field.operators();
    let operator = operators[seed.op % operators.len()];
    let mut condition = FilterCondition::new(registry, &field.id)
        .unwrap()
        .with_operator(registry, operator)
        .unwrap();
    if seed.filled {
        condition = condition
            .with_value(registry, value_for(field, seed, false))
            .unwrap();
        if operator.is_between() {
            condition = condition
                .with_second_value(registry, value_for(field, seed, true))
                .unwrap();
        }
    }
    condition
}

fn build_expression(registry: &FieldRegistry, groups: &[(bool, Vec<Seed>)]) -> SegmentExpression {
    let mut expr = SegmentExpression::new();
    for (i, (toggle, seeds)) in groups.iter().enumerate() {
        if i > 0 {
            expr = expr.add_group();
        }
        let group = expr.last_group_id();
        if *toggle {
            expr = expr.toggle_combinator(group).unwrap();
        }
        for seed in seeds {
            expr = expr
                .push_condition(group, build_condition(registry, seed))
                .unwrap();
        }
    }
    expr
}

fn build_record(registry: &FieldRegistry, seeds: &[Seed]) -> CustomerRecord {
    seeds.iter().fold(CustomerRecord::new("c"), |record, seed| {
        let field = &registry.fields()[seed.field % registry.len()];
        record.with_attribute(field.id.clone(), value_for(field, seed, false))
    })
}

fn groups_strategy() -> impl Strategy<Value = Vec<(bool, Vec<Seed>)>> {
    prop::collection::vec((any::<bool>(), prop::collection::vec(seed(), 0..4)), 1..5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn round_trip_preserves_expression(groups in groups_strategy()) {
        let registry = FieldRegistry::crm_default();
        let expr = build_expression(&registry, &groups);

        let decoded = codec::deserialize(&codec::serialize(&expr), &registry);
        prop_assert!(decoded.is_clean());
        prop_assert_eq!(&decoded.expression, &expr);

        let json = codec::to_json(&expr).unwrap();
        let decoded = codec::from_json(&json, &registry).unwrap();
        prop_assert_eq!(decoded.expression, expr);
    }

    #[test]
    fn evaluation_is_pure_and_deterministic(
        groups in groups_strategy(),
        attrs in prop::collection::vec(seed(), 0..12),
    ) {
        let registry = FieldRegistry::crm_default();
        let expr = build_expression(&registry, &groups);
        let record = build_record(&registry, &attrs);
        let (expr_before, record_before) = (expr.clone(), record.clone());

        let first = evaluate_expression(&expr, &record);
        let second = evaluate_expression(&expr, &record);
        prop_assert_eq!(first, second);
        prop_assert_eq!(expr, expr_before);
        prop_assert_eq!(record, record_before);
    }

    #[test]
    fn empty_group_never_excludes(
        groups in groups_strategy(),
        attrs in prop::collection::vec(seed(), 0..12),
    ) {
        let registry = FieldRegistry::crm_default();
        let expr = build_expression(&registry, &groups);
        let record = build_record(&registry, &attrs);
        let base = evaluate_expression(&expr, &record);

        // acc AND true == acc
        let with_and = expr.add_group();
        let with_and = with_and.toggle_combinator(with_and.last_group_id()).unwrap();
        prop_assert_eq!(evaluate_expression(&with_and, &record), base);

        // acc OR true == true
        prop_assert!(evaluate_expression(&expr.add_group(), &record));
    }

    #[test]
    fn missing_fields_never_match(groups in groups_strategy()) {
        let registry = FieldRegistry::crm_default();
        let expr = build_expression(&registry, &groups);
        let empty = CustomerRecord::new("nobody");
        for group in expr.groups() {
            for condition in group.conditions() {
                prop_assert!(!campaign_segmentation::evaluate_condition(condition, &empty));
            }
        }
    }
}

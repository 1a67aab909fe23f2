use std::sync::Arc;
use std::thread;

use anyhow::Result;
use filtex::{
    compile, filter_matches, CompileOptions, Evaluator, Expression, FieldResolver, FieldTable,
    FilterError, FilterResult, NullPropagation, Value,
};

/// Record shape shared by the interpreter and compiler paths.
#[derive(Debug, Clone, Default)]
struct Connection {
    user_id: Option<String>,
    connection_id: Option<String>,
    groups: Vec<String>,
    score: Option<i64>,
}

impl FieldResolver for Connection {
    fn resolve(&self, field: &str) -> FilterResult<Value> {
        match field {
            "userId" => Ok(self
                .user_id
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null)),
            "connectionId" => Ok(self
                .connection_id
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null)),
            "group" => Ok(if self.groups.is_empty() {
                Value::Null
            } else {
                Value::Group(self.groups.clone())
            }),
            "score" => Ok(self.score.map(Value::Int).unwrap_or(Value::Null)),
            other => Err(FilterError::UnknownField {
                name: other.to_string(),
            }),
        }
    }
}

fn field_table() -> FieldTable<Connection> {
    FieldTable::new()
        .string("userId", |c: &Connection| c.user_id.clone())
        .string("connectionId", |c: &Connection| c.connection_id.clone())
        .group("group", |c: &Connection| Some(c.groups.clone()))
        .int("score", |c: &Connection| c.score)
}

fn connection(user_id: Option<&str>, groups: &[&str], score: Option<i64>) -> Connection {
    Connection {
        user_id: user_id.map(|u| u.to_string()),
        connection_id: Some("conn-1".to_string()),
        groups: groups.iter().map(|g| g.to_string()).collect(),
        score,
    }
}

/// Assert that interpretation and compilation agree on a record, and return
/// the shared outcome.
fn both_strategies(expr: &Expression, record: &Connection) -> Result<bool> {
    let interpreted = Evaluator::new(record).matches(expr)?;
    let compiled = compile(expr, &field_table(), CompileOptions::default())?;
    assert_eq!(
        interpreted,
        compiled.evaluate(record)?,
        "strategies disagree on {:?} for {:?}",
        expr,
        record
    );
    Ok(interpreted)
}

fn sample_records() -> Vec<Connection> {
    vec![
        connection(Some("user1"), &["group3"], Some(10)),
        connection(Some("user2"), &["group3"], None),
        connection(Some("user2"), &["group1", "group9"], Some(3)),
        connection(None, &[], None),
        connection(Some("User1"), &["a", "ab", "abc"], Some(7)),
    ]
}

/// A corpus of expressions both strategies support, exercised over every
/// sample record.
fn shared_corpus() -> Vec<Expression> {
    vec![
        Expression::eq(Expression::field("userId"), Expression::literal("user1")),
        Expression::ne(Expression::field("userId"), Expression::literal("user1")),
        Expression::eq(Expression::field("userId"), Expression::null()),
        Expression::ne(Expression::field("userId"), Expression::null()),
        Expression::gt(Expression::field("score"), Expression::literal(5i64)),
        Expression::le(Expression::field("score"), Expression::literal(5i64)),
        Expression::gt(Expression::field("score"), Expression::null()),
        Expression::and(
            Expression::gt(Expression::field("score"), Expression::literal(1i64)),
            Expression::eq(Expression::field("userId"), Expression::literal("user2")),
        ),
        Expression::or(
            Expression::eq(Expression::field("userId"), Expression::literal("user1")),
            Expression::is_in(Expression::field("group"), "('group1','group2')"),
        ),
        Expression::not_expr(Expression::eq(
            Expression::field("userId"),
            Expression::literal("user1"),
        )),
        Expression::eq(Expression::field("group"), Expression::literal("group3")),
        Expression::is_in(Expression::field("userId"), "('user1','user3')"),
        Expression::is_in(Expression::field("group"), "('group9')"),
        Expression::func(
            "startswith",
            vec![Expression::field("group"), Expression::literal("a")],
        ),
        Expression::func(
            "contains",
            vec![Expression::field("userId"), Expression::literal("ser")],
        ),
        Expression::gt(
            Expression::func("length", vec![Expression::field("group")]),
            Expression::literal(1i64),
        ),
        Expression::eq(
            Expression::func("tolower", vec![Expression::field("userId")]),
            Expression::literal("user1"),
        ),
        Expression::eq(
            Expression::func(
                "concat",
                vec![Expression::field("userId"), Expression::literal("!")],
            ),
            Expression::literal("user1!"),
        ),
        Expression::ge(
            Expression::func(
                "indexof",
                vec![Expression::field("userId"), Expression::literal("2")],
            ),
            Expression::literal(0i64),
        ),
        Expression::not_expr(Expression::func(
            "endswith",
            vec![Expression::field("userId"), Expression::literal("test")],
        )),
    ]
}

#[test]
fn interpreter_and_compiler_agree() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    for expr in shared_corpus() {
        for record in sample_records() {
            both_strategies(&expr, &record)?;
        }
    }
    Ok(())
}

#[test]
fn end_to_end_scenario() -> Result<()> {
    // userId eq 'user1' or group in ('group1','group2')
    let expr = Expression::or(
        Expression::eq(Expression::field("userId"), Expression::literal("user1")),
        Expression::is_in(Expression::field("group"), "('group1','group2')"),
    );

    // the left disjunct matches
    assert!(both_strategies(&expr, &connection(Some("user1"), &["group3"], None))?);
    // neither side matches
    assert!(!both_strategies(&expr, &connection(Some("user2"), &["group3"], None))?);
    // the membership test matches through the group
    assert!(both_strategies(&expr, &connection(Some("user2"), &["group1"], None))?);
    Ok(())
}

#[test]
fn broadcast_semantics() -> Result<()> {
    let record = connection(Some("u"), &["a", "ab", "abc"], None);

    // startswith over a group is existential
    let expr = Expression::func(
        "startswith",
        vec![Expression::field("group"), Expression::literal("a")],
    );
    assert!(both_strategies(&expr, &record)?);

    // length over a group compares element-wise
    let lengths = Expression::func("length", vec![Expression::field("group")]);
    assert!(both_strategies(
        &Expression::gt(lengths.clone(), Expression::literal(1i64)),
        &record
    )?);
    assert!(!both_strategies(
        &Expression::gt(lengths, Expression::literal(3i64)),
        &record
    )?);
    Ok(())
}

#[test]
fn null_boundaries() -> Result<()> {
    let empty = connection(None, &[], None);

    // an empty multi-valued field behaves as null: contains propagates
    // instead of erroring, membership and ordering are non-matches
    let contains = Expression::func(
        "contains",
        vec![Expression::field("group"), Expression::literal("x")],
    );
    assert!(!both_strategies(&contains, &empty)?);

    let membership = Expression::is_in(Expression::field("group"), "('x','y')");
    assert!(!both_strategies(&membership, &empty)?);

    let ordering = Expression::lt(Expression::field("score"), Expression::literal(100i64));
    assert!(!both_strategies(&ordering, &empty)?);

    // null equality is a real test, not a non-match
    let is_null = Expression::eq(Expression::field("userId"), Expression::null());
    assert!(both_strategies(&is_null, &empty)?);
    Ok(())
}

#[test]
fn consistent_errors_across_strategies() {
    // both strategies reject the same malformed constructs with the same
    // error kind
    let cases = vec![
        Expression::eq(Expression::field("tenantId"), Expression::literal("x")),
        Expression::func("frobnicate", vec![Expression::field("userId")]),
        Expression::func("contains", vec![Expression::field("userId")]),
        Expression::is_in(Expression::field("userId"), "user1,user2"),
        Expression::binary_op(
            filtex::BinaryOperator::Has,
            Expression::field("userId"),
            Expression::literal("x"),
        ),
        Expression::func(
            "substring",
            vec![Expression::field("userId"), Expression::literal(1i64)],
        ),
    ];

    let record = connection(Some("user1"), &["g"], Some(1));
    for expr in cases {
        let interpreted = Evaluator::new(&record).evaluate(&expr);
        let compiled = compile(&expr, &field_table(), CompileOptions::default())
            .and_then(|pred| pred.evaluate(&record).map(Value::Bool));

        let left = interpreted.expect_err("interpreter should fail");
        let right = compiled.expect_err("compiler should fail");
        assert_eq!(
            std::mem::discriminant(&left),
            std::mem::discriminant(&right),
            "error kinds diverge: {left:?} vs {right:?}"
        );
    }
}

#[test]
fn null_propagation_disabled_is_a_failure() -> Result<()> {
    let options = CompileOptions {
        null_propagation: NullPropagation::Disabled,
        ..CompileOptions::default()
    };
    let expr = Expression::gt(Expression::field("score"), Expression::literal(5i64));
    let pred = compile(&expr, &field_table(), options)?;

    assert!(pred.evaluate(&connection(Some("u"), &[], Some(10)))?);
    assert!(matches!(
        pred.evaluate(&connection(Some("u"), &[], None)),
        Err(FilterError::UnexpectedNull { .. })
    ));
    Ok(())
}

#[test]
fn parameterized_predicate_reuse() -> Result<()> {
    let expr = Expression::or(
        Expression::eq(Expression::field("userId"), Expression::literal("user1")),
        Expression::gt(Expression::field("score"), Expression::literal(100i64)),
    );
    let options = CompileOptions {
        parameterize_constants: true,
        ..CompileOptions::default()
    };
    let pred = compile(&expr, &field_table(), options)?;
    assert_eq!(pred.params().len(), 2);

    let record = connection(Some("user9"), &[], Some(50));
    assert!(!pred.evaluate(&record)?);

    // retarget both constants without recompiling
    let mut params = pred.params().clone();
    params.set(0, Value::String("user9".to_string()))?;
    assert!(pred.evaluate_with(&record, &params)?);

    let mut params = pred.params().clone();
    params.set(1, Value::Int(40))?;
    assert!(pred.evaluate_with(&record, &params)?);

    // parameterization does not change semantics
    let plain = compile(&expr, &field_table(), CompileOptions::default())?;
    for record in sample_records() {
        assert_eq!(plain.evaluate(&record)?, pred.evaluate(&record)?);
    }
    Ok(())
}

#[test]
fn quantifiers_compile_path() -> Result<()> {
    // any(group, g: endswith(g, '1'))
    let expr = Expression::any(
        Expression::field("group"),
        "g",
        Some(Expression::func(
            "endswith",
            vec![Expression::variable("g"), Expression::literal("1")],
        )),
    );
    let pred = compile(&expr, &field_table(), CompileOptions::default())?;
    assert!(pred.evaluate(&connection(None, &["group1", "x"], None))?);
    assert!(!pred.evaluate(&connection(None, &["group2"], None))?);
    assert!(!pred.evaluate(&connection(None, &[], None))?);

    // all(group, g: length(g) gt 1)
    let expr = Expression::all(
        Expression::field("group"),
        "g",
        Expression::gt(
            Expression::func("length", vec![Expression::variable("g")]),
            Expression::literal(1i64),
        ),
    );
    let pred = compile(&expr, &field_table(), CompileOptions::default())?;
    assert!(pred.evaluate(&connection(None, &["ab", "cd"], None))?);
    assert!(!pred.evaluate(&connection(None, &["ab", "c"], None))?);

    // the interpreter rejects the construct rather than guessing
    let record = connection(None, &["ab"], None);
    assert!(matches!(
        Evaluator::new(&record).evaluate(&expr),
        Err(FilterError::UnsupportedOperator(_))
    ));
    Ok(())
}

#[test]
fn idempotent_evaluation() -> Result<()> {
    let expr = Expression::or(
        Expression::eq(Expression::field("userId"), Expression::literal("user1")),
        Expression::gt(
            Expression::func("length", vec![Expression::field("group")]),
            Expression::literal(2i64),
        ),
    );
    let pred = compile(&expr, &field_table(), CompileOptions::default())?;

    for record in sample_records() {
        let first = filter_matches(&expr, &record)?;
        let second = filter_matches(&expr, &record)?;
        assert_eq!(first, second);
        assert_eq!(pred.evaluate(&record)?, pred.evaluate(&record)?);
    }
    Ok(())
}

#[test]
fn compiled_predicate_is_shareable() -> Result<()> {
    let expr = Expression::or(
        Expression::eq(Expression::field("userId"), Expression::literal("user1")),
        Expression::is_in(Expression::field("group"), "('group1','group2')"),
    );
    let pred = Arc::new(compile(&expr, &field_table(), CompileOptions::default())?);

    let mut handles = Vec::new();
    for i in 0..4 {
        let pred = Arc::clone(&pred);
        handles.push(thread::spawn(move || {
            let matching = connection(Some("user1"), &["other"], None);
            let name = format!("user{}", i + 2);
            let other = connection(Some(name.as_str()), &["other"], None);
            assert!(pred.evaluate(&matching).unwrap());
            assert!(!pred.evaluate(&other).unwrap());
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    Ok(())
}

#[test]
fn ast_crosses_a_serialization_boundary() -> Result<()> {
    let expr = Expression::or(
        Expression::eq(Expression::field("userId"), Expression::literal("user1")),
        Expression::is_in(Expression::field("group"), "('group1','group2')"),
    );

    let json = serde_json::to_string(&expr)?;
    let parsed: Expression = serde_json::from_str(&json)?;

    let record = connection(Some("user1"), &["group3"], None);
    assert!(both_strategies(&parsed, &record)?);
    Ok(())
}

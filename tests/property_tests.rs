//! Property-based tests for statement rendering and preparation using proptest

use abavee_db::prelude::*;
use abavee_db::{params, Param, PrimitiveType};
use proptest::prelude::*;

fn condition() -> impl Strategy<Value = (String, i64)> {
    ("[a-z]{1,8}", any::<i64>()).prop_map(|(field, value)| (format!("{}=?", field), value))
}

/// One SET assignment: a bound value, or raw SQL when the flag is set
fn assignment() -> impl Strategy<Value = (String, String, bool)> {
    ("[a-z]{1,8}", "[a-zA-Z0-9' ]{0,12}", any::<bool>())
}

/// Render with and without a dialect twice, and check the parameter count
fn assert_renders_stable(sql: &dyn Sql, expected_params: usize) -> std::result::Result<(), TestCaseError> {
    let dialect = MysqlDialect::new();
    let first = sql.to_statement(None);
    prop_assert_eq!(&first, &sql.to_statement(None));
    prop_assert_eq!(
        sql.to_statement(Some(&dialect)),
        sql.to_statement(Some(&dialect))
    );
    prop_assert_eq!(first.params().len(), expected_params);
    prop_assert_eq!(first.placeholder_count(), expected_params);
    Ok(())
}

// ============================================================================
// Builder Rendering Tests
// ============================================================================

proptest! {
    /// Rendering twice without mutation yields the same statement
    #[test]
    fn test_select_render_idempotent(
        table in "[a-z]{1,10}",
        conditions in prop::collection::vec(condition(), 0..6),
        limit in prop::option::of(0u64..1000),
    ) {
        let mut builder = SelectBuilder::new().from(table);
        for (expr, value) in &conditions {
            builder = builder.and_where(expr.clone(), params![*value]);
        }
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }

        let dialect = MysqlDialect::new();
        prop_assert_eq!(builder.to_statement(None), builder.to_statement(None));
        prop_assert_eq!(
            builder.to_statement(Some(&dialect)),
            builder.to_statement(Some(&dialect))
        );
        prop_assert_eq!(builder.params().len(), conditions.len());
    }

    /// INSERT, UPDATE and DELETE render identically when rendered twice
    #[test]
    fn test_write_builders_render_idempotent(
        table in "[a-z]{1,10}",
        assignments in prop::collection::vec(assignment(), 1..6),
        conditions in prop::collection::vec(condition(), 0..6),
    ) {
        let bound = assignments.iter().filter(|(_, _, raw)| !raw).count();

        let mut insert = InsertBuilder::new(table.clone());
        let mut update = UpdateBuilder::new(table.clone());
        for (column, value, raw) in &assignments {
            if *raw {
                insert = insert.set_raw(column, "NOW()");
                update = update.set_raw(column, &format!("{}+1", column));
            } else {
                insert = insert.set(column, value.as_str());
                update = update.set(column, value.as_str());
            }
        }

        let mut delete = DeleteBuilder::new(table);
        for (expr, value) in &conditions {
            update = update.and_where(expr.clone(), params![*value]);
            delete = delete.and_where(expr.clone(), params![*value]);
        }

        assert_renders_stable(&insert, bound)?;
        assert_renders_stable(&update, bound + conditions.len())?;
        assert_renders_stable(&delete, conditions.len())?;
        prop_assert_eq!(insert.build(), insert.build());
        prop_assert_eq!(update.build(), update.build());
        prop_assert_eq!(delete.build(), delete.build());
    }

    /// SELECT parameters come out as fields, then FROM/JOIN, then WHERE, in append order
    #[test]
    fn test_select_parameter_order(
        field_values in prop::collection::vec(any::<i32>(), 0..4),
        from_values in prop::collection::vec(any::<i32>(), 0..4),
        where_values in prop::collection::vec(any::<i32>(), 0..4),
    ) {
        // Interleave the clause calls so append order differs from render order.
        let mut builder = SelectBuilder::new();
        let longest = field_values.len().max(from_values.len()).max(where_values.len());
        for i in 0..longest {
            if let Some(v) = where_values.get(i) {
                builder = builder.and_where("w=?", params![*v]);
            }
            if let Some(v) = from_values.get(i) {
                builder = builder.join_with("t ON t.x=?", params![*v]);
            }
            if let Some(v) = field_values.get(i) {
                builder = builder.fields_with("?", params![*v]);
            }
        }

        let expected: Vec<Param> = field_values
            .iter()
            .chain(from_values.iter())
            .chain(where_values.iter())
            .map(|v| Param::from(*v))
            .collect();
        let statement = builder.to_statement(None);
        prop_assert_eq!(statement.params(), expected.as_slice());
        prop_assert_eq!(statement.placeholder_count(), expected.len());
    }
}

// ============================================================================
// Dialect Preparation Tests
// ============================================================================

proptest! {
    /// Nested sub-statements flatten to any depth without leftover placeholders
    #[test]
    fn test_nested_flattening(depth in 0usize..8, leaf in any::<i32>()) {
        let mut statement = Statement::new("SELECT id FROM t0 WHERE v=?", params![leaf]);
        for level in 1..=depth {
            statement = Statement::new(
                format!("SELECT id FROM t{} WHERE id IN ?", level),
                params![statement],
            );
        }

        let native = MysqlDialect::new().prepare(&statement).unwrap();
        let sql = native.as_str();
        prop_assert!(!sql.contains('?'));
        prop_assert_eq!(sql.matches('(').count(), depth);
        let expected_tail = format!("v={}{}", leaf, ")".repeat(depth));
        prop_assert!(sql.ends_with(&expected_tail));
    }

    /// A placeholder/parameter count mismatch is always reported
    #[test]
    fn test_count_mismatch_detected(placeholders in 0usize..6, params_len in 0usize..6) {
        prop_assume!(placeholders != params_len);
        let template = vec!["?"; placeholders].join(", ");
        let params: Vec<Param> = (0..params_len as i32).map(Param::from).collect();
        let statement = Statement::new(format!("SELECT {}", template), params);

        let err = SqliteDialect::new().prepare(&statement).unwrap_err();
        prop_assert!(err.statement_ref().is_some());
    }

    /// MySQL escaping is reversible and never leaves a bare quote
    #[test]
    fn test_mysql_escape_reversible(text in ".*") {
        let escaped = MysqlDialect::new().escape_str(&text);

        let mut unescaped = String::new();
        let mut chars = escaped.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                let next = chars.next();
                prop_assert!(next.is_some());
                unescaped.push(match next {
                    Some('0') => '\0',
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('Z') => '\x1a',
                    Some(other) => other,
                    None => unreachable!(),
                });
            } else {
                prop_assert_ne!(ch, '\'');
                unescaped.push(ch);
            }
        }
        prop_assert_eq!(unescaped, text);
    }
}

// ============================================================================
// SQLite Round Trip Tests
// ============================================================================

#[cfg(feature = "sqlite")]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Text inlined by the SQLite dialect reads back unchanged
    #[test]
    fn test_sqlite_text_round_trip(text in "[^\\x00]*") {
        let mut db = Database::new(SqliteEngine::open_in_memory().unwrap());
        let query = SelectBuilder::new().fields_with("? AS v", params![text.clone()]);

        let value = db.query_cell(&query, Some("v"), false).unwrap();
        prop_assert_eq!(value, Some(DatabaseValue::String(text)));
    }

    /// Integers inlined by the SQLite dialect read back unchanged
    #[test]
    fn test_sqlite_integer_round_trip(value in (i64::MIN + 1)..=i64::MAX) {
        let mut db = Database::new(SqliteEngine::open_in_memory().unwrap());
        let query = SelectBuilder::new().fields_with("? AS v", params![value]);

        let cell = db.query_cell(&query, None, false).unwrap();
        prop_assert_eq!(cell, Some(DatabaseValue::Long(value)));
    }
}

// ============================================================================
// Value Conversion Tests
// ============================================================================

proptest! {
    /// Converting integer text through the dialect yields the number
    #[test]
    fn test_convert_integer_text(value in any::<i64>()) {
        let converted = MysqlDialect::new()
            .convert_primitive(PrimitiveType::Integer, &DatabaseValue::from(value.to_string()))
            .unwrap();
        prop_assert_eq!(converted, DatabaseValue::Long(value));
    }

    /// Test that any value can be converted to string (no panic)
    #[test]
    fn test_to_string_never_panics(value in prop_oneof![
        any::<i32>().prop_map(DatabaseValue::from),
        any::<i64>().prop_map(DatabaseValue::from),
        any::<f64>().prop_filter("finite", |v| v.is_finite()).prop_map(DatabaseValue::from),
        ".*".prop_map(DatabaseValue::from),
    ]) {
        let _ = value.as_string();
    }

    /// Encoding a finite primitive never fails
    #[test]
    fn test_encode_finite_primitives(value in prop_oneof![
        any::<bool>().prop_map(DatabaseValue::from),
        any::<i64>().prop_map(DatabaseValue::from),
        any::<f64>().prop_filter("finite", |v| v.is_finite()).prop_map(DatabaseValue::from),
        ".*".prop_map(DatabaseValue::from),
    ]) {
        prop_assert!(SqliteDialect::new().encode_primitive(&value).is_ok());
    }
}

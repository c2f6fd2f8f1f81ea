// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! Translation of parsed statements into plan nodes.
//!
//! The transformer resolves every table reference through the storage
//! engine and evaluates the literal expressions a statement carries;
//! anything needing a real expression evaluator is left to external
//! collaborators.

use itertools::Itertools;

use super::{
    CreateTableNode, DeleteNode, DropTableNode, InsertNode, PlanError, PlanNode, SeqScanNode,
};
use crate::catalog::ColumnCatalog;
use crate::parser::{
    CharacterLength, ColumnDef, ColumnOption, DataType as AstDataType, Expr, Ident, ObjectName,
    ObjectType, Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
    UnaryOperator, Value,
};
use crate::storage::{StorageRef, TableRef};
use crate::types::{ColumnId, ConvertError, DataType, DataTypeKind, DataValue, Row};

pub struct PlanTransformer {
    storage: StorageRef,
}

impl PlanTransformer {
    pub fn new(storage: StorageRef) -> PlanTransformer {
        PlanTransformer { storage }
    }

    /// Convert one statement into a plan node.
    pub fn transform(&self, stmt: &Statement) -> Result<PlanNode, PlanError> {
        match stmt {
            Statement::CreateTable { name, columns, .. } => {
                Ok(PlanNode::CreateTable(self.transform_create_table(name, columns)?))
            }
            Statement::Insert {
                table_name,
                columns,
                source,
                ..
            } => {
                let Some(source) = source else {
                    return Err(PlanError::Unsupported("INSERT without VALUES".into()));
                };
                Ok(PlanNode::Insert(self.transform_insert(
                    table_name, columns, source,
                )?))
            }
            Statement::Query(query) => Ok(PlanNode::SeqScan(self.transform_seq_scan(query)?)),
            Statement::Delete {
                from, selection, ..
            } => Ok(PlanNode::Delete(self.transform_delete(from, selection)?)),
            Statement::Drop {
                object_type: ObjectType::Table,
                names,
                ..
            } => Ok(PlanNode::DropTable(DropTableNode {
                name: object_name(names.first().ok_or_else(|| {
                    PlanError::Unsupported("DROP TABLE without a name".into())
                })?),
            })),
            other => Err(PlanError::Unsupported(format!("{other}"))),
        }
    }

    fn transform_create_table(
        &self,
        name: &ObjectName,
        columns: &[ColumnDef],
    ) -> Result<CreateTableNode, PlanError> {
        let mut catalog = Vec::with_capacity(columns.len());
        for (id, def) in columns.iter().enumerate() {
            let column_name = def.name.value.clone();
            if catalog
                .iter()
                .any(|c: &ColumnCatalog| c.name() == column_name)
            {
                return Err(PlanError::DuplicatedColumn(column_name));
            }
            let kind = convert_data_type(&def.data_type)?;
            let not_null = def.options.iter().any(|opt| {
                matches!(
                    opt.option,
                    ColumnOption::NotNull | ColumnOption::Unique { is_primary: true, .. }
                )
            });
            catalog.push(ColumnCatalog::new(
                id as ColumnId,
                column_name,
                DataType::new(kind, !not_null),
            ));
        }
        Ok(CreateTableNode {
            name: object_name(name),
            columns: catalog,
        })
    }

    fn transform_insert(
        &self,
        table_name: &ObjectName,
        columns: &[Ident],
        source: &Query,
    ) -> Result<InsertNode, PlanError> {
        let table = self.resolve_table(table_name)?;

        // map the statement's column list (or the whole schema) onto
        // declared column ids
        let column_ids: Vec<ColumnId> = if columns.is_empty() {
            table.columns().iter().map(|col| col.id()).collect()
        } else {
            columns
                .iter()
                .map(|ident| {
                    table
                        .column_id_by_name(&ident.value)
                        .ok_or_else(|| PlanError::ColumnNotFound(ident.value.clone()))
                })
                .try_collect()?
        };
        if !column_ids.iter().all_unique() {
            return Err(PlanError::DuplicatedColumn(format!("{columns:?}")));
        }

        let SetExpr::Values(values) = &*source.body else {
            return Err(PlanError::Unsupported(
                "INSERT from a query is not supported".into(),
            ));
        };

        let mut rows = Vec::with_capacity(values.rows.len());
        for literals in &values.rows {
            if literals.len() != column_ids.len() {
                return Err(PlanError::ValueLengthMismatch {
                    expected: column_ids.len(),
                    actual: literals.len(),
                });
            }
            // build the full-width row in declared column order
            let mut row: Row = vec![DataValue::Null; table.column_count()];
            for (&column_id, expr) in column_ids.iter().zip(literals) {
                let column = &table.columns()[column_id as usize];
                row[column_id as usize] = eval_literal(expr)?.coerce_to(column.kind())?;
            }
            for column in table.columns() {
                if row[column.id() as usize].is_null() && !column.is_nullable() {
                    return Err(PlanError::NotNullableColumn(column.name().into()));
                }
            }
            rows.push(row);
        }

        Ok(InsertNode { table, rows })
    }

    fn transform_seq_scan(&self, query: &Query) -> Result<SeqScanNode, PlanError> {
        let SetExpr::Select(select) = &*query.body else {
            return Err(PlanError::Unsupported(format!("{query}")));
        };
        let table = self.resolve_scan_target(select)?;

        let column_ids = self.transform_projection(&table, &select.projection)?;

        // TODO: transform the qualifying predicate (select.selection)
        // once the expression bridge exists; scans run unfiltered until
        // then and callers may attach a predicate to the node.
        Ok(SeqScanNode {
            table,
            predicate: None,
            column_ids,
        })
    }

    fn transform_delete(
        &self,
        from: &[TableWithJoins],
        selection: &Option<Expr>,
    ) -> Result<DeleteNode, PlanError> {
        let [table_with_joins] = from else {
            return Err(PlanError::Unsupported(
                "DELETE targets exactly one base table".into(),
            ));
        };
        let TableFactor::Table { name, .. } = &table_with_joins.relation else {
            return Err(PlanError::Unsupported(format!(
                "{}",
                table_with_joins.relation
            )));
        };
        if selection.is_some() {
            return Err(PlanError::Unsupported(
                "DELETE with a WHERE clause is not supported".into(),
            ));
        }
        Ok(DeleteNode {
            table: self.resolve_table(name)?,
        })
    }

    fn transform_projection(
        &self,
        table: &TableRef,
        projection: &[SelectItem],
    ) -> Result<Vec<ColumnId>, PlanError> {
        let mut column_ids = Vec::new();
        for item in projection {
            match item {
                // all columns in id order
                SelectItem::Wildcard(_) => {
                    column_ids.extend(table.columns().iter().map(|col| col.id()));
                }
                SelectItem::UnnamedExpr(Expr::Identifier(ident))
                | SelectItem::ExprWithAlias {
                    expr: Expr::Identifier(ident),
                    ..
                } => {
                    column_ids.push(
                        table
                            .column_id_by_name(&ident.value)
                            .ok_or_else(|| PlanError::ColumnNotFound(ident.value.clone()))?,
                    );
                }
                other => return Err(PlanError::Unsupported(format!("projection {other}"))),
            }
        }
        Ok(column_ids)
    }

    fn resolve_scan_target(&self, select: &Select) -> Result<TableRef, PlanError> {
        let [table_with_joins] = &select.from[..] else {
            return Err(PlanError::Unsupported(
                "scans read exactly one base table".into(),
            ));
        };
        if !table_with_joins.joins.is_empty() {
            return Err(PlanError::Unsupported("JOIN is not supported".into()));
        }
        let TableFactor::Table { name, .. } = &table_with_joins.relation else {
            return Err(PlanError::Unsupported(format!("{}", table_with_joins.relation)));
        };
        self.resolve_table(name)
    }

    fn resolve_table(&self, name: &ObjectName) -> Result<TableRef, PlanError> {
        Ok(self.storage.get_table_by_name(&object_name(name))?)
    }
}

fn object_name(name: &ObjectName) -> String {
    name.0.iter().map(|ident| ident.value.as_str()).join(".")
}

fn convert_data_type(ty: &AstDataType) -> Result<DataTypeKind, PlanError> {
    Ok(match ty {
        AstDataType::Boolean => DataTypeKind::Bool,
        AstDataType::Int(_) | AstDataType::Integer(_) | AstDataType::SmallInt(_) => {
            DataTypeKind::Int32
        }
        AstDataType::BigInt(_) => DataTypeKind::Int64,
        AstDataType::Double
        | AstDataType::DoublePrecision
        | AstDataType::Float(_)
        | AstDataType::Real => DataTypeKind::Float64,
        AstDataType::Varchar(len)
        | AstDataType::CharacterVarying(len)
        | AstDataType::Char(len) => DataTypeKind::Varchar(char_length(len)),
        AstDataType::Text => DataTypeKind::Varchar(None),
        other => return Err(PlanError::UnsupportedType(format!("{other}"))),
    })
}

fn char_length(len: &Option<CharacterLength>) -> Option<u64> {
    match len {
        Some(CharacterLength::IntegerLength { length, .. }) => Some(*length),
        // CHAR/VARCHAR without a bound, or VARCHAR(MAX)
        Some(CharacterLength::Max) | None => None,
    }
}

/// Evaluate a literal expression to a value. Only constants and a
/// leading minus are understood; everything else belongs to the
/// expression evaluator.
fn eval_literal(expr: &Expr) -> Result<DataValue, PlanError> {
    Ok(match expr {
        Expr::Value(Value::Null) => DataValue::Null,
        Expr::Value(Value::Boolean(b)) => DataValue::Bool(*b),
        Expr::Value(Value::Number(n, _)) => parse_number(n)?,
        Expr::Value(Value::SingleQuotedString(s)) => DataValue::String(s.clone()),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match expr.as_ref() {
            // negate number literals in the text: `-9223372036854775808`
            // has no positive i64 counterpart to negate
            Expr::Value(Value::Number(n, _)) => parse_number(&format!("-{n}"))?,
            inner => match eval_literal(inner)? {
                DataValue::Int32(v) => DataValue::Int32(
                    v.checked_neg()
                        .ok_or_else(|| PlanError::InvalidExpression(format!("-({v})")))?,
                ),
                DataValue::Int64(v) => DataValue::Int64(
                    v.checked_neg()
                        .ok_or_else(|| PlanError::InvalidExpression(format!("-({v})")))?,
                ),
                DataValue::Float64(v) => DataValue::Float64(-v),
                other => {
                    return Err(PlanError::InvalidExpression(format!("-{other:?}")));
                }
            },
        },
        other => return Err(PlanError::InvalidExpression(format!("{other}"))),
    })
}

fn parse_number(n: &str) -> Result<DataValue, ConvertError> {
    if n.contains(['.', 'e', 'E']) {
        let v = n
            .parse::<f64>()
            .map_err(|e| ConvertError::ParseFloat(n.into(), e))?;
        Ok(DataValue::Float64(v))
    } else if let Ok(v) = n.parse::<i32>() {
        Ok(DataValue::Int32(v))
    } else {
        let v = n
            .parse::<i64>()
            .map_err(|e| ConvertError::ParseInt(n.into(), e))?;
        Ok(DataValue::Int64(v))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::parse;
    use crate::storage::StorageEngine;
    use crate::types::DataTypeExt;

    fn engine_with_table() -> StorageRef {
        let storage = Arc::new(StorageEngine::in_memory());
        storage
            .create_table(
                "t",
                vec![
                    DataTypeKind::Int32.not_null().to_column(0, "id"),
                    DataTypeKind::Varchar(Some(8)).nullable().to_column(1, "name"),
                ],
                None,
            )
            .unwrap();
        storage
    }

    fn transform_one(storage: &StorageRef, sql: &str) -> Result<PlanNode, PlanError> {
        let stmts = parse(sql).unwrap();
        PlanTransformer::new(storage.clone()).transform(&stmts[0])
    }

    #[test]
    fn create_table_collects_columns() {
        let storage = Arc::new(StorageEngine::in_memory());
        let plan = transform_one(
            &storage,
            "create table s(a int not null, b varchar(15), c double, d boolean)",
        )
        .unwrap();
        let PlanNode::CreateTable(node) = plan else {
            panic!("expected create table, got {plan:?}")
        };
        assert_eq!(node.name, "s");
        assert_eq!(node.columns.len(), 4);
        assert_eq!(node.columns[0].kind(), DataTypeKind::Int32);
        assert!(!node.columns[0].is_nullable());
        assert_eq!(node.columns[1].kind(), DataTypeKind::Varchar(Some(15)));
        assert!(node.columns[1].is_nullable());
        assert_eq!(node.columns[3].kind(), DataTypeKind::Bool);
    }

    #[test]
    fn insert_values_are_coerced_in_declared_order() {
        let storage = engine_with_table();
        let plan = transform_one(&storage, "insert into t values (1, 'a'), (-2, 'bb')").unwrap();
        let PlanNode::Insert(node) = plan else {
            panic!("expected insert, got {plan:?}")
        };
        assert_eq!(node.rows.len(), 2);
        assert_eq!(
            node.rows[1],
            vec![DataValue::Int32(-2), DataValue::String("bb".into())]
        );
    }

    #[test]
    fn insert_with_reordered_column_list() {
        let storage = engine_with_table();
        let plan = transform_one(&storage, "insert into t (name, id) values ('a', 1)").unwrap();
        let PlanNode::Insert(node) = plan else {
            panic!("expected insert, got {plan:?}")
        };
        assert_eq!(
            node.rows[0],
            vec![DataValue::Int32(1), DataValue::String("a".into())]
        );
    }

    #[test]
    fn insert_rejects_bad_shapes() {
        let storage = engine_with_table();
        assert!(matches!(
            transform_one(&storage, "insert into t values (1)"),
            Err(PlanError::ValueLengthMismatch { .. })
        ));
        assert!(matches!(
            transform_one(&storage, "insert into t (id, wrong) values (1, 'a')"),
            Err(PlanError::ColumnNotFound(_))
        ));
        assert!(matches!(
            transform_one(&storage, "insert into t (name) values ('a')"),
            Err(PlanError::NotNullableColumn(_))
        ));
        assert!(matches!(
            transform_one(&storage, "insert into missing values (1, 'a')"),
            Err(PlanError::Storage(_))
        ));
    }

    #[test]
    fn select_star_projects_all_columns() {
        let storage = engine_with_table();
        let plan = transform_one(&storage, "select * from t").unwrap();
        let PlanNode::SeqScan(node) = plan else {
            panic!("expected seq scan, got {plan:?}")
        };
        assert_eq!(node.column_ids, vec![0, 1]);
        assert!(node.predicate.is_none());
    }

    #[test]
    fn select_projects_named_columns() {
        let storage = engine_with_table();
        let plan = transform_one(&storage, "select name, id from t").unwrap();
        let PlanNode::SeqScan(node) = plan else {
            panic!("expected seq scan, got {plan:?}")
        };
        assert_eq!(node.column_ids, vec![1, 0]);
    }

    #[test]
    fn delete_without_predicate() {
        let storage = engine_with_table();
        assert!(matches!(
            transform_one(&storage, "delete from t").unwrap(),
            PlanNode::Delete(_)
        ));
        assert!(matches!(
            transform_one(&storage, "delete from t where id = 1"),
            Err(PlanError::Unsupported(_))
        ));
    }

    #[test]
    fn unsupported_statements_are_reported() {
        let storage = engine_with_table();
        assert!(matches!(
            transform_one(&storage, "update t set id = 1"),
            Err(PlanError::Unsupported(_))
        ));
    }
}

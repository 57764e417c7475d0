use crate::domain::model::TableDef;
use std::collections::{BTreeMap, BTreeSet};

/// Indices of `tables` with referenced tables before the tables that
/// reference them. Ties are broken by name. Self references and references to
/// tables outside the list are ignored. Tables caught in a cycle come last,
/// in name order.
pub fn dependency_order(tables: &[TableDef]) -> Vec<usize> {
    let by_name: BTreeMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.as_str(), i))
        .collect();

    // dependents[i] = tables that reference table i
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); tables.len()];
    let mut pending: Vec<usize> = vec![0; tables.len()];

    for (i, table) in tables.iter().enumerate() {
        let parents: BTreeSet<usize> = table
            .references
            .iter()
            .filter_map(|r| by_name.get(r.as_str()).copied())
            .filter(|&p| p != i)
            .collect();
        pending[i] = parents.len();
        for p in parents {
            dependents[p].insert(i);
        }
    }

    let name_key = |i: usize| (tables[i].name.as_str(), i);
    let mut ready: BTreeSet<(&str, usize)> = (0..tables.len())
        .filter(|&i| pending[i] == 0)
        .map(name_key)
        .collect();

    let mut order = Vec::with_capacity(tables.len());
    while let Some(next) = ready.pop_first() {
        let (_, i) = next;
        order.push(i);
        for &d in &dependents[i] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.insert(name_key(d));
            }
        }
    }

    if order.len() < tables.len() {
        let mut cyclic: Vec<usize> = (0..tables.len()).filter(|&i| pending[i] > 0).collect();
        cyclic.sort_by_key(|&i| name_key(i));
        tracing::warn!(
            tables = ?cyclic.iter().map(|&i| tables[i].name.as_str()).collect::<Vec<_>>(),
            "Foreign key cycle, copying these tables in name order"
        );
        order.extend(cyclic);
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, refs: &[&str]) -> TableDef {
        TableDef::new(name, vec![]).with_references(refs.iter().map(|r| r.to_string()).collect())
    }

    fn names(tables: &[TableDef], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| tables[i].name.clone()).collect()
    }

    #[test]
    fn test_parents_come_first() {
        let tables = vec![
            table("orders", &["users", "products"]),
            table("users", &[]),
            table("order_items", &["orders", "products"]),
            table("products", &[]),
        ];
        let order = dependency_order(&tables);
        assert_eq!(
            names(&tables, &order),
            vec!["products", "users", "orders", "order_items"]
        );
    }

    #[test]
    fn test_self_reference_is_ignored() {
        let tables = vec![table("employees", &["employees"]), table("a", &[])];
        let order = dependency_order(&tables);
        assert_eq!(names(&tables, &order), vec!["a", "employees"]);
    }

    #[test]
    fn test_cycles_are_appended_in_name_order() {
        let tables = vec![
            table("b", &["a"]),
            table("a", &["b"]),
            table("standalone", &[]),
            table("child", &["a"]),
        ];
        let order = dependency_order(&tables);
        assert_eq!(names(&tables, &order), vec!["standalone", "a", "b", "child"]);
    }

    #[test]
    fn test_unknown_references_are_ignored() {
        let tables = vec![table("t", &["elsewhere"])];
        assert_eq!(dependency_order(&tables), vec![0]);
    }
}

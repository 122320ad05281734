use crate::error::WarnCode;
use crate::sync::warn;
use indexmap::IndexMap;
use std::collections::HashSet;

/// What a merge did to one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Inserted,
    Updated(Vec<&'static str>),
    Unchanged,
}

impl Change {
    pub fn from_fields(fields: Vec<&'static str>) -> Self {
        if fields.is_empty() {
            Self::Unchanged
        } else {
            Self::Updated(fields)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Merged<R> {
    pub record: R,
    pub change: Change,
}

impl<R> Merged<R> {
    pub fn map<T>(self, f: impl FnOnce(R) -> T) -> Merged<T> {
        Merged {
            record: f(self.record),
            change: self.change,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub outcomes: IndexMap<String, Change>,
    pub carried_forward: Vec<String>,
    pub duplicates: Vec<String>,
}

impl ReconcileReport {
    pub fn inserted(&self) -> Vec<&str> {
        self.names_where(|c| matches!(c, Change::Inserted))
    }

    pub fn updated(&self) -> Vec<&str> {
        self.names_where(|c| matches!(c, Change::Updated(_)))
    }

    pub fn unchanged(&self) -> Vec<&str> {
        self.names_where(|c| matches!(c, Change::Unchanged))
    }

    fn names_where(&self, pred: impl Fn(&Change) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, change)| pred(change))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled<R> {
    pub entities: IndexMap<String, R>,
    pub report: ReconcileReport,
}

/// Seed the result with every prior entity, in its stored order.
pub fn carry_forward<R: Clone>(prior: &IndexMap<String, R>) -> IndexMap<String, R> {
    prior
        .iter()
        .map(|(name, record)| (name.clone(), record.clone()))
        .collect()
}

/// Prior entities the current sheet pass did not mention.
pub fn carried_names<R>(prior: &IndexMap<String, R>, seen: &HashSet<String>) -> Vec<String> {
    prior
        .keys()
        .filter(|name| !seen.contains(*name))
        .cloned()
        .collect()
}

/// Fold candidates into the carried-forward prior state.
///
/// `merge` sees the entity's current record: the stored one on first
/// appearance, or the record produced by an earlier row of the same pass.
/// Existing keys keep their position; new keys append.
pub fn reconcile<R, C, I, F>(
    stage: &str,
    prior: &IndexMap<String, R>,
    candidates: I,
    mut merge: F,
) -> Reconciled<R>
where
    R: Clone,
    I: IntoIterator<Item = (String, C)>,
    F: FnMut(&str, Option<&R>, C) -> Merged<R>,
{
    let mut entities = carry_forward(prior);
    let mut report = ReconcileReport::default();
    let mut seen = HashSet::new();

    for (name, candidate) in candidates {
        if !seen.insert(name.clone()) {
            warn::emit(
                WarnCode::W006DuplicateEntity,
                stage,
                &name,
                "name appears more than once; the later row wins",
                "",
            );
            report.duplicates.push(name.clone());
        }

        let merged = merge(&name, entities.get(&name), candidate);
        let inserted_earlier = matches!(report.outcomes.get(&name), Some(Change::Inserted));
        if !inserted_earlier {
            report.outcomes.insert(name.clone(), merged.change);
        }
        entities.insert(name, merged.record);
    }

    report.carried_forward = carried_names(prior, &seen);
    Reconciled { entities, report }
}

#[cfg(test)]
mod tests {
    use super::{Change, Merged, carried_names, reconcile};
    use indexmap::IndexMap;
    use std::collections::HashSet;

    fn replace(_name: &str, prior: Option<&String>, candidate: String) -> Merged<String> {
        let change = match prior {
            None => Change::Inserted,
            Some(old) if *old == candidate => Change::Unchanged,
            Some(_) => Change::Updated(vec!["value"]),
        };
        Merged {
            record: candidate,
            change,
        }
    }

    fn prior() -> IndexMap<String, String> {
        let mut map = IndexMap::new();
        map.insert("Alpha".to_string(), "a".to_string());
        map.insert("Beta".to_string(), "b".to_string());
        map.insert("Gamma".to_string(), "g".to_string());
        map
    }

    #[test]
    fn absent_entities_are_carried_forward_in_order() {
        let prior = prior();
        let out = reconcile(
            "test",
            &prior,
            vec![
                ("Beta".to_string(), "b2".to_string()),
                ("Delta".to_string(), "d".to_string()),
            ],
            replace,
        );

        let keys: Vec<&str> = out.entities.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Alpha", "Beta", "Gamma", "Delta"]);
        assert_eq!(out.entities["Alpha"], "a");
        assert_eq!(out.entities["Gamma"], "g");
        assert_eq!(out.entities["Beta"], "b2");
        assert_eq!(out.report.carried_forward, vec!["Alpha", "Gamma"]);
        assert_eq!(out.report.inserted(), vec!["Delta"]);
        assert_eq!(out.report.updated(), vec!["Beta"]);
    }

    #[test]
    fn empty_pass_keeps_prior_untouched() {
        let prior = prior();
        let out = reconcile("test", &prior, Vec::<(String, String)>::new(), replace);
        assert_eq!(out.entities, prior);
        assert_eq!(out.report.carried_forward.len(), 3);
        assert!(out.report.outcomes.is_empty());
    }

    #[test]
    fn duplicate_rows_merge_against_the_earlier_row() {
        let prior = IndexMap::new();
        let out = reconcile(
            "test",
            &prior,
            vec![
                ("Alpha".to_string(), "first".to_string()),
                ("Alpha".to_string(), "second".to_string()),
            ],
            replace,
        );
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities["Alpha"], "second");
        assert_eq!(out.report.outcomes["Alpha"], Change::Inserted);
        assert_eq!(out.report.duplicates, vec!["Alpha"]);
    }

    #[test]
    fn carried_names_lists_unseen_prior_keys() {
        let prior = prior();
        let seen: HashSet<String> = ["Gamma".to_string()].into_iter().collect();
        assert_eq!(carried_names(&prior, &seen), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn change_from_fields() {
        assert_eq!(Change::from_fields(Vec::new()), Change::Unchanged);
        assert_eq!(
            Change::from_fields(vec!["codes"]),
            Change::Updated(vec!["codes"])
        );
    }
}

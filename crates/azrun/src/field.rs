//! # Field Resolver
//!
//! Turns a record's raw field declarations into the flat list of bindable
//! fields, applying promotion and conflict rules.
//!
//! ## Rules
//!
//! - Fields are collected breadth-first. Untagged embedded records promote their
//!   fields one level deeper than the embedding field.
//! - A field's external name is its tag if it has one, otherwise its derived name.
//! - Among fields sharing an external name, the shallowest wins. At equal depth a
//!   single tagged field beats untagged ones; any other tie drops the name.
//! - An embedded record type is walked once; later occurrences are skipped.
//! - Lookup prefers an exact match on a tagged name, then a case-insensitive
//!   match on an untagged one.
//!
//! Results are a pure function of the type, so `FieldCache` computes them once
//! per type and shares them between invocations.

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use azpack::FieldDecl;
use azpack::Hints;
use azpack::Record;
use dashmap::DashMap;

/// A resolved binding target inside a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub tagged: bool,
    /// Index path through embedded records, as accepted by `Record::slot`.
    pub path: Vec<usize>,
    pub type_name: &'static str,
    pub hints: Hints,
}

impl Field {
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

struct Pending {
    path: Vec<usize>,
    type_id: TypeId,
    decls: Vec<FieldDecl>,
}

/// Resolves the bindable fields of a record with the given declarations.
pub fn resolve(root_type: TypeId, root: Vec<FieldDecl>) -> Vec<Field> {
    let mut visited = HashSet::new();
    let mut candidates = Vec::new();
    let mut next = vec![Pending {
        path: Vec::new(),
        type_id: root_type,
        decls: root,
    }];

    while !next.is_empty() {
        for pending in std::mem::take(&mut next) {
            if !visited.insert(pending.type_id) {
                continue;
            }
            for (index, decl) in pending.decls.into_iter().enumerate() {
                let mut path = pending.path.clone();
                path.push(index);
                match decl.embedded {
                    Some(embedded) => next.push(Pending {
                        path,
                        type_id: embedded.type_id,
                        decls: (embedded.fields)(),
                    }),
                    None => candidates.push(Field {
                        name: decl.tag.unwrap_or(decl.name).to_string(),
                        tagged: decl.tag.is_some(),
                        path,
                        type_name: decl.type_name,
                        hints: decl.hints,
                    }),
                }
            }
        }
    }

    dominant(candidates)
}

fn dominant(candidates: Vec<Field>) -> Vec<Field> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, field) in candidates.iter().enumerate() {
        groups.entry(field.name.as_str()).or_default().push(i);
    }

    let mut keep = Vec::new();
    for indices in groups.values() {
        let Some(min) = indices.iter().map(|&i| candidates[i].depth()).min() else {
            continue;
        };
        let shallow: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| candidates[i].depth() == min)
            .collect();

        if let [only] = shallow.as_slice() {
            keep.push(*only);
            continue;
        }
        let tagged: Vec<usize> = shallow.into_iter().filter(|&i| candidates[i].tagged).collect();
        if let [only] = tagged.as_slice() {
            keep.push(*only);
        } else {
            tracing::debug!(name = %candidates[indices[0]].name, "dropping ambiguous field");
        }
    }

    keep.sort_by(|&a, &b| candidates[a].path.cmp(&candidates[b].path));
    keep.into_iter().map(|i| candidates[i].clone()).collect()
}

/// Finds the field answering to a binding name.
pub fn lookup<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields
        .iter()
        .find(|f| f.tagged && f.name == name)
        .or_else(|| fields.iter().find(|f| !f.tagged && eq_fold(&f.name, name)))
}

fn eq_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Insert-once, read-many store of resolved fields keyed by record type.
#[derive(Default)]
pub struct FieldCache {
    entries: DashMap<TypeId, Arc<[Field]>>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields_of<T: Record>(&self) -> Arc<[Field]> {
        self.fields(T::record_type(), T::fields)
    }

    pub fn fields(&self, type_id: TypeId, decls: fn() -> Vec<FieldDecl>) -> Arc<[Field]> {
        if let Some(hit) = self.entries.get(&type_id) {
            return hit.value().clone();
        }
        let resolved: Arc<[Field]> = resolve(type_id, decls()).into();
        self.entries.entry(type_id).or_insert(resolved).value().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

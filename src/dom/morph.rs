//! Keyed reconciliation of a container's element children

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use super::{Document, NodeId};

/// What a [`reconcile`] pass did to the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MorphStats {
    pub inserted: usize,
    pub moved: usize,
    pub removed: usize,
    /// Kept nodes whose attributes or content were patched.
    pub updated: usize,
}

impl MorphStats {
    pub fn is_noop(&self) -> bool {
        *self == MorphStats::default()
    }
}

/// Make the element children of `container` equal `new_nodes`, in order.
///
/// Nodes are matched by `key`. A matched old node survives (same [`NodeId`])
/// and is patched from its replacement, which is then discarded. Old nodes
/// without a match are discarded, unmatched new nodes are inserted. Matched
/// nodes lying on a longest increasing run of old positions stay in place;
/// only the rest are moved. Non-element children are left where they are.
pub fn reconcile<K, F>(
    doc: &mut Document,
    container: NodeId,
    new_nodes: &[NodeId],
    key: F,
) -> MorphStats
where
    K: Eq + Hash,
    F: Fn(&Document, NodeId) -> Option<K>,
{
    let mut stats = MorphStats::default();
    let mut stale = Vec::new();

    let mut old_by_key: HashMap<K, (usize, NodeId)> = HashMap::new();
    for (index, node) in doc.element_children(container).into_iter().enumerate() {
        match key(doc, node) {
            Some(k) => match old_by_key.entry(k) {
                Entry::Vacant(slot) => {
                    slot.insert((index, node));
                }
                Entry::Occupied(_) => stale.push(node),
            },
            None => stale.push(node),
        }
    }

    // (node, old position) in final order; fresh nodes have no old position
    let mut target: Vec<(NodeId, Option<usize>)> = Vec::with_capacity(new_nodes.len());
    for &fresh in new_nodes {
        let matched = key(doc, fresh).and_then(|k| old_by_key.remove(&k));
        match matched {
            Some((index, existing)) if existing == fresh => target.push((existing, Some(index))),
            Some((index, existing)) if doc.tag(existing) == doc.tag(fresh) => {
                if morph_node(doc, existing, fresh) {
                    stats.updated += 1;
                }
                doc.discard(fresh);
                target.push((existing, Some(index)));
            }
            Some((_, existing)) => {
                stale.push(existing);
                target.push((fresh, None));
            }
            None => target.push((fresh, None)),
        }
    }

    stale.extend(old_by_key.into_values().map(|(_, node)| node));
    for node in stale {
        doc.discard(node);
        stats.removed += 1;
    }

    let kept: Vec<(usize, usize)> = target
        .iter()
        .enumerate()
        .filter_map(|(pos, &(_, old))| old.map(|o| (pos, o)))
        .collect();
    let old_positions: Vec<usize> = kept.iter().map(|&(_, o)| o).collect();
    let stationary: HashSet<usize> = longest_increasing_subsequence(&old_positions)
        .into_iter()
        .map(|i| kept[i].0)
        .collect();

    // place back to front so every anchor is already final
    let mut anchor = None;
    for (pos, &(node, old)) in target.iter().enumerate().rev() {
        if !stationary.contains(&pos) {
            doc.insert_before(container, node, anchor);
            if old.is_some() {
                stats.moved += 1;
            } else {
                stats.inserted += 1;
            }
        }
        anchor = Some(node);
    }

    stats
}

/// Patch `existing` so it renders like `fresh`. Only differing attributes are
/// written. Returns whether anything changed.
fn morph_node(doc: &mut Document, existing: NodeId, fresh: NodeId) -> bool {
    let mut changed = false;

    let fresh_attrs = doc.attrs(fresh).to_vec();
    for (name, value) in &fresh_attrs {
        changed |= doc.set_attr(existing, name, value);
    }
    let dropped: Vec<String> = doc
        .attrs(existing)
        .iter()
        .filter(|(name, _)| !fresh_attrs.iter().any(|(n, _)| n == name))
        .map(|(name, _)| name.clone())
        .collect();
    for name in dropped {
        changed |= doc.remove_attr(existing, &name);
    }

    if doc.inner_html(existing) != doc.inner_html(fresh) {
        let children = doc.children(fresh).to_vec();
        doc.replace_children(existing, children);
        changed = true;
    }

    changed
}

/// Indices into `seq` of one longest strictly increasing subsequence.
fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k]: index of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        let at = tails.partition_point(|&t| seq[t] < value);
        if at > 0 {
            prev[i] = Some(tails[at - 1]);
        }
        if at == tails.len() {
            tails.push(i);
        } else {
            tails[at] = i;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        run.push(i);
        cursor = prev[i];
    }
    run.reverse();
    run
}

//! Resolves a document outline into a sparse page → hierarchy map.
//!
//! Destinations are resolved in this order: an explicit page destination;
//! a named destination looked up in the catalog `/Dests` dictionary, then in
//! the `/Names` destination tree, then parsed as a 1-based page number; and
//! only when the entry has no destination at all, the destination wrapped
//! in a GoTo action.

use crate::models::{HierarchyPath, PageHierarchyMap};
use std::collections::HashMap;
use tracing::debug;

/// Object reference of a page, as (object number, generation).
pub type PageRef = (u32, u16);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Page(PageRef),
    Named(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    pub destination: Option<Destination>,
    /// Destination wrapped by a GoTo action.
    pub go_to: Option<Destination>,
    pub children: Vec<OutlineEntry>,
}

impl OutlineEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_go_to(mut self, destination: Destination) -> Self {
        self.go_to = Some(destination);
        self
    }

    pub fn with_children(mut self, children: Vec<OutlineEntry>) -> Self {
        self.children = children;
        self
    }
}

/// Lookup tables a document provides for turning destinations into pages.
#[derive(Debug, Clone, Default)]
pub struct DestinationIndex {
    pub page_count: u32,
    pub page_numbers: HashMap<PageRef, u32>,
    /// Catalog `/Dests` dictionary.
    pub catalog: HashMap<String, Destination>,
    /// Flattened `/Names /Dests` name tree.
    pub names: HashMap<String, Destination>,
}

impl DestinationIndex {
    pub fn resolve(&self, destination: &Destination) -> Option<u32> {
        match destination {
            Destination::Page(page) => self.page_numbers.get(page).copied(),
            Destination::Named(name) => self.resolve_named(name),
        }
    }

    fn resolve_named(&self, name: &str) -> Option<u32> {
        let looked_up = self
            .catalog
            .get(name)
            .or_else(|| self.names.get(name));

        match looked_up {
            Some(Destination::Page(page)) => self.page_numbers.get(page).copied(),
            // A name that maps to another name is not followed.
            Some(Destination::Named(_)) => None,
            None => name
                .parse::<u32>()
                .ok()
                .filter(|page| *page >= 1 && *page <= self.page_count),
        }
    }

    pub fn resolve_entry(&self, entry: &OutlineEntry) -> Option<u32> {
        match (&entry.destination, &entry.go_to) {
            (Some(destination), _) => self.resolve(destination),
            (None, Some(action)) => self.resolve(action),
            (None, None) => None,
        }
    }
}

/// Walks the outline depth-first (each node before its children, siblings in
/// order). When two nodes land on the same page the later one wins.
pub fn resolve_outline(entries: &[OutlineEntry], index: &DestinationIndex) -> PageHierarchyMap {
    let mut hierarchy = PageHierarchyMap::new();
    let mut path = Vec::new();
    walk(entries, index, &mut path, &mut hierarchy);
    hierarchy
}

fn walk<'a>(
    entries: &'a [OutlineEntry],
    index: &DestinationIndex,
    path: &mut Vec<&'a str>,
    hierarchy: &mut PageHierarchyMap,
) {
    for entry in entries {
        path.push(entry.title.as_str());
        let indent = "  ".repeat(path.len() - 1);

        match index.resolve_entry(entry) {
            Some(page) => {
                let resolved = HierarchyPath::from_titles(path.as_slice());
                debug!("{indent}{} [page {page}] {}", entry.title, resolved.display());
                hierarchy.insert(page, resolved);
            }
            None => debug!("{indent}{} [unresolved]", entry.title),
        }

        walk(&entry.children, index, path, hierarchy);
        path.pop();
    }
}

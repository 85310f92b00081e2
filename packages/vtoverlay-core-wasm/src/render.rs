//! Drawing surface abstraction.
//!
//! The layer only ever asks a surface for three things: a fresh group per
//! tile, one element per feature inside that group, and removal of a whole
//! group when its tile goes away. `MemorySurface` keeps everything in plain
//! Rust structures for headless hosts and tests; the browser surface lives in
//! `js_overlay`.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::config::ClickHook;
use crate::error::OverlayError;
use crate::features::{Feature, FeatureId};

/// Attributes for one drawable element, identical for every feature of a
/// layer apart from the path data.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementSpec<'a> {
    pub element_name: &'a str,
    pub path: Option<String>,
    pub transform: Option<&'a str>,
    pub class_name: Option<&'a str>,
    pub style: Option<&'a str>,
}

pub trait RenderSurface {
    /// Handle to the node group holding one tile's elements.
    type Group;
    /// Handle to a single drawn element, handed to the `each` hook.
    type Node: Clone + 'static;

    fn create_group(&mut self, tile_key: &str) -> Result<Self::Group, OverlayError>;

    fn append_element(
        &mut self,
        group: &mut Self::Group,
        spec: &ElementSpec<'_>,
        feature: Rc<Feature>,
        on_click: ClickHook,
    ) -> Result<Self::Node, OverlayError>;

    /// Removes the group and every element in it.
    fn remove_group(&mut self, group: Self::Group);

    /// Shows or hides the whole container.
    fn set_display(&mut self, visible: bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupId(u64);

pub struct MemoryElement {
    pub id: u64,
    pub tile_key: String,
    pub element_name: String,
    pub path: Option<String>,
    pub transform: Option<String>,
    pub class_name: Option<String>,
    pub style: Option<String>,
    pub feature: Rc<Feature>,
    on_click: ClickHook,
}

impl MemoryElement {
    /// Simulates a click on the element.
    pub fn click(&self) {
        (self.on_click)(&*self.feature)
    }
}

impl std::fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryElement")
            .field("id", &self.id)
            .field("tile_key", &self.tile_key)
            .field("element_name", &self.element_name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

pub type MemoryNode = Rc<MemoryElement>;

#[derive(Debug)]
struct MemoryGroup {
    tile_key: String,
    elements: Vec<MemoryNode>,
}

#[derive(Debug)]
pub struct MemorySurface {
    groups: BTreeMap<GroupId, MemoryGroup>,
    next_id: u64,
    displayed: bool,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
            next_id: 0,
            displayed: true,
        }
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn elements(&self) -> impl Iterator<Item = &MemoryNode> {
        self.groups.values().flat_map(|g| g.elements.iter())
    }

    pub fn element_count(&self) -> usize {
        self.elements().count()
    }

    /// Every live element drawing the feature with `id`.
    pub fn elements_for(&self, id: &FeatureId) -> Vec<&MemoryNode> {
        self.elements()
            .filter(|e| e.feature.id.as_ref() == Some(id))
            .collect()
    }

    pub fn elements_in_tile(&self, tile_key: &str) -> Vec<&MemoryNode> {
        self.groups
            .values()
            .filter(|g| g.tile_key == tile_key)
            .flat_map(|g| g.elements.iter())
            .collect()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderSurface for MemorySurface {
    type Group = GroupId;
    type Node = MemoryNode;

    fn create_group(&mut self, tile_key: &str) -> Result<GroupId, OverlayError> {
        let id = GroupId(self.next_id());
        self.groups.insert(
            id,
            MemoryGroup {
                tile_key: tile_key.to_string(),
                elements: Vec::new(),
            },
        );
        Ok(id)
    }

    fn append_element(
        &mut self,
        group_id: &mut GroupId,
        spec: &ElementSpec<'_>,
        feature: Rc<Feature>,
        on_click: ClickHook,
    ) -> Result<MemoryNode, OverlayError> {
        let key = *group_id;
        let id = self.next_id();
        let group = self
            .groups
            .get_mut(&key)
            .ok_or_else(|| OverlayError::Js(format!("group {:?} was removed", key)))?;
        let node = Rc::new(MemoryElement {
            id,
            tile_key: group.tile_key.clone(),
            element_name: spec.element_name.to_string(),
            path: spec.path.clone(),
            transform: spec.transform.map(str::to_string),
            class_name: spec.class_name.map(str::to_string),
            style: spec.style.map(str::to_string),
            feature,
            on_click,
        });
        group.elements.push(Rc::clone(&node));
        Ok(node)
    }

    fn remove_group(&mut self, group: GroupId) {
        self.groups.remove(&group);
    }

    fn set_display(&mut self, visible: bool) {
        self.displayed = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Geometry};
    use std::cell::Cell;

    fn spec() -> ElementSpec<'static> {
        ElementSpec {
            element_name: "path",
            path: Some("M0,0L1,1".to_string()),
            transform: None,
            class_name: Some("road"),
            style: None,
        }
    }

    #[test]
    fn test_groups_own_their_elements() {
        let mut surface = MemorySurface::new();
        let mut group = surface.create_group("2 3 5").unwrap();
        let feature = Rc::new(Feature::new(
            Some(FeatureId::from("a")),
            Geometry::Point(point!(x: 0.0, y: 0.0)),
        ));
        let node = surface
            .append_element(&mut group, &spec(), feature, Rc::new(|_: &Feature| {}))
            .unwrap();
        assert_eq!(node.class_name.as_deref(), Some("road"));
        assert_eq!(surface.elements_for(&FeatureId::from("a")).len(), 1);
        assert_eq!(surface.elements_in_tile("2 3 5").len(), 1);

        surface.remove_group(group);
        assert_eq!(surface.element_count(), 0);
        assert_eq!(surface.group_count(), 0);
    }

    #[test]
    fn test_click_reaches_hook() {
        let mut surface = MemorySurface::new();
        let mut group = surface.create_group("0 0 0").unwrap();
        let clicks = Rc::new(Cell::new(0));
        let counter = Rc::clone(&clicks);
        let feature = Rc::new(Feature::new(None, Geometry::Point(point!(x: 0.0, y: 0.0))));
        let node = surface
            .append_element(
                &mut group,
                &spec(),
                feature,
                Rc::new(move |_: &Feature| counter.set(counter.get() + 1)),
            )
            .unwrap();
        node.click();
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn test_display_toggle() {
        let mut surface = MemorySurface::new();
        assert!(surface.is_displayed());
        surface.set_display(false);
        assert!(!surface.is_displayed());
    }
}

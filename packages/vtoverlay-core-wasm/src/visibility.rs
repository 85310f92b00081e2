//! Combines named visibility conditions into a single shown/hidden state.
//!
//! Every condition must hold for the layer to be visible; with no conditions
//! recorded the layer is visible. A transition is reported only when the
//! combined state actually flips, so callers can hang side effects (toggling
//! the container, forcing a redraw) off the return value without debouncing.

use std::collections::BTreeMap;

/// Namespace used for the zoom range condition.
pub const ZOOM_CONDITION: &str = "zoom";
/// Namespace used by the layer level show/hide toggle.
pub const LAYER_CONDITION: &str = "layer";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Show,
    Hide,
}

impl Transition {
    pub fn is_show(self) -> bool {
        matches!(self, Transition::Show)
    }
}

#[derive(Clone, Debug)]
pub struct VisibilityGate {
    conditions: BTreeMap<String, bool>,
    visible: bool,
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityGate {
    pub fn new() -> Self {
        Self {
            conditions: BTreeMap::new(),
            visible: true,
        }
    }

    /// Records `namespace` and returns the transition it caused, if any.
    pub fn set_condition(&mut self, namespace: &str, visible: bool) -> Option<Transition> {
        self.conditions.insert(namespace.to_string(), visible);
        let now_visible = self.conditions.values().all(|v| *v);
        let was_visible = self.visible;
        self.visible = now_visible;

        match (was_visible, now_visible) {
            (false, true) => Some(Transition::Show),
            (true, false) => Some(Transition::Hide),
            _ => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_gate_is_visible() {
        let gate = VisibilityGate::new();
        assert!(gate.is_visible());
    }

    #[test]
    fn test_conditions_combine_with_and() {
        let mut gate = VisibilityGate::new();
        assert_eq!(gate.set_condition("zoom", true), None);
        assert_eq!(gate.set_condition("manual", false), Some(Transition::Hide));
        assert!(!gate.is_visible());

        // Flipping the only false condition opens the gate exactly once
        assert_eq!(gate.set_condition("manual", true), Some(Transition::Show));
        assert!(gate.is_visible());
        assert_eq!(gate.set_condition("manual", true), None);
    }

    #[test]
    fn test_no_transition_while_another_condition_blocks() {
        let mut gate = VisibilityGate::new();
        gate.set_condition("zoom", false);
        assert_eq!(gate.set_condition("manual", false), None);
        assert_eq!(gate.set_condition("zoom", true), None);
        assert!(!gate.is_visible());
        assert_eq!(gate.set_condition("manual", true), Some(Transition::Show));
    }

    #[test]
    fn test_overwriting_a_condition() {
        let mut gate = VisibilityGate::new();
        assert_eq!(gate.set_condition(ZOOM_CONDITION, false), Some(Transition::Hide));
        assert_eq!(gate.set_condition(ZOOM_CONDITION, false), None);
        assert_eq!(gate.set_condition(LAYER_CONDITION, true), None);
        assert_eq!(gate.set_condition(ZOOM_CONDITION, true), Some(Transition::Show));
    }
}

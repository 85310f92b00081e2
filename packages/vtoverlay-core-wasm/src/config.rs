//! Layer configuration.
//!
//! Plain data options are deserialized straight from the JS options object;
//! function-valued options live in [`LayerHooks`] and default to no-ops.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::OverlayError;
use crate::features::Feature;

pub const DEFAULT_ELEMENT_NAME: &str = "path";
pub const DEFAULT_POINT_RADIUS: f64 = 4.5;

fn default_element_name() -> String {
    DEFAULT_ELEMENT_NAME.to_string()
}

fn default_point_radius() -> f64 {
    DEFAULT_POINT_RADIUS
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerOptions {
    /// Tile URL template, e.g. `https://{s}.example.com/{z}/{x}/{y}.pbf`
    pub url: String,
    pub subdomains: Vec<String>,
    /// Flip y for TMS servers
    pub tms: bool,
    /// Disable wrapping of x into the world
    pub no_wrap: bool,
    /// Inclusive [min, max] zoom range the layer is shown in
    pub zoom_limits: Option<(u32, u32)>,
    /// Keep raw responses in memory for the lifetime of the layer
    pub cache: bool,
    /// Name of the layer to extract from each tile payload
    pub layer_name: String,
    #[serde(default = "default_element_name")]
    pub element_name: String,
    pub transform: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub style: Option<String>,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_point_radius")]
    pub point_radius: f64,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            tms: false,
            no_wrap: false,
            zoom_limits: None,
            cache: false,
            layer_name: String::new(),
            element_name: default_element_name(),
            transform: None,
            class_name: None,
            style: None,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            point_radius: default_point_radius(),
        }
    }
}

impl LayerOptions {
    pub fn validate(&self) -> Result<(), OverlayError> {
        if self.url.trim().is_empty() {
            return Err(OverlayError::Config("url template is empty".to_string()));
        }
        if self.layer_name.trim().is_empty() {
            return Err(OverlayError::Config("layerName is empty".to_string()));
        }
        if self.element_name.trim().is_empty() {
            return Err(OverlayError::Config("elementName is empty".to_string()));
        }
        if let Some((min, max)) = self.zoom_limits {
            if min > max {
                return Err(OverlayError::Config(format!(
                    "zoomLimits [{}, {}] has min above max",
                    min, max
                )));
            }
        }
        if !self.point_radius.is_finite() || self.point_radius < 0.0 {
            return Err(OverlayError::Config(format!(
                "pointRadius {} is not a usable radius",
                self.point_radius
            )));
        }
        Ok(())
    }

    /// Whether `zoom` lies inside the configured range. No range means every
    /// zoom is accepted.
    pub fn zoom_in_range(&self, zoom: u32) -> bool {
        match self.zoom_limits {
            Some((min, max)) => zoom >= min && zoom <= max,
            None => true,
        }
    }
}

pub type ClickHook = Rc<dyn Fn(&Feature)>;
pub type EachHook<N> = Rc<dyn Fn(&Feature, &N)>;
pub type RendererHook = Rc<dyn Fn(String) -> String>;
pub type ShowLayerHook = Rc<dyn Fn() -> bool>;

/// Caller supplied behaviour, uniform for every feature of the layer.
///
/// `N` is the node type of the render surface the layer draws on.
pub struct LayerHooks<N> {
    pub click: ClickHook,
    pub each: EachHook<N>,
    pub renderer: Option<RendererHook>,
    pub show_layer: ShowLayerHook,
}

impl<N: 'static> Default for LayerHooks<N> {
    fn default() -> Self {
        Self {
            click: Rc::new(|_: &Feature| {}),
            each: Rc::new(|_: &Feature, _: &N| {}),
            renderer: None,
            show_layer: Rc::new(|| true),
        }
    }
}

impl<N> Clone for LayerHooks<N> {
    fn clone(&self) -> Self {
        Self {
            click: Rc::clone(&self.click),
            each: Rc::clone(&self.each),
            renderer: self.renderer.clone(),
            show_layer: Rc::clone(&self.show_layer),
        }
    }
}

impl<N> fmt::Debug for LayerHooks<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerHooks")
            .field("renderer", &self.renderer.is_some())
            .finish_non_exhaustive()
    }
}

impl<N> LayerHooks<N> {
    pub fn with_click(mut self, click: impl Fn(&Feature) + 'static) -> Self {
        self.click = Rc::new(click);
        self
    }

    pub fn with_each(mut self, each: impl Fn(&Feature, &N) + 'static) -> Self {
        self.each = Rc::new(each);
        self
    }

    pub fn with_renderer(mut self, renderer: impl Fn(String) -> String + 'static) -> Self {
        self.renderer = Some(Rc::new(renderer));
        self
    }

    pub fn with_show_layer(mut self, show_layer: impl Fn() -> bool + 'static) -> Self {
        self.show_layer = Rc::new(show_layer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> LayerOptions {
        LayerOptions {
            url: "https://tiles.example/{z}/{x}/{y}.pbf".to_string(),
            layer_name: "roads".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let opts = LayerOptions::default();
        assert_eq!(opts.element_name, "path");
        assert_eq!(opts.point_radius, 4.5);
        assert!(!opts.cache);
        assert!(opts.zoom_in_range(0));
        assert!(opts.zoom_in_range(22));
    }

    #[test]
    fn test_zoom_range_is_inclusive() {
        let opts = LayerOptions {
            zoom_limits: Some((3, 8)),
            ..options()
        };
        assert!(!opts.zoom_in_range(2));
        assert!(opts.zoom_in_range(3));
        assert!(opts.zoom_in_range(8));
        assert!(!opts.zoom_in_range(9));
    }

    #[test]
    fn test_validate() {
        assert!(options().validate().is_ok());
        assert!(LayerOptions::default().validate().is_err());

        let inverted = LayerOptions {
            zoom_limits: Some((9, 3)),
            ..options()
        };
        assert!(matches!(inverted.validate(), Err(OverlayError::Config(_))));

        let unnamed = LayerOptions {
            layer_name: " ".to_string(),
            ..options()
        };
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "url": "https://tiles.example/{z}/{x}/{y}.pbf?v=2",
            "layerName": "buildings",
            "zoomLimits": [13, 18],
            "cache": true,
            "class": "building",
            "query": {"key": "abc"},
            "headers": {"Authorization": "Bearer t"}
        }"#;
        let opts: LayerOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.layer_name, "buildings");
        assert_eq!(opts.zoom_limits, Some((13, 18)));
        assert!(opts.cache);
        assert_eq!(opts.class_name.as_deref(), Some("building"));
        assert_eq!(opts.element_name, "path");
        assert_eq!(opts.query.get("key").map(String::as_str), Some("abc"));
        assert_eq!(opts.headers.len(), 1);
        assert_eq!(opts.subdomains.len(), 3);
    }

    #[test]
    fn test_default_hooks_are_no_ops() {
        let hooks: LayerHooks<()> = LayerHooks::default();
        assert!((hooks.show_layer)());
        assert!(hooks.renderer.is_none());
    }
}

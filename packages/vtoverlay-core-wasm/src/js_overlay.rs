//! Browser bindings: window `fetch`, an SVG drawing surface and JS function
//! hooks wired into a [`TileLayer`].

use futures::future::{FutureExt, LocalBoxFuture};
use geo_types::Coord;
use js_sys::{Array, Function, Reflect, Uint8Array};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{AbortController, Document, Element, Event, Request, RequestInit, Response, SvgElement};

use crate::config::{LayerHooks, LayerOptions};
use crate::{console_error, console_log};
use crate::error::OverlayError;
use crate::features::Feature;
use crate::fetch::{FetchCompletion, TileFetcher, TileRequest};
use crate::layer::{CompletionOutcome, RequestOutcome, SkipReason, TileLayer, VisibilityChange};
use crate::models::TileCoord;
use crate::projection::Projection;
use crate::render::{ElementSpec, RenderSurface};
use crate::vectortile::{MvtDecoder, TileDecoder};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

fn js_err(value: JsValue) -> OverlayError {
    OverlayError::from_js(&value)
}

/// Fetches tiles with the window `fetch` API.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsFetcher;

// Aborts the underlying request if the fetch future is dropped before the
// body arrived, which is what happens when a tile is unloaded mid-flight.
struct AbortOnDrop(Option<AbortController>);

impl AbortOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(controller) = self.0.take() {
            controller.abort();
        }
    }
}

async fn fetch_bytes(url: String, headers: Vec<(String, String)>) -> Result<Vec<u8>, OverlayError> {
    let fetch_error = |value: JsValue| OverlayError::Fetch {
        url: url.clone(),
        reason: OverlayError::from_js(&value).to_string(),
    };

    let controller = AbortController::new().map_err(fetch_error)?;
    let mut guard = AbortOnDrop(Some(controller.clone()));

    let init = RequestInit::new();
    init.set_method("GET");
    init.set_signal(Some(&controller.signal()));
    let request = Request::new_with_str_and_init(&url, &init).map_err(fetch_error)?;
    for (name, value) in &headers {
        request.headers().set(name, value).map_err(fetch_error)?;
    }

    let window = web_sys::window().ok_or_else(|| OverlayError::Fetch {
        url: url.clone(),
        reason: "no window".to_string(),
    })?;
    let response_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(fetch_error)?;
    let response: Response = response_value.dyn_into().map_err(fetch_error)?;
    if !response.ok() {
        return Err(OverlayError::Http {
            status: response.status(),
            url: url.clone(),
        });
    }

    let buffer = JsFuture::from(response.array_buffer().map_err(fetch_error)?)
        .await
        .map_err(fetch_error)?;
    guard.disarm();
    Ok(Uint8Array::new(&buffer).to_vec())
}

impl TileFetcher for JsFetcher {
    fn fetch(&self, request: &TileRequest) -> LocalBoxFuture<'static, Result<Vec<u8>, OverlayError>> {
        fetch_bytes(request.url.clone(), request.headers.clone()).boxed_local()
    }
}

/// Draws each tile as a `<g>` inside an SVG container.
pub struct SvgSurface {
    document: Document,
    container: SvgElement,
}

pub struct SvgGroup {
    element: Element,
    listeners: Vec<Closure<dyn FnMut(Event)>>,
}

impl SvgSurface {
    pub fn new(container: SvgElement) -> Result<Self, OverlayError> {
        let document = container
            .owner_document()
            .ok_or_else(|| OverlayError::Js("container is not attached to a document".to_string()))?;
        Ok(Self {
            document,
            container,
        })
    }
}

impl RenderSurface for SvgSurface {
    type Group = SvgGroup;
    type Node = Element;

    fn create_group(&mut self, tile_key: &str) -> Result<SvgGroup, OverlayError> {
        let element = self
            .document
            .create_element_ns(Some(SVG_NS), "g")
            .map_err(js_err)?;
        element.set_attribute("data-tile", tile_key).map_err(js_err)?;
        self.container.append_child(&element).map_err(js_err)?;
        Ok(SvgGroup {
            element,
            listeners: Vec::new(),
        })
    }

    fn append_element(
        &mut self,
        group: &mut SvgGroup,
        spec: &ElementSpec<'_>,
        feature: Rc<Feature>,
        on_click: Rc<dyn Fn(&Feature)>,
    ) -> Result<Element, OverlayError> {
        let element = self
            .document
            .create_element_ns(Some(SVG_NS), spec.element_name)
            .map_err(js_err)?;
        if let Some(path) = &spec.path {
            element.set_attribute("d", path).map_err(js_err)?;
        }
        let attributes = [
            ("transform", spec.transform),
            ("class", spec.class_name),
            ("style", spec.style),
        ];
        for (name, value) in attributes {
            if let Some(value) = value {
                element.set_attribute(name, value).map_err(js_err)?;
            }
        }

        let listener = Closure::<dyn FnMut(Event)>::new(move |_event: Event| on_click(&*feature));
        element
            .add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())
            .map_err(js_err)?;
        group.element.append_child(&element).map_err(js_err)?;
        group.listeners.push(listener);
        Ok(element)
    }

    fn remove_group(&mut self, group: SvgGroup) {
        group.element.remove();
        // Dropping the group frees its click listeners
    }

    fn set_display(&mut self, visible: bool) {
        let display = if visible { "block" } else { "none" };
        if let Err(e) = self.container.style().set_property("display", display) {
            console_error!("Failed to toggle overlay container: {}", js_err(e));
        }
    }
}

fn feature_to_js(feature: &Feature) -> JsValue {
    serde_wasm_bindgen::to_value(feature).unwrap_or(JsValue::NULL)
}

fn get_function(options: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(options, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
}

// Function-valued entries of the options object become layer hooks
fn hooks_from_js(options: &JsValue) -> LayerHooks<Element> {
    let mut hooks = LayerHooks::default();
    if let Some(click) = get_function(options, "click") {
        hooks = hooks.with_click(move |feature: &Feature| {
            if let Err(e) = click.call1(&JsValue::NULL, &feature_to_js(feature)) {
                console_error!("click hook threw: {}", js_err(e));
            }
        });
    }
    if let Some(each) = get_function(options, "each") {
        hooks = hooks.with_each(move |feature: &Feature, element: &Element| {
            if let Err(e) = each.call2(&JsValue::NULL, &feature_to_js(feature), element) {
                console_error!("each hook threw: {}", js_err(e));
            }
        });
    }
    if let Some(renderer) = get_function(options, "renderer") {
        hooks = hooks.with_renderer(move |path: String| {
            match renderer.call1(&JsValue::NULL, &JsValue::from_str(&path)) {
                Ok(value) => value.as_string().unwrap_or(path),
                Err(e) => {
                    console_error!("renderer hook threw: {}", js_err(e));
                    path
                }
            }
        });
    }
    if let Some(show_layer) = get_function(options, "showLayer") {
        hooks = hooks.with_show_layer(move || {
            show_layer
                .call0(&JsValue::NULL)
                .map(|value| value.is_truthy())
                .unwrap_or(false)
        });
    }
    hooks
}

// `project(lng, lat)` must return `[x, y]`
fn projection_from_js(project: Function) -> Projection {
    Rc::new(move |c: Coord<f64>| {
        let point = project
            .call2(&JsValue::NULL, &JsValue::from_f64(c.x), &JsValue::from_f64(c.y))
            .ok()
            .and_then(|value| value.dyn_into::<Array>().ok());
        match point {
            Some(point) => Coord {
                x: point.get(0).as_f64().unwrap_or(f64::NAN),
                y: point.get(1).as_f64().unwrap_or(f64::NAN),
            },
            None => Coord {
                x: f64::NAN,
                y: f64::NAN,
            },
        }
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VisibilityChangeJs {
    shown: bool,
    reload: Vec<TileCoord>,
}

fn change_to_js(change: Option<VisibilityChange>) -> Result<JsValue, JsValue> {
    match change {
        Some(change) => Ok(serde_wasm_bindgen::to_value(&VisibilityChangeJs {
            shown: change.transition.is_show(),
            reload: change.reload,
        })?),
        None => Ok(JsValue::NULL),
    }
}

// Status reported back to the host for a tile request. Failures are already
// logged by the layer and never thrown across the event boundary.
fn outcome_label(outcome: &RequestOutcome) -> &'static str {
    match outcome {
        RequestOutcome::Skipped(SkipReason::Hidden) => "skipped:hidden",
        RequestOutcome::Skipped(SkipReason::OutOfZoom) => "skipped:zoom",
        RequestOutcome::Skipped(SkipReason::Predicate) => "skipped:showLayer",
        RequestOutcome::Skipped(SkipReason::AlreadyLoading) => "skipped:loading",
        RequestOutcome::Skipped(SkipReason::AlreadyLoaded) => "skipped:loaded",
        RequestOutcome::Populated { .. } => "populated",
        RequestOutcome::Failed(_) => "failed",
        RequestOutcome::Fetching(_) => "fetching",
    }
}

type BrowserLayer = TileLayer<JsFetcher, MvtDecoder, SvgSurface>;

/// Feeds `completion` into the layer, or hands it back while something else
/// (typically a hook) still holds the layer.
pub(crate) fn try_complete<F, D, S>(
    layer: &RefCell<TileLayer<F, D, S>>,
    completion: FetchCompletion,
) -> Result<CompletionOutcome, FetchCompletion>
where
    F: TileFetcher,
    D: TileDecoder,
    S: RenderSurface,
{
    match layer.try_borrow_mut() {
        Ok(mut layer) => Ok(layer.complete_fetch(completion)),
        Err(_) => Err(completion),
    }
}

// Retry on the next turn of the event loop rather than leaving the tile
// loading forever
fn deliver(layer: Rc<RefCell<BrowserLayer>>, completion: FetchCompletion) {
    if let Err(completion) = try_complete(&layer, completion) {
        console_log!(
            "Overlay busy, requeueing completion for tile {}",
            completion.ticket.coord
        );
        spawn_local(async move { deliver(layer, completion) });
    }
}

/// JS facing overlay. The host map forwards its tile and zoom events here.
#[wasm_bindgen]
pub struct VectorTileOverlay {
    layer: Rc<RefCell<BrowserLayer>>,
}

impl VectorTileOverlay {
    // Hooks run while the layer is borrowed; a hook calling back in gets an error
    fn layer_mut(&self) -> Result<std::cell::RefMut<'_, BrowserLayer>, JsValue> {
        self.layer
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("overlay is busy"))
    }
}

#[wasm_bindgen]
impl VectorTileOverlay {
    #[wasm_bindgen(constructor)]
    pub fn new(
        options: JsValue,
        container: SvgElement,
        project: Function,
    ) -> Result<VectorTileOverlay, JsValue> {
        let layer_options: LayerOptions = serde_wasm_bindgen::from_value(options.clone())?;
        let hooks = hooks_from_js(&options);
        let surface = SvgSurface::new(container)?;
        let layer = TileLayer::new(
            layer_options,
            hooks,
            projection_from_js(project),
            JsFetcher,
            MvtDecoder,
            surface,
        )?;
        Ok(VectorTileOverlay {
            layer: Rc::new(RefCell::new(layer)),
        })
    }

    #[wasm_bindgen(js_name = onAdd)]
    pub fn on_add(&self, zoom: u32) -> Result<JsValue, JsValue> {
        let change = self.layer_mut()?.on_add(zoom);
        change_to_js(change)
    }

    #[wasm_bindgen(js_name = onRemove)]
    pub fn on_remove(&self) -> Result<(), JsValue> {
        self.layer_mut()?.on_remove();
        Ok(())
    }

    #[wasm_bindgen(js_name = zoomEnd)]
    pub fn zoom_end(&self, zoom: u32) -> Result<JsValue, JsValue> {
        let change = self.layer_mut()?.on_zoom_end(zoom);
        change_to_js(change)
    }

    #[wasm_bindgen(js_name = setCondition)]
    pub fn set_condition(&self, namespace: &str, visible: bool) -> Result<JsValue, JsValue> {
        let change = self.layer_mut()?.set_condition(namespace, visible);
        change_to_js(change)
    }

    #[wasm_bindgen(js_name = setLayerVisible)]
    pub fn set_layer_visible(&self, visible: bool) -> Result<JsValue, JsValue> {
        let change = self.layer_mut()?.set_layer_visible(visible);
        change_to_js(change)
    }

    #[wasm_bindgen(js_name = isVisible)]
    pub fn is_visible(&self) -> bool {
        self.layer
            .try_borrow()
            .map(|layer| layer.is_visible())
            .unwrap_or(false)
    }

    /// Starts loading a tile; the fetch completes in the background.
    #[wasm_bindgen(js_name = loadTile)]
    pub fn load_tile(&self, x: u32, y: u32, z: u32) -> Result<String, JsValue> {
        let outcome = self.layer_mut()?.request_tile(TileCoord::new(x, y, z));
        let label = outcome_label(&outcome).to_string();
        if let RequestOutcome::Fetching(pending) = outcome {
            let layer = Rc::clone(&self.layer);
            spawn_local(async move {
                deliver(layer, pending.run().await);
            });
        }
        Ok(label)
    }

    #[wasm_bindgen(js_name = unloadTile)]
    pub fn unload_tile(&self, x: u32, y: u32, z: u32) -> Result<bool, JsValue> {
        Ok(self.layer_mut()?.unload_tile(TileCoord::new(x, y, z)))
    }

    pub fn redraw(&self) -> Result<JsValue, JsValue> {
        let reload = self.layer_mut()?.redraw();
        Ok(serde_wasm_bindgen::to_value(&reload)?)
    }

    pub fn stats(&self) -> Result<JsValue, JsValue> {
        let stats = self
            .layer
            .try_borrow()
            .map_err(|_| JsValue::from_str("overlay is busy"))?
            .stats();
        Ok(serde_wasm_bindgen::to_value(&stats)?)
    }
}

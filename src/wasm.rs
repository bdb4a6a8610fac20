//! Browser front end.
//!
//! The host page looks up nothing itself: it constructs a [`TryOnHandle`]
//! from element ids and forwards its DOM events to the handle's methods.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, HtmlElement,
    HtmlInputElement, ImageData, Response,
};

use crate::LocalFuture;
use crate::config::TryOnConfig;
use crate::error::{GarmentLoadError, PoseError};
use crate::image_cache::{GarmentFetcher, RasterImage};
use crate::manual_fit::{PointerKind, SliderValues, SurfaceRect};
use crate::pose::{Pose, PoseBackend, PoseModel};
use crate::signal::Signal;
use crate::status::Status;
use crate::surface::{Rect, Surface};
use crate::transform::Affine;
use crate::widget::{TryOn, WidgetView};

/// Offscreen canvases kept for recently drawn images.
const SOURCE_CACHE_SIZE: usize = 4;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();

    if let Err(e) = console_log::init_with_level(crate::config::LogLevel::default().to_level()) {
        web_sys::console::log_1(&format!("Logger already initialized: {}", e).into());
    }
    log::info!("TryOn WASM ready");
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::JSON::stringify(value)
                .ok()
                .and_then(|s| s.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", value))
}

fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| js_error("no document available"))
}

fn element_by_id<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| js_error(format!("element '#{}' not found", id)))?
        .dyn_into::<T>()
        .map_err(|_| js_error(format!("element '#{}' has the wrong type", id)))
}

fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| js_error("2d canvas context unavailable"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| js_error("2d canvas context has the wrong type"))
}

fn image_data(image: &RasterImage) -> Result<ImageData, JsValue> {
    ImageData::new_with_u8_clamped_array_and_sh(
        Clamped(image.pixels().as_raw().as_slice()),
        image.width(),
        image.height(),
    )
}

/// Surface backed by an HTML canvas.
///
/// Each image is uploaded once into an offscreen canvas, keyed by the
/// image id, and drawn from there with `setTransform` + `drawImage`.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    sources: Vec<(u64, HtmlCanvasElement)>,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let ctx = context_2d(&canvas)?;
        Ok(Self {
            canvas,
            ctx,
            sources: Vec::new(),
        })
    }

    fn source_for(&mut self, image: &RasterImage) -> Result<HtmlCanvasElement, JsValue> {
        if let Some(index) = self.sources.iter().position(|(id, _)| *id == image.id()) {
            let entry = self.sources.remove(index);
            let source = entry.1.clone();
            self.sources.push(entry);
            return Ok(source);
        }

        let source: HtmlCanvasElement = document()?.create_element("canvas")?.dyn_into()?;
        source.set_width(image.width());
        source.set_height(image.height());
        context_2d(&source)?.put_image_data(&image_data(image)?, 0.0, 0.0)?;
        log::debug!(
            "Uploaded image {} ({}x{}) to an offscreen canvas",
            image.id(),
            image.width(),
            image.height()
        );

        if self.sources.len() >= SOURCE_CACHE_SIZE {
            self.sources.remove(0);
        }
        self.sources.push((image.id(), source.clone()));
        Ok(source)
    }

    fn try_draw(&mut self, image: &RasterImage, dest: Rect, t: &Affine) -> Result<(), JsValue> {
        let source = self.source_for(image)?;
        self.ctx.set_transform(
            f64::from(t.a),
            f64::from(t.b),
            f64::from(t.c),
            f64::from(t.d),
            f64::from(t.e),
            f64::from(t.f),
        )?;
        let drawn = self.ctx.draw_image_with_html_canvas_element_and_dw_and_dh(
            &source,
            f64::from(dest.x),
            f64::from(dest.y),
            f64::from(dest.width),
            f64::from(dest.height),
        );
        self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
        drawn
    }
}

impl Surface for CanvasSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn clear(&mut self) {
        if let Err(e) = self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0) {
            log::warn!("Failed to reset canvas transform: {}", describe(&e));
        }
        self.ctx.clear_rect(
            0.0,
            0.0,
            f64::from(self.canvas.width()),
            f64::from(self.canvas.height()),
        );
    }

    fn draw_image(&mut self, image: &RasterImage, dest: Rect, transform: &Affine) {
        if let Err(e) = self.try_draw(image, dest, transform) {
            log::warn!("Failed to draw image {}: {}", image.id(), describe(&e));
        }
    }
}

fn client_rect(element: &Element) -> SurfaceRect {
    let rect = element.get_bounding_client_rect();
    SurfaceRect {
        left: rect.left() as f32,
        top: rect.top() as f32,
        width: rect.width() as f32,
        height: rect.height() as f32,
    }
}

/// The page elements around the canvas.
pub struct DomView {
    canvas: HtmlCanvasElement,
    container: Option<Element>,
    status: HtmlElement,
    scale_slider: HtmlInputElement,
    rotation_slider: HtmlInputElement,
    placeholder: HtmlElement,
    auto_fit_button: Option<HtmlElement>,
}

impl WidgetView for DomView {
    fn slider_values(&self) -> SliderValues {
        SliderValues::new(
            self.scale_slider.value_as_number() as f32,
            self.rotation_slider.value_as_number() as f32,
        )
    }

    fn set_slider_values(&self, values: SliderValues) {
        self.scale_slider
            .set_value_as_number(f64::from(values.scale_percent));
        self.rotation_slider
            .set_value_as_number(f64::from(values.rotation_degrees));
    }

    fn show_status(&self, status: &Status) {
        self.status.set_text_content(Some(&status.to_string()));
        if let Err(e) = self
            .status
            .class_list()
            .toggle_with_force("error", status.is_error())
        {
            log::warn!("Failed to style status line: {}", describe(&e));
        }
    }

    fn set_photo_visible(&self, visible: bool) {
        self.canvas.set_hidden(!visible);
        self.placeholder.set_hidden(visible);
    }

    fn set_auto_fit_enabled(&self, enabled: bool) {
        let Some(button) = &self.auto_fit_button else {
            return;
        };
        let result = if enabled {
            button.remove_attribute("disabled")
        } else {
            button.set_attribute("disabled", "")
        };
        if let Err(e) = result {
            log::warn!("Failed to toggle auto-fit button: {}", describe(&e));
        }
    }

    fn bounding_box(&self) -> SurfaceRect {
        match &self.container {
            Some(container) => client_rect(container),
            None => client_rect(&self.canvas),
        }
    }

    fn surface_rect(&self) -> SurfaceRect {
        client_rect(&self.canvas)
    }
}

/// Fetches garments with `window.fetch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchGarmentFetcher;

impl GarmentFetcher for FetchGarmentFetcher {
    fn fetch<'a>(&'a self, locator: &'a str) -> LocalFuture<'a, Result<Vec<u8>, GarmentLoadError>> {
        Box::pin(async move {
            let unreachable = |e: &JsValue| GarmentLoadError::unreachable(locator, describe(e));
            let window = web_sys::window()
                .ok_or_else(|| GarmentLoadError::unreachable(locator, "no window"))?;

            let response: Response = JsFuture::from(window.fetch_with_str(locator))
                .await
                .map_err(|e| unreachable(&e))?
                .dyn_into()
                .map_err(|e| unreachable(&e))?;
            if !response.ok() {
                return Err(GarmentLoadError::unreachable(
                    locator,
                    format!("HTTP {}", response.status()),
                ));
            }

            let buffer = JsFuture::from(response.array_buffer().map_err(|e| unreachable(&e))?)
                .await
                .map_err(|e| unreachable(&e))?;
            Ok(js_sys::Uint8Array::new(&buffer).to_vec())
        })
    }
}

#[wasm_bindgen]
extern "C" {
    /// A loaded PoseNet network.
    type PoseNet;

    #[wasm_bindgen(js_namespace = posenet, js_name = load, catch)]
    fn posenet_load() -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, js_name = estimateSinglePose, catch)]
    fn estimate_single_pose(
        this: &PoseNet,
        input: &ImageData,
        config: &JsValue,
    ) -> Result<js_sys::Promise, JsValue>;
}

/// Pose backend using the page's global `posenet` library.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseNetBackend;

struct PoseNetModel {
    net: PoseNet,
}

impl PoseModel for PoseNetModel {
    fn estimate_single_pose<'a>(
        &'a self,
        image: &'a RasterImage,
    ) -> LocalFuture<'a, Result<Pose, PoseError>> {
        Box::pin(async move {
            let estimation = |e: JsValue| PoseError::Estimation(describe(&e));
            let input = image_data(image).map_err(estimation)?;

            let options = js_sys::Object::new();
            js_sys::Reflect::set(&options, &"flipHorizontal".into(), &JsValue::FALSE)
                .map_err(estimation)?;

            let promise = self
                .net
                .estimate_single_pose(&input, &options)
                .map_err(estimation)?;
            let result = JsFuture::from(promise).await.map_err(estimation)?;
            let json = js_sys::JSON::stringify(&result)
                .map_err(estimation)?
                .as_string()
                .ok_or_else(|| PoseError::Estimation("pose is not serializable".to_string()))?;
            Pose::from_json(&json)
        })
    }
}

impl PoseBackend for PoseNetBackend {
    fn load(&self) -> LocalFuture<'_, Result<Box<dyn PoseModel>, PoseError>> {
        Box::pin(async {
            let promise = posenet_load().map_err(|e| PoseError::LibraryMissing(describe(&e)))?;
            let net = JsFuture::from(promise)
                .await
                .map_err(|e| PoseError::Load(describe(&e)))?;
            Ok(Box::new(PoseNetModel {
                net: net.unchecked_into(),
            }) as Box<dyn PoseModel>)
        })
    }
}

type CanvasTryOn = TryOn<CanvasSurface, DomView>;

/// Try-on widget bound to page elements.
#[wasm_bindgen]
pub struct TryOnHandle {
    widget: CanvasTryOn,
    garment: Signal<String>,
    last_error: RefCell<Option<String>>,
}

#[wasm_bindgen]
impl TryOnHandle {
    /// Bind to the elements with the given ids. `config_json` optionally
    /// overrides the defaults.
    #[wasm_bindgen(constructor)]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        canvas_id: &str,
        status_id: &str,
        scale_slider_id: &str,
        rotation_slider_id: &str,
        placeholder_id: &str,
        auto_fit_button_id: Option<String>,
        config_json: Option<String>,
    ) -> Result<TryOnHandle, JsValue> {
        let config = match config_json.as_deref() {
            Some(json) => TryOnConfig::from_json(json).map_err(js_error)?,
            None => TryOnConfig::default(),
        };
        log::set_max_level(config.log_level.to_level_filter());

        let document = document()?;
        let canvas: HtmlCanvasElement = element_by_id(&document, canvas_id)?;
        let auto_fit_button = match auto_fit_button_id.as_deref() {
            Some(id) => Some(element_by_id(&document, id)?),
            None => None,
        };
        let view = DomView {
            container: canvas.parent_element(),
            status: element_by_id(&document, status_id)?,
            scale_slider: element_by_id(&document, scale_slider_id)?,
            rotation_slider: element_by_id(&document, rotation_slider_id)?,
            placeholder: element_by_id(&document, placeholder_id)?,
            auto_fit_button,
            canvas: canvas.clone(),
        };

        let widget = TryOn::new(
            config,
            CanvasSurface::new(canvas)?,
            view,
            Box::new(FetchGarmentFetcher),
            Box::new(PoseNetBackend),
        );
        let garment = Signal::new(String::new());
        widget.watch_garment_selection(&garment, wasm_bindgen_futures::spawn_local);

        Ok(TryOnHandle {
            widget,
            garment,
            last_error: RefCell::new(None),
        })
    }

    /// Load uploaded file bytes. Returns false if they are not an image; the
    /// status line already explains why.
    pub fn load_photo(&self, bytes: &[u8]) -> bool {
        match self.widget.load_photo(bytes) {
            Ok(()) => true,
            Err(e) => {
                *self.last_error.borrow_mut() = Some(e.to_string());
                false
            }
        }
    }

    pub fn clear_photo(&self) {
        self.widget.clear_photo();
    }

    pub fn has_photo(&self) -> bool {
        self.widget.has_photo()
    }

    /// Returns true if the caller should `preventDefault()` the event.
    pub fn pointer_down(&self, client_x: f32, client_y: f32, touch: bool) -> bool {
        let kind = if touch {
            PointerKind::Touch
        } else {
            PointerKind::Mouse
        };
        self.widget
            .pointer_down(client_x, client_y, kind)
            .prevent_default
    }

    /// Returns true if the caller should `preventDefault()` the event.
    pub fn pointer_move(&self, client_x: f32, client_y: f32, _touch: bool) -> bool {
        self.widget.pointer_move(client_x, client_y).prevent_default
    }

    /// Release, touch end or touch cancel.
    pub fn pointer_up(&self, _client_x: f32, _client_y: f32, _touch: bool) -> bool {
        self.widget.pointer_up().prevent_default
    }

    pub fn pointer_leave(&self) {
        self.widget.pointer_leave();
    }

    pub fn sliders_changed(&self) {
        self.widget.sliders_changed();
    }

    /// Select the garment to overlay, by image URL.
    pub fn select_garment(&self, src: String) {
        self.garment.set(src);
    }

    /// Run auto-fit. Resolves to `true` on success and rejects with the
    /// failure reason otherwise.
    pub fn auto_fit(&self) -> js_sys::Promise {
        let widget = self.widget.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            widget
                .auto_fit()
                .await
                .map(|_| JsValue::TRUE)
                .map_err(js_error)
        })
    }

    /// Message of the last rejected upload, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }
}

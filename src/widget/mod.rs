//! The try-on widget: event handling around the compositing core.
//!
//! [`TryOn`] owns the images, the transform and the surface, and reaches
//! the page only through the injected [`WidgetView`]. Every handler runs to
//! completion; async operations never hold a borrow of the widget state
//! across an await point.

use std::cell::RefCell;
use std::rc::Rc;

use web_time::Instant;

use crate::LocalFuture;
use crate::auto_fit::{AutoFitEngine, FitFrame, FitResult, derive_fit};
use crate::compositor::Compositor;
use crate::config::TryOnConfig;
use crate::error::{AutoFitError, DecodeError, GarmentLoadError, PoseRejection};
use crate::image_cache::{GarmentFetcher, GarmentUpdate, ImageSourceCache, RasterImage};
use crate::manual_fit::{
    EventResponse, ManualFitController, PointerKind, SliderValues, SurfaceRect,
};
use crate::pose::PoseBackend;
use crate::signal::{Signal, SubscriptionId};
use crate::status::Status;
use crate::surface::{Surface, SurfaceBounds, fit_surface};
use crate::transform::{Placement, TransformState};


/// The page elements the widget reads from and writes to.
pub trait WidgetView {
    /// Current scale and rotation slider positions.
    fn slider_values(&self) -> SliderValues;

    /// Move the sliders.
    fn set_slider_values(&self, values: SliderValues);

    /// Show one line of status text.
    fn show_status(&self, status: &Status);

    /// Show the composite (true) or the upload placeholder (false).
    fn set_photo_visible(&self, visible: bool);

    /// Enable or disable the auto-fit trigger.
    fn set_auto_fit_enabled(&self, enabled: bool);

    /// Rectangle of the container the surface is laid out in. A zero width
    /// means the container is not laid out yet.
    fn bounding_box(&self) -> SurfaceRect;

    /// Rectangle the surface is currently displayed at.
    fn surface_rect(&self) -> SurfaceRect;
}

struct State<S> {
    images: ImageSourceCache,
    transform: TransformState,
    surface: S,
    status: Status,
}

struct Shared<S, V> {
    state: RefCell<State<S>>,
    view: V,
    engine: AutoFitEngine,
    fetcher: Box<dyn GarmentFetcher>,
    compositor: Compositor,
    manual: ManualFitController,
    config: TryOnConfig,
}

/// Virtual try-on widget. Clones are handles to the same widget.
pub struct TryOn<S, V> {
    shared: Rc<Shared<S, V>>,
}

impl<S, V> Clone for TryOn<S, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<S: Surface, V: WidgetView> TryOn<S, V> {
    /// Create the widget and put the view in its initial state: placeholder
    /// shown, sliders at their defaults, upload prompt.
    pub fn new(
        config: TryOnConfig,
        surface: S,
        view: V,
        fetcher: Box<dyn GarmentFetcher>,
        backend: Box<dyn PoseBackend>,
    ) -> Self {
        let manual = ManualFitController::new(config.sliders);
        let widget = Self {
            shared: Rc::new(Shared {
                state: RefCell::new(State {
                    images: ImageSourceCache::new(),
                    transform: TransformState::new(),
                    surface,
                    status: Status::Prompt,
                }),
                engine: AutoFitEngine::new(backend, config.auto_fit),
                compositor: Compositor::new(config.overlay.base_width_fraction),
                manual,
                fetcher,
                view,
                config,
            }),
        };

        let view = &widget.shared.view;
        view.set_slider_values(manual.default_values());
        view.set_photo_visible(false);
        view.set_auto_fit_enabled(true);
        view.show_status(&Status::Prompt);
        widget
    }

    pub fn view(&self) -> &V {
        &self.shared.view
    }

    /// Snapshot of the overlay transform.
    pub fn transform(&self) -> TransformState {
        self.shared.state.borrow().transform
    }

    pub fn has_photo(&self) -> bool {
        self.shared.state.borrow().images.has_user_photo()
    }

    pub fn has_garment(&self) -> bool {
        self.shared.state.borrow().images.has_garment()
    }

    /// The phase last shown on the status line.
    pub fn status(&self) -> Status {
        self.shared.state.borrow().status.clone()
    }

    /// Run `f` with the surface, e.g. to export the composite.
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.shared.state.borrow().surface)
    }

    fn set_status(&self, status: Status) {
        if status.is_error() {
            log::warn!("Status: {}", status);
        } else {
            log::info!("Status: {}", status);
        }
        self.shared.state.borrow_mut().status = status.clone();
        self.shared.view.show_status(&status);
    }

    /// Draw the composite. Does nothing until a photo is loaded.
    fn render(&self, state: &mut State<S>) {
        if let Some(user) = state.images.user_photo() {
            self.shared.compositor.render(
                &mut state.surface,
                user,
                state.images.garment(),
                &state.transform,
            );
        }
    }

    fn surface_bounds(&self) -> SurfaceBounds {
        let surface = &self.shared.config.surface;
        let container = self.shared.view.bounding_box().width;
        let max_width = if container > 0.0 && container.is_finite() {
            container
        } else {
            surface.default_container_width
        };
        SurfaceBounds {
            max_width,
            max_height: surface.max_height,
        }
    }

    /// Decode an uploaded photo, size the surface to it and reset the
    /// overlay to its starting position.
    ///
    /// On a decode failure the previous photo (if any) stays loaded and the
    /// status reports the rejection.
    pub fn load_photo(&self, bytes: &[u8]) -> Result<(), DecodeError> {
        let started = Instant::now();
        let bounds = self.surface_bounds();
        let sliders = self.shared.view.slider_values();
        let overlay = self.shared.config.overlay;

        let mut state = self.shared.state.borrow_mut();
        let photo = match state.images.load_user_photo(bytes) {
            Ok(photo) => photo,
            Err(err) => {
                drop(state);
                self.set_status(Status::PhotoRejected(err.to_string()));
                return Err(err);
            }
        };

        let (width, height) = fit_surface(photo.width(), photo.height(), bounds);
        state.surface.resize(width, height);

        let mut placement = Placement {
            anchor_x: width as f32 / 2.0,
            anchor_y: height as f32 * overlay.initial_anchor_height_fraction,
            scale: sliders.scale(),
            rotation_degrees: sliders.rotation_degrees,
        };
        if !placement.is_valid() {
            let defaults = self.shared.manual.default_values();
            placement.scale = defaults.scale();
            placement.rotation_degrees = defaults.rotation_degrees;
        }
        state.transform.reset(placement);
        self.render(&mut state);
        drop(state);

        log::debug!(
            "Photo ready on a {}x{} surface in {:?}",
            width,
            height,
            started.elapsed()
        );
        self.shared.view.set_photo_visible(true);
        self.set_status(Status::Adjusting);
        Ok(())
    }

    /// Remove the photo and show the upload placeholder again.
    pub fn clear_photo(&self) {
        {
            let mut state = self.shared.state.borrow_mut();
            state.images.clear_user_photo();
            state.transform.end_drag();
            state.surface.clear();
        }
        self.shared.view.set_photo_visible(false);
        self.set_status(Status::Prompt);
    }

    fn pointer_position(&self, state: &State<S>, client_x: f32, client_y: f32) -> (f32, f32) {
        self.shared.view.surface_rect().to_surface(
            client_x,
            client_y,
            (state.surface.width(), state.surface.height()),
        )
    }

    fn finish_event(&self, state: &mut State<S>, response: EventResponse) -> EventResponse {
        if response.redraw {
            self.render(state);
        }
        response
    }

    pub fn pointer_down(&self, client_x: f32, client_y: f32, kind: PointerKind) -> EventResponse {
        let mut state = self.shared.state.borrow_mut();
        let pos = self.pointer_position(&state, client_x, client_y);
        let loaded = state.images.has_user_photo();
        let response = self
            .shared
            .manual
            .pointer_down(&mut state.transform, loaded, pos, kind);
        self.finish_event(&mut state, response)
    }

    pub fn pointer_move(&self, client_x: f32, client_y: f32) -> EventResponse {
        let mut state = self.shared.state.borrow_mut();
        let pos = self.pointer_position(&state, client_x, client_y);
        let response = self.shared.manual.pointer_move(&mut state.transform, pos);
        self.finish_event(&mut state, response)
    }

    /// Release, touch end or touch cancel.
    pub fn pointer_up(&self) -> EventResponse {
        let mut state = self.shared.state.borrow_mut();
        let response = self.shared.manual.pointer_up(&mut state.transform);
        self.finish_event(&mut state, response)
    }

    /// The pointer left the surface; ends any drag.
    pub fn pointer_leave(&self) -> EventResponse {
        self.pointer_up()
    }

    /// Re-read both sliders and apply them.
    pub fn sliders_changed(&self) -> EventResponse {
        let values = self.shared.view.slider_values();
        let mut state = self.shared.state.borrow_mut();
        let loaded = state.images.has_user_photo();
        let response = self
            .shared
            .manual
            .apply_sliders(&mut state.transform, loaded, values);
        self.finish_event(&mut state, response)
    }

    /// Fetch and decode the garment behind `locator`.
    ///
    /// Failures are logged and the previous garment is kept. A fetch that
    /// completes after a newer refresh was started is discarded.
    pub async fn refresh_garment_image(
        &self,
        locator: &str,
    ) -> Result<GarmentUpdate, GarmentLoadError> {
        let locator = locator.trim();
        if locator.is_empty() {
            log::debug!("Ignoring empty garment locator");
            return Ok(GarmentUpdate::Skipped);
        }

        let request = self
            .shared
            .state
            .borrow_mut()
            .images
            .begin_garment_refresh(locator);
        log::debug!("Fetching garment '{}' (request {})", locator, request.seq);

        let result = match self.shared.fetcher.fetch(&request.locator).await {
            Ok(bytes) => {
                let mut state = self.shared.state.borrow_mut();
                let update = state.images.complete_garment_refresh(&request, &bytes);
                if let Ok(GarmentUpdate::Replaced { redraw: true }) = update {
                    self.render(&mut state);
                }
                update
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            log::warn!("{}", err);
        }
        result
    }

    /// Refresh the garment every time `signal` changes, and right away for
    /// its current value. `spawn` runs a local task on the host's executor.
    pub fn watch_garment_selection(
        &self,
        signal: &Signal<String>,
        spawn: impl Fn(LocalFuture<'static, ()>) + 'static,
    ) -> SubscriptionId
    where
        S: 'static,
        V: 'static,
    {
        let widget = self.clone();
        let refresh: Rc<dyn Fn(&String)> = Rc::new(move |locator: &String| {
            let widget = widget.clone();
            let locator = locator.clone();
            spawn(Box::pin(async move {
                // Already logged
                let _ = widget.refresh_garment_image(&locator).await;
            }));
        });

        let subscriber = Rc::clone(&refresh);
        let id = signal.subscribe(move |locator: &String| subscriber(locator));

        let current = signal.get();
        if !current.trim().is_empty() {
            refresh(&current);
        }
        id
    }

    /// Place the garment from the shoulders detected in the photo.
    ///
    /// Only one auto-fit runs at a time; the view's trigger is disabled
    /// while it does. If the photo is cleared or replaced before the pose
    /// arrives, the result is dropped without touching the view.
    pub async fn auto_fit(&self) -> Result<FitResult, AutoFitError> {
        let shared = &self.shared;
        let _running = match shared.engine.try_begin() {
            Ok(guard) => guard,
            Err(err) => {
                log::debug!("Auto-fit request ignored: {}", err);
                return Err(err);
            }
        };

        let snapshot = {
            let state = shared.state.borrow();
            state
                .images
                .user_photo()
                .map(|photo| (photo.clone(), state.images.photo_generation()))
        };
        let Some((photo, generation)) = snapshot else {
            self.set_status(Status::AutoFitFailed(AutoFitError::NoPhoto));
            return Err(AutoFitError::NoPhoto);
        };

        let started = Instant::now();
        shared.view.set_auto_fit_enabled(false);
        self.set_status(Status::Analyzing);

        let outcome = self.finish_auto_fit(&photo, generation).await;
        shared.view.set_auto_fit_enabled(true);

        match &outcome {
            Ok(fit) => {
                log::info!(
                    "Auto-fit placed garment at ({:.1}, {:.1}) rot {:.1}° scale {:?} in {:?}",
                    fit.anchor_x,
                    fit.anchor_y,
                    fit.rotation_degrees,
                    fit.scale,
                    started.elapsed()
                );
                self.set_status(Status::Fitted);
            }
            Err(AutoFitError::PhotoChanged) => {
                log::info!("Photo changed during auto-fit, result dropped");
            }
            Err(err) => self.set_status(Status::AutoFitFailed(err.clone())),
        }
        outcome
    }

    async fn finish_auto_fit(
        &self,
        photo: &RasterImage,
        generation: u64,
    ) -> Result<FitResult, AutoFitError> {
        let shared = &self.shared;
        let estimated = shared.engine.estimate(photo).await;

        let mut state = shared.state.borrow_mut();
        if state.images.photo_generation() != generation {
            return Err(AutoFitError::PhotoChanged);
        }
        let pose = estimated?;

        let frame = FitFrame {
            user_width: photo.width(),
            surface_width: state.surface.width(),
            garment_width: state.images.garment().map(|garment| garment.width()),
        };
        let fit = derive_fit(&pose, frame, shared.engine.params())?;

        let placement = fit.placement(&state.transform.placement());
        if !state.transform.apply(placement) {
            return Err(AutoFitError::PoseNotDetected(
                PoseRejection::PlacementOutOfRange,
            ));
        }
        state.transform.end_drag();
        self.render(&mut state);
        let values = shared.manual.display_values(&state.transform.placement());
        drop(state);

        shared.view.set_slider_values(values);
        Ok(fit)
    }
}

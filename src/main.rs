/// Headless try-on compositor for native builds
#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    native::run()
}

// WASM doesn't use main(), it uses wasm_bindgen's start function
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::cell::Cell;
    use std::path::{Path, PathBuf};
    use std::process::ExitCode;

    use clap::Parser;
    use env_logger::Env;

    use tryon::image_cache::FileGarmentFetcher;
    use tryon::pose::{KeypointFileBackend, NoPoseBackend};
    use tryon::{
        PointerKind, PoseBackend, RasterSurface, SliderValues, Status, SurfaceRect, TryOn,
        TryOnConfig, WidgetView,
    };

    #[derive(Parser, Debug)]
    #[command(name = "tryon-native")]
    #[command(about = "Composite a garment onto a photo, by hand or from a detected pose")]
    #[command(version)]
    struct Cli {
        /// User photo to composite onto
        #[arg(long)]
        photo: PathBuf,

        /// Garment overlay image
        #[arg(long)]
        garment: Option<PathBuf>,

        /// PoseNet JSON result for the photo; enables auto-fit
        #[arg(long)]
        pose: Option<PathBuf>,

        /// Scale slider position, in percent
        #[arg(long)]
        scale: Option<f32>,

        /// Rotation slider position, in degrees
        #[arg(long, allow_hyphen_values = true)]
        rotation: Option<f32>,

        /// Drag the garment by DX,DY surface pixels after fitting
        #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
        drag: Option<(f32, f32)>,

        /// Width of the layout container the surface must fit in
        #[arg(long)]
        container_width: Option<f32>,

        /// Configuration file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Where to write the composite
        #[arg(long, short, default_value = "tryon.png")]
        output: PathBuf,
    }

    fn parse_offset(value: &str) -> Result<(f32, f32), String> {
        let (dx, dy) = value
            .split_once(',')
            .ok_or_else(|| format!("expected DX,DY, got '{}'", value))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f32>()
                .map_err(|e| format!("invalid offset '{}': {}", v, e))
        };
        Ok((parse(dx)?, parse(dy)?))
    }

    /// Terminal stand-in for the page: sliders are plain values and the
    /// status line goes to stderr.
    struct CliView {
        sliders: Cell<SliderValues>,
        container_width: f32,
    }

    impl WidgetView for CliView {
        fn slider_values(&self) -> SliderValues {
            self.sliders.get()
        }

        fn set_slider_values(&self, values: SliderValues) {
            self.sliders.set(values);
        }

        fn show_status(&self, status: &Status) {
            eprintln!("{}", status);
        }

        fn set_photo_visible(&self, _visible: bool) {}

        fn set_auto_fit_enabled(&self, _enabled: bool) {}

        fn bounding_box(&self) -> SurfaceRect {
            SurfaceRect {
                left: 0.0,
                top: 0.0,
                width: self.container_width,
                height: 0.0,
            }
        }

        // Not displayed anywhere: pointer coordinates are surface pixels
        fn surface_rect(&self) -> SurfaceRect {
            SurfaceRect {
                left: 0.0,
                top: 0.0,
                width: 0.0,
                height: 0.0,
            }
        }
    }

    fn load_config(path: Option<&PathBuf>) -> Result<TryOnConfig, tryon::ConfigError> {
        match path {
            Some(path) => TryOnConfig::load_from_file(path),
            None => Ok(TryOnConfig::load_from_default_path().unwrap_or_default()),
        }
    }

    /// A garment that fails to load only loses the overlay; the photo is
    /// still composited.
    fn load_garment(widget: &TryOn<RasterSurface, CliView>, garment: &Path) -> bool {
        let locator = garment.to_string_lossy();
        match pollster::block_on(widget.refresh_garment_image(&locator)) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Continuing without a garment overlay: {}", e);
                false
            }
        }
    }

    pub fn run() -> ExitCode {
        let cli = Cli::parse();

        let config = match load_config(cli.config.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        // Initialize logger with the configured level (overridden by RUST_LOG)
        let level = config.log_level.to_level_filter().to_string();
        env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

        let photo = match std::fs::read(&cli.photo) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Failed to read photo {:?}: {}", cli.photo, e);
                return ExitCode::FAILURE;
            }
        };

        let backend: Box<dyn PoseBackend> = match &cli.pose {
            Some(path) => Box::new(KeypointFileBackend::new(path)),
            None => Box::new(NoPoseBackend),
        };
        let view = CliView {
            sliders: Cell::new(SliderValues::new(
                config.sliders.scale_default,
                config.sliders.rotation_default,
            )),
            container_width: cli
                .container_width
                .unwrap_or(config.surface.default_container_width),
        };
        let widget = TryOn::new(
            config,
            RasterSurface::default(),
            view,
            Box::new(FileGarmentFetcher::default()),
            backend,
        );

        if let Some(garment) = &cli.garment {
            load_garment(&widget, garment);
        }

        if widget.load_photo(&photo).is_err() {
            return ExitCode::FAILURE;
        }

        if cli.scale.is_some() || cli.rotation.is_some() {
            let current = widget.view().slider_values();
            widget.view().set_slider_values(SliderValues::new(
                cli.scale.unwrap_or(current.scale_percent),
                cli.rotation.unwrap_or(current.rotation_degrees),
            ));
            widget.sliders_changed();
        }

        if cli.pose.is_some() && pollster::block_on(widget.auto_fit()).is_err() {
            log::warn!("Auto-fit failed, keeping the manual placement");
        }

        if let Some((dx, dy)) = cli.drag {
            let start = widget.transform();
            widget.pointer_down(start.anchor_x, start.anchor_y, PointerKind::Mouse);
            widget.pointer_move(start.anchor_x + dx, start.anchor_y + dy);
            widget.pointer_up();
        }

        let transform = widget.transform();
        log::info!(
            "Final placement: anchor ({:.1}, {:.1}), scale {:.3}, rotation {:.1}°",
            transform.anchor_x,
            transform.anchor_y,
            transform.scale,
            transform.rotation_degrees
        );

        match widget.with_surface(|surface| surface.image().save(&cli.output)) {
            Ok(()) => {
                log::info!("🖼️ Wrote composite to {:?}", cli.output);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("Failed to write {:?}: {}", cli.output, e);
                ExitCode::FAILURE
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_offset() {
            assert_eq!(parse_offset("10,-5.5"), Ok((10.0, -5.5)));
            assert_eq!(parse_offset(" 3 , 4 "), Ok((3.0, 4.0)));
            assert!(parse_offset("10").is_err());
            assert!(parse_offset("a,b").is_err());
        }

        #[test]
        fn test_missing_garment_still_renders_photo() {
            let config = TryOnConfig::default();
            let view = CliView {
                sliders: Cell::new(SliderValues::new(100.0, 0.0)),
                container_width: 40.0,
            };
            let widget = TryOn::new(
                config,
                RasterSurface::default(),
                view,
                Box::new(FileGarmentFetcher::default()),
                Box::new(NoPoseBackend),
            );

            assert!(!load_garment(&widget, Path::new("/nonexistent-tryon-dir/shirt.png")));
            assert!(!widget.has_garment());

            let photo = image::RgbaImage::from_pixel(20, 10, image::Rgba([0, 0, 255, 255]));
            let mut bytes = std::io::Cursor::new(Vec::new());
            photo
                .write_to(&mut bytes, image::ImageFormat::Png)
                .unwrap();
            widget.load_photo(bytes.get_ref()).unwrap();
            widget.with_surface(|surface| {
                assert_eq!(surface.image().dimensions(), (40, 20));
                assert_eq!(surface.pixel(20, 10), image::Rgba([0, 0, 255, 255]));
            });
        }

        #[test]
        fn test_cli_parses_all_flags() {
            let cli = Cli::try_parse_from([
                "tryon-native",
                "--photo",
                "me.jpg",
                "--garment",
                "shirt.png",
                "--scale",
                "120",
                "--rotation",
                "-15",
                "--drag",
                "-4,8",
                "--output",
                "out.png",
            ])
            .unwrap();
            assert_eq!(cli.scale, Some(120.0));
            assert_eq!(cli.rotation, Some(-15.0));
            assert_eq!(cli.drag, Some((-4.0, 8.0)));
            assert_eq!(cli.output, PathBuf::from("out.png"));
            assert!(cli.pose.is_none());
        }
    }
}

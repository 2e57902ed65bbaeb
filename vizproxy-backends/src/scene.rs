//! Headless 3D scene visualizer
//!
//! Holds triangle meshes and point clouds added by the host and renders them
//! with an orthographic projection when a screen capture is requested.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;
use vizproxy_service::{CallArgs, RemoteTarget, Returned, TargetError, Ticker};
use vizproxy_wire::{PointCloud, TriangleMesh, Value};

use crate::render::{self, Canvas, Projection, Rect};

/// Ticks per second of the scene backend
pub const SCENE_TICK_RATE: f64 = 20.0;

/// A geometry held by the scene
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Mesh(TriangleMesh),
    Cloud(PointCloud),
}

impl Geometry {
    pub fn from_value(value: &Value) -> Result<Self, TargetError> {
        if let Some(mesh) = value.downcast_ref::<TriangleMesh>() {
            Ok(Geometry::Mesh(mesh.clone()))
        } else if let Some(cloud) = value.downcast_ref::<PointCloud>() {
            Ok(Geometry::Cloud(cloud.clone()))
        } else {
            Err(TargetError::type_error(format!(
                "expected a TriangleMesh or a PointCloud, got {}",
                value.type_name()
            )))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Mesh(_) => "TriangleMesh",
            Geometry::Cloud(_) => "PointCloud",
        }
    }

    pub fn points(&self) -> &[[f64; 3]] {
        match self {
            Geometry::Mesh(mesh) => &mesh.vertices.0,
            Geometry::Cloud(cloud) => &cloud.points.0,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Geometry::Mesh(mesh) => Value::ext(mesh.clone()),
            Geometry::Cloud(cloud) => Value::ext(cloud.clone()),
        }
    }
}

/// Camera orientation in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPoint {
    pub yaw: f64,
    pub pitch: f64,
}

impl Default for ViewPoint {
    fn default() -> Self {
        Self {
            yaw: std::f64::consts::FRAC_PI_6,
            pitch: -std::f64::consts::FRAC_PI_8,
        }
    }
}

impl ViewPoint {
    fn project(&self, [x, y, z]: [f64; 3]) -> (f64, f64) {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        let xr = x * cy + z * sy;
        let zr = -x * sy + z * cy;
        (xr, y * cp - zr * sp)
    }
}

#[derive(Debug)]
pub struct SceneState {
    pub geometries: Vec<Geometry>,
    pub window_open: bool,
    pub frame_count: u64,
    pub events_polled: u64,
    /// Set by geometry changes, cleared by `update_renderer`
    pub dirty: bool,
    pub view: ViewPoint,
    pub size: (u32, u32),
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            geometries: Vec::new(),
            window_open: true,
            frame_count: 0,
            events_polled: 0,
            dirty: false,
            view: ViewPoint::default(),
            size: (render::DEFAULT_WIDTH, render::DEFAULT_HEIGHT),
        }
    }
}

impl SceneState {
    fn poll_events(&mut self) -> bool {
        self.events_polled += 1;
        self.window_open
    }

    fn update_renderer(&mut self) {
        if self.window_open {
            self.frame_count += 1;
            self.dirty = false;
        }
    }

    /// Index of an existing geometry equal to `geometry`, else the latest of its kind
    fn locate(&self, geometry: &Geometry) -> Option<usize> {
        self.geometries
            .iter()
            .position(|g| g == geometry)
            .or_else(|| {
                self.geometries
                    .iter()
                    .rposition(|g| g.kind() == geometry.kind())
            })
    }

    pub fn render(&self) -> image::RgbImage {
        let (width, height) = self.size;
        let mut canvas = Canvas::new(width, height);
        let rect = Rect {
            x: 0,
            y: 0,
            w: i64::from(width),
            h: i64::from(height),
        }
        .inset(i64::from(width.min(height)) / 10);

        let points = self
            .geometries
            .iter()
            .flat_map(|g| g.points().iter().map(|p| self.view.project(*p)));
        let projection = Projection::fit(points, rect);
        let to_pixel = |p: [f64; 3]| {
            let (x, y) = self.view.project(p);
            projection.apply(x, y)
        };

        for (index, geometry) in self.geometries.iter().enumerate() {
            let color = render::palette(index);
            match geometry {
                Geometry::Mesh(mesh) => {
                    let vertices = &mesh.vertices.0;
                    let vertex = |i: i32| usize::try_from(i).ok().and_then(|i| vertices.get(i));
                    for triangle in &mesh.triangles.0 {
                        let corners: Option<Vec<_>> =
                            triangle.iter().map(|&i| vertex(i).copied()).collect();
                        let Some(corners) = corners else { continue };
                        for k in 0..3 {
                            canvas.line(to_pixel(corners[k]), to_pixel(corners[(k + 1) % 3]), color);
                        }
                    }
                }
                Geometry::Cloud(cloud) => {
                    for (i, point) in cloud.points.0.iter().enumerate() {
                        let color = cloud.colors.0.get(i).map_or(color, |c| {
                            let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                            image::Rgb([channel(c[0]), channel(c[1]), channel(c[2])])
                        });
                        canvas.dot(to_pixel(*point), 1, color);
                    }
                }
            }
        }
        canvas.into_image()
    }
}

/// The remotely exposed visualizer window
#[derive(Debug, Default)]
pub struct Visualizer {
    state: Rc<RefCell<SceneState>>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticker running the event poll and renderer update
    pub fn ticker(&self, rate_hz: f64) -> Ticker {
        let state = Rc::clone(&self.state);
        Ticker::new(rate_hz, move || {
            let mut state = state.borrow_mut();
            if state.poll_events() {
                state.update_renderer();
            }
            Ok(())
        })
    }

    fn index_arg(args: &CallArgs, position: usize) -> Result<Option<usize>, TargetError> {
        match args.get(position, "index") {
            None | Some(Value::None) => Ok(None),
            Some(value) => value
                .as_i64()
                .and_then(|i| usize::try_from(i).ok())
                .map(Some)
                .ok_or_else(|| {
                    TargetError::type_error(format!(
                        "index must be a non-negative int, not {}",
                        value.type_name()
                    ))
                }),
        }
    }

    fn remove_geometry(&self, args: &CallArgs) -> Result<Returned, TargetError> {
        let mut state = self.state.borrow_mut();
        let target = args.require(0, "geometry")?;
        let index = match target.as_i64() {
            Some(i) => usize::try_from(i).ok(),
            None => {
                let geometry = Geometry::from_value(target)?;
                state.geometries.iter().position(|g| *g == geometry)
            }
        };
        match index.filter(|i| *i < state.geometries.len()) {
            Some(i) => {
                state.geometries.remove(i);
                state.dirty = true;
                Ok(Returned::value(true))
            }
            None => Ok(Returned::value(false)),
        }
    }

    fn update_geometry(&self, args: &CallArgs) -> Result<Returned, TargetError> {
        let geometry = Geometry::from_value(args.require(0, "geometry")?)?;
        let mut state = self.state.borrow_mut();
        let index = match Self::index_arg(args, 1)? {
            Some(i) if i < state.geometries.len() => Some(i),
            Some(i) => {
                return Err(TargetError::value_error(format!(
                    "geometry index {} out of range for {} geometries",
                    i,
                    state.geometries.len()
                )))
            }
            None => state.locate(&geometry),
        };
        match index {
            Some(i) if state.geometries[i].kind() == geometry.kind() => {
                state.geometries[i] = geometry;
                state.dirty = true;
                Ok(Returned::value(true))
            }
            _ => Ok(Returned::value(false)),
        }
    }

    fn capture_screen_image(&self, args: &CallArgs) -> Result<Returned, TargetError> {
        let path = args
            .str_arg(0, "filename")?
            .ok_or_else(|| TargetError::type_error("missing required argument 'filename'"))?;
        let do_render = args.get(1, "do_render").and_then(Value::as_bool).unwrap_or(false);
        let mut state = self.state.borrow_mut();
        if do_render {
            state.update_renderer();
        }
        image::DynamicImage::ImageRgb8(state.render())
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| TargetError::runtime(format!("cannot capture to '{}': {}", path, e)))?;
        debug!(path, geometries = state.geometries.len(), "screen captured");
        Ok(Returned::value(true))
    }
}

impl RemoteTarget for Visualizer {
    fn type_name(&self) -> &str {
        "Visualizer"
    }

    fn get_attr(&self, name: &str) -> Result<Returned, TargetError> {
        let state = self.state.borrow();
        match name {
            "geometry_count" => Ok(Returned::value(state.geometries.len())),
            "frame_count" => Ok(Returned::value(state.frame_count as i64)),
            "events_polled" => Ok(Returned::value(state.events_polled as i64)),
            "window_open" => Ok(Returned::value(state.window_open)),
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn call(&mut self, name: &str, args: CallArgs) -> Result<Returned, TargetError> {
        match name {
            "add_geometry" => {
                let geometry = Geometry::from_value(args.require(0, "geometry")?)?;
                let mut state = self.state.borrow_mut();
                debug!(kind = geometry.kind(), points = geometry.points().len(), "geometry added");
                state.geometries.push(geometry);
                state.dirty = true;
                Ok(Returned::value(true))
            }
            "remove_geometry" => self.remove_geometry(&args),
            "clear_geometries" => {
                let mut state = self.state.borrow_mut();
                state.geometries.clear();
                state.dirty = true;
                Ok(Returned::value(true))
            }
            "update_geometry" => self.update_geometry(&args),
            "get_geometry" => {
                let state = self.state.borrow();
                let index = Self::index_arg(&args, 0)?.unwrap_or(0);
                state
                    .geometries
                    .get(index)
                    .map(|g| Returned::value(g.to_value()))
                    .ok_or_else(|| {
                        TargetError::value_error(format!("no geometry at index {}", index))
                    })
            }
            "poll_events" => Ok(Returned::value(self.state.borrow_mut().poll_events())),
            "update_renderer" => {
                self.state.borrow_mut().update_renderer();
                Ok(Returned::none())
            }
            "capture_screen_image" => self.capture_screen_image(&args),
            "reset_view_point" => {
                self.state.borrow_mut().view = ViewPoint::default();
                Ok(Returned::value(true))
            }
            "destroy_window" => {
                self.close();
                Ok(Returned::none())
            }
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.window_open {
            state.window_open = false;
            state.geometries.clear();
            debug!(frames = state.frame_count, "window destroyed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizproxy_service::ErrorKind;
    use vizproxy_wire::Vector3dVector;

    fn tetrahedron() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]].into(),
            triangles: vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]].into(),
        }
    }

    fn cloud(n: usize) -> PointCloud {
        let points: Vec<[f64; 3]> = (0..n).map(|i| [i as f64, (i * i) as f64, 0.5]).collect();
        PointCloud {
            points: Vector3dVector(points),
            colors: Vector3dVector::default(),
        }
    }

    fn call(vis: &mut Visualizer, name: &str, args: Vec<Value>) -> Value {
        match vis.call(name, CallArgs::positional(args)).unwrap() {
            Returned::Value(value) => value,
            other => panic!("expected a value, got {:?}", other),
        }
    }

    fn count(vis: &Visualizer) -> Value {
        match vis.get_attr("geometry_count").unwrap() {
            Returned::Value(value) => value,
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_add_and_remove_geometry() {
        let mut vis = Visualizer::new();
        assert_eq!(call(&mut vis, "add_geometry", vec![tetrahedron().into()]), Value::from(true));
        assert_eq!(call(&mut vis, "add_geometry", vec![cloud(4).into()]), Value::from(true));
        assert_eq!(count(&vis), Value::from(2usize));

        assert_eq!(call(&mut vis, "remove_geometry", vec![tetrahedron().into()]), Value::from(true));
        assert_eq!(call(&mut vis, "remove_geometry", vec![Value::from(5)]), Value::from(false));
        assert_eq!(count(&vis), Value::from(1usize));

        call(&mut vis, "clear_geometries", vec![]);
        assert_eq!(count(&vis), Value::from(0usize));
    }

    #[test]
    fn test_add_geometry_rejects_other_values() {
        let mut vis = Visualizer::new();
        let err = vis
            .call("add_geometry", CallArgs::positional(vec![Value::from(1.0)]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }

    #[test]
    fn test_update_geometry_replaces_latest_of_kind() {
        let mut vis = Visualizer::new();
        call(&mut vis, "add_geometry", vec![cloud(2).into()]);
        call(&mut vis, "add_geometry", vec![tetrahedron().into()]);
        assert_eq!(call(&mut vis, "update_geometry", vec![cloud(5).into()]), Value::from(true));
        assert_eq!(
            call(&mut vis, "get_geometry", vec![Value::from(0)]),
            Value::from(cloud(5))
        );

        // explicit index of a different kind is not replaced
        let updated = vis
            .call(
                "update_geometry",
                CallArgs::new(vec![cloud(3).into()], vec![("index".to_string(), Value::from(1))]),
            )
            .unwrap();
        assert!(matches!(updated, Returned::Value(Value::Bool(false))));
    }

    #[test]
    fn test_ticker_renders_frames_until_window_closes() {
        let mut vis = Visualizer::new();
        let mut ticker = vis.ticker(SCENE_TICK_RATE);
        ticker.tick().unwrap();
        ticker.tick().unwrap();
        assert!(matches!(
            vis.get_attr("frame_count").unwrap(),
            Returned::Value(Value::Int(2))
        ));

        call(&mut vis, "destroy_window", vec![]);
        ticker.tick().unwrap();
        assert!(matches!(
            vis.get_attr("frame_count").unwrap(),
            Returned::Value(Value::Int(2))
        ));
        assert_eq!(call(&mut vis, "poll_events", vec![]), Value::from(false));
    }

    #[test]
    fn test_capture_screen_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.png");
        let mut vis = Visualizer::new();
        call(&mut vis, "add_geometry", vec![tetrahedron().into()]);
        call(&mut vis, "add_geometry", vec![cloud(16).into()]);
        let captured = call(
            &mut vis,
            "capture_screen_image",
            vec![Value::from(path.to_str().unwrap()), Value::from(true)],
        );
        assert_eq!(captured, Value::from(true));
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_unknown_method() {
        let mut vis = Visualizer::new();
        let err = vis.call("spin", CallArgs::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "AttributeError: 'Visualizer' object has no attribute 'spin'"
        );
    }
}

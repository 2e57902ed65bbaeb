//! Headless pyplot-style plotting namespace
//!
//! The namespace keeps a table of numbered figures, each holding a grid of
//! axes with line/scatter series and images. Figures are rendered with the
//! software rasterizer in [`crate::render`] on `savefig`.
//!
//! In interactive mode every mutation marks the figure stale and the worker
//! ticker redraws stale figures; otherwise figures are drawn on `show`,
//! `draw` and `pause`.

use image::RgbImage;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;
use vizproxy_service::{CallArgs, RemoteTarget, Returned, TargetError, Ticker};
use vizproxy_wire::Value;

use crate::render::{self, Canvas, Projection, Rect, BLACK, GRID};

/// Ticks per second of the interactive plot backend
pub const INTERACTIVE_TICK_RATE: f64 = 80.0;

type Shared<T> = Rc<RefCell<T>>;

/// Local stand-in for a figure passed back by the host, e.g. `close(fig)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureRef(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Line,
    Scatter,
}

#[derive(Debug, Clone)]
pub struct Series {
    pub kind: SeriesKind,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub label: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct AxesState {
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    pub series: Vec<Series>,
    pub images: Vec<RgbImage>,
}

impl AxesState {
    fn clear(&mut self) {
        *self = AxesState::default();
    }
}

#[derive(Debug)]
pub struct FigureState {
    pub number: i64,
    pub axes: Vec<AxesState>,
    /// Subplot layout as (rows, cols)
    pub grid: (usize, usize),
    pub current_axes: usize,
    pub suptitle: String,
    pub stale: bool,
    pub draw_count: u64,
    pub size: (u32, u32),
}

impl FigureState {
    pub fn new(number: i64) -> Self {
        Self {
            number,
            axes: Vec::new(),
            grid: (1, 1),
            current_axes: 0,
            suptitle: String::new(),
            stale: true,
            draw_count: 0,
            size: (render::DEFAULT_WIDTH, render::DEFAULT_HEIGHT),
        }
    }

    /// Current axes index, creating a single axes on an empty figure
    fn gca(&mut self) -> usize {
        if self.axes.is_empty() {
            self.add_subplot();
        }
        self.current_axes
    }

    fn add_subplot(&mut self) -> usize {
        self.axes.push(AxesState::default());
        let (rows, cols) = self.grid;
        if self.axes.len() > rows * cols {
            self.grid = (self.axes.len(), 1);
        }
        self.current_axes = self.axes.len() - 1;
        self.stale = true;
        self.current_axes
    }

    fn subplots(&mut self, rows: usize, cols: usize) -> Vec<usize> {
        self.axes = vec![AxesState::default(); rows * cols];
        self.grid = (rows, cols);
        self.current_axes = 0;
        self.stale = true;
        (0..rows * cols).collect()
    }

    fn clear(&mut self) {
        self.axes.clear();
        self.grid = (1, 1);
        self.current_axes = 0;
        self.suptitle.clear();
        self.stale = true;
    }

    fn draw(&mut self) {
        self.draw_count += 1;
        self.stale = false;
    }

    /// Rasterize the figure
    pub fn render(&self) -> RgbImage {
        let (width, height) = self.size;
        let mut canvas = Canvas::new(width, height);
        let cells = render::grid_cells(width, height, self.grid.0, self.grid.1);
        for (axes, cell) in self.axes.iter().zip(cells) {
            render_axes(&mut canvas, axes, cell);
        }
        canvas.into_image()
    }
}

fn render_axes(canvas: &mut Canvas, axes: &AxesState, cell: Rect) {
    let frame = cell.inset(cell.w.min(cell.h) / 10);
    canvas.outline(frame, BLACK);
    let plot_area = frame.inset(4);

    for image in &axes.images {
        canvas.blit(image, plot_area);
    }
    if axes.series.is_empty() {
        return;
    }

    let points = axes
        .series
        .iter()
        .flat_map(|s| s.x.iter().copied().zip(s.y.iter().copied()));
    let projection = Projection::fit(points, plot_area);
    let origin = projection.apply(0.0, 0.0);
    canvas.line((plot_area.x, origin.1), (plot_area.x + plot_area.w - 1, origin.1), GRID);

    for (index, series) in axes.series.iter().enumerate() {
        let color = render::palette(index);
        let pixels: Vec<(i64, i64)> = series
            .x
            .iter()
            .zip(&series.y)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| projection.apply(*x, *y))
            .collect();
        match series.kind {
            SeriesKind::Line => {
                for pair in pixels.windows(2) {
                    canvas.line(pair[0], pair[1], color);
                }
                if let [only] = pixels.as_slice() {
                    canvas.dot(*only, 0, color);
                }
            }
            SeriesKind::Scatter => {
                for p in pixels {
                    canvas.dot(p, 2, color);
                }
            }
        }
    }
}

/// Figure table shared by the namespace, figure and axes objects
#[derive(Debug, Default)]
pub struct PlotState {
    figures: BTreeMap<i64, Shared<FigureState>>,
    current: Option<i64>,
    interactive: bool,
}

impl PlotState {
    /// Activate figure `number`, creating it if needed; `None` opens a new one
    fn figure(&mut self, number: Option<i64>) -> Shared<FigureState> {
        let number = number.unwrap_or_else(|| self.figures.keys().last().map_or(1, |n| n + 1));
        let figure = self
            .figures
            .entry(number)
            .or_insert_with(|| {
                debug!(number, "figure created");
                Rc::new(RefCell::new(FigureState::new(number)))
            })
            .clone();
        self.current = Some(number);
        figure
    }

    fn gcf(&mut self) -> Shared<FigureState> {
        let current = self.current.and_then(|n| self.figures.get(&n)).cloned();
        current.unwrap_or_else(|| self.figure(None))
    }

    fn close(&mut self, number: i64) -> bool {
        let removed = self.figures.remove(&number).is_some();
        if self.current == Some(number) {
            self.current = self.figures.keys().last().copied();
        }
        removed
    }

    fn close_all(&mut self) {
        self.figures.clear();
        self.current = None;
    }

    fn numbers(&self) -> Vec<i64> {
        self.figures.keys().copied().collect()
    }

    /// Draw every figure, or only the stale ones; returns how many were drawn
    fn draw_figures(&mut self, only_stale: bool) -> usize {
        let mut drawn = 0;
        for figure in self.figures.values() {
            let mut figure = figure.borrow_mut();
            if !only_stale || figure.stale {
                figure.draw();
                drawn += 1;
            }
        }
        drawn
    }
}

const AXES_METHODS: &[&str] = &[
    "plot",
    "scatter",
    "imshow",
    "set_title",
    "set_xlabel",
    "set_ylabel",
    "get_title",
    "cla",
];

/// Axes-level operations shared by [`AxesHandle`] and the namespace shortcuts.
///
/// Returns `None` when `name` is not an axes method.
fn axes_call(
    figure: &mut FigureState,
    index: usize,
    name: &str,
    args: &CallArgs,
) -> Option<Result<Returned, TargetError>> {
    if !AXES_METHODS.contains(&name) {
        return None;
    }
    let Some(axes) = figure.axes.get_mut(index) else {
        return Some(Err(TargetError::runtime(
            "axes were removed from their figure",
        )));
    };
    let result = match name {
        "plot" | "scatter" => {
            let kind = if name == "plot" {
                SeriesKind::Line
            } else {
                SeriesKind::Scatter
            };
            parse_series(kind, args).map(|series| {
                axes.series.push(series);
                Returned::value(axes.series.len())
            })
        }
        "imshow" => args.require(0, "X").and_then(|data| {
            let image = render::value_to_rgb(data).ok_or_else(|| {
                TargetError::type_error(format!(
                    "Invalid shape or type for image data: {}",
                    data.type_name()
                ))
            })?;
            axes.images.push(image);
            Ok(Returned::none())
        }),
        "get_title" => return Some(Ok(Returned::value(axes.title.clone()))),
        "cla" => {
            axes.clear();
            Ok(Returned::none())
        }
        _ => args.str_arg(0, "label").map(|text| {
            let text = text.unwrap_or_default().to_string();
            match name {
                "set_title" => axes.title = text,
                "set_xlabel" => axes.xlabel = text,
                _ => axes.ylabel = text,
            }
            Returned::none()
        }),
    };
    if result.is_ok() {
        figure.stale = true;
    }
    Some(result)
}

fn parse_series(kind: SeriesKind, args: &CallArgs) -> Result<Series, TargetError> {
    let numbers = |value: &Value| {
        value.to_f64_vec().ok_or_else(|| {
            TargetError::type_error(format!(
                "expected numeric data, got {}",
                value.type_name()
            ))
        })
    };
    let (x, y) = match args.args.as_slice() {
        [] => return Err(TargetError::type_error("plot() missing data")),
        [y] => {
            let y = numbers(y)?;
            ((0..y.len()).map(|i| i as f64).collect(), y)
        }
        [x, y, ..] => (numbers(x)?, numbers(y)?),
    };
    if x.len() != y.len() {
        return Err(TargetError::value_error(format!(
            "x and y must have same first dimension, but have shapes ({},) and ({},)",
            x.len(),
            y.len()
        )));
    }
    Ok(Series {
        kind,
        x,
        y,
        label: args.kwarg("label").and_then(Value::as_str).map(str::to_string),
    })
}

fn save_figure(figure: &FigureState, args: &CallArgs) -> Result<Returned, TargetError> {
    let path = args
        .str_arg(0, "fname")?
        .ok_or_else(|| TargetError::type_error("savefig() missing required argument 'fname'"))?;
    image::DynamicImage::ImageRgb8(figure.render())
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| TargetError::runtime(format!("cannot save figure to '{}': {}", path, e)))?;
    debug!(number = figure.number, path, "figure saved");
    Ok(Returned::none())
}

fn figure_number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.downcast_ref::<FigureRef>().map(|f| f.0))
}

/// The remotely exposed plotting module
#[derive(Debug)]
pub struct PlotNamespace {
    state: Shared<PlotState>,
}

impl PlotNamespace {
    pub fn new(interactive: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(PlotState {
                interactive,
                ..PlotState::default()
            })),
        }
    }

    /// Ticker redrawing stale figures while interactive mode is on
    pub fn ticker(&self, rate_hz: f64) -> Ticker {
        let state = Rc::clone(&self.state);
        Ticker::new(rate_hz, move || {
            let mut state = state.borrow_mut();
            if state.interactive {
                state.draw_figures(true);
            }
            Ok(())
        })
    }

    fn figure_handle(&self, figure: Shared<FigureState>) -> Returned {
        Returned::object(FigureHandle { figure })
    }

    fn subplots(&self, args: &CallArgs) -> Result<Returned, TargetError> {
        let dim = |index, name| -> Result<usize, TargetError> {
            match args.get(index, name) {
                None | Some(Value::None) => Ok(1),
                Some(v) => v
                    .as_i64()
                    .filter(|n| *n > 0)
                    .map(|n| n as usize)
                    .ok_or_else(|| {
                        TargetError::value_error(format!(
                            "Number of {} must be a positive integer, not {:?}",
                            name, v
                        ))
                    }),
            }
        };
        let (rows, cols) = (dim(0, "nrows")?, dim(1, "ncols")?);
        let figure = self.state.borrow_mut().figure(None);
        let indices = figure.borrow_mut().subplots(rows, cols);
        let axes: Vec<Returned> = indices
            .into_iter()
            .map(|index| {
                Returned::object(AxesHandle {
                    figure: Rc::clone(&figure),
                    index,
                })
            })
            .collect();
        let axes = match <[Returned; 1]>::try_from(axes) {
            Ok([single]) => single,
            Err(many) => Returned::Tuple(many),
        };
        Ok(Returned::Tuple(vec![self.figure_handle(figure), axes]))
    }

    fn close(&self, args: &CallArgs) -> Result<Returned, TargetError> {
        let mut state = self.state.borrow_mut();
        match args.get(0, "fig") {
            None | Some(Value::None) => {
                if let Some(current) = state.current {
                    state.close(current);
                }
            }
            Some(Value::Str(s)) if s == "all" => state.close_all(),
            Some(value) => {
                let number = figure_number(value).ok_or_else(|| {
                    TargetError::type_error(format!(
                        "close() argument must be a Figure, an int, 'all' or None, not {}",
                        value.type_name()
                    ))
                })?;
                state.close(number);
            }
        }
        Ok(Returned::none())
    }
}

impl RemoteTarget for PlotNamespace {
    fn type_name(&self) -> &str {
        "pyplot"
    }

    fn get_attr(&self, name: &str) -> Result<Returned, TargetError> {
        let state = self.state.borrow();
        match name {
            "interactive" => Ok(Returned::value(state.interactive)),
            "figure_numbers" => Ok(Returned::value(Value::tuple(state.numbers()))),
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn call(&mut self, name: &str, args: CallArgs) -> Result<Returned, TargetError> {
        match name {
            "figure" => {
                let number = args.get(0, "num").and_then(figure_number);
                let figure = self.state.borrow_mut().figure(number);
                Ok(self.figure_handle(figure))
            }
            "gcf" => {
                let figure = self.state.borrow_mut().gcf();
                Ok(self.figure_handle(figure))
            }
            "gca" => {
                let figure = self.state.borrow_mut().gcf();
                let index = figure.borrow_mut().gca();
                Ok(Returned::object(AxesHandle { figure, index }))
            }
            "subplots" => self.subplots(&args),
            "get_fignums" => Ok(Returned::value(Value::tuple(self.state.borrow().numbers()))),
            "close" => PlotNamespace::close(self, &args),
            "clf" => {
                self.state.borrow_mut().gcf().borrow_mut().clear();
                Ok(Returned::none())
            }
            "savefig" => {
                let figure = self.state.borrow_mut().gcf();
                let figure = figure.borrow();
                save_figure(&figure, &args)
            }
            "ion" | "ioff" => {
                self.state.borrow_mut().interactive = name == "ion";
                Ok(Returned::none())
            }
            "isinteractive" => Ok(Returned::value(self.state.borrow().interactive)),
            "show" => {
                let drawn = self.state.borrow_mut().draw_figures(false);
                debug!(drawn, "show");
                Ok(Returned::none())
            }
            "draw" => {
                self.state.borrow_mut().gcf().borrow_mut().draw();
                Ok(Returned::none())
            }
            "pause" => {
                args.f64_or(0, "interval", 0.0)?;
                self.state.borrow_mut().draw_figures(true);
                Ok(Returned::none())
            }
            "title" | "xlabel" | "ylabel" | "plot" | "scatter" | "imshow" | "cla" => {
                let method = match name {
                    "title" => "set_title",
                    "xlabel" => "set_xlabel",
                    "ylabel" => "set_ylabel",
                    other => other,
                };
                let figure = self.state.borrow_mut().gcf();
                let mut figure = figure.borrow_mut();
                let index = figure.gca();
                axes_call(&mut figure, index, method, &args)
                    .unwrap_or_else(|| Err(TargetError::no_attribute(self.type_name(), name)))
            }
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn close(&mut self) {
        self.state.borrow_mut().close_all();
    }
}

/// Remote view of one figure
#[derive(Debug)]
pub struct FigureHandle {
    figure: Shared<FigureState>,
}

impl RemoteTarget for FigureHandle {
    fn type_name(&self) -> &str {
        "Figure"
    }

    fn get_attr(&self, name: &str) -> Result<Returned, TargetError> {
        let figure = self.figure.borrow();
        match name {
            "number" => Ok(Returned::value(figure.number)),
            "stale" => Ok(Returned::value(figure.stale)),
            "draw_count" => Ok(Returned::value(figure.draw_count as i64)),
            "suptitle_text" => Ok(Returned::value(figure.suptitle.clone())),
            "axes" => Ok(Returned::Tuple(
                (0..figure.axes.len())
                    .map(|index| {
                        Returned::object(AxesHandle {
                            figure: Rc::clone(&self.figure),
                            index,
                        })
                    })
                    .collect(),
            )),
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn call(&mut self, name: &str, args: CallArgs) -> Result<Returned, TargetError> {
        match name {
            "add_subplot" | "gca" => {
                let index = {
                    let mut figure = self.figure.borrow_mut();
                    if name == "gca" {
                        figure.gca()
                    } else {
                        figure.add_subplot()
                    }
                };
                Ok(Returned::object(AxesHandle {
                    figure: Rc::clone(&self.figure),
                    index,
                }))
            }
            "clf" => {
                self.figure.borrow_mut().clear();
                Ok(Returned::none())
            }
            "suptitle" => {
                let text = args.str_arg(0, "t")?.unwrap_or_default().to_string();
                let mut figure = self.figure.borrow_mut();
                figure.suptitle = text;
                figure.stale = true;
                Ok(Returned::none())
            }
            "draw" => {
                self.figure.borrow_mut().draw();
                Ok(Returned::none())
            }
            "savefig" => save_figure(&self.figure.borrow(), &args),
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn handle(&self) -> Option<Value> {
        Some(Value::ext(FigureRef(self.figure.borrow().number)))
    }
}

/// Remote view of one axes of a figure
#[derive(Debug)]
pub struct AxesHandle {
    figure: Shared<FigureState>,
    index: usize,
}

impl RemoteTarget for AxesHandle {
    fn type_name(&self) -> &str {
        "Axes"
    }

    fn get_attr(&self, name: &str) -> Result<Returned, TargetError> {
        let figure = self.figure.borrow();
        let axes = figure
            .axes
            .get(self.index)
            .ok_or_else(|| TargetError::runtime("axes were removed from their figure"))?;
        match name {
            "title" => Ok(Returned::value(axes.title.clone())),
            "xlabel" => Ok(Returned::value(axes.xlabel.clone())),
            "ylabel" => Ok(Returned::value(axes.ylabel.clone())),
            "line_count" => Ok(Returned::value(axes.series.len())),
            "image_count" => Ok(Returned::value(axes.images.len())),
            "figure_number" => Ok(Returned::value(figure.number)),
            _ => Err(TargetError::no_attribute(self.type_name(), name)),
        }
    }

    fn call(&mut self, name: &str, args: CallArgs) -> Result<Returned, TargetError> {
        let mut figure = self.figure.borrow_mut();
        axes_call(&mut figure, self.index, name, &args)
            .unwrap_or_else(|| Err(TargetError::no_attribute(self.type_name(), name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use vizproxy_service::ErrorKind;

    fn call(target: &mut dyn RemoteTarget, name: &str, args: Vec<Value>) -> Returned {
        target.call(name, CallArgs::positional(args)).unwrap()
    }

    fn object(returned: Returned) -> Box<dyn RemoteTarget> {
        match returned {
            Returned::Object(target) => target,
            other => panic!("expected an object, got {:?}", other),
        }
    }

    fn value(returned: Returned) -> Value {
        match returned {
            Returned::Value(value) => value,
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_figure_numbers() {
        let mut plt = PlotNamespace::new(false);
        let fig1 = object(call(&mut plt, "figure", vec![]));
        let _fig2 = object(call(&mut plt, "figure", vec![]));
        let _fig7 = object(call(&mut plt, "figure", vec![Value::from(7)]));
        assert_eq!(value(fig1.get_attr("number").unwrap()), Value::from(1));
        assert_eq!(
            value(call(&mut plt, "get_fignums", vec![])),
            Value::tuple(vec![1i64, 2, 7])
        );

        // close by handle, by number, then the current one
        call(&mut plt, "close", vec![fig1.handle().unwrap()]);
        call(&mut plt, "close", vec![Value::from(2)]);
        assert_eq!(
            value(plt.get_attr("figure_numbers").unwrap()),
            Value::tuple(vec![7i64])
        );
        call(&mut plt, "close", vec![]);
        assert_eq!(value(call(&mut plt, "get_fignums", vec![])), Value::tuple(Vec::<i64>::new()));
    }

    #[test]
    fn test_plot_on_implicit_axes() {
        let mut plt = PlotNamespace::new(false);
        call(&mut plt, "plot", vec![Value::from(array![1.0, 4.0, 9.0])]);
        call(&mut plt, "title", vec![Value::from("squares")]);

        let ax = object(call(&mut plt, "gca", vec![]));
        assert_eq!(value(ax.get_attr("line_count").unwrap()), Value::from(1usize));
        assert_eq!(value(ax.get_attr("title").unwrap()), Value::from("squares"));
    }

    #[test]
    fn test_plot_length_mismatch() {
        let mut plt = PlotNamespace::new(false);
        let err = plt
            .call(
                "plot",
                CallArgs::positional(vec![
                    Value::tuple(vec![1.0, 2.0]),
                    Value::tuple(vec![1.0, 2.0, 3.0]),
                ]),
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Value);
        assert!(err.message.contains("(2,) and (3,)"));
    }

    #[test]
    fn test_subplots_shapes() {
        let mut plt = PlotNamespace::new(false);
        match call(&mut plt, "subplots", vec![]) {
            Returned::Tuple(items) => {
                assert!(matches!(items.as_slice(), [Returned::Object(_), Returned::Object(_)]));
            }
            other => panic!("unexpected {:?}", other),
        }
        match call(&mut plt, "subplots", vec![Value::from(2), Value::from(3)]) {
            Returned::Tuple(mut items) => match items.pop() {
                Some(Returned::Tuple(axes)) => assert_eq!(axes.len(), 6),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        let err = plt
            .call("subplots", CallArgs::positional(vec![Value::from(0)]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Value);
    }

    #[test]
    fn test_unknown_names() {
        let mut plt = PlotNamespace::new(false);
        assert_eq!(
            plt.call("frobnicate", CallArgs::default()).unwrap_err().kind,
            ErrorKind::Attribute
        );
        let mut ax = object(call(&mut plt, "gca", vec![]));
        let err = ax.call("frobnicate", CallArgs::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "AttributeError: 'Axes' object has no attribute 'frobnicate'"
        );
    }

    #[test]
    fn test_interactive_ticker_redraws_stale_figures() {
        let mut plt = PlotNamespace::new(true);
        let mut ticker = plt.ticker(INTERACTIVE_TICK_RATE);
        let fig = object(call(&mut plt, "figure", vec![]));
        call(&mut plt, "plot", vec![Value::tuple(vec![0.0, 1.0])]);
        assert_eq!(value(fig.get_attr("stale").unwrap()), Value::from(true));

        ticker.tick().unwrap();
        assert_eq!(value(fig.get_attr("stale").unwrap()), Value::from(false));
        assert_eq!(value(fig.get_attr("draw_count").unwrap()), Value::from(1));

        // nothing stale, nothing drawn
        ticker.tick().unwrap();
        assert_eq!(value(fig.get_attr("draw_count").unwrap()), Value::from(1));

        call(&mut plt, "ioff", vec![]);
        call(&mut plt, "plot", vec![Value::tuple(vec![2.0, 3.0])]);
        ticker.tick().unwrap();
        assert_eq!(value(fig.get_attr("stale").unwrap()), Value::from(true));
    }

    #[test]
    fn test_savefig_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.png");
        let mut plt = PlotNamespace::new(false);
        call(&mut plt, "scatter", vec![Value::tuple(vec![0.0, 1.0, 2.0]), Value::tuple(vec![2.0, 0.0, 1.0])]);
        call(&mut plt, "imshow", vec![Value::from(array![[0u8, 255], [255, 0]])]);
        call(&mut plt, "savefig", vec![Value::from(path.to_str().unwrap())]);

        let saved = image::open(&path).unwrap();
        assert_eq!(
            (saved.width(), saved.height()),
            (render::DEFAULT_WIDTH, render::DEFAULT_HEIGHT)
        );
    }

    #[test]
    fn test_imshow_rejects_non_images() {
        let mut plt = PlotNamespace::new(false);
        let err = plt
            .call("imshow", CallArgs::positional(vec![Value::from("nope")]))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }
}

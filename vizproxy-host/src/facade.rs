//! Typed wrappers over the remote plotting namespace and scene visualizer
//!
//! These cover the common calls. Anything else goes through
//! [`RemoteObject::invoke`] on the wrapped object.

use std::path::Path;
use vizproxy_wire::Value;

use crate::error::HostError;
use crate::remote::RemoteObject;

fn expect_bool(value: Value) -> Result<bool, HostError> {
    value
        .as_bool()
        .ok_or_else(|| HostError::UnexpectedReply(format!("expected bool, got {:?}", value)))
}

fn expect_int(value: Value) -> Result<i64, HostError> {
    value
        .as_i64()
        .ok_or_else(|| HostError::UnexpectedReply(format!("expected int, got {:?}", value)))
}

fn path_value(path: &Path) -> Value {
    Value::from(path.to_string_lossy().into_owned())
}

/// The remote pyplot-style namespace
#[derive(Debug, Clone)]
pub struct PlotProxy {
    root: RemoteObject,
}

impl PlotProxy {
    pub fn new(root: RemoteObject) -> Self {
        Self { root }
    }

    pub fn object(&self) -> &RemoteObject {
        &self.root
    }

    /// Activate figure `number`, or open a new one
    pub async fn figure(&self, number: Option<i64>) -> Result<FigureProxy, HostError> {
        let args = number.map(Value::from).into_iter().collect();
        let object = self.root.invoke_object("figure", args).await?;
        Ok(FigureProxy { object })
    }

    pub async fn gcf(&self) -> Result<FigureProxy, HostError> {
        let object = self.root.invoke_object("gcf", Vec::new()).await?;
        Ok(FigureProxy { object })
    }

    /// New figure with a `rows` x `cols` grid of axes, in row-major order
    pub async fn subplots(
        &self,
        rows: usize,
        cols: usize,
    ) -> Result<(FigureProxy, Vec<AxesProxy>), HostError> {
        let reply = self
            .root
            .invoke("subplots", vec![Value::from(rows), Value::from(cols)])
            .await?;
        let Value::Tuple(mut items) = reply else {
            return Err(HostError::UnexpectedReply(format!(
                "expected (figure, axes), got {:?}",
                reply
            )));
        };
        let (Some(axes), Some(figure), true) = (items.pop(), items.pop(), items.is_empty()) else {
            return Err(HostError::UnexpectedReply(
                "subplots() must return two items".to_string(),
            ));
        };
        let figure = FigureProxy {
            object: self.root.from_value(figure)?,
        };
        let axes = match axes {
            Value::Tuple(many) => many,
            single => vec![single],
        };
        let axes = axes
            .into_iter()
            .map(|value| self.root.from_value(value).map(|object| AxesProxy { object }))
            .collect::<Result<_, _>>()?;
        Ok((figure, axes))
    }

    pub async fn plot(&self, x: impl Into<Value>, y: impl Into<Value>) -> Result<(), HostError> {
        self.root.invoke("plot", vec![x.into(), y.into()]).await.map(drop)
    }

    pub async fn scatter(&self, x: impl Into<Value>, y: impl Into<Value>) -> Result<(), HostError> {
        self.root
            .invoke("scatter", vec![x.into(), y.into()])
            .await
            .map(drop)
    }

    pub async fn title(&self, text: &str) -> Result<(), HostError> {
        self.root.invoke("title", vec![text.into()]).await.map(drop)
    }

    pub async fn xlabel(&self, text: &str) -> Result<(), HostError> {
        self.root.invoke("xlabel", vec![text.into()]).await.map(drop)
    }

    pub async fn ylabel(&self, text: &str) -> Result<(), HostError> {
        self.root.invoke("ylabel", vec![text.into()]).await.map(drop)
    }

    pub async fn clf(&self) -> Result<(), HostError> {
        self.root.invoke("clf", Vec::new()).await.map(drop)
    }

    pub async fn show(&self) -> Result<(), HostError> {
        self.root.invoke("show", Vec::new()).await.map(drop)
    }

    pub async fn ion(&self) -> Result<(), HostError> {
        self.root.invoke("ion", Vec::new()).await.map(drop)
    }

    pub async fn ioff(&self) -> Result<(), HostError> {
        self.root.invoke("ioff", Vec::new()).await.map(drop)
    }

    pub async fn pause(&self, seconds: f64) -> Result<(), HostError> {
        self.root.invoke("pause", vec![seconds.into()]).await.map(drop)
    }

    pub async fn savefig(&self, path: &Path) -> Result<(), HostError> {
        self.root
            .invoke("savefig", vec![path_value(path)])
            .await
            .map(drop)
    }

    pub async fn figure_numbers(&self) -> Result<Vec<i64>, HostError> {
        let value = self.root.getattr("figure_numbers").await?;
        let items = value.as_tuple().ok_or_else(|| {
            HostError::UnexpectedReply(format!("expected a tuple, got {:?}", value))
        })?;
        items.iter().cloned().map(expect_int).collect()
    }
}

#[derive(Debug, Clone)]
pub struct FigureProxy {
    object: RemoteObject,
}

impl FigureProxy {
    pub fn object(&self) -> &RemoteObject {
        &self.object
    }

    pub async fn number(&self) -> Result<i64, HostError> {
        expect_int(self.object.getattr("number").await?)
    }

    pub async fn add_subplot(&self) -> Result<AxesProxy, HostError> {
        let object = self.object.invoke_object("add_subplot", Vec::new()).await?;
        Ok(AxesProxy { object })
    }

    pub async fn suptitle(&self, text: &str) -> Result<(), HostError> {
        self.object
            .invoke("suptitle", vec![text.into()])
            .await
            .map(drop)
    }

    pub async fn savefig(&self, path: &Path) -> Result<(), HostError> {
        self.object
            .invoke("savefig", vec![path_value(path)])
            .await
            .map(drop)
    }

    pub async fn release(self) -> Result<(), HostError> {
        self.object.release().await
    }
}

#[derive(Debug, Clone)]
pub struct AxesProxy {
    object: RemoteObject,
}

impl AxesProxy {
    pub fn object(&self) -> &RemoteObject {
        &self.object
    }

    pub async fn plot(&self, x: impl Into<Value>, y: impl Into<Value>) -> Result<(), HostError> {
        self.object
            .invoke("plot", vec![x.into(), y.into()])
            .await
            .map(drop)
    }

    pub async fn scatter(&self, x: impl Into<Value>, y: impl Into<Value>) -> Result<(), HostError> {
        self.object
            .invoke("scatter", vec![x.into(), y.into()])
            .await
            .map(drop)
    }

    pub async fn imshow(&self, image: impl Into<Value>) -> Result<(), HostError> {
        self.object
            .invoke("imshow", vec![image.into()])
            .await
            .map(drop)
    }

    pub async fn set_title(&self, text: &str) -> Result<(), HostError> {
        self.object
            .invoke("set_title", vec![text.into()])
            .await
            .map(drop)
    }

    pub async fn set_xlabel(&self, text: &str) -> Result<(), HostError> {
        self.object
            .invoke("set_xlabel", vec![text.into()])
            .await
            .map(drop)
    }

    pub async fn set_ylabel(&self, text: &str) -> Result<(), HostError> {
        self.object
            .invoke("set_ylabel", vec![text.into()])
            .await
            .map(drop)
    }

    pub async fn line_count(&self) -> Result<i64, HostError> {
        expect_int(self.object.getattr("line_count").await?)
    }

    pub async fn release(self) -> Result<(), HostError> {
        self.object.release().await
    }
}

/// The remote 3D visualizer
#[derive(Debug, Clone)]
pub struct SceneProxy {
    root: RemoteObject,
}

impl SceneProxy {
    pub fn new(root: RemoteObject) -> Self {
        Self { root }
    }

    pub fn object(&self) -> &RemoteObject {
        &self.root
    }

    pub async fn add_geometry(&self, geometry: impl Into<Value>) -> Result<bool, HostError> {
        expect_bool(self.root.invoke("add_geometry", vec![geometry.into()]).await?)
    }

    pub async fn remove_geometry(&self, geometry: impl Into<Value>) -> Result<bool, HostError> {
        expect_bool(
            self.root
                .invoke("remove_geometry", vec![geometry.into()])
                .await?,
        )
    }

    pub async fn clear_geometries(&self) -> Result<(), HostError> {
        self.root
            .invoke("clear_geometries", Vec::new())
            .await
            .map(drop)
    }

    /// Replace a geometry; without `index` the latest geometry of the same kind
    pub async fn update_geometry(
        &self,
        geometry: impl Into<Value>,
        index: Option<usize>,
    ) -> Result<bool, HostError> {
        let kwargs = index
            .map(|i| ("index".to_string(), Value::from(i)))
            .into_iter()
            .collect();
        expect_bool(
            self.root
                .call("update_geometry", vec![geometry.into()], kwargs)
                .await?,
        )
    }

    pub async fn poll_events(&self) -> Result<bool, HostError> {
        expect_bool(self.root.invoke("poll_events", Vec::new()).await?)
    }

    pub async fn update_renderer(&self) -> Result<(), HostError> {
        self.root
            .invoke("update_renderer", Vec::new())
            .await
            .map(drop)
    }

    pub async fn capture_screen_image(&self, path: &Path, do_render: bool) -> Result<(), HostError> {
        self.root
            .invoke(
                "capture_screen_image",
                vec![path_value(path), Value::from(do_render)],
            )
            .await
            .map(drop)
    }

    pub async fn geometry_count(&self) -> Result<usize, HostError> {
        let count = expect_int(self.root.getattr("geometry_count").await?)?;
        usize::try_from(count)
            .map_err(|_| HostError::UnexpectedReply(format!("negative geometry count {}", count)))
    }
}

//! End-to-end demos driving a worker through a host

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use vizproxy_config::HostConfig;
use vizproxy_host::{HostError, PlotProxy, ProxyHost, SceneProxy};
use vizproxy_wire::{PointCloud, TriangleMesh, Vector3dVector};

fn linspace(start: f64, end: f64, n: usize) -> Array1<f64> {
    Array1::linspace(start, end, n)
}

/// Plot sine and cosine on the left, a scatter and a gradient on the right
pub async fn run_plot(mut config: HostConfig, interactive: bool, output: PathBuf) -> Result<()> {
    config.backend = if interactive { "plot-interactive" } else { "plot" }.to_string();
    info!(backend = %config.backend, output = %output.display(), "running plot demo");

    let target = output.clone();
    let draws = ProxyHost::scoped(config, |root| async move {
        let plt = PlotProxy::new(root);
        let (fig, axes) = plt.subplots(1, 2).await?;
        let (left, right) = match axes.as_slice() {
            [left, right] => (left, right),
            _ => return Err(HostError::UnexpectedReply("expected two axes".to_string())),
        };

        let x = linspace(0.0, 2.0 * PI, 200);
        left.plot(x.clone(), x.mapv(f64::sin)).await?;
        left.plot(x.clone(), x.mapv(f64::cos)).await?;
        left.set_title("sin and cos").await?;
        left.set_xlabel("x").await?;

        let gradient = Array2::from_shape_fn((32, 48), |(r, c)| ((r * 4 + c * 2) % 256) as u8);
        right.imshow(gradient).await?;
        let px = linspace(0.0, 47.0, 12);
        right.scatter(px.clone(), px.mapv(|v| 16.0 + 10.0 * (v / 6.0).sin())).await?;
        right.set_title("gradient").await?;
        fig.suptitle("vizproxy").await?;

        if interactive {
            // Redraw-heavy loop: fire-and-forget updates, the worker ticker repaints
            for frame in 0..20 {
                let phase = f64::from(frame) * 0.1;
                left.object()
                    .notify("plot", vec![x.clone().into(), x.mapv(|v| (v + phase).sin()).into()])
                    .await?;
                plt.pause(0.05).await?;
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        }

        fig.savefig(&target).await?;
        let draws = fig.object().getattr("draw_count").await?;
        Ok(draws)
    })
    .await
    .context("plot demo failed")?;

    println!("Figure written to {} (draws: {:?})", output.display(), draws);
    Ok(())
}

fn octahedron() -> TriangleMesh {
    TriangleMesh {
        vertices: vec![
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ]
        .into(),
        triangles: vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ]
        .into(),
    }
}

fn spiral(turn: f64) -> PointCloud {
    let n = 240;
    let points: Vec<[f64; 3]> = (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            let angle = turn + t * 6.0 * PI;
            [1.6 * angle.cos(), 2.0 * t - 1.0, 1.6 * angle.sin()]
        })
        .collect();
    let colors = (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            [t, 0.3, 1.0 - t]
        })
        .collect::<Vec<_>>();
    PointCloud {
        points: points.into(),
        colors: Vector3dVector(colors),
    }
}

/// Add a mesh and a spiral, rotate the spiral for a few frames and capture
pub async fn run_scene(mut config: HostConfig, output: PathBuf) -> Result<()> {
    config.backend = "scene".to_string();
    info!(output = %output.display(), "running scene demo");

    let target = output.clone();
    let count = ProxyHost::scoped(config, |root| async move {
        let scene = SceneProxy::new(root);
        scene.add_geometry(octahedron()).await?;
        scene.add_geometry(spiral(0.0)).await?;

        for frame in 1..=30 {
            scene
                .update_geometry(spiral(f64::from(frame) * 0.1), None)
                .await?;
            if !scene.poll_events().await? {
                break;
            }
            scene.update_renderer().await?;
        }

        scene.capture_screen_image(&target, true).await?;
        let frames = scene.object().getattr("frame_count").await?;
        info!(frames = ?frames, "scene rendered");
        scene.geometry_count().await
    })
    .await
    .context("scene demo failed")?;

    println!("Scene with {} geometries written to {}", count, output.display());
    Ok(())
}


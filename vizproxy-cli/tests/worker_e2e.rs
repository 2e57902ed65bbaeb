use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use vizproxy_config::HostConfig;
use vizproxy_host::{HostError, PlotProxy, ProxyHost, SceneProxy};
use vizproxy_wire::ndarray::{array, Array2};
use vizproxy_wire::{PointCloud, Value};

fn vizproxy_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vizproxy"))
}

/// Whether a process with `pid` still exists, zombies included
#[cfg(target_os = "linux")]
fn process_exists(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{}", pid)).exists()
}

fn host_config(backend: &str) -> HostConfig {
    HostConfig {
        worker_program: Some(vizproxy_bin()),
        poll_interval: Duration::from_millis(50),
        start_timeout: Some(Duration::from_secs(20)),
        shutdown_timeout: Duration::from_secs(5),
        ..HostConfig::for_backend(backend)
    }
}

#[derive(Debug, PartialEq)]
struct OpenSocket(u16);

#[tokio::test]
async fn test_unknown_backend_is_reported_unavailable() {
    let mut host = ProxyHost::new(host_config("no-such-backend"));
    let err = host.start().await.unwrap_err();
    assert!(
        matches!(err, HostError::BackendUnavailable { ref reason } if reason.contains("no such backend")),
        "unexpected error: {:?}",
        err
    );
    assert!(err.is_startup_failure());
    assert!(!host.is_connected());
    assert!(host.pid().is_none());

    let spawned = host.last_worker_pid().expect("worker was spawned");
    #[cfg(target_os = "linux")]
    {
        assert!(!process_exists(spawned), "worker {} left behind", spawned);
    }
    let _ = spawned;
}

#[cfg(unix)]
#[tokio::test]
async fn test_worker_exiting_without_report() {
    let config = HostConfig {
        worker_program: Some(PathBuf::from("/bin/false")),
        ..host_config("plot")
    };
    let mut host = ProxyHost::new(config);
    let err = host.start().await.unwrap_err();
    assert!(matches!(err, HostError::WorkerExited { .. }), "{:?}", err);
    assert!(!host.is_connected());

    #[cfg(target_os = "linux")]
    {
        let spawned = host.last_worker_pid().unwrap();
        assert!(!process_exists(spawned), "worker {} left behind", spawned);
    }
}

#[tokio::test]
async fn test_worker_accepts_a_single_connection() {
    let mut host = ProxyHost::new(host_config("plot"));
    host.start().await.unwrap();
    let port = host.port().unwrap();

    let second = tokio::net::TcpStream::connect(("127.0.0.1", port)).await;
    assert!(second.is_err(), "listener still open after the host connected");

    assert_eq!(host.getattr("interactive").await.unwrap(), Value::from(false));
    host.stop().await.unwrap();
}

#[tokio::test]
async fn test_start_and_stop_are_guarded() {
    let mut host = ProxyHost::new(host_config("plot"));
    host.start().await.unwrap();
    assert!(matches!(host.start().await, Err(HostError::AlreadyStarted)));

    host.stop().await.unwrap();
    host.stop().await.unwrap();
    let err = host.invoke("gcf", Vec::new()).await.unwrap_err();
    assert!(matches!(err, HostError::NotStarted));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_worker_is_reaped_after_stop() {
    let mut host = ProxyHost::new(host_config("scene"));
    host.start().await.unwrap();
    let pid = host.pid().unwrap();
    assert_eq!(host.last_worker_pid(), Some(pid));
    assert!(process_exists(pid));

    host.stop().await.unwrap();
    assert!(!process_exists(pid), "worker {} still present after stop", pid);
}

#[tokio::test]
async fn test_remote_errors_keep_the_worker_usable() {
    let mut host = ProxyHost::new(host_config("plot"));
    host.start().await.unwrap();

    let err = host.getattr("no_such_attribute").await.unwrap_err();
    assert_eq!(err.remote_kind(), Some("AttributeError"));
    assert_eq!(
        err.to_string(),
        "AttributeError: 'pyplot' object has no attribute 'no_such_attribute'"
    );

    let err = host
        .invoke("plot", vec![Value::ext(OpenSocket(22))])
        .await
        .unwrap_err();
    assert!(err.is_recoverable());

    let plt = PlotProxy::new(host.root().unwrap().clone());
    let fig = plt.figure(None).await.unwrap();
    assert_eq!(fig.number().await.unwrap(), 1);
    host.stop().await.unwrap();
}

#[tokio::test]
async fn test_geometry_round_trip_through_worker() {
    let mut host = ProxyHost::new(host_config("scene"));
    host.start().await.unwrap();
    let scene = SceneProxy::new(host.root().unwrap().clone());

    let cloud = PointCloud {
        points: vec![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]].into(),
        colors: vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]].into(),
    };
    assert!(scene.add_geometry(cloud.clone()).await.unwrap());
    let back = host.invoke("get_geometry", vec![Value::from(0)]).await.unwrap();
    assert_eq!(back.downcast_ref::<PointCloud>(), Some(&cloud));

    host.stop().await.unwrap();
}

#[tokio::test]
async fn test_arrays_cross_to_worker() {
    let mut host = ProxyHost::new(host_config("plot"));
    host.start().await.unwrap();
    let plt = PlotProxy::new(host.root().unwrap().clone());
    let (_fig, axes) = plt.subplots(1, 1).await.unwrap();
    let ax = &axes[0];

    let gradient = Array2::from_shape_fn((8, 16), |(r, c)| (r * 16 + c) as f32 / 128.0);
    ax.imshow(gradient).await.unwrap();
    assert_eq!(ax.object().getattr("image_count").await.unwrap(), Value::from(1));

    ax.plot(array![0u16, 1, 2], array![1.5f64, 2.5, 0.5]).await.unwrap();
    let err = ax
        .plot(array![0.0, 1.0], array![0.0, 1.0, 2.0])
        .await
        .unwrap_err();
    assert_eq!(err.remote_kind(), Some("ValueError"));
    assert!(err.to_string().contains("(2,) and (3,)"), "{}", err);
    assert_eq!(ax.line_count().await.unwrap(), 1);

    host.stop().await.unwrap();
}

#[tokio::test]
async fn test_scoped_host_stops_worker() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scoped.png");
    let out = path.clone();
    let numbers = ProxyHost::scoped(host_config("plot"), |root| async move {
        let plt = PlotProxy::new(root);
        plt.plot(Value::tuple(vec![0.0, 1.0]), Value::tuple(vec![1.0, 0.0]))
            .await?;
        plt.savefig(&out).await?;
        plt.figure_numbers().await
    })
    .await
    .unwrap();
    assert_eq!(numbers, vec![1]);
    assert!(path.exists());
}

#[test]
fn test_backends_command_lists_backends() {
    let output = Command::new(vizproxy_bin()).arg("backends").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for name in ["plot", "plot-interactive", "scene"] {
        assert!(stdout.contains(name), "missing {} in {}", name, stdout);
    }
}

#[test]
fn test_config_generate_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vizproxy.yaml");

    let status = Command::new(vizproxy_bin())
        .args(["config", "generate", "--output"])
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(path.exists());

    let again = Command::new(vizproxy_bin())
        .args(["config", "generate", "--output"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!again.status.success());

    let output = Command::new(vizproxy_bin())
        .args(["config", "validate", "--config-file"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("valid"));
}

use std::{
    env,
    fs,
    io::{BufRead, BufReader, Read, Write},
    net::{Ipv4Addr, TcpListener, UdpSocket},
    path::Path,
    process::{Child, Command as Process, Stdio},
    sync::{mpsc, Mutex, OnceLock},
    thread,
    time::{Duration, Instant},
};

use sensorlcd::{
    app::AppConfig,
    cli::{Command, RunOptions},
    config::Config,
};

const BODY: &str = r#"{"hasalarms":false,"tempc":72.5,"temptrend":0.2,"humidity":45,"humiditytrend":-1,"darkness":500000,"lightscale":10}"#;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn with_temp_home<F: FnOnce(&Path)>(f: F) {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    let original_home = env::var_os("HOME");
    let original_xdg = env::var_os("XDG_CONFIG_HOME");
    let home = tempfile::tempdir().unwrap();
    env::set_var("HOME", home.path());
    env::remove_var("XDG_CONFIG_HOME");
    f(home.path());
    match original_home {
        Some(val) => env::set_var("HOME", val),
        None => env::remove_var("HOME"),
    }
    if let Some(val) = original_xdg {
        env::set_var("XDG_CONFIG_HOME", val);
    }
}

/// Fake sensor: answers every discovery probe and serves `/data` forever.
fn spawn_sensor() -> (u16, u16) {
    let udp = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let probe_port = udp.local_addr().unwrap().port();
    thread::spawn(move || {
        let mut buf = [0u8; 64];
        while let Ok((_, from)) = udp.recv_from(&mut buf) {
            let _ = udp.send_to(b"GSM", from);
        }
    });

    let http = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let http_port = http.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in http.incoming() {
            let Ok(stream) = stream else { continue };
            let mut reader = BufReader::new(stream);
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if line == "\r\n" => break,
                    Ok(_) => {}
                }
            }
            let mut stream = reader.into_inner();
            let _ = write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{BODY}",
                BODY.len()
            );
        }
    });
    (probe_port, http_port)
}

fn write_config(dir: &Path, probe_port: u16, http_port: u16) -> String {
    let path = dir.join("config.toml");
    let pid = dir.join("sensorlcd.pid");
    fs::write(
        &path,
        format!(
            r#"
pid_file = "{}"

[discovery]
listen_port = 0
probe_port = {probe_port}
broadcast_addr = "127.0.0.1"
probe_timeout = "500ms"
found_pause = "0s"

[sensor]
http_port = {http_port}

[display]
headless = true

[logging]
level = "debug"
file = ""
"#,
            pid.display()
        ),
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

fn spawn_daemon(config: &str) -> Child {
    Process::new(env!("CARGO_BIN_EXE_sensorlcd"))
        .args(["--config", config])
        .env_remove("SENSORLCD_LOG_LEVEL")
        .env_remove("SENSORLCD_LOG_PATH")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

fn stderr_lines(child: &mut Child) -> mpsc::Receiver<String> {
    let stderr = child.stderr.take().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn wait_for_line(rx: &mpsc::Receiver<String>, needle: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(line) if line.contains(needle) => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<i32> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return status.code();
        }
        thread::sleep(Duration::from_millis(20));
    }
    let _ = child.kill();
    None
}

#[test]
fn prints_version() {
    let out = Process::new(env!("CARGO_BIN_EXE_sensorlcd"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        env!("CARGO_PKG_VERSION")
    );
}

#[test]
fn help_lists_core_flags() {
    let help = Command::help();
    for flag in ["--config", "--pcf8574-addr", "--i2c-bus", "--log-level", "--pid-file", "--headless"] {
        assert!(help.contains(flag), "help output missing flag {flag}: {help}");
    }
}

#[test]
fn unknown_flag_exits_with_error() {
    let mut child = Process::new(env!("CARGO_BIN_EXE_sensorlcd"))
        .arg("--bogus")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let code = wait_with_timeout(&mut child, Duration::from_secs(5));
    let mut err = String::new();
    child.stderr.take().unwrap().read_to_string(&mut err).unwrap();
    assert_eq!(code, Some(1));
    assert!(err.contains("error: invalid arguments: unknown flag '--bogus'"), "{err}");
}

#[test]
fn default_config_is_created_under_home() {
    with_temp_home(|home| {
        let cfg = Config::load_or_default().unwrap();
        assert_eq!(cfg, Config::default());
        assert!(home.join(".config/sensorlcd/config.toml").exists());
        let merged = AppConfig::from_sources(cfg, RunOptions::default());
        assert_eq!(merged.discovery.probe_port, 37020);
        assert_eq!(merged.discovery.listen_port, 37030);
    });
}

#[test]
fn sigterm_mid_heartbeat_exits_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let (probe_port, http_port) = spawn_sensor();
    let config = write_config(dir.path(), probe_port, http_port);

    let mut daemon = spawn_daemon(&config);
    let lines = stderr_lines(&mut daemon);
    assert!(
        wait_for_line(&lines, "data retrieved", Duration::from_secs(15)),
        "daemon never fetched data"
    );
    assert!(dir.path().join("sensorlcd.pid").exists());

    // a second instance must refuse to start while the first holds the lock
    let second = Process::new(env!("CARGO_BIN_EXE_sensorlcd"))
        .args(["--config", &config])
        .env_remove("SENSORLCD_LOG_PATH")
        .output()
        .unwrap();
    assert_eq!(second.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&second.stderr).contains("sensorlcd is already running"));

    // the daemon is now inside its ten second heartbeat
    let sent = Instant::now();
    let status = Process::new("kill")
        .args(["-TERM", &daemon.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
    let code = wait_with_timeout(&mut daemon, Duration::from_secs(5));
    assert_eq!(code, Some(0));
    assert!(sent.elapsed() < Duration::from_secs(5));
}

#[test]
fn sigquit_takes_the_same_shutdown_path() {
    let dir = tempfile::tempdir().unwrap();
    let (probe_port, http_port) = spawn_sensor();
    let config = write_config(dir.path(), probe_port, http_port);

    let mut daemon = spawn_daemon(&config);
    let lines = stderr_lines(&mut daemon);
    assert!(
        wait_for_line(&lines, "data retrieved", Duration::from_secs(15)),
        "daemon never fetched data"
    );

    let status = Process::new("kill")
        .args(["-QUIT", &daemon.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
    let code = wait_with_timeout(&mut daemon, Duration::from_secs(5));
    assert_eq!(code, Some(0));
    assert!(wait_for_line(
        &lines,
        "termination signal received",
        Duration::from_secs(2)
    ));
}

#![cfg(all(unix, feature = "cli"))]

use std::ffi::CStr;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use rmserial::frame::{crc, ReceivePacket, SendPacket};

const TIMEOUT: Duration = Duration::from_secs(10);

struct Pty {
    master: File,
    slave_path: PathBuf,
    // held so the master never sees a hangup between bridge reopens
    _slave: File,
}

fn open_pty() -> Pty {
    unsafe {
        let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
        assert!(fd >= 0, "posix_openpt failed");
        let master = File::from_raw_fd(fd);
        assert_eq!(libc::grantpt(fd), 0, "grantpt failed");
        assert_eq!(libc::unlockpt(fd), 0, "unlockpt failed");
        let name = libc::ptsname(fd);
        assert!(!name.is_null(), "ptsname failed");
        let slave_path = PathBuf::from(CStr::from_ptr(name).to_string_lossy().into_owned());

        let slave = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&slave_path)
            .expect("pty slave should open");

        Pty {
            master,
            slave_path,
            _slave: slave,
        }
    }
}

fn read_master(master: &mut File, len: usize) -> Vec<u8> {
    let deadline = Instant::now() + TIMEOUT;
    let mut out = Vec::with_capacity(len);
    let mut buf = [0u8; 64];
    while out.len() < len {
        let remaining = deadline.saturating_duration_since(Instant::now());
        assert!(!remaining.is_zero(), "timed out reading from pty");
        let mut pfd = libc::pollfd {
            fd: master.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&mut pfd, 1, remaining.as_millis() as libc::c_int) };
        if ready <= 0 {
            continue;
        }
        let want = (len - out.len()).min(buf.len());
        let n = master.read(&mut buf[..want]).expect("pty master read");
        out.extend_from_slice(&buf[..n]);
    }
    out
}

fn line_channel(stream: impl Read + Send + 'static) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn wait_for_line(lines: &Receiver<String>, needle: &str) -> String {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match lines.recv_timeout(remaining) {
            Ok(line) if line.contains(needle) => return line,
            Ok(_) => continue,
            Err(err) => panic!("waiting for {needle:?}: {err}"),
        }
    }
}

fn wait_exit(child: &mut Child) -> Option<i32> {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return status.code();
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("rmserial did not exit after SIGINT");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn run_bridges_pty_both_ways_and_stops_on_sigint() {
    let mut pty = open_pty();

    let mut child = Command::new(env!("CARGO_BIN_EXE_rmserial"))
        .args(["--log-level", "info", "--format", "json", "run", "--device"])
        .arg(&pty.slave_path)
        .args(["--reconnect-backoff-ms", "50", "--emit-latency"])
        .env_remove("RMSERIAL_DEVICE")
        .env_remove("RMSERIAL_LOG_LEVEL")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("run should start");

    let stdout = line_channel(child.stdout.take().expect("stdout"));
    let stderr = line_channel(child.stderr.take().expect("stderr"));
    wait_for_line(&stderr, "bridge running");

    // controller -> host
    let mut wire = vec![0x00];
    wire.extend_from_slice(&ReceivePacket::new(1, 1.5, -0.5).sealed().to_bytes());
    pty.master.write_all(&wire).expect("pty write");

    let line = wait_for_line(&stdout, "pitch_joint");
    let state: serde_json::Value = serde_json::from_str(&line).expect("joint state json");
    assert_eq!(state["name"], serde_json::json!(["pitch_joint", "yaw_joint"]));
    assert_eq!(state["position"], serde_json::json!([1.5, -0.5]));

    // host -> controller
    let mut stdin = child.stdin.take().expect("stdin");
    writeln!(
        stdin,
        r#"{{"target_found":true,"position":{{"x":1,"y":2,"z":3}}}}"#
    )
    .expect("stdin write");
    stdin.flush().expect("stdin flush");

    let frame = read_master(&mut pty.master, SendPacket::SIZE);
    assert!(crc::verify(&frame));
    let packet = SendPacket::decode(&frame).expect("send packet");
    assert!(packet.target_found);
    assert_eq!((packet.x, packet.y, packet.z), (1.0, 2.0, 3.0));
    assert_eq!(packet.task_mode, 0);

    let latency = wait_for_line(&stdout, "latency_ms");
    let latency: serde_json::Value = serde_json::from_str(&latency).expect("latency json");
    assert!(latency["latency_ms"].is_number());

    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGINT);
    }
    assert_eq!(wait_exit(&mut child), Some(0));
    wait_for_line(&stderr, "bridge stopped");
}

// End-to-end tests: a real listener on an OS-assigned port and a masked
// test client speaking the same framing as the browser.

use super::framing::tests::client_frame;
use super::framing::{encode_frame, header_length, parse_control_frame, Opcode};
use super::handshake::compute_accept_key;
use super::network::{bind_with_retry, serve};
use super::transfer::TransferTimeouts;
use crate::config::ServerConfig;
use crate::constants::{MAX_FRAME_SIZE, MAX_HANDSHAKE_BYTES};
use crate::core_upload::compute_checksum;
use crate::server::ServerContext;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];
const WAIT: Duration = Duration::from_secs(5);
const CLIENT_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

struct TestClient {
    stream: BufReader<TcpStream>,
}

impl TestClient {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut stream = BufReader::new(stream);
        let request = format!(
            "GET / HTTP/1.1\r\n\
             Host: 127.0.0.1:{}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n",
            port, CLIENT_KEY
        );
        stream.get_mut().write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        loop {
            let mut line = String::new();
            timeout(WAIT, stream.read_line(&mut line))
                .await
                .unwrap()
                .unwrap();
            if line.trim().is_empty() {
                break;
            }
            response.push_str(&line);
        }
        assert!(response.starts_with("HTTP/1.1 101"), "{}", response);
        assert!(response.contains(&compute_accept_key(CLIENT_KEY)));
        Self { stream }
    }

    async fn send(&mut self, opcode: Opcode, payload: &[u8]) {
        let frame = client_frame(opcode, payload, MASK);
        self.stream.get_mut().write_all(&frame).await.unwrap();
    }

    async fn send_json(&mut self, value: Value) {
        self.send(Opcode::Text, value.to_string().as_bytes()).await;
    }

    /// Reads one server frame, which must be unmasked.
    async fn read_frame(&mut self) -> Option<(Opcode, Vec<u8>)> {
        timeout(WAIT, async {
            let mut first_two = [0u8; 2];
            if self.stream.read_exact(&mut first_two).await.is_err() {
                return None;
            }
            let mut header = vec![0u8; header_length(first_two)];
            header[..2].copy_from_slice(&first_two);
            self.stream.read_exact(&mut header[2..]).await.unwrap();
            let control = parse_control_frame(&header).unwrap();
            assert!(control.mask.is_none(), "server frames are never masked");
            let mut payload = vec![0u8; control.payload_length];
            self.stream.read_exact(&mut payload).await.unwrap();
            Some((control.opcode, payload))
        })
        .await
        .expect("timed out waiting for a frame")
    }

    async fn expect_packet(&mut self, packet_type: &str) -> Value {
        let (opcode, payload) = self.read_frame().await.expect("connection closed");
        assert_eq!(opcode, Opcode::Text);
        let packet: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(packet["type"], packet_type, "unexpected packet {}", packet);
        packet
    }

    async fn expect_closed(&mut self) {
        loop {
            match self.read_frame().await {
                None => return,
                Some((Opcode::Close, _)) => return,
                Some((opcode, payload)) => panic!(
                    "expected close, got {:?} {}",
                    opcode,
                    String::from_utf8_lossy(&payload)
                ),
            }
        }
    }

    /// Empty password, accepted by servers started with `insecure`.
    async fn login(&mut self) {
        self.expect_packet("authenticate").await;
        self.send(Opcode::Text, b"").await;
        self.expect_packet("goodauth").await;
    }
}

struct Fixture {
    _dir: TempDir,
    data: PathBuf,
    temp: PathBuf,
    ctx: Arc<ServerContext>,
    port: u16,
    server: JoinHandle<anyhow::Result<()>>,
}

impl Fixture {
    async fn start(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        Self::start_with_timeouts(configure, TransferTimeouts::default()).await
    }

    async fn start_with_timeouts(
        configure: impl FnOnce(&mut ServerConfig),
        timeouts: TransferTimeouts,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let data = root.join("data");
        let temp = root.join("tmp");
        std::fs::create_dir(&data).unwrap();
        std::fs::create_dir(&temp).unwrap();
        std::fs::write(data.join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(data.join("scans")).unwrap();

        let mut config = ServerConfig {
            base_directories: vec![data.clone()],
            temp_directory: temp.clone(),
            insecure: true,
            ..ServerConfig::default()
        };
        configure(&mut config);
        let config = config.finalize().unwrap();

        let host = "127.0.0.1".parse().unwrap();
        let (listener, port) = bind_with_retry(host, 0).await.unwrap();
        let mut ctx = ServerContext::new(config, host, port);
        ctx.transfer_timeouts = timeouts;
        let ctx = Arc::new(ctx);
        let server = tokio::spawn(serve(listener, Arc::clone(&ctx)));
        Self {
            _dir: dir,
            data,
            temp,
            ctx,
            port,
            server,
        }
    }

    async fn client(&self) -> TestClient {
        let mut client = TestClient::connect(self.port).await;
        client.login().await;
        client
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Sends `data` on a transfer socket in `packet_size` chunks, waiting for
/// `nextpacket` between chunks. Returns the final reply.
async fn stream_upload(port: u16, data: &[u8], packet_size: usize) -> Value {
    let mut transfer = TestClient::connect(port).await;
    let mut sent = 0;
    for chunk in data.chunks(packet_size) {
        transfer.send(Opcode::Binary, chunk).await;
        sent += chunk.len();
        if sent < data.len() {
            let next = transfer.expect_packet("nextpacket").await;
            assert_eq!(next["payload"]["offset"], sent);
        }
    }
    let (opcode, payload) = transfer.read_frame().await.expect("transfer closed");
    assert_eq!(opcode, Opcode::Text);
    let reply: Value = serde_json::from_slice(&payload).unwrap();
    transfer.send(Opcode::Close, b"").await;
    reply
}

async fn request_upload(
    client: &mut TestClient,
    filename: &Path,
    data: &[u8],
    checksum: &str,
    packet_size: usize,
    isbinary: bool,
) -> u16 {
    client
        .send_json(json!({
            "command": "uploadfile",
            "totalSize": data.len(),
            "packetSize": packet_size,
            "isbinary": isbinary,
            "filename": path_str(filename),
            "checksum": checksum,
            "uploadCount": 1,
            "id": 7,
        }))
        .await;
    let ready = client.expect_packet("uploadmessage").await;
    assert_eq!(ready["payload"]["name"], "datasocketready");
    assert_eq!(ready["id"], 7);
    ready["payload"]["port"].as_u64().unwrap() as u16
}

async fn list_directory(client: &mut TestClient, directory: &Path, id: u64) -> Value {
    client
        .send_json(json!({ "command": "getfilelist", "path": path_str(directory), "id": id }))
        .await;
    client.expect_packet("filelist").await["payload"].clone()
}

#[tokio::test]
async fn test_otp_retry_sequence() {
    let fixture = Fixture::start(|config| config.insecure = false).await;
    let mut client = TestClient::connect(fixture.port).await;
    client.expect_packet("authenticate").await;

    for _ in 0..3 {
        client.send(Opcode::Text, b"not-a-password").await;
        client.expect_packet("badauth").await;
    }

    // One counter behind the current password.
    let stale = fixture.ctx.otp.lock().await.current().unwrap();
    client.send(Opcode::Text, b"wrong").await;
    client.expect_packet("badauth").await;
    client.send(Opcode::Text, stale.as_bytes()).await;
    client.expect_packet("badauth").await;

    // An empty password only works in insecure mode.
    client.send(Opcode::Text, b"").await;
    client.expect_packet("badauth").await;

    let current = fixture.ctx.otp.lock().await.current().unwrap();
    client.send(Opcode::Text, current.as_bytes()).await;
    client.expect_packet("goodauth").await;

    client
        .send_json(json!({ "command": "getservertempdirectory", "id": 1 }))
        .await;
    let reply = client.expect_packet("servertempdirectory").await;
    assert_eq!(reply["payload"], path_str(&fixture.temp));
}

#[tokio::test]
async fn test_getfilelist_and_directories() {
    let fixture = Fixture::start(|_| {}).await;
    std::fs::write(fixture.data.join(".secret"), b"x").unwrap();
    let mut client = fixture.client().await;

    client
        .send_json(json!({ "command": "getfilelist", "path": path_str(&fixture.data), "id": 2 }))
        .await;
    let reply = client.expect_packet("filelist").await;
    assert_eq!(reply["id"], 2);
    assert_eq!(reply["payload"]["path"], path_str(&fixture.data));
    let entries = reply["payload"]["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["text"], "scans");
    assert_eq!(entries[0]["type"], "directory");
    assert_eq!(entries[0]["size"], 0);
    assert_eq!(entries[1]["text"], "a.txt");
    assert_eq!(entries[1]["size"], 5);

    client
        .send_json(json!({ "command": "getserverbasedirectory", "id": 3 }))
        .await;
    let reply = client.expect_packet("serverbasedirectory").await;
    assert_eq!(
        reply["payload"],
        json!([path_str(&fixture.data), path_str(&fixture.temp)])
    );
}

#[tokio::test]
async fn test_readfile_text_and_sandbox_errors() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    client
        .send_json(json!({ "command": "readfile", "filename": path_str(&fixture.data.join("a.txt")), "id": 4 }))
        .await;
    let reply = client.expect_packet("text").await;
    assert_eq!(reply["payload"], "hello");
    assert_eq!(reply["id"], 4);

    let escape = format!("{}/../../etc/passwd", path_str(&fixture.data));
    client
        .send_json(json!({ "command": "readfile", "filename": escape, "id": 5 }))
        .await;
    let reply = client.expect_packet("error").await;
    assert_eq!(reply["id"], 5);
    assert_eq!(reply["payload"]["id"], 5);
    assert!(reply["payload"]["text"]
        .as_str()
        .unwrap()
        .contains("not in an allowed directory"));

    client
        .send_json(json!({ "command": "readfile", "filename": path_str(&fixture.data.join("missing.txt")), "id": 6 }))
        .await;
    let reply = client.expect_packet("error").await;
    assert!(reply["payload"]["text"]
        .as_str()
        .unwrap()
        .ends_with("does not exist"));
}

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    let data: Vec<u8> = (0..1_048_576usize).map(|i| (i % 256) as u8).collect();
    let checksum = compute_checksum(&data);
    let destination = fixture.data.join("pattern.bin");

    let port = request_upload(&mut client, &destination, &data, &checksum, 65536, true).await;
    assert_ne!(port, fixture.port);
    let reply = stream_upload(port, &data, 65536).await;
    assert_eq!(reply["type"], "uploadcomplete", "{}", reply);
    assert_eq!(reply["id"], 7);

    client
        .send_json(json!({ "command": "readfile", "filename": path_str(&destination), "isbinary": true, "id": 8 }))
        .await;
    let announced = client.expect_packet("checksum").await;
    assert_eq!(announced["payload"], checksum);

    let (opcode, contents) = client.read_frame().await.unwrap();
    assert_eq!(opcode, Opcode::Binary);
    assert_eq!(contents.len(), data.len());
    assert!(contents == data);
    assert_eq!(compute_checksum(&contents), checksum);
}

#[tokio::test]
async fn test_text_upload_in_one_packet() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    let data = b"{\"landmarks\": []}".to_vec();
    let destination = fixture.data.join("points.json");
    let port = request_upload(
        &mut client,
        &destination,
        &data,
        &compute_checksum(&data),
        65536,
        false,
    )
    .await;
    let reply = stream_upload(port, &data, 65536).await;
    assert_eq!(reply["type"], "uploadcomplete");
    assert_eq!(std::fs::read(&destination).unwrap(), data);
}

#[tokio::test]
async fn test_corrupted_upload_is_never_written() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    let data: Vec<u8> = (0..10_000usize).map(|i| (i % 251) as u8).collect();
    let checksum = compute_checksum(&data);
    let mut corrupted = data.clone();
    corrupted[1234] ^= 0xff;
    let destination = fixture.data.join("corrupt.bin");

    let port = request_upload(&mut client, &destination, &data, &checksum, 4096, true).await;
    let reply = stream_upload(port, &corrupted, 4096).await;
    assert_eq!(reply["type"], "uploadfailed", "{}", reply);
    assert_eq!(reply["payload"]["checksum"], compute_checksum(&corrupted));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_wrong_chunk_size_is_dropped_silently() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    let data = vec![9u8; 300];
    let destination = fixture.data.join("paced.bin");
    let port = request_upload(
        &mut client,
        &destination,
        &data,
        &compute_checksum(&data),
        100,
        true,
    )
    .await;

    let mut transfer = TestClient::connect(port).await;
    transfer.send(Opcode::Binary, &data[..150]).await;
    transfer.send(Opcode::Binary, &data[..100]).await;
    // No reply to the oversized chunk, so this is the answer to the second one.
    let next = transfer.expect_packet("nextpacket").await;
    assert_eq!(next["payload"]["offset"], 100);

    transfer.send(Opcode::Binary, &data[100..200]).await;
    transfer.expect_packet("nextpacket").await;
    transfer.send(Opcode::Binary, &data[200..]).await;
    transfer.expect_packet("uploadcomplete").await;
    assert_eq!(std::fs::read(&destination).unwrap(), data);
}

#[tokio::test]
async fn test_trickled_chunk_survives_the_idle_timer() {
    let timeouts = TransferTimeouts {
        idle: Duration::from_millis(500),
        ..TransferTimeouts::default()
    };
    let fixture = Fixture::start_with_timeouts(|_| {}, timeouts).await;
    let mut client = fixture.client().await;

    let data: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
    let destination = fixture.data.join("slow.bin");
    let port = request_upload(
        &mut client,
        &destination,
        &data,
        &compute_checksum(&data),
        1000,
        true,
    )
    .await;

    // One frame spread over ~1.6 s, never silent for more than 150 ms.
    let mut transfer = TestClient::connect(port).await;
    let frame = client_frame(Opcode::Binary, &data, MASK);
    for piece in frame.chunks(100) {
        transfer.stream.get_mut().write_all(piece).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    let done = transfer.expect_packet("uploadcomplete").await;
    assert_eq!(done["id"], 7);
    assert_eq!(std::fs::read(&destination).unwrap(), data);
}

#[tokio::test]
async fn test_silent_transfer_socket_is_closed() {
    let timeouts = TransferTimeouts {
        idle: Duration::from_millis(300),
        ..TransferTimeouts::default()
    };
    let fixture = Fixture::start_with_timeouts(|_| {}, timeouts).await;
    let mut client = fixture.client().await;

    let data = vec![5u8; 200];
    let destination = fixture.data.join("stalled.bin");
    let port = request_upload(
        &mut client,
        &destination,
        &data,
        &compute_checksum(&data),
        100,
        true,
    )
    .await;

    let mut transfer = TestClient::connect(port).await;
    transfer.send(Opcode::Binary, &data[..100]).await;
    transfer.expect_packet("nextpacket").await;
    transfer.expect_closed().await;
    assert!(!destination.exists());

    client
        .send_json(json!({ "command": "getservertempdirectory", "id": 3 }))
        .await;
    client.expect_packet("servertempdirectory").await;
}

#[tokio::test]
async fn test_unclaimed_transfer_port_is_released() {
    let timeouts = TransferTimeouts {
        accept: Duration::from_millis(200),
        ..TransferTimeouts::default()
    };
    let fixture = Fixture::start_with_timeouts(|_| {}, timeouts).await;
    let mut client = fixture.client().await;

    let data = b"never sent".to_vec();
    let destination = fixture.data.join("unclaimed.txt");
    let port = request_upload(
        &mut client,
        &destination,
        &data,
        &compute_checksum(&data),
        64,
        false,
    )
    .await;

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
    assert!(!destination.exists());

    client
        .send_json(json!({ "command": "getservertempdirectory", "id": 4 }))
        .await;
    client.expect_packet("servertempdirectory").await;
}

#[tokio::test]
async fn test_huge_frame_header_before_login_is_refused() {
    let fixture = Fixture::start(|_| {}).await;
    let mut intruder = TestClient::connect(fixture.port).await;
    intruder.expect_packet("authenticate").await;

    // Announces 512 MiB and sends nothing after the mask.
    let mut header = vec![0x82, 0x80 | 127];
    header.extend_from_slice(&(MAX_FRAME_SIZE as u64).to_be_bytes());
    header.extend_from_slice(&MASK);
    intruder.stream.get_mut().write_all(&header).await.unwrap();
    intruder.expect_closed().await;

    let mut client = fixture.client().await;
    client
        .send_json(json!({ "command": "getservertempdirectory", "id": 5 }))
        .await;
    client.expect_packet("servertempdirectory").await;
}

#[tokio::test]
async fn test_endless_handshake_line_is_cut_off() {
    let fixture = Fixture::start(|_| {}).await;
    let mut raw = TcpStream::connect(("127.0.0.1", fixture.port)).await.unwrap();
    // The server may already have hung up before the write finishes.
    let _ = raw.write_all(&vec![b'a'; 4 * MAX_HANDSHAKE_BYTES]).await;

    let mut reply = Vec::new();
    let read = timeout(WAIT, raw.read_to_end(&mut reply))
        .await
        .expect("server kept the connection open");
    assert!(read.is_err() || reply.is_empty());
}

#[tokio::test]
async fn test_readonly_server_refuses_every_write() {
    let fixture = Fixture::start(|config| config.readonly = true).await;
    let mut client = fixture.client().await;

    let before = list_directory(&mut client, &fixture.data, 1).await;

    client
        .send_json(json!({
            "command": "uploadfile",
            "totalSize": 4,
            "packetSize": 4,
            "isbinary": true,
            "filename": path_str(&fixture.data.join("new.bin")),
            "checksum": compute_checksum(b"abcd"),
            "id": 2,
        }))
        .await;
    let reply = client.expect_packet("error").await;
    assert_eq!(reply["id"], 2);

    for (id, operation, target) in [
        (3, "makeDirectory", fixture.data.join("fresh")),
        (4, "deleteDirectory", fixture.data.join("scans")),
    ] {
        client
            .send_json(json!({
                "command": "filesystemoperation",
                "operation": operation,
                "url": path_str(&target),
                "id": id,
            }))
            .await;
        let reply = client.expect_packet("error").await;
        assert_eq!(reply["id"], id);
        assert!(reply["payload"]["text"].as_str().unwrap().contains("read-only"));
    }

    let after = list_directory(&mut client, &fixture.data, 5).await;
    assert_eq!(before, after);
    assert!(fixture.data.join("scans").is_dir());
    assert!(!fixture.data.join("fresh").exists());
}

#[tokio::test]
async fn test_filesystem_operations() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    let operation = |operation: &str, url: PathBuf, id: u64| {
        json!({
            "command": "filesystemoperation",
            "operation": operation,
            "url": path_str(&url),
            "id": id,
        })
    };

    client
        .send_json(operation("getFileSize", fixture.data.join("a.txt"), 1))
        .await;
    assert_eq!(client.expect_packet("filesystemoperations").await["payload"], 5);

    client
        .send_json(operation("isDirectory", fixture.data.join("scans"), 2))
        .await;
    assert_eq!(client.expect_packet("filesystemoperations").await["payload"], true);

    client
        .send_json(operation("makeDirectory", fixture.data.join("made/deep"), 3))
        .await;
    client.expect_packet("filesystemoperations").await;
    assert!(fixture.data.join("made/deep").is_dir());

    client
        .send_json(operation("deleteDirectory", fixture.data.join("made"), 4))
        .await;
    client.expect_packet("filesystemoperations").await;
    assert!(!fixture.data.join("made").exists());

    client
        .send_json(operation("deleteDirectory", fixture.data.clone(), 5))
        .await;
    let reply = client.expect_packet("error").await;
    assert_eq!(reply["id"], 5);
    assert!(fixture.data.is_dir());

    client
        .send_json(operation("getFileSize", fixture.data.join("nothing.txt"), 6))
        .await;
    let reply = client.expect_packet("filesystemoperationserror").await;
    assert_eq!(reply["payload"]["operation"], "getFileSize");
    assert_eq!(reply["id"], 6);

    client
        .send_json(operation("getMatchingFiles", fixture.data.join("*.txt"), 7))
        .await;
    let reply = client.expect_packet("filesystemoperations").await;
    assert_eq!(reply["payload"], json!([path_str(&fixture.data.join("a.txt"))]));
}

#[tokio::test]
async fn test_unknown_and_ignored_commands_get_no_reply() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    client.send_json(json!({ "command": "fly", "id": 1 })).await;
    client.send_json(json!({ "command": "ignore", "id": 2 })).await;
    client.send(Opcode::Text, b"{ this is not json").await;
    // Unmasked frames from a client are dropped.
    client
        .stream
        .get_mut()
        .write_all(&encode_frame(Opcode::Text, br#"{"command":"getservertempdirectory","id":3}"#))
        .await
        .unwrap();
    client
        .send_json(json!({ "command": "getservertempdirectory", "id": 4 }))
        .await;

    let reply = client.expect_packet("servertempdirectory").await;
    assert_eq!(reply["id"], 4);
}

#[tokio::test]
async fn test_restart_closes_only_the_connection() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    client.send_json(json!({ "command": "restart", "id": 1 })).await;
    client.expect_packet("tryagain").await;
    client.expect_closed().await;

    let mut again = fixture.client().await;
    again
        .send_json(json!({ "command": "getservertempdirectory", "id": 2 }))
        .await;
    again.expect_packet("servertempdirectory").await;
}

#[tokio::test]
async fn test_terminate_stops_the_server() {
    let fixture = Fixture::start(|_| {}).await;
    let mut client = fixture.client().await;

    client.send_json(json!({ "command": "terminate", "id": 1 })).await;
    client.expect_closed().await;

    let result = timeout(WAIT, fixture.server).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(TcpStream::connect(("127.0.0.1", fixture.port)).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_dicom_conversion_reports_progress() {
    let fixture = Fixture::start(|config| config.dicom_converter = String::from("echo")).await;
    let mut client = fixture.client().await;
    let input = fixture.data.join("scans");

    client
        .send_json(json!({ "command": "dicom2BIDS", "fileinput": path_str(&input), "id": 9 }))
        .await;
    let progress = client.expect_packet("dicomConversionProgress").await;
    let line = progress["payload"].as_str().unwrap();
    assert!(line.contains("-ba y"));
    assert!(line.ends_with(&path_str(&input)));

    let done = client.expect_packet("dicomConversionDone").await;
    assert_eq!(done["id"], 9);
    assert_eq!(done["payload"]["bids"], true);
    let output = PathBuf::from(done["payload"]["output"].as_str().unwrap());
    assert!(output.starts_with(&fixture.temp));
    assert!(output.is_dir());
}

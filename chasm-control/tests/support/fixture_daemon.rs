//! Fixture control daemon for testing the client against a real socket
//!
//! The fixture listens on a Unix seqpacket socket in a temporary directory
//! and answers either protocol generation with canned data:
//! - Two host groups, `web.example.com` and `db.example.com`
//! - Check and scheduling data for an IPv4 and an IPv6 address
//! - A staged change set whose hash is derived from the staged group names
//! - Getters and setters for the daemon tunables
//!
//! Connections are handled one at a time, so a setter's effect is visible to
//! the next call. Requests are read and replies written packet by packet, the
//! way the daemon does: a reply body goes out in chunks of at most
//! [`MAX_PACKET`] bytes after its own length packet.
//!
//! ```rust,no_run
//! let daemon = FixtureDaemon::builder().build().await;
//! let client = ControlClient::with_socket(daemon.socket_path()).unwrap();
//! ```
#![allow(dead_code)] // Not every test uses every helper

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use chasm_control::{
    ProtocolGeneration,
    codec::{self, Reply},
    projection::{AF_INET, AF_INET6},
    protocol::current::frame_length,
};
use prost::Message;
use tempfile::TempDir;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_seqpacket::{UnixSeqpacket, UnixSeqpacketListener};

pub const WEB_GROUP: &str = "web.example.com";
pub const DB_GROUP: &str = "db.example.com";
pub const WEB_HOSTS: [&str; 2] = ["a.example.com", "b.example.com"];
pub const CHECK_INFO: &str = "/status.html";

/// `2023-11-14T22:13:20Z`
pub const BASE_TIME_MS: u64 = 1_700_000_000_000;

/// Largest packet the daemon writes
pub const MAX_PACKET: usize = 65_535;

/// 127.0.0.1 as the daemon stores it
pub const LOOPBACK_V4: u32 = 0x0100_007f;
/// ::1 as the daemon stores it
pub const LOOPBACK_V6: [u32; 4] = [0, 0, 0, 0x0100_0000];

/// State the daemon mutates in response to commands
#[derive(Debug, Clone)]
pub struct DaemonState {
    pub groups: Vec<String>,
    pub staged: Vec<String>,
    pub log_level: i64,
    pub tunables: BTreeMap<&'static str, u64>,
    pub recycle: bool,
    pub forced_down: Vec<(String, String, bool)>,
    pub reloads: Vec<Option<String>>,
}

impl Default for DaemonState {
    fn default() -> Self {
        Self {
            groups: vec![WEB_GROUP.to_string(), DB_GROUP.to_string()],
            staged: Vec::new(),
            log_level: 4,
            tunables: BTreeMap::from([
                ("connectiontimeout", 10),
                ("monitorfrequency", 60),
                ("stride", 5),
                ("ttlthreshold", 300),
                ("workperthreadratio", 100),
            ]),
            recycle: false,
            forced_down: Vec::new(),
            reloads: Vec::new(),
        }
    }
}

impl DaemonState {
    /// Hash of the staged change set; empty when nothing is staged
    pub fn staged_hash(&self) -> codec::HashHgPair {
        if self.staged.is_empty() {
            return codec::HashHgPair::default();
        }
        let joined = self.staged.join("|");
        codec::HashHgPair {
            group_name: self.staged[0].clone(),
            size: self.staged.len() as u64,
            hash: joined.bytes().rev().collect(),
        }
    }
}

struct FixtureConfig {
    generation: ProtocolGeneration,
    stall: bool,
}

pub struct FixtureDaemonBuilder {
    config: FixtureConfig,
}

impl FixtureDaemonBuilder {
    const fn new() -> Self {
        Self {
            config: FixtureConfig {
                generation: ProtocolGeneration::Current,
                stall: false,
            },
        }
    }

    #[must_use]
    pub const fn legacy(mut self) -> Self {
        self.config.generation = ProtocolGeneration::Legacy;
        self
    }

    /// Read each command but never answer it
    #[must_use]
    pub const fn stall(mut self) -> Self {
        self.config.stall = true;
        self
    }

    pub async fn build(self) -> FixtureDaemon {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let socket_path = dir.path().join("controlsocket");
        let listener =
            UnixSeqpacketListener::bind(&socket_path).expect("Failed to bind fixture socket");

        let shared = Arc::new(Shared {
            config: self.config,
            state: Mutex::new(DaemonState::default()),
            commands: Mutex::new(Vec::new()),
            request_packets: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            peer_closed: AtomicBool::new(false),
        });

        let task = tokio::spawn(accept_loop(listener, Arc::clone(&shared)));

        FixtureDaemon {
            _dir: dir,
            socket_path,
            shared,
            task,
        }
    }
}

struct Shared {
    config: FixtureConfig,
    state: Mutex<DaemonState>,
    commands: Mutex<Vec<String>>,
    request_packets: Mutex<Vec<Vec<usize>>>,
    connections: AtomicUsize,
    peer_closed: AtomicBool,
}

pub struct FixtureDaemon {
    _dir: TempDir,
    socket_path: PathBuf,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl FixtureDaemon {
    #[must_use]
    pub const fn builder() -> FixtureDaemonBuilder {
        FixtureDaemonBuilder::new()
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Every command line received, in order, without version prefix
    pub async fn commands(&self) -> Vec<String> {
        self.shared.commands.lock().await.clone()
    }

    /// Packet sizes of every request, in order
    pub async fn request_packets(&self) -> Vec<Vec<usize>> {
        self.shared.request_packets.lock().await.clone()
    }

    pub async fn state(&self) -> DaemonState {
        self.shared.state.lock().await.clone()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Whether a stalled client has since closed its end
    #[must_use]
    pub fn peer_closed(&self) -> bool {
        self.shared.peer_closed.load(Ordering::SeqCst)
    }
}

impl Drop for FixtureDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(mut listener: UnixSeqpacketListener, shared: Arc<Shared>) {
    while let Ok(socket) = listener.accept().await {
        shared.connections.fetch_add(1, Ordering::SeqCst);
        let result = match shared.config.generation {
            ProtocolGeneration::Current => handle_current(socket, &shared).await,
            ProtocolGeneration::Legacy => handle_legacy(socket, &shared).await,
        };
        if let Err(err) = result {
            tracing::debug!("Fixture connection ended: {err}");
        }
    }
}

async fn wait_for_close(socket: UnixSeqpacket, shared: &Shared) {
    let mut sink = [0u8; 64];
    while matches!(socket.recv(&mut sink).await, Ok(n) if n > 0) {}
    shared.peer_closed.store(true, Ordering::SeqCst);
}

/// Receive one packet; a closed peer is an error
async fn recv_packet(socket: &UnixSeqpacket) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; 256 * 1024];
    let n = socket.recv(&mut buf).await?;
    if n == 0 {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    buf.truncate(n);
    Ok(buf)
}

/// Receive a length packet followed by a command packet of that length
async fn read_frame(socket: &UnixSeqpacket, sizes: &mut Vec<usize>) -> std::io::Result<Vec<u8>> {
    let len = recv_packet(socket).await?;
    sizes.push(len.len());
    let len: [u8; 8] = len.as_slice().try_into().expect("8-byte length packet");

    let body = recv_packet(socket).await?;
    sizes.push(body.len());
    assert_eq!(
        u64::from_be_bytes(len),
        body.len() as u64,
        "command packet does not match its length packet"
    );
    Ok(body)
}

/// Receive a blob of `len` bytes sent as one packet
async fn read_blob(
    socket: &UnixSeqpacket,
    len: usize,
    sizes: &mut Vec<usize>,
) -> std::io::Result<Vec<u8>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let blob = recv_packet(socket).await?;
    sizes.push(blob.len());
    assert_eq!(blob.len(), len, "blob packet does not match announced size");
    Ok(blob)
}

async fn send_chunked(socket: &UnixSeqpacket, body: &[u8]) -> std::io::Result<()> {
    for chunk in body.chunks(MAX_PACKET) {
        socket.send(chunk).await?;
    }
    Ok(())
}

async fn reply<M: Message>(socket: &UnixSeqpacket, message: &M) -> std::io::Result<()> {
    let payload = message.encode_to_vec();
    socket.send(&frame_length(payload.len())).await?;
    send_chunked(socket, &payload).await
}

async fn reply_empty(socket: &UnixSeqpacket) -> std::io::Result<()> {
    socket.send(&frame_length(0)).await.map(drop)
}

async fn handle_current(socket: UnixSeqpacket, shared: &Shared) -> std::io::Result<()> {
    let mut sizes = Vec::new();
    let line = String::from_utf8(read_frame(&socket, &mut sizes).await?).expect("utf-8 command");
    let mut parts = line.split(' ');
    assert_eq!(parts.next(), Some("1"), "missing version prefix in {line:?}");
    let args: Vec<String> = parts.map(str::to_string).collect();
    shared.commands.lock().await.push(args.join(" "));

    if shared.config.stall {
        shared.request_packets.lock().await.push(sizes);
        wait_for_close(socket, shared).await;
        return Ok(());
    }

    let verb = args[0].as_str();
    let blob = match verb {
        "addhostgroup" => {
            read_blob(&socket, args[2].parse().expect("blob length"), &mut sizes).await?
        }
        "committransation" => {
            read_blob(&socket, args[1].parse().expect("blob length"), &mut sizes).await?
        }
        _ => Vec::new(),
    };
    shared.request_packets.lock().await.push(sizes);
    let mut state = shared.state.lock().await;

    match verb {
        "workqueueinfo" => reply(&socket, &codec::Uint { data: 3 }).await,
        "schdqueueinfo" => reply(&socket, &codec::Uint { data: 11 }).await,
        "threadinfo" => {
            let info = codec::ThreadInfo {
                num_threads: 8,
                num_idle_threads: 2,
            };
            reply(&socket, &info).await
        }
        "hostgrouplist" => {
            let list = codec::List {
                items: state.groups.clone(),
            };
            reply(&socket, &list).await
        }
        "hostlist" => {
            let items = if args[1] == WEB_GROUP {
                WEB_HOSTS.iter().map(ToString::to_string).collect()
            } else {
                Vec::new()
            };
            reply(&socket, &codec::List { items }).await
        }
        "hostcheck" => reply(&socket, &check_results()).await,
        "hostschdinfo" => {
            if args[2] == WEB_HOSTS[0] {
                reply(&socket, &dns_sched_info()).await
            } else {
                reply_empty(&socket).await
            }
        }
        "hostgroupparams" => {
            if state.groups.contains(&args[1]) {
                reply(&socket, &data_host_group()).await
            } else {
                reply_empty(&socket).await
            }
        }
        "gettransconfighash" => reply(&socket, &state.staged_hash()).await,
        "addhostgroup" => {
            let group = codec::DataHostGroup::decode_reply(&blob).expect("DataHostGroup blob");
            let accepted = !group.hosts.is_empty();
            if accepted {
                state.staged.push(args[1].clone());
            }
            reply(&socket, &codec::Bool { data: accepted }).await
        }
        "removehostgroup" => {
            let known = state.groups.contains(&args[1]);
            if known {
                state.staged.push(format!("-{}", args[1]));
            }
            reply(&socket, &codec::Bool { data: known }).await
        }
        "cleartransation" => {
            let had_staged = !state.staged.is_empty();
            state.staged.clear();
            reply(&socket, &codec::Bool { data: had_staged }).await
        }
        "committransation" => {
            let offered = codec::HashHgPair::decode_reply(&blob).expect("HashHgPair blob");

            let count = if !state.staged.is_empty() && offered == state.staged_hash() {
                let staged = std::mem::take(&mut state.staged);
                for name in &staged {
                    match name.strip_prefix('-') {
                        Some(removed) => state.groups.retain(|g| g != removed),
                        None if !state.groups.contains(name) => state.groups.push(name.clone()),
                        None => {}
                    }
                }
                staged.len() as u64
            } else {
                0
            };
            reply(&socket, &codec::Uint { data: count }).await
        }
        "reload" => {
            state.reloads.push(args.get(1).cloned());
            reply(&socket, &codec::Bool { data: true }).await
        }
        "getloglevel" => {
            let level = codec::Int {
                data: state.log_level,
            };
            reply(&socket, &level).await
        }
        "setloglevel" => {
            state.log_level = match args[1].as_str() {
                "error" => 3,
                "warning" => 4,
                "debug" => 7,
                "debug3" => 9,
                other => panic!("unexpected level {other}"),
            };
            Ok(())
        }
        "getrecycle" => {
            let recycle = codec::Bool {
                data: state.recycle,
            };
            reply(&socket, &recycle).await
        }
        "setrecycle" => {
            state.recycle = args[1] == "on";
            Ok(())
        }
        "host_set" => {
            state
                .forced_down
                .push((args[1].clone(), args[2].clone(), args[3] == "1"));
            Ok(())
        }
        verb => {
            if let Some(name) = verb.strip_prefix("get") {
                let data = state.tunables.get(name).copied().expect("known tunable");
                reply(&socket, &codec::Uint { data }).await
            } else if let Some(name) = verb.strip_prefix("set") {
                let value = args[1].parse().expect("numeric tunable");
                let slot = state.tunables.get_mut(name).expect("known tunable");
                *slot = value;
                Ok(())
            } else {
                panic!("unexpected verb {verb}")
            }
        }
    }
}

pub fn ip(family: u32, words: [u32; 4]) -> codec::IpAddress {
    codec::IpAddress {
        r#type: family,
        addr0: words[0],
        addr1: words[1],
        addr2: words[2],
        addr3: words[3],
    }
}

pub fn check_results() -> codec::DataCheckResults {
    let result = |address: codec::IpAddress, offset: u64| codec::DataCheckResult {
        address: Some(address),
        start_time: BASE_TIME_MS + offset,
        end_time: BASE_TIME_MS + offset + 25,
        response_time: 25,
        total_response_time: 250,
        min_response_time: 10,
        max_response_time: 40,
        smoothed_response_time: 24,
        sum_response_time: 250,
        num_checks: 10,
        num_responses: 10,
        num_connect_failures: 0,
        num_failures: 0,
        num_timeouts: 0,
        num_flaps: 1,
        status: 1,
        response: 1,
        reason: 1,
        soft_reason: 0,
        num_failed_checks: 0,
        num_slow_responses: 2,
        port: 443,
        change_time: BASE_TIME_MS - 60_000,
        force_host_down: offset > 0,
        queue_check_time: BASE_TIME_MS + offset - 5_000,
        check_time: BASE_TIME_MS + offset,
    };

    codec::DataCheckResults {
        results: vec![
            result(ip(AF_INET, [LOOPBACK_V4, 0, 0, 0]), 0),
            result(ip(AF_INET6, LOOPBACK_V6), 100),
        ],
    }
}

pub fn dns_sched_info() -> codec::DnsSchedInfo {
    codec::DnsSchedInfo {
        hasv4: true,
        hasv6: false,
        v4_last_check_time: BASE_TIME_MS,
        v4_next_check_time: BASE_TIME_MS + 300_000,
        v4_state: 1,
        v6_last_check_time: 0,
        v6_next_check_time: 0,
        v6_state: 0,
        host_sched_info: vec![codec::HostSchedInfo {
            address: Some(ip(AF_INET, [LOOPBACK_V4, 0, 0, 0])),
            last_check_time: BASE_TIME_MS,
            next_check_time: BASE_TIME_MS + 30_000,
            state: 2,
        }],
    }
}

pub fn data_host_group() -> codec::DataHostGroup {
    codec::DataHostGroup {
        dualstack: 2,
        check_type: 3,
        port: 443,
        num_check_retries: 2,
        check_retry_delay: 5,
        smoothing_window: 5,
        group_threshold: 50,
        slow_threshold: 1_000,
        max_flaps: 3,
        check_timeout: 2_000,
        check_ttl: 60_000,
        flap_threshold: 4,
        passthrough_info: 7,
        check_info: CHECK_INFO.to_string(),
        hosts: WEB_HOSTS.iter().map(ToString::to_string).collect(),
        ..Default::default()
    }
}

async fn handle_legacy(socket: UnixSeqpacket, shared: &Shared) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    let n = socket.recv(&mut buf).await?;
    let line = String::from_utf8(buf[..n].to_vec()).expect("utf-8 command");
    shared.commands.lock().await.push(line.clone());
    shared.request_packets.lock().await.push(vec![n]);

    if shared.config.stall {
        wait_for_close(socket, shared).await;
        return Ok(());
    }

    let args: Vec<&str> = line.split(' ').collect();
    let state = shared.state.lock().await;

    match args[0] {
        "workqueueinfo" => socket.send(&3u32.to_le_bytes()).await.map(drop),
        "threadinfo" => {
            let mut raw = [0u8; 16];
            raw[..8].copy_from_slice(&8u64.to_le_bytes());
            raw[8..].copy_from_slice(&2u64.to_le_bytes());
            socket.send(&raw).await.map(drop)
        }
        "schdqueueinfo" => socket.send(&11u64.to_le_bytes()).await.map(drop),
        "hostgrouplist" => write_legacy_sized(&socket, state.groups.join(",").as_bytes()).await,
        "hostlist" => {
            let body = if args[1] == WEB_GROUP {
                WEB_HOSTS.join(",")
            } else {
                String::new()
            };
            write_legacy_sized(&socket, body.as_bytes()).await
        }
        "hostcheck" => socket
            .send(&legacy_host_check(args[2] == WEB_HOSTS[0]))
            .await
            .map(drop),
        "hostschdinfo" => {
            for packet in legacy_sched_info() {
                socket.send(&packet).await?;
            }
            Ok(())
        }
        "hostgroupparams" => {
            let body = if state.groups.iter().any(|g| g == args[1]) {
                legacy_group_params()
            } else {
                Vec::new()
            };
            write_legacy_sized(&socket, &body).await
        }
        verb => panic!("legacy daemon got unexpected verb {verb}"),
    }
}

/// A little-endian size packet, then the body unless it is empty
async fn write_legacy_sized(socket: &UnixSeqpacket, body: &[u8]) -> std::io::Result<()> {
    socket.send(&(body.len() as u64).to_le_bytes()).await?;
    send_chunked(socket, body).await
}

pub fn legacy_host_check(checked: bool) -> [u8; 48] {
    let mut raw = [0u8; 48];
    raw[0..4].copy_from_slice(&0i32.to_le_bytes());
    raw[4] = u8::from(checked);
    raw[8..12].copy_from_slice(&1u32.to_le_bytes());
    raw[12..16].copy_from_slice(&1u32.to_le_bytes());
    raw[16..24].copy_from_slice(&20u64.to_le_bytes());
    raw[24..32].copy_from_slice(&22u64.to_le_bytes());
    raw[32..40].copy_from_slice(&45u64.to_le_bytes());
    raw[40..48].copy_from_slice(&BASE_TIME_MS.to_le_bytes());
    raw
}

/// The scheduling header followed by one packet per address
pub fn legacy_sched_info() -> Vec<Vec<u8>> {
    let mut header = [0u8; 56];
    header[0] = 1;
    header[1] = 1;
    header[8..16].copy_from_slice(&BASE_TIME_MS.to_le_bytes());
    header[16..24].copy_from_slice(&(BASE_TIME_MS + 300_000).to_le_bytes());
    header[24] = 1;
    header[32..40].copy_from_slice(&BASE_TIME_MS.to_le_bytes());
    header[40..48].copy_from_slice(&(BASE_TIME_MS + 600_000).to_le_bytes());
    header[48] = 0;
    header[52..56].copy_from_slice(&2u32.to_le_bytes());

    let record = |family: u8, words: [u32; 4], state: u8| {
        let mut raw = [0u8; 41];
        raw[0] = family;
        for (i, word) in words.iter().enumerate() {
            raw[4 + i * 4..8 + i * 4].copy_from_slice(&word.to_le_bytes());
        }
        raw[24..32].copy_from_slice(&BASE_TIME_MS.to_le_bytes());
        raw[32..40].copy_from_slice(&(BASE_TIME_MS + 30_000).to_le_bytes());
        raw[40] = state;
        raw
    };

    vec![
        header.to_vec(),
        record(2, [LOOPBACK_V4, 0, 0, 0], 1).to_vec(),
        record(10, LOOPBACK_V6, 3).to_vec(),
    ]
}

pub fn legacy_group_params() -> Vec<u8> {
    let mut raw = vec![0u8; 57];
    raw[0] = 1;
    raw[1] = 2;
    raw[2..4].copy_from_slice(&80u16.to_le_bytes());
    raw[4] = 0;
    let info_size = u32::try_from(CHECK_INFO.len() + 1).expect("check info size");
    raw[8..12].copy_from_slice(&info_size.to_le_bytes());
    raw[12..16].copy_from_slice(&5u32.to_le_bytes());
    raw[16..20].copy_from_slice(&3u32.to_le_bytes());
    raw[20..24].copy_from_slice(&4u32.to_le_bytes());
    raw[24] = 2;
    raw[28..32].copy_from_slice(&5u32.to_le_bytes());
    raw[32..36].copy_from_slice(&50u32.to_le_bytes());
    raw[36..40].copy_from_slice(&1_000u32.to_le_bytes());
    raw[40..48].copy_from_slice(&2_000u64.to_le_bytes());
    raw[48..56].copy_from_slice(&60_000u64.to_le_bytes());
    raw[56] = 7;
    raw.extend_from_slice(CHECK_INFO.as_bytes());
    raw.extend_from_slice(&[0u8; 8]);
    raw
}

/// Give the accept loop a moment to finish a connection the client closed
/// without waiting for a reply
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

//! Syslog consumer.
//!
//! 모든 로컬 데몬이 이해하는 최소한의 BSD syslog 프레이밍을 사용합니다:
//!
//! ```text
//! <PRI>logwatch/<watcher>[<pid>]: <prefix><output><suffix>\n
//! ```
//!
//! 메시지는 UDP(기본), TCP(`tcp = true`) 또는 로컬 UNIX 소켓으로 보냅니다
//! (`socket = "/dev/log"`, 지정하면 host/port보다 우선).

use std::io::Write as _;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::path::{Path, PathBuf};

use logwatch_core::context::WatcherContext;
use logwatch_core::error::PluginError;
use logwatch_core::plugin::{Consumer, PluginParams};
use logwatch_core::record::Record;
use serde::Deserialize;
use tracing::{debug, warn};

use super::framed;

const KIND: &str = "syslog";

const FACILITIES: &[(&str, u8)] = &[
    ("KERN", 0),
    ("USER", 1),
    ("MAIL", 2),
    ("DAEMON", 3),
    ("AUTH", 4),
    ("SYSLOG", 5),
    ("LPR", 6),
    ("NEWS", 7),
    ("UUCP", 8),
    ("CRON", 9),
    ("LOCAL0", 16),
    ("LOCAL1", 17),
    ("LOCAL2", 18),
    ("LOCAL3", 19),
    ("LOCAL4", 20),
    ("LOCAL5", 21),
    ("LOCAL6", 22),
    ("LOCAL7", 23),
];

const LEVELS: &[(&str, u8)] = &[
    ("EMERG", 0),
    ("ALERT", 1),
    ("CRIT", 2),
    ("ERR", 3),
    ("WARNING", 4),
    ("NOTICE", 5),
    ("INFO", 6),
    ("DEBUG", 7),
];

/// `syslog` 파라미터.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyslogConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// UDP 대신 TCP 사용
    #[serde(default)]
    pub tcp: bool,
    /// 로컬 UNIX 소켓; host/port를 덮어씀
    #[serde(default)]
    pub socket: Option<PathBuf>,
    #[serde(default = "default_facility")]
    pub facility: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_port() -> u16 {
    514
}

fn default_facility() -> String {
    "USER".to_owned()
}

fn default_level() -> String {
    "INFO".to_owned()
}

/// 이름 테이블에서 대소문자 구분 없이 찾습니다.
fn lookup(table: &[(&str, u8)], field: &str, value: &str) -> Result<u8, PluginError> {
    let upper = value.to_ascii_uppercase();
    table
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, code)| *code)
        .ok_or_else(|| {
            let names: Vec<&str> = table.iter().map(|(name, _)| *name).collect();
            PluginError::config(
                KIND,
                format!("invalid '{field}' {value:?}, expected one of {}", names.join(", ")),
            )
        })
}

/// `facility << 3 | level`
pub fn priority(facility: &str, level: &str) -> Result<u8, PluginError> {
    Ok(lookup(FACILITIES, "facility", facility)? << 3 | lookup(LEVELS, "level", level)?)
}

enum Local {
    Datagram(UnixDatagram),
    Stream(UnixStream),
}

impl Local {
    /// datagram 소켓을 먼저 시도하고, 실패하면 stream으로 넘어갑니다.
    fn connect(path: &Path) -> std::io::Result<Self> {
        let datagram = UnixDatagram::unbound()?;
        match datagram.connect(path) {
            Ok(()) => Ok(Self::Datagram(datagram)),
            Err(_) => UnixStream::connect(path).map(Self::Stream),
        }
    }

    fn send(&mut self, message: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Datagram(socket) => socket.send(message).map(|_| ()),
            Self::Stream(stream) => stream.write_all(message),
        }
    }
}

enum Transport {
    Udp { socket: UdpSocket, target: SocketAddr },
    Tcp(TcpStream),
    Local { path: PathBuf, conn: Local },
}

impl Transport {
    fn open(config: &SyslogConfig) -> std::io::Result<Self> {
        if let Some(path) = &config.socket {
            return Ok(Self::Local {
                conn: Local::connect(path)?,
                path: path.clone(),
            });
        }
        let target = (config.host.as_str(), config.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} did not resolve", config.host),
                )
            })?;
        if config.tcp {
            return TcpStream::connect(target).map(Self::Tcp);
        }
        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        Ok(Self::Udp {
            socket: UdpSocket::bind(local)?,
            target,
        })
    }

    fn send(&mut self, message: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Udp { socket, target } => socket.send_to(message, *target).map(|_| ()),
            Self::Tcp(stream) => stream.write_all(message),
            Self::Local { path, conn } => {
                if let Err(e) = conn.send(message) {
                    // syslogd가 재시작하면 소켓을 새로 만듦
                    warn!(path = %path.display(), error = %e, "syslog: local socket send failed, reconnecting");
                    *conn = Local::connect(path)?;
                    conn.send(message)?;
                }
                Ok(())
            }
        }
    }
}

pub struct Syslog {
    ctx: WatcherContext,
    header: String,
    prefix: String,
    suffix: String,
    transport: Transport,
}

/// 레지스트리 생성자.
pub fn create(
    ctx: &WatcherContext,
    params: &PluginParams,
) -> Result<Box<dyn Consumer>, PluginError> {
    Ok(Box::new(Syslog::new(ctx.clone(), params.parse(KIND)?)?))
}

impl Syslog {
    /// facility와 level을 검증하고 연결을 엽니다.
    pub fn new(ctx: WatcherContext, config: SyslogConfig) -> Result<Self, PluginError> {
        let pri = priority(&config.facility, &config.level)?;
        let transport = Transport::open(&config).map_err(|e| {
            let target = match &config.socket {
                Some(path) => path.display().to_string(),
                None => format!("{}:{}", config.host, config.port),
            };
            PluginError::config(KIND, format!("cannot connect to {target}: {e}"))
        })?;
        Ok(Self {
            header: format!("<{pri}>logwatch/{}[{}]: ", ctx.name(), ctx.pid()),
            ctx,
            prefix: config.prefix,
            suffix: config.suffix,
            transport,
        })
    }

    fn message(&self, output: &str) -> String {
        let mut message = self.header.clone();
        message.push_str(&framed(&self.prefix, output, &self.suffix));
        message
    }
}

impl Consumer for Syslog {
    fn kind(&self) -> &str {
        KIND
    }

    fn feed(&mut self, record: &Record) -> Result<(), PluginError> {
        let message = self.message(record.output());
        if self.ctx.debug_enabled() {
            debug!(watcher = self.ctx.name(), message = %message.trim_end(), "syslog: consumed record");
        }
        self.transport.send(message.as_bytes())?;
        Ok(())
    }
}

//! The process resources every container exposes as global modules:
//! `os`, `time`, `socket` and `subprocess`.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use chrono::{Local, Utc};

use crate::globals::GlobalModule;

/// A snapshot of the process environment.
///
/// Components read environment variables through an injected `Environ`
/// (`os.environ`) instead of `std::env`, so tests can substitute a fixed
/// table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environ {
    vars: BTreeMap<String, String>,
}

impl Environ {
    /// Captures the current process environment. Variables that are not
    /// valid unicode are converted lossily.
    pub fn capture() -> Self {
        std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environ {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Networking primitives, injected as `socket`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Socket;

impl Socket {
    pub fn connect(&self, addr: impl ToSocketAddrs) -> io::Result<TcpStream> {
        TcpStream::connect(addr)
    }

    pub fn connect_timeout(&self, addr: &SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
        TcpStream::connect_timeout(addr, timeout)
    }

    pub fn bind(&self, addr: impl ToSocketAddrs) -> io::Result<TcpListener> {
        TcpListener::bind(addr)
    }

    pub fn bind_udp(&self, addr: impl ToSocketAddrs) -> io::Result<UdpSocket> {
        UdpSocket::bind(addr)
    }

    /// Resolves `host:port` to socket addresses.
    pub fn lookup_host(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }
}

/// Process launching, injected as `subprocess`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subprocess;

impl Subprocess {
    pub fn command(&self, program: impl AsRef<OsStr>) -> Command {
        Command::new(program)
    }

    /// Runs `program` to completion and collects its output.
    pub fn run<I, S>(&self, program: impl AsRef<OsStr>, args: I) -> io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(program).args(args).output()
    }
}

pub(crate) fn builtin_modules() -> Vec<GlobalModule> {
    let os = GlobalModule::new("os")
        .with_factory("environ", Environ::capture)
        .with_factory("args", || std::env::args().collect::<Vec<String>>())
        .with_module(
            GlobalModule::new("path").with_value("separator", std::path::MAIN_SEPARATOR_STR),
        );

    let time = GlobalModule::new("time")
        .with_factory("now", Local::now)
        .with_factory("utcnow", Utc::now)
        .with_factory("instant", Instant::now);

    vec![
        os,
        time,
        GlobalModule::new("socket").resolves_to(Socket),
        GlobalModule::new("subprocess").resolves_to(Subprocess),
    ]
}

//! Dublês de teste: banco em memória, enlace roteirizado e canal fixo.

use crate::link::{LinkError, NetworkLink};
use crate::remote::{Method, Response, Transport, TransportError};
use meter_core::identity::resolve;
use meter_core::sensor::{AnalogSource, SensorError};
use meter_core::types::{DeviceIdentity, SampleReading, TelemetryRecord};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

pub fn identity() -> DeviceIdentity {
    resolve(Some("AA:BB:CC:DD:EE:FF")).unwrap()
}

pub fn record(ts: u64) -> TelemetryRecord {
    TelemetryRecord::from_sample(
        127.8,
        SampleReading {
            current: 1.0,
            power: 127.8,
        },
        0.001,
        ts,
    )
}

/// Lê de volta um registro gravado no banco em memória.
pub fn decode_record(body: &str) -> TelemetryRecord {
    serde_json::from_str(body).unwrap()
}

// ──────────────────────────────────────────────
// Banco em memória
// ──────────────────────────────────────────────

#[derive(Default)]
struct StoreInner {
    documents: HashMap<String, String>,
    logs: HashMap<String, Vec<String>>,
    requests: Vec<(Method, String)>,
}

enum Mode {
    Healthy,
    Status(u16),
    Unreachable,
}

/// PUT substitui o documento; POST acrescenta ao log do caminho.
pub struct MemoryStore {
    inner: RefCell<StoreInner>,
    mode: RefCell<Mode>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(StoreInner::default()),
            mode: RefCell::new(Mode::Healthy),
        }
    }

    /// Responde sempre com `status` sem gravar nada.
    pub fn failing_with(status: u16) -> Self {
        let store = Self::new();
        store.set_status(status);
        store
    }

    pub fn unreachable() -> Self {
        let store = Self::new();
        *store.mode.borrow_mut() = Mode::Unreachable;
        store
    }

    pub fn set_status(&self, status: u16) {
        *self.mode.borrow_mut() = Mode::Status(status);
    }

    pub fn heal(&self) {
        *self.mode.borrow_mut() = Mode::Healthy;
    }

    pub fn document(&self, path: &str) -> Option<String> {
        self.inner.borrow().documents.get(path).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.inner.borrow().documents.len()
    }

    pub fn log(&self, path: &str) -> Vec<String> {
        self.inner.borrow().logs.get(path).cloned().unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.inner.borrow().requests.len()
    }

    pub fn requests_to(&self, prefix: &str) -> usize {
        self.inner
            .borrow()
            .requests
            .iter()
            .filter(|(_, path)| path.starts_with(prefix))
            .count()
    }
}

/// Caminho da URL, sem esquema, host e query.
fn path_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .find('/')
        .map_or("/", |i| &without_scheme[i..]);
    path.split('?').next().unwrap_or(path).to_string()
}

impl Transport for MemoryStore {
    fn send(&self, method: Method, url: &str, body: &str) -> Result<Response, TransportError> {
        let path = path_of(url);
        let mut inner = self.inner.borrow_mut();
        inner.requests.push((method, path.clone()));

        match *self.mode.borrow() {
            Mode::Unreachable => {
                return Err(TransportError {
                    method,
                    url: url.to_string(),
                    reason: "connection refused".into(),
                });
            }
            Mode::Status(status) => {
                return Ok(Response {
                    status,
                    body: String::new(),
                });
            }
            Mode::Healthy => {}
        }

        let body_out = match method {
            Method::Put => {
                inner.documents.insert(path, body.to_string());
                body.to_string()
            }
            Method::Post => {
                let log = inner.logs.entry(path).or_default();
                log.push(body.to_string());
                format!("{{\"name\":\"-N{}\"}}", log.len())
            }
        };
        Ok(Response {
            status: 200,
            body: body_out,
        })
    }
}

// ──────────────────────────────────────────────
// Enlace roteirizado
// ──────────────────────────────────────────────

/// Enlace controlado pelo teste.
pub struct FakeLink {
    pub connected: bool,
    pub mac: Option<String>,
    /// Resultados das próximas chamadas a `connect` (vazio = sucesso)
    pub connect_script: VecDeque<bool>,
    pub connect_attempts: usize,
}

impl FakeLink {
    pub fn new(mac: &str) -> Self {
        Self {
            connected: false,
            mac: Some(mac.to_string()),
            connect_script: VecDeque::new(),
            connect_attempts: 0,
        }
    }
}

impl NetworkLink for FakeLink {
    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        self.connect_attempts += 1;
        if self.connect_script.pop_front().unwrap_or(true) {
            self.connected = true;
            Ok(())
        } else {
            Err(LinkError::NotAttached("fake0".into(), "Wokwi-GUEST".into()))
        }
    }

    fn hardware_address(&self) -> Option<String> {
        if self.connected { self.mac.clone() } else { None }
    }
}

// ──────────────────────────────────────────────
// Canal fixo
// ──────────────────────────────────────────────

/// Sempre devolve a mesma leitura normalizada.
pub struct FixedSource(pub f64);

impl AnalogSource for FixedSource {
    fn read(&mut self) -> Result<f64, SensorError> {
        Ok(self.0)
    }
}

//! Cliente de sincronização com o banco remoto chave-valor (REST sobre HTTPS).
//!
//! Caminhos, todos particionados pela identidade `D`:
//!
//! ```text
//! PUT  /{registration_root}/{D}{suffix}        marcador de registro
//! PUT  /{state_root}/{D}{suffix}               estado atual (substitui)
//! POST /{state_root}/{D}/{history_leaf}{suffix} histórico (acrescenta)
//! ```

use meter_core::config::StoreConfig;
use meter_core::protocol::{encode_device_call, encode_record};
use meter_core::types::{DeviceCallRecord, DeviceIdentity, TelemetryRecord};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use ureq::Agent;
use ureq::tls::TlsConfig;

/// Verbo HTTP usado pelo cliente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Put,
    Post,
}

/// Falha em nível de transporte (sem status HTTP).
#[derive(Debug, thiserror::Error)]
#[error("Falha na requisição {method:?} {url}: {reason}")]
pub struct TransportError {
    pub method: Method,
    pub url: String,
    pub reason: String,
}

/// Resposta com status definitivo.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// Fronteira de transporte: qualquer status HTTP é `Ok`.
pub trait Transport {
    fn send(&self, method: Method, url: &str, body: &str) -> Result<Response, TransportError>;
}

// ──────────────────────────────────────────────
// Transporte HTTPS (ureq)
// ──────────────────────────────────────────────

/// Transporte bloqueante baseado em `ureq`.
pub struct HttpTransport {
    agent: Agent,
}

impl HttpTransport {
    pub fn new(cfg: &StoreConfig) -> Self {
        let tls = TlsConfig::builder()
            .disable_verification(cfg.accept_invalid_certs)
            .build();
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(cfg.timeout_secs)))
            .tls_config(tls)
            .user_agent(concat!("meter_agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .new_agent();
        if cfg.accept_invalid_certs {
            warn!("Verificação de certificado TLS desativada");
        }
        Self { agent }
    }
}

impl Transport for HttpTransport {
    fn send(&self, method: Method, url: &str, body: &str) -> Result<Response, TransportError> {
        let result = match method {
            Method::Put => self
                .agent
                .put(url)
                .content_type("application/json")
                .send(body),
            Method::Post => self
                .agent
                .post(url)
                .content_type("application/json")
                .send(body),
        };

        let response = result.map_err(|e| TransportError {
            method,
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response.into_body().read_to_string().unwrap_or_else(|e| {
            debug!("Corpo da resposta ilegível: {e}");
            String::new()
        });
        Ok(Response { status, body })
    }
}

// ──────────────────────────────────────────────
// Caminhos
// ──────────────────────────────────────────────

/// Monta as URLs do banco para uma identidade.
#[derive(Debug, Clone)]
pub struct StorePaths {
    base_url: String,
    registration_root: String,
    state_root: String,
    history_leaf: String,
    suffix: String,
    auth_token: String,
}

impl StorePaths {
    pub fn from_config(cfg: &StoreConfig) -> Self {
        Self {
            base_url: cfg.base_url.trim().trim_end_matches('/').to_string(),
            registration_root: cfg.registration_root.trim_matches('/').to_string(),
            state_root: cfg.state_root.trim_matches('/').to_string(),
            history_leaf: cfg.history_leaf.trim_matches('/').to_string(),
            suffix: cfg.path_suffix.clone(),
            auth_token: cfg.auth_token.clone(),
        }
    }

    pub fn registration_url(&self, id: &DeviceIdentity) -> String {
        self.url(&format!("{}/{id}", self.registration_root))
    }

    pub fn state_url(&self, id: &DeviceIdentity) -> String {
        self.url(&format!("{}/{id}", self.state_root))
    }

    pub fn history_url(&self, id: &DeviceIdentity) -> String {
        self.url(&format!("{}/{id}/{}", self.state_root, self.history_leaf))
    }

    fn url(&self, path: &str) -> String {
        let mut url = format!("{}/{path}{}", self.base_url, self.suffix);
        if !self.auth_token.is_empty() {
            url.push_str("?auth=");
            url.push_str(&self.auth_token);
        }
        url
    }
}

// ──────────────────────────────────────────────
// Cliente
// ──────────────────────────────────────────────

/// Publicação de estado, histórico e registro.
///
/// Nenhuma operação repete a requisição: uma falha é apenas reportada e
/// superada pelo próximo ciclo.
pub struct RemoteSyncClient<T> {
    transport: T,
    paths: StorePaths,
    started: Instant,
    online: bool,
}

impl<T: Transport> RemoteSyncClient<T> {
    /// `started` é o instante de início do processo (base do timestamp do registro).
    pub fn new(transport: T, paths: StorePaths, started: Instant) -> Self {
        Self {
            transport,
            paths,
            started,
            online: false,
        }
    }

    /// Atualizado pelo supervisor a cada iteração.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Precondição comum: identidade definida e enlace ativo.
    fn ready<'a>(&self, identity: Option<&'a DeviceIdentity>) -> Option<&'a DeviceIdentity> {
        if self.online { identity } else { None }
    }

    /// PUT do estado atual. Sucesso somente com 200.
    pub fn publish_state(&self, identity: Option<&DeviceIdentity>, record: &TelemetryRecord) -> bool {
        let Some(id) = self.ready(identity) else {
            return false;
        };
        let payload = match encode_record(record) {
            Ok(p) => p,
            Err(e) => {
                warn!("Estado não publicado: {e}");
                return false;
            }
        };
        let url = self.paths.state_url(id);
        self.exchange(Method::Put, &url, &payload)
            .is_some_and(|status| status == 200)
    }

    /// POST no histórico. Sucesso com 200 ou 201.
    pub fn append_history(&self, identity: Option<&DeviceIdentity>, record: &TelemetryRecord) -> bool {
        let Some(id) = self.ready(identity) else {
            return false;
        };
        let payload = match encode_record(record) {
            Ok(p) => p,
            Err(e) => {
                warn!("Histórico não gravado: {e}");
                return false;
            }
        };
        let url = self.paths.history_url(id);
        self.exchange(Method::Post, &url, &payload)
            .is_some_and(|status| status == 200 || status == 201)
    }

    /// PUT do marcador de registro, uma vez por conexão. Falha só é logada.
    pub fn register_device(&self, identity: Option<&DeviceIdentity>) -> bool {
        let Some(id) = self.ready(identity) else {
            return false;
        };
        let uptime_ms = self.started.elapsed().as_millis() as u64;
        let payload = match encode_device_call(&DeviceCallRecord::pending(uptime_ms)) {
            Ok(p) => p,
            Err(e) => {
                warn!("Chamado de registro não enviado: {e}");
                return false;
            }
        };
        let url = self.paths.registration_url(id);
        info!("Enviando chamado de registro para {id}");
        debug!("Payload: {payload}");

        let ok = self
            .exchange(Method::Put, &url, &payload)
            .is_some_and(|status| status == 200);
        if !ok {
            warn!("Chamado de registro falhou para {id}");
        }
        ok
    }

    /// Executa a requisição e retorna o status, ou `None` em falha de transporte.
    fn exchange(&self, method: Method, url: &str, payload: &str) -> Option<u16> {
        match self.transport.send(method, url, payload) {
            Ok(resp) => {
                info!("{method:?} {} -> {}", redact(url), resp.status);
                debug!("Resp: {}", resp.body);
                Some(resp.status)
            }
            Err(e) => {
                warn!("{method:?} {} -> erro de transporte: {}", redact(url), e.reason);
                None
            }
        }
    }
}

/// Remove a credencial da URL antes de logar.
fn redact(url: &str) -> &str {
    url.split_once("?auth=").map_or(url, |(base, _)| base)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

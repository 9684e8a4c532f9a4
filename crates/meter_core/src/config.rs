//! Configuração do agente via TOML + variáveis de ambiente.
//!
//! Ordem de precedência: padrão → `config.toml` → variáveis `METER_*`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Erros de configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao parsear TOML: {0}")]
    Parse(String),

    #[error("Configuração inválida: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Rede (a associação em si é feita pelo sistema).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// SSID esperado
    pub ssid: String,
    /// Senha da rede
    pub password: String,
    /// Interface monitorada (vazio = primeira com endereço físico)
    pub interface: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: "Wokwi-GUEST".into(),
            password: String::new(),
            interface: String::new(),
        }
    }
}

/// Banco remoto chave-valor (REST).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// URL base, ex: `https://exemplo-default-rtdb.firebaseio.com`
    pub base_url: String,
    /// Credencial opcional anexada como `?auth=`
    pub auth_token: String,
    /// Raiz dos chamados de registro
    pub registration_root: String,
    /// Raiz do estado atual
    pub state_root: String,
    /// Folha do histórico dentro do estado do dispositivo
    pub history_leaf: String,
    /// Sufixo de documento REST
    pub path_suffix: String,
    /// Aceita certificados não confiáveis (simulação)
    pub accept_invalid_certs: bool,
    /// Timeout por requisição (segundos)
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: String::new(),
            registration_root: "device_calls".into(),
            state_root: "tomadas".into(),
            history_leaf: "historico".into(),
            path_suffix: ".json".into(),
            accept_invalid_certs: true,
            timeout_secs: 10,
        }
    }
}

/// Teto do período da onda simulada (segundos).
pub const MAX_SIM_PERIOD_SECS: f64 = 86_400.0;

/// Origem da leitura analógica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSourceKind {
    /// Onda triangular determinística
    Simulated,
    /// Contagem do ADC lida de um arquivo (ex: nó IIO do sysfs)
    File,
}

/// Sensor e parâmetros elétricos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub source: SensorSourceKind,
    /// Caminho do canal quando `source = "file"`
    pub path: String,
    /// Fundo de escala do ADC
    pub adc_max: u32,
    /// Tensão de linha (V)
    pub line_voltage: f64,
    /// Período da onda simulada (segundos)
    pub sim_period_secs: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            source: SensorSourceKind::Simulated,
            path: "/sys/bus/iio/devices/iio:device0/in_voltage0_raw".into(),
            adc_max: 4096,
            line_voltage: 127.8,
            sim_period_secs: 60.0,
        }
    }
}

/// Intervalo usado na integração de energia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyInterval {
    /// Δt fixo (`nominal_interval_secs`) por tick
    Nominal,
    /// Δt medido entre ticks
    Measured,
}

/// Cadência do laço principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub publish_interval_secs: f64,
    pub idle_delay_secs: f64,
    pub reconnect_backoff_ms: u64,
    pub reconnect_backoff_max_ms: u64,
    pub reconnect_settle_secs: f64,
    pub energy_interval: EnergyInterval,
    pub nominal_interval_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            publish_interval_secs: 5.0,
            idle_delay_secs: 1.0,
            reconnect_backoff_ms: 400,
            reconnect_backoff_max_ms: 5000,
            reconnect_settle_secs: 2.0,
            energy_interval: EnergyInterval::Nominal,
            nominal_interval_secs: 1.0,
        }
    }
}

impl TimingConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs_f64(self.publish_interval_secs)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_secs_f64(self.idle_delay_secs)
    }

    pub fn reconnect_settle(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_settle_secs)
    }

    /// Backoff da tentativa `attempt` (0-based): dobra a cada falha até o teto.
    pub fn reconnect_backoff(&self, attempt: u32) -> Duration {
        let ms = self
            .reconnect_backoff_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.reconnect_backoff_max_ms);
        Duration::from_millis(ms)
    }
}

/// Configuração raiz do agente.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub network: NetworkConfig,
    pub store: StoreConfig,
    pub sensor: SensorConfig,
    pub timing: TimingConfig,
}

impl AgentConfig {
    /// Carrega configuração de um arquivo TOML. Arquivo ausente = padrão.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("{} não encontrado, usando configuração padrão", path.display());
            return Ok(AgentConfig::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        info!("Configuração carregada de {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho do config: `METER_CONFIG` ou `config.toml` ao lado do executável.
    pub fn default_path() -> PathBuf {
        if let Ok(p) = std::env::var("METER_CONFIG") {
            return PathBuf::from(p);
        }
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Aplica as variáveis `METER_*` do processo.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Aplica overrides a partir de uma função de lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("METER_STORE_URL") {
            self.store.base_url = v;
        }
        if let Some(v) = lookup("METER_AUTH_TOKEN") {
            self.store.auth_token = v;
        }
        if let Some(v) = lookup("METER_WIFI_SSID") {
            self.network.ssid = v;
        }
        if let Some(v) = lookup("METER_WIFI_PASSWORD") {
            self.network.password = v;
        }
        if let Some(v) = lookup("METER_INTERFACE") {
            self.network.interface = v;
        }
        if let Some(v) = lookup("METER_SENSOR_SOURCE") {
            match v.as_str() {
                "simulated" => self.sensor.source = SensorSourceKind::Simulated,
                "file" => self.sensor.source = SensorSourceKind::File,
                other => warn!("METER_SENSOR_SOURCE desconhecido: {other}"),
            }
        }
        if let Some(v) = lookup("METER_SENSOR_PATH") {
            self.sensor.path = v;
        }
        parse_f64_into(&lookup, "METER_LINE_VOLTAGE", &mut self.sensor.line_voltage);
        parse_f64_into(
            &lookup,
            "METER_PUBLISH_INTERVAL_SECS",
            &mut self.timing.publish_interval_secs,
        );
        parse_f64_into(&lookup, "METER_IDLE_DELAY_SECS", &mut self.timing.idle_delay_secs);
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let url = self.store.base_url.trim();
        if url.is_empty() {
            errors.push("store.base_url não pode ser vazio".into());
        } else if !url.starts_with("https://") && !url.starts_with("http://") {
            errors.push(format!("store.base_url inválido: {url}"));
        }
        for (name, value) in [
            ("store.registration_root", &self.store.registration_root),
            ("store.state_root", &self.store.state_root),
            ("store.history_leaf", &self.store.history_leaf),
        ] {
            if value.trim_matches('/').is_empty() {
                errors.push(format!("{name} não pode ser vazio"));
            }
        }
        if self.store.timeout_secs == 0 {
            errors.push("store.timeout_secs não pode ser 0".into());
        }
        if self.sensor.adc_max == 0 {
            errors.push("sensor.adc_max não pode ser 0".into());
        }
        if self.sensor.source == SensorSourceKind::File && self.sensor.path.is_empty() {
            errors.push("sensor.path obrigatório com source = \"file\"".into());
        }
        if !(self.sensor.line_voltage.is_finite() && self.sensor.line_voltage > 0.0) {
            errors.push(format!(
                "Tensão de linha inválida: {}",
                self.sensor.line_voltage
            ));
        }
        let period = self.sensor.sim_period_secs;
        if !(period.is_finite() && period > 0.0 && period <= MAX_SIM_PERIOD_SECS) {
            errors.push(format!(
                "sensor.sim_period_secs inválido: {period} (0–{MAX_SIM_PERIOD_SECS})"
            ));
        }
        for (name, value) in [
            ("timing.publish_interval_secs", self.timing.publish_interval_secs),
            ("timing.idle_delay_secs", self.timing.idle_delay_secs),
            ("timing.reconnect_settle_secs", self.timing.reconnect_settle_secs),
            ("timing.nominal_interval_secs", self.timing.nominal_interval_secs),
        ] {
            if !(value.is_finite() && (0.0..=3600.0).contains(&value)) {
                errors.push(format!("{name} inválido: {value} (0–3600)"));
            }
        }
        if self.timing.reconnect_backoff_max_ms < self.timing.reconnect_backoff_ms {
            errors.push("timing.reconnect_backoff_max_ms menor que o backoff inicial".into());
        }

        errors
    }

    /// Valida e converte a lista de erros em [`ConfigError::Invalid`].
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

fn parse_f64_into<F>(lookup: &F, key: &str, target: &mut f64)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<f64>() {
            Ok(v) => *target = v,
            Err(e) => warn!("{key} ignorado ({raw:?}): {e}"),
        }
    }
}

//! Definição de tipos/structs do medidor.
//!
//! Os nomes de campo serializados seguem exatamente os documentos já
//! gravados no banco remoto (`Voltage`, `Current`, …, `ts`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frequência da rede reportada em todo registro (Hz).
pub const GRID_FREQUENCY_HZ: f64 = 60.0;

/// Fator de potência reportado em todo registro.
pub const POWER_FACTOR: f64 = 1.0;

// ──────────────────────────────────────────────
// Identidade
// ──────────────────────────────────────────────

/// Identificador estável do dispositivo (endereço físico sem separadores).
///
/// Única chave de partição de todos os caminhos remotos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub(crate) fn new_unchecked(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ──────────────────────────────────────────────
// Amostra
// ──────────────────────────────────────────────

/// Leitura instantânea derivada de um poll do sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleReading {
    /// Corrente (A), sempre em [0, 10]
    pub current: f64,
    /// Potência (W) = corrente × tensão de linha
    pub power: f64,
}

// ──────────────────────────────────────────────
// Registro de telemetria
// ──────────────────────────────────────────────

/// Snapshot canônico publicado no estado atual e no histórico.
///
/// A ordem dos campos define a ordem das chaves no JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Tensão de linha (V)
    #[serde(rename = "Voltage")]
    pub voltage: f64,
    /// Corrente (A)
    #[serde(rename = "Current")]
    pub current: f64,
    /// Potência ativa (W)
    #[serde(rename = "Power")]
    pub power: f64,
    /// Energia acumulada desde o início do processo (kWh)
    #[serde(rename = "Energy")]
    pub energy: f64,
    /// Frequência (Hz)
    #[serde(rename = "Frequency")]
    pub frequency: f64,
    /// Fator de potência
    #[serde(rename = "PF")]
    pub power_factor: f64,
    /// Segundos desde o início do processo
    pub ts: u64,
}

impl TelemetryRecord {
    /// Monta o registro a partir da amostra atual e do acumulador.
    pub fn from_sample(voltage: f64, sample: SampleReading, energy_kwh: f64, ts: u64) -> Self {
        Self {
            voltage,
            current: sample.current,
            power: sample.power,
            energy: energy_kwh,
            frequency: GRID_FREQUENCY_HZ,
            power_factor: POWER_FACTOR,
            ts,
        }
    }
}

// ──────────────────────────────────────────────
// Chamado de registro
// ──────────────────────────────────────────────

/// Status gravado no marcador de registro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    PendingRegistration,
}

/// Marcador gravado uma vez por conexão estabelecida.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCallRecord {
    /// Milissegundos desde o início do processo
    pub timestamp: u64,
    pub status: RegistrationStatus,
}

impl DeviceCallRecord {
    pub fn pending(timestamp_ms: u64) -> Self {
        Self {
            timestamp: timestamp_ms,
            status: RegistrationStatus::PendingRegistration,
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

//! # Meter Core
//!
//! Crate compartilhada do medidor de tomada: modelo de dados, identidade,
//! sensor proxy, integração de energia, codificação JSON e configuração.
//!
//! ## Módulos
//! - [`types`] – Registro de telemetria, identidade e marcador de registro
//! - [`identity`] – Identidade a partir do endereço físico
//! - [`sensor`] – Modelo de transferência do LDR e amostrador
//! - [`energy`] – Acumulador de energia (kWh)
//! - [`protocol`] – Codificação canônica com limite de tamanho
//! - [`config`] – Configuração via TOML + ambiente

pub mod types;
pub mod identity;
pub mod sensor;
pub mod energy;
pub mod protocol;
pub mod config;

// Re-exports convenientes
pub use types::{DeviceCallRecord, DeviceIdentity, SampleReading, TelemetryRecord};
pub use identity::{IdentityError, resolve};
pub use sensor::{AnalogSource, Sampler, SensorError};
pub use energy::EnergyIntegrator;
pub use protocol::{ProtocolError, encode_device_call, encode_record};
pub use config::{AgentConfig, ConfigError, EnergyInterval};

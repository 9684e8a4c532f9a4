//! Codificação canônica dos documentos enviados ao banco remoto.
//!
//! Os documentos são JSON compacto com chaves fixas, na ordem:
//!
//! ```text
//! {"Voltage":…,"Current":…,"Power":…,"Energy":…,"Frequency":60.0,"PF":1.0,"ts":…}
//! ```
//!
//! O tamanho é limitado a [`MAX_DOCUMENT_BYTES`]; um documento maior é
//! rejeitado inteiro, nunca truncado.

use crate::types::{DeviceCallRecord, TelemetryRecord};
use serde::Serialize;

/// Tamanho máximo de um documento serializado.
pub const MAX_DOCUMENT_BYTES: usize = 256;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Documento excede o limite ({size} bytes, máximo {max})")]
    EncodingOverflow { size: usize, max: usize },

    #[error("Erro de serialização: {0}")]
    Serialize(String),
}

/// Codifica um [`TelemetryRecord`] para publicação.
pub fn encode_record(record: &TelemetryRecord) -> Result<String, ProtocolError> {
    encode_bounded(record, MAX_DOCUMENT_BYTES)
}

/// Codifica o marcador de registro do dispositivo.
pub fn encode_device_call(call: &DeviceCallRecord) -> Result<String, ProtocolError> {
    encode_bounded(call, MAX_DOCUMENT_BYTES)
}

fn encode_bounded<T: Serialize>(value: &T, max: usize) -> Result<String, ProtocolError> {
    let body = serde_json::to_string(value).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    if body.len() > max {
        return Err(ProtocolError::EncodingOverflow {
            size: body.len(),
            max,
        });
    }
    Ok(body)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

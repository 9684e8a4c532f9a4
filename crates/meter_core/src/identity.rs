//! Resolução da identidade do dispositivo a partir do endereço físico.

use crate::types::DeviceIdentity;

/// Erros de identidade.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Endereço físico indisponível (interface sem conexão?)")]
    Unavailable,
}

/// Deriva a identidade de um endereço físico (`AA:BB:CC:DD:EE:FF`).
///
/// Remove separadores e normaliza para maiúsculas. Endereço ausente,
/// vazio ou todo zerado (interface sem hardware associado) é tratado como
/// indisponível.
pub fn resolve(hardware_address: Option<&str>) -> Result<DeviceIdentity, IdentityError> {
    let raw = hardware_address.ok_or(IdentityError::Unavailable)?;

    let id: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if id.is_empty() || id.chars().all(|c| c == '0') {
        return Err(IdentityError::Unavailable);
    }

    Ok(DeviceIdentity::new_unchecked(id))
}

//! Componentes do agente do medidor, usados pelo binário `meter_agent`.
//!
//! - [`link`] – Estado do enlace e endereço físico
//! - [`sources`] – Canais analógicos (arquivo ou simulado)
//! - [`remote`] – Transporte HTTPS e cliente de sincronização
//! - [`supervisor`] – Máquina de estados e laço principal

pub mod link;
pub mod remote;
pub mod sources;
pub mod supervisor;
#[cfg(test)]
mod testing;

//! Enlace de rede: estado da conexão e endereço físico da interface.
//!
//! A associação à rede (Wi-Fi, DHCP, TLS) é responsabilidade do sistema;
//! aqui apenas observamos a interface escolhida via `sysinfo`.

use sysinfo::{NetworkData, Networks};
use tracing::{debug, info};

/// Prefixos de interfaces virtuais ignoradas na seleção automática.
const VIRTUAL_PREFIXES: &[&str] = &["lo", "docker", "br-", "veth", "virbr", "tun", "tap"];

/// Erros do enlace.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Nenhuma interface com endereço físico encontrada")]
    NoInterface,

    #[error("Interface {0} sem endereço IP (rede {1:?} indisponível)")]
    NotAttached(String, String),
}

/// Visão do supervisor sobre o enlace de rede.
pub trait NetworkLink {
    /// Consulta barata feita no topo de toda iteração.
    fn is_connected(&mut self) -> bool;
    /// Uma tentativa de conexão; o supervisor aplica o backoff.
    fn connect(&mut self) -> Result<(), LinkError>;
    /// Endereço físico no formato `AA:BB:CC:DD:EE:FF`.
    fn hardware_address(&self) -> Option<String>;
}

/// Fotografia de uma interface, usada na seleção.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    /// `None` quando o endereço físico é todo zerado
    pub mac: Option<String>,
    pub has_ip: bool,
}

impl InterfaceInfo {
    fn from_sysinfo(name: &str, data: &NetworkData) -> Self {
        let mac = data.mac_address();
        Self {
            name: name.to_string(),
            mac: (!mac.is_unspecified()).then(|| mac.to_string()),
            has_ip: data
                .ip_networks()
                .iter()
                .any(|net| !net.addr.is_loopback() && !net.addr.is_unspecified()),
        }
    }
}

fn is_virtual(name: &str) -> bool {
    VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Escolhe a interface monitorada.
///
/// Com `configured` preenchido, só aceita aquela interface. No modo
/// automático, ignora interfaces virtuais e sem MAC, e prefere (por nome) a
/// primeira com IP; sem nenhuma com IP, devolve a primeira com MAC para o
/// relato de "ainda não associada".
pub fn pick_interface<'a>(interfaces: &'a [InterfaceInfo], configured: &str) -> Option<&'a InterfaceInfo> {
    if !configured.is_empty() {
        return interfaces.iter().find(|i| i.name == configured);
    }

    let mut candidates: Vec<&InterfaceInfo> = interfaces
        .iter()
        .filter(|i| i.mac.is_some() && !is_virtual(&i.name))
        .collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    candidates
        .iter()
        .find(|i| i.has_ip)
        .or_else(|| candidates.first())
        .copied()
}

/// Enlace real do host, observado pela lista de interfaces do `sysinfo`.
pub struct HostLink {
    networks: Networks,
    /// Interface fixa (vazio = automática)
    interface: String,
    ssid: String,
}

impl HostLink {
    pub fn new(interface: &str, ssid: &str) -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            interface: interface.to_string(),
            ssid: ssid.to_string(),
        }
    }

    fn snapshot(&self) -> Vec<InterfaceInfo> {
        self.networks
            .iter()
            .map(|(name, data)| InterfaceInfo::from_sysinfo(name, data))
            .collect()
    }

    fn selected(&self) -> Option<InterfaceInfo> {
        pick_interface(&self.snapshot(), &self.interface).cloned()
    }
}

impl NetworkLink for HostLink {
    fn is_connected(&mut self) -> bool {
        self.networks.refresh(true);
        self.selected().is_some_and(|i| i.has_ip)
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        self.networks.refresh(true);
        let iface = self.selected().ok_or(LinkError::NoInterface)?;
        if iface.has_ip {
            info!(
                "Rede OK via {} ({})",
                iface.name,
                iface.mac.as_deref().unwrap_or("sem MAC")
            );
            Ok(())
        } else {
            debug!("Aguardando associação de {} à rede {}", iface.name, self.ssid);
            Err(LinkError::NotAttached(iface.name, self.ssid.clone()))
        }
    }

    fn hardware_address(&self) -> Option<String> {
        self.selected().and_then(|i| i.mac)
    }
}
